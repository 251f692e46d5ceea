//! Example: Fetching a Sogou WeChat search page.
//!
//! Run with: cargo run --example fetch_page -- <keyword> [config.json]

use chaser_sogou::{Fetcher, FetcherConfig, SearchKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for debug output (optional)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let keyword = args.next().unwrap_or_else(|| "rust".to_string());
    let config = match args.next() {
        Some(path) => FetcherConfig::from_json_file(path)?,
        None => FetcherConfig::default(),
    };

    let fetcher = Fetcher::builder()
        .config(config)
        // Optionally add proxy:
        // .proxy("http://127.0.0.1:8080")
        .build()?;

    println!("\n=== Searching articles for {} ===", keyword);
    match fetcher.search(&keyword, SearchKind::Article, 1).await {
        Ok(page) => {
            println!("Success!");
            println!("  bytes: {}", page.len());
            if let Some(bundle) = fetcher.credentials().fetch(&keyword) {
                println!("  cached credentials: biz={}", bundle.biz);
            }
        }
        Err(e) => {
            println!("Failed: {}", e);
        }
    }

    fetcher.shutdown();
    Ok(())
}
