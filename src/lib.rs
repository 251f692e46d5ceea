//! # chaser-sogou
//!
//! Challenge-aware HTTP fetching for Sogou WeChat search and WeChat article pages.
//!
//! ## Features
//!
//! - **Challenge Detection**: Recognizes the antispider captcha and rate-limit pages
//!   served instead of content.
//! - **Automatic Unblocking**: Downloads the captcha, solves it through an OCR service
//!   or an operator, submits the solution and resends the original request once.
//! - **Persistent Sessions**: Cookies are kept per identity and survive restarts
//!   through a TTL cache.
//! - **Credential Cache**: Per-keyword tokens needed by article history endpoints.
//! - **Proxy Support**: HTTP and SOCKS5 proxy support with authentication.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chaser_sogou::{Fetcher, SearchKind};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = Fetcher::builder().build()?;
//!
//!     let page = fetcher.search("rust", SearchKind::Article, 1).await?;
//!     println!("{} bytes", page.len());
//!
//!     fetcher.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Unattended Solving
//!
//! ```ignore
//! use chaser_sogou::{Fetcher, FetcherConfig, RuokuaiConfig, SolverStrategy};
//!
//! let config = FetcherConfig {
//!     unattended: true,
//!     solver: SolverStrategy::Ruokuai(RuokuaiConfig {
//!         username: "user".into(),
//!         password: "pass".into(),
//!         soft_id: "1".into(),
//!         soft_key: "key".into(),
//!         timeout_secs: 60,
//!     }),
//!     ..Default::default()
//! };
//! let fetcher = Fetcher::builder().config(config).build()?;
//! ```
//!
//! A challenge that is still served after one accepted unblock is reported as
//! [`FetchError::ChallengeLoop`]; rate-limit pages are never solved.

#![allow(missing_docs)]

pub mod cache;
pub mod client;
pub mod config;
pub mod credentials;
pub mod detector;
pub mod error;
pub mod models;
pub mod profiles;
pub mod session;
pub mod session_client;
pub mod solvers;
pub mod transport;

// Re-exports for convenience
pub use cache::CacheStore;
pub use client::{Fetcher, FetcherBuilder};
pub use config::{FetcherConfig, SolverStrategy};
pub use credentials::CredentialCache;
pub use detector::ChallengeDetector;
pub use error::{FetchError, Result};
pub use models::{
    ChallengeKind, CredentialBundle, FetchOptions, HeaderOverride, HttpMethod, SearchKind,
};
pub use profiles::ChallengeProfile;
pub use session::{Session, SessionManager};
pub use solvers::{ChallengeSolver, OcrProvider, RuokuaiConfig};
pub use transport::{HttpTransport, WreqTransport};

