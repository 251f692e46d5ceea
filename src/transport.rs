//! HTTP transport seam between the session client and the network.

use crate::error::Result;
use crate::models::HttpMethod;
use async_trait::async_trait;
use wreq::header::HeaderMap;
use wreq::{Client, Proxy};
use std::fmt::Debug;
use std::net::IpAddr;

/// Fully assembled request: headers and cookies already applied.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// Raw response before status checks and decoding.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// All values of the header `name`, case-insensitive.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).next()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one HTTP exchange. Cookies are managed by the caller.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `wreq`-backed transport.
#[derive(Clone)]
pub struct WreqTransport {
    client: Client,
}

impl Debug for WreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WreqTransport")
            .field("client", &"<wreq::Client>")
            .finish()
    }
}

impl WreqTransport {
    /// Build a transport with an optional HTTP/SOCKS5 proxy and local address.
    ///
    /// # Examples
    /// ```ignore
    /// WreqTransport::new(Some("socks5://127.0.0.1:1080"), None)?;
    /// ```
    pub fn new(proxy: Option<&str>, local_address: Option<IpAddr>) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(addr) = local_address {
            builder = builder.local_address(addr);
        }

        if let Some(proxy_url) = proxy {
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl HttpTransport for WreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => wreq::Method::GET,
            HttpMethod::Post => wreq::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = convert_headers(response.headers());
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn convert_headers(header_map: &HeaderMap) -> Vec<(String, String)> {
    header_map
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = HttpResponse {
            status: 200,
            headers: vec![
                ("set-cookie".into(), "a=1".into()),
                ("Set-Cookie".into(), "b=2".into()),
                ("Content-Type".into(), "text/html; charset=gbk".into()),
            ],
            body: Vec::new(),
        };
        assert_eq!(response.header_values("Set-Cookie").count(), 2);
        assert_eq!(response.header("content-type"), Some("text/html; charset=gbk"));
        assert!(response.is_success());
    }
}
