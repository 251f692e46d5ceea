//! Header assembly, cookie handling and body decoding for outgoing requests.

use crate::error::{FetchError, Result};
use crate::models::{FetchOptions, FetchResponse, HttpMethod};
use crate::session::Session;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

static META_CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"<meta.*?charset=["']*(.+?)["'>]"#)
        .case_insensitive(true)
        .build()
        .expect("invalid meta charset regex")
});

static PRAGMA_CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"<meta.*?content=["']*;?charset=(.+?)["'>]"#)
        .case_insensitive(true)
        .build()
        .expect("invalid pragma charset regex")
});

static XML_ENCODING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^<\?xml.*?encoding=["']*(.+?)["'>]"#).expect("invalid xml encoding regex")
});

/// Issues requests on behalf of a [`Session`].
///
/// Every request gets a User-Agent drawn from the pool plus default Host and
/// Referer headers unless the caller overrides them. Non-2xx statuses are
/// returned as [`FetchError::RequestFailure`]; challenge pages are not
/// inspected here.
#[derive(Debug, Clone)]
pub struct SessionClient {
    transport: Arc<dyn HttpTransport>,
    user_agents: Vec<String>,
    default_host: String,
    default_referer: String,
    request_timeout: Duration,
}

impl SessionClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        user_agents: Vec<String>,
        default_host: impl Into<String>,
        default_referer: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            user_agents,
            default_host: default_host.into(),
            default_referer: default_referer.into(),
            request_timeout,
        }
    }

    fn random_user_agent(&self) -> Option<&str> {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    fn build_headers(&self, options: &FetchOptions) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(3 + options.headers.len());
        if let Some(agent) = self.random_user_agent() {
            headers.push(("User-Agent".to_string(), agent.to_string()));
        }
        if let Some(referer) = options.referer.resolve(&self.default_referer) {
            headers.push(("Referer".to_string(), referer.to_string()));
        }
        if let Some(host) = options.host.resolve(&self.default_host) {
            headers.push(("Host".to_string(), host.to_string()));
        }
        headers.extend(options.headers.iter().cloned());
        headers
    }

    fn build_body(options: &FetchOptions) -> Result<Option<(Vec<u8>, &'static str)>> {
        if let Some(json) = &options.json {
            return Ok(Some((serde_json::to_vec(json)?, "application/json")));
        }
        if options.form.is_empty() {
            return Ok(None);
        }
        let encoded = options
            .form
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        Ok(Some((
            encoded.into_bytes(),
            "application/x-www-form-urlencoded",
        )))
    }

    /// Send a request and return the raw response after the status check.
    pub async fn send(
        &self,
        session: &mut Session,
        method: HttpMethod,
        url: &str,
        options: &FetchOptions,
    ) -> Result<HttpResponse> {
        let parsed = Url::parse(url)?;
        let mut headers = self.build_headers(options);
        if let Some(cookie) = session.cookie_header(&parsed) {
            headers.push(("Cookie".to_string(), cookie));
        }

        let body = match method {
            HttpMethod::Get => None,
            HttpMethod::Post => Self::build_body(options)?,
        };
        let body = body.map(|(bytes, content_type)| {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
            bytes
        });

        tracing::debug!("{} {} ({})", method, url, session.identity());

        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        };
        let response = tokio::time::timeout(self.request_timeout, self.transport.execute(request))
            .await
            .map_err(|_| FetchError::Cancelled {
                operation: "HTTP request",
                after: self.request_timeout,
            })??;

        session.store_set_cookies(response.header_values("set-cookie"), &parsed);

        if !response.is_success() {
            tracing::error!("Request to {} failed with status {}", url, response.status);
            return Err(FetchError::RequestFailure {
                status_code: response.status,
            });
        }

        Ok(response)
    }

    /// Send a request and decode the body to text.
    pub async fn request(
        &self,
        session: &mut Session,
        method: HttpMethod,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchResponse> {
        let response = self.send(session, method, url, options).await?;
        let (text, encoding) = decode_body(&response.body, response.header("content-type"));
        Ok(FetchResponse {
            status: response.status,
            text,
            encoding,
        })
    }

    /// GET raw bytes, for challenge images.
    pub async fn fetch_bytes(
        &self,
        session: &mut Session,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Vec<u8>> {
        let response = self.send(session, HttpMethod::Get, url, options).await?;
        Ok(response.body)
    }
}

/// Charset declared inside the document (meta tags or XML prolog).
fn sniff_charset(body: &[u8]) -> Option<String> {
    let content = String::from_utf8_lossy(body);
    [&*META_CHARSET_RE, &*PRAGMA_CHARSET_RE, &*XML_ENCODING_RE]
        .iter()
        .find_map(|re| re.captures(&content))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Charset from the `Content-Type` header, with the HTTP defaults for text.
fn header_charset(content_type: Option<&str>) -> Option<String> {
    let content_type = content_type?;
    let declared = content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
    });
    if declared.is_some() {
        return declared;
    }

    let mime = content_type.to_ascii_lowercase();
    if mime.contains("text") {
        Some("ISO-8859-1".to_string())
    } else if mime.contains("application/json") {
        Some("utf-8".to_string())
    } else {
        None
    }
}

/// Decode `body`, preferring the in-document charset over the header one.
fn decode_body(body: &[u8], content_type: Option<&str>) -> (String, &'static str) {
    let encoding = sniff_charset(body)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| {
            header_charset(content_type).and_then(|label| Encoding::for_label(label.as_bytes()))
        })
        .unwrap_or(encoding_rs::UTF_8);

    let (text, used, _) = encoding.decode(body);
    (text.into_owned(), used.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HeaderOverride;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<HttpRequest>>,
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: self.headers.clone(),
                body: self.body.clone(),
            })
        }
    }

    #[derive(Debug)]
    struct StalledTransport;

    #[async_trait]
    impl HttpTransport for StalledTransport {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("request should have timed out")
        }
    }

    fn client(transport: Arc<dyn HttpTransport>) -> SessionClient {
        SessionClient::new(
            transport,
            vec!["agent-a".into(), "agent-b".into()],
            "weixin.sogou.com",
            "http://weixin.sogou.com/",
            Duration::from_secs(5),
        )
    }

    fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[tokio::test]
    async fn test_default_headers_and_cookies() {
        let transport = Arc::new(RecordingTransport {
            status: 200,
            headers: vec![("Set-Cookie".into(), "SNUID=XYZ; path=/".into())],
            body: b"ok".to_vec(),
            ..Default::default()
        });
        let client = client(transport.clone());
        let mut session = Session::new("default");
        let url = "http://weixin.sogou.com/weixin?query=a";

        client
            .request(&mut session, HttpMethod::Get, url, &FetchOptions::new())
            .await
            .unwrap();
        client
            .request(&mut session, HttpMethod::Get, url, &FetchOptions::new())
            .await
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        let first = &requests[0];
        assert!(matches!(header(first, "User-Agent"), Some("agent-a" | "agent-b")));
        assert_eq!(header(first, "Referer"), Some("http://weixin.sogou.com/"));
        assert_eq!(header(first, "Host"), Some("weixin.sogou.com"));
        assert_eq!(header(first, "Cookie"), None);
        assert_eq!(header(&requests[1], "Cookie"), Some("SNUID=XYZ"));
    }

    #[tokio::test]
    async fn test_overrides_and_form_body() {
        let transport = Arc::new(RecordingTransport {
            status: 200,
            ..Default::default()
        });
        let client = client(transport.clone());
        let mut session = Session::new("default");
        let options = FetchOptions::new()
            .without_host()
            .referer("http://example.com/r")
            .form_field("c", "ab 12")
            .form_field("v", "5");

        client
            .request(&mut session, HttpMethod::Post, "http://weixin.sogou.com/x", &options)
            .await
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(header(request, "Host"), None);
        assert_eq!(header(request, "Referer"), Some("http://example.com/r"));
        assert_eq!(
            header(request, "Content-Type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(request.body.as_deref(), Some(&b"c=ab%2012&v=5"[..]));
        assert_eq!(options.host, HeaderOverride::Omit);
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let transport = Arc::new(RecordingTransport {
            status: 302,
            ..Default::default()
        });
        let mut session = Session::new("default");
        let err = client(transport)
            .request(&mut session, HttpMethod::Get, "http://weixin.sogou.com/", &FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RequestFailure { status_code: 302 }));
    }

    #[tokio::test]
    async fn test_request_timeout_is_cancelled() {
        let client = SessionClient::new(
            Arc::new(StalledTransport),
            vec!["agent".into()],
            "weixin.sogou.com",
            "http://weixin.sogou.com/",
            Duration::from_millis(20),
        );
        let mut session = Session::new("default");
        let err = client
            .request(&mut session, HttpMethod::Get, "http://weixin.sogou.com/", &FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled { operation: "HTTP request", .. }));
    }

    #[test]
    fn test_meta_charset_wins_over_header() {
        let (gbk_bytes, _, _) = encoding_rs::GBK.encode("<meta charset=\"gbk\">公众号");
        let (text, encoding) = decode_body(&gbk_bytes, Some("text/html; charset=utf-8"));
        assert_eq!(encoding, "GBK");
        assert!(text.contains("公众号"));
    }

    #[test]
    fn test_pragma_charset() {
        let body = br#"<meta http-equiv="Content-Type" content="text/html;charset=gb2312">"#;
        assert_eq!(sniff_charset(body).as_deref(), Some("gb2312"));
    }

    #[test]
    fn test_header_charset_fallbacks() {
        assert_eq!(
            header_charset(Some("text/html; charset=\"UTF-8\"")).as_deref(),
            Some("UTF-8")
        );
        assert_eq!(header_charset(Some("text/html")).as_deref(), Some("ISO-8859-1"));
        assert_eq!(header_charset(Some("application/json")).as_deref(), Some("utf-8"));
        assert_eq!(header_charset(Some("image/jpeg")), None);
        assert_eq!(header_charset(None), None);
    }

    #[test]
    fn test_undeclared_body_defaults_to_utf8() {
        let (text, encoding) = decode_body("搜狗".as_bytes(), None);
        assert_eq!(text, "搜狗");
        assert_eq!(encoding, "UTF-8");
    }
}
