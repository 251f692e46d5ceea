//! Data models shared by the fetch layer.

use serde::{Deserialize, Serialize};

/// Classification of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Normal content
    None,
    /// "Too many requests" notice, no automated remedy
    RateLimited,
    /// Image captcha that can be submitted to the unblock endpoint
    CaptchaRequired,
}

impl ChallengeKind {
    /// Returns the string representation used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeKind::None => "none",
            ChallengeKind::RateLimited => "rate_limited",
            ChallengeKind::CaptchaRequired => "captcha_required",
        }
    }

    pub fn is_challenge(&self) -> bool {
        !matches!(self, ChallengeKind::None)
    }
}

impl std::fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP methods the fetch layer issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Override for a header the session client fills in by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HeaderOverride {
    /// Use the configured default
    #[default]
    Default,
    /// Send no header at all
    Omit,
    /// Send this value
    Value(String),
}

impl HeaderOverride {
    /// Resolve against a default, `None` meaning "do not send".
    pub fn resolve<'a>(&'a self, default: &'a str) -> Option<&'a str> {
        match self {
            HeaderOverride::Default => Some(default),
            HeaderOverride::Omit => None,
            HeaderOverride::Value(value) => Some(value.as_str()),
        }
    }
}

impl From<&str> for HeaderOverride {
    fn from(value: &str) -> Self {
        HeaderOverride::Value(value.to_string())
    }
}

impl From<String> for HeaderOverride {
    fn from(value: String) -> Self {
        HeaderOverride::Value(value)
    }
}

/// Per-request options supplied by callers.
///
/// # Examples
/// ```ignore
/// let options = FetchOptions::new()
///     .host("mp.weixin.qq.com")
///     .referer(article_url);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub host: HeaderOverride,
    pub referer: HeaderOverride,
    /// Extra headers appended after the defaults
    pub headers: Vec<(String, String)>,
    /// Form fields for POST requests
    pub form: Vec<(String, String)>,
    /// JSON body for POST requests, takes precedence over `form`
    pub json: Option<serde_json::Value>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<HeaderOverride>) -> Self {
        self.host = host.into();
        self
    }

    pub fn without_host(mut self) -> Self {
        self.host = HeaderOverride::Omit;
        self
    }

    pub fn referer(mut self, referer: impl Into<HeaderOverride>) -> Self {
        self.referer = referer.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// Decoded response returned by the session client.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub text: String,
    /// Name of the encoding the body was decoded with
    pub encoding: &'static str,
}

/// Site-issued tokens derived from a previously fetched page.
///
/// Fields are empty when the page did not carry them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub uin: String,
    pub key: String,
    pub biz: String,
    pub pass_ticket: String,
    pub msgid: String,
}

/// Sogou search result types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// Official account search
    Account,
    /// Article search
    Article,
}

impl SearchKind {
    /// Value of the `type` query parameter.
    pub fn type_code(&self) -> u8 {
        match self {
            SearchKind::Account => 1,
            SearchKind::Article => 2,
        }
    }
}

/// Reply from the antispider `thank.php` endpoint.
#[derive(Debug, Deserialize)]
pub struct AntispiderReply {
    #[serde(deserialize_with = "deserialize_int_or_string")]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

/// Reply from the article `verifycode` endpoint.
#[derive(Debug, Deserialize)]
pub struct VerifycodeReply {
    #[serde(deserialize_with = "deserialize_int_or_string")]
    pub ret: i64,
    #[serde(default)]
    pub errmsg: String,
}

/// Normalized unblock outcome, `status == 0` means accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnblockReply {
    pub status: i64,
    pub message: String,
}

impl UnblockReply {
    pub fn accepted(&self) -> bool {
        self.status == 0
    }
}

impl From<AntispiderReply> for UnblockReply {
    fn from(reply: AntispiderReply) -> Self {
        Self {
            status: reply.code,
            message: reply.msg,
        }
    }
}

impl From<VerifycodeReply> for UnblockReply {
    fn from(reply: VerifycodeReply) -> Self {
        Self {
            status: reply.ret,
            message: reply.errmsg,
        }
    }
}

/// `base_resp` block carried by mp.weixin.qq.com JSON APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseResp {
    #[serde(deserialize_with = "deserialize_int_or_string")]
    pub ret: i64,
    #[serde(default)]
    pub errmsg: String,
}

/// Helper to deserialize status codes that arrive as either integers or strings
fn deserialize_int_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct IntOrStringVisitor;

    impl<'de> Visitor<'de> for IntOrStringVisitor {
        type Value = i64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an integer or a string holding an integer")
        }

        fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v)
        }

        fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E>
        where
            E: de::Error,
        {
            i64::try_from(v).map_err(|_| E::custom(format!("status code out of range: {}", v)))
        }

        fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
        where
            E: de::Error,
        {
            v.trim()
                .parse()
                .map_err(|_| E::custom(format!("not an integer status code: {:?}", v)))
        }
    }

    deserializer.deserialize_any(IntOrStringVisitor)
}
