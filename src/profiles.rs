//! Challenge endpoint profiles: where the captcha image lives, how a solution
//! is submitted, and how the reply is read.

use crate::detector::{
    ChallengeDetector, MP_CAPTCHA_PHRASE, SOGOU_CAPTCHA_PHRASE, SOGOU_RATE_LIMIT_PHRASE,
};
use crate::error::{FetchError, Result};
use crate::models::{
    AntispiderReply, ChallengeKind, FetchOptions, UnblockReply, VerifycodeReply,
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Unblock form and reply schema spoken by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnblockProtocol {
    /// `thank.php`: form `{c, r, v}`, reply `{code, msg}`
    Antispider,
    /// `mp/verifycode`: form `{cert, input}`, reply `{ret, errmsg}`
    Verifycode,
}

/// One challenge presentation bound to a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeProfile {
    pub name: String,
    /// Requests to this host are checked against this profile
    pub host: String,
    #[serde(default)]
    pub rate_limit_phrase: Option<String>,
    pub captcha_phrase: String,
    /// Captcha image endpoint, the cache-busting parameter is appended
    pub image_url: String,
    pub unblock_url: String,
    /// OCR image category for this endpoint's captchas
    pub code_type: u32,
    pub protocol: UnblockProtocol,
}

/// A detected challenge awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    pub origin_url: String,
    pub kind: ChallengeKind,
    /// Timestamp token shared by the image fetch and the unblock form
    pub token: String,
}

impl ChallengeProfile {
    /// Sogou search antispider page.
    pub fn sogou_search() -> Self {
        Self {
            name: "sogou-antispider".into(),
            host: "weixin.sogou.com".into(),
            rate_limit_phrase: Some(SOGOU_RATE_LIMIT_PHRASE.into()),
            captcha_phrase: SOGOU_CAPTCHA_PHRASE.into(),
            image_url: "http://weixin.sogou.com/antispider/util/seccode.php".into(),
            unblock_url: "http://weixin.sogou.com/antispider/thank.php".into(),
            code_type: 3060,
            protocol: UnblockProtocol::Antispider,
        }
    }

    /// mp.weixin.qq.com article verify page.
    pub fn mp_article() -> Self {
        Self {
            name: "mp-verifycode".into(),
            host: "mp.weixin.qq.com".into(),
            rate_limit_phrase: None,
            captcha_phrase: MP_CAPTCHA_PHRASE.into(),
            image_url: "http://mp.weixin.qq.com/mp/verifycode".into(),
            unblock_url: "http://mp.weixin.qq.com/mp/verifycode".into(),
            code_type: 2040,
            protocol: UnblockProtocol::Verifycode,
        }
    }

    pub fn detector(&self) -> ChallengeDetector {
        ChallengeDetector::new(self.rate_limit_phrase.clone(), self.captcha_phrase.clone())
    }

    pub fn matches(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
    }

    /// Start resolving a challenge seen on `origin_url`.
    pub fn pending(&self, origin_url: &str, kind: ChallengeKind) -> PendingChallenge {
        let now = chrono::Utc::now();
        let token = match self.protocol {
            UnblockProtocol::Antispider => now.timestamp().to_string(),
            UnblockProtocol::Verifycode => format!(
                "{}.{:03}",
                now.timestamp_millis(),
                now.timestamp_subsec_micros() % 1000
            ),
        };
        PendingChallenge {
            origin_url: origin_url.to_string(),
            kind,
            token,
        }
    }

    pub fn image_url(&self, pending: &PendingChallenge) -> String {
        let param = match self.protocol {
            UnblockProtocol::Antispider => "tc",
            UnblockProtocol::Verifycode => "cert",
        };
        let separator = if self.image_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}={}", self.image_url, separator, param, pending.token)
    }

    /// Options for the captcha image GET.
    pub fn asset_options(&self) -> FetchOptions {
        FetchOptions::new().host(self.host.as_str())
    }

    /// Referer the antispider page would have sent.
    fn antispider_referer(&self, origin_url: &str) -> String {
        let without_scheme = origin_url.strip_prefix("http://").unwrap_or(origin_url);
        format!(
            "http://{}/antispider/?from=%2f{}",
            self.host,
            quote(without_scheme)
        )
    }

    /// Options for the unblock POST carrying `code`.
    pub fn unblock_options(&self, pending: &PendingChallenge, code: &str) -> FetchOptions {
        let options = FetchOptions::new().host(self.host.as_str());
        match self.protocol {
            UnblockProtocol::Antispider => options
                .referer(self.antispider_referer(&pending.origin_url))
                .form_field("c", code)
                .form_field("r", quote(&pending.origin_url))
                .form_field("v", "5"),
            UnblockProtocol::Verifycode => options
                .referer(pending.origin_url.as_str())
                .form_field("cert", pending.token.as_str())
                .form_field("input", code),
        }
    }

    /// Parse the unblock reply as data. Anything off-schema is rejected.
    pub fn parse_unblock_reply(&self, body: &str) -> Result<UnblockReply> {
        let body = body.trim();
        let parsed = match self.protocol {
            UnblockProtocol::Antispider => {
                serde_json::from_str::<AntispiderReply>(body).map(UnblockReply::from)
            }
            UnblockProtocol::Verifycode => {
                serde_json::from_str::<VerifycodeReply>(body).map(UnblockReply::from)
            }
        };
        parsed.map_err(|e| {
            FetchError::MalformedUpstreamResponse(format!(
                "{} unblock reply: {} ({})",
                self.name,
                e,
                excerpt(body)
            ))
        })
    }

    /// Options for re-issuing the original request after an accepted unblock.
    pub fn resend_options(&self, pending: &PendingChallenge, original: &FetchOptions) -> FetchOptions {
        match self.protocol {
            UnblockProtocol::Antispider => original
                .clone()
                .referer(self.antispider_referer(&pending.origin_url)),
            UnblockProtocol::Verifycode => original.clone(),
        }
    }
}

fn excerpt(body: &str) -> &str {
    body.char_indices()
        .nth(200)
        .map(|(i, _)| &body[..i])
        .unwrap_or(body)
}

/// Percent-encode everything except unreserved characters and `/`.
pub fn quote(value: &str) -> String {
    urlencoding::encode(value).replace("%2F", "/")
}
