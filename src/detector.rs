//! Challenge detection on response bodies.

use crate::models::ChallengeKind;

/// Rate-limit notice shown by the Sogou antispider page.
pub const SOGOU_RATE_LIMIT_PHRASE: &str =
    "用户您好，您的访问过于频繁，为确认本次访问为正常用户行为，需要您协助验证";

/// Captcha prompt shown by the Sogou antispider page.
pub const SOGOU_CAPTCHA_PHRASE: &str = "为了您的安全请输入验证码";

/// Captcha prompt shown by mp.weixin.qq.com article pages.
pub const MP_CAPTCHA_PHRASE: &str = "为了保护你的网络安全，请输入验证码";

/// Classifies response bodies by fixed marker phrases.
///
/// The rate-limit phrase is checked first, so a page carrying both markers
/// is reported as [`ChallengeKind::RateLimited`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeDetector {
    rate_limit_phrase: Option<String>,
    captcha_phrase: String,
}

impl ChallengeDetector {
    pub fn new(rate_limit_phrase: Option<String>, captcha_phrase: impl Into<String>) -> Self {
        Self {
            rate_limit_phrase: rate_limit_phrase.filter(|phrase| !phrase.is_empty()),
            captcha_phrase: captcha_phrase.into(),
        }
    }

    /// Detector for Sogou search pages.
    pub fn sogou() -> Self {
        Self::new(
            Some(SOGOU_RATE_LIMIT_PHRASE.to_string()),
            SOGOU_CAPTCHA_PHRASE,
        )
    }

    /// Detector for mp.weixin.qq.com article pages.
    pub fn mp_article() -> Self {
        Self::new(None, MP_CAPTCHA_PHRASE)
    }

    pub fn classify(&self, body: &str) -> ChallengeKind {
        if let Some(phrase) = &self.rate_limit_phrase {
            if body.contains(phrase.as_str()) {
                return ChallengeKind::RateLimited;
            }
        }
        if !self.captcha_phrase.is_empty() && body.contains(self.captcha_phrase.as_str()) {
            return ChallengeKind::CaptchaRequired;
        }
        ChallengeKind::None
    }
}
