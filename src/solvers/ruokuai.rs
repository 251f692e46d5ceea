//! Ruokuai OCR provider.

use super::OcrProvider;
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use wreq::multipart::{Form, Part};
use wreq::Client;
use serde::{Deserialize, Serialize};

const CREATE_URL: &str = "http://api.ruokuai.com/create.json";

fn default_timeout_secs() -> u32 {
    60
}

/// Account credentials for the Ruokuai service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuokuaiConfig {
    pub username: String,
    pub password: String,
    pub soft_id: String,
    pub soft_key: String,
    /// Server-side recognition timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
}

/// Client for `create.json`.
#[derive(Debug, Clone)]
pub struct RuokuaiClient {
    client: Client,
    username: String,
    password_md5: String,
    soft_id: String,
    soft_key: String,
    timeout_secs: u32,
}

impl RuokuaiClient {
    pub fn new(config: &RuokuaiConfig) -> Result<Self> {
        if config.username.is_empty() || config.soft_id.is_empty() {
            return Err(FetchError::Config(
                "ruokuai requires username and soft_id".into(),
            ));
        }

        Ok(Self {
            client: Client::builder().build()?,
            username: config.username.clone(),
            password_md5: password_digest(&config.password),
            soft_id: config.soft_id.clone(),
            soft_key: config.soft_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

/// The service expects the MD5 hex digest instead of the plain password.
fn password_digest(password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the recognized text from a `create.json` reply.
fn parse_reply(body: &str) -> Result<String> {
    let reply: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        FetchError::SolverUnavailable(format!("ruokuai returned non-JSON reply: {}", e))
    })?;

    if let Some(result) = reply.get("Result").and_then(|v| v.as_str()) {
        return Ok(result.to_string());
    }

    if let Some(error) = reply.get("Error").and_then(|v| v.as_str()) {
        let code = reply
            .get("Error_Code")
            .map(|v| v.to_string())
            .unwrap_or_default();
        return Err(FetchError::SolverUnavailable(format!(
            "ruokuai rejected image: {} (code {})",
            error, code
        )));
    }

    Err(FetchError::SolverUnavailable(
        "ruokuai reply is missing the Result field".into(),
    ))
}

#[async_trait]
impl OcrProvider for RuokuaiClient {
    fn name(&self) -> &'static str {
        "ruokuai"
    }

    async fn recognize(&self, image: &[u8], code_type: u32) -> Result<String> {
        let form = Form::new()
            .text("username", self.username.clone())
            .text("password", self.password_md5.clone())
            .text("softid", self.soft_id.clone())
            .text("softkey", self.soft_key.clone())
            .text("typeid", code_type.to_string())
            .text("timeout", self.timeout_secs.to_string())
            .part("image", Part::bytes(image.to_vec()).file_name("a.jpg"));

        let body = async {
            self.client
                .post(CREATE_URL)
                .header("User-Agent", "ben")
                .multipart(form)
                .send()
                .await?
                .text()
                .await
        }
        .await
        .map_err(|e| FetchError::SolverUnavailable(format!("ruokuai unreachable: {}", e)))?;

        let result = parse_reply(&body)?;
        tracing::debug!("ruokuai recognized {} characters (type {})", result.len(), code_type);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_digest() {
        assert_eq!(
            password_digest("password"),
            "5f4dcc3b5aa765d61d8327deb882cf99"
        );
    }

    #[test]
    fn test_parse_success() {
        let result = parse_reply(r#"{"Result": "k7xq", "Id": "abc"}"#).unwrap();
        assert_eq!(result, "k7xq");
    }

    #[test]
    fn test_parse_rejection() {
        let err = parse_reply(r#"{"Error": "快豆不足", "Error_Code": "10003"}"#).unwrap_err();
        match err {
            FetchError::SolverUnavailable(message) => {
                assert!(message.contains("快豆不足"));
                assert!(message.contains("10003"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_reply(r#"{"Id": "abc"}"#),
            Err(FetchError::SolverUnavailable(_))
        ));
        assert!(matches!(
            parse_reply("<html>502</html>"),
            Err(FetchError::SolverUnavailable(_))
        ));
    }

    #[test]
    fn test_config_defaults_timeout() {
        let config: RuokuaiConfig = serde_json::from_str(
            r#"{"username": "u", "password": "p", "soft_id": "1", "soft_key": "k"}"#,
        )
        .unwrap();
        assert_eq!(config.timeout_secs, 60);
    }
}
