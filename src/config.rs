//! Fetcher configuration.

use crate::error::{FetchError, Result};
use crate::profiles::ChallengeProfile;
use crate::solvers::{ChallengeSolver, RuokuaiConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Desktop browser user agents rotated across requests.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// How challenge images get solved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverStrategy {
    /// Ruokuai OCR service
    Ruokuai(RuokuaiConfig),
    /// Operator types the code on the terminal
    #[default]
    ManualInput,
}

/// Configuration for [`crate::Fetcher`]. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Session identity used for cookies
    pub identity: String,
    pub user_agents: Vec<String>,
    pub default_host: String,
    pub default_referer: String,
    /// Cache directory, the platform cache dir when unset
    pub cache_dir: Option<PathBuf>,
    /// Keep the cache in process memory only
    pub in_memory_cache: bool,
    pub session_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub solver_timeout_secs: u64,
    /// Refuse interactive solving
    pub unattended: bool,
    /// HTTP/SOCKS5 proxy URL
    pub proxy: Option<String>,
    pub solver: SolverStrategy,
    /// Challenge endpoints, the first is used for unknown hosts
    pub profiles: Vec<ChallengeProfile>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            identity: "default".into(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            default_host: "weixin.sogou.com".into(),
            default_referer: "http://weixin.sogou.com/".into(),
            cache_dir: None,
            in_memory_cache: false,
            session_ttl_secs: 3600,
            request_timeout_secs: 30,
            solver_timeout_secs: 120,
            unattended: false,
            proxy: None,
            solver: SolverStrategy::default(),
            profiles: vec![ChallengeProfile::sogou_search(), ChallengeProfile::mp_article()],
        }
    }
}

impl FetcherConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: FetcherConfig = serde_json::from_str(&contents)?;
        tracing::debug!("Loaded config from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn solver_timeout(&self) -> Duration {
        Duration::from_secs(self.solver_timeout_secs)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(crate::cache::CacheStore::default_dir)
    }

    /// Reject combinations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.identity.is_empty() {
            return Err(FetchError::Config("identity must not be empty".into()));
        }
        if self.user_agents.is_empty() {
            return Err(FetchError::Config("user agent pool is empty".into()));
        }
        if self.profiles.is_empty() {
            return Err(FetchError::Config(
                "at least one challenge profile is required".into(),
            ));
        }
        if self.request_timeout_secs == 0 || self.solver_timeout_secs == 0 {
            return Err(FetchError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// Reject a solver that would block on operator input in unattended mode.
    pub fn validate_solver(&self, solver: &ChallengeSolver) -> Result<()> {
        if self.unattended && matches!(solver, ChallengeSolver::Manual(_)) {
            return Err(FetchError::Config(
                "manual captcha input is not allowed in unattended mode".into(),
            ));
        }
        Ok(())
    }
}
