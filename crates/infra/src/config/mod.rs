//! Runtime configuration for the portal integrations and the local store.
//!
//! Compiled defaults match the upstream portal deployment; every value can
//! be overridden through `CAMPLINE_*` environment variables (a `.env` file is
//! honoured at load time). Base URLs are configurable mainly so tests can
//! point the clients at a mock server.

use std::env;
use std::time::Duration;

use campline_domain::{CamplineError, Result};
use chrono::NaiveDate;

/// First portal: the CAS-protected teaching-schedule application.
#[derive(Debug, Clone)]
pub struct CampusConfig {
    /// Base URL of the portal application API, up to and including `/jwapp/sys`.
    pub api_base_url: String,
    /// Host of the SSO server; a redirect to this host means the session has
    /// been invalidated server-side.
    pub sso_host: String,
    /// Referer sent with data calls; the portal rejects some requests
    /// without it.
    pub referer: String,
    pub request_timeout: Duration,
    /// The credential submit sometimes takes longer than plain data calls.
    pub submit_timeout: Duration,
}

impl Default for CampusConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://byxt.buaa.edu.cn/jwapp/sys".to_string(),
            sso_host: "sso.buaa.edu.cn".to_string(),
            referer: "https://byxt.buaa.edu.cn/jwapp/sys/homeapp/home/index.html".to_string(),
            request_timeout: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(15),
        }
    }
}

impl CampusConfig {
    /// Daily schedule endpoint for a query date.
    pub fn schedule_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/homeapp/api/home/teachingSchedule/detail.do?rq={}&lxdm=student",
            self.api_base_url,
            date.format("%Y-%m-%d")
        )
    }

    /// Exam listing endpoint for a term code.
    pub fn exam_url(&self, term_code: &str) -> String {
        format!("{}/homeapp/api/home/student/exams.do?termCode={}", self.api_base_url, term_code)
    }
}

/// Second portal: the AES-envelope course-work application.
#[derive(Debug, Clone)]
pub struct SpocConfig {
    pub base_url: String,
    /// SSO login endpoint used when the probe gives no redirect to follow.
    pub sso_login_url: String,
    /// 16-byte AES key shared with the portal frontend.
    pub aes_key: [u8; 16],
    /// 16-byte AES IV shared with the portal frontend.
    pub aes_iv: [u8; 16],
    /// Fixed query id used to resolve the dynamic one.
    pub bootstrap_sqlid: String,
    /// Fallback when the dynamic query id cannot be resolved.
    pub default_query_id: String,
    /// Submission-state filter sent with homework queries.
    pub homework_filter: String,
    /// Cap on the manual redirect walk after the SSO submit.
    pub redirect_hop_limit: usize,
    pub page_size: u32,
    /// Safety cap on homework pagination.
    pub max_pages: u32,
    pub request_timeout: Duration,
}

impl Default for SpocConfig {
    fn default() -> Self {
        Self {
            base_url: "https://spoc.buaa.edu.cn".to_string(),
            sso_login_url: "https://sso.buaa.edu.cn/login".to_string(),
            aes_key: *b"pQc7VmXz4Rt1KbNa",
            aes_iv: *b"Yx8vQw2LtPz5JmDr",
            bootstrap_sqlid: "spoc.sys.getQueryId".to_string(),
            default_query_id: "spocHomeworkList".to_string(),
            homework_filter: "1".to_string(),
            redirect_hop_limit: 10,
            page_size: 100,
            max_pages: 20,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl SpocConfig {
    /// Probe endpoint that answers only for authenticated sessions.
    pub fn login_check_url(&self) -> String {
        format!("{}/spoc/api/user/current", self.base_url)
    }

    /// Service URL handed to the SSO server so the callback lands on this
    /// portal rather than the first one.
    pub fn service_url(&self) -> String {
        format!("{}/spoc/cas/callback", self.base_url)
    }

    /// Init document carrying the `initData_props` continuation value.
    pub fn init_url(&self) -> String {
        format!("{}/spoc/api/app/init", self.base_url)
    }

    /// Encrypted RPC endpoint for both query-id resolution and data pages.
    pub fn rpc_url(&self) -> String {
        format!("{}/spoc/api/data/query", self.base_url)
    }

    pub fn referer(&self) -> String {
        format!("{}/spoc/index.html", self.base_url)
    }
}

/// Local SQLite store settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "campline.db".to_string(), pool_size: 5 }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub campus: CampusConfig,
    pub spoc: SpocConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration: defaults, then `.env`, then process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(value) = env::var("CAMPLINE_CAMPUS_BASE_URL") {
            config.campus.api_base_url = value;
        }
        if let Ok(value) = env::var("CAMPLINE_SSO_HOST") {
            config.campus.sso_host = value;
        }
        if let Ok(value) = env::var("CAMPLINE_CAMPUS_REFERER") {
            config.campus.referer = value;
        }
        if let Ok(value) = env::var("CAMPLINE_SPOC_BASE_URL") {
            config.spoc.base_url = value;
        }
        if let Ok(value) = env::var("CAMPLINE_SPOC_AES_KEY") {
            config.spoc.aes_key = parse_aes_material("CAMPLINE_SPOC_AES_KEY", &value)?;
        }
        if let Ok(value) = env::var("CAMPLINE_SPOC_AES_IV") {
            config.spoc.aes_iv = parse_aes_material("CAMPLINE_SPOC_AES_IV", &value)?;
        }
        if let Ok(value) = env::var("CAMPLINE_DB_PATH") {
            config.database.path = value;
        }
        if let Ok(value) = env::var("CAMPLINE_DB_POOL_SIZE") {
            config.database.pool_size = value.parse().map_err(|_| {
                CamplineError::Config(format!("CAMPLINE_DB_POOL_SIZE is not a number: {value}"))
            })?;
        }

        Ok(config)
    }
}

fn parse_aes_material(name: &str, value: &str) -> Result<[u8; 16]> {
    let bytes = value.as_bytes();
    bytes.try_into().map_err(|_| {
        CamplineError::Config(format!(
            "{name} must be exactly 16 bytes, got {}",
            bytes.len()
        ))
    })
}
