//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default upper bound for an uploaded spreadsheet (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Storage / Job / Mapping Constants
// ============================================================================

/// Default directory for uploaded files.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default directory for job reports.
pub const DEFAULT_REPORT_DIR: &str = "uploads";

/// Default simulated work per row in milliseconds.
pub const DEFAULT_ROW_DELAY_MS: u64 = 1000;

/// Default number of jobs processed at the same time.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Default number of jobs kept in the job store.
pub const DEFAULT_JOB_MAX_ENTRIES: usize = 1000;

/// Default lifetime of a finished job (24 hours).
pub const DEFAULT_JOB_TTL_SECS: u64 = 86_400;

/// Default idle lifetime of a session (24 hours).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;

/// Default interval between eviction sweeps.
pub const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 300;

/// Default number of rows returned in an upload preview.
pub const DEFAULT_PREVIEW_ROWS: usize = 100;

/// Default columns never summarized in report stats (identity-like fields).
pub const DEFAULT_STATS_EXCLUDED_FIELDS: &str = "id,name,date,email";

/// Default maximum distinct values for a column to get a value breakdown.
pub const DEFAULT_STATS_MAX_DISTINCT: usize = 15;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub storage: StorageConfig,
    pub jobs: JobsConfig,
    pub mapping: MappingConfig,
    pub report: ReportConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Local directories for uploads and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub report_dir: PathBuf,
}

/// Background job settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub row_delay_ms: u64,
    pub max_concurrent_jobs: usize,
    pub max_entries: usize,
    pub ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub eviction_interval_secs: u64,
}

impl JobsConfig {
    pub fn row_delay(&self) -> Duration {
        Duration::from_millis(self.row_delay_ms)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

/// Column mapping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Ordered target fields for fixed-schema mapping; empty disables that mode
    pub fixed_fields: Vec<String>,
    pub preview_rows: usize,
}

/// Report statistics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub stats_excluded_fields: Vec<String>,
    pub stats_max_distinct: usize,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("ROWPILOT_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_parse("ROWPILOT_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_parse(
                    "ROWPILOT_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
                max_upload_bytes: env_parse("ROWPILOT_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            },
            cors: CorsConfig {
                allowed_origins: env_list("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ALLOWED_ORIGIN),
                allow_credentials: env_parse("CORS_ALLOW_CREDENTIALS", true),
            },
            storage: StorageConfig {
                upload_dir: std::env::var("ROWPILOT_UPLOAD_DIR")
                    .unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string())
                    .into(),
                report_dir: std::env::var("ROWPILOT_REPORT_DIR")
                    .unwrap_or_else(|_| DEFAULT_REPORT_DIR.to_string())
                    .into(),
            },
            jobs: JobsConfig {
                row_delay_ms: env_parse("ROWPILOT_ROW_DELAY_MS", DEFAULT_ROW_DELAY_MS),
                max_concurrent_jobs: env_parse(
                    "ROWPILOT_MAX_CONCURRENT_JOBS",
                    DEFAULT_MAX_CONCURRENT_JOBS,
                ),
                max_entries: env_parse("ROWPILOT_JOB_MAX_ENTRIES", DEFAULT_JOB_MAX_ENTRIES),
                ttl_secs: env_parse("ROWPILOT_JOB_TTL_SECS", DEFAULT_JOB_TTL_SECS),
                session_ttl_secs: env_parse(
                    "ROWPILOT_SESSION_TTL_SECS",
                    DEFAULT_SESSION_TTL_SECS,
                ),
                eviction_interval_secs: env_parse(
                    "ROWPILOT_EVICTION_INTERVAL_SECS",
                    DEFAULT_EVICTION_INTERVAL_SECS,
                ),
            },
            mapping: MappingConfig {
                fixed_fields: env_list("ROWPILOT_FIXED_FIELDS", ""),
                preview_rows: env_parse("ROWPILOT_PREVIEW_ROWS", DEFAULT_PREVIEW_ROWS),
            },
            report: ReportConfig {
                stats_excluded_fields: env_list(
                    "ROWPILOT_STATS_EXCLUDED_FIELDS",
                    DEFAULT_STATS_EXCLUDED_FIELDS,
                ),
                stats_max_distinct: env_parse(
                    "ROWPILOT_STATS_MAX_DISTINCT",
                    DEFAULT_STATS_MAX_DISTINCT,
                ),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.jobs.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be greater than 0");
        }

        if self.jobs.max_entries == 0 {
            anyhow::bail!("Job store max_entries must be greater than 0");
        }

        if self.jobs.eviction_interval_secs == 0 {
            anyhow::bail!("eviction_interval_secs must be greater than 0");
        }

        for (index, field) in self.mapping.fixed_fields.iter().enumerate() {
            if self.mapping.fixed_fields[..index].contains(field) {
                anyhow::bail!("Fixed field '{}' is listed more than once", field);
            }
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
                report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            },
            jobs: JobsConfig {
                row_delay_ms: DEFAULT_ROW_DELAY_MS,
                max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
                max_entries: DEFAULT_JOB_MAX_ENTRIES,
                ttl_secs: DEFAULT_JOB_TTL_SECS,
                session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
                eviction_interval_secs: DEFAULT_EVICTION_INTERVAL_SECS,
            },
            mapping: MappingConfig {
                fixed_fields: Vec::new(),
                preview_rows: DEFAULT_PREVIEW_ROWS,
            },
            report: ReportConfig {
                stats_excluded_fields: split_list(DEFAULT_STATS_EXCLUDED_FIELDS),
                stats_max_distinct: DEFAULT_STATS_MAX_DISTINCT,
            },
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    split_list(&std::env::var(key).unwrap_or_else(|_| default.to_string()))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.report.stats_excluded_fields, vec!["id", "name", "date", "email"]);
        assert!(config.mapping.fixed_fields.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.jobs.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_eviction_interval() {
        let mut config = Config::default();
        config.jobs.eviction_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("eviction_interval_secs"));
    }

    #[test]
    fn test_validate_rejects_duplicate_fixed_fields() {
        let mut config = Config::default();
        config.mapping.fixed_fields = vec!["email".to_string(), "email".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_reads_environment() {
        std::env::set_var("ROWPILOT_PORT", "9100");
        std::env::set_var("ROWPILOT_FIXED_FIELDS", "name, email ,,phone");
        std::env::set_var("ROWPILOT_ROW_DELAY_MS", "5");

        let config = Config::load();

        std::env::remove_var("ROWPILOT_PORT");
        std::env::remove_var("ROWPILOT_FIXED_FIELDS");
        std::env::remove_var("ROWPILOT_ROW_DELAY_MS");

        let config = config.unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.mapping.fixed_fields, vec!["name", "email", "phone"]);
        assert_eq!(config.jobs.row_delay(), Duration::from_millis(5));
    }

    #[test]
    fn test_split_list_drops_blanks() {
        assert!(split_list("").is_empty());
        assert_eq!(split_list(" a ,b"), vec!["a", "b"]);
    }
}
