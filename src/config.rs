use crate::gateway::SheetsOptions;
use crate::summary::HttpSummarizerConfig;
use clap::Parser;
use std::path::PathBuf;

/// Attendance register sidecar: newline-delimited JSON requests on stdin,
/// one JSON response per line on stdout.
#[derive(Debug, Clone, Parser)]
#[command(name = "attendanced", version, about)]
pub struct AppConfig {
    /// Local workspace directory holding the attendance database.
    #[arg(long, env = "ATTENDANCED_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Spreadsheet web-app endpoint. Used when no workspace is given.
    #[arg(long, env = "ATTENDANCED_ENDPOINT")]
    pub endpoint: Option<String>,

    /// trace | debug | info | warn | error
    #[arg(long, env = "ATTENDANCED_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Write rotating log files here instead of stderr. Must be absolute.
    #[arg(long, env = "ATTENDANCED_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Timeout for each remote call, in milliseconds.
    #[arg(long, env = "ATTENDANCED_TIMEOUT_MS", default_value_t = 15_000)]
    pub timeout_ms: u32,

    #[arg(long, env = "ATTENDANCED_SUMMARY_ENDPOINT")]
    pub summary_endpoint: Option<String>,

    #[arg(long, env = "ATTENDANCED_SUMMARY_API_KEY", hide_env_values = true)]
    pub summary_api_key: Option<String>,

    #[arg(long, env = "ATTENDANCED_SUMMARY_MODEL", default_value = "gpt-4o-mini")]
    pub summary_model: String,
}

impl AppConfig {
    pub fn sheets_options(&self) -> SheetsOptions {
        SheetsOptions {
            timeout_ms: self.timeout_ms,
            ..SheetsOptions::default()
        }
    }

    /// Summaries are available only with both an endpoint and a key.
    pub fn summarizer_config(&self) -> Option<HttpSummarizerConfig> {
        let endpoint = self.summary_endpoint.as_deref()?.trim();
        let api_key = self.summary_api_key.as_deref()?.trim();
        if endpoint.is_empty() || api_key.is_empty() {
            return None;
        }
        Some(HttpSummarizerConfig {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: self.summary_model.clone(),
            timeout_ms: self.timeout_ms,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            workspace: None,
            endpoint: None,
            log_level: "info".to_string(),
            log_dir: None,
            timeout_ms: 15_000,
            summary_endpoint: None,
            summary_api_key: None,
            summary_model: "gpt-4o-mini".to_string(),
        }
    }
}
