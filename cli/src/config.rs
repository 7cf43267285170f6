use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Args, Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "REACTIONS_API_URL", help = "Base URL of the presentation REST API.")]
    pub api_url: Option<String>,

    #[clap(long, env = "REACTIONS_WS_URL", help = "Base URL of the live channel endpoint (derived from the API URL when omitted).")]
    pub ws_url: Option<String>,

    #[clap(long, env = "REACTIONS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "REACTIONS_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "REACTIONS_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "REACTIONS_REQUEST_TIMEOUT_SECS", help = "Timeout in seconds for each REST call.")]
    pub request_timeout_secs: Option<u64>,

    #[clap(long, env = "REACTIONS_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds between channel reconnect attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[clap(long, env = "REACTIONS_RECONNECT_MAX_DELAY_MS", help = "Maximum delay in milliseconds between channel reconnect attempts.")]
    pub reconnect_max_delay_ms: Option<u64>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            api_url: other.api_url.or(self.api_url),
            ws_url: other.ws_url.or(self.ws_url),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
        }
    }
}

/// Fully resolved settings, after merging defaults, the config file, and
/// environment/CLI overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub ws_url: String,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
}

const DEFAULT_API_URL: &str = "https://presentation-reaction-api.onrender.com";

pub fn load_config(cli_args: Config) -> Settings {
    // 1. Load from config file (reactions.conf) if present.
    //    The CLI arg / env var can override the default file path.
    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("reactions.conf"));

    let mut current_config = Config::default();

    if config_file_path.exists() {
        if let Ok(config_str) = fs::read_to_string(&config_file_path) {
            if let Ok(file_config) = serde_json::from_str::<Config>(&config_str) {
                current_config = current_config.merge(file_config);
            } else {
                eprintln!(
                    "Failed to parse config file: {}. Falling back to other sources.",
                    config_file_path.display()
                );
            }
        } else {
            eprintln!(
                "Failed to read config file: {}. Falling back to other sources.",
                config_file_path.display()
            );
        }
    }

    // 2. Override with environment variables and CLI arguments
    //    (clap has already folded env vars into cli_args).
    current_config = current_config.merge(cli_args);

    // 3. Fill anything still unset with the built-in defaults.
    resolve(current_config)
}

/// Collapses the merged `Option` fields into concrete settings, applying the
/// built-in defaults for anything left unset. The channel URL defaults to
/// the API URL with the scheme swapped to ws(s).
fn resolve(config: Config) -> Settings {
    let api_url = config
        .api_url
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let ws_url = config
        .ws_url
        .unwrap_or_else(|| derive_ws_url(&api_url));

    Settings {
        api_url,
        ws_url,
        log_dir: config.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
        log_level: config.log_level.unwrap_or_else(|| "info".to_string()),
        request_timeout_secs: config.request_timeout_secs.unwrap_or(30),
        reconnect_base_delay_ms: config.reconnect_base_delay_ms.unwrap_or(1000),
        reconnect_max_delay_ms: config.reconnect_max_delay_ms.unwrap_or(60_000),
    }
}

fn derive_ws_url(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        api_url.to_string()
    }
}
