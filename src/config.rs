use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const SESSION_FILE_NAME: &str = "session.json";
const APP_DIR: &str = "admin-console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub api_base_url: String,
    pub session_file: PathBuf,
    pub request_timeout_secs: u64,
}

impl ConsoleConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            api_url: cli_api_url,
            session_file: cli_session_file,
            timeout_secs: cli_timeout_secs,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            api_base_url: file_api_url,
            session_file: file_session_file,
            request_timeout_secs: file_timeout_secs,
        } = file_config;

        let api_base_url = cli_api_url
            .or(file_api_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .context("no API base URL configured; pass --api-url or set ADMIN_CONSOLE_API_URL")?;

        let session_file = cli_session_file
            .or(file_session_file)
            .unwrap_or_else(default_session_file);

        let request_timeout_secs = cli_timeout_secs
            .or(file_timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            api_base_url,
            session_file,
            request_timeout_secs,
        })
    }

    /// Fail-fast checks run before any request is made.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api_base_url)
            .with_context(|| format!("invalid API base URL {:?}", self.api_base_url))?;
        anyhow::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "API base URL must use http or https, got {:?}",
            url.scheme()
        );
        anyhow::ensure!(
            self.request_timeout_secs > 0,
            "request timeout must be at least one second"
        );
        anyhow::ensure!(
            self.session_file.file_name().is_some(),
            "session file {:?} is not a file path",
            self.session_file
        );
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `$XDG_CONFIG_HOME/admin-console/session.json`, falling back to
/// `$HOME/.config/...` and finally the working directory.
pub fn default_session_file() -> PathBuf {
    let base = env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            env::var_os("HOME")
                .filter(|v| !v.is_empty())
                .map(|home| PathBuf::from(home).join(".config"))
        });
    match base {
        Some(dir) => dir.join(APP_DIR).join(SESSION_FILE_NAME),
        None => PathBuf::from(format!(".{APP_DIR}")).join(SESSION_FILE_NAME),
    }
}

#[derive(Parser, Debug, Default, Clone)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "ADMIN_CONSOLE_API_URL",
        value_name = "URL",
        help = "Base URL of the admin REST API",
        global = true
    )]
    pub api_url: Option<String>,

    #[arg(
        long,
        env = "ADMIN_CONSOLE_SESSION_FILE",
        value_name = "FILE",
        help = "Where the session token is stored",
        global = true
    )]
    pub session_file: Option<PathBuf>,

    #[arg(
        long,
        env = "ADMIN_CONSOLE_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Per-request timeout in seconds",
        value_parser = clap::value_parser!(u64),
        global = true
    )]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    #[serde(alias = "api_url")]
    api_base_url: Option<String>,
    session_file: Option<PathBuf>,
    #[serde(alias = "timeout_secs")]
    request_timeout_secs: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
