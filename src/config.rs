// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use ed25519_dalek::VerifyingKey;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord application (client) id.
    pub application_id: String,
    /// Key used to verify interaction request signatures.
    pub public_key: VerifyingKey,
    /// Bot token for outbound REST calls.
    pub bot_token: String,
    /// The single server this bot manages.
    pub guild_id: String,
    /// Directory holding `data.json`.
    pub data_dir: PathBuf,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Where character portraits are hosted, if anywhere.
    pub media_base_url: Option<Url>,
    /// Release scoring sessions idle this long. `None` keeps them until ended.
    pub panel_idle_timeout: Option<Duration>,
    /// Discord REST base URL.
    pub api_base: String,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Required environment variables:
    /// - `DISCORD_APPLICATION_ID`
    /// - `DISCORD_PUBLIC_KEY` - hex-encoded ed25519 public key
    /// - `DISCORD_BOT_TOKEN`
    /// - `GUILD_ID`
    ///
    /// Optional:
    /// - `DATA_DIR` - data directory (default: `data`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `MEDIA_BASE_URL` - base URL for character portraits
    /// - `PANEL_IDLE_TIMEOUT_SECS` - idle timeout for scoring sessions
    /// - `DISCORD_API_BASE` - REST base (default: `https://discord.com/api/v10`)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    pub fn load() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |name| std::env::var(name).ok())
    }

    /// Build from explicit sources; `env` returns `None` for unset variables.
    pub fn from_sources(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            env(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let application_id = required("DISCORD_APPLICATION_ID")?;
        let public_key = parse_public_key(&required("DISCORD_PUBLIC_KEY")?)?;
        let bot_token = required("DISCORD_BOT_TOKEN")?;
        let guild_id = required("GUILD_ID")?;

        let data_dir = env("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let media_base_url = env("MEDIA_BASE_URL")
            .map(|raw| {
                // Joining relies on a trailing slash.
                let raw = if raw.ends_with('/') { raw } else { format!("{raw}/") };
                Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    name: "MEDIA_BASE_URL",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let panel_idle_timeout = env("PANEL_IDLE_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigError::Invalid {
                        name: "PANEL_IDLE_TIMEOUT_SECS",
                        reason: e.to_string(),
                    })
            })
            .transpose()?
            .filter(|d| !d.is_zero());

        let api_base = env("DISCORD_API_BASE")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Config {
            application_id,
            public_key,
            bot_token,
            guild_id,
            data_dir,
            port,
            media_base_url,
            panel_idle_timeout,
            api_base,
        })
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

fn parse_public_key(raw: &str) -> Result<VerifyingKey, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: "DISCORD_PUBLIC_KEY",
        reason,
    };
    let bytes = hex::decode(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| invalid(format!("expected 32 bytes, got {}", b.len())))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| invalid(e.to_string()))
}
