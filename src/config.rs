use clap::{Args, Parser, Subcommand, ValueEnum};
use phonenumber::country;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub gateway: GatewayConfig,

    #[command(flatten)]
    pub dispatch: DispatchConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Load a recipient file and report how many valid numbers it holds
    Load(SourceArgs),

    /// Send a text message to every recipient in the file
    Text {
        #[command(flatten)]
        source: SourceArgs,

        /// Message body
        #[arg(long, short)]
        message: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Send an image with an optional caption to every recipient in the file
    Image {
        #[command(flatten)]
        source: SourceArgs,

        /// Image file to send
        #[arg(long, short)]
        image: PathBuf,

        /// Caption shown under the image
        #[arg(long, short, default_value = "")]
        caption: String,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Clone, Debug, Args)]
pub struct SourceArgs {
    /// Delimited recipient file with a header row
    #[arg(long, short)]
    pub file: PathBuf,

    /// Field delimiter; values starting with ';' or ',' are honored, anything else falls back to ';'
    #[arg(long, short, default_value = ";")]
    pub delimiter: String,
}

#[derive(Clone, Debug, Args)]
pub struct OutputArgs {
    /// Write the per-recipient dispatch report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct GatewayConfig {
    /// Sender phone number id registered with the Cloud API
    #[arg(long, env = "WA_PHONE_ID")]
    pub phone_id: Option<String>,

    /// Access token for the Cloud API
    #[arg(long, env = "WA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Graph API base URL
    #[arg(long, env = "MASS_DISPATCH_API_BASE_URL", default_value = "https://graph.facebook.com")]
    pub base_url: String,

    /// Graph API version segment
    #[arg(long, env = "MASS_DISPATCH_API_VERSION", default_value = "v21.0")]
    pub api_version: String,

    /// Timeout for a single gateway request in seconds
    #[arg(long, env = "MASS_DISPATCH_API_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl GatewayConfig {
    /// Returns the credential pair only when both halves are present and non-blank.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        let phone_id = self.phone_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let token = self.token.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(Credentials { phone_id: phone_id.to_string(), token: token.to_string() })
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub phone_id: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("phone_id", &self.phone_id).field("token", &"<redacted>").finish()
    }
}

#[derive(Clone, Debug, Args)]
pub struct DispatchConfig {
    /// Fixed pause between two consecutive sends in milliseconds
    #[arg(long, env = "MASS_DISPATCH_SEND_DELAY_MS", default_value_t = 2000)]
    pub send_delay_ms: u64,

    /// Maximum message or caption length in characters
    #[arg(long, env = "MASS_DISPATCH_MAX_MESSAGE_LEN", default_value_t = 500)]
    pub max_message_len: usize,

    /// Region used to resolve numbers written without a country prefix
    #[arg(long, env = "MASS_DISPATCH_DEFAULT_REGION", default_value = "BR", value_parser = parse_region)]
    pub default_region: country::Id,
}

impl DispatchConfig {
    #[must_use]
    pub const fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { send_delay_ms: 2000, max_message_len: 500, default_region: country::Id::BR }
    }
}

fn parse_region(value: &str) -> Result<country::Id, String> {
    value.trim().to_uppercase().parse::<country::Id>().map_err(|_| format!("unknown region code: {value}"))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "MASS_DISPATCH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
