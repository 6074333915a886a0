use clap::{Parser, builder::BoolishValueParser};
use docqa_core::anthropic::{DEFAULT_API_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use docqa_core::service::ServiceConfig;
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DOCS_DIR: &str = "docs";
const DEFAULT_PROMPTS_DIR: &str = "prompts";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";

#[derive(Parser, Debug)]
#[command(name = "docqa-mcpd", version, about = "Documentation question-answering MCP daemon.")]
struct CliArgs {
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "DOCQA_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, env = "DOCQA_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    #[arg(long, env = "DOCQA_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    #[arg(long, env = "DOCQA_DOCS_DIR", default_value = DEFAULT_DOCS_DIR)]
    docs_dir: PathBuf,

    #[arg(long, env = "DOCQA_PROMPTS_DIR", default_value = DEFAULT_PROMPTS_DIR)]
    prompts_dir: PathBuf,

    #[arg(long, env = "DOCQA_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    #[arg(
        long = "http",
        env = "DOCQA_MCP_HTTP",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    http: bool,

    #[arg(
        long = "http-stateless",
        env = "DOCQA_MCP_HTTP_STATELESS",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    http_stateless: bool,

    #[arg(long, env = "DOCQA_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    http_addr: SocketAddr,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Clone)]
pub struct DocQaConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub api_base_url: String,
    pub docs_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub timeout: Duration,
    pub http: bool,
    pub http_stateless: bool,
    pub http_addr: SocketAddr,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl DocQaConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }

    /// The credential is passed through as-is; the service decides whether its
    /// absence is fatal.
    pub fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::new(self.docs_dir.clone(), self.prompts_dir.clone())
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
            .with_api_base_url(self.api_base_url.clone())
            .with_timeout(self.timeout);
        if let Some(api_key) = self.api_key.as_ref() {
            config = config.with_api_key(api_key.clone());
        }
        config
    }
}

impl TryFrom<CliArgs> for DocQaConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let api_key = args.api_key.filter(|value| !value.trim().is_empty());

        if args.model.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "DOCQA_MODEL",
                value: args.model,
            });
        }
        if args.max_tokens == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "DOCQA_MAX_TOKENS",
                value: args.max_tokens.to_string(),
            });
        }
        if args.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "DOCQA_TIMEOUT_SECS",
                value: args.timeout_secs.to_string(),
            });
        }

        Ok(Self {
            api_key,
            model: args.model,
            max_tokens: args.max_tokens,
            api_base_url: args.api_base_url,
            docs_dir: args.docs_dir,
            prompts_dir: args.prompts_dir,
            timeout: Duration::from_secs(args.timeout_secs),
            http: args.http,
            http_stateless: args.http_stateless,
            http_addr: args.http_addr,
        })
    }
}
