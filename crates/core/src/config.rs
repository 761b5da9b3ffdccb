use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

/// Runtime configuration, loaded from defaults, an optional TOML file and
/// `VOLTQUOTE_*` environment overrides, in that order.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub crm: CrmConfig,
    pub whatsapp: WhatsAppConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// CRM access plus the pipeline stage identifiers the wizard needs. Stage ids
/// are opaque values owned by the CRM portal configuration, never constants.
#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub api_token: Option<SecretString>,
    pub base_url: String,
    /// Deal stages whose quotes are shown to the customer.
    pub quote_stage_ids: Vec<String>,
    /// Stage a deal moves to when the customer accepts the quote.
    pub won_stage_id: Option<String>,
    pub mock: bool,
}

impl CrmConfig {
    pub fn is_live(&self) -> bool {
        !self.mock && self.api_token.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub instance_id: Option<String>,
    pub token: Option<SecretString>,
    pub base_url: String,
    pub mock: bool,
}

impl WhatsAppConfig {
    pub fn is_live(&self) -> bool {
        !self.mock && self.token.is_some() && self.instance_id.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub webhook_url: Option<String>,
    pub confirm_webhook_url: Option<String>,
    pub mock: bool,
}

impl WorkflowConfig {
    pub fn is_live(&self) -> bool {
        !self.mock && self.webhook_url.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub crm_api_token: Option<String>,
    pub crm_mock: Option<bool>,
    pub whatsapp_mock: Option<bool>,
    pub workflow_mock: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 5000 },
            crm: CrmConfig {
                api_token: None,
                base_url: "https://api.hubapi.com".to_string(),
                quote_stage_ids: Vec::new(),
                won_stage_id: None,
                mock: false,
            },
            whatsapp: WhatsAppConfig {
                instance_id: None,
                token: None,
                base_url: "https://api.ultramsg.com".to_string(),
                mock: false,
            },
            workflow: WorkflowConfig { webhook_url: None, confirm_webhook_url: None, mock: false },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    crm: Option<CrmPatch>,
    whatsapp: Option<WhatsAppPatch>,
    workflow: Option<WorkflowPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    api_token: Option<String>,
    base_url: Option<String>,
    quote_stage_ids: Option<Vec<String>>,
    won_stage_id: Option<String>,
    mock: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsAppPatch {
    instance_id: Option<String>,
    token: Option<String>,
    base_url: Option<String>,
    mock: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    webhook_url: Option<String>,
    confirm_webhook_url: Option<String>,
    mock: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("voltquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(api_token) = crm.api_token {
                self.crm.api_token = Some(api_token.into());
            }
            if let Some(base_url) = crm.base_url {
                self.crm.base_url = base_url;
            }
            if let Some(quote_stage_ids) = crm.quote_stage_ids {
                self.crm.quote_stage_ids = quote_stage_ids;
            }
            if let Some(won_stage_id) = crm.won_stage_id {
                self.crm.won_stage_id = Some(won_stage_id);
            }
            if let Some(mock) = crm.mock {
                self.crm.mock = mock;
            }
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(instance_id) = whatsapp.instance_id {
                self.whatsapp.instance_id = Some(instance_id);
            }
            if let Some(token) = whatsapp.token {
                self.whatsapp.token = Some(token.into());
            }
            if let Some(base_url) = whatsapp.base_url {
                self.whatsapp.base_url = base_url;
            }
            if let Some(mock) = whatsapp.mock {
                self.whatsapp.mock = mock;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(webhook_url) = workflow.webhook_url {
                self.workflow.webhook_url = Some(webhook_url);
            }
            if let Some(confirm_webhook_url) = workflow.confirm_webhook_url {
                self.workflow.confirm_webhook_url = Some(confirm_webhook_url);
            }
            if let Some(mock) = workflow.mock {
                self.workflow.mock = mock;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VOLTQUOTE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("VOLTQUOTE_SERVER_PORT") {
            self.server.port = parse_u16("VOLTQUOTE_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("VOLTQUOTE_CRM_API_TOKEN") {
            self.crm.api_token = Some(value.into());
        }
        if let Some(value) = read_env("VOLTQUOTE_CRM_BASE_URL") {
            self.crm.base_url = value;
        }
        if let Some(value) = read_env("VOLTQUOTE_CRM_QUOTE_STAGE_IDS") {
            self.crm.quote_stage_ids = split_list(&value);
        }
        if let Some(value) = read_env("VOLTQUOTE_CRM_WON_STAGE_ID") {
            self.crm.won_stage_id = Some(value);
        }
        if let Some(value) = read_env("VOLTQUOTE_CRM_MOCK") {
            self.crm.mock = parse_bool("VOLTQUOTE_CRM_MOCK", &value)?;
        }

        if let Some(value) = read_env("VOLTQUOTE_WHATSAPP_INSTANCE_ID") {
            self.whatsapp.instance_id = Some(value);
        }
        if let Some(value) = read_env("VOLTQUOTE_WHATSAPP_TOKEN") {
            self.whatsapp.token = Some(value.into());
        }
        if let Some(value) = read_env("VOLTQUOTE_WHATSAPP_BASE_URL") {
            self.whatsapp.base_url = value;
        }
        if let Some(value) = read_env("VOLTQUOTE_WHATSAPP_MOCK") {
            self.whatsapp.mock = parse_bool("VOLTQUOTE_WHATSAPP_MOCK", &value)?;
        }

        if let Some(value) = read_env("VOLTQUOTE_WORKFLOW_WEBHOOK_URL") {
            self.workflow.webhook_url = Some(value);
        }
        if let Some(value) = read_env("VOLTQUOTE_WORKFLOW_CONFIRM_WEBHOOK_URL") {
            self.workflow.confirm_webhook_url = Some(value);
        }
        if let Some(value) = read_env("VOLTQUOTE_WORKFLOW_MOCK") {
            self.workflow.mock = parse_bool("VOLTQUOTE_WORKFLOW_MOCK", &value)?;
        }

        if let Some(value) = read_env("VOLTQUOTE_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("VOLTQUOTE_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(crm_api_token) = overrides.crm_api_token {
            self.crm.api_token = Some(crm_api_token.into());
        }
        if let Some(crm_mock) = overrides.crm_mock {
            self.crm.mock = crm_mock;
        }
        if let Some(whatsapp_mock) = overrides.whatsapp_mock {
            self.whatsapp.mock = whatsapp_mock;
        }
        if let Some(workflow_mock) = overrides.workflow_mock {
            self.workflow.mock = workflow_mock;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation("server.bind_address must not be empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must not be zero".into()));
        }
        if self.crm.is_live() {
            if self.crm.quote_stage_ids.is_empty() {
                return Err(ConfigError::Validation(
                    "crm.quote_stage_ids is required when the CRM client is live".into(),
                ));
            }
            if self.crm.won_stage_id.is_none() {
                return Err(ConfigError::Validation(
                    "crm.won_stage_id is required when the CRM client is live".into(),
                ));
            }
        }
        if !self.whatsapp.mock && self.whatsapp.token.is_some() && self.whatsapp.instance_id.is_none()
        {
            return Err(ConfigError::Validation(
                "whatsapp.instance_id is required when a whatsapp token is configured".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("voltquote.toml"), PathBuf::from("config/voltquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.into() })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.into() }),
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    #[test]
    fn defaults_are_valid_and_mockable() {
        let config = AppConfig::default();

        assert!(config.validate().is_ok());
        assert!(!config.crm.is_live());
        assert!(!config.whatsapp.is_live());
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn live_crm_requires_stage_configuration() {
        let mut config = AppConfig::default();
        config.crm.api_token = Some("pat-eu1-test".to_string().into());

        let error = config.validate().expect_err("stage ids missing");
        assert!(matches!(error, ConfigError::Validation(_)));

        config.crm.quote_stage_ids = vec!["stage-open".to_string(), "stage-won".to_string()];
        config.crm.won_stage_id = Some("stage-won".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_take_precedence_over_defaults() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                crm_mock: Some(true),
                whatsapp_mock: Some(true),
                log_level: Some("debug".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("load should succeed");

        assert!(config.crm.mock);
        assert!(config.whatsapp.mock);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }
}
