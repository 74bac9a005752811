use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use scout::analyst::AnalysisConfig;
use scout::harvest::HarvestConfig;
use scout::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use scout::search::SearchConfig;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    /// Optional at startup; requests fail until it is set
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl ProviderSettings {
    /// The provider config, or `None` when no usable API key is configured
    pub fn into_config(self) -> Option<OpenAiProviderConfig> {
        let api_key = self.api_key.filter(|key| !key.trim().is_empty())?;
        Some(OpenAiProviderConfig {
            host: self.host,
            api_key,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub search: SearchConfig,
    pub harvest: HarvestConfig,
    pub analysis: AnalysisConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let search = SearchConfig::default();
        let harvest = HarvestConfig::default();
        let analysis = AnalysisConfig::default();

        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            .set_default("search.host", search.host)?
            .set_default("search.max_results", search.max_results as u64)?
            .set_default("search.blocklist", search.blocklist)?
            .set_default("search.filter_result_urls", search.filter_result_urls)?
            .set_default("harvest.token_budget", harvest.token_budget as u64)?
            .set_default("harvest.tokenizer_model", harvest.tokenizer_model)?
            .set_default("analysis.max_attempts", analysis.max_attempts as u64)?
            .set_default("analysis.retry_delay_ms", analysis.retry_delay_ms)?
            .add_source(
                Environment::with_prefix("SCOUT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // "missing field `host`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8468
}

fn default_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}
