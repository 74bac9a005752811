use scout::analyst::AnalysisConfig;
use scout::providers::configs::OpenAiProviderConfig;
use scout::tools::Researcher;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// `None` until an API key is configured
    pub provider_config: Option<OpenAiProviderConfig>,
    pub researcher: Arc<dyn Researcher>,
    pub analysis: AnalysisConfig,
}
