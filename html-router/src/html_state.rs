use std::sync::Arc;

use common::{error::AppError, utils::config::AppConfig};
use tracing::debug;

use crate::{backend::BackendClient, template_engine::TemplateEngine};

#[derive(Clone)]
pub struct HtmlState {
    pub templates: Arc<TemplateEngine>,
    pub backend: BackendClient,
    pub config: AppConfig,
}

impl HtmlState {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let backend = BackendClient::from_config(&config)?;
        Ok(Self::new_with_resources(config, backend, None))
    }

    pub fn new_with_resources(
        config: AppConfig,
        backend: BackendClient,
        template_engine: Option<Arc<TemplateEngine>>,
    ) -> Self {
        let templates = template_engine.unwrap_or_else(|| Arc::new(TemplateEngine::new()));
        debug!(api = %backend.base_url(), "Template engine configured for html_router.");

        Self {
            templates,
            backend,
            config,
        }
    }
}
