pub mod index;
pub mod ingestion;
pub mod library;
pub mod query;

use common::{
    protocol::{CorpusResponse, StatusResponse},
    storage::types::document::CorpusInfo,
};
use serde::Serialize;
use tracing::warn;

use crate::html_state::HtmlState;

/// Connection and corpus state shown next to every page.
#[derive(Debug, Serialize)]
pub struct Sidebar {
    pub api_connected: bool,
    /// Project id and bucket are both set on the API side.
    pub configured: bool,
    pub status: Option<StatusResponse>,
    pub corpus: Option<CorpusInfo>,
}

impl Sidebar {
    pub async fn load(state: &HtmlState) -> Self {
        let (status, corpus) = tokio::join!(state.backend.status(), state.backend.corpus());

        let status = match status {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("API status unavailable: {}", e);
                None
            }
        };
        let corpus = match corpus {
            Ok(CorpusResponse::Active(info)) => Some(info),
            Ok(CorpusResponse::Inactive { .. }) | Err(_) => None,
        };

        Self {
            api_connected: status.is_some(),
            configured: status.as_ref().is_some_and(StatusResponse::is_configured),
            status,
            corpus,
        }
    }
}
