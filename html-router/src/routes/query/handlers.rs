use axum::{extract::State, response::IntoResponse, Form};
use axum_htmx::HxRequest;
use common::{
    error::AppError,
    protocol::{QueryRequest, QueryResponse},
};
use serde::{Deserialize, Serialize};

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, TemplateResponse},
    routes::Sidebar,
};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PromptPreset {
    pub key: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const PROMPT_PRESETS: &[PromptPreset] = &[
    PromptPreset {
        key: "analytical",
        label: "Analytical",
        prompt: "You are an analytical assistant. Provide detailed, structured responses with clear reasoning and evidence from the documents.",
    },
    PromptPreset {
        key: "concise",
        label: "Concise",
        prompt: "You are a concise assistant. Provide brief, direct answers while staying accurate to the document content.",
    },
    PromptPreset {
        key: "technical",
        label: "Technical Expert",
        prompt: "You are a technical expert. Focus on technical details, specifications, and provide in-depth explanations.",
    },
    PromptPreset {
        key: "summarizer",
        label: "Summarizer",
        prompt: "You are a summarization expert. Extract and present key information in a well-organized summary format.",
    },
    PromptPreset {
        key: "qa",
        label: "Q&A Assistant",
        prompt: "You are a helpful Q&A assistant. Answer questions directly and cite specific sections from the documents when possible.",
    },
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelChoice {
    pub id: &'static str,
    pub label: &'static str,
}

/// Offered in the model select. An empty choice leaves the server default.
pub const MODEL_CHOICES: &[ModelChoice] = &[
    ModelChoice {
        id: "gemini-2.0-flash-001",
        label: "Gemini 2.0 Flash",
    },
    ModelChoice {
        id: "gemini-2.5-flash-preview-05-20",
        label: "Gemini 2.5 Flash Preview",
    },
    ModelChoice {
        id: "gemini-1.5-pro",
        label: "Gemini 1.5 Pro",
    },
    ModelChoice {
        id: "gemini-1.5-flash",
        label: "Gemini 1.5 Flash",
    },
];

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct QueryForm {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub top_k: String,
    #[serde(default)]
    pub distance_threshold: String,
    #[serde(default)]
    pub preset: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub model: String,
}

impl QueryForm {
    /// A typed custom prompt wins over the selected preset. Numbers that do
    /// not parse are left out so the API applies its defaults.
    pub fn to_request(&self) -> QueryRequest {
        let custom = self.system_prompt.trim();
        let system_prompt = if custom.is_empty() {
            PROMPT_PRESETS
                .iter()
                .find(|p| p.key == self.preset)
                .map(|p| p.prompt.to_string())
        } else {
            Some(custom.to_string())
        };

        QueryRequest {
            query: self.query.clone(),
            top_k: self.top_k.trim().parse().ok(),
            distance_threshold: self.distance_threshold.trim().parse().ok(),
            system_prompt,
            model: Some(self.model.trim())
                .filter(|model| !model.is_empty())
                .map(String::from),
        }
    }
}

#[derive(Serialize)]
struct QueryPageData {
    sidebar: Option<Sidebar>,
    presets: &'static [PromptPreset],
    models: &'static [ModelChoice],
    default_model: String,
    form: QueryForm,
    default_top_k: u32,
    default_distance_threshold: f64,
    result: Option<QueryResponse>,
    error: Option<String>,
}

pub async fn show_query_page(State(state): State<HtmlState>) -> Result<impl IntoResponse, HtmlError> {
    let sidebar = Sidebar::load(&state).await;

    Ok(TemplateResponse::new_template(
        "query/query.html",
        QueryPageData {
            sidebar: Some(sidebar),
            presets: PROMPT_PRESETS,
            models: MODEL_CHOICES,
            default_model: state.config.gen_model.clone(),
            form: QueryForm::default(),
            default_top_k: state.config.top_k,
            default_distance_threshold: state.config.distance_threshold,
            result: None,
            error: None,
        },
    ))
}

pub async fn process_query_form(
    State(state): State<HtmlState>,
    HxRequest(is_htmx): HxRequest,
    Form(form): Form<QueryForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let (result, error) = match state.backend.query(&form.to_request()).await {
        Ok(response) => (Some(response), None),
        Err(AppError::Validation(msg) | AppError::Credentials(msg) | AppError::Upstream(msg)) => {
            (None, Some(msg))
        }
        Err(e) => return Err(e.into()),
    };

    let sidebar = if is_htmx {
        None
    } else {
        Some(Sidebar::load(&state).await)
    };
    let data = QueryPageData {
        sidebar,
        presets: PROMPT_PRESETS,
        models: MODEL_CHOICES,
        default_model: state.config.gen_model.clone(),
        form,
        default_top_k: state.config.top_k,
        default_distance_threshold: state.config.distance_threshold,
        result,
        error,
    };

    if is_htmx {
        Ok(TemplateResponse::new_partial("query/query.html", "result", data))
    } else {
        Ok(TemplateResponse::new_template("query/query.html", data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_prompt_overrides_preset() {
        let form = QueryForm {
            query: "What changed?".into(),
            top_k: "5".into(),
            distance_threshold: "0.3".into(),
            preset: "concise".into(),
            system_prompt: "  Answer in French.  ".into(),
            model: " gemini-1.5-pro ".into(),
        };

        let request = form.to_request();
        assert_eq!(request.top_k, Some(5));
        assert_eq!(request.distance_threshold, Some(0.3));
        assert_eq!(request.system_prompt.as_deref(), Some("Answer in French."));
        assert_eq!(request.model.as_deref(), Some("gemini-1.5-pro"));
    }

    #[test]
    fn preset_used_when_no_custom_prompt() {
        let form = QueryForm {
            query: "Summarize".into(),
            preset: "summarizer".into(),
            ..Default::default()
        };

        let request = form.to_request();
        assert!(request
            .system_prompt
            .as_deref()
            .is_some_and(|p| p.starts_with("You are a summarization expert")));
        assert!(request.top_k.is_none());
        assert!(request.model.is_none());
    }

    #[test]
    fn invalid_numbers_pass_through_as_given() {
        let form = QueryForm {
            query: "q".into(),
            top_k: "0".into(),
            distance_threshold: "-1".into(),
            ..Default::default()
        };

        let request = form.to_request();
        assert_eq!(request.top_k, Some(0));
        assert_eq!(request.distance_threshold, Some(-1.0));
        assert!(request.system_prompt.is_none());
    }
}
