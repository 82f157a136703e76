use std::collections::HashMap;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use axum_htmx::{HxRequest, HX_TRIGGER};
use common::error::AppError;
use minijinja::{context, value::ValueKind};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::{html_state::HtmlState, template_engine::Value};

const HTMX_HEADERS_TO_FORWARD: &[&str] = &["HX-Push", "HX-Trigger", "HX-Redirect"];

#[derive(Clone, Debug)]
pub enum TemplateKind {
    Full(String),
    Partial(String, String),
    Error(StatusCode),
    Redirect(String),
}

/// Handler output that the template middleware turns into HTML.
#[derive(Clone)]
pub struct TemplateResponse {
    template_kind: TemplateKind,
    context: Value,
}

impl TemplateResponse {
    pub fn new_template<T: Serialize>(name: impl Into<String>, context: T) -> Self {
        Self {
            template_kind: TemplateKind::Full(name.into()),
            context: Value::from_serialize(&context),
        }
    }

    pub fn new_partial<T: Serialize>(
        template: impl Into<String>,
        block: impl Into<String>,
        context: T,
    ) -> Self {
        Self {
            template_kind: TemplateKind::Partial(template.into(), block.into()),
            context: Value::from_serialize(&context),
        }
    }

    pub fn error(status: StatusCode, title: &str, description: &str) -> Self {
        let ctx = context! {
            status_code => status.as_u16(),
            title => title,
            description => description
        };
        Self {
            template_kind: TemplateKind::Error(status),
            context: ctx,
        }
    }

    pub fn not_found() -> Self {
        Self::error(
            StatusCode::NOT_FOUND,
            "Page Not Found",
            "The page or document you're looking for doesn't exist or was removed.",
        )
    }

    pub fn server_error() -> Self {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            "Something went wrong on our end.",
        )
    }

    pub fn bad_request(message: &str) -> Self {
        Self::error(StatusCode::BAD_REQUEST, "Bad Request", message)
    }

    pub fn unavailable(message: &str) -> Self {
        Self::error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Google Cloud Not Configured",
            message,
        )
    }

    pub fn bad_gateway(message: &str) -> Self {
        Self::error(StatusCode::BAD_GATEWAY, "Service Error", message)
    }

    pub fn redirect(path: impl Into<String>) -> Self {
        Self {
            template_kind: TemplateKind::Redirect(path.into()),
            context: Value::from_serialize(()),
        }
    }

    pub const fn kind(&self) -> &TemplateKind {
        &self.template_kind
    }
}

impl IntoResponse for TemplateResponse {
    fn into_response(self) -> Response {
        Extension(self).into_response()
    }
}

#[derive(Serialize)]
struct ContextWrapper<'a> {
    api_base_url: &'a str,
    current_path: &'a str,
    #[serde(flatten)]
    context: HashMap<String, Value>,
}

fn context_to_map(value: &Value) -> Result<HashMap<String, Value>, ValueKind> {
    match value.kind() {
        ValueKind::Map => {
            let mut map = HashMap::new();
            if let Ok(keys) = value.try_iter() {
                for key in keys {
                    if let Ok(val) = value.get_item(&key) {
                        map.insert(key.to_string(), val);
                    }
                }
            }
            Ok(map)
        }
        ValueKind::None | ValueKind::Undefined => Ok(HashMap::new()),
        other => Err(other),
    }
}

fn forward_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for &header_name in HTMX_HEADERS_TO_FORWARD {
        if let Ok(name) = HeaderName::from_bytes(header_name.as_bytes()) {
            if let Some(value) = from.get(&name) {
                to.insert(name.clone(), value.clone());
            }
        }
    }
}

fn context_str(context: &Value, key: &str, fallback: &str) -> String {
    context
        .get_attr(key)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| fallback.to_string())
}

pub async fn with_template_response(
    State(state): State<HtmlState>,
    HxRequest(is_htmx): HxRequest,
    req: Request,
    next: Next,
) -> Response {
    let current_path = req.uri().path().to_string();
    let response = next.run(req).await;

    let Some(template_response) = response.extensions().get::<TemplateResponse>().cloned() else {
        return response;
    };
    let templates = &state.templates;

    let context_map = match context_to_map(&template_response.context) {
        Ok(map) => map,
        Err(kind) => {
            error!(
                "Template context must be a map or unit, got kind={:?} for template_kind={:?}",
                kind, template_response.template_kind
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, Html(fallback_error())).into_response();
        }
    };

    let context = Value::from_serialize(&ContextWrapper {
        api_base_url: state.backend.base_url(),
        current_path: &current_path,
        context: context_map,
    });

    match &template_response.template_kind {
        TemplateKind::Full(name) => match templates.render(name, &context) {
            Ok(html) => {
                let mut final_response = Html(html).into_response();
                forward_headers(response.headers(), final_response.headers_mut());
                final_response
            }
            Err(e) => {
                error!("Failed to render template '{}': {:?}", name, e);
                (StatusCode::INTERNAL_SERVER_ERROR, Html(fallback_error())).into_response()
            }
        },
        TemplateKind::Partial(template, block) => {
            match templates.render_block(template, block, &context) {
                Ok(html) => {
                    let mut final_response = Html(html).into_response();
                    forward_headers(response.headers(), final_response.headers_mut());
                    final_response
                }
                Err(e) => {
                    error!("Failed to render block '{}/{}': {:?}", template, block, e);
                    (StatusCode::INTERNAL_SERVER_ERROR, Html(fallback_error())).into_response()
                }
            }
        }
        TemplateKind::Error(status) => {
            if is_htmx {
                // htmx swaps nothing on 204; the page shows the toast instead.
                let title = context_str(&template_response.context, "title", "Error");
                let description = context_str(
                    &template_response.context,
                    "description",
                    "An error occurred.",
                );
                let trigger_payload =
                    json!({"toast": {"title": title, "description": description, "type": "error"}});
                (
                    StatusCode::NO_CONTENT,
                    [(HX_TRIGGER, trigger_payload.to_string())],
                    "",
                )
                    .into_response()
            } else {
                match templates.render("errors/error.html", &context) {
                    Ok(html) => (*status, Html(html)).into_response(),
                    Err(e) => {
                        error!("Critical: Failed to render 'errors/error.html': {:?}", e);
                        (*status, Html(fallback_error())).into_response()
                    }
                }
            }
        }
        TemplateKind::Redirect(path) => {
            if is_htmx {
                (StatusCode::OK, [(axum_htmx::HX_REDIRECT, path.clone())], "").into_response()
            } else {
                Redirect::to(path).into_response()
            }
        }
    }
}

#[derive(Debug)]
pub enum HtmlError {
    AppError(AppError),
    TemplateError(String),
}

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        Self::AppError(err)
    }
}

impl From<minijinja::Error> for HtmlError {
    fn from(err: minijinja::Error) -> Self {
        Self::TemplateError(err.to_string())
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        match self {
            Self::AppError(err) => match err {
                AppError::NotFound(_) => TemplateResponse::not_found().into_response(),
                AppError::Validation(msg) => TemplateResponse::bad_request(&msg).into_response(),
                AppError::Credentials(msg) => TemplateResponse::unavailable(&msg).into_response(),
                AppError::Upstream(msg) => TemplateResponse::bad_gateway(&msg).into_response(),
                _ => {
                    error!("Internal error: {:?}", err);
                    TemplateResponse::server_error().into_response()
                }
            },
            Self::TemplateError(err) => {
                error!("Template error: {}", err);
                TemplateResponse::server_error().into_response()
            }
        }
    }
}

fn fallback_error() -> String {
    r#"
    <html>
        <body>
            <main class="container">
                <h1>Error</h1>
                <p>Sorry, something went wrong displaying this page.</p>
            </main>
        </body>
    </html>
    "#
    .to_string()
}
