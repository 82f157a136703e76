use axum::{extract::FromRef, middleware::from_fn_with_state, Router};
use tower_http::compression::CompressionLayer;

use crate::{html_state::HtmlState, middlewares::response_middleware::with_template_response};

/// Serves `assets/` from disk in debug builds and from the binary in release.
#[macro_export]
macro_rules! create_asset_service {
    ($relative_path:expr) => {{
        #[cfg(debug_assertions)]
        {
            let crate_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            let assets_path = crate_dir.join($relative_path);
            tracing::debug!("Assets: Serving from filesystem: {:?}", assets_path);
            tower_http::services::ServeDir::new(assets_path)
        }
        #[cfg(not(debug_assertions))]
        {
            tracing::debug!("Assets: Serving embedded directory");
            static ASSETS_DIR: include_dir::Dir<'static> =
                include_dir::include_dir!("$CARGO_MANIFEST_DIR/assets");
            tower_serve_static::ServeDir::new(&ASSETS_DIR)
        }
    }};
}

pub struct RouterFactory<S> {
    app_state: HtmlState,
    routers: Vec<Router<S>>,
    assets: Option<AssetsConfig>,
    compression_enabled: bool,
}

struct AssetsConfig {
    path: String,
    directory: String,
}

impl<S> RouterFactory<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    pub fn new(app_state: &HtmlState) -> Self {
        Self {
            app_state: app_state.to_owned(),
            routers: Vec::new(),
            assets: None,
            compression_enabled: false,
        }
    }

    pub fn with_public_assets(mut self, path: &str, directory: &str) -> Self {
        self.assets = Some(AssetsConfig {
            path: path.to_string(),
            directory: directory.to_string(),
        });
        self
    }

    pub fn add_routes(mut self, routes: Router<S>) -> Self {
        self.routers.push(routes);
        self
    }

    /// Enables response compression when building the router.
    pub const fn with_compression(mut self) -> Self {
        self.compression_enabled = true;
        self
    }

    pub fn build(self) -> Router<S> {
        let mut app_router = Router::new();
        for router in self.routers {
            app_router = app_router.merge(router);
        }

        app_router = app_router.layer(from_fn_with_state(
            self.app_state.clone(),
            with_template_response,
        ));

        // Assets bypass the template middleware.
        let mut final_router = Router::new();
        if let Some(assets) = self.assets {
            let asset_service = create_asset_service!(&assets.directory);
            final_router = final_router.nest_service(&assets.path, asset_service);
        }
        final_router = final_router.merge(app_router);

        if self.compression_enabled {
            final_router = final_router.layer(CompressionLayer::new());
        }

        final_router
    }
}
