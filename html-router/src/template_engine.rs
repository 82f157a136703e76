use std::sync::Arc;

pub use minijinja::Value;
use minijinja::Environment;
#[cfg(debug_assertions)]
use minijinja_autoreload::AutoReloader;

/// Templates are read from disk and reloaded on change in debug builds, and
/// compiled into the binary by `build.rs` in release builds.
#[derive(Clone)]
pub enum TemplateEngine {
    #[cfg(debug_assertions)]
    AutoReload(Arc<AutoReloader>),
    #[cfg(not(debug_assertions))]
    Embedded(Arc<Environment<'static>>),
}

fn configure(env: &mut Environment<'_>) {
    minijinja_contrib::add_to_environment(env);
    env.add_filter("filesize", filesize);
}

/// Human readable byte count, e.g. `1.5 MB`.
pub fn filesize(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS.get(unit).copied().unwrap_or("B"))
    }
}

impl TemplateEngine {
    #[cfg(debug_assertions)]
    pub fn new() -> Self {
        let template_path =
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates");
        tracing::debug!("Templates: loading from {:?}", template_path);

        let reloader = AutoReloader::new(move |notifier| {
            let mut env = Environment::new();
            env.set_loader(minijinja::path_loader(&template_path));
            notifier.set_fast_reload(true);
            notifier.watch_path(&template_path, true);
            configure(&mut env);
            Ok(env)
        });
        Self::AutoReload(Arc::new(reloader))
    }

    #[cfg(not(debug_assertions))]
    pub fn new() -> Self {
        let mut env = Environment::new();
        minijinja_embed::load_templates!(&mut env);
        configure(&mut env);
        Self::Embedded(Arc::new(env))
    }

    pub fn render(&self, name: &str, ctx: &Value) -> Result<String, minijinja::Error> {
        match self {
            #[cfg(debug_assertions)]
            Self::AutoReload(reloader) => {
                let env = reloader.acquire_env()?;
                env.get_template(name)?.render(ctx)
            }
            #[cfg(not(debug_assertions))]
            Self::Embedded(env) => env.get_template(name)?.render(ctx),
        }
    }

    pub fn render_block(
        &self,
        template_name: &str,
        block_name: &str,
        context: &Value,
    ) -> Result<String, minijinja::Error> {
        match self {
            #[cfg(debug_assertions)]
            Self::AutoReload(reloader) => reloader
                .acquire_env()?
                .get_template(template_name)?
                .eval_to_state(context)?
                .render_block(block_name),
            #[cfg(not(debug_assertions))]
            Self::Embedded(env) => env
                .get_template(template_name)?
                .eval_to_state(context)?
                .render_block(block_name),
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
