use crate::config::Environment;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_directives(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "inspection_backend=debug,tower_http=debug,sqlx=warn,info",
        Environment::Staging => "inspection_backend=debug,tower_http=info,sqlx=warn,info",
        Environment::Prod => "inspection_backend=info,tower_http=info,warn",
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the per-environment
/// directives. Production writes JSON lines carrying the current span, so
/// `document_id` fields from job spans land on every event.
pub fn init_logging(env: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(env)));
    let registry = tracing_subscriber::registry().with(filter);

    match env {
        Environment::Dev => registry
            .with(fmt::layer().pretty().with_file(true).with_line_number(true))
            .init(),
        Environment::Staging => registry.with(fmt::layer().compact().with_target(true)).init(),
        Environment::Prod => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init(),
    }

    tracing::info!(environment = ?env, "Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for env in [Environment::Dev, Environment::Staging, Environment::Prod] {
            let directives = default_directives(&env);
            assert!(directives.starts_with("inspection_backend="));
            EnvFilter::try_new(directives).unwrap();
        }
    }
}
