use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::AppState;
use crate::config::AppConfig;
use crate::middleware::utm_middleware;
use crate::session::SessionError;
use crate::utm::{ParameterSet, UtmDirective, UtmParameter, ensure_utm_prefix, helpers};

/// How often idle visitor sessions are pruned.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the router with UTM capture applied to every route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/utm", get(api_all).delete(api_clear))
        .route("/api/utm/{key}", get(api_get))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    utm_middleware,
                )),
        )
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    info!(
        name: "utm.config.loaded",
        session_key = %config.tracking.session_key,
        override_utm_parameters = config.tracking.override_utm_parameters,
        allowed = ?config.tracking.allowed_utm_parameters,
        "UTM configuration loaded"
    );

    let state = AppState::new(Arc::clone(&config));

    // Prune idle visitor sessions in the background
    let sessions = state.sessions.clone();
    let idle_timeout = Duration::from_secs(config.session.idle_timeout_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            match sessions.cleanup_expired_with_timeout(idle_timeout) {
                Ok(0) => {}
                Ok(removed) => info!(name: "session.cleanup", removed, "Expired sessions removed"),
                Err(e) => warn!(error = %e, "Session cleanup failed"),
            }
        }
    });

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Generate the HTML shell for the application.
fn html_shell(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} - UTM Parameter</title>
</head>
<body>
    <main id="app">
        {content}
    </main>
</body>
</html>"#
    )
}

/// Attribution table plus a few conditionals, rendered from the helpers.
fn attribution_content(utm: &UtmParameter) -> String {
    let mut out = String::new();
    let all = helpers::get_all_utm(utm);

    if all.is_empty() {
        out.push_str("<p class=\"empty\">No campaign attribution for this visit.</p>");
    } else {
        out.push_str("<table class=\"utm\">");
        for (key, value) in all.display_pairs() {
            // Values were escaped when captured.
            let _ = write!(out, "<tr><th>{key}</th><td>{value}</td></tr>");
        }
        out.push_str("</table>");
    }

    if UtmDirective::HasUtm.evaluate(utm, "medium", Some("cpc")) {
        out.push_str("<p class=\"paid\">Welcome, visitor from a paid campaign.</p>");
    }
    if UtmDirective::ContainsUtm.evaluate(utm, "source", Some("newsletter")) {
        out.push_str("<p class=\"newsletter\">Thanks for reading our newsletter.</p>");
    }
    out
}

/// Index page handler.
async fn index_handler(Extension(utm): Extension<UtmParameter>) -> impl IntoResponse {
    Html(html_shell("Attribution", &attribution_content(&utm)))
}

async fn health_handler() -> &'static str {
    "ok"
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// A single parameter lookup.
#[derive(Debug, Serialize)]
struct ParameterDto {
    key: String,
    value: String,
}

/// Outcome of clearing the stored parameters.
#[derive(Debug, Serialize)]
struct ClearResponse {
    cleared: bool,
}

/// GET /api/utm - All captured parameters.
async fn api_all(Extension(utm): Extension<UtmParameter>) -> Json<ParameterSet> {
    Json(utm.all())
}

/// GET /api/utm/{key} - One parameter, `source` or `utm_source`.
async fn api_get(
    Extension(utm): Extension<UtmParameter>,
    Path(key): Path<String>,
) -> Result<Json<ParameterDto>, StatusCode> {
    match helpers::get_utm(&utm, &key) {
        Some(value) => Ok(Json(ParameterDto {
            key: ensure_utm_prefix(&key),
            value: value.to_string(),
        })),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// DELETE /api/utm - Forget the visitor's parameters.
async fn api_clear(
    Extension(mut utm): Extension<UtmParameter>,
) -> Result<Json<ClearResponse>, SessionError> {
    let cleared = utm.clear()?;
    Ok(Json(ClearResponse { cleared }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRegistry;
    use crate::utm::UtmSettings;

    fn utm(params: &[(&str, &str)]) -> UtmParameter {
        let session = SessionRegistry::new().create().unwrap();
        let mut utm = UtmParameter::new(UtmSettings::default(), Arc::new(session));
        utm.boot(params.iter().copied()).unwrap();
        utm
    }

    #[test]
    fn test_attribution_renders_escaped_values() {
        let html = attribution_content(&utm(&[("utm_source", "<b>x</b>")]));
        assert!(html.contains("<th>utm_source</th><td>&lt;b&gt;x&lt;/b&gt;</td>"));
        assert!(!html.contains("<b>x</b>"));
    }

    #[test]
    fn test_attribution_directives() {
        let html = attribution_content(&utm(&[("utm_source", "google"), ("utm_medium", "cpc")]));
        assert!(html.contains("paid campaign"));
        assert!(!html.contains("newsletter"));

        let html = attribution_content(&utm(&[]));
        assert!(html.contains("No campaign attribution"));
    }
}
