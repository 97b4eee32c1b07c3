//! Request interception: visitor session lookup and UTM resolution.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Cookie, HeaderMapExt};
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::form_urlencoded;

use crate::AppState;
use crate::session::{SessionError, VisitorSession};
use crate::utm::UtmParameter;

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        error!(error = %self, "Session store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable").into_response()
    }
}

/// Only GET requests carry attribution worth capturing.
pub fn should_accept_utm_parameters(request: &Request) -> bool {
    request.method() == Method::GET
}

/// Resolve UTM parameters for the visitor and hand them to the handler.
///
/// The resolved [`UtmParameter`] is inserted into request extensions.
/// Visitors without a known session cookie get a new session and a
/// `Set-Cookie` header on the response.
pub async fn utm_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, SessionError> {
    let cookie_name = state.config.session.cookie_name.as_str();
    let (session, created) = visitor_session(&state, &request, cookie_name)?;
    session.touch();

    let mut utm = UtmParameter::new((*state.utm).clone(), Arc::new(session.clone()));
    if should_accept_utm_parameters(&request) {
        let query = request.uri().query().unwrap_or_default();
        utm.boot(form_urlencoded::parse(query.as_bytes()))?;
    } else {
        utm.load()?;
    }
    request.extensions_mut().insert(utm);

    let mut response = next.run(request).await;

    if created {
        let cookie = format!(
            "{cookie_name}={}; Path=/; HttpOnly; SameSite=Lax",
            session.id()
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, cookie_name, "Session cookie could not be encoded"),
        }
    }

    Ok(response)
}

/// Find the visitor's session from the cookie, or start a new one.
fn visitor_session(
    state: &AppState,
    request: &Request,
    cookie_name: &str,
) -> Result<(VisitorSession, bool), SessionError> {
    let known = request
        .headers()
        .typed_get::<Cookie>()
        .and_then(|cookies| cookies.get(cookie_name).map(str::to_string));

    if let Some(id) = known {
        if let Some(session) = state.sessions.get(&id)? {
            return Ok((session, false));
        }
        debug!(session_id = %id, "Unknown session cookie, starting a new session");
    }

    Ok((state.sessions.create()?, true))
}
