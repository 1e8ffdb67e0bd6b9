use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use super::guard::AccessDenied;
use super::identity::{Identity, ResolveIdentity};

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// Resolve the caller for a request; anonymous when the header is missing or unusable.
pub fn caller(headers: &HeaderMap, identities: &dyn ResolveIdentity) -> Option<Identity> {
    identities.resolve(bearer_token(headers))
}

pub fn access_denied_status(denied: &AccessDenied) -> StatusCode {
    match denied {
        AccessDenied::Unauthenticated => StatusCode::UNAUTHORIZED,
        AccessDenied::AccountInactive => StatusCode::BAD_REQUEST,
        AccessDenied::InsufficientCapability { .. }
        | AccessDenied::InsufficientVerification { .. } => StatusCode::FORBIDDEN,
    }
}

pub fn access_denied_response(denied: &AccessDenied) -> Response {
    debug!(reason = %denied, "access denied");
    error_response(access_denied_status(denied), denied.to_string())
}

/// JSON error body shared by the routers. 401 responses carry a bearer challenge.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    let mut response = (status, Json(payload)).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}
