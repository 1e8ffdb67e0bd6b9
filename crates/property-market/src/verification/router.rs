use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::service::{CodeSender, PhoneVerificationService, VerificationError};
use crate::access::http::{access_denied_response, caller, error_response};
use crate::access::{AccountDirectory, ResolveIdentity};
use crate::store::StoreError;

pub struct VerificationRouterState<D, C> {
    pub service: Arc<PhoneVerificationService<D, C>>,
    pub identities: Arc<dyn ResolveIdentity>,
}

impl<D, C> Clone for VerificationRouterState<D, C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            identities: Arc::clone(&self.identities),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub phone_number: String,
    pub code: String,
}

/// Router builder for the phone verification upgrade.
pub fn verification_router<D, C>(
    service: Arc<PhoneVerificationService<D, C>>,
    identities: Arc<dyn ResolveIdentity>,
) -> Router
where
    D: AccountDirectory + 'static,
    C: CodeSender + 'static,
{
    Router::new()
        .route(
            "/api/v1/verification/phone/send-code",
            post(send_code_handler::<D, C>),
        )
        .route(
            "/api/v1/verification/phone/resend-code",
            post(resend_code_handler::<D, C>),
        )
        .route(
            "/api/v1/verification/phone/verify",
            post(verify_code_handler::<D, C>),
        )
        .route("/api/v1/verification/status", get(status_handler::<D, C>))
        .with_state(VerificationRouterState {
            service,
            identities,
        })
}

pub(crate) async fn send_code_handler<D, C>(
    State(state): State<VerificationRouterState<D, C>>,
    headers: HeaderMap,
    Json(request): Json<SendCodeRequest>,
) -> Response
where
    D: AccountDirectory + 'static,
    C: CodeSender + 'static,
{
    let identity = caller(&headers, state.identities.as_ref());
    match state
        .service
        .send_code(identity.as_ref(), &request.phone_number)
    {
        Ok(dispatch) => (
            StatusCode::OK,
            Json(json!({
                "message": "Verification code sent",
                "phone_number": dispatch.phone_number,
                "expires_at": dispatch.expires_at,
                "expires_in_secs": dispatch.expires_in_secs,
            })),
        )
            .into_response(),
        Err(err) => verification_error_response(err),
    }
}

pub(crate) async fn resend_code_handler<D, C>(
    State(state): State<VerificationRouterState<D, C>>,
    headers: HeaderMap,
    Json(request): Json<SendCodeRequest>,
) -> Response
where
    D: AccountDirectory + 'static,
    C: CodeSender + 'static,
{
    let identity = caller(&headers, state.identities.as_ref());
    match state
        .service
        .resend_code(identity.as_ref(), &request.phone_number)
    {
        Ok(dispatch) => (
            StatusCode::OK,
            Json(json!({
                "message": "Verification code resent",
                "phone_number": dispatch.phone_number,
                "expires_at": dispatch.expires_at,
                "expires_in_secs": dispatch.expires_in_secs,
            })),
        )
            .into_response(),
        Err(err) => verification_error_response(err),
    }
}

pub(crate) async fn verify_code_handler<D, C>(
    State(state): State<VerificationRouterState<D, C>>,
    headers: HeaderMap,
    Json(request): Json<VerifyCodeRequest>,
) -> Response
where
    D: AccountDirectory + 'static,
    C: CodeSender + 'static,
{
    let identity = caller(&headers, state.identities.as_ref());
    match state
        .service
        .verify_code(identity.as_ref(), &request.phone_number, &request.code)
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "message": "Phone number verified successfully",
                "verification_level": outcome.verification_level,
                "capabilities": outcome.capabilities,
            })),
        )
            .into_response(),
        Err(err) => verification_error_response(err),
    }
}

pub(crate) async fn status_handler<D, C>(
    State(state): State<VerificationRouterState<D, C>>,
    headers: HeaderMap,
) -> Response
where
    D: AccountDirectory + 'static,
    C: CodeSender + 'static,
{
    let identity = caller(&headers, state.identities.as_ref());
    match state.service.status(identity.as_ref()) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => verification_error_response(err),
    }
}

pub(crate) fn verification_error_response(err: VerificationError) -> Response {
    match &err {
        VerificationError::Access(denied) => access_denied_response(denied),
        VerificationError::InvalidPhone(_) | VerificationError::MalformedCode => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        VerificationError::PhoneMismatch
        | VerificationError::AlreadyVerified { .. }
        | VerificationError::NoPendingCode
        | VerificationError::CodeExpired
        | VerificationError::WrongCode { .. }
        | VerificationError::AttemptsExhausted => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        VerificationError::Cooldown { remaining_secs } => {
            let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, err.to_string());
            if let Ok(value) = HeaderValue::from_str(&remaining_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
        VerificationError::Store(StoreError::NotFound) => {
            error_response(StatusCode::NOT_FOUND, "account not found")
        }
        VerificationError::Delivery(_) => {
            error!(error = %err, "verification code delivery failed");
            error_response(StatusCode::BAD_GATEWAY, err.to_string())
        }
        VerificationError::Store(_) => {
            error!(error = %err, "verification request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
