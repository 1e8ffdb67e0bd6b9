use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::domain::{Listing, ListingDetails, ListingId, ListingView};
use super::lifecycle::VerificationDecision;
use super::query::ListingSearch;
use super::repository::ListingStore;
use super::service::{ListingService, ListingServiceError, ListingUpdate, NewListing};
use crate::access::http::{access_denied_response, caller, error_response};
use crate::access::ResolveIdentity;
use crate::media::{ImageUpload, MediaError, MediaStore};
use crate::store::StoreError;

/// Shared state for the listing routes.
pub struct ListingRouterState<S, M> {
    pub service: Arc<ListingService<S, M>>,
    pub identities: Arc<dyn ResolveIdentity>,
}

impl<S, M> Clone for ListingRouterState<S, M> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            identities: Arc::clone(&self.identities),
        }
    }
}

/// Create payload. Images travel inline as base64 `data` fields.
#[derive(Debug, Deserialize)]
pub struct NewListingRequest {
    #[serde(flatten)]
    pub details: ListingDetails,
    #[serde(alias = "ownership_documents")]
    pub verification_document: Value,
    #[serde(default)]
    pub images: Vec<ImageUpload>,
    #[serde(default)]
    pub image_captions: Vec<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl From<NewListingRequest> for NewListing {
    fn from(request: NewListingRequest) -> Self {
        NewListing {
            details: request.details,
            ownership_documents: request.verification_document,
            images: request.images,
            image_captions: request.image_captions,
            video_url: request.video_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    #[serde(flatten)]
    pub details: ListingDetails,
    #[serde(default, alias = "ownership_documents")]
    pub verification_document: Option<Value>,
    #[serde(default)]
    pub images: Vec<ImageUpload>,
    #[serde(default)]
    pub image_captions: Vec<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl From<UpdateListingRequest> for ListingUpdate {
    fn from(request: UpdateListingRequest) -> Self {
        ListingUpdate {
            details: request.details,
            ownership_documents: request.verification_document,
            images: request.images,
            image_captions: request.image_captions,
            video_url: request.video_url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageParams {
    #[serde(alias = "offset")]
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Router builder exposing the listing lifecycle over HTTP.
pub fn listing_router<S, M>(
    service: Arc<ListingService<S, M>>,
    identities: Arc<dyn ResolveIdentity>,
) -> Router
where
    S: ListingStore + 'static,
    M: MediaStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/properties",
            get(list_handler::<S, M>).post(create_handler::<S, M>),
        )
        .route(
            "/api/v1/properties/admin/pending",
            get(pending_handler::<S, M>),
        )
        .route(
            "/api/v1/properties/admin/:listing_id/verify",
            post(decide_handler::<S, M>),
        )
        .route(
            "/api/v1/properties/:listing_id",
            get(view_handler::<S, M>).put(update_handler::<S, M>),
        )
        .with_state(ListingRouterState {
            service,
            identities,
        })
}

pub(crate) async fn create_handler<S, M>(
    State(state): State<ListingRouterState<S, M>>,
    headers: HeaderMap,
    Json(request): Json<NewListingRequest>,
) -> Response
where
    S: ListingStore + 'static,
    M: MediaStore + 'static,
{
    let identity = caller(&headers, state.identities.as_ref());
    match state.service.create(identity.as_ref(), request.into()) {
        Ok(listing) => (StatusCode::CREATED, Json(listing.view())).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn update_handler<S, M>(
    State(state): State<ListingRouterState<S, M>>,
    headers: HeaderMap,
    Path(listing_id): Path<ListingId>,
    Json(request): Json<UpdateListingRequest>,
) -> Response
where
    S: ListingStore + 'static,
    M: MediaStore + 'static,
{
    let identity = caller(&headers, state.identities.as_ref());
    match state
        .service
        .update(identity.as_ref(), &listing_id, request.into())
    {
        Ok(listing) => (StatusCode::OK, Json(listing.view())).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn list_handler<S, M>(
    State(state): State<ListingRouterState<S, M>>,
    headers: HeaderMap,
    Query(search): Query<ListingSearch>,
) -> Response
where
    S: ListingStore + 'static,
    M: MediaStore + 'static,
{
    let identity = caller(&headers, state.identities.as_ref());
    match state.service.list(identity.as_ref(), search) {
        Ok(listings) => (StatusCode::OK, Json(views(&listings))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn view_handler<S, M>(
    State(state): State<ListingRouterState<S, M>>,
    Path(listing_id): Path<ListingId>,
) -> Response
where
    S: ListingStore + 'static,
    M: MediaStore + 'static,
{
    match state.service.view(&listing_id) {
        Ok(listing) => (StatusCode::OK, Json(listing.view())).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn pending_handler<S, M>(
    State(state): State<ListingRouterState<S, M>>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Response
where
    S: ListingStore + 'static,
    M: MediaStore + 'static,
{
    let identity = caller(&headers, state.identities.as_ref());
    match state
        .service
        .pending(identity.as_ref(), params.skip, params.limit)
    {
        Ok(listings) => (StatusCode::OK, Json(views(&listings))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn decide_handler<S, M>(
    State(state): State<ListingRouterState<S, M>>,
    headers: HeaderMap,
    Path(listing_id): Path<ListingId>,
    Json(decision): Json<VerificationDecision>,
) -> Response
where
    S: ListingStore + 'static,
    M: MediaStore + 'static,
{
    let identity = caller(&headers, state.identities.as_ref());
    match state
        .service
        .decide(identity.as_ref(), &listing_id, &decision)
    {
        Ok(listing) => (StatusCode::OK, Json(listing.view())).into_response(),
        Err(err) => service_error_response(err),
    }
}

fn views(listings: &[Listing]) -> Vec<ListingView> {
    listings.iter().map(Listing::view).collect()
}

pub(crate) fn service_error_response(err: ListingServiceError) -> Response {
    match &err {
        ListingServiceError::Access(denied) => access_denied_response(denied),
        ListingServiceError::InvalidTransition { current, message } => {
            let payload = json!({
                "error": message,
                "verification_status": current,
            });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        ListingServiceError::InvalidArgument(message) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, message.clone())
        }
        ListingServiceError::NotFound(_) | ListingServiceError::Store(StoreError::NotFound) => {
            error_response(StatusCode::NOT_FOUND, "property not found")
        }
        ListingServiceError::Store(StoreError::Conflict) => {
            error_response(StatusCode::CONFLICT, "property already exists")
        }
        ListingServiceError::Media(MediaError::Io(_))
        | ListingServiceError::Store(StoreError::Unavailable(_)) => {
            error!(error = %err, "listing request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        ListingServiceError::Media(media) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, media.to_string())
        }
    }
}
