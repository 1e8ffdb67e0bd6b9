use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::documents::{parse_ownership_documents, DocumentError, OwnershipDocument};
use super::domain::{
    Listing, ListingDetails, ListingId, ListingImage, ListingVideo, VerificationStatus,
};
use super::lifecycle::{LifecycleError, VerificationAction, VerificationDecision};
use super::query::{ListingQuery, ListingSearch, Page, QueryError};
use super::repository::ListingStore;
use crate::access::{
    require_active, require_capability, require_owner_or, AccessDenied, Capability, Identity,
};
use crate::clock::{Clock, SystemClock};
use crate::config::ListingConfig;
use crate::media::{ImageUpload, MediaError, MediaStore};
use crate::store::StoreError;

/// Input for a new listing. Documents arrive unparsed so that access checks run before any
/// payload validation.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub details: ListingDetails,
    pub ownership_documents: Value,
    pub images: Vec<ImageUpload>,
    pub image_captions: Vec<String>,
    pub video_url: Option<String>,
}

/// Full replacement of the editable fields plus optional document, image, and video changes.
///
/// `ownership_documents: Some(_)` resubmits proof and reopens review. An empty image list
/// keeps the current images. `video_url: Some("")` removes the video.
#[derive(Debug, Clone)]
pub struct ListingUpdate {
    pub details: ListingDetails,
    pub ownership_documents: Option<Value>,
    pub images: Vec<ImageUpload>,
    pub image_captions: Vec<String>,
    pub video_url: Option<String>,
}

/// Service composing the access guards, lifecycle transitions, media storage, and store.
pub struct ListingService<S, M> {
    store: Arc<S>,
    media: Arc<M>,
    clock: Arc<dyn Clock>,
    config: ListingConfig,
}

impl<S, M> ListingService<S, M>
where
    S: ListingStore + 'static,
    M: MediaStore + 'static,
{
    pub fn new(store: Arc<S>, media: Arc<M>, config: ListingConfig) -> Self {
        Self::with_clock(store, media, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        media: Arc<M>,
        config: ListingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            media,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    /// Create a listing awaiting verification. Requires `create_listing`.
    pub fn create(
        &self,
        caller: Option<&Identity>,
        submission: NewListing,
    ) -> Result<Listing, ListingServiceError> {
        let identity = require_capability(caller, &Capability::CreateListing)?;

        let documents = required_documents(&submission.ownership_documents)?;
        if submission.images.is_empty() {
            return Err(ListingServiceError::InvalidArgument(
                "at least one property image is required".to_string(),
            ));
        }

        let locators = self.store_images(&submission.images)?;
        let listing = Listing::from_parts(
            ListingId::generate(),
            identity.subject_id,
            submission.details,
            documents,
            ListingImage::from_locators(locators.clone(), &submission.image_captions),
            submission.video_url.as_deref().and_then(ListingVideo::from_url),
            self.clock.now(),
        );

        match self.store.insert(listing) {
            Ok(stored) => {
                info!(
                    listing = %stored.id,
                    owner = %identity.subject_id,
                    images = stored.images.len(),
                    "listing created; awaiting verification"
                );
                Ok(stored)
            }
            Err(err) => {
                self.discard_images(&locators);
                Err(err.into())
            }
        }
    }

    /// Edit a listing. Requires ownership or `admin_access`.
    pub fn update(
        &self,
        caller: Option<&Identity>,
        id: &ListingId,
        update: ListingUpdate,
    ) -> Result<Listing, ListingServiceError> {
        require_active(caller)?;
        let current = self.get(id)?;
        let identity = require_owner_or(caller, &current.owner_id(), &Capability::AdminAccess)?;

        let documents = update
            .ownership_documents
            .as_ref()
            .map(required_documents)
            .transpose()?;
        let resubmitted = documents.is_some();

        let new_locators = self.store_images(&update.images)?;
        let now = self.clock.now();

        let committed = self.store.transact(id, |listing: &mut Listing| {
            listing.details = update.details;
            if let Some(documents) = documents {
                listing.resubmit_documents(documents);
            }
            let replaced = if new_locators.is_empty() {
                Vec::new()
            } else {
                let images =
                    ListingImage::from_locators(new_locators.clone(), &update.image_captions);
                std::mem::replace(&mut listing.images, images)
            };
            if let Some(video_url) = update.video_url.as_deref() {
                listing.video = ListingVideo::from_url(video_url);
            }
            listing.updated_at = Some(now);
            Ok::<_, ListingServiceError>((listing.clone(), replaced))
        });

        let (listing, replaced) = match committed {
            Ok(committed) => committed,
            Err(err) => {
                self.discard_images(&new_locators);
                return Err(err.for_listing(id));
            }
        };

        let stale: Vec<String> = replaced.into_iter().map(|image| image.image_url).collect();
        self.discard_images(&stale);

        if resubmitted {
            info!(
                listing = %listing.id,
                by = %identity.subject_id,
                "ownership documents resubmitted; verification reopened"
            );
        }
        Ok(listing)
    }

    /// Public listing read with visibility, filters, ranking, and pagination.
    pub fn list(
        &self,
        caller: Option<&Identity>,
        search: ListingSearch,
    ) -> Result<Vec<Listing>, ListingServiceError> {
        let query = ListingQuery::from_search(search, caller, self.config.default_limit)?;
        Ok(self.store.query(&query)?)
    }

    /// Single listing read. Counts as a view.
    pub fn view(&self, id: &ListingId) -> Result<Listing, ListingServiceError> {
        self.store
            .increment_views(id)
            .map_err(|err| ListingServiceError::from(err).for_listing(id))?;
        self.get(id)
    }

    /// Review queue, newest first. Requires `admin_access`.
    pub fn pending(
        &self,
        caller: Option<&Identity>,
        skip: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Listing>, ListingServiceError> {
        require_capability(caller, &Capability::AdminAccess)?;
        let page = Page::from_request(skip, limit, self.config.pending_limit)?;
        Ok(self.store.query(&ListingQuery::pending_review(page))?)
    }

    /// Approve or reject a pending listing. Requires `admin_access`.
    pub fn decide(
        &self,
        caller: Option<&Identity>,
        id: &ListingId,
        decision: &VerificationDecision,
    ) -> Result<Listing, ListingServiceError> {
        let admin = require_capability(caller, &Capability::AdminAccess)?;
        let now = self.clock.now();

        let (listing, action) = self
            .store
            .transact(id, |listing: &mut Listing| {
                let action = listing.decide(decision, admin.subject_id, now)?;
                Ok::<_, ListingServiceError>((listing.clone(), action))
            })
            .map_err(|err| err.for_listing(id))?;

        let outcome = match action {
            VerificationAction::Approve => "approved",
            VerificationAction::Reject => "rejected",
        };
        info!(
            listing = %listing.id,
            admin = %admin.subject_id,
            outcome,
            "listing verification decided"
        );
        Ok(listing)
    }

    fn get(&self, id: &ListingId) -> Result<Listing, ListingServiceError> {
        self.store
            .fetch(id)?
            .ok_or(ListingServiceError::NotFound(*id))
    }

    /// Persist every upload or none: anything stored before a failure is removed again.
    fn store_images(&self, uploads: &[ImageUpload]) -> Result<Vec<String>, ListingServiceError> {
        let mut locators = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.media.store_image(upload) {
                Ok(locator) => locators.push(locator),
                Err(err) => {
                    self.discard_images(&locators);
                    return Err(err.into());
                }
            }
        }
        Ok(locators)
    }

    fn discard_images(&self, locators: &[String]) {
        for locator in locators {
            if let Err(err) = self.media.delete(locator) {
                warn!(locator = %locator, error = %err, "failed to delete orphaned image");
            }
        }
    }
}

fn required_documents(raw: &Value) -> Result<Vec<OwnershipDocument>, ListingServiceError> {
    let documents = parse_ownership_documents(raw)?;
    if documents.is_empty() {
        return Err(ListingServiceError::InvalidArgument(
            "at least one ownership document is required".to_string(),
        ));
    }
    Ok(documents)
}

/// Error raised by the listing service.
#[derive(Debug, thiserror::Error)]
pub enum ListingServiceError {
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error("{message}")]
    InvalidTransition {
        current: VerificationStatus,
        message: String,
    },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("listing {0} not found")]
    NotFound(ListingId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

impl ListingServiceError {
    /// Name the listing when the store reports it missing.
    fn for_listing(self, id: &ListingId) -> Self {
        match self {
            ListingServiceError::Store(StoreError::NotFound) => ListingServiceError::NotFound(*id),
            other => other,
        }
    }
}

impl From<LifecycleError> for ListingServiceError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::AlreadyDecided { current } => ListingServiceError::InvalidTransition {
                current,
                message: err.to_string(),
            },
            LifecycleError::UnknownAction(_) => {
                ListingServiceError::InvalidArgument(err.to_string())
            }
        }
    }
}

impl From<QueryError> for ListingServiceError {
    fn from(err: QueryError) -> Self {
        ListingServiceError::InvalidArgument(err.to_string())
    }
}

impl From<DocumentError> for ListingServiceError {
    fn from(err: DocumentError) -> Self {
        ListingServiceError::InvalidArgument(err.to_string())
    }
}
