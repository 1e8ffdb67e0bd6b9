//! Property listings: ownership-proof moderation, public discovery, and view accounting.

pub mod documents;
pub mod domain;
pub mod lifecycle;
pub mod query;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use documents::{parse_ownership_documents, DocumentError, OwnershipDocument};
pub use domain::{
    Listing, ListingDetails, ListingId, ListingImage, ListingStatus, ListingType, ListingVideo,
    ListingView, PropertyType, Verification, VerificationStatus,
};
pub use lifecycle::{
    LifecycleError, VerificationAction, VerificationDecision, DEFAULT_REJECTION_NOTE,
};
pub use query::{
    relevance_score, ListingFilters, ListingQuery, ListingSearch, Page, QueryError, SortOrder,
    Visibility, MAX_PAGE_LIMIT,
};
pub use repository::ListingStore;
pub use router::{listing_router, ListingRouterState};
pub use service::{ListingService, ListingServiceError, ListingUpdate, NewListing};
