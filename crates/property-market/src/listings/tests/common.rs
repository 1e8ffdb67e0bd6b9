use std::collections::HashMap;
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use crate::access::{Capability, CapabilitySet, Identity, ResolveIdentity, SubjectId};
use crate::clock::FixedClock;
use crate::config::ListingConfig;
use crate::listings::documents::OwnershipDocument;
use crate::listings::domain::{Listing, ListingDetails, ListingId, ListingType, PropertyType};
use crate::listings::lifecycle::VerificationDecision;
use crate::listings::query::ListingQuery;
use crate::listings::repository::ListingStore;
use crate::listings::service::{ListingService, NewListing};
use crate::listings::listing_router;
use crate::media::{ImagePolicy, ImageUpload, InMemoryMediaStore};
use crate::memory::InMemoryListingStore;
use crate::store::StoreError;

pub(super) type MemoryService = ListingService<InMemoryListingStore, InMemoryMediaStore>;

pub(super) fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn identity(capabilities: &[Capability]) -> Identity {
    Identity {
        subject_id: SubjectId::generate(),
        capabilities: capabilities.iter().cloned().collect::<CapabilitySet>(),
        verification_level: Default::default(),
        active: true,
    }
}

pub(super) fn landlord() -> Identity {
    identity(&[
        Capability::BrowseProperties,
        Capability::CreateListing,
        Capability::ReceiveInquiries,
    ])
}

pub(super) fn admin() -> Identity {
    identity(&[Capability::AdminAccess, Capability::VerifyProperties])
}

pub(super) fn tenant() -> Identity {
    identity(&[Capability::BrowseProperties, Capability::SaveFavorites])
}

pub(super) fn deactivated(mut identity: Identity) -> Identity {
    identity.active = false;
    identity
}

pub(super) fn details(title: &str, city: &str, price: f64) -> ListingDetails {
    ListingDetails {
        title: title.to_string(),
        description: "Serviced estate with constant power".to_string(),
        property_type: PropertyType::House,
        listing_type: ListingType::Rent,
        address: "12 Admiralty Way".to_string(),
        city: city.to_string(),
        state: "Lagos".to_string(),
        lga: "Eti-Osa".to_string(),
        landmark: Some("Near Mega Plaza".to_string()),
        price,
        bedrooms: Some(3),
        bathrooms: Some(3),
        toilets: Some(4),
        square_meters: None,
        plot_size: None,
        features: vec!["Borehole".to_string()],
    }
}

pub(super) fn image(filename: &str) -> ImageUpload {
    ImageUpload {
        filename: filename.to_string(),
        content_type: Some("image/jpeg".to_string()),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
    }
}

pub(super) fn certificate() -> Value {
    json!({
        "document_type": "Certificate of Occupancy (C of O)",
        "co_number": "LAG/C-O/2023/00123",
    })
}

pub(super) fn new_listing(title: &str) -> NewListing {
    NewListing {
        details: details(title, "Lekki", 4_500_000.0),
        ownership_documents: certificate(),
        images: vec![image("front.jpg"), image("kitchen.jpg")],
        image_captions: vec!["Front view".to_string()],
        video_url: Some("https://youtu.be/tour".to_string()),
    }
}

pub(super) struct Harness {
    pub service: Arc<MemoryService>,
    pub store: Arc<InMemoryListingStore>,
    pub media: Arc<InMemoryMediaStore>,
    pub clock: Arc<FixedClock>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(InMemoryListingStore::new());
    let media = Arc::new(InMemoryMediaStore::new(
        ImagePolicy::new(1024),
        "http://media.test",
    ));
    let clock = Arc::new(FixedClock::new(epoch()));
    let service = Arc::new(ListingService::with_clock(
        Arc::clone(&store),
        Arc::clone(&media),
        ListingConfig::default(),
        clock.clone(),
    ));
    Harness {
        service,
        store,
        media,
        clock,
    }
}

/// Listing built directly, bypassing the service, for query evaluation tests.
pub(super) fn listing_at(title: &str, city: &str, price: f64, minutes: i64) -> Listing {
    Listing::from_parts(
        ListingId::generate(),
        SubjectId::generate(),
        details(title, city, price),
        vec![OwnershipDocument::new("Deed of Assignment")],
        Vec::new(),
        None,
        epoch() + Duration::minutes(minutes),
    )
}

pub(super) fn approved(mut listing: Listing) -> Listing {
    listing
        .decide(
            &VerificationDecision::approve(None),
            SubjectId::generate(),
            epoch(),
        )
        .expect("pending listing approves");
    listing
}

pub(super) fn rejected(mut listing: Listing) -> Listing {
    listing
        .decide(
            &VerificationDecision::reject(None),
            SubjectId::generate(),
            epoch(),
        )
        .expect("pending listing rejects");
    listing
}

/// Token-to-identity table standing in for a claims codec.
#[derive(Default)]
pub(super) struct StaticIdentities {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentities {
    pub(super) fn with(mut self, token: &str, identity: &Identity) -> Self {
        self.tokens.insert(token.to_string(), identity.clone());
        self
    }
}

impl ResolveIdentity for StaticIdentities {
    fn resolve(&self, token: Option<&str>) -> Option<Identity> {
        self.tokens.get(token?).cloned()
    }
}

pub(super) fn router(harness: &Harness, identities: StaticIdentities) -> axum::Router {
    listing_router(Arc::clone(&harness.service), Arc::new(identities))
}

pub(super) struct UnavailableStore;

impl ListingStore for UnavailableStore {
    fn insert(&self, _listing: Listing) -> Result<Listing, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ListingId) -> Result<Option<Listing>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn transact<T, E, F>(&self, _id: &ListingId, _apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut Listing) -> Result<T, E>,
        E: From<StoreError>,
    {
        Err(StoreError::Unavailable("database offline".to_string()).into())
    }

    fn increment_views(&self, _id: &ListingId) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn query(&self, _query: &ListingQuery) -> Result<Vec<Listing>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
