use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::documents::OwnershipDocument;
use crate::access::SubjectId;

/// Identifier wrapper for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub Uuid);

impl ListingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    House,
    Land,
    Commercial,
    Shop,
    Office,
    Warehouse,
    EventCenter,
    Shortlet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Rent,
    Sale,
    Lease,
    Shortlet,
}

/// Marketplace availability of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Rented,
    Sold,
    Pending,
    Unavailable,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Rented => "rented",
            ListingStatus::Sold => "sold",
            ListingStatus::Pending => "pending",
            ListingStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Moderation state of a listing's ownership proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    PendingVerification,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::PendingVerification => "pending_verification",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            VerificationStatus::Verified | VerificationStatus::Rejected
        )
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Owner-editable description of the property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingDetails {
    pub title: String,
    pub description: String,
    pub property_type: PropertyType,
    pub listing_type: ListingType,
    pub address: String,
    pub city: String,
    pub state: String,
    pub lga: String,
    #[serde(default)]
    pub landmark: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<u32>,
    #[serde(default)]
    pub toilets: Option<u32>,
    #[serde(default)]
    pub square_meters: Option<f64>,
    #[serde(default)]
    pub plot_size: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingImage {
    pub image_url: String,
    pub is_main: bool,
    pub caption: Option<String>,
    pub display_order: u32,
}

impl ListingImage {
    /// Order locators as stored; the first becomes the main image.
    pub fn from_locators(locators: Vec<String>, captions: &[String]) -> Vec<ListingImage> {
        locators
            .into_iter()
            .enumerate()
            .map(|(index, image_url)| ListingImage {
                image_url,
                is_main: index == 0,
                caption: captions
                    .get(index)
                    .map(|caption| caption.trim())
                    .filter(|caption| !caption.is_empty())
                    .map(str::to_string),
                display_order: index as u32,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingVideo {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub title: Option<String>,
    pub duration_secs: Option<u32>,
}

impl ListingVideo {
    /// External video link (YouTube, Vimeo). Blank input means "no video".
    pub fn from_url(raw: &str) -> Option<ListingVideo> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(ListingVideo {
            video_url: trimmed.to_string(),
            thumbnail_url: None,
            title: None,
            duration_secs: None,
        })
    }
}

/// Verification axis of the lifecycle. A terminal decision always carries its author and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Verification {
    PendingVerification,
    Verified {
        by: SubjectId,
        at: DateTime<Utc>,
        notes: Option<String>,
    },
    Rejected {
        by: SubjectId,
        at: DateTime<Utc>,
        notes: String,
    },
}

impl Verification {
    pub fn status(&self) -> VerificationStatus {
        match self {
            Verification::PendingVerification => VerificationStatus::PendingVerification,
            Verification::Verified { .. } => VerificationStatus::Verified,
            Verification::Rejected { .. } => VerificationStatus::Rejected,
        }
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            Verification::PendingVerification => None,
            Verification::Verified { notes, .. } => notes.as_deref(),
            Verification::Rejected { notes, .. } => Some(notes),
        }
    }

    pub fn decided_by(&self) -> Option<(SubjectId, DateTime<Utc>)> {
        match self {
            Verification::PendingVerification => None,
            Verification::Verified { by, at, .. } | Verification::Rejected { by, at, .. } => {
                Some((*by, *at))
            }
        }
    }
}

/// A property listing. Lifecycle-governed fields are private and only move through the
/// transitions in `lifecycle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    owner_id: SubjectId,
    pub details: ListingDetails,
    status: ListingStatus,
    verification: Verification,
    pub(crate) ownership_documents: Vec<OwnershipDocument>,
    pub images: Vec<ListingImage>,
    pub video: Option<ListingVideo>,
    view_count: u64,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Listing {
    pub(crate) fn from_parts(
        id: ListingId,
        owner_id: SubjectId,
        details: ListingDetails,
        ownership_documents: Vec<OwnershipDocument>,
        images: Vec<ListingImage>,
        video: Option<ListingVideo>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            details,
            status: ListingStatus::Pending,
            verification: Verification::PendingVerification,
            ownership_documents,
            images,
            video,
            view_count: 0,
            is_featured: false,
            created_at,
            updated_at: None,
        }
    }

    pub fn owner_id(&self) -> SubjectId {
        self.owner_id
    }

    pub fn status(&self) -> ListingStatus {
        self.status
    }

    pub fn verification(&self) -> &Verification {
        &self.verification
    }

    pub fn verification_status(&self) -> VerificationStatus {
        self.verification.status()
    }

    pub fn ownership_documents(&self) -> &[OwnershipDocument] {
        &self.ownership_documents
    }

    pub fn view_count(&self) -> u64 {
        self.view_count
    }

    pub fn main_image(&self) -> Option<&str> {
        self.images.first().map(|image| image.image_url.as_str())
    }

    /// Publicly discoverable: available for the market and verified by an admin.
    pub fn is_public(&self) -> bool {
        self.status == ListingStatus::Available
            && self.verification_status() == VerificationStatus::Verified
    }

    pub(crate) fn set_lifecycle(&mut self, status: ListingStatus, verification: Verification) {
        self.status = status;
        self.verification = verification;
    }

    #[cfg(test)]
    pub(crate) fn set_status(&mut self, status: ListingStatus) {
        self.status = status;
    }

    pub(crate) fn with_view_count(mut self, view_count: u64) -> Self {
        self.view_count = view_count;
        self
    }

    pub fn view(&self) -> ListingView {
        let decided = self.verification.decided_by();
        ListingView {
            id: self.id,
            owner_id: self.owner_id,
            details: self.details.clone(),
            status: self.status,
            verification_status: self.verification_status(),
            ownership_documents: self.ownership_documents.clone(),
            verification_notes: self.verification.notes().map(str::to_string),
            verified_by: decided.map(|(by, _)| by),
            verified_at: decided.map(|(_, at)| at),
            view_count: self.view_count,
            is_featured: self.is_featured,
            main_image: self.main_image().map(str::to_string),
            images: self.images.clone(),
            video: self.video.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Flat representation returned to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct ListingView {
    pub id: ListingId,
    pub owner_id: SubjectId,
    #[serde(flatten)]
    pub details: ListingDetails,
    pub status: ListingStatus,
    pub verification_status: VerificationStatus,
    pub ownership_documents: Vec<OwnershipDocument>,
    pub verification_notes: Option<String>,
    pub verified_by: Option<SubjectId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub view_count: u64,
    pub is_featured: bool,
    pub main_image: Option<String>,
    pub images: Vec<ListingImage>,
    pub video: Option<ListingVideo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
