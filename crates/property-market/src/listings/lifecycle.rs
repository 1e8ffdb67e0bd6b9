//! Listing lifecycle: the verification axis and the availability status it drives.
//!
//! ```text
//! create / resubmit ──▶ pending_verification + pending
//!                            │
//!            approve ────────┼──────── reject
//!               ▼                         ▼
//!       verified + available      rejected + unavailable
//!               │                         │
//!               └──── resubmit documents ─┘──▶ pending_verification + pending
//! ```
//!
//! A decision is accepted only from `pending_verification`; the two axes always move together
//! inside one mutation so no reader can observe one without the other.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::documents::OwnershipDocument;
use super::domain::{Listing, ListingStatus, Verification, VerificationStatus};
use crate::access::SubjectId;

pub const DEFAULT_REJECTION_NOTE: &str =
    "Ownership documents did not meet verification requirements.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationAction {
    Approve,
    Reject,
}

impl FromStr for VerificationAction {
    type Err = LifecycleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(VerificationAction::Approve),
            "reject" => Ok(VerificationAction::Reject),
            _ => Err(LifecycleError::UnknownAction(raw.to_string())),
        }
    }
}

/// Admin verdict as submitted. The action stays a raw string so that an already decided
/// listing reports `AlreadyDecided` whatever the action says.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerificationDecision {
    pub action: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl VerificationDecision {
    pub fn approve(notes: Option<&str>) -> Self {
        Self {
            action: "approve".to_string(),
            notes: notes.map(str::to_string),
        }
    }

    pub fn reject(notes: Option<&str>) -> Self {
        Self {
            action: "reject".to_string(),
            notes: notes.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("listing is already {current}")]
    AlreadyDecided { current: VerificationStatus },
    #[error("action must be 'approve' or 'reject' (found '{0}')")]
    UnknownAction(String),
}

impl Listing {
    /// Apply an admin verdict. Only valid from `pending_verification`.
    pub fn decide(
        &mut self,
        decision: &VerificationDecision,
        admin: SubjectId,
        at: DateTime<Utc>,
    ) -> Result<VerificationAction, LifecycleError> {
        let current = self.verification_status();
        if current != VerificationStatus::PendingVerification {
            return Err(LifecycleError::AlreadyDecided { current });
        }

        let action: VerificationAction = decision.action.parse()?;
        let notes = decision
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(str::to_string);

        match action {
            VerificationAction::Approve => self.set_lifecycle(
                ListingStatus::Available,
                Verification::Verified {
                    by: admin,
                    at,
                    notes,
                },
            ),
            VerificationAction::Reject => self.set_lifecycle(
                ListingStatus::Unavailable,
                Verification::Rejected {
                    by: admin,
                    at,
                    notes: notes.unwrap_or_else(|| DEFAULT_REJECTION_NOTE.to_string()),
                },
            ),
        }

        Ok(action)
    }

    /// Replace the ownership proof and send the listing back for review.
    pub fn resubmit_documents(&mut self, documents: Vec<OwnershipDocument>) {
        self.ownership_documents = documents;
        self.set_lifecycle(ListingStatus::Pending, Verification::PendingVerification);
    }
}
