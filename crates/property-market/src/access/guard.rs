use std::fmt;

use super::capability::{Capability, VerificationLevel};
use super::identity::{Identity, SubjectId};

/// The permission a denied caller was missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Capability(Capability),
    AnyOf(Vec<Capability>),
    OwnerOr(Capability),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Capability(capability) => write!(f, "{capability}"),
            Requirement::AnyOf(capabilities) => {
                let tokens: Vec<&str> = capabilities.iter().map(Capability::as_str).collect();
                write!(f, "one of [{}]", tokens.join(", "))
            }
            Requirement::OwnerOr(capability) => write!(f, "ownership or {capability}"),
        }
    }
}

/// Outcome of a failed access decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("account is deactivated")]
    AccountInactive,
    #[error("missing required capability: {required}")]
    InsufficientCapability { required: Requirement },
    #[error("verification level too low: required {required}, found {found}")]
    InsufficientVerification {
        required: VerificationLevel,
        found: VerificationLevel,
    },
}

/// Admits any present, active identity.
///
/// Every other guard runs this first, so an inactive account is rejected before its
/// capabilities are looked at.
pub fn require_active(identity: Option<&Identity>) -> Result<&Identity, AccessDenied> {
    let identity = identity.ok_or(AccessDenied::Unauthenticated)?;
    if !identity.active {
        return Err(AccessDenied::AccountInactive);
    }
    Ok(identity)
}

pub fn require_capability<'a>(
    identity: Option<&'a Identity>,
    capability: &Capability,
) -> Result<&'a Identity, AccessDenied> {
    let identity = require_active(identity)?;
    if identity.capabilities.contains(capability) {
        Ok(identity)
    } else {
        Err(AccessDenied::InsufficientCapability {
            required: Requirement::Capability(capability.clone()),
        })
    }
}

pub fn require_any_capability<'a>(
    identity: Option<&'a Identity>,
    capabilities: &[Capability],
) -> Result<&'a Identity, AccessDenied> {
    let identity = require_active(identity)?;
    if identity.capabilities.contains_any(capabilities) {
        Ok(identity)
    } else {
        Err(AccessDenied::InsufficientCapability {
            required: Requirement::AnyOf(capabilities.to_vec()),
        })
    }
}

pub fn require_verification_level<'a>(
    identity: Option<&'a Identity>,
    minimum: &VerificationLevel,
) -> Result<&'a Identity, AccessDenied> {
    let identity = require_active(identity)?;
    if identity.verification_level.at_least(minimum) {
        Ok(identity)
    } else {
        Err(AccessDenied::InsufficientVerification {
            required: minimum.clone(),
            found: identity.verification_level.clone(),
        })
    }
}

/// Admits the resource owner, or anyone holding `override_capability`.
pub fn require_owner_or<'a>(
    identity: Option<&'a Identity>,
    owner: &SubjectId,
    override_capability: &Capability,
) -> Result<&'a Identity, AccessDenied> {
    let identity = require_active(identity)?;
    if identity.subject_id == *owner || identity.capabilities.contains(override_capability) {
        Ok(identity)
    } else {
        Err(AccessDenied::InsufficientCapability {
            required: Requirement::OwnerOr(override_capability.clone()),
        })
    }
}
