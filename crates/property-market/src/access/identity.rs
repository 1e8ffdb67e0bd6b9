use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::capability::{CapabilitySet, VerificationLevel};
use crate::store::StoreError;

/// Opaque identifier of a marketplace account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub Uuid);

impl SubjectId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Resolved caller, built from the current account record rather than from token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject_id: SubjectId,
    pub capabilities: CapabilitySet,
    pub verification_level: VerificationLevel,
    pub active: bool,
}

/// Payload carried inside a signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject_id: SubjectId,
    #[serde(default)]
    pub capabilities: CapabilitySet,
    #[serde(default)]
    pub verification_level: VerificationLevel,
}

#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature or issuer rejected")]
    Rejected,
    #[error("token expired")]
    Expired,
}

/// Token issuance and parsing. Signing and password handling live behind this seam.
pub trait ClaimsCodec: Send + Sync {
    fn issue(&self, claims: &Claims) -> Result<String, ClaimsError>;
    fn decode(&self, token: &str) -> Result<Claims, ClaimsError>;
}

/// Outstanding phone verification code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCode {
    pub code: String,
    pub sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub failed_attempts: u32,
}

/// Stored account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub subject_id: SubjectId,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(default)]
    pub capabilities: CapabilitySet,
    #[serde(default)]
    pub verification_level: VerificationLevel,
    pub active: bool,
    #[serde(default)]
    pub pending_code: Option<IssuedCode>,
}

impl UserAccount {
    /// New account with the registration default capabilities.
    pub fn register(
        full_name: impl Into<String>,
        email: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: SubjectId::generate(),
            full_name: full_name.into(),
            email: email.into(),
            phone_number: phone_number.into(),
            capabilities: CapabilitySet::registration_defaults(),
            verification_level: VerificationLevel::Unverified,
            active: true,
            pending_code: None,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.subject_id,
            capabilities: self.capabilities.clone(),
            verification_level: self.verification_level.clone(),
            active: self.active,
        }
    }

    pub fn claims(&self) -> Claims {
        Claims {
            subject_id: self.subject_id,
            capabilities: self.capabilities.clone(),
            verification_level: self.verification_level.clone(),
        }
    }
}

/// Account storage consulted during identity resolution and verification upgrades.
pub trait AccountDirectory: Send + Sync {
    fn insert(&self, account: UserAccount) -> Result<UserAccount, StoreError>;
    fn fetch(&self, id: &SubjectId) -> Result<Option<UserAccount>, StoreError>;

    /// Apply `apply` to the stored account and commit only when it returns `Ok`.
    fn transact<T, E, F>(&self, id: &SubjectId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut UserAccount) -> Result<T, E>,
        E: From<StoreError>;
}

/// Maps an optional bearer token to the caller. Never fails: anything unusable yields `None`.
pub trait ResolveIdentity: Send + Sync {
    fn resolve(&self, token: Option<&str>) -> Option<Identity>;
}

/// Resolver decoding claims and then loading the live account behind the subject, so a
/// deactivated or downgraded account cannot act on stale claims.
pub struct ClaimsIdentityResolver<C, D> {
    codec: Arc<C>,
    directory: Arc<D>,
}

impl<C, D> ClaimsIdentityResolver<C, D>
where
    C: ClaimsCodec,
    D: AccountDirectory,
{
    pub fn new(codec: Arc<C>, directory: Arc<D>) -> Self {
        Self { codec, directory }
    }
}

impl<C, D> ResolveIdentity for ClaimsIdentityResolver<C, D>
where
    C: ClaimsCodec,
    D: AccountDirectory,
{
    fn resolve(&self, token: Option<&str>) -> Option<Identity> {
        let token = token.map(str::trim).filter(|token| !token.is_empty())?;

        let claims = match self.codec.decode(token) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(error = %err, "discarding unusable access token");
                return None;
            }
        };

        match self.directory.fetch(&claims.subject_id) {
            Ok(Some(account)) => Some(account.identity()),
            Ok(None) => {
                debug!(subject = %claims.subject_id, "token subject has no account");
                None
            }
            Err(err) => {
                debug!(subject = %claims.subject_id, error = %err, "account lookup failed");
                None
            }
        }
    }
}
