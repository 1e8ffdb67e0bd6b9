use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission token carried by an identity.
///
/// Tokens outside the known vocabulary are retained verbatim so that claims issued by newer
/// deployments survive a round trip through this service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Capability {
    BrowseProperties,
    SaveFavorites,
    ContactLandlord,
    ReceiveInquiries,
    CreateListing,
    AdminAccess,
    ManageUsers,
    VerifyProperties,
    Other(String),
}

impl Capability {
    pub fn as_str(&self) -> &str {
        match self {
            Capability::BrowseProperties => "browse_properties",
            Capability::SaveFavorites => "save_favorites",
            Capability::ContactLandlord => "contact_landlord",
            Capability::ReceiveInquiries => "receive_inquiries",
            Capability::CreateListing => "create_listing",
            Capability::AdminAccess => "admin_access",
            Capability::ManageUsers => "manage_users",
            Capability::VerifyProperties => "verify_properties",
            Capability::Other(token) => token,
        }
    }

    pub fn parse(token: &str) -> Self {
        match token.trim() {
            "browse_properties" => Capability::BrowseProperties,
            "save_favorites" => Capability::SaveFavorites,
            "contact_landlord" => Capability::ContactLandlord,
            "receive_inquiries" => Capability::ReceiveInquiries,
            "create_listing" => Capability::CreateListing,
            "admin_access" => Capability::AdminAccess,
            "manage_users" => Capability::ManageUsers,
            "verify_properties" => Capability::VerifyProperties,
            other => Capability::Other(other.to_string()),
        }
    }
}

impl From<String> for Capability {
    fn from(value: String) -> Self {
        Capability::parse(&value)
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of capabilities held by an identity. Absence from the set is the only way to lack one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities granted to every newly registered account.
    pub fn registration_defaults() -> Self {
        [Capability::BrowseProperties, Capability::SaveFavorites]
            .into_iter()
            .collect()
    }

    pub fn contains(&self, capability: &Capability) -> bool {
        self.0.contains(capability)
    }

    pub fn contains_any(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().any(|capability| self.0.contains(capability))
    }

    /// Returns `true` when the capability was not already present.
    pub fn grant(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    pub fn revoke(&mut self, capability: &Capability) -> bool {
        self.0.remove(capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Capability> for CapabilitySet {
    fn extend<I: IntoIterator<Item = Capability>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Ordered trust tier of an identity, independent of its capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VerificationLevel {
    #[default]
    Unverified,
    PhoneVerified,
    IdentityVerified,
    LandlordVerified,
    /// A stored value outside the known scale. Ranks as `Unverified`.
    Unrecognized(String),
}

impl VerificationLevel {
    /// Rank of the level on the trust scale. Total: unrecognized values rank 0.
    pub fn ordinal(&self) -> u8 {
        match self {
            VerificationLevel::Unverified => 0,
            VerificationLevel::PhoneVerified => 1,
            VerificationLevel::IdentityVerified => 2,
            VerificationLevel::LandlordVerified => 3,
            VerificationLevel::Unrecognized(_) => 0,
        }
    }

    pub fn at_least(&self, minimum: &VerificationLevel) -> bool {
        self.ordinal() >= minimum.ordinal()
    }

    pub fn as_str(&self) -> &str {
        match self {
            VerificationLevel::Unverified => "unverified",
            VerificationLevel::PhoneVerified => "phone_verified",
            VerificationLevel::IdentityVerified => "identity_verified",
            VerificationLevel::LandlordVerified => "landlord_verified",
            VerificationLevel::Unrecognized(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "unverified" => VerificationLevel::Unverified,
            "phone_verified" => VerificationLevel::PhoneVerified,
            "identity_verified" => VerificationLevel::IdentityVerified,
            "landlord_verified" => VerificationLevel::LandlordVerified,
            other => VerificationLevel::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for VerificationLevel {
    fn from(value: String) -> Self {
        VerificationLevel::parse(&value)
    }
}

impl From<VerificationLevel> for String {
    fn from(value: VerificationLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
