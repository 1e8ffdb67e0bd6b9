//! Capability vocabulary, identity resolution, and the access guards every operation runs
//! before touching state.

pub mod capability;
pub mod guard;
pub mod http;
pub mod identity;

pub use capability::{Capability, CapabilitySet, VerificationLevel};
pub use guard::{
    require_active, require_any_capability, require_capability, require_owner_or,
    require_verification_level, AccessDenied, Requirement,
};
pub use identity::{
    AccountDirectory, Claims, ClaimsCodec, ClaimsError, ClaimsIdentityResolver, Identity,
    IssuedCode, ResolveIdentity, SubjectId, UserAccount,
};
