//! Phone ownership verification: the only self-service step up the verification scale.

pub mod phone;
pub mod router;
pub mod service;


pub use phone::{normalize_phone, InvalidPhoneNumber};
pub use router::{verification_router, VerificationRouterState};
pub use service::{
    CodeDispatch, CodeSender, DeliveryError, PhoneVerificationService, VerificationError,
    VerificationOutcome, VerificationStatusView,
};
