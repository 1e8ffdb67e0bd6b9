//! Authorization, listing lifecycle, and ranked discovery for a moderated property marketplace.

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod listings;
pub mod media;
pub mod memory;
pub mod store;
pub mod telemetry;
pub mod verification;
