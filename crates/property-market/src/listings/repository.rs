use super::domain::{Listing, ListingId};
use super::query::ListingQuery;
use crate::store::StoreError;

/// Storage abstraction so the listing service can be exercised in isolation.
pub trait ListingStore: Send + Sync {
    fn insert(&self, listing: Listing) -> Result<Listing, StoreError>;
    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, StoreError>;

    /// Run `apply` against the stored listing and commit only when it returns `Ok`. Readers
    /// never observe a partially applied mutation.
    fn transact<T, E, F>(&self, id: &ListingId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut Listing) -> Result<T, E>,
        E: From<StoreError>;

    /// Atomically bump the view counter in place and return the new count.
    fn increment_views(&self, id: &ListingId) -> Result<u64, StoreError>;

    fn query(&self, query: &ListingQuery) -> Result<Vec<Listing>, StoreError>;
}
