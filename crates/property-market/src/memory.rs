//! Process-local stores backing tests, the demo command, and single-node deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::access::{AccountDirectory, SubjectId, UserAccount};
use crate::listings::domain::{Listing, ListingId};
use crate::listings::query::ListingQuery;
use crate::listings::repository::ListingStore;
use crate::store::StoreError;

struct StoredListing {
    listing: Listing,
    views: Arc<AtomicU64>,
}

impl StoredListing {
    fn snapshot(&self) -> Listing {
        self.listing
            .clone()
            .with_view_count(self.views.load(Ordering::Acquire))
    }
}

/// Listing store keeping records behind a read/write lock. View counters live beside the
/// record as atomics, so increments only ever take the read lock.
#[derive(Default)]
pub struct InMemoryListingStore {
    listings: RwLock<HashMap<ListingId, StoredListing>>,
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.listings
            .read()
            .expect("listing store lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ListingStore for InMemoryListingStore {
    fn insert(&self, listing: Listing) -> Result<Listing, StoreError> {
        let mut guard = self
            .listings
            .write()
            .expect("listing store lock poisoned");
        if guard.contains_key(&listing.id) {
            return Err(StoreError::Conflict);
        }
        let views = Arc::new(AtomicU64::new(listing.view_count()));
        guard.insert(
            listing.id,
            StoredListing {
                listing: listing.clone(),
                views,
            },
        );
        Ok(listing)
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, StoreError> {
        let guard = self.listings.read().expect("listing store lock poisoned");
        Ok(guard.get(id).map(StoredListing::snapshot))
    }

    fn transact<T, E, F>(&self, id: &ListingId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut Listing) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut guard = self
            .listings
            .write()
            .expect("listing store lock poisoned");
        let stored = guard.get_mut(id).ok_or(StoreError::NotFound)?;

        let mut draft = stored.snapshot();
        let outcome = apply(&mut draft)?;
        stored.listing = draft;
        Ok(outcome)
    }

    fn increment_views(&self, id: &ListingId) -> Result<u64, StoreError> {
        let guard = self.listings.read().expect("listing store lock poisoned");
        let stored = guard.get(id).ok_or(StoreError::NotFound)?;
        Ok(stored.views.fetch_add(1, Ordering::AcqRel) + 1)
    }

    fn query(&self, query: &ListingQuery) -> Result<Vec<Listing>, StoreError> {
        let guard = self.listings.read().expect("listing store lock poisoned");
        Ok(query.evaluate(guard.values().map(StoredListing::snapshot)))
    }
}

/// Account directory guarded by a single mutex.
#[derive(Default)]
pub struct InMemoryAccountDirectory {
    accounts: Mutex<HashMap<SubjectId, UserAccount>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = UserAccount>) -> Self {
        let directory = Self::new();
        {
            let mut guard = directory
                .accounts
                .lock()
                .expect("account directory mutex poisoned");
            for account in accounts {
                guard.insert(account.subject_id, account);
            }
        }
        directory
    }
}

impl AccountDirectory for InMemoryAccountDirectory {
    fn insert(&self, account: UserAccount) -> Result<UserAccount, StoreError> {
        let mut guard = self
            .accounts
            .lock()
            .expect("account directory mutex poisoned");
        if guard.contains_key(&account.subject_id) {
            return Err(StoreError::Conflict);
        }
        if guard
            .values()
            .any(|existing| existing.phone_number == account.phone_number)
        {
            return Err(StoreError::Conflict);
        }
        guard.insert(account.subject_id, account.clone());
        Ok(account)
    }

    fn fetch(&self, id: &SubjectId) -> Result<Option<UserAccount>, StoreError> {
        let guard = self
            .accounts
            .lock()
            .expect("account directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn transact<T, E, F>(&self, id: &SubjectId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut UserAccount) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut guard = self
            .accounts
            .lock()
            .expect("account directory mutex poisoned");
        let stored = guard.get_mut(id).ok_or(StoreError::NotFound)?;

        let mut draft = stored.clone();
        let outcome = apply(&mut draft)?;
        *stored = draft;
        Ok(outcome)
    }
}
