//! Visibility, filtering, relevance ranking, and pagination for listing reads.

use std::cmp::Ordering;

use serde::Deserialize;

use super::domain::{Listing, ListingType, PropertyType, VerificationStatus};
use crate::access::{Identity, SubjectId};

pub const MAX_PAGE_LIMIT: usize = 100;
pub const MIN_SEARCH_CHARS: usize = 2;

/// Field weights summed into the relevance score, highest first.
const RELEVANCE_WEIGHTS: [(SearchField, u32); 7] = [
    (SearchField::Title, 10),
    (SearchField::Address, 8),
    (SearchField::City, 7),
    (SearchField::State, 6),
    (SearchField::Landmark, 5),
    (SearchField::Lga, 4),
    (SearchField::Description, 3),
];

#[derive(Debug, Clone, Copy)]
enum SearchField {
    Title,
    Address,
    City,
    State,
    Landmark,
    Lga,
    Description,
}

impl SearchField {
    fn value(self, listing: &Listing) -> Option<&str> {
        let details = &listing.details;
        match self {
            SearchField::Title => Some(&details.title),
            SearchField::Address => Some(&details.address),
            SearchField::City => Some(&details.city),
            SearchField::State => Some(&details.state),
            SearchField::Landmark => details.landmark.as_deref(),
            SearchField::Lga => Some(&details.lga),
            SearchField::Description => Some(&details.description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("offset must be zero or greater (found {0})")]
    NegativeOffset(i64),
    #[error("limit must lie between 1 and {MAX_PAGE_LIMIT} (found {0})")]
    LimitOutOfRange(i64),
    #[error("search term must be at least {MIN_SEARCH_CHARS} characters")]
    SearchTooShort,
}

/// Validated offset/limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    offset: usize,
    limit: usize,
}

impl Page {
    pub fn new(offset: i64, limit: i64) -> Result<Self, QueryError> {
        let offset = usize::try_from(offset).map_err(|_| QueryError::NegativeOffset(offset))?;
        let limit = usize::try_from(limit)
            .ok()
            .filter(|limit| (1..=MAX_PAGE_LIMIT).contains(limit))
            .ok_or(QueryError::LimitOutOfRange(limit))?;
        Ok(Self { offset, limit })
    }

    pub fn first(limit: usize) -> Self {
        Self {
            offset: 0,
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub(crate) fn from_request(
        offset: Option<i64>,
        limit: Option<i64>,
        default_limit: usize,
    ) -> Result<Self, QueryError> {
        let default_limit = i64::try_from(default_limit).unwrap_or(MAX_PAGE_LIMIT as i64);
        Page::new(offset.unwrap_or(0), limit.unwrap_or(default_limit))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriceLow,
    PriceHigh,
    Relevance,
    MostViewed,
}

/// Which listings a caller may see before any filter is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Available and verified only.
    Public,
    /// Public listings plus the owner's own pending or rejected ones.
    WithOwnPending(SubjectId),
    /// Admin review queue: everything awaiting verification.
    PendingReview,
}

impl Visibility {
    pub fn admits(&self, listing: &Listing) -> bool {
        match self {
            Visibility::Public => listing.is_public(),
            Visibility::WithOwnPending(owner) => {
                listing.is_public()
                    || (listing.owner_id() == *owner
                        && matches!(
                            listing.verification_status(),
                            VerificationStatus::PendingVerification | VerificationStatus::Rejected
                        ))
            }
            Visibility::PendingReview => {
                listing.verification_status() == VerificationStatus::PendingVerification
            }
        }
    }
}

/// Conjunctive attribute filters. `state` and `city` match case-insensitive substrings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilters {
    pub state: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<PropertyType>,
    pub listing_type: Option<ListingType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_bedrooms: Option<u32>,
}

impl ListingFilters {
    pub fn matches(&self, listing: &Listing) -> bool {
        let details = &listing.details;

        if let Some(state) = &self.state {
            if !contains_ignore_case(&details.state, state) {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if !contains_ignore_case(&details.city, city) {
                return false;
            }
        }
        if self
            .property_type
            .is_some_and(|wanted| wanted != details.property_type)
        {
            return false;
        }
        if self
            .listing_type
            .is_some_and(|wanted| wanted != details.listing_type)
        {
            return false;
        }
        if self.min_price.is_some_and(|min| details.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| details.price > max) {
            return false;
        }
        match self.min_bedrooms.filter(|bedrooms| *bedrooms > 0) {
            Some(min) => details.bedrooms.is_some_and(|bedrooms| bedrooms >= min),
            None => true,
        }
    }
}

/// Public list request as received from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListingSearch {
    #[serde(alias = "offset")]
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<PropertyType>,
    pub listing_type: Option<ListingType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub bedrooms: Option<u32>,
    pub sort_by: SortOrder,
    pub show_pending: bool,
}

/// Fully validated read: who sees what, how it is narrowed, ordered, and windowed.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub visibility: Visibility,
    pub filters: ListingFilters,
    pub search: Option<String>,
    pub sort: SortOrder,
    pub page: Page,
}

impl ListingQuery {
    pub fn from_search(
        request: ListingSearch,
        caller: Option<&Identity>,
        default_limit: usize,
    ) -> Result<Self, QueryError> {
        let page = Page::from_request(request.skip, request.limit, default_limit)?;
        let search = normalize_search(request.search)?;

        let visibility = match caller.filter(|identity| identity.active) {
            Some(identity) if request.show_pending => {
                Visibility::WithOwnPending(identity.subject_id)
            }
            _ => Visibility::Public,
        };

        Ok(Self {
            visibility,
            filters: ListingFilters {
                state: non_blank(request.state),
                city: non_blank(request.city),
                property_type: request.property_type,
                listing_type: request.listing_type,
                min_price: request.min_price,
                max_price: request.max_price,
                min_bedrooms: request.bedrooms,
            },
            search,
            sort: request.sort_by,
            page,
        })
    }

    pub fn pending_review(page: Page) -> Self {
        Self {
            visibility: Visibility::PendingReview,
            filters: ListingFilters::default(),
            search: None,
            sort: SortOrder::Newest,
            page,
        }
    }

    /// Apply visibility, filters, search, ordering, and the page window to a snapshot.
    pub fn evaluate<I>(&self, listings: I) -> Vec<Listing>
    where
        I: IntoIterator<Item = Listing>,
    {
        let mut ranked: Vec<(u32, Listing)> = listings
            .into_iter()
            .filter(|listing| self.visibility.admits(listing) && self.filters.matches(listing))
            .filter_map(|listing| match &self.search {
                Some(term) => {
                    let score = relevance_score(&listing, term);
                    (score > 0).then_some((score, listing))
                }
                None => Some((0, listing)),
            })
            .collect();

        let by_relevance = self.search.is_some() && self.sort == SortOrder::Relevance;
        ranked.sort_by(|(left_score, left), (right_score, right)| {
            let primary = if by_relevance {
                right_score.cmp(left_score)
            } else {
                compare_by(self.sort, left, right)
            };
            primary
                .then_with(|| right.created_at.cmp(&left.created_at))
                .then_with(|| left.id.cmp(&right.id))
        });

        ranked
            .into_iter()
            .skip(self.page.offset)
            .take(self.page.limit)
            .map(|(_, listing)| listing)
            .collect()
    }
}

fn compare_by(sort: SortOrder, left: &Listing, right: &Listing) -> Ordering {
    match sort {
        SortOrder::Newest | SortOrder::Relevance => right.created_at.cmp(&left.created_at),
        SortOrder::Oldest => left.created_at.cmp(&right.created_at),
        SortOrder::PriceLow => left.details.price.total_cmp(&right.details.price),
        SortOrder::PriceHigh => right.details.price.total_cmp(&left.details.price),
        SortOrder::MostViewed => right.view_count().cmp(&left.view_count()),
    }
}

/// Sum of the weights of every field containing `term`, case-insensitively. Zero means no match.
pub fn relevance_score(listing: &Listing, term: &str) -> u32 {
    let needle = term.to_lowercase();
    RELEVANCE_WEIGHTS
        .iter()
        .filter(|(field, _)| {
            field
                .value(listing)
                .is_some_and(|value| value.to_lowercase().contains(&needle))
        })
        .map(|(_, weight)| weight)
        .sum()
}

fn normalize_search(raw: Option<String>) -> Result<Option<String>, QueryError> {
    match non_blank(raw) {
        Some(term) if term.chars().count() < MIN_SEARCH_CHARS => Err(QueryError::SearchTooShort),
        other => Ok(other),
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
