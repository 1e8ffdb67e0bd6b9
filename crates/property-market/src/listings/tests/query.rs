use super::common::*;

use crate::access::SubjectId;
use crate::listings::domain::{Listing, ListingId, ListingStatus, ListingType, PropertyType};
use crate::listings::query::{
    relevance_score, ListingQuery, ListingSearch, Page, QueryError, SortOrder, Visibility,
};

fn public_query() -> ListingQuery {
    ListingQuery::from_search(ListingSearch::default(), None, 20).expect("default query")
}

#[test]
fn relevance_sums_weights_of_matching_fields() {
    let mut heights = listing_at("Lagos Heights duplex", "Lagos", 1.0, 0);
    heights.details.state = "Ogun".to_string();
    heights.details.lga = "Ikeja".to_string();
    heights.details.landmark = None;
    assert_eq!(relevance_score(&heights, "Lagos"), 17);
    assert_eq!(relevance_score(&heights, "lagos"), 17);

    let mut island = listing_at("Quiet flat", "Abuja", 1.0, 0);
    island.details.state = "FCT".to_string();
    island.details.lga = "Lagos Island".to_string();
    island.details.landmark = None;
    assert_eq!(relevance_score(&island, "Lagos"), 4);

    let mut everywhere = listing_at("Lagos loft", "Lagos", 1.0, 0);
    everywhere.details.address = "1 Lagos Road".to_string();
    everywhere.details.landmark = Some("Lagos Marina".to_string());
    everywhere.details.lga = "Lagos Mainland".to_string();
    everywhere.details.description = "Heart of Lagos".to_string();
    assert_eq!(relevance_score(&everywhere, "LAGOS"), 43);

    assert_eq!(relevance_score(&island, "Kano"), 0);
}

#[test]
fn search_excludes_listings_without_any_matching_field() {
    let mut lagos = approved(listing_at("Lagos Heights duplex", "Lagos", 1.0, 0));
    lagos.details.lga = "Ikeja".to_string();
    let mut kano = approved(listing_at("Kano bungalow", "Kano", 1.0, 1));
    kano.details.state = "Kano".to_string();
    kano.details.landmark = None;
    kano.details.lga = "Nassarawa".to_string();
    kano.details.address = "Zoo Road".to_string();

    let query = ListingQuery::from_search(
        ListingSearch {
            search: Some("  lagos ".to_string()),
            ..ListingSearch::default()
        },
        None,
        20,
    )
    .expect("valid search");

    let results = query.evaluate(vec![lagos.clone(), kano]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, lagos.id);
}

#[test]
fn relevance_ordering_breaks_ties_by_newest() {
    let mut strong = approved(listing_at("Lagos penthouse", "Lagos", 1.0, 0));
    strong.details.lga = "Ikeja".to_string();
    let mut weak_old = approved(listing_at("Quiet flat", "Abuja", 1.0, 1));
    weak_old.details.state = "FCT".to_string();
    weak_old.details.landmark = None;
    weak_old.details.lga = "Lagos Island".to_string();
    let mut weak_new = weak_old.clone();
    weak_new.id = ListingId::generate();
    weak_new.created_at = weak_old.created_at + chrono::Duration::minutes(5);

    let query = ListingQuery::from_search(
        ListingSearch {
            search: Some("Lagos".to_string()),
            sort_by: SortOrder::Relevance,
            ..ListingSearch::default()
        },
        None,
        20,
    )
    .expect("valid search");

    let ids: Vec<_> = query
        .evaluate(vec![weak_old.clone(), strong.clone(), weak_new.clone()])
        .into_iter()
        .map(|listing| listing.id)
        .collect();
    assert_eq!(ids, vec![strong.id, weak_new.id, weak_old.id]);
}

#[test]
fn relevance_sort_without_a_term_falls_back_to_newest() {
    let older = approved(listing_at("Older", "Lekki", 1.0, 0));
    let newer = approved(listing_at("Newer", "Lekki", 1.0, 10));
    let query = ListingQuery::from_search(
        ListingSearch {
            sort_by: SortOrder::Relevance,
            ..ListingSearch::default()
        },
        None,
        20,
    )
    .expect("valid query");

    let results = query.evaluate(vec![older.clone(), newer.clone()]);
    assert_eq!(results[0].id, newer.id);
}

#[test]
fn default_visibility_shows_only_available_and_verified() {
    let public = approved(listing_at("Public", "Lekki", 1.0, 0));
    let pending = listing_at("Pending", "Lekki", 1.0, 1);
    let declined = rejected(listing_at("Declined", "Lekki", 1.0, 2));
    let mut let_out = approved(listing_at("Let out", "Lekki", 1.0, 3));
    let_out.set_status(ListingStatus::Rented);

    let results = public_query().evaluate(vec![
        public.clone(),
        pending,
        declined,
        let_out,
    ]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, public.id);
}

#[test]
fn owners_opt_in_to_their_own_pending_and_rejected_listings() {
    let caller = landlord();
    let own_pending = with_owner(listing_at("Mine pending", "Lekki", 1.0, 0), caller.subject_id);
    let own_rejected = rejected(with_owner(
        listing_at("Mine rejected", "Lekki", 1.0, 1),
        caller.subject_id,
    ));
    let someone_elses = listing_at("Theirs pending", "Lekki", 1.0, 2);
    let public = approved(listing_at("Public", "Lekki", 1.0, 3));
    let all = vec![
        own_pending.clone(),
        own_rejected.clone(),
        someone_elses.clone(),
        public.clone(),
    ];

    let opted_in = ListingQuery::from_search(
        ListingSearch {
            show_pending: true,
            ..ListingSearch::default()
        },
        Some(&caller),
        20,
    )
    .expect("valid query");
    assert_eq!(opted_in.visibility, Visibility::WithOwnPending(caller.subject_id));
    let ids: Vec<_> = opted_in
        .evaluate(all.clone())
        .into_iter()
        .map(|listing| listing.id)
        .collect();
    assert_eq!(ids, vec![public.id, own_rejected.id, own_pending.id]);

    let without_flag =
        ListingQuery::from_search(ListingSearch::default(), Some(&caller), 20).expect("query");
    assert_eq!(without_flag.evaluate(all.clone()).len(), 1);

    let anonymous = ListingQuery::from_search(
        ListingSearch {
            show_pending: true,
            ..ListingSearch::default()
        },
        None,
        20,
    )
    .expect("query");
    assert_eq!(anonymous.visibility, Visibility::Public);

    let inactive = deactivated(caller.clone());
    let stale = ListingQuery::from_search(
        ListingSearch {
            show_pending: true,
            ..ListingSearch::default()
        },
        Some(&inactive),
        20,
    )
    .expect("query");
    assert_eq!(stale.visibility, Visibility::Public);
}

fn with_owner(listing: Listing, owner: SubjectId) -> Listing {
    Listing::from_parts(
        listing.id,
        owner,
        listing.details,
        listing.ownership_documents,
        listing.images,
        listing.video,
        listing.created_at,
    )
}

#[test]
fn filters_are_conjunctive() {
    let mut lekki_house = approved(listing_at("House", "Lekki", 3_000_000.0, 0));
    lekki_house.details.bedrooms = Some(4);
    let mut lekki_land = approved(listing_at("Land", "Lekki", 2_000_000.0, 1));
    lekki_land.details.property_type = PropertyType::Land;
    lekki_land.details.listing_type = ListingType::Sale;
    lekki_land.details.bedrooms = None;
    let mut ikeja_house = approved(listing_at("House", "Ikeja GRA", 3_500_000.0, 2));
    ikeja_house.details.bedrooms = Some(2);
    let all = vec![lekki_house.clone(), lekki_land.clone(), ikeja_house.clone()];

    let run = |search: ListingSearch| -> Vec<_> {
        ListingQuery::from_search(search, None, 20)
            .expect("valid query")
            .evaluate(all.clone())
            .into_iter()
            .map(|listing| listing.id)
            .collect()
    };

    assert_eq!(
        run(ListingSearch {
            city: Some("lek".to_string()),
            property_type: Some(PropertyType::House),
            ..ListingSearch::default()
        }),
        vec![lekki_house.id]
    );
    assert_eq!(
        run(ListingSearch {
            listing_type: Some(ListingType::Sale),
            ..ListingSearch::default()
        }),
        vec![lekki_land.id]
    );
    assert_eq!(
        run(ListingSearch {
            min_price: Some(2_500_000.0),
            max_price: Some(3_000_000.0),
            ..ListingSearch::default()
        }),
        vec![lekki_house.id]
    );
    assert_eq!(
        run(ListingSearch {
            bedrooms: Some(3),
            ..ListingSearch::default()
        }),
        vec![lekki_house.id]
    );
    assert_eq!(
        run(ListingSearch {
            bedrooms: Some(0),
            state: Some("LAGOS".to_string()),
            ..ListingSearch::default()
        })
        .len(),
        3
    );
}

#[test]
fn sort_orders_use_newest_as_the_tie_break() {
    let cheap_old = approved(listing_at("Cheap old", "Lekki", 1_000.0, 0));
    let cheap_new = approved(listing_at("Cheap new", "Lekki", 1_000.0, 5));
    let dear = approved(listing_at("Dear", "Lekki", 9_000.0, 2));
    let all = vec![cheap_old.clone(), dear.clone(), cheap_new.clone()];

    let order = |sort_by: SortOrder| -> Vec<_> {
        ListingQuery::from_search(
            ListingSearch {
                sort_by,
                ..ListingSearch::default()
            },
            None,
            20,
        )
        .expect("valid query")
        .evaluate(all.clone())
        .into_iter()
        .map(|listing| listing.id)
        .collect()
    };

    assert_eq!(
        order(SortOrder::Newest),
        vec![cheap_new.id, dear.id, cheap_old.id]
    );
    assert_eq!(
        order(SortOrder::Oldest),
        vec![cheap_old.id, dear.id, cheap_new.id]
    );
    assert_eq!(
        order(SortOrder::PriceLow),
        vec![cheap_new.id, cheap_old.id, dear.id]
    );
    assert_eq!(
        order(SortOrder::PriceHigh),
        vec![dear.id, cheap_new.id, cheap_old.id]
    );
}

#[test]
fn most_viewed_orders_by_view_count() {
    let quiet = approved(listing_at("Quiet", "Lekki", 1.0, 9)).with_view_count(2);
    let popular = approved(listing_at("Popular", "Lekki", 1.0, 0)).with_view_count(40);
    let query = ListingQuery::from_search(
        ListingSearch {
            sort_by: SortOrder::MostViewed,
            ..ListingSearch::default()
        },
        None,
        20,
    )
    .expect("valid query");

    let results = query.evaluate(vec![quiet.clone(), popular.clone()]);
    assert_eq!(results[0].id, popular.id);
    assert_eq!(results[1].id, quiet.id);
}

#[test]
fn page_bounds_are_rejected_not_clamped() {
    assert_eq!(Page::new(0, 0), Err(QueryError::LimitOutOfRange(0)));
    assert_eq!(Page::new(0, 101), Err(QueryError::LimitOutOfRange(101)));
    assert_eq!(Page::new(-1, 20), Err(QueryError::NegativeOffset(-1)));
    assert!(Page::new(0, 100).is_ok());

    let search = ListingSearch {
        limit: Some(101),
        ..ListingSearch::default()
    };
    assert_eq!(
        ListingQuery::from_search(search, None, 20),
        Err(QueryError::LimitOutOfRange(101))
    );
}

#[test]
fn short_search_terms_are_invalid() {
    let search = ListingSearch {
        search: Some(" a ".to_string()),
        ..ListingSearch::default()
    };
    assert_eq!(
        ListingQuery::from_search(search, None, 20),
        Err(QueryError::SearchTooShort)
    );

    let blank = ListingSearch {
        search: Some("   ".to_string()),
        ..ListingSearch::default()
    };
    let query = ListingQuery::from_search(blank, None, 20).expect("blank search ignored");
    assert_eq!(query.search, None);
}

#[test]
fn full_pages_come_from_the_ordered_sequence() {
    let listings: Vec<_> = (0..250_i64)
        .map(|index| {
            approved(listing_at(
                &format!("Unit {index}"),
                "Lekki",
                ((index * 37) % 250) as f64,
                index,
            ))
        })
        .collect();

    let query = ListingQuery::from_search(
        ListingSearch {
            limit: Some(100),
            skip: Some(0),
            sort_by: SortOrder::PriceLow,
            ..ListingSearch::default()
        },
        None,
        20,
    )
    .expect("valid query");

    let page = query.evaluate(listings.clone());
    assert_eq!(page.len(), 100);
    assert!(page
        .windows(2)
        .all(|pair| pair[0].details.price <= pair[1].details.price));
    assert_eq!(page[0].details.price, 0.0);
    assert_eq!(page[99].details.price, 99.0);

    let tail = ListingQuery::from_search(
        ListingSearch {
            limit: Some(100),
            skip: Some(200),
            ..ListingSearch::default()
        },
        None,
        20,
    )
    .expect("valid query")
    .evaluate(listings);
    assert_eq!(tail.len(), 50);
}

#[test]
fn pending_review_ignores_public_visibility() {
    let pending = listing_at("Pending", "Lekki", 1.0, 0);
    let public = approved(listing_at("Public", "Lekki", 1.0, 1));
    let declined = rejected(listing_at("Declined", "Lekki", 1.0, 2));

    let results = ListingQuery::pending_review(Page::first(50)).evaluate(vec![
        pending.clone(),
        public,
        declined,
    ]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, pending.id);
}
