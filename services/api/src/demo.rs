use crate::infra::DevClaimsCodec;
use clap::Args;
use property_market::access::{
    AccountDirectory, Capability, ClaimsCodec, Identity, SubjectId, UserAccount, VerificationLevel,
};
use property_market::config::{ListingConfig, MediaConfig, VerificationConfig};
use property_market::error::AppError;
use property_market::listings::{
    ListingDetails, ListingSearch, ListingService, ListingType, NewListing,
    PropertyType, SortOrder, VerificationDecision,
};
use property_market::media::{ImagePolicy, ImageUpload, InMemoryMediaStore};
use property_market::memory::{InMemoryAccountDirectory, InMemoryListingStore};
use property_market::verification::{CodeSender, DeliveryError, PhoneVerificationService};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Title of the listing the demo landlord submits.
    #[arg(long)]
    pub(crate) title: Option<String>,
    /// City of the demo listing.
    #[arg(long)]
    pub(crate) city: Option<String>,
    /// Reject the listing during moderation instead of approving it.
    #[arg(long)]
    pub(crate) reject: bool,
}

/// Account created for local runs, together with a development bearer token.
pub(crate) struct SeededAccount {
    pub(crate) role: &'static str,
    pub(crate) account: UserAccount,
    pub(crate) token: String,
}

/// Register a landlord, a moderator, and a tenant.
pub(crate) fn seed_accounts<D>(
    directory: &D,
    codec: &DevClaimsCodec,
) -> Result<Vec<SeededAccount>, AppError>
where
    D: AccountDirectory,
{
    let mut landlord = UserAccount::register("Chinedu Eze", "chinedu@example.ng", "08021110001");
    landlord.capabilities.extend([
        Capability::CreateListing,
        Capability::ReceiveInquiries,
        Capability::ContactLandlord,
    ]);
    landlord.verification_level = VerificationLevel::IdentityVerified;

    let mut moderator =
        UserAccount::register("Moderation Desk", "moderation@example.ng", "08021110002");
    moderator.capabilities.extend([
        Capability::AdminAccess,
        Capability::VerifyProperties,
        Capability::ManageUsers,
    ]);
    moderator.verification_level = VerificationLevel::IdentityVerified;

    let tenant = UserAccount::register("Adaeze Okafor", "adaeze@example.ng", "08031234567");

    let mut seeded = Vec::new();
    for (role, account) in [
        ("landlord", landlord),
        ("moderator", moderator),
        ("tenant", tenant),
    ] {
        let account = directory.insert(account)?;
        let token = match codec.issue(&account.claims()) {
            Ok(token) => token,
            Err(err) => {
                warn!(role, error = %err, "could not issue a development token");
                continue;
            }
        };
        seeded.push(SeededAccount {
            role,
            account,
            token,
        });
    }
    Ok(seeded)
}

/// Keeps the last code so the demo can complete phone verification unattended.
#[derive(Default)]
struct CapturingCodeSender {
    last: Mutex<Option<String>>,
}

impl CapturingCodeSender {
    fn take(&self) -> Option<String> {
        self.last.lock().expect("code sender mutex poisoned").take()
    }
}

impl CodeSender for CapturingCodeSender {
    fn deliver(&self, _phone_number: &str, code: &str) -> Result<(), DeliveryError> {
        *self.last.lock().expect("code sender mutex poisoned") = Some(code.to_string());
        Ok(())
    }
}

fn demo_listing(title: String, city: String) -> NewListing {
    NewListing {
        details: ListingDetails {
            title,
            description: "Newly built terrace duplex with fitted kitchen and borehole".to_string(),
            property_type: PropertyType::House,
            listing_type: ListingType::Rent,
            address: "14 Palm Avenue".to_string(),
            city,
            state: "Lagos".to_string(),
            lga: "Eti-Osa".to_string(),
            landmark: Some("Opposite the Chevron roundabout".to_string()),
            price: 6_500_000.0,
            bedrooms: Some(4),
            bathrooms: Some(4),
            toilets: Some(5),
            square_meters: Some(280.0),
            plot_size: None,
            features: vec!["Borehole".to_string(), "Fitted kitchen".to_string()],
        },
        ownership_documents: json!([
            { "document_type": "Certificate of Occupancy (C of O)", "co_number": "LAG/C-O/2024/00481" },
            { "document_type": "Survey Plan", "surveyor": "Adewale & Co" }
        ]),
        images: vec![
            ImageUpload {
                filename: "front.jpg".to_string(),
                content_type: Some("image/jpeg".to_string()),
                bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
            },
            ImageUpload {
                filename: "living-room.png".to_string(),
                content_type: Some("application/octet-stream".to_string()),
                bytes: vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A],
            },
        ],
        image_captions: vec!["Front elevation".to_string(), "Living room".to_string()],
        video_url: Some(" https://youtu.be/palm-avenue-tour ".to_string()),
    }
}

fn public_count(
    service: &ListingService<InMemoryListingStore, InMemoryMediaStore>,
    caller: Option<&Identity>,
    search: ListingSearch,
) -> usize {
    match service.list(caller, search) {
        Ok(listings) => listings.len(),
        Err(err) => {
            println!("  Search failed: {}", err);
            0
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        title,
        city,
        reject,
    } = args;
    let title = title.unwrap_or_else(|| "4 Bedroom Terrace Duplex".to_string());
    let city = city.unwrap_or_else(|| "Lekki".to_string());

    println!("Property marketplace demo");

    let directory = Arc::new(InMemoryAccountDirectory::new());
    let seeded = seed_accounts(directory.as_ref(), &DevClaimsCodec)?;
    let account = |role: &str| {
        seeded
            .iter()
            .find(|entry| entry.role == role)
            .map(|entry| entry.account.subject_id)
    };
    let (Some(landlord_id), Some(moderator_id), Some(tenant_id)) =
        (account("landlord"), account("moderator"), account("tenant"))
    else {
        println!("  Demo accounts unavailable");
        return Ok(());
    };
    let identity_of = |id: SubjectId| -> Result<Option<Identity>, AppError> {
        Ok(directory.fetch(&id)?.map(|account| account.identity()))
    };
    for entry in &seeded {
        println!(
            "- {} {} ({}) | level {} | {} capabilities",
            entry.role,
            entry.account.full_name,
            entry.account.phone_number,
            entry.account.verification_level,
            entry.account.capabilities.len()
        );
    }

    println!("\nPhone verification");
    let sender = Arc::new(CapturingCodeSender::default());
    let verification = PhoneVerificationService::new(
        Arc::clone(&directory),
        Arc::clone(&sender),
        VerificationConfig::default(),
    );
    let tenant = identity_of(tenant_id)?;
    match verification.send_code(tenant.as_ref(), "0803 123 4567") {
        Ok(dispatch) => println!(
            "- Code sent to {} (valid {} seconds)",
            dispatch.phone_number, dispatch.expires_in_secs
        ),
        Err(err) => println!("- Code not sent: {}", err),
    }
    if let Some(code) = sender.take() {
        match verification.verify_code(tenant.as_ref(), "+2348031234567", &code) {
            Ok(outcome) => println!(
                "- Tenant upgraded to {} with {} capabilities",
                outcome.verification_level,
                outcome.capabilities.len()
            ),
            Err(err) => println!("- Verification failed: {}", err),
        }
    }
    let tenant = identity_of(tenant_id)?;
    if let Ok(status) = verification.status(tenant.as_ref()) {
        println!(
            "  can contact landlords: {} | can list properties: {}",
            status.can_contact_landlords, status.can_list_properties
        );
    }

    println!("\nListing moderation");
    let media_config = MediaConfig::default();
    let listings = ListingService::new(
        Arc::new(InMemoryListingStore::new()),
        Arc::new(InMemoryMediaStore::new(
            ImagePolicy::from(&media_config),
            media_config.base_url.clone(),
        )),
        ListingConfig::default(),
    );
    let landlord = identity_of(landlord_id)?;
    let moderator = identity_of(moderator_id)?;

    let listing = match listings.create(landlord.as_ref(), demo_listing(title, city.clone())) {
        Ok(listing) => listing,
        Err(err) => {
            println!("  Listing rejected: {}", err);
            return Ok(());
        }
    };
    println!(
        "- Landlord submitted '{}' -> {} ({} images, {} documents)",
        listing.details.title,
        listing.verification_status(),
        listing.images.len(),
        listing.ownership_documents().len()
    );

    let city_search = || ListingSearch {
        city: Some(city.clone()),
        ..ListingSearch::default()
    };
    println!(
        "  Visible to the tenant before review: {}",
        public_count(&listings, tenant.as_ref(), city_search())
    );
    println!(
        "  Visible to the landlord with show_pending: {}",
        public_count(
            &listings,
            landlord.as_ref(),
            ListingSearch {
                show_pending: true,
                ..city_search()
            }
        )
    );

    match listings.pending(moderator.as_ref(), None, None) {
        Ok(queue) => println!("- Moderation queue holds {} listing(s)", queue.len()),
        Err(err) => println!("- Moderation queue unavailable: {}", err),
    }

    let decision = if reject {
        VerificationDecision::reject(None)
    } else {
        VerificationDecision::approve(Some("C of O matches the land registry record"))
    };
    let decided = match listings.decide(moderator.as_ref(), &listing.id, &decision) {
        Ok(decided) => decided,
        Err(err) => {
            println!("  Decision failed: {}", err);
            return Ok(());
        }
    };
    println!(
        "- Moderator marked the listing {} ({})",
        decided.verification_status(),
        decided.verification().notes().unwrap_or("no notes")
    );
    if let Err(err) = listings.decide(moderator.as_ref(), &listing.id, &decision) {
        println!("  Second decision refused: {}", err);
    }

    println!(
        "  Visible to the tenant after review: {}",
        public_count(
            &listings,
            tenant.as_ref(),
            ListingSearch {
                search: Some("terrace".to_string()),
                sort_by: SortOrder::Relevance,
                ..city_search()
            }
        )
    );

    if reject {
        return Ok(());
    }

    let mut last_read = None;
    for _ in 0..3 {
        match listings.view(&listing.id) {
            Ok(read) => last_read = Some(read),
            Err(err) => println!("  View failed: {}", err),
        }
    }
    if let Some(read) = last_read {
        println!(
            "- Listing viewed {} times, still {}",
            read.view_count(),
            read.status()
        );
    }

    Ok(())
}
