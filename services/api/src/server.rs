use crate::cli::ServeArgs;
use crate::demo::seed_accounts;
use crate::infra::{AppState, DevClaimsCodec, LocalDiskMediaStore, LoggingCodeSender};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use property_market::access::ClaimsIdentityResolver;
use property_market::config::{AppConfig, AppEnvironment};
use property_market::error::AppError;
use property_market::listings::ListingService;
use property_market::memory::{InMemoryAccountDirectory, InMemoryListingStore};
use property_market::telemetry;
use property_market::verification::PhoneVerificationService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        media_root: Arc::new(config.media.root.clone()),
    };

    let directory = Arc::new(InMemoryAccountDirectory::new());
    let codec = Arc::new(DevClaimsCodec);
    if config.environment == AppEnvironment::Production {
        warn!("production environment is running with the unsigned development claims codec");
    } else if !args.no_seed {
        for seeded in seed_accounts(directory.as_ref(), codec.as_ref())? {
            info!(
                role = seeded.role,
                subject = %seeded.account.subject_id,
                token = %seeded.token,
                "seeded development account"
            );
        }
    }
    let identities = Arc::new(ClaimsIdentityResolver::new(codec, Arc::clone(&directory)));

    let listing_service = Arc::new(ListingService::new(
        Arc::new(InMemoryListingStore::new()),
        Arc::new(LocalDiskMediaStore::new(&config.media)?),
        config.listings,
    ));
    let verification_service = Arc::new(PhoneVerificationService::new(
        directory,
        Arc::new(LoggingCodeSender),
        config.verification,
    ));

    let app = with_marketplace_routes(listing_service, verification_service, identities)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "property marketplace api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
