use crate::infra::{contained_path, AppState};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use property_market::access::{AccountDirectory, ResolveIdentity};
use property_market::listings::{listing_router, ListingService, ListingStore};
use property_market::media::MediaStore;
use property_market::verification::{verification_router, CodeSender, PhoneVerificationService};
use serde_json::json;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::error;

/// Marketplace routes plus the operational endpoints and local media serving.
pub(crate) fn with_marketplace_routes<S, M, D, C>(
    listings: Arc<ListingService<S, M>>,
    verification: Arc<PhoneVerificationService<D, C>>,
    identities: Arc<dyn ResolveIdentity>,
) -> Router
where
    S: ListingStore + 'static,
    M: MediaStore + 'static,
    D: AccountDirectory + 'static,
    C: CodeSender + 'static,
{
    listing_router(listings, Arc::clone(&identities))
        .merge(verification_router(verification, identities))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/media/*path", get(media_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn media_endpoint(
    Extension(state): Extension<AppState>,
    Path(path): Path<String>,
) -> Response {
    let not_found = || (StatusCode::NOT_FOUND, Json(json!({ "error": "media not found" })));

    let Some(file) = contained_path(&state.media_root, &path) else {
        return not_found().into_response();
    };

    match tokio::fs::read(&file).await {
        Ok(bytes) => {
            let content_type = mime_guess::from_path(&file).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type.essence_str().to_string())],
                bytes,
            )
                .into_response()
        }
        Err(err) if err.kind() == ErrorKind::NotFound => not_found().into_response(),
        Err(err) => {
            error!(error = %err, path = %file.display(), "failed to read media");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "media unavailable" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::seed_accounts;
    use crate::infra::{DevClaimsCodec, LoggingCodeSender};
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use property_market::access::ClaimsIdentityResolver;
    use property_market::config::{ListingConfig, VerificationConfig};
    use property_market::media::{ImagePolicy, InMemoryMediaStore};
    use property_market::memory::{InMemoryAccountDirectory, InMemoryListingStore};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        readiness: Arc<AtomicBool>,
        tokens: Vec<(&'static str, String)>,
    }

    impl TestApp {
        fn token(&self, role: &str) -> String {
            self.tokens
                .iter()
                .find(|(seeded, _)| *seeded == role)
                .map(|(_, token)| format!("Bearer {token}"))
                .expect("seeded role")
        }
    }

    fn test_app(media_root: PathBuf) -> TestApp {
        let directory = Arc::new(InMemoryAccountDirectory::new());
        let codec = Arc::new(DevClaimsCodec);
        let tokens = seed_accounts(directory.as_ref(), codec.as_ref())
            .expect("accounts seeded")
            .into_iter()
            .map(|seeded| (seeded.role, seeded.token))
            .collect();

        let listings = Arc::new(ListingService::new(
            Arc::new(InMemoryListingStore::new()),
            Arc::new(InMemoryMediaStore::new(
                ImagePolicy::new(1024),
                "http://localhost:3000",
            )),
            ListingConfig::default(),
        ));
        let verification = Arc::new(PhoneVerificationService::new(
            Arc::clone(&directory),
            Arc::new(LoggingCodeSender),
            VerificationConfig::default(),
        ));
        let identities = Arc::new(ClaimsIdentityResolver::new(codec, directory));

        let readiness = Arc::new(AtomicBool::new(false));
        let state = AppState {
            readiness: Arc::clone(&readiness),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            media_root: Arc::new(media_root),
        };
        let router =
            with_marketplace_routes(listings, verification, identities).layer(Extension(state));

        TestApp {
            router,
            readiness,
            tokens,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    #[tokio::test]
    async fn readiness_follows_the_startup_flag() {
        let app = test_app(std::env::temp_dir());

        let response = app
            .router
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        app.readiness.store(true, Ordering::Release);
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .router
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn media_files_are_served_with_a_guessed_type() {
        let root = std::env::temp_dir().join(format!(
            "property-market-routes-{}",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(root.join("properties")).expect("media dir");
        std::fs::write(root.join("properties/front.png"), [0x89, 0x50, 0x4E, 0x47])
            .expect("media file");
        let app = test_app(root.clone());

        let response = app
            .router
            .clone()
            .oneshot(
                Request::get("/media/properties/front.png")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(|value| value.as_bytes()),
            Some("image/png".as_bytes())
        );

        let response = app
            .router
            .oneshot(
                Request::get("/media/properties/missing.jpg")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn seeded_accounts_reach_the_marketplace_routes() {
        let app = test_app(std::env::temp_dir());

        let listing = json!({
            "title": "Mini flat in Yaba",
            "description": "Self-contained with prepaid meter",
            "property_type": "house",
            "listing_type": "rent",
            "address": "3 Herbert Macaulay Way",
            "city": "Yaba",
            "state": "Lagos",
            "lga": "Lagos Mainland",
            "price": 1200000.0,
            "verification_document": { "document_type": "Deed of Assignment" },
            "images": [{ "filename": "front.jpg", "content_type": "image/jpeg", "data": "/9j/4A==" }]
        });
        let response = app
            .router
            .clone()
            .oneshot(
                Request::post("/api/v1/properties")
                    .header(header::AUTHORIZATION, app.token("landlord"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(listing.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["verification_status"], json!("pending_verification"));

        let response = app
            .router
            .clone()
            .oneshot(
                Request::get("/api/v1/properties/admin/pending")
                    .header(header::AUTHORIZATION, app.token("tenant"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .router
            .clone()
            .oneshot(
                Request::get("/api/v1/verification/status")
                    .header(header::AUTHORIZATION, app.token("tenant"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        assert_eq!(status["verification_level"], json!("unverified"));
        assert_eq!(status["can_list_properties"], json!(false));
    }
}
