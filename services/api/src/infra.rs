use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use metrics_exporter_prometheus::PrometheusHandle;
use property_market::access::{Claims, ClaimsCodec, ClaimsError};
use property_market::config::MediaConfig;
use property_market::media::{ImagePolicy, ImageUpload, MediaError, MediaStore};
use property_market::verification::{CodeSender, DeliveryError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

const MEDIA_PREFIX: &str = "/media/";
const PROPERTY_IMAGES: &str = "properties";
const DEV_TOKEN_PREFIX: &str = "dev.";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) media_root: Arc<PathBuf>,
}

/// Media store writing listing images below `MEDIA_ROOT`, served back under `/media/`.
pub(crate) struct LocalDiskMediaStore {
    policy: ImagePolicy,
    root: PathBuf,
    base_url: String,
}

impl LocalDiskMediaStore {
    pub(crate) fn new(config: &MediaConfig) -> Result<Self, std::io::Error> {
        fs::create_dir_all(config.root.join(PROPERTY_IMAGES))?;
        Ok(Self {
            policy: ImagePolicy::from(config),
            root: config.root.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn path_for(&self, locator: &str) -> Option<PathBuf> {
        let relative = locator
            .strip_prefix(&self.base_url)?
            .strip_prefix(MEDIA_PREFIX)?;
        contained_path(&self.root, relative)
    }
}

impl MediaStore for LocalDiskMediaStore {
    fn store_image(&self, upload: &ImageUpload) -> Result<String, MediaError> {
        let format = self.policy.admit(upload)?;
        let name = format!("{}.{}", uuid::Uuid::new_v4().simple(), format.extension());
        fs::write(self.root.join(PROPERTY_IMAGES).join(&name), &upload.bytes)?;
        Ok(format!(
            "{}{MEDIA_PREFIX}{PROPERTY_IMAGES}/{name}",
            self.base_url
        ))
    }

    fn delete(&self, locator: &str) -> Result<(), MediaError> {
        let Some(path) = self.path_for(locator) else {
            warn!(%locator, "ignoring delete for a locator outside the media root");
            return Ok(());
        };
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Join `relative` under `root`, refusing anything that could step outside of it.
pub(crate) fn contained_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty()
        || !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

/// Unsigned claims codec for local development: `dev.` followed by base64url JSON claims.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DevClaimsCodec;

impl ClaimsCodec for DevClaimsCodec {
    fn issue(&self, claims: &Claims) -> Result<String, ClaimsError> {
        let payload = serde_json::to_vec(claims).map_err(|_| ClaimsError::Malformed)?;
        Ok(format!(
            "{DEV_TOKEN_PREFIX}{}",
            URL_SAFE_NO_PAD.encode(payload)
        ))
    }

    fn decode(&self, token: &str) -> Result<Claims, ClaimsError> {
        let encoded = token
            .strip_prefix(DEV_TOKEN_PREFIX)
            .ok_or(ClaimsError::Rejected)?;
        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| ClaimsError::Malformed)?;
        serde_json::from_slice(&payload).map_err(|_| ClaimsError::Malformed)
    }
}

/// Writes codes to the log instead of texting them.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingCodeSender;

impl CodeSender for LoggingCodeSender {
    fn deliver(&self, phone_number: &str, code: &str) -> Result<(), DeliveryError> {
        info!(%phone_number, %code, "development code sender: verification code");
        Ok(())
    }
}
