use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use super::phone::{normalize_phone, same_number, InvalidPhoneNumber};
use crate::access::{
    require_active, AccessDenied, AccountDirectory, Capability, CapabilitySet, Identity,
    IssuedCode, UserAccount, VerificationLevel,
};
use crate::clock::{Clock, SystemClock};
use crate::config::VerificationConfig;
use crate::store::StoreError;

pub const CODE_LENGTH: usize = 6;

/// Failure reported by a [`CodeSender`].
#[derive(Debug, thiserror::Error)]
#[error("code delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Outbound channel for verification codes (an SMS gateway in production).
pub trait CodeSender: Send + Sync {
    fn deliver(&self, phone_number: &str, code: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error(transparent)]
    InvalidPhone(#[from] InvalidPhoneNumber),
    #[error("verification code must be exactly {CODE_LENGTH} digits")]
    MalformedCode,
    #[error("phone number does not match your registered number")]
    PhoneMismatch,
    #[error("phone already verified; current level: {level}")]
    AlreadyVerified { level: VerificationLevel },
    #[error("no verification code sent; request a new code")]
    NoPendingCode,
    #[error("verification code expired; request a new code")]
    CodeExpired,
    #[error("invalid verification code; {attempts_left} attempts left")]
    WrongCode { attempts_left: u32 },
    #[error("too many incorrect codes; request a new code")]
    AttemptsExhausted,
    #[error("please wait {remaining_secs} seconds before requesting a new code")]
    Cooldown { remaining_secs: i64 },
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Receipt for a dispatched code. The code itself never leaves the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeDispatch {
    pub phone_number: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in_secs: i64,
}

/// Account state after a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub verification_level: VerificationLevel,
    pub capabilities: CapabilitySet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationStatusView {
    pub verification_level: VerificationLevel,
    pub capabilities: CapabilitySet,
    pub is_phone_verified: bool,
    pub can_contact_landlords: bool,
    pub can_list_properties: bool,
}

impl VerificationStatusView {
    pub fn for_identity(identity: &Identity) -> Self {
        let level = &identity.verification_level;
        Self {
            verification_level: level.clone(),
            capabilities: identity.capabilities.clone(),
            is_phone_verified: level.at_least(&VerificationLevel::PhoneVerified),
            can_contact_landlords: identity
                .capabilities
                .contains(&Capability::ContactLandlord),
            can_list_properties: identity.capabilities.contains(&Capability::CreateListing)
                && level.at_least(&VerificationLevel::IdentityVerified),
        }
    }
}

/// Phone ownership checks that move an account from `unverified` to `phone_verified`.
pub struct PhoneVerificationService<D, C> {
    directory: Arc<D>,
    sender: Arc<C>,
    clock: Arc<dyn Clock>,
    config: VerificationConfig,
}

impl<D, C> PhoneVerificationService<D, C>
where
    D: AccountDirectory + 'static,
    C: CodeSender + 'static,
{
    pub fn new(directory: Arc<D>, sender: Arc<C>, config: VerificationConfig) -> Self {
        Self::with_clock(directory, sender, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        directory: Arc<D>,
        sender: Arc<C>,
        config: VerificationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            sender,
            clock,
            config,
        }
    }

    pub fn send_code(
        &self,
        caller: Option<&Identity>,
        phone_number: &str,
    ) -> Result<CodeDispatch, VerificationError> {
        self.issue(caller, phone_number, false)
    }

    /// Like [`Self::send_code`], but refused while the previous code is younger than the
    /// configured cooldown.
    pub fn resend_code(
        &self,
        caller: Option<&Identity>,
        phone_number: &str,
    ) -> Result<CodeDispatch, VerificationError> {
        self.issue(caller, phone_number, true)
    }

    pub fn verify_code(
        &self,
        caller: Option<&Identity>,
        phone_number: &str,
        code: &str,
    ) -> Result<VerificationOutcome, VerificationError> {
        let identity = require_active(caller)?;
        let phone = normalize_phone(phone_number)?;
        let code = code.trim();
        if code.len() != CODE_LENGTH || !code.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(VerificationError::MalformedCode);
        }

        let now = self.clock.now();
        let max_attempts = self.config.max_attempts;
        let checked = self.directory.transact(
            &identity.subject_id,
            |account| -> Result<CodeCheck, VerificationError> {
                check_unverified_owner(account, &phone)?;
                let pending = account
                    .pending_code
                    .as_mut()
                    .ok_or(VerificationError::NoPendingCode)?;
                if now > pending.expires_at {
                    return Err(VerificationError::CodeExpired);
                }
                if pending.code != code {
                    pending.failed_attempts += 1;
                    let failed = pending.failed_attempts;
                    if failed >= max_attempts {
                        account.pending_code = None;
                        return Ok(CodeCheck::Exhausted);
                    }
                    return Ok(CodeCheck::Wrong {
                        attempts_left: max_attempts - failed,
                    });
                }

                account.verification_level = VerificationLevel::PhoneVerified;
                account.capabilities.grant(Capability::ContactLandlord);
                account.capabilities.grant(Capability::ReceiveInquiries);
                account.pending_code = None;
                Ok(CodeCheck::Accepted(VerificationOutcome {
                    verification_level: account.verification_level.clone(),
                    capabilities: account.capabilities.clone(),
                }))
            },
        )?;

        match checked {
            CodeCheck::Accepted(outcome) => {
                info!(subject = %identity.subject_id, "phone number verified");
                Ok(outcome)
            }
            CodeCheck::Wrong { attempts_left } => {
                Err(VerificationError::WrongCode { attempts_left })
            }
            CodeCheck::Exhausted => {
                warn!(
                    subject = %identity.subject_id,
                    "verification code discarded after repeated wrong guesses"
                );
                Err(VerificationError::AttemptsExhausted)
            }
        }
    }

    pub fn status(
        &self,
        caller: Option<&Identity>,
    ) -> Result<VerificationStatusView, VerificationError> {
        let identity = require_active(caller)?;
        Ok(VerificationStatusView::for_identity(identity))
    }

    fn issue(
        &self,
        caller: Option<&Identity>,
        phone_number: &str,
        enforce_cooldown: bool,
    ) -> Result<CodeDispatch, VerificationError> {
        let identity = require_active(caller)?;
        let phone = normalize_phone(phone_number)?;
        let now = self.clock.now();
        let cooldown = self.config.resend_cooldown;
        let issued = IssuedCode {
            code: generate_code(),
            sent_at: now,
            expires_at: now + self.config.code_ttl,
            failed_attempts: 0,
        };

        self.directory.transact(
            &identity.subject_id,
            |account| -> Result<(), VerificationError> {
                check_unverified_owner(account, &phone)?;
                if enforce_cooldown {
                    if let Some(previous) = &account.pending_code {
                        let remaining = cooldown - (now - previous.sent_at);
                        if remaining > Duration::zero() {
                            return Err(VerificationError::Cooldown {
                                remaining_secs: whole_seconds(remaining),
                            });
                        }
                    }
                }
                account.pending_code = Some(issued.clone());
                // An undelivered code must not be committed.
                if let Err(err) = self.sender.deliver(&phone, &issued.code) {
                    warn!(
                        subject = %identity.subject_id,
                        error = %err,
                        "verification code not delivered"
                    );
                    return Err(err.into());
                }
                Ok(())
            },
        )?;

        info!(
            subject = %identity.subject_id,
            expires_at = %issued.expires_at,
            resend = enforce_cooldown,
            "verification code issued"
        );
        Ok(CodeDispatch {
            phone_number: phone,
            expires_at: issued.expires_at,
            expires_in_secs: self.config.code_ttl.num_seconds(),
        })
    }
}

/// Result of comparing a submitted code, committed whether or not it matched.
enum CodeCheck {
    Accepted(VerificationOutcome),
    Wrong { attempts_left: u32 },
    Exhausted,
}

fn check_unverified_owner(account: &UserAccount, phone: &str) -> Result<(), VerificationError> {
    if !same_number(&account.phone_number, phone) {
        return Err(VerificationError::PhoneMismatch);
    }
    if account.verification_level.ordinal() > VerificationLevel::Unverified.ordinal() {
        return Err(VerificationError::AlreadyVerified {
            level: account.verification_level.clone(),
        });
    }
    Ok(())
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Round a positive remainder up so a caller is never told to wait zero seconds.
fn whole_seconds(remaining: Duration) -> i64 {
    let millis = remaining.num_milliseconds();
    (millis + 999) / 1000
}
