//! One-time passcode lifecycle for the quote wizard.
//!
//! One verification record per email address governs code issuance, expiry,
//! resend and attempt limiting. Records live in a process-wide keyed store;
//! expiry is detected lazily on the next read, never by a background sweep.

pub mod code;
pub mod phone;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::VerifyError;

pub use code::{CodeGenerator, RandomCodeGenerator};
pub use phone::to_e164;
pub use store::{InMemoryVerificationStore, VerificationRecord, VerificationStore};

/// Codes stay valid for ten minutes after (re)issue.
pub const CODE_TTL_MINUTES: i64 = 10;
/// A record is discarded once this many failed code checks accumulate.
pub const MAX_ATTEMPTS: u32 = 5;

/// Contact data resolved from the CRM for one email address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactProfile {
    pub phone: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
}

/// Phone lookup collaborator. `Ok(None)` means the CRM knows no such contact.
#[async_trait::async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<ContactProfile>>;
}

/// Messaging collaborator. Fire-and-forget from the lifecycle's point of
/// view: one call, one outcome, no retry.
#[async_trait::async_trait]
pub trait CodeSender: Send + Sync {
    async fn send_code(&self, phone_e164: &str, code: &str) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartedVerification {
    pub phone_e164: String,
    pub contact: ContactProfile,
}

/// Serializes all record operations per email key. The store itself only
/// offers plain get/set/delete, so without the per-key lock a concurrent
/// confirm could observe a half-applied resend or lose an attempt increment.
pub struct VerificationService {
    store: Arc<dyn VerificationStore>,
    directory: Arc<dyn ContactDirectory>,
    sender: Arc<dyn CodeSender>,
    codes: Arc<dyn CodeGenerator>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn VerificationStore>,
        directory: Arc<dyn ContactDirectory>,
        sender: Arc<dyn CodeSender>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self { store, directory, sender, codes, locks: Mutex::new(HashMap::new()) }
    }

    /// Resolves the contact's phone, issues a fresh code and triggers
    /// delivery. The record is persisted before the send: a failed send
    /// surfaces as [`VerifyError::SendFailed`] but leaves a valid code
    /// behind, so the customer can fall back to a resend. This ordering is
    /// deliberate and matches the resend-friendly product behavior.
    pub async fn start(&self, email: &str) -> Result<StartedVerification, VerifyError> {
        let email = normalize_email(email)?;

        let contact = self
            .directory
            .find_by_email(&email)
            .await
            .map_err(VerifyError::Directory)?
            .ok_or_else(|| VerifyError::PhoneNotFound(email.clone()))?;
        let Some(raw_phone) = contact.phone.clone().filter(|phone| !phone.trim().is_empty())
        else {
            return Err(VerifyError::PhoneNotFound(email));
        };

        let phone_e164 = to_e164(&raw_phone);
        let code = self.codes.generate();
        let now = Utc::now();

        let lock = self.key_lock(&email).await;
        let _guard = lock.lock().await;

        self.store
            .set(VerificationRecord {
                email: email.clone(),
                phone_number: phone_e164.clone(),
                code: code.clone(),
                expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
                attempts: 0,
                last_sent_at: now,
                verified: false,
            })
            .await;

        tracing::info!(
            event_name = "verify.code_issued",
            email = %email,
            expires_in_minutes = CODE_TTL_MINUTES,
            "verification code issued"
        );

        self.sender.send_code(&phone_e164, &code).await.map_err(VerifyError::SendFailed)?;

        Ok(StartedVerification { phone_e164, contact })
    }

    /// Checks a submitted code. Succeeds idempotently once verified; an
    /// expired or exhausted record is deleted on detection. Returns the
    /// stored phone number so downstream steps need no second lookup.
    pub async fn confirm(&self, email: &str, submitted_code: &str) -> Result<String, VerifyError> {
        let email = normalize_email(email)?;
        let submitted_code = submitted_code.trim();
        if submitted_code.is_empty() {
            return Err(VerifyError::Validation("code is required".to_string()));
        }

        let lock = self.key_lock(&email).await;
        let _guard = lock.lock().await;

        let mut record =
            self.store.get(&email).await.ok_or(VerifyError::NoActiveVerification)?;

        if record.verified {
            return Ok(record.phone_number);
        }
        if record.is_expired(Utc::now()) {
            self.store.delete(&email).await;
            return Err(VerifyError::Expired);
        }
        if record.attempts >= MAX_ATTEMPTS {
            self.store.delete(&email).await;
            return Err(VerifyError::TooManyAttempts);
        }
        if record.code != submitted_code {
            record.attempts += 1;
            let attempts = record.attempts;
            self.store.set(record).await;
            tracing::warn!(
                event_name = "verify.code_rejected",
                email = %email,
                attempts,
                "submitted verification code does not match"
            );
            return Err(VerifyError::InvalidCode);
        }

        record.verified = true;
        let phone_number = record.phone_number.clone();
        self.store.set(record).await;
        tracing::info!(event_name = "verify.confirmed", email = %email, "verification confirmed");

        Ok(phone_number)
    }

    /// Replaces the code of an existing verification, resetting expiry and
    /// the attempt counter. An optional replacement phone number supports
    /// "send it to a different number" corrections. Same record-then-send
    /// ordering as [`Self::start`].
    pub async fn resend(
        &self,
        email: &str,
        new_phone: Option<&str>,
    ) -> Result<String, VerifyError> {
        let email = normalize_email(email)?;

        let lock = self.key_lock(&email).await;
        let _guard = lock.lock().await;

        let mut record =
            self.store.get(&email).await.ok_or(VerifyError::NoActiveVerification)?;

        let code = self.codes.generate();
        record.code = code.clone();
        record.expires_at = Utc::now() + Duration::minutes(CODE_TTL_MINUTES);
        record.attempts = 0;
        record.verified = false;
        if let Some(phone) = new_phone.map(str::trim).filter(|phone| !phone.is_empty()) {
            record.phone_number = to_e164(phone);
        }
        let phone_number = record.phone_number.clone();
        self.store.set(record).await;

        tracing::info!(event_name = "verify.code_resent", email = %email, "verification code resent");

        self.sender.send_code(&phone_number, &code).await.map_err(VerifyError::SendFailed)?;

        Ok(phone_number)
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }
}

fn normalize_email(raw: &str) -> Result<String, VerifyError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(VerifyError::Validation("email is required".to_string()));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use tokio::sync::Mutex;

    use crate::errors::VerifyError;

    use super::{
        CodeGenerator, CodeSender, ContactDirectory, ContactProfile, InMemoryVerificationStore,
        VerificationService, VerificationStore,
    };

    struct StaticDirectory {
        profile: Option<ContactProfile>,
    }

    #[async_trait::async_trait]
    impl ContactDirectory for StaticDirectory {
        async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<ContactProfile>> {
            Ok(self.profile.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl CodeSender for RecordingSender {
        async fn send_code(&self, phone_e164: &str, code: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("provider rejected the message");
            }
            self.sent.lock().await.push((phone_e164.to_string(), code.to_string()));
            Ok(())
        }
    }

    struct ScriptedCodes {
        codes: std::sync::Mutex<VecDeque<String>>,
    }

    impl ScriptedCodes {
        fn new(codes: &[&str]) -> Self {
            Self {
                codes: std::sync::Mutex::new(
                    codes.iter().map(|code| (*code).to_string()).collect(),
                ),
            }
        }
    }

    impl CodeGenerator for ScriptedCodes {
        fn generate(&self) -> String {
            self.codes
                .lock()
                .expect("code script lock")
                .pop_front()
                .unwrap_or_else(|| "999999".to_string())
        }
    }

    struct Harness {
        store: Arc<InMemoryVerificationStore>,
        sender: Arc<RecordingSender>,
        service: VerificationService,
    }

    fn harness(profile: Option<ContactProfile>, codes: &[&str], fail_send: bool) -> Harness {
        let store = Arc::new(InMemoryVerificationStore::default());
        let sender = Arc::new(RecordingSender { fail: fail_send, ..Default::default() });
        let service = VerificationService::new(
            store.clone(),
            Arc::new(StaticDirectory { profile }),
            sender.clone(),
            Arc::new(ScriptedCodes::new(codes)),
        );
        Harness { store, sender, service }
    }

    fn dutch_contact() -> ContactProfile {
        ContactProfile {
            phone: Some("0612345678".to_string()),
            name: Some("Test Klant".to_string()),
            address: Some("Voorbeeldstraat 123".to_string()),
            zip: Some("1234 AB".to_string()),
            city: Some("Amsterdam".to_string()),
        }
    }

    #[tokio::test]
    async fn start_then_confirm_returns_the_stored_phone() {
        let harness = harness(Some(dutch_contact()), &["123456"], false);

        let started = harness.service.start("Klant@Example.com").await.expect("start");
        assert_eq!(started.phone_e164, "+31612345678");

        let phone =
            harness.service.confirm("klant@example.com", "123456").await.expect("confirm");
        assert_eq!(phone, "+31612345678");

        let sends = harness.sender.sent.lock().await;
        assert_eq!(sends.as_slice(), &[("+31612345678".to_string(), "123456".to_string())]);
    }

    #[tokio::test]
    async fn start_without_a_phone_fails_and_stores_nothing() {
        let profile = ContactProfile { phone: None, ..dutch_contact() };
        let harness = harness(Some(profile), &["123456"], false);

        let error = harness.service.start("a@b.com").await.expect_err("no phone");
        assert!(matches!(error, VerifyError::PhoneNotFound(_)));
        assert!(harness.store.get("a@b.com").await.is_none());
    }

    #[tokio::test]
    async fn start_for_unknown_contact_fails_with_not_found() {
        let harness = harness(None, &["123456"], false);

        let error = harness.service.start("a@b.com").await.expect_err("unknown contact");
        assert!(matches!(error, VerifyError::PhoneNotFound(_)));
    }

    #[tokio::test]
    async fn failed_send_surfaces_but_leaves_the_record_behind() {
        let harness = harness(Some(dutch_contact()), &["123456"], true);

        let error = harness.service.start("a@b.com").await.expect_err("send should fail");
        assert!(matches!(error, VerifyError::SendFailed(_)));

        // Record-then-send: the code survives a delivery failure so a resend
        // can pick it up.
        let record = harness.store.get("a@b.com").await.expect("record persisted");
        assert_eq!(record.code, "123456");
    }

    #[tokio::test]
    async fn confirm_without_start_reports_no_active_verification() {
        let harness = harness(Some(dutch_contact()), &["123456"], false);

        let error = harness.service.confirm("a@b.com", "123456").await.expect_err("no record");
        assert!(matches!(error, VerifyError::NoActiveVerification));
    }

    #[tokio::test]
    async fn confirm_is_idempotent_once_verified() {
        let harness = harness(Some(dutch_contact()), &["123456"], false);
        harness.service.start("a@b.com").await.expect("start");
        harness.service.confirm("a@b.com", "123456").await.expect("first confirm");

        // A second confirm succeeds without re-checking the code.
        let phone = harness.service.confirm("a@b.com", "000000").await.expect("repeat confirm");
        assert_eq!(phone, "+31612345678");
    }

    #[tokio::test]
    async fn wrong_codes_exhaust_attempts_and_delete_the_record() {
        let harness = harness(Some(dutch_contact()), &["123456"], false);
        harness.service.start("a@b.com").await.expect("start");

        for _ in 0..5 {
            let error =
                harness.service.confirm("a@b.com", "000000").await.expect_err("wrong code");
            assert!(matches!(error, VerifyError::InvalidCode));
        }

        let error = harness.service.confirm("a@b.com", "000000").await.expect_err("exhausted");
        assert!(matches!(error, VerifyError::TooManyAttempts));
        assert!(harness.store.get("a@b.com").await.is_none());

        let error = harness.service.confirm("a@b.com", "123456").await.expect_err("gone");
        assert!(matches!(error, VerifyError::NoActiveVerification));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_wrong_confirms_lose_no_attempt_increments() {
        let harness = Arc::new(harness(Some(dutch_contact()), &["123456"], false));
        harness.service.start("a@b.com").await.expect("start");

        let confirms: Vec<_> = (0..4)
            .map(|_| {
                let harness = harness.clone();
                tokio::spawn(async move { harness.service.confirm("a@b.com", "000000").await })
            })
            .collect();
        for confirm in confirms {
            let error = confirm.await.expect("task").expect_err("wrong code");
            assert!(matches!(error, VerifyError::InvalidCode));
        }

        // Every failed check lands in the counter, none are overwritten.
        assert_eq!(harness.store.get("a@b.com").await.expect("record").attempts, 4);
        harness.service.confirm("a@b.com", "123456").await.expect("still within the limit");
    }

    #[tokio::test]
    async fn expired_records_are_deleted_on_confirm() {
        let harness = harness(Some(dutch_contact()), &["123456"], false);
        harness.service.start("a@b.com").await.expect("start");

        let mut record = harness.store.get("a@b.com").await.expect("record");
        record.expires_at = Utc::now() - Duration::minutes(1);
        harness.store.set(record).await;

        let error = harness.service.confirm("a@b.com", "123456").await.expect_err("expired");
        assert!(matches!(error, VerifyError::Expired));
        assert!(harness.store.get("a@b.com").await.is_none());
    }

    #[tokio::test]
    async fn resend_resets_attempts_and_replaces_the_code() {
        let harness = harness(Some(dutch_contact()), &["123456", "654321"], false);
        harness.service.start("a@b.com").await.expect("start");

        for _ in 0..4 {
            let _ = harness.service.confirm("a@b.com", "000000").await;
        }
        assert_eq!(harness.store.get("a@b.com").await.expect("record").attempts, 4);

        harness.service.resend("a@b.com", None).await.expect("resend");

        let record = harness.store.get("a@b.com").await.expect("record");
        assert_eq!(record.attempts, 0);
        assert_eq!(record.code, "654321");
        assert!(!record.verified);

        let error = harness.service.confirm("a@b.com", "123456").await.expect_err("old code");
        assert!(matches!(error, VerifyError::InvalidCode));
        harness.service.confirm("a@b.com", "654321").await.expect("new code");
    }

    #[tokio::test]
    async fn resend_without_start_fails() {
        let harness = harness(Some(dutch_contact()), &["123456"], false);

        let error = harness.service.resend("a@b.com", None).await.expect_err("no record");
        assert!(matches!(error, VerifyError::NoActiveVerification));
    }

    #[tokio::test]
    async fn resend_can_redirect_to_a_replacement_phone() {
        let harness = harness(Some(dutch_contact()), &["123456", "654321"], false);
        harness.service.start("a@b.com").await.expect("start");

        let phone =
            harness.service.resend("a@b.com", Some("0687654321")).await.expect("resend");
        assert_eq!(phone, "+31687654321");

        let sends = harness.sender.sent.lock().await;
        assert_eq!(sends[1], ("+31687654321".to_string(), "654321".to_string()));
    }

    #[tokio::test]
    async fn blank_email_is_rejected_before_any_lookup() {
        let harness = harness(Some(dutch_contact()), &["123456"], false);

        let error = harness.service.start("   ").await.expect_err("blank email");
        assert!(matches!(error, VerifyError::Validation(_)));
        let error = harness.service.confirm("a@b.com", "  ").await.expect_err("blank code");
        assert!(matches!(error, VerifyError::Validation(_)));
    }
}
