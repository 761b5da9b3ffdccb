use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One pending or completed verification, keyed by lowercased email. Absence
/// of a record means no verification is active for that address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub email: String,
    /// E.164 formatted WhatsApp destination.
    pub phone_number: String,
    /// Six ASCII digits, never with a leading zero.
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_sent_at: DateTime<Utc>,
    pub verified: bool,
}

impl VerificationRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Keyed lookup owned by the verification lifecycle. Kept behind a trait so
/// the in-memory map can be swapped for a networked cache without touching
/// call sites. Implementations only need O(1) get/set/delete; the lifecycle
/// service serializes read-modify-write sequences per key itself.
#[async_trait::async_trait]
pub trait VerificationStore: Send + Sync {
    async fn set(&self, record: VerificationRecord);
    async fn get(&self, email: &str) -> Option<VerificationRecord>;
    async fn delete(&self, email: &str);
}

/// Process-wide in-memory store. No cross-process durability: records that
/// are never read again after expiry stay until process restart.
#[derive(Default)]
pub struct InMemoryVerificationStore {
    records: RwLock<HashMap<String, VerificationRecord>>,
}

#[async_trait::async_trait]
impl VerificationStore for InMemoryVerificationStore {
    async fn set(&self, record: VerificationRecord) {
        let key = record.email.to_lowercase();
        let mut records = self.records.write().await;
        records.insert(key, record);
    }

    async fn get(&self, email: &str) -> Option<VerificationRecord> {
        let records = self.records.read().await;
        records.get(&email.to_lowercase()).cloned()
    }

    async fn delete(&self, email: &str) {
        let mut records = self.records.write().await;
        records.remove(&email.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{InMemoryVerificationStore, VerificationRecord, VerificationStore};

    fn record(email: &str) -> VerificationRecord {
        VerificationRecord {
            email: email.to_string(),
            phone_number: "+31612345678".to_string(),
            code: "123456".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
            attempts: 0,
            last_sent_at: Utc::now(),
            verified: false,
        }
    }

    #[tokio::test]
    async fn round_trips_records_by_lowercased_email() {
        let store = InMemoryVerificationStore::default();
        store.set(record("Klant@Example.com")).await;

        let found = store.get("klant@example.com").await.expect("record should be present");
        assert_eq!(found.email, "Klant@Example.com");

        store.delete("KLANT@EXAMPLE.COM").await;
        assert!(store.get("klant@example.com").await.is_none());
    }

    #[tokio::test]
    async fn set_replaces_an_existing_record() {
        let store = InMemoryVerificationStore::default();
        store.set(record("a@b.com")).await;

        let mut replacement = record("a@b.com");
        replacement.code = "654321".to_string();
        store.set(replacement).await;

        let found = store.get("a@b.com").await.expect("record should be present");
        assert_eq!(found.code, "654321");
    }

    #[test]
    fn expiry_is_strictly_after_the_deadline() {
        let now = Utc::now();
        let mut rec = record("a@b.com");
        rec.expires_at = now;

        assert!(!rec.is_expired(now));
        assert!(rec.is_expired(now + Duration::milliseconds(1)));
    }
}
