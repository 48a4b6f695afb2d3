//! Typed document repositories over the key-value store.
//!
//! Each dashboard collection lives under one well-known key as a single JSON
//! document, and every mutation is a whole-document read-modify-write. Each
//! repository serializes its read-modify-write cycles behind an async mutex so
//! two concurrent writers cannot silently drop each other's changes.
//!
//! Reads degrade to an empty collection when the store fails or the document
//! is corrupt; the error is logged and the request carries on with defaults.
//! Write failures are propagated to the caller.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{BookingFlags, CashDay, ManualBookingsByDate, RotaEntry, StaffMember};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::error;

use crate::db::DbConnection;

const ENTRIES_KEY: &str = "rota-entries";
const STAFF_KEY: &str = "rota-staff";
const CASH_DAYS_KEY: &str = "cash-days";
const FLAGS_KEY: &str = "booking-flags";
const MANUAL_BOOKINGS_KEY: &str = "manual-bookings";

async fn load_document<T>(db: &DbConnection, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match db.get_value(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                error!("Corrupt document under '{}': {}", key, e);
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            error!("Error reading '{}': {}", key, e);
            T::default()
        }
    }
}

async fn save_document<T: Serialize>(db: &DbConnection, key: &str, value: &T) -> Result<()> {
    db.put_value(key, &serde_json::to_string(value)?).await
}

/// Repository for the rota collections: the shift entries list and the staff
/// member list. Both live here because a staff rename or removal must touch
/// the two documents as one commit.
#[derive(Clone)]
pub struct RotaRepository {
    db: DbConnection,
    write_lock: Arc<Mutex<()>>,
}

impl RotaRepository {
    pub fn new(db: DbConnection) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Take the single-writer lock for a read-modify-write cycle.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub async fn load_entries(&self) -> Vec<RotaEntry> {
        load_document(&self.db, ENTRIES_KEY).await
    }

    pub async fn save_entries(&self, entries: &[RotaEntry]) -> Result<()> {
        save_document(&self.db, ENTRIES_KEY, &entries).await
    }

    pub async fn load_staff(&self) -> Vec<StaffMember> {
        load_document(&self.db, STAFF_KEY).await
    }

    pub async fn save_staff(&self, staff: &[StaffMember]) -> Result<()> {
        save_document(&self.db, STAFF_KEY, &staff).await
    }

    /// Commit both rota documents in one store transaction, so a rename or
    /// removal cascade is never half-applied.
    pub async fn save_staff_and_entries(
        &self,
        staff: &[StaffMember],
        entries: &[RotaEntry],
    ) -> Result<()> {
        self.db
            .put_values(&[
                (STAFF_KEY, serde_json::to_string(&staff)?),
                (ENTRIES_KEY, serde_json::to_string(&entries)?),
            ])
            .await
    }
}

/// Repository for the per-day cash ledger document.
#[derive(Clone)]
pub struct CashRepository {
    db: DbConnection,
    write_lock: Arc<Mutex<()>>,
}

impl CashRepository {
    pub fn new(db: DbConnection) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub async fn load_days(&self) -> Vec<CashDay> {
        load_document(&self.db, CASH_DAYS_KEY).await
    }

    pub async fn save_days(&self, days: &[CashDay]) -> Result<()> {
        save_document(&self.db, CASH_DAYS_KEY, &days).await
    }
}

/// Repository for the booking overlays: the confirmed/no-show flag map and
/// the manually entered bookings.
#[derive(Clone)]
pub struct BookingRepository {
    db: DbConnection,
    write_lock: Arc<Mutex<()>>,
}

impl BookingRepository {
    pub fn new(db: DbConnection) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub async fn load_flags(&self) -> BookingFlags {
        load_document(&self.db, FLAGS_KEY).await
    }

    pub async fn save_flags(&self, flags: &BookingFlags) -> Result<()> {
        save_document(&self.db, FLAGS_KEY, flags).await
    }

    pub async fn load_manual_bookings(&self) -> ManualBookingsByDate {
        load_document(&self.db, MANUAL_BOOKINGS_KEY).await
    }

    pub async fn save_manual_bookings(&self, bookings: &ManualBookingsByDate) -> Result<()> {
        save_document(&self.db, MANUAL_BOOKINGS_KEY, bookings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn setup_test() -> DbConnection {
        DbConnection::init_test().await.expect("Failed to create test store")
    }

    #[tokio::test]
    async fn missing_documents_load_as_defaults() {
        let db = setup_test().await;
        let rota = RotaRepository::new(db.clone());
        let cash = CashRepository::new(db.clone());
        let bookings = BookingRepository::new(db);

        assert!(rota.load_entries().await.is_empty());
        assert!(rota.load_staff().await.is_empty());
        assert!(cash.load_days().await.is_empty());
        assert!(bookings.load_flags().await.is_empty());
        assert!(bookings.load_manual_bookings().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_document_degrades_to_default() {
        let db = setup_test().await;
        db.put_value("rota-entries", "not json").await.unwrap();

        let rota = RotaRepository::new(db);
        assert!(rota.load_entries().await.is_empty());
    }

    #[tokio::test]
    async fn entries_round_trip() {
        let db = setup_test().await;
        let rota = RotaRepository::new(db);

        let entries = vec![RotaEntry {
            id: "rota-1-ab".to_string(),
            staff_name: "Alice".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
            hours: 8.0,
            notes: Some("till training".to_string()),
        }];
        rota.save_entries(&entries).await.unwrap();

        assert_eq!(rota.load_entries().await, entries);
    }

    #[tokio::test]
    async fn staff_and_entries_commit_together() {
        let db = setup_test().await;
        let rota = RotaRepository::new(db);

        let staff = vec![StaffMember {
            name: "Bea".to_string(),
            rate: 12.5,
            rate_type: shared::RateType::Hour,
        }];
        let entries = vec![RotaEntry {
            id: "rota-2-cd".to_string(),
            staff_name: "Bea".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 11).unwrap(),
            start_time: "10:00".to_string(),
            end_time: "14:00".to_string(),
            hours: 4.0,
            notes: None,
        }];
        rota.save_staff_and_entries(&staff, &entries).await.unwrap();

        assert_eq!(rota.load_staff().await, staff);
        assert_eq!(rota.load_entries().await, entries);
    }
}
