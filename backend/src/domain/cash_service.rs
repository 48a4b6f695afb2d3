//! Cash ledger domain logic: per-day opening balances and signed
//! transactions.
//!
//! Days are created implicitly on first write. Transaction sign is derived
//! from the type, never taken from the caller, and transactions are always
//! returned ordered by creation time. Whether a past day may still be edited
//! is a policy question for the HTTP layer; the ledger itself stays
//! permissive.

use chrono::{NaiveDate, Utc};
use shared::{CashDay, CashTransaction, CashTransactionType};
use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::CashRepository;

#[derive(Clone)]
pub struct CashService {
    repository: CashRepository,
}

impl CashService {
    pub fn new(repository: CashRepository) -> Self {
        Self { repository }
    }

    /// The stored day, or a zero-valued default that is not persisted.
    pub async fn get_day(&self, date: NaiveDate) -> CashDay {
        let days = self.repository.load_days().await;
        let day = days
            .into_iter()
            .find(|d| d.date == date)
            .unwrap_or_else(|| CashDay::empty(date));
        sorted_day(day)
    }

    /// Upsert the opening balance for a day, creating the day if needed.
    pub async fn set_opening_balance(
        &self,
        date: NaiveDate,
        value: f64,
    ) -> DomainResult<CashDay> {
        if !value.is_finite() {
            return Err(DomainError::validation("openingBalance must be a number"));
        }

        let _guard = self.repository.lock().await;
        let mut days = self.repository.load_days().await;
        let index = ensure_day(&mut days, date);
        days[index].opening_balance = value;
        self.repository.save_days(&days).await?;

        Ok(sorted_day(days[index].clone()))
    }

    /// Append a transaction to a day. The amount is a caller-entered positive
    /// magnitude; the stored sign follows the type. Outgoing types must carry
    /// details.
    pub async fn add_transaction(
        &self,
        date: NaiveDate,
        kind: Option<&str>,
        amount: Option<f64>,
        details: Option<&str>,
    ) -> DomainResult<(CashDay, CashTransaction)> {
        let kind = kind.and_then(CashTransactionType::parse);
        let amount = amount.filter(|a| a.is_finite() && *a > 0.0);
        let (kind, amount) = match (kind, amount) {
            (Some(kind), Some(amount)) => (kind, amount),
            _ => {
                return Err(DomainError::validation("type and amount (> 0) required"));
            }
        };

        let details = normalize_details(details);
        if kind.requires_details() && details.is_empty() {
            return Err(DomainError::validation(
                "details required for outgoing transactions",
            ));
        }

        let entry = CashTransaction {
            id: CashTransaction::generate_id(),
            date,
            kind,
            amount: kind.signed_amount(amount),
            details: (!details.is_empty()).then_some(details),
            created_at: Utc::now().timestamp_millis(),
        };

        let _guard = self.repository.lock().await;
        let mut days = self.repository.load_days().await;
        let index = ensure_day(&mut days, date);
        days[index].transactions.push(entry.clone());
        self.repository.save_days(&days).await?;

        info!("Added {} of {} on {}", kind.as_str(), entry.amount, date);
        Ok((sorted_day(days[index].clone()), entry))
    }

    /// Remove a transaction by id. The day must exist; removing an unknown
    /// transaction id is a no-op.
    pub async fn delete_transaction(
        &self,
        date: NaiveDate,
        id: &str,
    ) -> DomainResult<CashDay> {
        let _guard = self.repository.lock().await;
        let mut days = self.repository.load_days().await;
        let day = days
            .iter_mut()
            .find(|d| d.date == date)
            .ok_or_else(|| DomainError::not_found("Day not found"))?;

        day.transactions.retain(|t| t.id != id);
        let updated = day.clone();
        self.repository.save_days(&days).await?;

        Ok(sorted_day(updated))
    }
}

fn ensure_day(days: &mut Vec<CashDay>, date: NaiveDate) -> usize {
    match days.iter().position(|d| d.date == date) {
        Some(index) => index,
        None => {
            days.push(CashDay::empty(date));
            days.len() - 1
        }
    }
}

fn sorted_day(mut day: CashDay) -> CashDay {
    day.transactions.sort_by_key(|t| t.created_at);
    day
}

/// Trim and collapse runs of whitespace; "  a   b " becomes "a b".
fn normalize_details(details: Option<&str>) -> String {
    details
        .unwrap_or("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;

    async fn create_test_service() -> (CashService, CashRepository) {
        let db = DbConnection::init_test().await.expect("Failed to create test store");
        let repository = CashRepository::new(db);
        (CashService::new(repository.clone()), repository)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn get_day_defaults_without_persisting() {
        let (service, repository) = create_test_service().await;
        let day = service.get_day(date(2025, 3, 10)).await;

        assert_eq!(day.opening_balance, 0.0);
        assert!(day.transactions.is_empty());
        assert!(repository.load_days().await.is_empty());
    }

    #[tokio::test]
    async fn sign_follows_transaction_type() {
        let (service, _) = create_test_service().await;
        let today = date(2025, 3, 10);

        let (_, cash) = service
            .add_transaction(today, Some("Cash Payment"), Some(50.0), None)
            .await
            .unwrap();
        assert_eq!(cash.amount, 50.0);

        let (_, purchase) = service
            .add_transaction(today, Some("Purchase Payment"), Some(50.0), Some("Milk"))
            .await
            .unwrap();
        assert_eq!(purchase.amount, -50.0);

        let (day, other) = service
            .add_transaction(today, Some("Other Outgoing"), Some(12.5), Some("Window cleaner"))
            .await
            .unwrap();
        assert_eq!(other.amount, -12.5);
        assert_eq!(day.net(), -12.5);
    }

    #[tokio::test]
    async fn unknown_type_and_bad_amounts_reject() {
        let (service, _) = create_test_service().await;
        let today = date(2025, 3, 10);

        for (kind, amount) in [
            (Some("Card Payment"), Some(10.0)),
            (None, Some(10.0)),
            (Some("Cash Payment"), Some(0.0)),
            (Some("Cash Payment"), Some(-5.0)),
            (Some("Cash Payment"), Some(f64::INFINITY)),
            (Some("Cash Payment"), None),
        ] {
            assert!(matches!(
                service.add_transaction(today, kind, amount, None).await,
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn outgoing_types_require_details() {
        let (service, _) = create_test_service().await;
        let today = date(2025, 3, 10);

        for details in [None, Some(""), Some("   ")] {
            assert!(matches!(
                service
                    .add_transaction(today, Some("Purchase Payment"), Some(20.0), details)
                    .await,
                Err(DomainError::Validation(_))
            ));
        }

        let (_, entry) = service
            .add_transaction(today, Some("Purchase Payment"), Some(20.0), Some("  two   pints  "))
            .await
            .unwrap();
        assert_eq!(entry.details.as_deref(), Some("two pints"));

        // Cash payments may omit details
        let (_, entry) = service
            .add_transaction(today, Some("Cash Payment"), Some(20.0), None)
            .await
            .unwrap();
        assert!(entry.details.is_none());
    }

    #[tokio::test]
    async fn closing_holds_after_additions_and_deletions() {
        let (service, _) = create_test_service().await;
        let today = date(2025, 3, 10);

        service.set_opening_balance(today, 100.0).await.unwrap();
        let (_, cash) = service
            .add_transaction(today, Some("Cash Payment"), Some(50.0), None)
            .await
            .unwrap();
        service
            .add_transaction(today, Some("Purchase Payment"), Some(30.0), Some("Stock"))
            .await
            .unwrap();

        let day = service.get_day(today).await;
        assert_eq!(day.closing(), day.opening_balance + day.net());
        assert_eq!(day.closing(), 120.0);

        let day = service.delete_transaction(today, &cash.id).await.unwrap();
        assert_eq!(day.closing(), day.opening_balance + day.net());
        assert_eq!(day.closing(), 70.0);
    }

    #[tokio::test]
    async fn opening_balance_upserts_the_day() {
        let (service, _) = create_test_service().await;
        let today = date(2025, 3, 10);

        assert!(matches!(
            service.set_opening_balance(today, f64::NAN).await,
            Err(DomainError::Validation(_))
        ));

        let day = service.set_opening_balance(today, 85.0).await.unwrap();
        assert_eq!(day.opening_balance, 85.0);

        let day = service.set_opening_balance(today, 90.0).await.unwrap();
        assert_eq!(day.opening_balance, 90.0);
        assert_eq!(service.get_day(today).await.opening_balance, 90.0);
    }

    #[tokio::test]
    async fn delete_requires_the_day_but_not_the_id() {
        let (service, _) = create_test_service().await;
        let today = date(2025, 3, 10);

        assert!(matches!(
            service.delete_transaction(today, "cash-0-dead").await,
            Err(DomainError::NotFound(_))
        ));

        service.set_opening_balance(today, 0.0).await.unwrap();
        let day = service.delete_transaction(today, "cash-0-dead").await.unwrap();
        assert!(day.transactions.is_empty());
    }

    #[tokio::test]
    async fn transactions_return_sorted_by_creation_time() {
        let (service, repository) = create_test_service().await;
        let today = date(2025, 3, 10);

        // Seed a day whose stored order is newest-first
        let mk = |id: &str, created_at: i64| CashTransaction {
            id: id.to_string(),
            date: today,
            kind: CashTransactionType::CashPayment,
            amount: 10.0,
            details: None,
            created_at,
        };
        let day = CashDay {
            date: today,
            opening_balance: 0.0,
            transactions: vec![mk("c", 30), mk("a", 10), mk("b", 20)],
        };
        repository.save_days(&[day]).await.unwrap();

        let day = service.get_day(today).await;
        let ids: Vec<_> = day.transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
