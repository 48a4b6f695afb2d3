//! Booking session grouping and the storage-backed booking overlays.
//!
//! Bookings come from the external booking API and are never persisted here;
//! this module buckets them into the fixed daily session slots and keeps the
//! two overlays the dashboard owns: confirmed/no-show flags and manually
//! entered bookings.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use shared::{
    Booking, BookingFlag, BookingFlags, CreateManualBookingRequest, ManualBooking,
    ManualBookingsByDate, SessionGroup, UpsertFlagRequest,
};
use std::collections::BTreeSet;
use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::BookingRepository;

/// The fixed daily session times, earliest first. Tie-breaks in slot
/// assignment resolve toward the earlier listed slot.
pub const SESSION_TIMES: [&str; 4] = ["09:30", "11:30", "13:30", "15:30"];

/// Units of capacity available per session.
pub const SESSION_CAPACITY: u32 = 11;

pub static DEFAULT_SLOT_TIMES: Lazy<Vec<NaiveTime>> = Lazy::new(|| {
    SESSION_TIMES
        .iter()
        .map(|t| NaiveTime::parse_from_str(t, "%H:%M").unwrap())
        .collect()
});

/// Booking ids split by their flag overlay state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSets {
    pub no_show_ids: BTreeSet<String>,
    pub confirmed_ids: BTreeSet<String>,
}

#[derive(Clone)]
pub struct BookingService {
    repository: BookingRepository,
}

impl BookingService {
    pub fn new(repository: BookingRepository) -> Self {
        Self { repository }
    }

    /// The whole flag overlay map.
    pub async fn flags(&self) -> BookingFlags {
        self.repository.load_flags().await
    }

    /// Merge the supplied booleans into one booking's flag record. Fields the
    /// caller leaves out are not touched, so a confirmed-only update never
    /// clears an earlier no-show mark.
    pub async fn upsert_flag(&self, request: UpsertFlagRequest) -> DomainResult<()> {
        let booking_id = match request.booking_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(DomainError::validation("bookingId required")),
        };

        let _guard = self.repository.lock().await;
        let mut flags = self.repository.load_flags().await;
        let flag = flags.entry(booking_id).or_insert_with(BookingFlag::default);
        if let Some(confirmed) = request.confirmed {
            flag.confirmed = Some(confirmed);
        }
        if let Some(no_show) = request.no_show {
            flag.no_show = Some(no_show);
        }
        self.repository.save_flags(&flags).await?;
        Ok(())
    }

    /// Manually entered bookings for one date.
    pub async fn manual_bookings_for_date(&self, date: NaiveDate) -> Vec<ManualBooking> {
        let all = self.repository.load_manual_bookings().await;
        all.get(&date.to_string()).cloned().unwrap_or_default()
    }

    /// The full per-date manual bookings map.
    pub async fn manual_bookings(&self) -> ManualBookingsByDate {
        self.repository.load_manual_bookings().await
    }

    pub async fn add_manual_booking(
        &self,
        request: CreateManualBookingRequest,
    ) -> DomainResult<Vec<ManualBooking>> {
        let (date, booking) = match (request.date, request.booking) {
            (Some(date), Some(booking)) => (date, booking),
            _ => return Err(DomainError::validation("date and booking required")),
        };

        let _guard = self.repository.lock().await;
        let mut all = self.repository.load_manual_bookings().await;
        let list = all.entry(date.to_string()).or_default();
        list.push(booking);
        let updated = list.clone();
        self.repository.save_manual_bookings(&all).await?;
        Ok(updated)
    }

    pub async fn delete_manual_booking(
        &self,
        date: NaiveDate,
        id: &str,
    ) -> DomainResult<Vec<ManualBooking>> {
        let _guard = self.repository.lock().await;
        let mut all = self.repository.load_manual_bookings().await;
        let list = all.entry(date.to_string()).or_default();
        list.retain(|b| b.id != id);
        let updated = list.clone();
        self.repository.save_manual_bookings(&all).await?;
        Ok(updated)
    }
}

/// The booking's local start, resolved through the three upstream start
/// representations in priority order. RFC 3339 values keep the wall-clock of
/// their carried offset; bare values are taken as already local.
pub fn local_start(booking: &Booking) -> Option<NaiveDateTime> {
    [
        booking.starts_at_utc.as_deref(),
        booking.starts_at.as_deref(),
        booking.starts.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find_map(parse_local_datetime)
}

fn parse_local_datetime(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// The slot a booking belongs to: its exact start time when that is a
/// configured slot, otherwise the slot with the smallest absolute minute
/// distance. Ties resolve to the earlier listed slot.
pub fn assign_slot(booking: &Booking, slot_times: &[NaiveTime]) -> Option<NaiveTime> {
    let start = local_start(booking)?.time();
    nearest_slot(start, slot_times)
}

fn nearest_slot(start: NaiveTime, slot_times: &[NaiveTime]) -> Option<NaiveTime> {
    if slot_times.contains(&start) {
        return Some(start);
    }
    slot_times
        .iter()
        .min_by_key(|slot| (**slot - start).num_minutes().abs())
        .copied()
}

fn is_sibling_type(booking: &Booking) -> bool {
    booking
        .appointment_type_name()
        .map(|name| name.to_lowercase().contains("sibling"))
        .unwrap_or(false)
}

/// Capacity units a booking consumes. Explicit unit counts from the source
/// win, in field priority order; otherwise sibling appointment types count as
/// two units and everything else as one.
pub fn units_for(booking: &Booking) -> u32 {
    booking
        .units
        .or(booking.unit_count)
        .or(booking.quantity)
        .or_else(|| {
            booking
                .legacy
                .as_ref()
                .and_then(|l| l.appointment_types.first())
                .and_then(|t| t.units)
        })
        .unwrap_or_else(|| if is_sibling_type(booking) { 2 } else { 1 })
}

/// Children attending: two per unit for sibling appointment types, one per
/// unit otherwise.
pub fn kid_count_for(booking: &Booking) -> u32 {
    let units = units_for(booking);
    if is_sibling_type(booking) {
        units * 2
    } else {
        units
    }
}

/// Group one date's bookings into the configured session slots. Cancelled
/// bookings and bookings on other dates are discarded; every configured slot
/// appears in the result, empty or not.
pub fn group_by_date(
    bookings: &[Booking],
    date: NaiveDate,
    slot_times: &[NaiveTime],
    capacity: u32,
) -> Vec<SessionGroup> {
    let mut by_slot: Vec<Vec<Booking>> = vec![Vec::new(); slot_times.len()];

    for booking in bookings {
        if booking.cancelled {
            continue;
        }
        let start = match local_start(booking) {
            Some(start) => start,
            None => {
                warn!("Booking {} has no parseable start time", booking.id);
                continue;
            }
        };
        if start.date() != date {
            continue;
        }
        if let Some(slot) = nearest_slot(start.time(), slot_times) {
            if let Some(index) = slot_times.iter().position(|s| *s == slot) {
                by_slot[index].push(booking.clone());
            }
        }
    }

    slot_times
        .iter()
        .zip(by_slot)
        .map(|(slot, bookings)| SessionGroup {
            slot_time: slot.format("%H:%M").to_string(),
            total_units: bookings.iter().map(units_for).sum(),
            bookings,
            capacity,
        })
        .collect()
}

/// Join the flag overlay onto a set of bookings. Bookings without a stored
/// flag contribute to neither set.
pub fn apply_flags(bookings: &[Booking], flags: &BookingFlags) -> FlagSets {
    let mut sets = FlagSets::default();
    for booking in bookings {
        if let Some(flag) = flags.get(&booking.id) {
            if flag.is_no_show() {
                sets.no_show_ids.insert(booking.id.clone());
            }
            if flag.is_confirmed() {
                sets.confirmed_ids.insert(booking.id.clone());
            }
        }
    }
    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use shared::{AppointmentType, BookingLegacy};

    async fn create_test_service() -> BookingService {
        let db = DbConnection::init_test().await.expect("Failed to create test store");
        BookingService::new(BookingRepository::new(db))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(id: &str, starts: &str) -> Booking {
        Booking {
            id: id.to_string(),
            title: format!("{} for Single Child", id),
            starts: Some(starts.to_string()),
            ..Default::default()
        }
    }

    fn with_type(mut booking: Booking, name: &str, units: Option<u32>) -> Booking {
        booking.legacy = Some(BookingLegacy {
            appointment_types: vec![AppointmentType {
                id: "t1".to_string(),
                name: name.to_string(),
                units,
            }],
        });
        booking
    }

    #[test]
    fn exact_slot_match_wins() {
        let b = booking("bk-1", "2025-03-10T11:30:00");
        let slot = assign_slot(&b, &DEFAULT_SLOT_TIMES).unwrap();
        assert_eq!(slot.format("%H:%M").to_string(), "11:30");
    }

    #[test]
    fn off_slot_booking_goes_to_nearest() {
        // 09:45 is 15 minutes from 09:30 and 105 from 11:30
        let b = booking("bk-1", "2025-03-10T09:45:00");
        let slot = assign_slot(&b, &DEFAULT_SLOT_TIMES).unwrap();
        assert_eq!(slot.format("%H:%M").to_string(), "09:30");
    }

    #[test]
    fn equidistant_booking_takes_the_earlier_slot() {
        // 10:30 is 60 minutes from both 09:30 and 11:30
        let b = booking("bk-1", "2025-03-10T10:30:00");
        let slot = assign_slot(&b, &DEFAULT_SLOT_TIMES).unwrap();
        assert_eq!(slot.format("%H:%M").to_string(), "09:30");
    }

    #[test]
    fn start_time_prefers_the_utc_representation() {
        let mut b = booking("bk-1", "2025-03-10T15:30:00");
        b.starts_at_utc = Some("2025-03-10T09:30:00Z".to_string());
        let slot = assign_slot(&b, &DEFAULT_SLOT_TIMES).unwrap();
        assert_eq!(slot.format("%H:%M").to_string(), "09:30");
    }

    #[test]
    fn unparseable_start_falls_through_the_chain() {
        let mut b = booking("bk-1", "2025-03-10T13:30:00");
        b.starts_at_utc = Some("not a timestamp".to_string());
        let slot = assign_slot(&b, &DEFAULT_SLOT_TIMES).unwrap();
        assert_eq!(slot.format("%H:%M").to_string(), "13:30");
    }

    #[test]
    fn grouping_skips_cancelled_and_other_dates() {
        let target = date(2025, 3, 10);
        let mut cancelled = booking("bk-cancelled", "2025-03-10T09:30:00");
        cancelled.cancelled = true;
        let bookings = vec![
            booking("bk-1", "2025-03-10T09:30:00"),
            booking("bk-2", "2025-03-10T09:45:00"),
            cancelled,
            booking("bk-other-day", "2025-03-11T09:30:00"),
        ];

        let groups = group_by_date(&bookings, target, &DEFAULT_SLOT_TIMES, SESSION_CAPACITY);
        assert_eq!(groups.len(), 4);

        let first = &groups[0];
        assert_eq!(first.slot_time, "09:30");
        assert_eq!(first.bookings.len(), 2);
        assert_eq!(first.total_units, 2);
        assert_eq!(first.slots_left(), 9);

        // Empty slots are still present
        assert!(groups[1..].iter().all(|g| g.bookings.is_empty()));
        assert!(!groups
            .iter()
            .any(|g| g.bookings.iter().any(|b| b.id == "bk-cancelled" || b.id == "bk-other-day")));
    }

    #[test]
    fn unit_resolution_prefers_explicit_counts() {
        let mut b = with_type(booking("bk-1", "2025-03-10T09:30:00"), "Child + Sibling", Some(3));
        b.units = Some(5);
        assert_eq!(units_for(&b), 5);

        b.units = None;
        b.quantity = Some(4);
        assert_eq!(units_for(&b), 4);

        b.quantity = None;
        assert_eq!(units_for(&b), 3);
    }

    #[test]
    fn sibling_heuristic_applies_without_explicit_counts() {
        let sibling = with_type(booking("bk-1", "2025-03-10T09:30:00"), "Child + Sibling", None);
        assert_eq!(units_for(&sibling), 2);
        assert_eq!(kid_count_for(&sibling), 4);

        let single = with_type(booking("bk-2", "2025-03-10T09:30:00"), "Single Child", None);
        assert_eq!(units_for(&single), 1);
        assert_eq!(kid_count_for(&single), 1);

        // No appointment type metadata at all
        assert_eq!(units_for(&booking("bk-3", "2025-03-10T09:30:00")), 1);
    }

    #[test]
    fn apply_flags_joins_only_present_records() {
        let bookings = vec![
            booking("bk-1", "2025-03-10T09:30:00"),
            booking("bk-2", "2025-03-10T09:30:00"),
            booking("bk-3", "2025-03-10T09:30:00"),
        ];
        let mut flags = BookingFlags::new();
        flags.insert(
            "bk-1".to_string(),
            BookingFlag { confirmed: Some(true), no_show: None },
        );
        flags.insert(
            "bk-2".to_string(),
            BookingFlag { confirmed: Some(false), no_show: Some(true) },
        );
        flags.insert(
            "bk-unrelated".to_string(),
            BookingFlag { confirmed: Some(true), no_show: Some(true) },
        );

        let sets = apply_flags(&bookings, &flags);
        assert!(sets.confirmed_ids.contains("bk-1"));
        assert!(sets.no_show_ids.contains("bk-2"));
        assert!(!sets.confirmed_ids.contains("bk-2"));
        assert!(!sets.no_show_ids.contains("bk-3"));
        assert!(!sets.confirmed_ids.contains("bk-unrelated"));
    }

    #[tokio::test]
    async fn flag_upsert_merges_partial_updates() {
        let service = create_test_service().await;

        service
            .upsert_flag(UpsertFlagRequest {
                booking_id: Some("bk-1".to_string()),
                no_show: Some(true),
                confirmed: None,
            })
            .await
            .unwrap();
        service
            .upsert_flag(UpsertFlagRequest {
                booking_id: Some("bk-1".to_string()),
                confirmed: Some(true),
                no_show: None,
            })
            .await
            .unwrap();

        // Storage keeps both booleans independently; the editing surface, not
        // this layer, treats them as mutually exclusive.
        let flags = service.flags().await;
        let flag = flags.get("bk-1").unwrap();
        assert!(flag.is_no_show());
        assert!(flag.is_confirmed());
    }

    #[tokio::test]
    async fn flag_upsert_requires_a_booking_id() {
        let service = create_test_service().await;
        assert!(matches!(
            service.upsert_flag(UpsertFlagRequest::default()).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn manual_bookings_round_trip_per_date() {
        let service = create_test_service().await;
        let monday = date(2025, 3, 10);

        let booking = ManualBooking {
            id: "mb-1".to_string(),
            name: "Walk-in".to_string(),
            booking_type: "Single Child".to_string(),
            note: None,
            session_time: "11:30".to_string(),
            units: 1,
        };
        let list = service
            .add_manual_booking(CreateManualBookingRequest {
                date: Some(monday),
                booking: Some(booking.clone()),
            })
            .await
            .unwrap();
        assert_eq!(list, vec![booking.clone()]);

        assert_eq!(service.manual_bookings_for_date(monday).await.len(), 1);
        assert!(service
            .manual_bookings_for_date(date(2025, 3, 11))
            .await
            .is_empty());

        let list = service.delete_manual_booking(monday, "mb-1").await.unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn add_manual_booking_requires_date_and_booking() {
        let service = create_test_service().await;
        assert!(matches!(
            service
                .add_manual_booking(CreateManualBookingRequest::default())
                .await,
            Err(DomainError::Validation(_))
        ));
    }
}
