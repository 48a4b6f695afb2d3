//! Rota domain logic: shift entries, the staff list, and pay reporting.
//!
//! Shift entries enforce one shift per staff member per calendar date, and
//! durations are rounded to the nearest quarter hour. Staff renames and
//! removals cascade into the entries list; the two documents are committed
//! together.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use shared::{
    CreateRotaEntryRequest, RateType, RotaEntry, SaveStaffRequest, StaffMember,
    UpdateRotaEntryRequest, UpdateStaffRequest,
};
use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::RotaRepository;

/// Hours and pay owed over a reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayReport {
    pub hours: f64,
    pub pay: f64,
}

#[derive(Clone)]
pub struct RotaService {
    repository: RotaRepository,
}

impl RotaService {
    pub fn new(repository: RotaRepository) -> Self {
        Self { repository }
    }

    /// All entries, optionally narrowed to one date.
    pub async fn list_entries(&self, date: Option<NaiveDate>) -> Vec<RotaEntry> {
        let entries = self.repository.load_entries().await;
        match date {
            Some(date) => entries.into_iter().filter(|e| e.date == date).collect(),
            None => entries,
        }
    }

    /// Add a shift. The date defaults to `today` when the caller omits it.
    /// Returns the new entry together with the full entries list.
    pub async fn add_entry(
        &self,
        request: CreateRotaEntryRequest,
        today: NaiveDate,
    ) -> DomainResult<(RotaEntry, Vec<RotaEntry>)> {
        let staff_name = request
            .staff_name
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        let (start_time, end_time) = match (request.start_time, request.end_time) {
            (Some(start), Some(end)) if !staff_name.is_empty() => (start, end),
            _ => {
                return Err(DomainError::validation(
                    "staffName, startTime and endTime required",
                ))
            }
        };

        let hours = shift_hours(&start_time, &end_time)?;
        let date = request.date.unwrap_or(today);
        let notes = normalize_notes(request.notes);

        let _guard = self.repository.lock().await;
        let mut entries = self.repository.load_entries().await;
        if entries
            .iter()
            .any(|e| e.staff_name == staff_name && e.date == date)
        {
            return Err(DomainError::conflict(
                "Staff already has a shift for this date",
            ));
        }

        let entry = RotaEntry {
            id: RotaEntry::generate_id(),
            staff_name,
            date,
            start_time,
            end_time,
            hours,
            notes,
        };
        entries.push(entry.clone());
        self.repository.save_entries(&entries).await?;

        info!(
            "Added rota entry {} for {} on {}",
            entry.id, entry.staff_name, entry.date
        );
        Ok((entry, entries))
    }

    /// Update a shift in place. Staff name and date fall back to the stored
    /// entry when not supplied; the one-shift-per-day rule is re-checked
    /// against every other entry.
    pub async fn update_entry(
        &self,
        request: UpdateRotaEntryRequest,
    ) -> DomainResult<(RotaEntry, Vec<RotaEntry>)> {
        let (id, start_time, end_time) = match (request.id, request.start_time, request.end_time) {
            (Some(id), Some(start), Some(end)) => (id, start, end),
            _ => {
                return Err(DomainError::validation(
                    "id, startTime and endTime required",
                ))
            }
        };

        let hours = shift_hours(&start_time, &end_time)?;

        let _guard = self.repository.lock().await;
        let mut entries = self.repository.load_entries().await;
        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| DomainError::not_found("Entry not found"))?;

        let existing = entries[index].clone();
        let staff_name = request
            .staff_name
            .unwrap_or_else(|| existing.staff_name.clone())
            .trim()
            .to_string();
        let date = request.date.unwrap_or(existing.date);
        if staff_name.is_empty() {
            return Err(DomainError::validation("staffName and date required"));
        }

        if entries
            .iter()
            .any(|e| e.id != id && e.staff_name == staff_name && e.date == date)
        {
            return Err(DomainError::conflict(
                "Staff already has a shift for this date",
            ));
        }

        let updated = RotaEntry {
            id: existing.id,
            staff_name,
            date,
            start_time,
            end_time,
            hours,
            notes: normalize_notes(request.notes),
        };
        entries[index] = updated.clone();
        self.repository.save_entries(&entries).await?;

        Ok((updated, entries))
    }

    /// Remove a shift by id. Removing an unknown id is a no-op; the caller
    /// gets the remaining entries either way.
    pub async fn delete_entry(&self, id: &str) -> DomainResult<Vec<RotaEntry>> {
        let _guard = self.repository.lock().await;
        let mut entries = self.repository.load_entries().await;
        entries.retain(|e| e.id != id);
        self.repository.save_entries(&entries).await?;
        Ok(entries)
    }

    pub async fn list_staff(&self) -> Vec<StaffMember> {
        self.repository.load_staff().await
    }

    pub async fn add_staff(&self, request: SaveStaffRequest) -> DomainResult<Vec<StaffMember>> {
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name required"));
        }

        let _guard = self.repository.lock().await;
        let mut staff = self.repository.load_staff().await;
        if staff.iter().any(|s| s.name == name) {
            return Err(DomainError::conflict("Staff member already exists"));
        }

        staff.push(StaffMember {
            name,
            rate: sanitize_rate(request.rate),
            rate_type: request.rate_type.unwrap_or_default(),
        });
        self.repository.save_staff(&staff).await?;
        Ok(staff)
    }

    /// Update a staff member, possibly under a new name. A rename rewrites
    /// every rota entry referencing the old name; both documents are
    /// committed in one store transaction.
    pub async fn update_staff(&self, request: UpdateStaffRequest) -> DomainResult<Vec<StaffMember>> {
        let original_name = request
            .original_name
            .clone()
            .or_else(|| request.name.clone())
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        if original_name.is_empty() || name.is_empty() {
            return Err(DomainError::validation("originalName and name required"));
        }

        let _guard = self.repository.lock().await;
        let mut staff = self.repository.load_staff().await;
        if !staff.iter().any(|s| s.name == original_name) {
            return Err(DomainError::not_found("Staff member not found"));
        }
        if name != original_name && staff.iter().any(|s| s.name == name) {
            return Err(DomainError::conflict("Name already exists"));
        }

        for member in staff.iter_mut().filter(|s| s.name == original_name) {
            member.name = name.clone();
            member.rate = sanitize_rate(request.rate);
            member.rate_type = request.rate_type.unwrap_or_default();
        }

        let mut entries = self.repository.load_entries().await;
        rename_staff_entries(&mut entries, &original_name, &name);

        self.repository.save_staff_and_entries(&staff, &entries).await?;
        info!("Updated staff member '{}' (was '{}')", name, original_name);
        Ok(staff)
    }

    /// Remove a staff member and every entry they had on the rota. Removing
    /// an unknown name is a no-op.
    pub async fn remove_staff(&self, name: &str) -> DomainResult<Vec<StaffMember>> {
        let _guard = self.repository.lock().await;
        let mut staff = self.repository.load_staff().await;
        staff.retain(|s| s.name != name);

        let mut entries = self.repository.load_entries().await;
        remove_staff_entries(&mut entries, name);

        self.repository.save_staff_and_entries(&staff, &entries).await?;
        Ok(staff)
    }

    /// Hours and pay for the Monday-start week containing `today`.
    pub async fn week_report(&self, today: NaiveDate) -> PayReport {
        self.report(week_range(today)).await
    }

    /// Hours and pay for the calendar month containing `today`.
    pub async fn month_report(&self, today: NaiveDate) -> PayReport {
        self.report(month_range(today)).await
    }

    async fn report(&self, range: (NaiveDate, NaiveDate)) -> PayReport {
        let entries = self.repository.load_entries().await;
        let staff = self.repository.load_staff().await;
        let window = entries_in_range(&entries, range);
        PayReport {
            hours: window.iter().map(|e| e.hours).sum(),
            pay: pay_for_entries(&staff, &window),
        }
    }
}

fn time_minutes(value: &str) -> DomainResult<i64> {
    let time = NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| DomainError::validation(format!("invalid time '{}'", value)))?;
    Ok((time.hour() * 60 + time.minute()) as i64)
}

/// Shift duration in hours, rounded to the nearest quarter hour. The end must
/// fall strictly after the start and the result may not exceed 24 hours.
pub fn shift_hours(start_time: &str, end_time: &str) -> DomainResult<f64> {
    let diff = time_minutes(end_time)? - time_minutes(start_time)?;
    if diff <= 0 {
        return Err(DomainError::validation(
            "Finish time must be after start time",
        ));
    }
    let hours = (diff as f64 / 60.0 * 4.0).round() / 4.0;
    if hours > 24.0 {
        return Err(DomainError::validation("Shift cannot exceed 24 hours"));
    }
    Ok(hours)
}

/// Rewrite the staff name on every entry referencing `old_name`.
pub fn rename_staff_entries(entries: &mut [RotaEntry], old_name: &str, new_name: &str) {
    for entry in entries.iter_mut().filter(|e| e.staff_name == old_name) {
        entry.staff_name = new_name.to_string();
    }
}

/// Drop every entry belonging to a removed staff member.
pub fn remove_staff_entries(entries: &mut Vec<RotaEntry>, staff_name: &str) {
    entries.retain(|e| e.staff_name != staff_name);
}

/// Pay owed for one shift: hourly staff bill hours times rate; day-rate staff
/// bill half the day rate under seven hours and the full rate from seven up.
pub fn pay_for_entry(member: &StaffMember, entry: &RotaEntry) -> f64 {
    match member.rate_type {
        RateType::Day => {
            let portion = if entry.hours >= 7.0 { 1.0 } else { 0.5 };
            portion * member.rate
        }
        RateType::Hour => entry.hours * member.rate,
    }
}

/// Total pay across entries. Entries referencing an unknown staff member
/// contribute nothing.
pub fn pay_for_entries(staff: &[StaffMember], entries: &[RotaEntry]) -> f64 {
    entries
        .iter()
        .map(|entry| {
            staff
                .iter()
                .find(|m| m.name == entry.staff_name)
                .map(|m| pay_for_entry(m, entry))
                .unwrap_or(0.0)
        })
        .sum()
}

/// Monday-start week containing `today`, as a half-open [start, end) range.
pub fn week_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (start, start + Duration::days(7))
}

/// Calendar month containing `today`, as a half-open [start, end) range.
pub fn month_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap();
    let end = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    }
    .unwrap();
    (start, end)
}

fn entries_in_range(entries: &[RotaEntry], range: (NaiveDate, NaiveDate)) -> Vec<RotaEntry> {
    entries
        .iter()
        .filter(|e| e.date >= range.0 && e.date < range.1)
        .cloned()
        .collect()
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn sanitize_rate(rate: Option<f64>) -> f64 {
    rate.filter(|r| r.is_finite()).unwrap_or(0.0)
}
