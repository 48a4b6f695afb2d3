use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// How a staff member is paid: a per-hour rate, or a flat day rate with a
/// half/full-day threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateType {
    #[default]
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "day")]
    Day,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    /// Unique display name; rota entries reference staff by this name.
    pub name: String,
    /// Rate in pounds, interpreted per `rate_type`.
    pub rate: f64,
    #[serde(default)]
    pub rate_type: RateType,
}

/// A single shift on the rota. At most one entry exists per staff member per
/// calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotaEntry {
    pub id: String,
    pub staff_name: String,
    pub date: NaiveDate,
    /// Shift start, "HH:MM".
    pub start_time: String,
    /// Shift end, "HH:MM"; strictly after `start_time`.
    pub end_time: String,
    /// Worked hours, rounded to the nearest quarter hour.
    pub hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RotaEntry {
    /// Generate a unique entry ID: `rota-<epoch_millis>-<hex4>`.
    pub fn generate_id() -> String {
        format!("rota-{}-{}", epoch_millis(), random_suffix(4))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CashTransactionType {
    #[serde(rename = "Cash Payment")]
    CashPayment,
    #[serde(rename = "Purchase Payment")]
    PurchasePayment,
    #[serde(rename = "Other Outgoing")]
    OtherOutgoing,
}

impl CashTransactionType {
    /// Parse the wire label used by the dashboard ("Cash Payment" etc.).
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "Cash Payment" => Some(Self::CashPayment),
            "Purchase Payment" => Some(Self::PurchasePayment),
            "Other Outgoing" => Some(Self::OtherOutgoing),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CashPayment => "Cash Payment",
            Self::PurchasePayment => "Purchase Payment",
            Self::OtherOutgoing => "Other Outgoing",
        }
    }

    /// Outgoing transaction types must carry a non-empty details string.
    pub fn requires_details(self) -> bool {
        !matches!(self, Self::CashPayment)
    }

    /// Derive the signed stored amount from a caller-entered magnitude:
    /// cash payments are positive, the outgoing types negative.
    pub fn signed_amount(self, amount: f64) -> f64 {
        match self {
            Self::CashPayment => amount.abs(),
            _ => -amount.abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashTransaction {
    pub id: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: CashTransactionType,
    /// Signed: positive for cash payments, negative for outgoings.
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Creation timestamp in epoch milliseconds; used for ordering.
    pub created_at: i64,
}

impl CashTransaction {
    /// Generate a unique transaction ID: `cash-<epoch_millis>-<hex4>`.
    pub fn generate_id() -> String {
        format!("cash-{}-{}", epoch_millis(), random_suffix(4))
    }
}

/// One day of the cash ledger. Created implicitly with a zero opening balance
/// on first write for its date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashDay {
    pub date: NaiveDate,
    pub opening_balance: f64,
    #[serde(default)]
    pub transactions: Vec<CashTransaction>,
}

impl CashDay {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            opening_balance: 0.0,
            transactions: Vec::new(),
        }
    }

    /// Sum of signed transaction amounts.
    pub fn net(&self) -> f64 {
        self.transactions.iter().map(|t| t.amount).sum()
    }

    /// Opening balance plus net movement.
    pub fn closing(&self) -> f64 {
        self.opening_balance + self.net()
    }
}

/// Sparse confirmed/no-show overlay for one externally-sourced booking.
/// Absent fields mean "never set"; storage does not force the two flags to be
/// mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingFlag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_show: Option<bool>,
}

impl BookingFlag {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed.unwrap_or(false)
    }

    pub fn is_no_show(&self) -> bool {
        self.no_show.unwrap_or(false)
    }
}

/// Map from external booking id to its flag overlay.
pub type BookingFlags = BTreeMap<String, BookingFlag>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppointmentType {
    pub id: String,
    pub name: String,
    pub units: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingLegacy {
    pub appointment_types: Vec<AppointmentType>,
}

/// A booking record as returned by the external booking API. The start time
/// arrives in up to three representations; `starts_at_utc` is preferred when
/// present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Booking {
    pub id: String,
    pub title: String,
    pub starts: Option<String>,
    pub starts_at: Option<String>,
    #[serde(rename = "startsAtUTC")]
    pub starts_at_utc: Option<String>,
    pub ends: Option<String>,
    pub time_zone: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub cancelled: bool,
    pub tentative: bool,
    pub intent_id: Option<String>,
    pub units: Option<u32>,
    pub unit_count: Option<u32>,
    pub quantity: Option<u32>,
    pub legacy: Option<BookingLegacy>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

impl Booking {
    /// Name of the first appointment type, if the source supplied one.
    pub fn appointment_type_name(&self) -> Option<&str> {
        self.legacy
            .as_ref()
            .and_then(|l| l.appointment_types.first())
            .map(|t| t.name.as_str())
    }
}

/// One fixed daily time slot with the bookings assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGroup {
    /// Slot time-of-day, "HH:MM".
    pub slot_time: String,
    pub bookings: Vec<Booking>,
    pub total_units: u32,
    pub capacity: u32,
}

impl SessionGroup {
    pub fn slots_left(&self) -> i64 {
        self.capacity as i64 - self.total_units as i64
    }
}

/// A booking entered by staff directly, outside the external booking system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualBooking {
    pub id: String,
    pub name: String,
    pub booking_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Slot time-of-day this booking was placed in, "HH:MM".
    pub session_time: String,
    pub units: u32,
}

/// Manual bookings grouped by "YYYY-MM-DD" date key.
pub type ManualBookingsByDate = BTreeMap<String, Vec<ManualBooking>>;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Required fields are optional here so the domain layer can reject missing
/// input with a readable message instead of a deserialization failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRotaEntryRequest {
    pub staff_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateRotaEntryRequest {
    pub id: Option<String>,
    pub staff_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveStaffRequest {
    pub name: Option<String>,
    pub rate: Option<f64>,
    pub rate_type: Option<RateType>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateStaffRequest {
    /// Name the member is currently stored under; falls back to `name`.
    pub original_name: Option<String>,
    pub name: Option<String>,
    pub rate: Option<f64>,
    pub rate_type: Option<RateType>,
}

/// Mutation payload for a cash day: an opening-balance upsert when
/// `opening_balance` is present, otherwise a transaction append.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CashDayRequest {
    pub date: Option<NaiveDate>,
    pub opening_balance: Option<f64>,
    /// Wire label, e.g. "Cash Payment"; validated by the domain layer.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<f64>,
    pub details: Option<String>,
}

/// Partial flag upsert: only the booleans present are written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsertFlagRequest {
    pub booking_id: Option<String>,
    pub confirmed: Option<bool>,
    pub no_show: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateManualBookingRequest {
    pub date: Option<NaiveDate>,
    pub booking: Option<ManualBooking>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntriesResponse {
    pub entries: Vec<RotaEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<RotaEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffResponse {
    pub staff: Vec<StaffMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashDayResponse {
    pub day: CashDay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<CashTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagsResponse {
    pub flags: BookingFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualBookingListResponse {
    pub manual_bookings: Vec<ManualBooking>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualBookingMapResponse {
    pub manual_bookings: ManualBookingsByDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis()
}

/// Generate a random hex suffix for record IDs.
fn random_suffix(len: usize) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_nanos();
    format!("{:x}", now % (16_u128.pow(len as u32)))
        .chars()
        .take(len)
        .collect()
}
