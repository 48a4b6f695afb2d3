use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use shared::{
    CashDayRequest, CashDayResponse, CreateManualBookingRequest, CreateRotaEntryRequest,
    EntriesResponse, ErrorResponse, FlagsResponse, ManualBookingListResponse,
    ManualBookingMapResponse, OkResponse, RotaEntry, SaveStaffRequest, StaffResponse,
    UpdateRotaEntryRequest, UpdateStaffRequest, UpsertFlagRequest,
};
use tracing::info;

use crate::db::DbConnection;
use crate::domain::{BookingService, CashService, DomainError, DomainResult, RotaService};
use crate::storage::{BookingRepository, CashRepository, RotaRepository};

/// Application state shared across handlers: one service per dashboard area.
#[derive(Clone)]
pub struct AppState {
    pub rota: RotaService,
    pub cash: CashService,
    pub bookings: BookingService,
}

impl AppState {
    pub fn new(db: &DbConnection) -> Self {
        Self {
            rota: RotaService::new(RotaRepository::new(db.clone())),
            cash: CashService::new(CashRepository::new(db.clone())),
            bookings: BookingService::new(BookingRepository::new(db.clone())),
        }
    }
}

/// Build the `/api` router over the given state.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/rota/entries",
            get(list_rota_entries)
                .post(create_rota_entry)
                .put(update_rota_entry)
                .delete(delete_rota_entry),
        )
        .route(
            "/rota/staff",
            get(list_staff)
                .post(create_staff)
                .put(update_staff)
                .delete(delete_staff),
        )
        .route(
            "/cash/day",
            get(get_cash_day)
                .post(mutate_cash_day)
                .delete(delete_cash_transaction),
        )
        .route("/booking-flags", get(get_booking_flags).post(upsert_booking_flag))
        .route(
            "/manual-bookings",
            get(list_manual_bookings)
                .post(create_manual_booking)
                .delete(delete_manual_booking),
        );

    Router::new().nest("/api", api).with_state(state)
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = match &self {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Deserialize, Debug)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug)]
pub struct DeleteEntryQuery {
    pub id: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug)]
pub struct NameQuery {
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct DateIdQuery {
    pub date: Option<NaiveDate>,
    pub id: Option<String>,
}

fn filter_by_date(entries: Vec<RotaEntry>, date: Option<NaiveDate>) -> Vec<RotaEntry> {
    match date {
        Some(date) => entries.into_iter().filter(|e| e.date == date).collect(),
        None => entries,
    }
}

// ---------------------------------------------------------------------------
// Rota entries
// ---------------------------------------------------------------------------

pub async fn list_rota_entries(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Json<EntriesResponse> {
    info!("GET /api/rota/entries - query: {:?}", query);
    let entries = state.rota.list_entries(query.date).await;
    Json(EntriesResponse { entries, entry: None })
}

pub async fn create_rota_entry(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
    Json(request): Json<CreateRotaEntryRequest>,
) -> Result<(StatusCode, Json<EntriesResponse>), DomainError> {
    info!("POST /api/rota/entries - request: {:?}", request);
    let today = Local::now().date_naive();
    let (entry, entries) = state.rota.add_entry(request, today).await?;
    // When the caller is viewing one date, echo back just that date's list
    let entries = filter_by_date(entries, query.date.map(|_| entry.date));
    Ok((
        StatusCode::CREATED,
        Json(EntriesResponse { entries, entry: Some(entry) }),
    ))
}

pub async fn update_rota_entry(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
    Json(request): Json<UpdateRotaEntryRequest>,
) -> Result<Json<EntriesResponse>, DomainError> {
    info!("PUT /api/rota/entries - request: {:?}", request);
    let (entry, entries) = state.rota.update_entry(request).await?;
    let entries = filter_by_date(entries, query.date.map(|_| entry.date));
    Ok(Json(EntriesResponse { entries, entry: Some(entry) }))
}

pub async fn delete_rota_entry(
    State(state): State<AppState>,
    Query(query): Query<DeleteEntryQuery>,
) -> Result<Json<EntriesResponse>, DomainError> {
    info!("DELETE /api/rota/entries - query: {:?}", query);
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DomainError::validation("id required"))?;
    let entries = state.rota.delete_entry(&id).await?;
    let entries = filter_by_date(entries, query.date);
    Ok(Json(EntriesResponse { entries, entry: None }))
}

// ---------------------------------------------------------------------------
// Rota staff
// ---------------------------------------------------------------------------

pub async fn list_staff(State(state): State<AppState>) -> Json<StaffResponse> {
    info!("GET /api/rota/staff");
    Json(StaffResponse { staff: state.rota.list_staff().await })
}

pub async fn create_staff(
    State(state): State<AppState>,
    Json(request): Json<SaveStaffRequest>,
) -> Result<(StatusCode, Json<StaffResponse>), DomainError> {
    info!("POST /api/rota/staff - request: {:?}", request);
    let staff = state.rota.add_staff(request).await?;
    Ok((StatusCode::CREATED, Json(StaffResponse { staff })))
}

pub async fn update_staff(
    State(state): State<AppState>,
    Json(request): Json<UpdateStaffRequest>,
) -> Result<Json<StaffResponse>, DomainError> {
    info!("PUT /api/rota/staff - request: {:?}", request);
    let staff = state.rota.update_staff(request).await?;
    Ok(Json(StaffResponse { staff }))
}

pub async fn delete_staff(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<StaffResponse>, DomainError> {
    info!("DELETE /api/rota/staff - query: {:?}", query);
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| DomainError::validation("name required"))?
        .to_string();
    let staff = state.rota.remove_staff(&name).await?;
    Ok(Json(StaffResponse { staff }))
}

// ---------------------------------------------------------------------------
// Cash ledger
// ---------------------------------------------------------------------------

/// Days other than today are read-only; the ledger itself stays permissive
/// and the rule is applied here at the API boundary.
fn ensure_day_unlocked(date: NaiveDate, today: NaiveDate) -> DomainResult<()> {
    if date != today {
        return Err(DomainError::conflict("This day is locked and can't be edited"));
    }
    Ok(())
}

pub async fn get_cash_day(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Json<CashDayResponse> {
    info!("GET /api/cash/day - query: {:?}", query);
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    Json(CashDayResponse { day: state.cash.get_day(date).await, entry: None })
}

pub async fn mutate_cash_day(
    State(state): State<AppState>,
    Json(request): Json<CashDayRequest>,
) -> Result<Response, DomainError> {
    info!("POST /api/cash/day - request: {:?}", request);
    let today = Local::now().date_naive();
    let date = request.date.unwrap_or(today);
    ensure_day_unlocked(date, today)?;

    if let Some(opening) = request.opening_balance {
        let day = state.cash.set_opening_balance(date, opening).await?;
        return Ok(Json(CashDayResponse { day, entry: None }).into_response());
    }

    let (day, entry) = state
        .cash
        .add_transaction(date, request.kind.as_deref(), request.amount, request.details.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CashDayResponse { day, entry: Some(entry) }),
    )
        .into_response())
}

pub async fn delete_cash_transaction(
    State(state): State<AppState>,
    Query(query): Query<DateIdQuery>,
) -> Result<Json<CashDayResponse>, DomainError> {
    info!("DELETE /api/cash/day - query: {:?}", query);
    let (date, id) = match (query.date, query.id.filter(|id| !id.is_empty())) {
        (Some(date), Some(id)) => (date, id),
        _ => return Err(DomainError::validation("date and id required")),
    };
    ensure_day_unlocked(date, Local::now().date_naive())?;
    let day = state.cash.delete_transaction(date, &id).await?;
    Ok(Json(CashDayResponse { day, entry: None }))
}

// ---------------------------------------------------------------------------
// Booking flags
// ---------------------------------------------------------------------------

pub async fn get_booking_flags(State(state): State<AppState>) -> Json<FlagsResponse> {
    info!("GET /api/booking-flags");
    Json(FlagsResponse { flags: state.bookings.flags().await })
}

pub async fn upsert_booking_flag(
    State(state): State<AppState>,
    Json(request): Json<UpsertFlagRequest>,
) -> Result<Json<OkResponse>, DomainError> {
    info!("POST /api/booking-flags - request: {:?}", request);
    state.bookings.upsert_flag(request).await?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Manual bookings
// ---------------------------------------------------------------------------

pub async fn list_manual_bookings(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Response {
    info!("GET /api/manual-bookings - query: {:?}", query);
    match query.date {
        Some(date) => Json(ManualBookingListResponse {
            manual_bookings: state.bookings.manual_bookings_for_date(date).await,
        })
        .into_response(),
        None => Json(ManualBookingMapResponse {
            manual_bookings: state.bookings.manual_bookings().await,
        })
        .into_response(),
    }
}

pub async fn create_manual_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateManualBookingRequest>,
) -> Result<(StatusCode, Json<ManualBookingListResponse>), DomainError> {
    info!("POST /api/manual-bookings - request: {:?}", request);
    let manual_bookings = state.bookings.add_manual_booking(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ManualBookingListResponse { manual_bookings }),
    ))
}

pub async fn delete_manual_booking(
    State(state): State<AppState>,
    Query(query): Query<DateIdQuery>,
) -> Result<Json<ManualBookingListResponse>, DomainError> {
    info!("DELETE /api/manual-bookings - query: {:?}", query);
    let (date, id) = match (query.date, query.id.filter(|id| !id.is_empty())) {
        (Some(date), Some(id)) => (date, id),
        _ => return Err(DomainError::validation("date and id required")),
    };
    let manual_bookings = state.bookings.delete_manual_booking(date, &id).await?;
    Ok(Json(ManualBookingListResponse { manual_bookings }))
}
