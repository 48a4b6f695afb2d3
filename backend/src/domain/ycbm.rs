//! Parsing for payloads fetched from the external booking API.
//!
//! The HTTP client itself lives outside this service; callers hand over the
//! upstream status and body and get domain values or an upstream error with
//! a truncated body excerpt back.

use serde::Deserialize;
use shared::Booking;
use tracing::error;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::intake::{extract_contact, ContactDetails, IntakeField};

const BODY_EXCERPT_LEN: usize = 200;

#[derive(Deserialize)]
struct BookingsEnvelope {
    bookings: Vec<Booking>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct IntentEnvelope {
    selections: IntentSelections,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct IntentSelections {
    form: Vec<IntakeField>,
}

/// Parse a bookings listing response. The upstream returns a bare array;
/// an envelope with a `bookings` field is accepted too.
pub fn parse_bookings_response(status: u16, body: &str) -> DomainResult<Vec<Booking>> {
    check_status(status, body)?;

    serde_json::from_str::<Vec<Booking>>(body)
        .or_else(|_| serde_json::from_str::<BookingsEnvelope>(body).map(|e| e.bookings))
        .map_err(|e| {
            error!("Unreadable bookings payload: {}", e);
            DomainError::Upstream {
                status,
                detail: excerpt(body),
            }
        })
}

/// Parse a booking-intent response and pull the customer contact details out
/// of its free-form intake form.
pub fn parse_intent_response(status: u16, body: &str) -> DomainResult<ContactDetails> {
    check_status(status, body)?;

    let envelope: IntentEnvelope = serde_json::from_str(body).map_err(|e| {
        error!("Unreadable intent payload: {}", e);
        DomainError::Upstream {
            status,
            detail: excerpt(body),
        }
    })?;
    Ok(extract_contact(&envelope.selections.form))
}

fn check_status(status: u16, body: &str) -> DomainResult<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    error!("Booking API returned {}: {}", status, excerpt(body));
    Err(DomainError::Upstream {
        status,
        detail: excerpt(body),
    })
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LEN).collect()
}
