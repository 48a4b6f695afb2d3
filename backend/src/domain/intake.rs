//! Heuristic extraction of customer contact details from the free-form
//! intake form attached to an upstream booking intent.
//!
//! Form fields are matched by an explicit ordered list of strategies: exact
//! field ids first, then id fragments, then label keywords. The first
//! strategy that matches a field with a non-empty value wins; nothing here
//! feeds back into domain validation.

use serde::Deserialize;

/// One free-form field from the upstream intake form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IntakeField {
    pub id: String,
    pub label: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

type Strategy = fn(&IntakeField) -> bool;

// Ordered fallback chains. "EMAIL" and "Q7" are the field ids the booking
// provider assigns; the label checks catch re-built forms where ids changed.
const EMAIL_STRATEGIES: &[Strategy] = &[
    |f| f.id == "EMAIL",
    |f| f.id.contains("EMAIL"),
    |f| label_contains(f, "email"),
];

const PHONE_STRATEGIES: &[Strategy] = &[
    |f| f.id == "Q7",
    |f| f.id.contains("PHONE"),
    |f| label_contains(f, "phone"),
    |f| label_contains(f, "mobile"),
];

const NAME_STRATEGIES: &[Strategy] = &[
    |f| f.id == "FNAME",
    |f| f.id.contains("NAME"),
    |f| label_contains(f, "name"),
];

fn label_contains(field: &IntakeField, keyword: &str) -> bool {
    field
        .label
        .as_deref()
        .map(|l| l.to_lowercase().contains(keyword))
        .unwrap_or(false)
}

fn first_value(fields: &[IntakeField], strategies: &[Strategy]) -> Option<String> {
    for strategy in strategies {
        let hit = fields
            .iter()
            .find(|f| strategy(f))
            .and_then(|f| f.value.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(value) = hit {
            return Some(value.to_string());
        }
    }
    None
}

/// Pull name, email and phone out of the intake form, if present.
pub fn extract_contact(fields: &[IntakeField]) -> ContactDetails {
    ContactDetails {
        name: first_value(fields, NAME_STRATEGIES),
        email: first_value(fields, EMAIL_STRATEGIES),
        phone: first_value(fields, PHONE_STRATEGIES),
    }
}
