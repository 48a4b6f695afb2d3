//! Domain services for the dashboard: rota, cash ledger, booking sessions.

pub mod booking_service;
pub mod cash_service;
pub mod errors;
pub mod intake;
pub mod rota_service;
pub mod ycbm;

pub use booking_service::BookingService;
pub use cash_service::CashService;
pub use errors::{DomainError, DomainResult};
pub use rota_service::RotaService;
