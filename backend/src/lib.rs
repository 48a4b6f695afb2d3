//! Backend for the frontdesk staff dashboard: rota, cash ledger and booking
//! session overlays behind a small JSON API, persisted in a SQLite-backed
//! key-value store.

pub mod db;
pub mod domain;
pub mod rest;
pub mod storage;
