//! EquipLend server
//!
//! REST JSON API for lending and tracking shared equipment: catalog with QR
//! codes, loan requests and reservations, notifications, audit trail and
//! utilization reports.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod text;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
