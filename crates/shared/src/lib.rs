//! Shared types, errors, and configuration for Banka.
//!
//! This crate provides common types used across all other crates:
//! - Money type stored as integer minor units
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management
//! - JWT validation and SMTP email transport

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::Claims;
pub use config::{AppConfig, DatabaseConfig, EmailConfig, LedgerConfig};
pub use email::{EmailError, EmailService};
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
pub use types::{AccountId, Money, PageRequest, PageResponse, TransactionId, UserId};
