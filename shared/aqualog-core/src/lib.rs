//! Aqualog Core - Shared domain types and error handling
//!
//! This crate provides:
//! - The sensor `Record` model and its reserved fields
//! - Range and pagination types shared by every store query
//! - Daily / monthly report rows and the rounding policy
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod domain;
pub mod error;
pub mod query;
pub mod report;

pub use config::ServiceConfig;
pub use domain::*;
pub use error::{AquaError, Result};
pub use query::{Page, QueryRange, RecordPage, TaggedRecord, DEFAULT_LIMIT, MAX_LIMIT};
pub use report::{round2, DailyReport, MonthlyReport};
