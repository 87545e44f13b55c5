//! ZyronDB common types, errors, and utilities.
//!
//! This crate provides shared definitions used across all ZyronDB components.

pub mod config;
pub mod error;
pub mod logging;
pub mod page;

pub use config::{AhiConfig, InvariantPolicy};
pub use error::{Result, ZyronError};
pub use page::{PAGE_SIZE, PageId, RecordRef};
