//! Core types, configuration, and error handling for iacscan.
//!
//! This crate provides the shared foundation used by the scanning workflow
//! and the CLI:
//! - [`IacScanError`]: unified error type using `thiserror`
//! - [`IacScanConfig`]: configuration loaded from `.iacscan.toml`
//! - Shared types: [`ChangedFile`], [`Severity`], [`ScanSummary`],
//!   [`Finding`], [`ScanReport`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{ApiConfig, IacScanConfig, ScanConfig};
pub use error::IacScanError;
pub use types::{
    parse_start_line, within_threshold, ChangedFile, Finding, FindingStatus, OutputFormat,
    ScanReport, ScanSummary, Severity, FILE_ALIAS_PREFIX,
};

/// A convenience `Result` type for iacscan operations.
pub type Result<T> = std::result::Result<T, IacScanError>;
