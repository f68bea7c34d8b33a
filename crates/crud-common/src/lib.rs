//! CRUD Skeleton Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared constants, logging setup and error handling for the CRUD skeleton
//! workspace.
//!
//! # Overview
//!
//! - **Constants**: header names and route fragments shared by every service
//!   built from the skeleton
//! - **Error Handling**: common error and result types
//! - **Logging**: `tracing` subscriber initialisation with rotating file output
//!
//! # Example
//!
//! ```no_run
//! use crud_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("Service started");
//!     Ok(())
//! }
//! ```

pub mod constants;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
