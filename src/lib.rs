//! Validates planning artifacts — the STATE document, the task registry,
//! and per-wave plans — across four fixed-order layers: schema, semantic,
//! referential, and state-machine. Results map onto a frozen exit-code
//! taxonomy and every outcome can be recorded in an append-only audit log.

pub mod audit;
pub mod config;
pub mod error;
pub mod exit_code;
pub mod hooks;
pub mod log;
pub mod referential;
pub mod runner;
pub mod schema_layer;
pub mod schema_store;
pub mod semantic;
pub mod state_machine;
pub mod status;
pub mod types;

pub use error::WardenError;
pub use exit_code::ExitCode;
pub use runner::{ValidationOptions, PipelineResult};
pub use types::{FileType, LayerName, ValidationContext, ValidationError};
