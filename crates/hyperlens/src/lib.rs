//! Hyperlens: inspect and export Tableau `.hyper` extracts.
//!
//! The engine bridge lives in `hyperlens_engine`; this crate adds what sits
//! around it:
//! - [`staging`]: upload staging with a periodic sweep
//! - [`shaping`]: JSON and delimited-text rendering of export results
//! - [`server`]: the axum HTTP service

pub mod server;
pub mod shaping;
pub mod staging;

pub use server::{router, serve, AppState, ApiError};
pub use shaping::ExportFormat;
pub use staging::{PendingUpload, StagingArea, StagingError, SweepReport, Sweeper};
