//! Hyperlens engine bridge.
//!
//! [`ProcessEngine`] runs the external inspection engine (one process per
//! call) behind the [`Engine`] trait, and [`Dispatcher`] turns caller requests
//! into validated engine invocations with typed results.

pub mod adapter;
pub mod cancel;
pub mod dispatcher;
pub mod error;
pub mod validate;

pub use adapter::{Engine, ProcessEngine};
pub use cancel::CancellationToken;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, EngineError};
