//! Hyperlens Test Utilities
//!
//! - [`FakeEngine`]: a `/bin/sh` script standing in for the inspection engine.
//!   It records its argument list and answers with a canned document, a
//!   failure, or whatever shell body the test supplies.
//! - [`payloads`]: builders for the JSON documents the real engine prints.
//!
//! ```rust,ignore
//! let engine = FakeEngine::responding(&payloads::inspect_payload("a.hyper", &[table]));
//! let dispatcher = Dispatcher::from_engine(ProcessEngine::new(&engine.settings()));
//! ```

#[cfg(unix)]
pub mod fake_engine;
pub mod payloads;

#[cfg(unix)]
pub use fake_engine::FakeEngine;
pub use payloads::TableFixture;
