//! # Hub Testkit
//!
//! Test utilities for the hub crates.
//!
//! This crate provides:
//! - [`TestHub`], a fully wired hub over a memory or temporary file store
//! - Message fixtures with fixed timestamps
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fchub_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn merges() {
//!     init_tracing();
//!     let hub = TestHub::memory().await.unwrap();
//!     hub.merge(&link_add(1, 2, 100).unwrap()).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod hub;
pub mod tracing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::hub::*;
    pub use crate::tracing::*;
}

pub use fixtures::*;
pub use generators::*;
pub use hub::*;
pub use tracing::*;
