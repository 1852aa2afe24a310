//! # Cairn Testkit
//!
//! Test utilities for Cairn.
//!
//! This crate provides:
//! - Fixtures that open storage or a whole host in a temporary directory
//! - Property-based test generators using proptest
//! - A model-checked harness comparing storage against committed state
//!
//! The cross-crate scenario tests live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cairn_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_storage() {
//!     with_temp_storage(|storage| {
//!         put_all(storage, &MARKET_DATA, &[(b"k", b"v")]);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
