//! # docsync testkit
//!
//! Test utilities for docsync.
//!
//! This crate provides:
//! - A sample remote schema and its type map
//! - Document builders and reference helpers
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docsync_testkit::prelude::*;
//!
//! let post = DocumentBuilder::new("post-1", "post")
//!     .field("title", "Hello")
//!     .reference("author", "author-1")
//!     .build();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
