//! PBV Format - Transform core for Power BI container conversion
//!
//! This crate provides the pure transform layer with no filesystem I/O:
//!
//! - Error types
//! - Entry classification and the schema descriptor registry
//! - Entry text encodings (UTF-8 / UTF-16-LE)
//! - JSON canonicalization and its inverse
//! - Noise field suppression
//! - Split groups and ordering records
//! - Visual-container sorting

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod canonical;
pub mod encoding;
pub mod error;
pub mod schema;
pub mod sort;
pub mod split;

// Re-export commonly used types
pub use canonical::{EMBEDDED_JSON_KEY, MULTILINE_KEY};
pub use encoding::Encoding;
pub use error::{PbvError, Result};
pub use schema::{classify, NoiseField, NoisePolicy, SchemaDescriptor, SchemaKind};
pub use split::{SplitGroup, SPLIT_GROUP_KEY};
