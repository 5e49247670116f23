//! PBV I/O - container and filesystem layer
//!
//! This crate provides the I/O layer and high-level pipeline for PBV:
//!
//! - Zip container adapter (ordered read, deterministic write)
//! - Extracted-tree read/write with order records
//! - Extract / compress / textconv orchestration

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod pipeline;
pub mod tree;

// Re-export commonly used types
pub use archive::{Container, Entry};
pub use pbv_format::{PbvError, Result};
pub use pipeline::{
    execute_compress, execute_extract, execute_textconv, CompressSummary, ExtractSummary,
    PipelineOptions,
};
