//! CLI command implementations for fgdedup.
//!
//! - [`dedup`] - Mark duplicates in a read table, partition by partition

#![allow(
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod common;
pub mod dedup;
