//! Integration tests for the fgdedup library and CLI.
//!
//! These tests validate end-to-end workflows that span multiple modules: partition
//! assembly feeding the group combiner, and the `dedup` command as a whole.

mod helpers;
mod test_dedup_command;
mod test_group_combiner;
