//! Canonical tool name constants.
//!
//! Tool-name literals reference these constants; a rename touches only
//! this file.

pub const SEARCH: &str = "search";
pub const RUN_TESTS: &str = "run_tests";
pub const SUGGEST_PROGRESSION: &str = "suggest_progression";
