//! Integration tests for drivemirror-sync
//!
//! Runs complete mirror runs against a wiremock Drive API: listing, unit
//! partitioning, transfers into a temporary root, progress reporting and
//! session handling.

mod common;

mod test_mirror_run;
