//! Utility functions for identifiers and timestamps.

pub mod timestamps;
mod uuid_utils;

pub use timestamps::{directory_stamp, format_iso8601, iso_timestamp, now_utc, Timestamp};
pub use uuid_utils::{generate_run_id, generate_uuid, short_id};
