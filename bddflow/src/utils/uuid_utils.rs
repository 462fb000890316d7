//! UUID generation.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a new run identifier.
#[must_use]
pub fn generate_run_id() -> String {
    generate_uuid().to_string()
}

/// Returns the first eight characters of an identifier, for file names and logs.
#[must_use]
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
