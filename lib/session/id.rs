//! Session ID generation.

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Generate a unique session ID.
///
/// Format: "vty_" + 8 random alphanumeric characters.
/// Example: "vty_a1b2c3d4"
pub fn generate_session_id() -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!("vty_{}", suffix)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
