//! Shared parsing utilities for scheduler command output.
//!
//! Command execution with bounded runtime and the small string helpers
//! used when splitting sinfo/squeue records.

pub mod command;

pub use command::{CommandError, run_command, run_command_bytes};

/// Filter helper for optional string fields.
/// Returns None if the string is empty or a placeholder value.
pub fn non_empty_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "N/A" || trimmed == "Unknown" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split a delimited line and validate field count.
pub fn split_delimited(line: &str, delimiter: char, min_fields: usize) -> Result<Vec<&str>, String> {
    let fields: Vec<&str> = line.split(delimiter).collect();
    if fields.len() < min_fields {
        return Err(format!(
            "Expected {} fields, got {}: {}",
            min_fields,
            fields.len(),
            line
        ));
    }
    Ok(fields)
}
