// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Generate a document ID from a seed and timestamp.
/// Format: first 8 hex chars of SHA256(seed + timestamp)
pub fn generate_id(seed: &str, created_at: &DateTime<Utc>) -> String {
    let input = format!("{}{}", seed, created_at.to_rfc3339());
    let hash = Sha256::digest(input.as_bytes());
    hex::encode(&hash[..4]) // First 8 hex chars (4 bytes)
}

/// The ID to try on the given collision attempt.
///
/// Attempt 0 is the base ID itself; later attempts append `-2`, `-3`, ...
pub fn candidate(base_id: &str, attempt: u32) -> String {
    if attempt == 0 {
        base_id.to_string()
    } else {
        format!("{}-{}", base_id, attempt.saturating_add(1))
    }
}

/// Client ID used when the config leaves `broker.client_id` empty.
pub fn generate_client_id(created_at: &DateTime<Utc>) -> String {
    format!(
        "rulebridge-{}",
        generate_id(&std::process::id().to_string(), created_at)
    )
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
