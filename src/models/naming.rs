//! DNS-1123 label sanitisation, used to derive `enrollment-*` workflow
//! names from an arbitrary agent identifier (§4.3 step 1, §6).

/// Coerce `input` into a DNS-1123 label: lowercase alphanumerics and `-`,
/// runs of `-` collapsed, non-alphanumeric label boundaries padded with the
/// literal `e`, truncated to 63 characters. Returns `None` if the result
/// would be empty.
pub fn make_valid_name(input: &str, prefix: &str) -> Option<String> {
    let trimmed = input.trim();
    let combined = format!("{prefix}{trimmed}");

    let lowered: String = combined
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(lowered.len());
    let mut last_was_dash = false;
    for c in lowered.chars() {
        if c == '-' {
            if !last_was_dash {
                collapsed.push('-');
            }
            last_was_dash = true;
        } else {
            collapsed.push(c);
            last_was_dash = false;
        }
    }

    let padded = pad_boundaries(&collapsed);
    let truncated: String = padded.chars().take(63).collect();
    let truncated = pad_boundaries(&truncated);

    if truncated.is_empty() {
        None
    } else {
        Some(truncated)
    }
}

/// Leading/trailing `-` are not valid DNS-1123 boundaries; pad with a
/// literal `e` instead of stripping, per §6.
fn pad_boundaries(s: &str) -> String {
    let mut out = s.to_string();
    if out.starts_with('-') {
        out.insert(0, 'e');
    }
    if out.ends_with('-') {
        out.push('e');
    }
    out
}

/// Derive the `enrollment-<agentID>` workflow name (§4.3 step 1).
pub fn enrollment_workflow_name(agent_id: &str) -> Option<String> {
    make_valid_name(agent_id, "enrollment-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_mac_address_becomes_valid_name() {
        let name = enrollment_workflow_name("worker-123").unwrap();
        assert_eq!(name, "enrollment-worker-123");
    }

    #[test]
    fn uppercase_and_colons_are_sanitised() {
        let name = enrollment_workflow_name("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(name, "enrollment-aa-bb-cc-dd-ee-ff");
    }

    #[test]
    fn empty_input_yields_none_only_if_prefix_also_empty() {
        // The "enrollment-" prefix means a real call never goes empty; test
        // the underlying primitive directly for the empty case.
        assert_eq!(make_valid_name("", ""), None);
    }

    #[test]
    fn idempotence_under_repeated_sanitisation() {
        let once = make_valid_name("AA::bb--CC", "enrollment-").unwrap();
        let twice = make_valid_name(&once, "").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn truncates_to_63_characters() {
        let long_id = "a".repeat(100);
        let name = enrollment_workflow_name(&long_id).unwrap();
        assert!(name.len() <= 63);
    }
}
