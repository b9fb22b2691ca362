//! Canonical names for objects managed by a topology.
//!
//! Every child resource is named `<topology-name>-<component-short-id>`, where
//! the short id is the component's image name (or a fixed marker like
//! `bindings` for the credential bundle). Kubernetes limits object names to 63
//! characters, so longer concatenations are cut down.

/// The maximum length of a Kubernetes object name.
pub const MAX_OBJECT_NAME_LENGTH: usize = 63;

/// Names exceeding [`MAX_OBJECT_NAME_LENGTH`] are cut to this length.
const TRUNCATED_NAME_LENGTH: usize = 62;

/// Derives the canonical object name for a child resource of a topology.
///
/// The derivation is total: any combination of topology name and short id
/// yields a name. Names longer than 63 characters are truncated to exactly 62
/// characters. Two distinct components whose concatenations only differ after
/// the cut-off point collapse onto the same name; this is not detected here.
pub fn object_name(topology_name: &str, component_short_id: &str) -> String {
    let mut name = format!("{topology_name}-{component_short_id}");
    if name.len() > MAX_OBJECT_NAME_LENGTH {
        name.truncate(TRUNCATED_NAME_LENGTH);
    }
    name
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("prod", "postgres", "prod-postgres")]
    #[case("acme", "reg-svc", "acme-reg-svc")]
    #[case("acme", "bindings", "acme-bindings")]
    fn short_names_are_left_untouched(
        #[case] topology: &str,
        #[case] short_id: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(object_name(topology, short_id), expected);
    }

    #[test]
    fn name_at_limit_is_not_truncated() {
        // 50 + 1 + 12 = 63 characters, exactly at the limit
        let topology = "a".repeat(50);
        let name = object_name(&topology, "registration");
        assert_eq!(name.len(), 63);
        assert_eq!(name, format!("{topology}-registration"));
    }

    #[test]
    fn name_over_limit_is_cut_to_62() {
        // 57 + 1 + 12 = 70 characters
        let topology = "a".repeat(57);
        let name = object_name(&topology, "registration");
        assert_eq!(name.len(), 62);
        assert!(name.starts_with(&topology));
    }

    #[test]
    fn name_one_over_limit_is_cut_to_62() {
        // 51 + 1 + 12 = 64 characters
        let topology = "a".repeat(51);
        let name = object_name(&topology, "registration");
        assert_eq!(name.len(), 62);
    }
}
