//! The well-known `app.kubernetes.io` labels attached to every managed object.
//!
//! Downstream selectors (Service to Pod matching) rely on exact-match against
//! this label set, so the same function is used both when labelling a workload
//! and when building the selector of its Service.

use std::collections::BTreeMap;

use const_format::concatcp;

use crate::{meta::TopologyIdentity, name_utils};

const K8S_APP_KEY_PREFIX: &str = "app.kubernetes.io/";

/// The name of the application, e.g. `prod-postgres`.
pub const APP_NAME_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "name");

/// The current version of the application, e.g. `14`.
pub const APP_VERSION_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "version");

/// The component within the architecture, e.g. `postgres`.
pub const APP_COMPONENT_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "component");

/// The name of the higher level application this one is part of, e.g.
/// `datacenters.manufacturing.io`.
pub const APP_PART_OF_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "part-of");

/// The tool being used to manage the operation of an application, e.g.
/// `Datacenter`.
pub const APP_MANAGED_BY_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "managed-by");

/// Returns the label set shared by a component's workload, pod template and
/// service selector. The set always carries exactly these five keys:
///
/// - `app.kubernetes.io/name`
/// - `app.kubernetes.io/version`
/// - `app.kubernetes.io/component`
/// - `app.kubernetes.io/part-of`
/// - `app.kubernetes.io/managed-by`
pub fn recommended_labels(
    topology: &TopologyIdentity,
    component_short_id: &str,
    component_version: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            APP_NAME_KEY.to_owned(),
            name_utils::object_name(&topology.name, component_short_id),
        ),
        (APP_VERSION_KEY.to_owned(), component_version.to_owned()),
        (APP_COMPONENT_KEY.to_owned(), component_short_id.to_owned()),
        (APP_PART_OF_KEY.to_owned(), topology.crd_name.clone()),
        (APP_MANAGED_BY_KEY.to_owned(), topology.kind.clone()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::TopologyIdentity;

    fn topology() -> TopologyIdentity {
        TopologyIdentity {
            name: "prod".to_owned(),
            namespace: "default".to_owned(),
            uid: "e2e2b1f6".to_owned(),
            api_version: "manufacturing.io/v1alpha1".to_owned(),
            kind: "Datacenter".to_owned(),
            crd_name: "datacenters.manufacturing.io".to_owned(),
        }
    }

    #[test]
    fn label_set_has_exactly_five_keys() {
        let labels = recommended_labels(&topology(), "postgres", "14");

        assert_eq!(labels.len(), 5);
        assert_eq!(labels[APP_NAME_KEY], "prod-postgres");
        assert_eq!(labels[APP_VERSION_KEY], "14");
        assert_eq!(labels[APP_COMPONENT_KEY], "postgres");
        assert_eq!(labels[APP_PART_OF_KEY], "datacenters.manufacturing.io");
        assert_eq!(labels[APP_MANAGED_BY_KEY], "Datacenter");
    }

    #[test]
    fn name_label_is_truncated_like_the_object_name() {
        let mut topology = topology();
        topology.name = "d".repeat(70);
        let labels = recommended_labels(&topology, "postgres", "14");
        assert_eq!(labels[APP_NAME_KEY].len(), 62);
    }
}
