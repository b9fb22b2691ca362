//! Identity derivation for topologies and their child resources.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use snafu::{OptionExt, Snafu};

use crate::{labels, name_utils};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("topology object has no namespace set"))]
    NoNamespace,

    #[snafu(display("topology object has no uid set"))]
    NoUid,
}

/// The identity of the owning topology declaration.
///
/// Everything needed to derive names, labels and owner references for child
/// resources, detached from the custom resource itself so that the synthesis
/// functions stay pure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TopologyIdentity {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub api_version: String,
    pub kind: String,
    /// Full CRD name (`<plural>.<group>`), used for the `part-of` label.
    pub crd_name: String,
}

impl TopologyIdentity {
    /// Extracts the identity from a custom resource object.
    ///
    /// Fails if the object carries no namespace or uid, which can only happen
    /// for objects that did not come from the API server.
    pub fn from_resource<K>(resource: &K) -> Result<Self, Error>
    where
        K: Resource<DynamicType = ()>,
    {
        Ok(Self {
            name: resource.name_any(),
            namespace: resource.namespace().context(NoNamespaceSnafu)?,
            uid: resource.uid().context(NoUidSnafu)?,
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            crd_name: format!("{}.{}", K::plural(&()), K::group(&())),
        })
    }

    /// Derives the identity of a child resource from this topology and the
    /// component's short id and version.
    ///
    /// Derivation is total over non-empty inputs; passing an empty short id is
    /// a caller contract violation, not a runtime error.
    pub fn resource_identity(&self, short_id: &str, version: &str) -> ResourceIdentity {
        ResourceIdentity {
            name: name_utils::object_name(&self.name, short_id),
            namespace: self.namespace.clone(),
            labels: labels::recommended_labels(self, short_id, version),
            owner_reference: self.owner_reference(),
        }
    }

    /// Owner reference linking a child resource to this topology, so that
    /// deleting the topology cascades to everything it manages.
    fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            ..OwnerReference::default()
        }
    }
}

/// Derived identity of a single child resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceIdentity {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub owner_reference: OwnerReference,
}

impl ResourceIdentity {
    /// The complete [`ObjectMeta`] for this resource.
    pub fn object_meta(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels.clone()),
            owner_references: Some(vec![self.owner_reference.clone()]),
            ..ObjectMeta::default()
        }
    }
}
