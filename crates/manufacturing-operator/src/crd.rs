//! Custom resources declaring manufacturing deployment topologies.
//!
//! Two topology kinds exist: a [`Datacenter`] (central datastores plus the
//! global services) and a [`Factory`] (the per-plant services). Both share
//! the same spec shape; which roles must be declared and in which order they
//! are synthesized is defined in [`crate::component`].

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const API_GROUP: &str = "manufacturing.io";
pub const API_VERSION: &str = "v1alpha1";

const DEFAULT_VERSION: &str = "latest";
const DEFAULT_LOG_LEVEL: &str = "INFO";

/// The role names under which application services are declared in a
/// topology. Which of these a topology requires depends on its kind.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    JsonSchema,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ServiceRole {
    /// Registers plants and hands out certificates (Datacenter).
    Registration,
    /// Manages the set of known plants (Datacenter).
    PlantManager,
    /// Product line management, global (Datacenter) or per-plant (Factory).
    ProductLine,
    /// Collects telemetry events (Datacenter).
    EventCollector,
    /// Manages one plant's facilities (Factory).
    FacilityManager,
    /// Validates produced items (Factory).
    ProductionValidator,
}

/// The declaration of one application service participating in a topology.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// The image name for this service. The image name doubles as the
    /// component's short identifier when deriving object names and labels.
    pub image: String,

    /// The image tag for this service. Defaults to `latest` when empty.
    #[serde(default)]
    pub version: String,

    /// Log level for this service. Defaults to `INFO` when empty.
    #[serde(default)]
    pub log_level: String,
}

impl ComponentSpec {
    pub fn version(&self) -> &str {
        if self.version.is_empty() {
            DEFAULT_VERSION
        } else {
            &self.version
        }
    }

    pub fn log_level(&self) -> &str {
        if self.log_level.is_empty() {
            DEFAULT_LOG_LEVEL
        } else {
            &self.log_level
        }
    }

    /// The full image reference, `<registry><image>:<version>`. The registry
    /// prefix is expected to carry its trailing `/`.
    pub fn image_ref(&self, registry: &str) -> String {
        format!("{registry}{}:{}", self.image, self.version())
    }
}

/// The declared desired state shared by all topology kinds.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologySpec {
    /// Registry URL prefix for all service images. Note: include the
    /// trailing `/` in the value.
    #[serde(default)]
    pub registry: String,

    /// Relative sizing for the deployments from 1 to 5 (largest quotas).
    /// Accepted and validated, but not yet consumed by synthesis.
    #[serde(default = "TopologySpec::default_sizing_tier")]
    #[schemars(range(min = 1, max = 5))]
    pub sizing_tier: u8,

    /// Endpoint for the Kafka event bus.
    #[serde(default)]
    pub event_bus_endpoint: String,

    /// The application services participating in this topology, keyed by
    /// role.
    #[serde(default)]
    pub components: BTreeMap<ServiceRole, ComponentSpec>,
}

impl TopologySpec {
    fn default_sizing_tier() -> u8 {
        1
    }
}

/// A Datacenter topology: the central datastores (relational, time-series,
/// document) plus registration, plant-manager, product-line and
/// event-collector services.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "manufacturing.io",
    version = "v1alpha1",
    kind = "Datacenter",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpec {
    #[serde(flatten)]
    pub topology: TopologySpec,
}

/// A Factory topology: the per-plant datastores (relational, document) plus
/// facility-manager, product-line and production-validator services.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "manufacturing.io",
    version = "v1alpha1",
    kind = "Factory",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct FactorySpec {
    #[serde(flatten)]
    pub topology: TopologySpec,
}
