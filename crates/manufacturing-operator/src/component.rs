//! Per-role metadata tables and the fixed synthesis pipelines.
//!
//! Instead of one spec type per service (as a naive modelling would produce),
//! every application service is a [`crate::crd::ComponentSpec`] tagged with a
//! [`crate::crd::ServiceRole`]; everything role-specific lives in the static
//! [`ServiceProfile`] tables below. Datastores are not declared by the user at
//! all, they are fixed per topology kind and described by
//! [`DatastoreProfile`] entries.
//!
//! The order of the profile slices *is* the synthesis pipeline order. A later
//! entry may consume context properties published by an earlier one;
//! reordering entries changes which properties are visible to which component
//! and is a breaking change.

use crate::crd::ServiceRole;

/// The kind of logical unit a topology declaration describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum TopologyKind {
    Datacenter,
    Factory,
}

impl TopologyKind {
    /// The datastores of this topology, in pipeline order.
    pub fn datastores(&self) -> &'static [DatastoreProfile] {
        match self {
            Self::Datacenter => &DATACENTER_DATASTORES,
            Self::Factory => &FACTORY_DATASTORES,
        }
    }

    /// The application services of this topology, in pipeline order.
    pub fn services(&self) -> &'static [ServiceProfile] {
        match self {
            Self::Datacenter => &DATACENTER_SERVICES,
            Self::Factory => &FACTORY_SERVICES,
        }
    }
}

/// The datastore roles a topology may contain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DatastoreRole {
    Relational,
    TimeSeries,
    Document,
}

/// Fixed metadata for one datastore role.
#[derive(Clone, Copy, Debug)]
pub struct DatastoreProfile {
    pub role: DatastoreRole,
    /// Image name, doubling as the component short id.
    pub image: &'static str,
    pub version: &'static str,
    /// Named ports exposed by both the container and the service. The first
    /// entry is the client port used when deriving the exported address.
    pub ports: &'static [(&'static str, i32)],
    /// Name of the persistent volume claim template and its pod volume.
    pub claim_name: &'static str,
    /// Where the claim is mounted inside the container.
    pub mount_path: &'static str,
    /// Literal (non-secret) container environment.
    pub literal_env: &'static [(&'static str, &'static str)],
    /// Env var that receives the derived service name, for images that need
    /// to know their own host.
    pub host_env: Option<&'static str>,
    /// `(env var, bundle key)` pairs resolved through the credential bundle
    /// at container start, never at synthesis time.
    pub secret_env: &'static [(&'static str, &'static str)],
    /// Bundle key holding the administrative user name.
    pub admin_user_key: &'static str,
    /// The administrative user name stored under [`Self::admin_user_key`].
    pub admin_user: &'static str,
    /// Bundle key holding the generated administrative password.
    pub admin_password_key: &'static str,
    /// Prefix for the context properties this datastore exports
    /// (`<prefix>_SERVICE_NAME`, `<prefix>_URL`, `<prefix>_DATABASE`).
    pub property_prefix: &'static str,
    /// Logical database/catalog name exported to consumers.
    pub database: &'static str,
}

impl DatastoreProfile {
    /// The port clients connect to, used in the exported address.
    pub fn client_port(&self) -> i32 {
        self.ports[0].1
    }
}

pub const RELATIONAL: DatastoreProfile = DatastoreProfile {
    role: DatastoreRole::Relational,
    image: "postgres",
    version: "14",
    ports: &[("tcp", 5432)],
    claim_name: "postgresdb",
    mount_path: "/var/lib/postgresql/data/pgdata",
    literal_env: &[
        ("PGDATA", "/var/lib/postgresql/data/pgdata"),
        ("POSTGRES_DB", "manufacturing"),
    ],
    host_env: None,
    secret_env: &[
        ("POSTGRES_USER", "PG_USER"),
        ("POSTGRES_PASSWORD", "PG_PASSWORD"),
    ],
    admin_user_key: "PG_USER",
    admin_user: "admin",
    admin_password_key: "PG_PASSWORD",
    property_prefix: "PG",
    database: "manufacturing",
};

pub const TIME_SERIES: DatastoreProfile = DatastoreProfile {
    role: DatastoreRole::TimeSeries,
    image: "influxdb",
    version: "1.6.4",
    // Query port first, ingest port second
    ports: &[("http", 8086), ("tcp", 4242)],
    claim_name: "influxdb",
    mount_path: "/var/lib/influxdb",
    literal_env: &[("INFLUXDB_DATABASE", "influxdb")],
    host_env: Some("INFLUXDB_HOST"),
    secret_env: &[
        ("INFLUXDB_USERNAME", "INFLUXDB_USERNAME"),
        ("INFLUXDB_PASSWORD", "INFLUXDB_PASSWORD"),
    ],
    admin_user_key: "INFLUXDB_USERNAME",
    admin_user: "root",
    admin_password_key: "INFLUXDB_PASSWORD",
    property_prefix: "INFLUXDB",
    database: "influxdb",
};

pub const DOCUMENT: DatastoreProfile = DatastoreProfile {
    role: DatastoreRole::Document,
    image: "mongo",
    version: "4.4.3",
    ports: &[("tcp", 27017)],
    claim_name: "mongodb",
    mount_path: "/data/db",
    literal_env: &[
        ("MONGODB_PORT_NUMBER", "27017"),
        ("MONGO_INITDB_DATABASE", "manufacturing"),
    ],
    host_env: None,
    secret_env: &[
        ("MONGO_INITDB_ROOT_USERNAME", "MONGODB_ROOT_USER"),
        ("MONGO_INITDB_ROOT_PASSWORD", "MONGODB_ROOT_PASSWORD"),
    ],
    admin_user_key: "MONGODB_ROOT_USER",
    admin_user: "root",
    admin_password_key: "MONGODB_ROOT_PASSWORD",
    property_prefix: "MONGODB",
    // Root credentials authenticate against the admin database, not the
    // application database created at init time.
    database: "admin",
};

const DATACENTER_DATASTORES: [DatastoreProfile; 3] = [RELATIONAL, TIME_SERIES, DOCUMENT];
const FACTORY_DATASTORES: [DatastoreProfile; 2] = [RELATIONAL, DOCUMENT];

/// How one container environment variable of an application service is
/// sourced.
#[derive(Clone, Copy, Debug)]
pub enum EnvMapping {
    /// A fixed name/value pair.
    Literal {
        name: &'static str,
        value: &'static str,
    },
    /// Value read from the property context. The key must have been produced
    /// by an earlier pipeline step; a missing key aborts the reconciliation.
    Property {
        name: &'static str,
        key: &'static str,
    },
    /// A secret key reference into the credential bundle, resolved by the
    /// container runtime at start time.
    Bundle {
        name: &'static str,
        key: &'static str,
    },
    /// The topology's declared event bus endpoint.
    EventBus { name: &'static str },
}

/// Fixed metadata for one application service role within a topology kind.
#[derive(Clone, Copy, Debug)]
pub struct ServiceProfile {
    pub role: ServiceRole,
    /// The single HTTP port this service listens on.
    pub http_port: i32,
    /// Context key under which the service's `host:port` address is
    /// published for later pipeline steps.
    pub url_property: &'static str,
    /// Role-specific environment, on top of the always-present `LOG_LEVEL`.
    pub env: &'static [EnvMapping],
}

const DATACENTER_SERVICES: [ServiceProfile; 4] = [
    ServiceProfile {
        role: ServiceRole::Registration,
        http_port: 8080,
        url_property: "REGISTRATION_SERVICE_URL",
        env: &[],
    },
    ServiceProfile {
        role: ServiceRole::PlantManager,
        http_port: 8080,
        url_property: "PLANT_MANAGER_SERVICE_URL",
        env: &[
            EnvMapping::Property {
                name: "DB_URL",
                key: "PG_URL",
            },
            EnvMapping::Property {
                name: "REGISTRATION_SERVICE_URL",
                key: "REGISTRATION_SERVICE_URL",
            },
            EnvMapping::EventBus {
                name: "KAFKA_BOOTSTRAP_URL",
            },
            EnvMapping::Bundle {
                name: "DB_USER",
                key: "PG_USER",
            },
            EnvMapping::Bundle {
                name: "DB_PASSWORD",
                key: "PG_PASSWORD",
            },
        ],
    },
    ServiceProfile {
        role: ServiceRole::ProductLine,
        http_port: 8080,
        url_property: "PRODUCT_LINE_SERVICE_URL",
        env: &[
            EnvMapping::EventBus {
                name: "KAFKA_BOOTSTRAP_URL",
            },
            EnvMapping::Literal {
                name: "GENERATE_RANDOM_PRODUCTLINE",
                value: "true",
            },
            EnvMapping::Property {
                name: "MONGODB_URL",
                key: "MONGODB_URL",
            },
            EnvMapping::Property {
                name: "MONGODB_DATABASE",
                key: "MONGODB_DATABASE",
            },
            EnvMapping::Bundle {
                name: "MONGODB_USER",
                key: "MONGODB_ROOT_USER",
            },
            EnvMapping::Bundle {
                name: "MONGODB_PASSWORD",
                key: "MONGODB_ROOT_PASSWORD",
            },
        ],
    },
    ServiceProfile {
        role: ServiceRole::EventCollector,
        http_port: 8080,
        url_property: "EVENT_COLLECTOR_SERVICE_URL",
        env: &[],
    },
];

const FACTORY_SERVICES: [ServiceProfile; 3] = [
    ServiceProfile {
        role: ServiceRole::FacilityManager,
        http_port: 5100,
        url_property: "FACILITY_MANAGER_SERVICE_URL",
        env: &[],
    },
    ServiceProfile {
        role: ServiceRole::ProductLine,
        http_port: 5101,
        url_property: "PRODUCT_LINE_SERVICE_URL",
        env: &[],
    },
    ServiceProfile {
        role: ServiceRole::ProductionValidator,
        http_port: 8080,
        url_property: "PRODUCTION_VALIDATOR_SERVICE_URL",
        env: &[],
    },
];

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rstest::rstest;

    use super::*;

    #[test]
    fn datacenter_pipeline_order_is_fixed() {
        let roles: Vec<_> = TopologyKind::Datacenter
            .services()
            .iter()
            .map(|profile| profile.role)
            .collect();
        assert_eq!(
            roles,
            [
                ServiceRole::Registration,
                ServiceRole::PlantManager,
                ServiceRole::ProductLine,
                ServiceRole::EventCollector,
            ]
        );

        let datastores: Vec<_> = TopologyKind::Datacenter
            .datastores()
            .iter()
            .map(|profile| profile.role)
            .collect();
        assert_eq!(
            datastores,
            [
                DatastoreRole::Relational,
                DatastoreRole::TimeSeries,
                DatastoreRole::Document,
            ]
        );
    }

    #[test]
    fn factory_has_no_time_series_store() {
        assert!(
            TopologyKind::Factory
                .datastores()
                .iter()
                .all(|profile| profile.role != DatastoreRole::TimeSeries)
        );
    }

    #[rstest]
    #[case(TopologyKind::Datacenter)]
    #[case(TopologyKind::Factory)]
    fn roles_and_published_properties_are_unique(#[case] kind: TopologyKind) {
        let roles: BTreeSet<_> = kind.services().iter().map(|p| p.role).collect();
        assert_eq!(roles.len(), kind.services().len());

        let properties: BTreeSet<_> = kind.services().iter().map(|p| p.url_property).collect();
        assert_eq!(properties.len(), kind.services().len());
    }

    #[test]
    fn time_series_store_exposes_two_distinct_ports() {
        let names: BTreeSet<_> = TIME_SERIES.ports.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), 2);
        assert_eq!(TIME_SERIES.client_port(), 8086);
    }

    #[test]
    fn datastore_port_ranges_do_not_overlap() {
        let mut all_ports = BTreeSet::new();
        for profile in [RELATIONAL, TIME_SERIES, DOCUMENT] {
            for (_, port) in profile.ports {
                assert!(all_ports.insert(*port), "port {port} assigned twice");
            }
        }
    }
}
