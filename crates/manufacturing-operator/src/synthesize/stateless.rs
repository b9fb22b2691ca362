//! Synthesis of stateless application service components.

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec, Service, ServiceSpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};

use super::{Error, container_port, env_var, env_var_from_secret, require, service_port};
use crate::{
    component::{EnvMapping, ServiceProfile},
    context::PropertyContext,
    crd::{ComponentSpec, TopologySpec},
    credentials::BINDING_SECRET_NAME_KEY,
    meta::TopologyIdentity,
};

/// Builds the single-replica deployment and the ClusterIP service for one
/// application service role, and publishes the service's `host:port` address
/// into the context for later pipeline steps.
///
/// Environment resolution follows the role's profile: context-sourced values
/// must already be present (a missing one aborts the whole reconciliation),
/// bundle-sourced values become secret key references resolved at container
/// start.
pub fn stateless_component(
    topology: &TopologyIdentity,
    spec: &TopologySpec,
    component: &ComponentSpec,
    profile: &ServiceProfile,
    context: &mut PropertyContext,
) -> Result<(Deployment, Service), Error> {
    let identity = topology.resource_identity(&component.image, component.version());

    let mut env = vec![env_var("LOG_LEVEL", component.log_level())];
    for mapping in profile.env {
        env.push(resolve_env(mapping, spec, context)?);
    }

    let container = Container {
        name: component.image.clone(),
        image: Some(component.image_ref(&spec.registry)),
        ports: Some(vec![container_port("http", profile.http_port)]),
        env: Some(env),
        ..Container::default()
    };

    let workload = Deployment {
        metadata: identity.object_meta(),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(identity.labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(identity.labels.clone()),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        status: None,
    };

    let service = Service {
        metadata: identity.object_meta(),
        spec: Some(ServiceSpec {
            ports: Some(vec![service_port("http", profile.http_port)]),
            selector: Some(identity.labels.clone()),
            type_: Some("ClusterIP".to_owned()),
            ..ServiceSpec::default()
        }),
        status: None,
    };

    context.insert(
        profile.url_property,
        format!("{}:{}", identity.name, profile.http_port),
    );

    Ok((workload, service))
}

fn resolve_env(
    mapping: &EnvMapping,
    spec: &TopologySpec,
    context: &PropertyContext,
) -> Result<EnvVar, Error> {
    Ok(match mapping {
        EnvMapping::Literal { name, value } => env_var(*name, *value),
        EnvMapping::Property { name, key } => env_var(*name, require(context, key)?),
        EnvMapping::Bundle { name, key } => {
            let bundle = require(context, BINDING_SECRET_NAME_KEY)?;
            env_var_from_secret(*name, bundle, *key)
        }
        EnvMapping::EventBus { name } => env_var(*name, spec.event_bus_endpoint.as_str()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{component::TopologyKind, crd::ServiceRole};

    fn topology() -> TopologyIdentity {
        TopologyIdentity {
            name: "prod".to_owned(),
            namespace: "plant-a".to_owned(),
            uid: "0badcafe".to_owned(),
            api_version: "manufacturing.io/v1alpha1".to_owned(),
            kind: "Datacenter".to_owned(),
            crd_name: "datacenters.manufacturing.io".to_owned(),
        }
    }

    fn profile(role: ServiceRole) -> &'static ServiceProfile {
        TopologyKind::Datacenter
            .services()
            .iter()
            .find(|profile| profile.role == role)
            .expect("role in datacenter pipeline")
    }

    fn env_of(workload: &Deployment) -> Vec<EnvVar> {
        workload
            .spec
            .clone()
            .and_then(|spec| spec.template.spec)
            .map(|pod| pod.containers[0].env.clone().unwrap_or_default())
            .unwrap_or_default()
    }

    #[test]
    fn registration_service_shape() {
        let spec = TopologySpec {
            registry: "quay.io/acme/".to_owned(),
            ..TopologySpec::default()
        };
        let component = ComponentSpec {
            image: "reg-svc".to_owned(),
            ..ComponentSpec::default()
        };
        let mut context = PropertyContext::new();

        let (workload, service) = stateless_component(
            &topology(),
            &spec,
            &component,
            profile(ServiceRole::Registration),
            &mut context,
        )
        .expect("synthesis");

        assert_eq!(
            workload.metadata.name.as_deref(),
            Some("prod-reg-svc")
        );
        let pod = workload
            .spec
            .clone()
            .and_then(|spec| spec.template.spec)
            .expect("pod spec");
        assert_eq!(
            pod.containers[0].image.as_deref(),
            Some("quay.io/acme/reg-svc:latest")
        );

        let env = env_of(&workload);
        assert_eq!(env[0].name, "LOG_LEVEL");
        assert_eq!(env[0].value.as_deref(), Some("INFO"));

        let ports = service.spec.and_then(|s| s.ports).unwrap_or_default();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 8080);

        assert_eq!(
            context.get("REGISTRATION_SERVICE_URL"),
            Some("prod-reg-svc:8080")
        );
    }

    #[test]
    fn plant_manager_consumes_upstream_properties() {
        let spec = TopologySpec {
            event_bus_endpoint: "kafka:9092".to_owned(),
            ..TopologySpec::default()
        };
        let component = ComponentSpec {
            image: "pm-svc".to_owned(),
            ..ComponentSpec::default()
        };
        let mut context = PropertyContext::new();
        context.insert(BINDING_SECRET_NAME_KEY, "prod-bindings");
        context.insert("PG_URL", "prod-postgres:5432");
        context.insert("REGISTRATION_SERVICE_URL", "prod-reg-svc:8080");

        let (workload, _) = stateless_component(
            &topology(),
            &spec,
            &component,
            profile(ServiceRole::PlantManager),
            &mut context,
        )
        .expect("synthesis");

        let env = env_of(&workload);
        let value_of = |name: &str| {
            env.iter()
                .find(|var| var.name == name)
                .and_then(|var| var.value.as_deref())
        };
        assert_eq!(value_of("DB_URL"), Some("prod-postgres:5432"));
        assert_eq!(value_of("KAFKA_BOOTSTRAP_URL"), Some("kafka:9092"));

        let db_user = env
            .iter()
            .find(|var| var.name == "DB_USER")
            .and_then(|var| var.value_from.clone())
            .and_then(|source| source.secret_key_ref)
            .expect("secret key ref");
        assert_eq!(db_user.name, "prod-bindings");
        assert_eq!(db_user.key, "PG_USER");

        assert_eq!(
            context.get("PLANT_MANAGER_SERVICE_URL"),
            Some("prod-pm-svc:8080")
        );
    }

    #[test]
    fn missing_upstream_property_aborts_synthesis() {
        let spec = TopologySpec::default();
        let component = ComponentSpec {
            image: "pm-svc".to_owned(),
            ..ComponentSpec::default()
        };
        let mut context = PropertyContext::new();
        context.insert(BINDING_SECRET_NAME_KEY, "prod-bindings");

        let result = stateless_component(
            &topology(),
            &spec,
            &component,
            profile(ServiceRole::PlantManager),
            &mut context,
        );
        assert!(matches!(result, Err(Error::MissingProperty { .. })));
    }
}
