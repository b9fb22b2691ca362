//! Desired-state synthesis for topology components.
//!
//! Synthesis is pure: given the topology identity, a component's profile and
//! the property context accumulated so far, it produces complete workload and
//! service definitions and extends the context — it never talks to the
//! cluster. Applying the results is the driver's job.

use k8s_openapi::{
    api::core::v1::{ContainerPort, EnvVar, EnvVarSource, SecretKeySelector, ServicePort},
    apimachinery::pkg::util::intstr::IntOrString,
};
use snafu::Snafu;

use crate::context::PropertyContext;

pub mod stateful;
pub mod stateless;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("property {key:?} was not produced by an earlier synthesis step"))]
    MissingProperty { key: String },
}

/// Looks up a context property that an earlier pipeline step must have
/// produced. Upstream values are only ever read, never generated or guessed
/// here.
fn require<'a>(context: &'a PropertyContext, key: &str) -> Result<&'a str, Error> {
    context.get(key).ok_or_else(|| Error::MissingProperty {
        key: key.to_owned(),
    })
}

fn env_var(name: impl Into<String>, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..EnvVar::default()
    }
}

/// An env var resolved from a key of the credential bundle by the container
/// runtime at start time, not at synthesis time.
fn env_var_from_secret(
    env_var_name: impl Into<String>,
    secret_name: impl Into<String>,
    secret_key: impl Into<String>,
) -> EnvVar {
    EnvVar {
        name: env_var_name.into(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret_name.into(),
                key: secret_key.into(),
                ..SecretKeySelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_owned()),
        container_port: port,
        protocol: Some("TCP".to_owned()),
        ..ContainerPort::default()
    }
}

fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_owned()),
        port,
        target_port: Some(IntOrString::Int(port)),
        ..ServicePort::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_the_missing_key() {
        let context = PropertyContext::new();
        let err = require(&context, "PG_URL").unwrap_err();
        assert!(matches!(err, Error::MissingProperty { key } if key == "PG_URL"));
    }

    #[test]
    fn secret_env_var_references_bundle_and_key() {
        let env = env_var_from_secret("POSTGRES_USER", "prod-bindings", "PG_USER");
        let secret_ref = env
            .value_from
            .and_then(|source| source.secret_key_ref)
            .expect("secret key ref");
        assert_eq!(secret_ref.name, "prod-bindings");
        assert_eq!(secret_ref.key, "PG_USER");
        assert_eq!(env.value, None);
    }
}
