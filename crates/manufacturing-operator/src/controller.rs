//! The reconciliation driver.
//!
//! One generic engine reconciles both topology kinds: validate the
//! declaration, bootstrap the credential bundle, then walk the kind's fixed
//! pipeline and apply each synthesized workload/service pair in order. The
//! property context threads through the whole run, so every step sees exactly
//! the properties its predecessors published.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use kube::{
    Api, Client, Resource,
    runtime::{Controller, controller::Action, watcher},
};
use rand::{CryptoRng, Rng, SeedableRng, rngs::StdRng};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{error, info};

use crate::{
    component::TopologyKind,
    crd::{Datacenter, Factory, ServiceRole, TopologySpec},
    credentials, meta,
    meta::TopologyIdentity,
    store::{self, KubeStore, ObjectStore},
    synthesize::{self, stateful::stateful_component, stateless::stateless_component},
};

const RETRY_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to extract the topology identity"))]
    ExtractIdentity { source: meta::Error },

    #[snafu(display("topology declares no {role} component"))]
    MissingComponent { role: ServiceRole },

    #[snafu(display("declared {role} component has an empty image"))]
    MissingImage { role: ServiceRole },

    #[snafu(display("failed to bootstrap the credential bundle"))]
    BootstrapCredentials { source: credentials::Error },

    #[snafu(display("failed to synthesize component {name:?}"))]
    SynthesizeComponent {
        source: synthesize::Error,
        name: String,
    },

    #[snafu(display("failed to apply component {name:?}"))]
    ApplyComponent { source: store::Error, name: String },
}

/// Checks that the declaration names every service role the topology kind
/// requires, each with a usable image. Runs before any cluster write, so a
/// malformed declaration changes nothing.
fn validate(kind: TopologyKind, spec: &TopologySpec) -> Result<(), Error> {
    for profile in kind.services() {
        let component = spec
            .components
            .get(&profile.role)
            .context(MissingComponentSnafu { role: profile.role })?;
        ensure!(
            !component.image.is_empty(),
            MissingImageSnafu { role: profile.role }
        );
    }
    Ok(())
}

/// Reconciles one topology declaration into its desired child objects.
pub async fn reconcile_topology<S, R>(
    store: &S,
    rng: &mut R,
    kind: TopologyKind,
    identity: &TopologyIdentity,
    spec: &TopologySpec,
) -> Result<(), Error>
where
    S: ObjectStore,
    R: Rng + CryptoRng,
{
    validate(kind, spec)?;

    let mut context = credentials::bootstrap_credentials(store, rng, identity, kind.datastores())
        .await
        .context(BootstrapCredentialsSnafu)?;

    for datastore in kind.datastores() {
        let (stateful_set, service) = stateful_component(identity, datastore, &mut context)
            .context(SynthesizeComponentSnafu {
                name: datastore.image,
            })?;
        let name = stateful_set.metadata.name.clone().unwrap_or_default();
        store
            .apply_stateful_set(&stateful_set)
            .await
            .context(ApplyComponentSnafu { name: name.clone() })?;
        store
            .apply_service(&service)
            .await
            .context(ApplyComponentSnafu { name })?;
    }

    for profile in kind.services() {
        // Presence was checked up front.
        let Some(component) = spec.components.get(&profile.role) else {
            continue;
        };
        let (deployment, service) =
            stateless_component(identity, spec, component, profile, &mut context).context(
                SynthesizeComponentSnafu {
                    name: component.image.clone(),
                },
            )?;
        let name = deployment.metadata.name.clone().unwrap_or_default();
        store
            .apply_deployment(&deployment)
            .await
            .context(ApplyComponentSnafu { name: name.clone() })?;
        store
            .apply_service(&service)
            .await
            .context(ApplyComponentSnafu { name })?;
    }

    info!(
        topology = %identity.name,
        namespace = %identity.namespace,
        %kind,
        "reconciled topology"
    );

    Ok(())
}

struct Ctx {
    store: KubeStore,
}

async fn reconcile_datacenter(
    datacenter: Arc<Datacenter>,
    ctx: Arc<Ctx>,
) -> Result<Action, Error> {
    let identity =
        TopologyIdentity::from_resource(datacenter.as_ref()).context(ExtractIdentitySnafu)?;
    let mut rng = StdRng::from_os_rng();
    reconcile_topology(
        &ctx.store,
        &mut rng,
        TopologyKind::Datacenter,
        &identity,
        &datacenter.spec.topology,
    )
    .await?;
    Ok(Action::await_change())
}

async fn reconcile_factory(factory: Arc<Factory>, ctx: Arc<Ctx>) -> Result<Action, Error> {
    let identity =
        TopologyIdentity::from_resource(factory.as_ref()).context(ExtractIdentitySnafu)?;
    let mut rng = StdRng::from_os_rng();
    reconcile_topology(
        &ctx.store,
        &mut rng,
        TopologyKind::Factory,
        &identity,
        &factory.spec.topology,
    )
    .await?;
    Ok(Action::await_change())
}

fn error_policy<K: Resource>(_object: Arc<K>, error: &Error, _ctx: Arc<Ctx>) -> Action {
    error!(%error, "reconciliation failed, requeueing");
    Action::requeue(RETRY_INTERVAL)
}

/// Runs the Datacenter and Factory controllers until shutdown.
pub async fn run_controllers(client: Client) {
    let ctx = Arc::new(Ctx {
        store: KubeStore::new(client.clone()),
    });

    let datacenters = Controller::new(
        Api::<Datacenter>::all(client.clone()),
        watcher::Config::default(),
    )
    .shutdown_on_signal()
    .run(reconcile_datacenter, error_policy, ctx.clone())
    .for_each(|result| async move {
        if let Ok((object, _)) = result {
            info!(name = %object.name, "datacenter reconciliation finished");
        }
    });

    let factories = Controller::new(Api::<Factory>::all(client), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile_factory, error_policy, ctx)
        .for_each(|result| async move {
            if let Ok((object, _)) = result {
                info!(name = %object.name, "factory reconciliation finished");
            }
        });

    futures::join!(datacenters, factories);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;

    use super::*;
    use crate::crd::ComponentSpec;

    fn component(image: &str) -> ComponentSpec {
        ComponentSpec {
            image: image.to_owned(),
            ..ComponentSpec::default()
        }
    }

    fn datacenter_spec() -> TopologySpec {
        TopologySpec {
            components: BTreeMap::from([
                (ServiceRole::Registration, component("reg-svc")),
                (ServiceRole::PlantManager, component("pm-svc")),
                (ServiceRole::ProductLine, component("pl-svc")),
                (ServiceRole::EventCollector, component("ec-svc")),
            ]),
            ..TopologySpec::default()
        }
    }

    #[test]
    fn complete_declaration_validates() {
        assert!(validate(TopologyKind::Datacenter, &datacenter_spec()).is_ok());
    }

    #[rstest]
    #[case(ServiceRole::Registration)]
    #[case(ServiceRole::EventCollector)]
    fn missing_role_is_rejected(#[case] role: ServiceRole) {
        let mut spec = datacenter_spec();
        spec.components.remove(&role);
        assert!(matches!(
            validate(TopologyKind::Datacenter, &spec),
            Err(Error::MissingComponent { role: rejected }) if rejected == role
        ));
    }

    #[test]
    fn empty_image_is_rejected() {
        let mut spec = datacenter_spec();
        spec.components
            .insert(ServiceRole::ProductLine, component(""));
        assert!(matches!(
            validate(TopologyKind::Datacenter, &spec),
            Err(Error::MissingImage {
                role: ServiceRole::ProductLine
            })
        ));
    }

    #[test]
    fn factory_roles_differ_from_datacenter_roles() {
        assert!(matches!(
            validate(TopologyKind::Factory, &datacenter_spec()),
            Err(Error::MissingComponent {
                role: ServiceRole::FacilityManager
            })
        ));
    }
}
