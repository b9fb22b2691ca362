//! The seam towards the cluster object store.
//!
//! The reconciliation driver only ever talks to an [`ObjectStore`]: listing
//! and creating secrets for the credential bundle, and create-or-replace for
//! everything else. Workload and service writes are full overwrites, so
//! applying the same desired object twice is idempotent; the bundle create is
//! deliberately *not* — the API server's reject-on-conflict semantics are
//! what makes concurrent first reconciliations safe.

use async_trait::async_trait;
use k8s_openapi::{
    NamespaceResourceScope,
    api::{
        apps::v1::{Deployment, StatefulSet},
        core::v1::{Secret, Service},
    },
};
use kube::{
    Api, Client, Resource,
    api::{ListParams, PostParams},
};
use serde::{Serialize, de::DeserializeOwned};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to list secrets in namespace {namespace:?}"))]
    ListSecrets {
        source: kube::Error,
        namespace: String,
    },

    #[snafu(display("secret {name:?} already exists"))]
    SecretAlreadyExists { name: String },

    #[snafu(display("failed to create secret {name:?}"))]
    CreateSecret { source: kube::Error, name: String },

    #[snafu(display("failed to apply {kind} {name:?}"))]
    ApplyObject {
        source: kube::Error,
        kind: &'static str,
        name: String,
    },

    #[snafu(display("desired {kind} object carries no name or namespace"))]
    UnidentifiedObject { kind: &'static str },
}

/// The narrow interface this engine needs from the cluster object store.
///
/// All `apply_*` operations are create-or-replace (full overwrite of any
/// existing object of the same name); `create_secret` is create-once and must
/// fail with [`Error::SecretAlreadyExists`] when racing another creator.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, Error>;

    async fn create_secret(&self, secret: &Secret) -> Result<(), Error>;

    async fn apply_stateful_set(&self, stateful_set: &StatefulSet) -> Result<(), Error>;

    async fn apply_deployment(&self, deployment: &Deployment) -> Result<(), Error>;

    async fn apply_service(&self, service: &Service) -> Result<(), Error>;
}

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates the object, or fully replaces the existing one of the same
    /// name. Replacement carries over the live `resourceVersion`, as required
    /// for a `PUT`; racing writers follow last-writer-wins.
    async fn create_or_replace<K>(&self, desired: &K, kind: &'static str) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + std::fmt::Debug
            + DeserializeOwned
            + Serialize,
    {
        let name = desired
            .meta()
            .name
            .clone()
            .context(UnidentifiedObjectSnafu { kind })?;
        let namespace = desired
            .meta()
            .namespace
            .as_deref()
            .context(UnidentifiedObjectSnafu { kind })?;

        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api
            .get_opt(&name)
            .await
            .context(ApplyObjectSnafu { kind, name: name.clone() })?
        {
            Some(existing) => {
                let mut desired = desired.clone();
                desired
                    .meta_mut()
                    .resource_version
                    .clone_from(&existing.meta().resource_version);
                debug!(kind, name = %name, "replacing existing object");
                api.replace(&name, &PostParams::default(), &desired)
                    .await
                    .context(ApplyObjectSnafu { kind, name: name.clone() })?;
            }
            None => {
                debug!(kind, name = %name, "creating object");
                api.create(&PostParams::default(), desired)
                    .await
                    .context(ApplyObjectSnafu { kind, name: name.clone() })?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .list(&ListParams::default())
            .await
            .context(ListSecretsSnafu { namespace })?
            .items)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), Error> {
        let name = secret.meta().name.clone().unwrap_or_default();
        let namespace = secret.meta().namespace.as_deref().unwrap_or_default();

        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.create(&PostParams::default(), secret).await {
            Ok(_) => Ok(()),
            Err(err) if is_conflict(&err) => SecretAlreadyExistsSnafu { name }.fail(),
            Err(source) => Err(Error::CreateSecret { source, name }),
        }
    }

    async fn apply_stateful_set(&self, stateful_set: &StatefulSet) -> Result<(), Error> {
        self.create_or_replace(stateful_set, "StatefulSet").await
    }

    async fn apply_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        self.create_or_replace(deployment, "Deployment").await
    }

    async fn apply_service(&self, service: &Service) -> Result<(), Error> {
        self.create_or_replace(service, "Service").await
    }
}

fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 409)
}
