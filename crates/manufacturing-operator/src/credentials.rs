//! Bootstrapping of the shared credential bundle.
//!
//! The bundle is a single Secret per topology and namespace that holds the
//! administrative users and passwords for every datastore of the topology.
//! It is generated at most once: as soon as a secret of the derived name
//! exists, its stored values are reused verbatim, even if fresh generation
//! would produce different content.

use k8s_openapi::api::core::v1::Secret;
use rand::{CryptoRng, Rng, distr::Alphanumeric};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::{
    component::DatastoreProfile,
    context::PropertyContext,
    meta::TopologyIdentity,
    store::{self, ObjectStore},
};

/// Component short id of the bundle, making its object name
/// `<topology>-bindings`.
pub const BUNDLE_SHORT_ID: &str = "bindings";
const BUNDLE_VERSION: &str = "v1";

/// Context key under which the bundle's own object name is recorded, so that
/// synthesis steps can emit secret key references against it.
pub const BINDING_SECRET_NAME_KEY: &str = "BINDING_SECRET_NAME";

const CREDENTIAL_LENGTH: usize = 16;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to list existing secrets"))]
    ListSecrets { source: store::Error },

    #[snafu(display("stored credential value for {key:?} is not valid UTF-8"))]
    DecodeCredentialValue {
        source: std::string::FromUtf8Error,
        key: String,
    },

    #[snafu(display("failed to persist credential bundle {name:?}"))]
    PersistBundle { source: store::Error, name: String },
}

/// Ensures the credential bundle for this topology exists and returns a
/// [`PropertyContext`] seeded with its plaintext key/value pairs plus the
/// bundle name marker.
///
/// If a secret of the derived name already exists in the namespace, its
/// values are decoded and returned without generating anything. Otherwise a
/// fresh password is drawn from `rng` for each datastore's administrative
/// account and the bundle is persisted via the store's create-once call;
/// concurrent first reconciliations racing on the same name are resolved by
/// the store rejecting the duplicate create.
pub async fn bootstrap_credentials<S, R>(
    store: &S,
    rng: &mut R,
    topology: &TopologyIdentity,
    datastores: &[DatastoreProfile],
) -> Result<PropertyContext, Error>
where
    S: ObjectStore,
    R: Rng + CryptoRng,
{
    let identity = topology.resource_identity(BUNDLE_SHORT_ID, BUNDLE_VERSION);
    let mut context = PropertyContext::new();

    let existing = store
        .list_secrets(&identity.namespace)
        .await
        .context(ListSecretsSnafu)?;

    if let Some(secret) = existing
        .into_iter()
        .find(|secret| secret.metadata.name.as_deref() == Some(identity.name.as_str()))
    {
        debug!(bundle = %identity.name, "reusing existing credential bundle");
        for (key, value) in secret.data.unwrap_or_default() {
            let value = String::from_utf8(value.0)
                .context(DecodeCredentialValueSnafu { key: key.clone() })?;
            context.insert(key, value);
        }
        context.insert(BINDING_SECRET_NAME_KEY, identity.name.clone());

        // Existence of the name is the only reuse criterion; an incomplete
        // bundle from a partial prior failure is reused as-is. Flag it so
        // the resulting workload failures can be traced back here.
        for datastore in datastores {
            if !context.contains_key(datastore.admin_password_key) {
                warn!(
                    bundle = %identity.name,
                    key = datastore.admin_password_key,
                    "reused credential bundle is missing a key"
                );
            }
        }

        return Ok(context);
    }

    for datastore in datastores {
        context.insert(datastore.admin_user_key, datastore.admin_user);
        context.insert(datastore.admin_password_key, generate_credential(rng));
    }
    context.insert(BINDING_SECRET_NAME_KEY, identity.name.clone());

    let secret = Secret {
        metadata: identity.object_meta(),
        string_data: Some(
            context
                .iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .collect(),
        ),
        ..Secret::default()
    };

    info!(bundle = %identity.name, "creating credential bundle");
    store
        .create_secret(&secret)
        .await
        .context(PersistBundleSnafu {
            name: identity.name.clone(),
        })?;

    Ok(context)
}

/// Draws one uniformly random alphanumeric credential of fixed length.
fn generate_credential<R>(rng: &mut R) -> String
where
    R: Rng + CryptoRng,
{
    (0..CREDENTIAL_LENGTH)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn credentials_are_16_alphanumeric_chars() {
        let mut rng = StdRng::from_os_rng();
        for _ in 0..64 {
            let credential = generate_credential(&mut rng);
            assert_eq!(credential.len(), 16);
            assert!(credential.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn credentials_do_not_repeat() {
        let mut rng = StdRng::from_os_rng();
        let first = generate_credential(&mut rng);
        let second = generate_credential(&mut rng);
        assert_ne!(first, second);
    }
}
