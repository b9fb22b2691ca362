//! Operator core for manufacturing deployment topologies.
//!
//! A topology (a [`crd::Datacenter`] or a [`crd::Factory`]) declares a set of
//! datastores and application services that belong to one logical unit. The
//! [`controller`] module converges the cluster towards that declaration by
//! synthesizing workload and service objects in a fixed pipeline order,
//! threading a [`context::PropertyContext`] of addresses and credentials from
//! earlier synthesis steps into later ones.

pub mod component;
pub mod context;
pub mod controller;
pub mod crd;
pub mod credentials;
pub mod labels;
pub mod logging;
pub mod meta;
pub mod name_utils;
pub mod store;
pub mod synthesize;

// External re-exports
pub use k8s_openapi;
pub use kube;
