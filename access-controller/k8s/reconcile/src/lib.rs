#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Applies the compiled objects of every backend and prunes the live objects
//! that are no longer wanted.

mod kube_store;
mod metrics;
mod reconciler;
mod store;

pub use self::{
    kube_store::KubeStore,
    metrics::ReconcileMetrics,
    reconciler::{Outcome, Reconciler},
    store::{LiveObject, ObjectStore},
};
