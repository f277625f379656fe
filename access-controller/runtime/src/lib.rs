#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod controller;

pub use self::args::Args;
pub use kafka_access_controller_core as core;
pub use kafka_access_controller_k8s_api as k8s;
pub use kafka_access_controller_k8s_backend as backend;
pub use kafka_access_controller_k8s_reconcile as reconcile;
