#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod error;
pub mod naming;
pub mod remediation;
pub mod resolve;

pub use self::error::{Error, Result};

/// The field manager used when applying objects.
pub const CONTROLLER_NAME: &str = "kafka-access-controller";
