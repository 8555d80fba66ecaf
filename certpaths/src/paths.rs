//! Reference-counted path set combining configuration, the discovery tree and validation results

pub mod cert_paths;
pub mod path_dump;

pub use crate::paths::{cert_paths::*, path_dump::*};
