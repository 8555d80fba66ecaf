//! Certificate stores consulted while building certification paths

pub mod cert_store;

pub use crate::source::cert_store::*;
