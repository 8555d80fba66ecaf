//! Callback switchboard supplying hashing, signature verification and OID lookup

pub mod pki_environment;
pub mod pki_environment_traits;

pub use crate::{environment::pki_environment::*, environment::pki_environment_traits::*};
