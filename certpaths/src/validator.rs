//! RFC5280-compliant certification path validation

pub mod name_constraints_set;
pub mod path_settings;
pub mod path_validator;
pub mod pdv_certificate;
pub mod pdv_extension;
pub mod policy_tree;

pub use crate::{
    validator::name_constraints_set::*, validator::path_settings::*,
    validator::path_validator::*, validator::pdv_certificate::*, validator::pdv_extension::*,
    validator::policy_tree::*,
};
