//! Certification path discovery

pub mod path_builder;
pub mod path_tree;

pub use crate::builder::{path_builder::*, path_tree::*};
