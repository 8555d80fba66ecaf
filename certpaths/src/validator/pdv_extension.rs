//! Decoded forms of the extensions consulted while validating a certification path

use alloc::collections::BTreeMap;

use const_oid::db::rfc5912::{
    ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES, ID_CE_INHIBIT_ANY_POLICY, ID_CE_KEY_USAGE,
    ID_CE_NAME_CONSTRAINTS, ID_CE_POLICY_CONSTRAINTS, ID_CE_POLICY_MAPPINGS,
    ID_CE_SUBJECT_ALT_NAME,
};
use der::asn1::ObjectIdentifier;
use x509_cert::ext::pkix::*;

use crate::util::error::*;

/// `EXTS_OF_INTEREST` lists the extensions decoded when a [`PDVCertificate`](crate::PDVCertificate)
/// is created. Any other extension is only ever examined for its critical flag.
pub static EXTS_OF_INTEREST: &[ObjectIdentifier] = &[
    ID_CE_BASIC_CONSTRAINTS,
    ID_CE_KEY_USAGE,
    ID_CE_SUBJECT_ALT_NAME,
    ID_CE_NAME_CONSTRAINTS,
    ID_CE_CERTIFICATE_POLICIES,
    ID_CE_POLICY_MAPPINGS,
    ID_CE_POLICY_CONSTRAINTS,
    ID_CE_INHIBIT_ANY_POLICY,
];

/// The [`ExtensionProcessing`] trait is implemented by types that cache decoded extensions.
///
/// Call `parse_extensions` once up front. The validator then reads the cached values with
/// `get_extension` as it walks the path.
pub trait ExtensionProcessing {
    /// `get_extension` returns the cached decoding of the extension identified by `oid`, or None if
    /// the extension is absent or was not decoded.
    fn get_extension(&self, oid: &ObjectIdentifier) -> Result<Option<&'_ PDVExtension>>;

    /// `parse_extension` decodes and caches the extension identified by `oid` if present.
    fn parse_extension(&'_ mut self, oid: &ObjectIdentifier) -> Result<Option<&'_ PDVExtension>>;

    /// `parse_extensions` decodes each extension in `oids`. Extensions that fail to decode are
    /// logged and left out of the cache.
    fn parse_extensions(&'_ mut self, oids: &[ObjectIdentifier]);
}

/// [`ParsedExtensions`] maps extension OIDs to decoded extensions.
pub type ParsedExtensions = BTreeMap<ObjectIdentifier, PDVExtension>;

/// [`PDVExtension`] wraps each supported extension type.
#[derive(PartialEq, Clone, Eq, Debug)]
pub enum PDVExtension {
    /// basicConstraints
    BasicConstraints(BasicConstraints),
    /// keyUsage
    KeyUsage(KeyUsage),
    /// subjectAltName
    SubjectAltName(SubjectAltName),
    /// nameConstraints
    NameConstraints(NameConstraints),
    /// certificatePolicies
    CertificatePolicies(CertificatePolicies),
    /// policyMappings
    PolicyMappings(PolicyMappings),
    /// policyConstraints
    PolicyConstraints(PolicyConstraints),
    /// inhibitAnyPolicy
    InhibitAnyPolicy(InhibitAnyPolicy),
}
