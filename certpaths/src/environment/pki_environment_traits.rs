//! The pki_environment_traits module features type definitions used by [`PkiEnvironment`] to provide
//! functionality that supports building and validating X.509 certification paths, along with the
//! [`CertificateStore`] trait implemented by sources of certificates and trust anchors.

use alloc::{string::String, sync::Arc, vec::Vec};

use der::asn1::ObjectIdentifier;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::util::error::*;
use crate::{CertCtx, PkiEnvironment};

/// `CalculateHash` provides a function signature for implementations that perform hashing
pub type CalculateHash = fn(
    &PkiEnvironment,
    &AlgorithmIdentifierOwned, // hash alg
    &[u8],                     // buffer to hash
) -> Result<Vec<u8>>;

/// `VerifySignatureMessage` provides a function signature for implementations that perform
/// signature verification over a message.
pub type VerifySignatureMessage = fn(
    &PkiEnvironment,
    &[u8],                      // message to hash and verify
    &[u8],                      // signature
    &AlgorithmIdentifierOwned,  // signature algorithm
    &SubjectPublicKeyInfoOwned, // public key
) -> Result<()>;

/// `OidLookup` implementations take an OID and returns either a friendly name for the OID or a
/// NotFound error. Where NotFound is returned by all OidLookup implementations, the
/// [`PkiEnvironment`] returns a dot notation version of the OID.
pub type OidLookup = fn(&ObjectIdentifier) -> Result<String>;

/// The [`CertificateStore`] trait enables trait objects to provide access to certificates and trust
/// anchors backed via some means, i.e., in-memory, file-based, system store accessed via FFI, etc.
///
/// Contexts are handed out as [`Arc`] values so the path builder can hold on to them for the
/// lifetime of the path tree.
pub trait CertificateStore {
    /// find_by_subject_or_alt_subject_name returns the contexts whose certificate subject name, or
    /// a directoryName in the certificate's subjectAltName, matches `name`. For contexts that carry
    /// only trust anchor information, the trust anchor name is compared.
    fn find_by_subject_or_alt_subject_name(&self, name: &Name) -> Result<Vec<Arc<CertCtx>>>;

    /// find_by_issuer_and_serial returns the context whose certificate features the given issuer
    /// name and serial number, if any.
    fn find_by_issuer_and_serial(
        &self,
        issuer: &Name,
        serial: &SerialNumber,
    ) -> Result<Option<Arc<CertCtx>>>;
}
