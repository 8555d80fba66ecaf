//! The pki_environment module provides [`PkiEnvironment`], the set of collaborators the path
//! validator calls upon to hash, verify certificate signatures and render OIDs for diagnostics.
//!
//! ```
//! use certpaths::*;
//!
//! let mut pe = PkiEnvironment::new();
//! populate_5280_pki_environment(&mut pe);
//! assert_eq!("basicConstraints", pe.oid_lookup(&const_oid::db::rfc5912::ID_CE_BASIC_CONSTRAINTS));
//! ```
//!
//! Each capability is a list of plain function pointers. Lists are consulted in the order in which
//! entries were added, so an application can put a hardware-backed verifier ahead of the
//! RustCrypto one and fall back when the former does not recognize an algorithm.

use alloc::string::{String, ToString};
use alloc::{vec, vec::Vec};

use der::asn1::ObjectIdentifier;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::{
    environment::pki_environment_traits::*, util::crypto::*, util::error::*,
    util::pdv_utilities::oid_lookup,
};

/// [`PkiEnvironment`] holds the hashing, signature verification and OID lookup callbacks used while
/// validating certification paths. It is shared by every path set created from it and is not
/// modified once populated.
#[derive(Clone)]
pub struct PkiEnvironment {
    hashers: Vec<CalculateHash>,
    verifiers: Vec<VerifySignatureMessage>,
    oid_lookups: Vec<OidLookup>,
}

impl Default for PkiEnvironment {
    /// Returns an environment with no crypto support and the built-in [`oid_lookup`] table.
    fn default() -> Self {
        PkiEnvironment {
            hashers: vec![],
            verifiers: vec![],
            oid_lookups: vec![oid_lookup],
        }
    }
}

impl PkiEnvironment {
    /// Returns an environment with no callbacks of any kind
    pub fn new() -> PkiEnvironment {
        PkiEnvironment {
            hashers: vec![],
            verifiers: vec![],
            oid_lookups: vec![],
        }
    }

    /// `clear_all_callbacks` empties every callback list.
    pub fn clear_all_callbacks(&mut self) {
        self.hashers.clear();
        self.verifiers.clear();
        self.oid_lookups.clear();
    }

    /// `add_calculate_hash_callback` appends a [`CalculateHash`] implementation.
    pub fn add_calculate_hash_callback(&mut self, c: CalculateHash) {
        self.hashers.push(c);
    }

    /// `add_verify_signature_message_callback` appends a [`VerifySignatureMessage`] implementation.
    pub fn add_verify_signature_message_callback(&mut self, c: VerifySignatureMessage) {
        self.verifiers.push(c);
    }

    /// `add_oid_lookup` appends an [`OidLookup`] implementation.
    pub fn add_oid_lookup(&mut self, c: OidLookup) {
        self.oid_lookups.push(c);
    }

    /// `calculate_hash` returns the digest from the first callback that supports `hash_alg`, or
    /// [`Error::Unrecognized`] if none does.
    pub fn calculate_hash(
        &self,
        pe: &PkiEnvironment,
        hash_alg: &AlgorithmIdentifierOwned,
        buffer_to_hash: &[u8],
    ) -> Result<Vec<u8>> {
        self.hashers
            .iter()
            .find_map(|f| f(pe, hash_alg, buffer_to_hash).ok())
            .ok_or(Error::Unrecognized)
    }

    /// `verify_signature_message` returns Ok as soon as one callback verifies `signature` over
    /// `message_to_verify`. If every callback fails, the error from the last one is returned.
    /// With no callbacks installed, [`Error::Unrecognized`] is returned.
    pub fn verify_signature_message(
        &self,
        pe: &PkiEnvironment,
        message_to_verify: &[u8],
        signature: &[u8],
        signature_alg: &AlgorithmIdentifierOwned,
        spki: &SubjectPublicKeyInfoOwned,
    ) -> Result<()> {
        let mut last = Error::Unrecognized;
        for f in &self.verifiers {
            match f(pe, message_to_verify, signature, signature_alg, spki) {
                Ok(()) => return Ok(()),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    /// `oid_lookup` returns the first friendly name produced by a lookup callback, or the dotted
    /// form of `oid`.
    pub fn oid_lookup(&self, oid: &ObjectIdentifier) -> String {
        self.oid_lookups
            .iter()
            .find_map(|f| f(oid).ok())
            .unwrap_or_else(|| oid.to_string())
    }
}

/// `populate_5280_pki_environment` installs the RustCrypto hashing and signature verification
/// callbacks and, where no OID lookup is present yet, the built-in [`oid_lookup`] table.
pub fn populate_5280_pki_environment(pe: &mut PkiEnvironment) {
    pe.add_calculate_hash_callback(calculate_hash_rust_crypto);
    pe.add_verify_signature_message_callback(verify_signature_message_rust_crypto);
    if pe.oid_lookups.is_empty() {
        pe.add_oid_lookup(oid_lookup);
    }
}

#[test]
fn pki_environment_test() {
    use const_oid::db::rfc5912::ID_CE_KEY_USAGE;

    let pe = PkiEnvironment::default();
    assert_eq!("keyUsage", pe.oid_lookup(&ID_CE_KEY_USAGE));
    let unknown = ObjectIdentifier::new_unwrap("1.2.3.4.5");
    assert_eq!("1.2.3.4.5", pe.oid_lookup(&unknown));

    let pe = PkiEnvironment::new();
    assert_eq!("2.5.29.15", pe.oid_lookup(&ID_CE_KEY_USAGE));

    let alg = AlgorithmIdentifierOwned {
        oid: crate::PKIXALG_SHA256,
        parameters: None,
    };
    assert_eq!(Err(Error::Unrecognized), pe.calculate_hash(&pe, &alg, b"abc"));

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);
    assert!(pe.calculate_hash(&pe, &alg, b"abc").is_ok());
    pe.clear_all_callbacks();
    assert_eq!(Err(Error::Unrecognized), pe.calculate_hash(&pe, &alg, b"abc"));
}
