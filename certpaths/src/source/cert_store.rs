//! The cert_store module provides an in-memory implementation of the [`CertificateStore`] trait
//! along with the [`CertCtx`] structure used to share store entries with the path builder.
//!
//! ```
//! use std::sync::Arc;
//! use certpaths::*;
//!
//! let mut trusted = CertStore::new();
//! // populate via add_encoded_cert, add_cert or add_trust_anchor_info
//! assert!(trusted.is_empty());
//!
//! let store: Arc<dyn CertificateStore + Send + Sync> = Arc::new(trusted);
//! ```

use alloc::{sync::Arc, vec::Vec};

use const_oid::db::rfc5912::ID_CE_SUBJECT_ALT_NAME;
use der::Decode;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::anchor::TrustAnchorInfo;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::{
    environment::pki_environment_traits::CertificateStore, log_message, pdv_certificate::*,
    pdv_extension::*, util::error::*, util::pdv_utilities::*, PeLogLevels,
};

/// [`CertCtx`] is an entry in a certificate store. It carries a certificate, trust anchor
/// information (RFC 5914) or both. Entries that carry only trust anchor information are only
/// useful when presented by a trusted store.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CertCtx {
    /// Certificate, if any
    pub cert: Option<PDVCertificate>,
    /// Trust anchor information, if any
    pub ta_info: Option<TrustAnchorInfo>,
}

impl CertCtx {
    /// `from_cert` returns a [`CertCtx`] that wraps the given certificate.
    pub fn from_cert(cert: PDVCertificate) -> Self {
        CertCtx {
            cert: Some(cert),
            ta_info: None,
        }
    }

    /// `subject` returns the certificate subject name or, absent a certificate, the trust anchor
    /// name from the trust anchor information.
    pub fn subject(&self) -> Option<&Name> {
        if let Some(cert) = &self.cert {
            return Some(&cert.decoded_cert.tbs_certificate.subject);
        }
        self.ta_info
            .as_ref()
            .and_then(|ta| ta.cert_path.as_ref())
            .map(|cp| &cp.ta_name)
    }

    /// `public_key` returns the certificate public key or, absent a certificate, the public key
    /// from the trust anchor information.
    pub fn public_key(&self) -> Option<&SubjectPublicKeyInfoOwned> {
        if let Some(cert) = &self.cert {
            return Some(&cert.decoded_cert.tbs_certificate.subject_public_key_info);
        }
        self.ta_info.as_ref().map(|ta| &ta.pub_key)
    }

    /// `matches_subject_or_alt_subject_name` returns true if `name` matches the subject name or a
    /// directoryName from the subjectAltName extension.
    pub fn matches_subject_or_alt_subject_name(&self, name: &Name) -> bool {
        match &self.cert {
            Some(cert) => cert_matches_subject_or_alt_subject_name(cert, name),
            None => match self.subject() {
                Some(subject) => compare_names(subject, name),
                None => false,
            },
        }
    }
}

/// `cert_matches_subject_or_alt_subject_name` returns true if `name` matches the subject name of
/// `cert` or a directoryName from its subjectAltName extension.
pub fn cert_matches_subject_or_alt_subject_name(cert: &PDVCertificate, name: &Name) -> bool {
    if compare_names(&cert.decoded_cert.tbs_certificate.subject, name) {
        return true;
    }
    if let Ok(Some(PDVExtension::SubjectAltName(san))) = cert.get_extension(&ID_CE_SUBJECT_ALT_NAME)
    {
        for gn in san.0.iter() {
            if let GeneralName::DirectoryName(dn) = gn {
                if compare_names(dn, name) {
                    return true;
                }
            }
        }
    }
    false
}

/// [`CertStore`] is a manually populated, in-memory [`CertificateStore`]. Entries are kept in the
/// order in which they were added and searches return matches in that order.
#[derive(Clone, Debug, Default)]
pub struct CertStore {
    entries: Vec<Arc<CertCtx>>,
}

impl CertStore {
    /// Creates an empty [`CertStore`]
    pub fn new() -> CertStore {
        CertStore { entries: Vec::new() }
    }

    /// `add_cert` adds a parsed certificate to the store.
    pub fn add_cert(&mut self, cert: PDVCertificate) {
        self.entries.push(Arc::new(CertCtx::from_cert(cert)));
    }

    /// `add_encoded_cert` parses a DER-encoded certificate and adds it to the store.
    pub fn add_encoded_cert(&mut self, enc_cert: &[u8]) -> Result<()> {
        match PDVCertificate::try_from(enc_cert) {
            Ok(cert) => {
                self.add_cert(cert);
                Ok(())
            }
            Err(e) => {
                log_message(
                    &PeLogLevels::PeError,
                    alloc::format!("Failed to parse certificate for store: {}", e).as_str(),
                );
                Err(Error::Asn1Error(e))
            }
        }
    }

    /// `add_trust_anchor_info` adds trust anchor information to the store. Where the
    /// CertPathControls feature a certificate, the certificate is carried alongside the trust anchor
    /// information.
    pub fn add_trust_anchor_info(&mut self, ta_info: TrustAnchorInfo) -> Result<()> {
        if ta_info.cert_path.is_none() {
            // no name, no way to find it while building
            log_message(
                &PeLogLevels::PeError,
                "Trust anchor information without CertPathControls cannot be added to a store",
            );
            return Err(Error::InvalidParameter);
        }
        let cert = match ta_info
            .cert_path
            .as_ref()
            .and_then(|cp| cp.certificate.clone())
        {
            Some(c) => Some(PDVCertificate::try_from(c)?),
            None => None,
        };
        self.entries.push(Arc::new(CertCtx {
            cert,
            ta_info: Some(ta_info),
        }));
        Ok(())
    }

    /// `add_encoded_trust_anchor_info` parses a DER-encoded TrustAnchorInfo and adds it to the store.
    pub fn add_encoded_trust_anchor_info(&mut self, enc_ta: &[u8]) -> Result<()> {
        let ta_info = TrustAnchorInfo::from_der(enc_ta)?;
        self.add_trust_anchor_info(ta_info)
    }

    /// Returns the number of entries in the store
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CertificateStore for CertStore {
    fn find_by_subject_or_alt_subject_name(&self, name: &Name) -> Result<Vec<Arc<CertCtx>>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.matches_subject_or_alt_subject_name(name))
            .cloned()
            .collect())
    }

    fn find_by_issuer_and_serial(
        &self,
        issuer: &Name,
        serial: &SerialNumber,
    ) -> Result<Option<Arc<CertCtx>>> {
        for e in &self.entries {
            if let Some(cert) = &e.cert {
                let tbs = &cert.decoded_cert.tbs_certificate;
                if tbs.serial_number == *serial && compare_names(&tbs.issuer, issuer) {
                    return Ok(Some(e.clone()));
                }
            }
        }
        Ok(None)
    }
}

#[test]
fn cert_store_test() {
    let mut store = CertStore::new();
    assert!(store.is_empty());
    store
        .add_encoded_cert(include_bytes!("../../tests/examples/root.der"))
        .unwrap();
    store
        .add_encoded_cert(include_bytes!("../../tests/examples/intermediate.der"))
        .unwrap();
    store
        .add_encoded_cert(include_bytes!("../../tests/examples/intermediate_cross.der"))
        .unwrap();
    assert_eq!(3, store.len());
    assert!(store.add_encoded_cert(b"junk").is_err());

    let target =
        PDVCertificate::try_from(include_bytes!("../../tests/examples/target.der").as_slice())
            .unwrap();
    let issuers = store
        .find_by_subject_or_alt_subject_name(&target.decoded_cert.tbs_certificate.issuer)
        .unwrap();
    // intermediate and its cross-certified twin share a subject name
    assert_eq!(2, issuers.len());

    let ca = issuers[0].cert.as_ref().unwrap();
    let found = store
        .find_by_issuer_and_serial(
            &ca.decoded_cert.tbs_certificate.issuer,
            &ca.decoded_cert.tbs_certificate.serial_number,
        )
        .unwrap()
        .unwrap();
    assert!(found.cert.as_ref().unwrap().is_same_cert(ca));

    assert!(store
        .find_by_issuer_and_serial(
            &target.decoded_cert.tbs_certificate.issuer,
            &target.decoded_cert.tbs_certificate.serial_number,
        )
        .unwrap()
        .is_none());
}

#[test]
fn ta_info_store_test() {
    let mut store = CertStore::new();
    store
        .add_encoded_trust_anchor_info(include_bytes!("../../tests/examples/root_ta_info.der"))
        .unwrap();
    assert_eq!(1, store.len());

    let root = PDVCertificate::try_from(include_bytes!("../../tests/examples/root.der").as_slice())
        .unwrap();
    let found = store
        .find_by_subject_or_alt_subject_name(&root.decoded_cert.tbs_certificate.subject)
        .unwrap();
    assert_eq!(1, found.len());
    assert!(found[0].cert.is_none());
    assert_eq!(
        Some(&root.decoded_cert.tbs_certificate.subject_public_key_info),
        found[0].public_key()
    );
    assert!(compare_names(
        found[0].subject().unwrap(),
        &root.decoded_cert.tbs_certificate.subject
    ));
}
