//! Certificate wrapper carrying the encoding, the decoded structure and cached extensions

use alloc::vec::Vec;

use const_oid::db::rfc5912::{
    ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES, ID_CE_INHIBIT_ANY_POLICY, ID_CE_KEY_USAGE,
    ID_CE_NAME_CONSTRAINTS, ID_CE_POLICY_CONSTRAINTS, ID_CE_POLICY_MAPPINGS,
    ID_CE_SUBJECT_ALT_NAME,
};
use der::asn1::BitString;
use der::{asn1::ObjectIdentifier, Decode, Encode};
use log::error;
use spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;

use crate::pdv_extension::*;
use crate::util::error::*;

/// [`PDVCertificate`] pairs a DER-encoded certificate with its decoded form and the decoded
/// extensions listed in [`EXTS_OF_INTEREST`].
///
/// Two [`PDVCertificate`] values represent the same certificate when their encodings match. The path
/// builder relies on this when guarding against cycles and duplicate siblings.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PDVCertificate {
    /// Binary, encoded Certificate object
    pub encoded_cert: Vec<u8>,
    /// Decoded Certificate object
    pub decoded_cert: Certificate,
    /// Extensions decoded from the Certificate
    pub parsed_extensions: ParsedExtensions,
}

impl PDVCertificate {
    fn from_parts(encoded_cert: Vec<u8>, decoded_cert: Certificate) -> Self {
        let mut pdv_cert = PDVCertificate {
            encoded_cert,
            decoded_cert,
            parsed_extensions: ParsedExtensions::new(),
        };
        pdv_cert.parse_extensions(EXTS_OF_INTEREST);
        pdv_cert
    }

    /// `is_same_cert` returns true if `other` has the same encoding as `self`.
    pub fn is_same_cert(&self, other: &PDVCertificate) -> bool {
        self.encoded_cert == other.encoded_cert
    }
}

impl TryFrom<&[u8]> for PDVCertificate {
    type Error = der::Error;

    fn try_from(enc_cert: &[u8]) -> der::Result<Self> {
        let cert = Certificate::from_der(enc_cert)?;
        Ok(Self::from_parts(enc_cert.to_vec(), cert))
    }
}

impl TryFrom<Certificate> for PDVCertificate {
    type Error = der::Error;

    fn try_from(cert: Certificate) -> der::Result<Self> {
        let enc_cert = cert.to_der()?;
        Ok(Self::from_parts(enc_cert, cert))
    }
}

fn decode_extension<T, F>(oid: &ObjectIdentifier, value: &[u8], wrap: F) -> Result<PDVExtension>
where
    T: for<'a> Decode<'a>,
    F: FnOnce(T) -> PDVExtension,
{
    match T::from_der(value) {
        Ok(decoded) => Ok(wrap(decoded)),
        Err(e) => {
            error!("Failed to parse extension {}: {}", oid, e);
            Err(Error::Asn1Error(e))
        }
    }
}

impl ExtensionProcessing for PDVCertificate {
    fn get_extension(&self, oid: &ObjectIdentifier) -> Result<Option<&'_ PDVExtension>> {
        Ok(self.parsed_extensions.get(oid))
    }

    fn parse_extensions(&'_ mut self, oids: &[ObjectIdentifier]) {
        for oid in oids {
            let _r = self.parse_extension(oid);
        }
    }

    fn parse_extension(&mut self, oid: &ObjectIdentifier) -> Result<Option<&PDVExtension>> {
        if self.parsed_extensions.contains_key(oid) {
            return Ok(self.parsed_extensions.get(oid));
        }

        let ext = match self
            .decoded_cert
            .tbs_certificate
            .extensions
            .as_ref()
            .and_then(|exts| exts.iter().find(|ext| ext.extn_id == *oid))
        {
            Some(ext) => ext,
            None => return Ok(None),
        };

        let v = ext.extn_value.as_bytes();
        let decoded = match *oid {
            ID_CE_BASIC_CONSTRAINTS => decode_extension(oid, v, PDVExtension::BasicConstraints)?,
            ID_CE_KEY_USAGE => decode_extension(oid, v, PDVExtension::KeyUsage)?,
            ID_CE_SUBJECT_ALT_NAME => decode_extension(oid, v, PDVExtension::SubjectAltName)?,
            ID_CE_NAME_CONSTRAINTS => decode_extension(oid, v, PDVExtension::NameConstraints)?,
            ID_CE_CERTIFICATE_POLICIES => {
                decode_extension(oid, v, PDVExtension::CertificatePolicies)?
            }
            ID_CE_POLICY_MAPPINGS => decode_extension(oid, v, PDVExtension::PolicyMappings)?,
            ID_CE_POLICY_CONSTRAINTS => {
                decode_extension(oid, v, PDVExtension::PolicyConstraints)?
            }
            ID_CE_INHIBIT_ANY_POLICY => {
                decode_extension(oid, v, PDVExtension::InhibitAnyPolicy)?
            }
            // not consulted during validation
            _ => return Ok(None),
        };
        self.parsed_extensions.insert(*oid, decoded);
        Ok(self.parsed_extensions.get(oid))
    }
}

/// [`DeferDecodeSigned`] decodes only the outer Certificate structure so the TBSCertificate bytes
/// can be verified exactly as they were signed, without a decode/re-encode round trip.
pub struct DeferDecodeSigned {
    /// tbsCertificate       TBSCertificate,
    pub tbs_field: Vec<u8>,
    /// signatureAlgorithm   AlgorithmIdentifier,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    /// signature            BIT STRING
    pub signature: BitString,
}

impl ::der::FixedTag for DeferDecodeSigned {
    const TAG: ::der::Tag = ::der::Tag::Sequence;
}

impl<'a> ::der::DecodeValue<'a> for DeferDecodeSigned {
    fn decode_value<R: ::der::Reader<'a>>(
        reader: &mut R,
        header: ::der::Header,
    ) -> ::der::Result<Self> {
        use ::der::Reader as _;
        reader.read_nested(header.length, |reader| {
            let tbs_certificate = reader.tlv_bytes()?;
            let signature_algorithm = reader.decode()?;
            let signature = reader.decode()?;
            Ok(Self {
                tbs_field: tbs_certificate.to_vec(),
                signature_algorithm,
                signature,
            })
        })
    }
}

#[test]
fn parse_extensions_test() {
    let enc = include_bytes!("../../tests/examples/pol_intermediate.der");
    let cert = PDVCertificate::try_from(enc.as_slice()).unwrap();
    assert!(matches!(
        cert.get_extension(&ID_CE_BASIC_CONSTRAINTS),
        Ok(Some(PDVExtension::BasicConstraints(_)))
    ));
    if let Ok(Some(PDVExtension::CertificatePolicies(cp))) =
        cert.get_extension(&ID_CE_CERTIFICATE_POLICIES)
    {
        assert_eq!(2, cp.0.len());
    } else {
        panic!("Failed to find certificate policies")
    }
    if let Ok(Some(PDVExtension::PolicyConstraints(pc))) =
        cert.get_extension(&ID_CE_POLICY_CONSTRAINTS)
    {
        assert_eq!(Some(0), pc.require_explicit_policy);
    } else {
        panic!("Failed to find policy constraints")
    }
    assert!(cert.get_extension(&ID_CE_POLICY_MAPPINGS).unwrap().is_none());

    let reencoded = PDVCertificate::try_from(cert.decoded_cert.clone()).unwrap();
    assert!(reencoded.is_same_cert(&cert));
    assert_eq!(cert.parsed_extensions, reencoded.parsed_extensions);

    assert!(PDVCertificate::try_from(&enc[1..]).is_err());

    // the critical unknown extension is present but never decoded
    let enc = include_bytes!("../../tests/examples/critext_target.der");
    let mut cert = PDVCertificate::try_from(enc.as_slice()).unwrap();
    let unknown = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.9");
    assert!(cert.parse_extension(&unknown).unwrap().is_none());
}

#[test]
fn defer_decode_test() {
    let enc = include_bytes!("../../tests/examples/target.der");
    let cert = Certificate::from_der(enc).unwrap();
    let defer = DeferDecodeSigned::from_der(enc).unwrap();
    assert_eq!(defer.tbs_field, cert.tbs_certificate.to_der().unwrap());
    assert_eq!(defer.signature_algorithm, cert.signature_algorithm);
    assert_eq!(defer.signature, cert.signature);
}
