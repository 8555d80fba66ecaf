//! Hashing and signature verification callbacks backed by the [Rust Crypto](https://github.com/RustCrypto)
//! project

use alloc::{format, vec::Vec};

use der::{asn1::ObjectIdentifier, Encode};
use p256::ecdsa::{
    signature::hazmat::PrehashVerifier, Signature as Signature256, VerifyingKey as VerifyingKey256,
};
use rsa::{pkcs8::DecodePublicKey, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::util::error::{Error, PathValidationStatus, Result};
use crate::{
    environment::pki_environment::*, log_message, util::pdv_alg_oids::*,
    util::pdv_utilities::get_hash_alg_from_sig_alg, PeLogLevels,
};

/// get_padding_scheme returns the PKCS #1 v1.5 scheme that matches an RSA signature algorithm.
/// SHA-224, SHA-256, SHA-384 and SHA-512 are supported.
pub fn get_padding_scheme(signature_alg: &AlgorithmIdentifierOwned) -> Result<Pkcs1v15Sign> {
    match signature_alg.oid {
        PKIXALG_SHA224_WITH_RSA_ENCRYPTION => Ok(Pkcs1v15Sign::new::<Sha224>()),
        PKIXALG_SHA256_WITH_RSA_ENCRYPTION => Ok(Pkcs1v15Sign::new::<Sha256>()),
        PKIXALG_SHA384_WITH_RSA_ENCRYPTION => Ok(Pkcs1v15Sign::new::<Sha384>()),
        PKIXALG_SHA512_WITH_RSA_ENCRYPTION => Ok(Pkcs1v15Sign::new::<Sha512>()),
        _ => Err(Error::Unrecognized),
    }
}

pub(crate) fn is_rsa(oid: &ObjectIdentifier) -> bool {
    matches!(
        *oid,
        PKIXALG_SHA224_WITH_RSA_ENCRYPTION
            | PKIXALG_SHA256_WITH_RSA_ENCRYPTION
            | PKIXALG_SHA384_WITH_RSA_ENCRYPTION
            | PKIXALG_SHA512_WITH_RSA_ENCRYPTION
    )
}

pub(crate) fn is_ecdsa(oid: &ObjectIdentifier) -> bool {
    matches!(
        *oid,
        PKIXALG_ECDSA_WITH_SHA224
            | PKIXALG_ECDSA_WITH_SHA256
            | PKIXALG_ECDSA_WITH_SHA384
            | PKIXALG_ECDSA_WITH_SHA512
    )
}

/// calculate_hash_rust_crypto is the [`CalculateHash`](crate::CalculateHash) implementation
/// installed by [`populate_5280_pki_environment`]. SHA-224, SHA-256, SHA-384 and SHA-512 are
/// supported.
pub fn calculate_hash_rust_crypto(
    _pe: &PkiEnvironment,
    hash_alg: &AlgorithmIdentifierOwned,
    buffer_to_hash: &[u8],
) -> Result<Vec<u8>> {
    let digest = match hash_alg.oid {
        PKIXALG_SHA224 => Sha224::digest(buffer_to_hash).to_vec(),
        PKIXALG_SHA256 => Sha256::digest(buffer_to_hash).to_vec(),
        PKIXALG_SHA384 => Sha384::digest(buffer_to_hash).to_vec(),
        PKIXALG_SHA512 => Sha512::digest(buffer_to_hash).to_vec(),
        _ => return Err(Error::Unrecognized),
    };
    Ok(digest)
}

fn bad_signature() -> Error {
    Error::PathValidation(PathValidationStatus::SignatureVerificationFailure)
}

fn verify_rsa(
    pe: &PkiEnvironment,
    message_to_verify: &[u8],
    signature: &[u8],
    signature_alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    let key = match RsaPublicKey::from_public_key_der(&spki.to_der()?) {
        Ok(key) => key,
        Err(e) => {
            log_message(
                &PeLogLevels::PeError,
                format!("Failed to parse RSA public key: {}", e).as_str(),
            );
            return Err(Error::Unrecognized);
        }
    };
    let hash_alg = get_hash_alg_from_sig_alg(&signature_alg.oid)?;
    let digest = calculate_hash_rust_crypto(pe, &hash_alg, message_to_verify)?;
    key.verify(get_padding_scheme(signature_alg)?, &digest, signature)
        .map_err(|_e| bad_signature())
}

fn verify_p256(
    pe: &PkiEnvironment,
    message_to_verify: &[u8],
    signature: &[u8],
    signature_alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    let curve = spki
        .algorithm
        .parameters
        .as_ref()
        .and_then(|p| p.decode_as::<ObjectIdentifier>().ok());
    if curve != Some(PKIXALG_SECP256R1) {
        log_message(
            &PeLogLevels::PeError,
            format!("Unsupported named curve: {:?}", curve).as_str(),
        );
        return Err(Error::Unrecognized);
    }
    let key = match VerifyingKey256::from_sec1_bytes(spki.subject_public_key.raw_bytes()) {
        Ok(key) => key,
        Err(_e) => {
            log_message(&PeLogLevels::PeError, "Failed to parse P-256 public key");
            return Err(Error::Unrecognized);
        }
    };
    // hash named by the signature algorithm
    let hash_alg = get_hash_alg_from_sig_alg(&signature_alg.oid)?;
    let digest = calculate_hash_rust_crypto(pe, &hash_alg, message_to_verify)?;
    let sig = Signature256::from_der(signature).map_err(|_e| bad_signature())?;
    key.verify_prehash(&digest, &sig).map_err(|_e| bad_signature())
}

/// verify_signature_message_rust_crypto is the [`VerifySignatureMessage`](crate::VerifySignatureMessage)
/// implementation installed by [`populate_5280_pki_environment`]. RSA PKCS #1 v1.5 and ECDSA P-256
/// signatures are supported. A signature that does not verify yields
/// [`PathValidationStatus::SignatureVerificationFailure`]; an unsupported algorithm or key yields
/// [`Error::Unrecognized`].
pub fn verify_signature_message_rust_crypto(
    pe: &PkiEnvironment,
    message_to_verify: &[u8],
    signature: &[u8],
    signature_alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    if is_rsa(&signature_alg.oid) {
        verify_rsa(pe, message_to_verify, signature, signature_alg, spki)
    } else if is_ecdsa(&signature_alg.oid) {
        verify_p256(pe, message_to_verify, signature, signature_alg, spki)
    } else {
        log_message(
            &PeLogLevels::PeError,
            format!("Unrecognized signature algorithm: {}", signature_alg.oid).as_str(),
        );
        Err(Error::Unrecognized)
    }
}

#[test]
fn test_calculate_hash() {
    use crate::PkiEnvironment;
    use hex_literal::hex;
    let mut pe = PkiEnvironment::default();
    pe.clear_all_callbacks();
    pe.add_calculate_hash_callback(calculate_hash_rust_crypto);

    let hash_algorithm = AlgorithmIdentifierOwned {
        oid: PKIXALG_SHA256,
        parameters: None,
    };
    let result = pe
        .calculate_hash(&pe, &hash_algorithm, "abc".as_bytes())
        .unwrap();
    assert_eq!(
        result,
        hex!("BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD")
    );

    let unknown = AlgorithmIdentifierOwned {
        oid: PKIXALG_RSA_ENCRYPTION,
        parameters: None,
    };
    assert_eq!(
        Err(Error::Unrecognized),
        pe.calculate_hash(&pe, &unknown, "abc".as_bytes())
    );
}

#[test]
fn test_verify_signature_message() {
    use crate::{DeferDecodeSigned, PkiEnvironment};
    use der::Decode;
    use x509_cert::Certificate;
    let mut pe = PkiEnvironment::default();
    pe.clear_all_callbacks();
    pe.add_verify_signature_message_callback(verify_signature_message_rust_crypto);

    for enc in [
        include_bytes!("../../tests/examples/root.der").as_slice(),
        include_bytes!("../../tests/examples/ec_root.der").as_slice(),
    ] {
        let defer_cert = DeferDecodeSigned::from_der(enc).unwrap();
        let cert = Certificate::from_der(enc).unwrap();
        let result = pe.verify_signature_message(
            &pe,
            &defer_cert.tbs_field,
            defer_cert.signature.raw_bytes(),
            &defer_cert.signature_algorithm,
            &cert.tbs_certificate.subject_public_key_info,
        );
        assert!(result.is_ok());
    }

    // intermediate signature does not verify with its own key
    let enc = include_bytes!("../../tests/examples/intermediate.der");
    let defer_cert = DeferDecodeSigned::from_der(enc).unwrap();
    let cert = Certificate::from_der(enc).unwrap();
    let result = pe.verify_signature_message(
        &pe,
        &defer_cert.tbs_field,
        defer_cert.signature.raw_bytes(),
        &defer_cert.signature_algorithm,
        &cert.tbs_certificate.subject_public_key_info,
    );
    assert!(result.is_err());
}

#[test]
fn test_verify_p256_digests() {
    use der::asn1::{Any, BitString};
    use p256::ecdsa::{signature::hazmat::PrehashSigner, SigningKey};

    let pe = PkiEnvironment::default();
    let signing_key = SigningKey::from_slice(&[0x42; 32]).unwrap();
    let point = signing_key.verifying_key().to_encoded_point(false);
    let spki = SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: PKIXALG_EC_PUBLIC_KEY,
            parameters: Some(Any::encode_from(&PKIXALG_SECP256R1).unwrap()),
        },
        subject_public_key: BitString::from_bytes(point.as_bytes()).unwrap(),
    };

    let msg = b"tbs bytes";
    for (oid, digest) in [
        (PKIXALG_ECDSA_WITH_SHA224, Sha224::digest(msg).to_vec()),
        (PKIXALG_ECDSA_WITH_SHA256, Sha256::digest(msg).to_vec()),
        (PKIXALG_ECDSA_WITH_SHA384, Sha384::digest(msg).to_vec()),
        (PKIXALG_ECDSA_WITH_SHA512, Sha512::digest(msg).to_vec()),
    ] {
        let sig: Signature256 = signing_key.sign_prehash(&digest).unwrap();
        let sig_alg = AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        };
        let der_sig = sig.to_der();
        assert_eq!(
            Ok(()),
            verify_signature_message_rust_crypto(&pe, msg, der_sig.as_bytes(), &sig_alg, &spki)
        );
        let r = verify_signature_message_rust_crypto(
            &pe,
            b"other bytes",
            der_sig.as_bytes(),
            &sig_alg,
            &spki,
        );
        assert_eq!(Err(bad_signature()), r);
    }

    // SHA-384 signature presented as ecdsa-with-SHA256 is not accepted
    let sig: Signature256 = signing_key.sign_prehash(&Sha384::digest(msg)).unwrap();
    let sig_alg = AlgorithmIdentifierOwned {
        oid: PKIXALG_ECDSA_WITH_SHA256,
        parameters: None,
    };
    assert!(
        verify_signature_message_rust_crypto(&pe, msg, sig.to_der().as_bytes(), &sig_alg, &spki)
            .is_err()
    );
}
