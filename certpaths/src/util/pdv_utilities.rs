//! Utility functions that support certification path processing

use alloc::format;
use alloc::string::{String, ToString};

use lazy_static::lazy_static;
use log::{debug, error};
use regex::Regex;
use subtle_encoding::hex;

use const_oid::db::rfc2256::STATE_OR_PROVINCE_NAME;
use const_oid::db::rfc3280::{EMAIL_ADDRESS, PSEUDONYM};
use const_oid::db::rfc4519::*;
use const_oid::db::rfc5280::ANY_POLICY;
use const_oid::db::rfc5912::*;
use der::asn1::{Ia5String, PrintableString, Utf8StringRef};
use der::{asn1::ObjectIdentifier, Encode, Tagged};
use spki::{AlgorithmIdentifier, AlgorithmIdentifierOwned};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::Name;
use x509_cert::{Certificate, TbsCertificate};

use crate::{
    pdv_certificate::*, util::error::*,
    util::pdv_alg_oids::*, util::time_of_interest::TimeOfInterest,
};

/// OID for uid attribute from RFC4519: 0.9.2342.19200300.100.1.1
pub const UID: ObjectIdentifier = ObjectIdentifier::new_unwrap("0.9.2342.19200300.100.1.1");

/// `is_self_issued` returns true if the subject field in the certificate is the same as the issuer
/// field.
pub fn is_self_issued(cert: &Certificate) -> bool {
    compare_names(&cert.tbs_certificate.issuer, &cert.tbs_certificate.subject)
}

/// `valid_at_time` evaluates the not_before and not_after fields of the given TBSCertificate instance
/// relative to the presented time of interest.
///
/// It returns the number of seconds left to live if the certificate is valid at the given time or
/// [`PathValidationStatus::NotValidAtTime`] if it is not.
///
/// To stifle logging output upon error, pass true for the stifle_log parameter.
pub fn valid_at_time(target: &TbsCertificate, toi: &TimeOfInterest, stifle_log: bool) -> Result<u64> {
    if *toi < target.validity.not_before {
        if !stifle_log {
            log_error_for_name(
                &target.subject,
                "certificate is not yet valid, i.e., not_before is after the configured time of interest",
            );
        }
        return Err(Error::PathValidation(PathValidationStatus::NotValidAtTime));
    }

    if *toi > target.validity.not_after {
        if !stifle_log {
            log_error_for_name(
                &target.subject,
                format!(
                    "certificate is expired relative to the configured time of interest: {}",
                    target.validity.not_after
                )
                .as_str(),
            );
        }
        return Err(Error::PathValidation(PathValidationStatus::NotValidAtTime));
    }

    let na = target.validity.not_after.to_unix_duration().as_secs();
    Ok(na.saturating_sub(toi.as_unix_secs()))
}

/// `descended_from_host` returns true if `cand` is the host named by `prev_name` or, for DNS names,
/// a subdomain of it. A URI constraint names a single host unless it begins with a period, in which
/// case it matches any host in that domain.
pub(crate) fn descended_from_host(prev_name: &Ia5String, cand: &str, is_uri: bool) -> bool {
    let base = prev_name.to_string().to_lowercase();
    let cand = cand.to_lowercase();
    if cand == base {
        return true;
    }
    let prefix = match cand.strip_suffix(base.as_str()) {
        Some(prefix) => prefix,
        None => return false,
    };
    if is_uri {
        base.starts_with('.')
    } else {
        prefix.ends_with('.')
    }
}

/// `is_email` returns true if addr looks like a mailbox, i.e., local-part@domain.
pub(crate) fn is_email(addr: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Option<Regex> = Regex::new(
            "^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([-.]{1}[a-z0-9]+)*.[a-z]{2,6})"
        )
        .ok();
    }

    if let Some(re) = EMAIL_RE.as_ref() {
        return re.is_match(addr.to_lowercase().as_str());
    }
    false
}

/// `descended_from_rfc822` returns true if `new_name` satisfies the rfc822Name constraint in
/// `prev_name`. A mailbox constraint matches only that mailbox, a host constraint matches every
/// mailbox on that host and a constraint that begins with a period matches every mailbox in the
/// domain.
pub(crate) fn descended_from_rfc822(prev_name: &Ia5String, new_name: &Ia5String) -> bool {
    let cand = new_name.to_string().to_lowercase();
    let base = prev_name.to_string().to_lowercase();

    if is_email(base.as_str()) {
        return cand == base;
    }
    let prefix = match cand.strip_suffix(base.as_str()) {
        Some(prefix) => prefix,
        None => return false,
    };
    if base.starts_with('.') {
        !prefix.ends_with('@')
    } else {
        base.starts_with('@') || prefix.ends_with('@')
    }
}

/// `descended_from_dn` returns true if name is equal to or descended from subtree and false otherwise.
pub(crate) fn descended_from_dn(subtree: &Name, name: &Name, min: u32, max: Option<u32>) -> bool {
    //if descendant fewer rdns then it is not a descendant
    if subtree.0.len() > name.0.len() {
        return false;
    }

    let diff = (name.0.len() - subtree.0.len()) as u32;
    if diff < min {
        return false;
    }
    if let Some(max) = max {
        if diff > max {
            return false;
        }
    }

    for (l, r) in subtree.0.iter().zip(name.0.iter()) {
        if l == r {
            continue;
        }

        // tolerate differences in character set and capitalization
        if l.0.len() != r.0.len() {
            return false;
        }
        for (la, ra) in l.0.iter().zip(r.0.iter()) {
            if la.oid != ra.oid {
                // if the type of attribute, i.e., c, cn, o, is different, return false
                return false;
            }
            if la.value.value() == ra.value.value() {
                if la.value.tag() != ra.value.tag() {
                    debug!(
                        "Permitting a DN name constraint match despite different character sets"
                    );
                }
                continue;
            }
            match (get_value_from_rdn(la), get_value_from_rdn(ra)) {
                (Ok(lv), Ok(rv)) if lv.to_lowercase() == rv.to_lowercase() => {
                    debug!("Permitting a DN name constraint match despite different capitalization");
                }
                _ => return false,
            }
        }
    }

    true
}

/// `get_hash_alg_from_sig_alg` returns the digest algorithm used by an RSA PKCS #1 v1.5 or ECDSA
/// signature algorithm.
pub fn get_hash_alg_from_sig_alg(sig_alg: &ObjectIdentifier) -> Result<AlgorithmIdentifierOwned> {
    let oid = match *sig_alg {
        PKIXALG_SHA224_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA224 => PKIXALG_SHA224,
        PKIXALG_SHA256_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA256 => PKIXALG_SHA256,
        PKIXALG_SHA384_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA384 => PKIXALG_SHA384,
        PKIXALG_SHA512_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA512 => PKIXALG_SHA512,
        _ => return Err(Error::Unrecognized),
    };
    Ok(AlgorithmIdentifier {
        oid,
        parameters: None,
    })
}

pub(crate) fn log_error_for_name(name: &Name, msg: &str) {
    let name_str = name_to_string(name);
    error!(
        "Encountered error while processing certificate with subject {}: {}",
        name_str, msg
    );
}

pub(crate) fn log_error_for_ca(ca: &PDVCertificate, msg: &str) {
    log_error_for_name(&ca.decoded_cert.tbs_certificate.subject, msg);
}

/// `oid_lookup` takes an ObjectIdentifier and returns a string with a friendly name for the OID or
/// Error::NotFound.
pub fn oid_lookup(oid: &ObjectIdentifier) -> Result<String> {
    let s = match *oid {
        PKIXALG_SHA224_WITH_RSA_ENCRYPTION => "SHA224 with RSA Encryption",
        PKIXALG_SHA256_WITH_RSA_ENCRYPTION => "SHA256 with RSA Encryption",
        PKIXALG_SHA384_WITH_RSA_ENCRYPTION => "SHA384 with RSA Encryption",
        PKIXALG_SHA512_WITH_RSA_ENCRYPTION => "SHA512 with RSA Encryption",
        PKIXALG_ECDSA_WITH_SHA256 => "ECDSA with SHA256",
        PKIXALG_ECDSA_WITH_SHA384 => "ECDSA with SHA384",
        PKIXALG_RSA_ENCRYPTION => "RSA Encryption",
        PKIXALG_EC_PUBLIC_KEY => "EC Public Key",
        NAME => "name",
        SURNAME => "sn",
        GIVEN_NAME => "givenName",
        INITIALS => "initials",
        GENERATION_QUALIFIER => "generationQualifier",
        COMMON_NAME => "cn",
        LOCALITY_NAME => "l",
        STATE_OR_PROVINCE_NAME => "st",
        STREET => "street",
        ORGANIZATIONAL_UNIT_NAME => "ou",
        ORGANIZATION_NAME => "o",
        TITLE => "title",
        DN_QUALIFIER => "dnQualifier",
        COUNTRY_NAME => "c",
        SERIAL_NUMBER => "serialNumber",
        PSEUDONYM => "pseudonym",
        DOMAIN_COMPONENT => "dc",
        EMAIL_ADDRESS => "emailAddress",
        UID => "uid",
        ID_CE_SUBJECT_KEY_IDENTIFIER => "subjectKeyIdentifier",
        ID_CE_KEY_USAGE => "keyUsage",
        ID_CE_SUBJECT_ALT_NAME => "subjectAltName",
        ID_CE_ISSUER_ALT_NAME => "issuerAltName",
        ID_CE_BASIC_CONSTRAINTS => "basicConstraints",
        ID_CE_NAME_CONSTRAINTS => "nameConstraints",
        ID_CE_CRL_DISTRIBUTION_POINTS => "cRLDistributionPoints",
        ID_CE_CERTIFICATE_POLICIES => "certificatePolicies",
        ID_CE_POLICY_MAPPINGS => "policyMappings",
        ID_CE_AUTHORITY_KEY_IDENTIFIER => "authorityKeyIdentifier",
        ID_CE_POLICY_CONSTRAINTS => "policyConstraints",
        ID_CE_EXT_KEY_USAGE => "extKeyUsage",
        ID_CE_INHIBIT_ANY_POLICY => "inhibitAnyPolicy",
        ID_PE_AUTHORITY_INFO_ACCESS => "authorityInfoAccess",
        ID_PE_SUBJECT_INFO_ACCESS => "subjectInfoAccess",
        ANY_POLICY => "anyPolicy",
        _ => return Err(Error::NotFound),
    };
    Ok(s.to_string())
}

/// `buffer_to_hex` takes a byte array and returns a string featuring upper case ASCII hex characters (without
/// commas, spaces, or brackets).
/// ```
/// use certpaths::buffer_to_hex;
/// let buf: [u8; 3] = [1, 2, 3];
/// assert_eq!(buffer_to_hex(&buf), "010203");
/// ```
pub fn buffer_to_hex(buffer: &[u8]) -> String {
    let hex = hex::encode_upper(buffer);
    match core::str::from_utf8(hex.as_slice()) {
        Ok(s) => s.to_string(),
        Err(_e) => String::new(),
    }
}

/// `name_to_string` returns a string representation of given Name value.
pub fn name_to_string(name: &Name) -> String {
    name.to_string()
}

/// `name_to_slash_string` returns a string representation of given Name value with each attribute
/// rendered as `/type=value`, from the most significant RDN to the least, i.e., /c=US/o=Org/cn=Joe.
pub fn name_to_slash_string(name: &Name) -> String {
    let mut s = String::new();
    for rdn in name.0.iter() {
        for atav in rdn.0.iter() {
            let t = oid_lookup(&atav.oid).unwrap_or_else(|_| atav.oid.to_string());
            let v = match get_value_from_rdn(atav) {
                Ok(v) => v,
                Err(_e) => "?".to_string(),
            };
            s.push_str(format!("/{}={}", t, v).as_str());
        }
    }
    s
}

/// get_value_from_rdn returns the value from AttributeTypeAndValue as a string for use in comparing
/// values where leading whitespace may be a factor
pub fn get_value_from_rdn(atav: &AttributeTypeAndValue) -> Result<String> {
    let val = match atav.value.tag() {
        der::Tag::PrintableString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: PrintableString| s.to_string()),
        der::Tag::Utf8String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Utf8StringRef<'_>| s.to_string()),
        der::Tag::Ia5String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Ia5String| s.to_string()),
        _ => None,
    };

    let mut s = "".to_string();
    if let Some(val) = val {
        let mut iter = val.char_indices().peekable();
        while let Some((i, c)) = iter.next() {
            match c {
                '#' if i == 0 => s.push_str("\\#"),
                ' ' if i == 0 || iter.peek().is_none() => s.push_str("\\ "),
                '"' | '+' | ',' | ';' | '<' | '>' | '\\' => s.push_str(format!("\\{}", c).as_str()),
                '\x00'..='\x1f' | '\x7f' => s.push_str(format!("\\{:02x}", c as u8).as_str()),
                _ => s.push(c),
            }
        }
    } else {
        let val = atav.value.to_der()?;
        s.push_str(format!("{}=#", atav.oid).as_str());
        for c in val {
            s.push_str(format!("{:02x}", c).as_str());
        }
    }
    Ok(s)
}

/// [`compare_names`] compares two Name values returning true if they match and false otherwise.
///
/// Values are compared case-insensitively, ignoring leading and trailing whitespace and treating
/// runs of internal whitespace as a single space.
pub fn compare_names(left: &Name, right: &Name) -> bool {
    lazy_static! {
        static ref WS_RE: Option<Regex> = Regex::new(r"\s+").ok();
    }

    // no match if not the same number of RDNs
    if left.0.len() != right.0.len() {
        return false;
    }

    for (lrdn, rrdn) in left.0.iter().zip(right.0.iter()) {
        if lrdn.0.len() != rrdn.0.len() {
            return false;
        }

        if lrdn == rrdn {
            continue;
        }

        for (l, r) in lrdn.0.iter().zip(rrdn.0.iter()) {
            if l.oid != r.oid {
                return false;
            }

            let l_str_val = match get_value_from_rdn(l) {
                Ok(val) => val.replace("\\ ", " "),
                Err(_e) => return false,
            };
            let r_str_val = match get_value_from_rdn(r) {
                Ok(val) => val.replace("\\ ", " "),
                Err(_e) => return false,
            };

            let l_val = l_str_val.trim().to_lowercase();
            let r_val = r_str_val.trim().to_lowercase();

            if l_val != r_val {
                let re = match WS_RE.as_ref() {
                    Some(re) => re,
                    None => return false,
                };

                //collapse multiple whitespace instances into one
                let l_str_val = re.replace_all(l_val.as_str(), " ");
                let r_str_val = re.replace_all(r_val.as_str(), " ");
                if l_str_val != r_str_val {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
use der::Decode;

#[cfg(test)]
fn name_from_str(s: &str) -> Name {
    use core::str::FromStr;
    Name::from_str(s).unwrap()
}

#[test]
fn self_issued_test() {
    let root = Certificate::from_der(include_bytes!("../../tests/examples/root.der")).unwrap();
    assert!(is_self_issued(&root));
    let ca =
        Certificate::from_der(include_bytes!("../../tests/examples/intermediate.der")).unwrap();
    assert!(!is_self_issued(&ca));
}

#[test]
fn compare_names_test() {
    let l = name_from_str("CN=Joe  Smith,O=Org,C=US");
    let r = name_from_str("CN=joe smith,O=ORG,C=US");
    assert!(compare_names(&l, &r));
    let r = name_from_str("CN=Joe Smith,O=Org");
    assert!(!compare_names(&l, &r));
    let r = name_from_str("CN=Joe Smyth,O=Org,C=US");
    assert!(!compare_names(&l, &r));
    let r = name_from_str("OU=Joe Smith,O=Org,C=US");
    assert!(!compare_names(&l, &r));
}

#[test]
fn descended_from_dn_test() {
    let subtree = name_from_str("O=Org,C=US");
    let name = name_from_str("CN=Joe,OU=Unit,O=org,C=US");
    assert!(descended_from_dn(&subtree, &name, 0, None));
    assert!(!descended_from_dn(&subtree, &name, 3, None));
    assert!(!descended_from_dn(&subtree, &name, 0, Some(1)));
    assert!(descended_from_dn(&subtree, &subtree, 0, None));
    assert!(!descended_from_dn(&name, &subtree, 0, None));
    let other = name_from_str("CN=Joe,O=Other,C=US");
    assert!(!descended_from_dn(&subtree, &other, 0, None));
}

#[test]
fn descended_from_host_test() {
    let base = Ia5String::new("example.com").unwrap();
    assert!(descended_from_host(&base, "example.com", false));
    assert!(descended_from_host(&base, "www.Example.com", false));
    assert!(!descended_from_host(&base, "badexample.com", false));
    assert!(!descended_from_host(&base, "example.org", false));

    let base = Ia5String::new(".example.com").unwrap();
    assert!(descended_from_host(&base, "www.example.com", true));
    assert!(!descended_from_host(&base, "example.com", true));
}

#[test]
fn descended_from_rfc822_test() {
    let mailbox = Ia5String::new("joe@example.com").unwrap();
    let domain = Ia5String::new("example.com").unwrap();
    let subdomains = Ia5String::new(".example.com").unwrap();

    let joe = Ia5String::new("joe@example.com").unwrap();
    let sue = Ia5String::new("sue@example.com").unwrap();
    let sub = Ia5String::new("sue@mail.example.com").unwrap();

    assert!(descended_from_rfc822(&mailbox, &joe));
    assert!(!descended_from_rfc822(&mailbox, &sue));
    assert!(descended_from_rfc822(&domain, &sue));
    assert!(!descended_from_rfc822(&domain, &sub));
    assert!(descended_from_rfc822(&subdomains, &sub));
    assert!(!descended_from_rfc822(&subdomains, &sue));
    assert!(is_email("joe@example.com"));
    assert!(!is_email("example.com"));
}

#[test]
fn valid_at_time_test() {
    let enc = include_bytes!("../../tests/examples/target.der");
    let cert = Certificate::from_der(enc).unwrap();
    let toi = TimeOfInterest::from_unix_secs(1_700_000_000).unwrap();
    assert!(valid_at_time(&cert.tbs_certificate, &toi, false).is_ok());
    // 2000-01-01
    let toi = TimeOfInterest::from_unix_secs(946_684_800).unwrap();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NotValidAtTime)),
        valid_at_time(&cert.tbs_certificate, &toi, true)
    );
    // 2050-01-01
    let toi = TimeOfInterest::from_unix_secs(2_524_608_000).unwrap();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NotValidAtTime)),
        valid_at_time(&cert.tbs_certificate, &toi, false)
    );
}

#[test]
fn name_strings_test() {
    let enc = include_bytes!("../../tests/examples/target.der");
    let cert = Certificate::from_der(enc).unwrap();
    assert_eq!(
        "/c=US/o=Certpaths Test/cn=Target EE",
        name_to_slash_string(&cert.tbs_certificate.subject)
    );
    assert_eq!("keyUsage", oid_lookup(&ID_CE_KEY_USAGE).unwrap());
    assert_eq!(Err(Error::NotFound), oid_lookup(&ObjectIdentifier::new_unwrap("1.2.3.4")));
}

#[test]
fn get_hash_alg_from_sig_alg_test() {
    let ai256 = AlgorithmIdentifier {
        oid: PKIXALG_SHA256,
        parameters: None,
    };
    let ai384 = AlgorithmIdentifier {
        oid: PKIXALG_SHA384,
        parameters: None,
    };
    assert_eq!(
        get_hash_alg_from_sig_alg(&PKIXALG_ECDSA_WITH_SHA256).unwrap(),
        ai256
    );
    assert_eq!(
        get_hash_alg_from_sig_alg(&PKIXALG_SHA256_WITH_RSA_ENCRYPTION).unwrap(),
        ai256
    );
    assert_eq!(
        get_hash_alg_from_sig_alg(&PKIXALG_SHA384_WITH_RSA_ENCRYPTION).unwrap(),
        ai384
    );
    assert_eq!(
        Err(Error::Unrecognized),
        get_hash_alg_from_sig_alg(&PKIXALG_RSA_ENCRYPTION)
    );
}
