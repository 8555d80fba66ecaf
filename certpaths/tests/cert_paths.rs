use std::sync::Arc;

use certpaths::*;
use cms::signed_data::CertificateSet;
use der::asn1::ObjectIdentifier;
use der::Decode;
use hex_literal::hex;
use x509_cert::ext::pkix::constraints::name::GeneralSubtrees;

// 2025-01-01T00:00:00Z
const TEST_TIME: u64 = 1735689600;
// 2041-01-01T00:00:00Z, after every fixture has expired
const LATE_TIME: u64 = 2240524800;

fn cert(enc: &[u8]) -> Arc<PDVCertificate> {
    Arc::new(PDVCertificate::try_from(enc).unwrap())
}

fn store(encs: &[&[u8]]) -> Option<SharedCertificateStore> {
    let mut cs = CertStore::new();
    for enc in encs {
        cs.add_encoded_cert(enc).unwrap();
    }
    Some(Arc::new(cs))
}

fn cert_set(enc: &[u8]) -> CertificateSet {
    let mut set = vec![0x31, 0x82, (enc.len() >> 8) as u8, enc.len() as u8];
    set.extend_from_slice(enc);
    CertificateSet::from_der(&set).unwrap()
}

fn simple_paths() -> CertPaths {
    let target = cert(include_bytes!("examples/target.der"));
    let paths = CertPaths::create(target);
    paths
        .set_trusted_store(store(&[include_bytes!("examples/root.der")]))
        .unwrap();
    paths
        .set_untrusted_store(store(&[include_bytes!("examples/intermediate.der")]))
        .unwrap();
    paths.set_valid_time_spec(Some(TEST_TIME)).unwrap();
    paths
}

#[test]
fn simple_chain_from_stores() {
    let paths = simple_paths();
    assert_eq!(1, paths.build(None).unwrap());
    assert_eq!(Some(PathValidationStatus::NotVerified), paths.path_verify_result(0));

    let mut ei = ErrorInfo::new();
    assert_eq!(1, paths.validate_all(Some(&mut ei)).unwrap());
    assert!(ei.message.is_empty());
    assert_eq!(Some(PathValidationStatus::Valid), paths.path_verify_result(0));
    assert_eq!(None, paths.status());

    assert_eq!(3, paths.path_length(0));
    let info = paths.query_path_info(0).unwrap();
    assert!(info.trusted);
    assert_eq!(3, info.node_count);
    assert_eq!(PathValidationStatus::Valid, info.verify_result);
    assert!(info.cert_ctx.is_some());
    assert_eq!(
        "CN=Test Root CA,O=Certpaths Test,C=US",
        info.subject.as_ref().unwrap().to_string()
    );
    assert_eq!(Err(Error::NotFound), paths.query_path_info(1).map(|_| ()));
}

#[test]
fn path_node_cert_order() {
    let paths = simple_paths();
    paths.build(None).unwrap();

    let root = paths.path_node_cert(0, 0).unwrap();
    let ca = paths.path_node_cert(0, 1).unwrap();
    let ee = paths.path_node_cert(0, 2).unwrap();
    assert_eq!(include_bytes!("examples/root.der").to_vec(), root.encoded_cert);
    assert_eq!(include_bytes!("examples/intermediate.der").to_vec(), ca.encoded_cert);
    assert_eq!(include_bytes!("examples/target.der").to_vec(), ee.encoded_cert);
    assert!(paths.path_node_cert(0, 3).is_none());
    assert!(paths.path_node_cert(1, 0).is_none());
}

#[test]
fn untrusted_set_and_array() {
    let target = cert(include_bytes!("examples/target.der"));
    let ca = include_bytes!("examples/intermediate.der");
    let root = cert(include_bytes!("examples/root.der"));

    let paths = CertPaths::create(target.clone());
    paths.set_trusted_cert(Some(root.clone())).unwrap();
    paths.set_untrusted_set(Some(&cert_set(ca))).unwrap();
    paths.set_valid_time_spec(Some(TEST_TIME)).unwrap();
    assert_eq!(1, paths.build(None).unwrap());
    assert_eq!(1, paths.validate_all(None).unwrap());

    let paths = CertPaths::create_ex(
        target,
        store(&[include_bytes!("examples/root.der")]),
        None,
        &[cert(ca)],
        Some(TimeOfInterest::from_unix_secs(TEST_TIME).unwrap()),
    );
    assert_eq!(Some(TEST_TIME), paths.settings().unwrap().get_time_of_interest());
    assert_eq!(1, paths.build(None).unwrap());
    assert_eq!(1, paths.validate_all(None).unwrap());
}

#[test]
fn cross_certified_paths() {
    let target = cert(include_bytes!("examples/target.der"));
    let paths = CertPaths::create(target);
    paths
        .set_trusted_store(store(&[
            include_bytes!("examples/root.der"),
            include_bytes!("examples/alt_root.der"),
        ]))
        .unwrap();
    paths
        .set_untrusted_array(&[
            cert(include_bytes!("examples/intermediate.der")),
            cert(include_bytes!("examples/intermediate_cross.der")),
        ])
        .unwrap();
    paths.set_valid_time_spec(Some(TEST_TIME)).unwrap();
    assert_eq!(2, paths.build(None).unwrap());
    assert_eq!(2, paths.validate_all(None).unwrap());

    let mut s = String::new();
    paths.dump_all(1, &mut s).unwrap();
    assert!(s.starts_with("2 paths, rc=Ok\n"));
    assert!(s.contains("Path #0: trusted, 2 deep, rcVerify=Valid"));
    assert!(s.contains("Path #1: trusted, 2 deep, rcVerify=Valid"));
    assert!(s.contains("Subject: /c=US/o=Certpaths Test/cn=Alt Root CA"));
}

#[test]
fn expired_paths() {
    let paths = simple_paths();
    let paths2 = CertPaths::create(cert(include_bytes!("examples/target.der")));
    paths2
        .set_trusted_store(store(&[include_bytes!("examples/root.der")]))
        .unwrap();
    paths2
        .set_untrusted_array(&[cert(include_bytes!("examples/intermediate.der"))])
        .unwrap();
    paths2.set_valid_time_spec(Some(LATE_TIME)).unwrap();
    paths2.build(None).unwrap();
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NotValidAtTime)),
        paths2.validate_all(Some(&mut ei))
    );
    assert_eq!(
        Some(Error::PathValidation(PathValidationStatus::NotValidAtTime)),
        ei.error
    );
    assert_eq!(
        Some(PathValidationStatus::NotValidAtTime),
        paths2.path_verify_result(0)
    );
    assert_eq!(
        Some(Error::PathValidation(PathValidationStatus::NotValidAtTime)),
        paths2.status()
    );

    // no time of interest disables validity checks
    paths.set_valid_time(None).unwrap();
    paths.build(None).unwrap();
    assert_eq!(1, paths.validate_all(None).unwrap());
}

#[test]
fn name_constraints_paths() {
    let root = include_bytes!("examples/root.der");
    let nc_ca = cert(include_bytes!("examples/nc_intermediate.der"));

    let cases: [(&[u8], Option<PathValidationStatus>); 3] = [
        (
            include_bytes!("examples/nc_target.der"),
            Some(PathValidationStatus::NameNotPermitted),
        ),
        (
            include_bytes!("examples/nc_san_target.der"),
            Some(PathValidationStatus::AltNameNotPermitted),
        ),
        (include_bytes!("examples/nc_ok_target.der"), None),
    ];
    for (enc, expected) in cases {
        let paths = CertPaths::create(cert(enc));
        paths.set_trusted_store(store(&[root])).unwrap();
        paths.set_untrusted_array(&[nc_ca.clone()]).unwrap();
        paths.set_valid_time_spec(Some(TEST_TIME)).unwrap();
        paths.build(None).unwrap();
        match expected {
            Some(status) => {
                assert_eq!(
                    Err(Error::PathValidation(status)),
                    paths.validate_all(None)
                );
                assert_eq!(Some(status), paths.path_verify_result(0));
            }
            None => assert_eq!(1, paths.validate_all(None).unwrap()),
        }
    }
}

#[test]
fn initial_excluded_subtrees() {
    // SEQUENCE { SEQUENCE { [2] "example.com" } }
    let enc = hex!("300F300D820B6578616D706C652E636F6D");
    let subtrees = GeneralSubtrees::from_der(&enc).unwrap();

    let paths = simple_paths();
    paths.set_initial_excluded_subtrees(Some(&subtrees)).unwrap();
    paths.build(None).unwrap();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::AltNameNotPermitted
        )),
        paths.validate_all(None)
    );

    let paths = simple_paths();
    paths.set_initial_permitted_subtrees(Some(&subtrees)).unwrap();
    paths.build(None).unwrap();
    assert_eq!(1, paths.validate_all(None).unwrap());
}

#[test]
fn policy_paths() {
    let root = include_bytes!("examples/root.der");

    let paths = CertPaths::create(cert(include_bytes!("examples/pol_target.der")));
    paths.set_trusted_store(store(&[root])).unwrap();
    paths
        .set_untrusted_array(&[cert(include_bytes!("examples/pol_intermediate.der"))])
        .unwrap();
    paths
        .set_initial_policy_set(&[ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.2")])
        .unwrap();
    paths.build(None).unwrap();
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NullPolicySet)),
        paths.validate_all(Some(&mut ei))
    );
    assert!(!ei.message.is_empty());

    let paths = CertPaths::create(cert(include_bytes!("examples/map_target.der")));
    paths.set_trusted_store(store(&[root])).unwrap();
    paths
        .set_untrusted_array(&[cert(include_bytes!("examples/map_intermediate.der"))])
        .unwrap();
    paths.build(None).unwrap();
    assert_eq!(1, paths.validate_all(None).unwrap());

    let paths = CertPaths::create(cert(include_bytes!("examples/map_target.der")));
    paths.set_trusted_store(store(&[root])).unwrap();
    paths
        .set_untrusted_array(&[cert(include_bytes!("examples/map_intermediate.der"))])
        .unwrap();
    paths.set_initial_policy_mapping_inhibit(0).unwrap();
    paths.build(None).unwrap();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NullPolicySet)),
        paths.validate_all(None)
    );
}

#[test]
fn trust_anchor_info_store() {
    let mut ta_store = CertStore::new();
    ta_store
        .add_encoded_trust_anchor_info(include_bytes!("examples/root_ta_info.der"))
        .unwrap();
    let ta_store: SharedCertificateStore = Arc::new(ta_store);

    let paths = CertPaths::create(cert(include_bytes!("examples/target.der")));
    paths.set_trusted_store(Some(ta_store)).unwrap();
    paths
        .set_untrusted_array(&[cert(include_bytes!("examples/intermediate.der"))])
        .unwrap();
    paths.set_valid_time_spec(Some(TEST_TIME)).unwrap();
    assert_eq!(1, paths.build(None).unwrap());
    assert_eq!(1, paths.validate_all(None).unwrap());

    let info = paths.query_path_info(0).unwrap();
    assert!(info.trusted);
    assert!(info.public_key.is_some());
    assert!(info.subject.is_some());
    assert!(info.cert_ctx.as_ref().unwrap().ta_info.is_some());
}

#[test]
fn trusted_target() {
    let root = cert(include_bytes!("examples/root.der"));
    let paths = CertPaths::create(root.clone());
    paths.set_trusted_cert(Some(root)).unwrap();
    paths.set_valid_time_spec(Some(TEST_TIME)).unwrap();
    assert_eq!(1, paths.build(None).unwrap());
    assert_eq!(1, paths.path_length(0));
    assert_eq!(1, paths.validate_all(None).unwrap());
}

#[test]
fn no_trusted_paths() {
    let paths = CertPaths::create(cert(include_bytes!("examples/target.der")));
    paths
        .set_untrusted_array(&[cert(include_bytes!("examples/intermediate.der"))])
        .unwrap();
    assert_eq!(1, paths.build(None).unwrap());
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NoTrustedPaths)),
        paths.validate_all(Some(&mut ei))
    );
    assert_eq!("None of the 1 path(s) have a trust anchor.", ei.message);

    let mut s = String::new();
    paths.dump_all(1, &mut s).unwrap();
    assert!(s.starts_with("1 paths, rc=PathValidationError: NoTrustedPaths\n"));
    assert!(s.contains("Path #0: untrusted, 1 deep, rcVerify=MissingTrustAnchor"));

    let paths = CertPaths::create(cert(include_bytes!("examples/target.der")));
    paths
        .set_untrusted_array(&[cert(include_bytes!("examples/intermediate.der"))])
        .unwrap();
    paths.set_eliminate_untrusted_paths(true).unwrap();
    assert_eq!(0, paths.build(None).unwrap());
    assert_eq!(0, paths.path_count());
}

#[test]
fn wrong_order() {
    let paths = simple_paths();
    assert_eq!(Err(Error::WrongOrder), paths.validate_one(0, None));
    paths.build(None).unwrap();
    assert_eq!(Err(Error::WrongOrder), paths.set_max_depth(3));
    assert_eq!(Err(Error::WrongOrder), paths.set_initial_explicit_policy(0));
    assert_eq!(Err(Error::WrongOrder), paths.set_untrusted_set(None));
    let mut ei = ErrorInfo::new();
    assert_eq!(Err(Error::WrongOrder), paths.build(Some(&mut ei)));
    assert_eq!("Certification paths have already been built", ei.message);
    assert!(paths.validate_one(0, None).is_ok());
}

#[test]
fn shared_handles() {
    let paths = simple_paths();
    let other = paths.clone();
    assert_eq!(2, paths.ref_count());
    let handle = std::thread::spawn(move || {
        other.build(None).unwrap();
        other.validate_all(None).unwrap()
    });
    assert_eq!(1, handle.join().unwrap());
    assert_eq!(1, paths.ref_count());
    assert_eq!(Some(PathValidationStatus::Valid), paths.path_verify_result(0));
}

#[test]
fn settings_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let fname = dir.path().join("settings.json");
    let mut ps = PathSettings::new();
    ps.set_time_of_interest(Some(LATE_TIME));
    std::fs::write(&fname, serde_json::to_vec(&ps).unwrap()).unwrap();

    let settings = read_settings(&fname).unwrap();
    let mut pe = PkiEnvironment::new();
    populate_5280_pki_environment(&mut pe);
    let paths = CertPaths::create_with_settings(
        Arc::new(pe),
        cert(include_bytes!("examples/target.der")),
        settings,
    );
    paths
        .set_trusted_cert(Some(cert(include_bytes!("examples/root.der"))))
        .unwrap();
    paths
        .set_untrusted_array(&[cert(include_bytes!("examples/intermediate.der"))])
        .unwrap();
    paths.build(None).unwrap();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NotValidAtTime)),
        paths.validate_all(None)
    );
}
