//! Certification path validation per [RFC 5280 Section 6.1]
//!
//! [`validate_path`] validates the path formed by a leaf of a [`PathTree`] and the ancestors of that
//! leaf. The leaf is the trust anchor and the root of the tree is the target. Certificates are
//! processed in order starting with the certificate issued by the trust anchor, with the policy tree,
//! name constraints and the remaining state variables updated as each certificate is processed.
//!
//! [RFC 5280 Section 6.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1>

use alloc::format;
use alloc::vec::Vec;

use const_oid::db::rfc5280::ANY_POLICY;
use const_oid::db::rfc5912::*;
use der::asn1::{Any, AnyRef, BitString, ObjectIdentifier};
use der::{Decode, Tag, Tagged};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::ext::pkix::KeyUsages;
use x509_cert::name::Name;
use x509_cert::Version;

use crate::{
    builder::path_tree::*, environment::pki_environment::PkiEnvironment,
    name_constraints_set::NameConstraintsState, path_settings::*, pdv_certificate::*,
    pdv_extension::*, policy_tree::PolicyTree, util::error::*, util::logging::*,
    util::pdv_alg_oids::PKIXALG_RSA_ENCRYPTION, util::pdv_utilities::*,
    util::time_of_interest::TimeOfInterest,
};

/// Apple Developer ID Application 1.2.840.113635.100.6.1.13, tolerated when critical
pub const APPLE_CS_DEVID_APPLICATION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113635.100.6.1.13");
/// Apple Developer ID Installer 1.2.840.113635.100.6.1.14, tolerated when critical
pub const APPLE_CS_DEVID_INSTALLER: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113635.100.6.1.14");
/// Apple Developer ID Kext 1.2.840.113635.100.6.1.18, tolerated when critical
pub const APPLE_CS_DEVID_KEXT: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113635.100.6.1.18");
/// Apple iPhone Software Development 1.2.840.113635.100.6.1.2, tolerated when critical
pub const APPLE_CS_IPHONE_SW_DEV: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113635.100.6.1.2");
/// Apple Mac Software Development 1.2.840.113635.100.6.1.12, tolerated when critical
pub const APPLE_CS_MAC_SW_DEV: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113635.100.6.1.12");

/// `KNOWN_CRITICAL_EXTENSIONS` lists the extensions that may be marked critical in a certificate
/// that is being validated.
pub static KNOWN_CRITICAL_EXTENSIONS: &[ObjectIdentifier] = &[
    ID_CE_KEY_USAGE,
    ID_CE_SUBJECT_ALT_NAME,
    ID_CE_ISSUER_ALT_NAME,
    ID_CE_BASIC_CONSTRAINTS,
    ID_CE_NAME_CONSTRAINTS,
    ID_CE_CERTIFICATE_POLICIES,
    ID_CE_POLICY_MAPPINGS,
    ID_CE_POLICY_CONSTRAINTS,
    ID_CE_EXT_KEY_USAGE,
    ID_CE_INHIBIT_ANY_POLICY,
    APPLE_CS_DEVID_APPLICATION,
    APPLE_CS_DEVID_INSTALLER,
    APPLE_CS_DEVID_KEXT,
    APPLE_CS_IPHONE_SW_DEV,
    APPLE_CS_MAC_SW_DEV,
];

/// [`PathValidationState`] holds the state variables described in [RFC 5280 Section 6.1.2] for
/// the path currently being validated.
///
/// [RFC 5280 Section 6.1.2]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.2>
#[derive(Clone, Debug)]
pub struct PathValidationState {
    /// Position of the certificate being processed, 1 being the certificate issued by the trust anchor
    pub node_index: u32,
    /// Number of certificates in the path, excluding the trust anchor
    pub node_count: u32,
    /// explicit_policy
    pub explicit_policy: u32,
    /// policy_mapping
    pub inhibit_policy_mapping: u32,
    /// inhibit_anyPolicy
    pub inhibit_any_policy: u32,
    /// max_path_length
    pub max_path_length: u32,
    /// working_issuer_name
    pub working_issuer_name: Name,
    /// working_public_key_algorithm
    pub working_public_key_algorithm: ObjectIdentifier,
    /// working_public_key_parameters, None when absent or NULL
    pub working_public_key_parameters: Option<Any>,
    /// working_public_key
    pub working_public_key: BitString,
    /// valid_policy_tree
    pub valid_policy_tree: PolicyTree,
    /// permitted_subtrees and excluded_subtrees
    pub name_constraints: NameConstraintsState,
}

impl PathValidationState {
    /// `working_spki` assembles the working public key information into a SubjectPublicKeyInfo
    /// suitable for signature verification.
    pub fn working_spki(&self) -> SubjectPublicKeyInfoOwned {
        let parameters = match &self.working_public_key_parameters {
            Some(p) => Some(p.clone()),
            // rsaEncryption keys carry NULL parameters
            None if self.working_public_key_algorithm == PKIXALG_RSA_ENCRYPTION => {
                Some(Any::from(AnyRef::NULL))
            }
            None => None,
        };
        SubjectPublicKeyInfoOwned {
            algorithm: AlgorithmIdentifierOwned {
                oid: self.working_public_key_algorithm,
                parameters,
            },
            subject_public_key: self.working_public_key.clone(),
        }
    }

    /// `set_working_public_key` updates the working public key information from `spki`.
    ///
    /// Parameters that are present and not NULL replace the working parameters. Otherwise, the
    /// working parameters are retained only if the algorithm is unchanged.
    pub fn set_working_public_key(&mut self, spki: &SubjectPublicKeyInfoOwned) {
        match significant_parameters(spki) {
            Some(p) => self.working_public_key_parameters = Some(p),
            None => {
                if self.working_public_key_algorithm != spki.algorithm.oid {
                    self.working_public_key_parameters = None;
                }
            }
        }
        self.working_public_key_algorithm = spki.algorithm.oid;
        self.working_public_key = spki.subject_public_key.clone();
    }
}

fn significant_parameters(spki: &SubjectPublicKeyInfoOwned) -> Option<Any> {
    spki.algorithm
        .parameters
        .as_ref()
        .filter(|p| p.tag() != Tag::Null)
        .cloned()
}

fn path_failure(
    err_info: &mut Option<&mut ErrorInfo>,
    cert: Option<&PDVCertificate>,
    status: PathValidationStatus,
    msg: &str,
) -> Error {
    match cert {
        Some(c) => log_error_for_ca(c, msg),
        None => log_message(&PeLogLevels::PeError, msg),
    }
    save_error(err_info, Error::PathValidation(status), msg)
}

/// `verify_cert_signature` verifies the signature on `cert` using the given public key. The
/// TBSCertificate is taken from the encoded certificate as is, without re-encoding.
pub fn verify_cert_signature(
    pe: &PkiEnvironment,
    cert: &PDVCertificate,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    let defer_cert = match DeferDecodeSigned::from_der(&cert.encoded_cert) {
        Ok(d) => d,
        Err(e) => {
            log_error_for_ca(cert, format!("failed to defer decode certificate: {}", e).as_str());
            return Err(Error::PathValidation(
                PathValidationStatus::SignatureVerificationFailure,
            ));
        }
    };
    if let Err(e) = pe.verify_signature_message(
        pe,
        &defer_cert.tbs_field,
        defer_cert.signature.raw_bytes(),
        &defer_cert.signature_algorithm,
        spki,
    ) {
        log_error_for_ca(
            cert,
            format!("signature verification error: {:?}", e).as_str(),
        );
        return Err(Error::PathValidation(
            PathValidationStatus::SignatureVerificationFailure,
        ));
    }
    Ok(())
}

/// `validate_path` validates the certification path that starts at the trust anchor represented
/// by `leaf` and ends with the target at the root of `tree`.
///
/// The following values are read from the [`PathSettings`] parameter:
/// - PS_INITIAL_EXPLICIT_POLICY, PS_INITIAL_POLICY_MAPPING_INHIBIT and PS_INITIAL_INHIBIT_ANY_POLICY,
/// - PS_INITIAL_POLICY_SET,
/// - PS_INITIAL_PERMITTED_SUBTREES and PS_INITIAL_EXCLUDED_SUBTREES,
/// - PS_TIME_OF_INTEREST (when absent, validity periods are not checked),
/// - PS_CHECK_TRUST_ANCHOR.
///
/// The caller is responsible for confirming that the leaf is a trust anchor. On failure, the
/// status and a description are saved to `err_info`.
pub fn validate_path(
    pe: &PkiEnvironment,
    cps: &PathSettings,
    tree: &PathTree,
    leaf: NodeId,
    err_info: &mut Option<&mut ErrorInfo>,
) -> Result<()> {
    let mut validator = PathValidator::new(pe, cps, tree, leaf, err_info)?;
    validator.run(err_info)
}

struct PathValidator<'a> {
    pe: &'a PkiEnvironment,
    tree: &'a PathTree,
    /// trust anchor first, target last
    path: Vec<NodeId>,
    toi: Option<TimeOfInterest>,
    check_trust_anchor: bool,
    user_initial_policy_set: Vec<ObjectIdentifier>,
    state: PathValidationState,
}

impl<'a> PathValidator<'a> {
    //-------------------------------------------------------------------------
    // 6.1.2 Initialization
    //-------------------------------------------------------------------------
    fn new(
        pe: &'a PkiEnvironment,
        cps: &PathSettings,
        tree: &'a PathTree,
        leaf: NodeId,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<PathValidator<'a>> {
        let path = tree.ancestors(leaf);
        let ta = match tree.node(leaf) {
            Some(ta) => ta,
            None => {
                return Err(report_error(
                    err_info,
                    Error::Internal,
                    format!("Leaf node {} is not present in the tree", leaf).as_str(),
                ))
            }
        };
        let node_count = ta.depth();
        if path.len() != node_count as usize + 1 {
            return Err(report_error(
                err_info,
                Error::Internal,
                "Path length does not match the depth of the trust anchor",
            ));
        }

        let (working_issuer_name, ta_spki) = match (ta.subject(), ta.public_key()) {
            (Some(name), Some(spki)) => (name.clone(), spki),
            _ => {
                return Err(report_error(
                    err_info,
                    Error::InvalidParameter,
                    "Trust anchor has no name or public key",
                ))
            }
        };

        let mut name_constraints = NameConstraintsState::new();
        if let Some(permitted) = cps.get_initial_permitted_subtrees()? {
            if let Err(e) = name_constraints.add_permitted_subtrees(&permitted) {
                return Err(report_error(
                    err_info,
                    e,
                    "Initial permitted subtrees are not valid",
                ));
            }
        }
        if let Some(excluded) = cps.get_initial_excluded_subtrees()? {
            name_constraints.add_excluded_subtrees(&excluded);
        }

        let state = PathValidationState {
            node_index: 0,
            node_count,
            explicit_policy: cps.get_initial_explicit_policy(),
            inhibit_policy_mapping: cps.get_initial_policy_mapping_inhibit(),
            inhibit_any_policy: cps.get_initial_inhibit_any_policy(),
            max_path_length: node_count,
            working_issuer_name,
            working_public_key_algorithm: ta_spki.algorithm.oid,
            working_public_key_parameters: significant_parameters(ta_spki),
            working_public_key: ta_spki.subject_public_key.clone(),
            valid_policy_tree: PolicyTree::new(node_count as usize),
            name_constraints,
        };

        Ok(PathValidator {
            pe,
            tree,
            path,
            toi: cps.get_time_of_interest_as_toi()?,
            check_trust_anchor: cps.get_check_trust_anchor(),
            user_initial_policy_set: cps.get_initial_policy_set_as_oid_set().into_iter().collect(),
            state,
        })
    }

    fn node(&self, index: usize, err_info: &mut Option<&mut ErrorInfo>) -> Result<&'a PathNode> {
        let tree: &'a PathTree = self.tree;
        match self.path.get(index).and_then(|id| tree.node(*id)) {
            Some(n) => Ok(n),
            None => Err(report_error(
                err_info,
                Error::Internal,
                format!("Path node #{} is missing", index).as_str(),
            )),
        }
    }

    fn run(&mut self, err_info: &mut Option<&mut ErrorInfo>) -> Result<()> {
        let ta = self.node(0, err_info)?;
        self.maybe_check_trust_anchor(ta, err_info)?;

        // a target that is itself the trust anchor needs no further checks
        if self.state.node_count == 0 {
            log_message(
                &PeLogLevels::PeDebug,
                "Target certificate is a trust anchor",
            );
            return Ok(());
        }

        for i in 1..=self.state.node_count {
            self.state.node_index = i;
            let node = self.node(i as usize, err_info)?;
            let cert = match node.cert() {
                Some(c) => c,
                None => {
                    return Err(report_error(
                        err_info,
                        Error::Internal,
                        format!("Node #{} has no certificate", i).as_str(),
                    ))
                }
            };
            let is_target = i == self.state.node_count;
            log_message(
                &PeLogLevels::PeDebug,
                format!(
                    "Processing node #{} of {}: {}",
                    i,
                    self.state.node_count,
                    name_to_string(&cert.decoded_cert.tbs_certificate.subject)
                )
                .as_str(),
            );

            // 6.1.3 Basic Certificate Processing
            self.check_basic_cert_info(cert, err_info)?;

            let self_issued = is_self_issued(&cert.decoded_cert);
            if !self_issued || is_target {
                self.check_name_constraints(cert, err_info)?;
            }

            self.work_valid_policy_tree(cert, self_issued && !is_target, err_info)?;

            if is_target {
                return self.wrap_up(node, cert, err_info);
            }

            // 6.1.4 Preparation for Certificate i+1
            self.soak_up_policy_mappings(cert, err_info)?;
            self.state.working_issuer_name = cert.decoded_cert.tbs_certificate.subject.clone();
            self.state
                .set_working_public_key(&cert.decoded_cert.tbs_certificate.subject_public_key_info);
            self.soak_up_name_constraints(cert, err_info)?;
            if !self_issued {
                //(h)  If certificate i is not self-issued:
                //    (1)  If explicit_policy is not 0, decrement explicit_policy by 1.
                //    (2)  If policy_mapping is not 0, decrement policy_mapping by 1.
                //    (3)  If inhibit_anyPolicy is not 0, decrement inhibit_anyPolicy by 1.
                self.state.explicit_policy = self.state.explicit_policy.saturating_sub(1);
                self.state.inhibit_policy_mapping =
                    self.state.inhibit_policy_mapping.saturating_sub(1);
                self.state.inhibit_any_policy = self.state.inhibit_any_policy.saturating_sub(1);
            }
            self.soak_up_policy_constraints(cert)?;
            self.soak_up_inhibit_any_policy(cert)?;
            self.check_basic_constraints_and_key_usage(cert, self_issued, err_info)?;
            self.check_critical_extensions(node, cert, err_info)?;
        }

        Err(report_error(
            err_info,
            Error::Internal,
            "Path processing ended without reaching the target",
        ))
    }

    //-------------------------------------------------------------------------
    // Checks performed on the trust anchor when enabled
    //-------------------------------------------------------------------------
    fn maybe_check_trust_anchor(
        &self,
        ta: &PathNode,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        if !self.check_trust_anchor {
            return Ok(());
        }
        let cert = match ta.cert() {
            Some(c) => c,
            None => return Ok(()),
        };

        if is_self_issued(&cert.decoded_cert) {
            if let Err(e) = verify_cert_signature(self.pe, cert, &self.state.working_spki()) {
                return Err(save_error(
                    err_info,
                    e,
                    "Trust anchor signature verification failed",
                ));
            }
        }

        self.check_validity(cert, err_info)?;

        if ta.parent().is_some() {
            let tbs = &cert.decoded_cert.tbs_certificate;
            if tbs.version != Version::V3 {
                return Err(path_failure(
                    err_info,
                    Some(cert),
                    PathValidationStatus::NotV3Cert,
                    format!(
                        "Only version 3 TA certificates are supported (Version={})",
                        tbs.version as u8
                    )
                    .as_str(),
                ));
            }
            let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_BASIC_CONSTRAINTS)?;
            if let Some(PDVExtension::BasicConstraints(bc)) = pdv_ext {
                if !bc.ca {
                    return Err(path_failure(
                        err_info,
                        Some(cert),
                        PathValidationStatus::InvalidBasicConstraints,
                        "Trust anchor certificate is not marked as a CA",
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_validity(
        &self,
        cert: &PDVCertificate,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        if let Some(toi) = &self.toi {
            let tbs = &cert.decoded_cert.tbs_certificate;
            if valid_at_time(tbs, toi, true).is_err() {
                return Err(path_failure(
                    err_info,
                    Some(cert),
                    PathValidationStatus::NotValidAtTime,
                    format!(
                        "Certificate is not valid (ValidTime={} Validity=[{}...{}])",
                        toi, tbs.validity.not_before, tbs.validity.not_after
                    )
                    .as_str(),
                ));
            }
        }
        Ok(())
    }

    //-------------------------------------------------------------------------
    // 6.1.3 Basic Certificate Processing
    //-------------------------------------------------------------------------
    fn check_basic_cert_info(
        &self,
        cert: &PDVCertificate,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        //(a)(1)  The signature on the certificate can be verified using
        //        working_public_key_algorithm, the working_public_key, and
        //        the working_public_key_parameters.
        if let Err(e) = verify_cert_signature(self.pe, cert, &self.state.working_spki()) {
            return Err(save_error(
                err_info,
                e,
                format!(
                    "Signature verification failed for node #{}",
                    self.state.node_index
                )
                .as_str(),
            ));
        }

        //(a)(2)  The certificate validity period includes the current time.
        self.check_validity(cert, err_info)?;

        //(a)(4)  The certificate issuer name is the working_issuer_name.
        if !compare_names(
            &cert.decoded_cert.tbs_certificate.issuer,
            &self.state.working_issuer_name,
        ) {
            return Err(path_failure(
                err_info,
                Some(cert),
                PathValidationStatus::NameChainingFailure,
                "Issuer mismatch",
            ));
        }
        Ok(())
    }

    fn check_name_constraints(
        &self,
        cert: &PDVCertificate,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        let nc = &self.state.name_constraints;
        if nc.no_permitted_names() {
            return Err(path_failure(
                err_info,
                Some(cert),
                PathValidationStatus::NoPermittedNames,
                "No permitted subtrees",
            ));
        }

        //(b)  If certificate i is self-issued and it is not the final
        //     certificate in the path, skip this step for certificate i.
        //     Otherwise, verify that the subject name is within one of the
        //     permitted_subtrees for X.500 distinguished names, and verify
        //     that each of the alternative names in the subjectAltName
        //     extension (critical or non-critical) is within one of the
        //     permitted_subtrees for that name type.
        //(c)  ... verify that the subject name is not within any of the
        //     excluded_subtrees for X.500 distinguished names, and verify
        //     that each of the alternative names in the subjectAltName
        //     extension (critical or non-critical) is not within any of the
        //     excluded_subtrees for that name type.
        let subject = &cert.decoded_cert.tbs_certificate.subject;
        if !subject.0.is_empty() && (!nc.is_name_permitted(subject) || nc.is_name_excluded(subject))
        {
            return Err(path_failure(
                err_info,
                Some(cert),
                PathValidationStatus::NameNotPermitted,
                "Subject name is not permitted by current name constraints",
            ));
        }

        let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_SUBJECT_ALT_NAME)?;
        if let Some(PDVExtension::SubjectAltName(san)) = pdv_ext {
            for (i, gn) in san.0.iter().enumerate().rev() {
                if !nc.is_general_name_permitted(gn) || nc.is_general_name_excluded(gn) {
                    return Err(path_failure(
                        err_info,
                        Some(cert),
                        PathValidationStatus::AltNameNotPermitted,
                        format!(
                            "Alternative name #{} is not permitted by current name constraints",
                            i
                        )
                        .as_str(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn work_valid_policy_tree(
        &mut self,
        cert: &PDVCertificate,
        self_issued_intermediate: bool,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        //(d)  If the certificate policies extension is present in the
        //     certificate and the valid_policy_tree is not NULL, process
        //     the policy information ...
        //(e)  If the certificate policies extension is not present, set the
        //     valid_policy_tree to NULL.
        let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_CERTIFICATE_POLICIES)?;
        let cps = match pdv_ext {
            Some(PDVExtension::CertificatePolicies(cps)) => Some(cps),
            _ => None,
        };
        self.state.valid_policy_tree.process_certificate_policies(
            self.state.node_index as usize,
            cps,
            self.state.inhibit_any_policy,
            self_issued_intermediate,
        );

        //(f)  Verify that either explicit_policy is greater than 0 or the
        //     valid_policy_tree is not equal to NULL;
        if self.state.valid_policy_tree.is_null() && self.state.explicit_policy == 0 {
            return Err(path_failure(
                err_info,
                Some(cert),
                PathValidationStatus::NullPolicySet,
                "An explicit policy is called for but the valid policy tree is NULL.",
            ));
        }
        Ok(())
    }

    //-------------------------------------------------------------------------
    // 6.1.4 Preparation for Certificate i+1
    //-------------------------------------------------------------------------
    fn soak_up_policy_mappings(
        &mut self,
        cert: &PDVCertificate,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_POLICY_MAPPINGS)?;
        let mappings = match pdv_ext {
            Some(PDVExtension::PolicyMappings(pm)) => pm,
            _ => return Ok(()),
        };

        //(a)  If a policy mappings extension is present, verify that the
        //     special value anyPolicy does not appear as an
        //     issuerDomainPolicy or a subjectDomainPolicy.
        for (i, mapping) in mappings.0.iter().enumerate() {
            let which = if mapping.issuer_domain_policy == ANY_POLICY {
                "IssuerDomainPolicy"
            } else if mapping.subject_domain_policy == ANY_POLICY {
                "SubjectDomainPolicy"
            } else {
                continue;
            };
            return Err(path_failure(
                err_info,
                Some(cert),
                PathValidationStatus::InvalidPolicyMapping,
                format!("Invalid policy mapping {}: {} is anyPolicy.", i, which).as_str(),
            ));
        }

        //(b)  If a policy mappings extension is present, then for each
        //     issuerDomainPolicy ID-P in the policy mappings extension ...
        self.state.valid_policy_tree.apply_policy_mappings(
            self.state.node_index as usize,
            mappings,
            self.state.inhibit_policy_mapping,
        );
        Ok(())
    }

    fn soak_up_name_constraints(
        &mut self,
        cert: &PDVCertificate,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_NAME_CONSTRAINTS)?;
        let nc = match pdv_ext {
            Some(PDVExtension::NameConstraints(nc)) => nc,
            _ => return Ok(()),
        };

        //(g)  If a name constraints extension is included in the certificate,
        //     modify the permitted_subtrees and excluded_subtrees state
        //     variables as follows:
        //     (1)  If permittedSubtrees is present in the certificate, set the
        //          permitted_subtrees state variable to the intersection of its
        //          previous value and the value indicated in the extension field.
        if let Some(permitted) = &nc.permitted_subtrees {
            if !permitted.is_empty() {
                if let Err(e) = self
                    .state
                    .name_constraints
                    .intersect_permitted_subtrees(permitted)
                {
                    log_error_for_ca(cert, "invalid permitted subtrees");
                    return Err(save_error(
                        err_info,
                        e,
                        format!("Node #{} has invalid permitted subtrees", self.state.node_index)
                            .as_str(),
                    ));
                }
            }
        }

        //     (2)  If excludedSubtrees is present in the certificate, set the
        //          excluded_subtrees state variable to the union of its previous
        //          value and the value indicated in the extension field.
        if let Some(excluded) = &nc.excluded_subtrees {
            if !excluded.is_empty() {
                self.state.name_constraints.add_excluded_subtrees(excluded);
            }
        }
        Ok(())
    }

    fn soak_up_policy_constraints(&mut self, cert: &PDVCertificate) -> Result<()> {
        let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_POLICY_CONSTRAINTS)?;
        if let Some(PDVExtension::PolicyConstraints(pc)) = pdv_ext {
            //(i)  If a policy constraints extension is included in the
            //     certificate, modify the explicit_policy and policy_mapping
            //     state variables as follows:
            //     (1)  If requireExplicitPolicy is present and is less than
            //          explicit_policy, set explicit_policy to the value of
            //          requireExplicitPolicy.
            if let Some(rep) = pc.require_explicit_policy {
                self.state.explicit_policy = self.state.explicit_policy.min(rep);
            }
            //     (2)  If inhibitPolicyMapping is present and is less than
            //          policy_mapping, set policy_mapping to the value of
            //          inhibitPolicyMapping.
            if let Some(ipm) = pc.inhibit_policy_mapping {
                self.state.inhibit_policy_mapping = self.state.inhibit_policy_mapping.min(ipm);
            }
        }
        Ok(())
    }

    fn soak_up_inhibit_any_policy(&mut self, cert: &PDVCertificate) -> Result<()> {
        //(j)  If the inhibitAnyPolicy extension is included in the
        //     certificate and is less than inhibit_anyPolicy, set
        //     inhibit_anyPolicy to the value of inhibitAnyPolicy.
        let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_INHIBIT_ANY_POLICY)?;
        if let Some(PDVExtension::InhibitAnyPolicy(iap)) = pdv_ext {
            self.state.inhibit_any_policy = self.state.inhibit_any_policy.min(iap.0);
        }
        Ok(())
    }

    fn check_basic_constraints_and_key_usage(
        &mut self,
        cert: &PDVCertificate,
        self_issued: bool,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        let i = self.state.node_index;
        let tbs = &cert.decoded_cert.tbs_certificate;
        if tbs.version != Version::V3 {
            return Err(path_failure(
                err_info,
                Some(cert),
                PathValidationStatus::NotV3Cert,
                format!(
                    "Only version 3 certificates are supported (Version={})",
                    tbs.version as u8
                )
                .as_str(),
            ));
        }

        //(k)  If certificate i is a version 3 certificate, verify that the
        //     basicConstraints extension is present and that cA is set to
        //     TRUE.
        let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_BASIC_CONSTRAINTS)?;
        let bc = match pdv_ext {
            Some(PDVExtension::BasicConstraints(bc)) => Some(bc),
            _ => None,
        };
        if let Some(bc) = bc {
            if !bc.ca {
                return Err(path_failure(
                    err_info,
                    Some(cert),
                    PathValidationStatus::InvalidBasicConstraints,
                    format!("Intermediate certificate (#{}) is not marked as a CA", i).as_str(),
                ));
            }
        }

        //(l)  If the certificate was not self-issued, verify that
        //     max_path_length is greater than zero and decrement
        //     max_path_length by 1.
        if !self_issued {
            if self.state.max_path_length == 0 {
                return Err(path_failure(
                    err_info,
                    Some(cert),
                    PathValidationStatus::InvalidPathLength,
                    format!("Hit max path length at node #{}", i).as_str(),
                ));
            }
            self.state.max_path_length -= 1;
        }

        //(m)  If pathLenConstraint is present in the certificate and is
        //     less than max_path_length, set max_path_length to the value
        //     of pathLenConstraint.
        if let Some(pl) = bc.and_then(|bc| bc.path_len_constraint) {
            self.state.max_path_length = self.state.max_path_length.min(pl as u32);
        }

        //(n)  If a key usage extension is present, verify that the
        //     keyCertSign bit is set.
        let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_KEY_USAGE)?;
        if let Some(PDVExtension::KeyUsage(ku)) = pdv_ext {
            if !ku.0.contains(KeyUsages::KeyCertSign) {
                return Err(path_failure(
                    err_info,
                    Some(cert),
                    PathValidationStatus::InvalidKeyUsage,
                    format!(
                        "Node #{} does not have KeyCertSign set (keyUsage={:#x})",
                        i,
                        ku.0.bits()
                    )
                    .as_str(),
                ));
            }
        }
        Ok(())
    }

    //(o)  Recognize and process any other critical extension present in
    //     the certificate.
    fn check_critical_extensions(
        &self,
        node: &PathNode,
        cert: &PDVCertificate,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        if let Some(exts) = &cert.decoded_cert.tbs_certificate.extensions {
            for ext in exts.iter().filter(|e| e.critical) {
                if KNOWN_CRITICAL_EXTENSIONS.contains(&ext.extn_id) {
                    continue;
                }
                if ext.extn_id == ID_CE_SUBJECT_KEY_IDENTIFIER
                    && node.source() == CertSource::Target
                {
                    log_message(
                        &PeLogLevels::PeInfo,
                        "Ignoring non-standard subjectKeyIdentifier on target certificate",
                    );
                    continue;
                }
                return Err(path_failure(
                    err_info,
                    Some(cert),
                    PathValidationStatus::UnprocessedCriticalExtension,
                    format!(
                        "Node #{} has an unknown critical extension: {}",
                        self.state.node_index, ext.extn_id
                    )
                    .as_str(),
                ));
            }
        }
        Ok(())
    }

    //-------------------------------------------------------------------------
    // 6.1.5 Wrap-Up Procedure
    //-------------------------------------------------------------------------
    fn wrap_up(
        &mut self,
        node: &PathNode,
        cert: &PDVCertificate,
        err_info: &mut Option<&mut ErrorInfo>,
    ) -> Result<()> {
        //(a)  If explicit_policy is not 0, decrement explicit_policy by 1.
        self.state.explicit_policy = self.state.explicit_policy.saturating_sub(1);

        //(b)  If a policy constraints extension is included in the
        //     certificate and requireExplicitPolicy is present and has a
        //     value of 0, set the explicit_policy state variable to 0.
        let pdv_ext: Option<&PDVExtension> = cert.get_extension(&ID_CE_POLICY_CONSTRAINTS)?;
        if let Some(PDVExtension::PolicyConstraints(pc)) = pdv_ext {
            if pc.require_explicit_policy == Some(0) {
                self.state.explicit_policy = 0;
            }
        }

        //(c)-(e) working_public_key, working_public_key_parameters and
        //        working_public_key_algorithm
        self.state
            .set_working_public_key(&cert.decoded_cert.tbs_certificate.subject_public_key_info);

        //(f)  Recognize and process any other critical extension present in
        //     the certificate n.
        self.check_critical_extensions(node, cert, err_info)?;

        //(g)  Calculate the intersection of the valid_policy_tree and the
        //     user-initial-policy-set
        self.state
            .valid_policy_tree
            .intersect(&self.user_initial_policy_set);

        if self.state.explicit_policy == 0 && self.state.valid_policy_tree.is_null() {
            return Err(path_failure(
                err_info,
                Some(cert),
                PathValidationStatus::NullPolicySet,
                "No valid policy (wrap-up).",
            ));
        }

        log_message(
            &PeLogLevels::PeDebug,
            format!(
                "Successfully validated path with {} certificate(s) below the trust anchor",
                self.state.node_count
            )
            .as_str(),
        );
        Ok(())
    }
}

#[cfg(test)]
fn test_cert(enc: &[u8]) -> alloc::sync::Arc<PDVCertificate> {
    alloc::sync::Arc::new(PDVCertificate::try_from(enc).unwrap())
}

#[cfg(test)]
fn test_pe() -> PkiEnvironment {
    let mut pe = PkiEnvironment::new();
    crate::populate_5280_pki_environment(&mut pe);
    pe
}

// 2025-01-01T00:00:00Z
#[cfg(test)]
const TEST_TIME: u64 = 1735689600;

#[cfg(test)]
fn build_single(
    target: &alloc::sync::Arc<PDVCertificate>,
    trusted: &alloc::sync::Arc<PDVCertificate>,
    intermediates: &[alloc::sync::Arc<PDVCertificate>],
) -> PathTree {
    use crate::PathBuilder;
    let mut tree = PathTree::new();
    let mut pb = PathBuilder::new(target);
    pb.trusted_cert = Some(trusted);
    pb.untrusted_array = intermediates;
    pb.build(&mut tree).unwrap();
    tree
}

#[test]
fn validate_simple_chain_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let leaf = tree.leaf(0).unwrap();
    assert!(tree.node(leaf).unwrap().source().is_trusted());

    let mut cps = PathSettings::new();
    cps.set_time_of_interest(Some(TEST_TIME));
    cps.set_check_trust_anchor(true);
    let mut ei = ErrorInfo::new();
    validate_path(&pe, &cps, &tree, leaf, &mut Some(&mut ei)).unwrap();
    assert!(ei.error.is_none());

    // no time of interest means no validity checks
    let cps = PathSettings::new();
    assert!(validate_path(&pe, &cps, &tree, leaf, &mut None).is_ok());
}

#[test]
fn validate_expired_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let leaf = tree.leaf(0).unwrap();

    // 2041-01-01, after every certificate in the chain has expired
    let mut cps = PathSettings::new();
    cps.set_time_of_interest(Some(2240524800));
    let mut ei = ErrorInfo::new();
    let r = validate_path(&pe, &cps, &tree, leaf, &mut Some(&mut ei));
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NotValidAtTime)),
        r
    );
    assert!(ei.message.starts_with("Certificate is not valid (ValidTime="));

    // the trust anchor check reports the same condition before any node is processed
    cps.set_check_trust_anchor(true);
    let r = validate_path(&pe, &cps, &tree, leaf, &mut None);
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NotValidAtTime)),
        r
    );
}

#[test]
fn validate_forged_signature_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/forged_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let leaf = tree.leaf(0).unwrap();
    let mut ei = ErrorInfo::new();
    let r = validate_path(&pe, &PathSettings::new(), &tree, leaf, &mut Some(&mut ei));
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::SignatureVerificationFailure
        )),
        r
    );
    assert_eq!("Signature verification failed for node #2", ei.message);
}

#[test]
fn validate_name_constraints_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/nc_intermediate.der"));
    let cps = PathSettings::new();

    let target = test_cert(include_bytes!("../../tests/examples/nc_target.der"));
    let tree = build_single(&target, &root, &[ca.clone()]);
    let r = validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut None);
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NameNotPermitted)),
        r
    );

    let target = test_cert(include_bytes!("../../tests/examples/nc_san_target.der"));
    let tree = build_single(&target, &root, &[ca.clone()]);
    let mut ei = ErrorInfo::new();
    let r = validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut Some(&mut ei));
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::AltNameNotPermitted
        )),
        r
    );
    assert_eq!(
        "Alternative name #0 is not permitted by current name constraints",
        ei.message
    );

    let target = test_cert(include_bytes!("../../tests/examples/nc_ok_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    assert!(validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut None).is_ok());
}

#[test]
fn validate_initial_subtrees_test() {
    use core::str::FromStr;
    use x509_cert::ext::pkix::{constraints::name::GeneralSubtree, name::GeneralName};

    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let leaf = tree.leaf(0).unwrap();

    let other_org = alloc::vec![GeneralSubtree {
        base: GeneralName::DirectoryName(Name::from_str("O=Other Org,C=US").unwrap()),
        minimum: 0,
        maximum: None,
    }];
    let mut cps = PathSettings::new();
    cps.set_initial_permitted_subtrees(Some(&other_org)).unwrap();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NameNotPermitted)),
        validate_path(&pe, &cps, &tree, leaf, &mut None)
    );

    let our_org = alloc::vec![GeneralSubtree {
        base: GeneralName::DirectoryName(Name::from_str("O=Certpaths Test,C=US").unwrap()),
        minimum: 0,
        maximum: None,
    }];
    let mut cps = PathSettings::new();
    cps.set_initial_permitted_subtrees(Some(&our_org)).unwrap();
    assert!(validate_path(&pe, &cps, &tree, leaf, &mut None).is_ok());

    let mut cps = PathSettings::new();
    cps.set_initial_excluded_subtrees(Some(&our_org)).unwrap();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NameNotPermitted)),
        validate_path(&pe, &cps, &tree, leaf, &mut None)
    );
}

#[test]
fn validate_policy_mapping_test() {
    use alloc::collections::BTreeSet;

    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/map_intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/map_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let leaf = tree.leaf(0).unwrap();

    // the mapping CA asserts 1.1 and maps it to 2.1, which the target asserts
    let mut cps = PathSettings::new();
    assert!(validate_path(&pe, &cps, &tree, leaf, &mut None).is_ok());

    let mut user_set = BTreeSet::new();
    user_set.insert(ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.1"));
    cps.set_initial_policy_set_from_oid_set(&user_set);
    assert!(validate_path(&pe, &cps, &tree, leaf, &mut None).is_ok());

    let mut user_set = BTreeSet::new();
    user_set.insert(ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.2.1"));
    cps.set_initial_policy_set_from_oid_set(&user_set);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NullPolicySet)),
        validate_path(&pe, &cps, &tree, leaf, &mut Some(&mut ei))
    );
    assert_eq!("No valid policy (wrap-up).", ei.message);

    // with mapping inhibited the mapped node is deleted and requireExplicitPolicy=0 bites
    let mut cps = PathSettings::new();
    cps.set_initial_policy_mapping_inhibit(0);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NullPolicySet)),
        validate_path(&pe, &cps, &tree, leaf, &mut Some(&mut ei))
    );
    assert_eq!(
        "An explicit policy is called for but the valid policy tree is NULL.",
        ei.message
    );
}

#[test]
fn validate_any_policy_mapping_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/anymap_intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/anymap_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::InvalidPolicyMapping
        )),
        validate_path(
            &pe,
            &PathSettings::new(),
            &tree,
            tree.leaf(0).unwrap(),
            &mut Some(&mut ei)
        )
    );
    assert_eq!(
        "Invalid policy mapping 0: SubjectDomainPolicy is anyPolicy.",
        ei.message
    );
}

#[test]
fn validate_intermediate_policy_constraints_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let cps = PathSettings::new();

    // inhibitAnyPolicy=0 in the CA stops anyPolicy in the target from matching
    let ca = test_cert(include_bytes!("../../tests/examples/inhany_intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/inhany_target.der"));
    let tree = build_single(&target, &root, &[ca.clone()]);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NullPolicySet)),
        validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut Some(&mut ei))
    );
    assert_eq!(
        "An explicit policy is called for but the valid policy tree is NULL.",
        ei.message
    );

    // a specific policy still matches the anyPolicy node asserted by the CA
    let target = test_cert(include_bytes!("../../tests/examples/inhany_p11_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    assert!(validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut None).is_ok());

    // inhibitPolicyMapping=0 in the top CA deletes the mapped policy in the CA below it
    let ca = test_cert(include_bytes!("../../tests/examples/inhmap_intermediate.der"));
    let sub_ca = test_cert(include_bytes!("../../tests/examples/inhmap_sub_ca.der"));
    let target = test_cert(include_bytes!("../../tests/examples/inhmap_target.der"));
    let tree = build_single(&target, &root, &[ca, sub_ca]);
    let leaf = tree.leaf(0).unwrap();
    assert_eq!(3, tree.node(leaf).unwrap().depth());
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NullPolicySet)),
        validate_path(&pe, &cps, &tree, leaf, &mut Some(&mut ei))
    );
    assert_eq!(
        "An explicit policy is called for but the valid policy tree is NULL.",
        ei.message
    );
}

#[test]
fn validate_policy_intersection_test() {
    use alloc::collections::BTreeSet;

    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/pol_intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/pol_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let leaf = tree.leaf(0).unwrap();

    let mut cps = PathSettings::new();
    let mut user_set = BTreeSet::new();
    user_set.insert(ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.1"));
    cps.set_initial_policy_set_from_oid_set(&user_set);
    assert!(validate_path(&pe, &cps, &tree, leaf, &mut None).is_ok());

    let mut user_set = BTreeSet::new();
    user_set.insert(ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.2"));
    cps.set_initial_policy_set_from_oid_set(&user_set);
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NullPolicySet)),
        validate_path(&pe, &cps, &tree, leaf, &mut None)
    );

    // a chain without certificate policies fails once an explicit policy is required
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let mut cps = PathSettings::new();
    cps.set_initial_explicit_policy(0);
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NullPolicySet)),
        validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut None)
    );
}

#[test]
fn validate_basic_constraints_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let cps = PathSettings::new();

    let ca = test_cert(include_bytes!("../../tests/examples/notca_intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/notca_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::InvalidBasicConstraints
        )),
        validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut Some(&mut ei))
    );
    assert_eq!("Intermediate certificate (#1) is not marked as a CA", ei.message);

    let ca = test_cert(include_bytes!("../../tests/examples/pathlen0_intermediate.der"));
    let sub_ca = test_cert(include_bytes!("../../tests/examples/pathlen_sub_ca.der"));
    let target = test_cert(include_bytes!("../../tests/examples/pathlen_target.der"));
    let tree = build_single(&target, &root, &[ca, sub_ca]);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::InvalidPathLength)),
        validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut Some(&mut ei))
    );
    assert_eq!("Hit max path length at node #2", ei.message);
}

#[test]
fn validate_critical_extension_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/critext_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::UnprocessedCriticalExtension
        )),
        validate_path(
            &pe,
            &PathSettings::new(),
            &tree,
            tree.leaf(0).unwrap(),
            &mut Some(&mut ei)
        )
    );
    assert_eq!(
        "Node #2 has an unknown critical extension: 1.3.6.1.4.1.55555.9",
        ei.message
    );

    // Apple code signing extensions may be critical
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/apple_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    assert!(validate_path(&pe, &PathSettings::new(), &tree, tree.leaf(0).unwrap(), &mut None).is_ok());
}

#[test]
fn validate_critical_skid_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let cps = PathSettings::new();

    // tolerated on the target
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/critskid_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    assert!(validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut None).is_ok());

    // rejected on an intermediate
    let ca = test_cert(include_bytes!("../../tests/examples/critskid_intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/critskid_ca_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::UnprocessedCriticalExtension
        )),
        validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut Some(&mut ei))
    );
    assert_eq!(
        "Node #1 has an unknown critical extension: 2.5.29.14",
        ei.message
    );
}

#[test]
fn validate_key_usage_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/noku_intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/noku_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::InvalidKeyUsage)),
        validate_path(
            &pe,
            &PathSettings::new(),
            &tree,
            tree.leaf(0).unwrap(),
            &mut Some(&mut ei)
        )
    );
    assert!(ei.message.starts_with("Node #1 does not have KeyCertSign set"));
}

#[test]
fn validate_version_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/v1_root.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/v1_intermediate.der"));
    let target = test_cert(include_bytes!("../../tests/examples/v1_target.der"));
    let tree = build_single(&target, &root, &[ca]);
    let leaf = tree.leaf(0).unwrap();
    assert!(tree.node(leaf).unwrap().source().is_trusted());

    let mut cps = PathSettings::new();
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NotV3Cert)),
        validate_path(&pe, &cps, &tree, leaf, &mut Some(&mut ei))
    );
    assert_eq!(
        "Only version 3 certificates are supported (Version=0)",
        ei.message
    );

    cps.set_check_trust_anchor(true);
    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NotV3Cert)),
        validate_path(&pe, &cps, &tree, leaf, &mut Some(&mut ei))
    );
    assert_eq!(
        "Only version 3 TA certificates are supported (Version=0)",
        ei.message
    );
}

#[test]
fn validate_ec_chain_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/ec_root.der"));
    let target = test_cert(include_bytes!("../../tests/examples/ec_target.der"));
    let tree = build_single(&target, &root, &[]);
    let mut cps = PathSettings::new();
    cps.set_time_of_interest(Some(TEST_TIME));
    cps.set_check_trust_anchor(true);
    assert!(validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut None).is_ok());

    // ecdsa-with-SHA384 from the same P-256 root
    let target = test_cert(include_bytes!("../../tests/examples/ec_sha384_target.der"));
    let tree = build_single(&target, &root, &[]);
    assert!(validate_path(&pe, &cps, &tree, tree.leaf(0).unwrap(), &mut None).is_ok());
}

#[test]
fn validate_trusted_target_test() {
    let pe = test_pe();
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let tree = build_single(&root, &root, &[]);
    assert_eq!(1, tree.leaves().len());
    let leaf = tree.leaf(0).unwrap();
    assert_eq!(0, tree.node(leaf).unwrap().depth());

    let mut cps = PathSettings::new();
    // outside the validity period, but trust anchor checks are off
    cps.set_time_of_interest(Some(2240524800));
    assert!(validate_path(&pe, &cps, &tree, leaf, &mut None).is_ok());
}

#[test]
fn working_public_key_test() {
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let ec_root = test_cert(include_bytes!("../../tests/examples/ec_root.der"));
    let rsa_spki = &root.decoded_cert.tbs_certificate.subject_public_key_info;
    let ec_spki = &ec_root.decoded_cert.tbs_certificate.subject_public_key_info;

    let mut state = PathValidationState {
        node_index: 0,
        node_count: 1,
        explicit_policy: u32::MAX,
        inhibit_policy_mapping: u32::MAX,
        inhibit_any_policy: u32::MAX,
        max_path_length: 1,
        working_issuer_name: Name::default(),
        working_public_key_algorithm: ec_spki.algorithm.oid,
        working_public_key_parameters: significant_parameters(ec_spki),
        working_public_key: ec_spki.subject_public_key.clone(),
        valid_policy_tree: PolicyTree::new(1),
        name_constraints: NameConstraintsState::new(),
    };
    assert!(state.working_public_key_parameters.is_some());

    // NULL parameters with a different algorithm clear the named curve
    state.set_working_public_key(rsa_spki);
    assert!(state.working_public_key_parameters.is_none());
    assert_eq!(PKIXALG_RSA_ENCRYPTION, state.working_public_key_algorithm);
    assert_eq!(*rsa_spki, state.working_spki());

    // parameters that are present replace the working parameters
    state.set_working_public_key(ec_spki);
    assert_eq!(*ec_spki, state.working_spki());
}
