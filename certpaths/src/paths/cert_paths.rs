//! The cert_paths module provides [`CertPaths`], a shared handle to a set of certification paths
//! discovered for a target certificate along with the configuration used to build and validate
//! them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use certpaths::*;
//!
//! # fn main() -> Result<()> {
//! # let enc_target: Vec<u8> = vec![];
//! # let enc_ca: Vec<u8> = vec![];
//! # let enc_root: Vec<u8> = vec![];
//! let target = Arc::new(PDVCertificate::try_from(enc_target.as_slice())?);
//! let mut trusted = CertStore::new();
//! trusted.add_encoded_cert(&enc_root)?;
//! let ca = Arc::new(PDVCertificate::try_from(enc_ca.as_slice())?);
//!
//! let paths = CertPaths::create(target);
//! paths.set_trusted_store(Some(Arc::new(trusted)))?;
//! paths.set_untrusted_array(&[ca])?;
//! paths.set_valid_time(Some(TimeOfInterest::now()?))?;
//! paths.build(None)?;
//! let valid = paths.validate_all(None)?;
//! # Ok(())
//! # }
//! ```

use alloc::{format, string::String, sync::Arc, vec::Vec};
use core::fmt;
use std::sync::{Mutex, MutexGuard};

use cms::cert::CertificateChoices;
use cms::signed_data::CertificateSet;
use der::asn1::ObjectIdentifier;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::constraints::name::GeneralSubtrees;
use x509_cert::name::Name;

use crate::{
    builder::path_builder::PathBuilder, builder::path_tree::*,
    environment::pki_environment::*, path_dump::dump_path, path_settings::*,
    path_validator::validate_path, util::error::*, util::logging::*,
    util::time_of_interest::TimeOfInterest, CertCtx, CertificateStore, PDVCertificate,
};

/// Shared certificate store handle
pub type SharedCertificateStore = Arc<dyn CertificateStore + Send + Sync>;

/// [`PathInfo`] describes the leaf of one discovered path.
#[derive(Clone, Debug)]
#[readonly::make]
pub struct PathInfo {
    /// True if the leaf is a trust anchor
    pub trusted: bool,
    /// Number of nodes in the path, including the leaf and the target
    pub node_count: u32,
    /// Subject of the leaf certificate or the name from the trust anchor information
    pub subject: Option<Name>,
    /// Public key of the leaf
    pub public_key: Option<SubjectPublicKeyInfoOwned>,
    /// Leaf certificate, absent for trust anchor information without a certificate
    pub cert: Option<PDVCertificate>,
    /// Store context the leaf came from, if any
    pub cert_ctx: Option<Arc<CertCtx>>,
    /// Result of the most recent validation of the path
    pub verify_result: PathValidationStatus,
}

struct CertPathsInner {
    pe: Arc<PkiEnvironment>,
    target: Arc<PDVCertificate>,
    trusted_cert: Option<Arc<PDVCertificate>>,
    trusted_store: Option<SharedCertificateStore>,
    untrusted_store: Option<SharedCertificateStore>,
    untrusted_array: Vec<Arc<PDVCertificate>>,
    untrusted_set: Vec<Arc<PDVCertificate>>,
    settings: PathSettings,
    tree: PathTree,
    status: Option<Error>,
}

/// [`CertPaths`] is a reference-counted handle to a path set. Cloning the handle retains the path
/// set and dropping the last handle releases it.
///
/// Configuration setters fail with [`Error::WrongOrder`] once [`CertPaths::build`] has been called.
/// Calls on one path set are serialized by an internal lock.
#[derive(Clone)]
pub struct CertPaths {
    inner: Arc<Mutex<CertPathsInner>>,
}

impl fmt::Debug for CertPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertPaths")
            .field("ref_count", &self.ref_count())
            .field("path_count", &self.path_count())
            .finish()
    }
}

impl CertPaths {
    /// `create` returns a path set for `target` that uses a [`PkiEnvironment`] prepared by
    /// [`populate_5280_pki_environment`].
    pub fn create(target: Arc<PDVCertificate>) -> CertPaths {
        let mut pe = PkiEnvironment::new();
        populate_5280_pki_environment(&mut pe);
        Self::create_with_environment(Arc::new(pe), target)
    }

    /// `create_with_environment` returns a path set for `target` that uses the given environment.
    pub fn create_with_environment(pe: Arc<PkiEnvironment>, target: Arc<PDVCertificate>) -> CertPaths {
        Self::create_with_settings(pe, target, PathSettings::new())
    }

    /// `create_with_settings` returns a path set for `target` that uses the given environment and
    /// settings.
    pub fn create_with_settings(
        pe: Arc<PkiEnvironment>,
        target: Arc<PDVCertificate>,
        settings: PathSettings,
    ) -> CertPaths {
        CertPaths {
            inner: Arc::new(Mutex::new(CertPathsInner {
                pe,
                target,
                trusted_cert: None,
                trusted_store: None,
                untrusted_store: None,
                untrusted_array: Vec::new(),
                untrusted_set: Vec::new(),
                settings,
                tree: PathTree::new(),
                status: None,
            })),
        }
    }

    /// `create_ex` returns a path set for `target` with the commonly used inputs set.
    pub fn create_ex(
        target: Arc<PDVCertificate>,
        trusted_store: Option<SharedCertificateStore>,
        untrusted_store: Option<SharedCertificateStore>,
        untrusted_array: &[Arc<PDVCertificate>],
        valid_time: Option<TimeOfInterest>,
    ) -> CertPaths {
        let mut settings = PathSettings::new();
        settings.set_time_of_interest(valid_time.map(|t| t.as_unix_secs()));
        let mut pe = PkiEnvironment::new();
        populate_5280_pki_environment(&mut pe);
        let paths = Self::create_with_settings(Arc::new(pe), target, settings);
        if let Ok(mut inner) = paths.inner.lock() {
            inner.trusted_store = trusted_store;
            inner.untrusted_store = untrusted_store;
            inner.untrusted_array = untrusted_array.to_vec();
        }
        paths
    }

    /// Returns the number of handles that share this path set
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn lock(&self) -> Result<MutexGuard<'_, CertPathsInner>> {
        match self.inner.lock() {
            Ok(g) => Ok(g),
            Err(_e) => {
                log_message(&PeLogLevels::PeError, "Certification path set lock is poisoned");
                Err(Error::Internal)
            }
        }
    }

    fn configure<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut CertPathsInner) -> Result<()>,
    {
        let mut inner = self.lock()?;
        if inner.tree.is_built() {
            log_message(
                &PeLogLevels::PeError,
                "Certification path set cannot be configured after paths have been built",
            );
            return Err(Error::WrongOrder);
        }
        f(&mut inner)
    }

    //-------------------------------------------------------------------------
    // Configuration
    //-------------------------------------------------------------------------
    /// `set_trusted_cert` sets a single certificate to treat as a trust anchor.
    pub fn set_trusted_cert(&self, cert: Option<Arc<PDVCertificate>>) -> Result<()> {
        self.configure(|inner| {
            inner.trusted_cert = cert;
            Ok(())
        })
    }

    /// `set_trusted_store` sets the store of trust anchors.
    pub fn set_trusted_store(&self, store: Option<SharedCertificateStore>) -> Result<()> {
        self.configure(|inner| {
            inner.trusted_store = store;
            Ok(())
        })
    }

    /// `set_untrusted_store` sets the store of intermediate CA certificates.
    pub fn set_untrusted_store(&self, store: Option<SharedCertificateStore>) -> Result<()> {
        self.configure(|inner| {
            inner.untrusted_store = store;
            Ok(())
        })
    }

    /// `set_untrusted_array` sets an array of intermediate CA certificates.
    pub fn set_untrusted_array(&self, certs: &[Arc<PDVCertificate>]) -> Result<()> {
        self.configure(|inner| {
            inner.untrusted_array = certs.to_vec();
            Ok(())
        })
    }

    /// `set_untrusted_set` sets intermediate CA certificates from a CMS CertificateSet. Only the
    /// certificate choice is used; other choices are skipped.
    pub fn set_untrusted_set(&self, set: Option<&CertificateSet>) -> Result<()> {
        let mut certs = Vec::new();
        if let Some(set) = set {
            for choice in set.0.iter() {
                match choice {
                    CertificateChoices::Certificate(c) => {
                        certs.push(Arc::new(PDVCertificate::try_from(c.clone())?));
                    }
                    _ => log_message(
                        &PeLogLevels::PeDebug,
                        "Ignoring non-certificate entry in untrusted certificate set",
                    ),
                }
            }
        }
        self.configure(|inner| {
            inner.untrusted_set = certs;
            Ok(())
        })
    }

    /// `set_valid_time` sets the time at which certificates must be valid. Passing None disables
    /// validity checks.
    pub fn set_valid_time(&self, valid_time: Option<TimeOfInterest>) -> Result<()> {
        self.set_valid_time_spec(valid_time.map(|t| t.as_unix_secs()))
    }

    /// `set_valid_time_spec` sets the time at which certificates must be valid as seconds since
    /// the Unix epoch. Passing None disables validity checks.
    pub fn set_valid_time_spec(&self, valid_time: Option<u64>) -> Result<()> {
        self.configure(|inner| {
            inner.settings.set_time_of_interest(valid_time);
            Ok(())
        })
    }

    /// `set_trust_anchor_checks` enables or disables checks on trust anchor certificates.
    pub fn set_trust_anchor_checks(&self, enable: bool) -> Result<()> {
        self.configure(|inner| {
            inner.settings.set_check_trust_anchor(enable);
            Ok(())
        })
    }

    /// `set_eliminate_untrusted_paths` enables or disables removal of paths that do not end in
    /// a trust anchor while building.
    pub fn set_eliminate_untrusted_paths(&self, enable: bool) -> Result<()> {
        self.configure(|inner| {
            inner.settings.set_eliminate_untrusted_paths(enable);
            Ok(())
        })
    }

    /// `set_max_depth` sets the depth beyond which the builder does not look for issuers.
    pub fn set_max_depth(&self, max_depth: u32) -> Result<()> {
        self.configure(|inner| {
            inner.settings.set_max_path_depth(max_depth);
            Ok(())
        })
    }

    /// `set_initial_policy_set` sets the user-initial-policy-set. An empty slice means anyPolicy.
    pub fn set_initial_policy_set(&self, policies: &[ObjectIdentifier]) -> Result<()> {
        self.configure(|inner| {
            inner
                .settings
                .set_initial_policy_set_from_oid_set(&policies.iter().copied().collect());
            Ok(())
        })
    }

    /// `set_initial_explicit_policy` sets the initial explicit_policy value. Zero requires an
    /// acceptable policy be present in every path.
    pub fn set_initial_explicit_policy(&self, v: u32) -> Result<()> {
        self.configure(|inner| {
            inner.settings.set_initial_explicit_policy(v);
            Ok(())
        })
    }

    /// `set_initial_policy_mapping_inhibit` sets the initial policy_mapping value. Zero inhibits
    /// policy mapping.
    pub fn set_initial_policy_mapping_inhibit(&self, v: u32) -> Result<()> {
        self.configure(|inner| {
            inner.settings.set_initial_policy_mapping_inhibit(v);
            Ok(())
        })
    }

    /// `set_initial_inhibit_any_policy` sets the initial inhibit_anyPolicy value. Zero causes
    /// anyPolicy to be ignored.
    pub fn set_initial_inhibit_any_policy(&self, v: u32) -> Result<()> {
        self.configure(|inner| {
            inner.settings.set_initial_inhibit_any_policy(v);
            Ok(())
        })
    }

    /// `set_initial_permitted_subtrees` sets the initial permitted_subtrees value. Each subtree
    /// must omit minimum and maximum, otherwise [`Error::InvalidSubtree`] is returned.
    pub fn set_initial_permitted_subtrees(&self, subtrees: Option<&GeneralSubtrees>) -> Result<()> {
        check_subtrees(subtrees)?;
        self.configure(|inner| inner.settings.set_initial_permitted_subtrees(subtrees))
    }

    /// `set_initial_excluded_subtrees` sets the initial excluded_subtrees value. Each subtree
    /// must omit minimum and maximum, otherwise [`Error::InvalidSubtree`] is returned.
    pub fn set_initial_excluded_subtrees(&self, subtrees: Option<&GeneralSubtrees>) -> Result<()> {
        check_subtrees(subtrees)?;
        self.configure(|inner| inner.settings.set_initial_excluded_subtrees(subtrees))
    }

    /// Returns a copy of the settings in effect
    pub fn settings(&self) -> Result<PathSettings> {
        Ok(self.lock()?.settings.clone())
    }

    //-------------------------------------------------------------------------
    // Building
    //-------------------------------------------------------------------------
    /// `build` discovers the paths from the target to the configured trust anchors and returns the
    /// number of paths found. Paths that dead end without reaching a trust anchor are included
    /// unless elimination of untrusted paths was requested.
    pub fn build(&self, err_info: Option<&mut ErrorInfo>) -> Result<usize> {
        let mut err_info = err_info;
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if inner.tree.is_built() {
            return Err(report_error(
                &mut err_info,
                Error::WrongOrder,
                "Certification paths have already been built",
            ));
        }
        if let Some(e) = inner.status {
            return Err(report_error(
                &mut err_info,
                e,
                format!("Certification path set is in an error state: {}", e).as_str(),
            ));
        }

        let mut pb = PathBuilder::new(&inner.target);
        pb.trusted_cert = inner.trusted_cert.as_ref();
        pb.trusted_store = inner.trusted_store.as_deref();
        pb.untrusted_store = inner.untrusted_store.as_deref();
        pb.untrusted_array = &inner.untrusted_array;
        pb.untrusted_set = &inner.untrusted_set;
        pb.eliminate_untrusted_paths = inner.settings.get_eliminate_untrusted_paths();
        pb.max_depth = inner.settings.get_max_path_depth();

        match pb.build(&mut inner.tree) {
            Ok(count) => Ok(count),
            Err(e) => {
                inner.status = Some(e);
                Err(report_error(
                    &mut err_info,
                    e,
                    format!("Failed to build certification paths: {}", e).as_str(),
                ))
            }
        }
    }

    //-------------------------------------------------------------------------
    // Validation
    //-------------------------------------------------------------------------
    /// `validate_one` validates the path at `index` and saves the result with the path.
    pub fn validate_one(&self, index: usize, err_info: Option<&mut ErrorInfo>) -> Result<()> {
        let mut err_info = err_info;
        let mut inner = self.lock()?;
        inner.check_built(&mut err_info)?;
        if index >= inner.tree.leaves().len() {
            return Err(report_error(
                &mut err_info,
                Error::NotFound,
                format!("Path index {} is out of range", index).as_str(),
            ));
        }
        inner.validate_leaf(index, &mut err_info)
    }

    /// `validate_all` validates every path that ends in a trust anchor and returns the number of
    /// paths that validated. Each path is attempted regardless of earlier failures.
    ///
    /// If no path validates, the failure from the last path attempted is returned or, where no
    /// path ends in a trust anchor, [`PathValidationStatus::NoTrustedPaths`].
    pub fn validate_all(&self, err_info: Option<&mut ErrorInfo>) -> Result<u32> {
        let mut err_info = err_info;
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        inner.check_built(&mut err_info)?;

        let path_count = inner.tree.leaves().len();
        let mut valid = 0;
        let mut last_failure = None;
        for index in 0..path_count {
            let trusted = inner
                .leaf_node(index)
                .map(|n| n.source().is_trusted())
                .unwrap_or(false);
            if !trusted {
                // recorded with the path but not reported to the caller
                let _ = inner.validate_leaf(index, &mut None);
                continue;
            }
            match inner.validate_leaf(index, &mut err_info) {
                Ok(()) => valid += 1,
                Err(e) => last_failure = Some(e),
            }
        }

        if valid > 0 {
            inner.status = None;
            if let Some(ei) = err_info {
                ei.clear();
            }
            return Ok(valid);
        }
        let e = match last_failure {
            Some(e) => e,
            None => report_error(
                &mut err_info,
                Error::PathValidation(PathValidationStatus::NoTrustedPaths),
                format!("None of the {} path(s) have a trust anchor.", path_count).as_str(),
            ),
        };
        inner.status = Some(e);
        Err(e)
    }

    //-------------------------------------------------------------------------
    // Queries
    //-------------------------------------------------------------------------
    /// Returns the number of paths, zero before the paths are built
    pub fn path_count(&self) -> usize {
        self.lock().map(|inner| inner.tree.leaves().len()).unwrap_or(0)
    }

    /// Returns the number of nodes in the path at `index`, including the trust anchor and the
    /// target, or zero if there is no such path.
    pub fn path_length(&self, index: usize) -> u32 {
        match self.lock() {
            Ok(inner) => inner.leaf_node(index).map(|n| n.depth() + 1).unwrap_or(0),
            Err(_e) => 0,
        }
    }

    /// Returns the result of the most recent validation of the path at `index`
    pub fn path_verify_result(&self, index: usize) -> Option<PathValidationStatus> {
        let inner = self.lock().ok()?;
        inner.leaf_node(index).map(|n| n.verify_result)
    }

    /// `query_path_info` returns information about the leaf of the path at `index`.
    pub fn query_path_info(&self, index: usize) -> Result<PathInfo> {
        let inner = self.lock()?;
        let leaf = match inner.leaf_node(index) {
            Some(l) => l,
            None => return Err(Error::NotFound),
        };
        Ok(PathInfo {
            trusted: leaf.source().is_trusted(),
            node_count: leaf.depth() + 1,
            subject: leaf.subject().cloned(),
            public_key: leaf.public_key().cloned(),
            cert: leaf.cert().cloned(),
            cert_ctx: leaf.cert_ctx().cloned(),
            verify_result: leaf.verify_result,
        })
    }

    /// `path_node_cert` returns the certificate at position `node` of the path at `index`. Position
    /// zero is the leaf (usually the trust anchor) and position `path_length(index) - 1` is the
    /// target. Returns None past the end of the path or for a node without a certificate.
    pub fn path_node_cert(&self, index: usize, node: u32) -> Option<PDVCertificate> {
        let inner = self.lock().ok()?;
        let leaf = *inner.tree.leaves().get(index)?;
        let path = inner.tree.ancestors(leaf);
        let id = path.get(node as usize)?;
        inner.tree.node(*id)?.cert().cloned()
    }

    /// Returns the status recorded by the most recent build or validate_all call
    pub fn status(&self) -> Option<Error> {
        self.lock().ok()?.status
    }

    //-------------------------------------------------------------------------
    // Diagnostics
    //-------------------------------------------------------------------------
    /// `dump_one` writes a description of the path at `index` to `out`.
    pub fn dump_one(&self, index: usize, verbosity: u32, out: &mut dyn fmt::Write) -> Result<()> {
        let inner = self.lock()?;
        let leaf = match inner.tree.leaf(index) {
            Some(l) => l,
            None => return Err(Error::NotFound),
        };
        dump_path(&inner.pe, &inner.tree, index, leaf, verbosity, out).map_err(dump_error)
    }

    /// `dump_all` writes a summary line followed by a description of each path to `out`.
    pub fn dump_all(&self, verbosity: u32, out: &mut dyn fmt::Write) -> Result<()> {
        let inner = self.lock()?;
        let status = match inner.status {
            Some(e) => format!("{}", e),
            None => String::from("Ok"),
        };
        writeln!(out, "{} paths, rc={}", inner.tree.leaves().len(), status).map_err(dump_error)?;
        for (index, leaf) in inner.tree.leaves().iter().enumerate() {
            dump_path(&inner.pe, &inner.tree, index, *leaf, verbosity, out).map_err(dump_error)?;
        }
        Ok(())
    }
}

impl CertPathsInner {
    fn check_built(&self, err_info: &mut Option<&mut ErrorInfo>) -> Result<()> {
        if !self.tree.is_built() {
            return Err(report_error(
                err_info,
                Error::WrongOrder,
                "Certification paths must be built before they are validated",
            ));
        }
        Ok(())
    }

    fn leaf_node(&self, index: usize) -> Option<&PathNode> {
        self.tree.leaf(index).and_then(|id| self.tree.node(id))
    }

    fn validate_leaf(&mut self, index: usize, err_info: &mut Option<&mut ErrorInfo>) -> Result<()> {
        let leaf = match self.tree.leaf(index) {
            Some(l) => l,
            None => {
                return Err(report_error(
                    err_info,
                    Error::Internal,
                    format!("Leaf #{} is missing", index).as_str(),
                ))
            }
        };
        let source = match self.tree.node(leaf) {
            Some(n) => n.source(),
            None => {
                return Err(report_error(
                    err_info,
                    Error::Internal,
                    format!("Leaf #{} is not in the tree", index).as_str(),
                ))
            }
        };

        let result = if source.is_trusted() {
            validate_path(&self.pe, &self.settings, &self.tree, leaf, err_info)
        } else {
            Err(report_error(
                err_info,
                Error::PathValidation(PathValidationStatus::MissingTrustAnchor),
                format!("Path #{} does not have a trust anchor: src={}", index, source).as_str(),
            ))
        };

        let status = match result {
            Ok(()) => PathValidationStatus::Valid,
            Err(Error::PathValidation(pvs)) => pvs,
            Err(e) => return Err(e),
        };
        if let Some(node) = self.tree.node_mut(leaf) {
            node.verify_result = status;
        }
        result
    }
}

fn check_subtrees(subtrees: Option<&GeneralSubtrees>) -> Result<()> {
    if let Some(subtrees) = subtrees {
        for st in subtrees {
            crate::check_subtree_validity(st)?;
        }
    }
    Ok(())
}

fn dump_error(_e: fmt::Error) -> Error {
    log_message(&PeLogLevels::PeError, "Failed to write certification path dump");
    Error::Internal
}

#[cfg(test)]
fn test_cert(enc: &[u8]) -> Arc<PDVCertificate> {
    Arc::new(PDVCertificate::try_from(enc).unwrap())
}

#[test]
fn configure_after_build_test() {
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let paths = CertPaths::create(target);
    let copy = paths.clone();
    assert_eq!(2, paths.ref_count());
    drop(copy);
    assert_eq!(1, paths.ref_count());

    assert_eq!(
        Err(Error::WrongOrder),
        paths.validate_all(None).map(|_| ())
    );
    assert_eq!(1, paths.build(None).unwrap());
    assert_eq!(Err(Error::WrongOrder), paths.build(None));
    assert_eq!(Err(Error::WrongOrder), paths.set_valid_time_spec(None));
    assert_eq!(Err(Error::WrongOrder), paths.set_trust_anchor_checks(true));
    assert_eq!(Err(Error::WrongOrder), paths.set_untrusted_array(&[]));
}

#[test]
fn untrusted_only_test() {
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let paths = CertPaths::create(target);
    paths.set_untrusted_array(&[ca]).unwrap();
    assert_eq!(1, paths.build(None).unwrap());
    assert_eq!(2, paths.path_length(0));
    assert_eq!(0, paths.path_length(1));

    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::MissingTrustAnchor
        )),
        paths.validate_one(0, Some(&mut ei))
    );
    assert!(ei.message.starts_with("Path #0 does not have a trust anchor: src="));
    assert_eq!(
        Some(PathValidationStatus::MissingTrustAnchor),
        paths.path_verify_result(0)
    );
    assert_eq!(Err(Error::NotFound), paths.validate_one(1, None));

    let mut ei = ErrorInfo::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::NoTrustedPaths)),
        paths.validate_all(Some(&mut ei))
    );
    assert_eq!("None of the 1 path(s) have a trust anchor.", ei.message);
    assert_eq!(
        Some(Error::PathValidation(PathValidationStatus::NoTrustedPaths)),
        paths.status()
    );
}

#[test]
fn invalid_subtree_setting_test() {
    use x509_cert::ext::pkix::{constraints::name::GeneralSubtree, name::GeneralName};

    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let paths = CertPaths::create(target);
    let subtrees = alloc::vec![GeneralSubtree {
        base: GeneralName::DnsName(der::asn1::Ia5String::new("example.com").unwrap()),
        minimum: 1,
        maximum: None,
    }];
    assert_eq!(
        Err(Error::InvalidSubtree),
        paths.set_initial_permitted_subtrees(Some(&subtrees))
    );
    assert_eq!(
        Err(Error::InvalidSubtree),
        paths.set_initial_excluded_subtrees(Some(&subtrees))
    );
    assert!(paths.settings().unwrap().get_initial_permitted_subtrees().unwrap().is_none());
}
