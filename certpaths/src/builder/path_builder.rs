//! Discovery of candidate certification paths from a target certificate to trust anchors
//!
//! The builder walks the discovery tree iteratively. At each untrusted node it gathers every
//! certificate whose subject (or directoryName subjectAltName) matches the issuer name of the node
//! from the configured sources, appends those as children and descends into the first one. Trusted
//! nodes and dead ends become leaves. After a leaf is recorded, the walk continues with the next
//! sibling to the right, climbing toward the root as needed.

use alloc::{format, sync::Arc};

use x509_cert::name::Name;

use crate::{
    builder::path_tree::*, cert_matches_subject_or_alt_subject_name, log_message,
    name_to_string, util::error::*, CertificateStore, PDVCertificate, PeLogLevels,
};

/// [`PathBuilder`] gathers the inputs to path discovery. Sources are consulted in the order of the
/// fields below, with trusted sources first.
pub struct PathBuilder<'a> {
    /// Certificate to build paths for
    pub target: &'a Arc<PDVCertificate>,
    /// Single certificate to treat as a trust anchor
    pub trusted_cert: Option<&'a Arc<PDVCertificate>>,
    /// Store of trust anchors
    pub trusted_store: Option<&'a (dyn CertificateStore + Send + Sync)>,
    /// Store of intermediate CA certificates
    pub untrusted_store: Option<&'a (dyn CertificateStore + Send + Sync)>,
    /// Array of intermediate CA certificates
    pub untrusted_array: &'a [Arc<PDVCertificate>],
    /// Certificates from a CMS CertificateSet
    pub untrusted_set: &'a [Arc<PDVCertificate>],
    /// Remove branches that dead end without reaching a trust anchor
    pub eliminate_untrusted_paths: bool,
    /// Nodes at this depth are not expanded
    pub max_depth: u32,
}

impl<'a> PathBuilder<'a> {
    /// Creates a [`PathBuilder`] for the given target with no sources configured
    pub fn new(target: &'a Arc<PDVCertificate>) -> PathBuilder<'a> {
        PathBuilder {
            target,
            trusted_cert: None,
            trusted_store: None,
            untrusted_store: None,
            untrusted_array: &[],
            untrusted_set: &[],
            eliminate_untrusted_paths: false,
            max_depth: crate::PS_MAX_PATH_DEPTH_DEFAULT,
        }
    }

    /// `build` populates an empty [`PathTree`] and returns the number of paths found, i.e., the
    /// number of leaves. Returns WrongOrder if the tree was already built.
    pub fn build(&self, tree: &mut PathTree) -> Result<usize> {
        if tree.is_built() {
            log_message(
                &PeLogLevels::PeError,
                "Certification paths have already been built",
            );
            return Err(Error::WrongOrder);
        }

        let root = tree.set_root(PathNode::from_cert(self.target.clone(), CertSource::Target));

        // a target that is itself trusted yields a single node path
        if let Some(tc) = self.trusted_cert {
            if tc.is_same_cert(self.target) {
                if let Some(n) = tree.node_mut(root) {
                    n.set_source(CertSource::TrustedCert);
                }
            }
        }
        if tree.node(root).map(|n| n.source()) == Some(CertSource::Target)
            && self.is_target_in_trusted_store()
        {
            if let Some(n) = tree.node_mut(root) {
                n.set_source(CertSource::TrustedStore);
            }
        }

        let mut cur = Some(root);
        while let Some(c) = cur {
            let (trusted, issuer) = {
                let node = tree.node(c).ok_or(Error::Internal)?;
                (node.source().is_trusted(), node.issuer().cloned())
            };

            if trusted {
                tree.add_leaf(c)?;
                cur = tree.next_right_up(c);
                continue;
            }

            // self-issued intermediates take the general route below
            match issuer {
                Some(issuer) => self.gather_issuers(tree, c, &issuer)?,
                None => {
                    // nothing to chain from
                    tree.add_leaf(c)?;
                    cur = tree.next_right_up(c);
                    continue;
                }
            }

            let first_child = tree.node(c).and_then(|n| n.children().first().copied());
            cur = match first_child {
                Some(child) => Some(child),
                None if self.eliminate_untrusted_paths => eliminate_path(tree, c)?,
                None => {
                    tree.add_leaf(c)?;
                    tree.next_right_up(c)
                }
            };
        }

        log_message(
            &PeLogLevels::PeDebug,
            format!(
                "Found {} path(s) for {}",
                tree.leaves().len(),
                name_to_string(&self.target.decoded_cert.tbs_certificate.subject)
            )
            .as_str(),
        );
        Ok(tree.leaves().len())
    }

    fn is_target_in_trusted_store(&self) -> bool {
        let store = match self.trusted_store {
            Some(s) => s,
            None => return false,
        };
        let tbs = &self.target.decoded_cert.tbs_certificate;
        match store.find_by_issuer_and_serial(&tbs.issuer, &tbs.serial_number) {
            Ok(Some(ctx)) => match &ctx.cert {
                Some(c) => c.is_same_cert(self.target),
                None => false,
            },
            _ => false,
        }
    }

    /// `gather_issuers` adds a child to `node` for each certificate whose subject matches `issuer`.
    fn gather_issuers(&self, tree: &mut PathTree, node: usize, issuer: &Name) -> Result<()> {
        let depth = tree.node(node).ok_or(Error::Internal)?.depth();
        if depth >= self.max_depth {
            log_message(
                &PeLogLevels::PeWarn,
                format!("Not expanding node at depth {}", depth).as_str(),
            );
            return Ok(());
        }

        log_message(
            &PeLogLevels::PeDebug,
            format!("Gathering issuers named {}", name_to_string(issuer)).as_str(),
        );

        if let Some(tc) = self.trusted_cert {
            if cert_matches_subject_or_alt_subject_name(tc, issuer) {
                add_issuer(
                    tree,
                    node,
                    PathNode::from_cert(tc.clone(), CertSource::TrustedCert),
                )?;
            }
        }

        if let Some(store) = self.trusted_store {
            gather_issuers_from_store(tree, node, issuer, store, CertSource::TrustedStore)?;
        }

        if let Some(store) = self.untrusted_store {
            gather_issuers_from_store(tree, node, issuer, store, CertSource::UntrustedStore)?;
        }

        for cert in self.untrusted_array {
            if cert_matches_subject_or_alt_subject_name(cert, issuer) {
                add_issuer(
                    tree,
                    node,
                    PathNode::from_cert(cert.clone(), CertSource::UntrustedArray),
                )?;
            }
        }

        for cert in self.untrusted_set {
            if cert_matches_subject_or_alt_subject_name(cert, issuer) {
                add_issuer(
                    tree,
                    node,
                    PathNode::from_cert(cert.clone(), CertSource::UntrustedSet),
                )?;
            }
        }
        Ok(())
    }
}

fn gather_issuers_from_store(
    tree: &mut PathTree,
    node: usize,
    issuer: &Name,
    store: &(dyn CertificateStore + Send + Sync),
    source: CertSource,
) -> Result<()> {
    let ctxs = match store.find_by_subject_or_alt_subject_name(issuer) {
        Ok(ctxs) => ctxs,
        Err(e) => {
            log_message(
                &PeLogLevels::PeWarn,
                format!("Failed to search {} for issuers: {}", source, e).as_str(),
            );
            return Ok(());
        }
    };
    for ctx in ctxs {
        // trust anchor information alone is only meaningful from a trusted store
        if ctx.cert.is_some() || (source.is_trusted() && ctx.ta_info.is_some()) {
            add_issuer(tree, node, PathNode::from_ctx(ctx, source))?;
        }
    }
    Ok(())
}

/// `add_issuer` appends `candidate` to the children of `parent` unless the same certificate already
/// appears on the path from `parent` to the root or among the children of `parent`.
fn add_issuer(tree: &mut PathTree, parent: usize, candidate: PathNode) -> Result<()> {
    if candidate.cert().is_some() {
        if let Some(dup) = tree.is_on_path(parent, &candidate) {
            // a trusted copy of the target upgrades the target so single node paths verify
            let upgrade = candidate.source().is_trusted()
                && dup == parent
                && tree.node(parent).map(|n| n.source()) == Some(CertSource::Target);
            if upgrade {
                if let Some(p) = tree.node_mut(parent) {
                    p.set_source(candidate.source());
                }
            }
            return Ok(());
        }
        if tree.is_sibling_dup(parent, &candidate) {
            return Ok(());
        }
    }

    if let Some(subject) = candidate.subject() {
        log_message(
            &PeLogLevels::PeDebug,
            format!(
                "Adding candidate issuer from {}: {}",
                candidate.source(),
                name_to_string(subject)
            )
            .as_str(),
        );
    }
    tree.add_child(parent, candidate)?;
    Ok(())
}

/// `eliminate_path` removes a dead end and every ancestor left childless by its removal, returning
/// the node at which discovery should continue. The root is never removed.
fn eliminate_path(tree: &mut PathTree, node: usize) -> Result<Option<usize>> {
    let mut cur = node;
    loop {
        let parent = match tree.node(cur).ok_or(Error::Internal)?.parent() {
            Some(p) => p,
            None => return Ok(None),
        };

        let next = tree.right_sibling(cur);
        tree.remove_node(cur)?;
        if next.is_some() {
            return Ok(next);
        }

        if !tree.node(parent).ok_or(Error::Internal)?.children().is_empty() {
            return Ok(tree.next_right_up(parent));
        }
        cur = parent;
    }
}

#[cfg(test)]
fn test_cert(enc: &[u8]) -> Arc<PDVCertificate> {
    Arc::new(PDVCertificate::try_from(enc).unwrap())
}

#[test]
fn build_without_sources_test() {
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let builder = PathBuilder::new(&target);
    let mut tree = PathTree::new();
    assert_eq!(1, builder.build(&mut tree).unwrap());
    let leaf = tree.node(tree.leaf(0).unwrap()).unwrap();
    assert_eq!(CertSource::Target, leaf.source());
    assert_eq!(0, leaf.depth());

    // building twice is an error
    assert_eq!(Err(Error::WrongOrder), builder.build(&mut tree));
}

#[test]
fn build_with_array_test() {
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let array = [ca.clone(), ca, root.clone()];

    let mut builder = PathBuilder::new(&target);
    builder.trusted_cert = Some(&root);
    builder.untrusted_array = &array;
    let mut tree = PathTree::new();
    // the duplicate intermediate and the untrusted copy of the root are suppressed
    assert_eq!(1, builder.build(&mut tree).unwrap());
    let leaf = tree.node(tree.leaf(0).unwrap()).unwrap();
    assert_eq!(CertSource::TrustedCert, leaf.source());
    assert_eq!(2, leaf.depth());
}

#[test]
fn eliminate_untrusted_paths_test() {
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let ca_cross = test_cert(include_bytes!("../../tests/examples/intermediate_cross.der"));
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let array = [ca, ca_cross];

    // the cross certificate is issued by a root that is not available
    let mut builder = PathBuilder::new(&target);
    builder.trusted_cert = Some(&root);
    builder.untrusted_array = &array;
    let mut tree = PathTree::new();
    assert_eq!(2, builder.build(&mut tree).unwrap());
    assert!(tree
        .node(tree.leaf(0).unwrap())
        .unwrap()
        .source()
        .is_trusted());
    assert!(!tree
        .node(tree.leaf(1).unwrap())
        .unwrap()
        .source()
        .is_trusted());

    builder.eliminate_untrusted_paths = true;
    let mut tree = PathTree::new();
    assert_eq!(1, builder.build(&mut tree).unwrap());
    assert_eq!(3, tree.len());

    // nothing trusted at all leaves only the root
    let mut builder = PathBuilder::new(&target);
    builder.untrusted_array = &array;
    builder.eliminate_untrusted_paths = true;
    let mut tree = PathTree::new();
    assert_eq!(0, builder.build(&mut tree).unwrap());
    assert_eq!(1, tree.len());
}

#[test]
fn trusted_target_test() {
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let mut builder = PathBuilder::new(&root);
    builder.trusted_cert = Some(&root);
    let mut tree = PathTree::new();
    assert_eq!(1, builder.build(&mut tree).unwrap());
    let leaf = tree.node(tree.leaf(0).unwrap()).unwrap();
    assert_eq!(CertSource::TrustedCert, leaf.source());
    assert_eq!(0, leaf.depth());

    let mut store = crate::CertStore::new();
    store
        .add_encoded_cert(include_bytes!("../../tests/examples/root.der"))
        .unwrap();
    let mut builder = PathBuilder::new(&root);
    builder.trusted_store = Some(&store);
    let mut tree = PathTree::new();
    assert_eq!(1, builder.build(&mut tree).unwrap());
    assert_eq!(
        CertSource::TrustedStore,
        tree.node(tree.leaf(0).unwrap()).unwrap().source()
    );
}

#[test]
fn max_depth_test() {
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let array = [ca];

    let mut builder = PathBuilder::new(&target);
    builder.trusted_cert = Some(&root);
    builder.untrusted_array = &array;
    builder.max_depth = 1;
    let mut tree = PathTree::new();
    assert_eq!(1, builder.build(&mut tree).unwrap());
    let leaf = tree.node(tree.leaf(0).unwrap()).unwrap();
    assert_eq!(CertSource::UntrustedArray, leaf.source());
    assert_eq!(1, leaf.depth());
}
