//! Arena-backed discovery tree produced by the path builder
//!
//! The root of the tree is the target certificate. Each child of a node is a candidate issuer of
//! the certificate represented by the node. Terminal nodes, whether trust anchors or dead ends,
//! are recorded in a leaf list ordered by source priority then depth, so leaf 0 is the most
//! promising path.

use alloc::{sync::Arc, vec::Vec};
use core::fmt;

use spki::SubjectPublicKeyInfoOwned;
use x509_cert::name::Name;

use crate::{util::error::*, CertCtx, PDVCertificate};

/// Index of a node in a [`PathTree`]
pub type NodeId = usize;

/// [`CertSource`] identifies where a certificate in the discovery tree came from. Variants are
/// ordered by ascending trust, so comparisons express priority.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum CertSource {
    /// The target certificate
    Target = 1,
    /// The untrusted certificate set
    UntrustedSet,
    /// The untrusted certificate array
    UntrustedArray,
    /// The untrusted certificate store
    UntrustedStore,
    /// The trusted certificate store
    TrustedStore,
    /// The single trusted certificate
    TrustedCert,
}

impl CertSource {
    /// Returns true for sources whose certificates are trust anchors
    pub fn is_trusted(&self) -> bool {
        *self >= CertSource::TrustedStore
    }

    /// Returns the name used for the source in diagnostic output
    pub fn name(&self) -> &'static str {
        match self {
            CertSource::Target => "target",
            CertSource::UntrustedSet => "untrusted_set",
            CertSource::UntrustedArray => "untrusted_array",
            CertSource::UntrustedStore => "untrusted_store",
            CertSource::TrustedStore => "trusted_store",
            CertSource::TrustedCert => "trusted_cert",
        }
    }
}

impl fmt::Display for CertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// [`PathNode`] is a certificate, or trust anchor information, placed in the discovery tree.
#[derive(Clone, Debug)]
pub struct PathNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    depth: u32,
    source: CertSource,
    is_leaf: bool,
    /// Result of the most recent validation of the path ending at this node. Only meaningful for
    /// leaves.
    pub verify_result: PathValidationStatus,
    cert: Option<Arc<PDVCertificate>>,
    cert_ctx: Option<Arc<CertCtx>>,
}

impl PathNode {
    /// `from_cert` creates a node for a directly supplied certificate.
    pub fn from_cert(cert: Arc<PDVCertificate>, source: CertSource) -> PathNode {
        PathNode {
            parent: None,
            children: Vec::new(),
            depth: 0,
            source,
            is_leaf: false,
            verify_result: PathValidationStatus::NotVerified,
            cert: Some(cert),
            cert_ctx: None,
        }
    }

    /// `from_ctx` creates a node for a context returned by a certificate store.
    pub fn from_ctx(ctx: Arc<CertCtx>, source: CertSource) -> PathNode {
        PathNode {
            parent: None,
            children: Vec::new(),
            depth: 0,
            source,
            is_leaf: false,
            verify_result: PathValidationStatus::NotVerified,
            cert: None,
            cert_ctx: Some(ctx),
        }
    }

    /// Returns the certificate, if the node has one. Nodes built from trust anchor information
    /// alone have no certificate.
    pub fn cert(&self) -> Option<&PDVCertificate> {
        match &self.cert {
            Some(c) => Some(c.as_ref()),
            None => self.cert_ctx.as_ref().and_then(|ctx| ctx.cert.as_ref()),
        }
    }

    /// Returns the store context, if the node came from a store
    pub fn cert_ctx(&self) -> Option<&Arc<CertCtx>> {
        self.cert_ctx.as_ref()
    }

    /// Returns the subject name of the certificate or, absent a certificate, the trust anchor name
    pub fn subject(&self) -> Option<&Name> {
        match self.cert() {
            Some(c) => Some(&c.decoded_cert.tbs_certificate.subject),
            None => self.cert_ctx.as_ref().and_then(|ctx| ctx.subject()),
        }
    }

    /// Returns the public key of the certificate or, absent a certificate, the trust anchor key
    pub fn public_key(&self) -> Option<&SubjectPublicKeyInfoOwned> {
        match self.cert() {
            Some(c) => Some(&c.decoded_cert.tbs_certificate.subject_public_key_info),
            None => self.cert_ctx.as_ref().and_then(|ctx| ctx.public_key()),
        }
    }

    /// Returns the issuer name of the certificate, if the node has one
    pub fn issuer(&self) -> Option<&Name> {
        self.cert().map(|c| &c.decoded_cert.tbs_certificate.issuer)
    }

    /// `is_same` returns true if the two nodes represent the same certificate, or the same trust
    /// anchor information where neither has a certificate.
    pub fn is_same(&self, other: &PathNode) -> bool {
        match (self.cert(), other.cert()) {
            (Some(a), Some(b)) => a.is_same_cert(b),
            (None, None) => match (&self.cert_ctx, &other.cert_ctx) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a.ta_info == b.ta_info,
                _ => false,
            },
            _ => false,
        }
    }

    /// Returns the parent of the node, or None for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns the children of the node
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns the depth of the node. The target is at depth 0.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns the source of the node
    pub fn source(&self) -> CertSource {
        self.source
    }

    pub(crate) fn set_source(&mut self, source: CertSource) {
        self.source = source;
    }

    /// Returns true if the node has been added to the leaf list
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }
}

/// [`PathTree`] owns the nodes of the discovery tree and the ordered leaf list.
#[derive(Clone, Debug, Default)]
pub struct PathTree {
    nodes: Vec<Option<PathNode>>,
    root: Option<NodeId>,
    leaves: Vec<NodeId>,
}

impl PathTree {
    /// Creates an empty [`PathTree`]
    pub fn new() -> PathTree {
        PathTree::default()
    }

    /// Returns true once a root has been set
    pub fn is_built(&self) -> bool {
        self.root.is_some()
    }

    /// Returns the root node index, if any
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Returns the node with the given index, if it has not been removed
    pub fn node(&self, id: NodeId) -> Option<&PathNode> {
        self.nodes.get(id).and_then(|n| n.as_ref())
    }

    /// Returns the node with the given index for modification, if it has not been removed
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut PathNode> {
        self.nodes.get_mut(id).and_then(|n| n.as_mut())
    }

    /// Returns the ordered leaf list
    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    /// Returns the leaf at position `index` in the leaf list
    pub fn leaf(&self, index: usize) -> Option<NodeId> {
        self.leaves.get(index).copied()
    }

    /// `set_root` places `node` at the root of the tree at depth 0.
    pub fn set_root(&mut self, mut node: PathNode) -> NodeId {
        node.parent = None;
        node.depth = 0;
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        self.root = Some(id);
        id
    }

    /// `add_child` appends `node` to the children of `parent` at depth parent + 1.
    pub fn add_child(&mut self, parent: NodeId, mut node: PathNode) -> Result<NodeId> {
        let id = self.nodes.len();
        let p = self.node_mut(parent).ok_or(Error::Internal)?;
        p.children.push(id);
        node.parent = Some(parent);
        node.depth = p.depth + 1;
        self.nodes.push(Some(node));
        Ok(id)
    }

    /// `remove_node` unlinks a childless node from its parent and the leaf list.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .and_then(|n| n.take())
            .ok_or(Error::Internal)?;
        match node.parent {
            Some(p) => {
                if let Some(parent) = self.node_mut(p) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.root = None,
        }
        if node.is_leaf {
            self.leaves.retain(|l| *l != id);
        }
        Ok(())
    }

    /// `right_sibling` returns the sibling that follows `id` in its parent's child list.
    pub fn right_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(self.node(id)?.parent?)?;
        let pos = parent.children.iter().position(|c| *c == id)?;
        parent.children.get(pos + 1).copied()
    }

    /// `next_right_up` returns the right sibling of `id` or, failing that, the right sibling of the
    /// nearest ancestor that has one. The root has no siblings, so traversal ends there.
    pub fn next_right_up(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = id;
        loop {
            if let Some(sibling) = self.right_sibling(cur) {
                return Some(sibling);
            }
            cur = self.node(cur)?.parent?;
        }
    }

    /// `add_leaf` marks the node as a leaf and inserts it into the leaf list ahead of the first leaf
    /// with a lower source priority or with the same priority and greater depth.
    pub fn add_leaf(&mut self, id: NodeId) -> Result<()> {
        let (source, depth) = {
            let node = self.node_mut(id).ok_or(Error::Internal)?;
            node.is_leaf = true;
            (node.source, node.depth)
        };
        let pos = self.leaves.iter().position(|l| match self.node(*l) {
            Some(leaf) => {
                leaf.source < source || (leaf.source == source && leaf.depth > depth)
            }
            None => false,
        });
        match pos {
            Some(p) => self.leaves.insert(p, id),
            None => self.leaves.push(id),
        }
        Ok(())
    }

    /// `ancestors` returns `id` followed by each ancestor up to and including the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut retval = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.node(c) {
                Some(n) => {
                    retval.push(c);
                    cur = n.parent;
                }
                None => break,
            }
        }
        retval
    }

    /// `is_on_path` returns the node equal to `candidate` from among `id` and its ancestors, if any.
    pub fn is_on_path(&self, id: NodeId, candidate: &PathNode) -> Option<NodeId> {
        self.ancestors(id)
            .into_iter()
            .find(|a| self.node(*a).map(|n| n.is_same(candidate)).unwrap_or(false))
    }

    /// `is_sibling_dup` returns true if a child of `parent` is equal to `candidate`.
    pub fn is_sibling_dup(&self, parent: NodeId, candidate: &PathNode) -> bool {
        match self.node(parent) {
            Some(p) => p
                .children
                .iter()
                .filter_map(|c| self.node(*c))
                .any(|c| c.is_same(candidate)),
            None => false,
        }
    }

    /// Returns the number of live nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Returns true if the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
fn test_cert(enc: &[u8]) -> Arc<PDVCertificate> {
    Arc::new(PDVCertificate::try_from(enc).unwrap())
}

#[test]
fn cert_source_test() {
    assert!(CertSource::TrustedCert > CertSource::TrustedStore);
    assert!(CertSource::UntrustedStore > CertSource::UntrustedArray);
    assert!(CertSource::UntrustedArray > CertSource::UntrustedSet);
    assert!(CertSource::UntrustedSet > CertSource::Target);
    assert!(CertSource::TrustedStore.is_trusted());
    assert!(!CertSource::UntrustedStore.is_trusted());
    assert_eq!("trusted_cert", alloc::format!("{}", CertSource::TrustedCert));
}

#[test]
fn path_tree_traversal_test() {
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let ca_cross = test_cert(include_bytes!("../../tests/examples/intermediate_cross.der"));
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));

    let mut tree = PathTree::new();
    assert!(!tree.is_built());
    let r = tree.set_root(PathNode::from_cert(target, CertSource::Target));
    let a = tree
        .add_child(r, PathNode::from_cert(ca.clone(), CertSource::UntrustedArray))
        .unwrap();
    let b = tree
        .add_child(r, PathNode::from_cert(ca_cross, CertSource::UntrustedArray))
        .unwrap();
    let a1 = tree
        .add_child(a, PathNode::from_cert(root.clone(), CertSource::TrustedCert))
        .unwrap();
    assert!(tree.is_built());
    assert_eq!(2, tree.node(a1).unwrap().depth());
    assert_eq!(Some(b), tree.right_sibling(a));
    assert_eq!(None, tree.right_sibling(b));
    assert_eq!(Some(b), tree.next_right_up(a1));
    assert_eq!(None, tree.next_right_up(b));
    assert_eq!(None, tree.next_right_up(r));
    assert_eq!(vec![a1, a, r], tree.ancestors(a1));

    let dup = PathNode::from_cert(ca, CertSource::UntrustedStore);
    assert!(tree.is_sibling_dup(r, &dup));
    assert_eq!(Some(a), tree.is_on_path(a1, &dup));
    assert_eq!(None, tree.is_on_path(b, &dup));

    tree.add_leaf(b).unwrap();
    tree.add_leaf(a1).unwrap();
    // trusted leaf sorts ahead of the untrusted one
    assert_eq!(&[a1, b], tree.leaves());

    tree.remove_node(b).unwrap();
    assert_eq!(&[a1], tree.leaves());
    assert_eq!(&[a], tree.node(r).unwrap().children());
    assert_eq!(3, tree.len());
    assert!(tree.remove_node(b).is_err());
}

#[test]
fn leaf_order_test() {
    let target = test_cert(include_bytes!("../../tests/examples/target.der"));
    let ca = test_cert(include_bytes!("../../tests/examples/intermediate.der"));
    let root = test_cert(include_bytes!("../../tests/examples/root.der"));
    let alt_root = test_cert(include_bytes!("../../tests/examples/alt_root.der"));

    let mut tree = PathTree::new();
    let r = tree.set_root(PathNode::from_cert(target, CertSource::Target));
    let shallow = tree
        .add_child(r, PathNode::from_cert(root.clone(), CertSource::TrustedStore))
        .unwrap();
    let mid = tree
        .add_child(r, PathNode::from_cert(ca, CertSource::UntrustedStore))
        .unwrap();
    let deep = tree
        .add_child(mid, PathNode::from_cert(alt_root, CertSource::TrustedStore))
        .unwrap();
    let best = tree
        .add_child(mid, PathNode::from_cert(root, CertSource::TrustedCert))
        .unwrap();

    tree.add_leaf(deep).unwrap();
    tree.add_leaf(shallow).unwrap();
    tree.add_leaf(best).unwrap();
    assert_eq!(&[best, shallow, deep], tree.leaves());
    for w in tree.leaves().windows(2) {
        let l = tree.node(w[0]).unwrap();
        let r = tree.node(w[1]).unwrap();
        assert!(l.source() > r.source() || (l.source() == r.source() && l.depth() <= r.depth()));
    }
}
