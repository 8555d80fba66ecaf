//! Valid policy tree used for certificate policy processing per [RFC 5280 Section 6.1].
//!
//! Nodes live in an arena and are addressed by index. Each node is also listed in a bucket for its
//! depth so that pruning is a scan over buckets rather than a tree walk. Deleted nodes leave a
//! tombstone behind, so node indices stay stable for the lifetime of one validation run.
//!
//! [RFC 5280 Section 6.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1>

use alloc::{vec, vec::Vec};

use const_oid::db::rfc5280::ANY_POLICY;
use der::asn1::ObjectIdentifier;
use x509_cert::ext::pkix::{certpolicy::PolicyQualifierInfo, CertificatePolicies, PolicyMappings};

/// Index of a node in a [`PolicyTree`]
pub type PolicyNodeId = usize;

/// A node in the valid policy tree
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PolicyTreeNode {
    /// valid_policy
    pub valid_policy: ObjectIdentifier,
    /// qualifier_set
    pub qualifiers: Option<Vec<PolicyQualifierInfo>>,
    /// First member of the expected_policy_set
    pub expected_policy_first: ObjectIdentifier,
    /// Remaining members of the expected_policy_set, added by policy mapping
    pub more_expected_policies: Vec<ObjectIdentifier>,
    /// Set once policy mapping has replaced expected_policy_first
    pub already_mapped: bool,
    /// Depth of the node, with the root at depth 0
    pub depth: usize,
    parent: Option<PolicyNodeId>,
    children: Vec<PolicyNodeId>,
}

impl PolicyTreeNode {
    /// `expects` returns true if `policy` is in the expected_policy_set of the node.
    pub fn expects(&self, policy: &ObjectIdentifier) -> bool {
        self.expected_policy_first == *policy || self.more_expected_policies.contains(policy)
    }

    /// Returns the parent of the node, or None for the root
    pub fn parent(&self) -> Option<PolicyNodeId> {
        self.parent
    }

    /// Returns the children of the node
    pub fn children(&self) -> &[PolicyNodeId] {
        &self.children
    }
}

/// The valid_policy_tree state variable.
///
/// A tree whose root has been deleted is NULL in the sense of RFC 5280.
#[derive(Clone, Debug, Default)]
pub struct PolicyTree {
    nodes: Vec<Option<PolicyTreeNode>>,
    depths: Vec<Vec<PolicyNodeId>>,
    root: Option<PolicyNodeId>,
}

impl PolicyTree {
    /// `new` returns a tree with room for nodes at depths 0 through `max_depth` consisting of a
    /// single anyPolicy node at depth 0, as described in RFC 5280 6.1.2 (a).
    pub fn new(max_depth: usize) -> PolicyTree {
        let mut tree = PolicyTree {
            nodes: Vec::new(),
            depths: vec![Vec::new(); max_depth + 1],
            root: None,
        };
        //      The initial value of the valid_policy_tree is a single node with
        //            valid_policy anyPolicy, an empty qualifier_set, and an
        //            expected_policy_set with the single value anyPolicy.  This node is
        //            considered to be at depth zero.
        tree.insert_new(None, 0, ANY_POLICY, None, ANY_POLICY);
        tree
    }

    /// Returns true if the tree is NULL
    pub fn is_null(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the maximum depth the tree can hold
    pub fn max_depth(&self) -> usize {
        self.depths.len().saturating_sub(1)
    }

    /// Returns the node with the given index, if it has not been deleted
    pub fn node(&self, id: PolicyNodeId) -> Option<&PolicyTreeNode> {
        self.nodes.get(id).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: PolicyNodeId) -> Option<&mut PolicyTreeNode> {
        self.nodes.get_mut(id).and_then(|n| n.as_mut())
    }

    /// Returns the indices of the nodes at the given depth
    pub fn nodes_at_depth(&self, depth: usize) -> Vec<PolicyNodeId> {
        self.depths.get(depth).cloned().unwrap_or_default()
    }

    /// Returns the number of live nodes in the tree
    pub fn len(&self) -> usize {
        self.depths.iter().map(|d| d.len()).sum()
    }

    /// Returns true if the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `valid_policies_at_depth` returns the valid_policy values of the nodes at the given depth.
    pub fn valid_policies_at_depth(&self, depth: usize) -> Vec<ObjectIdentifier> {
        self.nodes_at_depth(depth)
            .iter()
            .filter_map(|id| self.node(*id))
            .map(|n| n.valid_policy)
            .collect()
    }

    /// `insert_new` creates a node at `depth` beneath `parent`. When parent is None, the node
    /// becomes the root. Depths beyond [`PolicyTree::max_depth`] are clamped.
    pub fn insert_new(
        &mut self,
        parent: Option<PolicyNodeId>,
        depth: usize,
        valid_policy: ObjectIdentifier,
        qualifiers: Option<Vec<PolicyQualifierInfo>>,
        expected_policy_first: ObjectIdentifier,
    ) -> PolicyNodeId {
        let depth = core::cmp::min(depth, self.max_depth());
        let id = self.nodes.len();
        self.nodes.push(Some(PolicyTreeNode {
            valid_policy,
            qualifiers,
            expected_policy_first,
            more_expected_policies: Vec::new(),
            already_mapped: false,
            depth,
            parent,
            children: Vec::new(),
        }));
        match parent.and_then(|p| self.node_mut(p)) {
            Some(p) => p.children.push(id),
            None => self.root = Some(id),
        }
        self.depths[depth].push(id);
        id
    }

    /// `destroy_node` unlinks a childless node from its parent and its depth bucket.
    pub fn destroy_node(&mut self, id: PolicyNodeId) {
        let node = match self.nodes.get_mut(id).and_then(|n| n.take()) {
            Some(n) => n,
            None => return,
        };
        debug_assert!(node.children.is_empty());
        match node.parent {
            Some(p) => {
                if let Some(parent) = self.node_mut(p) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.root = None,
        }
        if let Some(bucket) = self.depths.get_mut(node.depth) {
            bucket.retain(|n| *n != id);
        }
    }

    /// `destroy_subtree` deletes the node and all of its descendants, leaves first.
    pub fn destroy_subtree(&mut self, id: PolicyNodeId) {
        loop {
            // descend until we find a leaf
            let mut cur = id;
            while let Some(first) = self.node(cur).and_then(|n| n.children.first().copied()) {
                cur = first;
            }
            self.destroy_node(cur);
            if cur == id {
                break;
            }
        }
    }

    /// `destroy` deletes every node, leaving a NULL tree.
    pub fn destroy(&mut self) {
        self.nodes.clear();
        for bucket in self.depths.iter_mut() {
            bucket.clear();
        }
        self.root = None;
    }

    /// `prune` removes childless nodes at `depth` and every depth above it, deepest first.
    pub fn prune(&mut self, depth: usize) {
        let depth = core::cmp::min(depth, self.max_depth());
        for d in (0..=depth).rev() {
            for id in self.nodes_at_depth(d) {
                if self.node(id).map(|n| n.children.is_empty()).unwrap_or(false) {
                    self.destroy_node(id);
                }
            }
        }
    }

    /// `is_child` returns true if a child of the node has `policy` as its valid_policy.
    pub fn is_child(&self, id: PolicyNodeId, policy: &ObjectIdentifier) -> bool {
        match self.node(id) {
            Some(n) => n
                .children
                .iter()
                .filter_map(|c| self.node(*c))
                .any(|c| c.valid_policy == *policy),
            None => false,
        }
    }

    /// `process_certificate_policies` implements RFC 5280 6.1.3 (d) and (e) for the certificate at
    /// position `depth` in the path.
    ///
    /// `inhibit_any_policy` is the current inhibit_anyPolicy state variable and
    /// `self_issued_intermediate` is true when the certificate is self-issued and is not the target.
    pub fn process_certificate_policies(
        &mut self,
        depth: usize,
        policies: Option<&CertificatePolicies>,
        inhibit_any_policy: u32,
        self_issued_intermediate: bool,
    ) {
        if self.is_null() {
            return;
        }

        let policies = match policies {
            Some(p) => p,
            None => {
                //(e)  If the certificate policies extension is not present, set the
                //	valid_policy_tree to NULL.
                self.destroy();
                return;
            }
        };

        let above = self.nodes_at_depth(depth - 1);
        let mut any_policy_index = None;
        for (idx, pi) in policies.0.iter().enumerate() {
            let p_oid = &pi.policy_identifier;
            if ANY_POLICY == *p_oid {
                any_policy_index = Some(idx);
                continue;
            }

            //(i)   For each node of depth i-1 in the valid_policy_tree
            //		where P-OID is in the expected_policy_set, create a
            //		child node as follows: set the valid_policy to P-OID,
            //		set the qualifier_set to P-Q, and set the
            //		expected_policy_set to {P-OID}.
            let mut match_found = false;
            for parent in &above {
                if self.node(*parent).map(|n| n.expects(p_oid)).unwrap_or(false) {
                    self.insert_new(
                        Some(*parent),
                        depth,
                        *p_oid,
                        pi.policy_qualifiers.clone(),
                        *p_oid,
                    );
                    match_found = true;
                }
            }

            //(ii)  If there was no match in step (i) and the
            //		valid_policy_tree includes a node of depth i-1 with
            //		the valid_policy anyPolicy, generate a child node with
            //		the following values: set the valid_policy to P-OID,
            //		set the qualifier_set to P-Q, and set the
            //		expected_policy_set to {P-OID}.
            if !match_found {
                for parent in &above {
                    if self
                        .node(*parent)
                        .map(|n| n.valid_policy == ANY_POLICY)
                        .unwrap_or(false)
                    {
                        self.insert_new(
                            Some(*parent),
                            depth,
                            *p_oid,
                            pi.policy_qualifiers.clone(),
                            *p_oid,
                        );
                    }
                }
            }
        }

        //(2)  If the certificate policies extension includes the policy
        //	anyPolicy with the qualifier set AP-Q and either (a)
        //	inhibit_anyPolicy is greater than 0 or (b) i<n and the
        //	certificate is self-issued, then:
        //
        //	For each node in the valid_policy_tree of depth i-1, for
        //	each value in the expected_policy_set (including
        //	anyPolicy) that does not appear in a child node, create a
        //	child node with the following values: set the valid_policy
        //	to the value from the expected_policy_set in the parent
        //	node, set the qualifier_set to AP-Q, and set the
        //	expected_policy_set to the value in the valid_policy from
        //	this node.
        match any_policy_index {
            Some(ap) if inhibit_any_policy > 0 || self_issued_intermediate => {
                let ap_q = policies.0[ap].policy_qualifiers.clone();
                for parent in &above {
                    let expected = match self.node(*parent) {
                        Some(n) => {
                            let mut e = vec![n.expected_policy_first];
                            e.extend(n.more_expected_policies.iter().copied());
                            e
                        }
                        None => continue,
                    };
                    for p in expected {
                        if !self.is_child(*parent, &p) {
                            self.insert_new(Some(*parent), depth, p, ap_q.clone(), p);
                        }
                    }
                }
            }
            _ => {
                //(3)  If there is a node in the valid_policy_tree of depth i-1
                //	or less without any child nodes, delete that node.  Repeat
                //	this step until there are no nodes of depth i-1 or less
                //	without children.
                self.prune(depth - 1);
            }
        }
    }

    /// `apply_policy_mappings` implements RFC 5280 6.1.4 (b) for the certificate at position `depth`
    /// in the path. Mappings to or from anyPolicy must have been rejected by the caller.
    pub fn apply_policy_mappings(
        &mut self,
        depth: usize,
        mappings: &PolicyMappings,
        inhibit_policy_mapping: u32,
    ) {
        if inhibit_policy_mapping > 0 {
            //(1)  If the policy_mapping variable is greater than 0, for each
            //	node in the valid_policy_tree of depth i where ID-P is the
            //	valid_policy, set expected_policy_set to the set of
            //	subjectDomainPolicy values that are specified as
            //	equivalent to ID-P by the policy mappings extension.
            for mapping in mappings.0.iter() {
                let mut found = false;
                for id in self.nodes_at_depth(depth) {
                    if let Some(n) = self.node_mut(id) {
                        if n.valid_policy == mapping.issuer_domain_policy {
                            if !n.already_mapped {
                                n.already_mapped = true;
                                n.expected_policy_first = mapping.subject_domain_policy;
                            } else if !n.expects(&mapping.subject_domain_policy) {
                                n.more_expected_policies.push(mapping.subject_domain_policy);
                            }
                            found = true;
                        }
                    }
                }

                //	If no node of depth i in the valid_policy_tree has a
                //	valid_policy of ID-P but there is a node of depth i with a
                //	valid_policy of anyPolicy, then generate a child node of
                //	the node of depth i-1 that has a valid_policy of anyPolicy
                //	as follows: set the valid_policy to ID-P, set the qualifier_set
                //	to the qualifier set of the policy anyPolicy in the
                //	certificate policies extension of certificate i, and set the
                //	expected_policy_set to the set of subjectDomainPolicy values
                //	that are specified as equivalent to ID-P by the policy
                //	mappings extension.
                if !found {
                    let any = self.nodes_at_depth(depth).into_iter().find_map(|id| {
                        self.node(id)
                            .filter(|n| n.valid_policy == ANY_POLICY)
                            .map(|n| (n.parent, n.qualifiers.clone()))
                    });
                    if let Some((parent, qualifiers)) = any {
                        let id = self.insert_new(
                            parent,
                            depth,
                            mapping.issuer_domain_policy,
                            qualifiers,
                            mapping.subject_domain_policy,
                        );
                        if let Some(n) = self.node_mut(id) {
                            n.already_mapped = true;
                        }
                    }
                }
            }
        } else {
            //(2)  If the policy_mapping variable is equal to 0:
            //	(i)    delete each node of depth i in the valid_policy_tree
            //	where ID-P is the valid_policy.
            //	(ii)   If there is a node in the valid_policy_tree of depth
            //	i-1 or less without any child nodes, delete that node.
            //	Repeat this step until there are no nodes of depth i-1 or
            //	less without children.
            let mut removed = 0;
            for mapping in mappings.0.iter() {
                for id in self.nodes_at_depth(depth) {
                    if self
                        .node(id)
                        .map(|n| n.valid_policy == mapping.issuer_domain_policy)
                        .unwrap_or(false)
                    {
                        self.destroy_subtree(id);
                        removed += 1;
                    }
                }
            }
            if removed > 0 {
                self.prune(depth - 1);
            }
        }
    }

    /// `intersect` implements RFC 5280 6.1.5 (g), calculating the intersection of the tree with
    /// the user-initial-policy-set. An empty user set is treated as {anyPolicy}.
    pub fn intersect(&mut self, user_policies: &[ObjectIdentifier]) {
        //(i)    If the valid_policy_tree is NULL, the intersection is NULL.
        if self.is_null() {
            return;
        }

        //(ii)   If the valid_policy_tree is not NULL and the user-initial-policy-set
        //       is any-policy, the intersection is the entire valid_policy_tree.
        if user_policies.is_empty() || user_policies.contains(&ANY_POLICY) {
            return;
        }

        //(iii)  If the valid_policy_tree is not NULL and the user-initial-policy-set
        //       is not any-policy, calculate the intersection of the valid_policy_tree
        //       and the user-initial-policy-set as follows:
        //    1.  Determine the set of policy nodes whose parent nodes have a
        //        valid_policy of anyPolicy.  This is the valid_policy_node_set.
        //    2.  If the valid_policy of any node in the valid_policy_node_set is not
        //        in the user-initial-policy-set and is not anyPolicy, delete this
        //        node and all its children.
        let n = self.max_depth();
        let mut policies_left: Vec<ObjectIdentifier> = user_policies.to_vec();
        for depth in 1..=n {
            for id in self.nodes_at_depth(depth) {
                let (valid, parent) = match self.node(id) {
                    Some(node) => (node.valid_policy, node.parent),
                    None => continue,
                };
                let parent_is_any = parent
                    .and_then(|p| self.node(p))
                    .map(|p| p.valid_policy == ANY_POLICY)
                    .unwrap_or(false);
                if parent_is_any && valid != ANY_POLICY {
                    if !user_policies.contains(&valid) {
                        self.destroy_subtree(id);
                    } else {
                        policies_left.retain(|p| *p != valid);
                    }
                }
            }
        }

        //    3.  If the valid_policy_tree includes a node of depth n with the
        //        valid_policy anyPolicy and the user-initial-policy-set is not
        //        any-policy, perform the following steps:
        //      a.  Set P-Q to the qualifier_set in the node of depth n with
        //          valid_policy anyPolicy.
        //      b.  For each P-OID in the user-initial-policy-set that is not the
        //          valid_policy of a node in the valid_policy_node_set, create a
        //          child node whose parent is the node of depth n-1 with the
        //          valid_policy anyPolicy.  Set the values in the child node as
        //          follows: set the valid_policy to P-OID, set the qualifier_set
        //          to P-Q, and set the expected_policy_set to {P-OID}.
        //      c.  Delete the node of depth n with the valid_policy anyPolicy.
        for id in self.nodes_at_depth(n) {
            let (parent, qualifiers) = match self.node(id) {
                Some(node) if node.valid_policy == ANY_POLICY => {
                    (node.parent, node.qualifiers.clone())
                }
                _ => continue,
            };
            for p in &policies_left {
                self.insert_new(parent, n, *p, qualifiers.clone(), *p);
            }
            self.destroy_node(id);
        }

        //    4.  If there is a node in the valid_policy_tree of depth n-1 or less
        //        without any child nodes, delete that node.  Repeat this step until
        //        there are no nodes of depth n-1 or less without children.
        self.prune(n.saturating_sub(1));
    }
}

#[cfg(test)]
const P1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.1");
#[cfg(test)]
const P2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.2");
#[cfg(test)]
const P3: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.2.1");

#[cfg(test)]
fn policies(oids: &[ObjectIdentifier]) -> CertificatePolicies {
    use x509_cert::ext::pkix::certpolicy::PolicyInformation;
    CertificatePolicies(
        oids.iter()
            .map(|o| PolicyInformation {
                policy_identifier: *o,
                policy_qualifiers: None,
            })
            .collect(),
    )
}

#[test]
fn policy_tree_basics() {
    let mut tree = PolicyTree::new(2);
    assert!(!tree.is_null());
    assert_eq!(1, tree.len());
    assert_eq!(2, tree.max_depth());

    let root = tree.nodes_at_depth(0)[0];
    let a = tree.insert_new(Some(root), 1, P1, None, P1);
    let b = tree.insert_new(Some(root), 1, P2, None, P2);
    let _c = tree.insert_new(Some(a), 2, P1, None, P1);
    assert_eq!(4, tree.len());
    assert!(tree.is_child(root, &P1));
    assert!(!tree.is_child(root, &P3));
    assert!(!tree.is_child(b, &P1));

    // b is childless at depth 1
    tree.prune(1);
    assert_eq!(3, tree.len());
    assert!(tree.node(b).is_none());

    tree.destroy_subtree(a);
    assert_eq!(1, tree.len());
    tree.prune(1);
    assert!(tree.is_null());
    assert!(tree.is_empty());
}

#[test]
fn policy_processing_test() {
    // TA -> CA(P1, P2) -> EE(P1)
    let mut tree = PolicyTree::new(2);
    tree.process_certificate_policies(1, Some(&policies(&[P1, P2])), u32::MAX, false);
    assert_eq!(vec![P1, P2], tree.valid_policies_at_depth(1));
    tree.process_certificate_policies(2, Some(&policies(&[P1])), u32::MAX, false);
    assert_eq!(vec![P1], tree.valid_policies_at_depth(2));
    // P2 branch pruned
    assert_eq!(vec![P1], tree.valid_policies_at_depth(1));

    let mut t2 = tree.clone();
    t2.intersect(&[P2]);
    assert!(t2.is_null());

    let mut t3 = tree.clone();
    t3.intersect(&[P1]);
    assert_eq!(vec![P1], t3.valid_policies_at_depth(2));

    tree.intersect(&[]);
    assert_eq!(3, tree.len());

    // no policies extension
    tree.process_certificate_policies(2, None, u32::MAX, false);
    assert!(tree.is_null());
}

#[test]
fn any_policy_propagation_test() {
    let mut tree = PolicyTree::new(2);
    tree.process_certificate_policies(1, Some(&policies(&[ANY_POLICY])), 1, false);
    assert_eq!(vec![ANY_POLICY], tree.valid_policies_at_depth(1));
    tree.process_certificate_policies(2, Some(&policies(&[ANY_POLICY])), 1, false);
    assert_eq!(vec![ANY_POLICY], tree.valid_policies_at_depth(2));

    // anyPolicy at depth n is replaced by the user policies
    let mut t = tree.clone();
    t.intersect(&[P1, P2]);
    assert_eq!(vec![P1, P2], t.valid_policies_at_depth(2));
    assert!(t.valid_policies_at_depth(1).contains(&ANY_POLICY));

    // inhibited anyPolicy prunes the tree
    let mut t = PolicyTree::new(2);
    t.process_certificate_policies(1, Some(&policies(&[ANY_POLICY])), 0, false);
    assert!(t.is_null());

    // unless the certificate is a self-issued intermediate
    let mut t = PolicyTree::new(2);
    t.process_certificate_policies(1, Some(&policies(&[ANY_POLICY])), 0, true);
    assert!(!t.is_null());
}

#[test]
fn policy_mapping_test() {
    use x509_cert::ext::pkix::PolicyMapping;
    let mappings = PolicyMappings(vec![PolicyMapping {
        issuer_domain_policy: P1,
        subject_domain_policy: P3,
    }]);

    // TA -> CA(P1, maps P1 to P3) -> EE(P3)
    let mut tree = PolicyTree::new(2);
    tree.process_certificate_policies(1, Some(&policies(&[P1])), u32::MAX, false);
    tree.apply_policy_mappings(1, &mappings, u32::MAX);
    let n = tree.node(tree.nodes_at_depth(1)[0]).unwrap();
    assert!(n.already_mapped);
    assert!(n.expects(&P3));
    tree.process_certificate_policies(2, Some(&policies(&[P3])), u32::MAX, false);
    assert_eq!(vec![P3], tree.valid_policies_at_depth(2));

    let mut t = tree.clone();
    t.intersect(&[P1]);
    assert!(!t.is_null());
    let mut t = tree.clone();
    t.intersect(&[P3]);
    assert!(t.is_null());

    // mapping inhibited removes the issuer domain policy
    let mut tree = PolicyTree::new(2);
    tree.process_certificate_policies(1, Some(&policies(&[P1])), u32::MAX, false);
    tree.apply_policy_mappings(1, &mappings, 0);
    assert!(tree.is_null());

    // mapping beneath anyPolicy
    let mut tree = PolicyTree::new(2);
    tree.process_certificate_policies(1, Some(&policies(&[ANY_POLICY])), u32::MAX, false);
    tree.apply_policy_mappings(1, &mappings, u32::MAX);
    assert_eq!(vec![ANY_POLICY, P1], tree.valid_policies_at_depth(1));
    tree.process_certificate_policies(2, Some(&policies(&[P3])), u32::MAX, false);
    assert_eq!(vec![P3], tree.valid_policies_at_depth(2));
}
