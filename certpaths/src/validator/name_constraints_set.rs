//! Structures and functions related to processing name constraints

use alloc::{format, string::ToString, vec::Vec};

use url::Url;

use der::asn1::Ia5String;
use x509_cert::ext::pkix::{
    constraints::name::{GeneralSubtree, GeneralSubtrees},
    name::GeneralName,
};
use x509_cert::name::Name;

use crate::{log_message, util::error::*, util::pdv_utilities::*, PeLogLevels};

/// Upper bound on the number of permitted subtrees tracked while validating a single path.
pub const MAX_PERMITTED_SUBTREES: usize = 4096;

/// `general_name_tag` returns the context-specific tag number of the GeneralName choice.
pub fn general_name_tag(gn: &GeneralName) -> u8 {
    match gn {
        GeneralName::OtherName(_) => 0,
        GeneralName::Rfc822Name(_) => 1,
        GeneralName::DnsName(_) => 2,
        GeneralName::DirectoryName(_) => 4,
        GeneralName::EdiPartyName(_) => 5,
        GeneralName::UniformResourceIdentifier(_) => 6,
        GeneralName::IpAddress(_) => 7,
        GeneralName::RegisteredId(_) => 8,
    }
}

/// Returns the host portion of a URI or, where the value does not parse as a URI (as is the case
/// for a URI name constraint, which is a host or domain), the value itself.
fn uri_host(uri: &Ia5String) -> alloc::string::String {
    match Url::parse(uri.as_str()) {
        Ok(url) => match url.host() {
            Some(host) => host.to_string(),
            None => uri.to_string(),
        },
        Err(_e) => uri.to_string(),
    }
}

/// `general_name_constraint_match` returns true if `name` falls within the subtree described by
/// `constraint`. Names of different types never match. Name forms without a hierarchical matching
/// rule (otherName, ediPartyName, iPAddress, registeredID) match only when equal.
pub fn general_name_constraint_match(constraint: &GeneralName, name: &GeneralName) -> bool {
    match (constraint, name) {
        (GeneralName::DirectoryName(c), GeneralName::DirectoryName(n)) => {
            descended_from_dn(c, n, 0, None)
        }
        (GeneralName::Rfc822Name(c), GeneralName::Rfc822Name(n)) => descended_from_rfc822(c, n),
        (GeneralName::DnsName(c), GeneralName::DnsName(n)) => {
            descended_from_host(c, n.as_str(), false)
        }
        (GeneralName::UniformResourceIdentifier(c), GeneralName::UniformResourceIdentifier(n)) => {
            descended_from_host(c, uri_host(n).as_str(), true)
        }
        (c, n) => general_name_tag(c) == general_name_tag(n) && c == n,
    }
}

/// `check_subtree_validity` returns [`Error::InvalidSubtree`] if the subtree features a minimum
/// other than zero or any maximum. RFC 5280 requires both fields be absent.
pub fn check_subtree_validity(subtree: &GeneralSubtree) -> Result<()> {
    if subtree.minimum != 0 {
        log_message(
            &PeLogLevels::PeError,
            format!("Unexpected GeneralSubtree Minimum value: {:#x}", subtree.minimum).as_str(),
        );
        return Err(Error::InvalidSubtree);
    }
    if let Some(max) = subtree.maximum {
        log_message(
            &PeLogLevels::PeError,
            format!("Unexpected GeneralSubtree Maximum value: {:#x}", max).as_str(),
        );
        return Err(Error::InvalidSubtree);
    }
    Ok(())
}

/// The `NameConstraintsState` structure tracks the permitted_subtrees and excluded_subtrees state
/// variables described in [RFC 5280 Section 6.1] while a single certification path is validated.
///
/// Permitted subtrees are held individually so intersections can be calculated. Once an
/// intersection yields nothing, the sticky `no_permitted_names` flag is set and no name is
/// permitted for the remainder of the path.
///
/// Excluded subtrees are simply accumulated, one sequence per contributing certificate, without
/// removing duplicates.
///
/// [RFC 5280 Section 6.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1>
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NameConstraintsState {
    permitted: Vec<GeneralSubtree>,
    no_permitted_names: bool,
    excluded: Vec<GeneralSubtrees>,
}

impl NameConstraintsState {
    /// Creates a [`NameConstraintsState`] that permits all names and excludes none
    pub fn new() -> Self {
        Self::default()
    }

    /// `reset` returns the state to that produced by [`NameConstraintsState::new`].
    pub fn reset(&mut self) {
        self.permitted.clear();
        self.no_permitted_names = false;
        self.excluded.clear();
    }

    /// Returns true once the permitted subtrees have been reduced to nothing
    pub fn no_permitted_names(&self) -> bool {
        self.no_permitted_names
    }

    /// Returns the permitted subtrees currently in effect
    pub fn permitted(&self) -> &[GeneralSubtree] {
        &self.permitted
    }

    /// Returns the excluded subtree sequences accumulated so far
    pub fn excluded(&self) -> &[GeneralSubtrees] {
        &self.excluded
    }

    /// `add_excluded_subtrees` adds a sequence of excluded subtrees.
    pub fn add_excluded_subtrees(&mut self, subtrees: &GeneralSubtrees) {
        self.excluded.push(subtrees.clone());
    }

    /// `add_permitted_subtrees` appends each subtree to the permitted set. An empty sequence
    /// means no names are permitted.
    pub fn add_permitted_subtrees(&mut self, subtrees: &[GeneralSubtree]) -> Result<()> {
        if subtrees.is_empty() {
            self.no_permitted_names = true;
            return Ok(());
        }

        if self.permitted.len() + subtrees.len() >= MAX_PERMITTED_SUBTREES {
            log_message(
                &PeLogLevels::PeError,
                format!(
                    "Too many permitted subtrees: {} (cur {})",
                    self.permitted.len() + subtrees.len(),
                    self.permitted.len()
                )
                .as_str(),
            );
            return Err(Error::InvalidSubtree);
        }

        for subtree in subtrees {
            check_subtree_validity(subtree)?;
            self.permitted.push(subtree.clone());
        }
        Ok(())
    }

    fn add_permitted_subtree(&mut self, subtree: &GeneralSubtree) -> Result<()> {
        self.add_permitted_subtrees(core::slice::from_ref(subtree))
    }

    /// `intersect_permitted_subtrees` replaces the permitted set with its intersection with
    /// `subtrees`.
    ///
    /// Entries are grouped by GeneralName type. For each type present in `subtrees`, the more
    /// specific of each matching pair is kept and entries without a counterpart are dropped. Types
    /// that appear only in the current permitted set are carried over unchanged.
    pub fn intersect_permitted_subtrees(&mut self, subtrees: &GeneralSubtrees) -> Result<()> {
        if self.no_permitted_names {
            return Ok(());
        }

        if subtrees.is_empty() {
            self.permitted.clear();
            self.no_permitted_names = true;
            return Ok(());
        }

        if self.permitted.is_empty() {
            // first name constraint, no initial constraint
            return self.add_permitted_subtrees(subtrees);
        }

        let left = core::mem::take(&mut self.permitted);
        let mut right_tags = [false; 9];

        for right in subtrees.iter() {
            check_subtree_validity(right)?;

            let right_tag = general_name_tag(&right.base);
            right_tags[right_tag as usize] = true;

            let mut have_right = false;
            for l in left
                .iter()
                .filter(|l| general_name_tag(&l.base) == right_tag)
            {
                if l == right {
                    if !have_right {
                        have_right = true;
                        self.add_permitted_subtree(l)?;
                    }
                } else if general_name_constraint_match(&l.base, &right.base) {
                    if !have_right {
                        have_right = true;
                        self.add_permitted_subtree(right)?;
                    }
                } else if general_name_constraint_match(&right.base, &l.base) {
                    self.add_permitted_subtree(l)?;
                }
            }
        }

        // add types not specified in the right set
        for l in left.iter() {
            if !right_tags[general_name_tag(&l.base) as usize] {
                self.add_permitted_subtree(l)?;
            }
        }

        if self.permitted.is_empty() {
            self.no_permitted_names = true;
        }
        Ok(())
    }

    /// `is_name_permitted` returns true if the distinguished name is within the permitted
    /// directoryName subtrees. When no directoryName subtrees are in effect, every name is
    /// permitted unless the permitted set has been reduced to nothing.
    pub fn is_name_permitted(&self, name: &Name) -> bool {
        if self.no_permitted_names {
            return false;
        }

        let mut constrained = false;
        for subtree in &self.permitted {
            if let GeneralName::DirectoryName(dn) = &subtree.base {
                constrained = true;
                if descended_from_dn(dn, name, subtree.minimum, subtree.maximum) {
                    return true;
                }
            }
        }
        !constrained
    }

    /// `is_general_name_permitted` returns true if the name is within a permitted subtree of the
    /// same type, or if no permitted subtree of that type is in effect.
    pub fn is_general_name_permitted(&self, gn: &GeneralName) -> bool {
        if self.no_permitted_names {
            return false;
        }

        let tag = general_name_tag(gn);
        let mut constrained = false;
        for subtree in &self.permitted {
            if general_name_tag(&subtree.base) == tag {
                constrained = true;
                if general_name_constraint_match(&subtree.base, gn) {
                    return true;
                }
            }
        }
        !constrained
    }

    /// `is_name_excluded` returns true if the distinguished name is within any excluded
    /// directoryName subtree.
    pub fn is_name_excluded(&self, name: &Name) -> bool {
        for subtrees in &self.excluded {
            for subtree in subtrees.iter() {
                if let GeneralName::DirectoryName(dn) = &subtree.base {
                    if descended_from_dn(dn, name, subtree.minimum, subtree.maximum) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// `is_general_name_excluded` returns true if the name is within any excluded subtree.
    pub fn is_general_name_excluded(&self, gn: &GeneralName) -> bool {
        for subtrees in &self.excluded {
            for subtree in subtrees.iter() {
                if general_name_constraint_match(&subtree.base, gn) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
fn dn_subtree(s: &str) -> GeneralSubtree {
    use core::str::FromStr;
    GeneralSubtree {
        base: GeneralName::DirectoryName(Name::from_str(s).unwrap()),
        minimum: 0,
        maximum: None,
    }
}

#[cfg(test)]
fn dns_subtree(s: &str) -> GeneralSubtree {
    GeneralSubtree {
        base: GeneralName::DnsName(Ia5String::new(s).unwrap()),
        minimum: 0,
        maximum: None,
    }
}

#[cfg(test)]
fn dn(s: &str) -> Name {
    use core::str::FromStr;
    Name::from_str(s).unwrap()
}

#[test]
fn subtree_validity_test() {
    let mut st = dns_subtree("example.com");
    assert!(check_subtree_validity(&st).is_ok());
    st.minimum = 1;
    assert_eq!(Err(Error::InvalidSubtree), check_subtree_validity(&st));
    st.minimum = 0;
    st.maximum = Some(2);
    assert_eq!(Err(Error::InvalidSubtree), check_subtree_validity(&st));

    let mut ncs = NameConstraintsState::new();
    assert_eq!(Err(Error::InvalidSubtree), ncs.add_permitted_subtrees(&[st]));
}

#[test]
fn permitted_intersection_test() {
    let mut ncs = NameConstraintsState::new();
    assert!(ncs.is_name_permitted(&dn("CN=Joe,O=Org,C=US")));

    ncs.intersect_permitted_subtrees(&vec![dn_subtree("O=Org,C=US"), dns_subtree("example.com")])
        .unwrap();
    assert_eq!(2, ncs.permitted().len());
    assert!(ncs.is_name_permitted(&dn("CN=Joe,O=Org,C=US")));
    assert!(!ncs.is_name_permitted(&dn("CN=Joe,O=Other,C=US")));

    // more specific right-hand entry replaces the left-hand entry
    ncs.intersect_permitted_subtrees(&vec![dn_subtree("OU=Unit,O=Org,C=US")])
        .unwrap();
    assert_eq!(2, ncs.permitted().len());
    assert!(!ncs.is_name_permitted(&dn("CN=Joe,O=Org,C=US")));
    assert!(ncs.is_name_permitted(&dn("CN=Joe,OU=Unit,O=Org,C=US")));
    // dns entry carried over
    assert!(ncs.is_general_name_permitted(&GeneralName::DnsName(
        Ia5String::new("www.example.com").unwrap()
    )));
    assert!(!ncs.is_general_name_permitted(&GeneralName::DnsName(
        Ia5String::new("www.example.org").unwrap()
    )));

    // less specific right-hand entry keeps left-hand entry
    ncs.intersect_permitted_subtrees(&vec![dn_subtree("C=US")]).unwrap();
    assert!(ncs.is_name_permitted(&dn("CN=Joe,OU=Unit,O=Org,C=US")));
    assert!(!ncs.is_name_permitted(&dn("CN=Joe,O=Org,C=US")));

    // disjoint leaves nothing of that type and therefore nothing at all once dns is gone
    ncs.intersect_permitted_subtrees(&vec![dns_subtree("example.org")])
        .unwrap();
    assert_eq!(1, ncs.permitted().len());
    assert!(!ncs.no_permitted_names());
    ncs.intersect_permitted_subtrees(&vec![dn_subtree("O=Other,C=US")])
        .unwrap();
    assert!(ncs.no_permitted_names());
    assert!(!ncs.is_name_permitted(&dn("CN=Joe,OU=Unit,O=Org,C=US")));
    assert!(!ncs.is_general_name_permitted(&GeneralName::DnsName(
        Ia5String::new("example.org").unwrap()
    )));

    ncs.reset();
    assert!(!ncs.no_permitted_names());
    ncs.intersect_permitted_subtrees(&vec![]).unwrap();
    assert!(ncs.no_permitted_names());
}

#[test]
fn disjoint_type_order_test() {
    let a = vec![dn_subtree("O=Org,C=US")];
    let b = vec![dns_subtree("example.com")];

    let mut ab = NameConstraintsState::new();
    ab.intersect_permitted_subtrees(&a).unwrap();
    ab.intersect_permitted_subtrees(&b).unwrap();

    let mut ba = NameConstraintsState::new();
    ba.intersect_permitted_subtrees(&b).unwrap();
    ba.intersect_permitted_subtrees(&a).unwrap();

    let names = [
        GeneralName::DirectoryName(dn("CN=Joe,O=Org,C=US")),
        GeneralName::DirectoryName(dn("CN=Joe,O=Other,C=US")),
        GeneralName::DnsName(Ia5String::new("a.example.com").unwrap()),
        GeneralName::DnsName(Ia5String::new("a.example.org").unwrap()),
    ];
    for n in names.iter() {
        assert_eq!(ab.is_general_name_permitted(n), ba.is_general_name_permitted(n));
    }
    assert_eq!(ab.permitted().len(), ba.permitted().len());
}

#[test]
fn permitted_by_type_test() {
    // permitted dNSName subtrees leave subject DNs and other name types alone
    let mut ncs = NameConstraintsState::new();
    ncs.intersect_permitted_subtrees(&vec![dns_subtree("example.com")])
        .unwrap();
    assert!(ncs.is_name_permitted(&dn("CN=Anyone,O=Anywhere,C=US")));
    assert!(ncs.is_general_name_permitted(&GeneralName::Rfc822Name(
        Ia5String::new("joe@example.org").unwrap()
    )));
    assert!(!ncs.is_general_name_permitted(&GeneralName::DnsName(
        Ia5String::new("www.example.org").unwrap()
    )));

    // and the reverse
    let mut ncs = NameConstraintsState::new();
    ncs.intersect_permitted_subtrees(&vec![dn_subtree("O=Org,C=US")])
        .unwrap();
    assert!(ncs.is_general_name_permitted(&GeneralName::DnsName(
        Ia5String::new("www.example.org").unwrap()
    )));
    assert!(!ncs.is_name_permitted(&dn("CN=Joe,O=Other,C=US")));
}

#[test]
fn excluded_test() {
    let mut ncs = NameConstraintsState::new();
    ncs.add_excluded_subtrees(&vec![dn_subtree("O=Excluded Org,C=US")]);
    ncs.add_excluded_subtrees(&vec![dns_subtree("excluded.example")]);
    ncs.add_excluded_subtrees(&vec![dns_subtree("excluded.example")]);
    assert_eq!(3, ncs.excluded().len());

    assert!(ncs.is_name_excluded(&dn("CN=Excluded EE,O=Excluded Org,C=US")));
    assert!(!ncs.is_name_excluded(&dn("CN=Fine,O=Org,C=US")));
    assert!(ncs.is_general_name_excluded(&GeneralName::DnsName(
        Ia5String::new("host.excluded.example").unwrap()
    )));
    assert!(!ncs.is_general_name_excluded(&GeneralName::DnsName(
        Ia5String::new("www.example.com").unwrap()
    )));
    let uri = GeneralName::UniformResourceIdentifier(
        Ia5String::new("https://host.excluded.example/path").unwrap(),
    );
    assert!(!ncs.is_general_name_excluded(&uri));
}

#[test]
fn uri_match_test() {
    let c = GeneralName::UniformResourceIdentifier(Ia5String::new(".example.com").unwrap());
    let n = GeneralName::UniformResourceIdentifier(
        Ia5String::new("https://www.example.com/index.html").unwrap(),
    );
    assert!(general_name_constraint_match(&c, &n));
    let c = GeneralName::UniformResourceIdentifier(Ia5String::new("www.example.com").unwrap());
    assert!(general_name_constraint_match(&c, &n));
    let c = GeneralName::UniformResourceIdentifier(Ia5String::new("example.org").unwrap());
    assert!(!general_name_constraint_match(&c, &n));
    let d = GeneralName::DnsName(Ia5String::new("www.example.com").unwrap());
    assert!(!general_name_constraint_match(&d, &n));
}
