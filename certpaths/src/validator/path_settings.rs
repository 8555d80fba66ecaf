//! Structures and functions related to configuring certification path building and validation

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Result as SerdeResult;
use std::path::Path;

use const_oid::db::rfc5280::ANY_POLICY;
use der::{asn1::ObjectIdentifier, Decode, Encode};
use x509_cert::ext::pkix::constraints::name::GeneralSubtrees;

use crate::util::error::*;
use crate::{log_message, PeLogLevels, TimeOfInterest};

//-----------------------------------------------------------------------------------------------
// Type definitions used in the definition of path settings
//-----------------------------------------------------------------------------------------------
/// `ObjectIdentifierSet` is a typedef for a set of ObjectIdentifier values.
pub type ObjectIdentifierSet = BTreeSet<ObjectIdentifier>;

/// `Strings` is a typedef for a vector of String values.
pub type Strings = Vec<String>;

/// `PathSettings` maps setting names to values of various types. Absent settings take the
/// defaults documented on each `PS_` name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSettings(pub BTreeMap<String, PathSettingValue>);

impl PathSettings {
    /// Creates a new empty [`PathSettings`]
    pub fn new() -> Self {
        Self::default()
    }
}

/// `PathSettingValue` is used to define a variant map with types associated with performing
/// certification path discovery and validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSettingValue {
    /// Represents bool values
    Bool(bool),
    /// Represents u32 values
    U32(u32),
    /// Represents u64 values
    U64(u64),
    /// Represents vectors of u8 values
    Buffer(Vec<u8>),
    /// Represents vectors of Strings
    Strings(Strings),
}

//-----------------------------------------------------------------------------------------------
// Types of path settings
//-----------------------------------------------------------------------------------------------
/// `PS_INITIAL_EXPLICIT_POLICY` is used to retrieve a u32 value from a [`PathSettings`] object. The
/// value seeds the explicit_policy state variable described in
/// [RFC 5280 Section 6.1.2]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.2>, i.e.,
/// the number of non-self-issued certificates that may be processed before an explicit policy is
/// required. By default, the value is `u32::MAX` (unbounded). Zero requires an explicit policy from
/// the outset.
pub static PS_INITIAL_EXPLICIT_POLICY: &str = "psInitialExplicitPolicy";

/// `PS_INITIAL_POLICY_MAPPING_INHIBIT` is used to retrieve a u32 value from a [`PathSettings`]
/// object. The value seeds the policy_mapping state variable. By default, the value is `u32::MAX`.
pub static PS_INITIAL_POLICY_MAPPING_INHIBIT: &str = "psInitialPolicyMappingInhibit";

/// `PS_INITIAL_INHIBIT_ANY_POLICY` is used to retrieve a u32 value from a [`PathSettings`]
/// object. The value seeds the inhibit_anyPolicy state variable. By default, the value is `u32::MAX`.
pub static PS_INITIAL_INHIBIT_ANY_POLICY: &str = "psInitialInhibitAnyPolicy";

/// `PS_INITIAL_POLICY_SET` is used to retrieve a Strings value containing dotted OIDs from a
/// [`PathSettings`] object. This corresponds to the user-initial-policy-set value described in
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1>. An absent
/// or empty set is treated as anyPolicy.
pub static PS_INITIAL_POLICY_SET: &str = "psInitialPolicySet";

/// `PS_INITIAL_PERMITTED_SUBTREES` is used to retrieve a DER-encoded GeneralSubtrees value from a
/// [`PathSettings`] object. This corresponds to the initial-permitted-subtrees value described in
/// RFC 5280 Section 6.1.1. There is no default.
pub static PS_INITIAL_PERMITTED_SUBTREES: &str = "psInitialPermittedSubtrees";

/// `PS_INITIAL_EXCLUDED_SUBTREES` is used to retrieve a DER-encoded GeneralSubtrees value from a
/// [`PathSettings`] object. This corresponds to the initial-excluded-subtrees value described in
/// RFC 5280 Section 6.1.1. There is no default.
pub static PS_INITIAL_EXCLUDED_SUBTREES: &str = "psInitialExcludedSubtrees";

/// `PS_TIME_OF_INTEREST` is used to retrieve a u64 value containing seconds since Unix epoch from a
/// [`PathSettings`] object. Certificates are checked for validity at this time. When absent, validity
/// periods are not checked.
pub static PS_TIME_OF_INTEREST: &str = "psTimeOfInterest";

/// `PS_CHECK_TRUST_ANCHOR` is used to retrieve a bool value from a [`PathSettings`] object. When
/// true, trust anchor certificates are checked for a valid self-signature, validity and, where the
/// trust anchor is not the target, CA status. By default, the value is false.
pub static PS_CHECK_TRUST_ANCHOR: &str = "psCheckTrustAnchor";

/// `PS_ELIMINATE_UNTRUSTED_PATHS` is used to retrieve a bool value from a [`PathSettings`] object.
/// When true, branches that dead end without reaching a trust anchor are removed while building.
/// By default, the value is false.
pub static PS_ELIMINATE_UNTRUSTED_PATHS: &str = "psEliminateUntrustedPaths";

/// `PS_MAX_PATH_DEPTH` is used to retrieve a u32 value from a [`PathSettings`] object. Nodes at
/// this depth are not expanded while building. By default, the value is [`PS_MAX_PATH_DEPTH_DEFAULT`].
pub static PS_MAX_PATH_DEPTH: &str = "psMaxPathDepth";

/// `PS_MAX_PATH_DEPTH_DEFAULT` is the default maximum depth of the path discovery tree
pub const PS_MAX_PATH_DEPTH_DEFAULT: u32 = 50;

//-----------------------------------------------------------------------------------------------
// Getters/setters for settings
//-----------------------------------------------------------------------------------------------
macro_rules! ps_gets_and_sets_with_default {
    ($getter:ident, $setter:ident, $flag:ident, $variant:ident, $t:ty, $default:expr) => {
        impl PathSettings {
            #[doc = concat!("`", stringify!($getter), "` is used to retrieve the `", stringify!($flag), "` value from a [`PathSettings`] instance")]
            pub fn $getter(&self) -> $t {
                match self.0.get($flag) {
                    Some(PathSettingValue::$variant(v)) => v.clone(),
                    _ => $default,
                }
            }
            #[doc = concat!("`", stringify!($setter), "` is used to set the `", stringify!($flag), "` value in a [`PathSettings`] instance")]
            pub fn $setter(&mut self, v: $t) {
                self.0
                    .insert($flag.to_string(), PathSettingValue::$variant(v));
            }
        }
    };
}

ps_gets_and_sets_with_default!(
    get_initial_explicit_policy,
    set_initial_explicit_policy,
    PS_INITIAL_EXPLICIT_POLICY,
    U32,
    u32,
    u32::MAX
);
ps_gets_and_sets_with_default!(
    get_initial_policy_mapping_inhibit,
    set_initial_policy_mapping_inhibit,
    PS_INITIAL_POLICY_MAPPING_INHIBIT,
    U32,
    u32,
    u32::MAX
);
ps_gets_and_sets_with_default!(
    get_initial_inhibit_any_policy,
    set_initial_inhibit_any_policy,
    PS_INITIAL_INHIBIT_ANY_POLICY,
    U32,
    u32,
    u32::MAX
);
ps_gets_and_sets_with_default!(
    get_check_trust_anchor,
    set_check_trust_anchor,
    PS_CHECK_TRUST_ANCHOR,
    Bool,
    bool,
    false
);
ps_gets_and_sets_with_default!(
    get_eliminate_untrusted_paths,
    set_eliminate_untrusted_paths,
    PS_ELIMINATE_UNTRUSTED_PATHS,
    Bool,
    bool,
    false
);
ps_gets_and_sets_with_default!(
    get_max_path_depth,
    set_max_path_depth,
    PS_MAX_PATH_DEPTH,
    U32,
    u32,
    PS_MAX_PATH_DEPTH_DEFAULT
);

impl PathSettings {
    ///`get_initial_policy_set` is used to retrieve `PS_INITIAL_POLICY_SET` items from a [`PathSettings`] instance
    pub fn get_initial_policy_set(&self) -> Strings {
        match self.0.get(PS_INITIAL_POLICY_SET) {
            Some(PathSettingValue::Strings(v)) => v.clone(),
            _ => Strings::new(),
        }
    }

    ///`set_initial_policy_set` is used to set `PS_INITIAL_POLICY_SET` items in a [`PathSettings`] instance
    pub fn set_initial_policy_set(&mut self, v: Strings) {
        self.0
            .insert(PS_INITIAL_POLICY_SET.to_string(), PathSettingValue::Strings(v));
    }

    /// `set_initial_policy_set_from_oid_set` is used to set `PS_INITIAL_POLICY_SET` items in a [`PathSettings`] instance
    /// given an ObjectIdentifierSet object instead of a Strings object.
    pub fn set_initial_policy_set_from_oid_set(&mut self, v: &ObjectIdentifierSet) {
        self.set_initial_policy_set(v.iter().map(|o| o.to_string()).collect());
    }

    ///`get_initial_policy_set_as_oid_set` is used to retrieve `PS_INITIAL_POLICY_SET` items from a [`PathSettings`] instance
    /// as an ObjectIdentifierSet object instead of a Strings object. Values that are not dotted
    /// OIDs are logged and skipped. An empty result represents anyPolicy.
    pub fn get_initial_policy_set_as_oid_set(&self) -> ObjectIdentifierSet {
        let mut bts = BTreeSet::new();
        for s in self.get_initial_policy_set() {
            match ObjectIdentifier::from_str(s.as_str()) {
                Ok(oid) => {
                    if oid == ANY_POLICY {
                        // anyPolicy swallows everything else
                        return BTreeSet::new();
                    }
                    bts.insert(oid);
                }
                Err(_) => log_message(
                    &PeLogLevels::PeError,
                    format!("Ignoring malformed OID in {}: {}", PS_INITIAL_POLICY_SET, s).as_str(),
                ),
            }
        }
        bts
    }

    fn get_subtrees(&self, key: &str) -> Result<Option<GeneralSubtrees>> {
        match self.0.get(key) {
            Some(PathSettingValue::Buffer(enc)) => Ok(Some(GeneralSubtrees::from_der(enc)?)),
            _ => Ok(None),
        }
    }

    fn set_subtrees(&mut self, key: &str, v: Option<&GeneralSubtrees>) -> Result<()> {
        match v {
            Some(gs) => {
                self.0
                    .insert(key.to_string(), PathSettingValue::Buffer(gs.to_der()?));
            }
            None => {
                self.0.remove(key);
            }
        }
        Ok(())
    }

    /// `get_initial_permitted_subtrees` decodes the `PS_INITIAL_PERMITTED_SUBTREES` value from a
    /// [`PathSettings`] map. If absent, None is returned.
    pub fn get_initial_permitted_subtrees(&self) -> Result<Option<GeneralSubtrees>> {
        self.get_subtrees(PS_INITIAL_PERMITTED_SUBTREES)
    }

    /// `set_initial_permitted_subtrees` encodes and saves the `PS_INITIAL_PERMITTED_SUBTREES`
    /// value. Passing None removes the value.
    pub fn set_initial_permitted_subtrees(&mut self, v: Option<&GeneralSubtrees>) -> Result<()> {
        self.set_subtrees(PS_INITIAL_PERMITTED_SUBTREES, v)
    }

    /// `get_initial_excluded_subtrees` decodes the `PS_INITIAL_EXCLUDED_SUBTREES` value from a
    /// [`PathSettings`] map. If absent, None is returned.
    pub fn get_initial_excluded_subtrees(&self) -> Result<Option<GeneralSubtrees>> {
        self.get_subtrees(PS_INITIAL_EXCLUDED_SUBTREES)
    }

    /// `set_initial_excluded_subtrees` encodes and saves the `PS_INITIAL_EXCLUDED_SUBTREES`
    /// value. Passing None removes the value.
    pub fn set_initial_excluded_subtrees(&mut self, v: Option<&GeneralSubtrees>) -> Result<()> {
        self.set_subtrees(PS_INITIAL_EXCLUDED_SUBTREES, v)
    }

    /// `get_time_of_interest` returns the `PS_TIME_OF_INTEREST` value, if any.
    pub fn get_time_of_interest(&self) -> Option<u64> {
        match self.0.get(PS_TIME_OF_INTEREST) {
            Some(PathSettingValue::U64(v)) => Some(*v),
            _ => None,
        }
    }

    /// `set_time_of_interest` sets the `PS_TIME_OF_INTEREST` value. Passing None removes the value,
    /// which disables validity checks.
    pub fn set_time_of_interest(&mut self, v: Option<u64>) {
        match v {
            Some(t) => {
                self.0
                    .insert(PS_TIME_OF_INTEREST.to_string(), PathSettingValue::U64(t));
            }
            None => {
                self.0.remove(PS_TIME_OF_INTEREST);
            }
        }
    }

    /// `get_time_of_interest_as_toi` returns the `PS_TIME_OF_INTEREST` value as a [`TimeOfInterest`].
    pub fn get_time_of_interest_as_toi(&self) -> Result<Option<TimeOfInterest>> {
        match self.get_time_of_interest() {
            Some(t) => Ok(Some(TimeOfInterest::from_unix_secs(t)?)),
            None => Ok(None),
        }
    }
}

/// `read_settings` accepts the name of a file that notionally contains JSON data that represents
/// [`PathSettings`]. Where the file does not exist, default settings are returned. Where the file
/// exists but cannot be read or parsed, ParseError is returned.
pub fn read_settings<P: AsRef<Path>>(fname: P) -> Result<PathSettings> {
    let p = fname.as_ref();
    if !p.exists() {
        return Ok(PathSettings::new());
    }
    let json = match std::fs::read(p) {
        Ok(json) => json,
        Err(e) => {
            log_message(
                &PeLogLevels::PeError,
                format!("Failed to read {}: {}", p.display(), e).as_str(),
            );
            return Err(Error::ParseError);
        }
    };
    let r: SerdeResult<PathSettings> = serde_json::from_slice(&json);
    match r {
        Ok(ps) => Ok(ps),
        Err(e) => {
            log_message(
                &PeLogLevels::PeError,
                format!("Failed to parse {}: {}", p.display(), e).as_str(),
            );
            Err(Error::ParseError)
        }
    }
}

#[test]
fn test_default_gets() {
    let ps = PathSettings::default();
    assert_eq!(u32::MAX, ps.get_initial_explicit_policy());
    assert_eq!(u32::MAX, ps.get_initial_policy_mapping_inhibit());
    assert_eq!(u32::MAX, ps.get_initial_inhibit_any_policy());
    assert!(ps.get_initial_policy_set().is_empty());
    assert!(ps.get_initial_policy_set_as_oid_set().is_empty());
    assert_eq!(None, ps.get_initial_permitted_subtrees().unwrap());
    assert_eq!(None, ps.get_initial_excluded_subtrees().unwrap());
    assert_eq!(None, ps.get_time_of_interest());
    assert!(!ps.get_check_trust_anchor());
    assert!(!ps.get_eliminate_untrusted_paths());
    assert_eq!(50, ps.get_max_path_depth());
}

#[test]
fn test_sets() {
    use x509_cert::ext::pkix::constraints::name::GeneralSubtree;
    use x509_cert::ext::pkix::name::GeneralName;

    let mut ps = PathSettings::new();
    ps.set_initial_explicit_policy(0);
    ps.set_initial_policy_mapping_inhibit(1);
    ps.set_initial_inhibit_any_policy(2);
    ps.set_check_trust_anchor(true);
    ps.set_eliminate_untrusted_paths(true);
    ps.set_max_path_depth(10);
    ps.set_time_of_interest(Some(1_700_000_000));
    assert_eq!(0, ps.get_initial_explicit_policy());
    assert_eq!(1, ps.get_initial_policy_mapping_inhibit());
    assert_eq!(2, ps.get_initial_inhibit_any_policy());
    assert!(ps.get_check_trust_anchor());
    assert!(ps.get_eliminate_untrusted_paths());
    assert_eq!(10, ps.get_max_path_depth());
    assert_eq!(
        1_700_000_000,
        ps.get_time_of_interest_as_toi()
            .unwrap()
            .unwrap()
            .as_unix_secs()
    );
    ps.set_time_of_interest(None);
    assert_eq!(None, ps.get_time_of_interest());

    ps.set_initial_policy_set(vec![
        "1.3.6.1.4.1.55555.1.1".to_string(),
        "not an oid".to_string(),
    ]);
    assert_eq!(1, ps.get_initial_policy_set_as_oid_set().len());
    ps.set_initial_policy_set(vec![
        "1.3.6.1.4.1.55555.1.1".to_string(),
        ANY_POLICY.to_string(),
    ]);
    assert!(ps.get_initial_policy_set_as_oid_set().is_empty());

    let mut oids = ObjectIdentifierSet::new();
    oids.insert(ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.2"));
    ps.set_initial_policy_set_from_oid_set(&oids);
    assert_eq!(oids, ps.get_initial_policy_set_as_oid_set());

    let subtrees = vec![GeneralSubtree {
        base: GeneralName::DnsName(der::asn1::Ia5String::new("example.com").unwrap()),
        minimum: 0,
        maximum: None,
    }];
    ps.set_initial_permitted_subtrees(Some(&subtrees)).unwrap();
    assert_eq!(Some(subtrees.clone()), ps.get_initial_permitted_subtrees().unwrap());
    ps.set_initial_excluded_subtrees(Some(&subtrees)).unwrap();
    assert_eq!(Some(subtrees), ps.get_initial_excluded_subtrees().unwrap());
    ps.set_initial_permitted_subtrees(None).unwrap();
    assert_eq!(None, ps.get_initial_permitted_subtrees().unwrap());
}

#[test]
fn test_read_settings() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();

    // missing file yields defaults
    let missing = dir.path().join("missing.json");
    assert_eq!(PathSettings::default(), read_settings(&missing).unwrap());

    let mut ps = PathSettings::new();
    ps.set_initial_explicit_policy(0);
    ps.set_max_path_depth(5);
    ps.set_initial_policy_set(vec!["1.3.6.1.4.1.55555.1.1".to_string()]);
    let good = dir.path().join("good.json");
    std::fs::write(&good, serde_json::to_vec(&ps).unwrap()).unwrap();
    let read = read_settings(&good).unwrap();
    assert_eq!(ps, read);
    assert_eq!(0, read.get_initial_explicit_policy());
    assert_eq!(5, read.get_max_path_depth());

    let bad = dir.path().join("bad.json");
    let mut f = std::fs::File::create(&bad).unwrap();
    f.write_all(b"{ not json").unwrap();
    assert_eq!(Err(Error::ParseError), read_settings(&bad));
}
