//! Error types

use alloc::string::String;
use core::fmt;

/// Result type
pub type Result<T> = core::result::Result<T, Error>;

/// Outcome of validating a single certification path.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum PathValidationStatus {
    /// No errors were encountered while validating certification path
    Valid,
    /// NotVerified is the initial state of every path discovered by the builder. It is replaced
    /// by the result of the first validation attempt for the path.
    NotVerified,
    /// SignatureVerificationFailure occurs when the working public key does not verify the signature
    /// of the next certificate in the path.
    SignatureVerificationFailure,
    /// NotValidAtTime occurs when a certificate in the path is not valid at the configured time
    /// of interest.
    NotValidAtTime,
    /// NameChainingFailure occurs when the issuer name of a certificate does not match the working
    /// issuer name, i.e., the subject name of the superior certificate.
    NameChainingFailure,
    /// NoPermittedNames occurs when the intersection of permitted subtrees has become empty.
    NoPermittedNames,
    /// NameNotPermitted occurs when a subject name is not within the permitted subtrees or is within
    /// the excluded subtrees.
    NameNotPermitted,
    /// AltNameNotPermitted occurs when a subject alternative name is not within the permitted
    /// subtrees or is within the excluded subtrees.
    AltNameNotPermitted,
    /// NullPolicySet occurs when the valid_policy_tree is NULL while an explicit policy is required.
    NullPolicySet,
    /// InvalidPolicyMapping occurs when a policy mapping uses anyPolicy as an issuer or subject
    /// domain policy.
    InvalidPolicyMapping,
    /// UnprocessedCriticalExtension occurs when a certificate features a critical extension that is
    /// not processed during certification path validation.
    UnprocessedCriticalExtension,
    /// InvalidBasicConstraints occurs when an intermediate CA certificate contains a
    /// basicConstraints extension with the cA field set to false.
    InvalidBasicConstraints,
    /// InvalidKeyUsage occurs when an intermediate CA certificate has a keyUsage extension that
    /// lacks keyCertSign.
    InvalidKeyUsage,
    /// InvalidPathLength occurs when a path has more intermediate CA certificates than allowed by
    /// a pathLenConstraint asserted by a superior certificate.
    InvalidPathLength,
    /// NotV3Cert occurs when an intermediate CA certificate or trust anchor certificate is not
    /// a version 3 certificate.
    NotV3Cert,
    /// MissingTrustAnchor occurs when a path does not terminate at a trust anchor.
    MissingTrustAnchor,
    /// NoTrustedPaths occurs when none of the discovered paths terminate at a trust anchor.
    NoTrustedPaths,
}

/// Error type
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// PathValidationError encountered
    PathValidation(PathValidationStatus),
    /// NotFound occurs when an action failed because a necessary artifact was not found, for
    /// example, a path index that is out of range.
    NotFound,
    /// WrongOrder occurs when an operation is attempted in the wrong state, i.e., changing
    /// configuration after paths were built or building paths twice.
    WrongOrder,
    /// An invalid parameter was passed to a setter
    InvalidParameter,
    /// A GeneralSubtree was encountered that features a minimum other than zero or a maximum.
    InvalidSubtree,
    /// Unrecognized occurs when an error conditions does not match anything else here.
    Unrecognized,
    /// An artifact could not be parsed
    ParseError,
    /// Internal occurs when internal state is inconsistent, i.e., a poisoned lock or a leaf that
    /// refers to a node that is not present in the path tree.
    Internal,
    /// Asn1Error is used to propagate error information from the x509 crate.
    Asn1Error(der::Error),
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1Error(err)
    }
}

impl fmt::Display for PathValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationStatus::Valid => write!(f, "Valid"),
            PathValidationStatus::NotVerified => write!(f, "NotVerified"),
            PathValidationStatus::SignatureVerificationFailure => {
                write!(f, "Signature verification failure")
            }
            PathValidationStatus::NotValidAtTime => write!(f, "NotValidAtTime"),
            PathValidationStatus::NameChainingFailure => write!(f, "Name chaining failure"),
            PathValidationStatus::NoPermittedNames => write!(f, "NoPermittedNames"),
            PathValidationStatus::NameNotPermitted => write!(f, "NameNotPermitted"),
            PathValidationStatus::AltNameNotPermitted => write!(f, "AltNameNotPermitted"),
            PathValidationStatus::NullPolicySet => write!(f, "NullPolicySet"),
            PathValidationStatus::InvalidPolicyMapping => write!(f, "InvalidPolicyMapping"),
            PathValidationStatus::UnprocessedCriticalExtension => {
                write!(f, "UnprocessedCriticalExtension")
            }
            PathValidationStatus::InvalidBasicConstraints => write!(f, "InvalidBasicConstraints"),
            PathValidationStatus::InvalidKeyUsage => write!(f, "InvalidKeyUsage"),
            PathValidationStatus::InvalidPathLength => write!(f, "InvalidPathLength"),
            PathValidationStatus::NotV3Cert => write!(f, "NotV3Cert"),
            PathValidationStatus::MissingTrustAnchor => write!(f, "MissingTrustAnchor"),
            PathValidationStatus::NoTrustedPaths => write!(f, "NoTrustedPaths"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PathValidation(err) => write!(f, "PathValidationError: {}", err),
            Error::NotFound => write!(f, "NotFound"),
            Error::WrongOrder => write!(f, "WrongOrder"),
            Error::InvalidParameter => write!(f, "InvalidParameter"),
            Error::InvalidSubtree => write!(f, "InvalidSubtree"),
            Error::Unrecognized => write!(f, "Unrecognized"),
            Error::ParseError => write!(f, "ParseError"),
            Error::Internal => write!(f, "Internal"),
            Error::Asn1Error(err) => write!(f, "Asn1Error: {}", err),
        }
    }
}

/// [`ErrorInfo`] is an optional sink for callers that want the formatted reason behind a failure in
/// addition to the error code, i.e., the node index, OID or numeric constraint that caused a path
/// to be rejected.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ErrorInfo {
    /// Error most recently reported to the sink
    pub error: Option<Error>,
    /// Human-readable description of the error
    pub message: String,
}

impl ErrorInfo {
    /// Creates an empty [`ErrorInfo`]
    pub fn new() -> Self {
        Self::default()
    }

    /// `clear` resets the sink to its initial state.
    pub fn clear(&mut self) {
        self.error = None;
        self.message.clear();
    }
}

/// `report_error` logs `message` at error level, saves `error` and `message` to the sink (if any) and
/// returns `error` so it can be propagated with `return Err(report_error(...))`.
pub(crate) fn report_error(err_info: &mut Option<&mut ErrorInfo>, error: Error, message: &str) -> Error {
    crate::log_message(&crate::PeLogLevels::PeError, message);
    save_error(err_info, error, message)
}

/// `save_error` saves `error` and `message` to the sink (if any) without logging and returns `error`.
pub(crate) fn save_error(err_info: &mut Option<&mut ErrorInfo>, error: Error, message: &str) -> Error {
    if let Some(ei) = err_info.as_deref_mut() {
        ei.error = Some(error);
        ei.message = message.into();
    }
    error
}

#[test]
fn error_test() {
    use alloc::format;

    let _s = format!("{}", PathValidationStatus::Valid);
    let _s = format!("{}", PathValidationStatus::NotVerified);
    let _s = format!("{}", PathValidationStatus::SignatureVerificationFailure);
    let _s = format!("{}", PathValidationStatus::NotValidAtTime);
    let _s = format!("{}", PathValidationStatus::NameChainingFailure);
    let _s = format!("{}", PathValidationStatus::NoPermittedNames);
    let _s = format!("{}", PathValidationStatus::NameNotPermitted);
    let _s = format!("{}", PathValidationStatus::AltNameNotPermitted);
    let _s = format!("{}", PathValidationStatus::NullPolicySet);
    let _s = format!("{}", PathValidationStatus::InvalidPolicyMapping);
    let _s = format!("{}", PathValidationStatus::UnprocessedCriticalExtension);
    let _s = format!("{}", PathValidationStatus::InvalidBasicConstraints);
    let _s = format!("{}", PathValidationStatus::InvalidKeyUsage);
    let _s = format!("{}", PathValidationStatus::InvalidPathLength);
    let _s = format!("{}", PathValidationStatus::NotV3Cert);
    let _s = format!("{}", PathValidationStatus::MissingTrustAnchor);
    let _s = format!("{}", PathValidationStatus::NoTrustedPaths);

    assert_eq!(
        "PathValidationError: NullPolicySet",
        format!(
            "{}",
            Error::PathValidation(PathValidationStatus::NullPolicySet)
        )
    );
    let _s = format!("{}", Error::NotFound);
    let _s = format!("{}", Error::WrongOrder);
    let _s = format!("{}", Error::InvalidParameter);
    let _s = format!("{}", Error::InvalidSubtree);
    let _s = format!("{}", Error::Unrecognized);
    let _s = format!("{}", Error::ParseError);
    let _s = format!("{}", Error::Internal);
}

#[test]
fn error_info_test() {
    let mut ei = ErrorInfo::new();
    {
        let mut sink = Some(&mut ei);
        let e = report_error(&mut sink, Error::InvalidSubtree, "bad subtree");
        assert_eq!(Error::InvalidSubtree, e);
    }
    assert_eq!(Some(Error::InvalidSubtree), ei.error);
    assert_eq!("bad subtree", ei.message);
    ei.clear();
    assert!(ei.error.is_none());
    assert!(ei.message.is_empty());

    let mut none: Option<&mut ErrorInfo> = None;
    assert_eq!(Error::NotFound, report_error(&mut none, Error::NotFound, "x"));
}
