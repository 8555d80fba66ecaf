//! Time at which certificates in a certification path are evaluated

use core::{cmp::Ordering, fmt, time::Duration};

use serde::{
    de::{self, Deserializer, Visitor},
    ser::Serializer,
    Deserialize, Serialize,
};

/// Time of interest for the validation of a certification path. Where validity checks are not
/// wanted, an `Option<TimeOfInterest>` set to `None` is used instead of a sentinel value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct TimeOfInterest(pub der::DateTime);

impl fmt::Display for TimeOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<der::DateTime> for TimeOfInterest {
    fn from(dt: der::DateTime) -> Self {
        TimeOfInterest(dt)
    }
}

impl TimeOfInterest {
    /// Create a [`TimeOfInterest`] from Unix epoch
    pub fn from_unix_secs(v: u64) -> der::Result<Self> {
        Ok(Self(der::DateTime::from_unix_duration(
            Duration::from_secs(v),
        )?))
    }

    /// Return Unix epoch (in seconds) for this value
    pub fn as_unix_secs(&self) -> u64 {
        self.0.unix_duration().as_secs()
    }

    /// Creates a [`TimeOfInterest`] for the current system time
    pub fn now() -> der::Result<Self> {
        Ok(Self(der::DateTime::from_system_time(
            ::std::time::SystemTime::now(),
        )?))
    }
}

impl PartialEq<x509_cert::time::Time> for TimeOfInterest {
    fn eq(&self, other: &x509_cert::time::Time) -> bool {
        self.0.eq(&other.to_date_time())
    }
}

impl PartialOrd<x509_cert::time::Time> for TimeOfInterest {
    fn partial_cmp(&self, other: &x509_cert::time::Time) -> Option<Ordering> {
        self.0.partial_cmp(&other.to_date_time())
    }
}

impl PartialEq<TimeOfInterest> for x509_cert::time::Time {
    fn eq(&self, other: &TimeOfInterest) -> bool {
        self.to_date_time().eq(&other.0)
    }
}

impl PartialOrd<TimeOfInterest> for x509_cert::time::Time {
    fn partial_cmp(&self, other: &TimeOfInterest) -> Option<Ordering> {
        self.to_date_time().partial_cmp(&other.0)
    }
}

impl Serialize for TimeOfInterest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.as_unix_secs())
    }
}

impl<'de> Deserialize<'de> for TimeOfInterest {
    fn deserialize<D>(deserializer: D) -> Result<TimeOfInterest, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ToiVisitor;

        impl<'de> Visitor<'de> for ToiVisitor {
            type Value = TimeOfInterest;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an integer between 0 and 2^64")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                TimeOfInterest::from_unix_secs(value)
                    .map_err(|_| E::custom(format_args!("time of interest out of range: {value}")))
            }
        }

        deserializer.deserialize_u64(ToiVisitor)
    }
}

#[test]
fn toi_ordering() {
    use der::Decode;
    use x509_cert::Certificate;

    let enc = include_bytes!("../../tests/examples/root.der");
    let cert = Certificate::from_der(enc).unwrap();
    let validity = &cert.tbs_certificate.validity;

    // 2023-11-14T22:13:20Z
    let toi = TimeOfInterest::from_unix_secs(1_700_000_000).unwrap();
    assert!(toi > validity.not_before);
    assert!(toi < validity.not_after);
    assert!(validity.not_after > toi);
    assert_eq!(1_700_000_000, toi.as_unix_secs());

    let toi = TimeOfInterest::from_unix_secs(validity.not_after.to_unix_duration().as_secs()).unwrap();
    assert!(toi == validity.not_after);
}

#[test]
fn toi_serde() {
    let toi = TimeOfInterest::from_unix_secs(1_700_000_000).unwrap();
    let s = serde_json::to_string(&toi).unwrap();
    assert_eq!("1700000000", s);
    let back: TimeOfInterest = serde_json::from_str(&s).unwrap();
    assert_eq!(toi, back);
    assert!(TimeOfInterest::now().unwrap() > toi);
}
