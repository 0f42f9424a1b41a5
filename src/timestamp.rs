use std::cmp;
use std::fmt;
use std::ops;
use std::time;

use serde::{
    de::{Deserialize, Deserializer, Error, SeqAccess},
    ser::{Serialize, Serializer},
};

const MAX_NANOSEC: u32 = 999_999_999;

/// Newtype name the value serializer watches for, so timestamps survive a trip through serde as
/// timestamps instead of as a plain tuple.
pub(crate) const TIMESTAMP_NAME: &str = "$boss::Timestamp";

/// A point in time, as seconds and nanoseconds since the Unix epoch.
///
/// BOSS only carries whole seconds on the wire, so encoding drops the nanoseconds. Decoding always
/// gives back a timestamp with zero nanoseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    sec: i64,
    nano: u32,
}

impl Timestamp {
    /// Create a timestamp from a raw seconds + nanoseconds value
    pub fn from_utc(sec: i64, nano: u32) -> Option<Timestamp> {
        if nano > MAX_NANOSEC {
            None
        } else {
            Some(Timestamp { sec, nano })
        }
    }

    pub fn from_sec(sec: i64) -> Timestamp {
        Timestamp { sec, nano: 0 }
    }

    /// Return the UNIX timestamp (number of seconds since January 1, 1970 0:00:00 UTC).
    pub fn timestamp_utc(&self) -> i64 {
        self.sec
    }

    /// Returns the number of nanoseconds past the second count.
    pub fn timestamp_subsec_nanos(&self) -> u32 {
        self.nano
    }

    /// Drop the sub-second part, which is exactly what encoding does.
    pub fn truncated(self) -> Timestamp {
        Timestamp::from_sec(self.sec)
    }

    /// Create a Timestamp based on the current system time. Fails if the system clock is set to
    /// before the Unix Epoch.
    pub fn now() -> Option<Timestamp> {
        match time::SystemTime::now().duration_since(time::SystemTime::UNIX_EPOCH) {
            Ok(t) => Timestamp::from_utc(t.as_secs() as i64, t.subsec_nanos()),
            Err(_) => None,
        }
    }
}

impl ops::Add<i64> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: i64) -> Self {
        Timestamp {
            sec: self.sec + rhs,
            nano: self.nano,
        }
    }
}

impl ops::Sub<i64> for Timestamp {
    type Output = Timestamp;
    fn sub(self, rhs: i64) -> Self {
        Timestamp {
            sec: self.sec - rhs,
            nano: self.nano,
        }
    }
}

impl cmp::Ord for Timestamp {
    fn cmp(&self, other: &Timestamp) -> cmp::Ordering {
        if self.sec == other.sec {
            self.nano.cmp(&other.nano)
        } else {
            self.sec.cmp(&other.sec)
        }
    }
}

impl cmp::PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Timestamp) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UTC: {} sec + {} ns", self.sec, self.nano)
    }
}

impl From<time::SystemTime> for Timestamp {
    fn from(t: time::SystemTime) -> Self {
        match t.duration_since(time::SystemTime::UNIX_EPOCH) {
            Ok(d) => Timestamp {
                sec: d.as_secs() as i64,
                nano: d.subsec_nanos(),
            },
            Err(e) => {
                let d = e.duration();
                let mut sec = -(d.as_secs() as i64);
                let mut nano = d.subsec_nanos();
                if nano > 0 {
                    sec -= 1;
                    nano = 1_000_000_000 - nano;
                }
                Timestamp { sec, nano }
            }
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(TIMESTAMP_NAME, &(self.sec, self.nano))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimeVisitor;

        impl<'de> serde::de::Visitor<'de> for TimeVisitor {
            type Value = Timestamp;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
                write!(fmt, "a timestamp")
            }

            fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                let (sec, nano) = <(i64, u32)>::deserialize(deserializer)?;
                Timestamp::from_utc(sec, nano).ok_or_else(|| D::Error::custom("Invalid timestamp"))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let sec: i64 = seq
                    .next_element()?
                    .ok_or_else(|| A::Error::invalid_length(0, &self))?;
                let nano: u32 = seq.next_element()?.unwrap_or(0);
                Timestamp::from_utc(sec, nano).ok_or_else(|| A::Error::custom("Invalid timestamp"))
            }
        }

        deserializer.deserialize_newtype_struct(TIMESTAMP_NAME, TimeVisitor)
    }
}
