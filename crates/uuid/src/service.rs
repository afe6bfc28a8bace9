//! Record identifiers and the monotonic storage clock.

use crate::{UuidError, UuidResult};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Canonical UUID representation (32 lowercase hex characters, no hyphens).
///
/// Once constructed the contained UUID is guaranteed to be in canonical form, so it can be
/// used directly in file names and storage paths.
///
/// # Construction
/// - [`UuidService::new`] generates a new canonical UUID (for new document records).
/// - [`UuidService::parse`] validates an externally supplied identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UuidService(Uuid);

impl Default for UuidService {
    fn default() -> Self {
        Self::new()
    }
}

impl UuidService {
    /// Generates a new random (v4) UUID in canonical form.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a UUID string that must already be in canonical form.
    ///
    /// This does **not** normalise other common UUID forms (hyphenated or uppercase).
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }

        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("'{}': {}", input, e)))
    }

    /// Returns the UUID as a `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical UUID form.
    ///
    /// Purely syntactic: exactly 32 bytes, lowercase hex only.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for UuidService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for UuidService {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UuidService::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for UuidService {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for UuidService {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UuidService::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Milliseconds since the Unix epoch, as handed out by [`MonotonicClock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampMillis(i64);

impl TimestampMillis {
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns the UTC instant for this timestamp, if it is representable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for TimestampMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TimestampMillis {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("Invalid timestamp '{}': {}", s, e)))
    }
}

/// Source of strictly increasing millisecond timestamps.
///
/// Each call to [`MonotonicClock::next`] returns the wall clock time, or one millisecond past
/// the previously issued value when the wall clock has not advanced (or has gone backwards).
/// The clock is lock-free and can be shared between tasks.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next timestamp.
    pub fn next(&self) -> TimestampMillis {
        self.next_from(Utc::now().timestamp_millis())
    }

    fn next_from(&self, now: i64) -> TimestampMillis {
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = if now > prev { now } else { prev + 1 };
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return TimestampMillis(candidate),
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_uuid() {
        let canonical = UuidService::new().to_string();
        assert_eq!(canonical.len(), 32);
        assert!(UuidService::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_valid_canonical_uuid() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let parsed = UuidService::parse(canonical).unwrap();
        assert_eq!(parsed.to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_uuid() {
        let result = UuidService::parse("550e8400-e29b-41d4-a716-446655440000");
        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_is_canonical_invalid() {
        assert!(!UuidService::is_canonical("550E8400E29B41D4A716446655440000"));
        assert!(!UuidService::is_canonical("550e8400e29b41d4a71644665544000"));
        assert!(!UuidService::is_canonical("550e8400e29b41d4a716446655440zzz"));
        assert!(!UuidService::is_canonical(""));
    }

    #[test]
    fn test_serde_uses_canonical_form() {
        let id = UuidService::parse("550e8400e29b41d4a716446655440000").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"550e8400e29b41d4a716446655440000\"");

        let back: UuidService = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_clock_strictly_increasing_same_instant() {
        let clock = MonotonicClock::new();
        let a = clock.next_from(1_700_000_000_000);
        let b = clock.next_from(1_700_000_000_000);
        let c = clock.next_from(1_699_999_999_000);

        assert_eq!(a.as_millis(), 1_700_000_000_000);
        assert_eq!(b.as_millis(), 1_700_000_000_001);
        assert_eq!(c.as_millis(), 1_700_000_000_002);
    }

    #[test]
    fn test_clock_follows_wall_clock_forward() {
        let clock = MonotonicClock::new();
        let a = clock.next_from(1_000);
        let b = clock.next_from(5_000);
        assert!(b > a);
        assert_eq!(b.as_millis(), 5_000);
    }

    #[test]
    fn test_clock_many_calls_unique() {
        let clock = MonotonicClock::new();
        let mut seen: Vec<i64> = (0..1_000).map(|_| clock.next().as_millis()).collect();
        let len = seen.len();
        seen.dedup();
        assert_eq!(seen.len(), len);
    }

    #[test]
    fn test_timestamp_round_trip_text() {
        let ts: TimestampMillis = "1686000000000".parse().unwrap();
        assert_eq!(ts.to_string(), "1686000000000");
        assert!(ts.to_datetime().is_some());
        assert!("soon".parse::<TimestampMillis>().is_err());
    }
}
