//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `UserId` where an `AccountId` is expected.
//! All identifiers are assigned by the store as monotonically increasing integers.

use serde::{Deserialize, Serialize};

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the inner integer.
            #[must_use]
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user.");
typed_id!(AccountId, "Unique identifier for a balance-bearing account.");
typed_id!(TransactionId, "Unique identifier for a ledger transaction.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_inner_value() {
        let mut ids = vec![AccountId(9), AccountId(2), AccountId(5)];
        ids.sort();
        assert_eq!(ids, vec![AccountId(2), AccountId(5), AccountId(9)]);
    }

    #[test]
    fn test_parse_and_display() {
        let id: UserId = "17".parse().unwrap();
        assert_eq!(id, UserId(17));
        assert_eq!(id.to_string(), "17");
        assert!("abc".parse::<UserId>().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&TransactionId(3)).unwrap();
        assert_eq!(json, "3");
        let id: TransactionId = serde_json::from_str("3").unwrap();
        assert_eq!(id.into_inner(), 3);
    }
}
