//! Identifier newtypes for transit entities.
//!
//! All identifiers wrap `Arc<str>` so they can be cloned freely between
//! clusters, candidates and poll snapshots.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

macro_rules! impl_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(s.as_ref().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

impl_identifier!(
    /// Provider id of a physical station (a pole on one side of the street).
    StationId
);
impl_identifier!(
    /// Provider uid of a route-specific stop record.
    StopUid
);
impl_identifier!(
    /// Provider uid of a route.
    RouteUid
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_debug() {
        let id = StationId::new("TPE1234");
        assert_eq!(id.to_string(), "TPE1234");
        assert_eq!(format!("{id:?}"), "StationId(TPE1234)");
    }

    #[test]
    fn serializes_as_plain_string() {
        let uid = RouteUid::from("TPE10132");
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, "\"TPE10132\"");

        let back: RouteUid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uid);
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(StopUid::new("A"), StopUid::from(String::from("A")));
        assert_ne!(StopUid::new("A"), StopUid::new("B"));
    }
}
