//! Strongly-typed identifiers for attendod

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an intern
    InternId
);

uuid_id!(
    /// Unique identifier for an attendance record (one check-in/check-out session)
    RecordId
);

uuid_id!(
    /// Unique identifier for a reported task
    TaskId
);

uuid_id!(
    /// Unique identifier for an evidence image attached to a task
    ImageId
);

uuid_id!(
    /// Unique identifier for a connected IPC client
    ClientId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_uniqueness() {
        let r1 = RecordId::new();
        let r2 = RecordId::new();
        assert_ne!(r1, r2);
    }

    #[test]
    fn ids_parse_from_display() {
        let intern = InternId::new();
        let parsed: InternId = intern.to_string().parse().unwrap();
        assert_eq!(intern, parsed);

        assert!("not-a-uuid".parse::<TaskId>().is_err());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let record = RecordId::new();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, format!("\"{}\"", record));

        let parsed: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }
}
