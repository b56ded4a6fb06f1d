use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

/// Name of the producer that submitted a task (e.g. `"task"`, `"engagement"`).
pub type TaskType = String;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrow the raw identifier.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id! {
    /// Opaque key of an automated identity that runs one task at a time.
    AccountId
}

string_id! {
    /// Identifier the runner uses for a unit of work.
    ///
    /// The same value must be passed back on release.
    TaskId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = AccountId::from("acc_1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""acc_1""#);

        let back: TaskId = serde_json::from_str(r#""T1""#).unwrap();
        assert_eq!(back.as_str(), "T1");
        assert_eq!(back.to_string(), "T1");
    }
}
