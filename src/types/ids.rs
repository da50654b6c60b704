//! Strongly typed platform identifiers
//!
//! Platform ids are opaque snowflake strings. Wrapping them keeps a
//! community id from being passed where a channel id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! platform_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

platform_id!(
    /// A community (guild) on the messaging platform
    CommunityId
);
platform_id!(
    /// A member (user) of a community
    MemberId
);
platform_id!(
    /// A text channel inside a community
    ChannelId
);
platform_id!(
    /// A role defined on a community
    RoleId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        let id = CommunityId::new("1316463410682007572");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1316463410682007572\"");

        let back: CommunityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_display() {
        assert_eq!(ChannelId::from("42").to_string(), "42");
    }
}
