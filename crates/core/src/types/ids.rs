use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_id {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn from_uuid(value: Uuid) -> Self {
                $name(value)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                $name(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = CoreError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(CoreError::validation(concat!($label, " is required")));
                }
                Uuid::parse_str(trimmed)
                    .map($name)
                    .map_err(|_| CoreError::validation(concat!($label, " is invalid")))
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::try_from(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id!(CommentId, "comment id");
uuid_id!(SolutionId, "solution id");
uuid_id!(UserId, "user id");

#[cfg(test)]
mod tests {
    use super::{CommentId, SolutionId};
    use crate::error::CoreError;

    #[test]
    fn parses_trimmed_uuid() {
        let raw = " 6f1c0a57-3f43-4f4a-9a0e-3f7a8b7e2c11 ";
        let id = SolutionId::try_from(raw).unwrap();
        assert_eq!(id.to_string(), raw.trim());
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(
            CommentId::try_from("  "),
            Err(CoreError::Validation(message)) if message == "comment id is required"
        ));
        assert!(matches!(
            CommentId::try_from("abc"),
            Err(CoreError::Validation(message)) if message == "comment id is invalid"
        ));
    }
}
