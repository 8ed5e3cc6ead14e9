use serde::Serialize;

use crate::error::CoreError;

pub const MAX_CONTENT_CHARS: usize = 2000;

/// Comment body, trimmed and between 1 and [`MAX_CONTENT_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommentContent(String);

impl CommentContent {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for CommentContent {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CoreError::validation("content is required"));
        }
        if trimmed.chars().count() > MAX_CONTENT_CHARS {
            return Err(CoreError::validation(format!(
                "content must be between 1 and {MAX_CONTENT_CHARS} characters"
            )));
        }
        Ok(CommentContent(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{CommentContent, MAX_CONTENT_CHARS};

    #[test]
    fn trims_surrounding_whitespace() {
        let content = CommentContent::try_from("  nice  \n").unwrap();
        assert_eq!(content.as_str(), "nice");
    }

    #[test]
    fn rejects_blank() {
        assert!(CommentContent::try_from("").is_err());
        assert!(CommentContent::try_from(" \t\n ").is_err());
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let at_limit = "é".repeat(MAX_CONTENT_CHARS);
        assert!(CommentContent::try_from(at_limit.as_str()).is_ok());
        let over = "a".repeat(MAX_CONTENT_CHARS + 1);
        assert!(CommentContent::try_from(over.as_str()).is_err());
    }

    #[test]
    fn limit_applies_after_trimming() {
        let padded = format!("  {}  ", "a".repeat(MAX_CONTENT_CHARS));
        assert!(CommentContent::try_from(padded.as_str()).is_ok());
    }
}
