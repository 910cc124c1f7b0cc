use crate::error::InputError;

/// Maximum length of one sentence sent for synthesis
pub const MAX_SENTENCE_LENGTH: usize = 5000;

/// Validate a cleaned sentence before it is enqueued
pub fn validate_sentence(text: &str) -> Result<(), InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }
    if text.chars().count() > MAX_SENTENCE_LENGTH {
        return Err(InputError::TooLong {
            max: MAX_SENTENCE_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sentence_valid() {
        assert!(validate_sentence("Hello").is_ok());
        assert!(validate_sentence(&"a".repeat(MAX_SENTENCE_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_sentence_empty() {
        assert_eq!(validate_sentence(""), Err(InputError::Empty));
        assert_eq!(validate_sentence(" \t "), Err(InputError::Empty));
    }

    #[test]
    fn test_validate_sentence_too_long() {
        let long_text = "a".repeat(6000);
        let result = validate_sentence(&long_text);
        assert_eq!(result, Err(InputError::TooLong { max: 5000 }));
        assert!(result.unwrap_err().to_string().contains("too long"));
    }
}
