use crate::config::{MAX_BATCH, MIN_BATCH};

/// What the caller asked for, before normalization.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub count: usize,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, count: usize) -> Self {
        Self {
            prompt: prompt.into(),
            count,
        }
    }

    /// Trimmed prompt, or `None` when there is nothing to generate.
    pub fn normalized_prompt(&self) -> Option<&str> {
        let prompt = self.prompt.trim();
        (!prompt.is_empty()).then_some(prompt)
    }

    /// Batch size clamped into the supported range; never rejected.
    pub fn normalized_count(&self) -> usize {
        self.count.clamp(MIN_BATCH, MAX_BATCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_is_clamped() {
        assert_eq!(GenerationRequest::new("cat", 9).normalized_count(), 4);
        assert_eq!(GenerationRequest::new("cat", 0).normalized_count(), 1);
        assert_eq!(GenerationRequest::new("cat", 3).normalized_count(), 3);
    }

    #[test]
    fn test_prompt_normalization() {
        assert_eq!(GenerationRequest::new("  cat ", 1).normalized_prompt(), Some("cat"));
        assert_eq!(GenerationRequest::new(" \t\n", 1).normalized_prompt(), None);
        assert_eq!(GenerationRequest::new("", 2).normalized_prompt(), None);
    }
}
