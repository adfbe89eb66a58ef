use serde::{Deserialize, Serialize};

/// Sampling parameters forwarded to the base model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl GenerationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_builder() {
        let params = GenerationParams::new()
            .with_temperature(0.2)
            .with_max_tokens(64);

        assert_eq!(params.temperature, Some(0.2));
        assert_eq!(params.max_tokens, Some(64));
        assert!(params.top_p.is_none());
    }

    #[test]
    fn test_params_skip_unset_fields() {
        let json = serde_json::to_string(&GenerationParams::new().with_top_p(0.9)).unwrap();
        assert_eq!(json, r#"{"top_p":0.9}"#);
    }
}
