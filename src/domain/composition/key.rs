//! Canonical composition keys
//!
//! Composition is order-independent: a key is built from the adapter set sorted by
//! adapter id, so permutations of the same weighted set map to the same key.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::adapter::AdapterRef;
use crate::domain::DomainError;

/// Canonical identity of a composed model
#[derive(Debug, Clone, Serialize)]
pub struct CompositionKey {
    base_model_id: String,
    adapters: Vec<AdapterRef>,
    #[serde(skip)]
    canonical: String,
    digest: String,
}

impl CompositionKey {
    /// Build a key from a base model and an adapter set in any order
    pub fn new(
        base_model_id: impl Into<String>,
        adapters: impl IntoIterator<Item = AdapterRef>,
    ) -> Result<Self, DomainError> {
        let base_model_id = base_model_id.into();

        if base_model_id.trim().is_empty() {
            return Err(DomainError::validation("Base model ID cannot be empty"));
        }

        let mut adapters: Vec<AdapterRef> = adapters.into_iter().collect();
        let mut seen = HashSet::with_capacity(adapters.len());

        for adapter in &adapters {
            adapter.validate()?;

            if !seen.insert(adapter.id()) {
                return Err(DomainError::validation(format!(
                    "Adapter '{}' appears more than once",
                    adapter.id()
                )));
            }
        }

        adapters.sort_by(|a, b| a.id().cmp(b.id()));

        let mut canonical = base_model_id.clone();
        for adapter in &adapters {
            canonical.push('\u{1f}');
            canonical.push_str(adapter.id());
            canonical.push('=');
            canonical.push_str(&adapter.canonical_weight());
        }

        let digest = hex::encode(Sha256::digest(canonical.as_bytes()));

        Ok(Self {
            base_model_id,
            adapters,
            canonical,
            digest,
        })
    }

    /// Key for the unmodified base model
    pub fn base(base_model_id: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(base_model_id, Vec::new())
    }

    pub fn base_model_id(&self) -> &str {
        &self.base_model_id
    }

    /// Adapters in canonical (id-sorted) order
    pub fn adapters(&self) -> &[AdapterRef] {
        &self.adapters
    }

    /// Whether this key names the base model with no adapters applied
    pub fn is_base(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Full hex SHA-256 digest of the canonical form
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// First 12 hex characters of the digest, for logs
    pub fn short_digest(&self) -> &str {
        &self.digest[..12]
    }

    /// Whether the key references the given adapter
    pub fn contains_adapter(&self, adapter_id: &str) -> bool {
        self.adapters.iter().any(|a| a.id() == adapter_id)
    }
}

impl PartialEq for CompositionKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for CompositionKey {}

impl Hash for CompositionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for CompositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.base_model_id)?;

        for (i, adapter) in self.adapters.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", adapter)?;
        }

        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(id: &str, weight: f64) -> AdapterRef {
        AdapterRef::new(id, weight).unwrap()
    }

    #[test]
    fn test_permutations_produce_equal_keys() {
        let k1 = CompositionKey::new(
            "llama-7b",
            vec![adapter("a", 0.5), adapter("b", 1.0), adapter("c", 0.25)],
        )
        .unwrap();
        let k2 = CompositionKey::new(
            "llama-7b",
            vec![adapter("c", 0.25), adapter("a", 0.5), adapter("b", 1.0)],
        )
        .unwrap();

        assert_eq!(k1, k2);
        assert_eq!(k1.digest(), k2.digest());
        assert_eq!(k1.adapters()[0].id(), "a");
        assert_eq!(k1.adapters()[2].id(), "c");
    }

    #[test]
    fn test_weights_distinguish_keys() {
        let k1 = CompositionKey::new("m", vec![adapter("a", 0.5)]).unwrap();
        let k2 = CompositionKey::new("m", vec![adapter("a", 0.6)]).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_base_model_distinguishes_keys() {
        let k1 = CompositionKey::new("m1", vec![adapter("a", 0.5)]).unwrap();
        let k2 = CompositionKey::new("m2", vec![adapter("a", 0.5)]).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_duplicate_adapter_rejected() {
        let result = CompositionKey::new("m", vec![adapter("a", 0.5), adapter("a", 0.7)]);
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_empty_base_model_rejected() {
        assert!(CompositionKey::base("").is_err());
    }

    #[test]
    fn test_base_key() {
        let key = CompositionKey::base("m").unwrap();
        assert!(key.is_base());
        assert_eq!(key.to_string(), "m[]");
        assert_eq!(key.short_digest().len(), 12);
    }

    #[test]
    fn test_display_uses_canonical_order() {
        let key = CompositionKey::new("m", vec![adapter("z", 1.0), adapter("a", 0.5)]).unwrap();
        assert_eq!(key.to_string(), "m[a@0.5,z@1]");
        assert!(key.contains_adapter("z"));
        assert!(!key.contains_adapter("q"));
    }
}
