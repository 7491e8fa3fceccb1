//! Schema identifier generation.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Prefix of every generated schema id.
pub const SCHEMA_ID_PREFIX: &str = "SCHEMA_ID_";

/// Source of fresh schema identifiers.
///
/// Injected into the merge so tests can use deterministic ids.
pub trait IdGenerator {
    /// Produce a new identifier. Successive calls must not repeat.
    fn next_id(&mut self) -> String;
}

/// Random identifiers: `SCHEMA_ID_` followed by 16 alphanumeric characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        format!("{SCHEMA_ID_PREFIX}{token}")
    }
}

/// Deterministic identifiers: `SCHEMA_ID_0`, `SCHEMA_ID_1`, ...
#[derive(Debug, Default, Clone)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{SCHEMA_ID_PREFIX}{}", self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential() {
        let mut ids = SequentialIds::new();
        assert_eq!(ids.next_id(), "SCHEMA_ID_0");
        assert_eq!(ids.next_id(), "SCHEMA_ID_1");
    }

    #[test]
    fn test_random_prefix() {
        let mut ids = RandomIds;
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(a.starts_with(SCHEMA_ID_PREFIX));
        assert_eq!(a.len(), SCHEMA_ID_PREFIX.len() + 16);
        assert_ne!(a, b);
    }
}
