//! Client identifier generation.
//!
//! Identifiers are 10 characters drawn from the 62-symbol alphanumeric
//! alphabet using the thread-local CSPRNG from `rand`. A generator does not
//! know about the registry: uniqueness among live clients is checked by the
//! registry on insert, and a collision is reported to the client rather than
//! retried.

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::registry::ClientId;

/// Number of characters in a generated identifier.
pub const ID_LENGTH: usize = 10;

/// Source of client identifiers.
///
/// The router holds one of these behind an `Arc`, so a server can be built
/// with a deterministic generator for tests.
pub trait IdentityGenerator: Send + Sync + 'static {
    /// Produces a new identifier. Not guaranteed to be unique.
    fn generate(&self) -> ClientId;
}

/// Default generator backed by `rand`'s cryptographically secure thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdentityGenerator for RandomIdGenerator {
    fn generate(&self) -> ClientId {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LENGTH)
            .map(char::from)
            .collect()
    }
}

impl<F> IdentityGenerator for F
where
    F: Fn() -> ClientId + Send + Sync + 'static,
{
    fn generate(&self) -> ClientId {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_id_shape() {
        let id = RandomIdGenerator.generate();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generated_ids_differ() {
        let ids: HashSet<_> = (0..1000).map(|_| RandomIdGenerator.generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_closure_generator() {
        let fixed = || "fixed00000".to_string();
        assert_eq!(fixed.generate(), "fixed00000");
    }
}
