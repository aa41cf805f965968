//! Opaque identifier generators for re-materialized documents.

use uuid::Uuid;

/// Source of fresh output identifiers.
///
/// Identifiers name both the output annotation and its image, so they must
/// be valid file stems. The synchronizer rejects repeats within a run, so a
/// generator only needs to make collisions unlikely.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// Random version 4 UUIDs, hyphenated.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// A salt followed by a zero-padded counter, e.g. `run7-000001`.
///
/// Deterministic; useful for reproducible output names and for tests.
#[derive(Clone, Debug)]
pub struct SequentialIdGenerator {
    salt: String,
    next: u64,
}

impl SequentialIdGenerator {
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&mut self) -> String {
        let id = format!("{}-{:06}", self.salt, self.next);
        self.next += 1;
        id
    }
}
