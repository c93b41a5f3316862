//! Completion values delivered by the store gateway
//!
//! Every gateway operation completes exactly once with one of these. They
//! are plain values so callers branch on them with `match` instead of
//! reading a success flag.

use super::errors::StoreError;

/// Result of loading an entity
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Found(T),
    /// The store has no record for the key
    NotFound,
    /// Transient or backend failure; distinct from `NotFound`
    Failed(StoreError),
}

impl<T> LoadOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, LoadOutcome::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            LoadOutcome::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> LoadOutcome<U> {
        match self {
            LoadOutcome::Found(value) => LoadOutcome::Found(f(value)),
            LoadOutcome::NotFound => LoadOutcome::NotFound,
            LoadOutcome::Failed(err) => LoadOutcome::Failed(err),
        }
    }
}

/// Result of a save or delete
#[derive(Debug)]
pub enum WriteOutcome {
    /// The write reached the backend
    Applied,
    /// Skipped: a later-issued write for the same key was already applied
    Superseded,
    Failed(StoreError),
}

impl WriteOutcome {
    /// Applied and superseded writes both leave the latest state persisted
    pub fn is_success(&self) -> bool {
        !matches!(self, WriteOutcome::Failed(_))
    }

    pub fn into_result(self) -> Result<(), StoreError> {
        match self {
            WriteOutcome::Failed(err) => Err(err),
            _ => Ok(()),
        }
    }
}

/// Value a pending operation resolves to if its task is dropped
pub trait Completion: Sized {
    fn abandoned() -> Self;
}

impl<T> Completion for LoadOutcome<T> {
    fn abandoned() -> Self {
        LoadOutcome::Failed(StoreError::Abandoned)
    }
}

impl Completion for WriteOutcome {
    fn abandoned() -> Self {
        WriteOutcome::Failed(StoreError::Abandoned)
    }
}

impl<T> Completion for Result<T, StoreError> {
    fn abandoned() -> Self {
        Err(StoreError::Abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superseded_counts_as_success() {
        assert!(WriteOutcome::Applied.is_success());
        assert!(WriteOutcome::Superseded.is_success());
        assert!(!WriteOutcome::abandoned().is_success());
        assert!(WriteOutcome::Superseded.into_result().is_ok());
    }

    #[test]
    fn test_load_outcome_map() {
        let outcome = LoadOutcome::Found(2).map(|v| v * 2);
        assert_eq!(outcome.found(), Some(4));
        assert!(!LoadOutcome::<u8>::NotFound.is_found());
        assert!(matches!(
            LoadOutcome::<u8>::abandoned(),
            LoadOutcome::Failed(StoreError::Abandoned)
        ));
    }
}
