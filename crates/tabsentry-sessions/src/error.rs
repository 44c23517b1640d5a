use thiserror::Error;

use tabsentry_registry::RegistryError;
use tabsentry_store::StoreError;

/// Errors during drain or reconciliation. Store failures abort the whole
/// pass — a partial drain would corrupt future matching.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, MatchError>;
