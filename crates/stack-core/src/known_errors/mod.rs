//! The known error taxonomy.
//!
//! Known errors are typed, wire-serialisable errors with a stable code. Kinds
//! form a single-rooted hierarchy declared once in [`KnownErrorKind`]; only
//! concrete kinds are ever put on the wire.

mod error;
mod kind;

pub use error::{KnownError, KnownErrorBody};
pub use kind::{KindDeclaration, KnownErrorKind, KnownErrorRegistry, RegistryError};

use crate::error::Error;

/// Returns true if `value` is a known error of `kind` or one of its descendants.
///
/// Accepts a bare [`KnownError`] or an [`Error::Known`]; every other error is
/// outside the taxonomy and never matches.
pub fn is_instance(value: &(dyn std::error::Error + 'static), kind: KnownErrorKind) -> bool {
    if let Some(known) = value.downcast_ref::<KnownError>() {
        return known.is(kind);
    }
    value
        .downcast_ref::<Error>()
        .is_some_and(|error| error.is_known(kind))
}
