use tracing::warn;

use crate::error::Result;
use crate::traits::ListStore;

/// Run `body` inside a transaction (or savepoint, when one is already open).
///
/// Commits on `Ok`, rolls back on `Err`. The body's error is returned even if the rollback
/// itself fails; a failed commit is rolled back too.
pub fn transaction<S, T>(store: &mut S, body: impl FnOnce(&mut S) -> Result<T>) -> Result<T>
where
    S: ListStore + ?Sized,
{
    store.begin()?;

    match body(store) {
        Ok(value) => match store.commit() {
            Ok(()) => Ok(value),
            Err(e) => {
                if let Err(rb) = store.rollback() {
                    warn!(error = %rb, "rollback after failed commit also failed");
                }
                Err(e)
            }
        },
        Err(e) => {
            if let Err(rb) = store.rollback() {
                warn!(error = %rb, cause = %e, "rollback failed");
            }
            Err(e)
        }
    }
}
