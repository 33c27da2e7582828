//! Triple sources: where statements are read from and written to.
//!
//! The mapper only needs pattern lookup, add/remove and a transaction
//! boundary. [`MemoryTripleSource`] keeps everything in an ordered set;
//! [`OxigraphTripleSource`] wraps an oxigraph [`Store`](oxigraph::store::Store).

pub mod memory;
pub mod oxigraph_store;

pub use memory::MemoryTripleSource;
pub use oxigraph_store::OxigraphTripleSource;

use crate::convert::GraphFilter;
use crate::error::{MapperError, Result};
use crate::model::{RdfKey, Statement};

pub trait TripleSource {
    /// Statements matching the pattern; `None` matches anything.
    fn query(
        &self,
        subject: Option<&RdfKey>,
        predicate: Option<&str>,
        graph: &GraphFilter,
    ) -> Result<Vec<Statement>>;

    fn add(&mut self, statements: &[Statement]) -> Result<()>;

    fn remove(&mut self, statements: &[Statement]) -> Result<()>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn in_transaction(&self) -> bool;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes everything matching the pattern and returns how much that was.
    fn remove_matching(
        &mut self,
        subject: Option<&RdfKey>,
        predicate: Option<&str>,
        graph: &GraphFilter,
    ) -> Result<usize> {
        let matching = self.query(subject, predicate, graph)?;
        self.remove(&matching)?;
        Ok(matching.len())
    }
}

/// Runs `work` between `begin` and `commit`; every error rolls back.
pub fn in_transaction<S, T, F>(source: &mut S, work: F) -> Result<T>
where
    S: TripleSource + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    source.begin()?;
    match work(source) {
        Ok(value) => match source.commit() {
            Ok(()) => Ok(value),
            Err(err) => {
                if let Err(rollback_err) = source.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failed commit failed");
                }
                Err(err)
            }
        },
        Err(err) => {
            if let Err(rollback_err) = source.rollback() {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

fn transaction_state_error(expected_open: bool) -> MapperError {
    if expected_open {
        MapperError::Source("no transaction is open".to_string())
    } else {
        MapperError::Source("a transaction is already open".to_string())
    }
}
