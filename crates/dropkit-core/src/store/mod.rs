//! In-memory stores for input files and configured actions.
//!
//! Both stores carry a run lock. While it is held, user-facing mutations
//! fail with [`StoreError::RunInProgress`].

mod actions;
mod files;

pub use actions::ActionList;
pub use files::FileStore;

use crate::error::StoreError;

/// Move the item at `from` to `to`, keeping the relative order of the rest.
fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), StoreError> {
    let len = items.len();
    for index in [from, to] {
        if index >= len {
            return Err(StoreError::IndexOutOfRange { index, len });
        }
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    Ok(())
}
