//! Data models shared by the stores, the processing stages and the pipeline.

mod action;
mod file_entry;
mod run;

pub use action::*;
pub use file_entry::*;
pub use run::*;

pub use crate::ids::{ActionId, FileId};
