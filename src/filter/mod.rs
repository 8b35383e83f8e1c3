//! Filter expression language.
//!
//! Filters are parsed once from their JSON wire form into a [`Filter`] tree
//! and then evaluated with [`matches`] against each record snapshot.

mod eval;
mod expr;

pub use eval::{get_field, matches};
pub use expr::{CompareOp, FieldPath, Filter};
