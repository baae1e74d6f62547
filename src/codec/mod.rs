//! JSON marshalling at the boundary.
//!
//! - `args`: JSON parameter arrays into text-format bind values
//! - `rows`: query results into named or positional JSON rows

pub mod args;
pub mod rows;

pub use args::decode_params;
pub use rows::{encode_rows, NamedRows, PositionalRows, RowFormat};
