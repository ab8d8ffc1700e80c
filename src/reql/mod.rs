//! ReQL wire model.
//!
//! - **Datum** (`datum.rs`): the JSON-like value model, including the
//!   `$reql_type$` pseudo-type convention
//! - **Term Types** (`terms.rs`): every operation id the driver emits
//! - **AST** (`ast.rs`): the `Term` tree handed to the transport
//! - **Wire** (`wire.rs`): the JSON form of terms
//!
//! Nothing in here knows about native Rust types; that mapping lives in
//! [`crate::convert`] and [`crate::query`].

pub mod ast;
pub mod datum;
pub mod terms;
pub mod wire;

pub use ast::Term;
pub use datum::{Datum, PSEUDO_BINARY, PSEUDO_GROUPED_DATA, PSEUDO_TIME, REQL_TYPE_KEY};
pub use terms::TermType;
