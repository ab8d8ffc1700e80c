//! Expression compilation.
//!
//! Host-language predicates and projections are described as [`Expr`]
//! trees and lowered by the [`QueryCompiler`] into ReQL [`Term`]s.
//! Anything without a server-side counterpart is folded on the client
//! when it does not depend on a lambda parameter.
//!
//! [`Term`]: crate::reql::Term

pub mod compiler;
pub mod defaults;
pub mod eval;
pub mod expr;
pub mod registry;
pub mod scope;
pub mod template;

pub use compiler::{Lowering, QueryCompiler};
pub use defaults::register_defaults;
pub use eval::evaluate;
pub use expr::{BinaryOp, Constructor, Expr, Lambda, Member, Method, Parameter, UnaryOp};
pub use registry::ExpressionRegistry;
pub use scope::Scope;
pub use template::TermTemplate;
