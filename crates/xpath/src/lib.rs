//! Path-query engine used by findxml.
//!
//! Queries go through three phases:
//! - [`compile_xpath`] parses the expression and lowers it to stack IR,
//! - [`XPathExpression::bind`] resolves every function call (built-in library first,
//!   then the supplied [`QueryContext`]) and type-checks arguments statically,
//! - [`BoundExpression::select`] / [`BoundExpression::evaluate`] run the IR against
//!   any tree implementing [`XdmNode`].

pub mod compiler;
pub mod convert;
pub mod evaluator;
pub mod functions;
pub mod model;
pub mod parser;
pub mod runtime;
pub mod xdm;

pub use compiler::{XPathExpression, compile_xpath};
pub use evaluator::BoundExpression;
pub use model::{NodeKind, QName, XdmNode};
pub use parser::XPathParser;
pub use runtime::{
    CallCtx, EmptyQueryContext, Error, ErrorCode, FunctionImpl, FunctionRegistry, QueryContext,
    ResolvedFunction, StaticContext, StaticContextBuilder, StaticType, function_impl,
};
pub use xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence};
