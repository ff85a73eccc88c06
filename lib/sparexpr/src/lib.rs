#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![doc(html_logo_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]

mod aggregate;
mod error;
mod eval;
mod expression;
mod functions;
pub mod lexical;
mod overload;
mod term;
mod types;

pub use crate::aggregate::{Aggregator, SyncAggregator};
pub use crate::error::{EvaluationError, HookError};
pub use crate::eval::{
    AggregateHook, AsyncEvaluator, AsyncPreparedExpression, Bindings, ExistenceHook,
    ExtensionFunction, PreparedExpression, SyncEvaluator,
};
pub use crate::expression::{Expression, Transformer};
pub use crate::functions::{Arity, FunctionRegistry, RegularFunction, SpecialOperator};
pub use crate::overload::{ArgumentType, Implementation, OverloadCache, OverloadTree};
pub use crate::term::{
    DateParts, DateTimeValue, DurationValue, ExpressionLiteral, ExpressionTerm, LiteralValue,
    TermKind, TimeParts,
};
pub use crate::types::{
    Datatype, KnownType, OverrideType, SuperTypeProvider, TypeAncestry, TypeCache,
    TypeDiscoverer, TypeLattice,
};
