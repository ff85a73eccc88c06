//! The built-in operators and functions.

mod casts;
mod date_time;
mod numeric;
mod operators;
pub(crate) mod special;
mod strings;
mod terms;

use crate::error::EvaluationError;
use crate::overload::{ArgumentType, Implementation, OverloadCache, OverloadTree};
use crate::term::{DateTimeValue, DurationValue, ExpressionTerm, LiteralValue};
use crate::types::SuperTypeProvider;
use oxrdf::NamedNodeRef;
use oxsdatatypes::{
    Date, DateTime, DayTimeDuration, Decimal, Double, Duration, Float, Integer, Time,
    YearMonthDuration,
};
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

pub(crate) use operators::{compare, equals, same_term};
pub use special::SpecialOperator;

/// The number of arguments a function accepts.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Arity {
    Fixed(usize),
    OneOf(&'static [usize]),
    Variadic,
}

impl Arity {
    #[inline]
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Fixed(expected) => count == expected,
            Self::OneOf(allowed) => allowed.contains(&count),
            Self::Variadic => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(count) => write!(f, "{count}"),
            Self::OneOf(allowed) => {
                for (i, count) in allowed.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{count}")?;
                }
                Ok(())
            }
            Self::Variadic => f.write_str("any number of"),
        }
    }
}

/// A function whose arguments are evaluated before an overload is picked.
#[derive(Clone)]
pub struct RegularFunction {
    name: &'static str,
    arity: Arity,
    overloads: OverloadTree,
}

impl RegularFunction {
    #[inline]
    pub fn new(name: &'static str, arity: Arity) -> Self {
        Self {
            name,
            arity,
            overloads: OverloadTree::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_overload(
        mut self,
        signature: &[ArgumentType],
        implementation: impl Fn(&[ExpressionTerm]) -> Result<ExpressionTerm, EvaluationError> + 'static,
    ) -> Self {
        self.overloads
            .add_overload(signature, Rc::new(implementation) as Implementation);
        self
    }

    #[must_use]
    pub fn with_nullary(
        self,
        implementation: impl Fn() -> Result<ExpressionTerm, EvaluationError> + 'static,
    ) -> Self {
        let name = self.name;
        self.with_overload(&[], move |args| match args {
            [] => implementation(),
            _ => Err(arity_error(name, Arity::Fixed(0), args)),
        })
    }

    #[must_use]
    pub fn with_unary(
        self,
        parameter: impl Into<ArgumentType>,
        implementation: impl Fn(&ExpressionTerm) -> Result<ExpressionTerm, EvaluationError> + 'static,
    ) -> Self {
        let name = self.name;
        self.with_overload(&[parameter.into()], move |args| match args {
            [a] => implementation(a),
            _ => Err(arity_error(name, Arity::Fixed(1), args)),
        })
    }

    #[must_use]
    pub fn with_binary(
        self,
        parameters: [ArgumentType; 2],
        implementation: impl Fn(&ExpressionTerm, &ExpressionTerm) -> Result<ExpressionTerm, EvaluationError>
        + 'static,
    ) -> Self {
        let name = self.name;
        self.with_overload(&parameters, move |args| match args {
            [a, b] => implementation(a, b),
            _ => Err(arity_error(name, Arity::Fixed(2), args)),
        })
    }

    #[must_use]
    pub fn with_ternary(
        self,
        parameters: [ArgumentType; 3],
        implementation: impl Fn(
            &ExpressionTerm,
            &ExpressionTerm,
            &ExpressionTerm,
        ) -> Result<ExpressionTerm, EvaluationError>
        + 'static,
    ) -> Self {
        let name = self.name;
        self.with_overload(&parameters, move |args| match args {
            [a, b, c] => implementation(a, b, c),
            _ => Err(arity_error(name, Arity::Fixed(3), args)),
        })
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn check_arity(&self, actual: usize) -> Result<(), EvaluationError> {
        if self.arity.accepts(actual) {
            Ok(())
        } else {
            Err(EvaluationError::InvalidArity {
                function: self.name.into(),
                expected: self.arity,
                actual,
            })
        }
    }

    /// Picks the implementation matching the argument types and applies it.
    pub async fn apply(
        &self,
        args: &[ExpressionTerm],
        provider: &SuperTypeProvider,
        cache: Option<&OverloadCache>,
    ) -> Result<ExpressionTerm, EvaluationError> {
        let implementation = self
            .overloads
            .search(self.name, args, provider, cache)
            .await
            .ok_or_else(|| EvaluationError::NoOverloadMatch {
                function: self.name.into(),
                arguments: args.iter().map(ExpressionTerm::type_name).collect(),
            })?;
        implementation(args)
    }
}

impl fmt::Debug for RegularFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegularFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

fn arity_error(name: &'static str, expected: Arity, args: &[ExpressionTerm]) -> EvaluationError {
    EvaluationError::InvalidArity {
        function: name.into(),
        expected,
        actual: args.len(),
    }
}

/// All the built-in functions, by operator symbol or function name and by IRI.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    operators: FxHashMap<&'static str, Rc<RegularFunction>>,
    named: FxHashMap<&'static str, Rc<RegularFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            operators: FxHashMap::default(),
            named: FxHashMap::default(),
        };
        operators::register(&mut registry);
        numeric::register(&mut registry);
        strings::register(&mut registry);
        date_time::register(&mut registry);
        terms::register(&mut registry);
        casts::register(&mut registry);
        registry
    }

    fn add(&mut self, function: RegularFunction) {
        self.operators.insert(function.name, Rc::new(function));
    }

    fn add_named(&mut self, function: RegularFunction) {
        self.named.insert(function.name, Rc::new(function));
    }

    /// A built-in operator or function, like `+` or `STRLEN`.
    #[inline]
    pub fn operator(&self, name: &str) -> Option<Rc<RegularFunction>> {
        self.operators.get(name).map(Rc::clone)
    }

    /// A built-in function identified by an IRI, like the XSD casts.
    #[inline]
    pub fn named(&self, iri: NamedNodeRef<'_>) -> Option<Rc<RegularFunction>> {
        self.named.get(iri.as_str()).map(Rc::clone)
    }
}

impl Default for FunctionRegistry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

fn literal_value<'a>(
    term: &'a ExpressionTerm,
    expected: &'static str,
) -> Result<&'a LiteralValue, EvaluationError> {
    term.value()
        .ok_or_else(|| EvaluationError::type_coercion(term, expected))
}

pub(crate) fn integer_arg(term: &ExpressionTerm) -> Result<Integer, EvaluationError> {
    match literal_value(term, "an integer")? {
        LiteralValue::Integer(value) => Ok(*value),
        _ => Err(EvaluationError::type_coercion(term, "an integer")),
    }
}

pub(crate) fn decimal_arg(term: &ExpressionTerm) -> Result<Decimal, EvaluationError> {
    match literal_value(term, "a decimal")? {
        LiteralValue::Integer(value) => Ok((*value).into()),
        LiteralValue::Decimal(value) => Ok(*value),
        _ => Err(EvaluationError::type_coercion(term, "a decimal")),
    }
}

pub(crate) fn float_arg(term: &ExpressionTerm) -> Result<Float, EvaluationError> {
    match literal_value(term, "a float")? {
        LiteralValue::Integer(value) => Ok((*value).into()),
        LiteralValue::Decimal(value) => Ok((*value).into()),
        LiteralValue::Float(value) => Ok(*value),
        _ => Err(EvaluationError::type_coercion(term, "a float")),
    }
}

pub(crate) fn double_arg(term: &ExpressionTerm) -> Result<Double, EvaluationError> {
    match literal_value(term, "a double")? {
        LiteralValue::Integer(value) => Ok((*value).into()),
        LiteralValue::Decimal(value) => Ok((*value).into()),
        LiteralValue::Float(value) => Ok((*value).into()),
        LiteralValue::Double(value) => Ok(*value),
        _ => Err(EvaluationError::type_coercion(term, "a double")),
    }
}

pub(crate) fn boolean_arg(term: &ExpressionTerm) -> Result<bool, EvaluationError> {
    match literal_value(term, "a boolean")? {
        LiteralValue::Boolean(value) => Ok(*value),
        _ => Err(EvaluationError::type_coercion(term, "a boolean")),
    }
}

/// A string without language tag.
pub(crate) fn string_arg(term: &ExpressionTerm) -> Result<&str, EvaluationError> {
    match literal_value(term, "a string")? {
        LiteralValue::String => Ok(term.lexical_form()),
        _ => Err(EvaluationError::type_coercion(term, "a string")),
    }
}

/// A string with its optional language tag.
pub(crate) fn plain_arg(term: &ExpressionTerm) -> Result<(&str, Option<&str>), EvaluationError> {
    term.as_literal()
        .and_then(|literal| literal.as_plain())
        .ok_or_else(|| EvaluationError::type_coercion(term, "a string"))
}

/// Two strings that may be combined: the second one has no language tag or the same as the first one.
pub(crate) fn compatible_plain_args<'a>(
    a: &'a ExpressionTerm,
    b: &'a ExpressionTerm,
) -> Result<(&'a str, &'a str, Option<&'a str>), EvaluationError> {
    let (value1, language1) = plain_arg(a)?;
    let (value2, language2) = plain_arg(b)?;
    if language2.is_none() || language1 == language2 {
        Ok((value1, value2, language1))
    } else {
        Err(EvaluationError::invalid_argument(format!(
            "{a} and {b} do not have compatible language tags"
        )))
    }
}

pub(crate) fn calendar_arg(term: &ExpressionTerm) -> Result<&DateTimeValue, EvaluationError> {
    match literal_value(term, "a date or a time")? {
        LiteralValue::DateTime(value) => Ok(value),
        _ => Err(EvaluationError::type_coercion(term, "a date or a time")),
    }
}

pub(crate) fn date_time_arg(term: &ExpressionTerm) -> Result<DateTime, EvaluationError> {
    calendar_arg(term)?
        .to_date_time()
        .ok_or_else(|| EvaluationError::type_coercion(term, "a dateTime"))
}

pub(crate) fn date_arg(term: &ExpressionTerm) -> Result<Date, EvaluationError> {
    calendar_arg(term)?
        .to_date()
        .ok_or_else(|| EvaluationError::type_coercion(term, "a date"))
}

pub(crate) fn time_arg(term: &ExpressionTerm) -> Result<Time, EvaluationError> {
    calendar_arg(term)?
        .to_time()
        .ok_or_else(|| EvaluationError::type_coercion(term, "a time"))
}

fn duration_value(term: &ExpressionTerm) -> Result<&DurationValue, EvaluationError> {
    match literal_value(term, "a duration")? {
        LiteralValue::Duration(value) => Ok(value),
        _ => Err(EvaluationError::type_coercion(term, "a duration")),
    }
}

pub(crate) fn duration_arg(term: &ExpressionTerm) -> Result<Duration, EvaluationError> {
    duration_value(term)?
        .to_duration()
        .ok_or_else(|| EvaluationError::type_coercion(term, "a representable duration"))
}

pub(crate) fn day_time_duration_arg(
    term: &ExpressionTerm,
) -> Result<DayTimeDuration, EvaluationError> {
    duration_value(term)?
        .to_day_time_duration()
        .ok_or_else(|| EvaluationError::type_coercion(term, "a dayTimeDuration"))
}

pub(crate) fn year_month_duration_arg(
    term: &ExpressionTerm,
) -> Result<YearMonthDuration, EvaluationError> {
    duration_value(term)?
        .to_year_month_duration()
        .ok_or_else(|| EvaluationError::type_coercion(term, "a yearMonthDuration"))
}

/// Turns an overflow into an error.
pub(crate) fn checked<T>(value: Option<T>, operation: &'static str) -> Result<T, EvaluationError> {
    value.ok_or_else(|| EvaluationError::invalid_argument(format!("{operation} overflow")))
}
