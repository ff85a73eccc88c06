use crate::error::EvaluationError;
use crate::eval::ExtensionFunction;
use crate::functions::{FunctionRegistry, RegularFunction, SpecialOperator};
use oxrdf::{NamedNode, Term, Variable};
use rustc_hash::FxHashMap;
use spargebra::algebra::{
    AggregateExpression, Expression as AlgebraExpression, Function, GraphPattern,
};
use std::rc::Rc;

/// An expression ready to be evaluated.
///
/// It is built by a [`Transformer`] from a [`spargebra`] expression.
/// All function names have been resolved and all arities checked.
#[derive(Debug, Clone)]
pub enum Expression {
    /// An IRI or a literal, parsed when evaluated because its datatype might need to be discovered
    Constant(Term),
    Variable(Variable),
    /// A built-in function, its arguments are evaluated before an overload is picked
    Operator {
        function: Rc<RegularFunction>,
        args: Vec<Self>,
    },
    /// An operator that gets its arguments unevaluated
    Special {
        operator: SpecialOperator,
        args: Vec<Self>,
    },
    Extension {
        name: NamedNode,
        function: ExtensionFunction,
        args: Vec<Self>,
    },
    /// `EXISTS`, delegated to the existence hook
    Exists(Box<GraphPattern>),
    /// The value of an aggregate, delegated to the aggregate hook
    Aggregate {
        variable: Variable,
        aggregate: Box<AggregateExpression>,
    },
}

/// Builds evaluable [`Expression`]s out of [`spargebra`] expressions.
///
/// ```
/// use sparexpr::Transformer;
/// use spargebra::algebra::Expression;
/// use spargebra::term::Variable;
///
/// let expression = Expression::Add(
///     Box::new(Expression::Variable(Variable::new("a")?)),
///     Box::new(Expression::Variable(Variable::new("b")?)),
/// );
/// Transformer::default().transform(&expression)?;
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone, Default)]
pub struct Transformer {
    registry: Rc<FunctionRegistry>,
    extensions: FxHashMap<NamedNode, ExtensionFunction>,
    aggregates: FxHashMap<Variable, AggregateExpression>,
}

impl Transformer {
    #[inline]
    pub fn new(registry: Rc<FunctionRegistry>) -> Self {
        Self {
            registry,
            extensions: FxHashMap::default(),
            aggregates: FxHashMap::default(),
        }
    }

    /// Registers a function to call when `name` is not a built-in function.
    #[inline]
    #[must_use]
    pub fn with_extension_function(mut self, name: NamedNode, function: ExtensionFunction) -> Self {
        self.extensions.insert(name, function);
        self
    }

    /// Declares which variables stand for an aggregate value.
    #[inline]
    #[must_use]
    pub fn with_aggregates(
        mut self,
        aggregates: impl IntoIterator<Item = (Variable, AggregateExpression)>,
    ) -> Self {
        self.aggregates.extend(aggregates);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_registry(mut self, registry: Rc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[inline]
    pub fn registry(&self) -> &Rc<FunctionRegistry> {
        &self.registry
    }

    pub fn transform(&self, expression: &AlgebraExpression) -> Result<Expression, EvaluationError> {
        Ok(match expression {
            AlgebraExpression::NamedNode(node) => Expression::Constant(node.clone().into()),
            AlgebraExpression::Literal(literal) => Expression::Constant(literal.clone().into()),
            AlgebraExpression::Variable(variable) => {
                if let Some(aggregate) = self.aggregates.get(variable) {
                    Expression::Aggregate {
                        variable: variable.clone(),
                        aggregate: Box::new(aggregate.clone()),
                    }
                } else {
                    Expression::Variable(variable.clone())
                }
            }
            AlgebraExpression::Or(a, b) => self.special(SpecialOperator::Or, [&**a, &**b])?,
            AlgebraExpression::And(a, b) => self.special(SpecialOperator::And, [&**a, &**b])?,
            AlgebraExpression::Equal(a, b) => self.operator("=", [&**a, &**b])?,
            AlgebraExpression::SameTerm(a, b) => self.operator("sameTerm", [&**a, &**b])?,
            AlgebraExpression::Greater(a, b) => self.operator(">", [&**a, &**b])?,
            AlgebraExpression::GreaterOrEqual(a, b) => self.operator(">=", [&**a, &**b])?,
            AlgebraExpression::Less(a, b) => self.operator("<", [&**a, &**b])?,
            AlgebraExpression::LessOrEqual(a, b) => self.operator("<=", [&**a, &**b])?,
            AlgebraExpression::In(needle, candidates) => self.special(
                SpecialOperator::In,
                std::iter::once(&**needle).chain(candidates),
            )?,
            AlgebraExpression::Add(a, b) => self.operator("+", [&**a, &**b])?,
            AlgebraExpression::Subtract(a, b) => self.operator("-", [&**a, &**b])?,
            AlgebraExpression::Multiply(a, b) => self.operator("*", [&**a, &**b])?,
            AlgebraExpression::Divide(a, b) => self.operator("/", [&**a, &**b])?,
            AlgebraExpression::UnaryPlus(a) => self.operator("unary +", [&**a])?,
            AlgebraExpression::UnaryMinus(a) => self.operator("unary -", [&**a])?,
            AlgebraExpression::Not(a) => self.operator("!", [&**a])?,
            AlgebraExpression::Exists(pattern) => Expression::Exists(pattern.clone()),
            AlgebraExpression::Bound(variable) => Expression::Special {
                operator: SpecialOperator::Bound,
                args: vec![Expression::Variable(variable.clone())],
            },
            AlgebraExpression::If(a, b, c) => {
                self.special(SpecialOperator::If, [&**a, &**b, &**c])?
            }
            AlgebraExpression::Coalesce(args) => self.special(SpecialOperator::Coalesce, args)?,
            AlgebraExpression::FunctionCall(function, args) => self.function_call(function, args)?,
            // Variants only available with some spargebra features
            #[expect(unreachable_patterns)]
            _ => {
                return Err(EvaluationError::InvalidExpression(format!(
                    "Unsupported expression {expression}"
                )));
            }
        })
    }

    fn function_call(
        &self,
        function: &Function,
        args: &[AlgebraExpression],
    ) -> Result<Expression, EvaluationError> {
        let special = match function {
            Function::Iri => Some(SpecialOperator::Iri),
            Function::BNode => Some(SpecialOperator::BNode),
            Function::Now => Some(SpecialOperator::Now),
            Function::Concat => Some(SpecialOperator::Concat),
            _ => None,
        };
        if let Some(special) = special {
            return self.special(special, args);
        }
        if let Function::Custom(name) = function {
            if let Some(function) = self.registry.named(name.as_ref()) {
                return self.call(function, args);
            }
            let Some(extension) = self.extensions.get(name) else {
                return Err(EvaluationError::UnknownNamedOperator(name.clone()));
            };
            return Ok(Expression::Extension {
                name: name.clone(),
                function: extension.clone(),
                args: self.transform_all(args)?,
            });
        }
        let name = builtin_name(function)
            .ok_or_else(|| EvaluationError::UnknownOperator(function.to_string()))?;
        let function = self
            .registry
            .operator(name)
            .ok_or_else(|| EvaluationError::UnknownOperator(name.into()))?;
        self.call(function, args)
    }

    fn operator<'a>(
        &self,
        name: &str,
        args: impl IntoIterator<Item = &'a AlgebraExpression>,
    ) -> Result<Expression, EvaluationError> {
        let function = self
            .registry
            .operator(name)
            .ok_or_else(|| EvaluationError::UnknownOperator(name.into()))?;
        self.call(function, args)
    }

    fn call<'a>(
        &self,
        function: Rc<RegularFunction>,
        args: impl IntoIterator<Item = &'a AlgebraExpression>,
    ) -> Result<Expression, EvaluationError> {
        let args = self.transform_all(args)?;
        function.check_arity(args.len())?;
        Ok(Expression::Operator { function, args })
    }

    fn special<'a>(
        &self,
        operator: SpecialOperator,
        args: impl IntoIterator<Item = &'a AlgebraExpression>,
    ) -> Result<Expression, EvaluationError> {
        let args = self.transform_all(args)?;
        operator.check_arity(args.len())?;
        Ok(Expression::Special { operator, args })
    }

    fn transform_all<'a>(
        &self,
        args: impl IntoIterator<Item = &'a AlgebraExpression>,
    ) -> Result<Vec<Expression>, EvaluationError> {
        args.into_iter().map(|arg| self.transform(arg)).collect()
    }
}

/// The registry name of the built-in functions that are not special operators.
fn builtin_name(function: &Function) -> Option<&'static str> {
    Some(match function {
        Function::Str => "STR",
        Function::Lang => "LANG",
        Function::LangMatches => "LANGMATCHES",
        Function::Datatype => "DATATYPE",
        Function::Rand => "RAND",
        Function::Abs => "ABS",
        Function::Ceil => "CEIL",
        Function::Floor => "FLOOR",
        Function::Round => "ROUND",
        Function::SubStr => "SUBSTR",
        Function::StrLen => "STRLEN",
        Function::Replace => "REPLACE",
        Function::UCase => "UCASE",
        Function::LCase => "LCASE",
        Function::EncodeForUri => "ENCODE_FOR_URI",
        Function::Contains => "CONTAINS",
        Function::StrStarts => "STRSTARTS",
        Function::StrEnds => "STRENDS",
        Function::StrBefore => "STRBEFORE",
        Function::StrAfter => "STRAFTER",
        Function::Year => "YEAR",
        Function::Month => "MONTH",
        Function::Day => "DAY",
        Function::Hours => "HOURS",
        Function::Minutes => "MINUTES",
        Function::Seconds => "SECONDS",
        Function::Timezone => "TIMEZONE",
        Function::Tz => "TZ",
        Function::Uuid => "UUID",
        Function::StrUuid => "STRUUID",
        Function::Md5 => "MD5",
        Function::Sha1 => "SHA1",
        Function::Sha256 => "SHA256",
        Function::Sha384 => "SHA384",
        Function::Sha512 => "SHA512",
        Function::StrLang => "STRLANG",
        Function::StrDt => "STRDT",
        Function::IsIri => "isIRI",
        Function::IsBlank => "isBLANK",
        Function::IsLiteral => "isLITERAL",
        Function::IsNumeric => "isNUMERIC",
        Function::Regex => "REGEX",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::Literal;

    fn var(name: &str) -> AlgebraExpression {
        AlgebraExpression::Variable(Variable::new_unchecked(name))
    }

    #[test]
    fn operators_are_resolved() {
        let expression = Transformer::default()
            .transform(&AlgebraExpression::Add(
                Box::new(var("a")),
                Box::new(AlgebraExpression::Literal(Literal::from(1))),
            ))
            .unwrap();
        let Expression::Operator { function, args } = expression else {
            panic!("+ should be a regular operator")
        };
        assert_eq!(function.name(), "+");
        assert!(matches!(args.as_slice(), [Expression::Variable(_), Expression::Constant(_)]));
    }

    #[test]
    fn special_operators_keep_their_arguments() {
        let expression = Transformer::default()
            .transform(&AlgebraExpression::Or(Box::new(var("a")), Box::new(var("b"))))
            .unwrap();
        assert!(matches!(
            expression,
            Expression::Special { operator: SpecialOperator::Or, ref args } if args.len() == 2
        ));
        let expression = Transformer::default()
            .transform(&AlgebraExpression::FunctionCall(Function::Concat, vec![]))
            .unwrap();
        assert!(matches!(
            expression,
            Expression::Special { operator: SpecialOperator::Concat, .. }
        ));
    }

    #[test]
    fn arity_is_checked_at_transform_time() {
        let error = Transformer::default()
            .transform(&AlgebraExpression::FunctionCall(
                Function::StrLen,
                vec![var("a"), var("b")],
            ))
            .unwrap_err();
        assert!(matches!(
            error,
            EvaluationError::InvalidArity { ref function, actual: 2, .. } if function == "STRLEN"
        ));
        assert!(
            Transformer::default()
                .transform(&AlgebraExpression::FunctionCall(
                    Function::SubStr,
                    vec![var("a"), var("b"), var("c")],
                ))
                .is_ok()
        );
    }

    #[test]
    fn unknown_functions_are_rejected() {
        let name = NamedNode::new_unchecked("http://example.com/f");
        let error = Transformer::default()
            .transform(&AlgebraExpression::FunctionCall(
                Function::Custom(name.clone()),
                vec![var("a")],
            ))
            .unwrap_err();
        assert!(matches!(error, EvaluationError::UnknownNamedOperator(n) if n == name));
    }

    #[test]
    fn casts_and_extensions_are_named_functions() {
        let transformer = Transformer::default().with_extension_function(
            NamedNode::new_unchecked("http://example.com/f"),
            ExtensionFunction::new(|args| Ok(args[0].clone())),
        );
        let cast = transformer
            .transform(&AlgebraExpression::FunctionCall(
                Function::Custom(oxrdf::vocab::xsd::INTEGER.into_owned()),
                vec![var("a")],
            ))
            .unwrap();
        assert!(matches!(cast, Expression::Operator { .. }));
        let extension = transformer
            .transform(&AlgebraExpression::FunctionCall(
                Function::Custom(NamedNode::new_unchecked("http://example.com/f")),
                vec![var("a")],
            ))
            .unwrap();
        assert!(matches!(extension, Expression::Extension { .. }));
    }

    #[test]
    fn aggregate_variables() {
        let transformer = Transformer::default().with_aggregates([(
            Variable::new_unchecked("count"),
            AggregateExpression::CountSolutions { distinct: false },
        )]);
        assert!(matches!(
            transformer.transform(&var("count")).unwrap(),
            Expression::Aggregate { .. }
        ));
        assert!(matches!(
            transformer.transform(&var("other")).unwrap(),
            Expression::Variable(_)
        ));
    }
}
