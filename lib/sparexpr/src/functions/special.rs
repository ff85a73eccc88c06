use super::{Arity, equals, plain_arg, string_arg};
use crate::error::EvaluationError;
use crate::eval::EvaluationContext;
use crate::expression::Expression;
use crate::term::{ExpressionLiteral, ExpressionTerm};
use oxiri::Iri;
use oxrdf::NamedNode;
use std::fmt;

/// An operator receiving its arguments unevaluated.
///
/// They either short-circuit (`&&`, `||`, `IF`, `COALESCE`, `IN`), look at the shape of their
/// arguments (`BOUND`) or need the evaluation environment (`NOW`, `BNODE`, `IRI`).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SpecialOperator {
    And,
    Or,
    If,
    Coalesce,
    In,
    Bound,
    Now,
    BNode,
    Iri,
    Concat,
}

impl SpecialOperator {
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::If => "IF",
            Self::Coalesce => "COALESCE",
            Self::In => "IN",
            Self::Bound => "BOUND",
            Self::Now => "NOW",
            Self::BNode => "BNODE",
            Self::Iri => "IRI",
            Self::Concat => "CONCAT",
        }
    }

    #[inline]
    pub fn arity(self) -> Arity {
        match self {
            Self::And | Self::Or => Arity::Fixed(2),
            Self::If => Arity::Fixed(3),
            Self::Bound | Self::Iri => Arity::Fixed(1),
            Self::Now => Arity::Fixed(0),
            Self::BNode => Arity::OneOf(&[0, 1]),
            Self::Coalesce | Self::In | Self::Concat => Arity::Variadic,
        }
    }

    pub fn check_arity(self, actual: usize) -> Result<(), EvaluationError> {
        if self.arity().accepts(actual) {
            Ok(())
        } else {
            Err(EvaluationError::InvalidArity {
                function: self.name().into(),
                expected: self.arity(),
                actual,
            })
        }
    }

    pub(crate) async fn apply(
        self,
        args: &[Expression],
        context: &EvaluationContext<'_>,
    ) -> Result<ExpressionTerm, EvaluationError> {
        match self {
            Self::And => logical(args, context, false).await,
            Self::Or => logical(args, context, true).await,
            Self::If => {
                let [condition, then, otherwise] = args else {
                    return Err(self.arity_error(args));
                };
                if context
                    .evaluate(condition)
                    .await?
                    .effective_boolean_value()?
                {
                    context.evaluate(then).await
                } else {
                    context.evaluate(otherwise).await
                }
            }
            Self::Coalesce => {
                let mut error = None;
                for arg in args {
                    match context.evaluate(arg).await {
                        Ok(value) => return Ok(value),
                        Err(e) => error = Some(e),
                    }
                }
                Err(error.unwrap_or_else(|| {
                    EvaluationError::invalid_argument("COALESCE got no argument")
                }))
            }
            Self::In => {
                let Some((needle, candidates)) = args.split_first() else {
                    return Err(EvaluationError::invalid_argument(
                        "IN requires a value to look for",
                    ));
                };
                let needle = context.evaluate(needle).await?;
                let mut error = None;
                for candidate in candidates {
                    match context.evaluate(candidate).await {
                        Ok(candidate) => match equals(&needle, &candidate) {
                            Some(true) => return Ok(true.into()),
                            Some(false) => (),
                            None => {
                                error = Some(EvaluationError::incomparable(&needle, &candidate))
                            }
                        },
                        Err(e) => error = Some(e),
                    }
                }
                match error {
                    Some(e) => Err(e),
                    None => Ok(false.into()),
                }
            }
            Self::Bound => match args {
                [Expression::Variable(variable)] => {
                    Ok(context.bindings().get(variable).is_some().into())
                }
                _ => Err(EvaluationError::InvalidExpression(
                    "BOUND expects a variable".into(),
                )),
            },
            Self::Now => Ok(ExpressionLiteral::date_time(context.now()).into()),
            Self::BNode => match args {
                [] => Ok(context.new_blank_node().into()),
                [label] => {
                    let label = context.evaluate(label).await?;
                    Ok(context.named_blank_node(string_arg(&label)?).into())
                }
                _ => Err(self.arity_error(args)),
            },
            Self::Iri => {
                let [arg] = args else {
                    return Err(self.arity_error(args));
                };
                let value = context.evaluate(arg).await?;
                if let ExpressionTerm::NamedNode(_) = value {
                    return Ok(value);
                }
                let iri = string_arg(&value)?;
                let resolved = if let Some(base_iri) = context.base_iri() {
                    base_iri.resolve(iri)
                } else {
                    Iri::parse(iri.to_owned())
                }
                .map_err(|e| EvaluationError::invalid_argument(format!("{iri} is not an IRI: {e}")))?;
                Ok(NamedNode::new_unchecked(resolved.into_inner()).into())
            }
            Self::Concat => {
                let values = context.evaluate_all(args).await?;
                let mut result = String::new();
                let mut language = None;
                for (i, value) in values.iter().enumerate() {
                    let (lexical, value_language) = plain_arg(value)?;
                    if i == 0 {
                        language = value_language;
                    } else if language != value_language {
                        language = None;
                    }
                    result.push_str(lexical);
                }
                Ok(ExpressionLiteral::plain(result, language.map(ToOwned::to_owned)).into())
            }
        }
    }

    fn arity_error(self, args: &[Expression]) -> EvaluationError {
        EvaluationError::InvalidArity {
            function: self.name().into(),
            expected: self.arity(),
            actual: args.len(),
        }
    }
}

impl fmt::Display for SpecialOperator {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Three-valued `&&` and `||`: an error is only returned if no operand decides the result.
async fn logical(
    args: &[Expression],
    context: &EvaluationContext<'_>,
    decisive: bool,
) -> Result<ExpressionTerm, EvaluationError> {
    let mut error = None;
    for arg in args {
        match context
            .evaluate(arg)
            .await
            .and_then(|value| value.effective_boolean_value())
        {
            Ok(value) if value == decisive => return Ok(decisive.into()),
            Ok(_) => (),
            Err(e) => {
                if error.is_none() {
                    error = Some(e);
                }
            }
        }
    }
    match error {
        Some(e) => Err(e),
        None => Ok((!decisive).into()),
    }
}
