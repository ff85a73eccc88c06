use crate::error::EvaluationError;
use crate::eval::run_now;
use crate::functions::{FunctionRegistry, RegularFunction};
use crate::lexical::transform_term;
use crate::overload::OverloadCache;
use crate::term::{ExpressionLiteral, ExpressionTerm, LiteralValue};
use crate::types::SuperTypeProvider;
use oxrdf::Term;
use rustc_hash::FxHashSet;
use spargebra::algebra::{AggregateExpression, AggregateFunction, Expression};
use std::rc::Rc;

/// The accumulator of an aggregate for a single group.
///
/// The caller evaluates the aggregated expression for each solution of the group
/// and gives the values to [`put`](Self::put).
/// For `COUNT(*)` the given term is ignored and every call counts one solution.
///
/// ```
/// use oxrdf::{Literal, Term};
/// use sparexpr::Aggregator;
/// use spargebra::algebra::{AggregateExpression, AggregateFunction, Expression};
/// use spargebra::term::Variable;
///
/// let min = Aggregator::new(&AggregateExpression::FunctionCall {
///     name: AggregateFunction::Min,
///     expr: Expression::Variable(Variable::new("v")?),
///     distinct: false,
/// })?;
/// let values = [3, 1, 2].map(|v| Term::from(Literal::from(v)));
/// let result = futures_util::FutureExt::now_or_never(min.fold(&values));
/// assert_eq!(result.unwrap()?, Some(Literal::from(1).into()));
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
pub struct Aggregator {
    kind: AggregatorKind,
    expression: Option<Expression>,
    seen: Option<FxHashSet<Term>>,
    state: Option<AggregatorState>,
    provider: SuperTypeProvider,
    overload_cache: OverloadCache,
}

enum AggregatorKind {
    Count,
    CountSolutions,
    Sum(Rc<RegularFunction>),
    Avg {
        add: Rc<RegularFunction>,
        divide: Rc<RegularFunction>,
    },
    Min(Rc<RegularFunction>),
    Max(Rc<RegularFunction>),
    Sample,
    GroupConcat {
        separator: String,
    },
}

enum AggregatorState {
    Count(i64),
    Sum(ExpressionTerm),
    Avg { sum: ExpressionTerm, count: i64 },
    Extreme(ExpressionTerm),
    Sample(ExpressionTerm),
    GroupConcat(String),
}

impl Aggregator {
    /// An aggregator with the built-in functions and fresh caches.
    pub fn new(aggregate: &AggregateExpression) -> Result<Self, EvaluationError> {
        Self::with_environment(
            aggregate,
            &FunctionRegistry::new(),
            SuperTypeProvider::default(),
            OverloadCache::default(),
        )
    }

    pub(crate) fn with_environment(
        aggregate: &AggregateExpression,
        registry: &FunctionRegistry,
        provider: SuperTypeProvider,
        overload_cache: OverloadCache,
    ) -> Result<Self, EvaluationError> {
        let operator = |name: &str| {
            registry
                .operator(name)
                .ok_or_else(|| EvaluationError::UnknownOperator(name.into()))
        };
        let (kind, expression, distinct) = match aggregate {
            AggregateExpression::CountSolutions { distinct } => {
                (AggregatorKind::CountSolutions, None, *distinct)
            }
            AggregateExpression::FunctionCall {
                name,
                expr,
                distinct,
            } => {
                let kind = match name {
                    AggregateFunction::Count => AggregatorKind::Count,
                    AggregateFunction::Sum => AggregatorKind::Sum(operator("+")?),
                    AggregateFunction::Avg => AggregatorKind::Avg {
                        add: operator("+")?,
                        divide: operator("/")?,
                    },
                    AggregateFunction::Min => AggregatorKind::Min(operator("<")?),
                    AggregateFunction::Max => AggregatorKind::Max(operator("<")?),
                    AggregateFunction::Sample => AggregatorKind::Sample,
                    AggregateFunction::GroupConcat { separator } => AggregatorKind::GroupConcat {
                        separator: separator.clone().unwrap_or_else(|| " ".into()),
                    },
                    AggregateFunction::Custom(name) => {
                        return Err(EvaluationError::UnknownNamedOperator(name.clone()));
                    }
                };
                (kind, Some(expr.clone()), *distinct)
            }
        };
        Ok(Self {
            // Solutions of COUNT(DISTINCT *) are deduplicated by the caller
            seen: (distinct && expression.is_some()).then(FxHashSet::default),
            kind,
            expression,
            state: None,
            provider,
            overload_cache,
        })
    }

    /// The expression to evaluate for each solution, `None` for `COUNT(*)`.
    #[inline]
    pub fn expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    /// The result of the aggregate over an empty group, if there is one.
    pub fn empty_value(&self) -> Option<Term> {
        let empty = match self.kind {
            AggregatorKind::Count | AggregatorKind::CountSolutions | AggregatorKind::Sum(_) => {
                ExpressionLiteral::integer(0)
            }
            AggregatorKind::GroupConcat { .. } => ExpressionLiteral::string(""),
            AggregatorKind::Avg { .. }
            | AggregatorKind::Min(_)
            | AggregatorKind::Max(_)
            | AggregatorKind::Sample => return None,
        };
        Some(ExpressionTerm::from(empty).into())
    }

    pub async fn put(&mut self, term: &Term) -> Result<(), EvaluationError> {
        if let Some(seen) = &mut self.seen {
            if !seen.insert(term.clone()) {
                return Ok(());
            }
        }
        let value = transform_term(term, &self.provider).await;
        self.state = Some(match self.state.take() {
            None => self.init(value)?,
            Some(state) => self.accumulate(state, value).await?,
        });
        Ok(())
    }

    fn init(&self, value: ExpressionTerm) -> Result<AggregatorState, EvaluationError> {
        Ok(match &self.kind {
            AggregatorKind::Count | AggregatorKind::CountSolutions => AggregatorState::Count(1),
            AggregatorKind::Sum(_) => AggregatorState::Sum(numeric(value)?),
            AggregatorKind::Avg { .. } => AggregatorState::Avg {
                sum: numeric(value)?,
                count: 1,
            },
            AggregatorKind::Min(_) | AggregatorKind::Max(_) => AggregatorState::Extreme(value),
            AggregatorKind::Sample => AggregatorState::Sample(value),
            AggregatorKind::GroupConcat { .. } => {
                AggregatorState::GroupConcat(value.lexical_form().into())
            }
        })
    }

    async fn accumulate(
        &self,
        state: AggregatorState,
        value: ExpressionTerm,
    ) -> Result<AggregatorState, EvaluationError> {
        Ok(match (&self.kind, state) {
            (
                AggregatorKind::Count | AggregatorKind::CountSolutions,
                AggregatorState::Count(count),
            ) => AggregatorState::Count(
                count
                    .checked_add(1)
                    .ok_or_else(|| EvaluationError::invalid_argument("COUNT overflow"))?,
            ),
            (AggregatorKind::Sum(add), AggregatorState::Sum(sum)) => {
                AggregatorState::Sum(self.apply(add, sum, numeric(value)?).await?)
            }
            (AggregatorKind::Avg { add, .. }, AggregatorState::Avg { sum, count }) => {
                AggregatorState::Avg {
                    sum: self.apply(add, sum, numeric(value)?).await?,
                    count: count
                        .checked_add(1)
                        .ok_or_else(|| EvaluationError::invalid_argument("AVG overflow"))?,
                }
            }
            (AggregatorKind::Min(less), AggregatorState::Extreme(witness)) => {
                let improves = self.is_less(less, &value, &witness).await?;
                AggregatorState::Extreme(if improves { value } else { witness })
            }
            (AggregatorKind::Max(less), AggregatorState::Extreme(witness)) => {
                let improves = self.is_less(less, &witness, &value).await?;
                AggregatorState::Extreme(if improves { value } else { witness })
            }
            (AggregatorKind::Sample, AggregatorState::Sample(first)) => {
                AggregatorState::Sample(first)
            }
            (AggregatorKind::GroupConcat { separator }, AggregatorState::GroupConcat(mut concat)) => {
                concat.push_str(separator);
                concat.push_str(value.lexical_form());
                AggregatorState::GroupConcat(concat)
            }
            (_, _) => {
                return Err(EvaluationError::invalid_argument(
                    "the aggregator state does not match its function",
                ));
            }
        })
    }

    async fn apply(
        &self,
        function: &RegularFunction,
        a: ExpressionTerm,
        b: ExpressionTerm,
    ) -> Result<ExpressionTerm, EvaluationError> {
        function
            .apply(&[a, b], &self.provider, Some(&self.overload_cache))
            .await
    }

    /// Strict ordering, values without a `<` overload are reported as incomparable.
    async fn is_less(
        &self,
        less: &RegularFunction,
        a: &ExpressionTerm,
        b: &ExpressionTerm,
    ) -> Result<bool, EvaluationError> {
        match self.apply(less, a.clone(), b.clone()).await {
            Ok(result) => result.effective_boolean_value(),
            Err(EvaluationError::NoOverloadMatch { .. }) => {
                Err(EvaluationError::incomparable(a, b))
            }
            Err(e) => Err(e),
        }
    }

    /// The value of the aggregate, the empty value if nothing has been put.
    pub async fn result(mut self) -> Result<Option<Term>, EvaluationError> {
        let Some(state) = self.state.take() else {
            return Ok(self.empty_value());
        };
        let result = match (&self.kind, state) {
            (AggregatorKind::Avg { divide, .. }, AggregatorState::Avg { sum, count }) => {
                self.apply(divide, sum, ExpressionLiteral::integer(count).into())
                    .await?
            }
            (_, AggregatorState::Count(count)) => ExpressionLiteral::integer(count).into(),
            (_, AggregatorState::GroupConcat(concat)) => ExpressionLiteral::string(concat).into(),
            (
                _,
                AggregatorState::Sum(value)
                | AggregatorState::Avg { sum: value, .. }
                | AggregatorState::Extreme(value)
                | AggregatorState::Sample(value),
            ) => value,
        };
        Ok(Some(result.into()))
    }

    /// Puts all the terms and returns the result.
    pub async fn fold<'a>(
        mut self,
        terms: impl IntoIterator<Item = &'a Term>,
    ) -> Result<Option<Term>, EvaluationError> {
        for term in terms {
            self.put(term).await?;
        }
        self.result().await
    }
}

/// The first value of `SUM` and `AVG` must be a number.
fn numeric(value: ExpressionTerm) -> Result<ExpressionTerm, EvaluationError> {
    if matches!(
        value.value(),
        Some(
            LiteralValue::Integer(_)
                | LiteralValue::Decimal(_)
                | LiteralValue::Float(_)
                | LiteralValue::Double(_)
        )
    ) {
        Ok(value)
    } else {
        Err(EvaluationError::type_coercion(&value, "a number"))
    }
}

/// An [`Aggregator`] driven without suspending.
pub struct SyncAggregator {
    inner: Aggregator,
}

impl SyncAggregator {
    pub(crate) fn new(inner: Aggregator) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn expression(&self) -> Option<&Expression> {
        self.inner.expression()
    }

    #[inline]
    pub fn empty_value(&self) -> Option<Term> {
        self.inner.empty_value()
    }

    pub fn put(&mut self, term: &Term) -> Result<(), EvaluationError> {
        run_now(self.inner.put(term))
    }

    pub fn result(self) -> Result<Option<Term>, EvaluationError> {
        run_now(self.inner.result())
    }

    pub fn fold<'a>(
        self,
        terms: impl IntoIterator<Item = &'a Term>,
    ) -> Result<Option<Term>, EvaluationError> {
        run_now(self.inner.fold(terms))
    }
}
