use crate::aggregate::{Aggregator, SyncAggregator};
use crate::error::{EvaluationError, HookError};
use crate::expression::{Expression, Transformer};
use crate::functions::FunctionRegistry;
use crate::lexical::transform_term;
use crate::overload::OverloadCache;
use crate::term::ExpressionTerm;
use crate::types::{OverrideType, SuperTypeProvider, TypeCache, TypeDiscoverer};
use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, try_join_all};
use oxiri::{Iri, IriParseError};
use oxrdf::{BlankNode, NamedNode, NamedNodeRef, Term, Variable};
use oxsdatatypes::DateTime;
use rustc_hash::FxHashMap;
use spargebra::algebra::{AggregateExpression, Expression as AlgebraExpression, GraphPattern};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::hash::BuildHasher;
use std::rc::Rc;

/// The values of the variables for one evaluation.
pub trait Bindings {
    fn get(&self, variable: &Variable) -> Option<&Term>;
}

impl<S: BuildHasher> Bindings for HashMap<Variable, Term, S> {
    #[inline]
    fn get(&self, variable: &Variable) -> Option<&Term> {
        HashMap::get(self, variable)
    }
}

impl Bindings for BTreeMap<Variable, Term> {
    #[inline]
    fn get(&self, variable: &Variable) -> Option<&Term> {
        BTreeMap::get(self, variable)
    }
}

impl Bindings for [(Variable, Term)] {
    #[inline]
    fn get(&self, variable: &Variable) -> Option<&Term> {
        self.iter()
            .find_map(|(v, value)| (v == variable).then_some(value))
    }
}

impl<const N: usize> Bindings for [(Variable, Term); N] {
    #[inline]
    fn get(&self, variable: &Variable) -> Option<&Term> {
        Bindings::get(self.as_slice(), variable)
    }
}

impl Bindings for Vec<(Variable, Term)> {
    #[inline]
    fn get(&self, variable: &Variable) -> Option<&Term> {
        Bindings::get(self.as_slice(), variable)
    }
}

impl<B: Bindings + ?Sized> Bindings for &B {
    #[inline]
    fn get(&self, variable: &Variable) -> Option<&Term> {
        Bindings::get(&**self, variable)
    }
}

/// Evaluates `EXISTS` patterns on behalf of the evaluator.
#[derive(Clone)]
pub enum ExistenceHook {
    Sync(Rc<dyn Fn(&GraphPattern, &dyn Bindings) -> Result<bool, HookError>>),
    Async(
        Rc<dyn Fn(&GraphPattern, &dyn Bindings) -> LocalBoxFuture<'static, Result<bool, HookError>>>,
    ),
}

impl ExistenceHook {
    #[inline]
    pub fn new(
        hook: impl Fn(&GraphPattern, &dyn Bindings) -> Result<bool, HookError> + 'static,
    ) -> Self {
        Self::Sync(Rc::new(hook))
    }

    /// The returned future can not borrow the arguments, copy what it needs before building it.
    #[inline]
    pub fn new_async<F: Future<Output = Result<bool, HookError>> + 'static>(
        hook: impl Fn(&GraphPattern, &dyn Bindings) -> F + 'static,
    ) -> Self {
        Self::Async(Rc::new(move |pattern: &GraphPattern, bindings: &dyn Bindings| {
            hook(pattern, bindings).boxed_local()
        }))
    }

    async fn call(&self, pattern: &GraphPattern, bindings: &dyn Bindings) -> Result<bool, HookError> {
        match self {
            Self::Sync(hook) => hook(pattern, bindings),
            Self::Async(hook) => hook(pattern, bindings).await,
        }
    }
}

impl fmt::Debug for ExistenceHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sync(_) => "ExistenceHook::Sync",
            Self::Async(_) => "ExistenceHook::Async",
        })
    }
}

/// Provides the value of the variables bound to an aggregate.
#[derive(Clone)]
pub enum AggregateHook {
    Sync(Rc<dyn Fn(&Variable, &AggregateExpression, &dyn Bindings) -> Result<Term, HookError>>),
    Async(
        Rc<
            dyn Fn(
                &Variable,
                &AggregateExpression,
                &dyn Bindings,
            ) -> LocalBoxFuture<'static, Result<Term, HookError>>,
        >,
    ),
}

impl AggregateHook {
    #[inline]
    pub fn new(
        hook: impl Fn(&Variable, &AggregateExpression, &dyn Bindings) -> Result<Term, HookError>
        + 'static,
    ) -> Self {
        Self::Sync(Rc::new(hook))
    }

    #[inline]
    pub fn new_async<F: Future<Output = Result<Term, HookError>> + 'static>(
        hook: impl Fn(&Variable, &AggregateExpression, &dyn Bindings) -> F + 'static,
    ) -> Self {
        Self::Async(Rc::new(
            move |variable: &Variable, aggregate: &AggregateExpression, bindings: &dyn Bindings| {
                hook(variable, aggregate, bindings).boxed_local()
            },
        ))
    }

    async fn call(
        &self,
        variable: &Variable,
        aggregate: &AggregateExpression,
        bindings: &dyn Bindings,
    ) -> Result<Term, HookError> {
        match self {
            Self::Sync(hook) => hook(variable, aggregate, bindings),
            Self::Async(hook) => hook(variable, aggregate, bindings).await,
        }
    }
}

impl fmt::Debug for AggregateHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sync(_) => "AggregateHook::Sync",
            Self::Async(_) => "AggregateHook::Async",
        })
    }
}

/// A function provided by the caller and identified by an IRI.
#[derive(Clone)]
pub enum ExtensionFunction {
    Sync(Rc<dyn Fn(&[Term]) -> Result<Term, HookError>>),
    Async(Rc<dyn Fn(Vec<Term>) -> LocalBoxFuture<'static, Result<Term, HookError>>>),
}

impl ExtensionFunction {
    #[inline]
    pub fn new(function: impl Fn(&[Term]) -> Result<Term, HookError> + 'static) -> Self {
        Self::Sync(Rc::new(function))
    }

    #[inline]
    pub fn new_async<F: Future<Output = Result<Term, HookError>> + 'static>(
        function: impl Fn(Vec<Term>) -> F + 'static,
    ) -> Self {
        Self::Async(Rc::new(move |args: Vec<Term>| function(args).boxed_local()))
    }

    #[inline]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    async fn call(&self, args: Vec<Term>) -> Result<Term, HookError> {
        match self {
            Self::Sync(function) => function(&args),
            Self::Async(function) => function(args).await,
        }
    }
}

impl fmt::Debug for ExtensionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_async() {
            "ExtensionFunction::Async"
        } else {
            "ExtensionFunction::Sync"
        })
    }
}

/// Everything an evaluation needs besides the bindings.
#[derive(Clone)]
pub(crate) struct EvaluatorConfig {
    now: DateTime,
    base_iri: Option<Iri<String>>,
    blank_node_generator: Rc<dyn Fn() -> BlankNode>,
    transformer: Transformer,
    type_provider: SuperTypeProvider,
    overload_cache: OverloadCache,
    exists_hook: Option<ExistenceHook>,
    aggregate_hook: Option<AggregateHook>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            now: DateTime::now(),
            base_iri: None,
            blank_node_generator: Rc::new(BlankNode::default),
            transformer: Transformer::default(),
            type_provider: SuperTypeProvider::default(),
            overload_cache: OverloadCache::default(),
            exists_hook: None,
            aggregate_hook: None,
        }
    }
}

impl EvaluatorConfig {
    fn aggregator(&self, aggregate: &AggregateExpression) -> Result<Aggregator, EvaluationError> {
        Aggregator::with_environment(
            aggregate,
            self.transformer.registry(),
            self.type_provider.clone(),
            self.overload_cache.clone(),
        )
    }
}

/// The state of one evaluation, shared by all the nodes of the expression.
pub(crate) struct EvaluationContext<'a> {
    config: &'a EvaluatorConfig,
    bindings: &'a dyn Bindings,
    named_blank_nodes: RefCell<FxHashMap<String, BlankNode>>,
}

impl<'a> EvaluationContext<'a> {
    fn new(config: &'a EvaluatorConfig, bindings: &'a dyn Bindings) -> Self {
        Self {
            config,
            bindings,
            named_blank_nodes: RefCell::default(),
        }
    }

    pub(crate) fn evaluate<'b>(
        &'b self,
        expression: &'b Expression,
    ) -> LocalBoxFuture<'b, Result<ExpressionTerm, EvaluationError>> {
        Box::pin(async move {
            let provider = &self.config.type_provider;
            match expression {
                Expression::Constant(term) => Ok(transform_term(term, provider).await),
                Expression::Variable(variable) => {
                    let term = self
                        .bindings
                        .get(variable)
                        .ok_or_else(|| EvaluationError::UnboundVariable(variable.clone()))?;
                    Ok(transform_term(term, provider).await)
                }
                Expression::Operator { function, args } => {
                    let args = self.evaluate_all(args).await?;
                    function
                        .apply(&args, provider, Some(&self.config.overload_cache))
                        .await
                }
                Expression::Special { operator, args } => operator.apply(args, self).await,
                Expression::Extension {
                    name,
                    function,
                    args,
                } => {
                    let args = self
                        .evaluate_all(args)
                        .await?
                        .into_iter()
                        .map(Term::from)
                        .collect();
                    let result = function.call(args).await.map_err(|source| {
                        EvaluationError::ExtensionFunctionError {
                            name: name.clone(),
                            source,
                        }
                    })?;
                    Ok(transform_term(&result, provider).await)
                }
                Expression::Exists(pattern) => {
                    let hook = self
                        .config
                        .exists_hook
                        .as_ref()
                        .ok_or(EvaluationError::NoExistenceHook)?;
                    Ok(hook
                        .call(pattern, self.bindings)
                        .await
                        .map_err(EvaluationError::HookFailure)?
                        .into())
                }
                Expression::Aggregate {
                    variable,
                    aggregate,
                } => {
                    let hook = self
                        .config
                        .aggregate_hook
                        .as_ref()
                        .ok_or(EvaluationError::NoAggregator)?;
                    let result = hook
                        .call(variable, aggregate, self.bindings)
                        .await
                        .map_err(EvaluationError::HookFailure)?;
                    Ok(transform_term(&result, provider).await)
                }
            }
        })
    }

    /// Evaluates the arguments concurrently, the results are in the argument order.
    pub(crate) async fn evaluate_all(
        &self,
        expressions: &[Expression],
    ) -> Result<Vec<ExpressionTerm>, EvaluationError> {
        try_join_all(expressions.iter().map(|e| self.evaluate(e))).await
    }

    #[inline]
    pub(crate) fn bindings(&self) -> &dyn Bindings {
        self.bindings
    }

    #[inline]
    pub(crate) fn now(&self) -> DateTime {
        self.config.now
    }

    #[inline]
    pub(crate) fn base_iri(&self) -> Option<&Iri<String>> {
        self.config.base_iri.as_ref()
    }

    pub(crate) fn new_blank_node(&self) -> BlankNode {
        (self.config.blank_node_generator)()
    }

    /// The same label gives the same blank node during a single evaluation.
    pub(crate) fn named_blank_node(&self, label: &str) -> BlankNode {
        self.named_blank_nodes
            .borrow_mut()
            .entry(label.into())
            .or_insert_with(|| (self.config.blank_node_generator)())
            .clone()
    }
}

/// Runs a future that only depends on synchronous hooks.
pub(crate) fn run_now<T>(
    future: impl Future<Output = Result<T, EvaluationError>>,
) -> Result<T, EvaluationError> {
    future
        .now_or_never()
        .unwrap_or(Err(EvaluationError::Suspended))
}

/// Evaluates expressions without ever suspending.
///
/// Only synchronous hooks can be registered.
///
/// ```
/// use oxrdf::{Literal, Term, Variable};
/// use sparexpr::SyncEvaluator;
/// use spargebra::algebra::{Expression, Function};
///
/// let date = Variable::new("date")?;
/// let expression = SyncEvaluator::new().prepare(&Expression::FunctionCall(
///     Function::Minutes,
///     vec![Expression::Variable(date.clone())],
/// ))?;
/// let bindings = [(
///     date,
///     Term::from(Literal::new_typed_literal(
///         "2011-01-10T14:45:13.815-05:00",
///         oxrdf::vocab::xsd::DATE_TIME,
///     )),
/// )];
/// assert_eq!(expression.evaluate(&bindings)?, Literal::from(45).into());
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone, Default)]
pub struct SyncEvaluator {
    config: Rc<EvaluatorConfig>,
}

impl SyncEvaluator {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// The value of `NOW()`, the evaluator construction time by default.
    #[inline]
    #[must_use]
    pub fn with_now(mut self, now: DateTime) -> Self {
        Rc::make_mut(&mut self.config).now = now;
        self
    }

    /// The IRI `IRI()` resolves relative IRIs against.
    #[inline]
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Result<Self, IriParseError> {
        Rc::make_mut(&mut self.config).base_iri = Some(Iri::parse(base_iri.into())?);
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn with_blank_node_generator(mut self, generator: impl Fn() -> BlankNode + 'static) -> Self {
        Rc::make_mut(&mut self.config).blank_node_generator = Rc::new(generator);
        self
    }

    /// Adds a function called when `name` is not a built-in function.
    ///
    /// It must be added before preparing the expressions calling it.
    #[inline]
    #[must_use]
    pub fn with_extension_function(
        mut self,
        name: NamedNode,
        function: impl Fn(&[Term]) -> Result<Term, HookError> + 'static,
    ) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.transformer = config
            .transformer
            .clone()
            .with_extension_function(name, ExtensionFunction::new(function));
        self
    }

    /// Classifies the datatypes that are not built-in.
    #[inline]
    #[must_use]
    pub fn with_type_discoverer(
        mut self,
        discoverer: impl Fn(NamedNodeRef<'_>) -> OverrideType + 'static,
    ) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.type_provider = config
            .type_provider
            .clone()
            .with_discoverer(TypeDiscoverer::new(discoverer));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_exists_hook(
        mut self,
        hook: impl Fn(&GraphPattern, &dyn Bindings) -> Result<bool, HookError> + 'static,
    ) -> Self {
        Rc::make_mut(&mut self.config).exists_hook = Some(ExistenceHook::new(hook));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_aggregate_hook(
        mut self,
        hook: impl Fn(&Variable, &AggregateExpression, &dyn Bindings) -> Result<Term, HookError>
        + 'static,
    ) -> Self {
        Rc::make_mut(&mut self.config).aggregate_hook = Some(AggregateHook::new(hook));
        self
    }

    /// Shares a cache of discovered datatypes, for example with other evaluators.
    #[inline]
    #[must_use]
    pub fn with_type_cache(mut self, cache: TypeCache) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.type_provider = config.type_provider.clone().with_cache(cache);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_overload_cache(mut self, cache: OverloadCache) -> Self {
        Rc::make_mut(&mut self.config).overload_cache = cache;
        self
    }

    /// Declares the variables whose value is computed by the aggregate hook.
    #[inline]
    #[must_use]
    pub fn with_aggregates(
        mut self,
        aggregates: impl IntoIterator<Item = (Variable, AggregateExpression)>,
    ) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.transformer = config.transformer.clone().with_aggregates(aggregates);
        self
    }

    /// Shares an already built function registry.
    #[inline]
    #[must_use]
    pub fn with_function_registry(mut self, registry: Rc<FunctionRegistry>) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.transformer = config.transformer.clone().with_registry(registry);
        self
    }

    /// Resolves the functions of the expression and checks their arities.
    pub fn prepare(
        &self,
        expression: &AlgebraExpression,
    ) -> Result<PreparedExpression, EvaluationError> {
        Ok(PreparedExpression {
            expression: self.config.transformer.transform(expression)?,
            config: Rc::clone(&self.config),
        })
    }

    /// Builds the accumulator of an aggregate for one group.
    pub fn aggregator(
        &self,
        aggregate: &AggregateExpression,
    ) -> Result<SyncAggregator, EvaluationError> {
        Ok(SyncAggregator::new(self.config.aggregator(aggregate)?))
    }
}

impl fmt::Debug for SyncEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEvaluator")
            .field("now", &self.config.now)
            .field("base_iri", &self.config.base_iri)
            .finish_non_exhaustive()
    }
}

/// An expression prepared by a [`SyncEvaluator`].
#[derive(Clone)]
pub struct PreparedExpression {
    expression: Expression,
    config: Rc<EvaluatorConfig>,
}

impl PreparedExpression {
    pub fn evaluate(&self, bindings: &impl Bindings) -> Result<Term, EvaluationError> {
        self.evaluate_as_internal(bindings).map(Into::into)
    }

    /// The [effective boolean value](https://www.w3.org/TR/sparql11-query/#ebv) of the expression.
    pub fn evaluate_as_ebv(&self, bindings: &impl Bindings) -> Result<bool, EvaluationError> {
        self.evaluate_as_internal(bindings)?
            .effective_boolean_value()
    }

    pub fn evaluate_as_internal(
        &self,
        bindings: &impl Bindings,
    ) -> Result<ExpressionTerm, EvaluationError> {
        let context = EvaluationContext::new(&self.config, bindings);
        run_now(context.evaluate(&self.expression))
    }

    #[inline]
    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

impl fmt::Debug for PreparedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedExpression")
            .field("expression", &self.expression)
            .finish_non_exhaustive()
    }
}

/// Evaluates expressions with hooks that may suspend.
///
/// The arguments of a function are evaluated concurrently.
///
/// ```
/// use oxrdf::{Literal, NamedNode, Term};
/// use sparexpr::{AsyncEvaluator, HookError};
/// use spargebra::algebra::{Expression, Function};
///
/// let name = NamedNode::new("http://example.com/lookup")?;
/// let evaluator = AsyncEvaluator::new().with_async_extension_function(
///     name.clone(),
///     |args: Vec<Term>| async move { Ok::<_, HookError>(args[0].clone()) },
/// );
/// let expression = evaluator.prepare(&Expression::FunctionCall(
///     Function::Custom(name),
///     vec![Expression::Literal(Literal::from(1))],
/// ))?;
/// let bindings: [(oxrdf::Variable, Term); 0] = [];
/// let result = futures_util::FutureExt::now_or_never(expression.evaluate(&bindings));
/// assert_eq!(result.unwrap()?, Literal::from(1).into());
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone, Default)]
pub struct AsyncEvaluator {
    config: Rc<EvaluatorConfig>,
}

impl AsyncEvaluator {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_now(mut self, now: DateTime) -> Self {
        Rc::make_mut(&mut self.config).now = now;
        self
    }

    #[inline]
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Result<Self, IriParseError> {
        Rc::make_mut(&mut self.config).base_iri = Some(Iri::parse(base_iri.into())?);
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn with_blank_node_generator(mut self, generator: impl Fn() -> BlankNode + 'static) -> Self {
        Rc::make_mut(&mut self.config).blank_node_generator = Rc::new(generator);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_extension_function(
        self,
        name: NamedNode,
        function: impl Fn(&[Term]) -> Result<Term, HookError> + 'static,
    ) -> Self {
        self.with_extension(name, ExtensionFunction::new(function))
    }

    #[inline]
    #[must_use]
    pub fn with_async_extension_function<F: Future<Output = Result<Term, HookError>> + 'static>(
        self,
        name: NamedNode,
        function: impl Fn(Vec<Term>) -> F + 'static,
    ) -> Self {
        self.with_extension(name, ExtensionFunction::new_async(function))
    }

    fn with_extension(mut self, name: NamedNode, function: ExtensionFunction) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.transformer = config
            .transformer
            .clone()
            .with_extension_function(name, function);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_type_discoverer(
        self,
        discoverer: impl Fn(NamedNodeRef<'_>) -> OverrideType + 'static,
    ) -> Self {
        self.with_discoverer(TypeDiscoverer::new(discoverer))
    }

    /// Classifies the datatypes that are not built-in, for example by querying a registry.
    #[inline]
    #[must_use]
    pub fn with_async_type_discoverer<F: Future<Output = OverrideType> + 'static>(
        self,
        discoverer: impl Fn(NamedNode) -> F + 'static,
    ) -> Self {
        self.with_discoverer(TypeDiscoverer::new_async(discoverer))
    }

    fn with_discoverer(mut self, discoverer: TypeDiscoverer) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.type_provider = config.type_provider.clone().with_discoverer(discoverer);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_exists_hook(
        mut self,
        hook: impl Fn(&GraphPattern, &dyn Bindings) -> Result<bool, HookError> + 'static,
    ) -> Self {
        Rc::make_mut(&mut self.config).exists_hook = Some(ExistenceHook::new(hook));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_async_exists_hook<F: Future<Output = Result<bool, HookError>> + 'static>(
        mut self,
        hook: impl Fn(&GraphPattern, &dyn Bindings) -> F + 'static,
    ) -> Self {
        Rc::make_mut(&mut self.config).exists_hook = Some(ExistenceHook::new_async(hook));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_aggregate_hook(
        mut self,
        hook: impl Fn(&Variable, &AggregateExpression, &dyn Bindings) -> Result<Term, HookError>
        + 'static,
    ) -> Self {
        Rc::make_mut(&mut self.config).aggregate_hook = Some(AggregateHook::new(hook));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_async_aggregate_hook<F: Future<Output = Result<Term, HookError>> + 'static>(
        mut self,
        hook: impl Fn(&Variable, &AggregateExpression, &dyn Bindings) -> F + 'static,
    ) -> Self {
        Rc::make_mut(&mut self.config).aggregate_hook = Some(AggregateHook::new_async(hook));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_type_cache(mut self, cache: TypeCache) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.type_provider = config.type_provider.clone().with_cache(cache);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_overload_cache(mut self, cache: OverloadCache) -> Self {
        Rc::make_mut(&mut self.config).overload_cache = cache;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_aggregates(
        mut self,
        aggregates: impl IntoIterator<Item = (Variable, AggregateExpression)>,
    ) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.transformer = config.transformer.clone().with_aggregates(aggregates);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_function_registry(mut self, registry: Rc<FunctionRegistry>) -> Self {
        let config = Rc::make_mut(&mut self.config);
        config.transformer = config.transformer.clone().with_registry(registry);
        self
    }

    pub fn prepare(
        &self,
        expression: &AlgebraExpression,
    ) -> Result<AsyncPreparedExpression, EvaluationError> {
        Ok(AsyncPreparedExpression {
            expression: self.config.transformer.transform(expression)?,
            config: Rc::clone(&self.config),
        })
    }

    pub fn aggregator(&self, aggregate: &AggregateExpression) -> Result<Aggregator, EvaluationError> {
        self.config.aggregator(aggregate)
    }
}

impl fmt::Debug for AsyncEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncEvaluator")
            .field("now", &self.config.now)
            .field("base_iri", &self.config.base_iri)
            .finish_non_exhaustive()
    }
}

/// An expression prepared by an [`AsyncEvaluator`].
#[derive(Clone)]
pub struct AsyncPreparedExpression {
    expression: Expression,
    config: Rc<EvaluatorConfig>,
}

impl AsyncPreparedExpression {
    pub async fn evaluate(&self, bindings: &impl Bindings) -> Result<Term, EvaluationError> {
        self.evaluate_as_internal(bindings).await.map(Into::into)
    }

    pub async fn evaluate_as_ebv(&self, bindings: &impl Bindings) -> Result<bool, EvaluationError> {
        self.evaluate_as_internal(bindings)
            .await?
            .effective_boolean_value()
    }

    pub async fn evaluate_as_internal(
        &self,
        bindings: &impl Bindings,
    ) -> Result<ExpressionTerm, EvaluationError> {
        EvaluationContext::new(&self.config, bindings)
            .evaluate(&self.expression)
            .await
    }

    #[inline]
    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

impl fmt::Debug for AsyncPreparedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncPreparedExpression")
            .field("expression", &self.expression)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[expect(clippy::panic_in_result_fn)]
mod tests {
    use super::*;
    use crate::term::ExpressionLiteral;
    use oxrdf::Literal;
    use oxrdf::vocab::xsd;
    use spargebra::algebra::Function;
    use std::cell::Cell;
    use std::error::Error;
    use std::str::FromStr;

    fn var(name: &str) -> AlgebraExpression {
        AlgebraExpression::Variable(Variable::new_unchecked(name))
    }

    fn literal(value: impl Into<Literal>) -> AlgebraExpression {
        AlgebraExpression::Literal(value.into())
    }

    fn call(function: Function, args: Vec<AlgebraExpression>) -> AlgebraExpression {
        AlgebraExpression::FunctionCall(function, args)
    }

    fn no_bindings() -> Vec<(Variable, Term)> {
        Vec::new()
    }

    fn eval(expression: &AlgebraExpression) -> Result<Term, EvaluationError> {
        SyncEvaluator::new()
            .prepare(expression)?
            .evaluate(&no_bindings())
    }

    fn failing() -> AlgebraExpression {
        call(Function::StrLen, vec![literal(1)])
    }

    #[test]
    fn bindings_implementations() {
        let x = Variable::new_unchecked("x");
        let one = Term::from(Literal::from(1));
        let map: HashMap<_, _> = [(x.clone(), one.clone())].into();
        let tree: BTreeMap<_, _> = [(x.clone(), one.clone())].into();
        let list = vec![(x.clone(), one.clone())];
        assert_eq!(Bindings::get(&map, &x), Some(&one));
        assert_eq!(Bindings::get(&tree, &x), Some(&one));
        assert_eq!(Bindings::get(&list, &x), Some(&one));
        let array = [(x.clone(), one.clone())];
        assert_eq!(Bindings::get(&array, &x), Some(&one));
        assert_eq!(Bindings::get(&&array, &x), Some(&one));
        assert_eq!(Bindings::get(&list.as_slice(), &Variable::new_unchecked("y")), None);
    }

    #[test]
    fn unbound_variables_fail() {
        assert!(matches!(
            eval(&var("x")),
            Err(EvaluationError::UnboundVariable(v)) if v.as_str() == "x"
        ));
    }

    #[test]
    fn logical_operators_absorb_errors() -> Result<(), EvaluationError> {
        let or = AlgebraExpression::Or(Box::new(failing()), Box::new(literal(true)));
        assert_eq!(eval(&or)?, Literal::from(true).into());
        let or = AlgebraExpression::Or(Box::new(failing()), Box::new(literal(false)));
        assert!(eval(&or).is_err());
        let and = AlgebraExpression::And(Box::new(literal(false)), Box::new(failing()));
        assert_eq!(eval(&and)?, Literal::from(false).into());
        let and = AlgebraExpression::And(Box::new(literal(true)), Box::new(literal("a")));
        assert_eq!(eval(&and)?, Literal::from(true).into());
        Ok(())
    }

    #[test]
    fn if_coalesce_and_in() -> Result<(), EvaluationError> {
        let if_ = AlgebraExpression::If(
            Box::new(literal(0)),
            Box::new(failing()),
            Box::new(literal("no")),
        );
        assert_eq!(eval(&if_)?, Literal::from("no").into());
        let coalesce = AlgebraExpression::Coalesce(vec![var("x"), failing(), literal(2)]);
        assert_eq!(eval(&coalesce)?, Literal::from(2).into());
        assert!(eval(&AlgebraExpression::Coalesce(vec![var("x")])).is_err());
        let in_ = AlgebraExpression::In(Box::new(literal(2)), vec![literal(1), literal(2.0)]);
        assert_eq!(eval(&in_)?, Literal::from(true).into());
        let in_ = AlgebraExpression::In(Box::new(literal(2)), vec![failing(), literal(2)]);
        assert_eq!(eval(&in_)?, Literal::from(true).into());
        let in_ = AlgebraExpression::In(Box::new(literal(2)), vec![failing(), literal(3)]);
        assert!(eval(&in_).is_err());
        let in_ = AlgebraExpression::In(Box::new(literal(2)), vec![]);
        assert_eq!(eval(&in_)?, Literal::from(false).into());
        Ok(())
    }

    #[test]
    fn bound() -> Result<(), EvaluationError> {
        let x = Variable::new_unchecked("x");
        let expression = SyncEvaluator::new().prepare(&AlgebraExpression::Bound(x.clone()))?;
        assert!(!expression.evaluate_as_ebv(&no_bindings())?);
        assert!(expression.evaluate_as_ebv(&[(x, Term::from(Literal::from(1)))])?);
        Ok(())
    }

    #[test]
    fn environment_functions() -> Result<(), Box<dyn Error>> {
        let now = DateTime::from_str("2020-01-02T00:00:00Z")?;
        let counter = Rc::new(Cell::new(0));
        let evaluator = SyncEvaluator::new()
            .with_now(now)
            .with_base_iri("http://example.com/base/")?
            .with_blank_node_generator({
                let counter = Rc::clone(&counter);
                move || {
                    counter.set(counter.get() + 1);
                    BlankNode::new_unchecked(format!("b{}", counter.get()))
                }
            });
        assert_eq!(
            evaluator
                .prepare(&call(Function::Now, vec![]))?
                .evaluate(&no_bindings())?,
            Literal::new_typed_literal("2020-01-02T00:00:00Z", xsd::DATE_TIME).into()
        );
        assert_eq!(
            evaluator
                .prepare(&call(Function::Iri, vec![literal("foo")]))?
                .evaluate(&no_bindings())?,
            NamedNode::new_unchecked("http://example.com/base/foo").into()
        );
        let same_label = evaluator.prepare(&AlgebraExpression::SameTerm(
            Box::new(call(Function::BNode, vec![literal("a")])),
            Box::new(call(Function::BNode, vec![literal("a")])),
        ))?;
        assert!(same_label.evaluate_as_ebv(&no_bindings())?);
        let fresh = evaluator.prepare(&AlgebraExpression::SameTerm(
            Box::new(call(Function::BNode, vec![])),
            Box::new(call(Function::BNode, vec![])),
        ))?;
        assert!(!fresh.evaluate_as_ebv(&no_bindings())?);
        Ok(())
    }

    #[test]
    fn iri_without_base() -> Result<(), EvaluationError> {
        assert_eq!(
            eval(&call(Function::Iri, vec![literal("http://example.com/")]))?,
            NamedNode::new_unchecked("http://example.com/").into()
        );
        assert!(eval(&call(Function::Iri, vec![literal("foo")])).is_err());
        Ok(())
    }

    #[test]
    fn concat_keeps_common_language() -> Result<(), Box<dyn Error>> {
        let fr = |value: &str| {
            Literal::new_language_tagged_literal(value, "fr").map(AlgebraExpression::Literal)
        };
        assert_eq!(
            eval(&call(Function::Concat, vec![fr("a")?, fr("b")?]))?,
            Literal::new_language_tagged_literal("ab", "fr")?.into()
        );
        assert_eq!(
            eval(&call(Function::Concat, vec![fr("a")?, literal("b")]))?,
            Literal::from("ab").into()
        );
        assert_eq!(eval(&call(Function::Concat, vec![]))?, Literal::from("").into());
        Ok(())
    }

    #[test]
    fn extension_function_errors_name_the_function() -> Result<(), EvaluationError> {
        let name = NamedNode::new_unchecked("http://example.com/fail");
        let evaluator = SyncEvaluator::new()
            .with_extension_function(name.clone(), |_| Err("boom".into()));
        let error = evaluator
            .prepare(&call(Function::Custom(name.clone()), vec![literal(1)]))?
            .evaluate(&no_bindings())
            .unwrap_err();
        assert!(matches!(
            error,
            EvaluationError::ExtensionFunctionError { name: ref n, .. } if *n == name
        ));
        Ok(())
    }

    #[test]
    fn extension_function_output_is_parsed() -> Result<(), EvaluationError> {
        let name = NamedNode::new_unchecked("http://example.com/two");
        let evaluator = SyncEvaluator::new()
            .with_extension_function(name.clone(), |_| Ok(Literal::from(2).into()));
        let expression = evaluator.prepare(&AlgebraExpression::Add(
            Box::new(call(Function::Custom(name), vec![])),
            Box::new(literal(1)),
        ))?;
        assert_eq!(expression.evaluate(&no_bindings())?, Literal::from(3).into());
        Ok(())
    }

    #[test]
    fn exists_needs_a_hook() -> Result<(), EvaluationError> {
        let exists = AlgebraExpression::Exists(Box::new(GraphPattern::Bgp { patterns: vec![] }));
        assert!(matches!(eval(&exists), Err(EvaluationError::NoExistenceHook)));
        let evaluator = SyncEvaluator::new().with_exists_hook(|_, bindings| {
            Ok(bindings.get(&Variable::new_unchecked("x")).is_some())
        });
        let expression = evaluator.prepare(&exists)?;
        assert!(!expression.evaluate_as_ebv(&no_bindings())?);
        assert!(
            expression
                .evaluate_as_ebv(&[(Variable::new_unchecked("x"), Term::from(Literal::from(1)))])?
        );
        Ok(())
    }

    #[test]
    fn aggregates_need_a_hook() -> Result<(), EvaluationError> {
        let count = Variable::new_unchecked("count");
        let aggregates = [(
            count.clone(),
            AggregateExpression::CountSolutions { distinct: false },
        )];
        let expression = AlgebraExpression::Multiply(Box::new(var("count")), Box::new(literal(2)));
        let evaluator = SyncEvaluator::new().with_aggregates(aggregates.clone());
        assert!(matches!(
            evaluator.prepare(&expression)?.evaluate(&no_bindings()),
            Err(EvaluationError::NoAggregator)
        ));
        let evaluator = evaluator.with_aggregate_hook(|variable, _, _| {
            assert_eq!(variable.as_str(), "count");
            Ok(Literal::from(21).into())
        });
        assert_eq!(
            evaluator.prepare(&expression)?.evaluate(&no_bindings())?,
            Literal::from(42).into()
        );
        Ok(())
    }

    #[test]
    fn overload_cache_is_shared() -> Result<(), EvaluationError> {
        let cache = OverloadCache::default();
        let evaluator = SyncEvaluator::new().with_overload_cache(cache.clone());
        let expression = evaluator.prepare(&AlgebraExpression::Add(
            Box::new(literal(1)),
            Box::new(literal(2)),
        ))?;
        expression.evaluate(&no_bindings())?;
        expression.evaluate(&no_bindings())?;
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
        Ok(())
    }

    #[test]
    fn internal_values_keep_the_parsed_value() -> Result<(), EvaluationError> {
        let expression = SyncEvaluator::new().prepare(&AlgebraExpression::Divide(
            Box::new(literal(1)),
            Box::new(literal(4)),
        ))?;
        assert_eq!(
            expression.evaluate_as_internal(&no_bindings())?,
            ExpressionTerm::from(ExpressionLiteral::from_lexical(
                "0.25",
                crate::types::KnownType::Decimal
            ))
        );
        Ok(())
    }

    #[tokio::test]
    async fn async_hooks_are_awaited() -> Result<(), EvaluationError> {
        let name = NamedNode::new_unchecked("http://example.com/slow");
        let evaluator = AsyncEvaluator::new()
            .with_async_extension_function(name.clone(), |args| async move {
                tokio::task::yield_now().await;
                Ok::<_, HookError>(
                    args.into_iter()
                        .next()
                        .unwrap_or_else(|| Literal::from(0).into()),
                )
            })
            .with_async_exists_hook(|_, _| async {
                tokio::task::yield_now().await;
                Ok::<_, HookError>(true)
            });
        let expression = evaluator.prepare(&AlgebraExpression::And(
            Box::new(AlgebraExpression::Exists(Box::new(GraphPattern::Bgp {
                patterns: vec![],
            }))),
            Box::new(AlgebraExpression::Equal(
                Box::new(call(Function::Custom(name), vec![literal(5)])),
                Box::new(literal(5)),
            )),
        ))?;
        assert!(expression.evaluate_as_ebv(&no_bindings()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn async_type_discovery() -> Result<(), EvaluationError> {
        let evaluator = AsyncEvaluator::new().with_async_type_discoverer(|datatype| async move {
            tokio::task::yield_now().await;
            if datatype.as_str() == "http://example.com/age" {
                OverrideType::Known(crate::types::KnownType::Integer)
            } else {
                OverrideType::Term
            }
        });
        let age = Literal::new_typed_literal("41", NamedNode::new_unchecked("http://example.com/age"));
        let expression = evaluator.prepare(&AlgebraExpression::Add(
            Box::new(AlgebraExpression::Literal(age)),
            Box::new(literal(1)),
        ))?;
        assert_eq!(
            expression.evaluate(&no_bindings()).await?,
            Literal::from(42).into()
        );
        Ok(())
    }
}
