//! Overload resolution: maps the runtime types of the arguments to a function implementation.

use crate::error::EvaluationError;
use crate::lexical::{as_double, as_float, as_string};
use crate::term::{ExpressionTerm, TermKind};
use crate::types::{Datatype, KnownType, SuperTypeProvider, TypeAncestry};
use lru::LruCache;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::iter::once;
use std::num::NonZeroUsize;
use std::rc::Rc;
use tracing::trace;

const DEFAULT_OVERLOAD_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// A native function implementation working on already evaluated arguments.
pub type Implementation = Rc<dyn Fn(&[ExpressionTerm]) -> Result<ExpressionTerm, EvaluationError>>;

/// What an overload accepts at a given argument position.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ArgumentType {
    /// Any term.
    Any,
    /// Any term of the given kind.
    Kind(TermKind),
    /// Literals of the given type or of one of its subtypes.
    Type(KnownType),
}

impl From<KnownType> for ArgumentType {
    #[inline]
    fn from(ty: KnownType) -> Self {
        Self::Type(ty)
    }
}

impl From<TermKind> for ArgumentType {
    #[inline]
    fn from(kind: TermKind) -> Self {
        Self::Kind(kind)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Promotion {
    ToString,
    ToFloat,
    ToDouble,
}

impl Promotion {
    /// The argument types that may be promoted to a parameter type.
    fn sources(parameter: ArgumentType) -> &'static [(KnownType, Self)] {
        match parameter {
            ArgumentType::Type(KnownType::String) => &[(KnownType::AnyUri, Self::ToString)],
            ArgumentType::Type(KnownType::Float) => &[(KnownType::Decimal, Self::ToFloat)],
            ArgumentType::Type(KnownType::Double) => &[
                (KnownType::Float, Self::ToDouble),
                (KnownType::Decimal, Self::ToDouble),
            ],
            _ => &[],
        }
    }

    fn apply(self, term: &ExpressionTerm) -> Result<ExpressionTerm, EvaluationError> {
        match self {
            Self::ToString => as_string(term),
            Self::ToFloat => as_float(term),
            Self::ToDouble => as_double(term),
        }
        .ok_or_else(|| EvaluationError::type_coercion(term, "promotable"))
    }
}

#[derive(Default, Clone)]
struct OverloadNode {
    /// The implementation and the number of promotions used to reach it.
    implementation: Option<(Implementation, usize)>,
    children: FxHashMap<ArgumentType, OverloadNode>,
}

impl OverloadNode {
    fn insert(&mut self, path: &[ArgumentType], implementation: Implementation, promotions: usize) {
        let mut node = self;
        for edge in path {
            node = node.children.entry(*edge).or_default();
        }
        if node
            .implementation
            .as_ref()
            .is_none_or(|(_, existing)| promotions <= *existing)
        {
            node.implementation = Some((implementation, promotions));
        }
    }
}

/// A trie of argument types whose complete paths lead to implementations.
#[derive(Default, Clone)]
pub struct OverloadTree {
    root: OverloadNode,
}

impl OverloadTree {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an implementation for a signature, with all the promoted variants of it.
    ///
    /// A promoted variant never replaces an implementation registered with fewer promotions.
    pub fn add_overload(&mut self, signature: &[ArgumentType], implementation: Implementation) {
        let mut paths = vec![(Vec::new(), Vec::new())];
        for (position, parameter) in signature.iter().enumerate() {
            let mut next = Vec::with_capacity(paths.len());
            for (path, casts) in paths {
                let edges = once((*parameter, None)).chain(
                    Promotion::sources(*parameter)
                        .iter()
                        .map(|(source, promotion)| (ArgumentType::Type(*source), Some(*promotion))),
                );
                for (edge, promotion) in edges {
                    let mut path = path.clone();
                    path.push(edge);
                    let mut casts: Vec<(usize, Promotion)> = casts.clone();
                    casts.extend(promotion.map(|promotion| (position, promotion)));
                    next.push((path, casts));
                }
            }
            paths = next;
        }
        for (path, casts) in paths {
            let promotions = casts.len();
            let implementation = if casts.is_empty() {
                Rc::clone(&implementation)
            } else {
                trace!("Adding promoted overload {path:?} with casts {casts:?}");
                promoted(Rc::clone(&implementation), casts)
            };
            self.root.insert(&path, implementation, promotions);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty() && self.root.implementation.is_none()
    }

    /// Finds the implementation for the given arguments.
    ///
    /// The cache is keyed by `function` that must uniquely identify this tree.
    pub async fn search(
        &self,
        function: &str,
        args: &[ExpressionTerm],
        provider: &SuperTypeProvider,
        cache: Option<&OverloadCache>,
    ) -> Option<Implementation> {
        let key = cache.map(|_| OverloadKey::new(function, args));
        if let (Some(cache), Some(key)) = (cache, &key) {
            if let Some(found) = cache.get(key) {
                return found;
            }
        }
        let mut ancestries = Vec::with_capacity(args.len());
        for arg in args {
            ancestries.push(match arg.dispatch_type() {
                Some(datatype) => Some(provider.ancestry(&datatype).await),
                None => None,
            });
        }
        let found = self.traverse(args, &ancestries);
        if let (Some(cache), Some(key)) = (cache, key) {
            cache.insert(key, found.clone());
        }
        found
    }

    fn traverse(
        &self,
        args: &[ExpressionTerm],
        ancestries: &[Option<Rc<TypeAncestry>>],
    ) -> Option<Implementation> {
        let mut stack = vec![(&self.root, 0)];
        while let Some((node, consumed)) = stack.pop() {
            let Some(arg) = args.get(consumed) else {
                if let Some((implementation, _)) = &node.implementation {
                    return Some(Rc::clone(implementation));
                }
                continue;
            };
            // Pushed from the most generic to the most specific, the most specific is popped first
            if let Some(child) = node.children.get(&ArgumentType::Any) {
                stack.push((child, consumed + 1));
            }
            if let Some(child) = node.children.get(&ArgumentType::Kind(arg.kind())) {
                stack.push((child, consumed + 1));
            }
            if let Some(Some(ancestry)) = ancestries.get(consumed) {
                for (datatype, _) in ancestry.lineage().rev() {
                    if let Some(child) = datatype
                        .known()
                        .and_then(|ty| node.children.get(&ArgumentType::Type(ty)))
                    {
                        stack.push((child, consumed + 1));
                    }
                }
            }
        }
        None
    }
}

fn promoted(implementation: Implementation, casts: Vec<(usize, Promotion)>) -> Implementation {
    Rc::new(move |args: &[ExpressionTerm]| {
        let mut args = args.to_vec();
        for (position, promotion) in &casts {
            if let Some(arg) = args.get_mut(*position) {
                *arg = promotion.apply(arg)?;
            }
        }
        implementation(&args)
    })
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
enum ArgumentKey {
    Kind(TermKind),
    Literal(Datatype),
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
struct OverloadKey {
    function: String,
    arguments: Vec<ArgumentKey>,
}

impl OverloadKey {
    fn new(function: &str, args: &[ExpressionTerm]) -> Self {
        Self {
            function: function.into(),
            arguments: args
                .iter()
                .map(|arg| {
                    arg.dispatch_type()
                        .map_or_else(|| ArgumentKey::Kind(arg.kind()), ArgumentKey::Literal)
                })
                .collect(),
        }
    }
}

/// Memoized overload resolutions, including the failed ones.
///
/// Cloning the cache shares it.
#[derive(Clone)]
pub struct OverloadCache {
    inner: Rc<RefCell<LruCache<OverloadKey, Option<Implementation>>>>,
    hits: Rc<Cell<u64>>,
    misses: Rc<Cell<u64>>,
}

impl OverloadCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(LruCache::new(capacity))),
            hits: Rc::default(),
            misses: Rc::default(),
        }
    }

    fn get(&self, key: &OverloadKey) -> Option<Option<Implementation>> {
        let found = self.inner.borrow_mut().get(key).cloned();
        if found.is_some() {
            trace!("Overload cache hit for {key:?}");
            self.hits.set(self.hits.get() + 1);
        } else {
            trace!("Overload cache miss for {key:?}");
            self.misses.set(self.misses.get() + 1);
        }
        found
    }

    fn insert(&self, key: OverloadKey, implementation: Option<Implementation>) {
        self.inner.borrow_mut().put(key, implementation);
    }

    /// Number of lookups answered from the cache.
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    /// Number of lookups that required a tree traversal.
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.get()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OverloadCache {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_OVERLOAD_CACHE_CAPACITY)
    }
}

impl fmt::Debug for OverloadCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverloadCache")
            .field("len", &self.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::ExpressionLiteral;
    use futures_util::FutureExt;
    use oxrdf::{BlankNode, NamedNode};
    use oxsdatatypes::Decimal;
    use std::str::FromStr;

    fn constant(name: &'static str) -> Implementation {
        Rc::new(move |_: &[ExpressionTerm]| {
            Ok(ExpressionLiteral::string(name).into())
        })
    }

    fn resolve(tree: &OverloadTree, args: &[ExpressionTerm]) -> Option<String> {
        let implementation = tree
            .search("f", args, &SuperTypeProvider::default(), None)
            .now_or_never()??;
        Some(implementation(args).ok()?.lexical_form().to_owned())
    }

    #[test]
    fn promotion_precedence() {
        let mut tree = OverloadTree::new();
        tree.add_overload(&[KnownType::Float.into()], constant("A"));
        tree.add_overload(&[KnownType::Double.into()], constant("B"));
        let float = ExpressionTerm::from(ExpressionLiteral::float(1.5_f32));
        let decimal = ExpressionTerm::from(ExpressionLiteral::decimal(
            Decimal::from_str("1.5").unwrap(),
        ));
        let double = ExpressionTerm::from(ExpressionLiteral::double(1.5));
        assert_eq!(resolve(&tree, &[float]).as_deref(), Some("A"));
        assert_eq!(resolve(&tree, &[decimal]).as_deref(), Some("B"));
        assert_eq!(resolve(&tree, &[double]).as_deref(), Some("B"));
    }

    #[test]
    fn promoted_arguments_are_cast() {
        let mut tree = OverloadTree::new();
        tree.add_overload(
            &[KnownType::Double.into()],
            Rc::new(|args: &[ExpressionTerm]| {
                Ok(ExpressionLiteral::string(args[0].type_name()).into())
            }),
        );
        let integer = ExpressionTerm::from(ExpressionLiteral::integer(1));
        assert_eq!(resolve(&tree, &[integer]).as_deref(), Some("double"));
    }

    #[test]
    fn manual_overloads_are_not_shadowed() {
        let mut tree = OverloadTree::new();
        tree.add_overload(&[KnownType::Decimal.into()], constant("decimal"));
        tree.add_overload(&[KnownType::Float.into()], constant("float"));
        let decimal = ExpressionTerm::from(ExpressionLiteral::decimal(1));
        assert_eq!(resolve(&tree, &[decimal]).as_deref(), Some("decimal"));
    }

    #[test]
    fn most_specific_wins() {
        let mut tree = OverloadTree::new();
        tree.add_overload(&[ArgumentType::Any], constant("any"));
        tree.add_overload(&[TermKind::Literal.into()], constant("literal"));
        tree.add_overload(&[KnownType::Numeric.into()], constant("numeric"));
        tree.add_overload(&[KnownType::Integer.into()], constant("integer"));
        assert_eq!(
            resolve(&tree, &[ExpressionLiteral::integer(1).into()]).as_deref(),
            Some("integer")
        );
        assert_eq!(
            resolve(&tree, &[ExpressionLiteral::double(1.).into()]).as_deref(),
            Some("numeric")
        );
        assert_eq!(
            resolve(&tree, &[ExpressionLiteral::string("a").into()]).as_deref(),
            Some("literal")
        );
        assert_eq!(
            resolve(&tree, &[BlankNode::default().into()]).as_deref(),
            Some("any")
        );
    }

    #[test]
    fn only_complete_paths_match() {
        let mut tree = OverloadTree::new();
        tree.add_overload(
            &[KnownType::Integer.into(), KnownType::Integer.into()],
            constant("binary"),
        );
        let one = ExpressionTerm::from(ExpressionLiteral::integer(1));
        assert_eq!(resolve(&tree, &[]), None);
        assert_eq!(resolve(&tree, &[one.clone()]), None);
        assert_eq!(
            resolve(&tree, &[one.clone(), one.clone()]).as_deref(),
            Some("binary")
        );
        assert_eq!(resolve(&tree, &[one.clone(), one.clone(), one]), None);
    }

    #[test]
    fn any_uri_is_promoted_to_string() {
        let mut tree = OverloadTree::new();
        tree.add_overload(&[KnownType::String.into()], constant("string"));
        let uri = ExpressionTerm::from(ExpressionLiteral::non_lexical(
            "http://example.com",
            KnownType::AnyUri.into(),
        ));
        assert_eq!(resolve(&tree, &[uri]), None);
        let provider = SuperTypeProvider::default();
        let uri = crate::lexical::transform_term(
            &oxrdf::Literal::new_typed_literal(
                "http://example.com",
                NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#anyURI"),
            )
            .into(),
            &provider,
        )
        .now_or_never()
        .unwrap();
        assert_eq!(resolve(&tree, &[uri]).as_deref(), Some("string"));
    }

    #[test]
    fn cache_skips_traversal() {
        let mut tree = OverloadTree::new();
        tree.add_overload(&[KnownType::Integer.into()], constant("integer"));
        let cache = OverloadCache::default();
        let provider = SuperTypeProvider::default();
        let search = |arg: ExpressionTerm| {
            tree.search("f", &[arg], &provider, Some(&cache))
                .now_or_never()
                .unwrap()
        };
        assert!(search(ExpressionLiteral::integer(1).into()).is_some());
        assert_eq!((cache.hits(), cache.misses()), (0, 1));
        assert!(search(ExpressionLiteral::integer(2).into()).is_some());
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert!(search(ExpressionLiteral::string("a").into()).is_none());
        assert!(search(ExpressionLiteral::string("b").into()).is_none());
        assert_eq!((cache.hits(), cache.misses()), (2, 2));
        assert_eq!(cache.len(), 2);
    }
}
