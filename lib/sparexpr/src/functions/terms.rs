use super::{Arity, FunctionRegistry, RegularFunction};
use crate::error::EvaluationError;
use crate::overload::ArgumentType;
use crate::term::{ExpressionLiteral, ExpressionTerm, LiteralValue, TermKind};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add(
        RegularFunction::new("STR", Arity::Fixed(1))
            .with_unary(TermKind::NamedNode, |a| {
                Ok(ExpressionLiteral::string(a.lexical_form()).into())
            })
            .with_unary(TermKind::Literal, |a| {
                Ok(ExpressionLiteral::string(a.lexical_form()).into())
            }),
    );
    registry.add(
        RegularFunction::new("LANG", Arity::Fixed(1)).with_unary(TermKind::Literal, |a| {
            Ok(ExpressionLiteral::string(
                a.as_literal()
                    .and_then(ExpressionLiteral::language)
                    .unwrap_or_default(),
            )
            .into())
        }),
    );
    registry.add(
        RegularFunction::new("DATATYPE", Arity::Fixed(1)).with_unary(TermKind::Literal, |a| {
            a.as_literal()
                .and_then(|literal| literal.datatype().iri())
                .map(|iri| iri.into_owned().into())
                .ok_or_else(|| EvaluationError::type_coercion(a, "a literal with a datatype IRI"))
        }),
    );
    registry.add(kind_test("isIRI", |a| a.kind() == TermKind::NamedNode));
    registry.add(kind_test("isBLANK", |a| a.kind() == TermKind::BlankNode));
    registry.add(kind_test("isLITERAL", |a| a.kind() == TermKind::Literal));
    registry.add(kind_test("isNUMERIC", |a| {
        matches!(
            a.value(),
            Some(
                LiteralValue::Integer(_)
                    | LiteralValue::Decimal(_)
                    | LiteralValue::Float(_)
                    | LiteralValue::Double(_)
            )
        )
    }));
}

/// A test accepting any term.
fn kind_test(name: &'static str, test: fn(&ExpressionTerm) -> bool) -> RegularFunction {
    RegularFunction::new(name, Arity::Fixed(1))
        .with_unary(ArgumentType::Any, move |a| Ok(test(a).into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KnownType, SuperTypeProvider};
    use futures_util::FutureExt;
    use oxrdf::vocab::{rdf, xsd};
    use oxrdf::{BlankNode, NamedNode};

    fn call(name: &str, arg: ExpressionTerm) -> Result<ExpressionTerm, EvaluationError> {
        FunctionRegistry::new()
            .operator(name)
            .unwrap()
            .apply(&[arg], &SuperTypeProvider::default(), None)
            .now_or_never()
            .unwrap()
    }

    #[test]
    fn str_and_lang() {
        let iri = ExpressionTerm::from(NamedNode::new_unchecked("http://example.com/"));
        assert_eq!(
            call("STR", iri).unwrap(),
            ExpressionTerm::from(ExpressionLiteral::string("http://example.com/"))
        );
        assert!(call("STR", BlankNode::default().into()).is_err());
        assert_eq!(
            call("LANG", ExpressionLiteral::lang_string("chat", "fr").into()).unwrap(),
            ExpressionTerm::from(ExpressionLiteral::string("fr"))
        );
        assert_eq!(
            call("LANG", ExpressionLiteral::integer(1).into()).unwrap(),
            ExpressionTerm::from(ExpressionLiteral::string(""))
        );
    }

    #[test]
    fn datatype() {
        assert_eq!(
            call("DATATYPE", ExpressionLiteral::lang_string("chat", "fr").into()).unwrap(),
            ExpressionTerm::from(rdf::LANG_STRING.into_owned())
        );
        assert_eq!(
            call(
                "DATATYPE",
                ExpressionLiteral::non_lexical("abc", KnownType::Integer.into()).into()
            )
            .unwrap(),
            ExpressionTerm::from(xsd::INTEGER.into_owned())
        );
    }

    #[test]
    fn kind_tests() {
        let broken = ExpressionTerm::from(ExpressionLiteral::non_lexical(
            "abc",
            KnownType::Double.into(),
        ));
        assert_eq!(call("isLITERAL", broken.clone()).unwrap(), ExpressionTerm::from(true));
        assert_eq!(call("isNUMERIC", broken).unwrap(), ExpressionTerm::from(false));
        assert_eq!(
            call("isNUMERIC", ExpressionLiteral::from_lexical("1", KnownType::Byte).into())
                .unwrap(),
            ExpressionTerm::from(true)
        );
        assert_eq!(
            call("isBLANK", BlankNode::default().into()).unwrap(),
            ExpressionTerm::from(true)
        );
        assert_eq!(
            call("isIRI", ExpressionLiteral::string("a").into()).unwrap(),
            ExpressionTerm::from(false)
        );
    }
}
