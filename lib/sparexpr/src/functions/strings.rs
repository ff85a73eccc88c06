use super::{
    Arity, FunctionRegistry, RegularFunction, arity_error, compatible_plain_args, integer_arg,
    plain_arg, string_arg,
};
use crate::error::EvaluationError;
use crate::overload::ArgumentType;
use crate::term::{ExpressionLiteral, ExpressionTerm, LiteralValue, TermKind};
use crate::types::{Datatype, KnownType};
use md5::{Digest, Md5};
use oxrdf::vocab::rdf;
use oxrdf::{Literal, NamedNode};
use rand::random;
use regex::{Regex, RegexBuilder};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use std::borrow::Cow;

const REGEX_SIZE_LIMIT: usize = 1_000_000;

const STRINGLY: ArgumentType = ArgumentType::Type(KnownType::Stringly);
const STRING: ArgumentType = ArgumentType::Type(KnownType::String);
const INTEGER: ArgumentType = ArgumentType::Type(KnownType::Integer);

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add(
        RegularFunction::new("STRLEN", Arity::Fixed(1)).with_unary(STRINGLY, |a| {
            let (value, _) = plain_arg(a)?;
            let length = i64::try_from(value.chars().count())
                .map_err(|_| EvaluationError::invalid_argument("String too long"))?;
            Ok(ExpressionLiteral::integer(length).into())
        }),
    );
    registry.add(
        RegularFunction::new("SUBSTR", Arity::OneOf(&[2, 3]))
            .with_binary([STRINGLY, INTEGER], |a, b| {
                let (value, language) = plain_arg(a)?;
                Ok(plain(substring(value, integer_arg(b)?.into(), None), language))
            })
            .with_ternary([STRINGLY, INTEGER, INTEGER], |a, b, c| {
                let (value, language) = plain_arg(a)?;
                Ok(plain(
                    substring(value, integer_arg(b)?.into(), Some(integer_arg(c)?.into())),
                    language,
                ))
            }),
    );
    registry.add(RegularFunction::new("UCASE", Arity::Fixed(1)).with_unary(STRINGLY, |a| {
        let (value, language) = plain_arg(a)?;
        Ok(plain(value.to_uppercase(), language))
    }));
    registry.add(RegularFunction::new("LCASE", Arity::Fixed(1)).with_unary(STRINGLY, |a| {
        let (value, language) = plain_arg(a)?;
        Ok(plain(value.to_lowercase(), language))
    }));
    registry.add(
        RegularFunction::new("ENCODE_FOR_URI", Arity::Fixed(1)).with_unary(STRINGLY, |a| {
            let (value, _) = plain_arg(a)?;
            Ok(ExpressionLiteral::string(encode_for_uri(value)).into())
        }),
    );
    registry.add(string_test("CONTAINS", |a, b| a.contains(b)));
    registry.add(string_test("STRSTARTS", |a, b| a.starts_with(b)));
    registry.add(string_test("STRENDS", |a, b| a.ends_with(b)));
    registry.add(
        RegularFunction::new("STRBEFORE", Arity::Fixed(2)).with_binary(
            [STRINGLY, STRINGLY],
            |a, b| {
                let (value, needle, language) = compatible_plain_args(a, b)?;
                Ok(if let Some(position) = value.find(needle) {
                    plain(&value[..position], language)
                } else {
                    ExpressionLiteral::string("").into()
                })
            },
        ),
    );
    registry.add(
        RegularFunction::new("STRAFTER", Arity::Fixed(2)).with_binary(
            [STRINGLY, STRINGLY],
            |a, b| {
                let (value, needle, language) = compatible_plain_args(a, b)?;
                Ok(if let Some(position) = value.find(needle) {
                    plain(&value[position + needle.len()..], language)
                } else {
                    ExpressionLiteral::string("").into()
                })
            },
        ),
    );
    registry.add(
        RegularFunction::new("LANGMATCHES", Arity::Fixed(2)).with_binary(
            [STRING, STRING],
            |a, b| Ok(language_matches(string_arg(a)?, string_arg(b)?).into()),
        ),
    );
    registry.add(
        RegularFunction::new("REGEX", Arity::OneOf(&[2, 3]))
            .with_binary([STRINGLY, STRING], |a, b| {
                let (text, _) = plain_arg(a)?;
                Ok(compile_pattern(string_arg(b)?, None)?.is_match(text).into())
            })
            .with_ternary([STRINGLY, STRING, STRING], |a, b, c| {
                let (text, _) = plain_arg(a)?;
                let regex = compile_pattern(string_arg(b)?, Some(string_arg(c)?))?;
                Ok(regex.is_match(text).into())
            }),
    );
    registry.add(
        RegularFunction::new("REPLACE", Arity::OneOf(&[3, 4]))
            .with_ternary([STRINGLY, STRING, STRING], |a, b, c| {
                replace(a, compile_pattern(string_arg(b)?, None)?, c)
            })
            .with_overload(&[STRINGLY, STRING, STRING, STRING], |args| match args {
                [a, b, c, d] => replace(
                    a,
                    compile_pattern(string_arg(b)?, Some(string_arg(d)?))?,
                    c,
                ),
                _ => Err(arity_error("REPLACE", Arity::Fixed(4), args)),
            }),
    );
    registry.add(hash_function::<Md5>("MD5"));
    registry.add(hash_function::<Sha1>("SHA1"));
    registry.add(hash_function::<Sha256>("SHA256"));
    registry.add(hash_function::<Sha384>("SHA384"));
    registry.add(hash_function::<Sha512>("SHA512"));
    registry.add(
        RegularFunction::new("STRLANG", Arity::Fixed(2)).with_binary([STRING, STRING], |a, b| {
            let value = string_arg(a)?;
            let literal = Literal::new_language_tagged_literal(value, string_arg(b)?)
                .map_err(|e| EvaluationError::invalid_argument(e.to_string()))?;
            let language = literal.language().unwrap_or_default();
            Ok(ExpressionLiteral::lang_string(value, language).into())
        }),
    );
    registry.add(
        RegularFunction::new("STRDT", Arity::Fixed(2)).with_binary(
            [STRING, TermKind::NamedNode.into()],
            |a, b| {
                let ExpressionTerm::NamedNode(datatype) = b else {
                    return Err(EvaluationError::type_coercion(b, "an IRI"));
                };
                typed_literal(string_arg(a)?, datatype)
            },
        ),
    );
    registry.add(RegularFunction::new("UUID", Arity::Fixed(0)).with_nullary(|| {
        let mut buffer = String::with_capacity(45);
        buffer.push_str("urn:uuid:");
        generate_uuid(&mut buffer);
        Ok(NamedNode::new_unchecked(buffer).into())
    }));
    registry.add(RegularFunction::new("STRUUID", Arity::Fixed(0)).with_nullary(|| {
        let mut buffer = String::with_capacity(36);
        generate_uuid(&mut buffer);
        Ok(ExpressionLiteral::string(buffer).into())
    }));
}

fn plain(value: impl Into<String>, language: Option<&str>) -> ExpressionTerm {
    ExpressionLiteral::plain(value, language.map(Into::into)).into()
}

/// A boolean test between two strings with compatible language tags.
fn string_test(name: &'static str, test: fn(&str, &str) -> bool) -> RegularFunction {
    RegularFunction::new(name, Arity::Fixed(2)).with_binary([STRINGLY, STRINGLY], move |a, b| {
        let (value, needle, _) = compatible_plain_args(a, b)?;
        Ok(test(value, needle).into())
    })
}

fn hash_function<H: Digest>(name: &'static str) -> RegularFunction {
    RegularFunction::new(name, Arity::Fixed(1)).with_unary(STRING, |a| {
        let input = string_arg(a)?;
        Ok(ExpressionLiteral::string(hex::encode(H::new().chain_update(input).finalize())).into())
    })
}

/// The characters at the 1-based positions `p` such that `start <= p < start + length`.
fn substring(value: &str, start: i64, length: Option<i64>) -> String {
    let end = length.map(|length| start.saturating_add(length));
    (1_i64..)
        .zip(value.chars())
        .filter(|(position, _)| *position >= start && end.is_none_or(|end| *position < end))
        .map(|(_, c)| c)
        .collect()
}

fn encode_for_uri(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(char::from(b));
            }
            _ => result.push_str(&format!("%{b:02X}")),
        }
    }
    result
}

/// [langMatches](https://www.w3.org/TR/sparql11-query/#func-langMatches) with basic filtering.
fn language_matches(tag: &str, range: &str) -> bool {
    let tag = tag.to_ascii_lowercase();
    let range = range.to_ascii_lowercase();
    if range == "*" {
        return !tag.is_empty();
    }
    let mut subtags = tag.split('-');
    range
        .split('-')
        .all(|range_subtag| subtags.next() == Some(range_subtag))
}

fn compile_pattern(pattern: &str, flags: Option<&str>) -> Result<Regex, EvaluationError> {
    let mut pattern = Cow::Borrowed(pattern);
    let flags = flags.unwrap_or_default();
    if flags.contains('q') {
        pattern = regex::escape(&pattern).into();
    }
    let mut builder = RegexBuilder::new(&pattern);
    builder.size_limit(REGEX_SIZE_LIMIT);
    for flag in flags.chars() {
        match flag {
            's' => {
                builder.dot_matches_new_line(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            'i' => {
                builder.case_insensitive(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            'q' => (),
            _ => {
                return Err(EvaluationError::invalid_argument(format!(
                    "Unsupported regular expression flag {flag}"
                )));
            }
        }
    }
    builder
        .build()
        .map_err(|e| EvaluationError::invalid_argument(e.to_string()))
}

fn replace(
    text: &ExpressionTerm,
    regex: Regex,
    replacement: &ExpressionTerm,
) -> Result<ExpressionTerm, EvaluationError> {
    let (value, language) = plain_arg(text)?;
    let replacement = string_arg(replacement)?;
    Ok(plain(regex.replace_all(value, replacement), language))
}

/// Builds the literal of `STRDT`, parsing it if the datatype is a built-in one.
fn typed_literal(lexical: &str, datatype: &NamedNode) -> Result<ExpressionTerm, EvaluationError> {
    if datatype.as_ref() == rdf::LANG_STRING {
        return Err(EvaluationError::invalid_argument(
            "rdf:langString literals require a language tag",
        ));
    }
    Ok(match KnownType::from_iri(datatype.as_str()) {
        Some(ty) => ExpressionLiteral::from_lexical(lexical, ty),
        None => ExpressionLiteral::new(
            lexical,
            Datatype::Other(datatype.clone()),
            LiteralValue::Untyped,
        ),
    }
    .into())
}

fn generate_uuid(buffer: &mut String) {
    let mut uuid = random::<u128>().to_le_bytes();
    uuid[6] = (uuid[6] & 0x0F) | 0x40;
    uuid[8] = (uuid[8] & 0x3F) | 0x80;

    buffer.push_str(&hex::encode(&uuid[0..4]));
    buffer.push('-');
    buffer.push_str(&hex::encode(&uuid[4..6]));
    buffer.push('-');
    buffer.push_str(&hex::encode(&uuid[6..8]));
    buffer.push('-');
    buffer.push_str(&hex::encode(&uuid[8..10]));
    buffer.push('-');
    buffer.push_str(&hex::encode(&uuid[10..16]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SuperTypeProvider;
    use futures_util::FutureExt;

    fn call(name: &str, args: &[ExpressionTerm]) -> Result<ExpressionTerm, EvaluationError> {
        FunctionRegistry::new()
            .operator(name)
            .unwrap()
            .apply(args, &SuperTypeProvider::default(), None)
            .now_or_never()
            .unwrap()
    }

    fn string(value: &str) -> ExpressionTerm {
        ExpressionLiteral::string(value).into()
    }

    fn lang(value: &str, language: &str) -> ExpressionTerm {
        ExpressionLiteral::lang_string(value, language).into()
    }

    #[test]
    fn substr_is_char_based() {
        assert_eq!(substring("motor", 2, None), "otor");
        assert_eq!(substring("motor", 0, Some(3)), "mo");
        assert_eq!(substring("héllo", 2, Some(2)), "él");
        assert_eq!(substring("abc", 5, None), "");
        assert_eq!(
            call(
                "SUBSTR",
                &[lang("foobar", "en"), ExpressionLiteral::integer(4).into()]
            )
            .unwrap(),
            lang("bar", "en")
        );
    }

    #[test]
    fn strlen() {
        assert_eq!(
            call("STRLEN", &[string("chat")]).unwrap(),
            ExpressionTerm::from(ExpressionLiteral::integer(4))
        );
        assert_eq!(
            call("STRLEN", &[lang("été", "fr")]).unwrap(),
            ExpressionTerm::from(ExpressionLiteral::integer(3))
        );
    }

    #[test]
    fn before_and_after() {
        assert_eq!(
            call("STRBEFORE", &[lang("abc", "en"), string("b")]).unwrap(),
            lang("a", "en")
        );
        assert_eq!(
            call("STRAFTER", &[string("abc"), string("b")]).unwrap(),
            string("c")
        );
        assert_eq!(
            call("STRAFTER", &[lang("abc", "en"), string("z")]).unwrap(),
            string("")
        );
        assert!(call("STRBEFORE", &[lang("abc", "en"), lang("b", "fr")]).is_err());
    }

    #[test]
    fn any_uri_is_accepted_as_a_string() {
        let uri = ExpressionTerm::from(ExpressionLiteral::from_lexical(
            "http://example.com/",
            KnownType::AnyUri,
        ));
        assert_eq!(
            call("STRSTARTS", &[uri, string("http")]).unwrap(),
            ExpressionTerm::from(true)
        );
    }

    #[test]
    fn language_ranges() {
        assert!(language_matches("en-US", "en"));
        assert!(language_matches("en", "EN"));
        assert!(language_matches("fr", "*"));
        assert!(!language_matches("", "*"));
        assert!(!language_matches("en", "en-US"));
        assert!(!language_matches("de", "en"));
    }

    #[test]
    fn regex_and_replace() {
        assert_eq!(
            call("REGEX", &[string("Alice"), string("^ali"), string("i")]).unwrap(),
            ExpressionTerm::from(true)
        );
        assert_eq!(
            call("REGEX", &[string("a.c"), string("."), string("q")]).unwrap(),
            ExpressionTerm::from(true)
        );
        assert!(call("REGEX", &[string("a"), string("a"), string("z")]).is_err());
        assert_eq!(
            call(
                "REPLACE",
                &[lang("abcd", "en"), string("b"), string("Z")]
            )
            .unwrap(),
            lang("aZcd", "en")
        );
        assert_eq!(
            call(
                "REPLACE",
                &[string("AbB"), string("b"), string("x"), string("i")]
            )
            .unwrap(),
            string("axx")
        );
    }

    #[test]
    fn encoding_and_hashes() {
        assert_eq!(encode_for_uri("Los Angeles"), "Los%20Angeles");
        assert_eq!(encode_for_uri("é"), "%C3%A9");
        assert_eq!(
            call("MD5", &[string("abc")]).unwrap(),
            string("900150983cd24fb0d6963f7d28e17f72")
        );
        assert_eq!(
            call("SHA1", &[string("abc")]).unwrap(),
            string("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
        assert!(call("MD5", &[lang("abc", "en")]).is_err());
    }

    #[test]
    fn strdt_and_strlang() {
        assert_eq!(
            call(
                "STRDT",
                &[
                    string("12"),
                    NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#integer").into()
                ]
            )
            .unwrap(),
            ExpressionTerm::from(ExpressionLiteral::integer(12))
        );
        let custom = NamedNode::new_unchecked("http://example.com/dt");
        let ExpressionTerm::Literal(literal) =
            call("STRDT", &[string("x"), custom.clone().into()]).unwrap()
        else {
            panic!("STRDT returns a literal")
        };
        assert_eq!(literal.datatype(), &Datatype::Other(custom));
        assert_eq!(
            call("STRLANG", &[string("chat"), string("fr")]).unwrap(),
            lang("chat", "fr")
        );
        assert!(call("STRLANG", &[string("chat"), string("not a tag")]).is_err());
    }

    #[test]
    fn uuids() {
        let ExpressionTerm::NamedNode(uuid) = call("UUID", &[]).unwrap() else {
            panic!("UUID returns an IRI")
        };
        assert!(uuid.as_str().starts_with("urn:uuid:"));
        assert_eq!(uuid.as_str().len(), 45);
        let uuid = call("STRUUID", &[]).unwrap();
        assert_eq!(uuid.lexical_form().len(), 36);
        assert_eq!(uuid.lexical_form().as_bytes()[14], b'4');
    }
}
