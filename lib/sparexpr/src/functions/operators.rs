use super::{
    Arity, FunctionRegistry, RegularFunction, checked, date_arg, date_time_arg,
    day_time_duration_arg, decimal_arg, double_arg, duration_arg, float_arg, integer_arg,
    time_arg, year_month_duration_arg,
};
use crate::error::EvaluationError;
use crate::overload::ArgumentType;
use crate::term::{DateTimeValue, ExpressionLiteral, ExpressionTerm, LiteralValue};
use crate::types::KnownType;
use oxsdatatypes::{Date, DateTime, Decimal, Double, Float, Integer, Time};
use std::cmp::Ordering;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add(
        RegularFunction::new("!", Arity::Fixed(1)).with_unary(ArgumentType::Any, |a| {
            Ok((!a.effective_boolean_value()?).into())
        }),
    );
    registry.add(
        numeric_unary("unary +")
            .with_unary(KnownType::Numeric, |a| Ok(a.clone())),
    );
    registry.add(
        numeric_unary("unary -")
            .with_unary(KnownType::Integer, |a| {
                Ok(ExpressionLiteral::integer(checked(integer_arg(a)?.checked_neg(), "Integer")?).into())
            })
            .with_unary(KnownType::Decimal, |a| {
                Ok(ExpressionLiteral::decimal(checked(decimal_arg(a)?.checked_neg(), "Decimal")?).into())
            })
            .with_unary(KnownType::Float, |a| {
                Ok(ExpressionLiteral::float(-float_arg(a)?).into())
            })
            .with_unary(KnownType::Double, |a| {
                Ok(ExpressionLiteral::double(-double_arg(a)?).into())
            }),
    );

    registry.add(
        RegularFunction::new("=", Arity::Fixed(2)).with_binary(
            [ArgumentType::Any, ArgumentType::Any],
            |a, b| {
                equals(a, b)
                    .map(Into::into)
                    .ok_or_else(|| EvaluationError::incomparable(a, b))
            },
        ),
    );
    registry.add(
        RegularFunction::new("sameTerm", Arity::Fixed(2)).with_binary(
            [ArgumentType::Any, ArgumentType::Any],
            |a, b| Ok(same_term(a, b).into()),
        ),
    );
    registry.add(comparison("<", Ordering::is_lt));
    registry.add(comparison(">", Ordering::is_gt));
    registry.add(comparison("<=", Ordering::is_le));
    registry.add(comparison(">=", Ordering::is_ge));

    registry.add(
        arithmetic(
            "+",
            |a, b| a.checked_add(b),
            |a, b| a.checked_add(b),
            |a, b| a + b,
            |a, b| a + b,
        )
        .with_binary(
            [KnownType::DateTime.into(), KnownType::Duration.into()],
            |a, b| {
                let result = date_time_arg(a)?.checked_add_duration(duration_arg(b)?);
                Ok(ExpressionLiteral::date_time(checked(result, "dateTime")?).into())
            },
        )
        .with_binary([KnownType::Date.into(), KnownType::Duration.into()], |a, b| {
            let result = date_arg(a)?.checked_add_duration(duration_arg(b)?);
            Ok(ExpressionLiteral::date(checked(result, "date")?).into())
        })
        .with_binary([KnownType::Time.into(), KnownType::Duration.into()], |a, b| {
            let result = time_arg(a)?.checked_add_duration(duration_arg(b)?);
            Ok(ExpressionLiteral::time(checked(result, "time")?).into())
        })
        .with_binary(
            [
                KnownType::DayTimeDuration.into(),
                KnownType::DayTimeDuration.into(),
            ],
            |a, b| {
                let result = day_time_duration_arg(a)?.checked_add(day_time_duration_arg(b)?);
                Ok(ExpressionLiteral::day_time_duration(checked(result, "Duration")?).into())
            },
        )
        .with_binary(
            [
                KnownType::YearMonthDuration.into(),
                KnownType::YearMonthDuration.into(),
            ],
            |a, b| {
                let result =
                    year_month_duration_arg(a)?.checked_add(year_month_duration_arg(b)?);
                Ok(ExpressionLiteral::year_month_duration(checked(result, "Duration")?).into())
            },
        ),
    );
    registry.add(
        arithmetic(
            "-",
            |a, b| a.checked_sub(b),
            |a, b| a.checked_sub(b),
            |a, b| a - b,
            |a, b| a - b,
        )
        .with_binary(
            [KnownType::DateTime.into(), KnownType::DateTime.into()],
            |a, b| {
                let result = date_time_arg(a)?.checked_sub(date_time_arg(b)?);
                Ok(ExpressionLiteral::day_time_duration(checked(result, "dateTime")?).into())
            },
        )
        .with_binary([KnownType::Date.into(), KnownType::Date.into()], |a, b| {
            let result = date_arg(a)?.checked_sub(date_arg(b)?);
            Ok(ExpressionLiteral::day_time_duration(checked(result, "date")?).into())
        })
        .with_binary([KnownType::Time.into(), KnownType::Time.into()], |a, b| {
            let result = time_arg(a)?.checked_sub(time_arg(b)?);
            Ok(ExpressionLiteral::day_time_duration(checked(result, "time")?).into())
        })
        .with_binary(
            [KnownType::DateTime.into(), KnownType::Duration.into()],
            |a, b| {
                let result = date_time_arg(a)?.checked_sub_duration(duration_arg(b)?);
                Ok(ExpressionLiteral::date_time(checked(result, "dateTime")?).into())
            },
        )
        .with_binary([KnownType::Date.into(), KnownType::Duration.into()], |a, b| {
            let result = date_arg(a)?.checked_sub_duration(duration_arg(b)?);
            Ok(ExpressionLiteral::date(checked(result, "date")?).into())
        })
        .with_binary([KnownType::Time.into(), KnownType::Duration.into()], |a, b| {
            let result = time_arg(a)?.checked_sub_duration(duration_arg(b)?);
            Ok(ExpressionLiteral::time(checked(result, "time")?).into())
        })
        .with_binary(
            [
                KnownType::DayTimeDuration.into(),
                KnownType::DayTimeDuration.into(),
            ],
            |a, b| {
                let result = day_time_duration_arg(a)?.checked_sub(day_time_duration_arg(b)?);
                Ok(ExpressionLiteral::day_time_duration(checked(result, "Duration")?).into())
            },
        )
        .with_binary(
            [
                KnownType::YearMonthDuration.into(),
                KnownType::YearMonthDuration.into(),
            ],
            |a, b| {
                let result =
                    year_month_duration_arg(a)?.checked_sub(year_month_duration_arg(b)?);
                Ok(ExpressionLiteral::year_month_duration(checked(result, "Duration")?).into())
            },
        ),
    );
    registry.add(arithmetic(
        "*",
        |a, b| a.checked_mul(b),
        |a, b| a.checked_mul(b),
        |a, b| a * b,
        |a, b| a * b,
    ));
    registry.add(
        RegularFunction::new("/", Arity::Fixed(2))
            .with_binary(
                [KnownType::Integer.into(), KnownType::Integer.into()],
                |a, b| {
                    let result = Decimal::from(integer_arg(a)?).checked_div(integer_arg(b)?);
                    Ok(ExpressionLiteral::decimal(division(result)?).into())
                },
            )
            .with_binary(
                [KnownType::Decimal.into(), KnownType::Decimal.into()],
                |a, b| {
                    let result = decimal_arg(a)?.checked_div(decimal_arg(b)?);
                    Ok(ExpressionLiteral::decimal(division(result)?).into())
                },
            )
            .with_binary([KnownType::Float.into(), KnownType::Float.into()], |a, b| {
                Ok(ExpressionLiteral::float(float_arg(a)? / float_arg(b)?).into())
            })
            .with_binary(
                [KnownType::Double.into(), KnownType::Double.into()],
                |a, b| Ok(ExpressionLiteral::double(double_arg(a)? / double_arg(b)?).into()),
            ),
    );
}

fn numeric_unary(name: &'static str) -> RegularFunction {
    RegularFunction::new(name, Arity::Fixed(1))
}

/// The numeric tower of a binary arithmetic operator. Integers are read as decimals at decimal positions.
fn arithmetic(
    name: &'static str,
    integer: fn(Integer, Integer) -> Option<Integer>,
    decimal: fn(Decimal, Decimal) -> Option<Decimal>,
    float: fn(Float, Float) -> Float,
    double: fn(Double, Double) -> Double,
) -> RegularFunction {
    RegularFunction::new(name, Arity::Fixed(2))
        .with_binary(
            [KnownType::Integer.into(), KnownType::Integer.into()],
            move |a, b| {
                let result = integer(integer_arg(a)?, integer_arg(b)?);
                Ok(ExpressionLiteral::integer(checked(result, "Integer")?).into())
            },
        )
        .with_binary(
            [KnownType::Decimal.into(), KnownType::Decimal.into()],
            move |a, b| {
                let result = decimal(decimal_arg(a)?, decimal_arg(b)?);
                Ok(ExpressionLiteral::decimal(checked(result, "Decimal")?).into())
            },
        )
        .with_binary(
            [KnownType::Float.into(), KnownType::Float.into()],
            move |a, b| Ok(ExpressionLiteral::float(float(float_arg(a)?, float_arg(b)?)).into()),
        )
        .with_binary(
            [KnownType::Double.into(), KnownType::Double.into()],
            move |a, b| {
                Ok(ExpressionLiteral::double(double(double_arg(a)?, double_arg(b)?)).into())
            },
        )
}

fn division(result: Option<Decimal>) -> Result<Decimal, EvaluationError> {
    result.ok_or_else(|| EvaluationError::invalid_argument("Division by zero or overflow"))
}

/// An ordering operator defined between values of the same class.
fn comparison(name: &'static str, predicate: fn(Ordering) -> bool) -> RegularFunction {
    [
        KnownType::Numeric,
        KnownType::String,
        KnownType::LangString,
        KnownType::Boolean,
        KnownType::DateTime,
        KnownType::Date,
        KnownType::Time,
        KnownType::Duration,
    ]
    .into_iter()
    .fold(RegularFunction::new(name, Arity::Fixed(2)), |function, ty| {
        function.with_binary([ty.into(), ty.into()], move |a, b| {
            compare(a, b)
                .map(|ordering| predicate(ordering).into())
                .ok_or_else(|| EvaluationError::incomparable(a, b))
        })
    })
}

/// The value classes that can be compared with each other.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum ValueClass {
    Numeric,
    String,
    LangString,
    Boolean,
    Calendar,
    Duration,
}

fn value_class(value: &LiteralValue) -> Option<ValueClass> {
    Some(match value {
        LiteralValue::Integer(_)
        | LiteralValue::Decimal(_)
        | LiteralValue::Float(_)
        | LiteralValue::Double(_) => ValueClass::Numeric,
        LiteralValue::String => ValueClass::String,
        LiteralValue::LangString { .. } => ValueClass::LangString,
        LiteralValue::Boolean(_) => ValueClass::Boolean,
        LiteralValue::DateTime(_) => ValueClass::Calendar,
        LiteralValue::Duration(_) => ValueClass::Duration,
        LiteralValue::Untyped | LiteralValue::NonLexical => return None,
    })
}

enum NumericBinaryOperands {
    Integer(Integer, Integer),
    Decimal(Decimal, Decimal),
    Float(Float, Float),
    Double(Double, Double),
}

impl NumericBinaryOperands {
    /// Promotes both values to their nearest common numeric type.
    fn new(a: &LiteralValue, b: &LiteralValue) -> Option<Self> {
        Some(match (a, b) {
            (LiteralValue::Integer(a), LiteralValue::Integer(b)) => Self::Integer(*a, *b),
            (LiteralValue::Integer(a), LiteralValue::Decimal(b)) => Self::Decimal((*a).into(), *b),
            (LiteralValue::Decimal(a), LiteralValue::Integer(b)) => Self::Decimal(*a, (*b).into()),
            (LiteralValue::Decimal(a), LiteralValue::Decimal(b)) => Self::Decimal(*a, *b),
            (LiteralValue::Integer(a), LiteralValue::Float(b)) => Self::Float((*a).into(), *b),
            (LiteralValue::Decimal(a), LiteralValue::Float(b)) => Self::Float((*a).into(), *b),
            (LiteralValue::Float(a), LiteralValue::Integer(b)) => Self::Float(*a, (*b).into()),
            (LiteralValue::Float(a), LiteralValue::Decimal(b)) => Self::Float(*a, (*b).into()),
            (LiteralValue::Float(a), LiteralValue::Float(b)) => Self::Float(*a, *b),
            (LiteralValue::Integer(a), LiteralValue::Double(b)) => Self::Double((*a).into(), *b),
            (LiteralValue::Decimal(a), LiteralValue::Double(b)) => Self::Double((*a).into(), *b),
            (LiteralValue::Float(a), LiteralValue::Double(b)) => Self::Double((*a).into(), *b),
            (LiteralValue::Double(a), LiteralValue::Integer(b)) => Self::Double(*a, (*b).into()),
            (LiteralValue::Double(a), LiteralValue::Decimal(b)) => Self::Double(*a, (*b).into()),
            (LiteralValue::Double(a), LiteralValue::Float(b)) => Self::Double(*a, (*b).into()),
            (LiteralValue::Double(a), LiteralValue::Double(b)) => Self::Double(*a, *b),
            _ => return None,
        })
    }

    fn partial_cmp(&self) -> Option<Ordering> {
        match self {
            Self::Integer(a, b) => a.partial_cmp(b),
            Self::Decimal(a, b) => a.partial_cmp(b),
            Self::Float(a, b) => a.partial_cmp(b),
            Self::Double(a, b) => a.partial_cmp(b),
        }
    }
}

enum Calendar {
    DateTime(DateTime),
    Date(Date),
    Time(Time),
}

impl Calendar {
    fn new(value: &DateTimeValue) -> Option<Self> {
        match (value.date, value.time) {
            (Some(_), Some(_)) => value.to_date_time().map(Self::DateTime),
            (Some(_), None) => value.to_date().map(Self::Date),
            (None, Some(_)) => value.to_time().map(Self::Time),
            (None, None) => None,
        }
    }

    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::DateTime(a), Self::DateTime(b)) => a.partial_cmp(b),
            (Self::Date(a), Self::Date(b)) => a.partial_cmp(b),
            (Self::Time(a), Self::Time(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Orders two literals of the same value class, `None` if they are not comparable.
pub(crate) fn compare(a: &ExpressionTerm, b: &ExpressionTerm) -> Option<Ordering> {
    let (a, b) = (a.as_literal()?, b.as_literal()?);
    match (a.value(), b.value()) {
        (LiteralValue::String, LiteralValue::String) => a.lexical().partial_cmp(b.lexical()),
        (
            LiteralValue::LangString { language: la },
            LiteralValue::LangString { language: lb },
        ) => {
            if la == lb {
                a.lexical().partial_cmp(b.lexical())
            } else {
                None
            }
        }
        (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => a.partial_cmp(b),
        (LiteralValue::DateTime(a), LiteralValue::DateTime(b)) => {
            Calendar::new(a)?.partial_cmp(&Calendar::new(b)?)
        }
        (LiteralValue::Duration(a), LiteralValue::Duration(b)) => {
            a.to_duration()?.partial_cmp(&b.to_duration()?)
        }
        (a, b) => NumericBinaryOperands::new(a, b)?.partial_cmp(),
    }
}

/// [RDFterm-equal](https://www.w3.org/TR/sparql11-query/#func-RDFterm-equal) extended to values.
///
/// `None` means that the equality can not be decided.
pub(crate) fn equals(a: &ExpressionTerm, b: &ExpressionTerm) -> Option<bool> {
    let (Some(literal_a), Some(literal_b)) = (a.as_literal(), b.as_literal()) else {
        return Some(a == b);
    };
    match (value_class(literal_a.value()), value_class(literal_b.value())) {
        (Some(class_a), Some(class_b)) if class_a == class_b => {
            Some(compare(a, b) == Some(Ordering::Equal))
        }
        (Some(_), Some(_)) => Some(false),
        _ => same_term(a, b).then_some(true),
    }
}

/// [sameTerm](https://www.w3.org/TR/sparql11-query/#func-sameTerm)
pub(crate) fn same_term(a: &ExpressionTerm, b: &ExpressionTerm) -> bool {
    match (a, b) {
        (ExpressionTerm::Literal(a), ExpressionTerm::Literal(b)) => {
            a.lexical() == b.lexical() && a.datatype() == b.datatype() && a.language() == b.language()
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SuperTypeProvider;
    use futures_util::FutureExt;
    use oxrdf::NamedNode;
    use std::str::FromStr;

    fn literal(value: ExpressionLiteral) -> ExpressionTerm {
        value.into()
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert_eq!(
            equals(
                &literal(ExpressionLiteral::integer(1)),
                &literal(ExpressionLiteral::double(1.))
            ),
            Some(true)
        );
        assert_eq!(
            equals(
                &literal(ExpressionLiteral::decimal(Decimal::from_str("1.5").unwrap())),
                &literal(ExpressionLiteral::float(1.5_f32))
            ),
            Some(true)
        );
        assert_eq!(
            equals(
                &literal(ExpressionLiteral::double(f64::NAN)),
                &literal(ExpressionLiteral::double(f64::NAN))
            ),
            Some(false)
        );
    }

    #[test]
    fn equality_between_classes() {
        assert_eq!(
            equals(
                &literal(ExpressionLiteral::string("1")),
                &literal(ExpressionLiteral::integer(1))
            ),
            Some(false)
        );
        assert_eq!(
            equals(
                &literal(ExpressionLiteral::lang_string("a", "en")),
                &literal(ExpressionLiteral::lang_string("a", "fr"))
            ),
            Some(false)
        );
        let broken = literal(ExpressionLiteral::non_lexical("a", KnownType::Integer.into()));
        assert_eq!(equals(&broken, &broken.clone()), Some(true));
        assert_eq!(
            equals(&broken, &literal(ExpressionLiteral::integer(1))),
            None
        );
        let iri = ExpressionTerm::from(NamedNode::new_unchecked("http://example.com"));
        assert_eq!(equals(&iri, &literal(ExpressionLiteral::integer(1))), Some(false));
    }

    #[test]
    fn ordering() {
        assert_eq!(
            compare(
                &literal(ExpressionLiteral::integer(2)),
                &literal(ExpressionLiteral::float(10_f32))
            ),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare(
                &literal(ExpressionLiteral::string("b")),
                &literal(ExpressionLiteral::string("a"))
            ),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare(
                &literal(ExpressionLiteral::string("a")),
                &literal(ExpressionLiteral::integer(1))
            ),
            None
        );
        let date = |lexical: &str| {
            literal(ExpressionLiteral::date(Date::from_str(lexical).unwrap()))
        };
        assert_eq!(
            compare(&date("2020-01-01"), &date("2021-01-01")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn same_term_is_lexical() {
        let a = literal(ExpressionLiteral::double(f64::NAN));
        assert!(same_term(&a, &a.clone()));
        assert!(!same_term(
            &literal(ExpressionLiteral::integer(1)),
            &literal(ExpressionLiteral::decimal(1))
        ));
    }

    #[test]
    fn negation_overflow() {
        let negate = |value: ExpressionLiteral| {
            FunctionRegistry::new()
                .operator("unary -")
                .unwrap()
                .apply(&[value.into()], &SuperTypeProvider::default(), None)
                .now_or_never()
                .unwrap()
        };
        assert_eq!(
            negate(ExpressionLiteral::decimal(Decimal::from_str("1.5").unwrap())).unwrap(),
            literal(ExpressionLiteral::decimal(Decimal::from_str("-1.5").unwrap()))
        );
        assert!(matches!(
            negate(ExpressionLiteral::decimal(Decimal::MIN)),
            Err(EvaluationError::InvalidArgument(_))
        ));
    }
}
