//! XSD constructor functions, following the [SPARQL cast table](https://www.w3.org/TR/sparql11-query/#FunctionMapping).

use super::{Arity, FunctionRegistry, RegularFunction};
use crate::error::EvaluationError;
use crate::term::{DateTimeValue, DurationValue, ExpressionLiteral, ExpressionTerm, LiteralValue, TermKind};
use crate::types::KnownType;
use oxrdf::NamedNodeRef;
use oxrdf::vocab::xsd;
use oxsdatatypes::{Boolean, Date, DateTime, Decimal, Double, Float, Integer, Time};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_named(
        RegularFunction::new(xsd::STRING.as_str(), Arity::Fixed(1))
            .with_unary(TermKind::NamedNode, |a| {
                Ok(ExpressionLiteral::string(a.lexical_form()).into())
            })
            .with_unary(TermKind::Literal, |a| {
                Ok(ExpressionLiteral::string(a.lexical_form()).into())
            }),
    );
    let numeric_sources = [KnownType::Boolean, KnownType::Numeric, KnownType::String];
    registry.add_named(cast(xsd::BOOLEAN, KnownType::Boolean, &numeric_sources));
    registry.add_named(cast(xsd::INTEGER, KnownType::Integer, &numeric_sources));
    registry.add_named(cast(xsd::DECIMAL, KnownType::Decimal, &numeric_sources));
    registry.add_named(cast(xsd::FLOAT, KnownType::Float, &numeric_sources));
    registry.add_named(cast(xsd::DOUBLE, KnownType::Double, &numeric_sources));
    let calendar_sources = [
        KnownType::DateTime,
        KnownType::Date,
        KnownType::Time,
        KnownType::String,
    ];
    registry.add_named(cast(xsd::DATE_TIME, KnownType::DateTime, &calendar_sources));
    registry.add_named(cast(xsd::DATE, KnownType::Date, &calendar_sources));
    registry.add_named(cast(xsd::TIME, KnownType::Time, &calendar_sources));
    let duration_sources = [KnownType::Duration, KnownType::String];
    registry.add_named(cast(xsd::DURATION, KnownType::Duration, &duration_sources));
    registry.add_named(cast(
        xsd::DAY_TIME_DURATION,
        KnownType::DayTimeDuration,
        &duration_sources,
    ));
    registry.add_named(cast(
        xsd::YEAR_MONTH_DURATION,
        KnownType::YearMonthDuration,
        &duration_sources,
    ));
}

fn cast(name: NamedNodeRef<'static>, target: KnownType, sources: &[KnownType]) -> RegularFunction {
    sources.iter().fold(
        RegularFunction::new(name.as_str(), Arity::Fixed(1)),
        |function, source| function.with_unary(*source, move |a| cast_literal(a, target)),
    )
}

fn cast_literal(term: &ExpressionTerm, target: KnownType) -> Result<ExpressionTerm, EvaluationError> {
    let failure =
        || EvaluationError::invalid_argument(format!("{term} can not be cast to xsd:{target}"));
    let value = term
        .value()
        .ok_or_else(|| EvaluationError::type_coercion(term, "a literal"))?;
    Ok(match (target, value) {
        (_, LiteralValue::String) => {
            let literal = ExpressionLiteral::from_lexical(term.lexical_form().trim(), target);
            if literal.is_non_lexical() {
                return Err(failure());
            }
            literal
        }
        (KnownType::Boolean, LiteralValue::Boolean(value)) => ExpressionLiteral::boolean(*value),
        (KnownType::Boolean, _) => ExpressionLiteral::boolean(term.effective_boolean_value()?),
        (KnownType::Integer, LiteralValue::Boolean(value)) => {
            ExpressionLiteral::integer(Integer::from(*value))
        }
        (KnownType::Integer, LiteralValue::Integer(value)) => ExpressionLiteral::integer(*value),
        (KnownType::Integer, LiteralValue::Decimal(value)) => {
            ExpressionLiteral::integer(Integer::try_from(*value).map_err(|_| failure())?)
        }
        (KnownType::Integer, LiteralValue::Float(value)) => {
            ExpressionLiteral::integer(Integer::try_from(*value).map_err(|_| failure())?)
        }
        (KnownType::Integer, LiteralValue::Double(value)) => {
            ExpressionLiteral::integer(Integer::try_from(*value).map_err(|_| failure())?)
        }
        (KnownType::Decimal, LiteralValue::Boolean(value)) => {
            ExpressionLiteral::decimal(Decimal::from(*value))
        }
        (KnownType::Decimal, LiteralValue::Integer(value)) => ExpressionLiteral::decimal(*value),
        (KnownType::Decimal, LiteralValue::Decimal(value)) => ExpressionLiteral::decimal(*value),
        (KnownType::Decimal, LiteralValue::Float(value)) => {
            ExpressionLiteral::decimal(Decimal::try_from(*value).map_err(|_| failure())?)
        }
        (KnownType::Decimal, LiteralValue::Double(value)) => {
            ExpressionLiteral::decimal(Decimal::try_from(*value).map_err(|_| failure())?)
        }
        (KnownType::Float, LiteralValue::Boolean(value)) => {
            ExpressionLiteral::float(Float::from(Boolean::from(*value)))
        }
        (KnownType::Float, LiteralValue::Integer(value)) => ExpressionLiteral::float(*value),
        (KnownType::Float, LiteralValue::Decimal(value)) => ExpressionLiteral::float(*value),
        (KnownType::Float, LiteralValue::Float(value)) => ExpressionLiteral::float(*value),
        (KnownType::Float, LiteralValue::Double(value)) => ExpressionLiteral::float(*value),
        (KnownType::Double, LiteralValue::Boolean(value)) => {
            ExpressionLiteral::double(Double::from(Boolean::from(*value)))
        }
        (KnownType::Double, LiteralValue::Integer(value)) => ExpressionLiteral::double(*value),
        (KnownType::Double, LiteralValue::Decimal(value)) => ExpressionLiteral::double(*value),
        (KnownType::Double, LiteralValue::Float(value)) => ExpressionLiteral::double(*value),
        (KnownType::Double, LiteralValue::Double(value)) => ExpressionLiteral::double(*value),
        (KnownType::DateTime, LiteralValue::DateTime(value)) => {
            ExpressionLiteral::date_time(to_date_time(value).ok_or_else(failure)?)
        }
        (KnownType::Date, LiteralValue::DateTime(value)) => {
            ExpressionLiteral::date(to_date(value).ok_or_else(failure)?)
        }
        (KnownType::Time, LiteralValue::DateTime(value)) => {
            ExpressionLiteral::time(to_time(value).ok_or_else(failure)?)
        }
        (KnownType::Duration, LiteralValue::Duration(value)) => {
            ExpressionLiteral::duration(value.to_duration().ok_or_else(failure)?)
        }
        (KnownType::DayTimeDuration, LiteralValue::Duration(value)) => {
            let value = DurationValue {
                years: 0,
                months: 0,
                ..*value
            };
            ExpressionLiteral::day_time_duration(value.to_day_time_duration().ok_or_else(failure)?)
        }
        (KnownType::YearMonthDuration, LiteralValue::Duration(value)) => {
            let value = DurationValue {
                days: 0,
                hours: 0,
                minutes: 0,
                seconds: Decimal::from(0),
                ..*value
            };
            ExpressionLiteral::year_month_duration(
                value.to_year_month_duration().ok_or_else(failure)?,
            )
        }
        _ => return Err(failure()),
    }
    .into())
}

fn to_date_time(value: &DateTimeValue) -> Option<DateTime> {
    if value.time.is_some() {
        value.to_date_time()
    } else {
        DateTime::try_from(value.to_date()?).ok()
    }
}

fn to_date(value: &DateTimeValue) -> Option<Date> {
    if value.time.is_some() {
        Date::try_from(value.to_date_time()?).ok()
    } else {
        value.to_date()
    }
}

fn to_time(value: &DateTimeValue) -> Option<Time> {
    if value.date.is_some() {
        Some(Time::from(value.to_date_time()?))
    } else {
        value.to_time()
    }
}
