use crate::error::EvaluationError;
use crate::lexical;
use crate::types::{Datatype, KnownType};
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{BlankNode, Literal, NamedNode, Term};
use oxsdatatypes::{
    Boolean, Date, DateTime, DayTimeDuration, Decimal, Double, Duration, Float, Integer, Time,
    TimezoneOffset, YearMonthDuration,
};
use std::fmt;

/// The kind of an RDF term.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum TermKind {
    NamedNode,
    BlankNode,
    Literal,
}

impl fmt::Display for TermKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NamedNode => "IRI",
            Self::BlankNode => "blank node",
            Self::Literal => "literal",
        })
    }
}

/// A term as seen by function implementations: literals carry their parsed value.
#[derive(PartialEq, Debug, Clone)]
pub enum ExpressionTerm {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
    Literal(ExpressionLiteral),
}

impl ExpressionTerm {
    #[inline]
    pub fn kind(&self) -> TermKind {
        match self {
            Self::NamedNode(_) => TermKind::NamedNode,
            Self::BlankNode(_) => TermKind::BlankNode,
            Self::Literal(_) => TermKind::Literal,
        }
    }

    #[inline]
    pub fn as_literal(&self) -> Option<&ExpressionLiteral> {
        if let Self::Literal(literal) = self {
            Some(literal)
        } else {
            None
        }
    }

    #[inline]
    pub fn value(&self) -> Option<&LiteralValue> {
        self.as_literal().map(ExpressionLiteral::value)
    }

    /// The string used for `STR`, aggregation and error messages.
    #[inline]
    pub fn lexical_form(&self) -> &str {
        match self {
            Self::NamedNode(node) => node.as_str(),
            Self::BlankNode(node) => node.as_str(),
            Self::Literal(literal) => literal.lexical(),
        }
    }

    /// [Effective boolean value](https://www.w3.org/TR/sparql11-query/#ebv)
    pub fn effective_boolean_value(&self) -> Result<bool, EvaluationError> {
        if let Self::Literal(literal) = self {
            match &literal.value {
                LiteralValue::Boolean(value) => return Ok(*value),
                LiteralValue::String => return Ok(!literal.lexical.is_empty()),
                LiteralValue::Integer(value) => return Ok(Boolean::from(*value).into()),
                LiteralValue::Decimal(value) => return Ok(Boolean::from(*value).into()),
                LiteralValue::Float(value) => return Ok(Boolean::from(*value).into()),
                LiteralValue::Double(value) => return Ok(Boolean::from(*value).into()),
                LiteralValue::NonLexical
                    if literal.datatype.known().is_some_and(|t| {
                        t == KnownType::Boolean || t.conforms_to(KnownType::Numeric)
                    }) =>
                {
                    return Ok(false);
                }
                _ => (),
            }
        }
        Err(EvaluationError::type_coercion(self, "convertible to a boolean"))
    }

    /// The type driving overload dispatch, `None` for IRIs and blank nodes.
    #[inline]
    pub fn dispatch_type(&self) -> Option<Datatype> {
        self.as_literal().map(ExpressionLiteral::dispatch_type)
    }

    /// The datatype name (or the term kind) used in error messages and cache keys.
    pub(crate) fn type_name(&self) -> String {
        match self {
            Self::Literal(literal) => literal.datatype.to_string(),
            _ => self.kind().to_string(),
        }
    }
}

impl From<ExpressionLiteral> for ExpressionTerm {
    #[inline]
    fn from(literal: ExpressionLiteral) -> Self {
        Self::Literal(literal)
    }
}

impl From<NamedNode> for ExpressionTerm {
    #[inline]
    fn from(node: NamedNode) -> Self {
        Self::NamedNode(node)
    }
}

impl From<BlankNode> for ExpressionTerm {
    #[inline]
    fn from(node: BlankNode) -> Self {
        Self::BlankNode(node)
    }
}

impl From<bool> for ExpressionTerm {
    #[inline]
    fn from(value: bool) -> Self {
        ExpressionLiteral::boolean(value).into()
    }
}

impl From<ExpressionTerm> for Term {
    #[inline]
    fn from(term: ExpressionTerm) -> Self {
        match term {
            ExpressionTerm::NamedNode(node) => node.into(),
            ExpressionTerm::BlankNode(node) => node.into(),
            ExpressionTerm::Literal(literal) => Literal::from(literal).into(),
        }
    }
}

impl fmt::Display for ExpressionTerm {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Term::from(self.clone()).fmt(f)
    }
}

/// A literal with its original lexical form and its parsed value.
///
/// The lexical form is kept verbatim, even when it does not match the datatype grammar.
#[derive(PartialEq, Debug, Clone)]
pub struct ExpressionLiteral {
    lexical: String,
    datatype: Datatype,
    value: LiteralValue,
}

/// The parsed value of a literal.
#[derive(PartialEq, Debug, Clone)]
pub enum LiteralValue {
    /// A string of the string tower, the lexical form is the value.
    String,
    LangString {
        language: String,
    },
    Boolean(bool),
    Integer(Integer),
    Decimal(Decimal),
    Float(Float),
    Double(Double),
    DateTime(DateTimeValue),
    Duration(DurationValue),
    /// A literal whose datatype has no dedicated value space.
    Untyped,
    /// The lexical form does not match the datatype grammar.
    NonLexical,
}

impl ExpressionLiteral {
    #[inline]
    pub(crate) fn new(lexical: impl Into<String>, datatype: Datatype, value: LiteralValue) -> Self {
        Self {
            lexical: lexical.into(),
            datatype,
            value,
        }
    }

    #[inline]
    pub fn non_lexical(lexical: impl Into<String>, datatype: Datatype) -> Self {
        Self::new(lexical, datatype, LiteralValue::NonLexical)
    }

    #[inline]
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value, KnownType::String.into(), LiteralValue::String)
    }

    #[inline]
    pub fn lang_string(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(
            value,
            KnownType::LangString.into(),
            LiteralValue::LangString {
                language: language.into(),
            },
        )
    }

    /// A string with an optional language tag.
    #[inline]
    pub fn plain(value: impl Into<String>, language: Option<String>) -> Self {
        if let Some(language) = language {
            Self::lang_string(value, language)
        } else {
            Self::string(value)
        }
    }

    #[inline]
    pub fn boolean(value: bool) -> Self {
        Self::new(
            if value { "true" } else { "false" },
            KnownType::Boolean.into(),
            LiteralValue::Boolean(value),
        )
    }

    #[inline]
    pub fn integer(value: impl Into<Integer>) -> Self {
        let value = value.into();
        Self::new(
            value.to_string(),
            KnownType::Integer.into(),
            LiteralValue::Integer(value),
        )
    }

    #[inline]
    pub fn decimal(value: impl Into<Decimal>) -> Self {
        let value = value.into();
        Self::new(
            value.to_string(),
            KnownType::Decimal.into(),
            LiteralValue::Decimal(value),
        )
    }

    #[inline]
    pub fn float(value: impl Into<Float>) -> Self {
        let value = value.into();
        Self::new(
            value.to_string(),
            KnownType::Float.into(),
            LiteralValue::Float(value),
        )
    }

    #[inline]
    pub fn double(value: impl Into<Double>) -> Self {
        let value = value.into();
        Self::new(
            value.to_string(),
            KnownType::Double.into(),
            LiteralValue::Double(value),
        )
    }

    pub fn date_time(value: DateTime) -> Self {
        Self::from_lexical(value.to_string(), KnownType::DateTime)
    }

    pub fn date(value: Date) -> Self {
        Self::from_lexical(value.to_string(), KnownType::Date)
    }

    pub fn time(value: Time) -> Self {
        Self::from_lexical(value.to_string(), KnownType::Time)
    }

    pub fn duration(value: Duration) -> Self {
        Self::from_lexical(value.to_string(), KnownType::Duration)
    }

    pub fn day_time_duration(value: DayTimeDuration) -> Self {
        Self::from_lexical(value.to_string(), KnownType::DayTimeDuration)
    }

    pub fn year_month_duration(value: YearMonthDuration) -> Self {
        Self::from_lexical(value.to_string(), KnownType::YearMonthDuration)
    }

    /// Parses a lexical form of a built-in datatype, a non-lexical literal is returned on failure.
    pub fn from_lexical(lexical: impl Into<String>, ty: KnownType) -> Self {
        let lexical = lexical.into();
        let value = lexical::parse_known(&lexical, ty);
        Self::new(lexical, ty.into(), value)
    }

    #[inline]
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    #[inline]
    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    #[inline]
    pub fn value(&self) -> &LiteralValue {
        &self.value
    }

    #[inline]
    pub fn language(&self) -> Option<&str> {
        if let LiteralValue::LangString { language } = &self.value {
            Some(language)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_non_lexical(&self) -> bool {
        self.value == LiteralValue::NonLexical
    }

    /// Non-lexical literals are dispatched as such whatever their declared datatype.
    #[inline]
    pub fn dispatch_type(&self) -> Datatype {
        if self.is_non_lexical() {
            KnownType::NonLexical.into()
        } else {
            self.datatype.clone()
        }
    }

    /// The string value with its language tag if this literal is a plain string.
    #[inline]
    pub fn as_plain(&self) -> Option<(&str, Option<&str>)> {
        match &self.value {
            LiteralValue::String => Some((&self.lexical, None)),
            LiteralValue::LangString { language } => Some((&self.lexical, Some(language))),
            _ => None,
        }
    }
}

impl From<ExpressionLiteral> for Literal {
    fn from(literal: ExpressionLiteral) -> Self {
        if let LiteralValue::LangString { language } = literal.value {
            return Self::new_language_tagged_literal_unchecked(literal.lexical, language);
        }
        match literal.datatype.iri() {
            Some(iri) if iri != xsd::STRING && iri != rdf::LANG_STRING => {
                Self::new_typed_literal(literal.lexical, iri)
            }
            _ => Self::new_simple_literal(literal.lexical),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct DateParts {
    pub year: i64,
    pub month: u8,
    pub day: u8,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct TimeParts {
    pub hour: u8,
    pub minute: u8,
    pub second: Decimal,
}

/// Calendar components of a `xsd:dateTime`, `xsd:date` or `xsd:time`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct DateTimeValue {
    pub date: Option<DateParts>,
    pub time: Option<TimeParts>,
    pub timezone: Option<TimezoneOffset>,
}

impl DateTimeValue {
    fn write_date(date: DateParts, buffer: &mut String) {
        if date.year < 0 {
            buffer.push('-');
        }
        buffer.push_str(&format!(
            "{:04}-{:02}-{:02}",
            date.year.unsigned_abs(),
            date.month,
            date.day
        ));
    }

    fn write_time(time: TimeParts, buffer: &mut String) {
        buffer.push_str(&format!("{:02}:{:02}:", time.hour, time.minute));
        if time.second < Decimal::from(10) {
            buffer.push('0');
        }
        buffer.push_str(&time.second.to_string());
    }

    fn write_timezone(&self, buffer: &mut String) {
        if let Some(timezone) = self.timezone {
            buffer.push_str(&timezone.to_string());
        }
    }

    /// Converts to an instant if both the date and the time are set.
    pub fn to_date_time(&self) -> Option<DateTime> {
        let mut buffer = String::new();
        Self::write_date(self.date?, &mut buffer);
        buffer.push('T');
        Self::write_time(self.time?, &mut buffer);
        self.write_timezone(&mut buffer);
        buffer.parse().ok()
    }

    pub fn to_date(&self) -> Option<Date> {
        if self.time.is_some() {
            return None;
        }
        let mut buffer = String::new();
        Self::write_date(self.date?, &mut buffer);
        self.write_timezone(&mut buffer);
        buffer.parse().ok()
    }

    pub fn to_time(&self) -> Option<Time> {
        if self.date.is_some() {
            return None;
        }
        let mut buffer = String::new();
        Self::write_time(self.time?, &mut buffer);
        self.write_timezone(&mut buffer);
        buffer.parse().ok()
    }
}

/// Signed duration components, not normalized across units.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Default)]
pub struct DurationValue {
    pub negative: bool,
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: Decimal,
}

impl DurationValue {
    fn total_months(&self) -> Option<i64> {
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        if self.negative {
            months.checked_neg()
        } else {
            Some(months)
        }
    }

    fn total_seconds(&self) -> Option<Decimal> {
        let minutes = self
            .days
            .checked_mul(24)?
            .checked_add(self.hours)?
            .checked_mul(60)?
            .checked_add(self.minutes)?;
        let seconds = Decimal::from(minutes.checked_mul(60)?).checked_add(self.seconds)?;
        if self.negative {
            Decimal::from(0).checked_sub(seconds)
        } else {
            Some(seconds)
        }
    }

    pub fn to_duration(&self) -> Option<Duration> {
        Duration::new(self.total_months()?, self.total_seconds()?).ok()
    }

    /// `None` if the duration has a year or month component.
    pub fn to_day_time_duration(&self) -> Option<DayTimeDuration> {
        (self.years == 0 && self.months == 0)
            .then(|| self.total_seconds().map(DayTimeDuration::new))
            .flatten()
    }

    /// `None` if the duration has a day or time component.
    pub fn to_year_month_duration(&self) -> Option<YearMonthDuration> {
        (self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == Decimal::from(0))
            .then(|| self.total_months().map(YearMonthDuration::new))
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn ebv() {
        assert_eq!(
            ExpressionTerm::from(ExpressionLiteral::string("")).effective_boolean_value().ok(),
            Some(false)
        );
        assert_eq!(
            ExpressionTerm::from(ExpressionLiteral::integer(2)).effective_boolean_value().ok(),
            Some(true)
        );
        assert_eq!(
            ExpressionTerm::from(ExpressionLiteral::non_lexical(
                "foo",
                KnownType::Integer.into()
            ))
            .effective_boolean_value()
            .ok(),
            Some(false)
        );
        assert_eq!(
            ExpressionTerm::from(ExpressionLiteral::non_lexical("abc", KnownType::Byte.into()))
                .effective_boolean_value()
                .ok(),
            Some(false)
        );
        assert!(
            ExpressionTerm::from(ExpressionLiteral::non_lexical("abc", KnownType::Date.into()))
                .effective_boolean_value()
                .is_err()
        );
        assert!(
            ExpressionTerm::from(NamedNode::new_unchecked("http://example.com"))
                .effective_boolean_value()
                .is_err()
        );
    }

    #[test]
    fn literal_to_term_keeps_lexical_form() {
        let literal = ExpressionLiteral::non_lexical("abc", KnownType::Integer.into());
        assert_eq!(
            Literal::from(literal),
            Literal::new_typed_literal("abc", xsd::INTEGER)
        );
        assert_eq!(
            Literal::from(ExpressionLiteral::lang_string("chat", "fr")),
            Literal::new_language_tagged_literal_unchecked("chat", "fr")
        );
        assert_eq!(
            Literal::from(ExpressionLiteral::string("a")),
            Literal::new_simple_literal("a")
        );
    }

    #[test]
    fn date_time_parts_round_trip() {
        let date_time = DateTime::from_str("2011-01-10T14:45:13.815-05:00").unwrap();
        let literal = ExpressionLiteral::date_time(date_time);
        let LiteralValue::DateTime(value) = literal.value() else {
            panic!("{literal:?} is not a dateTime")
        };
        assert_eq!(value.to_date_time(), Some(date_time));
        assert_eq!(value.time.map(|t| t.minute), Some(45));
    }

    #[test]
    fn duration_totals() {
        let value = DurationValue {
            negative: true,
            days: 1,
            hours: 2,
            ..DurationValue::default()
        };
        assert_eq!(
            value.to_day_time_duration(),
            Some(DayTimeDuration::from_str("-P1DT2H").unwrap())
        );
        assert_eq!(value.to_year_month_duration(), None);
        assert_eq!(
            value.to_duration(),
            Some(Duration::from_str("-P1DT2H").unwrap())
        );
        let mixed = DurationValue {
            years: 1,
            months: 2,
            minutes: 90,
            ..DurationValue::default()
        };
        assert_eq!(
            mixed.to_duration(),
            Some(Duration::from_str("P1Y2MT1H30M").unwrap())
        );
    }
}
