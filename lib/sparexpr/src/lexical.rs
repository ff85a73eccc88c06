//! Turns literal lexical forms into typed values.
//!
//! Parsing never fails: a lexical form that does not match its datatype grammar becomes a
//! [`LiteralValue::NonLexical`] value that keeps the original text.

use crate::term::{
    DateParts, DateTimeValue, DurationValue, ExpressionLiteral, ExpressionTerm, LiteralValue,
    TimeParts,
};
use crate::types::{KnownType, SuperTypeProvider, TypeAncestry};
use oxrdf::Term;
use oxsdatatypes::{Decimal, Double, Float, Integer, TimezoneOffset};
use std::str::FromStr;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct LexicalError(&'static str);

/// The value space a datatype is parsed into.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum ValueFamily {
    LangString,
    String,
    DateTime { timezone_required: bool },
    Date,
    Time,
    Duration,
    DayTimeDuration,
    YearMonthDuration,
    Boolean,
    Integer(KnownType),
    Decimal,
    Float,
    Double,
    Other,
}

impl ValueFamily {
    /// The first matching family wins, the order matters.
    fn of(ancestry: &TypeAncestry, has_language: bool) -> Self {
        if has_language || ancestry.conforms_to(KnownType::LangString) {
            Self::LangString
        } else if ancestry.conforms_to(KnownType::String) {
            Self::String
        } else if ancestry.conforms_to(KnownType::DateTime) {
            Self::DateTime {
                timezone_required: ancestry.conforms_to(KnownType::DateTimeStamp),
            }
        } else if ancestry.conforms_to(KnownType::Date) {
            Self::Date
        } else if ancestry.conforms_to(KnownType::Time) {
            Self::Time
        } else if ancestry.conforms_to(KnownType::DayTimeDuration) {
            Self::DayTimeDuration
        } else if ancestry.conforms_to(KnownType::YearMonthDuration) {
            Self::YearMonthDuration
        } else if ancestry.conforms_to(KnownType::Duration) {
            Self::Duration
        } else if ancestry.conforms_to(KnownType::Boolean) {
            Self::Boolean
        } else if ancestry.conforms_to(KnownType::Integer) {
            // The nearest built-in integer type gives the allowed range
            Self::Integer(
                ancestry
                    .lineage()
                    .filter_map(|(t, _)| t.known())
                    .next()
                    .unwrap_or(KnownType::Integer),
            )
        } else if ancestry.conforms_to(KnownType::Decimal) {
            Self::Decimal
        } else if ancestry.conforms_to(KnownType::Float) {
            Self::Float
        } else if ancestry.conforms_to(KnownType::Double) {
            Self::Double
        } else {
            Self::Other
        }
    }

    /// Same as [`of`](Self::of) for a built-in datatype, following its parents.
    fn of_known(ty: KnownType) -> Self {
        let mut current = Some(ty);
        while let Some(t) = current {
            match t {
                KnownType::LangString => return Self::LangString,
                KnownType::String => return Self::String,
                KnownType::DateTimeStamp => {
                    return Self::DateTime {
                        timezone_required: true,
                    };
                }
                KnownType::DateTime => {
                    return Self::DateTime {
                        timezone_required: false,
                    };
                }
                KnownType::Date => return Self::Date,
                KnownType::Time => return Self::Time,
                KnownType::DayTimeDuration => return Self::DayTimeDuration,
                KnownType::YearMonthDuration => return Self::YearMonthDuration,
                KnownType::Duration => return Self::Duration,
                KnownType::Boolean => return Self::Boolean,
                KnownType::Integer => return Self::Integer(ty),
                KnownType::Decimal => return Self::Decimal,
                KnownType::Float => return Self::Float,
                KnownType::Double => return Self::Double,
                _ => current = t.parent(),
            }
        }
        Self::Other
    }

    fn parse(self, lexical: &str, language: Option<&str>) -> Result<LiteralValue, LexicalError> {
        Ok(match self {
            Self::LangString => LiteralValue::LangString {
                language: language
                    .ok_or(LexicalError("Language tagged strings require a language"))?
                    .into(),
            },
            Self::String => LiteralValue::String,
            Self::DateTime { timezone_required } => {
                let value = ensure_complete(lexical, date_time_lexical_rep)?;
                if timezone_required && value.timezone.is_none() {
                    return Err(LexicalError("A timezone is required"));
                }
                LiteralValue::DateTime(value)
            }
            Self::Date => LiteralValue::DateTime(ensure_complete(lexical, date_lexical_rep)?),
            Self::Time => LiteralValue::DateTime(ensure_complete(lexical, time_lexical_rep)?),
            Self::Duration => LiteralValue::Duration(parse_duration(lexical)?),
            Self::DayTimeDuration => {
                let value = parse_duration(lexical)?;
                if value.years != 0 || value.months != 0 {
                    return Err(LexicalError(
                        "Day-time durations can not have year or month components",
                    ));
                }
                LiteralValue::Duration(value)
            }
            Self::YearMonthDuration => {
                let value = parse_duration(lexical)?;
                if lexical.contains(['D', 'T']) {
                    return Err(LexicalError(
                        "Year-month durations can only have year and month components",
                    ));
                }
                LiteralValue::Duration(value)
            }
            Self::Boolean => LiteralValue::Boolean(match lexical {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(LexicalError("Booleans are true, false, 1 or 0")),
            }),
            Self::Integer(ty) => {
                let value = Integer::from_str(lexical)
                    .map_err(|_| LexicalError("Invalid integer lexical form"))?;
                let (min, max) = integer_bounds(ty);
                let raw = i64::from(value);
                if min.is_some_and(|min| raw < min) || max.is_some_and(|max| raw > max) {
                    return Err(LexicalError("Integer out of the datatype range"));
                }
                LiteralValue::Integer(value)
            }
            Self::Decimal => LiteralValue::Decimal(
                Decimal::from_str(lexical)
                    .map_err(|_| LexicalError("Invalid decimal lexical form"))?,
            ),
            Self::Float => LiteralValue::Float(
                Float::from_str(lexical).map_err(|_| LexicalError("Invalid float lexical form"))?,
            ),
            Self::Double => LiteralValue::Double(
                Double::from_str(lexical)
                    .map_err(|_| LexicalError("Invalid double lexical form"))?,
            ),
            Self::Other => LiteralValue::Untyped,
        })
    }
}

fn integer_bounds(ty: KnownType) -> (Option<i64>, Option<i64>) {
    match ty {
        KnownType::NonPositiveInteger => (None, Some(0)),
        KnownType::NegativeInteger => (None, Some(-1)),
        KnownType::Long => (None, None),
        KnownType::Int => (Some(i32::MIN.into()), Some(i32::MAX.into())),
        KnownType::Short => (Some(i16::MIN.into()), Some(i16::MAX.into())),
        KnownType::Byte => (Some(i8::MIN.into()), Some(i8::MAX.into())),
        KnownType::NonNegativeInteger | KnownType::UnsignedLong => (Some(0), None),
        KnownType::PositiveInteger => (Some(1), None),
        KnownType::UnsignedInt => (Some(0), Some(u32::MAX.into())),
        KnownType::UnsignedShort => (Some(0), Some(u16::MAX.into())),
        KnownType::UnsignedByte => (Some(0), Some(u8::MAX.into())),
        _ => (None, None),
    }
}

/// Parses a literal whose datatype ancestry is already resolved.
pub fn parse_literal(
    lexical: &str,
    language: Option<&str>,
    ancestry: &TypeAncestry,
) -> ExpressionLiteral {
    let datatype = ancestry.datatype().clone();
    match ValueFamily::of(ancestry, language.is_some()).parse(lexical, language) {
        Ok(value) => ExpressionLiteral::new(lexical, datatype, value),
        Err(LexicalError(message)) => {
            trace!("{lexical:?} is not a valid {datatype} lexical form: {message}");
            ExpressionLiteral::non_lexical(lexical, datatype)
        }
    }
}

/// Parses the lexical form of a built-in datatype without going through a lattice.
pub(crate) fn parse_known(lexical: &str, ty: KnownType) -> LiteralValue {
    ValueFamily::of_known(ty)
        .parse(lexical, None)
        .unwrap_or(LiteralValue::NonLexical)
}

/// Converts an RDF term into an [`ExpressionTerm`], discovering the literal datatype if needed.
pub async fn transform_term(term: &Term, provider: &SuperTypeProvider) -> ExpressionTerm {
    match term {
        Term::NamedNode(node) => node.clone().into(),
        Term::BlankNode(node) => node.clone().into(),
        Term::Literal(literal) => {
            let ancestry = provider.ancestry(&literal.datatype().into()).await;
            parse_literal(literal.value(), literal.language(), &ancestry).into()
        }
    }
}

/// Promotes a numeric term to `xsd:float` without reparsing it.
pub fn as_float(term: &ExpressionTerm) -> Option<ExpressionTerm> {
    Some(
        ExpressionLiteral::float(match term.value()? {
            LiteralValue::Integer(value) => Float::from(*value),
            LiteralValue::Decimal(value) => Float::from(*value),
            LiteralValue::Float(value) => *value,
            _ => return None,
        })
        .into(),
    )
}

/// Promotes a numeric term to `xsd:double` without reparsing it.
pub fn as_double(term: &ExpressionTerm) -> Option<ExpressionTerm> {
    Some(
        ExpressionLiteral::double(match term.value()? {
            LiteralValue::Integer(value) => Double::from(*value),
            LiteralValue::Decimal(value) => Double::from(*value),
            LiteralValue::Float(value) => Double::from(*value),
            LiteralValue::Double(value) => *value,
            _ => return None,
        })
        .into(),
    )
}

/// Rewraps a literal (typically a `xsd:anyURI`) as a simple string.
pub fn as_string(term: &ExpressionTerm) -> Option<ExpressionTerm> {
    let literal = term.as_literal()?;
    if literal.language().is_some() || literal.is_non_lexical() {
        return None;
    }
    Some(ExpressionLiteral::string(literal.lexical()).into())
}

// [16]   dateTimeLexicalRep ::= yearFrag '-' monthFrag '-' dayFrag 'T' ((hourFrag ':' minuteFrag ':' secondFrag) | endOfDayFrag) timezoneFrag?
fn date_time_lexical_rep(input: &str) -> Result<(DateTimeValue, &str), LexicalError> {
    let (date, input) = date_frag(input)?;
    let input = expect_char(input, 'T', "The date and time must be separated by 'T'")?;
    let (time, input) = time_frag(input)?;
    let (timezone, input) = optional_end(input, timezone_frag)?;
    Ok((
        DateTimeValue {
            date: Some(date),
            time: Some(time),
            timezone,
        },
        input,
    ))
}

// [18]   dateLexicalRep ::= yearFrag '-' monthFrag '-' dayFrag timezoneFrag?
fn date_lexical_rep(input: &str) -> Result<(DateTimeValue, &str), LexicalError> {
    let (date, input) = date_frag(input)?;
    let (timezone, input) = optional_end(input, timezone_frag)?;
    Ok((
        DateTimeValue {
            date: Some(date),
            time: None,
            timezone,
        },
        input,
    ))
}

// [17]   timeLexicalRep ::= ((hourFrag ':' minuteFrag ':' secondFrag) | endOfDayFrag) timezoneFrag?
fn time_lexical_rep(input: &str) -> Result<(DateTimeValue, &str), LexicalError> {
    let (time, input) = time_frag(input)?;
    let (timezone, input) = optional_end(input, timezone_frag)?;
    Ok((
        DateTimeValue {
            date: None,
            time: Some(time),
            timezone,
        },
        input,
    ))
}

fn date_frag(input: &str) -> Result<(DateParts, &str), LexicalError> {
    let (year, input) = year_frag(input)?;
    let input = expect_char(input, '-', "The year and month must be separated by '-'")?;
    let (month, input) = two_digits(input, 1..=12, "Months must be between 01 and 12")?;
    let input = expect_char(input, '-', "The month and day must be separated by '-'")?;
    let (day, input) = two_digits(
        input,
        1..=days_in_month(year, month),
        "The day does not exist in this month",
    )?;
    Ok((DateParts { year, month, day }, input))
}

fn time_frag(input: &str) -> Result<(TimeParts, &str), LexicalError> {
    let (hour, input) = two_digits(input, 0..=24, "Hours must be between 00 and 24")?;
    let input = expect_char(input, ':', "The hours and minutes must be separated by ':'")?;
    let (minute, input) = two_digits(input, 0..=59, "Minutes must be between 00 and 59")?;
    let input = expect_char(
        input,
        ':',
        "The minutes and seconds must be separated by ':'",
    )?;
    let (second, input) = second_frag(input)?;
    if hour == 24 && (minute != 0 || second != Decimal::from(0)) {
        return Err(LexicalError("Times are not allowed to be after 24:00:00"));
    }
    Ok((
        TimeParts {
            hour,
            minute,
            second,
        },
        input,
    ))
}

// [56]   yearFrag ::= '-'? (([1-9] digit digit digit+)) | ('0' digit digit digit))
// A leading + is also accepted.
fn year_frag(input: &str) -> Result<(i64, &str), LexicalError> {
    let (sign, input) = if let Some(left) = input.strip_prefix('-') {
        (-1, left)
    } else {
        (1, input.strip_prefix('+').unwrap_or(input))
    };
    let (number_str, input) = integer_prefix(input);
    if number_str.len() < 4 {
        return Err(LexicalError("The year should be encoded on 4 digits"));
    }
    if number_str.len() > 4 && number_str.starts_with('0') {
        return Err(LexicalError(
            "The years value must not start with 0 if it can be encoded in at least 4 digits",
        ));
    }
    let number = i64::from_str(number_str).map_err(|_| LexicalError("The year is too big"))?;
    Ok((sign * number, input))
}

fn two_digits<'a>(
    input: &'a str,
    range: std::ops::RangeInclusive<u8>,
    error_message: &'static str,
) -> Result<(u8, &'a str), LexicalError> {
    let (number_str, input) = integer_prefix(input);
    if number_str.len() != 2 {
        return Err(LexicalError("Expecting exactly two digits"));
    }
    let number = u8::from_str(number_str).map_err(|_| LexicalError(error_message))?;
    if !range.contains(&number) {
        return Err(LexicalError(error_message));
    }
    Ok((number, input))
}

// [61]   secondFrag ::= ([0-5] digit) ('.' digit+)?
fn second_frag(input: &str) -> Result<(Decimal, &str), LexicalError> {
    let (number_str, input) = decimal_prefix(input);
    let (before_dot_str, _) = number_str.split_once('.').unwrap_or((number_str, ""));
    if before_dot_str.len() != 2 {
        return Err(LexicalError("Seconds must be encoded with two digits"));
    }
    if number_str.ends_with('.') {
        return Err(LexicalError("Seconds are not allowed to end with a dot"));
    }
    let number = Decimal::from_str(number_str).map_err(|_| LexicalError("Invalid seconds"))?;
    if number >= Decimal::from(60) {
        return Err(LexicalError("Seconds must be between 00 and 60"));
    }
    Ok((number, input))
}

// [63]   timezoneFrag ::= 'Z' | ('+' | '-') (('0' digit | '1' [0-3]) ':' minuteFrag | '14:00')
fn timezone_frag(input: &str) -> Result<(TimezoneOffset, &str), LexicalError> {
    if let Some(left) = input.strip_prefix('Z') {
        return Ok((TimezoneOffset::UTC, left));
    }
    let (sign, input) = if let Some(left) = input.strip_prefix('-') {
        (-1, left)
    } else if let Some(left) = input.strip_prefix('+') {
        (1, left)
    } else {
        return Err(LexicalError("Timezones start with 'Z', '+' or '-'"));
    };
    let (hours, input) = two_digits(input, 0..=14, "The timezone hours must be at most 14")?;
    let input = expect_char(
        input,
        ':',
        "The timezone hours and minutes must be separated by ':'",
    )?;
    let (minutes, input) = two_digits(input, 0..=59, "Minutes must be between 00 and 59")?;
    if hours == 14 && minutes != 0 {
        return Err(LexicalError("Timezones can not be beyond 14:00"));
    }
    let offset = TimezoneOffset::new(sign * (i16::from(hours) * 60 + i16::from(minutes)))
        .map_err(|_| LexicalError("Invalid timezone offset"))?;
    Ok((offset, input))
}

fn parse_duration(input: &str) -> Result<DurationValue, LexicalError> {
    // States
    const START: u8 = 0;
    const AFTER_YEAR: u8 = 1;
    const AFTER_MONTH: u8 = 2;
    const AFTER_DAY: u8 = 3;
    const AFTER_T: u8 = 4;
    const AFTER_HOUR: u8 = 5;
    const AFTER_MINUTE: u8 = 6;
    const AFTER_SECOND: u8 = 7;

    let (negative, input) = if let Some(left) = input.strip_prefix('-') {
        (true, left)
    } else {
        (false, input)
    };
    let mut input = expect_char(input, 'P', "Durations must start with 'P'")?;
    let mut value = DurationValue {
        negative,
        ..DurationValue::default()
    };
    let mut state = START;
    while !input.is_empty() {
        if let Some(left) = input.strip_prefix('T') {
            if state >= AFTER_T {
                return Err(LexicalError("Duplicated time separator 'T'"));
            }
            state = AFTER_T;
            input = left;
            continue;
        }
        let (number_str, left) = decimal_prefix(input);
        if number_str.is_empty() {
            return Err(LexicalError("Duration components start with a number"));
        }
        let integer = || {
            i64::from_str(number_str).map_err(|_| LexicalError("Invalid duration component"))
        };
        match left.chars().next() {
            Some('Y') if state < AFTER_YEAR => {
                value.years = integer()?;
                state = AFTER_YEAR;
            }
            Some('M') if state < AFTER_MONTH => {
                value.months = integer()?;
                state = AFTER_MONTH;
            }
            Some('D') if state < AFTER_DAY => {
                value.days = integer()?;
                state = AFTER_DAY;
            }
            Some('H') if state == AFTER_T => {
                value.hours = integer()?;
                state = AFTER_HOUR;
            }
            Some('M') if (AFTER_T..AFTER_MINUTE).contains(&state) => {
                value.minutes = integer()?;
                state = AFTER_MINUTE;
            }
            Some('S') if (AFTER_T..AFTER_SECOND).contains(&state) => {
                if number_str.ends_with('.') {
                    return Err(LexicalError("Seconds are not allowed to end with a dot"));
                }
                value.seconds = Decimal::from_str(number_str)
                    .map_err(|_| LexicalError("Invalid duration seconds"))?;
                state = AFTER_SECOND;
            }
            Some(_) => return Err(LexicalError("Unexpected duration component")),
            None => {
                return Err(LexicalError(
                    "Numbers in durations must be followed by a type character",
                ));
            }
        }
        input = &left[1..];
    }
    match state {
        START => Err(LexicalError("Empty duration")),
        AFTER_T => Err(LexicalError("The time separator 'T' must be followed by a value")),
        _ => Ok(value),
    }
}

fn days_in_month(year: i64, month: u8) -> u8 {
    match month {
        2 => {
            if year.rem_euclid(4) == 0 && (year.rem_euclid(100) != 0 || year.rem_euclid(400) == 0)
            {
                29
            } else {
                28
            }
        }
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn ensure_complete<T>(
    input: &str,
    parse: impl FnOnce(&str) -> Result<(T, &str), LexicalError>,
) -> Result<T, LexicalError> {
    let (result, left) = parse(input)?;
    if !left.is_empty() {
        return Err(LexicalError("Unrecognized value suffix"));
    }
    Ok(result)
}

fn expect_char<'a>(
    input: &'a str,
    constant: char,
    error_message: &'static str,
) -> Result<&'a str, LexicalError> {
    input.strip_prefix(constant).ok_or(LexicalError(error_message))
}

fn integer_prefix(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    input.split_at(end)
}

fn decimal_prefix(input: &str) -> (&str, &str) {
    let mut end = input.len();
    let mut dot_seen = false;
    for (i, c) in input.char_indices() {
        if c == '.' && !dot_seen {
            dot_seen = true;
        } else if !c.is_ascii_digit() {
            end = i;
            break;
        }
    }
    input.split_at(end)
}

fn optional_end<T>(
    input: &str,
    parse: impl FnOnce(&str) -> Result<(T, &str), LexicalError>,
) -> Result<(Option<T>, &str), LexicalError> {
    Ok(if input.is_empty() {
        (None, input)
    } else {
        let (result, input) = parse(input)?;
        (Some(result), input)
    })
}
