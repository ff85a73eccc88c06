use super::{Arity, FunctionRegistry, RegularFunction, calendar_arg, date_arg, date_time_arg, time_arg};
use crate::error::EvaluationError;
use crate::term::{ExpressionLiteral, ExpressionTerm};
use crate::types::KnownType;
use oxsdatatypes::DayTimeDuration;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add(
        RegularFunction::new("YEAR", Arity::Fixed(1))
            .with_unary(KnownType::DateTime, |a| {
                Ok(ExpressionLiteral::integer(date_time_arg(a)?.year()).into())
            })
            .with_unary(KnownType::Date, |a| {
                Ok(ExpressionLiteral::integer(date_arg(a)?.year()).into())
            }),
    );
    registry.add(
        RegularFunction::new("MONTH", Arity::Fixed(1))
            .with_unary(KnownType::DateTime, |a| {
                Ok(ExpressionLiteral::integer(date_time_arg(a)?.month()).into())
            })
            .with_unary(KnownType::Date, |a| {
                Ok(ExpressionLiteral::integer(date_arg(a)?.month()).into())
            }),
    );
    registry.add(
        RegularFunction::new("DAY", Arity::Fixed(1))
            .with_unary(KnownType::DateTime, |a| {
                Ok(ExpressionLiteral::integer(date_time_arg(a)?.day()).into())
            })
            .with_unary(KnownType::Date, |a| {
                Ok(ExpressionLiteral::integer(date_arg(a)?.day()).into())
            }),
    );
    registry.add(
        RegularFunction::new("HOURS", Arity::Fixed(1))
            .with_unary(KnownType::DateTime, |a| {
                Ok(ExpressionLiteral::integer(date_time_arg(a)?.hour()).into())
            })
            .with_unary(KnownType::Time, |a| {
                Ok(ExpressionLiteral::integer(time_arg(a)?.hour()).into())
            }),
    );
    registry.add(
        RegularFunction::new("MINUTES", Arity::Fixed(1))
            .with_unary(KnownType::DateTime, |a| {
                Ok(ExpressionLiteral::integer(date_time_arg(a)?.minute()).into())
            })
            .with_unary(KnownType::Time, |a| {
                Ok(ExpressionLiteral::integer(time_arg(a)?.minute()).into())
            }),
    );
    registry.add(
        RegularFunction::new("SECONDS", Arity::Fixed(1))
            .with_unary(KnownType::DateTime, |a| {
                Ok(ExpressionLiteral::decimal(date_time_arg(a)?.second()).into())
            })
            .with_unary(KnownType::Time, |a| {
                Ok(ExpressionLiteral::decimal(time_arg(a)?.second()).into())
            }),
    );
    registry.add(timezone_function("TIMEZONE", |a| {
        let timezone = calendar_arg(a)?
            .timezone
            .ok_or_else(|| EvaluationError::invalid_argument(format!("{a} has no timezone")))?;
        Ok(ExpressionLiteral::day_time_duration(DayTimeDuration::from(timezone)).into())
    }));
    registry.add(timezone_function("TZ", |a| {
        Ok(ExpressionLiteral::string(
            calendar_arg(a)?
                .timezone
                .map(|timezone| timezone.to_string())
                .unwrap_or_default(),
        )
        .into())
    }));
}

fn timezone_function(
    name: &'static str,
    implementation: fn(&ExpressionTerm) -> Result<ExpressionTerm, EvaluationError>,
) -> RegularFunction {
    [KnownType::DateTime, KnownType::Date, KnownType::Time]
        .into_iter()
        .fold(RegularFunction::new(name, Arity::Fixed(1)), |function, ty| {
            function.with_unary(ty, implementation)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SuperTypeProvider;
    use futures_util::FutureExt;

    fn call(name: &str, lexical: &str, ty: KnownType) -> Result<ExpressionTerm, EvaluationError> {
        FunctionRegistry::new()
            .operator(name)
            .unwrap()
            .apply(
                &[ExpressionLiteral::from_lexical(lexical, ty).into()],
                &SuperTypeProvider::default(),
                None,
            )
            .now_or_never()
            .unwrap()
    }

    fn integer(value: i64) -> ExpressionTerm {
        ExpressionLiteral::integer(value).into()
    }

    #[test]
    fn components() {
        let date_time = "2011-01-10T14:45:13.815-05:00";
        assert_eq!(call("YEAR", date_time, KnownType::DateTime).unwrap(), integer(2011));
        assert_eq!(call("MONTH", date_time, KnownType::DateTime).unwrap(), integer(1));
        assert_eq!(call("DAY", date_time, KnownType::DateTime).unwrap(), integer(10));
        assert_eq!(call("HOURS", date_time, KnownType::DateTime).unwrap(), integer(14));
        assert_eq!(call("MINUTES", date_time, KnownType::DateTime).unwrap(), integer(45));
        assert_eq!(
            call("SECONDS", date_time, KnownType::DateTime)
                .unwrap()
                .lexical_form(),
            "13.815"
        );
        assert_eq!(call("DAY", "2020-02-29", KnownType::Date).unwrap(), integer(29));
        assert_eq!(call("HOURS", "08:30:00", KnownType::Time).unwrap(), integer(8));
        assert!(call("HOURS", "2020-02-29", KnownType::Date).is_err());
    }

    #[test]
    fn timezones() {
        let date_time = "2011-01-10T14:45:13.815-05:00";
        assert_eq!(
            call("TIMEZONE", date_time, KnownType::DateTime)
                .unwrap()
                .lexical_form(),
            "-PT5H"
        );
        assert_eq!(
            call("TZ", date_time, KnownType::DateTime).unwrap(),
            ExpressionTerm::from(ExpressionLiteral::string("-05:00"))
        );
        assert_eq!(
            call("TZ", "2011-01-10T14:45:13Z", KnownType::DateTime).unwrap(),
            ExpressionTerm::from(ExpressionLiteral::string("Z"))
        );
        assert_eq!(
            call("TZ", "2011-01-10T14:45:13", KnownType::DateTime).unwrap(),
            ExpressionTerm::from(ExpressionLiteral::string(""))
        );
        assert!(call("TIMEZONE", "2011-01-10T14:45:13", KnownType::DateTime).is_err());
    }
}
