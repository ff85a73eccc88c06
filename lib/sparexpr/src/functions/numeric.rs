use super::{
    Arity, FunctionRegistry, RegularFunction, checked, decimal_arg, double_arg, float_arg,
    integer_arg,
};
use crate::term::{ExpressionLiteral, ExpressionTerm};
use crate::types::KnownType;
use oxsdatatypes::{Decimal, Double, Float};
use rand::random;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add(
        RegularFunction::new("ABS", Arity::Fixed(1))
            .with_unary(KnownType::Integer, |a| {
                Ok(ExpressionLiteral::integer(checked(integer_arg(a)?.checked_abs(), "Integer")?).into())
            })
            .with_unary(KnownType::Decimal, |a| {
                Ok(ExpressionLiteral::decimal(checked(decimal_arg(a)?.checked_abs(), "Decimal")?).into())
            })
            .with_unary(KnownType::Float, |a| {
                Ok(ExpressionLiteral::float(float_arg(a)?.abs()).into())
            })
            .with_unary(KnownType::Double, |a| {
                Ok(ExpressionLiteral::double(double_arg(a)?.abs()).into())
            }),
    );
    registry.add(rounding("CEIL", Decimal::checked_ceil, Float::ceil, Double::ceil));
    registry.add(rounding("FLOOR", Decimal::checked_floor, Float::floor, Double::floor));
    registry.add(rounding("ROUND", Decimal::checked_round, Float::round, Double::round));
    registry.add(
        RegularFunction::new("RAND", Arity::Fixed(0))
            .with_nullary(|| Ok(ExpressionLiteral::double(random::<f64>()).into())),
    );
}

/// A rounding function: integers are kept as they are.
fn rounding(
    name: &'static str,
    decimal: fn(Decimal) -> Option<Decimal>,
    float: fn(Float) -> Float,
    double: fn(Double) -> Double,
) -> RegularFunction {
    RegularFunction::new(name, Arity::Fixed(1))
        .with_unary(KnownType::Integer, |a| {
            Ok(ExpressionLiteral::integer(integer_arg(a)?).into())
        })
        .with_unary(KnownType::Decimal, move |a| {
            Ok(ExpressionLiteral::decimal(checked(decimal(decimal_arg(a)?), name)?).into())
        })
        .with_unary(KnownType::Float, move |a| {
            Ok(ExpressionLiteral::float(float(float_arg(a)?)).into())
        })
        .with_unary(KnownType::Double, move |a| {
            Ok(ExpressionLiteral::double(double(double_arg(a)?)).into())
        })
}
