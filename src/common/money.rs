// src/common/money.rs

use num_format::{Locale, ToFormattedString};
use rust_decimal::{Decimal, RoundingStrategy};

/// Formata um valor em pesos mexicanos: `$1,234.50`.
///
/// es-MX usa os mesmos separadores do inglês (`,` milhares, `.` decimais),
/// por isso o agrupamento usa `Locale::en`. Negativos saem como `-$1,234.50`.
pub fn format_mxn(amount: Decimal) -> String {
    let rounded = round_cents(amount);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let abs = rounded.abs();

    let integer_part = abs.trunc();
    let cents = ((abs - integer_part) * Decimal::ONE_HUNDRED).trunc();

    // trunc() de NUMERIC(14,2) cabe em i64 com folga
    let integer = i64::try_from(integer_part).unwrap_or(i64::MAX);
    let cents = i64::try_from(cents).unwrap_or(0);

    format!("{}${}.{:02}", sign, integer.to_formatted_string(&Locale::en), cents)
}

/// Arredonda para centavos (meio para longe do zero, como o Intl do navegador).
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Teto das colunas NUMERIC(14,2): o valor precisa ficar abaixo de 10^12.
pub fn fits_amount(amount: Decimal) -> bool {
    amount.abs() < Decimal::new(1_000_000_000_000, 0)
}

/// Teto de NUMERIC(14,3) para quantidades: abaixo de 10^11.
pub fn fits_quantity(quantity: Decimal) -> bool {
    quantity.abs() < Decimal::new(100_000_000_000, 0)
}

/// Total da linha: quantidade × custo unitário já em centavos.
/// `None` se a conta estourar o `Decimal` ou a coluna.
pub fn line_total(quantity: Decimal, unit_cost: Decimal) -> Option<Decimal> {
    let total = round_cents(quantity.checked_mul(round_cents(unit_cost))?);
    fits_amount(total).then_some(total)
}

/// Soma em centavos sem estourar. `None` se sair do teto da coluna.
pub fn checked_sum<I>(amounts: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let total = amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(round_cents(amount)))?;
    fits_amount(total).then_some(total)
}

/// Percentual de `part` sobre `total`, com duas casas. Total zero => 0.
pub fn percentage(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    round_cents(part * Decimal::ONE_HUNDRED / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn formats_pesos_with_thousands_and_cents() {
        assert_eq!(format_mxn(dec!(1234.5)), "$1,234.50");
        assert_eq!(format_mxn(dec!(3800.50)), "$3,800.50");
        assert_eq!(format_mxn(dec!(1234567.891)), "$1,234,567.89");
    }

    #[test]
    fn formats_small_and_zero_amounts() {
        assert_eq!(format_mxn(Decimal::ZERO), "$0.00");
        assert_eq!(format_mxn(dec!(0.005)), "$0.01");
        assert_eq!(format_mxn(dec!(-0.001)), "$0.00");
    }

    #[test]
    fn formats_negative_amounts_with_leading_sign() {
        assert_eq!(format_mxn(dec!(-1234.5)), "-$1,234.50");
    }

    #[test]
    fn line_total_uses_the_stored_unit_cost() {
        // 3 × 0.333 gravaria custo 0.33 e total 1.00
        assert_eq!(line_total(dec!(3), dec!(0.333)), Some(dec!(0.99)));
        assert_eq!(line_total(dec!(2.5), dec!(150.05)), Some(dec!(375.13)));
    }

    #[test]
    fn line_total_refuses_values_beyond_the_column() {
        assert_eq!(line_total(dec!(100000000000000000000), dec!(100000000000000000000)), None);
        assert_eq!(line_total(dec!(1000000), dec!(1000000000)), None);
        assert_eq!(line_total(dec!(1), dec!(999999999999.99)), Some(dec!(999999999999.99)));
    }

    #[test]
    fn checked_sum_stops_at_the_column_limit() {
        assert_eq!(checked_sum([dec!(1500.00), dec!(2300.50)]), Some(dec!(3800.50)));
        assert_eq!(checked_sum([dec!(600000000000), dec!(600000000000)]), None);
        assert_eq!(checked_sum(Vec::new()), Some(Decimal::ZERO));
    }

    #[test]
    fn percentage_handles_zero_total() {
        assert_eq!(percentage(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percentage(dec!(1), dec!(3)), dec!(33.33));
        assert_eq!(percentage(dec!(800), dec!(4600.50)), dec!(17.39));
    }
}
