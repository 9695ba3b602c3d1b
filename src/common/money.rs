// src/common/money.rs

use rust_decimal::{Decimal, RoundingStrategy};

/// Menor unidade da moeda (centavo).
pub const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Arredonda para centavos (meio para longe do zero, como no caixa).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount * rate / 100`, em centavos.
pub fn percent_of(amount: Decimal, rate: Decimal) -> Decimal {
    round_money(amount * rate / HUNDRED)
}

/// `amount * (1 + rate / 100)`, em centavos.
pub fn with_rate(amount: Decimal, rate: Decimal) -> Decimal {
    round_money(amount + amount * rate / HUNDRED)
}

/// Taxa efetiva `(final - principal) / principal * 100`, só para exibição.
pub fn effective_rate(principal: Decimal, final_amount: Decimal) -> Decimal {
    if principal.is_zero() {
        return Decimal::ZERO;
    }
    ((final_amount - principal) / principal * HUNDRED).round_dp(4)
}

/// Divide `total` em `parts` valores arredondados; o resto do arredondamento fica na última parte.
/// Devolve `None` se a última parte ficaria zerada ou negativa.
pub fn split_with_remainder_last(total: Decimal, parts: u32) -> Option<Vec<Decimal>> {
    if parts == 0 {
        return None;
    }

    let base = round_money(total / Decimal::from(parts));
    let mut amounts = vec![base; parts as usize];
    let allocated = base * Decimal::from(parts - 1);
    let last = total - allocated;

    if last <= Decimal::ZERO {
        return None;
    }

    if let Some(slot) = amounts.last_mut() {
        *slot = last;
    }
    Some(amounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(366.665)), dec!(366.67));
        assert_eq!(round_money(dec!(366.664)), dec!(366.66));
        assert_eq!(round_money(dec!(0.005)), dec!(0.01));
    }

    #[test]
    fn applies_rates() {
        assert_eq!(with_rate(dec!(1000), dec!(10)), dec!(1100.00));
        assert_eq!(percent_of(dec!(1000), dec!(10)), dec!(100.00));
        assert_eq!(percent_of(dec!(333.33), dec!(7.5)), dec!(25.00));
        assert_eq!(effective_rate(dec!(1000), dec!(1200)), dec!(20));
        assert_eq!(effective_rate(Decimal::ZERO, dec!(1200)), Decimal::ZERO);
    }

    #[test]
    fn remainder_goes_to_last_part() {
        let parts = split_with_remainder_last(dec!(1100.00), 3).unwrap();
        assert_eq!(parts, vec![dec!(366.67), dec!(366.67), dec!(366.66)]);

        let parts = split_with_remainder_last(dec!(100.00), 3).unwrap();
        assert_eq!(parts, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
    }

    #[test]
    fn split_always_sums_to_total() {
        for total in [dec!(0.07), dec!(1.00), dec!(999.99), dec!(12345.67), dec!(1000.01)] {
            for parts in 1..=7u32 {
                if let Some(amounts) = split_with_remainder_last(total, parts) {
                    assert_eq!(amounts.len(), parts as usize);
                    assert_eq!(amounts.iter().copied().sum::<Decimal>(), total);
                }
            }
        }
    }

    #[test]
    fn refuses_split_that_would_zero_the_last_part() {
        // 0.05 / 10 arredonda para 0.01 * 9 = 0.09 > 0.05
        assert!(split_with_remainder_last(dec!(0.05), 10).is_none());
        assert!(split_with_remainder_last(dec!(10), 0).is_none());
    }
}
