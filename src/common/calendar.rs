// src/common/calendar.rs

use chrono::{Days, Months, NaiveDate};

use crate::models::loan::Frequency;

/// Avança `date` em `steps` passos da frequência.
///
/// O passo mensal preserva o dia do mês e, quando o mês de destino é mais curto,
/// cai no último dia dele (31/01 + 1 mês = 28/02 ou 29/02, nunca 02/03).
/// Cada passo é calculado a partir da data original, então 31/01 + 2 meses = 31/03.
pub fn advance(date: NaiveDate, frequency: Frequency, steps: u32) -> Option<NaiveDate> {
    match frequency {
        Frequency::Daily => date.checked_add_days(Days::new(u64::from(steps))),
        Frequency::Weekly => date.checked_add_days(Days::new(7 * u64::from(steps))),
        Frequency::Biweekly => date.checked_add_days(Days::new(14 * u64::from(steps))),
        Frequency::Monthly => date.checked_add_months(Months::new(steps)),
    }
}

pub fn add_days(date: NaiveDate, days: u64) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(days))
}

/// Dias de atraso: `max(0, today - due_date)`.
pub fn days_late(due_date: NaiveDate, today: NaiveDate) -> i32 {
    let diff = (today - due_date).num_days();
    diff.clamp(0, i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn fixed_size_steps() {
        let start = d(2024, 1, 10);
        assert_eq!(advance(start, Frequency::Daily, 3), Some(d(2024, 1, 13)));
        assert_eq!(advance(start, Frequency::Weekly, 2), Some(d(2024, 1, 24)));
        assert_eq!(advance(start, Frequency::Biweekly, 2), Some(d(2024, 2, 7)));
        assert_eq!(advance(start, Frequency::Monthly, 0), Some(start));
    }

    #[test]
    fn monthly_step_clamps_to_end_of_short_month() {
        let start = d(2024, 1, 31);
        assert_eq!(advance(start, Frequency::Monthly, 1), Some(d(2024, 2, 29)));
        assert_eq!(advance(start, Frequency::Monthly, 2), Some(d(2024, 3, 31)));
        assert_eq!(advance(start, Frequency::Monthly, 3), Some(d(2024, 4, 30)));

        let start = d(2023, 1, 31);
        assert_eq!(advance(start, Frequency::Monthly, 1), Some(d(2023, 2, 28)));
    }

    #[test]
    fn days_late_is_never_negative() {
        assert_eq!(days_late(d(2024, 3, 1), d(2024, 3, 11)), 10);
        assert_eq!(days_late(d(2024, 3, 11), d(2024, 3, 1)), 0);
        assert_eq!(days_late(d(2024, 3, 1), d(2024, 3, 1)), 0);
    }
}
