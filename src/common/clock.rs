// src/common/clock.rs

use chrono::{FixedOffset, NaiveDate, Utc};

/// Fonte de "hoje" para todo cálculo de atraso e status.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Relógio do sistema, no fuso horário do negócio.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn with_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(|offset| Self { offset })
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Relógio parado, usado nos testes.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_its_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(FixedClock(date).today(), date);
    }

    #[test]
    fn rejects_out_of_range_offset() {
        assert!(SystemClock::with_offset_hours(-3).is_some());
        assert!(SystemClock::with_offset_hours(30).is_none());
    }
}
