//! Aggregation horizons and their member-day enumeration.
//!
//! A horizon's member days are pure date arithmetic from an explicitly
//! passed run date, independent of what data exists, so any subset of
//! member days may turn out empty. Walking is done in single-day steps
//! backward from the horizon boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};

/// An aggregation time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// Yesterday, folded from its staging partition.
    Daily,
    /// The 7 days before the run date, folded from promoted dailies.
    Weekly,
    /// The previous calendar month.
    Monthly,
    /// The previous calendar year.
    Yearly,
}

impl Horizon {
    /// The member days of this horizon relative to `today`, ascending.
    pub fn member_days(self, today: NaiveDate) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        match self {
            Horizon::Daily => days.push(prev(today)),
            Horizon::Weekly => {
                let mut day = prev(today);
                for _ in 0..7 {
                    days.push(day);
                    day = prev(day);
                }
            }
            Horizon::Monthly => {
                // Step back out of the current month, then through the
                // whole previous one.
                let mut day = prev(today);
                while (day.year(), day.month()) == (today.year(), today.month()) {
                    day = prev(day);
                }
                let (year, month) = (day.year(), day.month());
                while (day.year(), day.month()) == (year, month) {
                    days.push(day);
                    day = prev(day);
                }
            }
            Horizon::Yearly => {
                let mut day = prev(today);
                while day.year() == today.year() {
                    day = prev(day);
                }
                let year = day.year();
                while day.year() == year {
                    days.push(day);
                    day = prev(day);
                }
            }
        }
        days.reverse();
        days
    }

    /// Member-day date labels, ascending, as used for canonical keys.
    pub fn member_labels(self, today: NaiveDate) -> Vec<String> {
        self.member_days(today)
            .into_iter()
            .map(|d| d.to_string())
            .collect()
    }

    /// The label identifying this horizon's aggregate records. The
    /// daily label is the member date itself and doubles as the
    /// promotion date label.
    pub fn label(self, today: NaiveDate) -> String {
        let days = self.member_days(today);
        let first = days[0];
        match self {
            Horizon::Daily => first.to_string(),
            Horizon::Weekly => format!("{}..{}", first, days[days.len() - 1]),
            Horizon::Monthly => first.format("%Y-%m").to_string(),
            Horizon::Yearly => first.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Horizon::Daily => "daily",
            Horizon::Weekly => "weekly",
            Horizon::Monthly => "monthly",
            Horizon::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

impl FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Horizon::Daily),
            "weekly" => Ok(Horizon::Weekly),
            "monthly" => Ok(Horizon::Monthly),
            "yearly" => Ok(Horizon::Yearly),
            other => Err(format!(
                "unknown horizon '{other}' (expected daily, weekly, monthly, or yearly)"
            )),
        }
    }
}

fn prev(day: NaiveDate) -> NaiveDate {
    day - Days::new(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn daily_is_yesterday() {
        let days = Horizon::Daily.member_days(date("2024-03-15"));
        assert_eq!(days, vec![date("2024-03-14")]);
        assert_eq!(Horizon::Daily.label(date("2024-03-15")), "2024-03-14");
    }

    #[test]
    fn daily_crosses_month_and_year_boundaries() {
        assert_eq!(
            Horizon::Daily.member_days(date("2024-01-01")),
            vec![date("2023-12-31")]
        );
    }

    #[test]
    fn weekly_is_the_seven_preceding_days() {
        let days = Horizon::Weekly.member_days(date("2024-03-15"));
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], date("2024-03-08"));
        assert_eq!(days[6], date("2024-03-14"));
        assert_eq!(
            Horizon::Weekly.label(date("2024-03-15")),
            "2024-03-08..2024-03-14"
        );
    }

    #[test]
    fn weekly_crosses_month_boundary() {
        let days = Horizon::Weekly.member_days(date("2024-03-03"));
        assert_eq!(days[0], date("2024-02-25"));
        assert_eq!(days[6], date("2024-03-02"));
    }

    #[test]
    fn monthly_is_the_whole_previous_month() {
        // 2024 is a leap year.
        let days = Horizon::Monthly.member_days(date("2024-03-15"));
        assert_eq!(days.len(), 29);
        assert_eq!(days[0], date("2024-02-01"));
        assert_eq!(days[28], date("2024-02-29"));
        assert_eq!(Horizon::Monthly.label(date("2024-03-15")), "2024-02");
    }

    #[test]
    fn monthly_on_the_first_of_a_month() {
        let days = Horizon::Monthly.member_days(date("2024-03-01"));
        assert_eq!(days.len(), 29);
        assert_eq!(days[0], date("2024-02-01"));
    }

    #[test]
    fn monthly_in_january_is_last_december() {
        let days = Horizon::Monthly.member_days(date("2024-01-10"));
        assert_eq!(days.len(), 31);
        assert_eq!(days[0], date("2023-12-01"));
        assert_eq!(Horizon::Monthly.label(date("2024-01-10")), "2023-12");
    }

    #[test]
    fn yearly_is_the_whole_previous_year() {
        let days = Horizon::Yearly.member_days(date("2024-06-01"));
        assert_eq!(days.len(), 365);
        assert_eq!(days[0], date("2023-01-01"));
        assert_eq!(days[364], date("2023-12-31"));
        assert_eq!(Horizon::Yearly.label(date("2024-06-01")), "2023");
    }

    #[test]
    fn yearly_over_a_leap_year() {
        let days = Horizon::Yearly.member_days(date("2025-02-01"));
        assert_eq!(days.len(), 366);
    }

    #[test]
    fn parse_round_trips_display() {
        for horizon in [
            Horizon::Daily,
            Horizon::Weekly,
            Horizon::Monthly,
            Horizon::Yearly,
        ] {
            assert_eq!(horizon.to_string().parse::<Horizon>().unwrap(), horizon);
        }
        assert!("hourly".parse::<Horizon>().is_err());
    }
}
