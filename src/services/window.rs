//! Selection-window arithmetic.
//!
//! Each meal type owns a daily clock window. A menu for date `D` opens for
//! selection on `D` at the window's start, except breakfast, whose window is
//! anchored to `D - 1` (students pick tomorrow's breakfast this evening).
//! Clock times are resolved in the mess timezone and returned as UTC instants.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::menu::{MealType, SelectionWindow};

/// Daily wall-clock window. `end <= start` means the window runs past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ClockWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> anyhow::Result<Self> {
        anyhow::ensure!(start != end, "window {start}-{end} is empty");
        Ok(Self { start, end })
    }

    /// Parses `HH:MM-HH:MM`.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("expected HH:MM-HH:MM, got {s:?}"))?;
        let parse = |t: &str| {
            NaiveTime::parse_from_str(t.trim(), "%H:%M")
                .map_err(|e| anyhow::anyhow!("invalid clock time {t:?}: {e}"))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }
}

impl std::fmt::Display for ClockWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Clock window per meal type. Injected into [`WindowCalculator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealSchedule {
    pub breakfast: ClockWindow,
    pub lunch: ClockWindow,
    pub dinner: ClockWindow,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for MealSchedule {
    fn default() -> Self {
        Self {
            breakfast: ClockWindow { start: hm(20, 0), end: hm(21, 30) },
            lunch: ClockWindow { start: hm(8, 0), end: hm(9, 30) },
            dinner: ClockWindow { start: hm(11, 30), end: hm(14, 0) },
        }
    }
}

impl MealSchedule {
    pub fn window(&self, meal_type: MealType) -> ClockWindow {
        match meal_type {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch => self.lunch,
            MealType::Dinner => self.dinner,
        }
    }
}

/// Days between the serving date and the day the window opens.
fn anchor_offset(meal_type: MealType) -> u64 {
    match meal_type {
        MealType::Breakfast => 1,
        MealType::Lunch | MealType::Dinner => 0,
    }
}

/// Wall-clock time on `date` in `tz`. A time skipped by a DST jump
/// falls back to reading it as UTC.
fn resolve(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(time);
    naive
        .and_local_timezone(tz)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEntry {
    pub meal_type: MealType,
    pub start: String,
    pub end: String,
    pub opens_previous_day: bool,
}

#[derive(Debug, Clone)]
pub struct WindowCalculator {
    schedule: MealSchedule,
    tz: Tz,
}

impl WindowCalculator {
    pub fn new(schedule: MealSchedule, tz: Tz) -> Self {
        Self { schedule, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Selection window for the menu serving `meal_type` on `date`.
    /// Fails only for dates at the edge of the representable calendar.
    pub fn selection_window(
        &self,
        meal_type: MealType,
        date: NaiveDate,
    ) -> AppResult<SelectionWindow> {
        let clock = self.schedule.window(meal_type);
        let out_of_range = || AppError::validation(format!("Date {date} is out of range"));
        let base = date
            .checked_sub_days(Days::new(anchor_offset(meal_type)))
            .ok_or_else(out_of_range)?;
        let end_day = if clock.crosses_midnight() {
            base.checked_add_days(Days::new(1)).ok_or_else(out_of_range)?
        } else {
            base
        };
        Ok(SelectionWindow {
            start: resolve(base, clock.start, self.tz),
            end: resolve(end_day, clock.end, self.tz),
        })
    }

    pub fn entries(&self) -> Vec<ScheduleEntry> {
        MealType::ALL
            .iter()
            .map(|&meal_type| {
                let clock = self.schedule.window(meal_type);
                ScheduleEntry {
                    meal_type,
                    start: clock.start.format("%H:%M").to_string(),
                    end: clock.end.format("%H:%M").to_string(),
                    opens_previous_day: anchor_offset(meal_type) > 0,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kolkata() -> WindowCalculator {
        WindowCalculator::new(MealSchedule::default(), chrono_tz::Asia::Kolkata)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn local_date(calc: &WindowCalculator, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&calc.timezone()).date_naive()
    }

    fn local(calc: &WindowCalculator, at: DateTime<Utc>) -> String {
        at.with_timezone(&calc.timezone())
            .format("%Y-%m-%dT%H:%M")
            .to_string()
    }

    #[test]
    fn breakfast_opens_the_evening_before() {
        let calc = kolkata();
        let w = calc.selection_window(MealType::Breakfast, date("2024-05-02")).unwrap();
        assert_eq!(local(&calc, w.start), "2024-05-01T20:00");
        assert_eq!(local(&calc, w.end), "2024-05-01T21:30");
        // IST is UTC+05:30
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap());
    }

    #[test]
    fn lunch_and_dinner_open_on_the_serving_day() {
        let calc = kolkata();
        let served = date("2024-05-01");
        for meal in [MealType::Lunch, MealType::Dinner] {
            let w = calc.selection_window(meal, served).unwrap();
            assert_eq!(local_date(&calc, w.start), served);
            assert_eq!(local_date(&calc, w.end), served);
        }
        let lunch = calc.selection_window(MealType::Lunch, served).unwrap();
        assert_eq!(local(&calc, lunch.start), "2024-05-01T08:00");
        assert_eq!(local(&calc, lunch.end), "2024-05-01T09:30");
    }

    #[test]
    fn breakfast_across_a_month_boundary() {
        let calc = kolkata();
        let w = calc.selection_window(MealType::Breakfast, date("2024-03-01")).unwrap();
        assert_eq!(local_date(&calc, w.start), date("2024-02-29"));
    }

    #[test]
    fn injected_schedule_overrides_defaults() {
        let schedule = MealSchedule {
            lunch: ClockWindow::parse("10:15-11:00").unwrap(),
            ..MealSchedule::default()
        };
        let calc = WindowCalculator::new(schedule, chrono_tz::UTC);
        let w = calc.selection_window(MealType::Lunch, date("2024-05-01")).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn overnight_window_ends_next_day() {
        let schedule = MealSchedule {
            breakfast: ClockWindow::parse("22:00-01:00").unwrap(),
            ..MealSchedule::default()
        };
        let calc = WindowCalculator::new(schedule, chrono_tz::UTC);
        let w = calc.selection_window(MealType::Breakfast, date("2024-05-02")).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 5, 1, 22, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2024, 5, 2, 1, 0, 0).unwrap());
    }

    #[test]
    fn calendar_edges_are_rejected_instead_of_panicking() {
        let calc = kolkata();
        let err = calc
            .selection_window(MealType::Breakfast, NaiveDate::MIN)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let overnight = MealSchedule {
            dinner: ClockWindow::parse("23:00-00:30").unwrap(),
            ..MealSchedule::default()
        };
        let calc = WindowCalculator::new(overnight, chrono_tz::UTC);
        let err = calc
            .selection_window(MealType::Dinner, NaiveDate::MAX)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn window_is_deterministic() {
        let calc = kolkata();
        let d = date("2024-12-31");
        assert_eq!(
            calc.selection_window(MealType::Dinner, d).unwrap(),
            calc.selection_window(MealType::Dinner, d).unwrap()
        );
    }

    #[test]
    fn clock_window_parsing() {
        let w = ClockWindow::parse("08:00-09:30").unwrap();
        assert_eq!(w.to_string(), "08:00-09:30");
        assert!(!w.crosses_midnight());
        assert!(ClockWindow::parse("08:00").is_err());
        assert!(ClockWindow::parse("25:00-26:00").is_err());
        assert!(ClockWindow::parse("09:00-09:00").is_err());
    }

    #[test]
    fn breakfast_entry_reports_previous_day_anchor() {
        let entries = kolkata().entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].opens_previous_day);
        assert_eq!(entries[0].start, "20:00");
        assert!(!entries[1].opens_previous_day);
    }
}
