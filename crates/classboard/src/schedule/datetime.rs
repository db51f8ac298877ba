//! Conversion between persisted instants and the date / 12-hour time /
//! AM-PM fields used by entry forms.
//!
//! Both directions are pure. The time picker offers the 48 half-hour slots
//! from [`time_slots`], and `decompose(assemble_in(tz, d, t, p)) == (d, t, p)`
//! holds for every slot. Assembly itself accepts any minute, so records that
//! arrived off the grid can be edited and sent back unchanged.

use super::error::ScheduleError;
use super::types::ScheduleTime;
use chrono::{
    DateTime, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minutes between consecutive form slots.
const SLOT_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Am => "AM",
            Period::Pm => "PM",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Period::Am),
            "PM" => Ok(Period::Pm),
            other => Err(ScheduleError::InvalidTime {
                message: format!("unknown period {other:?}"),
            }),
        }
    }
}

/// An instant split into entry-form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecomposedTime {
    pub date: NaiveDate,
    /// 12-hour clock, `HH:MM`
    pub time: String,
    pub period: Period,
}

/// One entry of the form's time picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub time: String,
    pub period: Period,
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time, self.period)
    }
}

/// Maps a 24-hour hour onto the 12-hour clock.
fn to_twelve_hour(hour: u32) -> (u32, Period) {
    let period = if hour >= 12 { Period::Pm } else { Period::Am };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    (display, period)
}

/// Maps a 12-hour hour and period back onto the 24-hour clock.
fn to_twenty_four_hour(hour: u32, period: Period) -> u32 {
    match (hour, period) {
        (12, Period::Am) => 0,
        (12, Period::Pm) => 12,
        (h, Period::Am) => h,
        (h, Period::Pm) => h + 12,
    }
}

/// Splits an instant into form fields using the instant's own time zone.
pub fn decompose<Tz: TimeZone>(instant: &DateTime<Tz>) -> DecomposedTime {
    let (hour, period) = to_twelve_hour(instant.hour());
    DecomposedTime {
        date: instant.date_naive(),
        time: format!("{:02}:{:02}", hour, instant.minute()),
        period,
    }
}

/// Splits a canonical timestamp into form fields in local time. Unparsed
/// timestamps have nothing to decompose.
pub fn decompose_local(time: &ScheduleTime) -> Option<DecomposedTime> {
    time.instant()
        .map(|at| decompose(&at.with_timezone(&Local)))
}

/// Parses a 12-hour `H:MM` / `HH:MM` string.
fn parse_time12(time: &str) -> Result<(u32, u32), ScheduleError> {
    let invalid = || ScheduleError::InvalidTime {
        message: format!("expected HH:MM on a 12-hour clock, got {time:?}"),
    };
    let (hour, minute) = time.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// Builds an instant from form fields in the given time zone.
///
/// A wall-clock time that occurs twice (DST fall-back) resolves to the
/// earlier instant. One that never occurs (DST spring-forward) is an error.
pub fn assemble_in<Tz: TimeZone>(
    tz: &Tz,
    date: NaiveDate,
    time: &str,
    period: Period,
) -> Result<DateTime<Tz>, ScheduleError> {
    let (hour, minute) = parse_time12(time)?;
    let hour24 = to_twenty_four_hour(hour, period);
    let clock = NaiveTime::from_hms_opt(hour24, minute, 0).ok_or_else(|| {
        ScheduleError::InvalidTime {
            message: format!("{hour24}:{minute:02} is not a time of day"),
        }
    })?;

    tz.from_local_datetime(&date.and_time(clock))
        .earliest()
        .ok_or_else(|| ScheduleError::InvalidTime {
            message: format!("{date} {time} {period} does not exist in this time zone"),
        })
}

/// Formats an instant the way the API expects it: UTC, millisecond
/// precision, `Z` suffix.
pub fn to_wire<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The 48 half-hour slots offered by entry forms, from 12:00 AM to 11:30 PM.
pub fn time_slots() -> Vec<TimeSlot> {
    (0..24 * 60 / SLOT_MINUTES)
        .map(|i| {
            let minutes = i * SLOT_MINUTES;
            let (hour, period) = to_twelve_hour(minutes / 60);
            TimeSlot {
                time: format!("{:02}:{:02}", hour, minutes % 60),
                period,
            }
        })
        .collect()
}

/// Returns true if `time`/`period` is one of the form's slots.
pub fn is_slot(time: &str, period: Period) -> bool {
    time_slots()
        .iter()
        .any(|slot| slot.time == time && slot.period == period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_slot_catalog() {
        let slots = time_slots();
        assert_eq!(slots.len(), 48);
        assert_eq!(slots[0].to_string(), "12:00 AM");
        assert_eq!(slots[1].to_string(), "12:30 AM");
        assert_eq!(slots[2].to_string(), "01:00 AM");
        assert_eq!(slots[24].to_string(), "12:00 PM");
        assert_eq!(slots[47].to_string(), "11:30 PM");
    }

    #[test]
    fn test_midnight_and_noon() {
        let utc = Utc;
        let midnight = utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        let noon = utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap();
        let evening = utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap();

        assert_eq!(
            decompose(&midnight),
            DecomposedTime {
                date: date(2024, 2, 29),
                time: "12:00".into(),
                period: Period::Am
            }
        );
        assert_eq!(decompose(&noon).time, "12:30");
        assert_eq!(decompose(&noon).period, Period::Pm);
        assert_eq!(decompose(&evening).time, "11:00");
        assert_eq!(decompose(&evening).period, Period::Pm);
    }

    #[test]
    fn test_assemble_hours() {
        let d = date(2024, 9, 2);
        let at = |t: &str, p| assemble_in(&Utc, d, t, p).unwrap().hour();
        assert_eq!(at("12:00", Period::Am), 0);
        assert_eq!(at("12:00", Period::Pm), 12);
        assert_eq!(at("01:30", Period::Pm), 13);
        assert_eq!(at("9:00", Period::Am), 9);
        assert_eq!(at("11:30", Period::Pm), 23);
    }

    #[test]
    fn test_round_trip_every_slot() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let days = [date(2024, 1, 1), date(2024, 2, 29), date(2025, 12, 31)];
        for day in days {
            for slot in time_slots() {
                let instant = assemble_in(&tz, day, &slot.time, slot.period).unwrap();
                assert_eq!(
                    decompose(&instant),
                    DecomposedTime {
                        date: day,
                        time: slot.time.clone(),
                        period: slot.period
                    },
                    "slot {slot} on {day}"
                );
            }
        }
    }

    #[test]
    fn test_assemble_rejects_bad_fields() {
        let d = date(2024, 1, 1);
        assert!(assemble_in(&Utc, d, "13:00", Period::Pm).is_err());
        assert!(assemble_in(&Utc, d, "00:30", Period::Am).is_err());
        assert!(assemble_in(&Utc, d, "9", Period::Am).is_err());
        assert!(assemble_in(&Utc, d, "09:75", Period::Am).is_err());
        assert!("noon".parse::<Period>().is_err());
        assert_eq!("pm".parse::<Period>().unwrap(), Period::Pm);
    }

    #[test]
    fn test_wire_format_is_utc() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let instant = assemble_in(&tz, date(2024, 5, 1), "08:30", Period::Am).unwrap();
        assert_eq!(to_wire(&instant), "2024-05-01T06:30:00.000Z");
    }

    #[test]
    fn test_decompose_unparsed_is_none() {
        assert!(decompose_local(&ScheduleTime::Unparsed("soon".into())).is_none());
    }

    #[test]
    fn test_is_slot() {
        assert!(is_slot("03:30", Period::Pm));
        assert!(!is_slot("03:15", Period::Pm));
        assert!(!is_slot("3:30", Period::Pm));
    }
}
