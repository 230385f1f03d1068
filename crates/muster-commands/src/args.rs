//! Argument parsing for the command layer. Parse failures carry the exact
//! reply text to send back, so handlers stay thin.

use chrono::NaiveDate;

pub(crate) enum HolidayArgs {
    Add { date: NaiveDate, description: String },
    Remove { date: NaiveDate },
}

#[derive(Debug)]
pub(crate) enum AbsenceArgs {
    Add {
        user: String,
        start: NaiveDate,
        end: NaiveDate,
        description: Option<String>,
    },
    Remove {
        user: String,
        start: NaiveDate,
    },
}

pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format: '{}'. Please use YYYY-MM-DD.", input.trim()))
}

pub(crate) fn parse_holiday(rest: &str) -> Result<HolidayArgs, String> {
    const USAGE: &str = "Usage: /holiday [add/remove] [YYYY-MM-DD] [description]";
    let mut words = rest.split_whitespace();
    let action = words.next().ok_or(USAGE)?;
    let date = parse_date(words.next().ok_or(USAGE)?)?;
    match action {
        "add" => {
            let description = words.collect::<Vec<_>>().join(" ");
            if description.is_empty() {
                return Err(USAGE.to_string());
            }
            Ok(HolidayArgs::Add { date, description })
        }
        "remove" => Ok(HolidayArgs::Remove { date }),
        _ => Err(USAGE.to_string()),
    }
}

pub(crate) fn parse_absence(rest: &str, kind: &str) -> Result<AbsenceArgs, String> {
    let usage = format!(
        "Usage: /{} [add/remove] [user] [start_date] [end_date]",
        kind.to_lowercase()
    );
    let mut words = rest.split_whitespace();
    let action = words.next().ok_or_else(|| usage.clone())?;
    let user = words.next().ok_or_else(|| usage.clone())?.to_string();
    let start = parse_date(words.next().ok_or_else(|| usage.clone())?)?;
    match action {
        "add" => {
            // The end date is optional; a single-day entry repeats the start.
            let end = match words.next() {
                Some(word) => parse_date(word)?,
                None => start,
            };
            if end < start {
                return Err(format!(
                    "End date {end} is before start date {start}."
                ));
            }
            let description = words.collect::<Vec<_>>().join(" ");
            let description = (!description.is_empty()).then_some(description);
            Ok(AbsenceArgs::Add { user, start, end, description })
        }
        "remove" => Ok(AbsenceArgs::Remove { user, start }),
        _ => Err(usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        assert_eq!(parse_date("2024-10-27").unwrap(), d("2024-10-27"));
        assert!(parse_date("10/27/2024").unwrap_err().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_parse_holiday_requires_description_on_add() {
        assert!(parse_holiday("add 2024-12-25").is_err());
        match parse_holiday("add 2024-12-25 Christmas Day").unwrap() {
            HolidayArgs::Add { date, description } => {
                assert_eq!(date, d("2024-12-25"));
                assert_eq!(description, "Christmas Day");
            }
            _ => panic!("expected add"),
        }
        assert!(matches!(
            parse_holiday("remove 2024-12-25").unwrap(),
            HolidayArgs::Remove { .. }
        ));
    }

    #[test]
    fn test_parse_absence_defaults_and_description() {
        match parse_absence("add +1555 2024-10-27", "Leave").unwrap() {
            AbsenceArgs::Add { start, end, description, .. } => {
                assert_eq!(start, end);
                assert!(description.is_none());
            }
            _ => panic!("expected add"),
        }
        match parse_absence("add +1555 2024-10-27 2024-10-30 Site survey", "TDY").unwrap() {
            AbsenceArgs::Add { end, description, .. } => {
                assert_eq!(end, d("2024-10-30"));
                assert_eq!(description.as_deref(), Some("Site survey"));
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_parse_absence_rejects_inverted_range() {
        let err = parse_absence("add +1555 2024-10-30 2024-10-27", "Leave").unwrap_err();
        assert!(err.contains("before start"));
    }
}
