//! Five-field crontab expressions evaluated in a named timezone.
//!
//! The `cron` crate expects a leading seconds field and numbers days of the
//! week 1-7 starting on Sunday, while crontab uses 0-7 with both 0 and 7
//! meaning Sunday. Expressions are normalized before parsing: a `0` seconds
//! field is prepended and numeric day-of-week values are rewritten as day
//! names.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::EngineError;

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// A parsed cron schedule bound to a timezone.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    schedule: Schedule,
    timezone: Tz,
}

impl CronSchedule {
    /// Parse a five-field crontab expression (minute hour day-of-month month day-of-week).
    pub fn parse(expr: &str, timezone: Tz) -> Result<Self, EngineError> {
        let invalid = |reason: String| EngineError::InvalidSchedule {
            expr: expr.to_string(),
            reason,
        };

        let normalized = normalize(expr).map_err(invalid)?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            expr: expr.to_string(),
            schedule,
            timezone,
        })
    }

    /// The original expression.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// The timezone the expression is evaluated in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.upcoming_after(after).next()
    }

    /// Fire times strictly after `after`, in order.
    pub fn upcoming_after(&self, after: DateTime<Utc>) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Turn a crontab expression into the six-field form the `cron` crate parses.
fn normalize(expr: &str) -> Result<String, String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!(
            "expected 5 fields (minute hour day-of-month month day-of-week), found {}",
            fields.len()
        ));
    }

    let day_of_week = translate_day_of_week(fields[4])?;
    Ok(format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], day_of_week
    ))
}

/// Rewrite numeric crontab day-of-week values as day names.
///
/// Named values (`MON-FRI`) pass through unchanged. Numeric ranges and steps
/// are expanded into an explicit list so that `7` can wrap to Sunday.
fn translate_day_of_week(field: &str) -> Result<String, String> {
    let mut parts = Vec::new();

    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid day-of-week step '{}'", step))?;
                if step == 0 {
                    return Err("day-of-week step must be positive".to_string());
                }
                (base, Some(step))
            }
            None => (item, None),
        };

        let range = match base {
            "*" | "?" => match step {
                None => {
                    parts.push(base.to_string());
                    continue;
                }
                Some(_) => Some((0, 6)),
            },
            _ => match base.split_once('-') {
                Some((start, end)) => match (parse_day(start)?, parse_day(end)?) {
                    (Some(start), Some(end)) => Some((start, end)),
                    _ => None,
                },
                None => match parse_day(base)? {
                    Some(day) if step.is_some() => Some((day, 7)),
                    Some(day) => Some((day, day)),
                    None => None,
                },
            },
        };

        match range {
            Some((start, end)) => {
                if start > end {
                    return Err(format!("day-of-week range '{}' runs backwards", base));
                }
                let days: BTreeSet<u32> = (start..=end)
                    .step_by(step.unwrap_or(1) as usize)
                    .map(|d| d % 7)
                    .collect();
                parts.extend(days.into_iter().map(|d| DAY_NAMES[d as usize].to_string()));
            }
            None => parts.push(item.to_string()),
        }
    }

    Ok(parts.join(","))
}

/// Parse a numeric day of week; `Ok(None)` for names.
fn parse_day(value: &str) -> Result<Option<u32>, String> {
    if !value.chars().all(|c| c.is_ascii_digit()) || value.is_empty() {
        return Ok(None);
    }
    let day: u32 = value
        .parse()
        .map_err(|_| format!("invalid day of week '{}'", value))?;
    if day > 7 {
        return Err(format!("day of week {} out of range 0-7", day));
    }
    Ok(Some(day))
}

#[cfg(test)]
#[path = "cron_schedule_tests.rs"]
mod tests;
