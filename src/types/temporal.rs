use super::{dampen, CleanContext, PropertyType, TypeKind};
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})(?:-(\d{1,2})(?:-(\d{1,2})(?:[T ](\d{2}):(\d{2})(?::(\d{2}))?)?)?)?")
        .expect("valid date regex")
});

static ISO_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?$").expect("valid date suffix regex")
});

const MIN_YEAR: i32 = 1000;
const MAX_YEAR: i32 = 2999;

/// Dates kept at the precision they were given in: year, month, day, minute
/// or second.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateType;

impl DateType {
    fn clean_iso(raw: &str) -> Option<String> {
        let captures = ISO_PREFIX.captures(raw)?;
        let whole = captures.get(0)?;
        if !ISO_SUFFIX.is_match(&raw[whole.end()..]) {
            return None;
        }
        let number = |index: usize| -> Option<u32> {
            captures.get(index).and_then(|m| m.as_str().parse().ok())
        };

        let year: i32 = captures.get(1)?.as_str().parse().ok()?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return None;
        }
        let month = match number(2) {
            None | Some(0) => return Some(format!("{year:04}")),
            Some(month) if month > 12 => return None,
            Some(month) => month,
        };
        let day = match number(3) {
            None | Some(0) => return Some(format!("{year:04}-{month:02}")),
            Some(day) => day,
        };
        NaiveDate::from_ymd_opt(year, month, day)?;
        let date = format!("{year:04}-{month:02}-{day:02}");

        let (Some(hour), Some(minute)) = (number(4), number(5)) else {
            return Some(date);
        };
        if hour > 23 || minute > 59 {
            return None;
        }
        match number(6) {
            Some(second) if second > 59 => None,
            Some(second) => Some(format!("{date}T{hour:02}:{minute:02}:{second:02}")),
            None => Some(format!("{date}T{hour:02}:{minute:02}")),
        }
    }

    fn clean_with_format(raw: &str, format: &str) -> Option<String> {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Self::clean_iso(&parsed.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
        if let Ok(parsed) = NaiveDate::parse_from_str(raw, format) {
            return Self::clean_iso(&parsed.format("%Y-%m-%d").to_string());
        }
        if format == "%Y" {
            return Self::clean_iso(raw);
        }
        None
    }

    fn precision(value: &str) -> usize {
        value
            .split(|c| c == '-' || c == 'T' || c == ':')
            .filter(|part| !part.is_empty())
            .count()
    }
}

impl PropertyType for DateType {
    fn kind(&self) -> TypeKind {
        TypeKind::Date
    }

    fn max_length(&self) -> usize {
        32
    }

    fn clean(&self, raw: &str, context: &CleanContext) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match context.format.as_deref() {
            Some(format) => Self::clean_with_format(raw, format),
            None => Self::clean_iso(raw),
        }
    }

    /// Equal dates score 1. A coarser date that is a prefix of a finer one
    /// scores the share of precision they have in common.
    fn similarity(&self, left: &str, right: &str) -> f64 {
        if left == right {
            return 1.0;
        }
        let (coarse, fine) = if left.len() <= right.len() {
            (left, right)
        } else {
            (right, left)
        };
        if coarse.is_empty() || !fine.starts_with(coarse) {
            return 0.0;
        }
        Self::precision(coarse) as f64 / Self::precision(fine).max(1) as f64
    }

    fn specificity(&self, value: &str) -> f64 {
        dampen(5, 13, value)
    }
}
