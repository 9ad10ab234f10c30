use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};

use bob_core::service::BobService;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday")),
        },
    }
}

/// Resolve which profile a command acts on: explicit `--user` wins, then the
/// stored default.
pub(crate) fn resolve_user(svc: &BobService, user: Option<String>) -> Result<String> {
    if let Some(name) = user {
        return Ok(name);
    }
    match svc.default_user()? {
        Some(name) => Ok(name),
        None => bail!("No user selected. Pass --user <name> or run `bob user switch <name>`"),
    }
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
