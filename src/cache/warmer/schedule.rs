//! Minimal interval-only cron parsing: scheduled warm-up expressions are
//! narrowly scoped to `*/N * * * *` — "every N minutes" — rather than a
//! full cron grammar.

use super::WarmEntry;
use std::time::Duration;

/// Parse `*/N * * * *` into an interval of N minutes. Any other form is
/// rejected; this crate does not implement general cron semantics.
pub fn parse_interval_cron(expr: &str) -> Option<Duration> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return None;
    }
    if fields[1..] != ["*", "*", "*", "*"] {
        return None;
    }
    let minute_field = fields[0].strip_prefix("*/")?;
    let minutes: u64 = minute_field.parse().ok()?;
    if minutes == 0 {
        return None;
    }
    Some(Duration::from_secs(minutes * 60))
}

#[derive(Debug, Clone)]
pub struct WarmUpSchedule {
    pub id: String,
    pub cron: String,
    pub entries: Vec<WarmEntry>,
    pub enabled: bool,
}

impl WarmUpSchedule {
    pub fn interval(&self) -> Option<Duration> {
        parse_interval_cron(&self.cron)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_n_minutes() {
        assert_eq!(parse_interval_cron("*/15 * * * *"), Some(Duration::from_secs(900)));
        assert_eq!(parse_interval_cron("*/1 * * * *"), Some(Duration::from_secs(60)));
    }

    #[test]
    fn rejects_non_interval_forms() {
        assert_eq!(parse_interval_cron("0 9 * * 1"), None);
        assert_eq!(parse_interval_cron("*/0 * * * *"), None);
        assert_eq!(parse_interval_cron("garbage"), None);
    }
}
