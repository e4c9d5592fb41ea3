//! Schedule string parsing for the orchestrator's sync cadence: plain
//! interval shorthand (`"30s"`, `"5m"`, `"1h"`, `"1d"`) and a narrow cron
//! subset (`"*/N * * * *"`, every N minutes). This is the only shape the
//! orchestrator needs, so it's a hand-rolled parser rather than a new
//! dependency.

use std::time::Duration;

pub fn parse_schedule(spec: &str) -> Result<Duration, String> {
    let spec = spec.trim();
    if let Some(rest) = spec.strip_prefix("*/") {
        let minutes: u64 = rest
            .split_whitespace()
            .next()
            .ok_or_else(|| format!("malformed cron schedule: {spec}"))?
            .parse()
            .map_err(|_| format!("malformed cron step in: {spec}"))?;
        if minutes == 0 {
            return Err("cron step must be at least 1".to_string());
        }
        return Ok(Duration::from_secs(minutes * 60));
    }

    let (digits, unit) = spec.split_at(
        spec.find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in schedule: {spec}"))?,
    );
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("malformed schedule: {spec}"))?;
    let seconds = match unit {
        "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 86_400,
        other => return Err(format!("unknown schedule unit '{other}' in: {spec}")),
    };
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_intervals() {
        assert_eq!(parse_schedule("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_schedule("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_schedule("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_schedule("1d").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn parses_cron_step_subset() {
        assert_eq!(
            parse_schedule("*/15 * * * *").unwrap(),
            Duration::from_secs(15 * 60)
        );
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(parse_schedule("5x").is_err());
        assert!(parse_schedule("garbage").is_err());
    }
}
