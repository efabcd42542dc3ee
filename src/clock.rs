use chrono::{DateTime, Duration, Local, LocalResult, NaiveDateTime, NaiveTime, Timelike};

/// Parses "H:MM" or "HH:MM" as a wall-clock time on `now`'s calendar day in
/// local time. Never crosses midnight: a clock time earlier than `now`
/// resolves to earlier today, which may be in the past.
pub fn parse_hhmm_today(raw: &str, now: DateTime<Local>) -> Option<DateTime<Local>> {
    let (h, m) = raw.split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    if !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

    resolve_local(now.date_naive().and_time(time))
}

// A well-formed wall-clock time can still name no local instant on the
// spring-forward day; roll such times forward to the first instant that
// exists instead of rejecting them.
fn resolve_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    match naive.and_local_timezone(Local) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => Some(t),
        LocalResult::None => {
            let mut probe = naive;
            for _ in 0..4 {
                probe += Duration::minutes(30);
                if let LocalResult::Single(t) | LocalResult::Ambiguous(t, _) =
                    probe.and_local_timezone(Local)
                {
                    return Some(t);
                }
            }
            None
        }
    }
}

/// Zero-padded "HH:MM" in local time; absent input stays absent.
pub fn format_hhmm(ts: Option<DateTime<Local>>) -> Option<String> {
    ts.map(|t| format!("{:02}:{:02}", t.hour(), t.minute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 30, hour, minute, 0).unwrap()
    }

    #[test]
    fn anchors_to_today() {
        let now = at(7, 0);
        let parsed = parse_hhmm_today("08:30", now).unwrap();
        assert_eq!(parsed, at(8, 30));
    }

    #[test]
    fn accepts_single_digit_hour() {
        let now = at(7, 0);
        assert_eq!(parse_hhmm_today("8:05", now).unwrap(), at(8, 5));
    }

    #[test]
    fn earlier_clock_time_resolves_to_today_in_the_past() {
        let now = at(23, 50);
        let parsed = parse_hhmm_today("00:10", now).unwrap();
        assert_eq!(parsed, at(0, 10));
        assert!(parsed < now);
    }

    #[test]
    fn rejects_malformed_input() {
        let now = at(7, 0);
        for raw in ["", "8", "08:5", "08:300", "25:00", "08:60", "ab:cd", ":30", "-1:30"] {
            assert!(parse_hhmm_today(raw, now).is_none(), "accepted {raw:?}");
        }
    }

    #[test]
    fn formats_zero_padded() {
        assert_eq!(format_hhmm(Some(at(8, 5))).unwrap(), "08:05");
        assert_eq!(format_hhmm(Some(at(23, 59))).unwrap(), "23:59");
    }

    #[test]
    fn formats_none_as_none() {
        assert_eq!(format_hhmm(None), None);
    }

    #[test]
    fn every_half_hour_of_the_year_resolves() {
        // sweeps DST transition days in whatever zone the host runs under;
        // spring-forward gap times must map to a nearby instant, not None
        let mut day = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        while day < end {
            for hour in 0..24 {
                for minute in [0, 30] {
                    let naive = day.and_hms_opt(hour, minute, 0).unwrap();
                    assert!(resolve_local(naive).is_some(), "no instant for {naive}");
                }
            }
            day = day.succ_opt().unwrap();
        }
    }
}
