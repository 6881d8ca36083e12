use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use tracing::warn;

use crate::cursor::Cursor;
use crate::frequency::Frequency;
use crate::types::{SkipReason, Window, WindowDecision};

/// Compute the next due window for `frequency` at `now`, given the item's cursor.
///
/// All arithmetic is UTC and every window is half-open. Whenever the result
/// is `Due`, `end_ms > start_ms` holds.
pub fn compute_window(frequency: Frequency, now: DateTime<Utc>, cursor: &Cursor) -> WindowDecision {
    let cursor_ms = cursor.last_window_end_ms;
    let today = day_start(now.date_naive());

    let bounds = match frequency {
        Frequency::None => return WindowDecision::Skip(SkipReason::FrequencyNone),

        Frequency::Daily => {
            // Checked against the calendar day of the last send, independent
            // of the cursor value, so an inconsistent cursor cannot cause a
            // second send on the same day.
            if cursor
                .last_sent_at
                .is_some_and(|sent| sent.date_naive() == now.date_naive())
            {
                return WindowDecision::Skip(SkipReason::NotDue);
            }
            let today_ms = today.timestamp_millis();
            let yesterday_ms = (today - Duration::days(1)).timestamp_millis();
            let start = match cursor_ms {
                Some(c) if c < today_ms => c,
                _ => yesterday_ms,
            };
            (start, today_ms)
        }

        Frequency::Weekly => {
            let this_week = week_start(now.date_naive());
            let prev_week = this_week - Duration::days(7);
            (
                cursor_ms.unwrap_or(day_start(prev_week).timestamp_millis()),
                day_start(this_week).timestamp_millis(),
            )
        }

        Frequency::Biweekly => match cursor_ms {
            None => {
                let month = month_start(now.date_naive());
                let mid = day_start(midpoint(month));
                if now < mid {
                    return WindowDecision::Skip(SkipReason::NotDue);
                }
                (day_start(month).timestamp_millis(), mid.timestamp_millis())
            }
            Some(c) => {
                let Some(cursor_at) = Utc.timestamp_millis_opt(c).single() else {
                    warn!(cursor_ms = c, "cursor outside representable range");
                    return WindowDecision::Skip(SkipReason::NotDue);
                };
                // The half that the cursor falls in closes at the next boundary.
                let boundary = next_half_boundary(cursor_at);
                if now < boundary {
                    return WindowDecision::Skip(SkipReason::NotDue);
                }
                (c, boundary.timestamp_millis())
            }
        },

        Frequency::Monthly => {
            let this_month = month_start(now.date_naive());
            let prev_month = month_start(this_month - Duration::days(1));
            (
                cursor_ms.unwrap_or(day_start(prev_month).timestamp_millis()),
                day_start(this_month).timestamp_millis(),
            )
        }
    };

    finish(frequency, bounds)
}

/// The most recent complete period at `now`, ignoring any cursor.
///
/// Used by forced replays, which re-deliver what a fresh item would have
/// received most recently.
pub fn replay_window(frequency: Frequency, now: DateTime<Utc>) -> WindowDecision {
    let date = now.date_naive();
    let bounds = match frequency {
        Frequency::None => return WindowDecision::Skip(SkipReason::FrequencyNone),
        Frequency::Daily => (date - Duration::days(1), date),
        Frequency::Weekly => {
            let this_week = week_start(date);
            (this_week - Duration::days(7), this_week)
        }
        Frequency::Biweekly => {
            let month = month_start(date);
            let mid = midpoint(month);
            if date >= mid {
                (month, mid)
            } else {
                let prev_month = month_start(month - Duration::days(1));
                (midpoint(prev_month), month)
            }
        }
        Frequency::Monthly => {
            let this_month = month_start(date);
            (month_start(this_month - Duration::days(1)), this_month)
        }
    };
    finish(
        frequency,
        (
            day_start(bounds.0).timestamp_millis(),
            day_start(bounds.1).timestamp_millis(),
        ),
    )
}

fn finish(frequency: Frequency, (start_ms, end_ms): (i64, i64)) -> WindowDecision {
    if end_ms <= start_ms {
        return WindowDecision::Skip(SkipReason::NotDue);
    }
    WindowDecision::Due(build_window(frequency, start_ms, end_ms))
}

fn build_window(frequency: Frequency, start_ms: i64, end_ms: i64) -> Window {
    let start = Utc.timestamp_millis_opt(start_ms).single().unwrap_or_default();
    let last = Utc
        .timestamp_millis_opt(end_ms - 1)
        .single()
        .unwrap_or_default();

    let period_id = match frequency {
        Frequency::Daily => start.format("%Y-%m-%d").to_string(),
        Frequency::Weekly => {
            let iso = start.iso_week();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
        Frequency::Biweekly => {
            let half = if start.day() < 16 { 1 } else { 2 };
            format!("{}-{}", start.format("%Y-%m"), half)
        }
        Frequency::Monthly | Frequency::None => start.format("%Y-%m").to_string(),
    };

    let label = if start.date_naive() == last.date_naive() {
        start.format("%Y-%m-%d").to_string()
    } else {
        format!("{} to {}", start.format("%Y-%m-%d"), last.format("%Y-%m-%d"))
    };

    Window {
        start_ms,
        end_ms,
        label,
        period_id,
    }
}

// --- calendar helpers ---------------------------------------------------

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Monday of the ISO week containing `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

/// Day 16 of the month starting at `month`: first day of the second half.
fn midpoint(month: NaiveDate) -> NaiveDate {
    month + Duration::days(15)
}

fn next_month_start(date: NaiveDate) -> NaiveDate {
    month_start(month_start(date) + Duration::days(32))
}

fn next_half_boundary(at: DateTime<Utc>) -> DateTime<Utc> {
    let month = month_start(at.date_naive());
    let mid = day_start(midpoint(month));
    if at < mid {
        mid
    } else {
        day_start(next_month_start(month))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn ms(s: &str) -> i64 {
        at(s).timestamp_millis()
    }

    fn cursor(end: Option<&str>, sent: Option<&str>) -> Cursor {
        Cursor {
            last_window_end_ms: end.map(ms),
            last_sent_at: sent.map(at),
        }
    }

    fn due(decision: WindowDecision) -> Window {
        match decision {
            WindowDecision::Due(w) => w,
            WindowDecision::Skip(reason) => panic!("expected a due window, got skip: {reason}"),
        }
    }

    #[test]
    fn monthly_without_cursor_covers_previous_month() {
        let w = due(compute_window(
            Frequency::Monthly,
            at("2025-03-10T00:00:00Z"),
            &Cursor::default(),
        ));
        assert_eq!(w.start_ms, ms("2025-02-01T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-03-01T00:00:00Z"));
        assert_eq!(w.period_id, "2025-02");
        assert_eq!(w.label, "2025-02-01 to 2025-02-28");
    }

    #[test]
    fn monthly_with_current_cursor_is_not_due() {
        let decision = compute_window(
            Frequency::Monthly,
            at("2025-03-20T08:00:00Z"),
            &cursor(Some("2025-03-01T00:00:00Z"), Some("2025-03-10T00:00:00Z")),
        );
        assert_eq!(decision, WindowDecision::Skip(SkipReason::NotDue));
    }

    #[test]
    fn monthly_across_year_boundary() {
        let w = due(compute_window(
            Frequency::Monthly,
            at("2025-01-02T06:00:00Z"),
            &Cursor::default(),
        ));
        assert_eq!(w.start_ms, ms("2024-12-01T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn biweekly_first_half_waits_for_day_sixteen() {
        let early = compute_window(
            Frequency::Biweekly,
            at("2025-03-10T00:00:00Z"),
            &Cursor::default(),
        );
        assert_eq!(early, WindowDecision::Skip(SkipReason::NotDue));

        let w = due(compute_window(
            Frequency::Biweekly,
            at("2025-03-16T00:00:00Z"),
            &Cursor::default(),
        ));
        assert_eq!(w.start_ms, ms("2025-03-01T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-03-16T00:00:00Z"));
        assert_eq!(w.period_id, "2025-03-1");
    }

    #[test]
    fn biweekly_second_half_due_once_month_ends() {
        let c = cursor(Some("2025-03-16T00:00:00Z"), Some("2025-03-16T09:00:00Z"));
        let waiting = compute_window(Frequency::Biweekly, at("2025-03-28T00:00:00Z"), &c);
        assert_eq!(waiting, WindowDecision::Skip(SkipReason::NotDue));

        let w = due(compute_window(Frequency::Biweekly, at("2025-04-02T00:00:00Z"), &c));
        assert_eq!(w.start_ms, ms("2025-03-16T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-04-01T00:00:00Z"));
        assert_eq!(w.period_id, "2025-03-2");
    }

    #[test]
    fn biweekly_catch_up_from_month_start() {
        let c = cursor(Some("2025-03-01T00:00:00Z"), None);
        let w = due(compute_window(Frequency::Biweekly, at("2025-03-20T00:00:00Z"), &c));
        assert_eq!(w.start_ms, ms("2025-03-01T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-03-16T00:00:00Z"));
    }

    #[test]
    fn weekly_uses_iso_monday() {
        // 2025-03-12 is a Wednesday.
        let w = due(compute_window(
            Frequency::Weekly,
            at("2025-03-12T10:00:00Z"),
            &Cursor::default(),
        ));
        assert_eq!(w.start_ms, ms("2025-03-03T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-03-10T00:00:00Z"));
        assert_eq!(w.period_id, "2025-W10");
    }

    #[test]
    fn weekly_cursor_in_future_is_not_due() {
        let c = cursor(Some("2025-03-17T00:00:00Z"), None);
        let decision = compute_window(Frequency::Weekly, at("2025-03-12T10:00:00Z"), &c);
        assert_eq!(decision, WindowDecision::Skip(SkipReason::NotDue));
    }

    #[test]
    fn daily_without_cursor_covers_yesterday() {
        let w = due(compute_window(
            Frequency::Daily,
            at("2025-03-10T07:30:00Z"),
            &Cursor::default(),
        ));
        assert_eq!(w.start_ms, ms("2025-03-09T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-03-10T00:00:00Z"));
        assert_eq!(w.label, "2025-03-09");
        assert_eq!(w.period_id, "2025-03-09");
    }

    #[test]
    fn daily_already_sent_today_is_not_due() {
        let c = cursor(Some("2025-03-10T00:00:00Z"), Some("2025-03-10T07:30:00Z"));
        let decision = compute_window(Frequency::Daily, at("2025-03-10T21:00:00Z"), &c);
        assert_eq!(decision, WindowDecision::Skip(SkipReason::NotDue));
    }

    #[test]
    fn daily_future_cursor_clamps_to_yesterday() {
        let c = cursor(Some("2025-03-12T00:00:00Z"), Some("2025-03-08T07:30:00Z"));
        let w = due(compute_window(Frequency::Daily, at("2025-03-10T07:30:00Z"), &c));
        assert_eq!(w.start_ms, ms("2025-03-09T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-03-10T00:00:00Z"));
    }

    #[test]
    fn daily_catches_up_from_old_cursor() {
        let c = cursor(Some("2025-03-07T00:00:00Z"), Some("2025-03-07T07:30:00Z"));
        let w = due(compute_window(Frequency::Daily, at("2025-03-10T07:30:00Z"), &c));
        assert_eq!(w.start_ms, ms("2025-03-07T00:00:00Z"));
        assert_eq!(w.label, "2025-03-07 to 2025-03-09");
    }

    #[test]
    fn none_is_always_skipped() {
        let decision = compute_window(Frequency::None, at("2025-03-10T00:00:00Z"), &Cursor::default());
        assert_eq!(decision, WindowDecision::Skip(SkipReason::FrequencyNone));
    }

    #[test]
    fn replay_biweekly_before_midpoint_is_previous_second_half() {
        let w = due(replay_window(Frequency::Biweekly, at("2025-03-05T00:00:00Z")));
        assert_eq!(w.start_ms, ms("2025-02-16T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-03-01T00:00:00Z"));
    }

    #[test]
    fn replay_monthly_ignores_cursor() {
        let w = due(replay_window(Frequency::Monthly, at("2025-03-10T00:00:00Z")));
        assert_eq!(w.start_ms, ms("2025-02-01T00:00:00Z"));
        assert_eq!(w.end_ms, ms("2025-03-01T00:00:00Z"));
    }
}
