use chrono::{DateTime, Duration, TimeZone, Utc};
use eventdesk_scheduler::window::compute_window;
use eventdesk_scheduler::{Cursor, Frequency, WindowDecision};
use proptest::prelude::*;

// 2000-01-01 .. 2090-01-01
const MIN_SECS: i64 = 946_684_800;
const MAX_SECS: i64 = 3_786_912_000;

fn instant(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

fn any_frequency() -> impl Strategy<Value = Frequency> {
    prop::sample::select(Frequency::ALL.to_vec())
}

proptest! {
    #[test]
    fn due_windows_are_never_empty(
        freq in any_frequency(),
        now_secs in MIN_SECS..MAX_SECS,
        cursor_secs in prop::option::of(MIN_SECS..MAX_SECS),
        sent_secs in prop::option::of(MIN_SECS..MAX_SECS),
    ) {
        let cursor = Cursor {
            last_window_end_ms: cursor_secs.map(|s| s * 1000),
            last_sent_at: sent_secs.map(instant),
        };
        if let WindowDecision::Due(w) = compute_window(freq, instant(now_secs), &cursor) {
            prop_assert!(w.end_ms > w.start_ms, "{freq}: {w:?}");
        }
    }

    #[test]
    fn committed_windows_chain_without_gaps_or_overlap(
        freq in prop::sample::select(vec![
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Biweekly,
            Frequency::Monthly,
        ]),
        start_secs in MIN_SECS..(MAX_SECS - 10 * 365 * 86_400),
        steps in prop::collection::vec(1i64..2_000, 1..40),
    ) {
        let mut now = instant(start_secs);
        let mut cursor = Cursor::default();

        for hours in steps {
            now += Duration::hours(hours);
            if let WindowDecision::Due(w) = compute_window(freq, now, &cursor) {
                if let Some(prev_end) = cursor.last_window_end_ms {
                    prop_assert_eq!(w.start_ms, prev_end, "{} window at {}", freq, now);
                }
                // A window never covers time that has not happened yet.
                prop_assert!(w.end_ms <= now.timestamp_millis());
                cursor = Cursor {
                    last_window_end_ms: Some(w.end_ms),
                    last_sent_at: Some(now),
                };
            }
        }
    }
}
