use serde::{Deserialize, Serialize};
use tracing::warn;

/// Report cadence. Every raw admin label collapses into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    /// Never sent automatically.
    None,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Biweekly,
        Frequency::Monthly,
        Frequency::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::None => "none",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse: canonical values and known legacy synonyms only.
///
/// Returns `None` for anything unrecognized, including the empty string.
pub fn parse_frequency(raw: &str) -> Option<Frequency> {
    let folded = fold(raw);
    let freq = match folded.as_str() {
        "daily" | "every day" => Frequency::Daily,
        "weekly" | "every week" => Frequency::Weekly,
        "biweekly" | "bi weekly" | "twice per month" | "twice a month" | "twice monthly"
        | "semimonthly" | "semi monthly" | "2x" | "2x month" | "2x per month" | "2x/month" => {
            Frequency::Biweekly
        }
        "monthly" | "every month" => Frequency::Monthly,
        "none" | "never" | "do not auto send" | "do not autosend" | "dont auto send"
        | "dont autosend" | "no auto send" => Frequency::None,
        _ => return None,
    };
    Some(freq)
}

/// Map an arbitrary admin-entered label to a [`Frequency`].
///
/// Empty input means "use the default" and yields `Monthly` silently.
/// Unrecognized input also yields `Monthly`, but logs a warning so typos
/// in item configuration are visible to operators.
pub fn normalize_frequency(raw: &str) -> Frequency {
    if raw.trim().is_empty() {
        return Frequency::Monthly;
    }
    match parse_frequency(raw) {
        Some(freq) => freq,
        None => {
            warn!(raw, "unrecognized report frequency, falling back to monthly");
            Frequency::Monthly
        }
    }
}

/// Lowercase, drop apostrophes, treat `-`/`_` as spaces, collapse whitespace.
fn fold(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_defaults_to_monthly() {
        assert_eq!(normalize_frequency(""), Frequency::Monthly);
        assert_eq!(normalize_frequency("   "), Frequency::Monthly);
    }

    #[test]
    fn legacy_twice_monthly_labels_are_biweekly() {
        for raw in ["twice-per-month", "twice per month", "2x", "bi-weekly", "Bi_Weekly"] {
            assert_eq!(normalize_frequency(raw), Frequency::Biweekly, "{raw}");
        }
    }

    #[test]
    fn do_not_auto_send_variants_are_none() {
        for raw in ["do not auto send", "Do-Not-Auto-Send", "don't auto send", "none"] {
            assert_eq!(normalize_frequency(raw), Frequency::None, "{raw}");
        }
    }

    #[test]
    fn canonical_values_pass_through() {
        for freq in Frequency::ALL {
            assert_eq!(normalize_frequency(freq.as_str()), freq);
        }
    }

    #[test]
    fn garbage_falls_back_to_monthly() {
        assert_eq!(normalize_frequency("bogus-value"), Frequency::Monthly);
        assert_eq!(parse_frequency("bogus-value"), None);
    }
}
