use chrono::Duration;

const UNITS: [(&str, i64); 5] = [
    ("week", 604_800),
    ("day", 86_400),
    ("hour", 3_600),
    ("minute", 60),
    ("second", 1),
];

/// Render an elapsed duration the way a person would say it.
///
/// The largest unit is kept, plus the next one down when it is non-zero: `2 hours and 5 minutes`,
/// `3 days and 1 hour`. Anything under a second is `a moment`.
pub fn elapsed(d: Duration) -> String {
    let mut secs = d.num_seconds().max(0);
    if secs == 0 {
        return "a moment".to_string();
    }

    let mut parts = Vec::with_capacity(2);
    for (name, size) in UNITS {
        if parts.len() == 2 {
            break;
        }
        let n = secs / size;
        if n > 0 {
            secs %= size;
            parts.push(format!("{n} {name}{}", if n == 1 { "" } else { "s" }));
        } else if !parts.is_empty() {
            // only adjacent units: never "1 day and 5 seconds"
            break;
        }
    }
    parts.join(" and ")
}
