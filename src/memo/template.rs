//! Memo templates
//!
//! A template is a short pattern rendered around a memo's content, e.g.
//! `## YYYY-MM-DD HH:mm` or `- HH:mm {{content}}`. Directives use moment
//! style tokens and are matched longest-first at each position, so `YYYY`
//! is never read as two `YY`s and `MMMM` never as `MM` + `MM`. Text inside
//! `[...]` is copied verbatim.
//!
//! | Directive | Meaning                  |
//! |-----------|--------------------------|
//! | `YYYY`    | 4-digit year             |
//! | `YY`      | 2-digit year             |
//! | `MMMM`    | long month name          |
//! | `MMM`     | short month name         |
//! | `MM`      | 2-digit month            |
//! | `DD`      | 2-digit day              |
//! | `dddd`    | long weekday name        |
//! | `ddd`     | short weekday name       |
//! | `E`       | ISO weekday (1 = Monday) |
//! | `HH`      | 24h hour                 |
//! | `hh`      | 12h hour                 |
//! | `mm`      | minute                   |
//! | `ss`      | second                   |
//! | `X`       | Unix epoch seconds       |

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDateTime, TimeZone};

/// Token replaced by the memo content.
pub const CONTENT_PLACEHOLDER: &str = "{{content}}";

/// Template used when neither the record nor the caller supplies one.
pub const FALLBACK_TEMPLATE: &str = "## YYYY-MM-DD HH:mm";

#[derive(Debug, Clone, Copy)]
enum Directive {
    Year,
    ShortYear,
    LongMonth,
    ShortMonth,
    Month,
    Day,
    LongWeekday,
    ShortWeekday,
    IsoWeekday,
    Hour24,
    Hour12,
    Minute,
    Second,
    Epoch,
}

/// Ordered longest-first; the first prefix match wins.
const DIRECTIVES: &[(&str, Directive)] = &[
    ("YYYY", Directive::Year),
    ("MMMM", Directive::LongMonth),
    ("dddd", Directive::LongWeekday),
    ("MMM", Directive::ShortMonth),
    ("ddd", Directive::ShortWeekday),
    ("YY", Directive::ShortYear),
    ("MM", Directive::Month),
    ("DD", Directive::Day),
    ("HH", Directive::Hour24),
    ("hh", Directive::Hour12),
    ("mm", Directive::Minute),
    ("ss", Directive::Second),
    ("E", Directive::IsoWeekday),
    ("X", Directive::Epoch),
];

impl Directive {
    fn render(self, ts: &DateTime<FixedOffset>) -> String {
        match self {
            Directive::Year => ts.format("%Y").to_string(),
            Directive::ShortYear => ts.format("%y").to_string(),
            Directive::LongMonth => ts.format("%B").to_string(),
            Directive::ShortMonth => ts.format("%b").to_string(),
            Directive::Month => ts.format("%m").to_string(),
            Directive::Day => ts.format("%d").to_string(),
            Directive::LongWeekday => ts.format("%A").to_string(),
            Directive::ShortWeekday => ts.format("%a").to_string(),
            Directive::IsoWeekday => ts.weekday().number_from_monday().to_string(),
            Directive::Hour24 => ts.format("%H").to_string(),
            Directive::Hour12 => ts.format("%I").to_string(),
            Directive::Minute => ts.format("%M").to_string(),
            Directive::Second => ts.format("%S").to_string(),
            Directive::Epoch => ts.timestamp().to_string(),
        }
    }
}

/// Expand every directive in `pattern` against `ts`.
///
/// `{{content}}` passes through untouched so callers can substitute or
/// split on it afterwards.
pub fn expand(pattern: &str, ts: &DateTime<FixedOffset>) -> String {
    let mut out = String::with_capacity(pattern.len() + 16);
    let mut rest = pattern;

    'scan: while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix(CONTENT_PLACEHOLDER) {
            out.push_str(CONTENT_PLACEHOLDER);
            rest = after;
            continue;
        }

        if c == '[' {
            if let Some(end) = rest.find(']') {
                out.push_str(&rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }
        }

        for (token, directive) in DIRECTIVES {
            if let Some(after) = rest.strip_prefix(token) {
                out.push_str(&directive.render(ts));
                rest = after;
                continue 'scan;
            }
        }

        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 with an offset, and the common offset-less forms
/// (`2025-01-01T10:00:00`, `2025-01-01 10:00`), which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS.iter().find_map(|fmt| {
        let naive = NaiveDateTime::parse_from_str(raw, fmt).ok()?;
        FixedOffset::east_opt(0).map(|utc| utc.from_utc_datetime(&naive))
    })
}

/// Parse `raw`, falling back to the current local time.
pub fn timestamp_or_now(raw: &str) -> DateTime<FixedOffset> {
    parse_timestamp(raw).unwrap_or_else(|| Local::now().into())
}

/// A resolved memo template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoTemplate<'a> {
    pattern: &'a str,
}

impl<'a> MemoTemplate<'a> {
    /// Resolve the effective template: the record's own, else the caller's
    /// default, else [`FALLBACK_TEMPLATE`].
    pub fn resolve(own: Option<&'a str>, default: Option<&'a str>) -> Self {
        Self {
            pattern: own.or(default).unwrap_or(FALLBACK_TEMPLATE),
        }
    }

    pub fn pattern(&self) -> &'a str {
        self.pattern
    }

    pub fn has_placeholder(&self) -> bool {
        self.pattern.contains(CONTENT_PLACEHOLDER)
    }

    /// Render the body for `content`.
    ///
    /// With a placeholder, every occurrence is substituted. Without one the
    /// expanded template becomes a heading line followed by the content.
    pub fn render(&self, ts: &DateTime<FixedOffset>, content: &str) -> String {
        let expanded = expand(self.pattern, ts);
        if self.has_placeholder() {
            expanded.replace(CONTENT_PLACEHOLDER, content)
        } else {
            format!("{}\n{}", expanded, content)
        }
    }

    /// Expanded literal fragments around each placeholder.
    ///
    /// For `pre {{content}} post` this is `["pre ", " post"]`; without a
    /// placeholder it is the single expanded template.
    pub fn fragments(&self, ts: &DateTime<FixedOffset>) -> Vec<String> {
        self.pattern
            .split(CONTENT_PLACEHOLDER)
            .map(|part| expand(part, ts))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<FixedOffset> {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn test_expand_all_directives() {
        // 2025-01-06 is a Monday
        let t = ts("2025-01-06T15:04:05Z");
        assert_eq!(expand("YYYY-MM-DD", &t), "2025-01-06");
        assert_eq!(expand("YY", &t), "25");
        assert_eq!(expand("MMMM MMM", &t), "January Jan");
        assert_eq!(expand("dddd ddd E", &t), "Monday Mon 1");
        assert_eq!(expand("HH hh:mm:ss", &t), "15 03:04:05");
        assert_eq!(expand("X", &t), "1736175845");
    }

    #[test]
    fn test_longer_directives_win() {
        let t = ts("2025-03-09T08:07:00Z");
        // MMMM must not be read as MM + MM, YYYY not as YY + YY
        assert_eq!(expand("MMMM", &t), "March");
        assert_eq!(expand("YYYYMM", &t), "202503");
        assert_eq!(expand("ddddddd", &t), "SundaySun");
    }

    #[test]
    fn test_expand_keeps_offset_fields() {
        let t = ts("2025-01-01T23:30:00+08:00");
        assert_eq!(expand("YYYY-MM-DD HH:mm", &t), "2025-01-01 23:30");
    }

    #[test]
    fn test_bracket_literal() {
        let t = ts("2025-01-01T10:00:00Z");
        assert_eq!(expand("[Entry] YYYY", &t), "Entry 2025");
        assert_eq!(expand("[unclosed YYYY", &t), "[unclosed 2025");
    }

    #[test]
    fn test_placeholder_passes_through() {
        let t = ts("2025-01-01T10:00:00Z");
        assert_eq!(expand("- HH:mm {{content}}", &t), "- 10:00 {{content}}");
    }

    #[test]
    fn test_render_with_and_without_placeholder() {
        let t = ts("2025-01-01T10:00:00Z");
        let heading = MemoTemplate::resolve(None, None);
        assert_eq!(heading.render(&t, "hello"), "## 2025-01-01 10:00\nhello");

        let inline = MemoTemplate::resolve(Some("- HH:mm {{content}} ({{content}})"), None);
        assert_eq!(inline.render(&t, "hi"), "- 10:00 hi (hi)");
    }

    #[test]
    fn test_resolve_precedence() {
        assert_eq!(MemoTemplate::resolve(Some("a"), Some("b")).pattern(), "a");
        assert_eq!(MemoTemplate::resolve(None, Some("b")).pattern(), "b");
        assert_eq!(MemoTemplate::resolve(None, None).pattern(), FALLBACK_TEMPLATE);
    }

    #[test]
    fn test_fragments() {
        let t = ts("2025-01-01T10:00:00Z");
        let tpl = MemoTemplate::resolve(Some("> YYYY\n{{content}}\n-- end"), None);
        assert_eq!(tpl.fragments(&t), vec!["> 2025\n".to_string(), "\n-- end".to_string()]);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2025-01-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2025-01-01T10:00:00+02:00").is_some());
        assert!(parse_timestamp("2025-01-01T10:00:00").is_some());
        assert!(parse_timestamp("2025-01-01 10:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
