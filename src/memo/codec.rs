//! Memo codec: one record to one block of text and back
//!
//! A block looks like:
//!
//! ```text
//! <!-- id:0190..., ts:2025-01-01T10:00:00Z, category:"work" -->
//! ## 2025-01-01 10:00
//! hello
//! [[photo.png]], [[notes.pdf]]
//! ```
//!
//! `decode` is the left inverse of `encode` for every field `encode` writes,
//! as long as the content does not itself contain the template's expanded
//! literal fragments and its last line is not made only of `[[ref]]`
//! tokens: such a line is indistinguishable from the attachment line and
//! decodes as attachments. Blocks written by older versions (no header, or a
//! header with unparsable fields) decode with documented fallbacks instead
//! of failing.

use super::header::{
    Header, HeaderWriter, COMMENT_CLOSE, COMMENT_OPEN, KEY_CATEGORY, KEY_DELETED, KEY_PARENT_ID,
    KEY_PERMANENTLY_DELETED, KEY_PINNED_AT, KEY_TEMPLATE, KEY_TIMESTAMP, KEY_TRASHED_AT,
};
use super::record::{new_memo_id, now_timestamp, MemoRecord, DELETED_PLACEHOLDER};
use super::template::{parse_timestamp, timestamp_or_now, MemoTemplate};
use regex::Regex;
use std::sync::OnceLock;

/// Prefix of an unchecked todo line.
pub const TODO_UNCHECKED: &str = "- [ ] ";
/// Prefix of a checked todo line.
pub const TODO_CHECKED: &str = "- [x] ";

const TODO_INDENT: &str = "  ";

fn legacy_date_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:#+\s*)?(?:-\s*)?(\d{4}-\d{2}-\d{2})[ T](\d{2}:\d{2}(?::\d{2})?)").ok()
    })
    .as_ref()
}

fn attachment_line_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\[\[[^\[\]\n]+\]\](?:\s*,\s*\[\[[^\[\]\n]+\]\])*\s*$").ok()
    })
    .as_ref()
}

fn reference_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\[\]\n]+)\]\]").ok())
        .as_ref()
}

/// Encode a record as a block.
///
/// `default_template` is used when the record has none of its own and is
/// never written into the header. With `todo_mode`, content that is not
/// already a checkbox line becomes an unchecked one.
pub fn encode(record: &MemoRecord, default_template: Option<&str>, todo_mode: bool) -> String {
    let mut out = encode_header(record);
    out.push('\n');

    if record.permanently_deleted {
        out.push_str(DELETED_PLACEHOLDER);
        out.push('\n');
        return out;
    }

    let mut content = if todo_mode && !is_checkbox(&record.content) {
        wrap_todo(&record.content)
    } else {
        record.content.clone()
    };
    if record.trashed_at.is_some() {
        content = wrap_comment(&content);
    }

    let ts = timestamp_or_now(&record.timestamp);
    let template = MemoTemplate::resolve(record.template.as_deref(), default_template);
    out.push_str(&template.render(&ts, &content));
    out.push('\n');

    if !record.attachments.is_empty() {
        out.push_str(&attachment_line(&record.attachments));
        out.push('\n');
    }
    out
}

/// Header line for `record`; optional fields appear only when set.
pub fn encode_header(record: &MemoRecord) -> String {
    let mut header = HeaderWriter::new(&record.id, &record.timestamp);
    if !record.category.is_empty() {
        header = header.quoted(KEY_CATEGORY, &record.category);
    }
    if let Some(template) = record.template.as_deref().filter(|_| !record.permanently_deleted) {
        header = header.quoted(KEY_TEMPLATE, template);
    }
    if let Some(trashed_at) = record.trashed_at.as_deref() {
        header = header.flag(KEY_DELETED).bare(KEY_TRASHED_AT, trashed_at);
    }
    if let Some(pinned_at) = record.pinned_at.as_deref() {
        header = header.bare(KEY_PINNED_AT, pinned_at);
    }
    if let Some(parent_id) = record.parent_id.as_deref() {
        header = header.bare(KEY_PARENT_ID, parent_id);
    }
    if record.permanently_deleted {
        header = header.flag(KEY_PERMANENTLY_DELETED);
    }
    header.finish()
}

/// Decode a block.
///
/// Returns `None` for an empty or whitespace-only block. Missing or broken
/// header fields never fail the decode:
/// - missing id: a fresh id is generated
/// - missing category: `fallback_category`; malformed category: its raw text
/// - malformed template: dropped
/// - `deleted` without a parsable `trashedAt`: not treated as trashed
/// - missing timestamp: a legacy date line if present, else now
///
/// Records without a template of their own are read against
/// [`FALLBACK_TEMPLATE`](super::template::FALLBACK_TEMPLATE); use
/// [`decode_with_default`] when blocks were written with another default.
pub fn decode(block: &str, fallback_category: &str) -> Option<MemoRecord> {
    decode_with_default(block, fallback_category, None)
}

/// [`decode`], reading template-less records against `default_template`.
pub fn decode_with_default(
    block: &str,
    fallback_category: &str,
    default_template: Option<&str>,
) -> Option<MemoRecord> {
    if block.trim().is_empty() {
        return None;
    }

    match Header::parse(block) {
        Some((header, end)) => Some(decode_with_header(
            &header,
            &block[end..],
            fallback_category,
            default_template,
        )),
        None => Some(decode_legacy(block, fallback_category)),
    }
}

fn decode_with_header(
    header: &Header,
    rest: &str,
    fallback_category: &str,
    default_template: Option<&str>,
) -> MemoRecord {
    let id = header
        .id()
        .map(str::to_string)
        .unwrap_or_else(new_memo_id);
    let category = header
        .get(KEY_CATEGORY)
        .map(|v| v.raw().to_string())
        .unwrap_or_else(|| fallback_category.to_string());
    let timestamp = header
        .text(KEY_TIMESTAMP)
        .filter(|ts| !ts.is_empty())
        .map(str::to_string)
        .unwrap_or_else(now_timestamp);
    let parent_id = header
        .text(KEY_PARENT_ID)
        .filter(|p| !p.is_empty() && *p != id)
        .map(str::to_string);
    let pinned_at = header
        .text(KEY_PINNED_AT)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    let deleted = header.flag(KEY_DELETED);
    let trashed_at = header
        .text(KEY_TRASHED_AT)
        .filter(|t| deleted && parse_timestamp(t).is_some())
        .map(str::to_string);
    let permanently_deleted = header.flag(KEY_PERMANENTLY_DELETED);

    let mut record = MemoRecord {
        id,
        category,
        timestamp,
        content: String::new(),
        attachments: Vec::new(),
        template: None,
        parent_id,
        trashed_at,
        pinned_at,
        permanently_deleted,
    };

    if permanently_deleted {
        record.mark_permanently_deleted();
        return record;
    }

    record.template = header.text(KEY_TEMPLATE).map(str::to_string);

    let body = strip_leading_newline(rest).trim_end();
    let (body, attachments) = split_attachment_line(body);
    record.attachments = attachments;

    let ts = timestamp_or_now(&record.timestamp);
    let template = MemoTemplate::resolve(record.template.as_deref(), default_template);
    let mut content = content_from_template(body, &template, &ts);
    if deleted {
        content = unwrap_comment(&content).unwrap_or(content);
    }
    record.content = content;
    record
}

fn decode_legacy(block: &str, fallback_category: &str) -> MemoRecord {
    let body = block.trim();
    let first_line = body.lines().next().unwrap_or_default();

    let legacy_ts = legacy_date_re()
        .and_then(|re| re.captures(first_line))
        .and_then(|caps| {
            let raw = format!("{} {}", &caps[1], &caps[2]);
            parse_timestamp(&raw)
        })
        .map(|ts| ts.naive_local().format("%Y-%m-%dT%H:%M:%S").to_string());

    let (timestamp, content) = match legacy_ts {
        Some(ts) => (ts, skip_first_line(body).trim().to_string()),
        None => (now_timestamp(), body.to_string()),
    };

    let attachments = references(&content);
    MemoRecord {
        id: new_memo_id(),
        category: fallback_category.to_string(),
        timestamp,
        content,
        attachments,
        template: None,
        parent_id: None,
        trashed_at: None,
        pinned_at: None,
        permanently_deleted: false,
    }
}

/// Recover the content from a body rendered with a known template.
fn content_from_template(
    body: &str,
    template: &MemoTemplate<'_>,
    ts: &chrono::DateTime<chrono::FixedOffset>,
) -> String {
    let fragments = template.fragments(ts);

    if !template.has_placeholder() {
        // The heading may span several lines; it must end at a line break
        let heading = fragments[0].trim_end();
        return match body.strip_prefix(heading) {
            Some(rest) if heading.is_empty() => rest.trim().to_string(),
            Some(rest) if rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n") => {
                rest.trim().to_string()
            }
            _ => skip_first_line(body).trim().to_string(),
        };
    }

    let pre = fragments.first().map(String::as_str).unwrap_or_default();
    let post = fragments.last().map(String::as_str).unwrap_or_default();

    let mut content = body.strip_prefix(pre).unwrap_or(body);
    let post_trimmed = post.trim_end();
    if !post_trimmed.is_empty() {
        content = content.strip_suffix(post_trimmed).unwrap_or(content);
    }
    // Repeated placeholders: the first copy ends where the next fragment starts
    if fragments.len() > 2 && !fragments[1].is_empty() {
        if let Some(cut) = content.find(fragments[1].as_str()) {
            content = &content[..cut];
        }
    }
    content.trim().to_string()
}

fn strip_leading_newline(s: &str) -> &str {
    s.strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s)
}

fn skip_first_line(s: &str) -> &str {
    match s.find('\n') {
        Some(i) => &s[i + 1..],
        None => "",
    }
}

/// Remove a trailing attachment line, returning the rest and the names.
fn split_attachment_line(body: &str) -> (&str, Vec<String>) {
    let (head, last) = match body.rfind('\n') {
        Some(i) => (&body[..i], &body[i + 1..]),
        None => return (body, Vec::new()),
    };
    let is_attachment_line = attachment_line_re()
        .map(|re| re.is_match(last))
        .unwrap_or(false);
    if is_attachment_line {
        (head.trim_end(), references(last))
    } else {
        (body, Vec::new())
    }
}

/// Names of every `[[...]]` reference in `text`, in order.
pub fn references(text: &str) -> Vec<String> {
    reference_re()
        .map(|re| {
            re.captures_iter(text)
                .map(|caps| caps[1].trim().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// `[[a]], [[b]]`
pub fn attachment_line(attachments: &[String]) -> String {
    attachments
        .iter()
        .map(|a| format!("[[{}]]", a))
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_checkbox(content: &str) -> bool {
    let trimmed = content.trim_start();
    trimmed.starts_with(TODO_UNCHECKED.trim_end())
        || trimmed.starts_with(TODO_CHECKED.trim_end())
        || trimmed.starts_with("- [X]")
}

fn wrap_todo(content: &str) -> String {
    format!(
        "{}{}",
        TODO_UNCHECKED,
        content.replace('\n', &format!("\n{}", TODO_INDENT))
    )
}

/// Soft-delete encoding of a body.
pub fn wrap_comment(content: &str) -> String {
    format!("{}\n{}\n{}", COMMENT_OPEN, content, COMMENT_CLOSE)
}

/// Inverse of [`wrap_comment`]; `None` unless the text is one whole comment.
pub fn unwrap_comment(content: &str) -> Option<String> {
    let inner = content
        .trim()
        .strip_prefix(COMMENT_OPEN)?
        .strip_suffix(COMMENT_CLOSE)?;
    Some(inner.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::record::MemoBuilder;

    fn record(id: &str, content: &str) -> MemoRecord {
        MemoBuilder::new(content)
            .id(id)
            .category("work")
            .timestamp("2025-01-01T10:00:00Z")
            .build()
            .unwrap()
    }

    #[test]
    fn test_decode_reference_block() {
        let block = "<!-- id:1, ts:2025-01-01T10:00:00Z, category:\"work\" -->\n## 2025-01-01 10:00\nhello\n";
        let memo = decode(block, "").unwrap();
        assert_eq!(memo.id, "1");
        assert_eq!(memo.category, "work");
        assert_eq!(memo.timestamp, "2025-01-01T10:00:00Z");
        assert_eq!(memo.content, "hello");
        assert!(memo.attachments.is_empty());
        assert!(memo.template.is_none());
        assert!(memo.is_active());
    }

    #[test]
    fn test_encode_default_layout() {
        let block = encode(&record("1", "hello"), None, false);
        assert_eq!(
            block,
            "<!-- id:1, ts:2025-01-01T10:00:00Z, category:\"work\" -->\n## 2025-01-01 10:00\nhello\n"
        );
    }

    #[test]
    fn test_round_trip_with_every_field() {
        let mut memo = MemoBuilder::new("line one\nline two")
            .id("42")
            .category("a \"quoted\" > category")
            .timestamp("2025-02-03T04:05:06+02:00")
            .template("> dddd, MMMM DD\n{{content}}\n-- HH:mm")
            .parent("41")
            .pinned_at("2025-02-04T00:00:00Z")
            .attachment("photo.png")
            .attachment("notes.pdf")
            .build()
            .unwrap();
        memo.trashed_at = Some("2025-02-05T00:00:00Z".to_string());

        let block = encode(&memo, Some("ignored YYYY"), false);
        assert_eq!(decode(&block, "other"), Some(memo));
    }

    #[test]
    fn test_round_trip_default_template() {
        let memo = record("7", "multi\nline\n\nbody");
        let block = encode(&memo, Some("### YYYY/MM/DD"), false);
        assert!(block.contains("### 2025/01/01\n"));
        assert!(!block.contains("template:"));
        assert_eq!(decode(&block, "work"), Some(memo));
    }

    #[test]
    fn test_round_trip_inline_template() {
        let mut memo = record("8", "quick thought");
        memo.template = Some("- HH:mm {{content}}".to_string());
        let block = encode(&memo, None, false);
        assert!(block.contains("\n- 10:00 quick thought\n"));
        assert_eq!(decode(&block, "work"), Some(memo));
    }

    #[test]
    fn test_round_trip_trashed_without_template() {
        let mut memo = record("9", "gone for now");
        memo.trashed_at = Some("2025-01-02T00:00:00Z".to_string());
        let block = encode(&memo, None, false);
        assert!(block.contains("deleted:true, trashedAt:2025-01-02T00:00:00Z"));
        assert!(block.contains("<!--\ngone for now\n-->"));
        assert_eq!(decode(&block, "work"), Some(memo));
    }

    #[test]
    fn test_round_trip_permanently_deleted() {
        let mut memo = record("10", "secret");
        memo.parent_id = Some("3".to_string());
        memo.mark_permanently_deleted();
        let block = encode(&memo, None, false);
        assert_eq!(
            block,
            format!(
                "<!-- id:10, ts:2025-01-01T10:00:00Z, category:\"work\", parent-id:3, permanently-deleted:true -->\n{}\n",
                DELETED_PLACEHOLDER
            )
        );
        assert_eq!(decode(&block, ""), Some(memo));
    }

    #[test]
    fn test_todo_mode_wraps_and_indents() {
        let block = encode(&record("1", "buy milk\nand eggs"), None, true);
        assert!(block.contains("\n- [ ] buy milk\n  and eggs\n"));

        let already = encode(&record("2", "- [x] done"), None, true);
        assert!(already.contains("\n- [x] done\n"));
        assert!(!already.contains("- [ ] - [x]"));
    }

    #[test]
    fn test_decode_empty_block() {
        assert!(decode("", "work").is_none());
        assert!(decode("  \n\t\n", "work").is_none());
    }

    #[test]
    fn test_missing_category_uses_fallback() {
        let memo = decode("<!-- id:1, ts:2025-01-01T10:00:00Z -->\n## h\nbody\n", "inbox").unwrap();
        assert_eq!(memo.category, "inbox");
        assert_eq!(memo.content, "body");
    }

    #[test]
    fn test_malformed_category_used_verbatim() {
        let block = "<!-- id:1, ts:2025-01-01T10:00:00Z, category:\"wo\"rk\" -->\n## h\nbody\n";
        let memo = decode(block, "inbox").unwrap();
        assert_eq!(memo.category, "\"wo\"rk\"");
    }

    #[test]
    fn test_malformed_template_is_dropped() {
        let block = "<!-- id:1, ts:2025-01-01T10:00:00Z, template:\"\\q {{content}}\" -->\n## h\nbody\n";
        let memo = decode(block, "").unwrap();
        assert!(memo.template.is_none());
        assert_eq!(memo.content, "body");
    }

    #[test]
    fn test_deleted_without_trashed_at_is_ignored() {
        let block = "<!-- id:1, ts:2025-01-01T10:00:00Z, deleted:true -->\n## h\n<!--\nbody\n-->\n";
        let memo = decode(block, "").unwrap();
        assert!(memo.trashed_at.is_none());
        assert_eq!(memo.content, "body");

        let garbage = "<!-- id:1, ts:2025-01-01T10:00:00Z, deleted:true, trashedAt:soon -->\n## h\nbody\n";
        assert!(decode(garbage, "").unwrap().trashed_at.is_none());
    }

    #[test]
    fn test_trashed_at_without_deleted_flag_is_ignored() {
        let block = "<!-- id:1, ts:2025-01-01T10:00:00Z, trashedAt:2025-01-02T00:00:00Z -->\n## h\nbody\n";
        assert!(decode(block, "").unwrap().trashed_at.is_none());
    }

    #[test]
    fn test_missing_id_generates_one() {
        let memo = decode("<!-- ts:2025-01-01T10:00:00Z -->\n## h\nbody\n", "").unwrap();
        assert!(!memo.id.is_empty());
        assert_eq!(memo.timestamp, "2025-01-01T10:00:00Z");
    }

    #[test]
    fn test_self_parent_is_dropped() {
        let block = "<!-- id:1, ts:2025-01-01T10:00:00Z, parent-id:1 -->\n## h\nbody\n";
        assert!(decode(block, "").unwrap().parent_id.is_none());
    }

    #[test]
    fn test_legacy_block_with_date_line() {
        let memo = decode("## 2024-03-01 09:30\nold memo\nsecond line\n", "inbox").unwrap();
        assert_eq!(memo.timestamp, "2024-03-01T09:30:00");
        assert_eq!(memo.content, "old memo\nsecond line");
        assert_eq!(memo.category, "inbox");
    }

    #[test]
    fn test_legacy_block_without_date() {
        let memo = decode("just some text with [[pic.png]]\n", "inbox").unwrap();
        assert_eq!(memo.content, "just some text with [[pic.png]]");
        assert_eq!(memo.attachments, vec!["pic.png".to_string()]);
        assert!(parse_timestamp(&memo.timestamp).is_some());
    }

    #[test]
    fn test_inline_reference_is_not_an_attachment_line() {
        let memo = record("1", "see [[other note]] for details");
        let block = encode(&memo, None, false);
        let decoded = decode(&block, "work").unwrap();
        assert!(decoded.attachments.is_empty());
        assert_eq!(decoded.content, "see [[other note]] for details");
    }

    #[test]
    fn test_edited_prefix_falls_back_gracefully() {
        let block = "<!-- id:1, ts:2025-01-01T10:00:00Z, template:\"- HH:mm {{content}}\" -->\n* 9:00 edited by hand\n";
        let memo = decode(block, "").unwrap();
        assert_eq!(memo.content, "* 9:00 edited by hand");
    }

    #[test]
    fn test_unwrap_comment() {
        assert_eq!(unwrap_comment("<!--\nx\n-->"), Some("x".to_string()));
        assert_eq!(unwrap_comment("plain"), None);
    }

    #[test]
    fn test_trailing_reference_line_reads_as_attachments() {
        let memo = record("1", "see below\n[[notes.md]]");
        let decoded = decode(&encode(&memo, None, false), "work").unwrap();
        assert_eq!(decoded.content, "see below");
        assert_eq!(decoded.attachments, vec!["notes.md".to_string()]);

        let memo = record("1", "[[notes.md]] is where it lives");
        let decoded = decode(&encode(&memo, None, false), "work").unwrap();
        assert_eq!(decoded, memo);
    }

    #[test]
    fn test_decode_with_default_template() {
        let memo = record("1", "inline");
        let block = encode(&memo, Some("- HH:mm {{content}}"), false);
        assert_eq!(block.lines().nth(1), Some("- 10:00 inline"));
        assert_eq!(decode_with_default(&block, "work", Some("- HH:mm {{content}}")), Some(memo));

        let memo = record("1", "below");
        let block = encode(&memo, Some("## YYYY\n---"), false);
        let decoded = decode_with_default(&block, "work", Some("## YYYY\n---")).unwrap();
        assert_eq!(decoded.content, "below");
    }
}
