//! Post extraction from exported JSON members.
//!
//! Extraction happens in two steps:
//!
//! 1. [`scan_entry`] decides whether one archive member is worth reading
//!    (path allowlist, UTF-8, JSON, array, post-shaped) and turns each element
//!    with a usable timestamp into a [`Candidate`]. Every exclusion is counted
//!    in the report.
//! 2. [`build_post`] turns one candidate into a normalized [`Post`], resolving
//!    media references against the [`MediaIndex`]. Candidates are independent,
//!    so the orchestrator builds them concurrently.
//!
//! Whether an element "looks like a post" is decided by [`classify_entry`],
//! which yields an explicit [`EntryShape`] instead of probing fields ad hoc.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::digest::DigestProvider;
use crate::error::BuildError;
use crate::media::{normalize_path, BlobResolver, MediaIndex};
use crate::models::{MediaKind, MediaReference, Post, RawEntry};
use crate::report::{ReportBuilder, SkipReason};
use crate::text_repair::{repair, repair_owned};

// ============ Path filter ============

/// Allowlist of path fragments that mark a JSON member as a post container.
#[derive(Debug, Clone)]
pub struct PathFilter {
    segments: Vec<String>,
}

impl PathFilter {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn is_json(path: &str) -> bool {
        path.to_lowercase().ends_with(".json")
    }

    /// Case-insensitive substring match against any segment.
    pub fn is_post_container(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        self.segments.iter().any(|s| lower.contains(s.as_str()))
    }
}

// ============ Shape classification ============

/// The fields of an element recognized as a post record.
#[derive(Debug, Clone, Copy)]
pub struct PostShape<'a> {
    pub object: &'a Map<String, Value>,
    pub data: Option<&'a [Value]>,
    pub title: Option<&'a str>,
    pub attachments: Option<&'a [Value]>,
}

/// Classification of one JSON array element.
#[derive(Debug, Clone, Copy)]
pub enum EntryShape<'a> {
    Post(PostShape<'a>),
    Unrecognized,
}

impl EntryShape<'_> {
    pub fn is_post(&self) -> bool {
        matches!(self, EntryShape::Post(_))
    }
}

/// An element is a post if it is an object exposing an array `data`, a
/// string `title`, or an array `attachments`.
pub fn classify_entry(value: &Value) -> EntryShape<'_> {
    let object = match value.as_object() {
        Some(object) => object,
        None => return EntryShape::Unrecognized,
    };
    let data = object.get("data").and_then(Value::as_array).map(Vec::as_slice);
    let title = object.get("title").and_then(Value::as_str);
    let attachments = object
        .get("attachments")
        .and_then(Value::as_array)
        .map(Vec::as_slice);

    if data.is_none() && title.is_none() && attachments.is_none() {
        return EntryShape::Unrecognized;
    }
    EntryShape::Post(PostShape {
        object,
        data,
        title,
        attachments,
    })
}

/// An array is post-shaped if at least one element is a post.
///
/// The whole array is accepted or rejected; elements are not filtered here.
pub fn is_post_array(items: &[Value]) -> bool {
    items.iter().any(|item| classify_entry(item).is_post())
}

/// Numeric coercion of a `timestamp` field. Numbers and numeric strings are
/// accepted when finite; empty strings, text, null and booleans are not.
pub fn coerce_timestamp(value: Option<&Value>) -> Option<f64> {
    let ts = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    ts.is_finite().then_some(ts)
}

/// Millisecond creation time for a timestamp in seconds, or `None` when the
/// instant falls outside the representable calendar range.
pub fn timestamp_millis(ts: f64) -> Option<i64> {
    let millis = (ts * 1000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|_| millis)
}

// ============ Scan ============

/// One array element accepted for post construction.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub element: Value,
    pub timestamp: f64,
    /// `timestamp` in milliseconds, already checked against the calendar range.
    pub created_at: i64,
    pub source_path: String,
}

/// Scan one archive member, counting it into `report`, and return the
/// elements that should become posts.
pub fn scan_entry(
    entry: &RawEntry,
    filter: &PathFilter,
    report: &mut ReportBuilder,
) -> Vec<Candidate> {
    let path = normalize_path(&entry.path);
    if !PathFilter::is_json(&path) {
        return Vec::new();
    }
    report.json_seen();

    if !filter.is_post_container(&path) {
        report.skip(SkipReason::WrongPath);
        return Vec::new();
    }

    let text = match std::str::from_utf8(&entry.bytes) {
        Ok(text) => text,
        Err(_) => {
            report.skip(SkipReason::ParseFailure);
            report.error(format!("Decode failed: {}", path));
            return Vec::new();
        }
    };
    let parsed: Value = match serde_json::from_str(text.trim_start_matches('\u{feff}')) {
        Ok(parsed) => parsed,
        Err(e) => {
            report.skip(SkipReason::ParseFailure);
            report.error(format!("Parse failed: {} ({})", path, e));
            return Vec::new();
        }
    };

    let items = match parsed {
        Value::Array(items) => items,
        _ => {
            report.skip(SkipReason::NotArray);
            return Vec::new();
        }
    };
    if !is_post_array(&items) {
        report.skip(SkipReason::NotPostShaped);
        return Vec::new();
    }

    let mut candidates = Vec::with_capacity(items.len());
    for element in items {
        let accepted = coerce_timestamp(element.get("timestamp"))
            .and_then(|ts| timestamp_millis(ts).map(|millis| (ts, millis)));
        match accepted {
            Some((timestamp, created_at)) => candidates.push(Candidate {
                element,
                timestamp,
                created_at,
                source_path: path.clone(),
            }),
            None => report.skip(SkipReason::MissingTimestamp),
        }
    }
    debug!(path = %path, candidates = candidates.len(), "scanned post container");
    candidates
}

// ============ Build ============

/// Shared, read-only collaborators for post construction.
#[derive(Clone)]
pub struct BuildContext {
    pub media: Arc<MediaIndex>,
    pub resolver: Arc<dyn BlobResolver>,
    pub digest: Arc<dyn DigestProvider>,
}

/// Build a post from one candidate.
///
/// Objects without any post field still produce a post, keyed only by
/// their timestamp; missing fields come out empty.
pub fn build_post(candidate: &Candidate, ctx: &BuildContext) -> Result<Post, BuildError> {
    let shape = match classify_entry(&candidate.element) {
        EntryShape::Post(shape) => Some(shape),
        EntryShape::Unrecognized => None,
    };

    let title = shape
        .and_then(|s| s.title)
        .map(repair_owned)
        .unwrap_or_default();

    let mut text = shape
        .and_then(|s| s.data)
        .map(collect_text)
        .unwrap_or_default();
    if text.is_empty() {
        text = title.clone();
    }

    let attachments = shape.and_then(|s| s.attachments).unwrap_or(&[]);
    let permalink = find_permalink(attachments);
    let media = collect_media(attachments, ctx)?;

    let timestamp = format_timestamp(candidate.timestamp);
    let id = ctx
        .digest
        .hex_digest(format!("{}\n{}\n{}", timestamp, text, permalink).as_bytes());

    Ok(Post {
        id,
        created_at: candidate.created_at,
        text,
        title,
        permalink,
        media,
        source_path: candidate.source_path.clone(),
    })
}

/// Render a timestamp the way it appears in the identifier input:
/// integral values without a fractional part, `-0` as `0`.
pub fn format_timestamp(ts: f64) -> String {
    if ts == 0.0 {
        return "0".to_string();
    }
    format!("{}", ts)
}

fn collect_text(data: &[Value]) -> String {
    let parts: Vec<String> = data
        .iter()
        .filter_map(|item| item.get("post").and_then(Value::as_str))
        .map(repair_owned)
        .collect();
    parts.join("\n").trim().to_string()
}

/// The `data` array of each object attachment, in order.
fn attachment_data(attachments: &[Value]) -> impl Iterator<Item = &Value> {
    attachments
        .iter()
        .filter_map(|a| a.get("data").and_then(Value::as_array))
        .flatten()
}

fn is_http_url(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// First `external_context.url` that is an absolute http(s) URL after repair.
pub fn find_permalink(attachments: &[Value]) -> String {
    attachment_data(attachments)
        .filter_map(|item| {
            item.get("external_context")
                .and_then(|c| c.get("url"))
                .and_then(Value::as_str)
        })
        .map(repair)
        .find(|url| is_http_url(url))
        .map(|url| url.into_owned())
        .unwrap_or_default()
}

/// JavaScript-style truthiness for picking the first usable field.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn first_truthy<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| truthy(v))
}

fn first_string<'a>(candidates: &[Option<&'a Map<String, Value>>], key: &str) -> &'a str {
    candidates
        .iter()
        .flatten()
        .copied()
        .filter_map(|object| object.get(key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

fn collect_media(attachments: &[Value], ctx: &BuildContext) -> Result<Vec<MediaReference>, BuildError> {
    let mut items = Vec::new();
    for datum in attachment_data(attachments) {
        let datum = match datum.as_object() {
            Some(datum) => datum,
            None => continue,
        };
        let media = match first_truthy(datum, &["media", "video", "image"]).and_then(Value::as_object) {
            Some(media) => media,
            None => continue,
        };
        let raw_uri = first_string(&[Some(media)], "uri");
        let raw_uri = if raw_uri.is_empty() {
            first_string(&[Some(media)], "src")
        } else {
            raw_uri
        };
        if raw_uri.is_empty() {
            continue;
        }

        let uri = normalize_path(&repair(raw_uri));
        let resolved = ctx.media.resolve(&uri, ctx.resolver.as_ref())?;
        let (handle, kind, mime) = match resolved {
            Some(r) => (Some(r.handle), Some(MediaKind::from_mime(r.mime)), Some(r.mime)),
            None => (None, None, None),
        };

        items.push(MediaReference {
            uri,
            handle,
            kind,
            mime,
            title: repair_owned(first_string(&[Some(media), Some(datum)], "title")),
            description: repair_owned(first_string(&[Some(media), Some(datum)], "description")),
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::BuiltinSha1;
    use crate::media::InlineResolver;
    use serde_json::json;

    fn filter() -> PathFilter {
        PathFilter::new(crate::config::IngestConfig::default().post_path_segments)
    }

    fn ctx_with(media: MediaIndex) -> BuildContext {
        BuildContext {
            media: Arc::new(media),
            resolver: Arc::new(InlineResolver),
            digest: Arc::new(BuiltinSha1),
        }
    }

    fn candidate(element: Value) -> Candidate {
        let timestamp = coerce_timestamp(element.get("timestamp")).unwrap();
        Candidate {
            element,
            timestamp,
            created_at: timestamp_millis(timestamp).unwrap(),
            source_path: "your_facebook_activity/posts/your_posts_1.json".to_string(),
        }
    }

    fn scan(path: &str, body: &str) -> (Vec<Candidate>, crate::report::IngestReport) {
        let mut report = ReportBuilder::new(1);
        let out = scan_entry(&RawEntry::new(path, body), &filter(), &mut report);
        (out, report.finish(0))
    }

    #[test]
    fn classify_recognizes_each_marker() {
        assert!(classify_entry(&json!({"data": []})).is_post());
        assert!(classify_entry(&json!({"title": "t"})).is_post());
        assert!(classify_entry(&json!({"attachments": []})).is_post());
        assert!(!classify_entry(&json!({"data": "x", "title": 3})).is_post());
        assert!(!classify_entry(&json!({"unrelated": true})).is_post());
        assert!(!classify_entry(&json!(null)).is_post());
        assert!(!classify_entry(&json!(["data"])).is_post());
    }

    #[test]
    fn post_array_needs_one_post_element() {
        assert!(is_post_array(&[json!(1), json!({"title": "x"})]));
        assert!(!is_post_array(&[json!({"unrelated": true})]));
        assert!(!is_post_array(&[]));
    }

    #[test]
    fn timestamp_coercion() {
        assert_eq!(coerce_timestamp(Some(&json!(1700000000))), Some(1_700_000_000.0));
        assert_eq!(coerce_timestamp(Some(&json!("1700000000"))), Some(1_700_000_000.0));
        assert_eq!(coerce_timestamp(Some(&json!(" 12.5 "))), Some(12.5));
        assert_eq!(coerce_timestamp(Some(&json!(""))), None);
        assert_eq!(coerce_timestamp(Some(&json!("not-a-number"))), None);
        assert_eq!(coerce_timestamp(Some(&json!("inf"))), None);
        assert_eq!(coerce_timestamp(Some(&json!(null))), None);
        assert_eq!(coerce_timestamp(Some(&json!(true))), None);
        assert_eq!(coerce_timestamp(None), None);
    }

    #[test]
    fn path_filter_is_case_insensitive() {
        let f = filter();
        assert!(f.is_post_container("Export/Your_Facebook_Activity/Posts/your_posts_1.json"));
        assert!(f.is_post_container("this_profile's_activity_across_facebook/posts/x.json"));
        assert!(!f.is_post_container("your_facebook_activity/comments/comments.json"));
        assert!(PathFilter::is_json("a/B.JSON"));
        assert!(!PathFilter::is_json("a/b.json.bak"));
    }

    #[test]
    fn non_json_members_are_not_counted() {
        let (out, report) = scan("your_facebook_activity/posts/readme.txt", "[]");
        assert!(out.is_empty());
        assert_eq!(report.total_json, 0);
    }

    #[test]
    fn wrong_path_is_counted() {
        let (out, report) = scan("other/your_posts_1.json", r#"[{"timestamp": 1, "title": "x"}]"#);
        assert!(out.is_empty());
        assert_eq!(report.total_json, 1);
        assert_eq!(report.skipped.wrong_path, 1);
    }

    #[test]
    fn parse_failures_are_counted_with_diagnostics() {
        let (_, report) = scan("your_facebook_activity/posts/bad.json", "{not json");
        assert_eq!(report.skipped.parse_failure, 1);
        assert!(report.errors[0].contains("bad.json"));

        let mut builder = ReportBuilder::new(1);
        let entry = RawEntry::new("your_facebook_activity/posts/bin.json", vec![0xff, 0xfe, 0x00]);
        scan_entry(&entry, &filter(), &mut builder);
        let report = builder.finish(0);
        assert_eq!(report.skipped.parse_failure, 1);
        assert!(report.errors[0].starts_with("Decode failed"));
    }

    #[test]
    fn non_array_and_non_post_arrays_are_counted() {
        let (_, report) = scan("your_facebook_activity/posts/o.json", r#"{"a": 1}"#);
        assert_eq!(report.skipped.not_array, 1);

        let (_, report) = scan("your_facebook_activity/posts/u.json", r#"[{"unrelated": true}]"#);
        assert_eq!(report.skipped.not_post_shaped, 1);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn bad_timestamp_skips_only_that_element() {
        let (out, report) = scan(
            "your_facebook_activity/posts/p.json",
            r#"[{"timestamp": "not-a-number", "title": "a"}, {"timestamp": 5, "title": "b"}]"#,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].timestamp, 5.0);
        assert_eq!(report.skipped.missing_timestamp, 1);
    }

    #[test]
    fn overflowing_literal_skips_only_that_element() {
        let (out, report) = scan(
            "your_facebook_activity/posts/p.json",
            r#"[{"timestamp": 1700000000, "data": [{"post": "keep me"}]},
                {"timestamp": 1e400, "data": [{"post": "lost"}]}]"#,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].created_at, 1_700_000_000_000);
        assert_eq!(report.skipped.parse_failure, 0);
        assert_eq!(report.skipped.missing_timestamp, 1);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn timestamps_outside_calendar_range_are_skipped() {
        assert_eq!(timestamp_millis(1_700_000_000.0), Some(1_700_000_000_000));
        assert_eq!(timestamp_millis(1.5), Some(1500));
        assert_eq!(timestamp_millis(1e17), None);
        assert_eq!(timestamp_millis(-1e17), None);

        let (out, report) = scan(
            "your_facebook_activity/posts/p.json",
            r#"[{"timestamp": 1e17, "title": "far"}, {"timestamp": -1e17, "title": "past"},
                {"timestamp": 1700000000, "title": "now"}]"#,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].element["title"], "now");
        assert_eq!(report.skipped.missing_timestamp, 2);
    }

    #[test]
    fn builds_basic_post() {
        let c = candidate(json!({
            "timestamp": 1700000000,
            "data": [{"post": "hello"}],
            "attachments": []
        }));
        let post = build_post(&c, &ctx_with(MediaIndex::new())).unwrap();
        assert_eq!(post.text, "hello");
        assert_eq!(post.title, "");
        assert_eq!(post.permalink, "");
        assert!(post.media.is_empty());
        assert_eq!(post.created_at, 1_700_000_000_000);
        assert_eq!(
            post.id,
            BuiltinSha1.hex_digest("1700000000\nhello\n".as_bytes())
        );
    }

    #[test]
    fn text_joins_parts_and_falls_back_to_title() {
        let c = candidate(json!({
            "timestamp": 1,
            "data": [{"post": " first"}, {"update_timestamp": 3}, {"post": "second "}]
        }));
        let post = build_post(&c, &ctx_with(MediaIndex::new())).unwrap();
        assert_eq!(post.text, "first\nsecond");

        let c = candidate(json!({"timestamp": 1, "title": "Only a title", "data": [{}]}));
        let post = build_post(&c, &ctx_with(MediaIndex::new())).unwrap();
        assert_eq!(post.text, "Only a title");
        assert_eq!(post.title, "Only a title");
    }

    #[test]
    fn text_and_title_are_repaired() {
        let mangled: String = "café".as_bytes().iter().map(|&b| b as char).collect();
        let c = candidate(json!({"timestamp": 1, "title": mangled, "data": [{"post": mangled}]}));
        let post = build_post(&c, &ctx_with(MediaIndex::new())).unwrap();
        assert_eq!(post.text, "café");
        assert_eq!(post.title, "café");
    }

    #[test]
    fn permalink_takes_first_http_url() {
        let attachments = vec![
            json!({"data": [{"external_context": {"url": "ftp://nope"}}]}),
            json!({"data": "ignored"}),
            json!({"data": [
                {"external_context": {"name": "no url"}},
                {"external_context": {"url": "HTTPS://example.com/a"}},
                {"external_context": {"url": "https://example.com/b"}}
            ]}),
        ];
        assert_eq!(find_permalink(&attachments), "HTTPS://example.com/a");
        assert_eq!(find_permalink(&[]), "");
    }

    #[test]
    fn media_references_resolve_against_index() {
        let mut index = MediaIndex::new();
        index.absorb_archive(vec![RawEntry::new("Media/Photos/a.JPG", "jpg")]);
        let c = candidate(json!({
            "timestamp": 1,
            "attachments": [{"data": [
                {"media": {"uri": "media\\photos\\a.jpg", "title": "Beach"}},
                {"video": {"uri": "media/videos/missing.mp4"}, "description": "clip"},
                {"image": {"src": "media/photos/a.jpg"}, "title": "Fallback"},
                {"media": {"uri": ""}},
                {"media": "not an object"},
                {"external_context": {"url": "https://x"}}
            ]}]
        }));
        let post = build_post(&c, &ctx_with(index)).unwrap();

        assert_eq!(post.media.len(), 3);
        let first = &post.media[0];
        assert_eq!(first.uri, "media/photos/a.jpg");
        assert_eq!(first.kind, Some(MediaKind::Image));
        assert_eq!(first.mime, Some("image/jpeg"));
        assert_eq!(first.title, "Beach");
        assert!(first.handle.as_ref().unwrap().as_str().starts_with("data:image/jpeg;base64,"));

        let missing = &post.media[1];
        assert!(missing.handle.is_none());
        assert!(missing.kind.is_none());
        assert_eq!(missing.description, "clip");

        let third = &post.media[2];
        assert_eq!(third.title, "Fallback");
        assert_eq!(third.handle, first.handle);
        assert_eq!(post.permalink, "https://x");
    }

    #[test]
    fn fractional_and_string_timestamps_format_like_numbers() {
        assert_eq!(format_timestamp(1_700_000_000.0), "1700000000");
        assert_eq!(format_timestamp(1.5), "1.5");
        assert_eq!(format_timestamp(-0.0), "0");

        let numeric = build_post(
            &candidate(json!({"timestamp": 1700000000, "title": "t"})),
            &ctx_with(MediaIndex::new()),
        )
        .unwrap();
        let string = build_post(
            &candidate(json!({"timestamp": "1700000000", "title": "t"})),
            &ctx_with(MediaIndex::new()),
        )
        .unwrap();
        assert_eq!(numeric.id, string.id);
    }
}
