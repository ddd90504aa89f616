//! YouTube embed URLs and clip timing.
//!
//! Clip timing is a `start`/`end` pair of second offsets. Explicit values on a
//! [`MediaReference`](crate::types::MediaReference) always win; a missing
//! value falls back to the `start=`/`end=` query parameter of the embed URL.
//! A URL without timing parameters yields no timing, never an error.

/// Resolved clip window in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ClipRange {
    pub start: Option<u32>,
    pub end: Option<u32>,
}

impl ClipRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Resolve clip timing field by field: explicit values, then URL parameters.
pub fn resolve_clip(
    explicit_start: Option<u32>,
    explicit_end: Option<u32>,
    embed_url: &str,
) -> ClipRange {
    ClipRange {
        start: explicit_start.or_else(|| query_seconds(embed_url, "start")),
        end: explicit_end.or_else(|| query_seconds(embed_url, "end")),
    }
}

/// Rebuild an embed URL so its `start`/`end` parameters reflect `clip`.
///
/// Other query parameters are kept in their original order; stale timing
/// parameters are dropped.
pub fn clipped_embed_url(embed_url: &str, clip: ClipRange) -> String {
    let (base, query) = split_query(embed_url);
    let mut params: Vec<String> = query
        .map(|q| {
            q.split('&')
                .filter(|p| !p.is_empty())
                .filter(|p| {
                    let key = p.split('=').next().unwrap_or("");
                    key != "start" && key != "end"
                })
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if let Some(start) = clip.start {
        params.push(format!("start={start}"));
    }
    if let Some(end) = clip.end {
        params.push(format!("end={end}"));
    }
    if params.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", params.join("&"))
    }
}

pub fn is_youtube_url(url: &str) -> bool {
    let host = host_of(url);
    host == "youtu.be"
        || host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host == "youtube-nocookie.com"
        || host.ends_with(".youtube-nocookie.com")
}

/// Extract the video id from a watch, short, shorts or embed URL.
pub fn youtube_video_id(url: &str) -> Option<String> {
    if !is_youtube_url(url) {
        return None;
    }
    let (base, query) = split_query(url);
    let path = path_of(base);
    let id = if host_of(url) == "youtu.be" {
        path.split('/').find(|s| !s.is_empty())
    } else if let Some(rest) = path
        .strip_prefix("/embed/")
        .or_else(|| path.strip_prefix("/shorts/"))
        .or_else(|| path.strip_prefix("/v/"))
        .or_else(|| path.strip_prefix("/live/"))
    {
        rest.split('/').next()
    } else {
        query.and_then(|q| query_param(q, "v"))
    }?;
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| id.to_string())
}

/// Convert any YouTube URL into its canonical embed form.
///
/// Timing carried by the source URL (`start`, `end`, or the `t=` shorthand of
/// watch links) is preserved as `start`/`end` parameters.
pub fn to_embed_url(url: &str) -> Option<String> {
    let id = youtube_video_id(url)?;
    let (base, query) = split_query(url);
    let base = if path_of(base).starts_with("/embed/") {
        base.to_string()
    } else {
        format!("https://www.youtube.com/embed/{id}")
    };
    let start = query_seconds(url, "start").or_else(|| query_seconds(url, "t"));
    let end = query_seconds(url, "end");
    let keep: Vec<&str> = query
        .map(|q| {
            q.split('&')
                .filter(|p| {
                    let key = p.split('=').next().unwrap_or("");
                    !p.is_empty() && !matches!(key, "v" | "t" | "start" | "end" | "feature" | "si")
                })
                .collect()
        })
        .unwrap_or_default();
    let rebuilt = if keep.is_empty() {
        base
    } else {
        format!("{base}?{}", keep.join("&"))
    };
    Some(clipped_embed_url(&rebuilt, ClipRange { start, end }))
}

fn split_query(url: &str) -> (&str, Option<&str>) {
    let url = url.split('#').next().unwrap_or(url);
    match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    }
}

fn host_of(url: &str) -> String {
    let rest = url
        .split_once("://")
        .map(|(_, r)| r)
        .or_else(|| url.strip_prefix("//"))
        .unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit('@').next().unwrap_or(authority);
    let host = host.split(':').next().unwrap_or(host);
    host.to_ascii_lowercase()
}

fn path_of(base: &str) -> &str {
    let rest = base
        .split_once("://")
        .map(|(_, r)| r)
        .or_else(|| base.strip_prefix("//"))
        .unwrap_or(base);
    rest.find('/').map(|i| &rest[i..]).unwrap_or("")
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// Parse a timing parameter: plain seconds, `90s`, or `1m30s`.
fn query_seconds(url: &str, key: &str) -> Option<u32> {
    let (_, query) = split_query(url);
    parse_seconds(query_param(query?, key)?)
}

fn parse_seconds(value: &str) -> Option<u32> {
    if let Ok(n) = value.parse::<u32>() {
        return Some(n);
    }
    let mut total: u32 = 0;
    let mut digits = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u32 = digits.parse().ok()?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(n.checked_mul(unit)?)?;
    }
    if !digits.is_empty() {
        return None;
    }
    Some(total)
}
