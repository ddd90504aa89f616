//! Deterministic names for everything that lands in a package.
//!
//! ## Block Numbers
//!
//! Narration audio and caption files are named by a 4-digit block number
//! assigned in document order: welcome is `0001`, objectives is `0002`, and
//! topic `i` (zero-based) is `0003 + i`. Numbers are assigned whether or not a
//! page has narration, so a page temporarily losing its audio never shifts the
//! numbering of later pages and previously recorded files stay addressable.
//!
//! ## Package Layout
//!
//! ```text
//! pages/welcome.html, objectives.html, topic-<n>.html, assessment.html
//! media/audio/audio-0003.mp3           # narration, keyed by block number
//! media/captions/caption-0003.vtt      # captions, keyed by block number
//! media/images/<media-id>.<ext>        # page media, keyed by media id
//! media/video/<media-id>.<ext>
//! ```
//!
//! Filenames stay page-semantic rather than content-hashed so a manifest can
//! be read by a human.

use crate::types::{CourseDocument, MediaKind, PageKind};
use std::fmt;

pub const AUDIO_DIR: &str = "media/audio";
pub const CAPTIONS_DIR: &str = "media/captions";
pub const IMAGES_DIR: &str = "media/images";
pub const VIDEO_DIR: &str = "media/video";
pub const PAGES_DIR: &str = "pages";
pub const SCRIPT_PATH: &str = "scripts/navigation.js";
pub const STYLESHEET_PATH: &str = "styles/main.css";
pub const INDEX_PATH: &str = "index.html";
pub const MANIFEST_PATH: &str = "imsmanifest.xml";

/// Highest topic count whose block number still fits in four digits.
pub const MAX_TOPICS: usize = 9997;

/// 4-digit narration block number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockNumber(u16);

impl BlockNumber {
    pub const WELCOME: BlockNumber = BlockNumber(1);
    pub const OBJECTIVES: BlockNumber = BlockNumber(2);

    /// Block number of the zero-based topic `index`, or `None` past [`MAX_TOPICS`].
    pub fn for_topic(index: usize) -> Option<Self> {
        if index >= MAX_TOPICS {
            return None;
        }
        u16::try_from(index + 3).ok().map(BlockNumber)
    }

    /// Block number for a page kind. The assessment page has no block.
    pub fn for_page(kind: PageKind) -> Option<Self> {
        match kind {
            PageKind::Welcome => Some(Self::WELCOME),
            PageKind::Objectives => Some(Self::OBJECTIVES),
            PageKind::Topic(i) => Self::for_topic(i),
            PageKind::Assessment => None,
        }
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// A page paired with its block slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAssignment {
    pub page: PageKind,
    pub block: BlockNumber,
}

/// Assign a block to every narrated page: always `topics + 2` slots.
pub fn assign_block_numbers(doc: &CourseDocument) -> Vec<BlockAssignment> {
    doc.narrated_pages()
        .filter_map(|page| {
            BlockNumber::for_page(page.kind).map(|block| BlockAssignment {
                page: page.kind,
                block,
            })
        })
        .collect()
}

/// Package path of a page's HTML fragment.
pub fn page_path(kind: PageKind) -> String {
    format!("{}/{}.html", PAGES_DIR, kind.page_id())
}

/// Package path of a page's narration audio.
///
/// Keyed by block number; the assessment page falls back to its page id.
pub fn narration_audio_path(kind: PageKind, ext: &str) -> String {
    match BlockNumber::for_page(kind) {
        Some(block) => format!("{AUDIO_DIR}/audio-{block}.{ext}"),
        None => format!("{AUDIO_DIR}/audio-{}.{ext}", kind.page_id()),
    }
}

/// Package path of a page's caption track.
pub fn caption_path(kind: PageKind, ext: &str) -> String {
    match BlockNumber::for_page(kind) {
        Some(block) => format!("{CAPTIONS_DIR}/caption-{block}.{ext}"),
        None => format!("{CAPTIONS_DIR}/caption-{}.{ext}", kind.page_id()),
    }
}

/// Logical id used for a page's narration audio in the resolved-asset map.
pub fn narration_asset_id(kind: PageKind) -> String {
    match BlockNumber::for_page(kind) {
        Some(block) => format!("narration-{block}"),
        None => format!("narration-{}", kind.page_id()),
    }
}

/// Logical id used for a page's caption track in the resolved-asset map.
pub fn caption_asset_id(kind: PageKind) -> String {
    match BlockNumber::for_page(kind) {
        Some(block) => format!("captions-{block}"),
        None => format!("captions-{}", kind.page_id()),
    }
}

/// Package path of a page media element, keyed by its media id.
///
/// Returns `None` for YouTube, which is embedded rather than packaged.
pub fn media_path(kind: MediaKind, id: &str, ext: &str) -> Option<String> {
    let dir = match kind {
        MediaKind::Image => IMAGES_DIR,
        MediaKind::Audio => AUDIO_DIR,
        MediaKind::Video => VIDEO_DIR,
        MediaKind::YouTube => return None,
    };
    let stem = slugify(id);
    let stem = if stem.is_empty() { "media" } else { stem.as_str() };
    Some(format!("{dir}/{stem}.{ext}"))
}

/// Lowercase ASCII slug: alphanumerics kept, every other run becomes one dash.
///
/// - `"Intro Image"` → `"intro-image"`
/// - `"topic_1/diagram.png"` → `"topic-1-diagram-png"`
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Lowercased extension of the last path segment, ignoring any query string.
pub fn extension_of(name: &str) -> Option<String> {
    let path = name.split(['?', '#']).next().unwrap_or(name);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Last path segment of an asset name (`media/audio-0.mp3` → `audio-0.mp3`).
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "vtt" => "text/vtt",
        "srt" => "application/x-subrip",
        _ => return None,
    })
}

pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    Some(match essence {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "audio/mp4" => "m4a",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "text/vtt" => "vtt",
        _ => return None,
    })
}

/// Infer a media kind from a file extension.
pub fn kind_for_extension(ext: &str) -> Option<MediaKind> {
    let mime = mime_for_extension(ext)?;
    if mime.starts_with("image/") {
        Some(MediaKind::Image)
    } else if mime.starts_with("audio/") {
        Some(MediaKind::Audio)
    } else if mime.starts_with("video/") {
        Some(MediaKind::Video)
    } else {
        None
    }
}
