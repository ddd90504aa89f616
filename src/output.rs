//! CLI output formatting.
//!
//! # Page-First Display
//!
//! Every page is shown by its block number and title, with the package path
//! after `→`. Details (narration, media, questions) follow as indented
//! context lines. The assessment page has no block number and shows `----`.
//!
//! ## Check
//!
//! ```text
//! Safety Basics (pass mark 80%)
//! 0001 Welcome → pages/welcome.html
//!     Narration: welcome.mp3
//! 0002 Learning Objectives → pages/objectives.html
//!     Objectives: 3
//! 0003 Hazards → pages/topic-1.html
//!     Media: 2
//!     Knowledge check: 1 question
//! ---- Assessment → pages/assessment.html
//!     Questions: 5
//! ```
//!
//! ## Build
//!
//! ```text
//! [ 10%] normalize: Normalized "Safety Basics" (1 topics)
//! ...
//! Package course-safety-basics-1a2b3c4d → safety.zip
//!     Pages: 4
//!     Media files: 2
//!     Size: 1.2 MB
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::compile::{Package, ProgressEvent};
use crate::naming::{self, BlockNumber};
use crate::package::PackageReport;
use crate::types::{CourseDocument, Page};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn block_label(page: &Page) -> String {
    BlockNumber::for_page(page.kind)
        .map(|b| b.to_string())
        .unwrap_or_else(|| "----".to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Human-readable byte count.
fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn page_lines(page: &Page, question_count: Option<usize>) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} \u{2192} {}",
        block_label(page),
        page.title,
        naming::page_path(page.kind)
    )];
    let ctx = indent(1);
    if let Some(audio) = &page.audio {
        lines.push(format!("{ctx}Narration: {audio}"));
    }
    if let Some(captions) = &page.captions {
        lines.push(format!("{ctx}Captions: {captions}"));
    }
    if !page.objectives.is_empty() {
        lines.push(format!("{ctx}Objectives: {}", page.objectives.len()));
    }
    if !page.media.is_empty() {
        lines.push(format!("{ctx}Media: {}", page.media.len()));
    }
    if let Some(kc) = &page.knowledge_check {
        lines.push(format!(
            "{ctx}Knowledge check: {}",
            plural(kc.questions.len(), "question")
        ));
    }
    if let Some(n) = question_count {
        lines.push(format!("{ctx}Questions: {n}"));
    }
    lines
}

// ============================================================================
// check
// ============================================================================

/// Outline of a normalized course, one entry per page in document order.
pub fn format_outline(doc: &CourseDocument) -> Vec<String> {
    let mut lines = vec![format!("{} (pass mark {}%)", doc.title, doc.pass_mark)];
    for page in doc.narrated_pages() {
        lines.extend(page_lines(page, None));
    }
    lines.extend(page_lines(
        &doc.assessment.page,
        Some(doc.assessment.questions.len()),
    ));
    lines
}

pub fn print_outline(doc: &CourseDocument) {
    for line in format_outline(doc) {
        println!("{}", line);
    }
}

// ============================================================================
// build
// ============================================================================

pub fn format_progress_event(event: &ProgressEvent) -> Vec<String> {
    vec![format!(
        "[{:>3}%] {}: {}",
        event.percent,
        event.stage.label(),
        event.message
    )]
}

pub fn format_package_summary(package: &Package, output: &Path) -> Vec<String> {
    let ctx = indent(1);
    let pages = package
        .files
        .iter()
        .filter(|f| f.starts_with(naming::PAGES_DIR))
        .count();
    let media = package
        .files
        .iter()
        .filter(|f| f.starts_with("media/"))
        .count();
    vec![
        format!(
            "Package {} \u{2192} {}",
            package.manifest.identifier,
            output.display()
        ),
        format!("{ctx}Pages: {pages}"),
        format!("{ctx}Media files: {media}"),
        format!("{ctx}Size: {}", format_size(package.bytes.len() as u64)),
    ]
}

pub fn print_package_summary(package: &Package, output: &Path) {
    for line in format_package_summary(package, output) {
        println!("{}", line);
    }
}

// ============================================================================
// inspect
// ============================================================================

pub fn format_inspect_report(report: &PackageReport) -> Vec<String> {
    let ctx = indent(1);
    let mut lines = vec![
        format!("{} ({})", report.title, report.identifier),
        format!("{ctx}SCORM {}", report.schema_version),
        format!("{ctx}Items: {}", report.items),
        format!(
            "{ctx}Entries: {} ({})",
            report.entries.len(),
            format_size(report.total_size())
        ),
    ];
    for entry in &report.entries {
        lines.push(format!(
            "{}{} ({})",
            indent(2),
            entry.path,
            format_size(entry.size)
        ));
    }
    lines.push(format!(
        "{ctx}Manifest and media/ agree ({})",
        plural(report.media_entries().count(), "media file")
    ));
    lines
}

pub fn print_inspect_report(report: &PackageReport) {
    for line in format_inspect_report(report) {
        println!("{}", line);
    }
}
