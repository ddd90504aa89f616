//! The generation pipeline.
//!
//! ```text
//! normalize → media → { pages, runtime } → manifest → package
//! ```
//!
//! Page rendering and runtime emission only read the normalized course and
//! the resolved media, so they run side by side with `rayon::join`. Each stage
//! boundary sends a [`ProgressEvent`] on the optional channel. Sends never
//! block and a dropped receiver is ignored: progress reporting cannot fail a
//! build.
//!
//! The only output is the returned [`Package`]. Any stage error ends the run
//! and nothing partial is handed back.

use crate::config::{self, ConfigError, ScormConfig};
use crate::manifest::{self, Manifest};
use crate::media::fetch::MediaFetcher;
use crate::media::{self, AssetLibrary, MediaResolutionError};
use crate::naming::{self, BlockAssignment};
use crate::normalize::{self, ValidationError};
use crate::package::{self, PackageEntry, PackagingError};
use crate::render::{self, GenerationError};
use crate::runtime::emit::emit_runtime;
use crate::runtime::{RuntimeCourse, RuntimeSettings};
use crate::style;
use crate::types::CourseDocument;
use serde_json::Value;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Media(#[from] MediaResolutionError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Packaging(#[from] PackagingError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Media,
    Pages,
    Runtime,
    Manifest,
    Package,
}

impl Stage {
    /// Overall completion once this stage has finished.
    pub fn percent(self) -> u8 {
        match self {
            Stage::Normalize => 10,
            Stage::Media => 40,
            Stage::Pages => 60,
            Stage::Runtime => 70,
            Stage::Manifest => 85,
            Stage::Package => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Media => "media",
            Stage::Pages => "pages",
            Stage::Runtime => "runtime",
            Stage::Manifest => "manifest",
            Stage::Package => "package",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    pub percent: u8,
}

struct Progress(Option<Sender<ProgressEvent>>);

impl Progress {
    fn report(&self, stage: Stage, message: String) {
        tracing::info!(stage = stage.label(), "{message}");
        let Some(tx) = &self.0 else {
            return;
        };
        let event = ProgressEvent {
            stage,
            message,
            percent: stage.percent(),
        };
        if tx.send(event).is_err() {
            tracing::debug!(stage = stage.label(), "Progress receiver is gone");
        }
    }
}

/// A finished SCORM package.
#[derive(Debug)]
pub struct Package {
    /// The zip archive.
    pub bytes: Vec<u8>,
    pub document: CourseDocument,
    pub manifest: Manifest,
    pub blocks: Vec<BlockAssignment>,
    /// Archive paths in write order.
    pub files: Vec<String>,
}

/// Compile a course document and its assets into a SCORM 1.2 package.
pub fn compile(
    course: &Value,
    assets: &AssetLibrary,
    config: &ScormConfig,
    fetcher: &dyn MediaFetcher,
    progress: Option<Sender<ProgressEvent>>,
) -> Result<Package, CompileError> {
    let progress = Progress(progress);
    config.validate()?;

    let doc = normalize::normalize(course, &config.course)?;
    progress.report(
        Stage::Normalize,
        format!("Normalized \"{}\" ({} topics)", doc.title, doc.topics.len()),
    );

    let threads = config::effective_threads(&config.processing);
    let media = media::resolve(&doc, assets, fetcher, threads)?;
    progress.report(
        Stage::Media,
        format!(
            "Resolved {} media references into {} files",
            media.assets.len(),
            media.files.len()
        ),
    );

    let settings = RuntimeSettings::from(&config.runtime);
    let (pages, script) = rayon::join(
        || render::render_pages(&doc, &media),
        || emit_runtime(&RuntimeCourse::from_document(&doc, &media), settings),
    );
    let pages = pages?;
    progress.report(Stage::Pages, format!("Rendered {} pages", pages.len()));
    let script = script?;
    progress.report(
        Stage::Runtime,
        format!("Emitted runtime script ({} bytes)", script.len()),
    );

    let manifest = manifest::build_manifest(&doc, &pages, &media, &config.package)?;
    let manifest_xml = manifest.to_xml()?;
    progress.report(
        Stage::Manifest,
        format!(
            "Built manifest {} ({} items)",
            manifest.identifier,
            manifest.items.len()
        ),
    );

    let mut entries = Vec::with_capacity(pages.len() + media.files.len() + 4);
    entries.push(PackageEntry::text(naming::MANIFEST_PATH, manifest_xml));
    entries.push(PackageEntry::text(
        naming::INDEX_PATH,
        render::render_index(&doc, &config.runtime),
    ));
    for page in pages {
        entries.push(PackageEntry::text(page.path, page.html));
    }
    entries.push(PackageEntry::text(naming::SCRIPT_PATH, script));
    entries.push(PackageEntry::text(
        naming::STYLESHEET_PATH,
        style::generate_stylesheet(config),
    ));
    for file in media.files {
        entries.push(PackageEntry::binary(
            file.path,
            file.data,
            config.package.compress_media,
        ));
    }

    let bytes = package::assemble(&entries)?;
    progress.report(
        Stage::Package,
        format!("Packaged {} files ({} bytes)", entries.len(), bytes.len()),
    );

    Ok(Package {
        bytes,
        files: entries.into_iter().map(|e| e.path).collect(),
        blocks: media.blocks,
        manifest,
        document: doc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::NamedAsset;
    use crate::media::fetch::OfflineFetcher;
    use crate::media::fetch::tests::MockFetcher;
    use serde_json::json;
    use std::sync::mpsc;

    fn course() -> Value {
        json!({
            "title": "Pipeline",
            "welcome": {"content": "<p>Hi</p>", "audioFile": "welcome.mp3"},
            "topics": [{
                "title": "First",
                "media": [{"id": "chart", "type": "image", "url": "https://cdn.example.com/chart.png"}]
            }],
            "assessment": {"questions": [
                {"type": "true-false", "question": "Sure?", "correctAnswer": true}
            ]}
        })
    }

    fn assets() -> AssetLibrary {
        AssetLibrary::new(vec![NamedAsset::new(
            "welcome.mp3",
            Some("audio/mpeg"),
            vec![1, 2, 3],
        )])
    }

    fn fetcher() -> MockFetcher {
        MockFetcher::new().with_response(
            "https://cdn.example.com/chart.png",
            &[0x89, b'P', b'N', b'G'],
            Some("image/png"),
        )
    }

    #[test]
    fn produces_expected_layout() {
        let package = compile(
            &course(),
            &assets(),
            &ScormConfig::default(),
            &fetcher(),
            None,
        )
        .unwrap();
        assert!(!package.bytes.is_empty());
        for expected in [
            "imsmanifest.xml",
            "index.html",
            "pages/welcome.html",
            "pages/objectives.html",
            "pages/topic-1.html",
            "pages/assessment.html",
            "scripts/navigation.js",
            "styles/main.css",
            "media/audio/audio-0001.mp3",
            "media/images/chart.png",
        ] {
            assert!(
                package.files.iter().any(|f| f == expected),
                "missing {expected}"
            );
        }
        assert_eq!(package.blocks.len(), 3);
    }

    #[test]
    fn progress_reaches_every_stage_in_order() {
        let (tx, rx) = mpsc::channel();
        compile(
            &course(),
            &assets(),
            &ScormConfig::default(),
            &fetcher(),
            Some(tx),
        )
        .unwrap();
        let percents: Vec<u8> = rx.iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![10, 40, 60, 70, 85, 100]);
    }

    #[test]
    fn dropped_receiver_does_not_fail() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        assert!(
            compile(
                &course(),
                &assets(),
                &ScormConfig::default(),
                &fetcher(),
                Some(tx),
            )
            .is_ok()
        );
    }

    #[test]
    fn missing_title_is_validation_error() {
        let err = compile(
            &json!({"topics": []}),
            &AssetLibrary::default(),
            &ScormConfig::default(),
            &OfflineFetcher,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Validation(_)));
    }

    #[test]
    fn missing_asset_aborts_without_package() {
        let (tx, rx) = mpsc::channel();
        let err = compile(
            &course(),
            &AssetLibrary::default(),
            &ScormConfig::default(),
            &fetcher(),
            Some(tx),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Media(MediaResolutionError::MissingAsset { ref filename, .. }) if filename == "welcome.mp3"
        ));
        let stages: Vec<Stage> = rx.iter().map(|e| e.stage).collect();
        assert_eq!(stages, vec![Stage::Normalize]);
    }

    #[test]
    fn invalid_config_rejected_up_front() {
        let mut config = ScormConfig::default();
        config.course.default_pass_mark = 150;
        let err = compile(
            &course(),
            &assets(),
            &config,
            &fetcher(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Config(_)));
    }

    #[test]
    fn output_is_deterministic() {
        let build = || {
            compile(
                &course(),
                &assets(),
                &ScormConfig::default(),
                &fetcher(),
                None,
            )
            .unwrap()
            .bytes
        };
        assert_eq!(build(), build());
    }
}
