//! Media resolution.
//!
//! Binds every media reference in a normalized course to a packaged file or a
//! YouTube embed, assigns block numbers, and produces the media files the
//! package will carry.
//!
//! ## Algorithm
//!
//! 1. Block numbers are assigned up front for every narrated page, whether or
//!    not it has audio (see [`naming`](crate::naming)).
//! 2. A load job is built per narration track, caption track and packaged
//!    media reference, in document order. YouTube references get no job: only
//!    their embed URL and clip timing are kept.
//! 3. Jobs load in parallel on a bounded rayon pool (named assets are looked
//!    up in the [`AssetLibrary`], remote URLs go through a [`MediaFetcher`]).
//!    Results are collected in job order, so the first error reported and all
//!    assigned filenames are independent of completion order.
//! 4. Payloads are content-addressed by SHA-256. A payload already packaged
//!    under another name is reused instead of written twice; filenames stay
//!    page-semantic.
//!
//! A missing named asset aborts the run with [`MediaResolutionError::MissingAsset`]
//! naming the file and the page that declared it.

pub mod clip;
pub mod fetch;

use crate::naming::{self, BlockAssignment, BlockNumber};
use crate::types::{CourseDocument, MediaKind, MediaSource, PageKind};
use clip::ClipRange;
use fetch::{FetchError, MediaFetcher};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaResolutionError {
    #[error("media file {filename:?} referenced by page {page} was not supplied")]
    MissingAsset { filename: String, page: String },
    #[error("could not fetch media {id} from {url}: {source}")]
    Fetch {
        id: String,
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("media id {id:?} is used for two different sources")]
    ConflictingId { id: String },
    #[error("could not start asset loader: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A binary asset supplied alongside the course document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedAsset {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

impl NamedAsset {
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.map(str::to_string),
            data,
        }
    }
}

/// Unordered collection of named assets.
///
/// Lookups try the exact name, then the name without a leading `media/`,
/// then the bare file name.
#[derive(Debug, Default)]
pub struct AssetLibrary {
    assets: Vec<NamedAsset>,
    by_name: HashMap<String, usize>,
    by_base: HashMap<String, usize>,
}

fn clean_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    let name = name.trim_start_matches("./");
    name.strip_prefix("media/").unwrap_or(name).to_string()
}

impl AssetLibrary {
    pub fn new(assets: Vec<NamedAsset>) -> Self {
        let mut library = Self::default();
        for asset in assets {
            library.insert(asset);
        }
        library
    }

    pub fn insert(&mut self, asset: NamedAsset) {
        let index = self.assets.len();
        let name = clean_name(&asset.name);
        self.by_base
            .entry(naming::base_name(&name).to_string())
            .or_insert(index);
        self.by_name.insert(name, index);
        self.assets.push(asset);
    }

    pub fn get(&self, name: &str) -> Option<&NamedAsset> {
        let name = clean_name(name);
        self.by_name
            .get(&name)
            .or_else(|| self.by_base.get(naming::base_name(&name)))
            .map(|&i| &self.assets[i])
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// What a logical media id resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAsset {
    /// A file in the package.
    Packaged {
        path: String,
        mime_type: String,
        /// SHA-256 of the payload, hex.
        digest: String,
    },
    /// A YouTube embed; nothing is packaged.
    Embed { embed_url: String, clip: ClipRange },
}

impl ResolvedAsset {
    pub fn packaged_path(&self) -> Option<&str> {
        match self {
            ResolvedAsset::Packaged { path, .. } => Some(path),
            ResolvedAsset::Embed { .. } => None,
        }
    }
}

/// A media file destined for the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Narration slot of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNarration {
    /// `None` only for the assessment page.
    pub block: Option<BlockNumber>,
    pub audio: Option<String>,
    pub captions: Option<String>,
}

/// Output of [`resolve`]. Lives for one generation run.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMedia {
    /// Logical id (media id, or narration/caption id) → resolution.
    pub assets: BTreeMap<String, ResolvedAsset>,
    pub blocks: Vec<BlockAssignment>,
    /// Page id → narration slot. Every page has an entry.
    pub narration: BTreeMap<String, PageNarration>,
    /// Unique packaged files, in first-use document order.
    pub files: Vec<MediaFile>,
}

impl ResolvedMedia {
    pub fn get(&self, id: &str) -> Option<&ResolvedAsset> {
        self.assets.get(id)
    }

    pub fn narration_for(&self, kind: PageKind) -> Option<&PageNarration> {
        self.narration.get(&kind.page_id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Narration,
    Captions,
    Media(MediaKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JobSource {
    Asset(String),
    Remote(String),
}

#[derive(Debug)]
struct Job {
    id: String,
    page: PageKind,
    role: Role,
    source: JobSource,
}

struct Loaded<'a> {
    data: Cow<'a, [u8]>,
    mime_type: Option<String>,
    /// Name the extension is derived from.
    name: String,
}

/// Resolve every media reference of `doc`.
///
/// `threads` bounds how many assets load at once.
pub fn resolve(
    doc: &CourseDocument,
    library: &AssetLibrary,
    fetcher: &dyn MediaFetcher,
    threads: usize,
) -> Result<ResolvedMedia, MediaResolutionError> {
    let blocks = naming::assign_block_numbers(doc);
    let plan = plan_jobs(doc)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()?;
    let loaded: Vec<Result<Loaded, MediaResolutionError>> = pool.install(|| {
        plan.jobs
            .par_iter()
            .map(|job| load(job, library, fetcher))
            .collect()
    });

    let mut resolved = ResolvedMedia {
        blocks,
        assets: plan.embeds.into_iter().collect(),
        ..ResolvedMedia::default()
    };

    let loaded = loaded.into_iter().collect::<Result<Vec<_>, _>>()?;

    // Block-numbered files claim their names before any page media does.
    let mut placement: Vec<(&Job, Loaded)> = plan.jobs.iter().zip(loaded).collect();
    placement.sort_by_key(|(job, _)| matches!(job.role, Role::Media(_)));

    let mut content_index: HashMap<String, String> = HashMap::new();
    let mut used_paths: HashSet<String> = HashSet::new();
    for (job, loaded) in placement {
        let digest = format!("{:x}", Sha256::digest(&loaded.data));
        let ext = naming::extension_of(&loaded.name)
            .or_else(|| {
                loaded
                    .mime_type
                    .as_deref()
                    .and_then(naming::extension_for_mime)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| default_extension(job.role).to_string());
        let mime_type = loaded
            .mime_type
            .clone()
            .or_else(|| naming::mime_for_extension(&ext).map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let path = match content_index.get(&digest) {
            Some(existing) => {
                tracing::debug!(id = %job.id, path = %existing, "Reusing identical payload");
                existing.clone()
            }
            None => {
                let path = unique_path(target_path(job, &ext), &mut used_paths);
                content_index.insert(digest.clone(), path.clone());
                tracing::debug!(id = %job.id, path = %path, bytes = loaded.data.len(), "Packaging media");
                resolved.files.push(MediaFile {
                    path: path.clone(),
                    mime_type: mime_type.clone(),
                    data: loaded.data.into_owned(),
                });
                path
            }
        };
        resolved.assets.insert(
            job.id.clone(),
            ResolvedAsset::Packaged {
                path,
                mime_type,
                digest,
            },
        );
    }

    for page in doc.pages() {
        let packaged = |id: String| {
            resolved
                .assets
                .get(&id)
                .and_then(ResolvedAsset::packaged_path)
                .map(str::to_string)
        };
        let slot = PageNarration {
            block: BlockNumber::for_page(page.kind),
            audio: page
                .audio
                .as_ref()
                .and_then(|_| packaged(naming::narration_asset_id(page.kind))),
            captions: page
                .captions
                .as_ref()
                .and_then(|_| packaged(naming::caption_asset_id(page.kind))),
        };
        resolved.narration.insert(page.id(), slot);
    }

    tracing::info!(
        files = resolved.files.len(),
        references = resolved.assets.len(),
        blocks = resolved.blocks.len(),
        "Resolved media"
    );
    Ok(resolved)
}

struct JobPlan {
    jobs: Vec<Job>,
    embeds: Vec<(String, ResolvedAsset)>,
}

/// Build load jobs in document order: per page, narration, captions, then
/// page media.
fn plan_jobs(doc: &CourseDocument) -> Result<JobPlan, MediaResolutionError> {
    let mut plan = JobPlan {
        jobs: Vec::new(),
        embeds: Vec::new(),
    };
    let mut seen: HashMap<String, (MediaKind, MediaSource)> = HashMap::new();

    for page in doc.pages() {
        if let Some(name) = &page.audio {
            plan.jobs.push(Job {
                id: naming::narration_asset_id(page.kind),
                page: page.kind,
                role: Role::Narration,
                source: JobSource::Asset(name.clone()),
            });
        }
        if let Some(name) = &page.captions {
            plan.jobs.push(Job {
                id: naming::caption_asset_id(page.kind),
                page: page.kind,
                role: Role::Captions,
                source: JobSource::Asset(name.clone()),
            });
        }
        for media in &page.media {
            match seen.get(&media.id) {
                Some((kind, source)) if *kind == media.kind && *source == media.source => continue,
                Some(_) => {
                    return Err(MediaResolutionError::ConflictingId {
                        id: media.id.clone(),
                    });
                }
                None => {
                    seen.insert(media.id.clone(), (media.kind, media.source.clone()));
                }
            }
            let source = match &media.source {
                MediaSource::YouTube { embed_url } => {
                    let clip = clip::resolve_clip(media.clip_start, media.clip_end, embed_url);
                    plan.embeds.push((
                        media.id.clone(),
                        ResolvedAsset::Embed {
                            embed_url: embed_url.clone(),
                            clip,
                        },
                    ));
                    continue;
                }
                MediaSource::Asset(name) => JobSource::Asset(name.clone()),
                MediaSource::Remote(url) => JobSource::Remote(url.clone()),
            };
            plan.jobs.push(Job {
                id: media.id.clone(),
                page: page.kind,
                role: Role::Media(media.kind),
                source,
            });
        }
    }
    Ok(plan)
}

fn load<'a>(
    job: &Job,
    library: &'a AssetLibrary,
    fetcher: &dyn MediaFetcher,
) -> Result<Loaded<'a>, MediaResolutionError> {
    match &job.source {
        JobSource::Asset(name) => {
            let asset = library
                .get(name)
                .ok_or_else(|| MediaResolutionError::MissingAsset {
                    filename: name.clone(),
                    page: job.page.page_id(),
                })?;
            Ok(Loaded {
                data: Cow::Borrowed(&asset.data),
                mime_type: asset.mime_type.clone(),
                name: asset.name.clone(),
            })
        }
        JobSource::Remote(url) => match fetcher.fetch(url) {
            Ok(fetched) => Ok(Loaded {
                data: Cow::Owned(fetched.data),
                mime_type: fetched.mime_type,
                name: url.clone(),
            }),
            Err(err) => {
                // A supplied asset with the URL's file name stands in for an
                // unreachable remote.
                let path = url.split(['?', '#']).next().unwrap_or(url);
                match library.get(naming::base_name(path)) {
                    Some(asset) => {
                        tracing::warn!(
                            id = %job.id,
                            url = %url,
                            error = %err,
                            asset = %asset.name,
                            "Remote fetch failed, using supplied asset"
                        );
                        Ok(Loaded {
                            data: Cow::Borrowed(&asset.data),
                            mime_type: asset.mime_type.clone(),
                            name: asset.name.clone(),
                        })
                    }
                    None => Err(MediaResolutionError::Fetch {
                        id: job.id.clone(),
                        url: url.clone(),
                        source: err,
                    }),
                }
            }
        },
    }
}

fn default_extension(role: Role) -> &'static str {
    match role {
        Role::Narration => "mp3",
        Role::Captions => "vtt",
        Role::Media(MediaKind::Image) => "jpg",
        Role::Media(MediaKind::Audio) => "mp3",
        Role::Media(MediaKind::Video | MediaKind::YouTube) => "mp4",
    }
}

fn target_path(job: &Job, ext: &str) -> String {
    match job.role {
        Role::Narration => naming::narration_audio_path(job.page, ext),
        Role::Captions => naming::caption_path(job.page, ext),
        Role::Media(kind) => naming::media_path(kind, &job.id, ext).unwrap_or_else(|| {
            format!("{}/{}.{ext}", naming::VIDEO_DIR, naming::slugify(&job.id))
        }),
    }
}

/// Two distinct payloads whose ids slug to the same name get `-2`, `-3`, ...
fn unique_path(path: String, used: &mut HashSet<String>) -> String {
    if used.insert(path.clone()) {
        return path;
    }
    let (stem, ext) = match path.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
        None => (path.clone(), String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}{ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
