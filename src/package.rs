//! Archive assembly and inspection.
//!
//! [`assemble`] writes the package entries into an in-memory zip, then reopens
//! the result and runs the same checks [`inspect`] applies to any archive:
//! the buffer must be a readable, non-empty zip whose entry count matches what
//! was written, and the manifest must agree with the `media/` tree.
//!
//! Text entries are deflated. Media entries are stored unless
//! `package.compress_media` is set; audio, video and images are already
//! compressed.

use crate::naming;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("package archive is empty")]
    EmptyArchive,
    #[error("entry path {path:?} is not a relative path inside the package")]
    InvalidPath { path: String },
    #[error("entry path {path:?} is written twice")]
    DuplicatePath { path: String },
    #[error("manifest and package disagree (missing from package: {missing:?}, not in manifest: {orphaned:?})")]
    Inconsistent {
        missing: Vec<String>,
        orphaned: Vec<String>,
    },
    #[error("manifest error: {0}")]
    Manifest(String),
}

/// A file to place in the archive.
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub path: String,
    pub data: Vec<u8>,
    pub compress: bool,
}

impl PackageEntry {
    pub fn text(path: impl Into<String>, text: String) -> Self {
        Self {
            path: path.into(),
            data: text.into_bytes(),
            compress: true,
        }
    }

    pub fn binary(path: impl Into<String>, data: Vec<u8>, compress: bool) -> Self {
        Self {
            path: path.into(),
            data,
            compress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub path: String,
    pub size: u64,
    pub compressed_size: u64,
}

/// What [`inspect`] found in an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageReport {
    pub entries: Vec<EntryInfo>,
    pub identifier: String,
    pub title: String,
    pub schema_version: String,
    pub items: usize,
    /// Every `<file href>` in the manifest, in order of appearance.
    pub manifest_files: Vec<String>,
}

impl PackageReport {
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    pub fn media_entries(&self) -> impl Iterator<Item = &EntryInfo> {
        self.entries.iter().filter(|e| e.path.starts_with("media/"))
    }
}

/// Reject absolute paths, `..` and anything else that could escape the
/// extraction directory.
pub fn validate_entry_path(path: &str) -> Result<(), PackagingError> {
    let invalid = || PackagingError::InvalidPath {
        path: path.to_string(),
    };
    if path.is_empty() || path.contains('\\') || path.contains(':') || path.starts_with('/') {
        return Err(invalid());
    }
    if !Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(invalid());
    }
    Ok(())
}

fn entry_options(compress: bool) -> SimpleFileOptions {
    let method = if compress {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::default())
}

/// Write `entries` into a zip buffer and verify the result.
pub fn assemble(entries: &[PackageEntry]) -> Result<Vec<u8>, PackagingError> {
    if entries.is_empty() {
        return Err(PackagingError::EmptyArchive);
    }
    let mut seen = HashSet::new();
    for entry in entries {
        validate_entry_path(&entry.path)?;
        if !seen.insert(entry.path.as_str()) {
            return Err(PackagingError::DuplicatePath {
                path: entry.path.clone(),
            });
        }
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        zip.start_file(entry.path.as_str(), entry_options(entry.compress))?;
        zip.write_all(&entry.data)?;
    }
    let bytes = zip.finish()?.into_inner();

    let report = inspect(&bytes)?;
    if report.entries.len() != entries.len() {
        return Err(PackagingError::Manifest(format!(
            "archive holds {} entries, {} were written",
            report.entries.len(),
            entries.len()
        )));
    }
    tracing::info!(
        entries = entries.len(),
        bytes = bytes.len(),
        "Assembled package"
    );
    Ok(bytes)
}

/// Open an archive, read its manifest and check it against the entries.
pub fn inspect(bytes: &[u8]) -> Result<PackageReport, PackagingError> {
    if bytes.is_empty() {
        return Err(PackagingError::EmptyArchive);
    }
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    if archive.len() == 0 {
        return Err(PackagingError::EmptyArchive);
    }

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        validate_entry_path(file.name())?;
        entries.push(EntryInfo {
            path: file.name().to_string(),
            size: file.size(),
            compressed_size: file.compressed_size(),
        });
    }

    let mut xml = String::new();
    archive
        .by_name(naming::MANIFEST_PATH)?
        .read_to_string(&mut xml)?;

    let mut report = parse_manifest(&xml)?;
    report.entries = entries;
    verify_consistency(&report)?;
    Ok(report)
}

fn xml_err(e: impl std::fmt::Display) -> PackagingError {
    PackagingError::Manifest(e.to_string())
}

fn parse_manifest(xml: &str) -> Result<PackageReport, PackagingError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut report = PackageReport::default();
    let mut current = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name().as_ref().to_vec();
                for attr in e.attributes() {
                    let attr = attr.map_err(xml_err)?;
                    let key = attr.key.as_ref();
                    match (name.as_slice(), key) {
                        (b"manifest", b"identifier") => {
                            report.identifier =
                                attr.unescape_value().map_err(xml_err)?.into_owned();
                        }
                        (b"file", b"href") => {
                            report
                                .manifest_files
                                .push(attr.unescape_value().map_err(xml_err)?.into_owned());
                        }
                        _ => {}
                    }
                }
                if name == b"item" {
                    report.items += 1;
                }
                current = name;
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(xml_err)?;
                match current.as_slice() {
                    b"schemaversion" => report.schema_version = text.into_owned(),
                    b"title" if report.title.is_empty() => report.title = text.into_owned(),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current.clear(),
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
    }
    if report.identifier.is_empty() {
        return Err(PackagingError::Manifest(
            "manifest has no identifier".to_string(),
        ));
    }
    Ok(report)
}

/// The manifest lists exactly the files under `media/`, each once, and every
/// file it lists is in the archive.
pub fn verify_consistency(report: &PackageReport) -> Result<(), PackagingError> {
    let present: BTreeSet<&str> = report.entries.iter().map(|e| e.path.as_str()).collect();

    let mut listed: BTreeMap<&str, usize> = BTreeMap::new();
    for file in &report.manifest_files {
        *listed.entry(file.as_str()).or_default() += 1;
    }
    if let Some((path, _)) = listed
        .iter()
        .find(|(path, count)| path.starts_with("media/") && **count > 1)
    {
        return Err(PackagingError::Manifest(format!(
            "{path} is listed by more than one resource"
        )));
    }

    let mut missing: Vec<String> = listed
        .keys()
        .filter(|path| !present.contains(*path))
        .map(|path| path.to_string())
        .collect();
    for required in [
        naming::INDEX_PATH,
        naming::SCRIPT_PATH,
        naming::STYLESHEET_PATH,
    ] {
        if !present.contains(required) && !missing.iter().any(|m| m == required) {
            missing.push(required.to_string());
        }
    }
    let orphaned: Vec<String> = present
        .iter()
        .filter(|path| path.starts_with("media/") && !listed.contains_key(*path))
        .map(|path| path.to_string())
        .collect();

    if missing.is_empty() && orphaned.is_empty() {
        Ok(())
    } else {
        Err(PackagingError::Inconsistent { missing, orphaned })
    }
}
