//! `imsmanifest.xml` generation.
//!
//! The package has one launchable SCO (`RES-launch`, `index.html` plus the
//! runtime script and stylesheet) and one `webcontent` asset resource per
//! page holding the page fragment and the media files that page is the first
//! to use. The organization has one item per page, in document order; every
//! item launches the SCO with `?page=<id>` so an LMS can deep-link.
//!
//! Every packaged media file is listed by exactly one resource, and no
//! resource lists a file the package does not carry.

use crate::config::PackageConfig;
use crate::media::ResolvedMedia;
use crate::naming;
use crate::package::PackagingError;
use crate::render::RenderedPage;
use crate::types::{CourseDocument, PageKind};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};

pub const LAUNCH_RESOURCE: &str = "RES-launch";

const IMSCP_NS: &str = "http://www.imsproject.org/xsd/imscp_rootv1p1p2";
const ADLCP_NS: &str = "http://www.adlnet.org/xsd/adlcp_rootv1p2";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.imsproject.org/xsd/imscp_rootv1p1p2 imscp_rootv1p1p2.xsd \
     http://www.imsglobal.org/xsd/imsmd_rootv1p2p1 imsmd_rootv1p2p1.xsd \
     http://www.adlnet.org/xsd/adlcp_rootv1p2 adlcp_rootv1p2.xsd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScormType {
    Sco,
    Asset,
}

impl ScormType {
    fn as_str(self) -> &'static str {
        match self {
            ScormType::Sco => "sco",
            ScormType::Asset => "asset",
        }
    }
}

/// One `<resource>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifestEntry {
    pub id: String,
    pub href: String,
    pub scorm_type: ScormType,
    /// Package paths listed as `<file>`; the first is `href`.
    pub files: Vec<String>,
    /// Identifiers of resources this one depends on.
    pub dependencies: Vec<String>,
}

/// One organization `<item>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub title: String,
    pub resource: String,
    pub parameters: String,
    pub mastery_score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub identifier: String,
    pub title: String,
    pub items: Vec<ManifestItem>,
    pub resources: Vec<PackageManifestEntry>,
}

/// `<prefix>-<title slug>-<first 8 hex digits of the title's SHA-256>`.
///
/// Derived from the title only, so regenerating a course keeps its identity.
pub fn manifest_identifier(prefix: &str, title: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(title.as_bytes()));
    let prefix = naming::slugify(prefix);
    let slug: String = naming::slugify(title).chars().take(40).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("{prefix}-{}", &digest[..8])
    } else {
        format!("{prefix}-{slug}-{}", &digest[..8])
    }
}

fn resource_id(page: &RenderedPage) -> String {
    format!("RES-{}", page.id)
}

/// Build the manifest from the rendered pages.
///
/// Fails when a page uses a media path that was not resolved, or when a
/// resolved media file is used by no page.
pub fn build_manifest(
    doc: &CourseDocument,
    pages: &[RenderedPage],
    media: &ResolvedMedia,
    config: &PackageConfig,
) -> Result<Manifest, PackagingError> {
    let packaged: BTreeSet<&str> = media.files.iter().map(|f| f.path.as_str()).collect();
    let mut owner: HashMap<&str, &str> = HashMap::new();
    let mut missing = Vec::new();

    let mut resources = Vec::with_capacity(pages.len() + 1);
    resources.push(PackageManifestEntry {
        id: LAUNCH_RESOURCE.to_string(),
        href: naming::INDEX_PATH.to_string(),
        scorm_type: ScormType::Sco,
        files: vec![
            naming::INDEX_PATH.to_string(),
            naming::SCRIPT_PATH.to_string(),
            naming::STYLESHEET_PATH.to_string(),
        ],
        dependencies: pages.iter().map(resource_id).collect(),
    });

    for page in pages {
        let mut files = vec![page.path.clone()];
        for path in &page.media {
            if !packaged.contains(path.as_str()) {
                missing.push(path.clone());
                continue;
            }
            if !owner.contains_key(path.as_str()) {
                owner.insert(path.as_str(), page.id.as_str());
                files.push(path.clone());
            }
        }
        resources.push(PackageManifestEntry {
            id: resource_id(page),
            href: page.path.clone(),
            scorm_type: ScormType::Asset,
            files,
            dependencies: Vec::new(),
        });
    }

    let orphaned: Vec<String> = packaged
        .iter()
        .filter(|p| !owner.contains_key(*p))
        .map(|p| p.to_string())
        .collect();
    if !missing.is_empty() || !orphaned.is_empty() {
        return Err(PackagingError::Inconsistent { missing, orphaned });
    }

    let items = pages
        .iter()
        .map(|page| ManifestItem {
            id: format!("ITEM-{}", page.id),
            title: page.title.clone(),
            resource: LAUNCH_RESOURCE.to_string(),
            parameters: format!("?page={}", page.id),
            mastery_score: (page.kind == PageKind::Assessment
                && !doc.assessment.questions.is_empty())
            .then_some(doc.assessment.pass_mark),
        })
        .collect();

    let manifest = Manifest {
        identifier: manifest_identifier(&config.identifier_prefix, &doc.title),
        title: doc.title.clone(),
        items,
        resources,
    };
    tracing::debug!(
        identifier = %manifest.identifier,
        resources = manifest.resources.len(),
        "Built manifest"
    );
    Ok(manifest)
}

impl Manifest {
    /// Every file listed by any resource.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.resources
            .iter()
            .flat_map(|r| r.files.iter().map(String::as_str))
    }

    /// Listed files under `media/`.
    pub fn media_files(&self) -> Vec<&str> {
        self.files().filter(|f| f.starts_with("media/")).collect()
    }

    pub fn to_xml(&self) -> Result<String, PackagingError> {
        let mut out = XmlOut {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        };
        out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let org_id = format!("{}-org", self.identifier);
        let mut root = BytesStart::new("manifest");
        root.push_attribute(("identifier", self.identifier.as_str()));
        root.push_attribute(("version", "1.0"));
        root.push_attribute(("xmlns", IMSCP_NS));
        root.push_attribute(("xmlns:adlcp", ADLCP_NS));
        root.push_attribute(("xmlns:xsi", XSI_NS));
        root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
        out.event(Event::Start(root))?;

        out.event(Event::Start(BytesStart::new("metadata")))?;
        out.text_element("schema", "ADL SCORM")?;
        out.text_element("schemaversion", "1.2")?;
        out.end("metadata")?;

        let mut orgs = BytesStart::new("organizations");
        orgs.push_attribute(("default", org_id.as_str()));
        out.event(Event::Start(orgs))?;
        let mut org = BytesStart::new("organization");
        org.push_attribute(("identifier", org_id.as_str()));
        out.event(Event::Start(org))?;
        out.text_element("title", &self.title)?;
        for item in &self.items {
            let mut el = BytesStart::new("item");
            el.push_attribute(("identifier", item.id.as_str()));
            el.push_attribute(("identifierref", item.resource.as_str()));
            el.push_attribute(("isvisible", "true"));
            el.push_attribute(("parameters", item.parameters.as_str()));
            out.event(Event::Start(el))?;
            out.text_element("title", &item.title)?;
            if let Some(score) = item.mastery_score {
                out.text_element("adlcp:masteryscore", &score.to_string())?;
            }
            out.end("item")?;
        }
        out.end("organization")?;
        out.end("organizations")?;

        out.event(Event::Start(BytesStart::new("resources")))?;
        for resource in &self.resources {
            let mut el = BytesStart::new("resource");
            el.push_attribute(("identifier", resource.id.as_str()));
            el.push_attribute(("type", "webcontent"));
            el.push_attribute(("adlcp:scormtype", resource.scorm_type.as_str()));
            el.push_attribute(("href", resource.href.as_str()));
            out.event(Event::Start(el))?;
            for file in &resource.files {
                let mut f = BytesStart::new("file");
                f.push_attribute(("href", file.as_str()));
                out.event(Event::Empty(f))?;
            }
            for dependency in &resource.dependencies {
                let mut d = BytesStart::new("dependency");
                d.push_attribute(("identifierref", dependency.as_str()));
                out.event(Event::Empty(d))?;
            }
            out.end("resource")?;
        }
        out.end("resources")?;
        out.end("manifest")?;

        String::from_utf8(out.writer.into_inner())
            .map_err(|e| PackagingError::Manifest(e.to_string()))
    }
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn event(&mut self, event: Event<'_>) -> Result<(), PackagingError> {
        self.writer
            .write_event(event)
            .map_err(|e| PackagingError::Manifest(e.to_string()))
    }

    fn end(&mut self, name: &str) -> Result<(), PackagingError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), PackagingError> {
        self.event(Event::Start(BytesStart::new(name)))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CourseConfig;
    use crate::media::MediaFile;
    use crate::normalize::normalize;
    use serde_json::json;

    fn doc() -> CourseDocument {
        normalize(
            &json!({
                "title": "Fire & Safety",
                "topics": [{"title": "One"}, {"title": "Two"}],
                "assessment": {"passMark": 70, "questions": [
                    {"type": "true-false", "question": "Ok?", "correctAnswer": true}
                ]}
            }),
            &CourseConfig::default(),
        )
        .unwrap()
    }

    fn rendered(doc: &CourseDocument, media: &[(&str, &[&str])]) -> Vec<RenderedPage> {
        doc.pages()
            .map(|p| {
                let id = p.id();
                let used = media
                    .iter()
                    .find(|(page, _)| *page == id)
                    .map(|(_, paths)| paths.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default();
                RenderedPage {
                    kind: p.kind,
                    path: naming::page_path(p.kind),
                    title: p.title.clone(),
                    id,
                    html: "<article></article>".to_string(),
                    media: used,
                }
            })
            .collect()
    }

    fn resolved(paths: &[&str]) -> ResolvedMedia {
        ResolvedMedia {
            files: paths
                .iter()
                .map(|p| MediaFile {
                    path: p.to_string(),
                    mime_type: "application/octet-stream".to_string(),
                    data: vec![1],
                })
                .collect(),
            ..ResolvedMedia::default()
        }
    }

    #[test]
    fn identifier_is_stable_and_slugged() {
        let a = manifest_identifier("course", "Fire & Safety");
        assert_eq!(a, manifest_identifier("course", "Fire & Safety"));
        assert!(a.starts_with("course-fire-safety-"));
        assert_eq!(a.len(), "course-fire-safety-".len() + 8);
        assert_ne!(a, manifest_identifier("course", "Fire Safety 2"));
    }

    #[test]
    fn one_item_per_page_in_order() {
        let doc = doc();
        let pages = rendered(&doc, &[]);
        let manifest =
            build_manifest(&doc, &pages, &ResolvedMedia::default(), &PackageConfig::default())
                .unwrap();
        let ids: Vec<&str> = manifest.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "ITEM-welcome",
                "ITEM-objectives",
                "ITEM-topic-1",
                "ITEM-topic-2",
                "ITEM-assessment"
            ]
        );
        assert_eq!(manifest.items[4].mastery_score, Some(70));
        assert_eq!(manifest.items[0].mastery_score, None);
        assert_eq!(manifest.items[2].parameters, "?page=topic-1");
    }

    #[test]
    fn shared_media_listed_once() {
        let doc = doc();
        let pages = rendered(
            &doc,
            &[
                ("topic-1", &["media/images/a.png", "media/audio/audio-0003.mp3"]),
                ("topic-2", &["media/images/a.png"]),
            ],
        );
        let media = resolved(&["media/images/a.png", "media/audio/audio-0003.mp3"]);
        let manifest = build_manifest(&doc, &pages, &media, &PackageConfig::default()).unwrap();
        let mut listed = manifest.media_files();
        listed.sort_unstable();
        assert_eq!(
            listed,
            vec!["media/audio/audio-0003.mp3", "media/images/a.png"]
        );
        let topic_one = manifest
            .resources
            .iter()
            .find(|r| r.id == "RES-topic-1")
            .unwrap();
        assert_eq!(topic_one.files.len(), 3);
    }

    #[test]
    fn orphaned_media_rejected() {
        let doc = doc();
        let pages = rendered(&doc, &[]);
        let media = resolved(&["media/images/unused.png"]);
        let err = build_manifest(&doc, &pages, &media, &PackageConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PackagingError::Inconsistent { ref orphaned, .. } if orphaned == &vec!["media/images/unused.png".to_string()]
        ));
    }

    #[test]
    fn unpackaged_reference_rejected() {
        let doc = doc();
        let pages = rendered(&doc, &[("topic-1", &["media/images/ghost.png"])]);
        let err = build_manifest(&doc, &pages, &ResolvedMedia::default(), &PackageConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PackagingError::Inconsistent { ref missing, .. } if missing.len() == 1
        ));
    }

    #[test]
    fn xml_declares_scorm_1_2() {
        let doc = doc();
        let pages = rendered(&doc, &[]);
        let manifest =
            build_manifest(&doc, &pages, &ResolvedMedia::default(), &PackageConfig::default())
                .unwrap();
        let xml = manifest.to_xml().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<schemaversion>1.2</schemaversion>"));
        assert!(xml.contains("<title>Fire &amp; Safety</title>"));
        assert!(xml.contains(r#"adlcp:scormtype="sco" href="index.html""#));
        assert!(xml.contains("<adlcp:masteryscore>70</adlcp:masteryscore>"));
        assert!(xml.contains(r#"<dependency identifierref="RES-assessment"/>"#));
        assert!(xml.contains(r#"<file href="scripts/navigation.js"/>"#));
        assert!(!xml.contains("adlcp_v1p3"));
    }
}
