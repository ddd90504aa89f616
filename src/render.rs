//! HTML rendering.
//!
//! Every logical page becomes a fragment under `pages/`. The launch page
//! (`index.html`) fetches fragments and injects them into its content region,
//! so all URLs inside a fragment are relative to the package root.
//!
//! ## Fragments
//!
//! - **Welcome**: content plus the start control
//! - **Objectives**: content plus the objective list
//! - **Topic**: content, media and, when present, the knowledge-check scaffold
//! - **Assessment**: the question list, submit control and result region
//!
//! Every page gets its narration player (with caption track) when the media
//! resolver bound an audio file, and a collapsible transcript when narration
//! text was authored.
//!
//! Question scaffolds carry prompts and option values only. Correct answers
//! and feedback live in the runtime script's `COURSE` table.
//!
//! Templates are [maud](https://maud.lambda.xyz/) functions over the
//! normalized model; authored page HTML is the only unescaped content.

use crate::config::RuntimeConfig;
use crate::media::clip::clipped_embed_url;
use crate::media::{ResolvedAsset, ResolvedMedia};
use crate::naming::{self, BlockNumber};
use crate::runtime::selectors::SELECTORS;
use crate::types::{AssessmentPage, CourseDocument, MediaKind, MediaReference, Page, PageKind, Question};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use thiserror::Error;

const DEFAULT_START_TEXT: &str = "Start Course";

/// Content-Security-Policy of the launch page. Pages embed YouTube and the
/// LMS frames the package from its own origin.
const CONTENT_SECURITY_POLICY: &[&str] = &[
    "default-src 'self'",
    "script-src 'self' 'unsafe-inline'",
    "style-src 'self' 'unsafe-inline'",
    "img-src 'self' data: https: blob:",
    "media-src 'self' blob: https:",
    "connect-src 'self'",
    "font-src 'self' data:",
    "frame-src 'self' https://www.youtube.com https://youtube.com https://www.youtube-nocookie.com",
    "object-src 'none'",
    "base-uri 'self'",
    "frame-ancestors *",
];

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("page {page}: {reason}")]
    Template { page: String, reason: String },
    #[error("page {page} references media {id:?} that was not resolved")]
    MissingMedia { page: String, id: String },
    #[error("page {page} rendered to an empty document")]
    EmptyPage { page: String },
    #[error("runtime script: {0}")]
    Script(String),
}

/// One rendered fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub kind: PageKind,
    pub id: String,
    pub title: String,
    /// Archive path, `pages/<id>.html`.
    pub path: String,
    pub html: String,
    /// Packaged media paths the fragment references, in order of first use.
    pub media: Vec<String>,
}

/// Render every page in document order.
pub fn render_pages(
    doc: &CourseDocument,
    media: &ResolvedMedia,
) -> Result<Vec<RenderedPage>, GenerationError> {
    let mut pages = Vec::with_capacity(doc.page_count());
    for page in doc.narrated_pages() {
        pages.push(render_page(page, None, media)?);
    }
    pages.push(render_page(
        &doc.assessment.page,
        Some(&doc.assessment),
        media,
    )?);
    tracing::info!(pages = pages.len(), "Rendered pages");
    Ok(pages)
}

fn render_page(
    page: &Page,
    assessment: Option<&AssessmentPage>,
    media: &ResolvedMedia,
) -> Result<RenderedPage, GenerationError> {
    let id = page.id();
    let mut used = Vec::new();

    let narration = narration_player(page, media, &mut used);
    let mut figures = Vec::with_capacity(page.media.len());
    for reference in &page.media {
        figures.push(media_figure(&id, reference, media, &mut used)?);
    }
    let check = match &page.knowledge_check {
        Some(kc) if !kc.questions.is_empty() => Some(knowledge_check(&id, &kc.questions)?),
        Some(_) => {
            return Err(GenerationError::Template {
                page: id,
                reason: "knowledge check has no questions".to_string(),
            });
        }
        None => None,
    };
    let assessment_section = assessment.map(assessment_body).transpose()?;
    let block = BlockNumber::for_page(page.kind).map(|b| b.to_string());

    let markup = html! {
        article class={ (SELECTORS.page) " page-" (page.kind.label()) }
            data-page-id=(id) data-block=[block.as_deref()] {
            h2.page-title { (page.title) }
            (narration)
            @if !page.content.trim().is_empty() {
                div.page-content { (PreEscaped(&page.content)) }
            }
            @if !page.objectives.is_empty() {
                ul.objective-list {
                    @for objective in &page.objectives {
                        li { (objective) }
                    }
                }
            }
            @for figure in &figures {
                (figure)
            }
            @if let Some(check) = &check {
                (check)
            }
            @if let Some(section) = &assessment_section {
                (section)
            }
            @if page.kind == PageKind::Welcome {
                button class=(SELECTORS.start_button) type="button" {
                    (page.start_button_text.as_deref().unwrap_or(DEFAULT_START_TEXT))
                }
            }
        }
    };

    let html = markup.into_string();
    if html.trim().is_empty() {
        return Err(GenerationError::EmptyPage { page: id });
    }
    tracing::debug!(page = %id, media = used.len(), "Rendered page");
    Ok(RenderedPage {
        kind: page.kind,
        path: naming::page_path(page.kind),
        title: page.title.clone(),
        id,
        html,
        media: used,
    })
}

fn claim(used: &mut Vec<String>, path: &str) {
    if !used.iter().any(|p| p == path) {
        used.push(path.to_string());
    }
}

/// Narration audio with its caption track, followed by the transcript.
fn narration_player(page: &Page, media: &ResolvedMedia, used: &mut Vec<String>) -> Markup {
    let slot = media.narration_for(page.kind);
    let audio = slot.and_then(|s| s.audio.as_deref());
    let captions = slot.and_then(|s| s.captions.as_deref());
    if let Some(path) = audio {
        claim(used, path);
    }
    if let Some(path) = captions {
        claim(used, path);
    }

    html! {
        @if let Some(audio) = audio {
            div.narration {
                audio id=(SELECTORS.narration_audio) preload="auto" src=(audio) {
                    @if let Some(captions) = captions {
                        track kind="captions" src=(captions) srclang="en" label="Captions" default;
                    }
                }
                button id=(SELECTORS.audio_toggle) class="audio-toggle" type="button" aria-pressed="false" {
                    "Play narration"
                }
            }
        } @else if let Some(captions) = captions {
            p.narration-captions {
                a href=(captions) download { "Download captions" }
            }
        }
        @if !page.narration.trim().is_empty() {
            details.transcript {
                summary { "Transcript" }
                p { (page.narration) }
            }
        }
    }
}

fn media_figure(
    page: &str,
    reference: &MediaReference,
    media: &ResolvedMedia,
    used: &mut Vec<String>,
) -> Result<Markup, GenerationError> {
    let resolved = media
        .get(&reference.id)
        .ok_or_else(|| GenerationError::MissingMedia {
            page: page.to_string(),
            id: reference.id.clone(),
        })?;
    if let Some(path) = resolved.packaged_path() {
        claim(used, path);
    }
    let title = reference.title.as_str();

    Ok(html! {
        figure class={ "media media-" (reference.kind.as_str()) } data-media-id=(reference.id) {
            @match resolved {
                ResolvedAsset::Embed { embed_url, clip } => {
                    div.video-frame {
                        iframe src=(clipped_embed_url(embed_url, *clip))
                            title=(if title.is_empty() { "Video" } else { title })
                            frameborder="0"
                            allow="accelerometer; encrypted-media; gyroscope; picture-in-picture"
                            allowfullscreen {}
                    }
                }
                ResolvedAsset::Packaged { path, mime_type, .. } => {
                    @match reference.kind {
                        MediaKind::Image => {
                            img src=(path) alt=(title) loading="lazy";
                        }
                        MediaKind::Audio => {
                            audio controls preload="metadata" {
                                source src=(path) type=(mime_type);
                            }
                        }
                        MediaKind::Video | MediaKind::YouTube => {
                            video controls preload="metadata" {
                                source src=(path) type=(mime_type);
                            }
                        }
                    }
                }
            }
            @if !title.is_empty() {
                figcaption { (title) }
            }
        }
    })
}

/// Radio inputs for one question. Values are what the runtime compares.
fn question_options(name: &str, question: &Question, option_class: &str) -> Markup {
    html! {
        @for (value, label) in question.choices() {
            label class=(option_class) {
                input type="radio" name=(name) value=(value);
                " "
                span.option-label { (label) }
            }
        }
    }
}

fn check_answerable(page: &str, question: &Question) -> Result<(), GenerationError> {
    let value = question.correct_value();
    if question.choices().iter().any(|(v, _)| *v == value) {
        Ok(())
    } else {
        Err(GenerationError::Template {
            page: page.to_string(),
            reason: format!("question {} has no option matching its answer", question.id),
        })
    }
}

fn knowledge_check(page: &str, questions: &[Question]) -> Result<Markup, GenerationError> {
    for question in questions {
        check_answerable(page, question)?;
    }
    Ok(html! {
        section class=(SELECTORS.knowledge_check) data-page-id=(page) {
            h3 { "Knowledge Check" }
            @for question in questions {
                fieldset class=(SELECTORS.kc_question)
                    data-question-id=(question.id)
                    data-question-type=(question.kind.as_str()) {
                    legend { (question.prompt) }
                    (question_options(&format!("kc-{page}-{}", question.id), question, SELECTORS.kc_option))
                    p class=(SELECTORS.kc_feedback) role="status" hidden {}
                }
            }
            p class=(SELECTORS.kc_warning) role="alert" hidden {}
            button class=(SELECTORS.kc_submit) type="button" { "Submit Answers" }
        }
    })
}

fn assessment_body(assessment: &AssessmentPage) -> Result<Markup, GenerationError> {
    let page = assessment.page.id();
    for question in &assessment.questions {
        check_answerable(&page, question)?;
    }
    Ok(html! {
        section.assessment {
            @if assessment.questions.is_empty() {
                p.assessment-empty { "This course has no assessment questions." }
            } @else {
                p.pass-mark { "Pass mark: " (assessment.pass_mark) "%" }
                ol.assessment-questions {
                    @for question in &assessment.questions {
                        li class=(SELECTORS.assessment_question)
                            data-question-id=(question.id)
                            data-question-type=(question.kind.as_str()) {
                            p.question-prompt { (question.prompt) }
                            (question_options(&format!("assessment-{}", question.id), question, SELECTORS.assessment_option))
                        }
                    }
                }
                button id=(SELECTORS.assessment_submit) class="assessment-submit" type="button" {
                    "Submit Assessment"
                }
            }
            div id=(SELECTORS.assessment_result) role="status" hidden {}
        }
    })
}

/// The launch page. Loads the runtime script, then starts the course.
pub fn render_index(doc: &CourseDocument, settings: &RuntimeConfig) -> String {
    let markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                meta http-equiv="Content-Security-Policy" content=(CONTENT_SECURITY_POLICY.join("; "));
                title { (doc.title) }
                link rel="stylesheet" href=(naming::STYLESHEET_PATH);
            }
            body {
                div.course-shell {
                    header.course-header {
                        h1.course-title { (doc.title) }
                        @if settings.show_progress {
                            div.progress {
                                div id=(SELECTORS.progress_bar) class="progress-bar" role="progressbar"
                                    aria-valuemin="0" aria-valuemax="100" aria-valuenow="0" {}
                            }
                        }
                    }
                    div.course-body {
                        @if settings.show_outline {
                            nav id=(SELECTORS.outline) class="course-outline" aria-label="Course outline" {
                                ol {
                                    @for (index, page) in doc.pages().enumerate() {
                                        li {
                                            a class=(SELECTORS.outline_link) href="#"
                                                data-page-index=(index) data-page-id=(page.id()) {
                                                (page.title)
                                            }
                                        }
                                    }
                                }
                            }
                        }
                        main id=(SELECTORS.content) class="content" tabindex="-1" aria-live="polite" {}
                    }
                    div id=(SELECTORS.nav_warning) class="nav-warning" role="alert" hidden {}
                    footer.footer {
                        button id=(SELECTORS.prev_button) class="nav-button" type="button" { "Back" }
                        button id=(SELECTORS.exit_button) class="nav-button exit" type="button" { "Exit Course" }
                        button id=(SELECTORS.next_button) class="nav-button" type="button" { "Next" }
                    }
                }
                script src=(naming::SCRIPT_PATH) {}
                script { (PreEscaped("window.ScormRuntime.initializeCourse();")) }
            }
        }
    };
    markup.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CourseConfig;
    use crate::media::PageNarration;
    use crate::media::clip::ClipRange;
    use crate::normalize::normalize;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> CourseDocument {
        normalize(&value, &CourseConfig::default()).unwrap()
    }

    fn sample() -> CourseDocument {
        doc(json!({
            "title": "Safety <Basics>",
            "welcomePage": {"content": "<p>Hello</p>", "startButtonText": "Begin"},
            "objectives": ["Spot hazards", "Report them"],
            "topics": [{
                "title": "Hazards",
                "content": "<p>Look around.</p>",
                "narration": "Listen closely.",
                "knowledgeCheck": [{
                    "type": "multiple-choice",
                    "question": "Which is a hazard?",
                    "options": ["Wet floor", "Dry floor"],
                    "correctAnswer": 0,
                    "correctFeedback": "Well spotted"
                }]
            }],
            "assessment": {"passMark": 70, "questions": [
                {"type": "true-false", "question": "Report hazards?", "correctAnswer": true}
            ]}
        }))
    }

    fn page<'a>(pages: &'a [RenderedPage], id: &str) -> &'a RenderedPage {
        pages.iter().find(|p| p.id == id).unwrap()
    }

    #[test]
    fn renders_one_page_per_logical_page() {
        let pages = render_pages(&sample(), &ResolvedMedia::default()).unwrap();
        let paths: Vec<&str> = pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "pages/welcome.html",
                "pages/objectives.html",
                "pages/topic-1.html",
                "pages/assessment.html"
            ]
        );
    }

    #[test]
    fn welcome_has_start_button() {
        let pages = render_pages(&sample(), &ResolvedMedia::default()).unwrap();
        let welcome = page(&pages, "welcome");
        assert!(welcome.html.contains(r#"class="start-button""#));
        assert!(welcome.html.contains("Begin"));
        assert!(welcome.html.contains("<p>Hello</p>"));
        assert!(welcome.html.contains(r#"data-block="0001""#));
    }

    #[test]
    fn objectives_listed() {
        let pages = render_pages(&sample(), &ResolvedMedia::default()).unwrap();
        let objectives = page(&pages, "objectives");
        assert!(objectives.html.contains("<li>Spot hazards</li>"));
        assert!(objectives.html.contains("<li>Report them</li>"));
    }

    #[test]
    fn knowledge_check_scaffold_has_no_answers() {
        let pages = render_pages(&sample(), &ResolvedMedia::default()).unwrap();
        let topic = page(&pages, "topic-1");
        assert!(topic.html.contains(r#"class="knowledge-check""#));
        assert!(topic.html.contains(r#"class="kc-question" data-question-id="q1""#));
        assert!(topic.html.contains(r#"name="kc-topic-1-q1" value="Wet floor""#));
        assert!(topic.html.contains(r#"class="kc-submit""#));
        assert!(!topic.html.contains("Well spotted"));
        assert!(!topic.html.contains("checked"));
    }

    #[test]
    fn transcript_rendered_without_audio_player() {
        let pages = render_pages(&sample(), &ResolvedMedia::default()).unwrap();
        let topic = page(&pages, "topic-1");
        assert!(topic.html.contains("Listen closely."));
        assert!(!topic.html.contains("narration-audio"));
    }

    #[test]
    fn narration_audio_with_caption_track() {
        let mut media = ResolvedMedia::default();
        media.narration.insert(
            "topic-1".to_string(),
            PageNarration {
                block: BlockNumber::for_topic(0),
                audio: Some("media/audio/audio-0003.mp3".to_string()),
                captions: Some("media/captions/caption-0003.vtt".to_string()),
            },
        );
        let pages = render_pages(&sample(), &media).unwrap();
        let topic = page(&pages, "topic-1");
        assert!(topic.html.contains(r#"id="narration-audio""#));
        assert!(topic.html.contains(r#"src="media/audio/audio-0003.mp3""#));
        assert!(topic.html.contains(r#"<track kind="captions" src="media/captions/caption-0003.vtt""#));
        assert!(topic.html.contains(r#"id="audio-toggle""#));
        assert_eq!(
            topic.media,
            vec![
                "media/audio/audio-0003.mp3".to_string(),
                "media/captions/caption-0003.vtt".to_string()
            ]
        );
    }

    #[test]
    fn youtube_iframe_carries_clip_range() {
        let doc = doc(json!({
            "title": "Video",
            "topics": [{"title": "Clip", "media": [{
                "id": "intro", "type": "youtube",
                "url": "https://www.youtube.com/embed/abc123"
            }]}]
        }));
        let mut media = ResolvedMedia::default();
        media.assets.insert(
            "intro".to_string(),
            ResolvedAsset::Embed {
                embed_url: "https://www.youtube.com/embed/abc123".to_string(),
                clip: ClipRange {
                    start: Some(30),
                    end: Some(60),
                },
            },
        );
        let pages = render_pages(&doc, &media).unwrap();
        let topic = page(&pages, "topic-1");
        assert!(
            topic
                .html
                .contains(r#"src="https://www.youtube.com/embed/abc123?start=30&amp;end=60""#)
        );
        assert!(topic.media.is_empty());
    }

    #[test]
    fn packaged_image_is_claimed() {
        let doc = doc(json!({
            "title": "Images",
            "topics": [{"title": "Pic", "media": [{"id": "diagram", "type": "image", "url": "diagram.png", "title": "A diagram"}]}]
        }));
        let mut media = ResolvedMedia::default();
        media.assets.insert(
            "diagram".to_string(),
            ResolvedAsset::Packaged {
                path: "media/images/diagram.png".to_string(),
                mime_type: "image/png".to_string(),
                digest: "00".to_string(),
            },
        );
        let pages = render_pages(&doc, &media).unwrap();
        let topic = page(&pages, "topic-1");
        assert!(topic.html.contains(r#"<img src="media/images/diagram.png" alt="A diagram""#));
        assert!(topic.html.contains("<figcaption>A diagram</figcaption>"));
        assert_eq!(topic.media, vec!["media/images/diagram.png".to_string()]);
    }

    #[test]
    fn unresolved_media_names_page() {
        let doc = doc(json!({
            "title": "Broken",
            "topics": [{"title": "Pic", "media": [{"id": "lost", "type": "image", "url": "lost.png"}]}]
        }));
        let err = render_pages(&doc, &ResolvedMedia::default()).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::MissingMedia { ref page, ref id } if page == "topic-1" && id == "lost"
        ));
    }

    #[test]
    fn assessment_page_lists_questions() {
        let pages = render_pages(&sample(), &ResolvedMedia::default()).unwrap();
        let assessment = page(&pages, "assessment");
        assert!(assessment.html.contains(r#"id="assessment-submit""#));
        assert!(assessment.html.contains(r#"id="assessment-result""#));
        assert!(assessment.html.contains(r#"name="assessment-q1" value="true""#));
        assert!(assessment.html.contains("Pass mark: 70%"));
        assert!(!assessment.html.contains("data-block"));
    }

    #[test]
    fn empty_assessment_has_no_submit() {
        let doc = doc(json!({"title": "No quiz"}));
        let pages = render_pages(&doc, &ResolvedMedia::default()).unwrap();
        let assessment = page(&pages, "assessment");
        assert!(assessment.html.contains("no assessment questions"));
        assert!(!assessment.html.contains("assessment-submit"));
    }

    #[test]
    fn titles_are_escaped() {
        let html = render_index(&sample(), &RuntimeConfig::default());
        assert!(html.contains("Safety &lt;Basics&gt;"));
        assert!(!html.contains("<Basics>"));
    }

    #[test]
    fn index_loads_script_before_bootstrap() {
        let html = render_index(&sample(), &RuntimeConfig::default());
        assert!(html.starts_with("<!DOCTYPE html>"));
        let script = html.find(r#"<script src="scripts/navigation.js">"#).unwrap();
        let bootstrap = html.find("window.ScormRuntime.initializeCourse();").unwrap();
        assert!(script < bootstrap);
        assert!(html.contains(r#"href="styles/main.css""#));
        assert!(html.contains(r#"id="content""#));
    }

    #[test]
    fn index_outline_follows_settings() {
        let html = render_index(&sample(), &RuntimeConfig::default());
        assert_eq!(html.matches(r#"class="outline-link""#).count(), 4);
        assert!(html.contains(r#"data-page-index="2" data-page-id="topic-1""#));
        assert!(html.contains(r#"id="progress-bar""#));

        let hidden = RuntimeConfig {
            show_outline: false,
            show_progress: false,
            ..RuntimeConfig::default()
        };
        let html = render_index(&sample(), &hidden);
        assert!(!html.contains("outline-link"));
        assert!(!html.contains("progress-bar"));
    }

    #[test]
    fn index_policy_allows_youtube_frames_and_lms_framing() {
        let html = render_index(&sample(), &RuntimeConfig::default());
        assert!(html.contains(r#"http-equiv="Content-Security-Policy""#));
        for directive in [
            "default-src 'self'",
            "frame-src 'self' https://www.youtube.com https://youtube.com https://www.youtube-nocookie.com",
            "media-src 'self' blob: https:",
            "object-src 'none'",
            "frame-ancestors *",
        ] {
            assert!(html.contains(directive), "missing {directive}");
        }
    }
}
