//! Course-document normalization.
//!
//! Course documents arrive in several historical shapes: camelCase and
//! snake_case spellings, renamed page keys, knowledge checks given as bare
//! arrays or as `{enabled, questions}` objects, answers given as option text,
//! indexes, booleans or strings. This module accepts all of them and produces
//! the single canonical [`CourseDocument`]; no other stage sees a raw shape.
//!
//! ## Rules
//!
//! - `title` is the only mandatory field. Zero topics is legal.
//! - Unknown fields are ignored.
//! - Narration defaults to the empty string.
//! - True/false answers become booleans; multiple-choice answers become a
//!   zero-based option index (matched by option text first, then by index).
//! - The pass mark comes from the assessment, then the course, then
//!   [`CourseConfig::default_pass_mark`].
//!
//! Errors name the offending field with a path such as
//! `topics[0].knowledgeCheck.questions[1].correctAnswer`.

use crate::config::CourseConfig;
use crate::media::clip;
use crate::naming;
use crate::types::{
    AssessmentPage, CorrectAnswer, CourseDocument, KnowledgeCheck, MediaKind, MediaReference,
    MediaSource, Page, PageKind, Question, QuestionKind,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("unsupported question type {kind:?} at `{field}`")]
    UnsupportedQuestionType { field: String, kind: String },
    #[error("malformed course document: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        field: field.into(),
        reason: reason.into(),
    }
}

fn missing(field: impl Into<String>) -> ValidationError {
    ValidationError::MissingField {
        field: field.into(),
    }
}

// ============================================================================
// Raw shapes
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCourse {
    #[serde(alias = "courseTitle", alias = "course_title")]
    title: Option<String>,
    #[serde(alias = "passMark")]
    pass_mark: Option<Value>,
    #[serde(alias = "welcomePage", alias = "welcome_page")]
    welcome: Option<RawPage>,
    #[serde(
        alias = "learningObjectivesPage",
        alias = "learning_objectives_page",
        alias = "objectivesPage"
    )]
    objectives_page: Option<RawPage>,
    objectives: Option<RawObjectives>,
    topics: Option<Vec<RawPage>>,
    #[serde(alias = "assessmentPage", alias = "assessment_page")]
    assessment: Option<RawPage>,
}

/// `objectives` is either the objectives page itself or a bare list of
/// objective statements.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawObjectives {
    List(Vec<String>),
    Page(RawPage),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPage {
    title: Option<String>,
    #[serde(alias = "contentHtml", alias = "content_html", alias = "html")]
    content: Option<String>,
    #[serde(alias = "narrationText", alias = "narration_text")]
    narration: Option<String>,
    #[serde(
        alias = "audioFile",
        alias = "audio_file",
        alias = "audioId",
        alias = "audio_id"
    )]
    audio: Option<String>,
    #[serde(
        alias = "captionFile",
        alias = "caption_file",
        alias = "captionId",
        alias = "caption_id",
        alias = "captions"
    )]
    caption: Option<String>,
    #[serde(alias = "imageUrl", alias = "image_url")]
    image: Option<String>,
    media: Option<Vec<RawMedia>>,
    #[serde(alias = "knowledgeCheck")]
    knowledge_check: Option<RawKnowledgeCheck>,
    questions: Option<Vec<RawQuestion>>,
    objectives: Option<Vec<String>>,
    #[serde(alias = "startButtonText")]
    start_button_text: Option<String>,
    #[serde(alias = "passMark")]
    pass_mark: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawKnowledgeCheck {
    List(Vec<RawQuestion>),
    Object {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        questions: Option<Vec<RawQuestion>>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuestion {
    id: Option<String>,
    #[serde(
        rename = "type",
        alias = "kind",
        alias = "questionType",
        alias = "question_type"
    )]
    kind: Option<String>,
    #[serde(alias = "question", alias = "text")]
    prompt: Option<String>,
    options: Option<Vec<Value>>,
    #[serde(alias = "correctAnswer", alias = "answer")]
    correct_answer: Option<Value>,
    explanation: Option<String>,
    #[serde(alias = "correctFeedback")]
    correct_feedback: Option<String>,
    #[serde(alias = "incorrectFeedback")]
    incorrect_feedback: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct RawMedia {
    id: Option<String>,
    #[serde(rename = "type", alias = "kind", alias = "mediaType")]
    kind: Option<String>,
    url: Option<String>,
    #[serde(alias = "embedUrl")]
    embed_url: Option<String>,
    #[serde(alias = "isYouTube", alias = "isYoutube")]
    is_youtube: Option<bool>,
    #[serde(alias = "clipStart")]
    clip_start: Option<Value>,
    #[serde(alias = "clipEnd")]
    clip_end: Option<Value>,
    title: Option<String>,
    #[serde(alias = "filename", alias = "fileName", alias = "assetName")]
    asset: Option<String>,
}

// ============================================================================
// Normalization
// ============================================================================

/// Canonicalize a course-content value.
pub fn normalize(value: &Value, defaults: &CourseConfig) -> Result<CourseDocument, ValidationError> {
    if !value.is_object() {
        return Err(invalid("$", "course document must be a JSON object"));
    }
    let raw: RawCourse = serde_json::from_value(value.clone())?;

    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| missing("title"))?
        .to_string();

    let course_pass_mark = match &raw.pass_mark {
        Some(v) => coerce_pass_mark(v, "passMark")?,
        None => None,
    };
    let pass_mark = course_pass_mark.unwrap_or(defaults.default_pass_mark);

    let raw_topics = raw.topics.unwrap_or_default();
    if raw_topics.len() > naming::MAX_TOPICS {
        return Err(invalid(
            "topics",
            format!("at most {} topics are supported", naming::MAX_TOPICS),
        ));
    }

    let welcome = match raw.welcome {
        Some(p) => build_page(PageKind::Welcome, p, "welcomePage")?,
        None => Page::new(PageKind::Welcome, default_title(PageKind::Welcome)),
    };

    let (objectives_page, objectives_list) = match (raw.objectives_page, raw.objectives) {
        (Some(page), Some(RawObjectives::List(list))) => (Some(page), list),
        (Some(page), _) => (Some(page), Vec::new()),
        (None, Some(RawObjectives::Page(page))) => (Some(page), Vec::new()),
        (None, Some(RawObjectives::List(list))) => (None, list),
        (None, None) => (None, Vec::new()),
    };
    let mut objectives = match objectives_page {
        Some(p) => build_page(PageKind::Objectives, p, "objectivesPage")?,
        None => Page::new(PageKind::Objectives, default_title(PageKind::Objectives)),
    };
    if objectives.objectives.is_empty() {
        objectives.objectives = clean_strings(objectives_list);
    }

    let topics = raw_topics
        .into_iter()
        .enumerate()
        .map(|(i, p)| build_page(PageKind::Topic(i), p, &format!("topics[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let assessment = match raw.assessment {
        Some(mut p) => {
            let assessment_pass_mark = match &p.pass_mark {
                Some(v) => coerce_pass_mark(v, "assessment.passMark")?,
                None => None,
            };
            let raw_questions = p.questions.take().unwrap_or_default();
            let questions = build_questions(raw_questions, "assessment.questions")?;
            AssessmentPage {
                page: build_page(PageKind::Assessment, p, "assessment")?,
                questions,
                pass_mark: assessment_pass_mark.unwrap_or(pass_mark),
            }
        }
        None => AssessmentPage {
            page: Page::new(PageKind::Assessment, default_title(PageKind::Assessment)),
            questions: Vec::new(),
            pass_mark,
        },
    };

    let doc = CourseDocument {
        title,
        pass_mark,
        welcome,
        objectives,
        topics,
        assessment,
    };
    tracing::debug!(
        title = %doc.title,
        topics = doc.topics.len(),
        assessment_questions = doc.assessment.questions.len(),
        "Normalized course document"
    );
    Ok(doc)
}

fn default_title(kind: PageKind) -> String {
    match kind {
        PageKind::Welcome => "Welcome".to_string(),
        PageKind::Objectives => "Learning Objectives".to_string(),
        PageKind::Topic(i) => format!("Topic {}", i + 1),
        PageKind::Assessment => "Assessment".to_string(),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn clean_strings(list: Vec<String>) -> Vec<String> {
    list.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn build_page(kind: PageKind, raw: RawPage, path: &str) -> Result<Page, ValidationError> {
    let mut page = Page::new(
        kind,
        non_empty(raw.title).unwrap_or_else(|| default_title(kind)),
    );
    page.content = raw.content.unwrap_or_default();
    page.narration = raw.narration.unwrap_or_default();
    page.audio = non_empty(raw.audio).map(|a| strip_media_prefix(&a).to_string());
    page.captions = non_empty(raw.caption).map(|c| strip_media_prefix(&c).to_string());

    let mut raw_media = Vec::new();
    if let Some(url) = non_empty(raw.image) {
        raw_media.push((
            format!("{path}.imageUrl"),
            RawMedia {
                kind: Some("image".to_string()),
                url: Some(url),
                ..RawMedia::default()
            },
        ));
    }
    for (i, m) in raw.media.unwrap_or_default().into_iter().enumerate() {
        raw_media.push((format!("{path}.media[{i}]"), m));
    }
    let page_id = kind.page_id();
    page.media = raw_media
        .into_iter()
        .enumerate()
        .map(|(n, (field, m))| build_media(m, &page_id, n + 1, &field))
        .collect::<Result<Vec<_>, _>>()?;

    match kind {
        PageKind::Topic(_) => {
            page.knowledge_check = build_knowledge_check(raw.knowledge_check, raw.questions, path)?;
        }
        PageKind::Objectives => {
            page.objectives = clean_strings(raw.objectives.unwrap_or_default());
        }
        PageKind::Welcome => {
            page.start_button_text = non_empty(raw.start_button_text);
        }
        PageKind::Assessment => {}
    }
    Ok(page)
}

fn build_knowledge_check(
    check: Option<RawKnowledgeCheck>,
    topic_questions: Option<Vec<RawQuestion>>,
    path: &str,
) -> Result<Option<KnowledgeCheck>, ValidationError> {
    let (raw_questions, field) = match check {
        Some(RawKnowledgeCheck::List(list)) => (list, format!("{path}.knowledgeCheck")),
        Some(RawKnowledgeCheck::Object { enabled, questions }) => {
            if enabled == Some(false) {
                return Ok(None);
            }
            (
                questions.unwrap_or_default(),
                format!("{path}.knowledgeCheck.questions"),
            )
        }
        None => (
            topic_questions.unwrap_or_default(),
            format!("{path}.questions"),
        ),
    };
    let questions = build_questions(raw_questions, &field)?;
    Ok((!questions.is_empty()).then_some(KnowledgeCheck { questions }))
}

fn build_questions(raw: Vec<RawQuestion>, path: &str) -> Result<Vec<Question>, ValidationError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for (i, q) in raw.into_iter().enumerate() {
        let field = format!("{path}[{i}]");
        let question = build_question(q, i, &field)?;
        if !seen.insert(question.id.clone()) {
            return Err(invalid(
                format!("{field}.id"),
                format!("duplicate question id {:?}", question.id),
            ));
        }
        out.push(question);
    }
    Ok(out)
}

fn parse_question_kind(kind: &str) -> Option<QuestionKind> {
    let key: String = kind
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect::<String>()
        .to_ascii_lowercase();
    match key.as_str() {
        "multiplechoice" | "mc" | "singlechoice" => Some(QuestionKind::MultipleChoice),
        "truefalse" | "tf" | "boolean" => Some(QuestionKind::TrueFalse),
        _ => None,
    }
}

fn build_question(raw: RawQuestion, index: usize, field: &str) -> Result<Question, ValidationError> {
    let options = raw
        .options
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, v)| option_text(v, &format!("{field}.options[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let kind = match non_empty(raw.kind) {
        Some(k) => parse_question_kind(&k).ok_or_else(|| ValidationError::UnsupportedQuestionType {
            field: format!("{field}.type"),
            kind: k,
        })?,
        None if !options.is_empty() => QuestionKind::MultipleChoice,
        None if matches!(raw.correct_answer, Some(Value::Bool(_))) => QuestionKind::TrueFalse,
        None => return Err(missing(format!("{field}.type"))),
    };

    let prompt = non_empty(raw.prompt).ok_or_else(|| missing(format!("{field}.question")))?;
    let answer_field = format!("{field}.correctAnswer");
    let answer = match raw.correct_answer {
        Some(Value::Null) | None => return Err(missing(answer_field)),
        Some(v) => v,
    };

    let (options, correct) = match kind {
        QuestionKind::MultipleChoice => {
            if options.len() < 2 {
                return Err(invalid(
                    format!("{field}.options"),
                    "multiple-choice questions need at least two options",
                ));
            }
            let mut labels = HashSet::new();
            if let Some(dup) = options.iter().find(|o| !labels.insert(o.as_str())) {
                return Err(invalid(
                    format!("{field}.options"),
                    format!("option {dup:?} appears more than once"),
                ));
            }
            let index = coerce_choice(&answer, &options, &answer_field)?;
            (options, CorrectAnswer::Choice(index))
        }
        QuestionKind::TrueFalse => {
            let value = coerce_boolean(&answer, &options, &answer_field)?;
            (Vec::new(), CorrectAnswer::Boolean(value))
        }
    };

    Ok(Question {
        id: non_empty(raw.id).unwrap_or_else(|| format!("q{}", index + 1)),
        kind,
        prompt,
        options,
        correct,
        explanation: non_empty(raw.explanation),
        correct_feedback: non_empty(raw.correct_feedback),
        incorrect_feedback: non_empty(raw.incorrect_feedback),
    })
}

fn option_text(value: &Value, field: &str) -> Result<String, ValidationError> {
    let text = match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => ["text", "label", "value"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    };
    text.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| invalid(field, "option must be non-empty text"))
}

/// Option text match first, then a zero-based index (number or digit string).
fn coerce_choice(answer: &Value, options: &[String], field: &str) -> Result<usize, ValidationError> {
    let index = match answer {
        Value::String(s) => {
            let s = s.trim();
            match options.iter().position(|o| o == s) {
                Some(i) => Some(i),
                None => s.parse::<usize>().ok(),
            }
        }
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        _ => None,
    };
    match index {
        Some(i) if i < options.len() => Ok(i),
        Some(i) => Err(invalid(
            field,
            format!("index {i} is out of range for {} options", options.len()),
        )),
        None => Err(invalid(
            field,
            format!("{answer} matches no option text and is not an index"),
        )),
    }
}

/// Booleans, `"true"`/`"false"` in any case, or an index into the options
/// (which default to `["True", "False"]`).
fn coerce_boolean(answer: &Value, options: &[String], field: &str) -> Result<bool, ValidationError> {
    let parse = |s: &str| match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    };
    let value = match answer {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse(s.as_str()),
        Value::Number(n) => {
            let labels: Vec<&str> = if options.is_empty() {
                vec!["True", "False"]
            } else {
                options.iter().map(String::as_str).collect()
            };
            n.as_u64()
                .and_then(|i| labels.get(usize::try_from(i).ok()?).copied())
                .and_then(parse)
        }
        _ => None,
    };
    value.ok_or_else(|| invalid(field, format!("{answer} is not a true/false answer")))
}

fn coerce_pass_mark(value: &Value, field: &str) -> Result<Option<u8>, ValidationError> {
    let n = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if (0.0..=100.0).contains(&n) => Ok(Some(n.round() as u8)),
        Some(n) => Err(invalid(field, format!("{n} is outside 0-100"))),
        None => Err(invalid(field, format!("{value} is not a number"))),
    }
}

fn coerce_seconds(value: &Option<Value>, field: &str) -> Result<Option<u32>, ValidationError> {
    let n = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match n {
        Some(n) if n >= 0.0 && n <= u32::MAX as f64 => Ok(Some(n.floor() as u32)),
        _ => Err(invalid(field, "clip timing must be a non-negative number of seconds")),
    }
}

fn strip_media_prefix(name: &str) -> &str {
    let name = name.trim_start_matches("./");
    name.strip_prefix("media/").unwrap_or(name)
}

fn is_remote_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

fn parse_media_kind(kind: &str) -> Option<MediaKind> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "image" | "img" | "picture" | "photo" => Some(MediaKind::Image),
        "audio" | "sound" => Some(MediaKind::Audio),
        "video" => Some(MediaKind::Video),
        "youtube" => Some(MediaKind::YouTube),
        _ => None,
    }
}

fn build_media(
    raw: RawMedia,
    page_id: &str,
    n: usize,
    field: &str,
) -> Result<MediaReference, ValidationError> {
    let url = non_empty(raw.url);
    let embed_url = non_empty(raw.embed_url);
    let asset = non_empty(raw.asset);
    let declared = match non_empty(raw.kind) {
        Some(k) => Some(parse_media_kind(&k).ok_or_else(|| {
            invalid(format!("{field}.type"), format!("unknown media type {k:?}"))
        })?),
        None => None,
    };

    let youtube = raw.is_youtube == Some(true)
        || declared == Some(MediaKind::YouTube)
        || embed_url.as_deref().is_some_and(clip::is_youtube_url)
        || url.as_deref().is_some_and(clip::is_youtube_url);

    let (kind, source) = if youtube {
        let candidate = embed_url
            .as_deref()
            .filter(|u| clip::is_youtube_url(u))
            .or(url.as_deref().filter(|u| clip::is_youtube_url(u)))
            .ok_or_else(|| missing(format!("{field}.embedUrl")))?;
        let embed_url = clip::to_embed_url(candidate).ok_or_else(|| {
            invalid(
                format!("{field}.embedUrl"),
                format!("{candidate:?} does not name a YouTube video"),
            )
        })?;
        (MediaKind::YouTube, MediaSource::YouTube { embed_url })
    } else {
        let source = match (&asset, &url) {
            (Some(name), _) => MediaSource::Asset(strip_media_prefix(name).to_string()),
            (None, Some(u)) if is_remote_url(u) => MediaSource::Remote(if u.starts_with("//") {
                format!("https:{u}")
            } else {
                u.clone()
            }),
            (None, Some(u)) => MediaSource::Asset(strip_media_prefix(u).to_string()),
            (None, None) => return Err(missing(format!("{field}.url"))),
        };
        let name = match &source {
            MediaSource::Asset(n) | MediaSource::Remote(n) => n.as_str(),
            MediaSource::YouTube { embed_url } => embed_url.as_str(),
        };
        let kind = declared
            .or_else(|| naming::extension_of(name).and_then(|e| naming::kind_for_extension(&e)))
            .ok_or_else(|| missing(format!("{field}.type")))?;
        (kind, source)
    };

    Ok(MediaReference {
        id: non_empty(raw.id).unwrap_or_else(|| format!("{page_id}-media-{n}")),
        kind,
        source,
        title: non_empty(raw.title).unwrap_or_default(),
        clip_start: coerce_seconds(&raw.clip_start, &format!("{field}.clipStart"))?,
        clip_end: coerce_seconds(&raw.clip_end, &format!("{field}.clipEnd"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn norm(v: Value) -> Result<CourseDocument, ValidationError> {
        normalize(&v, &CourseConfig::default())
    }

    #[test]
    fn title_is_required() {
        let err = norm(json!({"topics": []})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field } if field == "title"));
        let err = norm(json!({"title": "   "})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { .. }));
    }

    #[test]
    fn non_object_is_invalid() {
        assert!(matches!(
            norm(json!([1, 2])),
            Err(ValidationError::InvalidField { .. })
        ));
    }

    #[test]
    fn minimal_document_materializes_fixed_pages() {
        let doc = norm(json!({"title": "Safety 101"})).unwrap();
        assert_eq!(doc.title, "Safety 101");
        assert!(doc.topics.is_empty());
        assert_eq!(doc.welcome.title, "Welcome");
        assert_eq!(doc.objectives.title, "Learning Objectives");
        assert_eq!(doc.welcome.narration, "");
        assert_eq!(doc.assessment.page.title, "Assessment");
        assert_eq!(doc.pass_mark, 80);
        assert_eq!(doc.assessment.pass_mark, 80);
    }

    #[test]
    fn legacy_spellings_are_accepted() {
        let doc = norm(json!({
            "courseTitle": "Legacy",
            "welcomePage": {"title": "Hi", "content": "<p>x</p>", "startButtonText": "Go"},
            "learningObjectivesPage": {"objectives": ["Know A", " ", "Know B"]},
            "topics": [{"title": "T1", "narrationText": "Say this", "audioFile": "media/audio-0.mp3"}]
        }))
        .unwrap();
        assert_eq!(doc.title, "Legacy");
        assert_eq!(doc.welcome.start_button_text.as_deref(), Some("Go"));
        assert_eq!(doc.objectives.objectives, vec!["Know A", "Know B"]);
        assert_eq!(doc.topics[0].narration, "Say this");
        assert_eq!(doc.topics[0].audio.as_deref(), Some("audio-0.mp3"));
    }

    #[test]
    fn objectives_as_bare_list() {
        let doc = norm(json!({"title": "C", "objectives": ["One", "Two"]})).unwrap();
        assert_eq!(doc.objectives.objectives, vec!["One", "Two"]);
        assert_eq!(doc.objectives.title, "Learning Objectives");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let doc = norm(json!({
            "title": "C",
            "theme": {"dark": true},
            "topics": [{"title": "T", "futureField": 42}]
        }))
        .unwrap();
        assert_eq!(doc.topics.len(), 1);
    }

    #[test]
    fn multiple_choice_answer_by_text_or_index() {
        let doc = norm(json!({
            "title": "C",
            "topics": [{
                "knowledgeCheck": {"enabled": true, "questions": [
                    {"type": "multiple-choice", "question": "Pick", "options": ["A", "B", "C"], "correctAnswer": "B"},
                    {"type": "multiple_choice", "text": "Pick", "options": ["A", "B"], "correctAnswer": 0},
                    {"type": "multipleChoice", "prompt": "Pick", "options": ["1", "2"], "correctAnswer": "2"}
                ]}
            }]
        }))
        .unwrap();
        let qs = &doc.topics[0].knowledge_check.as_ref().unwrap().questions;
        assert_eq!(qs[0].correct, CorrectAnswer::Choice(1));
        assert_eq!(qs[1].correct, CorrectAnswer::Choice(0));
        // Text match wins over index interpretation
        assert_eq!(qs[2].correct, CorrectAnswer::Choice(1));
        assert_eq!(qs[0].id, "q1");
        assert_eq!(qs[2].id, "q3");
    }

    #[test]
    fn true_false_answers_become_booleans() {
        let doc = norm(json!({
            "title": "C",
            "assessment": {"questions": [
                {"type": "true-false", "question": "A", "correctAnswer": true},
                {"type": "true_false", "question": "B", "correctAnswer": "False"},
                {"type": "trueFalse", "question": "C", "options": ["True", "False"], "correctAnswer": 0}
            ]}
        }))
        .unwrap();
        let qs = &doc.assessment.questions;
        assert_eq!(qs[0].correct, CorrectAnswer::Boolean(true));
        assert_eq!(qs[1].correct, CorrectAnswer::Boolean(false));
        assert_eq!(qs[2].correct, CorrectAnswer::Boolean(true));
        assert!(qs[2].options.is_empty());
    }

    #[test]
    fn answer_out_of_range_names_the_field() {
        let err = norm(json!({
            "title": "C",
            "topics": [{"knowledgeCheck": {"questions": [
                {"type": "multiple-choice", "question": "ok", "options": ["A", "B"], "correctAnswer": 0},
                {"type": "multiple-choice", "question": "bad", "options": ["A", "B"], "correctAnswer": 5}
            ]}}]
        }))
        .unwrap_err();
        match err {
            ValidationError::InvalidField { field, .. } => {
                assert_eq!(field, "topics[0].knowledgeCheck.questions[1].correctAnswer")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unsupported_question_type() {
        let err = norm(json!({
            "title": "C",
            "assessment": {"questions": [{"type": "fill-in-the-blank", "question": "x", "correctAnswer": "y"}]}
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedQuestionType { ref kind, .. } if kind == "fill-in-the-blank"));
    }

    #[test]
    fn multiple_choice_needs_two_options() {
        let err = norm(json!({
            "title": "C",
            "assessment": {"questions": [{"type": "multiple-choice", "question": "x", "options": ["only"], "correctAnswer": 0}]}
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "assessment.questions[0].options"));
    }

    #[test]
    fn repeated_option_text_rejected() {
        let err = norm(json!({
            "title": "C",
            "assessment": {"questions": [{"type": "multiple-choice", "question": "x", "options": ["Same", " Same "], "correctAnswer": 1}]}
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "assessment.questions[0].options"));
    }

    #[test]
    fn duplicate_question_ids_rejected() {
        let err = norm(json!({
            "title": "C",
            "assessment": {"questions": [
                {"id": "a", "type": "true-false", "question": "x", "correctAnswer": true},
                {"id": "a", "type": "true-false", "question": "y", "correctAnswer": false}
            ]}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("duplicate question id"));
    }

    #[test]
    fn knowledge_check_shapes() {
        let doc = norm(json!({
            "title": "C",
            "topics": [
                {"knowledgeCheck": [{"type": "true-false", "question": "x", "correctAnswer": true}]},
                {"knowledgeCheck": {"enabled": false, "questions": [{"type": "true-false", "question": "x", "correctAnswer": true}]}},
                {"questions": [{"type": "true-false", "question": "x", "correctAnswer": "true"}]},
                {"knowledgeCheck": {"questions": []}}
            ]
        }))
        .unwrap();
        assert!(doc.topics[0].knowledge_check.is_some());
        assert!(doc.topics[1].knowledge_check.is_none());
        assert!(doc.topics[2].knowledge_check.is_some());
        assert!(doc.topics[3].knowledge_check.is_none());
    }

    #[test]
    fn pass_mark_precedence() {
        let doc = norm(json!({"title": "C", "passMark": 70, "assessment": {"passMark": "90"}})).unwrap();
        assert_eq!(doc.pass_mark, 70);
        assert_eq!(doc.assessment.pass_mark, 90);

        let config = CourseConfig {
            default_pass_mark: 65,
        };
        let doc = normalize(&json!({"title": "C"}), &config).unwrap();
        assert_eq!(doc.assessment.pass_mark, 65);

        let err = norm(json!({"title": "C", "passMark": 120})).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "passMark"));
    }

    #[test]
    fn media_sources_are_classified() {
        let doc = norm(json!({
            "title": "C",
            "topics": [{
                "imageUrl": "media/diagram.png",
                "media": [
                    {"id": "remote", "type": "image", "url": "https://cdn.example.com/a.jpg"},
                    {"type": "video", "isYouTube": true, "embedUrl": "https://www.youtube.com/embed/abc?start=30&end=60"},
                    {"url": "https://youtu.be/xyz", "clipStart": 15, "clipEnd": "45"},
                    {"url": "clip.mp4"}
                ]
            }]
        }))
        .unwrap();
        let media = &doc.topics[0].media;
        assert_eq!(media[0].id, "topic-1-media-1");
        assert_eq!(media[0].kind, MediaKind::Image);
        assert_eq!(media[0].source, MediaSource::Asset("diagram.png".to_string()));
        assert_eq!(
            media[1].source,
            MediaSource::Remote("https://cdn.example.com/a.jpg".to_string())
        );
        assert_eq!(media[2].kind, MediaKind::YouTube);
        assert_eq!(
            media[2].source,
            MediaSource::YouTube {
                embed_url: "https://www.youtube.com/embed/abc?start=30&end=60".to_string()
            }
        );
        assert_eq!(media[2].clip_start, None);
        assert_eq!(media[3].kind, MediaKind::YouTube);
        assert_eq!((media[3].clip_start, media[3].clip_end), (Some(15), Some(45)));
        assert_eq!(media[4].kind, MediaKind::Video);
    }

    #[test]
    fn media_without_source_is_missing_url() {
        let err = norm(json!({"title": "C", "topics": [{"media": [{"type": "image"}]}]})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field } if field == "topics[0].media[0].url"));
    }

    #[test]
    fn media_kind_inferred_or_required() {
        let err = norm(json!({"title": "C", "topics": [{"media": [{"url": "blob-without-extension"}]}]}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field } if field == "topics[0].media[0].type"));
    }

    #[test]
    fn knowledge_checks_only_on_topics() {
        let doc = norm(json!({
            "title": "C",
            "welcomePage": {"knowledgeCheck": [{"type": "true-false", "question": "x", "correctAnswer": true}]}
        }))
        .unwrap();
        assert!(doc.welcome.knowledge_check.is_none());
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        let err = norm(json!({"title": "C", "topics": "not a list"})).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }
}
