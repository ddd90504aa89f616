//! Canonical course model shared by every pipeline stage.
//!
//! Only [`normalize`](crate::normalize) builds these values. Everything
//! downstream (media resolution, rendering, runtime emission, manifest) reads
//! them and never sees the legacy document shapes.

use serde::{Deserialize, Serialize};

/// A normalized course, pages in document order.
///
/// The welcome and objectives pages always exist, even when the authored
/// document omitted them or left them without narration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseDocument {
    pub title: String,
    pub pass_mark: u8,
    pub welcome: Page,
    pub objectives: Page,
    pub topics: Vec<Page>,
    pub assessment: AssessmentPage,
}

impl CourseDocument {
    /// Every page in document order: welcome, objectives, topics, assessment.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        [&self.welcome, &self.objectives]
            .into_iter()
            .chain(self.topics.iter())
            .chain(std::iter::once(&self.assessment.page))
    }

    /// Pages that own a narration block slot (everything but the assessment).
    pub fn narrated_pages(&self) -> impl Iterator<Item = &Page> {
        [&self.welcome, &self.objectives]
            .into_iter()
            .chain(self.topics.iter())
    }

    pub fn page_count(&self) -> usize {
        self.topics.len() + 3
    }
}

/// Which logical page a [`Page`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageKind {
    Welcome,
    Objectives,
    /// Zero-based topic index.
    Topic(usize),
    Assessment,
}

impl PageKind {
    /// Stable page id, also the stem of the page's HTML file.
    pub fn page_id(self) -> String {
        match self {
            PageKind::Welcome => "welcome".to_string(),
            PageKind::Objectives => "objectives".to_string(),
            PageKind::Topic(i) => format!("topic-{}", i + 1),
            PageKind::Assessment => "assessment".to_string(),
        }
    }

    /// Short kind label used in CSS classes and runtime data.
    pub fn label(self) -> &'static str {
        match self {
            PageKind::Welcome => "welcome",
            PageKind::Objectives => "objectives",
            PageKind::Topic(_) => "topic",
            PageKind::Assessment => "assessment",
        }
    }
}

/// Content of a single page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub kind: PageKind,
    pub title: String,
    /// Authored HTML body. Trusted and emitted unescaped.
    pub content: String,
    /// Narration transcript. Empty when none was authored, never absent.
    pub narration: String,
    /// Asset name of the narration audio, if the page declares one.
    pub audio: Option<String>,
    /// Asset name of the caption track, if the page declares one.
    pub captions: Option<String>,
    pub media: Vec<MediaReference>,
    /// Only ever set on topic pages.
    pub knowledge_check: Option<KnowledgeCheck>,
    /// Objective statements; only populated on the objectives page.
    pub objectives: Vec<String>,
    /// Label of the welcome page's start control.
    pub start_button_text: Option<String>,
}

impl Page {
    pub fn new(kind: PageKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            content: String::new(),
            narration: String::new(),
            audio: None,
            captions: None,
            media: Vec::new(),
            knowledge_check: None,
            objectives: Vec::new(),
            start_button_text: None,
        }
    }

    pub fn id(&self) -> String {
        self.kind.page_id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    YouTube,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::YouTube => "youtube",
        }
    }
}

/// Where the bytes of a media reference come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MediaSource {
    /// A named binary asset supplied alongside the document.
    Asset(String),
    /// An `http(s)` URL fetched at generation time.
    Remote(String),
    /// A YouTube embed; nothing is packaged.
    YouTube { embed_url: String },
}

/// A media element placed on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaReference {
    pub id: String,
    pub kind: MediaKind,
    pub source: MediaSource,
    pub title: String,
    /// Explicit clip start in seconds. Takes precedence over the embed URL.
    pub clip_start: Option<u32>,
    /// Explicit clip end in seconds. Takes precedence over the embed URL.
    pub clip_end: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::TrueFalse => "true-false",
        }
    }
}

/// A coerced correct answer: zero-based option index or boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Choice(usize),
    Boolean(bool),
}

const DEFAULT_CORRECT_FEEDBACK: &str = "Correct!";
const DEFAULT_INCORRECT_FEEDBACK: &str = "Not quite. Try again!";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Option labels for multiple-choice questions. Empty for true/false.
    pub options: Vec<String>,
    pub correct: CorrectAnswer,
    pub explanation: Option<String>,
    pub correct_feedback: Option<String>,
    pub incorrect_feedback: Option<String>,
}

impl Question {
    /// `(value, label)` pairs for the question's inputs.
    ///
    /// Multiple-choice values are the option text itself; true/false values are
    /// the literals `true` and `false`.
    pub fn choices(&self) -> Vec<(String, String)> {
        match self.kind {
            QuestionKind::MultipleChoice => self
                .options
                .iter()
                .map(|o| (o.clone(), o.clone()))
                .collect(),
            QuestionKind::TrueFalse => vec![
                ("true".to_string(), "True".to_string()),
                ("false".to_string(), "False".to_string()),
            ],
        }
    }

    /// The input value a learner must select to answer correctly.
    pub fn correct_value(&self) -> String {
        match self.correct {
            CorrectAnswer::Choice(i) => self.options.get(i).cloned().unwrap_or_default(),
            CorrectAnswer::Boolean(b) => b.to_string(),
        }
    }

    pub fn correct_feedback_text(&self) -> &str {
        self.correct_feedback
            .as_deref()
            .or(self.explanation.as_deref())
            .unwrap_or(DEFAULT_CORRECT_FEEDBACK)
    }

    pub fn incorrect_feedback_text(&self) -> &str {
        self.incorrect_feedback
            .as_deref()
            .unwrap_or(DEFAULT_INCORRECT_FEEDBACK)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeCheck {
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentPage {
    pub page: Page,
    pub questions: Vec<Question>,
    pub pass_mark: u8,
}
