//! Client runtime: the navigation and scoring state machine shipped in
//! `scripts/navigation.js`.
//!
//! - [`emit`] assembles the script from the function sources in
//!   `static/runtime/` plus the data tables below, and checks the assembled
//!   text (single declaration of shared bindings, exports placed right after
//!   their definitions, SCORM 1.2 fields only, `LMSFinish` only on exit).
//! - [`session`] is the same state machine written in Rust over a
//!   [`ScormApi`](session::ScormApi) trait. The score-reporting call sequence
//!   is defined once ([`session::REPORT_SEQUENCE`]) and both the model and the
//!   emitted script are generated from it.
//! - [`selectors`] is the table of DOM hooks shared with the page templates.
//!
//! The data the script embeds is [`RuntimeCourse`]: correct answers and
//! feedback never appear in the page markup, only here.

pub mod emit;
pub mod selectors;
pub mod session;

use crate::config::{NavigationMode, RuntimeConfig};
use crate::media::ResolvedMedia;
use crate::naming::{self, BlockNumber};
use crate::types::{CorrectAnswer, CourseDocument, Question, QuestionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Course data embedded in the runtime script as `COURSE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCourse {
    pub title: String,
    pub pass_mark: u8,
    pub pages: Vec<RuntimePage>,
    /// Page id → knowledge-check questions.
    pub knowledge_checks: BTreeMap<String, Vec<RuntimeQuestion>>,
    pub assessment: Vec<RuntimeQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimePage {
    pub id: String,
    pub title: String,
    /// `welcome`, `objectives`, `topic` or `assessment`.
    pub kind: String,
    /// Fragment path relative to `index.html`.
    pub path: String,
    pub block: Option<String>,
    pub has_audio: bool,
    pub has_knowledge_check: bool,
}

/// Expected input value: option text for multiple choice, a boolean for
/// true/false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuntimeAnswer {
    Boolean(bool),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeQuestion {
    pub id: String,
    pub kind: QuestionKind,
    pub correct: RuntimeAnswer,
    pub correct_feedback: String,
    pub incorrect_feedback: String,
}

impl RuntimeQuestion {
    /// Grade a submitted input value the way the script does: string
    /// equality for multiple choice, boolean equality for true/false.
    pub fn is_correct(&self, value: &str) -> bool {
        match &self.correct {
            RuntimeAnswer::Text(expected) => value == expected,
            RuntimeAnswer::Boolean(expected) => (value == "true") == *expected,
        }
    }
}

impl From<&Question> for RuntimeQuestion {
    fn from(q: &Question) -> Self {
        let correct = match (q.kind, q.correct) {
            (QuestionKind::TrueFalse, CorrectAnswer::Boolean(b)) => RuntimeAnswer::Boolean(b),
            _ => RuntimeAnswer::Text(q.correct_value()),
        };
        Self {
            id: q.id.clone(),
            kind: q.kind,
            correct,
            correct_feedback: q.correct_feedback_text().to_string(),
            incorrect_feedback: q.incorrect_feedback_text().to_string(),
        }
    }
}

impl RuntimeCourse {
    pub fn from_document(doc: &CourseDocument, media: &ResolvedMedia) -> Self {
        let pages = doc
            .pages()
            .map(|page| RuntimePage {
                id: page.id(),
                title: page.title.clone(),
                kind: page.kind.label().to_string(),
                path: naming::page_path(page.kind),
                block: BlockNumber::for_page(page.kind).map(|b| b.to_string()),
                has_audio: media
                    .narration_for(page.kind)
                    .is_some_and(|n| n.audio.is_some()),
                has_knowledge_check: page.knowledge_check.is_some(),
            })
            .collect();
        let knowledge_checks = doc
            .topics
            .iter()
            .filter_map(|topic| {
                topic.knowledge_check.as_ref().map(|kc| {
                    (
                        topic.id(),
                        kc.questions.iter().map(RuntimeQuestion::from).collect(),
                    )
                })
            })
            .collect();
        Self {
            title: doc.title.clone(),
            pass_mark: doc.assessment.pass_mark,
            pages,
            knowledge_checks,
            assessment: doc
                .assessment
                .questions
                .iter()
                .map(RuntimeQuestion::from)
                .collect(),
        }
    }

    pub fn page_index(&self, id: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }
}

/// Behavior switches embedded as `SETTINGS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    pub navigation_mode: NavigationMode,
    pub allow_retake: bool,
    pub show_progress: bool,
    pub show_outline: bool,
    pub autoplay_audio: bool,
}

impl From<&RuntimeConfig> for RuntimeSettings {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            navigation_mode: config.navigation_mode,
            allow_retake: config.allow_retake,
            show_progress: config.show_progress,
            show_outline: config.show_outline,
            autoplay_audio: config.autoplay_audio,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from(&RuntimeConfig::default())
    }
}
