//! DOM hooks shared by the page templates and the runtime script.
//!
//! The templates stamp these ids and classes into the markup and the script
//! receives the same table as its `SELECTORS` binding, so neither side can
//! rename a hook on its own. Values are bare names: ids are looked up with
//! `getElementById`, classes are prefixed with `.` by the script.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selectors {
    // ids
    pub content: &'static str,
    pub prev_button: &'static str,
    pub next_button: &'static str,
    pub exit_button: &'static str,
    pub nav_warning: &'static str,
    pub outline: &'static str,
    pub progress_bar: &'static str,
    pub narration_audio: &'static str,
    pub audio_toggle: &'static str,
    pub assessment_submit: &'static str,
    pub assessment_result: &'static str,
    // classes
    pub page: &'static str,
    pub start_button: &'static str,
    pub knowledge_check: &'static str,
    pub kc_question: &'static str,
    pub kc_option: &'static str,
    pub kc_submit: &'static str,
    pub kc_feedback: &'static str,
    pub kc_warning: &'static str,
    pub assessment_question: &'static str,
    pub assessment_option: &'static str,
    pub outline_link: &'static str,
}

pub const SELECTORS: Selectors = Selectors {
    content: "content",
    prev_button: "nav-prev",
    next_button: "nav-next",
    exit_button: "nav-exit",
    nav_warning: "nav-warning",
    outline: "course-outline",
    progress_bar: "progress-bar",
    narration_audio: "narration-audio",
    audio_toggle: "audio-toggle",
    assessment_submit: "assessment-submit",
    assessment_result: "assessment-result",
    page: "page",
    start_button: "start-button",
    knowledge_check: "knowledge-check",
    kc_question: "kc-question",
    kc_option: "kc-option",
    kc_submit: "kc-submit",
    kc_feedback: "kc-feedback",
    kc_warning: "kc-warning",
    assessment_question: "assessment-question",
    assessment_option: "assessment-option",
    outline_link: "outline-link",
};
