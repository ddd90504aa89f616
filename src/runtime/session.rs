//! Typed model of the runtime state machine.
//!
//! [`Session`] performs exactly the transitions and SCORM calls the emitted
//! script performs, over any [`ScormApi`]. It exists so the protocol can be
//! exercised without a browser:
//!
//! ```text
//! Welcome → Objectives → Topic[0..n-1] → Assessment → Finished
//! ```
//!
//! Transitions happen only on explicit next/back/go-to. In linear mode a
//! forward move is blocked while a page between here and the target has an
//! unsubmitted knowledge check or unsubmitted assessment.
//!
//! Score reporting follows [`REPORT_SEQUENCE`] to the letter. `LMSFinish` is
//! only ever called by [`Session::exit`].

use super::{RuntimeCourse, RuntimeSettings};
use crate::config::NavigationMode;
use std::collections::BTreeMap;
use thiserror::Error;

/// The SCORM 1.2 API object an LMS exposes as `window.API`.
///
/// Return values are the raw strings the API returns (`"true"`/`"false"` for
/// the boolean calls).
pub trait ScormApi {
    fn initialize(&self) -> String;
    fn get_value(&self, element: &str) -> String;
    fn set_value(&self, element: &str, value: &str) -> String;
    fn commit(&self) -> String;
    fn finish(&self) -> String;
    fn last_error(&self) -> String;
    fn error_string(&self, code: &str) -> String;
    fn diagnostic(&self, code: &str) -> String;
}

/// A value written by a [`ReportStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportValue {
    Literal(&'static str),
    /// The rounded percentage score, as a decimal string.
    Percentage,
    /// `passed` when the percentage reaches the pass mark, else `failed`.
    LessonStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStep {
    SetValue(&'static str, ReportValue),
    Commit,
}

/// SCORM 1.2 calls made when an assessment is scored, in order.
pub const REPORT_SEQUENCE: [ReportStep; 6] = [
    ReportStep::SetValue("cmi.core.score.min", ReportValue::Literal("0")),
    ReportStep::SetValue("cmi.core.score.max", ReportValue::Literal("100")),
    ReportStep::SetValue("cmi.core.score.raw", ReportValue::Percentage),
    ReportStep::Commit,
    ReportStep::SetValue("cmi.core.lesson_status", ReportValue::LessonStatus),
    ReportStep::Commit,
];

impl ReportStep {
    /// JavaScript statement for this step inside `reportAssessmentScore(ctx, percentage)`.
    pub fn to_js(self) -> String {
        match self {
            ReportStep::SetValue(element, value) => {
                let value = match value {
                    ReportValue::Literal(v) => format!("{v:?}"),
                    ReportValue::Percentage => "String(percentage)".to_string(),
                    ReportValue::LessonStatus => {
                        "percentage >= COURSE.passMark ? \"passed\" : \"failed\"".to_string()
                    }
                };
                format!("scormSetValue(ctx, {element:?}, {value});")
            }
            ReportStep::Commit => "scormCommit(ctx);".to_string(),
        }
    }
}

/// `round(correct / total * 100)`, 0 for an empty assessment.
pub fn score_percentage(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Page(usize),
    Finished,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("complete the activities on this page before moving on")]
    Blocked,
    #[error("no page at index {0}")]
    OutOfRange(usize),
    #[error("please answer all questions before submitting ({} unanswered)", .0.len())]
    Unanswered(Vec<String>),
    #[error("page {0} has no knowledge check")]
    NoKnowledgeCheck(String),
    #[error("the assessment has no questions")]
    EmptyAssessment,
    #[error("the assessment was already submitted")]
    RetakeNotAllowed,
    #[error("the session has been closed")]
    Terminated,
}

/// Per-question result of a knowledge check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOutcome {
    pub id: String,
    pub correct: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentOutcome {
    pub correct: usize,
    pub total: usize,
    pub percentage: u8,
    pub passed: bool,
}

/// The explicit runtime context: API handle plus all learner state.
pub struct Session<'a, A: ScormApi> {
    api: &'a A,
    course: &'a RuntimeCourse,
    settings: RuntimeSettings,
    position: Position,
    answered: BTreeMap<String, BTreeMap<String, String>>,
    checked: BTreeMap<String, bool>,
    assessment: Option<AssessmentOutcome>,
    terminated: bool,
    errors: Vec<String>,
}

impl<'a, A: ScormApi> Session<'a, A> {
    /// Initialize the API and pick the start page: `deep_link` page id, then
    /// the stored `cmi.core.lesson_location`, then the first page.
    pub fn start(
        api: &'a A,
        course: &'a RuntimeCourse,
        settings: RuntimeSettings,
        deep_link: Option<&str>,
    ) -> Self {
        let mut session = Self {
            api,
            course,
            settings,
            position: Position::Page(0),
            answered: BTreeMap::new(),
            checked: BTreeMap::new(),
            assessment: None,
            terminated: false,
            errors: Vec::new(),
        };
        if api.initialize() != "true" {
            session.log_error("LMSInitialize");
        }
        let status = api.get_value("cmi.core.lesson_status");
        if status.is_empty() || status == "not attempted" {
            session.set_value("cmi.core.lesson_status", "incomplete");
            session.commit();
        }
        let resume = api.get_value("cmi.core.lesson_location");
        let start = deep_link
            .and_then(|id| course.page_index(id))
            .or_else(|| course.page_index(&resume))
            .unwrap_or(0);
        session.enter(start);
        session
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Id of the current page, `None` once finished.
    pub fn current_page(&self) -> Option<&str> {
        match self.position {
            Position::Page(i) => self.course.pages.get(i).map(|p| p.id.as_str()),
            Position::Finished => None,
        }
    }

    pub fn assessment_result(&self) -> Option<AssessmentOutcome> {
        self.assessment
    }

    /// API failures logged so far (`call: code message (diagnostic)`).
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn current_index(&self) -> usize {
        match self.position {
            Position::Page(i) => i,
            Position::Finished => self.course.pages.len(),
        }
    }

    fn is_blocking(&self, index: usize) -> bool {
        let Some(page) = self.course.pages.get(index) else {
            return false;
        };
        if page.has_knowledge_check && !self.checked.get(&page.id).copied().unwrap_or(false) {
            return true;
        }
        page.kind == "assessment" && !self.course.assessment.is_empty() && self.assessment.is_none()
    }

    /// Whether moving to `target` (page index, or `pages.len()` for the
    /// finished screen) is blocked.
    pub fn should_block(&self, target: usize) -> bool {
        if self.settings.navigation_mode != NavigationMode::Linear {
            return false;
        }
        (self.current_index()..target.min(self.course.pages.len())).any(|i| self.is_blocking(i))
    }

    pub fn next(&mut self) -> Result<Position, SessionError> {
        self.ensure_open()?;
        if self.position == Position::Finished {
            return Ok(self.position);
        }
        let target = self.current_index() + 1;
        if self.should_block(target) {
            return Err(SessionError::Blocked);
        }
        if target >= self.course.pages.len() {
            self.finish_course();
        } else {
            self.enter(target);
        }
        Ok(self.position)
    }

    pub fn back(&mut self) -> Result<Position, SessionError> {
        self.ensure_open()?;
        match self.position {
            Position::Finished => {
                let last = self.course.pages.len().saturating_sub(1);
                self.enter(last);
            }
            Position::Page(i) if i > 0 => self.enter(i - 1),
            Position::Page(_) => {}
        }
        Ok(self.position)
    }

    /// Outline navigation. Backward jumps are never blocked.
    pub fn go_to(&mut self, index: usize) -> Result<Position, SessionError> {
        self.ensure_open()?;
        if index >= self.course.pages.len() {
            return Err(SessionError::OutOfRange(index));
        }
        if index > self.current_index() && self.should_block(index) {
            return Err(SessionError::Blocked);
        }
        self.enter(index);
        Ok(self.position)
    }

    /// Grade a knowledge check. `answers` maps question id → input value.
    ///
    /// Missing answers leave all state untouched.
    pub fn submit_knowledge_check(
        &mut self,
        page_id: &str,
        answers: &BTreeMap<String, String>,
    ) -> Result<Vec<QuestionOutcome>, SessionError> {
        self.ensure_open()?;
        let questions = self
            .course
            .knowledge_checks
            .get(page_id)
            .ok_or_else(|| SessionError::NoKnowledgeCheck(page_id.to_string()))?;
        let missing: Vec<String> = questions
            .iter()
            .filter(|q| !answers.contains_key(&q.id))
            .map(|q| q.id.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SessionError::Unanswered(missing));
        }
        let outcomes = questions
            .iter()
            .map(|q| {
                let correct = answers.get(&q.id).is_some_and(|v| q.is_correct(v));
                QuestionOutcome {
                    id: q.id.clone(),
                    correct,
                    feedback: if correct {
                        q.correct_feedback.clone()
                    } else {
                        q.incorrect_feedback.clone()
                    },
                }
            })
            .collect();
        self.answered.insert(page_id.to_string(), answers.clone());
        self.checked.insert(page_id.to_string(), true);
        Ok(outcomes)
    }

    /// Score the assessment and report it.
    pub fn submit_assessment(
        &mut self,
        answers: &BTreeMap<String, String>,
    ) -> Result<AssessmentOutcome, SessionError> {
        self.ensure_open()?;
        if self.assessment.is_some() && !self.settings.allow_retake {
            return Err(SessionError::RetakeNotAllowed);
        }
        let questions = &self.course.assessment;
        if questions.is_empty() {
            return Err(SessionError::EmptyAssessment);
        }
        let missing: Vec<String> = questions
            .iter()
            .filter(|q| !answers.contains_key(&q.id))
            .map(|q| q.id.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SessionError::Unanswered(missing));
        }
        let correct = questions
            .iter()
            .filter(|q| answers.get(&q.id).is_some_and(|v| q.is_correct(v)))
            .count();
        let total = questions.len();
        let percentage = score_percentage(correct, total);
        let passed = percentage >= self.course.pass_mark;
        self.report_score(percentage, passed);
        let outcome = AssessmentOutcome {
            correct,
            total,
            percentage,
            passed,
        };
        self.assessment = Some(outcome);
        self.answered.insert("assessment".to_string(), answers.clone());
        Ok(outcome)
    }

    /// Commit and close the LMS session. The only place `LMSFinish` is called.
    pub fn exit(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.commit();
        if self.api.finish() != "true" {
            self.log_error("LMSFinish");
        }
        self.terminated = true;
        Ok(())
    }

    fn report_score(&mut self, percentage: u8, passed: bool) {
        for step in REPORT_SEQUENCE {
            match step {
                ReportStep::SetValue(element, value) => {
                    let value = match value {
                        ReportValue::Literal(v) => v.to_string(),
                        ReportValue::Percentage => percentage.to_string(),
                        ReportValue::LessonStatus if passed => "passed".to_string(),
                        ReportValue::LessonStatus => "failed".to_string(),
                    };
                    self.set_value(element, &value);
                }
                ReportStep::Commit => self.commit(),
            }
        }
    }

    fn finish_course(&mut self) {
        self.position = Position::Finished;
        if self.course.assessment.is_empty() {
            self.set_value("cmi.core.lesson_status", "completed");
            self.commit();
        }
    }

    fn enter(&mut self, index: usize) {
        self.position = Position::Page(index);
        if let Some(page) = self.course.pages.get(index) {
            let id = page.id.clone();
            self.set_value("cmi.core.lesson_location", &id);
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.terminated {
            Err(SessionError::Terminated)
        } else {
            Ok(())
        }
    }

    fn set_value(&mut self, element: &str, value: &str) {
        if self.api.set_value(element, value) != "true" {
            self.log_error(&format!("LMSSetValue({element})"));
        }
    }

    fn commit(&mut self) {
        if self.api.commit() != "true" {
            self.log_error("LMSCommit");
        }
    }

    fn log_error(&mut self, call: &str) {
        let code = self.api.last_error();
        let message = self.api.error_string(&code);
        let diagnostic = self.api.diagnostic(&code);
        tracing::warn!(call, code = %code, message = %message, "SCORM call failed");
        self.errors
            .push(format!("{call}: {code} {message} ({diagnostic})"));
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::runtime::{RuntimeAnswer, RuntimePage, RuntimeQuestion};
    use crate::types::QuestionKind;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ApiCall {
        Initialize,
        GetValue(String),
        SetValue(String, String),
        Commit,
        Finish,
    }

    /// Recording LMS API. Uses Mutex so calls through `&self` can record.
    #[derive(Default)]
    pub struct MockApi {
        pub calls: Mutex<Vec<ApiCall>>,
        pub stored: Mutex<HashMap<String, String>>,
        /// Elements whose `LMSSetValue` answers `"false"`.
        pub failing: Vec<String>,
    }

    impl MockApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_value(self, element: &str, value: &str) -> Self {
            self.stored
                .lock()
                .unwrap()
                .insert(element.to_string(), value.to_string());
            self
        }

        pub fn get_calls(&self) -> Vec<ApiCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn stored(&self, element: &str) -> Option<String> {
            self.stored.lock().unwrap().get(element).cloned()
        }

        fn record(&self, call: ApiCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ScormApi for MockApi {
        fn initialize(&self) -> String {
            self.record(ApiCall::Initialize);
            "true".to_string()
        }

        fn get_value(&self, element: &str) -> String {
            self.record(ApiCall::GetValue(element.to_string()));
            self.stored(element).unwrap_or_default()
        }

        fn set_value(&self, element: &str, value: &str) -> String {
            self.record(ApiCall::SetValue(element.to_string(), value.to_string()));
            if self.failing.iter().any(|f| f == element) {
                return "false".to_string();
            }
            self.stored
                .lock()
                .unwrap()
                .insert(element.to_string(), value.to_string());
            "true".to_string()
        }

        fn commit(&self) -> String {
            self.record(ApiCall::Commit);
            "true".to_string()
        }

        fn finish(&self) -> String {
            self.record(ApiCall::Finish);
            "true".to_string()
        }

        fn last_error(&self) -> String {
            "351".to_string()
        }

        fn error_string(&self, _code: &str) -> String {
            "General Set Failure".to_string()
        }

        fn diagnostic(&self, _code: &str) -> String {
            "mock".to_string()
        }
    }

    /// The calls made from the first score write onward.
    pub fn report_calls(calls: &[ApiCall]) -> Vec<ApiCall> {
        let start = calls
            .iter()
            .position(|c| matches!(c, ApiCall::SetValue(e, _) if e == "cmi.core.score.min"))
            .unwrap_or(calls.len());
        calls[start..].to_vec()
    }

    fn question(id: &str, kind: QuestionKind, correct: RuntimeAnswer) -> RuntimeQuestion {
        RuntimeQuestion {
            id: id.to_string(),
            kind,
            correct,
            correct_feedback: "Correct!".to_string(),
            incorrect_feedback: "Not quite. Try again!".to_string(),
        }
    }

    fn page(id: &str, kind: &str, kc: bool) -> RuntimePage {
        RuntimePage {
            id: id.to_string(),
            title: id.to_string(),
            kind: kind.to_string(),
            path: format!("pages/{id}.html"),
            block: None,
            has_audio: false,
            has_knowledge_check: kc,
        }
    }

    fn course(assessment_size: usize) -> RuntimeCourse {
        let mut knowledge_checks = BTreeMap::new();
        knowledge_checks.insert(
            "topic-1".to_string(),
            vec![question(
                "q1",
                QuestionKind::MultipleChoice,
                RuntimeAnswer::Text("Paris".to_string()),
            )],
        );
        RuntimeCourse {
            title: "Geo".to_string(),
            pass_mark: 80,
            pages: vec![
                page("welcome", "welcome", false),
                page("objectives", "objectives", false),
                page("topic-1", "topic", true),
                page("assessment", "assessment", false),
            ],
            knowledge_checks,
            assessment: (0..assessment_size)
                .map(|i| {
                    question(
                        &format!("a{}", i + 1),
                        QuestionKind::TrueFalse,
                        RuntimeAnswer::Boolean(true),
                    )
                })
                .collect(),
        }
    }

    fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn score_percentage_rounds() {
        assert_eq!(score_percentage(1, 10), 10);
        assert_eq!(score_percentage(5, 10), 50);
        assert_eq!(score_percentage(10, 10), 100);
        assert_eq!(score_percentage(1, 3), 33);
        assert_eq!(score_percentage(2, 3), 67);
        assert_eq!(score_percentage(0, 0), 0);
    }

    #[test]
    fn report_sequence_is_scorm_12_order() {
        let elements: Vec<&str> = REPORT_SEQUENCE
            .iter()
            .filter_map(|s| match s {
                ReportStep::SetValue(e, _) => Some(*e),
                ReportStep::Commit => None,
            })
            .collect();
        assert_eq!(
            elements,
            vec![
                "cmi.core.score.min",
                "cmi.core.score.max",
                "cmi.core.score.raw",
                "cmi.core.lesson_status"
            ]
        );
        let commits = REPORT_SEQUENCE
            .iter()
            .filter(|s| **s == ReportStep::Commit)
            .count();
        assert_eq!(commits, 2);
    }

    #[test]
    fn report_step_js() {
        assert_eq!(
            REPORT_SEQUENCE[0].to_js(),
            r#"scormSetValue(ctx, "cmi.core.score.min", "0");"#
        );
        assert_eq!(
            REPORT_SEQUENCE[2].to_js(),
            r#"scormSetValue(ctx, "cmi.core.score.raw", String(percentage));"#
        );
        assert_eq!(REPORT_SEQUENCE[3].to_js(), "scormCommit(ctx);");
    }

    #[test]
    fn start_marks_incomplete_and_starts_at_welcome() {
        let api = MockApi::new();
        let course = course(1);
        let session = Session::start(&api, &course, RuntimeSettings::default(), None);
        assert_eq!(session.current_page(), Some("welcome"));
        assert_eq!(
            api.stored("cmi.core.lesson_status").as_deref(),
            Some("incomplete")
        );
        assert_eq!(api.get_calls()[0], ApiCall::Initialize);
    }

    #[test]
    fn start_resumes_location_and_honors_deep_link() {
        let course = course(1);
        let api = MockApi::new()
            .with_value("cmi.core.lesson_status", "incomplete")
            .with_value("cmi.core.lesson_location", "topic-1");
        let session = Session::start(&api, &course, RuntimeSettings::default(), None);
        assert_eq!(session.current_page(), Some("topic-1"));
        assert!(!api
            .get_calls()
            .contains(&ApiCall::SetValue("cmi.core.lesson_status".into(), "incomplete".into())));

        let api = MockApi::new().with_value("cmi.core.lesson_location", "topic-1");
        let session = Session::start(&api, &course, RuntimeSettings::default(), Some("objectives"));
        assert_eq!(session.current_page(), Some("objectives"));
    }

    #[test]
    fn linear_mode_blocks_until_knowledge_check_submitted() {
        let api = MockApi::new();
        let course = course(1);
        let mut session = Session::start(&api, &course, RuntimeSettings::default(), None);
        session.next().unwrap();
        session.next().unwrap();
        assert_eq!(session.current_page(), Some("topic-1"));
        assert_eq!(session.next(), Err(SessionError::Blocked));

        let err = session
            .submit_knowledge_check("topic-1", &BTreeMap::new())
            .unwrap_err();
        assert_eq!(err, SessionError::Unanswered(vec!["q1".to_string()]));
        assert_eq!(session.next(), Err(SessionError::Blocked));

        let outcomes = session
            .submit_knowledge_check("topic-1", &answers(&[("q1", "Lyon")]))
            .unwrap();
        assert!(!outcomes[0].correct);
        assert_eq!(outcomes[0].feedback, "Not quite. Try again!");
        assert_eq!(session.next(), Ok(Position::Page(3)));
    }

    #[test]
    fn free_mode_never_blocks() {
        let api = MockApi::new();
        let course = course(1);
        let settings = RuntimeSettings {
            navigation_mode: NavigationMode::Free,
            ..RuntimeSettings::default()
        };
        let mut session = Session::start(&api, &course, settings, None);
        assert_eq!(session.go_to(3), Ok(Position::Page(3)));
        assert_eq!(session.next(), Ok(Position::Finished));
    }

    #[test]
    fn outline_jump_forward_is_blocked_backward_is_not() {
        let api = MockApi::new();
        let course = course(1);
        let mut session = Session::start(&api, &course, RuntimeSettings::default(), None);
        assert_eq!(session.go_to(3), Err(SessionError::Blocked));
        assert_eq!(session.go_to(2), Ok(Position::Page(2)));
        assert_eq!(session.go_to(0), Ok(Position::Page(0)));
        assert_eq!(session.go_to(9), Err(SessionError::OutOfRange(9)));
    }

    #[test]
    fn assessment_reports_exact_sequence_without_finish() {
        let api = MockApi::new();
        let course = course(2);
        let mut session = Session::start(&api, &course, RuntimeSettings::default(), None);
        let outcome = session
            .submit_assessment(&answers(&[("a1", "true"), ("a2", "false")]))
            .unwrap();
        assert_eq!(outcome.percentage, 50);
        assert!(!outcome.passed);

        let calls = report_calls(&api.get_calls());
        assert_eq!(
            calls,
            vec![
                ApiCall::SetValue("cmi.core.score.min".into(), "0".into()),
                ApiCall::SetValue("cmi.core.score.max".into(), "100".into()),
                ApiCall::SetValue("cmi.core.score.raw".into(), "50".into()),
                ApiCall::Commit,
                ApiCall::SetValue("cmi.core.lesson_status".into(), "failed".into()),
                ApiCall::Commit,
            ]
        );
        assert!(!api.get_calls().contains(&ApiCall::Finish));
    }

    #[test]
    fn all_correct_passes() {
        let api = MockApi::new();
        let course = course(2);
        let mut session = Session::start(&api, &course, RuntimeSettings::default(), None);
        let outcome = session
            .submit_assessment(&answers(&[("a1", "true"), ("a2", "true")]))
            .unwrap();
        assert_eq!(outcome.percentage, 100);
        assert_eq!(api.stored("cmi.core.score.raw").as_deref(), Some("100"));
        assert_eq!(
            api.stored("cmi.core.lesson_status").as_deref(),
            Some("passed")
        );
    }

    #[test]
    fn unanswered_assessment_reports_nothing() {
        let api = MockApi::new();
        let course = course(2);
        let mut session = Session::start(&api, &course, RuntimeSettings::default(), None);
        let err = session
            .submit_assessment(&answers(&[("a1", "true")]))
            .unwrap_err();
        assert_eq!(err, SessionError::Unanswered(vec!["a2".to_string()]));
        assert!(report_calls(&api.get_calls()).is_empty());
        assert!(session.assessment_result().is_none());
    }

    #[test]
    fn retake_policy() {
        let api = MockApi::new();
        let course = course(1);
        let settings = RuntimeSettings {
            allow_retake: false,
            ..RuntimeSettings::default()
        };
        let mut session = Session::start(&api, &course, settings, None);
        session.submit_assessment(&answers(&[("a1", "false")])).unwrap();
        assert_eq!(
            session.submit_assessment(&answers(&[("a1", "true")])),
            Err(SessionError::RetakeNotAllowed)
        );

        let mut session = Session::start(&api, &course, RuntimeSettings::default(), None);
        session.submit_assessment(&answers(&[("a1", "false")])).unwrap();
        let second = session.submit_assessment(&answers(&[("a1", "true")])).unwrap();
        assert!(second.passed);
    }

    #[test]
    fn empty_assessment_is_not_scored() {
        let api = MockApi::new();
        let course = course(0);
        let mut session = Session::start(&api, &course, RuntimeSettings::default(), Some("assessment"));
        assert_eq!(
            session.submit_assessment(&BTreeMap::new()),
            Err(SessionError::EmptyAssessment)
        );
        assert_eq!(session.next(), Ok(Position::Finished));
        assert_eq!(
            api.stored("cmi.core.lesson_status").as_deref(),
            Some("completed")
        );
        assert!(report_calls(&api.get_calls()).is_empty());
    }

    #[test]
    fn finished_requires_submitted_assessment_in_linear_mode() {
        let api = MockApi::new();
        let course = course(1);
        let mut session = Session::start(&api, &course, RuntimeSettings::default(), Some("assessment"));
        assert_eq!(session.next(), Err(SessionError::Blocked));
        session.submit_assessment(&answers(&[("a1", "true")])).unwrap();
        assert_eq!(session.next(), Ok(Position::Finished));
        assert_eq!(session.back(), Ok(Position::Page(3)));
    }

    #[test]
    fn failed_set_value_is_logged_and_does_not_block() {
        let api = MockApi {
            failing: vec!["cmi.core.score.raw".to_string()],
            ..MockApi::default()
        };
        let course = course(1);
        let mut session = Session::start(&api, &course, RuntimeSettings::default(), Some("assessment"));
        let outcome = session.submit_assessment(&answers(&[("a1", "true")])).unwrap();
        assert!(outcome.passed);
        assert_eq!(session.errors().len(), 1);
        assert!(session.errors()[0].starts_with("LMSSetValue(cmi.core.score.raw): 351"));
        assert_eq!(
            api.stored("cmi.core.lesson_status").as_deref(),
            Some("passed")
        );
        assert_eq!(session.next(), Ok(Position::Finished));
    }

    #[test]
    fn exit_is_the_only_finish() {
        let api = MockApi::new();
        let course = course(1);
        let mut session = Session::start(&api, &course, RuntimeSettings::default(), None);
        session.submit_assessment(&answers(&[("a1", "true")])).unwrap();
        assert!(!api.get_calls().contains(&ApiCall::Finish));
        session.exit().unwrap();
        let calls = api.get_calls();
        assert_eq!(calls.iter().filter(|c| **c == ApiCall::Finish).count(), 1);
        assert_eq!(calls[calls.len() - 2], ApiCall::Commit);
        assert_eq!(session.next(), Err(SessionError::Terminated));
        assert_eq!(session.exit(), Err(SessionError::Terminated));
    }
}
