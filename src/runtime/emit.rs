//! Assembly of `scripts/navigation.js`.
//!
//! The script is one IIFE. Shared bindings (`COURSE`, `SELECTORS`,
//! `SETTINGS`, `ScormRuntime`) are registered through
//! [`RuntimeScript::declare`] and written once at the top; every function is
//! registered through [`RuntimeScript::define`]. Both reject a name that is
//! already taken, so a redeclared binding cannot be assembled. An exported
//! function is followed immediately by its `ScormRuntime.<name> = <name>;`
//! line, so inline bootstrap code can call it as soon as the script has run
//! up to that point.
//!
//! Function sources live in `static/runtime/*.js`: top-level `function`
//! declarations only, optionally preceded by `//` comments. Shared state is
//! never declared there; it is threaded through an explicit `ctx` object
//! created by `createContext`.

use super::selectors::SELECTORS;
use super::session::REPORT_SEQUENCE;
use super::{RuntimeCourse, RuntimeSettings};
use crate::render::GenerationError;
use serde::Serialize;
use std::collections::HashSet;

const FUNCTION_SOURCES: [(&str, &str); 4] = [
    ("scorm.js", include_str!("../../static/runtime/scorm.js")),
    ("navigation.js", include_str!("../../static/runtime/navigation.js")),
    ("grading.js", include_str!("../../static/runtime/grading.js")),
    ("audio.js", include_str!("../../static/runtime/audio.js")),
];

const BOOTSTRAP_SOURCE: (&str, &str) = (
    "bootstrap.js",
    include_str!("../../static/runtime/bootstrap.js"),
);

/// Functions reachable as `ScormRuntime.<name>`.
pub const EXPORTS: [&str; 8] = [
    "initializeCourse",
    "goNext",
    "goBack",
    "goToPage",
    "exitCourse",
    "submitAssessment",
    "toggleAudio",
    "scorePercentage",
];

/// Module-scope bindings, each declared exactly once.
pub const SHARED_BINDINGS: [&str; 4] = ["COURSE", "SELECTORS", "SETTINGS", "ScormRuntime"];

/// SCORM 2004 data model elements; never written in 1.2 mode.
const SCORM_2004_ELEMENTS: [&str; 5] = [
    "cmi.success_status",
    "cmi.completion_status",
    "cmi.score.",
    "cmi.progress_measure",
    "cmi.session_time",
];

const INDENT: &str = "  ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFunction {
    pub name: String,
    /// `//` lines written directly above the declaration.
    pub comments: Vec<String>,
    /// Full declaration, `function name(...) { ... }`, at column 0.
    pub source: String,
}

#[derive(Debug, Default)]
pub struct RuntimeScript {
    bindings: Vec<(String, String)>,
    functions: Vec<(ScriptFunction, bool)>,
    names: HashSet<String>,
}

impl RuntimeScript {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&mut self, name: &str) -> Result<(), GenerationError> {
        if !self.names.insert(name.to_string()) {
            return Err(GenerationError::Script(format!(
                "`{name}` is declared more than once"
            )));
        }
        Ok(())
    }

    /// Register a shared module-scope `const`.
    pub fn declare(&mut self, name: &str, expression: String) -> Result<(), GenerationError> {
        self.claim(name)?;
        self.bindings.push((name.to_string(), expression));
        Ok(())
    }

    pub fn define(&mut self, function: ScriptFunction, export: bool) -> Result<(), GenerationError> {
        if !function
            .source
            .starts_with(&format!("function {}(", function.name))
        {
            return Err(GenerationError::Script(format!(
                "source of `{}` does not start with its declaration",
                function.name
            )));
        }
        if SHARED_BINDINGS
            .iter()
            .any(|b| declares_binding(&function.source, b))
        {
            return Err(GenerationError::Script(format!(
                "`{}` redeclares a shared binding",
                function.name
            )));
        }
        self.claim(&function.name)?;
        self.functions.push((function, export));
        Ok(())
    }

    /// Define every function of a source file.
    pub fn define_source(&mut self, file: &str, source: &str) -> Result<(), GenerationError> {
        for function in parse_functions(file, source)? {
            let export = EXPORTS.contains(&function.name.as_str());
            self.define(function, export)?;
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(concat!(
            "/* Generated by scorm-forge ",
            env!("CARGO_PKG_VERSION"),
            ". SCORM 1.2 navigation runtime. */\n"
        ));
        out.push_str("(function (global) {\n");
        out.push_str(INDENT);
        out.push_str("\"use strict\";\n\n");
        for (name, expression) in &self.bindings {
            out.push_str(&format!("{INDENT}const {name} = {expression};\n"));
        }
        for (function, export) in &self.functions {
            out.push('\n');
            for comment in &function.comments {
                out.push_str(INDENT);
                out.push_str(comment);
                out.push('\n');
            }
            for line in function.source.trim_end().lines() {
                if !line.is_empty() {
                    out.push_str(INDENT);
                    out.push_str(line);
                }
                out.push('\n');
            }
            if *export {
                out.push_str(&format!(
                    "{INDENT}ScormRuntime.{name} = {name};\n",
                    name = function.name
                ));
            }
        }
        out.push_str("})(typeof window !== \"undefined\" ? window : this);\n");
        out
    }
}

fn declares_binding(source: &str, name: &str) -> bool {
    ["const", "let", "var"].iter().any(|kw| {
        source.contains(&format!("{kw} {name} ")) || source.contains(&format!("{kw} {name}="))
    })
}

/// Split a source file into its top-level function declarations.
pub fn parse_functions(file: &str, source: &str) -> Result<Vec<ScriptFunction>, GenerationError> {
    let mut functions = Vec::new();
    let mut comments: Vec<String> = Vec::new();
    let mut current: Option<(String, Vec<String>, Vec<&str>)> = None;

    for (number, line) in source.lines().enumerate() {
        if let Some((name, doc, mut body)) = current.take() {
            body.push(line);
            if line == "}" {
                functions.push(ScriptFunction {
                    name,
                    comments: doc,
                    source: body.join("\n"),
                });
            } else {
                current = Some((name, doc, body));
            }
            continue;
        }
        if line.trim().is_empty() {
            comments.clear();
        } else if line.starts_with("//") {
            comments.push(line.to_string());
        } else if let Some(rest) = line.strip_prefix("function ") {
            let name = rest
                .split('(')
                .next()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    GenerationError::Script(format!("{file}:{}: unnamed function", number + 1))
                })?
                .to_string();
            let doc = std::mem::take(&mut comments);
            if line.trim_end().ends_with('}') {
                functions.push(ScriptFunction {
                    name,
                    comments: doc,
                    source: line.to_string(),
                });
            } else {
                current = Some((name, doc, vec![line]));
            }
        } else {
            return Err(GenerationError::Script(format!(
                "{file}:{}: only function declarations are allowed at top level",
                number + 1
            )));
        }
    }
    if let Some((name, _, _)) = current {
        return Err(GenerationError::Script(format!(
            "{file}: function `{name}` is not closed"
        )));
    }
    Ok(functions)
}

/// `reportAssessmentScore(ctx, percentage)`, generated from [`REPORT_SEQUENCE`].
pub fn report_function() -> ScriptFunction {
    let mut source = String::from("function reportAssessmentScore(ctx, percentage) {\n");
    for step in REPORT_SEQUENCE {
        source.push_str(INDENT);
        source.push_str(&step.to_js());
        source.push('\n');
    }
    source.push('}');
    ScriptFunction {
        name: "reportAssessmentScore".to_string(),
        comments: vec!["// Score reporting; calls are issued in this order.".to_string()],
        source,
    }
}

/// Serialize `value` as a JavaScript literal.
fn js_literal(value: &impl Serialize) -> Result<String, GenerationError> {
    let json = serde_json::to_string(value)
        .map_err(|e| GenerationError::Script(format!("could not serialize runtime data: {e}")))?;
    Ok(json
        .replace("</", "<\\/")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}

/// Assemble and check the complete runtime script.
pub fn emit_runtime(
    course: &RuntimeCourse,
    settings: RuntimeSettings,
) -> Result<String, GenerationError> {
    let mut script = RuntimeScript::new();
    script.declare("COURSE", js_literal(course)?)?;
    script.declare("SELECTORS", js_literal(&SELECTORS)?)?;
    script.declare("SETTINGS", js_literal(&settings)?)?;
    script.declare(
        "ScormRuntime",
        "(global.ScormRuntime = global.ScormRuntime || {})".to_string(),
    )?;
    for (file, source) in FUNCTION_SOURCES {
        script.define_source(file, source)?;
    }
    script.define(report_function(), false)?;
    script.define_source(BOOTSTRAP_SOURCE.0, BOOTSTRAP_SOURCE.1)?;

    let text = script.render();
    validate_script(&text)?;
    tracing::debug!(bytes = text.len(), "Emitted runtime script");
    Ok(text)
}

/// Structural checks on an assembled script.
pub fn validate_script(script: &str) -> Result<(), GenerationError> {
    let fail = |reason: String| Err(GenerationError::Script(reason));

    for name in SHARED_BINDINGS {
        let count = ["const", "let", "var"]
            .iter()
            .map(|kw| script.matches(&format!("{kw} {name} ")).count())
            .sum::<usize>();
        if count != 1 {
            return fail(format!("shared binding `{name}` is declared {count} times"));
        }
    }

    let lines: Vec<&str> = script.lines().collect();
    let mut defined: HashSet<&str> = HashSet::new();
    let mut chunks: Vec<(&str, usize, usize)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let Some(rest) = line.strip_prefix("  function ") else {
            continue;
        };
        let name = rest.split('(').next().unwrap_or("").trim();
        if !defined.insert(name) {
            return fail(format!("function `{name}` is declared more than once"));
        }
        let end = lines[i..]
            .iter()
            .position(|l| *l == "  }" || (l.starts_with("  function ") && l.ends_with('}')))
            .map(|offset| i + offset);
        match end {
            Some(end) => chunks.push((name, i, end)),
            None => return fail(format!("function `{name}` is not closed")),
        }
    }

    for export in EXPORTS {
        let assignment = format!("  ScormRuntime.{export} = {export};");
        let Some(&(_, _, end)) = chunks.iter().find(|(name, _, _)| *name == export) else {
            return fail(format!("exported function `{export}` is not defined"));
        };
        if lines.get(end + 1) != Some(&assignment.as_str()) {
            return fail(format!(
                "`{export}` must be exposed on ScormRuntime right after its definition"
            ));
        }
        if lines.iter().filter(|l| **l == assignment).count() != 1 {
            return fail(format!("`{export}` is exposed more than once"));
        }
    }

    for element in SCORM_2004_ELEMENTS {
        if script.contains(element) {
            return fail(format!("SCORM 2004 element `{element}` used in 1.2 mode"));
        }
    }

    let finish_calls = script.matches(".LMSFinish(").count();
    if finish_calls != 1 {
        return fail(format!("expected one LMSFinish call, found {finish_calls}"));
    }
    let in_exit = chunks
        .iter()
        .find(|(name, _, _)| *name == "exitCourse")
        .is_some_and(|(_, start, end)| {
            lines[*start..=*end]
                .iter()
                .any(|l| l.contains(".LMSFinish("))
        });
    if !in_exit {
        return fail("LMSFinish may only be called from exitCourse".to_string());
    }
    Ok(())
}
