//! # scorm-forge
//!
//! Compiles an e-learning course document plus its media into a
//! self-contained SCORM 1.2 package: a zip holding a conformant manifest,
//! one HTML fragment per page, a stylesheet, the media files and a generated
//! JavaScript runtime that drives navigation, grading and score reporting
//! against the LMS-supplied SCORM API.
//!
//! # Architecture: One Pipeline, Six Stages
//!
//! ```text
//! 1. Normalize  course JSON       →  CourseDocument      (any legacy shape → one model)
//! 2. Media      document + assets →  ResolvedMedia       (block numbers, files, embeds)
//! 3. Pages      document + media  →  pages/*.html        (maud templates)
//! 4. Runtime    document + media  →  navigation.js       (state machine + SCORM client)
//! 5. Manifest   pages + media     →  imsmanifest.xml
//! 6. Package    everything        →  zip buffer          (verified before return)
//! ```
//!
//! Stages 3 and 4 only read the normalized document, so they run in parallel.
//! The pipeline holds no state between runs: the zip buffer, or an error, is
//! the only result.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`normalize`] | Stage 1: legacy course shapes into [`types::CourseDocument`] |
//! | [`media`] | Stage 2: asset lookup, remote fetch, clip timing, content-addressed dedup |
//! | [`render`] | Stage 3: page fragments and the `index.html` launch page |
//! | [`runtime`] | Stage 4: the emitted script, plus the same state machine modeled in Rust |
//! | [`manifest`] | Stage 5: `imsmanifest.xml` |
//! | [`package`] | Stage 6: zip assembly and archive inspection |
//! | [`compile`] | Runs the stages and reports progress |
//! | [`config`] | `scorm.toml` loading, validation and merging |
//! | [`naming`] | Block numbers, page ids and page-semantic media filenames |
//! | [`style`] | `styles/main.css` |
//! | [`types`] | The canonical course model |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Block Numbers Never Shift
//!
//! Narration and caption files are named by a four-digit block number:
//! welcome `0001`, objectives `0002`, topic *i* `0003 + i`. Numbers are
//! assigned whether or not a page has narration, so a recorded
//! `audio-0005.mp3` stays attached to the same topic when earlier pages gain
//! or lose audio.
//!
//! ## One Source for the Score Sequence
//!
//! The SCORM 1.2 call order on assessment completion (score min, max, raw,
//! commit, lesson status, commit) is a table in [`runtime::session`]. The
//! emitted `reportAssessmentScore` is generated from it and the Rust model
//! executes it, so tests against the model cover the script.
//!
//! ## Maud Over String Templates
//!
//! Pages are [Maud](https://maud.lambda.xyz/) templates over the typed model.
//! Interpolation is escaped; only authored page HTML is emitted raw.
//!
//! ## Deterministic Output
//!
//! The manifest identifier is derived from the course title and every zip
//! entry carries the same fixed timestamp, so rebuilding an unchanged course
//! yields identical bytes.

pub mod compile;
pub mod config;
pub mod manifest;
pub mod media;
pub mod naming;
pub mod normalize;
pub mod output;
pub mod package;
pub mod render;
pub mod runtime;
pub mod style;
pub mod types;
