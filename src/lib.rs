/*!
 * # scriptreel
 *
 * A Rust library for turning a structured dialogue script into a
 * synchronized multi-track media bundle: per-line narration audio, matching
 * illustrative images, background music sized to total runtime, and
 * supplementary stock footage, reconciled into a time-indexed timeline.
 *
 * ## Features
 *
 * - Parse two-speaker dialogue scripts with stage directions and
 *   `{surface|reading}` pronunciation annotations
 * - Parse timestamped image-prompt listings into scene descriptors
 * - Drive generation through pluggable adapters (TTS, image, BGM, stock)
 * - Automatic retry with exponential backoff and rate-limit adaptation
 * - Partial-failure recovery: one bad unit never aborts a run
 * - Editing-bundle output (numbered assets + timeline table) or a render
 *   manifest for an external compositor
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `script_parser`: Dialogue script parsing
 * - `prompt_parser`: Timestamped image-prompt parsing
 * - `retry`: Backoff/rate-limit wrapper for adapter calls
 * - `adapters`: Generation adapter contracts and concrete clients:
 *   - `adapters::tts`: Gemini speech synthesis
 *   - `adapters::image`: Gemini image generation
 *   - `adapters::bgm`: Beatoven music composition
 *   - `adapters::stock`: Pexels footage search
 * - `pipeline`: Orchestration, job state tracking, timeline assembly
 * - `file_utils`: Output directory layout
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod adapters;
pub mod app_config;
pub mod errors;
pub mod file_utils;
pub mod pipeline;
pub mod prompt_parser;
pub mod retry;
pub mod script_parser;

// Re-export main types for easier usage
pub use app_config::{Config, OutputMode};
pub use errors::{AdapterError, AdapterFamily, AppError, ConfigError, ParseError};
pub use pipeline::{PipelineOrchestrator, RunOutcome, Timeline, TimelineEntry};
pub use prompt_parser::{PromptBlockParser, SceneDescriptor};
pub use retry::{RetryOutcome, RetryPolicy};
pub use script_parser::{ScriptParser, Utterance};
