use std::fmt;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ParseError;

// @module: Dialogue script parsing

// @const: Speaker prefix regex ("speaker1:", "Speaker 2:" both accepted)
static SPEAKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(speaker\s*\d+):\s*(.+)$").unwrap()
});

// @const: Parenthetical stage-direction regex
static PAREN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

// @const: Ruby annotation regex, {surface|reading} with non-empty parts
static RUBY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([^{}|]+)\|([^{}|]+)\}").unwrap()
});

/// One parsed line of dialogue.
///
/// Created once per parse pass and immutable thereafter; audio generation
/// reads it, later stages never mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Normalized speaker identifier ("speaker1", "speaker2", ...)
    pub speaker_id: String,

    /// Line text with stage directions removed and ruby annotations
    /// replaced by their surface forms
    pub display_text: String,

    /// Ordered (surface, reading) pairs extracted from `{surface|reading}`
    /// markers; the reading feeds pronunciation, the surface any on-screen text
    pub reading_annotations: Vec<(String, String)>,

    /// 0-based position in the parsed sequence; dense and monotonic, drives
    /// output ordering and filename numbering
    pub sequence_index: usize,
}

impl Utterance {
    /// Text to hand to speech synthesis: `display_text` with each annotated
    /// surface form replaced by its reading, left to right, first occurrence.
    pub fn reading_text(&self) -> String {
        let mut text = self.display_text.clone();
        let mut search_from = 0;
        for (surface, reading) in &self.reading_annotations {
            if let Some(pos) = text[search_from..].find(surface.as_str()) {
                let at = search_from + pos;
                text.replace_range(at..at + surface.len(), reading);
                search_from = at + reading.len();
            }
        }
        text
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.sequence_index, self.speaker_id, self.display_text)
    }
}

/// Parser turning raw script text into an ordered utterance sequence.
///
/// Parsing is a pure function of the input text: the same text always yields
/// the identical sequence. A malformed script is rejected wholesale rather
/// than partially processed, since downstream ordering depends on a fully
/// valid sequence.
pub struct ScriptParser;

impl ScriptParser {
    /// Parse raw script text into utterances.
    ///
    /// Empty lines and `#` comment lines are skipped; any other line without
    /// a recognizable speaker prefix fails the parse. `sequence_index` is
    /// assigned after filtering, so gaps in the raw file do not create gaps
    /// in the index.
    pub fn parse(text: &str) -> Result<Vec<Utterance>, ParseError> {
        let mut utterances = Vec::new();

        for (line_idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line_no = line_idx + 1;
            let captures = SPEAKER_REGEX.captures(line).ok_or_else(|| {
                ParseError::UnrecognizedLine { line_no, content: line.to_string() }
            })?;

            // Normalize "Speaker 1" to "speaker1"
            let speaker_id = captures[1].to_lowercase().replace(' ', "");
            let body = captures[2].trim();

            // Stage directions are dropped entirely, never sent downstream
            let without_parens = PAREN_REGEX.replace_all(body, "");
            let without_parens = without_parens.trim();

            let (display_text, reading_annotations) =
                Self::extract_annotations(without_parens, line_no, line)?;

            utterances.push(Utterance {
                speaker_id,
                display_text,
                reading_annotations,
                sequence_index: utterances.len(),
            });
        }

        Ok(utterances)
    }

    // @extracts: (display_text, annotations) from ruby-annotated text
    // @fails: when braces remain after all well-formed markers are consumed
    fn extract_annotations(
        text: &str,
        line_no: usize,
        original_line: &str,
    ) -> Result<(String, Vec<(String, String)>), ParseError> {
        let mut annotations = Vec::new();
        for captures in RUBY_REGEX.captures_iter(text) {
            annotations.push((captures[1].to_string(), captures[2].to_string()));
        }

        let display_text = RUBY_REGEX.replace_all(text, "$1").into_owned();

        // Leftover braces mean a marker the pattern could not consume:
        // missing delimiter, empty surface/reading, or unbalanced braces
        if display_text.contains('{') || display_text.contains('}') {
            return Err(ParseError::MalformedAnnotation {
                line_no,
                content: original_line.to_string(),
            });
        }

        Ok((display_text, annotations))
    }
}
