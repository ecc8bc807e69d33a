use std::collections::HashSet;
use std::time::Duration;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ParseError;

// @module: Timestamped image-prompt block parsing

// @const: Prompt block regex, "[1] 0:00-0:15 | prompt text"
static PROMPT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(\d+)\]\s*([0-9:]+)\s*-\s*([0-9:]+)\s*\|\s*(.+)$").unwrap()
});

/// One parsed image-prompt entry with a time window.
///
/// Created once per parse pass, consumed by image generation, immutable.
/// Windows need not be contiguous or gapless across descriptors; overlap
/// across descriptors is permitted here and only flagged at assembly time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneDescriptor {
    /// Index from the prompt listing (the `[n]` field)
    pub scene_index: usize,

    /// Window start offset from the beginning of the piece
    pub start_offset: Duration,

    /// Window end offset; always greater than `start_offset`
    pub end_offset: Duration,

    /// Image generation prompt text
    pub prompt_text: String,
}

impl SceneDescriptor {
    /// Window length
    pub fn window(&self) -> Duration {
        self.end_offset - self.start_offset
    }
}

/// Parser for raw timestamped prompt listings.
pub struct PromptBlockParser;

impl PromptBlockParser {
    /// Parse a prompt listing into scene descriptors.
    ///
    /// Each non-empty line must match `[<index>] <start>-<end> | <prompt>`
    /// with clock fields as `M:SS` or `H:MM:SS`; anything else fails the
    /// whole parse. Scene indices must be unique: every index reserves one
    /// artifact path, so a repeated index would hand two concurrent jobs the
    /// same output file.
    pub fn parse(text: &str) -> Result<Vec<SceneDescriptor>, ParseError> {
        let mut scenes = Vec::new();
        let mut seen_indices = HashSet::new();

        for (line_idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line_no = line_idx + 1;
            let captures = PROMPT_REGEX.captures(line).ok_or_else(|| {
                ParseError::MalformedPromptBlock { line_no, content: line.to_string() }
            })?;

            let scene_index: usize = captures[1].parse().map_err(|_| {
                ParseError::MalformedPromptBlock { line_no, content: line.to_string() }
            })?;
            if !seen_indices.insert(scene_index) {
                return Err(ParseError::DuplicateSceneIndex { line_no, scene_index });
            }
            let start_secs = Self::parse_clock(&captures[2], line_no)?;
            let end_secs = Self::parse_clock(&captures[3], line_no)?;

            if start_secs >= end_secs {
                return Err(ParseError::InvalidWindow { line_no, start_secs, end_secs });
            }

            scenes.push(SceneDescriptor {
                scene_index,
                start_offset: Duration::from_secs(start_secs),
                end_offset: Duration::from_secs(end_secs),
                prompt_text: captures[4].trim().to_string(),
            });
        }

        Ok(scenes)
    }

    /// Parse an `M:SS` or `H:MM:SS` clock field to whole seconds.
    pub fn parse_clock(value: &str, line_no: usize) -> Result<u64, ParseError> {
        let invalid = || ParseError::InvalidClock { line_no, value: value.to_string() };

        let parts: Vec<&str> = value.split(':').collect();
        let numbers: Vec<u64> = parts
            .iter()
            .map(|p| p.parse::<u64>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;

        match numbers.as_slice() {
            [minutes, seconds] => {
                if *seconds >= 60 {
                    return Err(invalid());
                }
                Ok(minutes * 60 + seconds)
            }
            [hours, minutes, seconds] => {
                if *minutes >= 60 || *seconds >= 60 {
                    return Err(invalid());
                }
                Ok(hours * 3_600 + minutes * 60 + seconds)
            }
            _ => Err(invalid()),
        }
    }
}
