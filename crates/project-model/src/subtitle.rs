//! Subtitle timeline types.
//!
//! A timeline is an ordered, non-overlapping sequence of lines. Validation
//! lives here with the data; renderers consume timelines read-only and
//! never re-check them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Timing for a single word inside a subtitle line (karaoke highlighting).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// A single subtitle line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleLine {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,

    /// Optional word-level sub-timings, in order.
    #[serde(default)]
    pub words: Vec<WordTiming>,

    /// Per-line style overrides (font, color, ...), opaque to the model.
    #[serde(default)]
    pub style_overrides: BTreeMap<String, serde_json::Value>,
}

/// A complete subtitle timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleData {
    pub lines: Vec<SubtitleLine>,

    #[serde(default)]
    pub global_style: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Timeline validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubtitleError {
    #[error("{what} has a negative time")]
    NegativeTime { what: String },

    #[error("{what} must start before it ends ({start} >= {end})")]
    EmptySpan { what: String, start: f64, end: f64 },

    #[error("{what} has empty text")]
    EmptyText { what: String },

    #[error("line {line}: word {word} lies outside the line span")]
    WordOutsideLine { line: usize, word: usize },

    #[error("line {line}: words {first} and {second} overlap")]
    WordsOverlap {
        line: usize,
        first: usize,
        second: usize,
    },

    #[error("line {line}: word list does not match line text")]
    WordTextMismatch { line: usize },

    #[error("lines {first} and {second} overlap")]
    LinesOverlap { first: usize, second: usize },
}

fn check_span(what: impl Fn() -> String, start: f64, end: f64) -> Result<(), SubtitleError> {
    if start < 0.0 || end < 0.0 {
        return Err(SubtitleError::NegativeTime { what: what() });
    }
    if start >= end {
        return Err(SubtitleError::EmptySpan {
            what: what(),
            start,
            end,
        });
    }
    Ok(())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl WordTiming {
    pub fn new(word: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            word: word.into(),
            start_time,
            end_time,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn overlaps(&self, other: &WordTiming) -> bool {
        !(self.end_time <= other.start_time || self.start_time >= other.end_time)
    }
}

impl SubtitleLine {
    /// A line without word timings or style overrides.
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
            words: Vec::new(),
            style_overrides: BTreeMap::new(),
        }
    }

    /// Builder-style word timings.
    pub fn with_words(mut self, words: Vec<WordTiming>) -> Self {
        self.words = words;
        self
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether `time` falls in `[start, end)`.
    pub fn is_active_at(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time
    }

    pub fn overlaps(&self, other: &SubtitleLine) -> bool {
        !(self.end_time <= other.start_time || self.start_time >= other.end_time)
    }

    /// The word being sung/spoken at `time`, if any.
    pub fn word_at(&self, time: f64) -> Option<&WordTiming> {
        self.words
            .iter()
            .find(|w| w.start_time <= time && time < w.end_time)
    }

    /// Validate this line in isolation. `index` is used for error messages.
    pub fn validate(&self, index: usize) -> Result<(), SubtitleError> {
        check_span(|| format!("line {index}"), self.start_time, self.end_time)?;
        if self.text.trim().is_empty() {
            return Err(SubtitleError::EmptyText {
                what: format!("line {index}"),
            });
        }

        for (wi, word) in self.words.iter().enumerate() {
            check_span(
                || format!("line {index} word {wi}"),
                word.start_time,
                word.end_time,
            )?;
            if word.word.trim().is_empty() {
                return Err(SubtitleError::EmptyText {
                    what: format!("line {index} word {wi}"),
                });
            }
            if word.start_time < self.start_time || word.end_time > self.end_time {
                return Err(SubtitleError::WordOutsideLine {
                    line: index,
                    word: wi,
                });
            }
        }

        for i in 0..self.words.len() {
            for j in (i + 1)..self.words.len() {
                if self.words[i].overlaps(&self.words[j]) {
                    return Err(SubtitleError::WordsOverlap {
                        line: index,
                        first: i,
                        second: j,
                    });
                }
            }
        }

        if !self.words.is_empty() {
            let joined = self
                .words
                .iter()
                .map(|w| w.word.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if normalize_whitespace(&joined) != normalize_whitespace(&self.text) {
                return Err(SubtitleError::WordTextMismatch { line: index });
            }
        }

        Ok(())
    }
}

impl SubtitleData {
    pub fn new(lines: Vec<SubtitleLine>) -> Self {
        Self {
            lines,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// End time of the last line, or 0 for an empty timeline.
    pub fn duration(&self) -> f64 {
        self.lines
            .iter()
            .map(|l| l.end_time)
            .fold(0.0, f64::max)
    }

    /// The line visible at `time`, if any.
    ///
    /// Lines are ordered and non-overlapping, so a binary search on start
    /// time is enough.
    pub fn line_at(&self, time: f64) -> Option<&SubtitleLine> {
        let idx = self.lines.partition_point(|l| l.start_time <= time);
        if idx == 0 {
            return None;
        }
        let line = &self.lines[idx - 1];
        line.is_active_at(time).then_some(line)
    }

    /// Validate every line and the ordering invariant
    /// `line[i].end <= line[i + 1].start`.
    pub fn validate(&self) -> Result<(), SubtitleError> {
        for (i, line) in self.lines.iter().enumerate() {
            line.validate(i)?;
        }
        for (i, pair) in self.lines.windows(2).enumerate() {
            if pair[0].end_time > pair[1].start_time {
                return Err(SubtitleError::LinesOverlap {
                    first: i,
                    second: i + 1,
                });
            }
        }
        Ok(())
    }
}
