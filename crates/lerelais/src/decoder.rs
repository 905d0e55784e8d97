// Streaming Response Decoder
//
// *Le Décodeur* - Assembles line-delimited `{response, done}` fragments into the
// full analysis text.

use crate::error::{RelaisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// One decoded line of a streaming generate response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamFragment {
    /// Partial text
    #[serde(rename = "response")]
    pub text: String,

    /// True on the terminal fragment
    #[serde(rename = "done")]
    pub is_final: bool,
}

/// In-stream error report, e.g. `{"error": "model runner crashed"}`
#[derive(Debug, Deserialize)]
struct StreamErrorLine {
    error: String,
}

/// Full text of a completed analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    text: String,
    fragment_count: usize,
    completed: bool,
}

impl AnalysisResult {
    /// Assembled text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Take the assembled text
    pub fn into_text(self) -> String {
        self.text
    }

    /// Fragments that contributed to the text
    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    /// Whether a terminal (`done = true`) fragment was seen
    pub fn completed(&self) -> bool {
        self.completed
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for AnalysisResult {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Incremental decoder for a line-delimited response body
///
/// Feed lines with [`StreamDecoder::push_line`] and call
/// [`StreamDecoder::finish`] once the body is exhausted. Malformed lines are
/// skipped; lines after the terminal fragment are parsed but not appended.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    text: String,
    valid_lines: usize,
    skipped_lines: usize,
    contributing: usize,
    completed: bool,
}

impl StreamDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal fragment has been seen
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Lines that failed to parse
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Consume one line of the body
    ///
    /// Fails only when the line is a well-formed in-stream error report.
    pub fn push_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let fragment = match serde_json::from_str::<StreamFragment>(line) {
            Ok(fragment) => fragment,
            Err(parse_err) => {
                if let Ok(report) = serde_json::from_str::<StreamErrorLine>(line) {
                    if self.completed {
                        debug!("Ignoring error report after the terminal fragment: {}", report.error);
                        return Ok(());
                    }
                    return Err(RelaisError::operation(report.error));
                }
                self.skipped_lines += 1;
                warn!("Skipping malformed stream line: {}", parse_err);
                return Ok(());
            }
        };

        self.valid_lines += 1;

        if self.completed {
            debug!("Ignoring fragment received after the terminal fragment");
            return Ok(());
        }

        self.text.push_str(&fragment.text);
        self.contributing += 1;
        if fragment.is_final {
            self.completed = true;
        }

        Ok(())
    }

    /// Finish decoding
    pub fn finish(self) -> Result<AnalysisResult> {
        if self.valid_lines == 0 {
            return Err(if self.skipped_lines == 0 {
                RelaisError::response_validity("Empty response from Ollama")
            } else {
                RelaisError::response_validity(format!(
                    "No parseable fragments in Ollama response ({} malformed lines)",
                    self.skipped_lines
                ))
            });
        }

        if self.text.is_empty() {
            return Err(RelaisError::response_validity(
                "Ollama response contained no analysis text",
            ));
        }

        if !self.completed {
            warn!("Stream ended without a terminal fragment");
        }

        Ok(AnalysisResult {
            text: self.text,
            fragment_count: self.contributing,
            completed: self.completed,
        })
    }
}

/// Decode a whole line-delimited response body
pub fn decode_stream(body: &str) -> Result<AnalysisResult> {
    let mut decoder = StreamDecoder::new();
    for line in body.lines() {
        decoder.push_line(line)?;
    }
    decoder.finish()
}
