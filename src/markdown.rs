//! Lightweight markup transform applied to answers before they are revealed.
//!
//! Backend answers use a tiny subset of markdown: `**bold**` spans and single `*`
//! characters that stand for line breaks. The transform rewrites both into display
//! markers (HTML-like by default) and the result is what gets revealed char by char.
//!
//! Two entry points exist:
//!
//! - [`transform`] works on a complete block of text and is used for direct answers
//!   and for agent chunks under [`ChunkPolicy::Independent`].
//! - [`StreamingTransform`] carries bold parity and a trailing `*` across chunk
//!   boundaries for [`ChunkPolicy::Carry`]. Feeding it any split of a text and then
//!   calling [`StreamingTransform::finish`] yields exactly `transform(text)`.

use serde::{Deserialize, Serialize};

/// Display markers emitted by the transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupMarkers {
    pub bold_open: String,
    pub bold_close: String,
    pub line_break: String,
}

impl Default for MarkupMarkers {
    fn default() -> Self {
        Self {
            bold_open: "<b>".to_string(),
            bold_close: "</b>".to_string(),
            line_break: "<br/>".to_string(),
        }
    }
}

/// How agent chunks are transformed relative to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPolicy {
    /// Each chunk is transformed on its own. A `**` span or `*` that straddles a
    /// chunk boundary is rendered per chunk, matching the legacy console.
    #[default]
    Independent,
    /// Bold parity and a held trailing `*` are carried into the next chunk.
    Carry,
}

/// Transform a complete block of raw text.
///
/// Segments between `**` delimiters alternate plain/bold (odd segments are bold,
/// including an unterminated trailing one), then every remaining `*` becomes a
/// line break marker.
pub fn transform(raw: &str, markers: &MarkupMarkers) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    for (index, segment) in raw.split("**").enumerate() {
        let segment = segment.replace('*', &markers.line_break);
        if index % 2 == 1 {
            out.push_str(&markers.bold_open);
            out.push_str(&segment);
            out.push_str(&markers.bold_close);
        } else {
            out.push_str(&segment);
        }
    }
    out
}

/// Number of reveal units (chars) in already transformed text.
pub fn reveal_len(text: &str) -> usize {
    text.chars().count()
}

/// Incremental form of [`transform`] for chunked input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingTransform {
    bold_open: bool,
    held_star: bool,
}

impl StreamingTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform one chunk. A trailing `*` is held back until the next chunk (or
    /// [`finish`](Self::finish)) decides whether it is half of a `**` delimiter.
    pub fn push(&mut self, chunk: &str, markers: &MarkupMarkers) -> String {
        let mut out = String::with_capacity(chunk.len() + 8);
        for ch in chunk.chars() {
            if ch == '*' {
                if self.held_star {
                    self.held_star = false;
                    self.toggle_bold(&mut out, markers);
                } else {
                    self.held_star = true;
                }
                continue;
            }
            if self.held_star {
                self.held_star = false;
                out.push_str(&markers.line_break);
            }
            out.push(ch);
        }
        out
    }

    /// Flush held state: a held `*` becomes a break and an open bold span is closed.
    pub fn finish(&mut self, markers: &MarkupMarkers) -> String {
        let mut out = String::new();
        if self.held_star {
            out.push_str(&markers.line_break);
        }
        if self.bold_open {
            out.push_str(&markers.bold_close);
        }
        self.reset();
        out
    }

    pub fn reset(&mut self) {
        self.bold_open = false;
        self.held_star = false;
    }

    #[cfg(test)]
    fn is_clean(&self) -> bool {
        !self.bold_open && !self.held_star
    }

    fn toggle_bold(&mut self, out: &mut String, markers: &MarkupMarkers) {
        if self.bold_open {
            out.push_str(&markers.bold_close);
        } else {
            out.push_str(&markers.bold_open);
        }
        self.bold_open = !self.bold_open;
    }
}

/// A piece of transformed text, as seen by a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text { text: &'a str, bold: bool },
    LineBreak,
}

/// Split transformed (possibly partially revealed) text back into display segments.
///
/// Marker text that is only partially revealed does not match and is kept as plain text.
pub fn segments<'a>(text: &'a str, markers: &MarkupMarkers) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    let mut bold = false;
    let mut run_start = 0;
    let mut index = 0;

    while index < text.len() {
        let rest = &text[index..];
        let matched = if starts_with_marker(rest, &markers.bold_open) {
            Some((markers.bold_open.len(), Some(true)))
        } else if starts_with_marker(rest, &markers.bold_close) {
            Some((markers.bold_close.len(), Some(false)))
        } else if starts_with_marker(rest, &markers.line_break) {
            Some((markers.line_break.len(), None))
        } else {
            None
        };

        match matched {
            Some((len, bold_change)) => {
                if run_start < index {
                    out.push(Segment::Text {
                        text: &text[run_start..index],
                        bold,
                    });
                }
                match bold_change {
                    Some(next) => bold = next,
                    None => out.push(Segment::LineBreak),
                }
                index += len;
                run_start = index;
            }
            None => {
                index += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    if run_start < text.len() {
        out.push(Segment::Text {
            text: &text[run_start..],
            bold,
        });
    }
    out
}

fn starts_with_marker(text: &str, marker: &str) -> bool {
    !marker.is_empty() && text.starts_with(marker)
}
