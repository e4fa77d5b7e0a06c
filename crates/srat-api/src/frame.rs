//! SSE-style frame reassembly.
//!
//! The SRAT backend formats every event as
//!
//! ```text
//! id: 42
//! event: volumes
//! data: [{"id":"disk-1"}]
//!
//! ```
//!
//! over both the WebSocket (one or more blocks per text message) and the SSE
//! endpoint (a continuous byte stream). [`FrameParser`] is the line-level
//! state machine shared by both; [`LineBuffer`] turns chunked bytes into
//! lines for the SSE transport.

use tracing::{debug, trace};

// ── Frame ────────────────────────────────────────────────────────────

/// One complete event reconstructed from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event type from the last `event:` line, e.g. `"volumes"`.
    pub event_type: String,

    /// All `data:` values of the frame joined with `\n`. Expected to be JSON.
    pub data: String,

    /// Value of the frame's `id:` line, if any.
    pub id: Option<String>,
}

// ── FrameParser ──────────────────────────────────────────────────────

/// Line-oriented frame parser. Performs no I/O.
///
/// A frame is emitted only when a blank line terminates it, or when the
/// caller flushes with [`finish`](Self::finish) at end of stream. Frames
/// without an event type or without any `data:` line are dropped.
#[derive(Debug, Default)]
pub struct FrameParser {
    event_type: Option<String>,
    data_lines: Vec<String>,
    id: Option<String>,
    last_id: Option<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator; a trailing `\r` is tolerated).
    ///
    /// Returns a frame when `line` is the blank terminator of a complete one.
    pub fn push_line(&mut self, line: &str) -> Option<Frame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.complete();
        }

        if let Some(comment) = line.strip_prefix(':') {
            trace!(comment = comment.trim(), "event stream keep-alive");
        } else if let Some(value) = line.strip_prefix("event:") {
            self.event_type = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data_lines.push(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix("id:") {
            let id = value.trim();
            trace!(id, "event id");
            self.id = Some(id.to_owned());
            self.last_id = Some(id.to_owned());
        } else if let Some(value) = line.strip_prefix("retry:") {
            debug!(retry = value.trim(), "server retry hint ignored");
        } else {
            debug!(line, "unrecognised event stream line");
        }

        None
    }

    /// Flush at end of stream.
    ///
    /// Emits the in-progress frame once if it has an event type and data.
    /// Some backend versions close the connection right after the last
    /// `data:` line without the blank terminator.
    pub fn finish(&mut self) -> Option<Frame> {
        let frame = self.complete();
        if let Some(ref f) = frame {
            debug!(event_type = %f.event_type, "flushed unterminated frame at end of stream");
        }
        frame
    }

    /// Parse one self-contained block of text (a WebSocket text message):
    /// every line is fed, then the parser is flushed.
    pub fn parse_block(&mut self, text: &str) -> Vec<Frame> {
        let mut frames = Vec::new();
        for line in text.split('\n') {
            if let Some(frame) = self.push_line(line) {
                frames.push(frame);
            }
        }
        if let Some(frame) = self.finish() {
            frames.push(frame);
        }
        frames
    }

    /// The most recent `id:` value seen on this parser, kept across frames.
    pub fn last_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    /// `true` while a frame is partially accumulated.
    pub fn has_pending(&self) -> bool {
        self.event_type.is_some() || !self.data_lines.is_empty()
    }

    fn complete(&mut self) -> Option<Frame> {
        let event_type = self.event_type.take();
        let data_lines = std::mem::take(&mut self.data_lines);
        let id = self.id.take();

        match event_type {
            Some(event_type) if !event_type.is_empty() && !data_lines.is_empty() => Some(Frame {
                event_type,
                data: data_lines.join("\n"),
                id,
            }),
            event_type => {
                if event_type.is_some() || !data_lines.is_empty() {
                    debug!(
                        event_type = event_type.as_deref().unwrap_or(""),
                        data_lines = data_lines.len(),
                        "discarding incomplete frame"
                    );
                }
                None
            }
        }
    }
}

// ── LineBuffer ───────────────────────────────────────────────────────

/// Splits an arbitrarily chunked byte stream into `\n`/`\r\n` lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(decode_line(line));
        }
        lines
    }

    /// Take whatever is left after the last newline (end of stream).
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut rest = std::mem::take(&mut self.buffer);
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        Some(decode_line(rest))
    }
}

fn decode_line(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| {
        debug!(error = %e, "invalid UTF-8 in event stream, decoding lossily");
        String::from_utf8_lossy(e.as_bytes()).into_owned()
    })
}

// ── Tests ────────────────────────────────────────────────────────────
