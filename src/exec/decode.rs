// src/exec/decode.rs

//! Incremental decoding of process output.
//!
//! Output arrives in arbitrary chunks, so a multibyte character can be split
//! across two reads. Each stream gets its own [`StreamDecoder`], which keeps
//! the partial sequence between chunks. Malformed input is replaced with
//! U+FFFD rather than failing.

use std::fmt;

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use tracing::warn;

/// A text encoding for process output (UTF-8 by default).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    pub fn utf8() -> Self {
        TextEncoding(UTF_8)
    }

    /// Look up a WHATWG encoding label such as `"utf-8"`, `"latin1"` or
    /// `"shift_jis"`.
    pub fn for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.trim().as_bytes()).map(TextEncoding)
    }

    /// Like [`TextEncoding::for_label`], falling back to UTF-8.
    pub fn for_label_or_utf8(label: &str) -> Self {
        Self::for_label(label).unwrap_or_else(|| {
            warn!(label, "unknown output encoding; decoding as utf-8");
            Self::utf8()
        })
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn decoder(&self) -> StreamDecoder {
        StreamDecoder {
            decoder: self.0.new_decoder_without_bom_handling(),
            text: String::new(),
            finished: false,
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.name()).finish()
    }
}

/// Accumulates decoded text for one output stream.
pub struct StreamDecoder {
    decoder: Decoder,
    text: String,
    finished: bool,
}

impl StreamDecoder {
    /// Decode another chunk. Ignored once [`StreamDecoder::finish`] ran.
    pub fn push(&mut self, chunk: &[u8]) {
        if !self.finished {
            self.decode(chunk, false);
        }
    }

    /// Text decoded so far, excluding any incomplete trailing sequence.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Flush any incomplete trailing sequence and return the full text.
    ///
    /// Later calls return an empty string.
    pub fn finish(&mut self) -> String {
        if !self.finished {
            self.decode(&[], true);
            self.finished = true;
        }
        std::mem::take(&mut self.text)
    }

    fn decode(&mut self, mut input: &[u8], last: bool) {
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or_else(|| input.len().saturating_mul(3));
            self.text.reserve(needed.max(4));

            let (result, read, _had_replacements) =
                self.decoder.decode_to_string(input, &mut self.text, last);
            input = &input[read..];

            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }
}

impl fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("encoding", &self.decoder.encoding().name())
            .field("decoded_len", &self.text.len())
            .finish()
    }
}
