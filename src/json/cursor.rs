//! Position tracking over an immutable JSON buffer

use crate::error::{ParseError, ParseResult};

/// A read position into a borrowed string.
///
/// Offsets are bytes. The cursor never moves past the end of the input and
/// every read is bounds-checked.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn has_more(&self) -> bool {
        self.position < self.input.len()
    }

    /// Byte at the current position, without consuming it
    pub fn peek(&self) -> ParseResult<u8> {
        self.input
            .as_bytes()
            .get(self.position)
            .copied()
            .ok_or(ParseError::UnexpectedEndOfInput {
                index: self.position,
            })
    }

    /// Consume and return the byte at the current position
    pub fn advance(&mut self) -> ParseResult<u8> {
        let byte = self.peek()?;
        self.position += 1;
        Ok(byte)
    }

    /// Step over a byte already inspected with `peek`
    pub(crate) fn bump(&mut self) {
        if self.has_more() {
            self.position += 1;
        }
    }

    /// The full character starting at the current position, for diagnostics
    pub(crate) fn peek_char(&self) -> Option<char> {
        self.input.get(self.position..)?.chars().next()
    }

    /// The input between `start` and the current position.
    ///
    /// Returns an empty string when `start` does not lie on a character
    /// boundary before the cursor.
    pub fn slice_from(&self, start: usize) -> &'a str {
        self.input.get(start..self.position).unwrap_or_default()
    }

    /// Jump forward to `position`, which must not exceed the input length
    pub(crate) fn seek(&mut self, position: usize) -> ParseResult<()> {
        if position > self.input.len() {
            return Err(ParseError::UnexpectedEndOfInput {
                index: self.input.len(),
            });
        }
        self.position = position;
        Ok(())
    }
}
