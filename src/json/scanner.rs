//! Recursive-descent JSON scanner with partial-read semantics
//!
//! The scanner reads values straight out of one borrowed buffer. Values the
//! caller does not care about are skipped without allocation, and pass-through
//! values can be returned as the exact substring they occupy in the input.

use std::borrow::Cow;

use super::cursor::Cursor;
use crate::error::{ParseError, ParseResult};

/// A number read by [`JsonScanner::read_number`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsonNumber {
    /// No fraction and no exponent, fits in `i64`
    Integer(i64),
    /// Anything else, including `1e3` and out-of-range integers
    Float(f64),
}

impl JsonNumber {
    pub fn as_f64(&self) -> f64 {
        match *self {
            JsonNumber::Integer(value) => value as f64,
            JsonNumber::Float(value) => value,
        }
    }
}

type FieldReader<'f, 'a, T> = Box<dyn Fn(&mut T, &mut JsonScanner<'a>) -> ParseResult<()> + 'f>;

/// Known keys of an object and the readers that consume their values.
///
/// A reader is invoked with the scanner positioned at the value and must
/// consume exactly that value.
pub struct ObjectFields<'f, 'a, T> {
    fields: Vec<(&'f str, FieldReader<'f, 'a, T>)>,
}

impl<'f, 'a, T> ObjectFields<'f, 'a, T> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Register a reader for `key`
    pub fn field<F>(mut self, key: &'f str, reader: F) -> Self
    where
        F: Fn(&mut T, &mut JsonScanner<'a>) -> ParseResult<()> + 'f,
    {
        self.fields.push((key, Box::new(reader)));
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|(name, _)| *name == key)
    }
}

impl<'f, 'a, T> Default for ObjectFields<'f, 'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Deepest array/object nesting a scanner accepts, matching `serde_json`
pub const MAX_NESTING_DEPTH: usize = 128;

/// Scanner over a single immutable JSON text.
///
/// One scanner per input; it is not meant to be shared.
#[derive(Debug, Clone)]
pub struct JsonScanner<'a> {
    cursor: Cursor<'a>,
    depth: usize,
}

impl<'a> JsonScanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            cursor: Cursor::new(input),
            depth: 0,
        }
    }

    pub fn cursor(&self) -> &Cursor<'a> {
        &self.cursor
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Advance over JSON whitespace (space, tab, newline, carriage return)
    pub fn skip_whitespace(&mut self) {
        while let Ok(b' ' | b'\t' | b'\n' | b'\r') = self.cursor.peek() {
            self.cursor.bump();
        }
    }

    /// Skip whitespace, then consume exactly `expected`
    pub fn expect(&mut self, expected: u8) -> ParseResult<()> {
        self.skip_whitespace();
        if self.cursor.peek()? == expected {
            self.cursor.advance()?;
            Ok(())
        } else {
            Err(self.unexpected((expected as char).to_string()))
        }
    }

    /// Require that only whitespace remains
    pub fn finish(&mut self) -> ParseResult<()> {
        self.skip_whitespace();
        if self.cursor.has_more() {
            return Err(ParseError::malformed(
                self.position(),
                "trailing characters after JSON value",
            ));
        }
        Ok(())
    }

    /// Skip over the next value, whatever its type
    pub fn skip_value(&mut self) -> ParseResult<()> {
        self.skip_whitespace();
        let index = self.position();
        match self.cursor.peek()? {
            b'"' => self.scan_string(false).map(|_| ()),
            b'{' => self.scan_object(|_, scanner| {
                scanner.skip_value()?;
                Ok(Flow::Continue)
            }),
            b'[' => self.read_list(|scanner| scanner.skip_value()).map(|_| ()),
            b'-' | b'0'..=b'9' => self.scan_number().map(|_| ()),
            b't' => self.expect_literal("true"),
            b'f' => self.expect_literal("false"),
            b'n' => self.expect_literal("null"),
            _ => Err(ParseError::malformed(
                index,
                format!(
                    "unexpected character '{}'",
                    self.cursor.peek_char().unwrap_or(char::REPLACEMENT_CHARACTER)
                ),
            )),
        }
    }

    /// Read a string value, decoding escapes.
    ///
    /// Strings without escapes are borrowed from the input.
    pub fn read_string_value(&mut self) -> ParseResult<Cow<'a, str>> {
        self.scan_string(true)
    }

    /// Return the exact input text spanned by the next value
    pub fn read_serialized_value(&mut self) -> ParseResult<&'a str> {
        self.skip_whitespace();
        let start = self.position();
        self.skip_value()?;
        Ok(self.cursor.slice_from(start))
    }

    /// Read a number, or `None` for a literal `null`
    pub fn read_number(&mut self) -> ParseResult<Option<JsonNumber>> {
        if self.try_null()? {
            return Ok(None);
        }
        let start = self.position();
        let is_float = self.scan_number()?;
        let text = self.cursor.slice_from(start);
        if !is_float {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Some(JsonNumber::Integer(value)));
            }
        }
        text.parse::<f64>()
            .map(|value| Some(JsonNumber::Float(value)))
            .map_err(|e| ParseError::malformed(start, format!("invalid number '{text}': {e}")))
    }

    /// Read an array with `read_element`, or `None` for a literal `null`
    pub fn read_list<T, F>(&mut self, mut read_element: F) -> ParseResult<Option<Vec<T>>>
    where
        F: FnMut(&mut Self) -> ParseResult<T>,
    {
        if self.try_null()? {
            return Ok(None);
        }
        self.nested(|scanner| {
            scanner.expect(b'[')?;
            let mut items = Vec::new();
            scanner.skip_whitespace();
            if scanner.cursor.peek()? == b']' {
                scanner.cursor.advance()?;
                return Ok(Some(items));
            }
            loop {
                items.push(read_element(scanner)?);
                if !scanner.expect_separator(b']')? {
                    return Ok(Some(items));
                }
            }
        })
    }

    /// Read an object, dispatching known keys to `fields` and skipping the
    /// rest. Returns `None` for a literal `null`.
    ///
    /// With `exit_early` the scan stops as soon as every registered field has
    /// been seen, leaving the scanner inside the object.
    pub fn read_object<T, C>(
        &mut self,
        constructor: C,
        fields: &ObjectFields<'_, 'a, T>,
        exit_early: bool,
    ) -> ParseResult<Option<T>>
    where
        C: FnOnce() -> T,
    {
        if self.try_null()? {
            return Ok(None);
        }
        let mut target = constructor();
        let mut fired = vec![false; fields.len()];
        let mut remaining = fields.len();
        self.scan_object(|key, scanner| {
            match fields.position(key) {
                Some(slot) => {
                    (fields.fields[slot].1)(&mut target, scanner)?;
                    if !fired[slot] {
                        fired[slot] = true;
                        remaining -= 1;
                    }
                    if exit_early && remaining == 0 {
                        return Ok(Flow::Stop);
                    }
                }
                None => scanner.skip_value()?,
            }
            Ok(Flow::Continue)
        })?;
        Ok(Some(target))
    }

    /// Read an object, asking `resolve` about every key.
    ///
    /// `resolve` returns `true` when it consumed the value; otherwise the
    /// value is skipped. The whole object is always scanned.
    pub fn read_object_with<T, C, R>(
        &mut self,
        constructor: C,
        mut resolve: R,
    ) -> ParseResult<Option<T>>
    where
        C: FnOnce() -> T,
        R: FnMut(&mut T, &str, &mut Self) -> ParseResult<bool>,
    {
        if self.try_null()? {
            return Ok(None);
        }
        let mut target = constructor();
        self.scan_object(|key, scanner| {
            if !resolve(&mut target, key, scanner)? {
                scanner.skip_value()?;
            }
            Ok(Flow::Continue)
        })?;
        Ok(Some(target))
    }

    fn scan_object<F>(&mut self, mut on_field: F) -> ParseResult<()>
    where
        F: FnMut(&str, &mut Self) -> ParseResult<Flow>,
    {
        self.nested(|scanner| {
            scanner.expect(b'{')?;
            scanner.skip_whitespace();
            if scanner.cursor.peek()? == b'}' {
                scanner.cursor.advance()?;
                return Ok(());
            }
            loop {
                let key = scanner.scan_string(true)?;
                scanner.expect(b':')?;
                if let Flow::Stop = on_field(&*key, scanner)? {
                    return Ok(());
                }
                if !scanner.expect_separator(b'}')? {
                    return Ok(());
                }
            }
        })
    }

    /// Run `scan` one array/object level deeper, failing past
    /// [`MAX_NESTING_DEPTH`]
    fn nested<R, S>(&mut self, scan: S) -> ParseResult<R>
    where
        S: FnOnce(&mut Self) -> ParseResult<R>,
    {
        self.skip_whitespace();
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::malformed(self.position(), "nesting too deep"));
        }
        self.depth += 1;
        let result = scan(self);
        self.depth -= 1;
        result
    }

    /// Consume `,` (returns true) or `closing` (returns false)
    fn expect_separator(&mut self, closing: u8) -> ParseResult<bool> {
        self.skip_whitespace();
        match self.cursor.peek()? {
            b',' => {
                self.cursor.advance()?;
                Ok(true)
            }
            byte if byte == closing => {
                self.cursor.advance()?;
                Ok(false)
            }
            _ => Err(self.unexpected(format!("',' or '{}'", closing as char))),
        }
    }

    fn try_null(&mut self) -> ParseResult<bool> {
        self.skip_whitespace();
        if self.cursor.has_more() && self.cursor.peek()? == b'n' {
            self.expect_literal("null")?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect_literal(&mut self, literal: &'static str) -> ParseResult<()> {
        let start = self.position();
        for expected in literal.bytes() {
            if self.cursor.advance()? != expected {
                return Err(ParseError::malformed(
                    start,
                    format!("invalid literal, expected '{literal}'"),
                ));
            }
        }
        Ok(())
    }

    /// Scan a number; returns whether it had a fraction or exponent
    fn scan_number(&mut self) -> ParseResult<bool> {
        let start = self.position();
        if self.cursor.peek()? == b'-' {
            self.cursor.advance()?;
        }
        if self.digit_run() == 0 {
            return Err(ParseError::malformed(start, "expected digit"));
        }
        let mut is_float = false;
        if self.next_is(b'.') {
            self.cursor.advance()?;
            if self.digit_run() == 0 {
                return Err(ParseError::malformed(start, "expected digit after decimal point"));
            }
            is_float = true;
        }
        if self.next_is(b'e') || self.next_is(b'E') {
            self.cursor.advance()?;
            if self.next_is(b'+') || self.next_is(b'-') {
                self.cursor.advance()?;
            }
            if self.digit_run() == 0 {
                return Err(ParseError::malformed(start, "expected digit in exponent"));
            }
            is_float = true;
        }
        Ok(is_float)
    }

    fn digit_run(&mut self) -> usize {
        let mut count = 0;
        while let Ok(b'0'..=b'9') = self.cursor.peek() {
            self.cursor.bump();
            count += 1;
        }
        count
    }

    fn next_is(&self, byte: u8) -> bool {
        self.cursor.peek().map(|b| b == byte).unwrap_or(false)
    }

    /// Scan a string. Without `decode` the returned value is meaningless and
    /// nothing is allocated.
    fn scan_string(&mut self, decode: bool) -> ParseResult<Cow<'a, str>> {
        self.expect(b'"')?;
        let input = self.cursor.input();
        let mut run_start = self.position();
        let mut decoded: Option<String> = None;
        loop {
            let index = self.position();
            match self.cursor.advance()? {
                b'"' => {
                    if !decode {
                        return Ok(Cow::Borrowed(""));
                    }
                    let tail = &input[run_start..index];
                    return Ok(match decoded {
                        Some(mut owned) => {
                            owned.push_str(tail);
                            Cow::Owned(owned)
                        }
                        None => Cow::Borrowed(tail),
                    });
                }
                b'\\' => {
                    let escaped = self.read_escape(index)?;
                    if decode {
                        let owned = decoded.get_or_insert_with(String::new);
                        owned.push_str(&input[run_start..index]);
                        owned.push(escaped);
                    }
                    run_start = self.position();
                }
                byte if byte < 0x20 => {
                    return Err(ParseError::malformed(
                        index,
                        "unescaped control character in string",
                    ));
                }
                _ => {}
            }
        }
    }

    fn read_escape(&mut self, start: usize) -> ParseResult<char> {
        let byte = self
            .cursor
            .advance()
            .map_err(|_| ParseError::malformed(start, "truncated escape sequence"))?;
        let escaped = match byte {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => return self.read_unicode_escape(start),
            _ => {
                return Err(ParseError::malformed(
                    start,
                    format!("invalid escape character '\\{}'", byte as char),
                ))
            }
        };
        Ok(escaped)
    }

    fn read_unicode_escape(&mut self, start: usize) -> ParseResult<char> {
        let high = self.read_hex4(start)?;
        if (0xD800..0xDC00).contains(&high) {
            // a high surrogate is only meaningful with a `\uDC00`-`\uDFFF` partner
            let rest = &self.cursor.input().as_bytes()[self.position()..];
            if rest.len() >= 6 && rest.starts_with(b"\\u") {
                if let Some(low) = parse_hex4(&rest[2..6]) {
                    if (0xDC00..0xE000).contains(&low) {
                        self.cursor.seek(self.position() + 6)?;
                        let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                        return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
                    }
                }
            }
        }
        Ok(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn read_hex4(&mut self, start: usize) -> ParseResult<u32> {
        let mut value = 0;
        for _ in 0..4 {
            let byte = self
                .cursor
                .advance()
                .map_err(|_| ParseError::malformed(start, "truncated unicode escape"))?;
            let digit = (byte as char).to_digit(16).ok_or_else(|| {
                ParseError::malformed(start, "invalid hex digit in unicode escape")
            })?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn unexpected(&self, expected: String) -> ParseError {
        match self.cursor.peek_char() {
            Some(found) => ParseError::UnexpectedToken {
                expected,
                found,
                index: self.position(),
            },
            None => ParseError::UnexpectedEndOfInput {
                index: self.position(),
            },
        }
    }
}

fn parse_hex4(bytes: &[u8]) -> Option<u32> {
    bytes.iter().try_fold(0, |value, &byte| {
        (byte as char).to_digit(16).map(|digit| value * 16 + digit)
    })
}

/// Raw text of the requested top-level fields of a JSON object.
///
/// Only the named keys are examined; scanning stops once all of them were
/// found. Missing keys come back as `None`.
pub fn extract_fields<'a>(input: &'a str, keys: &[&str]) -> ParseResult<Vec<Option<&'a str>>> {
    let mut scanner = JsonScanner::new(input);
    let fields = keys
        .iter()
        .enumerate()
        .fold(ObjectFields::new(), |fields, (slot, key)| {
            fields.field(key, move |found: &mut Vec<Option<&'a str>>, scanner| {
                found[slot] = Some(scanner.read_serialized_value()?);
                Ok(())
            })
        });
    let found = scanner.read_object(|| vec![None; keys.len()], &fields, true)?;
    Ok(found.unwrap_or_else(|| vec![None; keys.len()]))
}
