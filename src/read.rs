//! Streaming VCD tokenizer.
//!
//! [`Tokenizer`] wraps an [`io::Read`] and yields one [`Token`] per call to
//! `next()`. Tokens are relatively high-level: each one captures an entire
//! declaration, command, or value-change descriptor, together with its
//! location span for diagnostics.

use std::io;

use crate::{
    IdCode, ReferenceIndex, ScopeType, Timescale, TimescaleMagnitude, TimescaleUnit, Value,
    VarType,
};

const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// A position within a VCD stream. Lines and columns are 1-based.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The start and end location of a token within a VCD stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

/// Scope type and name from a `$scope` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeDecl {
    pub scope_type: ScopeType,
    pub ident: String,
}

/// Details from a `$var` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub var_type: VarType,
    /// Size, in bits, of the variable.
    pub size: u32,
    /// Code used by later value changes to refer back to this declaration.
    pub code: IdCode,
    /// Reference name of the variable in the model that produced the VCD.
    pub reference: String,
    /// Optional bit select or `[msb:lsb]` range on the reference.
    pub index: Option<ReferenceIndex>,
}

impl VarDecl {
    /// The reference name with any bit index appended, e.g. `"foo[3:1]"`.
    pub fn ref_str(&self) -> String {
        match self.index {
            None => self.reference.clone(),
            Some(index) => format!("{}{}", self.reference, index),
        }
    }
}

/// The value of a vector change descriptor.
///
/// A run consisting entirely of `0` and `1` digits parses to `Int`, provided
/// it fits in 128 bits; any run containing `x`/`z` states (or a longer
/// all-binary run) is preserved verbatim as `Bits`.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorValue {
    Int(u128),
    Bits(String),
}

/// A token from a VCD stream, as yielded by [`Tokenizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// The kind of a [`Token`], with its kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Unstructured text from a `$comment` declaration.
    Comment(String),
    /// Unstructured text from a `$date` declaration.
    Date(String),
    /// Unstructured text from a `$version` declaration.
    Version(String),
    /// Magnitude and unit from a `$timescale` declaration.
    Timescale(Timescale),
    /// A `$scope` declaration.
    ScopeDecl(ScopeDecl),
    /// An `$upscope $end` declaration.
    Upscope,
    /// A `$var` declaration.
    VarDecl(VarDecl),
    /// An `$enddefinitions $end` declaration.
    EndDefinitions,
    /// A `$dumpall` command.
    DumpAll,
    /// A `$dumpoff` command.
    DumpOff,
    /// A `$dumpon` command.
    DumpOn,
    /// A `$dumpvars` command.
    DumpVars,
    /// A bare `$end`, terminating one of the dump commands.
    End,
    /// A `#n` simulation time change.
    TimeChange(u64),
    /// A scalar value change such as `1!`.
    ScalarChange { code: IdCode, value: Value },
    /// A vector value change such as `b1010 !`.
    VectorChange { code: IdCode, value: VectorValue },
    /// A real value change such as `r1.5 !`.
    RealChange { code: IdCode, value: f64 },
    /// A string value change such as `shello !` (a GTKWave extension).
    StringChange { code: IdCode, value: String },
}

/// Error yielded by [`Tokenizer`].
///
/// Parse errors are fatal to the tokenizer instance: after yielding one, the
/// iterator is fused and returns `None` forever.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("{loc}: {msg}")]
    Parse { loc: Location, msg: String },
    #[error("I/O operation failed")]
    Io(#[from] io::Error),
}

/// Internal control flow: a clean end of input, or a fatal error.
enum Step {
    Eof,
    Error(ReadError),
}

type Scan<T> = Result<T, Step>;

fn is_ws(b: u8) -> bool {
    b == b' ' || (9..=13).contains(&b)
}

fn is_ident_byte(b: u8) -> bool {
    // '.' is not in the standard, but seen in the wild; '(' and ')' are
    // produced by the cva6 core.
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'.' | b'(' | b')')
}

fn require(c: Option<u8>) -> Scan<u8> {
    c.ok_or(Step::Eof)
}

/// VCD tokenizer. Wraps an [`io::Read`] and acts as an iterator of [`Token`]s.
///
/// The stream is read in fixed-size chunks into an owned buffer and scanned
/// byte by byte with one byte of lookahead, so memory use is bounded by the
/// buffer size regardless of input size.
///
/// ```
/// use vcdio::{Token, TokenKind, Tokenizer};
///
/// let buf = b"$comment hello $end";
/// let mut tokens = Tokenizer::new(&buf[..]);
/// match tokens.next().unwrap().unwrap().kind {
///     TokenKind::Comment(text) => assert_eq!(text, "hello"),
///     other => panic!("unexpected token {:?}", other),
/// }
/// ```
pub struct Tokenizer<R: io::Read> {
    reader: R,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
    line: u32,
    column: u32,
    done: bool,
}

impl<R: io::Read> Tokenizer<R> {
    /// Creates a tokenizer with the default buffer size.
    pub fn new(reader: R) -> Tokenizer<R> {
        Tokenizer::with_buffer_size(reader, DEFAULT_BUFFER_SIZE)
    }

    /// Creates a tokenizer reading the stream in chunks of `buffer_size` bytes.
    pub fn with_buffer_size(reader: R, buffer_size: usize) -> Tokenizer<R> {
        Tokenizer {
            reader,
            buf: vec![0; buffer_size.max(1)].into_boxed_slice(),
            pos: 0,
            len: 0,
            line: 1,
            column: 0,
            done: false,
        }
    }

    fn loc(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
        }
    }

    fn span(&self, start: Location) -> Span {
        Span {
            start,
            end: self.loc(),
        }
    }

    fn parse_err(&self, msg: impl Into<String>) -> Step {
        Step::Error(ReadError::Parse {
            loc: self.loc(),
            msg: msg.into(),
        })
    }

    /// Moves to the next byte, refilling the buffer when exhausted. Returns
    /// `None` at end of input. Line and column counters track the new byte.
    fn advance_opt(&mut self) -> Scan<Option<u8>> {
        if self.pos + 1 < self.len {
            self.pos += 1;
        } else {
            let n = loop {
                match self.reader.read(&mut self.buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Step::Error(ReadError::Io(e))),
                }
            };
            if n == 0 {
                return Ok(None);
            }
            self.len = n;
            self.pos = 0;
        }
        let b = self.buf[self.pos];
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Ok(Some(b))
    }

    /// Like [`advance_opt`], but end of input here means a truncated token:
    /// surfaced as the generic end-of-stream signal.
    fn advance(&mut self) -> Scan<u8> {
        require(self.advance_opt()?)
    }

    fn skip_ws(&mut self, mut c: u8) -> Scan<u8> {
        while is_ws(c) {
            c = self.advance()?;
        }
        Ok(c)
    }

    /// Consumes a run of decimal digits starting at `c`. Returns the value and
    /// the byte following the run (`None` if the run ended at end of input).
    fn take_decimal(&mut self, c: u8) -> Scan<(u64, Option<u8>)> {
        let mut value: u64 = 0;
        let mut any = false;
        let mut c = Some(c);
        while let Some(b) = c {
            if !b.is_ascii_digit() {
                break;
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add((b - b'0') as u64))
                .ok_or_else(|| self.parse_err("Decimal value out of range"))?;
            any = true;
            c = self.advance_opt()?;
        }
        if any {
            Ok((value, c))
        } else {
            Err(self.parse_err("Expected decimal value"))
        }
    }

    /// Consumes a run of printable ASCII bytes forming an identifier code.
    fn take_id_code(&mut self, c: u8) -> Scan<(IdCode, Option<u8>)> {
        let mut bytes = Vec::new();
        let mut c = Some(c);
        while let Some(b) = c {
            if !(33..=126).contains(&b) {
                break;
            }
            bytes.push(b);
            c = self.advance_opt()?;
        }
        match IdCode::new(&bytes) {
            Ok(code) => Ok((code, c)),
            Err(_) => Err(self.parse_err("Expected id code")),
        }
    }

    /// Consumes a simple or backslash-escaped identifier starting at `c`.
    fn take_identifier(&mut self, c: u8) -> Scan<(String, Option<u8>)> {
        if c.is_ascii_alphabetic() || c == b'_' {
            self.take_simple_identifier(c)
        } else if c == b'\\' {
            self.take_escaped_identifier()
        } else {
            Err(self.parse_err("Simple identifier must start with a-zA-Z_"))
        }
    }

    fn take_simple_identifier(&mut self, first: u8) -> Scan<(String, Option<u8>)> {
        let mut bytes = vec![first];
        let mut c = Some(self.advance()?);
        while let Some(b) = c {
            if !is_ident_byte(b) {
                break;
            }
            bytes.push(b);
            c = self.advance_opt()?;
        }
        Ok((String::from_utf8_lossy(&bytes).into_owned(), c))
    }

    fn take_escaped_identifier(&mut self) -> Scan<(String, Option<u8>)> {
        let mut bytes = Vec::new();
        let mut b = self.advance()?;
        while !is_ws(b) {
            if !(33..=126).contains(&b) {
                return Err(
                    self.parse_err("Escaped identifier can only contain printable ASCII characters")
                );
            }
            bytes.push(b);
            b = self.advance()?;
        }
        Ok((String::from_utf8_lossy(&bytes).into_owned(), Some(b)))
    }

    /// Requires exactly one whitespace byte after a `$keyword` and steps past
    /// it, returning the first byte of whatever follows.
    fn take_ws_after_kw(&mut self, c: Option<u8>, kw: &str) -> Scan<u8> {
        match c {
            Some(b) if is_ws(b) => self.advance(),
            Some(_) => Err(self.parse_err(format!("Expected whitespace after ${}", kw))),
            None => Err(Step::Eof),
        }
    }

    /// Reads free text up to a standalone `$end`, detected by matching the
    /// trailing byte sequence rather than by keyword parsing, which allows
    /// embedded `$` characters in the text. The `$end` must be preceded by
    /// whitespace.
    fn take_to_end(&mut self, first: u8) -> Scan<String> {
        let mut bytes = vec![first];
        for _ in 0..3 {
            let b = self.advance()?;
            bytes.push(b);
        }
        while !bytes.ends_with(b"$end") {
            let b = self.advance()?;
            bytes.push(b);
        }

        if bytes.len() > 4 && !is_ws(bytes[bytes.len() - 5]) {
            // Five columns back from the final `d` of `$end`, which cannot
            // span lines.
            let loc = Location {
                line: self.line,
                column: self.column.saturating_sub(5),
            };
            return Err(Step::Error(ReadError::Parse {
                loc,
                msg: "Expected whitespace before $end".into(),
            }));
        }

        let text = &bytes[..bytes.len().saturating_sub(5)];
        match std::str::from_utf8(text) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => Err(self.parse_err("Text is not valid UTF-8")),
        }
    }

    /// Consumes whitespace then a literal `$end`.
    fn take_end(&mut self, c: u8) -> Scan<()> {
        if self.skip_ws(c)? != b'$'
            || self.advance()? != b'e'
            || self.advance()? != b'n'
            || self.advance()? != b'd'
        {
            return Err(self.parse_err("Expected $end"));
        }
        Ok(())
    }

    /// Consumes a bit index after the opening `[`: either `N]` or `M:N]`.
    fn take_bit_index(&mut self, c: u8) -> Scan<(ReferenceIndex, Option<u8>)> {
        let c = self.skip_ws(c)?;
        let (index0, c) = self.take_decimal(c)?;
        let index0 = self.to_index(index0)?;

        let c = self.skip_ws(require(c)?)?;
        let (index1, c) = if c == b':' {
            let c = self.advance()?;
            let c = self.skip_ws(c)?;
            let (index1, c) = self.take_decimal(c)?;
            (Some(self.to_index(index1)?), c)
        } else {
            (None, Some(c))
        };

        let c = self.skip_ws(require(c)?)?;
        if c != b']' {
            return Err(self.parse_err("Expected bit index to terminate with \"]\""));
        }
        let c = self.advance_opt()?;
        let index = match index1 {
            None => ReferenceIndex::BitSelect(index0),
            Some(index1) => ReferenceIndex::Range(index0, index1),
        };
        Ok((index, c))
    }

    fn to_index(&self, v: u64) -> Scan<u32> {
        u32::try_from(v).map_err(|_| self.parse_err("Bit index out of range"))
    }

    fn parse_token(&mut self) -> Scan<Token> {
        let c = self.advance()?;
        let c = self.skip_ws(c)?;
        let start = self.loc();

        let kind = match c {
            b'#' => {
                let c = self.advance()?;
                let (time, _) = self.take_decimal(c)?;
                TokenKind::TimeChange(time)
            }
            b'0' | b'1' | b'x' | b'X' | b'z' | b'Z' => {
                let value = Value::parse(c).map_err(|e| self.parse_err(e.to_string()))?;
                let c = self.advance()?;
                let (code, _) = self.take_id_code(c)?;
                TokenKind::ScalarChange { code, value }
            }
            b'b' | b'B' => self.parse_vector()?,
            b'r' | b'R' => self.parse_real(start)?,
            b's' | b'S' => self.parse_string()?,
            b'$' => self.parse_keyword()?,
            other => {
                return Err(self.parse_err(format!(
                    "Unexpected character {:?} at start of token",
                    other as char
                )))
            }
        };

        Ok(Token {
            kind,
            span: self.span(start),
        })
    }

    fn parse_vector(&mut self) -> Scan<TokenKind> {
        let mut digits: Vec<u8> = Vec::new();
        let mut c = self.advance()?;
        while c == b'0' || c == b'1' {
            digits.push(c);
            c = self.advance()?;
        }

        let value = if matches!(c, b'x' | b'X' | b'z' | b'Z') {
            digits.push(c);
            c = self.advance()?;
            while matches!(c, b'0' | b'1' | b'x' | b'X' | b'z' | b'Z') {
                digits.push(c);
                c = self.advance()?;
            }
            VectorValue::Bits(String::from_utf8_lossy(&digits).into_owned())
        } else if digits.is_empty() {
            return Err(self.parse_err("Expected vector value"));
        } else if digits.len() <= 128 {
            let mut v: u128 = 0;
            for d in &digits {
                v = (v << 1) | (*d == b'1') as u128;
            }
            VectorValue::Int(v)
        } else {
            VectorValue::Bits(String::from_utf8_lossy(&digits).into_owned())
        };

        if !is_ws(c) {
            return Err(self.parse_err("Expected whitespace after vector value"));
        }
        let c = self.skip_ws(c)?;
        let (code, _) = self.take_id_code(c)?;
        Ok(TokenKind::VectorChange { code, value })
    }

    fn parse_real(&mut self, start: Location) -> Scan<TokenKind> {
        let mut bytes = Vec::new();
        let mut c = self.advance()?;
        while !is_ws(c) {
            bytes.push(c);
            c = self.advance()?;
        }

        let text = String::from_utf8_lossy(&bytes);
        let value: f64 = text.parse().map_err(|_| {
            Step::Error(ReadError::Parse {
                loc: start,
                msg: format!("Expected real value, got: {}", text),
            })
        })?;

        let c = self.skip_ws(c)?;
        let (code, _) = self.take_id_code(c)?;
        Ok(TokenKind::RealChange { code, value })
    }

    fn parse_string(&mut self) -> Scan<TokenKind> {
        let mut bytes = Vec::new();
        let mut c = self.advance()?;
        while !is_ws(c) {
            bytes.push(c);
            c = self.advance()?;
        }

        let value = match std::str::from_utf8(&bytes) {
            Ok(s) => s.to_string(),
            Err(_) => return Err(self.parse_err("String value is not valid UTF-8")),
        };

        let c = self.skip_ws(c)?;
        let (code, _) = self.take_id_code(c)?;
        Ok(TokenKind::StringChange { code, value })
    }

    fn parse_keyword(&mut self) -> Scan<TokenKind> {
        let c = self.advance()?;
        let (kw, c) = self.take_identifier(c)?;

        match kw.as_str() {
            "comment" => {
                let c = self.take_ws_after_kw(c, "comment")?;
                Ok(TokenKind::Comment(self.take_to_end(c)?))
            }
            "date" => {
                let c = self.take_ws_after_kw(c, "date")?;
                Ok(TokenKind::Date(self.take_to_end(c)?))
            }
            "version" => {
                let c = self.take_ws_after_kw(c, "version")?;
                Ok(TokenKind::Version(self.take_to_end(c)?))
            }
            "enddefinitions" => {
                let c = self.take_ws_after_kw(c, "enddefinitions")?;
                self.take_end(c)?;
                Ok(TokenKind::EndDefinitions)
            }
            "upscope" => {
                let c = self.take_ws_after_kw(c, "upscope")?;
                self.take_end(c)?;
                Ok(TokenKind::Upscope)
            }
            "scope" => {
                let c = self.take_ws_after_kw(c, "scope")?;
                let c = self.skip_ws(c)?;
                let (type_str, c) = self.take_identifier(c)?;
                let scope_type: ScopeType = type_str
                    .parse()
                    .map_err(|_| self.parse_err(format!("Invalid $scope type: {}", type_str)))?;
                let c = self.skip_ws(require(c)?)?;
                let (ident, c) = self.take_identifier(c)?;
                self.take_end(require(c)?)?;
                Ok(TokenKind::ScopeDecl(ScopeDecl { scope_type, ident }))
            }
            "timescale" => {
                let c = self.take_ws_after_kw(c, "timescale")?;
                let c = self.skip_ws(c)?;
                let (mag, c) = self.take_decimal(c)?;
                let magnitude = TimescaleMagnitude::from_u64(mag).ok_or_else(|| {
                    self.parse_err(format!(
                        "Invalid $timescale magnitude: {}. Must be one of: 1, 10, 100.",
                        mag
                    ))
                })?;
                let c = self.skip_ws(require(c)?)?;
                let (unit_str, c) = self.take_identifier(c)?;
                let unit: TimescaleUnit = unit_str.parse().map_err(|_| {
                    self.parse_err(format!(
                        "Invalid $timescale unit: {}. Must be one of: s, ms, us, ns, ps, fs.",
                        unit_str
                    ))
                })?;
                self.take_end(require(c)?)?;
                Ok(TokenKind::Timescale(Timescale::new(magnitude, unit)))
            }
            "var" => {
                let c = self.take_ws_after_kw(c, "var")?;
                let c = self.skip_ws(c)?;
                let (type_str, c) = self.take_identifier(c)?;
                let var_type: VarType = type_str.parse().map_err(|_| {
                    self.parse_err(format!(
                        "Invalid $var type: {}. Must be one of: {}",
                        type_str,
                        VarType::KEYWORDS
                    ))
                })?;
                let c = self.skip_ws(require(c)?)?;
                let (size, c) = self.take_decimal(c)?;
                let size =
                    u32::try_from(size).map_err(|_| self.parse_err("Variable size out of range"))?;
                let c = self.skip_ws(require(c)?)?;
                let (code, c) = self.take_id_code(c)?;
                let c = self.skip_ws(require(c)?)?;
                let (reference, c) = self.take_identifier(c)?;
                let c = self.skip_ws(require(c)?)?;
                let (index, c) = if c == b'[' {
                    let c = self.advance()?;
                    let (index, c) = self.take_bit_index(c)?;
                    (Some(index), c)
                } else {
                    (None, Some(c))
                };
                self.take_end(require(c)?)?;
                Ok(TokenKind::VarDecl(VarDecl {
                    var_type,
                    size,
                    code,
                    reference,
                    index,
                }))
            }
            "dumpall" => Ok(TokenKind::DumpAll),
            "dumpoff" => Ok(TokenKind::DumpOff),
            "dumpon" => Ok(TokenKind::DumpOn),
            "dumpvars" => Ok(TokenKind::DumpVars),
            "end" => Ok(TokenKind::End),
            _ => Err(self.parse_err(format!("invalid keyword ${}", kw))),
        }
    }
}

impl<R: io::Read> Iterator for Tokenizer<R> {
    type Item = Result<Token, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parse_token() {
            Ok(token) => Some(Ok(token)),
            Err(Step::Eof) => {
                self.done = true;
                None
            }
            Err(Step::Error(e)) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
