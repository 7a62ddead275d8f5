//! Stateful VCD writer.
//!
//! [`VcdWriter`] produces a well-formed VCD stream from a sequence of
//! variable registrations and time-ordered value changes. The header is held
//! back until the first event that requires it (a time advance past the
//! initial timestamp, a dump control call, or an explicit flush), so
//! variables may be registered and given initial values in any order. Scopes
//! are emitted sorted, with shared prefixes opened only once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Write};
use std::mem;

use thiserror::Error;

use crate::idcode::IdCode;
use crate::scope::{ScopeType, VarType};
use crate::timescale::{Timescale, TimescaleMagnitude, TimescaleUnit};
use crate::variable::{Encoder, InvalidVarValue, VarSize, VarState, VarValue};

/// Errors reported by [`VcdWriter`].
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The writer was used after [`VcdWriter::close`].
    #[error("writer is closed")]
    Closed,

    /// A registration was attempted after the header was written.
    #[error("cannot register after the header has been written")]
    RegistrationClosed,

    /// A timestamp was smaller than the writer's current time.
    #[error("out of order timestamp {timestamp} (current time is {current})")]
    TimestampDecrease { timestamp: u64, current: u64 },

    /// A variable name was registered twice within one scope.
    #[error("duplicate var {name} in scope {scope}")]
    DuplicateVar { scope: String, name: String },

    /// A scope path was empty or contained an empty component.
    #[error("invalid scope {0:?}")]
    InvalidScope(String),

    /// The variable type has no default size, and none was given.
    #[error("must supply size for {0} variables")]
    MissingSize(VarType),

    /// A [`VarId`] did not come from this writer.
    #[error("unknown variable handle")]
    UnknownVar,

    #[error(transparent)]
    InvalidValue(#[from] InvalidVarValue),
}

/// A hierarchical scope path, given either as a separator-joined string or
/// as a sequence of names.
#[derive(Clone, Copy, Debug)]
pub enum ScopeRef<'a> {
    Path(&'a str),
    Parts(&'a [&'a str]),
}

impl<'a> From<&'a str> for ScopeRef<'a> {
    fn from(path: &'a str) -> Self {
        ScopeRef::Path(path)
    }
}

impl<'a> From<&'a [&'a str]> for ScopeRef<'a> {
    fn from(parts: &'a [&'a str]) -> Self {
        ScopeRef::Parts(parts)
    }
}

impl<'a, const N: usize> From<&'a [&'a str; N]> for ScopeRef<'a> {
    fn from(parts: &'a [&'a str; N]) -> Self {
        ScopeRef::Parts(parts)
    }
}

/// Handle to a variable registered with [`VcdWriter::register_var`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarId(usize);

/// Configures and creates a [`VcdWriter`].
#[derive(Clone, Debug)]
pub struct VcdWriterBuilder {
    timescale: Timescale,
    date: String,
    comment: String,
    version: String,
    default_scope_type: ScopeType,
    scope_sep: char,
    check_values: bool,
    init_timestamp: u64,
}

impl Default for VcdWriterBuilder {
    fn default() -> Self {
        VcdWriterBuilder {
            timescale: Timescale::new(TimescaleMagnitude::One, TimescaleUnit::US),
            date: String::new(),
            comment: String::new(),
            version: String::new(),
            default_scope_type: ScopeType::Module,
            scope_sep: '.',
            check_values: true,
            init_timestamp: 0,
        }
    }
}

impl VcdWriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timescale declared in the header. Defaults to `1 us`.
    pub fn timescale(mut self, timescale: Timescale) -> Self {
        self.timescale = timescale;
        self
    }

    /// `$date` header text. Empty text omits the command.
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    /// `$comment` header text. Empty text omits the command.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// `$version` header text. Empty text omits the command.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Scope type used where [`VcdWriter::set_scope_type`] was not called.
    /// Defaults to `module`.
    pub fn default_scope_type(mut self, scope_type: ScopeType) -> Self {
        self.default_scope_type = scope_type;
        self
    }

    /// Separator for scope paths given as strings. Defaults to `'.'`.
    pub fn scope_sep(mut self, sep: char) -> Self {
        self.scope_sep = sep;
        self
    }

    /// Whether values passed to [`VcdWriter::change`] are validated against
    /// the variable's size. Defaults to true.
    pub fn check_values(mut self, check: bool) -> Self {
        self.check_values = check;
        self
    }

    /// Timestamp the stream starts at. Defaults to 0.
    pub fn init_timestamp(mut self, timestamp: u64) -> Self {
        self.init_timestamp = timestamp;
        self
    }

    pub fn build<W: Write>(self, sink: W) -> VcdWriter<W> {
        let mut header_keywords = BTreeMap::new();
        header_keywords.insert("$timescale", self.timescale.to_string());
        header_keywords.insert("$date", self.date);
        header_keywords.insert("$comment", self.comment);
        header_keywords.insert("$version", self.version);
        VcdWriter {
            sink,
            header_keywords,
            default_scope_type: self.default_scope_type,
            scope_sep: self.scope_sep,
            check_values: self.check_values,
            registering: true,
            closed: false,
            dumping: true,
            next_var_index: 0,
            scope_var_decls: BTreeMap::new(),
            scope_var_names: HashMap::new(),
            scope_types: HashMap::new(),
            vars: Vec::new(),
            timestamp: self.init_timestamp,
            last_dumped_ts: None,
        }
    }
}

/// Writes a VCD stream to an [`io::Write`] sink.
///
/// ```
/// use vcdio::{VarType, VarValue, VcdWriterBuilder};
///
/// let mut buf = Vec::new();
/// let mut writer = VcdWriterBuilder::new().build(&mut buf);
/// let counter = writer
///     .register_var("top", "counter", VarType::Integer, None, VarValue::Absent)
///     .unwrap();
/// writer.change(counter, 1, 5u8).unwrap();
/// writer.change(counter, 2, 6u8).unwrap();
/// writer.close(None).unwrap();
/// ```
pub struct VcdWriter<W: Write> {
    sink: W,
    header_keywords: BTreeMap<&'static str, String>,
    default_scope_type: ScopeType,
    scope_sep: char,
    check_values: bool,
    registering: bool,
    closed: bool,
    dumping: bool,
    next_var_index: u64,
    scope_var_decls: BTreeMap<Vec<String>, Vec<String>>,
    scope_var_names: HashMap<Vec<String>, HashSet<String>>,
    scope_types: HashMap<Vec<String>, ScopeType>,
    vars: Vec<VarState>,
    timestamp: u64,
    last_dumped_ts: Option<u64>,
}

impl<W: Write> VcdWriter<W> {
    /// Creates a writer with default settings.
    pub fn new(sink: W) -> VcdWriter<W> {
        VcdWriterBuilder::new().build(sink)
    }

    /// Sets the type declared for `scope`. Takes effect only if called
    /// before the header is written.
    pub fn set_scope_type<'a>(
        &mut self,
        scope: impl Into<ScopeRef<'a>>,
        scope_type: ScopeType,
    ) -> Result<(), WriteError> {
        let scope = self.scope_parts(scope.into())?;
        self.scope_types.insert(scope, scope_type);
        Ok(())
    }

    /// Registers a variable.
    ///
    /// All variables must be registered before the header is written. `size`
    /// may be omitted for the types with a default size: `integer`, `real`,
    /// and `realtime` default to 64 bits, `event` and `string` to 1. Passing
    /// [`VarValue::Absent`] as `init` selects the type's default initial
    /// value (`x` for scalars and vectors, `0.0` for reals, the empty string
    /// for strings).
    pub fn register_var<'a>(
        &mut self,
        scope: impl Into<ScopeRef<'a>>,
        name: &str,
        var_type: VarType,
        size: Option<VarSize>,
        init: VarValue,
    ) -> Result<VarId, WriteError> {
        self.register(scope.into(), name, var_type, size, init, None)
    }

    /// Registers a variable with a caller-chosen identifier code instead of
    /// the next sequential one. The caller is responsible for keeping
    /// explicit codes distinct.
    pub fn register_var_with_ident<'a>(
        &mut self,
        scope: impl Into<ScopeRef<'a>>,
        name: &str,
        var_type: VarType,
        size: Option<VarSize>,
        init: VarValue,
        ident: IdCode,
    ) -> Result<VarId, WriteError> {
        self.register(scope.into(), name, var_type, size, init, Some(ident))
    }

    fn register(
        &mut self,
        scope: ScopeRef<'_>,
        name: &str,
        var_type: VarType,
        size: Option<VarSize>,
        init: VarValue,
        ident: Option<IdCode>,
    ) -> Result<VarId, WriteError> {
        if self.closed {
            return Err(WriteError::Closed);
        }
        if !self.registering {
            return Err(WriteError::RegistrationClosed);
        }
        let scope = self.scope_parts(scope)?;
        self.check_unused_name(&scope, name)?;

        let size = match size {
            Some(size) => size,
            None => match var_type {
                VarType::Integer | VarType::Real | VarType::RealTime => VarSize::Bits(64),
                VarType::Event | VarType::String => VarSize::Bits(1),
                other => return Err(WriteError::MissingSize(other)),
            },
        };
        let encoder = match (var_type, &size) {
            (VarType::String, _) => Encoder::Str,
            (VarType::Event, _) => Encoder::Event,
            (VarType::Real, _) => Encoder::Real,
            (_, VarSize::Compound(widths)) => Encoder::Compound {
                widths: widths.clone(),
            },
            (_, VarSize::Bits(1)) => Encoder::Scalar,
            (_, VarSize::Bits(width)) => Encoder::Vector { width: *width },
        };
        let init = match init {
            VarValue::Absent => VarState::default_init(&encoder),
            init => init,
        };
        let sequential = ident.is_none();
        let state = VarState {
            ident: match ident {
                Some(ident) => ident,
                None => IdCode::from_index(self.next_var_index),
            },
            var_type,
            size,
            encoder,
            value: init,
        };
        // Surface bad initial values before any state is altered.
        state.format(&state.value, true)?;

        let decl = format!(
            "$var {} {} {} {} $end",
            var_type,
            state.size.total_bits(),
            state.ident,
            name
        );
        let id = VarId(self.vars.len());
        self.vars.push(state);
        if sequential {
            self.next_var_index += 1;
        }
        self.scope_var_decls.entry(scope.clone()).or_default().push(decl);
        self.scope_var_names
            .entry(scope)
            .or_default()
            .insert(name.to_string());
        Ok(id)
    }

    /// Declares an additional name for an already registered variable.
    ///
    /// The alias shares the variable's identifier code, so a change through
    /// `var` changes the value shown under every name declared for it.
    pub fn register_alias<'a>(
        &mut self,
        scope: impl Into<ScopeRef<'a>>,
        name: &str,
        var: VarId,
    ) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::Closed);
        }
        if !self.registering {
            return Err(WriteError::RegistrationClosed);
        }
        let scope = self.scope_parts(scope.into())?;
        self.check_unused_name(&scope, name)?;
        let state = self.vars.get(var.0).ok_or(WriteError::UnknownVar)?;
        let decl = format!(
            "$var {} {} {} {} $end",
            state.var_type,
            state.size.total_bits(),
            state.ident,
            name
        );
        self.scope_var_decls.entry(scope.clone()).or_default().push(decl);
        self.scope_var_names
            .entry(scope)
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    /// The identifier code assigned to `var`.
    pub fn var_ident(&self, var: VarId) -> Option<&IdCode> {
        self.vars.get(var.0).map(|state| &state.ident)
    }

    /// Records a value change for `var` at `timestamp`.
    ///
    /// Timestamps must not decrease across calls. A change restating the
    /// variable's current value writes nothing; events fire every time. The
    /// first timestamp greater than the initial one closes registration and
    /// writes the header.
    pub fn change(
        &mut self,
        var: VarId,
        timestamp: u64,
        value: impl Into<VarValue>,
    ) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::Closed);
        }
        let value = value.into();
        let state = self.vars.get(var.0).ok_or(WriteError::UnknownVar)?;

        // Format early so a bad value errors before any output or state
        // change.
        let line = if value != state.value || state.encoder == Encoder::Event {
            Some(state.format(&value, self.check_values)?)
        } else {
            None
        };

        if timestamp < self.timestamp {
            return Err(WriteError::TimestampDecrease {
                timestamp,
                current: self.timestamp,
            });
        }
        if timestamp > self.timestamp {
            if self.registering {
                self.finalize_registration()?;
            }
            self.timestamp = timestamp;
        }

        let Some(line) = line else { return Ok(()) };
        self.vars[var.0].value = value;
        if self.dumping && !self.registering {
            if Some(self.timestamp) != self.last_dumped_ts {
                self.last_dumped_ts = Some(self.timestamp);
                write!(self.sink, "#{}\n{}\n", self.timestamp, line)?;
            } else {
                writeln!(self.sink, "{}", line)?;
            }
        }
        Ok(())
    }

    /// Suspends dumping with a `$dumpoff` block restating every scalar and
    /// vector variable as unknown. Changes made while suspended are tracked
    /// but not written.
    pub fn dump_off(&mut self, timestamp: u64) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::Closed);
        }
        if self.registering {
            self.finalize_registration()?;
        }
        self.set_timestamp(timestamp)?;
        if !self.dumping {
            return Ok(());
        }
        self.dump_timestamp()?;
        writeln!(self.sink, "$dumpoff")?;
        for var in &self.vars {
            if let Some(line) = var.dump_off_line() {
                writeln!(self.sink, "{}", line)?;
            }
        }
        writeln!(self.sink, "$end")?;
        self.dumping = false;
        Ok(())
    }

    /// Resumes dumping with a `$dumpon` block restating every variable's
    /// current value.
    pub fn dump_on(&mut self, timestamp: u64) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::Closed);
        }
        if self.registering {
            self.finalize_registration()?;
        }
        self.set_timestamp(timestamp)?;
        if self.dumping {
            return Ok(());
        }
        self.dumping = true;
        self.dump_timestamp()?;
        self.dump_values("$dumpon")
    }

    /// Flushes buffered output, writing the header first if it is still
    /// pending. An optional timestamp is recorded in the stream.
    pub fn flush(&mut self, timestamp: Option<u64>) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::Closed);
        }
        if self.registering {
            self.finalize_registration()?;
        }
        if let Some(timestamp) = timestamp {
            self.set_timestamp(timestamp)?;
            self.dump_timestamp()?;
        }
        self.sink.flush()?;
        Ok(())
    }

    /// Flushes and closes the writer. Further registrations and changes are
    /// rejected. Closing an already closed writer does nothing.
    pub fn close(&mut self, timestamp: Option<u64>) -> Result<(), WriteError> {
        if !self.closed {
            self.flush(timestamp)?;
            self.closed = true;
        }
        Ok(())
    }

    fn scope_parts(&self, scope: ScopeRef<'_>) -> Result<Vec<String>, WriteError> {
        let parts: Vec<String> = match scope {
            ScopeRef::Path(path) => path.split(self.scope_sep).map(str::to_string).collect(),
            ScopeRef::Parts(parts) => parts.iter().map(|s| s.to_string()).collect(),
        };
        if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
            let sep = self.scope_sep.to_string();
            return Err(WriteError::InvalidScope(parts.join(&sep)));
        }
        Ok(parts)
    }

    fn check_unused_name(&self, scope: &[String], name: &str) -> Result<(), WriteError> {
        if self
            .scope_var_names
            .get(scope)
            .is_some_and(|names| names.contains(name))
        {
            let sep = self.scope_sep.to_string();
            return Err(WriteError::DuplicateVar {
                scope: scope.join(&sep),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn set_timestamp(&mut self, timestamp: u64) -> Result<(), WriteError> {
        if timestamp < self.timestamp {
            Err(WriteError::TimestampDecrease {
                timestamp,
                current: self.timestamp,
            })
        } else {
            self.timestamp = timestamp;
            Ok(())
        }
    }

    fn dump_timestamp(&mut self) -> Result<(), WriteError> {
        if (Some(self.timestamp) != self.last_dumped_ts && self.dumping)
            || self.last_dumped_ts.is_none()
        {
            self.last_dumped_ts = Some(self.timestamp);
            writeln!(self.sink, "#{}", self.timestamp)?;
        }
        Ok(())
    }

    fn dump_values(&mut self, keyword: &str) -> Result<(), WriteError> {
        writeln!(self.sink, "{}", keyword)?;
        for var in &self.vars {
            if let Some(line) = var.dump_line(self.check_values)? {
                writeln!(self.sink, "{}", line)?;
            }
        }
        writeln!(self.sink, "$end")?;
        Ok(())
    }

    fn finalize_registration(&mut self) -> Result<(), WriteError> {
        debug_assert!(self.registering);
        let header = self.render_header();
        self.sink.write_all(header.as_bytes())?;
        if !self.vars.is_empty() {
            self.dump_timestamp()?;
            self.dump_values("$dumpvars")?;
        }
        self.registering = false;

        // Registration-phase state is not needed once the header is out.
        self.header_keywords.clear();
        self.scope_types.clear();
        self.scope_var_names.clear();
        Ok(())
    }

    fn render_header(&mut self) -> String {
        let mut out = String::new();
        for (keyword, value) in &self.header_keywords {
            if value.is_empty() {
                continue;
            }
            let mut lines = value.split('\n');
            let first = lines.next().unwrap_or_default();
            if value.contains('\n') {
                out.push_str(keyword);
                out.push('\n');
                out.push_str(&format!("\t{}\n", first));
                for line in lines {
                    out.push_str(&format!("\t{}\n", line));
                }
                out.push_str("$end\n");
            } else {
                out.push_str(&format!("{} {} $end\n", keyword, first));
            }
        }

        let mut prev_scope: Vec<String> = Vec::new();
        for (scope, decls) in mem::take(&mut self.scope_var_decls) {
            let common = prev_scope
                .iter()
                .zip(scope.iter())
                .take_while(|(a, b)| a == b)
                .count();
            for _ in common..prev_scope.len() {
                out.push_str("$upscope $end\n");
            }
            for (depth, name) in scope.iter().enumerate().skip(common) {
                let scope_type = self
                    .scope_types
                    .get(&scope[..=depth])
                    .copied()
                    .unwrap_or(self.default_scope_type);
                out.push_str(&format!("$scope {} {} $end\n", scope_type, name));
            }
            for decl in decls {
                out.push_str(&decl);
                out.push('\n');
            }
            prev_scope = scope;
        }
        for _ in 0..prev_scope.len() {
            out.push_str("$upscope $end\n");
        }
        out.push_str("$enddefinitions $end\n");
        out
    }
}

impl<W: Write> Drop for VcdWriter<W> {
    fn drop(&mut self) {
        let _ = self.close(None);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::read::{TokenKind, Tokenizer};
    use crate::value::Value;

    fn render(f: impl FnOnce(&mut VcdWriter<&mut Vec<u8>>)) -> String {
        let mut buf = Vec::new();
        {
            let mut writer = VcdWriter::new(&mut buf);
            f(&mut writer);
            writer.close(None).unwrap();
        }
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn empty_stream() {
        let out = render(|_| {});
        assert_eq!(out, "$timescale 1 us $end\n$enddefinitions $end\n");
    }

    #[test]
    fn header_keywords_sorted() {
        let mut buf = Vec::new();
        {
            let mut writer = VcdWriterBuilder::new()
                .date("today")
                .version("v1")
                .comment("hello\nworld")
                .build(&mut buf);
            writer.close(None).unwrap();
        }
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(
            out,
            "$comment\n\
             \thello\n\
             \tworld\n\
             $end\n\
             $date today $end\n\
             $timescale 1 us $end\n\
             $version v1 $end\n\
             $enddefinitions $end\n"
        );
    }

    #[test]
    fn scopes_sorted_and_compressed() {
        let out = render(|w| {
            w.register_var("eee", "e0", VarType::Wire, Some(1.into()), VarValue::Absent)
                .unwrap();
            w.register_var(
                "aaa.bbb",
                "ab0",
                VarType::Wire,
                Some(1.into()),
                VarValue::Absent,
            )
            .unwrap();
            w.register_var("aaa", "a0", VarType::Wire, Some(1.into()), VarValue::Absent)
                .unwrap();
            w.register_var(
                &["aaa", "ccc"],
                "ac0",
                VarType::Wire,
                Some(1.into()),
                VarValue::Absent,
            )
            .unwrap();
            w.set_scope_type("aaa.bbb", ScopeType::Task).unwrap();
        });
        assert_eq!(
            out,
            "$timescale 1 us $end\n\
             $scope module aaa $end\n\
             $var wire 1 2 a0 $end\n\
             $scope task bbb $end\n\
             $var wire 1 1 ab0 $end\n\
             $upscope $end\n\
             $scope module ccc $end\n\
             $var wire 1 3 ac0 $end\n\
             $upscope $end\n\
             $upscope $end\n\
             $scope module eee $end\n\
             $var wire 1 0 e0 $end\n\
             $upscope $end\n\
             $enddefinitions $end\n\
             #0\n\
             $dumpvars\n\
             x0\n\
             x1\n\
             x2\n\
             x3\n\
             $end\n"
        );
    }

    #[test]
    fn changes_and_deduplication() {
        let out = render(|w| {
            let n = w
                .register_var("top", "n", VarType::Integer, None, VarValue::Absent)
                .unwrap();
            w.change(n, 0, 5u8).unwrap();
            w.change(n, 1, 5u8).unwrap();
            w.change(n, 2, 6u8).unwrap();
            w.change(n, 2, 7u8).unwrap();
        });
        assert_eq!(
            out,
            "$timescale 1 us $end\n\
             $scope module top $end\n\
             $var integer 64 0 n $end\n\
             $upscope $end\n\
             $enddefinitions $end\n\
             #0\n\
             $dumpvars\n\
             b101 0\n\
             $end\n\
             #2\n\
             b110 0\n\
             b111 0\n"
        );
    }

    #[test]
    fn dump_off_and_on() {
        let out = render(|w| {
            let s = w
                .register_var("top", "s", VarType::Wire, Some(1.into()), false.into())
                .unwrap();
            let r = w
                .register_var("top", "r", VarType::Real, None, VarValue::Absent)
                .unwrap();
            let e = w
                .register_var("top", "e", VarType::Event, None, VarValue::Absent)
                .unwrap();
            w.change(s, 1, true).unwrap();
            w.dump_off(5).unwrap();
            w.dump_off(6).unwrap();
            w.change(s, 7, false).unwrap();
            w.change(e, 7, true).unwrap();
            w.change(r, 8, 2.5).unwrap();
            w.dump_on(10).unwrap();
            w.change(s, 11, true).unwrap();
        });
        assert_eq!(
            out,
            "$timescale 1 us $end\n\
             $scope module top $end\n\
             $var wire 1 0 s $end\n\
             $var real 64 1 r $end\n\
             $var event 1 2 e $end\n\
             $upscope $end\n\
             $enddefinitions $end\n\
             #0\n\
             $dumpvars\n\
             00\n\
             r0 1\n\
             $end\n\
             #1\n\
             10\n\
             #5\n\
             $dumpoff\n\
             x0\n\
             $end\n\
             #10\n\
             $dumpon\n\
             00\n\
             r2.5 1\n\
             $end\n\
             #11\n\
             10\n"
        );
    }

    #[test]
    fn aliases_share_ident() {
        let out = render(|w| {
            let v = w
                .register_var("a", "x", VarType::Wire, Some(1.into()), VarValue::Absent)
                .unwrap();
            w.register_alias("b", "y", v).unwrap();
            assert_eq!(w.var_ident(v).unwrap().as_str(), "0");
            w.change(v, 1, true).unwrap();
        });
        assert_eq!(
            out,
            "$timescale 1 us $end\n\
             $scope module a $end\n\
             $var wire 1 0 x $end\n\
             $upscope $end\n\
             $scope module b $end\n\
             $var wire 1 0 y $end\n\
             $upscope $end\n\
             $enddefinitions $end\n\
             #0\n\
             $dumpvars\n\
             x0\n\
             $end\n\
             #1\n\
             10\n"
        );
    }

    #[test]
    fn explicit_idents() {
        let out = render(|w| {
            let clk = w
                .register_var_with_ident(
                    "top",
                    "clk",
                    VarType::Wire,
                    Some(1.into()),
                    VarValue::Absent,
                    "!".parse().unwrap(),
                )
                .unwrap();
            let n = w
                .register_var("top", "n", VarType::Wire, Some(1.into()), VarValue::Absent)
                .unwrap();
            assert_eq!(w.var_ident(clk).unwrap().as_str(), "!");
            assert_eq!(w.var_ident(n).unwrap().as_str(), "0");
            w.change(clk, 1, true).unwrap();
        });
        assert!(out.contains("$var wire 1 ! clk $end\n"));
        assert!(out.contains("$var wire 1 0 n $end\n"));
        assert!(out.ends_with("#1\n1!\n"));
    }

    #[test]
    fn compound_vector_changes() {
        let out = render(|w| {
            let v = w
                .register_var(
                    "top",
                    "v",
                    VarType::Wire,
                    Some(vec![8, 4, 1].into()),
                    VarValue::Absent,
                )
                .unwrap();
            w.change(
                v,
                1,
                VarValue::Compound(vec![
                    VarValue::Int(0xf),
                    VarValue::Int(0),
                    VarValue::Int(1),
                ]),
            )
            .unwrap();
        });
        assert!(out.contains("$var wire 13 0 v $end\n"));
        assert!(out.ends_with("#1\nb111100001 0\n"));
    }

    #[test]
    fn phase_errors() {
        let mut buf = Vec::new();
        let mut writer = VcdWriter::new(&mut buf);
        let v = writer
            .register_var("top", "v", VarType::Wire, Some(1.into()), VarValue::Absent)
            .unwrap();
        writer.change(v, 5, true).unwrap();
        assert!(matches!(
            writer.change(v, 3, false),
            Err(WriteError::TimestampDecrease {
                timestamp: 3,
                current: 5
            })
        ));
        assert!(matches!(
            writer.register_var("top", "w", VarType::Wire, Some(1.into()), VarValue::Absent),
            Err(WriteError::RegistrationClosed)
        ));
        writer.close(Some(9)).unwrap();
        writer.close(None).unwrap();
        assert!(matches!(writer.change(v, 9, false), Err(WriteError::Closed)));
        assert!(matches!(writer.flush(None), Err(WriteError::Closed)));
    }

    #[test]
    fn registration_errors() {
        let mut buf = Vec::new();
        let mut writer = VcdWriter::new(&mut buf);
        writer
            .register_var("top", "v", VarType::Wire, Some(1.into()), VarValue::Absent)
            .unwrap();
        assert!(matches!(
            writer.register_var("top", "v", VarType::Wire, Some(1.into()), VarValue::Absent),
            Err(WriteError::DuplicateVar { .. })
        ));
        assert!(matches!(
            writer.register_var("top", "w", VarType::Wire, None, VarValue::Absent),
            Err(WriteError::MissingSize(VarType::Wire))
        ));
        assert!(matches!(
            writer.register_var("", "w", VarType::Wire, Some(1.into()), VarValue::Absent),
            Err(WriteError::InvalidScope(_))
        ));
        assert!(matches!(
            writer.register_var("a..b", "w", VarType::Wire, Some(1.into()), VarValue::Absent),
            Err(WriteError::InvalidScope(_))
        ));
        assert!(matches!(
            writer.register_var(
                "top",
                "w",
                VarType::Wire,
                Some(2.into()),
                VarValue::Int(4)
            ),
            Err(WriteError::InvalidValue(_))
        ));
    }

    #[test]
    fn init_timestamp_and_flush() {
        let mut buf = Vec::new();
        {
            let mut writer = VcdWriterBuilder::new().init_timestamp(42).build(&mut buf);
            let v = writer
                .register_var("top", "v", VarType::Wire, Some(1.into()), VarValue::Absent)
                .unwrap();
            writer.change(v, 42, true).unwrap();
            writer.flush(Some(50)).unwrap();
        }
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("#42\n$dumpvars\n10\n$end\n"));
        assert!(out.ends_with("#50\n"));
    }

    #[test]
    fn output_tokenizes_cleanly() {
        let mut buf = Vec::new();
        {
            let mut writer = VcdWriterBuilder::new()
                .date("a date")
                .build(&mut buf);
            let s = writer
                .register_var("top", "s", VarType::Wire, Some(1.into()), VarValue::Absent)
                .unwrap();
            let n = writer
                .register_var("top.sub", "n", VarType::Integer, None, 3u8.into())
                .unwrap();
            let t = writer
                .register_var("top", "t", VarType::String, None, VarValue::Absent)
                .unwrap();
            writer.change(s, 1, true).unwrap();
            writer.change(n, 2, -1i8).unwrap();
            writer.change(t, 2, VarValue::Text("hi".into())).unwrap();
            writer.dump_off(3).unwrap();
            writer.dump_on(4).unwrap();
            writer.close(Some(5)).unwrap();
        }
        let tokens: Vec<TokenKind> = Tokenizer::new(&buf[..])
            .map(|t| t.unwrap().kind)
            .collect();
        let wire = "0".parse().unwrap();
        let int = "1".parse().unwrap();
        assert!(tokens.contains(&TokenKind::Date("a date".to_string())));
        assert!(tokens.contains(&TokenKind::TimeChange(1)));
        assert!(tokens.contains(&TokenKind::ScalarChange {
            code: wire,
            value: Value::V1
        }));
        assert!(tokens.contains(&TokenKind::VectorChange {
            code: int,
            value: crate::read::VectorValue::Int(u64::MAX.into())
        }));
        assert!(tokens.contains(&TokenKind::DumpOff));
        assert!(tokens.contains(&TokenKind::DumpOn));
        assert_eq!(tokens.last(), Some(&TokenKind::TimeChange(5)));
    }
}
