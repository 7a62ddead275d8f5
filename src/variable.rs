//! Variable sizes, change values, and the per-variable encoders used by
//! [`VcdWriter`](crate::write::VcdWriter).

use thiserror::Error;

use crate::idcode::IdCode;
use crate::scope::VarType;
use crate::value::Value;

/// A value could not be encoded for the variable it was given to.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{0}")]
pub struct InvalidVarValue(pub(crate) String);

/// Size of a variable, in bits.
///
/// Vector variables may declare a compound size, a sequence of field widths
/// that together make up the vector. A compound variable's value is then
/// given per-field, and the encoder packs the fields into a single `b...`
/// vector change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarSize {
    /// A flat width.
    Bits(u32),
    /// Field widths, most significant field first.
    Compound(Vec<u32>),
}

impl VarSize {
    /// Total width in bits, as declared in the `$var` command.
    pub fn total_bits(&self) -> u32 {
        match self {
            VarSize::Bits(n) => *n,
            VarSize::Compound(widths) => widths.iter().sum(),
        }
    }
}

impl From<u32> for VarSize {
    fn from(bits: u32) -> Self {
        VarSize::Bits(bits)
    }
}

impl From<Vec<u32>> for VarSize {
    fn from(widths: Vec<u32>) -> Self {
        VarSize::Compound(widths)
    }
}

impl From<&[u32]> for VarSize {
    fn from(widths: &[u32]) -> Self {
        VarSize::Compound(widths.to_vec())
    }
}

/// A value passed to [`VcdWriter::change`](crate::write::VcdWriter::change).
///
/// Which variants a variable accepts depends on its type:
///
/// * scalars take [`Scalar`](VarValue::Scalar), [`Int`](VarValue::Int)
///   (nonzero is `1`), a single-character [`Bits`](VarValue::Bits), or
///   [`Absent`](VarValue::Absent) (written as `z`)
/// * vectors take [`Int`](VarValue::Int) (two's complement),
///   [`Bits`](VarValue::Bits) (a four-state digit string), a
///   [`Scalar`](VarValue::Scalar), or [`Absent`](VarValue::Absent)
/// * compound vectors take [`Compound`](VarValue::Compound) with one field
///   value per declared width
/// * reals take [`Real`](VarValue::Real) or [`Int`](VarValue::Int)
/// * strings take [`Text`](VarValue::Text) or [`Absent`](VarValue::Absent)
/// * events take any truthy value, conventionally `true`
#[derive(Clone, Debug, PartialEq)]
pub enum VarValue {
    /// No value. High-impedance for scalars and vectors, empty for strings.
    Absent,
    Scalar(Value),
    Int(i128),
    /// A string of four-state digits (`0`, `1`, `x`, `z`, case-insensitive).
    Bits(String),
    Real(f64),
    Text(String),
    Compound(Vec<VarValue>),
}

impl From<bool> for VarValue {
    fn from(v: bool) -> Self {
        VarValue::Scalar(Value::from(v))
    }
}

impl From<Value> for VarValue {
    fn from(v: Value) -> Self {
        VarValue::Scalar(v)
    }
}

impl From<f64> for VarValue {
    fn from(v: f64) -> Self {
        VarValue::Real(v)
    }
}

impl<T: Into<VarValue>> From<Option<T>> for VarValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => VarValue::Absent,
        }
    }
}

macro_rules! varvalue_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for VarValue {
            fn from(v: $t) -> Self {
                VarValue::Int(v as i128)
            }
        })*
    };
}

varvalue_from_int!(u8, u16, u32, u64, i8, i16, i32, i64, i128);

/// How changes for one variable are rendered into the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Encoder {
    Scalar,
    Vector { width: u32 },
    Compound { widths: Vec<u32> },
    Real,
    Str,
    Event,
}

/// Per-variable writer state: the identifier code, the encoder, and the last
/// value written (used to elide redundant changes and to fill `$dumpvars`).
#[derive(Debug)]
pub(crate) struct VarState {
    pub ident: IdCode,
    pub var_type: VarType,
    pub size: VarSize,
    pub encoder: Encoder,
    pub value: VarValue,
}

impl VarState {
    /// Renders `value` as a value-change line, without the trailing newline.
    ///
    /// With `check` set, values are validated against the variable's size and
    /// kind; without it only errors that cannot be ignored are reported.
    /// String values are never escaped: a string containing a space or any
    /// ASCII control character (including `\t` and `\n`) is rejected rather
    /// than rewritten.
    pub fn format(&self, value: &VarValue, check: bool) -> Result<String, InvalidVarValue> {
        match &self.encoder {
            Encoder::Scalar => {
                let c = scalar_char(value, check)?;
                Ok(format!("{}{}", c, self.ident))
            }
            Encoder::Vector { width } => {
                let bits = vector_field(value, *width, check)?;
                Ok(format!("b{} {}", bits, self.ident))
            }
            Encoder::Compound { widths } => {
                let bits = compound_fields(value, widths, check)?;
                Ok(format!("b{} {}", bits, self.ident))
            }
            Encoder::Real => match value {
                VarValue::Real(v) => Ok(format!("r{} {}", v, self.ident)),
                VarValue::Int(v) => Ok(format!("r{} {}", *v as f64, self.ident)),
                other => Err(InvalidVarValue(format!("invalid real value: {:?}", other))),
            },
            Encoder::Str => {
                let text = match value {
                    VarValue::Text(s) => s.as_str(),
                    VarValue::Absent => "",
                    other => {
                        return Err(InvalidVarValue(format!(
                            "invalid string value: {:?}",
                            other
                        )))
                    }
                };
                if text.bytes().any(|b| b == b' ' || b.is_ascii_control()) {
                    return Err(InvalidVarValue(format!(
                        "invalid string value: {:?}",
                        text
                    )));
                }
                Ok(format!("s{} {}", text, self.ident))
            }
            Encoder::Event => {
                let fired = match value {
                    VarValue::Scalar(v) => *v == Value::V1,
                    VarValue::Int(v) => *v != 0,
                    _ => false,
                };
                if fired {
                    Ok(format!("1{}", self.ident))
                } else {
                    Err(InvalidVarValue(format!("invalid event value: {:?}", value)))
                }
            }
        }
    }

    /// The line restating this variable's current value, as used in
    /// `$dumpvars`, `$dumpon`, and `$dumpall` blocks. Events are transient
    /// and have no line.
    pub fn dump_line(&self, check: bool) -> Result<Option<String>, InvalidVarValue> {
        if self.encoder == Encoder::Event {
            Ok(None)
        } else {
            self.format(&self.value, check).map(Some)
        }
    }

    /// The forced-unknown line written in a `$dumpoff` block. Reals, strings,
    /// and events have no unknown state and so have no line.
    pub fn dump_off_line(&self) -> Option<String> {
        match self.encoder {
            Encoder::Scalar => Some(format!("x{}", self.ident)),
            Encoder::Vector { .. } | Encoder::Compound { .. } => {
                Some(format!("bx {}", self.ident))
            }
            Encoder::Real | Encoder::Str | Encoder::Event => None,
        }
    }

    /// The value a variable registered without an initial value starts with.
    pub fn default_init(encoder: &Encoder) -> VarValue {
        match encoder {
            Encoder::Scalar | Encoder::Vector { .. } => VarValue::Scalar(Value::X),
            Encoder::Compound { widths } => {
                VarValue::Compound(vec![VarValue::Scalar(Value::X); widths.len()])
            }
            Encoder::Real => VarValue::Real(0.0),
            Encoder::Str => VarValue::Text(String::new()),
            Encoder::Event => VarValue::Int(1),
        }
    }
}

fn scalar_char(value: &VarValue, check: bool) -> Result<char, InvalidVarValue> {
    match value {
        VarValue::Scalar(v) => Ok(match v {
            Value::V0 => '0',
            Value::V1 => '1',
            Value::X => 'x',
            Value::Z => 'z',
        }),
        VarValue::Absent => Ok('z'),
        VarValue::Int(v) => Ok(if *v != 0 { '1' } else { '0' }),
        VarValue::Bits(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if !check || "01xzXZ".contains(c) => Ok(c),
                _ => Err(InvalidVarValue(format!("invalid scalar value: {:?}", s))),
            }
        }
        other => Err(InvalidVarValue(format!("invalid scalar value: {:?}", other))),
    }
}

/// Renders one vector field in minimal form, relying on the reader's
/// left-extension rules for the dropped leading digits. Integers use two's
/// complement; negative values render at full width so the sign bit survives
/// zero-extension.
fn vector_field(value: &VarValue, size: u32, check: bool) -> Result<String, InvalidVarValue> {
    match value {
        VarValue::Int(v) => format_int(*v, size, check),
        VarValue::Absent => Ok("z".to_string()),
        VarValue::Scalar(v) => Ok(v.to_string()),
        VarValue::Bits(s) => {
            if check
                && (s.is_empty()
                    || s.len() as u64 > u64::from(size)
                    || s.chars().any(|c| !"01xzXZ-".contains(c)))
            {
                Err(InvalidVarValue(format!("invalid vector value: {:?}", s)))
            } else {
                Ok(s.clone())
            }
        }
        other => Err(InvalidVarValue(format!("invalid vector value: {:?}", other))),
    }
}

fn format_int(v: i128, size: u32, check: bool) -> Result<String, InvalidVarValue> {
    if size >= 128 {
        return Ok(if v < 0 {
            let mut s = "1".repeat(size as usize - 128);
            s.push_str(&format!("{:b}", v as u128));
            s
        } else {
            format!("{:b}", v)
        });
    }
    let max = 1u128 << size;
    if check && ((v < 0 && v.unsigned_abs() > max >> 1) || (v >= 0 && v as u128 >= max)) {
        return Err(InvalidVarValue(format!(
            "value {} not representable in {} bits",
            v, size
        )));
    }
    if v < 0 {
        Ok(format!("{:b}", max.wrapping_sub(v.unsigned_abs())))
    } else {
        Ok(format!("{:b}", v))
    }
}

/// Packs compound fields right to left, extending each field only when the
/// reader's left-extension of the digits already emitted would not reproduce
/// it. A field of width `w` whose rendering is shorter than `w` digits is
/// implicitly filled per the same extension rules.
fn compound_fields(
    value: &VarValue,
    widths: &[u32],
    check: bool,
) -> Result<String, InvalidVarValue> {
    let fields = match value {
        VarValue::Compound(fields) => fields,
        other => {
            return Err(InvalidVarValue(format!(
                "invalid compound value: {:?}",
                other
            )))
        }
    };
    if fields.len() != widths.len() {
        return Err(InvalidVarValue(format!(
            "compound value {:?} must have {} fields",
            fields,
            widths.len()
        )));
    }

    let mut parts: Vec<String> = Vec::new();
    let mut emitted_len: u64 = 0;
    let mut size_sum: u64 = 0;
    for (field, &size) in fields.iter().rev().zip(widths.iter().rev()) {
        let vstr = vector_field(field, size, check)?;
        if parts.is_empty() {
            emitted_len += vstr.len() as u64;
            parts.push(vstr);
        } else {
            let leftc = *parts[0].as_bytes().first().unwrap_or(&b'0');
            let rightc = *vstr.as_bytes().first().unwrap_or(&b'0');
            if vstr.len() > 1
                || ((rightc != leftc || leftc == b'1') && (rightc != b'0' || leftc != b'1'))
            {
                let extendc = if leftc == b'1' { '0' } else { leftc as char };
                let extend = size_sum.saturating_sub(emitted_len) as usize;
                emitted_len += extend as u64 + vstr.len() as u64;
                parts.insert(0, extendc.to_string().repeat(extend));
                parts.insert(0, vstr);
            }
        }
        size_sum += u64::from(size);
    }
    Ok(parts.concat())
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn state(encoder: Encoder) -> VarState {
        let size = match &encoder {
            Encoder::Vector { width } => VarSize::Bits(*width),
            Encoder::Compound { widths } => VarSize::Compound(widths.clone()),
            _ => VarSize::Bits(1),
        };
        VarState {
            ident: "v".parse().unwrap(),
            var_type: VarType::Wire,
            size,
            encoder,
            value: VarValue::Scalar(Value::X),
        }
    }

    #[test]
    fn scalar_values() {
        let var = state(Encoder::Scalar);
        assert_eq!(var.format(&VarValue::Scalar(Value::V0), true).unwrap(), "0v");
        assert_eq!(var.format(&true.into(), true).unwrap(), "1v");
        assert_eq!(var.format(&VarValue::Int(7), true).unwrap(), "1v");
        assert_eq!(var.format(&VarValue::Absent, true).unwrap(), "zv");
        assert_eq!(
            var.format(&VarValue::Bits("X".to_string()), true).unwrap(),
            "Xv"
        );
        assert!(var.format(&VarValue::Bits("q".to_string()), true).is_err());
        assert!(var.format(&VarValue::Bits("01".to_string()), true).is_err());
        assert!(var.format(&VarValue::Real(1.0), true).is_err());
    }

    #[test]
    fn vector_ints_three_bits() {
        let var = state(Encoder::Vector { width: 3 });
        let cases = [
            (-4, "b100 v"),
            (-3, "b101 v"),
            (-1, "b111 v"),
            (0, "b0 v"),
            (1, "b1 v"),
            (6, "b110 v"),
            (7, "b111 v"),
        ];
        for (input, expected) in cases {
            assert_eq!(var.format(&VarValue::Int(input), true).unwrap(), expected);
        }
        assert!(var.format(&VarValue::Int(8), true).is_err());
        assert!(var.format(&VarValue::Int(-5), true).is_err());
    }

    #[test]
    fn vector_unchecked_out_of_range() {
        let var = state(Encoder::Vector { width: 3 });
        assert_eq!(var.format(&VarValue::Int(8), false).unwrap(), "b1000 v");
    }

    #[test]
    fn vector_strings() {
        let var = state(Encoder::Vector { width: 8 });
        assert_eq!(
            var.format(&VarValue::Bits("1xz0".to_string()), true).unwrap(),
            "b1xz0 v"
        );
        assert_eq!(var.format(&VarValue::Absent, true).unwrap(), "bz v");
        assert_eq!(
            var.format(&VarValue::Scalar(Value::X), true).unwrap(),
            "bx v"
        );
        assert!(var
            .format(&VarValue::Bits("101010101".to_string()), true)
            .is_err());
        assert!(var.format(&VarValue::Bits(String::new()), true).is_err());
        assert!(var.format(&VarValue::Bits("12".to_string()), true).is_err());
    }

    #[test]
    fn wide_vector_ints() {
        let var = state(Encoder::Vector { width: 128 });
        assert_eq!(
            var.format(&VarValue::Int(-1), true).unwrap(),
            format!("b{} v", "1".repeat(128))
        );
        assert_eq!(
            var.format(&VarValue::Int(i128::MIN), true).unwrap(),
            format!("b1{} v", "0".repeat(127))
        );
        let var = state(Encoder::Vector { width: 130 });
        assert_eq!(
            var.format(&VarValue::Int(-1), true).unwrap(),
            format!("b{} v", "1".repeat(130))
        );
        assert_eq!(var.format(&VarValue::Int(5), true).unwrap(), "b101 v");
    }

    #[test]
    fn compound_packing() {
        let var = state(Encoder::Compound {
            widths: vec![8, 4, 1],
        });
        let cases: [(&[VarValue], &str); 4] = [
            (
                &[VarValue::Int(0), VarValue::Int(0), VarValue::Int(1)],
                "b1 v",
            ),
            (
                &[VarValue::Int(8), VarValue::Int(4), VarValue::Int(1)],
                "b100001001 v",
            ),
            (
                &[VarValue::Int(0xf), VarValue::Int(0), VarValue::Int(1)],
                "b111100001 v",
            ),
            (
                &[VarValue::Absent, VarValue::Scalar(Value::X), VarValue::Absent],
                "bzxxxxz v",
            ),
        ];
        for (fields, expected) in cases {
            assert_eq!(
                var.format(&VarValue::Compound(fields.to_vec()), true).unwrap(),
                expected
            );
        }
        assert!(var
            .format(&VarValue::Compound(vec![VarValue::Int(0)]), true)
            .is_err());
        assert!(var.format(&VarValue::Int(0), true).is_err());
    }

    #[test]
    fn real_values() {
        let var = state(Encoder::Real);
        assert_eq!(var.format(&VarValue::Real(1.5), true).unwrap(), "r1.5 v");
        assert_eq!(var.format(&VarValue::Real(3.0), true).unwrap(), "r3 v");
        assert_eq!(var.format(&VarValue::Int(-2), true).unwrap(), "r-2 v");
        assert!(var.format(&VarValue::Text("x".to_string()), true).is_err());
    }

    #[test]
    fn string_values() {
        let var = state(Encoder::Str);
        assert_eq!(
            var.format(&VarValue::Text("hello".to_string()), true).unwrap(),
            "shello v"
        );
        assert_eq!(var.format(&VarValue::Absent, true).unwrap(), "s v");
        assert!(var
            .format(&VarValue::Text("has space".to_string()), true)
            .is_err());
        assert!(var
            .format(&VarValue::Text("tab\there".to_string()), true)
            .is_err());
    }

    #[test]
    fn event_values() {
        let var = state(Encoder::Event);
        assert_eq!(var.format(&true.into(), true).unwrap(), "1v");
        assert_eq!(var.format(&VarValue::Int(3), true).unwrap(), "1v");
        assert!(var.format(&VarValue::Int(0), true).is_err());
        assert!(var.format(&false.into(), true).is_err());
        assert_eq!(var.dump_line(true).unwrap(), None);
    }

    #[test]
    fn dump_off_lines() {
        assert_eq!(state(Encoder::Scalar).dump_off_line().as_deref(), Some("xv"));
        assert_eq!(
            state(Encoder::Vector { width: 4 }).dump_off_line().as_deref(),
            Some("bx v")
        );
        assert_eq!(
            state(Encoder::Compound { widths: vec![2, 2] })
                .dump_off_line()
                .as_deref(),
            Some("bx v")
        );
        assert_eq!(state(Encoder::Real).dump_off_line(), None);
        assert_eq!(state(Encoder::Str).dump_off_line(), None);
        assert_eq!(state(Encoder::Event).dump_off_line(), None);
    }

    #[test]
    fn var_size_totals() {
        assert_eq!(VarSize::from(8).total_bits(), 8);
        assert_eq!(VarSize::from(vec![8, 4, 1]).total_bits(), 13);
    }

    proptest! {
        #[test]
        fn int_twos_complement_roundtrip(v in any::<i64>()) {
            let bits = format_int(v as i128, 64, true).unwrap();
            prop_assert!(bits.len() <= 64);
            let raw = u64::from_str_radix(&bits, 2).unwrap();
            // Rendered strings shorter than the width zero-extend, which only
            // non-negative values produce.
            if v < 0 {
                prop_assert_eq!(bits.len(), 64);
            }
            prop_assert_eq!(raw as i64, v);
        }
    }
}
