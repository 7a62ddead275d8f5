use std::fmt::{self, Display};
use std::str::FromStr;

/// Parse error for an invalid ID code.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvalidIdCode {
    /// ID is empty
    #[error("ID code cannot be empty")]
    Empty,
    /// ID contains characters outside printable ASCII
    #[error("ID code may only contain printable ASCII characters")]
    InvalidChars,
}

const ID_CHAR_MIN: u8 = b'!';
const ID_CHAR_MAX: u8 = b'~';

/// An ID used within the file to refer to a particular variable.
///
/// Any non-empty run of printable ASCII characters (33-126) is a valid code.
/// Codes assigned by the writer count up in base 16 (`0`, `1`, ... `a`, ...),
/// but files produced by other tools use arbitrary printable tokens and
/// compare only by exact byte equality.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct IdCode(String);

impl IdCode {
    pub(crate) fn new(v: &[u8]) -> Result<IdCode, InvalidIdCode> {
        if v.is_empty() {
            return Err(InvalidIdCode::Empty);
        }
        if !v.iter().all(|b| (ID_CHAR_MIN..=ID_CHAR_MAX).contains(b)) {
            return Err(InvalidIdCode::InvalidChars);
        }
        // All bytes are printable ASCII, so this cannot fail.
        Ok(IdCode(String::from_utf8_lossy(v).into_owned()))
    }

    /// The code the writer assigns to the `index`-th registered variable.
    pub(crate) fn from_index(index: u64) -> IdCode {
        IdCode(format!("{:x}", index))
    }

    /// The code as it appears in the VCD stream.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IdCode {
    type Err = InvalidIdCode;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdCode::new(s.as_bytes())
    }
}

impl Display for IdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
