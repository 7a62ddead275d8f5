use std::fmt::{self, Display};
use std::str::FromStr;

/// A type of scope, as used in the `$scope` command.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScopeType {
    Begin,
    Fork,
    Function,
    Module,
    Task,
}

/// Parse error for an invalid scope type keyword.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid scope type")]
pub struct InvalidScopeType;

impl FromStr for ScopeType {
    type Err = InvalidScopeType;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ScopeType::*;
        match s {
            "begin" => Ok(Begin),
            "fork" => Ok(Fork),
            "function" => Ok(Function),
            "module" => Ok(Module),
            "task" => Ok(Task),
            _ => Err(InvalidScopeType),
        }
    }
}

impl Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ScopeType::*;
        write!(
            f,
            "{}",
            match *self {
                Begin => "begin",
                Fork => "fork",
                Function => "function",
                Module => "module",
                Task => "task",
            }
        )
    }
}

/// A type of variable, as used in the `$var` command.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VarType {
    Event,
    Integer,
    Logic,
    Parameter,
    Real,
    RealTime,
    Reg,
    Supply0,
    Supply1,
    Time,
    Tri,
    TriAnd,
    TriOr,
    TriReg,
    Tri0,
    Tri1,
    WAnd,
    Wire,
    WOr,
    String,
}

/// Parse error for an invalid variable type keyword.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid variable type")]
pub struct InvalidVarType;

impl FromStr for VarType {
    type Err = InvalidVarType;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use VarType::*;
        match s {
            "event" => Ok(Event),
            "integer" => Ok(Integer),
            "logic" => Ok(Logic),
            "parameter" => Ok(Parameter),
            "real" => Ok(Real),
            "realtime" => Ok(RealTime),
            "reg" => Ok(Reg),
            "supply0" => Ok(Supply0),
            "supply1" => Ok(Supply1),
            "time" => Ok(Time),
            "tri" => Ok(Tri),
            "triand" => Ok(TriAnd),
            "trior" => Ok(TriOr),
            "trireg" => Ok(TriReg),
            "tri0" => Ok(Tri0),
            "tri1" => Ok(Tri1),
            "wand" => Ok(WAnd),
            "wire" => Ok(Wire),
            "wor" => Ok(WOr),
            "string" => Ok(String),
            _ => Err(InvalidVarType),
        }
    }
}

impl Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use VarType::*;
        write!(
            f,
            "{}",
            match *self {
                Event => "event",
                Integer => "integer",
                Logic => "logic",
                Parameter => "parameter",
                Real => "real",
                RealTime => "realtime",
                Reg => "reg",
                Supply0 => "supply0",
                Supply1 => "supply1",
                Time => "time",
                Tri => "tri",
                TriAnd => "triand",
                TriOr => "trior",
                TriReg => "trireg",
                Tri0 => "tri0",
                Tri1 => "tri1",
                WAnd => "wand",
                Wire => "wire",
                WOr => "wor",
                String => "string",
            }
        )
    }
}

impl VarType {
    /// All valid variable type keywords, for diagnostics.
    pub(crate) const KEYWORDS: &'static str = "event, integer, logic, parameter, real, \
        realtime, reg, supply0, supply1, time, tri, triand, trior, trireg, tri0, tri1, \
        wand, wire, wor, string";
}

/// Index of a VCD variable reference, either a bit select index `[i]` or a
/// range index `[msb:lsb]`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ReferenceIndex {
    BitSelect(u32),
    Range(u32, u32),
}

/// Parse error for an invalid bit index.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid reference index")]
pub struct InvalidReferenceIndex;

impl FromStr for ReferenceIndex {
    type Err = InvalidReferenceIndex;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix('[').ok_or(InvalidReferenceIndex)?;
        let s = s.strip_suffix(']').ok_or(InvalidReferenceIndex)?;
        match s.split_once(':') {
            Some((msb_str, lsb_str)) => {
                let msb: u32 = msb_str.trim().parse().map_err(|_| InvalidReferenceIndex)?;
                let lsb: u32 = lsb_str.trim().parse().map_err(|_| InvalidReferenceIndex)?;
                Ok(ReferenceIndex::Range(msb, lsb))
            }
            None => {
                let idx: u32 = s.trim().parse().map_err(|_| InvalidReferenceIndex)?;
                Ok(ReferenceIndex::BitSelect(idx))
            }
        }
    }
}

impl Display for ReferenceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ReferenceIndex::*;
        match self {
            BitSelect(idx) => write!(f, "[{}]", idx),
            Range(msb, lsb) => write!(f, "[{}:{}]", msb, lsb),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scope_type_round_trip() {
        for kw in ["begin", "fork", "function", "module", "task"] {
            assert_eq!(kw.parse::<ScopeType>().unwrap().to_string(), kw);
        }
        assert!("InVaLiD".parse::<ScopeType>().is_err());
    }

    #[test]
    fn var_type_round_trip() {
        for kw in [
            "event", "integer", "logic", "parameter", "real", "realtime", "reg", "supply0",
            "supply1", "time", "tri", "triand", "trior", "trireg", "tri0", "tri1", "wand", "wire",
            "wor", "string",
        ] {
            assert_eq!(kw.parse::<VarType>().unwrap().to_string(), kw);
        }
        assert!("InVaLiD".parse::<VarType>().is_err());
    }

    #[test]
    fn reference_index() {
        assert_eq!(
            "[17]".parse::<ReferenceIndex>().unwrap(),
            ReferenceIndex::BitSelect(17)
        );
        assert_eq!(
            "[9:0]".parse::<ReferenceIndex>().unwrap(),
            ReferenceIndex::Range(9, 0)
        );
        assert_eq!(ReferenceIndex::Range(7, 3).to_string(), "[7:3]");
        assert!("9:0".parse::<ReferenceIndex>().is_err());
        assert!("[a]".parse::<ReferenceIndex>().is_err());
    }
}
