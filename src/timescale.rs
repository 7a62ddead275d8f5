use std::fmt::{self, Display};
use std::str::FromStr;

/// Parse error for an invalid `$timescale` value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid timescale: {0}")]
pub struct InvalidTimescale(pub String);

/// A unit of time for the `$timescale` command.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TimescaleUnit {
    S,
    MS,
    US,
    NS,
    PS,
    FS,
}

impl FromStr for TimescaleUnit {
    type Err = InvalidTimescale;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use TimescaleUnit::*;
        match s {
            "s" => Ok(S),
            "ms" => Ok(MS),
            "us" => Ok(US),
            "ns" => Ok(NS),
            "ps" => Ok(PS),
            "fs" => Ok(FS),
            _ => Err(InvalidTimescale(s.to_string())),
        }
    }
}

impl Display for TimescaleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TimescaleUnit::*;
        write!(
            f,
            "{}",
            match *self {
                S => "s",
                MS => "ms",
                US => "us",
                NS => "ns",
                PS => "ps",
                FS => "fs",
            }
        )
    }
}

impl TimescaleUnit {
    /// The number of timescale ticks per second.
    pub fn divisor(&self) -> u64 {
        use TimescaleUnit::*;
        match *self {
            S => 1,
            MS => 1_000,
            US => 1_000_000,
            NS => 1_000_000_000,
            PS => 1_000_000_000_000,
            FS => 1_000_000_000_000_000,
        }
    }

    /// The duration of a timescale tick in seconds.
    pub fn fraction(&self) -> f64 {
        1.0 / (self.divisor() as f64)
    }
}

/// Magnitude of a `$timescale` command. Only 1, 10, and 100 are valid.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TimescaleMagnitude {
    One,
    Ten,
    Hundred,
}

impl TimescaleMagnitude {
    /// Numeric value of the magnitude.
    pub fn value(&self) -> u32 {
        match *self {
            TimescaleMagnitude::One => 1,
            TimescaleMagnitude::Ten => 10,
            TimescaleMagnitude::Hundred => 100,
        }
    }

    pub(crate) fn from_u64(v: u64) -> Option<TimescaleMagnitude> {
        match v {
            1 => Some(TimescaleMagnitude::One),
            10 => Some(TimescaleMagnitude::Ten),
            100 => Some(TimescaleMagnitude::Hundred),
            _ => None,
        }
    }
}

impl Display for TimescaleMagnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A full `$timescale` value: magnitude and unit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Timescale {
    pub magnitude: TimescaleMagnitude,
    pub unit: TimescaleUnit,
}

impl Timescale {
    pub fn new(magnitude: TimescaleMagnitude, unit: TimescaleUnit) -> Timescale {
        Timescale { magnitude, unit }
    }
}

impl FromStr for Timescale {
    type Err = InvalidTimescale;

    /// Parses timescales such as `"us"`, `"1 us"`, or `"100ps"`.
    ///
    /// A bare unit implies a magnitude of 1. Otherwise the magnitude prefix
    /// is matched longest-first (so `"100ps"` is not read as `10 0ps`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(unit) = s.parse::<TimescaleUnit>() {
            return Ok(Timescale::new(TimescaleMagnitude::One, unit));
        }
        for magnitude in [
            TimescaleMagnitude::Hundred,
            TimescaleMagnitude::Ten,
            TimescaleMagnitude::One,
        ] {
            let mag_str = magnitude.value().to_string();
            if let Some(rest) = s.strip_prefix(&mag_str) {
                let unit = rest
                    .trim_start_matches(' ')
                    .parse::<TimescaleUnit>()
                    .map_err(|_| InvalidTimescale(s.to_string()))?;
                return Ok(Timescale::new(magnitude, unit));
            }
        }
        Err(InvalidTimescale(s.to_string()))
    }
}

impl Display for Timescale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_format() {
        for (input, expected) in [
            ("1 us", "1 us"),
            ("us", "1 us"),
            ("100ps", "100 ps"),
            ("10 ns", "10 ns"),
            ("fs", "1 fs"),
        ] {
            let ts: Timescale = input.parse().unwrap();
            assert_eq!(ts.to_string(), expected);
        }
    }

    #[test]
    fn parse_invalid() {
        assert!("2 us".parse::<Timescale>().is_err());
        assert!("1 Gs".parse::<Timescale>().is_err());
        assert!("".parse::<Timescale>().is_err());
        assert!("1000 ns".parse::<Timescale>().is_err());
    }

    #[test]
    fn unit_divisor() {
        assert_eq!(TimescaleUnit::S.divisor(), 1);
        assert_eq!(TimescaleUnit::NS.divisor(), 1_000_000_000);
    }
}
