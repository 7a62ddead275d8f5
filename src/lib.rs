//! Read and write VCD (Value Change Dump) files, as defined in IEEE
//! 1364-2005 section 18.2.
//!
//! Reading is pull-based: [`Tokenizer`] wraps any [`std::io::Read`] and
//! yields one [`Token`] per VCD command without building a document model,
//! so arbitrarily large dumps can be scanned in constant memory. Writing is
//! stateful: [`VcdWriter`] tracks registered variables and the current
//! simulation time, deduplicates redundant value changes, and lays out the
//! header (sorted scopes, `$dumpvars` initial values) on its own.
//!
//! Reading:
//!
//! ```
//! use vcdio::{Tokenizer, TokenKind};
//!
//! let vcd = b"\
//! $timescale 1 ns $end
//! $scope module top $end
//! $var wire 1 ! clk $end
//! $upscope $end
//! $enddefinitions $end
//! #0
//! 0!
//! #5
//! 1!
//! ";
//! let mut clock_edges = 0;
//! for token in Tokenizer::new(&vcd[..]) {
//!     if let TokenKind::ScalarChange { .. } = token.unwrap().kind {
//!         clock_edges += 1;
//!     }
//! }
//! assert_eq!(clock_edges, 2);
//! ```
//!
//! Writing:
//!
//! ```
//! use vcdio::{VarType, VarValue, VcdWriterBuilder};
//!
//! let mut buf = Vec::new();
//! let mut writer = VcdWriterBuilder::new().build(&mut buf);
//! let counter = writer
//!     .register_var("top", "counter", VarType::Integer, None, VarValue::Absent)
//!     .unwrap();
//! writer.change(counter, 1, 5u8).unwrap();
//! writer.change(counter, 2, 6u8).unwrap();
//! writer.close(None).unwrap();
//! ```

mod idcode;
mod read;
mod scope;
mod timescale;
mod value;
mod variable;
mod write;

pub use idcode::{IdCode, InvalidIdCode};
pub use read::{
    Location, ReadError, ScopeDecl, Span, Token, TokenKind, Tokenizer, VarDecl, VectorValue,
};
pub use scope::{
    InvalidReferenceIndex, InvalidScopeType, InvalidVarType, ReferenceIndex, ScopeType, VarType,
};
pub use timescale::{InvalidTimescale, Timescale, TimescaleMagnitude, TimescaleUnit};
pub use value::{InvalidValue, Value};
pub use variable::{InvalidVarValue, VarSize, VarValue};
pub use write::{ScopeRef, VarId, VcdWriter, VcdWriterBuilder, WriteError};
