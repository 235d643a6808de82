//! ABI type classification
//!
//! Turns one raw parameter type string (`uint256`, `bytes32[]`, `tuple[3]`) into
//! a [`TypeDescriptor`]. The grammar is a leading alphabetic base name, an
//! optional width, and at most one array suffix.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Width assumed for `uint` and `int` without an explicit size
pub const DEFAULT_INTEGER_BITS: u16 = 256;

/// Byte length of an address
pub const ADDRESS_BYTES: u8 = 20;

/// Reasons a type string falls outside the supported grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("does not match <base><width>[<length>]")]
    Malformed,
    #[error("unknown base type '{0}'")]
    UnknownBase(String),
    #[error("invalid width {width} for {base}")]
    InvalidWidth { base: String, width: String },
    #[error("{0} does not take a width")]
    UnexpectedWidth(String),
    #[error("fixed arrays must have at least one element")]
    ZeroLengthArray,
    #[error("arrays of arrays are not supported")]
    NestedArray,
    #[error("arrays and tuples map to relations, not columns")]
    NotAColumn,
}

/// Primitive or composite shape of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKind {
    /// Unsigned integer with its bit width
    Uint(u16),
    /// Signed integer with its bit width
    Int(u16),
    Bool,
    Address,
    /// `bytes1` through `bytes32`
    FixedBytes(u8),
    /// Dynamic `bytes`
    Bytes,
    String,
    Tuple,
}

/// Array suffix of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayCardinality {
    None,
    Fixed(usize),
    Dynamic,
}

/// Relation cardinality between a node and one of its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::OneToOne => write!(f, "one-to-one"),
            Cardinality::OneToMany => write!(f, "one-to-many"),
        }
    }
}

/// Structured form of a raw ABI type string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub kind: BaseKind,
    pub array: ArrayCardinality,
}

fn grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Regex::new(r"^([a-z]+)([0-9]*)((?:\[[0-9]*\])*)$").expect("type grammar regex is valid")
    })
}

/// Classify a raw ABI type string
pub fn classify(raw: &str) -> Result<TypeDescriptor, TypeError> {
    let captures = grammar().captures(raw.trim()).ok_or(TypeError::Malformed)?;

    let base = &captures[1];
    let width = &captures[2];
    let suffix = &captures[3];

    let kind = match base {
        "uint" | "int" => {
            let bits = if width.is_empty() {
                DEFAULT_INTEGER_BITS
            } else {
                parse_width(base, width, |bits| bits % 8 == 0 && (8..=256).contains(&bits))?
            };
            if base == "uint" {
                BaseKind::Uint(bits)
            } else {
                BaseKind::Int(bits)
            }
        }
        "bytes" if width.is_empty() => BaseKind::Bytes,
        "bytes" => {
            let len = parse_width(base, width, |len| (1..=32).contains(&len))?;
            BaseKind::FixedBytes(len as u8)
        }
        "bool" | "address" | "string" | "tuple" => {
            if !width.is_empty() {
                return Err(TypeError::UnexpectedWidth(base.to_string()));
            }
            match base {
                "bool" => BaseKind::Bool,
                "address" => BaseKind::Address,
                "string" => BaseKind::String,
                _ => BaseKind::Tuple,
            }
        }
        other => return Err(TypeError::UnknownBase(other.to_string())),
    };

    Ok(TypeDescriptor {
        kind,
        array: parse_array_suffix(suffix)?,
    })
}

fn parse_width<F>(base: &str, width: &str, valid: F) -> Result<u16, TypeError>
where
    F: Fn(u16) -> bool,
{
    if has_leading_zero(width) {
        return Err(TypeError::Malformed);
    }
    width
        .parse::<u16>()
        .ok()
        .filter(|w| valid(*w))
        .ok_or_else(|| TypeError::InvalidWidth {
            base: base.to_string(),
            width: width.to_string(),
        })
}

/// `0` alone is a number, `08` is not
fn has_leading_zero(digits: &str) -> bool {
    digits.len() > 1 && digits.starts_with('0')
}

fn parse_array_suffix(suffix: &str) -> Result<ArrayCardinality, TypeError> {
    if suffix.is_empty() {
        return Ok(ArrayCardinality::None);
    }

    // The grammar guarantees the suffix is a run of bracket groups
    if suffix.matches('[').count() > 1 {
        return Err(TypeError::NestedArray);
    }

    let inner = &suffix[1..suffix.len() - 1];
    if inner.is_empty() {
        return Ok(ArrayCardinality::Dynamic);
    }
    if has_leading_zero(inner) {
        return Err(TypeError::Malformed);
    }

    match inner.parse::<usize>() {
        Ok(0) => Err(TypeError::ZeroLengthArray),
        Ok(n) => Ok(ArrayCardinality::Fixed(n)),
        Err(_) => Err(TypeError::Malformed),
    }
}

impl TypeDescriptor {
    /// Bit width for integer kinds
    pub fn bit_width(&self) -> Option<u16> {
        match self.kind {
            BaseKind::Uint(bits) | BaseKind::Int(bits) => Some(bits),
            _ => None,
        }
    }

    /// Byte length for fixed-size byte kinds, including addresses
    pub fn byte_length(&self) -> Option<u8> {
        match self.kind {
            BaseKind::FixedBytes(len) => Some(len),
            BaseKind::Address => Some(ADDRESS_BYTES),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.array != ArrayCardinality::None
    }

    pub fn is_tuple(&self) -> bool {
        self.kind == BaseKind::Tuple
    }

    /// Cardinality of the relation this field becomes, or `None` for a plain column
    pub fn relation_cardinality(&self) -> Option<Cardinality> {
        match (self.kind, self.array) {
            (_, ArrayCardinality::Fixed(_)) | (_, ArrayCardinality::Dynamic) => Some(Cardinality::OneToMany),
            (BaseKind::Tuple, ArrayCardinality::None) => Some(Cardinality::OneToOne),
            _ => None,
        }
    }

    /// The same type without its array suffix
    pub fn element(&self) -> TypeDescriptor {
        TypeDescriptor {
            kind: self.kind,
            array: ArrayCardinality::None,
        }
    }

    /// Array suffix in canonical form
    pub fn array_suffix(&self) -> String {
        match self.array {
            ArrayCardinality::None => String::new(),
            ArrayCardinality::Fixed(n) => format!("[{}]", n),
            ArrayCardinality::Dynamic => "[]".to_string(),
        }
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseKind::Uint(bits) => write!(f, "uint{}", bits),
            BaseKind::Int(bits) => write!(f, "int{}", bits),
            BaseKind::Bool => write!(f, "bool"),
            BaseKind::Address => write!(f, "address"),
            BaseKind::FixedBytes(len) => write!(f, "bytes{}", len),
            BaseKind::Bytes => write!(f, "bytes"),
            BaseKind::String => write!(f, "string"),
            BaseKind::Tuple => write!(f, "tuple"),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.array_suffix())
    }
}

impl FromStr for TypeDescriptor {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        classify(s)
    }
}
