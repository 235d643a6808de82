//! Column mapping for primitive ABI types
//!
//! Integers become fixed-scale decimals wide enough for the largest magnitude
//! of their bit width. Byte strings and addresses are stored hex encoded, so a
//! fixed byte length `n` needs `2n + 2` characters including the `0x` prefix.

use serde::{Deserialize, Serialize};

use super::types::{BaseKind, TypeDescriptor, TypeError};

/// Decimal digits of `2^w - 1` for `w = 8, 16, ..., 256`
pub const UINT_PRECISION: [u8; 32] = [
    3, 5, 8, 10, 13, 15, 17, 20, 22, 25, 27, 29, 32, 34, 37, 39, 41, 44, 46, 49, 51, 53, 56, 58, 61, 63,
    66, 68, 70, 73, 75, 78,
];

/// Decimal digits of `2^(w-1)` for `w = 8, 16, ..., 256`
pub const INT_PRECISION: [u8; 32] = [
    3, 5, 7, 10, 12, 15, 17, 19, 22, 24, 27, 29, 32, 34, 36, 39, 41, 44, 46, 48, 51, 53, 56, 58, 60, 63,
    65, 68, 70, 72, 75, 77,
];

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StorageType {
    /// Decimal with zero scale
    Numeric { precision: u8 },
    Boolean,
    /// Text, optionally bounded
    Varchar { max_length: Option<u32> },
}

/// How one primitive field is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub storage: StorageType,
    pub nullable: bool,
    pub updatable: bool,
}

impl ColumnSpec {
    /// Event data is written once and always present
    fn immutable(storage: StorageType) -> Self {
        Self {
            storage,
            nullable: false,
            updatable: false,
        }
    }

    /// Column type in the emitted DDL
    pub fn sql_type(&self) -> String {
        match self.storage {
            StorageType::Numeric { precision } => format!("numeric({},0)", precision),
            StorageType::Boolean => "boolean".to_string(),
            StorageType::Varchar { max_length: Some(len) } => format!("character varying({})", len),
            StorageType::Varchar { max_length: None } => "character varying".to_string(),
        }
    }

    /// Field type in generated entity source
    pub fn rust_type(&self) -> &'static str {
        match self.storage {
            StorageType::Numeric { .. } => "BigDecimal",
            StorageType::Boolean => "bool",
            StorageType::Varchar { .. } => "String",
        }
    }
}

/// Precision needed for an integer of the given kind and bit width
pub fn integer_precision(signed: bool, bits: u16) -> u8 {
    let index = usize::from(bits / 8).saturating_sub(1).min(31);
    if signed {
        INT_PRECISION[index]
    } else {
        UINT_PRECISION[index]
    }
}

/// Map a primitive, non-array type to its column
///
/// Arrays and tuples become relations and are rejected here.
pub fn map_column(ty: &TypeDescriptor) -> Result<ColumnSpec, TypeError> {
    if ty.relation_cardinality().is_some() {
        return Err(TypeError::NotAColumn);
    }

    let storage = match ty.kind {
        BaseKind::Uint(bits) => StorageType::Numeric {
            precision: integer_precision(false, bits),
        },
        BaseKind::Int(bits) => StorageType::Numeric {
            precision: integer_precision(true, bits),
        },
        BaseKind::Bool => StorageType::Boolean,
        BaseKind::Address | BaseKind::FixedBytes(_) => StorageType::Varchar {
            max_length: ty.byte_length().map(|len| u32::from(len) * 2 + 2),
        },
        BaseKind::Bytes | BaseKind::String => StorageType::Varchar { max_length: None },
        BaseKind::Tuple => return Err(TypeError::NotAColumn),
    };

    Ok(ColumnSpec::immutable(storage))
}
