// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::fmt;

/// Closed set of type kinds a descriptor can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Void,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    /// C `int`.
    Int,
    /// C `unsigned int`.
    Uint,
    /// C `long`.
    Long,
    /// C `unsigned long`.
    Ulong,
    Float,
    Double,
    LongDouble,
    Pointer,
    Array,
    Struct,
    Slice,
    /// Reserved. No descriptor of this kind can be built.
    String,
}

impl Kind {
    /// Signed integer kinds, read through `as_i64`.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::Int | Self::Long
        )
    }

    /// Unsigned integer kinds, read through `as_u64`.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64 | Self::Uint | Self::Ulong
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double | Self::LongDouble)
    }

    /// Kinds without structural children.
    pub fn is_scalar(self) -> bool {
        self.is_signed() || self.is_unsigned() || self.is_float()
    }

    pub fn is_composite(self) -> bool {
        matches!(self, Self::Array | Self::Struct | Self::Slice)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Void => "Void",
            Self::Int8 => "Int8",
            Self::Uint8 => "Uint8",
            Self::Int16 => "Int16",
            Self::Uint16 => "Uint16",
            Self::Int32 => "Int32",
            Self::Uint32 => "Uint32",
            Self::Int64 => "Int64",
            Self::Uint64 => "Uint64",
            Self::Int => "Int",
            Self::Uint => "Uint",
            Self::Long => "Long",
            Self::Ulong => "Ulong",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::LongDouble => "LongDouble",
            Self::Pointer => "Ptr",
            Self::Array => "Array",
            Self::Struct => "Struct",
            Self::Slice => "Slice",
            Self::String => "String",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
