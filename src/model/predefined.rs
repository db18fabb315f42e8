//! Builtin types resolved by name, without touching the graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A builtin primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredefinedType {
    Bool,
    Byte,
    SByte,
    Char,
    Decimal,
    Double,
    Float,
    Int,
    UInt,
    Long,
    ULong,
    Short,
    UShort,
    NInt,
    NUInt,
    Object,
    String,
    Void,
}

impl PredefinedType {
    pub const ALL: [PredefinedType; 18] = [
        PredefinedType::Bool,
        PredefinedType::Byte,
        PredefinedType::SByte,
        PredefinedType::Char,
        PredefinedType::Decimal,
        PredefinedType::Double,
        PredefinedType::Float,
        PredefinedType::Int,
        PredefinedType::UInt,
        PredefinedType::Long,
        PredefinedType::ULong,
        PredefinedType::Short,
        PredefinedType::UShort,
        PredefinedType::NInt,
        PredefinedType::NUInt,
        PredefinedType::Object,
        PredefinedType::String,
        PredefinedType::Void,
    ];

    /// The C# keyword, which is also the canonical declaration name.
    pub fn keyword(self) -> &'static str {
        match self {
            PredefinedType::Bool => "bool",
            PredefinedType::Byte => "byte",
            PredefinedType::SByte => "sbyte",
            PredefinedType::Char => "char",
            PredefinedType::Decimal => "decimal",
            PredefinedType::Double => "double",
            PredefinedType::Float => "float",
            PredefinedType::Int => "int",
            PredefinedType::UInt => "uint",
            PredefinedType::Long => "long",
            PredefinedType::ULong => "ulong",
            PredefinedType::Short => "short",
            PredefinedType::UShort => "ushort",
            PredefinedType::NInt => "nint",
            PredefinedType::NUInt => "nuint",
            PredefinedType::Object => "object",
            PredefinedType::String => "string",
            PredefinedType::Void => "void",
        }
    }

    /// The runtime name, e.g. `System.Int32`.
    pub fn clr_name(self) -> &'static str {
        match self {
            PredefinedType::Bool => "System.Boolean",
            PredefinedType::Byte => "System.Byte",
            PredefinedType::SByte => "System.SByte",
            PredefinedType::Char => "System.Char",
            PredefinedType::Decimal => "System.Decimal",
            PredefinedType::Double => "System.Double",
            PredefinedType::Float => "System.Single",
            PredefinedType::Int => "System.Int32",
            PredefinedType::UInt => "System.UInt32",
            PredefinedType::Long => "System.Int64",
            PredefinedType::ULong => "System.UInt64",
            PredefinedType::Short => "System.Int16",
            PredefinedType::UShort => "System.UInt16",
            PredefinedType::NInt => "System.IntPtr",
            PredefinedType::NUInt => "System.UIntPtr",
            PredefinedType::Object => "System.Object",
            PredefinedType::String => "System.String",
            PredefinedType::Void => "System.Void",
        }
    }

    /// The signature element type code, if the runtime has one.
    /// `decimal` is encoded as a value type reference to `System.Decimal`.
    pub fn element_type(self) -> Option<u8> {
        let code = match self {
            PredefinedType::Void => 0x01,
            PredefinedType::Bool => 0x02,
            PredefinedType::Char => 0x03,
            PredefinedType::SByte => 0x04,
            PredefinedType::Byte => 0x05,
            PredefinedType::Short => 0x06,
            PredefinedType::UShort => 0x07,
            PredefinedType::Int => 0x08,
            PredefinedType::UInt => 0x09,
            PredefinedType::Long => 0x0a,
            PredefinedType::ULong => 0x0b,
            PredefinedType::Float => 0x0c,
            PredefinedType::Double => 0x0d,
            PredefinedType::String => 0x0e,
            PredefinedType::NInt => 0x18,
            PredefinedType::NUInt => 0x19,
            PredefinedType::Object => 0x1c,
            PredefinedType::Decimal => return None,
        };
        Some(code)
    }

    pub fn from_element_type(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.element_type() == Some(code))
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.keyword() == keyword)
    }

    /// Match a fully qualified runtime name (`System.Int32`).
    pub fn from_clr_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.clr_name() == name)
    }
}

impl fmt::Display for PredefinedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
