//! Signature blob codec (ECMA-335 §II.23.2).

use super::tables::{TypeDefOrRef, TypeDefinitionHandle, TypeReferenceHandle, TypeSpecificationHandle};
use crate::error::{ModelError, Result};
use crate::model::PredefinedType;

/// Element type codes used by this codec. Primitive codes live on [`PredefinedType`].
pub mod element_type {
    pub const PTR: u8 = 0x0f;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const FNPTR: u8 = 0x1b;
    pub const SZARRAY: u8 = 0x1d;
    pub const MVAR: u8 = 0x1e;
    pub const CMOD_REQD: u8 = 0x1f;
    pub const CMOD_OPT: u8 = 0x20;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

/// Leading byte of method and property signatures.
pub mod calling_convention {
    pub const DEFAULT: u8 = 0x00;
    pub const PROPERTY: u8 = 0x08;
    pub const GENERIC: u8 = 0x10;
    pub const HAS_THIS: u8 = 0x20;
    pub const KIND_MASK: u8 = 0x0f;
}

use element_type as et;

// ─── Primitive Encodings ────────────────────────────────────────

pub(crate) fn read_u8(cursor: &mut &[u8]) -> Result<u8> {
    let (&first, rest) = cursor
        .split_first()
        .ok_or_else(|| ModelError::malformed("signature ended unexpectedly"))?;
    *cursor = rest;
    Ok(first)
}

/// Read an ECMA compressed unsigned integer (1, 2 or 4 bytes).
pub fn read_compressed_u32(cursor: &mut &[u8]) -> Result<u32> {
    let first = read_u8(cursor)? as u32;
    if first & 0x80 == 0 {
        Ok(first)
    } else if first & 0xc0 == 0x80 {
        let second = read_u8(cursor)? as u32;
        Ok(((first & 0x3f) << 8) | second)
    } else if first & 0xe0 == 0xc0 {
        let mut value = first & 0x1f;
        for _ in 0..3 {
            value = (value << 8) | read_u8(cursor)? as u32;
        }
        Ok(value)
    } else {
        Err(ModelError::malformed(format!(
            "invalid compressed integer lead byte {first:#04x}"
        )))
    }
}

pub fn write_compressed_u32(out: &mut Vec<u8>, value: u32) -> Result<()> {
    match value {
        0..=0x7f => out.push(value as u8),
        0x80..=0x3fff => out.extend_from_slice(&[0x80 | (value >> 8) as u8, value as u8]),
        0x4000..=0x1fff_ffff => out.extend_from_slice(&[
            0xc0 | (value >> 24) as u8,
            (value >> 16) as u8,
            (value >> 8) as u8,
            value as u8,
        ]),
        _ => {
            return Err(ModelError::malformed(format!(
                "{value} is too large for a compressed integer"
            )))
        }
    }
    Ok(())
}

/// Decode a `TypeDefOrRefOrSpecEncoded` value.
pub fn decode_type_token(coded: u32) -> Result<TypeDefOrRef> {
    let row = coded >> 2;
    match coded & 0x3 {
        0 => Ok(TypeDefOrRef::TypeDef(TypeDefinitionHandle::from_row(row))),
        1 => Ok(TypeDefOrRef::TypeRef(TypeReferenceHandle::from_row(row))),
        2 => Ok(TypeDefOrRef::TypeSpec(TypeSpecificationHandle::from_row(row))),
        _ => Err(ModelError::malformed(format!("invalid type token tag in {coded:#x}"))),
    }
}

pub fn encode_type_token(token: TypeDefOrRef) -> u32 {
    match token {
        TypeDefOrRef::TypeDef(h) => h.row() << 2,
        TypeDefOrRef::TypeRef(h) => (h.row() << 2) | 1,
        TypeDefOrRef::TypeSpec(h) => (h.row() << 2) | 2,
    }
}

fn read_type_token(cursor: &mut &[u8]) -> Result<TypeDefOrRef> {
    decode_type_token(read_compressed_u32(cursor)?)
}

// ─── Types ──────────────────────────────────────────────────────

/// A type as encoded in a signature blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureType {
    Primitive(PredefinedType),
    Class(TypeDefOrRef),
    ValueType(TypeDefOrRef),
    GenericInstance {
        generic: TypeDefOrRef,
        is_value_type: bool,
        arguments: Vec<SignatureType>,
    },
    /// `!n`, a generic parameter of the enclosing type.
    TypeParameter(u32),
    /// `!!n`, a generic parameter of the enclosing method.
    MethodParameter(u32),
    SzArray(Box<SignatureType>),
    Array { element: Box<SignatureType>, rank: u32 },
    ByRef(Box<SignatureType>),
    Pointer(Box<SignatureType>),
}

impl SignatureType {
    /// Decode one type, advancing `cursor`. Custom modifiers are skipped.
    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let code = read_u8(cursor)?;
        if let Some(primitive) = PredefinedType::from_element_type(code) {
            return Ok(SignatureType::Primitive(primitive));
        }
        match code {
            et::CMOD_REQD | et::CMOD_OPT => {
                read_compressed_u32(cursor)?;
                Self::decode(cursor)
            }
            et::PINNED => Self::decode(cursor),
            et::PTR => Ok(SignatureType::Pointer(Box::new(Self::decode(cursor)?))),
            et::BYREF => Ok(SignatureType::ByRef(Box::new(Self::decode(cursor)?))),
            et::CLASS => Ok(SignatureType::Class(read_type_token(cursor)?)),
            et::VALUETYPE => Ok(SignatureType::ValueType(read_type_token(cursor)?)),
            et::VAR => Ok(SignatureType::TypeParameter(read_compressed_u32(cursor)?)),
            et::MVAR => Ok(SignatureType::MethodParameter(read_compressed_u32(cursor)?)),
            et::SZARRAY => Ok(SignatureType::SzArray(Box::new(Self::decode(cursor)?))),
            et::ARRAY => {
                let element = Self::decode(cursor)?;
                let rank = read_compressed_u32(cursor)?;
                let sizes = read_compressed_u32(cursor)?;
                for _ in 0..sizes {
                    read_compressed_u32(cursor)?;
                }
                let bounds = read_compressed_u32(cursor)?;
                for _ in 0..bounds {
                    read_compressed_u32(cursor)?;
                }
                Ok(SignatureType::Array {
                    element: Box::new(element),
                    rank,
                })
            }
            et::GENERICINST => {
                let is_value_type = match read_u8(cursor)? {
                    et::CLASS => false,
                    et::VALUETYPE => true,
                    other => {
                        return Err(ModelError::malformed(format!(
                            "generic instance over element type {other:#04x}"
                        )))
                    }
                };
                let generic = read_type_token(cursor)?;
                let count = read_compressed_u32(cursor)?;
                let arguments = (0..count)
                    .map(|_| Self::decode(cursor))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SignatureType::GenericInstance {
                    generic,
                    is_value_type,
                    arguments,
                })
            }
            et::TYPEDBYREF | et::FNPTR => Err(ModelError::malformed(format!(
                "unsupported element type {code:#04x}"
            ))),
            other => Err(ModelError::malformed(format!("unknown element type {other:#04x}"))),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            SignatureType::Primitive(primitive) => {
                let code = primitive.element_type().ok_or_else(|| {
                    ModelError::malformed(format!(
                        "`{primitive}` has no element type; reference {} instead",
                        primitive.clr_name()
                    ))
                })?;
                out.push(code);
            }
            SignatureType::Class(token) => {
                out.push(et::CLASS);
                write_compressed_u32(out, encode_type_token(*token))?;
            }
            SignatureType::ValueType(token) => {
                out.push(et::VALUETYPE);
                write_compressed_u32(out, encode_type_token(*token))?;
            }
            SignatureType::GenericInstance {
                generic,
                is_value_type,
                arguments,
            } => {
                out.push(et::GENERICINST);
                out.push(if *is_value_type { et::VALUETYPE } else { et::CLASS });
                write_compressed_u32(out, encode_type_token(*generic))?;
                write_compressed_u32(out, arguments.len() as u32)?;
                for argument in arguments {
                    argument.encode(out)?;
                }
            }
            SignatureType::TypeParameter(n) => {
                out.push(et::VAR);
                write_compressed_u32(out, *n)?;
            }
            SignatureType::MethodParameter(n) => {
                out.push(et::MVAR);
                write_compressed_u32(out, *n)?;
            }
            SignatureType::SzArray(element) => {
                out.push(et::SZARRAY);
                element.encode(out)?;
            }
            SignatureType::Array { element, rank } => {
                out.push(et::ARRAY);
                element.encode(out)?;
                write_compressed_u32(out, *rank)?;
                out.extend_from_slice(&[0, 0]);
            }
            SignatureType::ByRef(element) => {
                out.push(et::BYREF);
                element.encode(out)?;
            }
            SignatureType::Pointer(element) => {
                out.push(et::PTR);
                element.encode(out)?;
            }
        }
        Ok(())
    }

    /// Decode a TypeSpec blob.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        let mut cursor = blob;
        Self::decode(&mut cursor)
    }

    pub fn to_blob(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }
}

// ─── Method and Property Signatures ─────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub has_this: bool,
    pub generic_parameter_count: u32,
    pub return_type: SignatureType,
    pub parameters: Vec<SignatureType>,
}

impl MethodSignature {
    /// An instance, non-generic method signature.
    pub fn instance(return_type: SignatureType, parameters: Vec<SignatureType>) -> Self {
        Self {
            has_this: true,
            generic_parameter_count: 0,
            return_type,
            parameters,
        }
    }

    #[must_use]
    pub fn with_generic_parameters(mut self, count: u32) -> Self {
        self.generic_parameter_count = count;
        self
    }

    pub fn decode(blob: &[u8]) -> Result<Self> {
        let mut cursor = blob;
        let convention = read_u8(&mut cursor)?;
        if convention & calling_convention::KIND_MASK == calling_convention::PROPERTY {
            return Err(ModelError::malformed("expected a method signature, found a property signature"));
        }
        let generic_parameter_count = if convention & calling_convention::GENERIC != 0 {
            read_compressed_u32(&mut cursor)?
        } else {
            0
        };
        let count = read_compressed_u32(&mut cursor)?;
        let return_type = SignatureType::decode(&mut cursor)?;
        let parameters = decode_parameters(&mut cursor, count)?;
        Ok(Self {
            has_this: convention & calling_convention::HAS_THIS != 0,
            generic_parameter_count,
            return_type,
            parameters,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut convention = calling_convention::DEFAULT;
        if self.has_this {
            convention |= calling_convention::HAS_THIS;
        }
        if self.generic_parameter_count > 0 {
            convention |= calling_convention::GENERIC;
        }
        let mut out = vec![convention];
        if self.generic_parameter_count > 0 {
            write_compressed_u32(&mut out, self.generic_parameter_count)?;
        }
        write_compressed_u32(&mut out, self.parameters.len() as u32)?;
        self.return_type.encode(&mut out)?;
        for parameter in &self.parameters {
            parameter.encode(&mut out)?;
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySignature {
    pub has_this: bool,
    pub property_type: SignatureType,
    /// Indexer parameters.
    pub parameters: Vec<SignatureType>,
}

impl PropertySignature {
    pub fn instance(property_type: SignatureType) -> Self {
        Self {
            has_this: true,
            property_type,
            parameters: Vec::new(),
        }
    }

    pub fn decode(blob: &[u8]) -> Result<Self> {
        let mut cursor = blob;
        let convention = read_u8(&mut cursor)?;
        if convention & calling_convention::KIND_MASK != calling_convention::PROPERTY {
            return Err(ModelError::malformed(format!(
                "property signature starts with {convention:#04x}"
            )));
        }
        let count = read_compressed_u32(&mut cursor)?;
        let property_type = SignatureType::decode(&mut cursor)?;
        let parameters = decode_parameters(&mut cursor, count)?;
        Ok(Self {
            has_this: convention & calling_convention::HAS_THIS != 0,
            property_type,
            parameters,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut convention = calling_convention::PROPERTY;
        if self.has_this {
            convention |= calling_convention::HAS_THIS;
        }
        let mut out = vec![convention];
        write_compressed_u32(&mut out, self.parameters.len() as u32)?;
        self.property_type.encode(&mut out)?;
        for parameter in &self.parameters {
            parameter.encode(&mut out)?;
        }
        Ok(out)
    }
}

fn decode_parameters(cursor: &mut &[u8], count: u32) -> Result<Vec<SignatureType>> {
    let mut parameters = Vec::with_capacity(count as usize);
    while parameters.len() < count as usize {
        if cursor.first() == Some(&et::SENTINEL) {
            read_u8(cursor)?;
            continue;
        }
        parameters.push(SignatureType::decode(cursor)?);
    }
    Ok(parameters)
}
