//! Custom attribute value blobs (ECMA-335 §II.23.3).
//!
//! Fixed arguments are typed by the constructor signature; named arguments
//! carry their own type tag. Primitive, string and `System.Type` values are
//! decoded. Any other argument type stops decoding and marks the value
//! incomplete, since its width cannot be known without loading the enum.

use super::signature::{read_compressed_u32, read_u8, write_compressed_u32, MethodSignature, SignatureType};
use super::tables::{split_generic_arity, MetadataReader};
use crate::error::{ModelError, Result};
use crate::model::PredefinedType;

const PROLOG: u16 = 0x0001;
const NAMED_FIELD: u8 = 0x53;
const NAMED_PROPERTY: u8 = 0x54;
const TAG_TYPE: u8 = 0x50;
const TAG_BOXED: u8 = 0x51;
const NULL_STRING: u8 = 0xff;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeArgument {
    Bool(bool),
    Char(char),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(Option<String>),
    /// A `System.Type` argument, as its serialized runtime name.
    Type(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    pub is_property: bool,
    pub name: String,
    pub value: AttributeArgument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    pub fixed: Vec<AttributeArgument>,
    pub named: Vec<NamedArgument>,
    /// False when decoding stopped at an unsupported argument type.
    pub complete: bool,
}

impl Default for AttributeValue {
    fn default() -> Self {
        Self {
            fixed: Vec::new(),
            named: Vec::new(),
            complete: true,
        }
    }
}

fn take<'a>(cursor: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if cursor.len() < len {
        return Err(ModelError::malformed("attribute value ended unexpectedly"));
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

fn take_array<const N: usize>(cursor: &mut &[u8]) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(take(cursor, N)?);
    Ok(out)
}

fn read_ser_string(cursor: &mut &[u8]) -> Result<Option<String>> {
    if cursor.first() == Some(&NULL_STRING) {
        read_u8(cursor)?;
        return Ok(None);
    }
    let len = read_compressed_u32(cursor)? as usize;
    let bytes = take(cursor, len)?;
    String::from_utf8(bytes.to_vec())
        .map(Some)
        .map_err(|_| ModelError::malformed("attribute string is not UTF-8"))
}

fn write_ser_string(out: &mut Vec<u8>, value: Option<&str>) -> Result<()> {
    match value {
        None => out.push(NULL_STRING),
        Some(value) => {
            write_compressed_u32(out, value.len() as u32)?;
            out.extend_from_slice(value.as_bytes());
        }
    }
    Ok(())
}

/// Read a value whose type is given by an element type tag.
fn read_tagged(tag: u8, cursor: &mut &[u8]) -> Result<Option<AttributeArgument>> {
    if tag == TAG_TYPE {
        return Ok(Some(AttributeArgument::Type(read_ser_string(cursor)?)));
    }
    if tag == TAG_BOXED {
        let inner = read_u8(cursor)?;
        return read_tagged(inner, cursor);
    }
    let Some(primitive) = PredefinedType::from_element_type(tag) else {
        return Ok(None);
    };
    let value = match primitive {
        PredefinedType::Bool => AttributeArgument::Bool(read_u8(cursor)? != 0),
        PredefinedType::Char => {
            let code = u16::from_le_bytes(take_array(cursor)?);
            AttributeArgument::Char(char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
        }
        PredefinedType::SByte => AttributeArgument::I8(i8::from_le_bytes(take_array(cursor)?)),
        PredefinedType::Byte => AttributeArgument::U8(read_u8(cursor)?),
        PredefinedType::Short => AttributeArgument::I16(i16::from_le_bytes(take_array(cursor)?)),
        PredefinedType::UShort => AttributeArgument::U16(u16::from_le_bytes(take_array(cursor)?)),
        PredefinedType::Int => AttributeArgument::I32(i32::from_le_bytes(take_array(cursor)?)),
        PredefinedType::UInt => AttributeArgument::U32(u32::from_le_bytes(take_array(cursor)?)),
        PredefinedType::Long => AttributeArgument::I64(i64::from_le_bytes(take_array(cursor)?)),
        PredefinedType::ULong => AttributeArgument::U64(u64::from_le_bytes(take_array(cursor)?)),
        PredefinedType::Float => AttributeArgument::F32(f32::from_le_bytes(take_array(cursor)?)),
        PredefinedType::Double => AttributeArgument::F64(f64::from_le_bytes(take_array(cursor)?)),
        PredefinedType::String => AttributeArgument::String(read_ser_string(cursor)?),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Read a fixed argument typed by a constructor parameter.
fn read_fixed(
    parameter: &SignatureType,
    cursor: &mut &[u8],
    reader: &MetadataReader,
) -> Result<Option<AttributeArgument>> {
    match parameter {
        SignatureType::Primitive(PredefinedType::Object) => {
            let tag = read_u8(cursor)?;
            read_tagged(tag, cursor)
        }
        SignatureType::Primitive(primitive) => match primitive.element_type() {
            Some(tag) => read_tagged(tag, cursor),
            None => Ok(None),
        },
        SignatureType::Class(token) if reader.type_name(*token)? == Some(("System", "Type")) => {
            Ok(Some(AttributeArgument::Type(read_ser_string(cursor)?)))
        }
        _ => Ok(None),
    }
}

impl AttributeArgument {
    fn tag(&self) -> u8 {
        let primitive = match self {
            AttributeArgument::Type(_) => return TAG_TYPE,
            AttributeArgument::Bool(_) => PredefinedType::Bool,
            AttributeArgument::Char(_) => PredefinedType::Char,
            AttributeArgument::I8(_) => PredefinedType::SByte,
            AttributeArgument::U8(_) => PredefinedType::Byte,
            AttributeArgument::I16(_) => PredefinedType::Short,
            AttributeArgument::U16(_) => PredefinedType::UShort,
            AttributeArgument::I32(_) => PredefinedType::Int,
            AttributeArgument::U32(_) => PredefinedType::UInt,
            AttributeArgument::I64(_) => PredefinedType::Long,
            AttributeArgument::U64(_) => PredefinedType::ULong,
            AttributeArgument::F32(_) => PredefinedType::Float,
            AttributeArgument::F64(_) => PredefinedType::Double,
            AttributeArgument::String(_) => PredefinedType::String,
        };
        primitive.element_type().unwrap_or_default()
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            AttributeArgument::Bool(v) => out.push(u8::from(*v)),
            AttributeArgument::Char(v) => out.extend_from_slice(&(*v as u32 as u16).to_le_bytes()),
            AttributeArgument::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeArgument::U8(v) => out.push(*v),
            AttributeArgument::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeArgument::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeArgument::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeArgument::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeArgument::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeArgument::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeArgument::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeArgument::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
            AttributeArgument::String(v) | AttributeArgument::Type(v) => {
                write_ser_string(out, v.as_deref())?
            }
        }
        Ok(())
    }

    /// C# literal for this argument.
    pub fn render(&self) -> String {
        match self {
            AttributeArgument::Bool(v) => v.to_string(),
            AttributeArgument::Char(v) => format!("'{}'", v.escape_default()),
            AttributeArgument::I8(v) => v.to_string(),
            AttributeArgument::U8(v) => v.to_string(),
            AttributeArgument::I16(v) => v.to_string(),
            AttributeArgument::U16(v) => v.to_string(),
            AttributeArgument::I32(v) => v.to_string(),
            AttributeArgument::U32(v) => format!("{v}u"),
            AttributeArgument::I64(v) => format!("{v}L"),
            AttributeArgument::U64(v) => format!("{v}UL"),
            AttributeArgument::F32(v) => format!("{v}f"),
            AttributeArgument::F64(v) => format!("{v}d"),
            AttributeArgument::String(Some(v)) => format!("\"{}\"", v.escape_default()),
            AttributeArgument::Type(Some(v)) => format!("typeof({})", csharp_type_name(v)),
            AttributeArgument::String(None) | AttributeArgument::Type(None) => "null".to_string(),
        }
    }
}

impl AttributeValue {
    /// Decode a value blob against the constructor's signature.
    pub fn decode(blob: &[u8], constructor: &MethodSignature, reader: &MetadataReader) -> Result<Self> {
        let mut value = AttributeValue::default();
        if blob.is_empty() {
            return Ok(value);
        }
        let mut cursor = blob;
        let prolog = u16::from_le_bytes(take_array(&mut cursor)?);
        if prolog != PROLOG {
            return Err(ModelError::malformed(format!("attribute value prolog is {prolog:#06x}")));
        }
        for parameter in &constructor.parameters {
            match read_fixed(parameter, &mut cursor, reader)? {
                Some(argument) => value.fixed.push(argument),
                None => {
                    value.complete = false;
                    return Ok(value);
                }
            }
        }
        if cursor.len() < 2 {
            return Ok(value);
        }
        let count = u16::from_le_bytes(take_array(&mut cursor)?);
        for _ in 0..count {
            let kind = read_u8(&mut cursor)?;
            let is_property = match kind {
                NAMED_FIELD => false,
                NAMED_PROPERTY => true,
                other => {
                    return Err(ModelError::malformed(format!("named argument kind {other:#04x}")))
                }
            };
            let tag = read_u8(&mut cursor)?;
            if tag != TAG_TYPE && tag != TAG_BOXED && PredefinedType::from_element_type(tag).is_none() {
                value.complete = false;
                return Ok(value);
            }
            let name = read_ser_string(&mut cursor)?.unwrap_or_default();
            match read_tagged(tag, &mut cursor)? {
                Some(argument) => value.named.push(NamedArgument {
                    is_property,
                    name,
                    value: argument,
                }),
                None => {
                    value.complete = false;
                    return Ok(value);
                }
            }
        }
        Ok(value)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = PROLOG.to_le_bytes().to_vec();
        for argument in &self.fixed {
            argument.encode(&mut out)?;
        }
        out.extend_from_slice(&(self.named.len() as u16).to_le_bytes());
        for named in &self.named {
            out.push(if named.is_property { NAMED_PROPERTY } else { NAMED_FIELD });
            out.push(named.value.tag());
            write_ser_string(&mut out, Some(&named.name))?;
            named.value.encode(&mut out)?;
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty() && self.named.is_empty()
    }

    /// The argument list as written in C#, including parentheses; empty when there are no arguments.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut parts: Vec<String> = self.fixed.iter().map(AttributeArgument::render).collect();
        for named in &self.named {
            parts.push(format!("{} = {}", named.name, named.value.render()));
        }
        format!("({})", parts.join(", "))
    }
}

/// Turn a serialized runtime type name into C# syntax:
/// ``Ns.Box`1[[Ns.Item, Lib]], Lib`` becomes `Ns.Box<Ns.Item>`.
pub fn csharp_type_name(serialized: &str) -> String {
    let mut cursor = serialized;
    parse_type_name(&mut cursor)
}

fn parse_type_name(cursor: &mut &str) -> String {
    let end = cursor.find(['[', ']', ',']).unwrap_or(cursor.len());
    let (raw, rest) = cursor.split_at(end);
    *cursor = rest;
    let (base, _) = split_generic_arity(raw.trim());
    let mut out = base.replace('+', ".");

    if cursor.starts_with("[[") {
        *cursor = &cursor[1..];
        let mut arguments = Vec::new();
        while let Some(rest) = cursor.strip_prefix('[') {
            *cursor = rest;
            arguments.push(parse_type_name(cursor));
            skip_past_closing(cursor);
            if let Some(rest) = cursor.strip_prefix(',') {
                *cursor = rest;
            }
        }
        if let Some(rest) = cursor.strip_prefix(']') {
            *cursor = rest;
        }
        out = format!("{out}<{}>", arguments.join(", "));
    }

    while cursor.starts_with("[]") || cursor.starts_with("[,") {
        let close = cursor.find(']').unwrap_or(cursor.len() - 1);
        out.push_str(&cursor[..=close]);
        *cursor = &cursor[close + 1..];
    }
    out
}

fn skip_past_closing(cursor: &mut &str) {
    let mut depth = 0usize;
    for (i, c) in cursor.char_indices() {
        match c {
            '[' => depth += 1,
            ']' if depth == 0 => {
                *cursor = &cursor[i + 1..];
                return;
            }
            ']' => depth -= 1,
            _ => {}
        }
    }
    *cursor = "";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_ctor() -> MethodSignature {
        MethodSignature::instance(
            SignatureType::Primitive(PredefinedType::Void),
            vec![SignatureType::Primitive(PredefinedType::String)],
        )
    }

    #[test]
    fn test_decode_fixed_and_named() {
        let value = AttributeValue {
            fixed: vec![AttributeArgument::String(Some("Widget".to_string()))],
            named: vec![NamedArgument {
                is_property: true,
                name: "RepeatPattern".to_string(),
                value: AttributeArgument::I32(3),
            }],
            complete: true,
        };
        let blob = value.encode().unwrap();
        assert_eq!(&blob[..2], &[0x01, 0x00], "prolog");

        let reader = MetadataReader::default();
        let decoded = AttributeValue::decode(&blob, &string_ctor(), &reader).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.render(), "(\"Widget\", RepeatPattern = 3)");
    }

    #[test]
    fn test_empty_blob_has_no_arguments() {
        let reader = MetadataReader::default();
        let decoded = AttributeValue::decode(&[], &string_ctor(), &reader).unwrap();
        assert!(decoded.is_empty());
        assert!(decoded.complete);
        assert_eq!(decoded.render(), "");
    }

    #[test]
    fn test_bad_prolog_is_malformed() {
        let reader = MetadataReader::default();
        let err = AttributeValue::decode(&[0x02, 0x00], &string_ctor(), &reader).unwrap_err();
        assert!(matches!(err, ModelError::MalformedInput(_)));
    }

    #[test]
    fn test_unsupported_argument_stops_decoding() {
        let reader = MetadataReader::default();
        let ctor = MethodSignature::instance(
            SignatureType::Primitive(PredefinedType::Void),
            vec![SignatureType::Primitive(PredefinedType::NInt)],
        );
        let decoded = AttributeValue::decode(&[0x01, 0x00, 0x00, 0x00], &ctor, &reader).unwrap();
        assert!(!decoded.complete);
        assert!(decoded.fixed.is_empty());
    }

    #[test]
    fn test_null_string_and_boxed_object() {
        let reader = MetadataReader::default();
        let ctor = MethodSignature::instance(
            SignatureType::Primitive(PredefinedType::Void),
            vec![
                SignatureType::Primitive(PredefinedType::String),
                SignatureType::Primitive(PredefinedType::Object),
            ],
        );
        // null string, then a boxed bool `true`
        let blob = [0x01, 0x00, 0xff, 0x02, 0x01, 0x00, 0x00];
        let decoded = AttributeValue::decode(&blob, &ctor, &reader).unwrap();
        assert_eq!(
            decoded.fixed,
            vec![AttributeArgument::String(None), AttributeArgument::Bool(true)]
        );
        assert_eq!(decoded.render(), "(null, true)");
    }

    #[test]
    fn test_csharp_type_name() {
        assert_eq!(csharp_type_name("Sample.Widget, Sample"), "Sample.Widget");
        assert_eq!(
            csharp_type_name("Sample.Box`2[[Sample.Item, Sample, Version=1.0.0.0],[System.Int32, System.Runtime]], Sample"),
            "Sample.Box<Sample.Item, System.Int32>"
        );
        assert_eq!(csharp_type_name("Sample.Item[]"), "Sample.Item[]");
        assert_eq!(csharp_type_name("Sample.Outer+Inner"), "Sample.Outer.Inner");
    }
}
