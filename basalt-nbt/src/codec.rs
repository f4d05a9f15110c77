//! Parse and serialize for the binary tag format.
//!
//! The wire form of a named tag is `id (u8) | name_len (u16) | name | payload`.
//! List elements and array elements are unnamed: only their payload is
//! emitted. A compound payload is a run of named tags closed by a single
//! `End` byte.

use crate::error::NbtError;
use crate::stream::{Reader, Writer};
use crate::tag::{Compound, Tag, TagId};

/// Maximum nesting depth to prevent stack overflow on malicious input.
const MAX_DEPTH: usize = 512;

/// Reads one named tag from the stream. This is the entry point for a
/// top-level parse; the root of a chunk is a named (usually empty-named)
/// compound, but any payload-bearing kind is accepted.
pub fn read_named(reader: &mut Reader<'_>) -> Result<(String, Tag), NbtError> {
    let id_offset = reader.position();
    let id = read_tag_id(reader)?;
    if id == TagId::End {
        return Err(NbtError::UnexpectedEnd { offset: id_offset });
    }
    let name = read_string(reader)?;
    let tag = read_payload(reader, id, 0)?;
    Ok((name, tag))
}

/// Writes one named tag: the id byte, the length-prefixed name, then the
/// payload.
pub fn write_named(writer: &mut Writer, name: &str, tag: &Tag) {
    writer.write_u8(tag.id() as u8);
    write_string(writer, name);
    write_payload(writer, tag);
}

fn read_tag_id(reader: &mut Reader<'_>) -> Result<TagId, NbtError> {
    let offset = reader.position();
    let id = reader.read_u8()?;
    TagId::from_u8(id).ok_or(NbtError::UnknownTagId { id, offset })
}

fn read_string(reader: &mut Reader<'_>) -> Result<String, NbtError> {
    let len = reader.read_u16()? as usize;
    let offset = reader.position();
    let bytes = reader.read(len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| NbtError::InvalidUtf8 { offset })
}

fn read_len(reader: &mut Reader<'_>) -> Result<usize, NbtError> {
    let offset = reader.position();
    let len = reader.read_i32()?;
    if len < 0 {
        return Err(NbtError::NegativeLength { len, offset });
    }
    Ok(len as usize)
}

fn read_payload(reader: &mut Reader<'_>, id: TagId, depth: usize) -> Result<Tag, NbtError> {
    if depth > MAX_DEPTH {
        return Err(NbtError::NestingTooDeep {
            limit: MAX_DEPTH,
            offset: reader.position(),
        });
    }

    match id {
        TagId::End => Err(NbtError::UnexpectedEnd {
            offset: reader.position(),
        }),
        TagId::Byte => Ok(Tag::Byte(reader.read_i8()?)),
        TagId::Short => Ok(Tag::Short(reader.read_i16()?)),
        TagId::Int => Ok(Tag::Int(reader.read_i32()?)),
        TagId::Long => Ok(Tag::Long(reader.read_i64()?)),
        TagId::Float => Ok(Tag::Float(reader.read_f32()?)),
        TagId::Double => Ok(Tag::Double(reader.read_f64()?)),
        TagId::ByteArray => {
            let len = read_len(reader)?;
            let bytes = reader.read(len)?;
            Ok(Tag::ByteArray(bytes.iter().map(|&b| b as i8).collect()))
        }
        TagId::String => Ok(Tag::String(read_string(reader)?)),
        TagId::List => {
            let element_offset = reader.position();
            let element = read_tag_id(reader)?;
            let len = read_len(reader)?;
            if element == TagId::End && len > 0 {
                return Err(NbtError::ListOfEnd {
                    offset: element_offset,
                });
            }
            let mut items = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                items.push(read_payload(reader, element, depth + 1)?);
            }
            Ok(Tag::List { element, items })
        }
        TagId::Compound => {
            let mut compound = Compound::new();
            loop {
                let id = read_tag_id(reader)?;
                if id == TagId::End {
                    break;
                }
                let name = read_string(reader)?;
                let child = read_payload(reader, id, depth + 1)?;
                compound.insert(name, child);
            }
            Ok(Tag::Compound(compound))
        }
        TagId::IntArray => {
            let len = read_len(reader)?;
            let mut values = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                values.push(reader.read_i32()?);
            }
            Ok(Tag::IntArray(values))
        }
        TagId::LongArray => {
            let len = read_len(reader)?;
            let mut values = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                values.push(reader.read_i64()?);
            }
            Ok(Tag::LongArray(values))
        }
    }
}

// Declared lengths are untrusted; cap the pre-allocation so a corrupt
// prefix cannot request gigabytes before the reads start failing.
const MAX_PREALLOC: usize = 1 << 16;

fn write_string(writer: &mut Writer, s: &str) {
    debug_assert!(s.len() <= u16::MAX as usize);
    writer.write_u16(s.len() as u16);
    writer.write(s.as_bytes());
}

fn write_payload(writer: &mut Writer, tag: &Tag) {
    match tag {
        Tag::Byte(v) => writer.write_i8(*v),
        Tag::Short(v) => writer.write_i16(*v),
        Tag::Int(v) => writer.write_i32(*v),
        Tag::Long(v) => writer.write_i64(*v),
        Tag::Float(v) => writer.write_f32(*v),
        Tag::Double(v) => writer.write_f64(*v),
        Tag::ByteArray(values) => {
            writer.write_i32(values.len() as i32);
            for &b in values {
                writer.write_i8(b);
            }
        }
        Tag::String(s) => write_string(writer, s),
        Tag::List { element, items } => {
            debug_assert!(items.iter().all(|item| item.id() == *element));
            writer.write_u8(*element as u8);
            writer.write_i32(items.len() as i32);
            for item in items {
                write_payload(writer, item);
            }
        }
        Tag::Compound(compound) => {
            for (name, child) in compound.iter() {
                write_named(writer, name, child);
            }
            writer.write_u8(TagId::End as u8);
        }
        Tag::IntArray(values) => {
            writer.write_i32(values.len() as i32);
            for &v in values {
                writer.write_i32(v);
            }
        }
        Tag::LongArray(values) => {
            writer.write_i32(values.len() as i32);
            for &v in values {
                writer.write_i64(v);
            }
        }
    }
}
