//! Fields, schemas, and tuples.
//!
//! A [`Field`] is a single typed cell, a [`TupleDesc`] is an ordered schema,
//! and a [`Tuple`] is a row of cells matching a schema. Every field kind has a
//! fixed serialized width, which is what makes the slotted heap page layout
//! possible.

use crate::RecordId;
use bytes::{Buf, BufMut};
use std::fmt;
use std::io;

/// The maximum number of bytes in a serialized string payload.
pub const STRING_SIZE: usize = 128;

/// The kind of a field, paired with its fixed on-disk width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Str,
}

impl FieldType {
    /// The number of bytes a field of this kind occupies on disk.
    pub fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str => 4 + STRING_SIZE,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::Str => write!(f, "STRING"),
        }
    }
}

/// A single typed value.
///
/// The derived ordering compares payloads within a kind; values of different
/// kinds order by kind, which keeps sorting total without being meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Str(_) => FieldType::Str,
        }
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Field::Int(v) => buf.put_i32(*v),
            Field::Str(s) => {
                // Oversized payloads are truncated; records are fixed-width.
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_SIZE);
                buf.put_u32(len as u32);
                buf.put_slice(&bytes[..len]);
                buf.put_bytes(0, STRING_SIZE - len);
            }
        }
    }

    fn read_from(buf: &mut &[u8], field_type: FieldType) -> io::Result<Field> {
        match field_type {
            FieldType::Int => {
                if buf.remaining() < 4 {
                    return Err(truncated("int field"));
                }
                Ok(Field::Int(buf.get_i32()))
            }
            FieldType::Str => {
                if buf.remaining() < 4 + STRING_SIZE {
                    return Err(truncated("string field"));
                }
                let len = buf.get_u32() as usize;
                if len > STRING_SIZE {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("string field length {len} exceeds {STRING_SIZE}"),
                    ));
                }
                let s = String::from_utf8_lossy(&buf[..len]).into_owned();
                buf.advance(STRING_SIZE);
                Ok(Field::Str(s))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{v}"),
            Field::Str(s) => write!(f, "{s}"),
        }
    }
}

fn truncated(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("record too short for {what}"),
    )
}

/// One entry of a schema: a field kind plus an optional name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdItem {
    pub field_type: FieldType,
    pub name: Option<String>,
}

/// An ordered, immutable schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    /// Builds a schema from parallel type and name lists.
    pub fn new(types: Vec<FieldType>, names: Vec<Option<String>>) -> Self {
        assert_eq!(types.len(), names.len(), "type/name lists must align");
        let items = types
            .into_iter()
            .zip(names)
            .map(|(field_type, name)| TdItem { field_type, name })
            .collect();
        Self { items }
    }

    /// Builds an anonymous schema from a type list.
    pub fn from_types(types: Vec<FieldType>) -> Self {
        let items = types
            .into_iter()
            .map(|field_type| TdItem { field_type, name: None })
            .collect();
        Self { items }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> Option<FieldType> {
        self.items.get(i).map(|item| item.field_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items.get(i).and_then(|item| item.name.as_deref())
    }

    /// The index of the first field with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
    }

    /// The serialized width of a tuple of this schema, in bytes.
    pub fn byte_size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.byte_len()).sum()
    }

    /// Concatenates two schemas, left fields first.
    pub fn merge(left: &TupleDesc, right: &TupleDesc) -> TupleDesc {
        let mut items = left.items.clone();
        items.extend(right.items.iter().cloned());
        TupleDesc { items }
    }

    /// True when both schemas have the same field kinds in the same order.
    /// Names are ignored, so an aliased scan stays compatible with its table.
    pub fn compatible_with(&self, other: &TupleDesc) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TdItem> {
        self.items.iter()
    }
}

/// A row: a schema, one field per schema entry, and the slot the row occupies
/// on disk once it has been stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    td: TupleDesc,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(td: TupleDesc, fields: Vec<Field>) -> Self {
        assert_eq!(td.num_fields(), fields.len(), "schema/field arity mismatch");
        for (i, field) in fields.iter().enumerate() {
            assert_eq!(
                Some(field.field_type()),
                td.field_type(i),
                "field {i} does not match its schema kind"
            );
        }
        Self {
            td,
            fields,
            record_id: None,
        }
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Appends the fixed-width serialized form of this tuple.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        for field in &self.fields {
            field.write_to(buf);
        }
    }

    /// Parses one tuple of the given schema, consuming exactly
    /// `td.byte_size()` bytes.
    pub fn read_from(buf: &mut &[u8], td: &TupleDesc) -> io::Result<Tuple> {
        let mut fields = Vec::with_capacity(td.num_fields());
        for item in &td.items {
            fields.push(Field::read_from(buf, item.field_type)?);
        }
        Ok(Tuple {
            td: td.clone(),
            fields,
            record_id: None,
        })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.fields.iter().map(|c| c.to_string()).collect();
        write!(f, "({})", cells.join(", "))
    }
}
