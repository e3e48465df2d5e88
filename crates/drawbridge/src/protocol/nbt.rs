//! Minimal network NBT writer.
//!
//! Only the tags the fallback world needs are modelled; nothing is ever read.

use bytes::BufMut;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    List(Vec<Tag>),
    Compound(Compound),
    LongArray(Vec<i64>),
}

impl Tag {
    fn id(&self) -> u8 {
        match self {
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::LongArray(_) => 12,
        }
    }

    fn write_payload(&self, buf: &mut impl BufMut) {
        match self {
            Tag::Byte(value) => buf.put_i8(*value),
            Tag::Short(value) => buf.put_i16(*value),
            Tag::Int(value) => buf.put_i32(*value),
            Tag::Long(value) => buf.put_i64(*value),
            Tag::Float(value) => buf.put_f32(*value),
            Tag::Double(value) => buf.put_f64(*value),
            Tag::String(value) => put_nbt_string(buf, value),
            Tag::List(items) => {
                buf.put_u8(items.first().map_or(0, Tag::id));
                buf.put_i32(items.len() as i32);
                for item in items {
                    item.write_payload(buf);
                }
            }
            Tag::Compound(compound) => compound.write_payload(buf),
            Tag::LongArray(values) => {
                buf.put_i32(values.len() as i32);
                for value in values {
                    buf.put_i64(*value);
                }
            }
        }
    }
}

impl From<bool> for Tag {
    fn from(value: bool) -> Self {
        Tag::Byte(value as i8)
    }
}

impl From<i32> for Tag {
    fn from(value: i32) -> Self {
        Tag::Int(value)
    }
}

impl From<f32> for Tag {
    fn from(value: f32) -> Self {
        Tag::Float(value)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag::String(value.to_owned())
    }
}

impl From<Compound> for Tag {
    fn from(value: Compound) -> Self {
        Tag::Compound(value)
    }
}

/// Ordered compound tag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, tag: impl Into<Tag>) -> Self {
        self.entries.push((name.to_owned(), tag.into()));
        self
    }

    pub fn push(&mut self, name: &str, tag: impl Into<Tag>) {
        self.entries.push((name.to_owned(), tag.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn write_payload(&self, buf: &mut impl BufMut) {
        for (name, tag) in &self.entries {
            buf.put_u8(tag.id());
            put_nbt_string(buf, name);
            tag.write_payload(buf);
        }
        buf.put_u8(0);
    }

    /// Root compound with an empty name, as every pre-1.20.2 packet expects
    pub fn write_root(&self, buf: &mut impl BufMut) {
        buf.put_u8(10);
        put_nbt_string(buf, "");
        self.write_payload(buf);
    }
}

/// Modified UTF-8 with a u16 length; every string written here is ASCII
fn put_nbt_string(buf: &mut impl BufMut, value: &str) {
    buf.put_u16(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_map_item_tag() {
        let mut buf = BytesMut::new();
        Compound::new().with("map", 0).write_root(&mut buf);
        assert_eq!(
            &buf[..],
            &[10, 0, 0, 3, 0, 3, b'm', b'a', b'p', 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_empty_list_uses_end_type() {
        let mut buf = BytesMut::new();
        Compound::new().with("value", Tag::List(vec![])).write_root(&mut buf);
        // root header, list header "value", element type End, length 0, root End
        assert_eq!(&buf[..3], &[10, 0, 0]);
        assert_eq!(&buf[3..11], &[9, 0, 5, b'v', b'a', b'l', b'u', b'e']);
        assert_eq!(&buf[11..], &[0, 0, 0, 0, 0, 0]);
    }
}
