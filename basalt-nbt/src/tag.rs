//! Tag tree types.
//!
//! A tag is one of twelve payload-bearing kinds (`End` only appears on the
//! wire as a terminator). Compounds preserve the order their children were
//! parsed or inserted in, so a reserialized tree keeps the original layout,
//! but compare as name→child maps.

use std::fmt;

/// Numeric tag kind identifiers as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagId {
    /// Compound terminator / empty-list element type.
    End = 0,
    /// Signed 8-bit integer.
    Byte = 1,
    /// Signed 16-bit integer.
    Short = 2,
    /// Signed 32-bit integer.
    Int = 3,
    /// Signed 64-bit integer.
    Long = 4,
    /// IEEE-754 single-precision float.
    Float = 5,
    /// IEEE-754 double-precision float.
    Double = 6,
    /// Array of signed bytes.
    ByteArray = 7,
    /// UTF-8 string.
    String = 8,
    /// Homogeneous list of unnamed payloads.
    List = 9,
    /// Ordered set of named children.
    Compound = 10,
    /// Array of signed 32-bit integers.
    IntArray = 11,
    /// Array of signed 64-bit integers.
    LongArray = 12,
}

impl TagId {
    /// Maps a wire id byte to a tag kind.
    #[must_use]
    pub const fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            0 => Self::End,
            1 => Self::Byte,
            2 => Self::Short,
            3 => Self::Int,
            4 => Self::Long,
            5 => Self::Float,
            6 => Self::Double,
            7 => Self::ByteArray,
            8 => Self::String,
            9 => Self::List,
            10 => Self::Compound,
            11 => Self::IntArray,
            12 => Self::LongArray,
            _ => return None,
        })
    }
}

/// A node of the tag tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    /// Signed 8-bit integer.
    Byte(i8),
    /// Signed 16-bit integer.
    Short(i16),
    /// Signed 32-bit integer.
    Int(i32),
    /// Signed 64-bit integer.
    Long(i64),
    /// IEEE-754 single-precision float.
    Float(f32),
    /// IEEE-754 double-precision float.
    Double(f64),
    /// Array of signed bytes.
    ByteArray(Vec<i8>),
    /// UTF-8 string.
    String(String),
    /// Homogeneous list. The element kind is preserved even when the list
    /// is empty so reserialization is faithful.
    List {
        /// Declared element kind.
        element: TagId,
        /// The unnamed element payloads.
        items: Vec<Tag>,
    },
    /// Ordered set of named children.
    Compound(Compound),
    /// Array of signed 32-bit integers.
    IntArray(Vec<i32>),
    /// Array of signed 64-bit integers.
    LongArray(Vec<i64>),
}

impl Tag {
    /// The wire id of this tag's kind.
    #[must_use]
    pub const fn id(&self) -> TagId {
        match self {
            Self::Byte(_) => TagId::Byte,
            Self::Short(_) => TagId::Short,
            Self::Int(_) => TagId::Int,
            Self::Long(_) => TagId::Long,
            Self::Float(_) => TagId::Float,
            Self::Double(_) => TagId::Double,
            Self::ByteArray(_) => TagId::ByteArray,
            Self::String(_) => TagId::String,
            Self::List { .. } => TagId::List,
            Self::Compound(_) => TagId::Compound,
            Self::IntArray(_) => TagId::IntArray,
            Self::LongArray(_) => TagId::LongArray,
        }
    }

    /// Builds a list tag, deriving the element kind from the first item.
    /// Empty lists get the `End` element kind.
    #[must_use]
    pub fn list(items: Vec<Tag>) -> Self {
        let element = items.first().map_or(TagId::End, Tag::id);
        Self::List { element, items }
    }

    /// The value if this is a `Byte`.
    #[must_use]
    pub const fn as_byte(&self) -> Option<i8> {
        match self {
            Self::Byte(v) => Some(*v),
            _ => None,
        }
    }

    /// The value if this is a `Short`.
    #[must_use]
    pub const fn as_short(&self) -> Option<i16> {
        match self {
            Self::Short(v) => Some(*v),
            _ => None,
        }
    }

    /// The value if this is an `Int`.
    #[must_use]
    pub const fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value if this is a `Long`.
    #[must_use]
    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// The value if this is a `String`.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The value if this is a `ByteArray`.
    #[must_use]
    pub fn as_byte_array(&self) -> Option<&[i8]> {
        match self {
            Self::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    /// The value if this is an `IntArray`.
    #[must_use]
    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Self::IntArray(v) => Some(v),
            _ => None,
        }
    }

    /// The value if this is a `LongArray`.
    #[must_use]
    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Self::LongArray(v) => Some(v),
            _ => None,
        }
    }

    /// The items if this is a `List`.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Self::List { items, .. } => Some(items),
            _ => None,
        }
    }

    /// The children if this is a `Compound`.
    #[must_use]
    pub const fn as_compound(&self) -> Option<&Compound> {
        match self {
            Self::Compound(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable access to the children if this is a `Compound`.
    #[must_use]
    pub const fn as_compound_mut(&mut self) -> Option<&mut Compound> {
        match self {
            Self::Compound(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(v) => write!(f, "{v}b"),
            Self::Short(v) => write!(f, "{v}s"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}L"),
            Self::Float(v) => write!(f, "{v}f"),
            Self::Double(v) => write!(f, "{v}d"),
            Self::ByteArray(v) => write!(f, "[B; {} elements]", v.len()),
            Self::String(v) => write!(f, "\"{v}\""),
            Self::List { items, .. } => write!(f, "[{} elements]", items.len()),
            Self::Compound(v) => write!(f, "{{{} entries}}", v.len()),
            Self::IntArray(v) => write!(f, "[I; {} elements]", v.len()),
            Self::LongArray(v) => write!(f, "[L; {} elements]", v.len()),
        }
    }
}

/// An ordered name→tag mapping.
///
/// Insertion order is the serialization order. Equality ignores order: two
/// compounds are equal when they hold the same names mapped to equal tags.
#[derive(Debug, Clone, Default)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    /// Creates an empty compound.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the compound has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a child with the given name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// The child with the given name, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries
            .iter()
            .find_map(|(n, tag)| (n == name).then_some(tag))
    }

    /// Mutable access to the child with the given name, if any.
    #[must_use]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.entries
            .iter_mut()
            .find_map(|(n, tag)| (n == name).then_some(tag))
    }

    /// Inserts a child, replacing an existing child of the same name in
    /// place (its position in the serialization order is kept).
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) {
        let name = name.into();
        if let Some(slot) = self.get_mut(&name) {
            *slot = tag;
        } else {
            self.entries.push((name, tag));
        }
    }

    /// Removes and returns the child with the given name, if any.
    pub fn remove(&mut self, name: &str) -> Option<Tag> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterates children in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(n, tag)| (n.as_str(), tag))
    }

    /// The child byte value, if present and a `Byte`.
    #[must_use]
    pub fn byte(&self, name: &str) -> Option<i8> {
        self.get(name).and_then(Tag::as_byte)
    }

    /// The child int value, if present and an `Int`.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(Tag::as_int)
    }

    /// The child long value, if present and a `Long`.
    #[must_use]
    pub fn long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Tag::as_long)
    }

    /// The child string value, if present and a `String`.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Tag::as_string)
    }

    /// The child byte array, if present and a `ByteArray`.
    #[must_use]
    pub fn byte_array(&self, name: &str) -> Option<&[i8]> {
        self.get(name).and_then(Tag::as_byte_array)
    }

    /// The child long array, if present and a `LongArray`.
    #[must_use]
    pub fn long_array(&self, name: &str) -> Option<&[i64]> {
        self.get(name).and_then(Tag::as_long_array)
    }

    /// The child list items, if present and a `List`.
    #[must_use]
    pub fn list(&self, name: &str) -> Option<&[Tag]> {
        self.get(name).and_then(Tag::as_list)
    }

    /// The child compound, if present and a `Compound`.
    #[must_use]
    pub fn compound(&self, name: &str) -> Option<&Compound> {
        self.get(name).and_then(Tag::as_compound)
    }
}

impl PartialEq for Compound {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(name, tag)| other.get(name) == Some(tag))
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        let mut compound = Self::new();
        for (name, tag) in iter {
            compound.insert(name, tag);
        }
        compound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_ids() {
        assert_eq!(Tag::Byte(0).id(), TagId::Byte);
        assert_eq!(Tag::LongArray(vec![]).id(), TagId::LongArray);
        assert_eq!(TagId::from_u8(10), Some(TagId::Compound));
        assert_eq!(TagId::from_u8(13), None);
    }

    #[test]
    fn test_compound_preserves_insertion_order() {
        let mut compound = Compound::new();
        compound.insert("b", Tag::Int(1));
        compound.insert("a", Tag::Int(2));
        compound.insert("b", Tag::Int(3));

        let names: Vec<&str> = compound.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(compound.int("b"), Some(3));
    }

    #[test]
    fn test_compound_equality_ignores_order() {
        let mut a = Compound::new();
        a.insert("x", Tag::Int(1));
        a.insert("y", Tag::String("s".into()));

        let mut b = Compound::new();
        b.insert("y", Tag::String("s".into()));
        b.insert("x", Tag::Int(1));

        assert_eq!(a, b);

        b.insert("x", Tag::Int(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_list_constructor_derives_element_kind() {
        assert_eq!(
            Tag::list(vec![Tag::Short(1)]),
            Tag::List {
                element: TagId::Short,
                items: vec![Tag::Short(1)],
            }
        );
        assert_eq!(
            Tag::list(Vec::new()),
            Tag::List {
                element: TagId::End,
                items: Vec::new(),
            }
        );
    }

    #[test]
    fn test_typed_accessors() {
        let mut compound = Compound::new();
        compound.insert("n", Tag::Byte(42));
        assert_eq!(compound.byte("n"), Some(42));
        assert_eq!(compound.int("n"), None);
        assert_eq!(compound.byte("missing"), None);
    }
}
