//! The scope trait hierarchy (spec §2, §4.1).
//!
//! Where the original dispatches on a runtime `SerializeMode` enum and
//! shares one scope type across both directions, this crate encodes the
//! direction in the type system: save and load each get their own trait
//! family (`SaveObjectScope` vs `LoadObjectScope`, and so on), and a format
//! backend implements one family per direction. A generic field body
//! written against `S: SaveObjectScope` simply cannot call a load-only
//! method — the compiler enforces what the original enforces by
//! convention, with no separate mode marker type needed to express it.

use crate::context::SerializationContext;
use crate::error::ArchiveError;

/// Key used to address a named member of an object scope. Formats that are
/// naturally map-shaped (JSON, MsgPack maps) use `Text`; a format without
/// format-level field ordering. The original's `TKeyType` is typically
/// `std::string` or `std::wstring`; this collapses to `String`.
pub type KeyType = String;

/// Static facts about a format backend that the core needs without an
/// instance in hand: the path separator used in diagnostics and whether
/// keys in this format preserve insertion order. Mirrors the constants
/// exposed by the original's `TArchiveTraits`.
pub trait ArchiveTraits {
    /// Human-readable archive name, used in error messages and logs.
    const ARCHIVE_NAME: &'static str;
    /// Whether this format can represent object keys out of declaration
    /// order (true for JSON/MsgPack maps, false for fixed binary layouts).
    const SUPPORTS_UNORDERED_KEYS: bool = true;
}

/// A leaf value as exchanged between the core and a format backend.
///
/// Deliberately flat rather than a recursive tree: nested structure is
/// represented by scope transitions (`open_object`/`open_array`), not by a
/// `Scalar` variant, so a binary backend can still interleave writing
/// scalars with the two-pass size-counting machinery in
/// [`crate::poly`]. A tree-shaped `Value` would make that counting pass
/// pointless, since the whole structure would already be materialized
/// before any byte is written.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
}

impl Scalar {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::I64(_) => "signed integer",
            Scalar::U64(_) => "unsigned integer",
            Scalar::F64(_) => "float",
            Scalar::String(_) => "string",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}
impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}
impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::U64(v)
    }
}
impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}
impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::String(v)
    }
}

/// Opaque-byte scope for formats that support a dedicated binary type
/// (MsgPack `bin`), written during save. No format in this workspace's
/// JSON backend supports one — see [`NoBinaryScope`] — so this trait
/// exists for backends that do, and for the `Vec<u8>` container rule.
pub trait SaveBinaryScope {
    fn write_bytes(&mut self, ctx: &mut SerializationContext, bytes: &[u8]) -> Result<(), ArchiveError>;
    fn close(self, ctx: &mut SerializationContext) -> Result<(), ArchiveError>;
}

/// Load-direction counterpart of [`SaveBinaryScope`].
pub trait LoadBinaryScope {
    fn read_bytes(&mut self, ctx: &mut SerializationContext) -> Result<Vec<u8>, ArchiveError>;
}

/// Key-indexed primitive-only scope for formats that distinguish attributes
/// from children (XML's `<el attr="v">`). No backend in this workspace
/// implements one (XML itself is out of scope per spec.md §1); the trait is
/// defined so a future XML backend has a contract to implement, matching
/// the original's `TArchiveTraits`-level attribute scope role.
pub trait SaveAttributeScope {
    fn write_scalar(&mut self, ctx: &mut SerializationContext, key: &KeyType, value: Scalar) -> Result<(), ArchiveError>;
    fn close(self, ctx: &mut SerializationContext) -> Result<(), ArchiveError>;
}

pub trait LoadAttributeScope {
    fn read_scalar(&mut self, ctx: &mut SerializationContext, key: &KeyType) -> Result<Option<Scalar>, ArchiveError>;
}

/// Uninhabited placeholder for `Binary`/`Attribute` associated types on a
/// backend that doesn't support that scope role: a value of this type can
/// never exist, so the trait methods below are unreachable by construction
/// rather than by `panic!`.
#[derive(Debug)]
pub enum NoBinaryScope {}

impl SaveBinaryScope for NoBinaryScope {
    fn write_bytes(&mut self, _ctx: &mut SerializationContext, _bytes: &[u8]) -> Result<(), ArchiveError> {
        match *self {}
    }
    fn close(self, _ctx: &mut SerializationContext) -> Result<(), ArchiveError> {
        match self {}
    }
}

impl LoadBinaryScope for NoBinaryScope {
    fn read_bytes(&mut self, _ctx: &mut SerializationContext) -> Result<Vec<u8>, ArchiveError> {
        match *self {}
    }
}

/// See [`NoBinaryScope`]; same role for the `Attribute` associated type.
#[derive(Debug)]
pub enum NoAttributeScope {}

impl SaveAttributeScope for NoAttributeScope {
    fn write_scalar(&mut self, _ctx: &mut SerializationContext, _key: &KeyType, _value: Scalar) -> Result<(), ArchiveError> {
        match *self {}
    }
    fn close(self, _ctx: &mut SerializationContext) -> Result<(), ArchiveError> {
        match self {}
    }
}

impl LoadAttributeScope for NoAttributeScope {
    fn read_scalar(&mut self, _ctx: &mut SerializationContext, _key: &KeyType) -> Result<Option<Scalar>, ArchiveError> {
        match *self {}
    }
}

/// Root scope of a save operation: the entry point a [`crate::entry::Format`]
/// hands to the top-level value being saved.
///
/// `Object`/`Array`/`Binary` are generic associated types rather than plain
/// associated types: a nested scope borrows back into its parent (so a
/// binary backend can write bytes directly into one shared output buffer
/// as scopes open and close, instead of building a tree and inserting it
/// into the parent on close), and that borrow's lifetime has to appear
/// somewhere in the scope's own type.
pub trait SaveRoot {
    type Object<'a>: SaveObjectScope
    where
        Self: 'a;
    type Array<'a>: SaveArrayScope
    where
        Self: 'a;
    type Binary<'a>: SaveBinaryScope
    where
        Self: 'a;

    /// `hint_size` is the number of members the caller is about to write —
    /// the derive macro obtains it via [`crate::poly::count_fields`] before
    /// opening the root object, so a binary backend can emit a map-length
    /// header before the first field arrives instead of buffering the
    /// whole document.
    fn open_object(&mut self, ctx: &mut SerializationContext, hint_size: usize) -> Result<Self::Object<'_>, ArchiveError>;
    fn open_array(
        &mut self,
        ctx: &mut SerializationContext,
        hint_size: usize,
    ) -> Result<Self::Array<'_>, ArchiveError>;
    fn write_scalar(&mut self, ctx: &mut SerializationContext, value: Scalar) -> Result<(), ArchiveError>;

    /// `None` for a backend with no binary scope role at all. Defaulted so
    /// JSON-shaped backends need not override it.
    fn open_binary(
        &mut self,
        _ctx: &mut SerializationContext,
        _hint_size: usize,
    ) -> Result<Option<Self::Binary<'_>>, ArchiveError> {
        Ok(None)
    }
}

/// Root scope of a load operation.
pub trait LoadRoot {
    type Object: LoadObjectScope;
    type Array: LoadArrayScope;
    type Binary: LoadBinaryScope;

    fn open_object(&mut self, ctx: &mut SerializationContext) -> Result<Self::Object, ArchiveError>;
    fn open_array(&mut self, ctx: &mut SerializationContext) -> Result<Self::Array, ArchiveError>;
    fn read_scalar(&mut self, ctx: &mut SerializationContext) -> Result<Scalar, ArchiveError>;

    fn open_binary(&mut self, _ctx: &mut SerializationContext) -> Result<Option<Self::Binary>, ArchiveError> {
        Ok(None)
    }
}

/// A keyed (map/struct-shaped) scope during save. See [`SaveRoot`] for why
/// the nested scope types are generic over a lifetime.
pub trait SaveObjectScope {
    type Object<'a>: SaveObjectScope
    where
        Self: 'a;
    type Array<'a>: SaveArrayScope
    where
        Self: 'a;
    type Binary<'a>: SaveBinaryScope
    where
        Self: 'a;
    type Attribute<'a>: SaveAttributeScope
    where
        Self: 'a;

    fn write_scalar(
        &mut self,
        ctx: &mut SerializationContext,
        key: &KeyType,
        value: Scalar,
    ) -> Result<(), ArchiveError>;

    /// See [`SaveRoot::open_object`] for what `hint_size` is for.
    fn open_nested_object(
        &mut self,
        ctx: &mut SerializationContext,
        key: &KeyType,
        hint_size: usize,
    ) -> Result<Self::Object<'_>, ArchiveError>;

    fn open_nested_array(
        &mut self,
        ctx: &mut SerializationContext,
        key: &KeyType,
        hint_size: usize,
    ) -> Result<Self::Array<'_>, ArchiveError>;

    fn open_nested_binary(
        &mut self,
        _ctx: &mut SerializationContext,
        _key: &KeyType,
        _hint_size: usize,
    ) -> Result<Option<Self::Binary<'_>>, ArchiveError> {
        Ok(None)
    }

    /// Valid only for formats with attributes (spec §4.4); `None` otherwise.
    fn open_attribute(&mut self, _ctx: &mut SerializationContext) -> Result<Option<Self::Attribute<'_>>, ArchiveError> {
        Ok(None)
    }

    /// Called once all members have been written; lets binary backends
    /// patch a predeclared field count if it turned out to be wrong.
    fn close(self, ctx: &mut SerializationContext) -> Result<(), ArchiveError>;
}

/// A keyed scope during load.
pub trait LoadObjectScope {
    type Object: LoadObjectScope;
    type Array: LoadArrayScope;
    type Binary: LoadBinaryScope;
    type Attribute: LoadAttributeScope;

    /// Whether a member with this key is present in the input. Object
    /// members are visited by field name, not format position, so the
    /// backend is responsible for buffering or seeking as needed.
    fn contains_key(&self, key: &KeyType) -> bool;

    fn read_scalar(
        &mut self,
        ctx: &mut SerializationContext,
        key: &KeyType,
    ) -> Result<Option<Scalar>, ArchiveError>;

    fn open_nested_object(
        &mut self,
        ctx: &mut SerializationContext,
        key: &KeyType,
    ) -> Result<Option<Self::Object>, ArchiveError>;

    fn open_nested_array(
        &mut self,
        ctx: &mut SerializationContext,
        key: &KeyType,
    ) -> Result<Option<Self::Array>, ArchiveError>;

    fn open_nested_binary(
        &mut self,
        _ctx: &mut SerializationContext,
        _key: &KeyType,
    ) -> Result<Option<Self::Binary>, ArchiveError> {
        Ok(None)
    }

    fn open_attribute(&mut self, _ctx: &mut SerializationContext) -> Result<Option<Self::Attribute>, ArchiveError> {
        Ok(None)
    }

    /// Keys present in the input but not consumed by any bound field.
    /// Surfacing this is what lets a derive macro implement
    /// deny-unknown-fields validation without the backend knowing about it.
    fn unvisited_keys(&self) -> Vec<KeyType>;
}

/// A sequential scope during save. See [`SaveRoot`] for why the nested
/// scope types are generic over a lifetime.
pub trait SaveArrayScope {
    type Object<'a>: SaveObjectScope
    where
        Self: 'a;
    type Array<'a>: SaveArrayScope
    where
        Self: 'a;
    type Binary<'a>: SaveBinaryScope
    where
        Self: 'a;

    fn write_scalar(&mut self, ctx: &mut SerializationContext, value: Scalar) -> Result<(), ArchiveError>;
    fn open_nested_object(&mut self, ctx: &mut SerializationContext, hint_size: usize) -> Result<Self::Object<'_>, ArchiveError>;
    fn open_nested_array(
        &mut self,
        ctx: &mut SerializationContext,
        hint_size: usize,
    ) -> Result<Self::Array<'_>, ArchiveError>;
    fn open_nested_binary(
        &mut self,
        _ctx: &mut SerializationContext,
        _hint_size: usize,
    ) -> Result<Option<Self::Binary<'_>>, ArchiveError> {
        Ok(None)
    }
    fn close(self, ctx: &mut SerializationContext) -> Result<(), ArchiveError>;
}

/// A sequential scope during load.
pub trait LoadArrayScope {
    type Object: LoadObjectScope;
    type Array: LoadArrayScope;
    type Binary: LoadBinaryScope;

    /// Declared or discovered length, when the format makes it known up
    /// front (binary formats always do; text formats may not).
    fn size_hint(&self) -> Option<usize>;
    /// `true` once every element has been consumed.
    fn is_at_end(&self) -> bool;

    fn read_scalar(&mut self, ctx: &mut SerializationContext) -> Result<Scalar, ArchiveError>;
    fn open_nested_object(&mut self, ctx: &mut SerializationContext) -> Result<Self::Object, ArchiveError>;
    fn open_nested_array(&mut self, ctx: &mut SerializationContext) -> Result<Self::Array, ArchiveError>;
    fn open_nested_binary(&mut self, _ctx: &mut SerializationContext) -> Result<Option<Self::Binary>, ArchiveError> {
        Ok(None)
    }
}
