//! Format-agnostic archive abstraction: mode-typed scopes, a scalar
//! conversion facility, validators/refiners, and the save/load entry
//! points. A format backend (see `archival-format-json`,
//! `archival-format-msgpack`) implements the `scope` trait family; this
//! crate never parses or emits a byte of any concrete wire format itself.

pub mod containers;
pub mod context;
pub mod convert;
pub mod dispatch;
pub mod entry;
pub mod enum_registry;
pub mod error;
pub mod options;
pub mod poly;
pub mod scope;

pub use archival_derive::Archival;

pub use containers::{Bitset, StringKeyedMap, StringifiableKey};
pub use context::{IndexGuard, NameGuard, SerializationContext};
pub use dispatch::{
    bind_load, bind_save, Binding, Email, Fallback, LoadValue, MaxSize, MinSize, PhoneNumber, Range,
    Refiner, Required, SaveValue, ToLowerCase, ToUpperCase, TrimWhitespace, Validator,
};
pub use entry::{
    load_object, load_object_from_file, load_object_from_stream, save_object, save_object_to_file,
    save_object_to_stream, Format, LoadRootValue, SaveRootValue,
};
pub use enum_registry::{EnumBinding, EnumField};
pub use error::{ArchiveError, ValidationError, ValidationException};
pub use poly::{BaseObject, CountableFields, LoadBase, SaveBase};
pub use options::{
    FormatOptions, MismatchedTypesPolicy, OverflowNumberPolicy, SerializationOptions,
    SerializationOptionsBuilder, StreamEncoding, StreamOptions, UtfEncodingErrorPolicy,
};
pub use scope::{
    ArchiveTraits, KeyType, LoadArrayScope, LoadAttributeScope, LoadBinaryScope, LoadObjectScope,
    LoadRoot, NoAttributeScope, NoBinaryScope, SaveArrayScope, SaveAttributeScope,
    SaveBinaryScope, SaveObjectScope, SaveRoot, Scalar,
};
