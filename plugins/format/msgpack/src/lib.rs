//! MessagePack archive backend (spec §4.7, §5): the reference binary
//! backend, exercising the two-pass field-counting machinery and
//! predeclared map/array/bin lengths that a streaming binary format needs.
//!
//! Where the JSON backend in `archival-format-json` builds a `serde_json::Value`
//! tree and hands it to `serde_json::to_vec` at the end, this backend writes
//! msgpack bytes directly as each scope opens: `hint_size` (computed by the
//! derive macro via [`archival_core::poly::count_fields`] for struct fields,
//! or from a container's own `len()`) is always the exact member count by
//! the time a scope is opened, so the map/array length header can be
//! emitted immediately instead of buffered and patched later. Load goes the
//! other way: the whole document is decoded once into an `rmpv::Value` tree
//! via the `rmpv` crate so object scopes can answer `contains_key`/
//! `unvisited_keys` the same way the JSON backend's cloned `Map` does.

use std::io::Write as IoWrite;

use archival_core::{
    ArchiveError, ArchiveTraits, Format, KeyType, LoadArrayScope, LoadBinaryScope, LoadObjectScope,
    LoadRoot, SaveArrayScope, SaveBinaryScope, SaveObjectScope, SaveRoot, Scalar,
    SerializationContext, SerializationOptions,
};
use rmp::encode as enc;
use rmpv::Value as MValue;

fn write_err(err: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Unknown(format!("msgpack encode: {err}"))
}

fn encode_scalar(buf: &mut Vec<u8>, value: Scalar) -> Result<(), ArchiveError> {
    match value {
        Scalar::Null => enc::write_nil(buf).map_err(write_err),
        Scalar::Bool(b) => enc::write_bool(buf, b).map_err(write_err),
        Scalar::I64(v) => enc::write_sint(buf, v).map(|_| ()).map_err(write_err),
        Scalar::U64(v) => enc::write_uint(buf, v).map(|_| ()).map_err(write_err),
        Scalar::F64(v) => enc::write_f64(buf, v).map_err(write_err),
        Scalar::String(s) => enc::write_str(buf, &s).map_err(write_err),
    }
}

fn msgpack_to_scalar(ctx: &mut SerializationContext, value: &MValue) -> Result<Scalar, ArchiveError> {
    match value {
        MValue::Nil => Ok(Scalar::Null),
        MValue::Boolean(b) => Ok(Scalar::Bool(*b)),
        MValue::Integer(n) => {
            if let Some(v) = n.as_i64() {
                Ok(Scalar::I64(v))
            } else if let Some(v) = n.as_u64() {
                Ok(Scalar::U64(v))
            } else {
                Err(ArchiveError::parsing(0, format!("integer `{n}` does not fit in 64 bits")))
            }
        }
        MValue::F32(v) => Ok(Scalar::F64(*v as f64)),
        MValue::F64(v) => Ok(Scalar::F64(*v)),
        MValue::String(s) => match s.as_str() {
            Some(s) => Ok(Scalar::String(s.to_owned())),
            None => Err(ArchiveError::utf_encoding(ctx.current_path(), "msgpack string is not valid UTF-8")),
        },
        other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected a scalar, found {}", kind_name(other)))),
    }
}

fn kind_name(value: &MValue) -> &'static str {
    match value {
        MValue::Nil => "null",
        MValue::Boolean(_) => "bool",
        MValue::Integer(_) => "integer",
        MValue::F32(_) | MValue::F64(_) => "float",
        MValue::String(_) => "string",
        MValue::Binary(_) => "binary",
        MValue::Array(_) => "array",
        MValue::Map(_) => "map",
        MValue::Ext(..) => "extension",
    }
}

/// Converts an object map's keys to owned `String`s up front. This backend
/// never writes a non-string key (the core's `KeyType` is `String`), so a
/// map with a non-string key can only originate outside this workspace; it
/// is reported as a parse failure rather than silently dropped.
fn map_by_key(map: Vec<(MValue, MValue)>) -> Result<std::collections::HashMap<String, MValue>, ArchiveError> {
    map.into_iter()
        .map(|(k, v)| match k.as_str() {
            Some(s) => Ok((s.to_owned(), v)),
            None => Err(ArchiveError::parsing(0, "msgpack map has a non-string key")),
        })
        .collect()
}

/// The marker type implementing [`archival_core::Format`] for this backend.
pub struct MsgpackFormat;

impl ArchiveTraits for MsgpackFormat {
    const ARCHIVE_NAME: &'static str = "msgpack";
}

impl Format for MsgpackFormat {
    type SaveRoot = MsgpackSaveRoot;
    type LoadRoot = MsgpackLoadRoot;

    const NAME: &'static str = "msgpack";
    const IS_TEXT: bool = false;

    fn new_save_root(_options: &SerializationOptions) -> Self::SaveRoot {
        MsgpackSaveRoot { buf: Vec::new() }
    }

    fn finish_save(root: Self::SaveRoot, options: &SerializationOptions) -> Result<Vec<u8>, ArchiveError> {
        if options.format_options.enable_format {
            tracing::debug!("msgpack backend has no pretty-printed form; format_options.enable_format is ignored");
        }
        Ok(root.buf)
    }

    fn new_load_root(input: &[u8], _options: &SerializationOptions) -> Result<Self::LoadRoot, ArchiveError> {
        let mut cursor = input;
        let value = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| ArchiveError::parsing(input.len() - cursor.len(), e.to_string()))?;
        Ok(MsgpackLoadRoot { value })
    }
}

pub struct MsgpackSaveRoot {
    buf: Vec<u8>,
}

impl SaveRoot for MsgpackSaveRoot {
    type Object<'a> = MsgpackSaveObject<'a>;
    type Array<'a> = MsgpackSaveArray<'a>;
    type Binary<'a> = MsgpackSaveBinary<'a>;

    fn open_object(&mut self, _ctx: &mut SerializationContext, hint_size: usize) -> Result<Self::Object<'_>, ArchiveError> {
        enc::write_map_len(&mut self.buf, hint_size as u32).map_err(write_err)?;
        Ok(MsgpackSaveObject { buf: &mut self.buf, declared: hint_size, written: 0 })
    }

    fn open_array(&mut self, _ctx: &mut SerializationContext, hint_size: usize) -> Result<Self::Array<'_>, ArchiveError> {
        enc::write_array_len(&mut self.buf, hint_size as u32).map_err(write_err)?;
        Ok(MsgpackSaveArray { buf: &mut self.buf, declared: hint_size, written: 0 })
    }

    fn write_scalar(&mut self, _ctx: &mut SerializationContext, value: Scalar) -> Result<(), ArchiveError> {
        encode_scalar(&mut self.buf, value)
    }

    fn open_binary(&mut self, _ctx: &mut SerializationContext, hint_size: usize) -> Result<Option<Self::Binary<'_>>, ArchiveError> {
        enc::write_bin_len(&mut self.buf, hint_size as u32).map_err(write_err)?;
        Ok(Some(MsgpackSaveBinary { buf: &mut self.buf, declared: hint_size, written: 0 }))
    }
}

/// Predeclared-length object scope. The map-length header is emitted by the
/// parent at `open_nested_object` time; this scope only ever appends
/// key/value pairs after it, so `close` has nothing left to commit — it
/// just checks, in debug builds, that the number of members written
/// matches what was declared (spec §9: a mismatched count is a programmer
/// error, undefined behavior in release, not a recoverable condition).
pub struct MsgpackSaveObject<'p> {
    buf: &'p mut Vec<u8>,
    declared: usize,
    written: usize,
}

impl<'p> SaveObjectScope for MsgpackSaveObject<'p> {
    type Object<'a> = MsgpackSaveObject<'a> where Self: 'a;
    type Array<'a> = MsgpackSaveArray<'a> where Self: 'a;
    type Binary<'a> = MsgpackSaveBinary<'a> where Self: 'a;
    type Attribute<'a> = archival_core::NoAttributeScope where Self: 'a;

    fn write_scalar(&mut self, _ctx: &mut SerializationContext, key: &KeyType, value: Scalar) -> Result<(), ArchiveError> {
        enc::write_str(self.buf, key).map_err(write_err)?;
        encode_scalar(self.buf, value)?;
        self.written += 1;
        Ok(())
    }

    fn open_nested_object(&mut self, _ctx: &mut SerializationContext, key: &KeyType, hint_size: usize) -> Result<Self::Object<'_>, ArchiveError> {
        enc::write_str(self.buf, key).map_err(write_err)?;
        enc::write_map_len(self.buf, hint_size as u32).map_err(write_err)?;
        self.written += 1;
        Ok(MsgpackSaveObject { buf: self.buf, declared: hint_size, written: 0 })
    }

    fn open_nested_array(&mut self, _ctx: &mut SerializationContext, key: &KeyType, hint_size: usize) -> Result<Self::Array<'_>, ArchiveError> {
        enc::write_str(self.buf, key).map_err(write_err)?;
        enc::write_array_len(self.buf, hint_size as u32).map_err(write_err)?;
        self.written += 1;
        Ok(MsgpackSaveArray { buf: self.buf, declared: hint_size, written: 0 })
    }

    fn open_nested_binary(&mut self, _ctx: &mut SerializationContext, key: &KeyType, hint_size: usize) -> Result<Option<Self::Binary<'_>>, ArchiveError> {
        enc::write_str(self.buf, key).map_err(write_err)?;
        enc::write_bin_len(self.buf, hint_size as u32).map_err(write_err)?;
        self.written += 1;
        Ok(Some(MsgpackSaveBinary { buf: self.buf, declared: hint_size, written: 0 }))
    }

    fn close(self, _ctx: &mut SerializationContext) -> Result<(), ArchiveError> {
        debug_assert_eq!(self.written, self.declared, "msgpack object wrote a different member count than it declared");
        Ok(())
    }
}

pub struct MsgpackSaveArray<'p> {
    buf: &'p mut Vec<u8>,
    declared: usize,
    written: usize,
}

impl<'p> SaveArrayScope for MsgpackSaveArray<'p> {
    type Object<'a> = MsgpackSaveObject<'a> where Self: 'a;
    type Array<'a> = MsgpackSaveArray<'a> where Self: 'a;
    type Binary<'a> = MsgpackSaveBinary<'a> where Self: 'a;

    fn write_scalar(&mut self, _ctx: &mut SerializationContext, value: Scalar) -> Result<(), ArchiveError> {
        encode_scalar(self.buf, value)?;
        self.written += 1;
        Ok(())
    }

    fn open_nested_object(&mut self, _ctx: &mut SerializationContext, hint_size: usize) -> Result<Self::Object<'_>, ArchiveError> {
        enc::write_map_len(self.buf, hint_size as u32).map_err(write_err)?;
        self.written += 1;
        Ok(MsgpackSaveObject { buf: self.buf, declared: hint_size, written: 0 })
    }

    fn open_nested_array(&mut self, _ctx: &mut SerializationContext, hint_size: usize) -> Result<Self::Array<'_>, ArchiveError> {
        enc::write_array_len(self.buf, hint_size as u32).map_err(write_err)?;
        self.written += 1;
        Ok(MsgpackSaveArray { buf: self.buf, declared: hint_size, written: 0 })
    }

    fn open_nested_binary(&mut self, _ctx: &mut SerializationContext, hint_size: usize) -> Result<Option<Self::Binary<'_>>, ArchiveError> {
        enc::write_bin_len(self.buf, hint_size as u32).map_err(write_err)?;
        self.written += 1;
        Ok(Some(MsgpackSaveBinary { buf: self.buf, declared: hint_size, written: 0 }))
    }

    fn close(self, _ctx: &mut SerializationContext) -> Result<(), ArchiveError> {
        debug_assert_eq!(self.written, self.declared, "msgpack array wrote a different element count than it declared");
        Ok(())
    }
}

/// Bin-family scope: the `bin8`/`bin16`/`bin32` length header is written at
/// open time (the caller already knows the exact byte count via
/// `hint_size`), so every `write_bytes` call after that just appends raw
/// bytes with no further framing.
pub struct MsgpackSaveBinary<'p> {
    buf: &'p mut Vec<u8>,
    declared: usize,
    written: usize,
}

impl<'p> SaveBinaryScope for MsgpackSaveBinary<'p> {
    fn write_bytes(&mut self, _ctx: &mut SerializationContext, bytes: &[u8]) -> Result<(), ArchiveError> {
        self.buf.write_all(bytes).map_err(ArchiveError::from)?;
        self.written += bytes.len();
        Ok(())
    }

    fn close(self, _ctx: &mut SerializationContext) -> Result<(), ArchiveError> {
        debug_assert_eq!(self.written, self.declared, "msgpack binary scope wrote a different byte count than it declared");
        Ok(())
    }
}

pub struct MsgpackLoadRoot {
    value: MValue,
}

impl LoadRoot for MsgpackLoadRoot {
    type Object = MsgpackLoadObject;
    type Array = MsgpackLoadArray;
    type Binary = MsgpackLoadBinary;

    fn open_object(&mut self, ctx: &mut SerializationContext) -> Result<Self::Object, ArchiveError> {
        match self.value.clone() {
            MValue::Map(map) => Ok(MsgpackLoadObject { map: map_by_key(map)?, visited: Default::default() }),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected map, found {}", kind_name(&other)))),
        }
    }

    fn open_array(&mut self, ctx: &mut SerializationContext) -> Result<Self::Array, ArchiveError> {
        match self.value.clone() {
            MValue::Array(items) => Ok(MsgpackLoadArray { items, cursor: 0 }),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected array, found {}", kind_name(&other)))),
        }
    }

    fn read_scalar(&mut self, ctx: &mut SerializationContext) -> Result<Scalar, ArchiveError> {
        msgpack_to_scalar(ctx, &self.value)
    }

    fn open_binary(&mut self, ctx: &mut SerializationContext) -> Result<Option<Self::Binary>, ArchiveError> {
        match &self.value {
            MValue::Binary(bytes) => Ok(Some(MsgpackLoadBinary { bytes: bytes.clone() })),
            MValue::Nil => Ok(None),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected binary, found {}", kind_name(other)))),
        }
    }
}

pub struct MsgpackLoadObject {
    map: std::collections::HashMap<String, MValue>,
    visited: std::collections::HashSet<String>,
}

impl LoadObjectScope for MsgpackLoadObject {
    type Object = MsgpackLoadObject;
    type Array = MsgpackLoadArray;
    type Binary = MsgpackLoadBinary;
    type Attribute = archival_core::NoAttributeScope;

    fn contains_key(&self, key: &KeyType) -> bool {
        self.map.contains_key(key)
    }

    fn read_scalar(&mut self, ctx: &mut SerializationContext, key: &KeyType) -> Result<Option<Scalar>, ArchiveError> {
        self.visited.insert(key.clone());
        match self.map.get(key) {
            None | Some(MValue::Nil) => Ok(None),
            Some(value) => msgpack_to_scalar(ctx, value).map(Some),
        }
    }

    fn open_nested_object(&mut self, ctx: &mut SerializationContext, key: &KeyType) -> Result<Option<Self::Object>, ArchiveError> {
        self.visited.insert(key.clone());
        match self.map.get(key) {
            None | Some(MValue::Nil) => Ok(None),
            Some(MValue::Map(map)) => Ok(Some(MsgpackLoadObject { map: map_by_key(map.clone())?, visited: Default::default() })),
            Some(other) => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected map, found {}", kind_name(other)))),
        }
    }

    fn open_nested_array(&mut self, ctx: &mut SerializationContext, key: &KeyType) -> Result<Option<Self::Array>, ArchiveError> {
        self.visited.insert(key.clone());
        match self.map.get(key) {
            None | Some(MValue::Nil) => Ok(None),
            Some(MValue::Array(items)) => Ok(Some(MsgpackLoadArray { items: items.clone(), cursor: 0 })),
            Some(other) => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected array, found {}", kind_name(other)))),
        }
    }

    fn open_nested_binary(&mut self, ctx: &mut SerializationContext, key: &KeyType) -> Result<Option<Self::Binary>, ArchiveError> {
        self.visited.insert(key.clone());
        match self.map.get(key) {
            None | Some(MValue::Nil) => Ok(None),
            Some(MValue::Binary(bytes)) => Ok(Some(MsgpackLoadBinary { bytes: bytes.clone() })),
            Some(other) => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected binary, found {}", kind_name(other)))),
        }
    }

    fn unvisited_keys(&self) -> Vec<KeyType> {
        self.map.keys().filter(|k| !self.visited.contains(*k)).cloned().collect()
    }
}

pub struct MsgpackLoadArray {
    items: Vec<MValue>,
    cursor: usize,
}

impl LoadArrayScope for MsgpackLoadArray {
    type Object = MsgpackLoadObject;
    type Array = MsgpackLoadArray;
    type Binary = MsgpackLoadBinary;

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }

    fn is_at_end(&self) -> bool {
        self.cursor >= self.items.len()
    }

    fn read_scalar(&mut self, ctx: &mut SerializationContext) -> Result<Scalar, ArchiveError> {
        let value = self.items.get(self.cursor).ok_or_else(|| ArchiveError::OutOfRange { path: ctx.current_path() })?;
        let scalar = msgpack_to_scalar(ctx, value)?;
        self.cursor += 1;
        Ok(scalar)
    }

    fn open_nested_object(&mut self, ctx: &mut SerializationContext) -> Result<Self::Object, ArchiveError> {
        let value = self.items.get(self.cursor).ok_or_else(|| ArchiveError::OutOfRange { path: ctx.current_path() })?.clone();
        let result = match value {
            MValue::Map(map) => Ok(MsgpackLoadObject { map: map_by_key(map)?, visited: Default::default() }),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected map, found {}", kind_name(&other)))),
        };
        self.cursor += 1;
        result
    }

    fn open_nested_array(&mut self, ctx: &mut SerializationContext) -> Result<Self::Array, ArchiveError> {
        let value = self.items.get(self.cursor).ok_or_else(|| ArchiveError::OutOfRange { path: ctx.current_path() })?.clone();
        let result = match value {
            MValue::Array(items) => Ok(MsgpackLoadArray { items, cursor: 0 }),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected array, found {}", kind_name(&other)))),
        };
        self.cursor += 1;
        result
    }

    fn open_nested_binary(&mut self, ctx: &mut SerializationContext) -> Result<Option<Self::Binary>, ArchiveError> {
        let value = self.items.get(self.cursor).ok_or_else(|| ArchiveError::OutOfRange { path: ctx.current_path() })?.clone();
        let result = match value {
            MValue::Binary(bytes) => Ok(Some(MsgpackLoadBinary { bytes })),
            MValue::Nil => Ok(None),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected binary, found {}", kind_name(&other)))),
        };
        self.cursor += 1;
        result
    }
}

pub struct MsgpackLoadBinary {
    bytes: Vec<u8>,
}

impl LoadBinaryScope for MsgpackLoadBinary {
    fn read_bytes(&mut self, _ctx: &mut SerializationContext) -> Result<Vec<u8>, ArchiveError> {
        Ok(std::mem::take(&mut self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archival_core::{
        load_object, load_object_from_stream, save_object, save_object_to_stream, Archival,
        StreamEncoding, StreamOptions,
    };

    #[derive(Archival, Debug, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[test]
    fn roundtrips_a_struct_through_a_predeclared_map_header() {
        let point = Point { x: -7, y: 42 };
        let options = SerializationOptions::default();
        let bytes = save_object::<MsgpackFormat, _>(&point, &options).unwrap();
        // fixmap header (0x82 = fixmap with 2 entries) leads the payload.
        assert_eq!(bytes[0], 0x82);
        let loaded: Point = load_object::<MsgpackFormat, Point>(&bytes, &options).unwrap();
        assert_eq!(loaded, point);
    }

    #[test]
    fn missing_required_field_is_mismatched_types() {
        let options = SerializationOptions::default();
        let mut buf = Vec::new();
        enc::write_map_len(&mut buf, 1).unwrap();
        enc::write_str(&mut buf, "x").unwrap();
        enc::write_sint(&mut buf, 1).unwrap();
        let result = load_object::<MsgpackFormat, Point>(&buf, &options);
        assert!(matches!(result, Err(ArchiveError::MismatchedTypes { .. })));
    }

    #[test]
    fn non_utf8_stream_encoding_is_unsupported_on_a_binary_backend() {
        let options = SerializationOptions::builder()
            .stream_options(StreamOptions { encoding: StreamEncoding::Utf16Le, write_bom: false })
            .build();
        let point = Point { x: 1, y: 2 };
        let mut buffer = Vec::new();
        let result = save_object_to_stream::<MsgpackFormat, _, _>(&point, &mut buffer, &options);
        assert!(matches!(result, Err(ArchiveError::UnsupportedEncoding(_))));
    }

    #[test]
    fn default_stream_options_leave_the_binary_payload_byte_for_byte_unchanged() {
        let options = SerializationOptions::default();
        let point = Point { x: 1, y: 2 };
        let direct = save_object::<MsgpackFormat, _>(&point, &options).unwrap();
        let mut buffer = Vec::new();
        save_object_to_stream::<MsgpackFormat, _, _>(&point, &mut buffer, &options).unwrap();
        assert_eq!(buffer, direct, "a binary backend must never gain a UTF-8 BOM from the stream path");
        let loaded: Point = load_object_from_stream::<MsgpackFormat, _, _>(&mut buffer.as_slice(), &options).unwrap();
        assert_eq!(loaded, point);
    }

    #[test]
    fn requesting_a_bom_on_a_binary_backend_is_unsupported() {
        let options = SerializationOptions::builder()
            .stream_options(StreamOptions { encoding: StreamEncoding::Utf8, write_bom: true })
            .build();
        let point = Point { x: 1, y: 2 };
        let mut buffer = Vec::new();
        let result = save_object_to_stream::<MsgpackFormat, _, _>(&point, &mut buffer, &options);
        assert!(matches!(result, Err(ArchiveError::UnsupportedEncoding(_))));
    }

    #[test]
    fn bare_scalar_round_trips_at_the_document_root() {
        let options = SerializationOptions::default();
        let bytes = save_object::<MsgpackFormat, i64>(&-7, &options).unwrap();
        let loaded: i64 = load_object::<MsgpackFormat, _>(&bytes, &options).unwrap();
        assert_eq!(loaded, -7);
    }

    #[test]
    fn binary_scope_roundtrips_raw_bytes() {
        let options = SerializationOptions::default();
        let mut root = MsgpackFormat::new_save_root(&options);
        let mut ctx = SerializationContext::new(&options);
        let mut binary = SaveRoot::open_binary(&mut root, &mut ctx, 3).unwrap().unwrap();
        binary.write_bytes(&mut ctx, &[1, 2, 3]).unwrap();
        binary.close(&mut ctx).unwrap();
        let bytes = MsgpackFormat::finish_save(root, &options).unwrap();

        let mut load_root = MsgpackFormat::new_load_root(&bytes, &options).unwrap();
        let mut binary = LoadRoot::open_binary(&mut load_root, &mut ctx).unwrap().unwrap();
        assert_eq!(binary.read_bytes(&mut ctx).unwrap(), vec![1, 2, 3]);
    }
}
