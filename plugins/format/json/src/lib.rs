//! JSON archive backend built directly on [`serde_json::Value`] (spec §5,
//! §7 example scenarios S1/S2/S5).
//!
//! `serde_json::Value` already gives object/array/scalar shape for free, so
//! this backend's scopes are thin wrappers around `Map`/`Vec` rather than a
//! hand-rolled parser — the parsing and pretty-printing work is
//! `serde_json`'s, the mode-typed scope discipline is
//! `archival-core`'s.

use archival_core::{
    ArchiveError, ArchiveTraits, Format, KeyType, LoadArrayScope, LoadObjectScope, LoadRoot,
    NoAttributeScope, NoBinaryScope, SaveArrayScope, SaveObjectScope, SaveRoot, Scalar,
    SerializationContext, SerializationOptions,
};
use serde_json::{Map, Number, Value};

fn scalar_to_json(scalar: Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => Value::Bool(b),
        Scalar::I64(v) => Value::Number(Number::from(v)),
        Scalar::U64(v) => Value::Number(Number::from(v)),
        Scalar::F64(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        Scalar::String(s) => Value::String(s),
    }
}

fn json_to_scalar(ctx: &mut SerializationContext, value: &Value) -> Result<Scalar, ArchiveError> {
    match value {
        Value::Null => Ok(Scalar::Null),
        Value::Bool(b) => Ok(Scalar::Bool(*b)),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(Scalar::I64(v))
            } else if let Some(v) = n.as_u64() {
                Ok(Scalar::U64(v))
            } else if let Some(v) = n.as_f64() {
                Ok(Scalar::F64(v))
            } else {
                Err(ArchiveError::parsing(0, format!("unrepresentable number `{n}`")))
            }
        }
        Value::String(s) => Ok(Scalar::String(s.clone())),
        other => Err(ArchiveError::mismatched_types(
            ctx.current_path(),
            format!("expected a scalar, found {}", kind_name(other)),
        )),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The marker type implementing [`archival_core::Format`] for this backend.
pub struct JsonFormat;

impl ArchiveTraits for JsonFormat {
    const ARCHIVE_NAME: &'static str = "json";
}

impl Format for JsonFormat {
    type SaveRoot = JsonSaveRoot;
    type LoadRoot = JsonLoadRoot;

    const NAME: &'static str = "json";

    fn new_save_root(_options: &SerializationOptions) -> Self::SaveRoot {
        JsonSaveRoot { value: None }
    }

    fn finish_save(root: Self::SaveRoot, options: &SerializationOptions) -> Result<Vec<u8>, ArchiveError> {
        let value = root.value.unwrap_or(Value::Null);
        render(&value, options)
    }

    fn new_load_root(input: &[u8], _options: &SerializationOptions) -> Result<Self::LoadRoot, ArchiveError> {
        let text = std::str::from_utf8(input).map_err(|e| ArchiveError::parsing(e.valid_up_to(), e.to_string()))?;
        let value: Value = serde_json::from_str(text).map_err(|e| ArchiveError::parsing(e.column(), e.to_string()))?;
        Ok(JsonLoadRoot { value })
    }
}

/// Renders with `format_options` honored: compact JSON by default, or a
/// pretty-printed form with the configured padding character/count when
/// `enable_format` is set (spec §7 scenario S2: 2-space indent).
fn render(value: &Value, options: &SerializationOptions) -> Result<Vec<u8>, ArchiveError> {
    if options.format_options.enable_format {
        let indent = options.format_options.padding_char.to_string().repeat(options.format_options.padding_char_num);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        serde::Serialize::serialize(value, &mut serializer).map_err(|e| ArchiveError::parsing(0, e.to_string()))?;
        Ok(buf)
    } else {
        serde_json::to_vec(value).map_err(|e| ArchiveError::parsing(0, e.to_string()))
    }
}

pub struct JsonSaveRoot {
    value: Option<Value>,
}

impl SaveRoot for JsonSaveRoot {
    type Object<'a> = JsonSaveObject<'a>;
    type Array<'a> = JsonSaveArray<'a>;
    type Binary<'a> = NoBinaryScope;

    fn open_object(&mut self, _ctx: &mut SerializationContext, _hint_size: usize) -> Result<Self::Object<'_>, ArchiveError> {
        Ok(JsonSaveObject { map: Map::new(), sink: ObjectSink::Root(self) })
    }

    fn open_array(&mut self, _ctx: &mut SerializationContext, hint_size: usize) -> Result<Self::Array<'_>, ArchiveError> {
        Ok(JsonSaveArray { items: Vec::with_capacity(hint_size), sink: ArraySink::Root(self) })
    }

    fn write_scalar(&mut self, _ctx: &mut SerializationContext, value: Scalar) -> Result<(), ArchiveError> {
        self.value = Some(scalar_to_json(value));
        Ok(())
    }
}

/// Where a finished object/array hands its value back to once `close` is
/// called: either the document root, or a slot in a parent object/array.
enum ObjectSink<'p> {
    Root(&'p mut JsonSaveRoot),
    ObjectField { parent: &'p mut Map<String, Value>, key: String },
    ArrayElement { parent: &'p mut Vec<Value> },
}

enum ArraySink<'p> {
    Root(&'p mut JsonSaveRoot),
    ObjectField { parent: &'p mut Map<String, Value>, key: String },
    ArrayElement { parent: &'p mut Vec<Value> },
}

pub struct JsonSaveObject<'p> {
    map: Map<String, Value>,
    sink: ObjectSink<'p>,
}

impl<'p> SaveObjectScope for JsonSaveObject<'p> {
    type Object<'a> = JsonSaveObject<'a> where Self: 'a;
    type Array<'a> = JsonSaveArray<'a> where Self: 'a;
    type Binary<'a> = NoBinaryScope where Self: 'a;
    type Attribute<'a> = NoAttributeScope where Self: 'a;

    fn write_scalar(&mut self, _ctx: &mut SerializationContext, key: &KeyType, value: Scalar) -> Result<(), ArchiveError> {
        self.map.insert(key.clone(), scalar_to_json(value));
        Ok(())
    }

    fn open_nested_object(&mut self, _ctx: &mut SerializationContext, key: &KeyType, _hint_size: usize) -> Result<Self::Object<'_>, ArchiveError> {
        Ok(JsonSaveObject {
            map: Map::new(),
            sink: ObjectSink::ObjectField { parent: &mut self.map, key: key.clone() },
        })
    }

    fn open_nested_array(
        &mut self,
        _ctx: &mut SerializationContext,
        key: &KeyType,
        hint_size: usize,
    ) -> Result<Self::Array<'_>, ArchiveError> {
        Ok(JsonSaveArray {
            items: Vec::with_capacity(hint_size),
            sink: ArraySink::ObjectField { parent: &mut self.map, key: key.clone() },
        })
    }

    fn close(self, _ctx: &mut SerializationContext) -> Result<(), ArchiveError> {
        let value = Value::Object(self.map);
        match self.sink {
            ObjectSink::Root(root) => root.value = Some(value),
            ObjectSink::ObjectField { parent, key } => {
                parent.insert(key, value);
            }
            ObjectSink::ArrayElement { parent } => parent.push(value),
        }
        Ok(())
    }
}

pub struct JsonSaveArray<'p> {
    items: Vec<Value>,
    sink: ArraySink<'p>,
}

impl<'p> SaveArrayScope for JsonSaveArray<'p> {
    type Object<'a> = JsonSaveObject<'a> where Self: 'a;
    type Array<'a> = JsonSaveArray<'a> where Self: 'a;
    type Binary<'a> = NoBinaryScope where Self: 'a;

    fn write_scalar(&mut self, _ctx: &mut SerializationContext, value: Scalar) -> Result<(), ArchiveError> {
        self.items.push(scalar_to_json(value));
        Ok(())
    }

    fn open_nested_object(&mut self, _ctx: &mut SerializationContext, _hint_size: usize) -> Result<Self::Object<'_>, ArchiveError> {
        Ok(JsonSaveObject { map: Map::new(), sink: ObjectSink::ArrayElement { parent: &mut self.items } })
    }

    fn open_nested_array(&mut self, _ctx: &mut SerializationContext, hint_size: usize) -> Result<Self::Array<'_>, ArchiveError> {
        Ok(JsonSaveArray {
            items: Vec::with_capacity(hint_size),
            sink: ArraySink::ArrayElement { parent: &mut self.items },
        })
    }

    fn close(self, _ctx: &mut SerializationContext) -> Result<(), ArchiveError> {
        let value = Value::Array(self.items);
        match self.sink {
            ArraySink::Root(root) => root.value = Some(value),
            ArraySink::ObjectField { parent, key } => {
                parent.insert(key, value);
            }
            ArraySink::ArrayElement { parent } => parent.push(value),
        }
        Ok(())
    }
}

pub struct JsonLoadRoot {
    value: Value,
}

impl LoadRoot for JsonLoadRoot {
    type Object = JsonLoadObject;
    type Array = JsonLoadArray;
    type Binary = NoBinaryScope;

    fn open_object(&mut self, ctx: &mut SerializationContext) -> Result<Self::Object, ArchiveError> {
        match &self.value {
            Value::Object(map) => Ok(JsonLoadObject { map: map.clone(), visited: Default::default() }),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected object, found {}", kind_name(other)))),
        }
    }

    fn open_array(&mut self, ctx: &mut SerializationContext) -> Result<Self::Array, ArchiveError> {
        match &self.value {
            Value::Array(items) => Ok(JsonLoadArray { items: items.clone(), cursor: 0 }),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected array, found {}", kind_name(other)))),
        }
    }

    fn read_scalar(&mut self, ctx: &mut SerializationContext) -> Result<Scalar, ArchiveError> {
        json_to_scalar(ctx, &self.value)
    }
}

pub struct JsonLoadObject {
    map: Map<String, Value>,
    visited: std::collections::HashSet<String>,
}

impl LoadObjectScope for JsonLoadObject {
    type Object = JsonLoadObject;
    type Array = JsonLoadArray;
    type Binary = NoBinaryScope;
    type Attribute = NoAttributeScope;

    fn contains_key(&self, key: &KeyType) -> bool {
        self.map.contains_key(key)
    }

    fn read_scalar(&mut self, ctx: &mut SerializationContext, key: &KeyType) -> Result<Option<Scalar>, ArchiveError> {
        self.visited.insert(key.clone());
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => json_to_scalar(ctx, value).map(Some),
        }
    }

    fn open_nested_object(&mut self, ctx: &mut SerializationContext, key: &KeyType) -> Result<Option<Self::Object>, ArchiveError> {
        self.visited.insert(key.clone());
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(JsonLoadObject { map: map.clone(), visited: Default::default() })),
            Some(other) => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected object, found {}", kind_name(other)))),
        }
    }

    fn open_nested_array(&mut self, ctx: &mut SerializationContext, key: &KeyType) -> Result<Option<Self::Array>, ArchiveError> {
        self.visited.insert(key.clone());
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(JsonLoadArray { items: items.clone(), cursor: 0 })),
            Some(other) => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected array, found {}", kind_name(other)))),
        }
    }

    fn unvisited_keys(&self) -> Vec<KeyType> {
        self.map.keys().filter(|k| !self.visited.contains(*k)).cloned().collect()
    }
}

pub struct JsonLoadArray {
    items: Vec<Value>,
    cursor: usize,
}

impl LoadArrayScope for JsonLoadArray {
    type Object = JsonLoadObject;
    type Array = JsonLoadArray;
    type Binary = NoBinaryScope;

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }

    fn is_at_end(&self) -> bool {
        self.cursor >= self.items.len()
    }

    fn read_scalar(&mut self, ctx: &mut SerializationContext) -> Result<Scalar, ArchiveError> {
        let value = self.items.get(self.cursor).ok_or_else(|| ArchiveError::OutOfRange { path: ctx.current_path() })?;
        let scalar = json_to_scalar(ctx, value)?;
        self.cursor += 1;
        Ok(scalar)
    }

    fn open_nested_object(&mut self, ctx: &mut SerializationContext) -> Result<Self::Object, ArchiveError> {
        let value = self.items.get(self.cursor).ok_or_else(|| ArchiveError::OutOfRange { path: ctx.current_path() })?;
        let result = match value {
            Value::Object(map) => Ok(JsonLoadObject { map: map.clone(), visited: Default::default() }),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected object, found {}", kind_name(other)))),
        };
        self.cursor += 1;
        result
    }

    fn open_nested_array(&mut self, ctx: &mut SerializationContext) -> Result<Self::Array, ArchiveError> {
        let value = self.items.get(self.cursor).ok_or_else(|| ArchiveError::OutOfRange { path: ctx.current_path() })?;
        let result = match value {
            Value::Array(items) => Ok(JsonLoadArray { items: items.clone(), cursor: 0 }),
            other => Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected array, found {}", kind_name(other)))),
        };
        self.cursor += 1;
        result
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
    fn compact_roundtrip_matches_scenario_s1() {
        let point = Point { x: -7, y: 42 };
        let options = SerializationOptions::default();
        let bytes = save_object::<JsonFormat, _>(&point, &options).unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), r#"{"x":-7,"y":42}"#);

        let loaded: Point = load_object::<JsonFormat, _>(&bytes, &options).unwrap();
        assert_eq!(loaded, point);
    }

    #[test]
    fn pretty_print_uses_two_space_indent() {
        let point = Point { x: 1, y: 2 };
        let options = SerializationOptions::builder()
            .format_options(archival_core::FormatOptions { enable_format: true, padding_char: ' ', padding_char_num: 2 })
            .build();
        let mut root = JsonFormat::new_save_root(&options);
        let mut ctx = SerializationContext::new(&options);
        let mut object = root.open_object(&mut ctx, 2).unwrap();
        SaveObjectScope::write_scalar(&mut object, &mut ctx, &"x".to_owned(), Scalar::I64(point.x)).unwrap();
        SaveObjectScope::write_scalar(&mut object, &mut ctx, &"y".to_owned(), Scalar::I64(point.y)).unwrap();
        object.close(&mut ctx).unwrap();
        let bytes = render(&root.value.unwrap(), &options).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("{\n  \"x\": 1,\n  \"y\": 2\n}"));
    }

    #[test]
    fn pretty_print_reaches_through_the_public_save_object_entry_point() {
        // Regression: finish_save used to ignore the caller's options and
        // always render compact, so format_options was unreachable via
        // save_object/save_object_to_file. Scenario S2 from spec.md §7.
        let point = Point { x: -7, y: 42 };
        let options = SerializationOptions::builder()
            .format_options(archival_core::FormatOptions { enable_format: true, padding_char: ' ', padding_char_num: 2 })
            .build();
        let bytes = archival_core::save_object::<JsonFormat, _>(&point, &options).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "{\n  \"x\": -7,\n  \"y\": 42\n}");
    }

    #[test]
    fn missing_required_field_is_mismatched_types() {
        let options = SerializationOptions::default();
        let result = load_object::<JsonFormat, Point>(br#"{"x":1}"#, &options);
        assert!(matches!(result, Err(ArchiveError::MismatchedTypes { .. })));
    }

    #[test]
    fn bare_scalar_round_trips_at_the_document_root() {
        let options = SerializationOptions::default();
        let bytes = save_object::<JsonFormat, i64>(&42, &options).unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), "42");
        let loaded: i64 = load_object::<JsonFormat, _>(&bytes, &options).unwrap();
        assert_eq!(loaded, 42);

        let bytes = save_object::<JsonFormat, String>(&"hello".to_owned(), &options).unwrap();
        let loaded: String = load_object::<JsonFormat, _>(&bytes, &options).unwrap();
        assert_eq!(loaded, "hello");
    }

    #[test]
    fn stream_round_trips_through_utf16_le_with_bom() {
        let options = SerializationOptions::builder()
            .stream_options(StreamOptions { encoding: StreamEncoding::Utf16Le, write_bom: true })
            .build();
        let point = Point { x: -7, y: 42 };
        let mut buffer = Vec::new();
        save_object_to_stream::<JsonFormat, _, _>(&point, &mut buffer, &options).unwrap();
        assert_eq!(&buffer[..2], &[0xFF, 0xFE], "expected a UTF-16LE BOM");

        let loaded: Point = load_object_from_stream::<JsonFormat, _, _>(&mut buffer.as_slice(), &options).unwrap();
        assert_eq!(loaded, point);
    }

    #[test]
    fn utf8_bom_is_written_and_stripped_on_reload() {
        let options = SerializationOptions::builder()
            .stream_options(StreamOptions { encoding: StreamEncoding::Utf8, write_bom: true })
            .build();
        let point = Point { x: 1, y: 2 };
        let mut buffer = Vec::new();
        save_object_to_stream::<JsonFormat, _, _>(&point, &mut buffer, &options).unwrap();
        assert_eq!(&buffer[..3], &[0xEF, 0xBB, 0xBF]);

        let loaded: Point = load_object_from_stream::<JsonFormat, _, _>(&mut buffer.as_slice(), &options).unwrap();
        assert_eq!(loaded, point);
    }

    #[test]
    fn null_field_loads_as_absent() {
        let options = SerializationOptions::default();
        #[derive(Archival, Debug)]
        struct Nullable {
            #[archival(default)]
            maybe: Option<i64>,
        }
        let loaded: Nullable = load_object::<JsonFormat, Nullable>(br#"{"maybe":null}"#, &options).unwrap();
        assert_eq!(loaded.maybe, None);
    }
}
