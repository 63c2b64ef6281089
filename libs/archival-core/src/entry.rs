//! Top-level entry points: `load_object`/`save_object` and their file/stream
//! overloads (spec §6, §7).

use std::fs::OpenOptions;
use std::io::{Read as IoRead, Write as IoWrite};
use std::path::Path;

use crate::context::SerializationContext;
use crate::convert::{self, Converted};
use crate::error::ArchiveError;
use crate::options::{SerializationOptions, StreamEncoding};
use crate::scope::{LoadRoot, Scalar, SaveRoot};

/// Implemented once per format backend: produces the root scopes that
/// drive a save or load of an in-memory byte buffer. Mirrors the role the
/// original's format plugin boundary plays, minus the dynamic-loading
/// machinery — a backend here is just another crate, linked in normally.
pub trait Format {
    type SaveRoot: SaveRoot;
    type LoadRoot: LoadRoot;

    const NAME: &'static str;
    /// Whether this backend's wire bytes are text (so [`StreamEncoding`]
    /// transcoding and a BOM make sense on the stream/file path). `false`
    /// for a binary format like MsgPack, which has no notion of UTF-16/32
    /// and rejects any `stream_options.encoding` other than `Utf8`.
    const IS_TEXT: bool = true;

    /// Begins a save into an in-memory buffer.
    fn new_save_root(options: &SerializationOptions) -> Self::SaveRoot;
    /// Finishes a save, handing back the serialized bytes. Takes the same
    /// options the root was built with, so `format_options`/`stream_options`
    /// reach rendering even though the root itself may not have stored them.
    fn finish_save(root: Self::SaveRoot, options: &SerializationOptions) -> Result<Vec<u8>, ArchiveError>;

    /// Begins a load from an in-memory buffer.
    fn new_load_root(input: &[u8], options: &SerializationOptions) -> Result<Self::LoadRoot, ArchiveError>;
}

/// A type whose top-level value is an object (the common case: structs
/// bind to `SaveValue`/`LoadValue` through a field key, but the document
/// root has no key of its own).
pub trait SaveRootValue {
    fn save_root<R: SaveRoot>(&self, ctx: &mut SerializationContext, root: &mut R) -> Result<(), ArchiveError>;
}

pub trait LoadRootValue: Sized {
    fn load_root<R: LoadRoot>(ctx: &mut SerializationContext, root: &mut R) -> Result<Self, ArchiveError>;
}

/// Saves `value` to an in-memory byte buffer using format `F`.
pub fn save_object<F, T>(value: &T, options: &SerializationOptions) -> Result<Vec<u8>, ArchiveError>
where
    F: Format,
    T: SaveRootValue,
{
    let mut root = F::new_save_root(options);
    let mut ctx = SerializationContext::new(options);
    value.save_root(&mut ctx, &mut root)?;
    ctx.finalize()?;
    F::finish_save(root, options)
}

/// Loads a `T` from an in-memory byte buffer using format `F`.
pub fn load_object<F, T>(input: &[u8], options: &SerializationOptions) -> Result<T, ArchiveError>
where
    F: Format,
    T: LoadRootValue,
{
    let mut ctx = SerializationContext::new(options);
    let mut root = F::new_load_root(input, options)?;
    let value = T::load_root(&mut ctx, &mut root)?;
    ctx.finalize()?;
    Ok(value)
}

/// Saves `value` to any [`std::io::Write`] stream, honoring
/// `options.stream_options` (spec §4.3, §4.4): the rendered bytes are
/// transcoded to the requested `StreamEncoding` and prefixed with a BOM if
/// `write_bom` is set. Backends that aren't text (`Format::IS_TEXT == false`)
/// reject any encoding but `Utf8` with `UnsupportedEncoding`.
pub fn save_object_to_stream<F, T, W>(value: &T, writer: &mut W, options: &SerializationOptions) -> Result<(), ArchiveError>
where
    F: Format,
    T: SaveRootValue,
    W: IoWrite,
{
    let bytes = save_object::<F, T>(value, options)?;
    let encoded = encode_stream_bytes(bytes, F::IS_TEXT, options)?;
    writer.write_all(&encoded)?;
    Ok(())
}

/// Loads a `T` from any [`std::io::Read`] stream, buffering it fully first
/// — none of the backends in this workspace stream-parse incrementally.
/// The inverse of [`save_object_to_stream`]'s encoding/BOM handling.
pub fn load_object_from_stream<F, T, R>(reader: &mut R, options: &SerializationOptions) -> Result<T, ArchiveError>
where
    F: Format,
    T: LoadRootValue,
    R: IoRead,
{
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    let decoded = decode_stream_bytes(&buffer, F::IS_TEXT, options)?;
    load_object::<F, T>(&decoded, options)
}

/// Detects a BOM at the start of `bytes`, returning the encoding it declares
/// and the byte length of the BOM itself. `None` if no recognized BOM is
/// present — the caller falls back to the configured
/// `stream_options.encoding` in that case.
fn sniff_bom(bytes: &[u8]) -> Option<(StreamEncoding, usize)> {
    if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        Some((StreamEncoding::Utf32Le, 4))
    } else if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        Some((StreamEncoding::Utf32Be, 4))
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        Some((StreamEncoding::Utf16Le, 2))
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        Some((StreamEncoding::Utf16Be, 2))
    } else if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some((StreamEncoding::Utf8, 3))
    } else {
        None
    }
}

/// Transcodes UTF-8 backend output to the configured `StreamEncoding`,
/// prefixing a BOM when requested. `is_text` gates whether any encoding
/// other than `Utf8` is even meaningful for this backend.
fn encode_stream_bytes(utf8_bytes: Vec<u8>, is_text: bool, options: &SerializationOptions) -> Result<Vec<u8>, ArchiveError> {
    let stream = &options.stream_options;
    if !is_text {
        if stream.encoding != StreamEncoding::Utf8 {
            return Err(ArchiveError::unsupported_encoding(format!("{:?}", stream.encoding)));
        }
        if stream.write_bom {
            return Err(ArchiveError::unsupported_encoding("UTF-8 BOM on a binary format"));
        }
        return Ok(utf8_bytes);
    }
    if stream.encoding == StreamEncoding::Utf8 {
        let mut out = Vec::with_capacity(utf8_bytes.len() + 3);
        if stream.write_bom {
            out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
        }
        out.extend_from_slice(&utf8_bytes);
        return Ok(out);
    }
    let text = std::str::from_utf8(&utf8_bytes)
        .map_err(|err| ArchiveError::Unknown(format!("backend produced non-UTF-8 bytes: {err}")))?;
    let mut out = Vec::new();
    match stream.encoding {
        StreamEncoding::Utf16Le | StreamEncoding::Utf16Be => {
            let big_endian = stream.encoding == StreamEncoding::Utf16Be;
            if stream.write_bom {
                push_u16(&mut out, 0xFEFF, big_endian);
            }
            for unit in text.encode_utf16() {
                push_u16(&mut out, unit, big_endian);
            }
        }
        StreamEncoding::Utf32Le | StreamEncoding::Utf32Be => {
            let big_endian = stream.encoding == StreamEncoding::Utf32Be;
            if stream.write_bom {
                push_u32(&mut out, 0xFEFF, big_endian);
            }
            for ch in text.chars() {
                push_u32(&mut out, ch as u32, big_endian);
            }
        }
        StreamEncoding::Utf8 => unreachable!("handled above"),
    }
    Ok(out)
}

/// Inverse of [`encode_stream_bytes`]: strips a BOM if present (trusting it
/// over the configured encoding, since it names what was actually written),
/// otherwise assumes `options.stream_options.encoding`, and returns UTF-8
/// bytes the backend's parser can consume.
fn decode_stream_bytes(bytes: &[u8], is_text: bool, options: &SerializationOptions) -> Result<Vec<u8>, ArchiveError> {
    if !is_text {
        if options.stream_options.encoding != StreamEncoding::Utf8 {
            return Err(ArchiveError::unsupported_encoding(format!("{:?}", options.stream_options.encoding)));
        }
        return Ok(bytes.to_vec());
    }
    let (encoding, skip) = match sniff_bom(bytes) {
        Some((enc, len)) => (enc, len),
        None => (options.stream_options.encoding, 0),
    };
    let body = &bytes[skip..];
    if encoding == StreamEncoding::Utf8 {
        return Ok(body.to_vec());
    }
    let text = match encoding {
        StreamEncoding::Utf16Le | StreamEncoding::Utf16Be => {
            if body.len() % 2 != 0 {
                return Err(ArchiveError::Parsing { offset: body.len(), message: format!("truncated {encoding:?} stream: trailing byte is not a full code unit") });
            }
            let big_endian = encoding == StreamEncoding::Utf16Be;
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|pair| if big_endian { u16::from_be_bytes([pair[0], pair[1]]) } else { u16::from_le_bytes([pair[0], pair[1]]) })
                .collect();
            char::decode_utf16(units)
                .collect::<Result<String, _>>()
                .map_err(|_| ArchiveError::unsupported_encoding(format!("{encoding:?} (unpaired surrogate)")))?
        }
        StreamEncoding::Utf32Le | StreamEncoding::Utf32Be => {
            if body.len() % 4 != 0 {
                return Err(ArchiveError::Parsing { offset: body.len(), message: format!("truncated {encoding:?} stream: trailing bytes are not a full code unit") });
            }
            let big_endian = encoding == StreamEncoding::Utf32Be;
            let mut text = String::new();
            for quad in body.chunks_exact(4) {
                let code = if big_endian {
                    u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]])
                } else {
                    u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]])
                };
                let ch = char::from_u32(code)
                    .ok_or_else(|| ArchiveError::unsupported_encoding(format!("{encoding:?} (invalid code point)")))?;
                text.push(ch);
            }
            text
        }
        StreamEncoding::Utf8 => unreachable!("handled above"),
    };
    Ok(text.into_bytes())
}

fn push_u16(out: &mut Vec<u8>, unit: u16, big_endian: bool) {
    out.extend_from_slice(&if big_endian { unit.to_be_bytes() } else { unit.to_le_bytes() });
}

fn push_u32(out: &mut Vec<u8>, unit: u32, big_endian: bool) {
    out.extend_from_slice(&if big_endian { unit.to_be_bytes() } else { unit.to_le_bytes() });
}

/// Saves `value` to a file at `path`. Files are opened binary; the encoding
/// is controlled by `options.stream_options`, same as [`save_object_to_stream`].
///
/// Refuses to overwrite an existing file unless `overwrite` is `true`,
/// matching the original's explicit opt-in to clobbering output — a
/// missing `overwrite` flag is a footgun, not a convenience default.
pub fn save_object_to_file<F, T>(
    value: &T,
    path: impl AsRef<Path>,
    overwrite: bool,
    options: &SerializationOptions,
) -> Result<(), ArchiveError>
where
    F: Format,
    T: SaveRootValue,
{
    let path = path.as_ref();
    let bytes = save_object::<F, T>(value, options)?;
    let encoded = encode_stream_bytes(bytes, F::IS_TEXT, options)?;
    let mut open_options = OpenOptions::new();
    open_options.write(true).truncate(true);
    if overwrite {
        open_options.create(true);
    } else {
        open_options.create_new(true);
    }
    let mut file = open_options.open(path).map_err(|e| ArchiveError::file_io(path, e))?;
    file.write_all(&encoded).map_err(|e| ArchiveError::file_io(path, e))
}

/// Loads a `T` from a file at `path`. Inverse of [`save_object_to_file`]'s
/// encoding/BOM handling.
pub fn load_object_from_file<F, T>(path: impl AsRef<Path>, options: &SerializationOptions) -> Result<T, ArchiveError>
where
    F: Format,
    T: LoadRootValue,
{
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| ArchiveError::file_io(path, e))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer).map_err(|e| ArchiveError::file_io(path, e))?;
    let decoded = decode_stream_bytes(&buffer, F::IS_TEXT, options)?;
    load_object::<F, T>(&decoded, options)
}

/// Lets a bare scalar stand as the whole document, for formats and types
/// where wrapping in an object would be pointless — e.g. saving a lone
/// `i64` counter to MsgPack, with no field name to hang it on. Most user
/// types go through the derive macro's `SaveRootValue`/`LoadRootValue`
/// impl instead, which writes struct fields into the root object scope.
macro_rules! impl_scalar_root {
    ($ty:ty, $to_scalar:expr, $from_scalar:path) => {
        impl SaveRootValue for $ty {
            fn save_root<R: SaveRoot>(&self, ctx: &mut SerializationContext, root: &mut R) -> Result<(), ArchiveError> {
                let f: fn(&$ty) -> Scalar = $to_scalar;
                root.write_scalar(ctx, f(self))
            }
        }

        impl LoadRootValue for $ty {
            fn load_root<R: LoadRoot>(ctx: &mut SerializationContext, root: &mut R) -> Result<Self, ArchiveError> {
                let scalar = root.read_scalar(ctx)?;
                match $from_scalar(ctx, &scalar)? {
                    Converted::Value(v) => Ok(v),
                    Converted::Skipped => Ok(Default::default()),
                }
            }
        }
    };
}

impl_scalar_root!(bool, |v| Scalar::Bool(*v), convert::to_bool);
impl_scalar_root!(i64, |v| Scalar::I64(*v), convert::to_signed);
impl_scalar_root!(i32, |v| Scalar::I64(*v as i64), convert::to_signed);
impl_scalar_root!(u64, |v| Scalar::U64(*v), convert::to_unsigned);
impl_scalar_root!(u32, |v| Scalar::U64(*v as u64), convert::to_unsigned);
impl_scalar_root!(f64, |v| Scalar::F64(*v), convert::to_f64);
impl_scalar_root!(f32, |v| Scalar::F64(*v as f64), convert::to_f32);

impl SaveRootValue for String {
    fn save_root<R: SaveRoot>(&self, ctx: &mut SerializationContext, root: &mut R) -> Result<(), ArchiveError> {
        root.write_scalar(ctx, Scalar::String(self.clone()))
    }
}

impl LoadRootValue for String {
    fn load_root<R: LoadRoot>(ctx: &mut SerializationContext, root: &mut R) -> Result<Self, ArchiveError> {
        let scalar = root.read_scalar(ctx)?;
        Ok(convert::to_string(&scalar))
    }
}
