//! Immutable policy configuration for one serialization operation (spec §3, §4.3).

/// What to do when a loaded value's kind is incompatible with the target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MismatchedTypesPolicy {
    #[default]
    ThrowError,
    Skip,
}

/// What to do when a numeric value does not fit the target range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverflowNumberPolicy {
    #[default]
    ThrowError,
    Skip,
}

/// What to do on an invalid UTF sequence during encode/decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UtfEncodingErrorPolicy {
    #[default]
    ThrowError,
    Skip,
    WriteErrorMark,
}

/// Output stream encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StreamEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

/// Pretty-printing controls for text formats that support them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormatOptions {
    pub enable_format: bool,
    pub padding_char: char,
    pub padding_char_num: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { enable_format: false, padding_char: ' ', padding_char_num: 2 }
    }
}

/// Output stream encoding controls.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamOptions {
    pub encoding: StreamEncoding,
    pub write_bom: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self { encoding: StreamEncoding::Utf8, write_bom: false }
    }
}

/// The default marker substituted for an invalid UTF sequence under
/// `UtfEncodingErrorPolicy::WriteErrorMark`. A Unicode box-drawing glyph,
/// chosen so it can't be confused with a legitimately decoded character.
pub const DEFAULT_UTF_ERROR_MARK: char = '\u{25A1}';

/// Immutable policy bundle threaded through one load/save operation.
///
/// Built once (or taken as `&'static` / shared via `Arc` by the host) and
/// never mutated mid-operation — the mutable, per-operation state lives in
/// [`crate::context::SerializationContext`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerializationOptions {
    pub mismatched_types_policy: MismatchedTypesPolicy,
    pub overflow_number_policy: OverflowNumberPolicy,
    pub utf_encoding_error_policy: UtfEncodingErrorPolicy,
    /// Upper bound on accumulated validation errors before the operation
    /// aborts. `0` means unbounded.
    pub validation_max_errors: u32,
    pub format_options: FormatOptions,
    pub stream_options: StreamOptions,
    /// Marker substituted under `WriteErrorMark`. Defaults to
    /// [`DEFAULT_UTF_ERROR_MARK`].
    pub utf_error_mark: char,
}

impl Default for SerializationOptions {
    fn default() -> Self {
        Self {
            mismatched_types_policy: MismatchedTypesPolicy::default(),
            overflow_number_policy: OverflowNumberPolicy::default(),
            utf_encoding_error_policy: UtfEncodingErrorPolicy::default(),
            validation_max_errors: 0,
            format_options: FormatOptions::default(),
            stream_options: StreamOptions::default(),
            utf_error_mark: DEFAULT_UTF_ERROR_MARK,
        }
    }
}

impl SerializationOptions {
    pub fn builder() -> SerializationOptionsBuilder {
        SerializationOptionsBuilder::default()
    }
}

/// Low-ceremony builder, in the same spirit as the typed getters the
/// teacher's `ConfigValues` exposes: set only what differs from the default.
#[derive(Debug, Clone)]
pub struct SerializationOptionsBuilder {
    options: SerializationOptions,
}

impl Default for SerializationOptionsBuilder {
    fn default() -> Self {
        Self { options: SerializationOptions::default() }
    }
}

impl SerializationOptionsBuilder {
    pub fn mismatched_types_policy(mut self, policy: MismatchedTypesPolicy) -> Self {
        self.options.mismatched_types_policy = policy;
        self
    }

    pub fn overflow_number_policy(mut self, policy: OverflowNumberPolicy) -> Self {
        self.options.overflow_number_policy = policy;
        self
    }

    pub fn utf_encoding_error_policy(mut self, policy: UtfEncodingErrorPolicy) -> Self {
        self.options.utf_encoding_error_policy = policy;
        self
    }

    pub fn validation_max_errors(mut self, max: u32) -> Self {
        self.options.validation_max_errors = max;
        self
    }

    pub fn format_options(mut self, format_options: FormatOptions) -> Self {
        self.options.format_options = format_options;
        self
    }

    pub fn stream_options(mut self, stream_options: StreamOptions) -> Self {
        self.options.stream_options = stream_options;
        self
    }

    pub fn utf_error_mark(mut self, mark: char) -> Self {
        self.options.utf_error_mark = mark;
        self
    }

    pub fn build(self) -> SerializationOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policies_throw() {
        let options = SerializationOptions::default();
        assert_eq!(options.mismatched_types_policy, MismatchedTypesPolicy::ThrowError);
        assert_eq!(options.overflow_number_policy, OverflowNumberPolicy::ThrowError);
        assert_eq!(options.utf_encoding_error_policy, UtfEncodingErrorPolicy::ThrowError);
        assert_eq!(options.validation_max_errors, 0);
    }

    #[test]
    fn builder_overrides_only_what_is_set() {
        let options = SerializationOptions::builder()
            .mismatched_types_policy(MismatchedTypesPolicy::Skip)
            .validation_max_errors(5)
            .build();
        assert_eq!(options.mismatched_types_policy, MismatchedTypesPolicy::Skip);
        assert_eq!(options.validation_max_errors, 5);
        assert_eq!(options.overflow_number_policy, OverflowNumberPolicy::ThrowError);
    }
}
