//! Value dispatch, validators, refiners, and the `Binding` builder that
//! replaces the original's `archive << KeyValue(name, field, ...)` operator
//! chain (spec §4.4, §4.5).
//!
//! Rust has no operator overload that reads naturally for "serialize this
//! field under this name, with these checks." A fluent builder captures the
//! same pieces — name, field, validators, refiners — as explicit method
//! calls instead of operator chaining.

use crate::context::SerializationContext;
use crate::convert::{self, Converted};
use crate::error::ArchiveError;
use crate::scope::{KeyType, LoadObjectScope, SaveObjectScope, Scalar};

/// Implemented by any type that can be written into an object scope as one
/// field value. Blanket-implemented for the scalar primitives; containers
/// and user types implement it directly or via the derive macro.
pub trait SaveValue {
    fn save<O: SaveObjectScope>(
        &self,
        ctx: &mut SerializationContext,
        scope: &mut O,
        key: &KeyType,
    ) -> Result<(), ArchiveError>;
}

/// The load-direction counterpart of [`SaveValue`].
pub trait LoadValue: Sized {
    fn load<O: LoadObjectScope>(
        ctx: &mut SerializationContext,
        scope: &mut O,
        key: &KeyType,
    ) -> Result<Option<Self>, ArchiveError>;
}

macro_rules! impl_scalar_save {
    ($ty:ty, $variant:expr) => {
        impl SaveValue for $ty {
            fn save<O: SaveObjectScope>(
                &self,
                ctx: &mut SerializationContext,
                scope: &mut O,
                key: &KeyType,
            ) -> Result<(), ArchiveError> {
                scope.write_scalar(ctx, key, $variant(*self))
            }
        }
    };
}

impl_scalar_save!(bool, Scalar::Bool);
impl_scalar_save!(f64, Scalar::F64);

impl SaveValue for f32 {
    fn save<O: SaveObjectScope>(
        &self,
        ctx: &mut SerializationContext,
        scope: &mut O,
        key: &KeyType,
    ) -> Result<(), ArchiveError> {
        scope.write_scalar(ctx, key, Scalar::F64(*self as f64))
    }
}

macro_rules! impl_signed_save {
    ($($ty:ty),+) => {
        $(impl SaveValue for $ty {
            fn save<O: SaveObjectScope>(
                &self,
                ctx: &mut SerializationContext,
                scope: &mut O,
                key: &KeyType,
            ) -> Result<(), ArchiveError> {
                scope.write_scalar(ctx, key, Scalar::I64(*self as i64))
            }
        })+
    };
}
impl_signed_save!(i8, i16, i32, i64, isize);

macro_rules! impl_unsigned_save {
    ($($ty:ty),+) => {
        $(impl SaveValue for $ty {
            fn save<O: SaveObjectScope>(
                &self,
                ctx: &mut SerializationContext,
                scope: &mut O,
                key: &KeyType,
            ) -> Result<(), ArchiveError> {
                scope.write_scalar(ctx, key, Scalar::U64(*self as u64))
            }
        })+
    };
}
impl_unsigned_save!(u8, u16, u32, u64, usize);

impl SaveValue for String {
    fn save<O: SaveObjectScope>(
        &self,
        ctx: &mut SerializationContext,
        scope: &mut O,
        key: &KeyType,
    ) -> Result<(), ArchiveError> {
        scope.write_scalar(ctx, key, Scalar::String(self.clone()))
    }
}

impl SaveValue for &str {
    fn save<O: SaveObjectScope>(
        &self,
        ctx: &mut SerializationContext,
        scope: &mut O,
        key: &KeyType,
    ) -> Result<(), ArchiveError> {
        scope.write_scalar(ctx, key, Scalar::String((*self).to_owned()))
    }
}

macro_rules! impl_load_via_convert {
    ($ty:ty, $convert:path) => {
        impl LoadValue for $ty {
            fn load<O: LoadObjectScope>(
                ctx: &mut SerializationContext,
                scope: &mut O,
                key: &KeyType,
            ) -> Result<Option<Self>, ArchiveError> {
                match scope.read_scalar(ctx, key)? {
                    None => Ok(None),
                    Some(scalar) => match $convert(ctx, &scalar)? {
                        Converted::Value(v) => Ok(Some(v)),
                        Converted::Skipped => Ok(None),
                    },
                }
            }
        }
    };
}

impl_load_via_convert!(bool, convert::to_bool);
impl_load_via_convert!(f64, convert::to_f64);
impl_load_via_convert!(f32, convert::to_f32);
impl_load_via_convert!(i8, convert::to_signed);
impl_load_via_convert!(i16, convert::to_signed);
impl_load_via_convert!(i32, convert::to_signed);
impl_load_via_convert!(i64, convert::to_signed);
impl_load_via_convert!(isize, convert::to_signed);
impl_load_via_convert!(u8, convert::to_unsigned);
impl_load_via_convert!(u16, convert::to_unsigned);
impl_load_via_convert!(u32, convert::to_unsigned);
impl_load_via_convert!(u64, convert::to_unsigned);
impl_load_via_convert!(usize, convert::to_unsigned);

impl LoadValue for String {
    fn load<O: LoadObjectScope>(
        ctx: &mut SerializationContext,
        scope: &mut O,
        key: &KeyType,
    ) -> Result<Option<Self>, ArchiveError> {
        match scope.read_scalar(ctx, key)? {
            None => Ok(None),
            Some(scalar) => Ok(Some(convert::to_string(&scalar))),
        }
    }
}

/// Checks a loaded value's shape before it's committed to the target field.
/// Implementors report a human-readable failure; [`bind_load`] accumulates
/// it via [`SerializationContext::add_validation_error`] rather than
/// aborting the whole load immediately.
pub trait Validator<T: ?Sized> {
    /// `Some(message)` on failure, `None` on success.
    fn validate(&self, value: &T) -> Option<String>;
}

/// Requires the field to have been present in the input at all (distinct
/// from validating a present-but-empty value).
pub struct Required;

impl<T> Validator<Option<T>> for Required {
    fn validate(&self, value: &Option<T>) -> Option<String> {
        if value.is_none() {
            Some("value is required".to_owned())
        } else {
            None
        }
    }
}

/// Inclusive numeric range check.
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + std::fmt::Display> Validator<T> for Range<T> {
    fn validate(&self, value: &T) -> Option<String> {
        if *value < self.min || *value > self.max {
            Some(format!("value {value} is outside the range [{}, {}]", self.min, self.max))
        } else {
            None
        }
    }
}

/// Minimum length for a string or collection.
pub struct MinSize(pub usize);

impl Validator<String> for MinSize {
    fn validate(&self, value: &String) -> Option<String> {
        if value.chars().count() < self.0 {
            Some(format!("length must be at least {}", self.0))
        } else {
            None
        }
    }
}

impl<T> Validator<Vec<T>> for MinSize {
    fn validate(&self, value: &Vec<T>) -> Option<String> {
        if value.len() < self.0 {
            Some(format!("length must be at least {}", self.0))
        } else {
            None
        }
    }
}

/// Maximum length for a string or collection.
pub struct MaxSize(pub usize);

impl Validator<String> for MaxSize {
    fn validate(&self, value: &String) -> Option<String> {
        if value.chars().count() > self.0 {
            Some(format!("length must be at most {}", self.0))
        } else {
            None
        }
    }
}

impl<T> Validator<Vec<T>> for MaxSize {
    fn validate(&self, value: &Vec<T>) -> Option<String> {
        if value.len() > self.0 {
            Some(format!("length must be at most {}", self.0))
        } else {
            None
        }
    }
}

/// Rejects strings that don't contain exactly one `@` with non-empty sides.
/// Deliberately loose: a full RFC 5322 matcher belongs in application code,
/// not the core.
pub struct Email;

impl Validator<String> for Email {
    fn validate(&self, value: &String) -> Option<String> {
        match value.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => None,
            _ => Some("not a valid email address".to_owned()),
        }
    }
}

/// Rejects strings with non-digit characters after stripping a leading `+`.
pub struct PhoneNumber;

impl Validator<String> for PhoneNumber {
    fn validate(&self, value: &String) -> Option<String> {
        let digits = value.strip_prefix('+').unwrap_or(value);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            None
        } else {
            Some("not a valid phone number".to_owned())
        }
    }
}

/// Transforms a loaded value before it's validated and committed, or a
/// value about to be saved before it's written. Applied before validators
/// run, so a refiner can turn an otherwise-invalid value into a valid one
/// (e.g. trimming whitespace before a `MinSize` check).
pub trait Refiner<T> {
    fn refine(&self, value: T) -> T;
}

/// Substitutes a default when the input was absent, turning a missing
/// optional field into a present one before validation sees it.
pub struct Fallback<T>(pub T);

impl<T: Clone> Refiner<Option<T>> for Fallback<T> {
    fn refine(&self, value: Option<T>) -> Option<T> {
        Some(value.unwrap_or_else(|| self.0.clone()))
    }
}

pub struct TrimWhitespace;

impl Refiner<String> for TrimWhitespace {
    fn refine(&self, value: String) -> String {
        value.trim().to_owned()
    }
}

pub struct ToLowerCase;

impl Refiner<String> for ToLowerCase {
    fn refine(&self, value: String) -> String {
        value.to_lowercase()
    }
}

pub struct ToUpperCase;

impl Refiner<String> for ToUpperCase {
    fn refine(&self, value: String) -> String {
        value.to_uppercase()
    }
}

/// Fluent replacement for the original's `archive << KeyValue(name, field,
/// validators...)` chain. Built with [`crate::bind_save`]/[`crate::bind_load`]
/// or directly via [`Binding::new`], then consumed by `.finish_save(...)` /
/// `.finish_load(...)`.
pub struct Binding<'v, T> {
    key: KeyType,
    refiners: Vec<Box<dyn Fn(T) -> T + 'v>>,
    validators: Vec<Box<dyn Validator<T> + 'v>>,
}

impl<'v, T> Binding<'v, T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), refiners: Vec::new(), validators: Vec::new() }
    }

    pub fn refine(mut self, refiner: impl Refiner<T> + 'v) -> Self
    where
        T: 'v,
    {
        self.refiners.push(Box::new(move |v| refiner.refine(v)));
        self
    }

    pub fn validate(mut self, validator: impl Validator<T> + 'v) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    fn apply_refiners(&self, value: T) -> T {
        self.refiners.iter().fold(value, |v, refine| refine(v))
    }

    fn run_validators(&self, ctx: &mut SerializationContext, value: &T) -> Result<(), ArchiveError> {
        for validator in &self.validators {
            if let Some(message) = validator.validate(value) {
                ctx.add_validation_error(format!("`{}`: {message}", self.key))?;
            }
        }
        Ok(())
    }
}

/// Binds one field for save: applies refiners, then writes.
pub fn bind_save<T, O>(
    ctx: &mut SerializationContext,
    scope: &mut O,
    binding: Binding<T>,
    value: T,
) -> Result<(), ArchiveError>
where
    T: SaveValue,
    O: SaveObjectScope,
{
    let value = binding.apply_refiners(value);
    let mut guard = crate::context::NameGuard::new(ctx, binding.key.clone());
    value.save(guard.ctx(), scope, &binding.key)
}

/// Binds one field for load: reads, applies refiners, validates, and
/// returns the final value (or `None` if the field was absent and no
/// refiner supplied a fallback).
pub fn bind_load<T, O>(
    ctx: &mut SerializationContext,
    scope: &mut O,
    binding: Binding<Option<T>>,
) -> Result<Option<T>, ArchiveError>
where
    T: LoadValue,
    O: LoadObjectScope,
{
    let key = binding.key.clone();
    let loaded = {
        let mut guard = crate::context::NameGuard::new(ctx, key.clone());
        T::load(guard.ctx(), scope, &key)?
    };
    let refined = binding.apply_refiners(loaded);
    let mut guard = crate::context::NameGuard::new(ctx, key);
    binding.run_validators(guard.ctx(), &refined)?;
    Ok(refined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_validator_reports_out_of_bounds() {
        let validator = Range { min: 0, max: 10 };
        assert!(validator.validate(&5).is_none());
        assert!(validator.validate(&11).is_some());
    }

    #[test]
    fn email_validator_rejects_missing_at() {
        assert!(Email.validate(&"not-an-email".to_owned()).is_some());
        assert!(Email.validate(&"a@b.com".to_owned()).is_none());
    }

    #[test]
    fn fallback_refiner_substitutes_default() {
        let refiner = Fallback(42);
        assert_eq!(refiner.refine(None), Some(42));
        assert_eq!(refiner.refine(Some(7)), Some(7));
    }

    #[test]
    fn trim_whitespace_refiner() {
        assert_eq!(TrimWhitespace.refine("  hi  ".to_owned()), "hi");
    }
}
