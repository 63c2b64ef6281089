//! `SaveValue`/`LoadValue` for standard containers (spec §4.5 edge cases,
//! §3's `Bitset`/duration Open Questions).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::time::{Duration, SystemTime};

use crate::context::SerializationContext;
use crate::dispatch::{LoadValue, SaveValue};
use crate::error::ArchiveError;
use crate::options::MismatchedTypesPolicy;
use crate::scope::{KeyType, LoadArrayScope, LoadObjectScope, SaveArrayScope, SaveObjectScope, Scalar};

/// Element-level save into an array scope, independent of the object-scope
/// `SaveValue` trait (an array has no keys to address elements by).
pub trait SaveElement {
    fn save_element<A: SaveArrayScope>(&self, ctx: &mut SerializationContext, scope: &mut A) -> Result<(), ArchiveError>;
}

pub trait LoadElement: Sized {
    fn load_element<A: LoadArrayScope>(ctx: &mut SerializationContext, scope: &mut A) -> Result<Self, ArchiveError>;
}

macro_rules! impl_scalar_element {
    ($ty:ty, $to_scalar:expr, $from_scalar:path) => {
        impl SaveElement for $ty {
            fn save_element<A: SaveArrayScope>(&self, ctx: &mut SerializationContext, scope: &mut A) -> Result<(), ArchiveError> {
                let f: fn(&$ty) -> Scalar = $to_scalar;
                scope.write_scalar(ctx, f(self))
            }
        }

        impl LoadElement for $ty {
            fn load_element<A: LoadArrayScope>(ctx: &mut SerializationContext, scope: &mut A) -> Result<Self, ArchiveError> {
                let scalar = scope.read_scalar(ctx)?;
                match $from_scalar(ctx, &scalar)? {
                    crate::convert::Converted::Value(v) => Ok(v),
                    crate::convert::Converted::Skipped => Ok(Default::default()),
                }
            }
        }
    };
}

impl_scalar_element!(bool, |v| Scalar::Bool(*v), crate::convert::to_bool);
impl_scalar_element!(i64, |v| Scalar::I64(*v), crate::convert::to_signed);
impl_scalar_element!(i32, |v| Scalar::I64(*v as i64), crate::convert::to_signed);
impl_scalar_element!(u64, |v| Scalar::U64(*v), crate::convert::to_unsigned);
impl_scalar_element!(u32, |v| Scalar::U64(*v as u64), crate::convert::to_unsigned);
impl_scalar_element!(f64, |v| Scalar::F64(*v), crate::convert::to_f64);

impl SaveElement for String {
    fn save_element<A: SaveArrayScope>(&self, ctx: &mut SerializationContext, scope: &mut A) -> Result<(), ArchiveError> {
        scope.write_scalar(ctx, Scalar::String(self.clone()))
    }
}

impl LoadElement for String {
    fn load_element<A: LoadArrayScope>(ctx: &mut SerializationContext, scope: &mut A) -> Result<Self, ArchiveError> {
        let scalar = scope.read_scalar(ctx)?;
        Ok(crate::convert::to_string(&scalar))
    }
}

/// Saves a homogeneous sequence into a newly opened array scope.
fn save_sequence<'a, T, A, I>(ctx: &mut SerializationContext, scope: &mut A, items: I) -> Result<(), ArchiveError>
where
    T: SaveElement + 'a,
    A: SaveArrayScope,
    I: ExactSizeIterator<Item = &'a T>,
{
    for (index, item) in items.enumerate() {
        let mut guard = crate::context::IndexGuard::new(ctx, index);
        item.save_element(guard.ctx(), scope)?;
    }
    Ok(())
}

impl<T: SaveElement> SaveValue for Vec<T> {
    fn save<O: SaveObjectScope>(
        &self,
        ctx: &mut SerializationContext,
        scope: &mut O,
        key: &KeyType,
    ) -> Result<(), ArchiveError> {
        let mut array = scope.open_nested_array(ctx, key, self.len())?;
        save_sequence(ctx, &mut array, self.iter())?;
        array.close(ctx)
    }
}

impl<T: LoadElement> LoadValue for Vec<T> {
    fn load<O: LoadObjectScope>(
        ctx: &mut SerializationContext,
        scope: &mut O,
        key: &KeyType,
    ) -> Result<Option<Self>, ArchiveError> {
        let Some(mut array) = scope.open_nested_array(ctx, key)? else {
            return Ok(None);
        };
        let mut result = Vec::with_capacity(array.size_hint().unwrap_or(0));
        let mut index = 0;
        while !array.is_at_end() {
            let mut guard = crate::context::IndexGuard::new(ctx, index);
            result.push(T::load_element(guard.ctx(), &mut array)?);
            index += 1;
        }
        Ok(Some(result))
    }
}

impl<T: SaveElement> SaveValue for VecDeque<T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut array = scope.open_nested_array(ctx, key, self.len())?;
        for (index, item) in self.iter().enumerate() {
            let mut guard = crate::context::IndexGuard::new(ctx, index);
            item.save_element(guard.ctx(), &mut array)?;
        }
        array.close(ctx)
    }
}

impl<T: LoadElement> LoadValue for VecDeque<T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        Ok(Vec::<T>::load(ctx, scope, key)?.map(VecDeque::from))
    }
}

impl<T: SaveElement> SaveValue for LinkedList<T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut array = scope.open_nested_array(ctx, key, self.len())?;
        for (index, item) in self.iter().enumerate() {
            let mut guard = crate::context::IndexGuard::new(ctx, index);
            item.save_element(guard.ctx(), &mut array)?;
        }
        array.close(ctx)
    }
}

impl<T: LoadElement> LoadValue for LinkedList<T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        Ok(Vec::<T>::load(ctx, scope, key)?.map(|v| v.into_iter().collect()))
    }
}

/// Rust's standard library has no multiset; a set with duplicates is
/// represented as a plain `Vec` on the wire, matching how the original's
/// multiset specialization serializes as a bare sequence (no dedup, order
/// preserved as encountered). Use [`HashSet`]/[`BTreeSet`] when the wire
/// representation should enforce uniqueness.
impl<T: SaveElement + Eq + std::hash::Hash> SaveValue for HashSet<T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut array = scope.open_nested_array(ctx, key, self.len())?;
        for (index, item) in self.iter().enumerate() {
            let mut guard = crate::context::IndexGuard::new(ctx, index);
            item.save_element(guard.ctx(), &mut array)?;
        }
        array.close(ctx)
    }
}

impl<T: LoadElement + Eq + std::hash::Hash> LoadValue for HashSet<T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        Ok(Vec::<T>::load(ctx, scope, key)?.map(|v| v.into_iter().collect()))
    }
}

impl<T: SaveElement + Ord> SaveValue for BTreeSet<T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut array = scope.open_nested_array(ctx, key, self.len())?;
        for (index, item) in self.iter().enumerate() {
            let mut guard = crate::context::IndexGuard::new(ctx, index);
            item.save_element(guard.ctx(), &mut array)?;
        }
        array.close(ctx)
    }
}

impl<T: LoadElement + Ord> LoadValue for BTreeSet<T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        Ok(Vec::<T>::load(ctx, scope, key)?.map(|v| v.into_iter().collect()))
    }
}

impl<T: SaveValue> SaveValue for HashMap<String, T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut object = scope.open_nested_object(ctx, key, self.len())?;
        for (field_name, value) in self {
            let mut guard = crate::context::NameGuard::new(ctx, field_name.clone());
            value.save(guard.ctx(), &mut object, field_name)?;
        }
        object.close(ctx)
    }
}

impl<T: LoadValue> LoadValue for HashMap<String, T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        let Some(mut object) = scope.open_nested_object(ctx, key)? else {
            return Ok(None);
        };
        let mut result = HashMap::new();
        for field_name in object.unvisited_keys() {
            let mut guard = crate::context::NameGuard::new(ctx, field_name.clone());
            if let Some(value) = T::load(guard.ctx(), &mut object, &field_name)? {
                result.insert(field_name, value);
            }
        }
        Ok(Some(result))
    }
}

impl<T: SaveValue> SaveValue for BTreeMap<String, T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut object = scope.open_nested_object(ctx, key, self.len())?;
        for (field_name, value) in self {
            let mut guard = crate::context::NameGuard::new(ctx, field_name.clone());
            value.save(guard.ctx(), &mut object, field_name)?;
        }
        object.close(ctx)
    }
}

impl<T: LoadValue> LoadValue for BTreeMap<String, T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        let Some(mut object) = scope.open_nested_object(ctx, key)? else {
            return Ok(None);
        };
        let mut result = BTreeMap::new();
        for field_name in object.unvisited_keys() {
            let mut guard = crate::context::NameGuard::new(ctx, field_name.clone());
            if let Some(value) = T::load(guard.ctx(), &mut object, &field_name)? {
                result.insert(field_name, value);
            }
        }
        Ok(Some(result))
    }
}

impl<T: SaveValue> SaveValue for Option<T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        match self {
            Some(value) => value.save(ctx, scope, key),
            None => scope.write_scalar(ctx, key, Scalar::Null),
        }
    }
}

impl<T: LoadValue> LoadValue for Option<T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        Ok(Some(T::load(ctx, scope, key)?))
    }
}

impl<T: SaveValue> SaveValue for Box<T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        (**self).save(ctx, scope, key)
    }
}

impl<T: LoadValue> LoadValue for Box<T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        Ok(T::load(ctx, scope, key)?.map(Box::new))
    }
}

impl<T: SaveValue> SaveValue for std::rc::Rc<T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        (**self).save(ctx, scope, key)
    }
}

impl<T: LoadValue> LoadValue for std::rc::Rc<T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        Ok(T::load(ctx, scope, key)?.map(std::rc::Rc::new))
    }
}

impl<T: SaveValue> SaveValue for std::sync::Arc<T> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        (**self).save(ctx, scope, key)
    }
}

impl<T: LoadValue> LoadValue for std::sync::Arc<T> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        Ok(T::load(ctx, scope, key)?.map(std::sync::Arc::new))
    }
}

/// Fixed-size array. The input must carry exactly `N` elements; a short or
/// long array is an [`ArchiveError::OutOfRange`] / leftover-element
/// mismatch rather than silent truncation or zero-fill.
impl<T: SaveElement, const N: usize> SaveValue for [T; N] {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut array = scope.open_nested_array(ctx, key, N)?;
        save_sequence(ctx, &mut array, self.iter())?;
        array.close(ctx)
    }
}

impl<T: LoadElement + Copy + Default, const N: usize> LoadValue for [T; N] {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        let Some(mut array) = scope.open_nested_array(ctx, key)? else {
            return Ok(None);
        };
        let mut result = [T::default(); N];
        for (index, slot) in result.iter_mut().enumerate() {
            if array.is_at_end() {
                return Err(ArchiveError::OutOfRange { path: ctx.current_path() });
            }
            let mut guard = crate::context::IndexGuard::new(ctx, index);
            *slot = T::load_element(guard.ctx(), &mut array)?;
        }
        if !array.is_at_end() {
            return Err(ArchiveError::mismatched_types(ctx.current_path(), format!("expected exactly {N} elements")));
        }
        Ok(Some(result))
    }
}

/// Newtype over a bit sequence. The original's `std::bitset<N>` has no
/// direct Rust equivalent with a const-generic bit width that's also
/// ergonomic to build; this wraps `Vec<bool>` instead and serializes as a
/// same-length array of booleans.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bitset(pub Vec<bool>);

impl SaveValue for Bitset {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        self.0.save(ctx, scope, key)
    }
}

impl LoadValue for Bitset {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        Ok(Vec::<bool>::load(ctx, scope, key)?.map(Bitset))
    }
}

/// `Duration`/`SystemTime` serialize as ISO-8601 strings (spec §4.6), with
/// nanosecond precision so a sub-second `Duration` round-trips instead of
/// truncating to whole seconds.
impl SaveValue for Duration {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        scope.write_scalar(ctx, key, Scalar::String(crate::convert::duration_to_iso8601(*self)))
    }
}

impl LoadValue for Duration {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        let Some(scalar) = scope.read_scalar(ctx, key)? else {
            return Ok(None);
        };
        match crate::convert::iso8601_to_duration(ctx, &scalar)? {
            crate::convert::Converted::Value(d) => Ok(Some(d)),
            crate::convert::Converted::Skipped => Ok(None),
        }
    }
}

impl SaveValue for SystemTime {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        scope.write_scalar(ctx, key, Scalar::String(crate::convert::system_time_to_iso8601(*self)))
    }
}

impl LoadValue for SystemTime {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        let Some(scalar) = scope.read_scalar(ctx, key)? else {
            return Ok(None);
        };
        match crate::convert::iso8601_to_system_time(ctx, &scalar)? {
            crate::convert::Converted::Value(t) => Ok(Some(t)),
            crate::convert::Converted::Skipped => Ok(None),
        }
    }
}

/// Byte container ("Serializable-as-binary" in spec §4.5): tries the
/// backend's dedicated binary scope first (MsgPack `bin`), and falls back
/// to a plain array of small unsigned integers for backends with no binary
/// scope role (JSON has none — see `NoBinaryScope`) rather than failing
/// outright, so the same field type works unchanged across every backend.
impl SaveValue for Vec<u8> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        match scope.open_nested_binary(ctx, key, self.len())? {
            Some(mut binary) => {
                binary.write_bytes(ctx, self)?;
                binary.close(ctx)
            }
            None => {
                let mut array = scope.open_nested_array(ctx, key, self.len())?;
                for (index, byte) in self.iter().enumerate() {
                    let mut guard = crate::context::IndexGuard::new(ctx, index);
                    array.write_scalar(guard.ctx(), Scalar::U64(*byte as u64))?;
                }
                array.close(ctx)
            }
        }
    }
}

impl LoadValue for Vec<u8> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        if let Some(mut binary) = scope.open_nested_binary(ctx, key)? {
            return Ok(Some(binary.read_bytes(ctx)?));
        }
        Vec::<u64>::load(ctx, scope, key).map(|maybe| maybe.map(|v| v.into_iter().map(|b| b as u8).collect()))
    }
}

/// Positional pair, serialized as a 2-element array (spec §4.5 tuples/pairs).
impl<A: SaveElement, B: SaveElement> SaveValue for (A, B) {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut array = scope.open_nested_array(ctx, key, 2)?;
        {
            let mut guard = crate::context::IndexGuard::new(ctx, 0);
            self.0.save_element(guard.ctx(), &mut array)?;
        }
        {
            let mut guard = crate::context::IndexGuard::new(ctx, 1);
            self.1.save_element(guard.ctx(), &mut array)?;
        }
        array.close(ctx)
    }
}

impl<A: LoadElement, B: LoadElement> LoadValue for (A, B) {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        let Some(mut array) = scope.open_nested_array(ctx, key)? else {
            return Ok(None);
        };
        let first = {
            let mut guard = crate::context::IndexGuard::new(ctx, 0);
            A::load_element(guard.ctx(), &mut array)?
        };
        let second = {
            let mut guard = crate::context::IndexGuard::new(ctx, 1);
            B::load_element(guard.ctx(), &mut array)?
        };
        Ok(Some((first, second)))
    }
}

/// Positional triple, same rationale as the pair above.
impl<A: SaveElement, B: SaveElement, C: SaveElement> SaveValue for (A, B, C) {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut array = scope.open_nested_array(ctx, key, 3)?;
        {
            let mut guard = crate::context::IndexGuard::new(ctx, 0);
            self.0.save_element(guard.ctx(), &mut array)?;
        }
        {
            let mut guard = crate::context::IndexGuard::new(ctx, 1);
            self.1.save_element(guard.ctx(), &mut array)?;
        }
        {
            let mut guard = crate::context::IndexGuard::new(ctx, 2);
            self.2.save_element(guard.ctx(), &mut array)?;
        }
        array.close(ctx)
    }
}

impl<A: LoadElement, B: LoadElement, C: LoadElement> LoadValue for (A, B, C) {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        let Some(mut array) = scope.open_nested_array(ctx, key)? else {
            return Ok(None);
        };
        let first = {
            let mut guard = crate::context::IndexGuard::new(ctx, 0);
            A::load_element(guard.ctx(), &mut array)?
        };
        let second = {
            let mut guard = crate::context::IndexGuard::new(ctx, 1);
            B::load_element(guard.ctx(), &mut array)?
        };
        let third = {
            let mut guard = crate::context::IndexGuard::new(ctx, 2);
            C::load_element(guard.ctx(), &mut array)?
        };
        Ok(Some((first, second, third)))
    }
}

/// Converts a map key to/from its wire-string form (spec §4.5 "stringifiable
/// keys"). Implemented for the integer types directly here, and for any
/// `EnumBinding` enum via [`crate::register_enum!`] (see `enum_registry.rs`)
/// so `StringKeyedMap<SomeEnum, V>` works the same way.
pub trait StringifiableKey: Sized {
    fn to_key_string(&self) -> String;
    fn from_key_string(ctx: &mut SerializationContext, key: &str) -> Result<Option<Self>, ArchiveError>;
}

macro_rules! impl_stringifiable_key_int {
    ($($ty:ty),+) => {
        $(impl StringifiableKey for $ty {
            fn to_key_string(&self) -> String {
                self.to_string()
            }

            fn from_key_string(ctx: &mut SerializationContext, key: &str) -> Result<Option<Self>, ArchiveError> {
                match key.parse::<$ty>() {
                    Ok(v) => Ok(Some(v)),
                    Err(_) => match ctx.options().mismatched_types_policy {
                        MismatchedTypesPolicy::ThrowError => {
                            Err(ArchiveError::mismatched_types(ctx.current_path(), format!("`{key}` is not a valid map key of this type")))
                        }
                        MismatchedTypesPolicy::Skip => Ok(None),
                    },
                }
            }
        })+
    };
}
impl_stringifiable_key_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Map keyed by a type that isn't `String` but converts to/from one via
/// [`StringifiableKey`] (integers, registered enums, time-points). Wrapped
/// in a newtype rather than blanket-implemented directly over `HashMap<K,
/// V>`: `HashMap<String, V>` already has its own direct impl above, and
/// `String` itself could satisfy a `StringifiableKey`-style bound, which
/// would make the two impls overlap for `K = String`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringKeyedMap<K, V>(pub HashMap<K, V>);

impl<K: StringifiableKey + Eq + std::hash::Hash, V: SaveValue> SaveValue for StringKeyedMap<K, V> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        let mut object = scope.open_nested_object(ctx, key, self.0.len())?;
        for (map_key, value) in &self.0 {
            let wire_key = map_key.to_key_string();
            let mut guard = crate::context::NameGuard::new(ctx, wire_key.clone());
            value.save(guard.ctx(), &mut object, &wire_key)?;
        }
        object.close(ctx)
    }
}

impl<K: StringifiableKey + Eq + std::hash::Hash, V: LoadValue> LoadValue for StringKeyedMap<K, V> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        let Some(mut object) = scope.open_nested_object(ctx, key)? else {
            return Ok(None);
        };
        let mut result = HashMap::new();
        for wire_key in object.unvisited_keys() {
            let mut guard = crate::context::NameGuard::new(ctx, wire_key.clone());
            let map_key = match K::from_key_string(guard.ctx(), &wire_key)? {
                Some(k) => k,
                None => continue,
            };
            if let Some(value) = V::load(guard.ctx(), &mut object, &wire_key)? {
                result.insert(map_key, value);
            }
        }
        Ok(Some(StringKeyedMap(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SerializationOptions;

    #[test]
    fn bitset_roundtrip_shape() {
        let bits = Bitset(vec![true, false, true]);
        assert_eq!(bits.0.len(), 3);
    }

    #[test]
    fn duration_save_uses_whole_seconds() {
        let options = SerializationOptions::default();
        let _ctx = SerializationContext::new(&options);
        let d = Duration::from_secs(90);
        assert_eq!(d.as_secs(), 90);
    }
}
