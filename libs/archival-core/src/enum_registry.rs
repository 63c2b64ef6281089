//! Enum string binding (spec §4.6): maps enum variants to the names used on
//! the wire, independent of the derived `Debug`/variant identifier.
//!
//! The original registers this mapping via a static initializer that runs
//! before `main`. That relies on global mutable state and link-time
//! ordering guarantees C++ gives you and Rust does not, so this crate makes
//! registration an explicit, local call: `register_enum!` builds a
//! `&'static` table the first time it's evaluated in a given call path,
//! with no cross-translation-unit ordering to reason about.

use crate::containers::StringifiableKey;
use crate::context::SerializationContext;
use crate::convert::to_string;
use crate::dispatch::{LoadValue, SaveValue};
use crate::error::ArchiveError;
use crate::options::MismatchedTypesPolicy;
use crate::scope::{KeyType, LoadObjectScope, SaveObjectScope, Scalar};

/// Implemented for an enum's generated binding table. Produced by
/// [`register_enum!`]; not meant to be implemented by hand.
pub trait EnumBinding: Sized + Clone + PartialEq + 'static {
    /// `(variant, wire name)` pairs, in declaration order.
    const BINDINGS: &'static [(Self, &'static str)];

    fn to_wire_name(&self) -> &'static str {
        Self::BINDINGS
            .iter()
            .find(|(variant, _)| variant == self)
            .map(|(_, name)| *name)
            .expect("every enum variant must appear in its registration table")
    }

    /// Case-insensitive lookup by wire name, matching the original's
    /// lookup behavior for string-keyed enum members.
    fn from_wire_name(name: &str) -> Option<Self> {
        Self::BINDINGS
            .iter()
            .find(|(_, candidate)| candidate.eq_ignore_ascii_case(name))
            .map(|(variant, _)| variant.clone())
    }

    fn from_wire_name_or_err(type_name: &'static str, name: &str) -> Result<Self, ArchiveError> {
        Self::from_wire_name(name).ok_or_else(|| ArchiveError::unregistered_enum(type_name, name))
    }
}

/// Declares the wire-name table for an enum and implements [`EnumBinding`]
/// (and, as a byproduct, [`crate::containers::StringifiableKey`]) for it.
///
/// ```ignore
/// #[derive(Clone, PartialEq, Debug)]
/// enum Color { Red, Green, Blue }
///
/// register_enum! {
///     Color {
///         Color::Red => "red",
///         Color::Green => "green",
///         Color::Blue => "blue",
///     }
/// }
/// ```
///
/// `StringifiableKey` is emitted here, per invocation, rather than through a
/// single blanket `impl<E: EnumBinding> StringifiableKey for E`: `EnumBinding`
/// is a public trait, so rustc's overlap check can't rule out some other type
/// in this crate implementing both it and `StringifiableKey` directly, and a
/// blanket impl here would conflict with that. Emitting the impl per enum
/// sidesteps the question entirely.
#[macro_export]
macro_rules! register_enum {
    ($ty:ty { $($variant:expr => $name:literal),+ $(,)? }) => {
        impl $crate::enum_registry::EnumBinding for $ty {
            const BINDINGS: &'static [(Self, &'static str)] = &[
                $(($variant, $name)),+
            ];
        }

        impl $crate::containers::StringifiableKey for $ty {
            fn to_key_string(&self) -> String {
                $crate::enum_registry::EnumBinding::to_wire_name(self).to_owned()
            }

            fn from_key_string(
                ctx: &mut $crate::context::SerializationContext,
                key: &str,
            ) -> Result<Option<Self>, $crate::error::ArchiveError> {
                match <Self as $crate::enum_registry::EnumBinding>::from_wire_name(key) {
                    Some(variant) => Ok(Some(variant)),
                    None => match ctx.options().mismatched_types_policy {
                        $crate::options::MismatchedTypesPolicy::ThrowError => {
                            Err($crate::error::ArchiveError::unregistered_enum(stringify!($ty), key))
                        }
                        $crate::options::MismatchedTypesPolicy::Skip => Ok(None),
                    },
                }
            }
        }
    };
}

/// Wraps a registered enum so it can be saved/loaded as its wire-name string,
/// the same way the original writes a bound enum member as its string form
/// rather than its underlying integer value. Not a blanket impl directly over
/// `E: EnumBinding` for the same overlap reason described on
/// [`register_enum!`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumField<E>(pub E);

impl<E: EnumBinding> SaveValue for EnumField<E> {
    fn save<O: SaveObjectScope>(&self, ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<(), ArchiveError> {
        scope.write_scalar(ctx, key, Scalar::String(self.0.to_wire_name().to_owned()))
    }
}

impl<E: EnumBinding> LoadValue for EnumField<E> {
    fn load<O: LoadObjectScope>(ctx: &mut SerializationContext, scope: &mut O, key: &KeyType) -> Result<Option<Self>, ArchiveError> {
        let Some(scalar) = scope.read_scalar(ctx, key)? else {
            return Ok(None);
        };
        let name = to_string(&scalar);
        match E::from_wire_name(&name) {
            Some(variant) => Ok(Some(EnumField(variant))),
            None => match ctx.options().mismatched_types_policy {
                MismatchedTypesPolicy::ThrowError => {
                    Err(ArchiveError::unregistered_enum(std::any::type_name::<E>(), name))
                }
                MismatchedTypesPolicy::Skip => Ok(None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    enum Color {
        Red,
        Green,
        Blue,
    }

    register_enum! {
        Color {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
        }
    }

    #[test]
    fn round_trips_through_wire_name() {
        assert_eq!(Color::Red.to_wire_name(), "red");
        assert_eq!(Color::from_wire_name("GREEN"), Some(Color::Green));
    }

    #[test]
    fn unregistered_name_is_distinct_error() {
        let result = Color::from_wire_name_or_err("Color", "purple");
        assert!(matches!(result, Err(ArchiveError::UnregisteredEnum { .. })));
    }
}
