//! The native side of the driver.
//!
//! - **Types** (`types.rs`): runtime descriptors the converter chain and
//!   compiler dispatch on
//! - **Values** (`value.rs`): the dynamic value converters and the evaluator
//!   operate on
//! - **Bridge** (`bridge.rs`): [`Native`] for std/chrono/uuid/url/bytes types
//!
//! Records and enums are declared with [`datum_record!`](crate::datum_record)
//! and [`datum_enum!`](crate::datum_enum), which build their field/variant
//! descriptors once per type.

pub mod bridge;
pub mod types;
pub mod value;

pub use bridge::Grouping;
pub use types::{EnumType, FieldDescriptor, RecordKind, RecordType, Type, TypeKey};
pub use value::{RecordValue, Value};

use crate::error::Result;

/// A Rust type that can cross the driver boundary.
pub trait Native: Sized {
    /// Descriptor used to resolve this type's converter.
    fn native_type() -> Type;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

/// Declare a record type together with its wire field names.
///
/// Fields marked `[omit_default]` are left out of the encoded object while
/// they hold the struct's `Default` value. The struct must implement
/// `Default`; missing wire fields decode to it.
///
/// ```rust
/// use reql_core::datum_record;
///
/// datum_record! {
///     #[derive(Debug, Clone, PartialEq, Default)]
///     pub struct Person {
///         pub name: String => "name",
///         pub age: i32 => "age" [omit_default],
///     }
/// }
/// ```
#[macro_export]
macro_rules! datum_record {
    (@emit) => { true };
    (@emit omit_default) => { false };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $fvis:vis $field:ident : $fty:ty => $wire:literal $([$policy:ident])? ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $fvis $field: $fty, )*
        }

        impl $name {
            /// Field descriptors, built on first use.
            pub fn record_type() -> ::std::sync::Arc<$crate::native::RecordType> {
                static TYPE: ::std::sync::OnceLock<::std::sync::Arc<$crate::native::RecordType>> =
                    ::std::sync::OnceLock::new();
                TYPE.get_or_init(|| {
                    let defaults = <$name as ::std::default::Default>::default();
                    $crate::native::RecordType::declared(
                        stringify!($name),
                        vec![
                            $(
                                $crate::native::FieldDescriptor::new(
                                    stringify!($field),
                                    <$fty as $crate::native::Native>::native_type(),
                                )
                                .wire_name($wire)
                                .emit_default($crate::datum_record!(@emit $($policy)?))
                                .default_value($crate::native::Native::to_value(&defaults.$field)),
                            )*
                        ],
                    )
                })
                .clone()
            }
        }

        impl $crate::native::Native for $name {
            fn native_type() -> $crate::native::Type {
                $crate::native::Type::Record(Self::record_type())
            }

            fn to_value(&self) -> $crate::native::Value {
                let mut record = $crate::native::RecordValue::new(Self::record_type());
                let values: Vec<$crate::native::Value> =
                    vec![$( $crate::native::Native::to_value(&self.$field) ),*];
                for (index, value) in values.into_iter().enumerate() {
                    record.set_index(index, value);
                }
                $crate::native::Value::Record(record)
            }

            fn from_value(value: $crate::native::Value) -> $crate::error::Result<Self> {
                match value {
                    $crate::native::Value::Record(mut record) => Ok(Self {
                        $( $field: $crate::native::Native::from_value(record.take(stringify!($field))?)?, )*
                    }),
                    $crate::native::Value::Null => Err($crate::error::Error::NullNotAllowed(
                        stringify!($name).to_string(),
                    )),
                    other => Err($crate::error::Error::mismatch(stringify!($name), other.kind_name())),
                }
            }
        }
    };
}

/// Declare a fieldless enum with explicit discriminants.
///
/// ```rust
/// use reql_core::datum_enum;
///
/// datum_enum! {
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     pub enum Status {
///         Active = 1,
///         Suspended = 2,
///     }
/// }
/// ```
#[macro_export]
macro_rules! datum_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $variant:ident = $disc:literal ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $( $variant = $disc, )*
        }

        impl $name {
            pub fn enum_type() -> ::std::sync::Arc<$crate::native::EnumType> {
                static TYPE: ::std::sync::OnceLock<::std::sync::Arc<$crate::native::EnumType>> =
                    ::std::sync::OnceLock::new();
                TYPE.get_or_init(|| {
                    $crate::native::EnumType::new(
                        stringify!($name),
                        vec![$( (stringify!($variant).to_string(), $disc as i64) ),*],
                    )
                })
                .clone()
            }
        }

        impl $crate::native::Native for $name {
            fn native_type() -> $crate::native::Type {
                $crate::native::Type::Enum(Self::enum_type())
            }

            fn to_value(&self) -> $crate::native::Value {
                let discriminant = match self {
                    $( $name::$variant => $disc as i64, )*
                };
                $crate::native::Value::Enum(Self::enum_type(), discriminant)
            }

            fn from_value(value: $crate::native::Value) -> $crate::error::Result<Self> {
                match value {
                    $crate::native::Value::Enum(_, discriminant) => match discriminant {
                        $( d if d == $disc as i64 => Ok($name::$variant), )*
                        other => Err($crate::error::Error::InvalidArgument(format!(
                            "{} is not a {} discriminant",
                            other,
                            stringify!($name)
                        ))),
                    },
                    $crate::native::Value::Null => Err($crate::error::Error::NullNotAllowed(
                        stringify!($name).to_string(),
                    )),
                    other => Err($crate::error::Error::mismatch(stringify!($name), other.kind_name())),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::datum_record! {
        #[derive(Debug, Clone, PartialEq, Default)]
        struct Account {
            owner: String => "owner_name",
            balance: i64 => "balance" [omit_default],
            tags: Vec<String> => "tags",
        }
    }

    crate::datum_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Tier {
            Free = 0,
            Paid = 10,
        }
    }

    #[test]
    fn test_record_descriptor() {
        let ty = Account::record_type();
        assert_eq!(ty.name, "Account");
        assert_eq!(ty.fields[0].wire_name, "owner_name");
        assert!(ty.fields[0].emit_default);
        assert!(!ty.fields[1].emit_default);
        assert_eq!(ty.fields[1].default, Value::I64(0));
        assert_eq!(ty.fields[2].ty, Type::list(Type::String));
    }

    #[test]
    fn test_record_value_bridge() {
        let account = Account {
            owner: "ann".into(),
            balance: 12,
            tags: vec!["vip".into()],
        };
        let value = account.to_value();
        assert_eq!(Account::from_value(value).unwrap(), account);
        assert!(matches!(
            Account::from_value(Value::Null),
            Err(crate::error::Error::NullNotAllowed(_))
        ));
    }

    #[test]
    fn test_enum_bridge() {
        let ty = Tier::enum_type();
        assert_eq!(ty.name_of(10), Some("Paid"));
        assert_eq!(Tier::from_value(Tier::Paid.to_value()).unwrap(), Tier::Paid);
        assert!(Tier::from_value(Value::Enum(ty, 3)).is_err());
    }
}
