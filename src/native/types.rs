//! Runtime descriptors for native types.
//!
//! Converter resolution and expression compilation are both type-directed,
//! so every native type that can cross the driver boundary is described by
//! a [`Type`]. Records and enums carry their declared shape; everything else
//! is structural.

use super::value::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A native type as seen by the converter chain and the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Char,
    String,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Uuid,
    Url,
    Binary,
    /// `DateTime<Utc>`
    DateTime,
    /// `DateTime<FixedOffset>`
    DateTimeOffset,
    /// `chrono::TimeDelta`
    Duration,
    Enum(Arc<EnumType>),
    Option(Box<Type>),
    List(Box<Type>),
    /// String-keyed map.
    Map(Box<Type>),
    Tuple(Vec<Type>),
    Grouping(Box<Type>, Box<Type>),
    Record(Arc<RecordType>),
    /// A value whose type is only known from the datum's shape.
    Dynamic,
}

/// The unbound ("generic definition") form of a [`Type`].
///
/// `List<i32>` and `List<String>` share `TypeKey::List`, so a single
/// registration keyed by `TypeKey` covers every instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Bool,
    Char,
    String,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Uuid,
    Url,
    Binary,
    DateTime,
    DateTimeOffset,
    Duration,
    Enum(String),
    Option,
    List,
    Map,
    Tuple(usize),
    Grouping,
    Record(String),
    Dynamic,
}

impl Type {
    pub fn option(inner: Type) -> Type {
        Type::Option(Box::new(inner))
    }

    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    pub fn map(value: Type) -> Type {
        Type::Map(Box::new(value))
    }

    pub fn grouping(key: Type, value: Type) -> Type {
        Type::Grouping(Box::new(key), Box::new(value))
    }

    pub fn key(&self) -> TypeKey {
        match self {
            Type::Bool => TypeKey::Bool,
            Type::Char => TypeKey::Char,
            Type::String => TypeKey::String,
            Type::I8 => TypeKey::I8,
            Type::I16 => TypeKey::I16,
            Type::I32 => TypeKey::I32,
            Type::I64 => TypeKey::I64,
            Type::U8 => TypeKey::U8,
            Type::U16 => TypeKey::U16,
            Type::U32 => TypeKey::U32,
            Type::U64 => TypeKey::U64,
            Type::F32 => TypeKey::F32,
            Type::F64 => TypeKey::F64,
            Type::Uuid => TypeKey::Uuid,
            Type::Url => TypeKey::Url,
            Type::Binary => TypeKey::Binary,
            Type::DateTime => TypeKey::DateTime,
            Type::DateTimeOffset => TypeKey::DateTimeOffset,
            Type::Duration => TypeKey::Duration,
            Type::Enum(e) => TypeKey::Enum(e.name.clone()),
            Type::Option(_) => TypeKey::Option,
            Type::List(_) => TypeKey::List,
            Type::Map(_) => TypeKey::Map,
            Type::Tuple(items) => TypeKey::Tuple(items.len()),
            Type::Grouping(..) => TypeKey::Grouping,
            Type::Record(r) => TypeKey::Record(r.name.clone()),
            Type::Dynamic => TypeKey::Dynamic,
        }
    }

    /// Inclusive integer bounds, `None` for non-integer types.
    pub fn integer_bounds(&self) -> Option<(i128, i128)> {
        match self {
            Type::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
            Type::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            Type::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            Type::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            Type::U8 => Some((0, u8::MAX as i128)),
            Type::U16 => Some((0, u16::MAX as i128)),
            Type::U32 => Some((0, u32::MAX as i128)),
            Type::U64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.integer_bounds().is_some()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Reference-like types whose converters map `Null` to absence.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            Type::Option(_)
                | Type::List(_)
                | Type::Map(_)
                | Type::Grouping(..)
                | Type::Record(_)
                | Type::Binary
                | Type::Dynamic
        )
    }

    /// Element type of a list, or inner type of an option.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::List(inner) | Type::Option(inner) | Type::Map(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Arc<RecordType>> {
        match self {
            Type::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Whether a value of `source` can be used where `self` is expected
    /// without changing its wire representation.
    pub fn is_assignable_from(&self, source: &Type) -> bool {
        if self == source || *self == Type::Dynamic {
            return true;
        }
        match (self, source) {
            (Type::Option(target), Type::Option(inner)) => target.is_assignable_from(inner),
            (Type::Option(target), other) => target.is_assignable_from(other),
            (Type::DateTimeOffset, Type::DateTime) => true,
            (Type::F64, Type::F32) => true,
            (target, source) if source.is_integer() => match target {
                Type::F32 => matches!(source, Type::I8 | Type::I16 | Type::U8 | Type::U16),
                Type::F64 => !matches!(source, Type::I64 | Type::U64),
                _ => match (target.integer_bounds(), source.integer_bounds()) {
                    (Some((tmin, tmax)), Some((smin, smax))) => tmin <= smin && smax <= tmax,
                    _ => false,
                },
            },
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::String => write!(f, "String"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U32 => write!(f, "u32"),
            Type::U64 => write!(f, "u64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Uuid => write!(f, "Uuid"),
            Type::Url => write!(f, "Url"),
            Type::Binary => write!(f, "Binary"),
            Type::DateTime => write!(f, "DateTime<Utc>"),
            Type::DateTimeOffset => write!(f, "DateTime<FixedOffset>"),
            Type::Duration => write!(f, "TimeDelta"),
            Type::Enum(e) => write!(f, "{}", e.name),
            Type::Option(inner) => write!(f, "Option<{}>", inner),
            Type::List(inner) => write!(f, "Vec<{}>", inner),
            Type::Map(inner) => write!(f, "BTreeMap<String, {}>", inner),
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Type::Grouping(k, v) => write!(f, "Grouping<{}, {}>", k, v),
            Type::Record(r) => write!(f, "{}", r.name),
            Type::Dynamic => write!(f, "Value"),
        }
    }
}

/// A declared enum: variant names and their discriminants.
#[derive(Debug)]
pub struct EnumType {
    pub name: String,
    pub variants: Vec<(String, i64)>,
}

impl EnumType {
    pub fn new<S: Into<String>>(name: S, variants: Vec<(String, i64)>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            variants,
        })
    }

    pub fn name_of(&self, discriminant: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, d)| *d == discriminant)
            .map(|(n, _)| n.as_str())
    }

    pub fn discriminant_of(&self, name: &str) -> Option<i64> {
        self.variants.iter().find(|(n, _)| n == name).map(|(_, d)| *d)
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EnumType {}

impl Hash for EnumType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Fields carry explicit wire names and emit policies.
    Declared,
    /// Fields travel under their member names and are always emitted.
    Anonymous,
}

/// One declared record field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Native member name.
    pub name: String,
    /// Key used in the Object datum.
    pub wire_name: String,
    pub ty: Type,
    /// When false the field is left out of the datum while it holds its default.
    pub emit_default: bool,
    pub default: Value,
}

impl FieldDescriptor {
    pub fn new<S: Into<String>>(name: S, ty: Type) -> Self {
        let name = name.into();
        let default = Value::default_for(&ty);
        Self {
            wire_name: name.clone(),
            name,
            ty,
            emit_default: true,
            default,
        }
    }

    pub fn wire_name<S: Into<String>>(mut self, wire_name: S) -> Self {
        self.wire_name = wire_name.into();
        self
    }

    pub fn emit_default(mut self, emit: bool) -> Self {
        self.emit_default = emit;
        self
    }

    pub fn omit_default(self) -> Self {
        self.emit_default(false)
    }

    pub fn default_value(mut self, default: Value) -> Self {
        self.default = default;
        self
    }
}

/// An ordered list of field descriptors, built once per type.
#[derive(Debug)]
pub struct RecordType {
    pub name: String,
    pub kind: RecordKind,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordType {
    pub fn declared<S: Into<String>>(name: S, fields: Vec<FieldDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind: RecordKind::Declared,
            fields,
        })
    }

    /// An anonymous record; its name is derived from its shape so that two
    /// constructions with the same members describe the same type.
    pub fn anonymous<S: Into<String>>(members: Vec<(S, Type)>) -> Arc<Self> {
        let fields: Vec<FieldDescriptor> = members
            .into_iter()
            .map(|(name, ty)| FieldDescriptor::new(name, ty))
            .collect();
        let shape = fields
            .iter()
            .map(|f| format!("{}: {}", f.name, f.ty))
            .collect::<Vec<_>>()
            .join(", ");
        Arc::new(Self {
            name: format!("{{{}}}", shape),
            kind: RecordKind::Anonymous,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_by_wire_name(&self, wire_name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.wire_name == wire_name)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.kind.hash(state);
    }
}
