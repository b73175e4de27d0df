//! # Properties — Typed Configuration Data
//!
//! A [`Property`] is a named [`PropertyValue`]. Scene files and other data
//! sources hand nodes their configuration as a tree of properties, without
//! knowing which concrete node type will consume them. Setters registered in
//! the [`TypeRegistry`](crate::registry::TypeRegistry) read them back with
//! [`Property::get`].
//!
//! ## Widening
//!
//! Reading a value as a different type than the one stored either performs
//! one of a fixed set of widenings or fails with a type mismatch:
//!
//! ```text
//! i64        <- Int, Bool
//! f32        <- Float, Int
//! bool       <- Bool, Int (non-zero)
//! Vec2/3/4   <- IntList / FloatList of exactly 2/3/4 elements
//! Quat       <- IntList / FloatList of 4 elements, read as (x, y, z, w)
//! Vec<f32>   <- FloatList, IntList
//! Vec<Vec2>  <- Vec2List, IVec2List
//! ```
//!
//! There is no bit reinterpretation: a float is never read as an integer.

use crate::error::{Error, Result};
use crate::math::{IVec2, Quat, Vec2, Vec3, Vec4};

/// A closed set of configuration value shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Float(f32),
    Bool(bool),
    String(String),
    IntList(Vec<i64>),
    FloatList(Vec<f32>),
    StringList(Vec<String>),
    IVec2List(Vec<IVec2>),
    Vec2List(Vec<Vec2>),
    Vec3List(Vec<Vec3>),
    Vec4List(Vec<Vec4>),
    /// Named fields, for composite values like a GUI transform.
    Struct(Vec<Property>),
}

impl PropertyValue {
    /// Human-readable name of the stored alternative, used in errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::String(_) => "string",
            PropertyValue::IntList(_) => "int list",
            PropertyValue::FloatList(_) => "float list",
            PropertyValue::StringList(_) => "string list",
            PropertyValue::IVec2List(_) => "ivec2 list",
            PropertyValue::Vec2List(_) => "vec2 list",
            PropertyValue::Vec3List(_) => "vec3 list",
            PropertyValue::Vec4List(_) => "vec4 list",
            PropertyValue::Struct(_) => "struct",
        }
    }

    /// Convert a JSON value into a property value.
    ///
    /// Arrays are typed by their elements: numbers become an int list (a
    /// float list if any element is fractional), arrays of 2/3/4-element
    /// arrays become vector lists, arrays of objects become a struct whose
    /// fields are named by index.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(PropertyValue::Int(i)),
                None => n
                    .as_f64()
                    .map(|f| PropertyValue::Float(f as f32))
                    .ok_or_else(|| Error::invalid_argument(format!("unrepresentable number {n}"))),
            },
            Value::String(s) => Ok(PropertyValue::String(s.clone())),
            Value::Object(map) => {
                let fields = map
                    .iter()
                    .map(|(key, value)| Property::from_json(key, value))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PropertyValue::Struct(fields))
            }
            Value::Array(items) => array_from_json(items),
            Value::Null => Err(Error::invalid_argument("null is not a property value")),
        }
    }
}

fn array_from_json(items: &[serde_json::Value]) -> Result<PropertyValue> {
    use serde_json::Value;

    let Some(first) = items.first() else {
        return Ok(PropertyValue::IntList(Vec::new()));
    };

    match first {
        Value::Number(_) => {
            if items.iter().all(|v| v.as_i64().is_some()) {
                Ok(PropertyValue::IntList(items.iter().filter_map(Value::as_i64).collect()))
            } else {
                floats(items).map(PropertyValue::FloatList)
            }
        }
        Value::String(_) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| Error::invalid_argument("mixed element types in a string array"))
            })
            .collect::<Result<Vec<_>>>()
            .map(PropertyValue::StringList),
        Value::Array(inner) => {
            let rows = items
                .iter()
                .map(|v| {
                    v.as_array()
                        .filter(|row| row.len() == inner.len())
                        .ok_or_else(|| Error::invalid_argument("ragged nested array"))
                })
                .collect::<Result<Vec<_>>>()?;
            let all_ints = rows.iter().all(|row| row.iter().all(|v| v.as_i64().is_some()));
            match inner.len() {
                2 if all_ints => rows
                    .iter()
                    .map(|row| {
                        let ints = ints(row)?;
                        Ok(IVec2::new(to_i32(ints[0])?, to_i32(ints[1])?))
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(PropertyValue::IVec2List),
                2 => rows
                    .iter()
                    .map(|row| floats(row).map(|f| Vec2::from_slice(&f)))
                    .collect::<Result<Vec<_>>>()
                    .map(PropertyValue::Vec2List),
                3 => rows
                    .iter()
                    .map(|row| floats(row).map(|f| Vec3::from_slice(&f)))
                    .collect::<Result<Vec<_>>>()
                    .map(PropertyValue::Vec3List),
                4 => rows
                    .iter()
                    .map(|row| floats(row).map(|f| Vec4::from_slice(&f)))
                    .collect::<Result<Vec<_>>>()
                    .map(PropertyValue::Vec4List),
                n => Err(Error::invalid_argument(format!("invalid subvector size {n}"))),
            }
        }
        Value::Object(_) => items
            .iter()
            .enumerate()
            .map(|(i, v)| Property::from_json(&i.to_string(), v))
            .collect::<Result<Vec<_>>>()
            .map(PropertyValue::Struct),
        _ => Err(Error::invalid_argument("unknown element type of a JSON array property")),
    }
}

fn floats(items: &[serde_json::Value]) -> Result<Vec<f32>> {
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::invalid_argument("expected a number"))
        })
        .collect()
}

fn ints(items: &[serde_json::Value]) -> Result<Vec<i64>> {
    items
        .iter()
        .map(|v| v.as_i64().ok_or_else(|| Error::invalid_argument("expected an integer")))
        .collect()
}

fn to_i32(value: i64) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::invalid_argument(format!("integer {value} doesn't fit a 2D integer vector")))
}

/// A named [`PropertyValue`].
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn from_json(name: &str, value: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            name: name.to_owned(),
            value: PropertyValue::from_json(value)?,
        })
    }

    /// Read the value as `T`, widening where allowed.
    pub fn get<T: FromProperty>(&self) -> Result<T> {
        T::from_value(&self.value).ok_or_else(|| Error::TypeMismatch {
            property: self.name.clone(),
            expected: T::TYPE_NAME,
            found: self.value.type_name(),
        })
    }

    /// The fields of a struct property. Empty for any other shape.
    pub fn fields(&self) -> &[Property] {
        match &self.value {
            PropertyValue::Struct(fields) => fields,
            _ => &[],
        }
    }

    /// Look up a field of a struct property.
    pub fn subproperty(&self, name: &str) -> Result<&Property> {
        self.fields()
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::MissingProperty {
                property: self.name.clone(),
                name: name.to_owned(),
            })
    }

    /// Read a field if it is present. A present but mistyped field is still an error.
    pub fn get_optional<T: FromProperty>(&self, name: &str) -> Result<Option<T>> {
        match self.fields().iter().find(|p| p.name == name) {
            Some(field) => field.get().map(Some),
            None => Ok(None),
        }
    }
}

/// Types a [`PropertyValue`] can be read as.
pub trait FromProperty: Sized {
    const TYPE_NAME: &'static str;

    fn from_value(value: &PropertyValue) -> Option<Self>;
}

impl FromProperty for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match *value {
            PropertyValue::Int(i) => Some(i),
            PropertyValue::Bool(b) => Some(i64::from(b)),
            _ => None,
        }
    }
}

impl FromProperty for f32 {
    const TYPE_NAME: &'static str = "float";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match *value {
            PropertyValue::Float(f) => Some(f),
            PropertyValue::Int(i) => Some(i as f32),
            _ => None,
        }
    }
}

impl FromProperty for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match *value {
            PropertyValue::Bool(b) => Some(b),
            PropertyValue::Int(i) => Some(i != 0),
            _ => None,
        }
    }
}

impl FromProperty for String {
    const TYPE_NAME: &'static str = "string";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromProperty for Vec<i64> {
    const TYPE_NAME: &'static str = "int list";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::IntList(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromProperty for Vec<f32> {
    const TYPE_NAME: &'static str = "float list";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::FloatList(v) => Some(v.clone()),
            PropertyValue::IntList(v) => Some(v.iter().map(|&i| i as f32).collect()),
            _ => None,
        }
    }
}

impl FromProperty for Vec<String> {
    const TYPE_NAME: &'static str = "string list";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::StringList(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Numeric list of exactly `N` elements, ints widened to floats.
fn fixed_floats<const N: usize>(value: &PropertyValue) -> Option<[f32; N]> {
    let floats = Vec::<f32>::from_value(value)?;
    floats.try_into().ok()
}

impl FromProperty for Vec2 {
    const TYPE_NAME: &'static str = "vec2";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        fixed_floats::<2>(value).map(Vec2::from_array)
    }
}

impl FromProperty for Vec3 {
    const TYPE_NAME: &'static str = "vec3";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        fixed_floats::<3>(value).map(Vec3::from_array)
    }
}

impl FromProperty for Vec4 {
    const TYPE_NAME: &'static str = "vec4";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        fixed_floats::<4>(value).map(Vec4::from_array)
    }
}

impl FromProperty for Quat {
    const TYPE_NAME: &'static str = "quaternion";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        fixed_floats::<4>(value).map(|[x, y, z, w]| Quat::from_xyzw(x, y, z, w).normalize())
    }
}

impl FromProperty for Vec<IVec2> {
    const TYPE_NAME: &'static str = "ivec2 list";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::IVec2List(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromProperty for Vec<Vec2> {
    const TYPE_NAME: &'static str = "vec2 list";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Vec2List(v) => Some(v.clone()),
            PropertyValue::IVec2List(v) => Some(v.iter().map(|i| i.as_vec2()).collect()),
            _ => None,
        }
    }
}

impl FromProperty for Vec<Vec3> {
    const TYPE_NAME: &'static str = "vec3 list";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Vec3List(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromProperty for Vec<Vec4> {
    const TYPE_NAME: &'static str = "vec4 list";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Vec4List(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromProperty for Vec<Property> {
    const TYPE_NAME: &'static str = "struct";

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Struct(v) => Some(v.clone()),
            _ => None,
        }
    }
}

// ── Conversions into values ─────────────────────────────────────────────

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<Vec2> for PropertyValue {
    fn from(v: Vec2) -> Self {
        PropertyValue::FloatList(v.to_array().to_vec())
    }
}

impl From<Vec3> for PropertyValue {
    fn from(v: Vec3) -> Self {
        PropertyValue::FloatList(v.to_array().to_vec())
    }
}

impl From<Vec4> for PropertyValue {
    fn from(v: Vec4) -> Self {
        PropertyValue::FloatList(v.to_array().to_vec())
    }
}

impl From<Vec<Property>> for PropertyValue {
    fn from(v: Vec<Property>) -> Self {
        PropertyValue::Struct(v)
    }
}
