use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Column types. Every type has a fixed on-page width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Int,
    Long,
    Float,
    /// Zero-padded string of at most this many bytes.
    String(usize),
}

impl Type {
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Type::Bool => 1,
            Type::Int | Type::Float => 4,
            Type::Long => 8,
            Type::String(len) => *len,
        }
    }

    /// Two columns can be joined on when they hold the same kind of value.
    /// String widths do not matter.
    pub fn is_comparable_with(&self, other: &Type) -> bool {
        matches!(
            (self, other),
            (Type::Bool, Type::Bool)
                | (Type::Int, Type::Int)
                | (Type::Long, Type::Long)
                | (Type::Float, Type::Float)
                | (Type::String(_), Type::String(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.fields.iter().map(|field| field.ty.size_in_bytes()).sum()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn concat(&self, other: &Schema) -> Schema {
        let mut fields = self.fields.clone();
        fields.extend_from_slice(&other.fields);
        Schema { fields }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    String(String),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::Long(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
        }
    }

    /// Whether this value can be stored in a column of type `ty`.
    pub fn fits(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Bool(_), Type::Bool)
            | (Value::Int(_), Type::Int)
            | (Value::Long(_), Type::Long)
            | (Value::Float(_), Type::Float) => true,
            (Value::String(s), Type::String(len)) => s.len() <= *len,
            _ => false,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Long(a), Value::Long(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record(pub Vec<Value>);

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Widens this record with `other`'s values appended after its own.
    pub fn concat(&self, other: &Record) -> Record {
        let mut values = Vec::with_capacity(self.len() + other.len());
        values.extend_from_slice(&self.0);
        values.extend_from_slice(&other.0);
        Record(values)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Builds a [`Record`] from a list of values convertible into [`Value`].
#[macro_export]
macro_rules! record {
    ($($value:expr),* $(,)?) => {
        $crate::sql::dml::entity::Record::new(vec![$($crate::sql::dml::entity::Value::from($value)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_test() {
        let left = Schema::new(vec![
            Field::new("id", Type::Int),
            Field::new("name", Type::String(10)),
        ]);
        let right = Schema::new(vec![Field::new("flag", Type::Bool)]);
        assert_eq!(14, left.size_in_bytes());
        assert_eq!(Some(1), left.index_of("name"));
        assert_eq!(None, left.index_of("flag"));

        let joined = left.concat(&right);
        assert_eq!(3, joined.len());
        assert_eq!(15, joined.size_in_bytes());
        assert_eq!(Some(2), joined.index_of("flag"));
    }

    #[test]
    fn value_order_test() {
        assert!(Value::Int(1) < Value::Int(2));
        assert_eq!(Value::from("x"), Value::String("x".to_owned()));
        assert_eq!(Value::Float(0.5), Value::Float(0.5));
        assert!(Value::Float(f32::NAN) == Value::Float(f32::NAN));
        // different kinds are ordered by kind, never equal
        assert_ne!(Value::Int(1), Value::Long(1));
        assert!(Value::Bool(true) < Value::String(String::new()));
    }

    #[test]
    fn value_fits_test() {
        assert!(Value::from("abc").fits(&Type::String(3)));
        assert!(!Value::from("abcd").fits(&Type::String(3)));
        assert!(!Value::Int(1).fits(&Type::Long));
        assert!(Type::String(3).is_comparable_with(&Type::String(8)));
        assert!(!Type::Int.is_comparable_with(&Type::Long));
    }

    #[test]
    fn record_concat_test() {
        let left = record![1, "a"];
        let right = record![2, "x"];
        let joined = left.concat(&right);
        assert_eq!(record![1, "a", 2, "x"], joined);
        assert_eq!("(1, \"a\", 2, \"x\")", joined.to_string());
    }
}
