use std::fmt;
use std::str::FromStr;

/// Built-in property data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveDataType {
    Text,
    TextArray,
    Int,
    IntArray,
    Number,
    NumberArray,
    Boolean,
    BooleanArray,
    Date,
    DateArray,
    Uuid,
    UuidArray,
    GeoCoordinates,
    PhoneNumber,
    Blob,
    Object,
    ObjectArray,
}

impl PrimitiveDataType {
    pub const ALL: [PrimitiveDataType; 17] = [
        PrimitiveDataType::Text,
        PrimitiveDataType::TextArray,
        PrimitiveDataType::Int,
        PrimitiveDataType::IntArray,
        PrimitiveDataType::Number,
        PrimitiveDataType::NumberArray,
        PrimitiveDataType::Boolean,
        PrimitiveDataType::BooleanArray,
        PrimitiveDataType::Date,
        PrimitiveDataType::DateArray,
        PrimitiveDataType::Uuid,
        PrimitiveDataType::UuidArray,
        PrimitiveDataType::GeoCoordinates,
        PrimitiveDataType::PhoneNumber,
        PrimitiveDataType::Blob,
        PrimitiveDataType::Object,
        PrimitiveDataType::ObjectArray,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveDataType::Text => "text",
            PrimitiveDataType::TextArray => "text[]",
            PrimitiveDataType::Int => "int",
            PrimitiveDataType::IntArray => "int[]",
            PrimitiveDataType::Number => "number",
            PrimitiveDataType::NumberArray => "number[]",
            PrimitiveDataType::Boolean => "boolean",
            PrimitiveDataType::BooleanArray => "boolean[]",
            PrimitiveDataType::Date => "date",
            PrimitiveDataType::DateArray => "date[]",
            PrimitiveDataType::Uuid => "uuid",
            PrimitiveDataType::UuidArray => "uuid[]",
            PrimitiveDataType::GeoCoordinates => "geoCoordinates",
            PrimitiveDataType::PhoneNumber => "phoneNumber",
            PrimitiveDataType::Blob => "blob",
            PrimitiveDataType::Object => "object",
            PrimitiveDataType::ObjectArray => "object[]",
        }
    }

    /// `object` and `object[]` carry nested properties.
    pub fn is_nested(&self) -> bool {
        matches!(self, PrimitiveDataType::Object | PrimitiveDataType::ObjectArray)
    }

    pub fn is_array(&self) -> bool {
        self.as_str().ends_with("[]")
    }
}

impl fmt::Display for PrimitiveDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimitiveDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|dt| dt.as_str() == s)
            .ok_or_else(|| format!("unknown primitive data type '{}'", s))
    }
}

/// Classification of a single data-type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataTypeKind {
    Primitive(PrimitiveDataType),
    /// Cross-reference to another class, by class name.
    Reference(String),
}

impl DataTypeKind {
    /// Classify a tag. Tags starting with an upper-case ASCII letter are class
    /// references; everything else must be a known primitive.
    pub fn parse(tag: &str) -> Result<Self, String> {
        match tag.chars().next() {
            Some(c) if c.is_ascii_uppercase() => Ok(DataTypeKind::Reference(tag.to_string())),
            Some(_) => tag.parse().map(DataTypeKind::Primitive),
            None => Err("empty data type".to_string()),
        }
    }
}
