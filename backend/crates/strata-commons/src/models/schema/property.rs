use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Text tokenization applied by the inverted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tokenization {
    Word,
    Lowercase,
    Whitespace,
    Field,
}

impl Tokenization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tokenization::Word => "word",
            Tokenization::Lowercase => "lowercase",
            Tokenization::Whitespace => "whitespace",
            Tokenization::Field => "field",
        }
    }
}

impl fmt::Display for Tokenization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tokenization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "word" => Ok(Tokenization::Word),
            "lowercase" => Ok(Tokenization::Lowercase),
            "whitespace" => Ok(Tokenization::Whitespace),
            "field" => Ok(Tokenization::Field),
            other => Err(format!("unknown tokenization '{}'", other)),
        }
    }
}

/// A class property.
///
/// `data_type` is an ordered list of type tags. Tags may be appended, never
/// removed or reordered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub data_type: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tokenization: Option<Tokenization>,
    #[serde(default)]
    pub index_filterable: Option<bool>,
    #[serde(default)]
    pub index_searchable: Option<bool>,
    #[serde(default)]
    pub nested_properties: Vec<Property>,
}

impl Property {
    pub fn new(name: impl Into<String>, data_type: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into_iter().map(String::from).collect(),
            ..Default::default()
        }
    }

    pub fn with_nested(mut self, nested: Vec<Property>) -> Self {
        self.nested_properties = nested;
        self
    }

    /// Case-sensitive exact match against the existing tags.
    pub fn has_data_type(&self, data_type: &str) -> bool {
        self.data_type.iter().any(|t| t == data_type)
    }

    /// Append `data_type` unless already present. Returns whether it was added.
    pub fn add_data_type(&mut self, data_type: &str) -> bool {
        if self.has_data_type(data_type) {
            return false;
        }
        self.data_type.push(data_type.to_string());
        true
    }
}
