use std::fmt;
use std::str::FromStr;

use crate::error::LayerError;

/// A parsed `module.path:attribute.path` layer reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRef {
    module: String,
    attribute: Vec<String>,
}

impl LayerRef {
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Attribute path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.attribute
    }

    /// Attribute path joined with dots.
    pub fn attribute_path(&self) -> String {
        self.attribute.join(".")
    }
}

impl FromStr for LayerRef {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LayerError::InvalidReference(s.to_string());

        let (module, attribute) = s.split_once(':').ok_or_else(invalid)?;
        if !is_dotted_path(module) || !is_dotted_path(attribute) {
            return Err(invalid());
        }

        Ok(Self {
            module: module.to_string(),
            attribute: attribute.split('.').map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for LayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.attribute_path())
    }
}

fn is_dotted_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}
