use std::fmt;

use crate::types::PhysicalType;

/// Dot separated path to a leaf column in the schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnPath {
    parts: Vec<String>,
}

impl ColumnPath {
    pub fn new(parts: Vec<String>) -> Self {
        ColumnPath { parts }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }
}

impl From<&str> for ColumnPath {
    fn from(s: &str) -> Self {
        ColumnPath {
            parts: s.split('.').map(|p| p.to_string()).collect(),
        }
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// Physical type for a leaf-level primitive column.
///
/// Also includes the maximum definition and repetition levels required to
/// re-assemble nested data. A max level of 0 means the dimension carries no
/// levels at all (required, non-repeated field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    path: ColumnPath,
    physical_type: PhysicalType,
    max_def_level: i16,
    max_rep_level: i16,
}

impl ColumnDescriptor {
    pub fn new(
        path: ColumnPath,
        physical_type: PhysicalType,
        max_def_level: i16,
        max_rep_level: i16,
    ) -> Self {
        ColumnDescriptor {
            path,
            physical_type,
            max_def_level,
            max_rep_level,
        }
    }

    pub fn path(&self) -> &ColumnPath {
        &self.path
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }

    pub fn max_def_level(&self) -> i16 {
        self.max_def_level
    }

    pub fn max_rep_level(&self) -> i16 {
        self.max_rep_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_display() {
        let path = ColumnPath::from("a.b.c");
        assert_eq!(path.parts().len(), 3);
        assert_eq!(path.to_string(), "a.b.c");
    }
}
