//! Workshop mod records and category bucketing

pub mod categorize;

pub use categorize::{build_by_category, extract_tags, Category, CategoryMap};

/// A Workshop item reduced to what categorization needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRecord {
    /// Published file id
    pub id: String,
    /// Tags in the order the catalog returned them
    pub tags: Vec<String>,
}

impl ModRecord {
    pub fn new(id: impl Into<String>, tags: &[&str]) -> Self {
        Self {
            id: id.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}
