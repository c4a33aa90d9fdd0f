use serde::{Deserialize, Serialize};

/// Ordered list of domains to check in one cycle.
///
/// Source order and duplicates are kept. Cells are trimmed and blank cells
/// dropped on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainList(Vec<String>);

impl DomainList {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            cells
                .into_iter()
                .map(|cell| cell.as_ref().trim().to_string())
                .filter(|cell| !cell.is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The list as typed into the checker form, one domain per line.
    pub fn to_form_text(&self) -> String {
        self.0.join("\n")
    }
}
