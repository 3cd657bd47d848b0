use serde::{Deserialize, Serialize};

/// Maps station identifiers to dense integer codes.
///
/// Codes are assigned in lexicographic order of the identifiers seen at fit time, so
/// the same station set always produces the same encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StationEncoder {
    classes: Vec<String>,
}

impl StationEncoder {
    pub fn fit<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Code of `id`, or `None` for a station not seen at fit time.
    pub fn transform(&self, id: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(id)).ok()
    }

    pub fn inverse(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
