use std::collections::HashSet;

/// Ordered set of attribute names whose values get counted.
/// Immutable once built; shared read-only by every extraction task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    names: Vec<String>,
}

impl AttributeSet {
    /// Build from caller-supplied names, keeping first-seen order.
    /// Duplicates collapse and empty names are dropped.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| !name.is_empty())
            .filter(|name| seen.insert(name.clone()))
            .collect();
        Self { names }
    }

    /// Parse a comma separated list such as `genre,author`.
    ///
    /// # Example
    /// ```
    /// use attrstats::AttributeSet;
    /// let attrs = AttributeSet::parse("genre, author,,genre");
    /// assert_eq!(attrs.iter().collect::<Vec<_>>(), vec!["genre", "author"]);
    /// ```
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(',').map(str::trim))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
