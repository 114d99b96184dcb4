//! Case-insensitive header map shared by requests and responses.

use std::fmt;

/// A case-insensitive, multi-value HTTP header map.
///
/// Insertion order is preserved. A name may carry several values; callers that
/// need "exactly one value" semantics use [`Headers::get_single`].
///
/// # Examples
///
/// ```
/// use verso::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("X-Version", "3");
/// headers.insert_default("Cache-Control", "no-cache");
/// headers.insert_default("cache-control", "max-age=60");
///
/// assert_eq!(headers.get_single("x-version"), Some("3"));
/// assert_eq!(headers.get("Cache-Control"), Some("no-cache"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.inner.push((name, value.into()));
    }

    /// Inserts `value` only when no entry named `name` exists yet.
    ///
    /// Returns `true` if the value was inserted.
    pub fn insert_default(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.inner.push((name, value.into()));
        true
    }

    /// Returns the first value for the given header name, or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of `name` only if the header occurs exactly once.
    ///
    /// A header repeated on the wire is a list, not a string, and is reported
    /// as absent.
    pub fn get_single<'a>(&'a self, name: &str) -> Option<&'a str> {
        let mut values = self
            .inner
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str());
        let first = values.next()?;
        match values.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Returns an iterator over all values for the given header name.
    pub fn get_all<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Removes all entries with the given header name.
    ///
    /// Returns `true` if any entries were removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.inner.len();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.inner.len() < before
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Content-Type", "application/json");
        assert_eq!(h.get("content-type"), Some("application/json"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn repeated_header_is_not_single() {
        let mut h = Headers::new();
        h.insert("X-Version", "1");
        h.insert("x-version", "2");
        assert_eq!(h.get_single("X-Version"), None);
        let vals: Vec<_> = h.get_all("x-version").collect();
        assert_eq!(vals, vec!["1", "2"]);
    }

    #[test]
    fn single_value_outlives_the_lookup_name() {
        let headers: Headers = [("X-Version", "4")].into_iter().collect();
        let value = {
            let name = String::from("x-version");
            headers.get_single(&name)
        };
        assert_eq!(value, Some("4"));

        let all: Vec<&str> = {
            let name = String::from("X-VERSION");
            headers.get_all(&name).collect()
        };
        assert_eq!(all, vec!["4"]);
    }

    #[test]
    fn insert_default_keeps_existing_value() {
        let mut h = Headers::new();
        h.insert("content-type", "text/csv");
        assert!(!h.insert_default("Content-Type", "application/json"));
        assert_eq!(h.get("Content-Type"), Some("text/csv"));
        assert!(h.insert_default("Cache-Control", "no-cache"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn set_replaces_all_values() {
        let mut h = Headers::new();
        h.insert("X-Foo", "a");
        h.insert("x-foo", "b");
        h.set("X-Foo", "c");
        assert_eq!(h.get_single("x-foo"), Some("c"));
    }

    #[test]
    fn remove() {
        let mut h = Headers::new();
        h.insert("X-Foo", "bar");
        assert!(h.remove("x-foo"));
        assert!(h.is_empty());
        assert!(!h.remove("x-foo"));
    }
}
