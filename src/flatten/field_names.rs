use std::{
    collections::{hash_map::Entry, HashMap},
    sync::LazyLock,
};

use crate::bson::{Bson, Document};

/// A declarative, case-insensitive mapping from a field's declared name to the name it is
/// persisted under.
///
/// A table is meant to be built once per record type (see
/// [`Model::field_names`](crate::Model::field_names)) and consulted by the
/// [`Flattener`](super::Flattener) before it falls back to its [`KeyCase`](super::KeyCase)
/// conversion. Lookups ignore case and underscores, so `"FirstName"`, `"first_name"` and
/// `"FIRSTNAME"` all resolve to the same persisted name. A field can therefore be registered
/// under its Rust name or under its serialized name.
///
/// ```
/// use mongo_odm::flatten::FieldNames;
///
/// let names = FieldNames::new()
///     .with("DummyStupidField", "dummy_field")
///     .with("Start", "startsAt");
///
/// assert_eq!(names.resolve("dummystupidfield"), Some("dummy_field"));
/// assert_eq!(names.resolve("dummy_stupid_field"), Some("dummy_field"));
/// assert_eq!(names.resolve("START"), Some("startsAt"));
/// assert_eq!(names.resolve("end"), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldNames {
    by_folded_name: HashMap<String, String>,
}

impl FieldNames {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared empty table, used when a record type declares no names of its own.
    pub fn empty() -> &'static FieldNames {
        static EMPTY: LazyLock<FieldNames> = LazyLock::new(FieldNames::new);
        &EMPTY
    }

    /// Adds a mapping and returns the table, for chaining.
    pub fn with(mut self, declared: impl AsRef<str>, persisted: impl Into<String>) -> Self {
        self.insert(declared, persisted);
        self
    }

    /// Adds a mapping, returning the persisted name previously registered for `declared`, if
    /// any.
    pub fn insert(
        &mut self,
        declared: impl AsRef<str>,
        persisted: impl Into<String>,
    ) -> Option<String> {
        self.by_folded_name
            .insert(fold(declared.as_ref()), persisted.into())
    }

    /// Registers every key of `document`, at any depth, as its own persisted name. Names that
    /// are already registered keep their mapping.
    ///
    /// ```
    /// use mongo_odm::{bson::doc, flatten::FieldNames};
    ///
    /// let mut names = FieldNames::new().with("nick", "nickname");
    /// names.learn_keys(&doc! { "first_name": "Alex", "nick": "al", "home": { "Zip": "1" } });
    ///
    /// assert_eq!(names.resolve("FirstName"), Some("first_name"));
    /// assert_eq!(names.resolve("zip"), Some("Zip"));
    /// assert_eq!(names.resolve("nick"), Some("nickname"));
    /// ```
    pub fn learn_keys(&mut self, document: &Document) {
        for (key, value) in document {
            if let Entry::Vacant(entry) = self.by_folded_name.entry(fold(key)) {
                entry.insert(key.clone());
            }
            self.learn_value(value);
        }
    }

    fn learn_value(&mut self, value: &Bson) {
        match value {
            Bson::Document(document) => self.learn_keys(document),
            Bson::Array(items) => items.iter().for_each(|item| self.learn_value(item)),
            _ => {}
        }
    }

    /// Looks up the persisted name for `declared`, ignoring case and underscores.
    pub fn resolve(&self, declared: &str) -> Option<&str> {
        if self.by_folded_name.is_empty() {
            return None;
        }
        self.by_folded_name
            .get(&fold(declared))
            .map(String::as_str)
    }

    /// The number of declared names in the table.
    pub fn len(&self) -> usize {
        self.by_folded_name.len()
    }

    /// Whether the table declares no names.
    pub fn is_empty(&self) -> bool {
        self.by_folded_name.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FieldNames
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut names = FieldNames::new();
        for (declared, persisted) in iter {
            names.insert(declared, persisted);
        }
        names
    }
}

fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
