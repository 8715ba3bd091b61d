//! Predicate and type inheritance oracle.

use std::collections::HashMap;
use std::fmt;

/// Read-only model knowledge the search layer consults.
///
/// Names are shared between predicates and object types; `parent` walks
/// either hierarchy.
pub trait Schema: fmt::Debug {
    fn is_predicate(&self, name: &str) -> bool;

    /// Direct parent of a predicate or type.
    fn parent(&self, name: &str) -> Option<&str>;

    fn has_parent(&self, name: &str) -> bool {
        self.parent(name).is_some()
    }

    /// Whether `name` equals `ancestor` or inherits from it.
    fn is_a(&self, name: &str, ancestor: &str) -> bool {
        let mut current = Some(name);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Parameter names of a predicate, inherited ones first.
    fn parameters(&self, predicate: &str) -> Option<&[String]>;

    fn parameter_count(&self, predicate: &str) -> Option<usize> {
        self.parameters(predicate).map(<[String]>::len)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    parent: Option<String>,
    parameters: Vec<String>,
    is_predicate: bool,
}

/// In-memory [`Schema`] built programmatically.
///
/// # Examples
///
/// ```
/// use u_plansearch::plan::{Schema, SimpleSchema};
///
/// let mut schema = SimpleSchema::new();
/// schema.add_type("Rover", None);
/// schema.add_predicate("Move", None, &["from", "to"]);
/// schema.add_predicate("Drive", Some("Move"), &["speed"]);
///
/// assert!(schema.is_a("Drive", "Move"));
/// assert_eq!(schema.parameter_count("Drive"), Some(3));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimpleSchema {
    entries: HashMap<String, Entry>,
}

impl SimpleSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an object type. An unknown parent is ignored.
    pub fn add_type(&mut self, name: &str, parent: Option<&str>) -> &mut Self {
        let parent = parent.filter(|p| self.entries.contains_key(*p));
        self.entries.insert(
            name.to_string(),
            Entry {
                parent: parent.map(str::to_string),
                parameters: Vec::new(),
                is_predicate: false,
            },
        );
        self
    }

    /// Declares a predicate. Parameters of a known parent are inherited
    /// ahead of the new ones.
    pub fn add_predicate(&mut self, name: &str, parent: Option<&str>, parameters: &[&str]) -> &mut Self {
        let inherited = parent
            .and_then(|p| self.entries.get(p))
            .map(|e| e.parameters.clone());
        let parent = parent.filter(|p| self.entries.contains_key(*p));
        let mut all = inherited.unwrap_or_default();
        all.extend(parameters.iter().map(|p| p.to_string()));
        self.entries.insert(
            name.to_string(),
            Entry {
                parent: parent.map(str::to_string),
                parameters: all,
                is_predicate: true,
            },
        );
        self
    }

    /// Whether `name` was declared as a type.
    pub fn is_type(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| !e.is_predicate)
    }
}

impl Schema for SimpleSchema {
    fn is_predicate(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.is_predicate)
    }

    fn parent(&self, name: &str) -> Option<&str> {
        self.entries.get(name)?.parent.as_deref()
    }

    fn parameters(&self, predicate: &str) -> Option<&[String]> {
        self.entries
            .get(predicate)
            .filter(|e| e.is_predicate)
            .map(|e| e.parameters.as_slice())
    }
}
