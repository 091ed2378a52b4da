//! Family Registry - every class of one domain family, keyed by name.
//!
//! Defining a class through its family composes it against bases looked up by
//! name and, when the result is concrete, registers it for construction by
//! string key. Names are unique per family: a second definition under the same
//! name is rejected and leaves the registry as it was.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::class::{ClassDef, Instance, TraitLevel};
use crate::error::{EngineError, EngineResult};
use crate::events::{EventKind, RandomSource};
use crate::schema::FieldValue;

/// Registry of one domain family (buildings, items, ...).
#[derive(Debug)]
pub struct Family<E: EventKind> {
    name: String,
    /// Every composed class, abstract or not.
    classes: HashMap<String, Arc<ClassDef<E>>>,
    /// Concrete classes only.
    registry: BTreeMap<String, Arc<ClassDef<E>>>,
}

impl<E: EventKind> Family<E> {
    /// Create an empty family.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: HashMap::new(),
            registry: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compose a class and register it if it is concrete.
    pub fn define(&mut self, level: TraitLevel<E>) -> EngineResult<Arc<ClassDef<E>>> {
        if self.classes.contains_key(level.name()) {
            return Err(EngineError::DuplicateRegistration {
                family: self.name.clone(),
                name: level.name().to_string(),
            });
        }

        let bases = level
            .bases()
            .iter()
            .map(|base| {
                self.classes
                    .get(base)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownClass {
                        family: self.name.clone(),
                        name: base.clone(),
                    })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let class = Arc::new(ClassDef::compose(level, &bases)?);
        let name = class.name().to_string();

        if class.is_abstract() {
            log::debug!("{}: `{}` is abstract, not registered", self.name, name);
        } else {
            log::debug!("{}: registered `{}`", self.name, name);
            self.registry.insert(name.clone(), Arc::clone(&class));
        }
        self.classes.insert(name, Arc::clone(&class));
        Ok(class)
    }

    /// Look up a concrete class by name.
    pub fn lookup(&self, name: &str) -> Option<&Arc<ClassDef<E>>> {
        self.registry.get(name)
    }

    /// Look up any defined class, abstract ones included.
    pub fn class(&self, name: &str) -> Option<&Arc<ClassDef<E>>> {
        self.classes.get(name)
    }

    /// Construct an instance of the named class.
    pub fn spawn<K, I>(&self, name: &str, values: I) -> EngineResult<Instance<E>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        self.resolve(name)?.instantiate(values)
    }

    /// Construct an instance with an explicit random source.
    pub fn spawn_with<K, I>(
        &self,
        name: &str,
        values: I,
        source: &mut dyn RandomSource,
    ) -> EngineResult<Instance<E>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        self.resolve(name)?.instantiate_with(values, source)
    }

    // Abstract classes resolve too so construction reports why it failed.
    fn resolve(&self, name: &str) -> EngineResult<&Arc<ClassDef<E>>> {
        self.classes
            .get(name)
            .ok_or_else(|| EngineError::UnknownClass {
                family: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Names of all concrete classes, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    /// Number of concrete classes.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}
