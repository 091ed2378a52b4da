//! Trait levels and the composed classes built from them.
//!
//! A [`TraitLevel`] is what one layer of a hierarchy declares locally. Passing
//! it to [`ClassDef::compose`] together with its already composed bases yields
//! the flattened schema, the merged event set, the handler table and the
//! resolved capabilities of the class.

mod instance;

pub use instance::*;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::events::{DispatchMode, EventDecl, EventKind, Handler, HandlerTable};
use crate::schema::{ComposedSchema, FieldDecl, FieldType, FieldValue, StructuralConfig};

/// Signature of a computed capability.
pub type ComputeFn<E> = dyn Fn(&Instance<E>) -> EngineResult<FieldValue> + Send + Sync;

/// A class-level property: either a constant or derived from the instance.
pub enum Capability<E: EventKind> {
    Constant(FieldValue),
    Computed(Arc<ComputeFn<E>>),
}

impl<E: EventKind> Clone for Capability<E> {
    fn clone(&self) -> Self {
        match self {
            Capability::Constant(value) => Capability::Constant(value.clone()),
            Capability::Computed(func) => Capability::Computed(func.clone()),
        }
    }
}

impl<E: EventKind> fmt::Debug for Capability<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Capability::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Local declarations of one class in a hierarchy.
#[derive(Debug, Clone)]
pub struct TraitLevel<E: EventKind> {
    name: String,
    bases: Vec<String>,
    fields: Vec<FieldDecl>,
    config: Option<StructuralConfig>,
    events: Vec<EventDecl<E>>,
    bindings: Vec<(E, Handler<E>)>,
    requires: Vec<(String, FieldType)>,
    provides: Vec<(String, Capability<E>)>,
}

impl<E: EventKind> TraitLevel<E> {
    /// Start declaring a class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            fields: Vec::new(),
            config: None,
            events: Vec::new(),
            bindings: Vec::new(),
            requires: Vec::new(),
            provides: Vec::new(),
        }
    }

    /// Add a direct base. Order of calls is declaration order.
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Declare a field.
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
            declared_by: self.name.clone(),
        });
        self
    }

    /// Set the structural configuration for this level.
    pub fn config(mut self, config: StructuralConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Declare an event that always fires.
    pub fn event(mut self, kind: E, args: &[FieldType]) -> Self {
        self.push_event(kind, args.to_vec(), DispatchMode::Always);
        self
    }

    /// Declare an event that fires with probability `rate` per dispatch.
    pub fn sampled_event(mut self, kind: E, args: &[FieldType], rate: f64) -> Self {
        self.push_event(kind, args.to_vec(), DispatchMode::Sampled { rate });
        self
    }

    fn push_event(&mut self, kind: E, args: Vec<FieldType>, mode: DispatchMode) {
        self.events.push(EventDecl {
            kind,
            args,
            mode,
            declared_by: self.name.clone(),
        });
    }

    /// Bind a handler to an event declared here or in an ancestor.
    pub fn subscribe(mut self, kind: E, handler: Handler<E>) -> Self {
        self.bindings.push((kind, handler));
        self
    }

    /// Mark a capability that some descendant must provide.
    pub fn require(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.requires.push((name.into(), ty));
        self
    }

    /// Provide a constant capability.
    pub fn provide(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.provides
            .push((name.into(), Capability::Constant(value.into())));
        self
    }

    /// Provide a capability computed from the instance.
    pub fn provide_computed<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Instance<E>) -> EngineResult<FieldValue> + Send + Sync + 'static,
    {
        self.provides
            .push((name.into(), Capability::Computed(Arc::new(func))));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bases(&self) -> &[String] {
        &self.bases
    }
}

/// One entry of a class linearization: a level and what it provides itself.
#[derive(Debug, Clone)]
struct Ancestor<E: EventKind> {
    name: String,
    provides: Arc<HashMap<String, Capability<E>>>,
}

/// A fully composed class. Immutable and shared by all of its instances.
#[derive(Debug)]
pub struct ClassDef<E: EventKind> {
    name: String,
    lineage: Vec<String>,
    mro: Vec<Ancestor<E>>,
    schema: Arc<ComposedSchema>,
    events: HashMap<E, EventDecl<E>>,
    handlers: HandlerTable<E>,
    requirements: Vec<(String, FieldType)>,
    capabilities: HashMap<String, Capability<E>>,
    missing: Vec<String>,
}

impl<E: EventKind> ClassDef<E> {
    /// Compose a class from its local declarations and its direct bases.
    ///
    /// `bases` must be the classes the level extends, in the same order.
    pub fn compose(level: TraitLevel<E>, bases: &[Arc<ClassDef<E>>]) -> EngineResult<Self> {
        let supplied: Vec<&str> = bases.iter().map(|b| b.name()).collect();
        if level.bases().iter().map(String::as_str).ne(supplied.iter().copied()) {
            return Err(EngineError::BaseMismatch {
                class: level.name().to_string(),
                declared: level.bases().to_vec(),
                supplied: supplied.into_iter().map(str::to_string).collect(),
            });
        }

        let TraitLevel {
            name,
            fields,
            config,
            events: local_events,
            bindings,
            requires,
            provides,
            ..
        } = level;

        let base_schemas: Vec<&ComposedSchema> = bases.iter().map(|b| b.schema.as_ref()).collect();
        let schema = ComposedSchema::compose(&name, &fields, config, &base_schemas);

        let mut events: HashMap<E, EventDecl<E>> = HashMap::new();
        for base in bases {
            for decl in base.events.values() {
                merge_event(&name, &mut events, decl)?;
            }
        }
        for decl in &local_events {
            decl.validate(&name)?;
            merge_event(&name, &mut events, decl)?;
        }

        let mut handlers = HandlerTable::new();
        for base in bases {
            handlers.merge_from(&base.handlers);
        }
        for kind in events.keys() {
            handlers.declare(*kind);
        }
        for (kind, handler) in &bindings {
            if !events.contains_key(kind) || !handlers.bind(*kind, handler) {
                return Err(EngineError::UnknownEvent {
                    class: name,
                    event: kind.name().to_string(),
                });
            }
        }

        let mut requirements: Vec<(String, FieldType)> = Vec::new();
        for (req, ty) in bases.iter().flat_map(|b| &b.requirements).chain(&requires) {
            if !requirements.iter().any(|(existing, _)| existing == req) {
                requirements.push((req.clone(), *ty));
            }
        }

        let mut own: HashMap<String, Capability<E>> = HashMap::new();
        for (cap_name, capability) in provides {
            if own.contains_key(&cap_name) {
                continue;
            }
            let capability = match capability {
                Capability::Constant(value) => {
                    Capability::Constant(coerce_capability(&name, &cap_name, value, &requirements)?)
                }
                computed => computed,
            };
            own.insert(cap_name, capability);
        }

        let mro = linearize(&name, Arc::new(own), bases)?;
        let mut capabilities: HashMap<String, Capability<E>> = HashMap::new();
        for ancestor in &mro {
            for (cap_name, capability) in ancestor.provides.iter() {
                capabilities
                    .entry(cap_name.clone())
                    .or_insert_with(|| capability.clone());
            }
        }

        let missing: Vec<String> = requirements
            .iter()
            .filter(|(req, _)| !capabilities.contains_key(req))
            .map(|(req, _)| req.clone())
            .collect();

        let lineage: Vec<String> = mro.iter().map(|a| a.name.clone()).collect();

        log::debug!(
            "composed `{}`: {} fields, {} events, {} handlers{}",
            name,
            schema.len(),
            events.len(),
            handlers.handler_count(),
            if missing.is_empty() { "" } else { " (abstract)" }
        );

        Ok(Self {
            name,
            lineage,
            mro,
            schema: Arc::new(schema),
            events,
            handlers,
            requirements,
            capabilities,
            missing,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<ComposedSchema> {
        &self.schema
    }

    pub fn handlers(&self) -> &HandlerTable<E> {
        &self.handlers
    }

    pub fn event(&self, kind: E) -> Option<&EventDecl<E>> {
        self.events.get(&kind)
    }

    pub fn declares(&self, kind: E) -> bool {
        self.events.contains_key(&kind)
    }

    pub fn capability(&self, name: &str) -> Option<&Capability<E>> {
        self.capabilities.get(name)
    }

    /// Capabilities required somewhere in the hierarchy, first declaration first.
    pub fn requirements(&self) -> &[(String, FieldType)] {
        &self.requirements
    }

    /// Required capabilities nothing in the hierarchy provides.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Abstract classes can be used as bases but never instantiated.
    pub fn is_abstract(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Whether this class is `name` or derives from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.lineage.iter().any(|ancestor| ancestor == name)
    }

    /// C3 linearization: this class, then every ancestor in resolution order.
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }
}

// C3 merge of the bases' linearizations followed by the base list itself.
fn linearize<E: EventKind>(
    class: &str,
    own: Arc<HashMap<String, Capability<E>>>,
    bases: &[Arc<ClassDef<E>>],
) -> EngineResult<Vec<Ancestor<E>>> {
    let mut sequences: Vec<Vec<Ancestor<E>>> = bases.iter().map(|b| b.mro.clone()).collect();
    sequences.push(bases.iter().flat_map(|b| b.mro.first().cloned()).collect());

    let mut mro = vec![Ancestor {
        name: class.to_string(),
        provides: own,
    }];
    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            return Ok(mro);
        }

        let head = sequences
            .iter()
            .map(|seq| &seq[0])
            .find(|candidate| {
                !sequences
                    .iter()
                    .any(|seq| seq[1..].iter().any(|a| a.name == candidate.name))
            })
            .cloned()
            .ok_or_else(|| EngineError::InconsistentHierarchy {
                class: class.to_string(),
            })?;

        for seq in &mut sequences {
            if seq[0].name == head.name {
                seq.remove(0);
            }
        }
        mro.push(head);
    }
}

fn merge_event<E: EventKind>(
    class: &str,
    events: &mut HashMap<E, EventDecl<E>>,
    decl: &EventDecl<E>,
) -> EngineResult<()> {
    match events.get(&decl.kind) {
        // Same declaration reached through two bases.
        Some(existing) if existing.declared_by == decl.declared_by => Ok(()),
        Some(existing) => Err(EngineError::DuplicateEvent {
            class: class.to_string(),
            event: decl.kind.name().to_string(),
            first: existing.declared_by.clone(),
            second: decl.declared_by.clone(),
        }),
        None => {
            events.insert(decl.kind, decl.clone());
            Ok(())
        }
    }
}

fn coerce_capability(
    class: &str,
    capability: &str,
    value: FieldValue,
    requirements: &[(String, FieldType)],
) -> EngineResult<FieldValue> {
    let Some((_, ty)) = requirements.iter().find(|(req, _)| req == capability) else {
        return Ok(value);
    };
    value.coerce(*ty).map_err(|value| EngineError::FieldTypeMismatch {
        class: class.to_string(),
        field: capability.to_string(),
        expected: *ty,
        found: value.field_type(),
    })
}
