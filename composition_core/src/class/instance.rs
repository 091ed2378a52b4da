//! Live instances of composed classes and synchronous event dispatch.

use std::fmt;
use std::sync::Arc;

use super::{Capability, ClassDef};
use crate::entities::EntityId;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventKind, RandomSource, ThreadRandom};
use crate::schema::{FieldType, FieldValue, Record};

/// A record plus the class that owns its handler table.
pub struct Instance<E: EventKind> {
    id: EntityId,
    class: Arc<ClassDef<E>>,
    record: Record,
}

impl<E: EventKind> ClassDef<E> {
    /// Construct an instance from keyword-style field values.
    ///
    /// Abstract classes are rejected before any field is looked at. When the
    /// family has a creation event and this class declares it, the event is
    /// dispatched on the new instance before it is returned.
    pub fn instantiate<K, I>(self: &Arc<Self>, values: I) -> EngineResult<Instance<E>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        self.instantiate_with(values, &mut ThreadRandom)
    }

    /// Like [`instantiate`](Self::instantiate) with an explicit random source
    /// for a sampled creation event.
    pub fn instantiate_with<K, I>(
        self: &Arc<Self>,
        values: I,
        source: &mut dyn RandomSource,
    ) -> EngineResult<Instance<E>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        if self.is_abstract() {
            return Err(EngineError::AbstractInstantiation {
                class: self.name().to_string(),
                missing: self.missing().to_vec(),
            });
        }

        let record = Record::new(Arc::clone(self.schema()), values)?;
        let mut instance = Instance {
            id: EntityId::new(),
            class: Arc::clone(self),
            record,
        };

        if let Some(creation) = E::creation().filter(|kind| self.declares(*kind)) {
            instance.dispatch_with(creation, &[], source)?;
        }
        Ok(instance)
    }
}

impl<E: EventKind> Instance<E> {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn class(&self) -> &Arc<ClassDef<E>> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn is_a(&self, name: &str) -> bool {
        self.class.is_a(name)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn get(&self, field: &str) -> EngineResult<&FieldValue> {
        self.record.get(field)
    }

    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> EngineResult<()> {
        self.record.set(field, value)
    }

    /// Resolve a capability, evaluating it against this instance if computed.
    pub fn capability(&self, name: &str) -> EngineResult<FieldValue> {
        match self.class.capability(name) {
            Some(Capability::Constant(value)) => Ok(value.clone()),
            Some(Capability::Computed(func)) => func(self),
            None => Err(EngineError::MissingCapability {
                class: self.class.name().to_string(),
                capability: name.to_string(),
            }),
        }
    }

    /// Resolve a numeric capability. Integer capabilities are widened.
    pub fn capability_f64(&self, name: &str) -> EngineResult<f64> {
        match self.capability(name)? {
            FieldValue::Float(v) => Ok(v),
            FieldValue::Int(v) => Ok(v as f64),
            other => Err(EngineError::FieldTypeMismatch {
                class: self.class.name().to_string(),
                field: name.to_string(),
                expected: FieldType::Float,
                found: other.field_type(),
            }),
        }
    }

    /// Resolve an integer capability.
    pub fn capability_i64(&self, name: &str) -> EngineResult<i64> {
        match self.capability(name)? {
            FieldValue::Int(v) => Ok(v),
            other => Err(EngineError::FieldTypeMismatch {
                class: self.class.name().to_string(),
                field: name.to_string(),
                expected: FieldType::Int,
                found: other.field_type(),
            }),
        }
    }

    /// Resolve a text capability.
    pub fn capability_text(&self, name: &str) -> EngineResult<String> {
        match self.capability(name)? {
            FieldValue::Text(v) => Ok(v),
            other => Err(EngineError::FieldTypeMismatch {
                class: self.class.name().to_string(),
                field: name.to_string(),
                expected: FieldType::Text,
                found: other.field_type(),
            }),
        }
    }

    /// Dispatch an event using the thread-local random source.
    ///
    /// Returns whether the handlers ran.
    pub fn dispatch(&mut self, kind: E, args: &[FieldValue]) -> EngineResult<bool> {
        self.dispatch_with(kind, args, &mut ThreadRandom)
    }

    /// Dispatch an event, drawing from `source` if it is sampled.
    ///
    /// Handlers run synchronously in table order and observe the instance as
    /// it is at the time of the call. Nothing guards against a handler
    /// re-dispatching the same event on the same instance.
    pub fn dispatch_with(
        &mut self,
        kind: E,
        args: &[FieldValue],
        source: &mut dyn RandomSource,
    ) -> EngineResult<bool> {
        let class = Arc::clone(&self.class);
        let decl = class.event(kind).ok_or_else(|| EngineError::UnknownEvent {
            class: class.name().to_string(),
            event: kind.name().to_string(),
        })?;
        decl.check_args(class.name(), args)?;

        if !decl.should_fire(source) {
            log::trace!("`{}`: sampled event {} skipped", class.name(), kind.name());
            return Ok(false);
        }

        let handlers = class.handlers().handlers(kind).unwrap_or_default();
        log::trace!(
            "`{}` {}: dispatching {} to {} handlers",
            class.name(),
            self.id,
            kind.name(),
            handlers.len()
        );
        for handler in handlers {
            handler.call(self, args);
        }
        Ok(true)
    }
}

impl<E: EventKind> PartialEq for Instance<E> {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl<E: EventKind> fmt::Debug for Instance<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .field("record", &self.record)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::TraitLevel;
    use crate::events::{Handler, SeededRandom};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Probe {
        Created,
        Hit,
        Glint,
        Unused,
    }

    impl EventKind for Probe {
        fn name(&self) -> &'static str {
            match self {
                Probe::Created => "Created",
                Probe::Hit => "Hit",
                Probe::Glint => "Glint",
                Probe::Unused => "Unused",
            }
        }

        fn creation() -> Option<Self> {
            Some(Probe::Created)
        }
    }

    type Log = Arc<Mutex<Vec<(String, Vec<FieldValue>)>>>;

    fn recorder(log: &Log, label: &str) -> Handler<Probe> {
        let log = Arc::clone(log);
        let tag = label.to_string();
        Handler::new(label, move |_, args| {
            log.lock().unwrap().push((tag.clone(), args.to_vec()))
        })
    }

    fn target(log: &Log, rate: f64) -> Arc<ClassDef<Probe>> {
        let level = TraitLevel::new("Target")
            .field("hp", FieldType::Float)
            .event(Probe::Created, &[])
            .event(Probe::Hit, &[FieldType::Float])
            .sampled_event(Probe::Glint, &[], rate)
            .subscribe(Probe::Created, recorder(log, "created"))
            .subscribe(Probe::Hit, recorder(log, "hit"))
            .subscribe(Probe::Glint, recorder(log, "glint"));
        Arc::new(ClassDef::compose(level, &[]).unwrap())
    }

    fn spawn(class: &Arc<ClassDef<Probe>>) -> Instance<Probe> {
        class.instantiate([("hp", FieldValue::Float(10.0))]).unwrap()
    }

    fn count(log: &Log, label: &str) -> usize {
        log.lock().unwrap().iter().filter(|(l, _)| l == label).count()
    }

    #[test]
    fn test_creation_event_fires_once() {
        let log = Log::default();
        let class = target(&log, 1.0);
        let _instance = spawn(&class);
        assert_eq!(count(&log, "created"), 1);
    }

    #[test]
    fn test_every_handler_runs_once_per_dispatch() {
        let log = Log::default();
        let class = target(&log, 1.0);
        let mut instance = spawn(&class);

        for _ in 0..3 {
            assert!(instance.dispatch(Probe::Hit, &[FieldValue::Float(2.5)]).unwrap());
        }
        assert_eq!(count(&log, "hit"), 3);
        assert!(log
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == "hit")
            .all(|(_, args)| args == &[FieldValue::Float(2.5)]));
    }

    #[test]
    fn test_handlers_see_post_mutation_state() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let level = TraitLevel::new("Target")
            .field("hp", FieldType::Float)
            .event(Probe::Hit, &[FieldType::Float])
            .subscribe(
                Probe::Hit,
                Handler::new("observe", move |instance: &mut Instance<Probe>, _| {
                    let hp = instance.record().get_float("hp").unwrap();
                    sink.lock().unwrap().push(hp);
                }),
            );
        let class = Arc::new(ClassDef::compose(level, &[]).unwrap());
        let mut instance = class.instantiate([("hp", FieldValue::Float(10.0))]).unwrap();

        instance.set("hp", 7.0).unwrap();
        instance.dispatch(Probe::Hit, &[FieldValue::Float(3.0)]).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![7.0]);
    }

    #[test]
    fn test_undeclared_dispatch_fails() {
        let log = Log::default();
        let class = target(&log, 1.0);
        let mut instance = spawn(&class);

        let err = instance.dispatch(Probe::Unused, &[]).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownEvent {
                class: "Target".into(),
                event: "Unused".into(),
            }
        );
    }

    #[test]
    fn test_wrong_arguments_fail() {
        let log = Log::default();
        let class = target(&log, 1.0);
        let mut instance = spawn(&class);

        assert!(matches!(
            instance.dispatch(Probe::Hit, &[]),
            Err(EngineError::ArgumentMismatch { .. })
        ));
        assert_eq!(count(&log, "hit"), 0);
    }

    #[test]
    fn test_sampling_rate_bounds() {
        let log = Log::default();
        let always = target(&log, 1.0);
        let mut instance = spawn(&always);
        let mut source = SeededRandom::new(1);
        for _ in 0..1_000 {
            assert!(instance.dispatch_with(Probe::Glint, &[], &mut source).unwrap());
        }
        assert_eq!(count(&log, "glint"), 1_000);

        let log = Log::default();
        let never = target(&log, 0.0);
        let mut instance = spawn(&never);
        for _ in 0..1_000 {
            assert!(!instance.dispatch_with(Probe::Glint, &[], &mut source).unwrap());
        }
        assert_eq!(count(&log, "glint"), 0);
    }

    #[test]
    fn test_half_rate_fires_about_half_the_time() {
        let log = Log::default();
        let class = target(&log, 0.5);
        let mut instance = spawn(&class);
        let mut source = SeededRandom::new(0xC0FFEE);

        let fired = (0..100_000)
            .filter(|_| instance.dispatch_with(Probe::Glint, &[], &mut source).unwrap())
            .count();

        assert!((45_000..=55_000).contains(&fired), "fired {fired} times");
        assert_eq!(count(&log, "glint"), fired);
    }

    #[test]
    fn test_forced_draws() {
        let log = Log::default();
        let class = target(&log, 0.3);
        let mut instance = spawn(&class);

        let mut low = || 0.29;
        let mut high = || 0.3;
        assert!(instance.dispatch_with(Probe::Glint, &[], &mut low).unwrap());
        assert!(!instance.dispatch_with(Probe::Glint, &[], &mut high).unwrap());
    }

    #[test]
    fn test_abstract_class_rejected_before_fields() {
        let class = Arc::new(
            ClassDef::<Probe>::compose(
                TraitLevel::new("Shapeless")
                    .field("hp", FieldType::Float)
                    .require("weight", FieldType::Float),
                &[],
            )
            .unwrap(),
        );

        let err = class
            .instantiate(Vec::<(String, FieldValue)>::new())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::AbstractInstantiation {
                class: "Shapeless".into(),
                missing: vec!["weight".into()],
            }
        );
    }

    #[test]
    fn test_computed_capability_reads_instance() {
        let class = Arc::new(
            ClassDef::<Probe>::compose(
                TraitLevel::new("Pile")
                    .field("count", FieldType::Int)
                    .require("weight", FieldType::Float)
                    .provide("unit", 1.5)
                    .provide_computed("weight", |instance| {
                        let count = instance.record().get_int("count")?;
                        Ok(FieldValue::Float(count as f64 * instance.capability_f64("unit")?))
                    }),
                &[],
            )
            .unwrap(),
        );
        let mut pile = class.instantiate([("count", FieldValue::Int(4))]).unwrap();
        assert_eq!(pile.capability_f64("weight").unwrap(), 6.0);

        pile.set("count", 2).unwrap();
        assert_eq!(pile.capability_f64("weight").unwrap(), 3.0);

        assert!(matches!(
            pile.capability("colour"),
            Err(EngineError::MissingCapability { .. })
        ));
    }
}
