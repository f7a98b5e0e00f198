//! Name-indexed fixtures: registration, dependency ordering, one-time construction of
//! process-scoped values, and teardown.
//!
//! Tests and fixtures declare their dependencies by name up front. Before a test runs,
//! [`resolve`] walks the transitive dependency set in topological order, reusing cached
//! process-scoped values and building per-test values fresh.

pub mod catalog;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::errors::{panic_message, ApicheckError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureScope {
    /// Built once per run, shared by every test, torn down after the last test.
    Process,
    /// Built for each test that needs it, torn down right after that test.
    PerTest,
}

impl fmt::Display for FixtureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureScope::Process => f.write_str("process"),
            FixtureScope::PerTest => f.write_str("per-test"),
        }
    }
}

/// A type-erased fixture value.
#[derive(Clone)]
pub struct FixtureValue {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl FixtureValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for FixtureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixtureValue<{}>", self.type_name)
    }
}

/// The values a test (or fixture) declared, bound by name.
#[derive(Clone, Default)]
pub struct Fixtures {
    values: Arc<IndexMap<String, FixtureValue>>,
}

impl Fixtures {
    fn select(all: &IndexMap<String, FixtureValue>, names: &[String]) -> Self {
        let values = names
            .iter()
            .filter_map(|n| all.get(n).map(|v| (n.clone(), v.clone())))
            .collect();
        Self {
            values: Arc::new(values),
        }
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ApicheckError::FixtureNotDeclared(name.to_string()))?;
        value.downcast::<T>().ok_or_else(|| ApicheckError::FixtureType {
            fixture: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Fixtures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}

type Producer = Arc<dyn Fn(&Fixtures) -> Result<FixtureValue> + Send + Sync>;
type Teardown = Arc<dyn Fn(FixtureValue) + Send + Sync>;

#[derive(Clone)]
pub struct FixtureDef {
    name: String,
    scope: FixtureScope,
    deps: Vec<String>,
    producer: Producer,
    teardown: Option<Teardown>,
}

impl FixtureDef {
    pub fn new<T, F>(name: impl Into<String>, scope: FixtureScope, producer: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Fixtures) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            scope,
            deps: Vec::new(),
            producer: Arc::new(move |fx: &Fixtures| producer(fx).map(FixtureValue::new)),
            teardown: None,
        }
    }

    pub fn process<T, F>(name: impl Into<String>, producer: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Fixtures) -> Result<T> + Send + Sync + 'static,
    {
        Self::new(name, FixtureScope::Process, producer)
    }

    pub fn per_test<T, F>(name: impl Into<String>, producer: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Fixtures) -> Result<T> + Send + Sync + 'static,
    {
        Self::new(name, FixtureScope::PerTest, producer)
    }

    /// A fixture that hands out a clone of `value`.
    pub fn value<T>(name: impl Into<String>, scope: FixtureScope, value: T) -> Self
    where
        T: Any + Clone + Send + Sync,
    {
        Self::new(name, scope, move |_| Ok(value.clone()))
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.deps.extend(deps.iter().map(|d| d.to_string()));
        self
    }

    pub fn with_teardown<T, F>(mut self, teardown: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.teardown = Some(Arc::new(move |value: FixtureValue| {
            let type_name = value.type_name();
            let typed = value.downcast::<T>();
            // release our handle so the teardown may hold the last reference
            drop(value);
            match typed {
                Some(v) => teardown(v),
                None => warn!(fixture = %name, "teardown skipped: unexpected value type {type_name}"),
            }
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> FixtureScope {
        self.scope
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Run the producer, turning both errors and panics into `FixtureConstruction`.
    fn construct(&self, deps: &Fixtures) -> Result<FixtureValue> {
        let outcome = catch_unwind(AssertUnwindSafe(|| (self.producer)(deps)));
        let reason = match outcome {
            Ok(Ok(value)) => {
                debug!(fixture = %self.name, scope = %self.scope, "fixture constructed");
                return Ok(value);
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        warn!(fixture = %self.name, %reason, "fixture construction failed");
        Err(ApicheckError::FixtureConstruction {
            fixture: self.name.clone(),
            reason,
        })
    }

    fn run_teardown(&self, value: FixtureValue) {
        if let Some(teardown) = &self.teardown {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| teardown(value))) {
                warn!(fixture = %self.name, "teardown panicked: {}", panic_message(payload.as_ref()));
            } else {
                debug!(fixture = %self.name, "fixture torn down");
            }
        }
    }
}

impl fmt::Debug for FixtureDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureDef")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("deps", &self.deps)
            .field("teardown", &self.teardown.is_some())
            .finish()
    }
}

#[derive(Clone, Default, Debug)]
pub struct FixtureRegistry {
    defs: IndexMap<String, FixtureDef>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: FixtureDef) -> Result<()> {
        if self.defs.contains_key(&def.name) {
            return Err(ApicheckError::DuplicateFixture(def.name));
        }
        self.defs.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FixtureDef> {
        self.defs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Whole-graph checks run before any test: dependency cycles and scope mismatches.
    /// Dependencies on unregistered names are left for [`FixtureRegistry::plan`] so that
    /// only the affected tests error.
    pub fn validate(&self) -> Result<()> {
        if let Some(cycle) = self.find_cycle() {
            return Err(ApicheckError::FixtureCycle(cycle));
        }
        for def in self.defs.values() {
            if def.scope != FixtureScope::Process {
                continue;
            }
            for dep in &def.deps {
                if let Some(d) = self.defs.get(dep) {
                    if d.scope == FixtureScope::PerTest {
                        return Err(ApicheckError::ScopeMismatch {
                            fixture: def.name.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// The cycle as a closed path (`a -> b -> a`), if there is one.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Active,
            Done,
        }

        fn visit<'a>(
            reg: &'a FixtureRegistry,
            name: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(name) {
                Some(Mark::Done) => return None,
                Some(Mark::Active) => {
                    let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(name.to_string());
                    return Some(cycle);
                }
                None => {}
            }
            let def = reg.defs.get(name)?;
            marks.insert(name, Mark::Active);
            stack.push(name);
            for dep in &def.deps {
                if let Some(cycle) = visit(reg, dep, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(name, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        self.defs
            .keys()
            .find_map(|name| visit(self, name, &mut marks, &mut stack))
    }

    /// Every fixture reachable from `roots`, dependencies before dependents.
    pub fn plan(&self, roots: &[String]) -> Result<Vec<&FixtureDef>> {
        fn visit<'a>(
            reg: &'a FixtureRegistry,
            name: &str,
            done: &mut HashSet<&'a str>,
            active: &mut Vec<&'a str>,
            out: &mut Vec<&'a FixtureDef>,
        ) -> Result<()> {
            let (key, def) = reg
                .defs
                .get_key_value(name)
                .ok_or_else(|| ApicheckError::UnknownFixture(name.to_string()))?;
            if done.contains(key.as_str()) {
                return Ok(());
            }
            if let Some(pos) = active.iter().position(|n| *n == key.as_str()) {
                let mut cycle: Vec<String> = active[pos..].iter().map(|n| n.to_string()).collect();
                cycle.push(key.clone());
                return Err(ApicheckError::FixtureCycle(cycle));
            }
            active.push(key.as_str());
            for dep in &def.deps {
                visit(reg, dep, done, active, out)?;
            }
            active.pop();
            done.insert(key.as_str());
            out.push(def);
            Ok(())
        }

        let mut done = HashSet::new();
        let mut active = Vec::new();
        let mut out = Vec::new();
        for root in roots {
            visit(self, root, &mut done, &mut active, &mut out)?;
        }
        Ok(out)
    }
}

type Slot = Arc<OnceCell<std::result::Result<FixtureValue, String>>>;

/// Process-scoped fixture values. Each fixture gets its own one-time guard, so concurrent
/// tests asking for the same fixture trigger exactly one construction; a failure is cached
/// like a success.
#[derive(Default)]
pub struct SessionCache {
    slots: Mutex<HashMap<String, Slot>>,
    constructed: Mutex<Vec<(String, FixtureValue)>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, name: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(name.to_string()).or_default().clone()
    }

    async fn get_or_construct(&self, def: &FixtureDef, deps: &Fixtures) -> Result<FixtureValue> {
        let slot = self.slot(&def.name);
        let cached = slot
            .get_or_init(|| async {
                match def.construct(deps) {
                    Ok(value) => {
                        self.constructed
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .push((def.name.clone(), value.clone()));
                        Ok(value)
                    }
                    Err(ApicheckError::FixtureConstruction { reason, .. }) => Err(reason),
                    Err(other) => Err(other.to_string()),
                }
            })
            .await;
        cached
            .clone()
            .map_err(|reason| ApicheckError::FixtureConstruction {
                fixture: def.name.clone(),
                reason,
            })
    }

    /// Names of process fixtures built so far, in construction order.
    pub fn constructed(&self) -> Vec<String> {
        self.constructed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Tear down every constructed process fixture, newest first. Safe to call twice.
    pub fn teardown(&self, registry: &FixtureRegistry) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
        let built = std::mem::take(&mut *self.constructed.lock().unwrap_or_else(|e| e.into_inner()));
        for (name, value) in built.into_iter().rev() {
            if let Some(def) = registry.get(&name) {
                def.run_teardown(value);
            }
        }
    }
}

/// Fixtures resolved for one test, plus the per-test values it owns.
pub struct Resolved {
    pub fixtures: Fixtures,
    per_test: Vec<(String, FixtureValue)>,
}

impl Resolved {
    /// Per-test teardown, newest first.
    pub fn teardown(self, registry: &FixtureRegistry) {
        teardown_values(registry, self.per_test);
    }
}

fn teardown_values(registry: &FixtureRegistry, values: Vec<(String, FixtureValue)>) {
    for (name, value) in values.into_iter().rev() {
        if let Some(def) = registry.get(&name) {
            def.run_teardown(value);
        }
    }
}

/// Build (or reuse) everything `deps` needs, in dependency order. On failure, per-test
/// fixtures already built are torn down before the error is returned.
pub async fn resolve(
    registry: &FixtureRegistry,
    cache: &SessionCache,
    deps: &[String],
) -> Result<Resolved> {
    let plan = registry.plan(deps)?;

    let mut values: IndexMap<String, FixtureValue> = IndexMap::with_capacity(plan.len());
    let mut per_test = Vec::new();

    for def in plan {
        let inject = Fixtures::select(&values, &def.deps);
        let built = match def.scope {
            FixtureScope::Process => cache.get_or_construct(def, &inject).await,
            FixtureScope::PerTest => def.construct(&inject),
        };
        match built {
            Ok(value) => {
                if def.scope == FixtureScope::PerTest {
                    per_test.push((def.name.clone(), value.clone()));
                }
                values.insert(def.name.clone(), value);
            }
            Err(e) => {
                teardown_values(registry, per_test);
                return Err(e);
            }
        }
    }

    Ok(Resolved {
        fixtures: Fixtures::select(&values, deps),
        per_test,
    })
}
