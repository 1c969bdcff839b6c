//! The on-demand derivation graph.
//!
//! Tables are registered by name together with a [`Producer`]. The first
//! [`DerivationGraph::get`] of a name materializes it: a persisted copy is
//! loaded when one exists, otherwise the producer runs, its result is checked
//! against the declared schema, persisted and cached. Later calls return the
//! cached table.
//!
//! Materialization of one name is serialized: concurrent callers of an
//! unmaterialized name wait on a per-name lock while a single producer runs.
//! Different names materialize in parallel.
//!
//! Before a thread waits on a name it walks the record of which thread holds
//! which name and what that thread waits on. Finding itself at the end of
//! that walk means the wait would never end, and the request fails with
//! [`KbError::CyclicDerivation`] instead.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use std::thread::{self, ThreadId};

use fxhash::FxHashMap;
use log::{debug, info, warn};

use mutkb_core::{DerivedTable, TableSchema};

use crate::errors::{KbError, Result};
use crate::store::TableStore;

///
/// Computes one derived table, usually from other tables in the graph.
///
pub trait Producer: Send + Sync {
    /// Declared shape of the produced table.
    fn schema(&self) -> TableSchema;

    fn produce(&self, graph: &DerivationGraph) -> Result<DerivedTable>;
}

/// A [`Producer`] backed by a closure.
pub struct FnProducer<F> {
    schema: TableSchema,
    produce: F,
}

impl<F> FnProducer<F>
where
    F: Fn(&DerivationGraph) -> Result<DerivedTable> + Send + Sync,
{
    pub fn new(schema: TableSchema, produce: F) -> Self {
        FnProducer { schema, produce }
    }
}

impl<F> Producer for FnProducer<F>
where
    F: Fn(&DerivationGraph) -> Result<DerivedTable> + Send + Sync,
{
    fn schema(&self) -> TableSchema {
        self.schema.clone()
    }

    fn produce(&self, graph: &DerivationGraph) -> Result<DerivedTable> {
        (self.produce)(graph)
    }
}

struct Node {
    schema: TableSchema,
    producer: Box<dyn Producer>,
    slot: Mutex<Option<Arc<DerivedTable>>>,
}

impl Node {
    fn lock(&self) -> MutexGuard<'_, Option<Arc<DerivedTable>>> {
        // the slot is only written after a successful build, so a poisoned
        // lock still holds a consistent value
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

thread_local! {
    /// Names being produced on this thread, outermost first.
    static IN_PROGRESS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Marks a name as in progress on the current thread until dropped.
struct InProgress;

impl InProgress {
    fn enter(name: &str) -> Result<Self> {
        IN_PROGRESS.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|n| n == name) {
                let mut chain = stack[start..].to_vec();
                chain.push(name.to_string());
                return Err(KbError::CyclicDerivation { chain });
            }
            stack.push(name.to_string());
            Ok(InProgress)
        })
    }
}

impl Drop for InProgress {
    fn drop(&mut self) {
        IN_PROGRESS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Who holds which node lock, and which node each blocked thread waits for.
#[derive(Default)]
struct Builders {
    holders: FxHashMap<String, ThreadId>,
    waiting: FxHashMap<ThreadId, String>,
}

/// A held node lock. The holder record is cleared before the lock is released.
struct Claim<'a> {
    builders: &'a Mutex<Builders>,
    name: &'a str,
    slot: MutexGuard<'a, Option<Arc<DerivedTable>>>,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut builders = self.builders.lock().unwrap_or_else(|e| e.into_inner());
        builders.holders.remove(self.name);
    }
}

///
/// Registry of named derived tables, materialized on first use.
///
/// # Examples
///
/// ```rust
/// use mutkb_core::{DerivedTable, TableSchema};
/// use mutkb_kb::graph::{DerivationGraph, FnProducer};
///
/// let graph = DerivationGraph::new();
/// let schema = TableSchema::flat("Sample", "Genomic Mutation");
/// graph
///     .register(
///         "sample_mutations",
///         FnProducer::new(schema.clone(), move |_| {
///             let mut table = DerivedTable::new("sample_mutations", schema.clone());
///             table.push("s1", "7:140453136:A")?;
///             Ok(table)
///         }),
///     )
///     .unwrap();
///
/// assert_eq!(graph.children("sample_mutations", "s1").unwrap(), vec!["7:140453136:A"]);
/// ```
pub struct DerivationGraph {
    nodes: RwLock<FxHashMap<String, Arc<Node>>>,
    builders: Mutex<Builders>,
    store: Option<TableStore>,
}

impl Default for DerivationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DerivationGraph {
    /// A graph that keeps tables in memory only.
    pub fn new() -> Self {
        DerivationGraph {
            nodes: RwLock::new(FxHashMap::default()),
            builders: Mutex::new(Builders::default()),
            store: None,
        }
    }

    /// A graph that persists materialized tables to `store` and reuses
    /// persisted tables across instances.
    pub fn with_store(store: TableStore) -> Self {
        DerivationGraph {
            nodes: RwLock::new(FxHashMap::default()),
            builders: Mutex::new(Builders::default()),
            store: Some(store),
        }
    }

    pub fn store(&self) -> Option<&TableStore> {
        self.store.as_ref()
    }

    ///
    /// Register a producer under `name`. The declared schema is validated
    /// here; nothing is computed until the table is requested.
    ///
    pub fn register<P: Producer + 'static>(&self, name: &str, producer: P) -> Result<()> {
        let schema = producer.schema();
        schema.validate().map_err(|source| KbError::InvalidSchema {
            name: name.to_string(),
            source,
        })?;

        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        if nodes.contains_key(name) {
            return Err(KbError::DuplicateRegistration(name.to_string()));
        }
        nodes.insert(
            name.to_string(),
            Arc::new(Node {
                schema,
                producer: Box::new(producer),
                slot: Mutex::new(None),
            }),
        );
        debug!("Registered '{}'", name);
        Ok(())
    }

    /// Register a closure producer.
    pub fn register_fn<F>(&self, name: &str, schema: TableSchema, produce: F) -> Result<()>
    where
        F: Fn(&DerivationGraph) -> Result<DerivedTable> + Send + Sync + 'static,
    {
        self.register(name, FnProducer::new(schema, produce))
    }

    fn node(&self, name: &str) -> Result<Arc<Node>> {
        self.nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| KbError::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn schema(&self, name: &str) -> Result<TableSchema> {
        Ok(self.node(name)?.schema.clone())
    }

    /// Whether `name` is cached in memory. A table being produced right now
    /// counts as not materialized.
    pub fn is_materialized(&self, name: &str) -> bool {
        let Ok(node) = self.node(name) else {
            return false;
        };
        match node.slot.try_lock() {
            Ok(slot) => slot.is_some(),
            Err(TryLockError::Poisoned(e)) => e.into_inner().is_some(),
            Err(TryLockError::WouldBlock) => false,
        }
    }

    fn builders(&self) -> MutexGuard<'_, Builders> {
        self.builders.lock().unwrap_or_else(|e| e.into_inner())
    }

    ///
    /// Take the lock of `node`, failing instead of blocking when the thread
    /// holding it is, directly or through other threads, waiting on us.
    ///
    fn claim<'a>(&'a self, name: &'a str, node: &'a Node) -> Result<Claim<'a>> {
        let me = thread::current().id();
        let slot = match node.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.check_wait(name, me)?;
                let slot = node.lock();
                self.builders().waiting.remove(&me);
                slot
            }
        };
        self.builders().holders.insert(name.to_string(), me);
        Ok(Claim {
            builders: &self.builders,
            name,
            slot,
        })
    }

    /// Record that `me` is about to wait on `name`, unless that closes a cycle.
    fn check_wait(&self, name: &str, me: ThreadId) -> Result<()> {
        let mut builders = self.builders();
        let mut chain = vec![name.to_string()];
        while chain.len() <= builders.holders.len() {
            let current = &chain[chain.len() - 1];
            let Some(&holder) = builders.holders.get(current) else {
                break;
            };
            if holder == me {
                let mut cycle = vec![current.clone()];
                cycle.append(&mut chain);
                warn!("Cyclic derivation across threads: {}", cycle.join(" -> "));
                return Err(KbError::CyclicDerivation { chain: cycle });
            }
            let Some(next) = builders.waiting.get(&holder) else {
                break;
            };
            chain.push(next.clone());
        }
        builders.waiting.insert(me, name.to_string());
        Ok(())
    }

    ///
    /// Get a table, materializing it if needed.
    ///
    /// Producer failures are returned to the caller and leave nothing cached
    /// or persisted; the next call retries. Requesting a table from within
    /// its own production chain, on this thread or through a thread it waits
    /// on, fails with [`KbError::CyclicDerivation`].
    ///
    pub fn get(&self, name: &str) -> Result<Arc<DerivedTable>> {
        let node = self.node(name)?;
        let _in_progress = InProgress::enter(name)?;

        let mut claim = self.claim(name, &node)?;
        let slot = &mut *claim.slot;
        if let Some(table) = slot.as_ref() {
            return Ok(Arc::clone(table));
        }

        if let Some(table) = self.load_persisted(name, &node.schema) {
            let table = Arc::new(table);
            *slot = Some(Arc::clone(&table));
            return Ok(table);
        }

        info!("Materializing '{}'", name);
        let table = node.producer.produce(self)?;
        check_produced(name, &node.schema, &table)?;

        if let Some(store) = &self.store {
            store.save(&table)?;
        }

        info!("Materialized '{}' ({} keys)", name, table.len());
        let table = Arc::new(table);
        *slot = Some(Arc::clone(&table));
        Ok(table)
    }

    fn load_persisted(&self, name: &str, schema: &TableSchema) -> Option<DerivedTable> {
        let store = self.store.as_ref()?;
        match store.load(name) {
            Ok(Some(table)) => match check_produced(name, schema, &table) {
                Ok(()) => {
                    info!("Loaded persisted '{}' ({} keys)", name, table.len());
                    Some(table)
                }
                Err(e) => {
                    warn!("Ignoring persisted '{}': {}", name, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Ignoring persisted '{}': {}", name, e);
                None
            }
        }
    }

    ///
    /// Values of the first field under `key`, materializing `name` first.
    /// Empty when the key is absent.
    ///
    pub fn children(&self, name: &str, key: &str) -> Result<Vec<String>> {
        let table = self.get(name)?;
        Ok(table.target(key).map(|v| v.to_vec()).unwrap_or_default())
    }

    ///
    /// Reverse index of `name`: each value of the first field mapped to the
    /// keys holding it.
    ///
    pub fn get_index(&self, name: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let table = self.get(name)?;
        Ok(mutkb_join::invert(
            table.iter().map(|(key, values)| (key, values[0].iter())),
        ))
    }

    ///
    /// Drop the cached and persisted copies of `name`. The next `get`
    /// recomputes it. Dependent tables are not touched. Waits for an
    /// in-flight build of `name`, and fails with
    /// [`KbError::CyclicDerivation`] when called from that build.
    ///
    pub fn invalidate(&self, name: &str) -> Result<()> {
        let node = self.node(name)?;
        let _in_progress = InProgress::enter(name)?;
        let mut claim = self.claim(name, &node)?;
        *claim.slot = None;
        if let Some(store) = &self.store {
            if store.remove(name)? {
                info!("Removed persisted '{}'", name);
            }
        }
        Ok(())
    }
}

fn check_produced(name: &str, schema: &TableSchema, table: &DerivedTable) -> Result<()> {
    let mismatch = |reason: String| KbError::SchemaMismatch {
        name: name.to_string(),
        reason,
    };

    if table.name() != name {
        return Err(mismatch(format!("table is named '{}'", table.name())));
    }
    if table.schema() != schema {
        return Err(mismatch(format!(
            "declared {} table {} -> {:?}, got {} table {} -> {:?}",
            schema.multiplicity,
            schema.key_field,
            schema.fields,
            table.multiplicity(),
            table.key_field(),
            table.fields()
        )));
    }
    table.validate().map_err(|e| mismatch(e.to_string()))
}
