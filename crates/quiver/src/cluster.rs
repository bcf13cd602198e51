//! The in-process cluster.
//!
//! [`LocalCluster`] wires one master and any number of workers in a
//! single process: every member owns a shard, an update server, a plan
//! registry and a pull service. The cluster implements the engine's
//! transport seams — [`RemoteGraph`] for record access,
//! [`PullClients`]/[`UpdateClients`] for the distributed operators, and
//! [`PlanDispatcher`] for shipping worker-side plans — exactly the way
//! a networked transport would, so the distributed pipeline runs
//! unmodified.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use quiver_core::{
    EdgeTypeName, EngineError, EngineResult, GlobalAddress, Label, PlanId, PropertyKey,
    PropertyValue, Symbol, SymbolTable, WorkerId,
};
use quiver_graph::{
    EdgeRecord, GraphStore, GraphTx, GraphUpdate, RemoteGraph, UpdateResult, UpdateServer,
    VertexRecord, View,
};
use quiver_query::distributed::{
    spawn, DataManager, DistributedRuntime, PlanDispatcher, PullBatch, PullClients, PullState,
    TaskHandle, UpdateClients,
};
use quiver_query::plan::PlanRef;
use quiver_query::{make_cursor, ExecutionContext, Frame, Parameters, TypedValue};

use crate::config::EngineConfig;

/// A plan registered on a worker.
struct DispatchedPlan {
    plan: PlanRef,
    table: SymbolTable,
}

/// One worker-side pull cursor with its buffered rows.
struct PullSession {
    cursor: quiver_query::BoxedCursor,
    frame: Frame,
    ctx: ExecutionContext,
    buffer: VecDeque<Vec<TypedValue>>,
    exhausted: bool,
}

/// One cluster member.
struct WorkerNode {
    worker_id: WorkerId,
    store: Arc<GraphStore>,
    update_server: Arc<UpdateServer>,
    data_manager: Arc<DataManager>,
    plans: DashMap<PlanId, DispatchedPlan>,
    sessions: Mutex<HashMap<(u64, PlanId), PullSession>>,
}

impl WorkerNode {
    fn new(worker_id: WorkerId, shared: Weak<ClusterShared>) -> Arc<Self> {
        let store = Arc::new(GraphStore::new(worker_id));
        let transport = Arc::new(ClusterHandle { shared, origin: worker_id });
        Arc::new(Self {
            worker_id,
            update_server: Arc::new(UpdateServer::new(Arc::clone(&store))),
            data_manager: Arc::new(DataManager::new(transport)),
            store,
            plans: DashMap::new(),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn project(symbols: &[Symbol], frame: &Frame) -> Vec<TypedValue> {
        symbols.iter().map(|symbol| frame[symbol].clone()).collect()
    }

    /// Services one remote pull against this worker's side of a
    /// dispatched plan. Errors never escape: they are mapped onto wire
    /// state codes.
    fn service_pull(
        &self,
        shared: &Arc<ClusterShared>,
        transaction: u64,
        plan_id: PlanId,
        parameters: &Parameters,
        symbols: &[Symbol],
        accumulate: bool,
        batch_size: usize,
    ) -> PullBatch {
        let mut sessions = self.sessions.lock();
        if !sessions.contains_key(&(transaction, plan_id)) {
            let Some(dispatched) = self.plans.get(&plan_id) else {
                debug!(worker = %self.worker_id, %plan_id, "pull for an unknown plan");
                return PullBatch::state(PullState::QueryFailure);
            };
            let cursor = match make_cursor(&dispatched.plan) {
                Ok(cursor) => cursor,
                Err(error) => return PullBatch::state(PullState::from_error(&error)),
            };
            let tx = GraphTx::new(
                Arc::clone(&self.store),
                Some(Arc::clone(&self.data_manager) as Arc<dyn RemoteGraph>),
                transaction,
                shared.worker_ids(),
            );
            let mut ctx = ExecutionContext::new(tx, dispatched.table.clone())
                .with_parameters(parameters.clone());
            ctx.config = shared.config.execution();
            let frame = Frame::new(dispatched.table.len());
            sessions.insert(
                (transaction, plan_id),
                PullSession { cursor, frame, ctx, buffer: VecDeque::new(), exhausted: false },
            );
        }
        let session = sessions
            .get_mut(&(transaction, plan_id))
            .expect("the session was just looked up or created");

        if accumulate {
            // Drain the whole plan into the worker-held buffer; rows are
            // streamed by later plain pulls.
            while !session.exhausted {
                match session.cursor.pull(&mut session.frame, &mut session.ctx) {
                    Ok(true) => session.buffer.push_back(Self::project(symbols, &session.frame)),
                    Ok(false) => session.exhausted = true,
                    Err(error) => {
                        sessions.remove(&(transaction, plan_id));
                        return PullBatch::state(PullState::from_error(&error));
                    }
                }
            }
            trace!(worker = %self.worker_id, %plan_id, rows = session.buffer.len(), "accumulated");
            return PullBatch::state(PullState::Exhausted);
        }

        let mut frames = Vec::new();
        while frames.len() < batch_size.max(1) {
            if let Some(row) = session.buffer.pop_front() {
                frames.push(row);
                continue;
            }
            if session.exhausted {
                break;
            }
            match session.cursor.pull(&mut session.frame, &mut session.ctx) {
                Ok(true) => frames.push(Self::project(symbols, &session.frame)),
                Ok(false) => session.exhausted = true,
                Err(error) => {
                    sessions.remove(&(transaction, plan_id));
                    return PullBatch::state(PullState::from_error(&error));
                }
            }
        }

        let state = if session.exhausted && session.buffer.is_empty() {
            sessions.remove(&(transaction, plan_id));
            PullState::Exhausted
        } else {
            PullState::InProgress
        };
        PullBatch { state, frames }
    }
}

struct ClusterShared {
    workers: Vec<Arc<WorkerNode>>,
    config: EngineConfig,
}

impl ClusterShared {
    fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.iter().map(|worker| worker.worker_id).collect()
    }

    fn node(&self, worker: WorkerId) -> EngineResult<&Arc<WorkerNode>> {
        self.workers
            .get(worker.as_u16() as usize)
            .ok_or_else(|| EngineError::query(format!("unknown worker {worker}")))
    }
}

/// One member's view of the cluster: the transport behind its data
/// manager, pull clients and update clients.
struct ClusterHandle {
    shared: Weak<ClusterShared>,
    origin: WorkerId,
}

impl ClusterHandle {
    fn shared(&self) -> EngineResult<Arc<ClusterShared>> {
        self.shared.upgrade().ok_or_else(|| EngineError::query("the cluster was shut down"))
    }
}

impl RemoteGraph for ClusterHandle {
    fn fetch_vertex(&self, address: GlobalAddress, view: View) -> EngineResult<Arc<VertexRecord>> {
        let shared = self.shared()?;
        shared
            .node(address.worker)?
            .store
            .vertex(address.gid, view)
            .ok_or_else(|| EngineError::Reconstruction(format!("vertex {address}")))
    }

    fn fetch_edge(&self, address: GlobalAddress, view: View) -> EngineResult<Arc<EdgeRecord>> {
        let shared = self.shared()?;
        shared
            .node(address.worker)?
            .store
            .edge(address.gid, view)
            .ok_or_else(|| EngineError::Reconstruction(format!("edge {address}")))
    }

    fn insert_vertex_into(
        &self,
        worker: WorkerId,
        labels: Vec<Label>,
        properties: std::collections::BTreeMap<PropertyKey, PropertyValue>,
    ) -> EngineResult<GlobalAddress> {
        let shared = self.shared()?;
        let store = &shared.node(worker)?.store;
        let gid = store.create_vertex(labels, properties);
        trace!(origin = %self.origin, %worker, %gid, "created remote vertex");
        Ok(store.address(gid))
    }

    fn insert_edge_into(
        &self,
        from: GlobalAddress,
        to: GlobalAddress,
        edge_type: EdgeTypeName,
    ) -> EngineResult<GlobalAddress> {
        let shared = self.shared()?;
        let store = &shared.node(from.worker)?.store;
        let gid = store.create_edge(from, to, edge_type)?;
        Ok(store.address(gid))
    }

    fn buffer_update(
        &self,
        transaction: u64,
        owner: WorkerId,
        update: GraphUpdate,
    ) -> EngineResult<()> {
        let shared = self.shared()?;
        shared.node(owner)?.update_server.buffer(transaction, update);
        Ok(())
    }
}

impl PullClients for ClusterHandle {
    fn worker_ids(&self) -> Vec<WorkerId> {
        self.shared().map(|shared| shared.worker_ids()).unwrap_or_default()
    }

    fn pull(
        &self,
        transaction: u64,
        worker: WorkerId,
        plan_id: PlanId,
        parameters: &Parameters,
        symbols: &[Symbol],
        accumulate: bool,
        batch_size: usize,
    ) -> TaskHandle<PullBatch> {
        let Ok(shared) = self.shared() else {
            return TaskHandle::ready(PullBatch::state(PullState::QueryFailure));
        };
        let parameters = parameters.clone();
        let symbols = symbols.to_vec();
        spawn(move || {
            let node = match shared.node(worker) {
                Ok(node) => Arc::clone(node),
                Err(_) => return PullBatch::state(PullState::QueryFailure),
            };
            node.service_pull(
                &shared,
                transaction,
                plan_id,
                &parameters,
                &symbols,
                accumulate,
                batch_size,
            )
        })
    }

    fn notify_command_advanced(&self, transaction: u64) -> Vec<TaskHandle<()>> {
        let Ok(shared) = self.shared() else { return Vec::new() };
        let origin = self.origin;
        shared
            .workers
            .iter()
            .filter(|worker| worker.worker_id != origin)
            .map(|worker| {
                let worker = Arc::clone(worker);
                spawn(move || {
                    trace!(worker = %worker.worker_id, transaction, "command advanced");
                    worker.store.advance_command();
                    worker.data_manager.invalidate();
                })
            })
            .collect()
    }
}

impl UpdateClients for ClusterHandle {
    fn apply_all(&self, skip: WorkerId, transaction: u64) -> Vec<TaskHandle<UpdateResult>> {
        let Ok(shared) = self.shared() else { return Vec::new() };
        shared
            .workers
            .iter()
            .filter(|worker| worker.worker_id != skip)
            .map(|worker| {
                let server = Arc::clone(&worker.update_server);
                spawn(move || server.apply(transaction))
            })
            .collect()
    }
}

/// An in-process master plus workers.
pub struct LocalCluster {
    shared: Arc<ClusterShared>,
    next_transaction: AtomicU64,
    next_plan: AtomicU64,
}

impl LocalCluster {
    /// Creates a cluster of one master and `worker_count` workers.
    #[must_use]
    pub fn new(worker_count: u16, config: EngineConfig) -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<ClusterShared>| ClusterShared {
            workers: (0..=worker_count)
                .map(|id| WorkerNode::new(WorkerId::new(id), weak.clone()))
                .collect(),
            config,
        });
        Self { shared, next_transaction: AtomicU64::new(1), next_plan: AtomicU64::new(1) }
    }

    /// Returns every member's id, master first.
    #[must_use]
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.shared.worker_ids()
    }

    /// Returns a member's shard.
    pub fn store(&self, worker: WorkerId) -> EngineResult<Arc<GraphStore>> {
        Ok(Arc::clone(&self.shared.node(worker)?.store))
    }

    /// Allocates a fresh plan id.
    #[must_use]
    pub fn allocate_plan_id(&self) -> PlanId {
        PlanId::new(self.next_plan.fetch_add(1, Ordering::SeqCst))
    }

    /// Opens a transaction-scoped accessor on one member, wired for
    /// cross-shard reads and deferred updates.
    #[must_use]
    pub fn tx_on(&self, worker: WorkerId) -> GraphTx {
        let transaction = self.next_transaction.fetch_add(1, Ordering::SeqCst);
        self.tx_with_id(worker, transaction)
    }

    fn tx_with_id(&self, worker: WorkerId, transaction: u64) -> GraphTx {
        let node = self.shared.node(worker).expect("cluster members are fixed at construction");
        GraphTx::new(
            Arc::clone(&node.store),
            Some(Arc::clone(&node.data_manager) as Arc<dyn RemoteGraph>),
            transaction,
            self.shared.worker_ids(),
        )
    }

    /// The distributed runtime of one member, as handed to its
    /// execution contexts.
    #[must_use]
    pub fn runtime_on(&self, worker: WorkerId) -> Arc<DistributedRuntime> {
        let node = self.shared.node(worker).expect("cluster members are fixed at construction");
        let handle =
            Arc::new(ClusterHandle { shared: Arc::downgrade(&self.shared), origin: worker });
        Arc::new(DistributedRuntime {
            pull_clients: Arc::clone(&handle) as Arc<dyn PullClients>,
            update_clients: handle as Arc<dyn UpdateClients>,
            update_server: Arc::clone(&node.update_server),
            data_manager: Arc::clone(&node.data_manager),
        })
    }

    /// Runs a plan on the master to completion in a fresh transaction,
    /// returning the rows projected on the plan's output symbols.
    pub fn run_on_master(
        &self,
        plan: &PlanRef,
        table: &SymbolTable,
        parameters: Parameters,
    ) -> EngineResult<Vec<Vec<TypedValue>>> {
        let transaction = self.next_transaction.fetch_add(1, Ordering::SeqCst);
        self.run_on_master_in(transaction, plan, table, parameters)
    }

    /// Runs a plan on the master within an existing transaction, so it
    /// observes (and synchronizes) that transaction's buffered state.
    pub fn run_on_master_in(
        &self,
        transaction: u64,
        plan: &PlanRef,
        table: &SymbolTable,
        parameters: Parameters,
    ) -> EngineResult<Vec<Vec<TypedValue>>> {
        let tx = self.tx_with_id(WorkerId::MASTER, transaction);
        let mut ctx = ExecutionContext::new(tx, table.clone())
            .with_parameters(parameters)
            .with_distributed(self.runtime_on(WorkerId::MASTER));
        ctx.config = self.shared.config.execution();

        let outputs = plan.output_symbols();
        let mut cursor = make_cursor(plan)?;
        let mut frame = Frame::new(table.len());
        let mut rows = Vec::new();
        while cursor.pull(&mut frame, &mut ctx)? {
            rows.push(WorkerNode::project(&outputs, &frame));
        }
        Ok(rows)
    }
}

impl PlanDispatcher for LocalCluster {
    fn dispatch(&self, plan_id: PlanId, plan: PlanRef, table: SymbolTable) -> EngineResult<()> {
        debug!(%plan_id, "dispatching worker plan");
        for worker in self.shared.workers.iter().filter(|w| !w.worker_id.is_master()) {
            worker.plans.insert(
                plan_id,
                DispatchedPlan { plan: PlanRef::clone(&plan), table: table.clone() },
            );
        }
        Ok(())
    }

    fn remove(&self, plan_id: PlanId) -> EngineResult<()> {
        debug!(%plan_id, "removing worker plan");
        for worker in &self.shared.workers {
            worker.plans.remove(&plan_id);
            worker.sessions.lock().retain(|(_, id), _| *id != plan_id);
        }
        Ok(())
    }
}

/// A master plan bundled with its dispatched worker plans.
///
/// Worker plans are shipped on construction and torn down on drop.
pub struct DistributedPlan<'a> {
    cluster: &'a LocalCluster,
    plan: PlanRef,
    table: SymbolTable,
    plan_ids: Vec<PlanId>,
}

impl<'a> DistributedPlan<'a> {
    /// Dispatches the worker plans and wraps the master plan.
    pub fn new(
        cluster: &'a LocalCluster,
        plan: PlanRef,
        table: SymbolTable,
        worker_plans: Vec<(PlanId, PlanRef)>,
    ) -> EngineResult<Self> {
        let mut plan_ids = Vec::with_capacity(worker_plans.len());
        for (plan_id, worker_plan) in worker_plans {
            cluster.dispatch(plan_id, worker_plan, table.clone())?;
            plan_ids.push(plan_id);
        }
        Ok(Self { cluster, plan, table, plan_ids })
    }

    /// Runs the master plan to completion in a fresh transaction.
    pub fn run(&self, parameters: Parameters) -> EngineResult<Vec<Vec<TypedValue>>> {
        self.cluster.run_on_master(&self.plan, &self.table, parameters)
    }

    /// Runs the master plan within an existing transaction.
    pub fn run_in(
        &self,
        transaction: u64,
        parameters: Parameters,
    ) -> EngineResult<Vec<Vec<TypedValue>>> {
        self.cluster.run_on_master_in(transaction, &self.plan, &self.table, parameters)
    }

    /// Returns the master plan.
    #[must_use]
    pub fn plan(&self) -> &PlanRef {
        &self.plan
    }
}

impl Drop for DistributedPlan<'_> {
    fn drop(&mut self) {
        for plan_id in &self.plan_ids {
            // Teardown is best-effort; the registry outlives any error.
            let _ = self.cluster.remove(*plan_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_registers_on_workers_only() {
        let cluster = LocalCluster::new(2, EngineConfig::new());
        let plan_id = cluster.allocate_plan_id();
        cluster.dispatch(plan_id, quiver_query::plan::PlanNode::once(), SymbolTable::new()).unwrap();

        for worker in &cluster.shared.workers {
            let registered = worker.plans.contains_key(&plan_id);
            assert_eq!(registered, !worker.worker_id.is_master());
        }

        cluster.remove(plan_id).unwrap();
        for worker in &cluster.shared.workers {
            assert!(!worker.plans.contains_key(&plan_id));
        }
    }

    #[test]
    fn distributed_plan_tears_down_on_drop() {
        let cluster = LocalCluster::new(1, EngineConfig::new());
        let plan_id = cluster.allocate_plan_id();
        {
            let _plan = DistributedPlan::new(
                &cluster,
                quiver_query::plan::PlanNode::once(),
                SymbolTable::new(),
                vec![(plan_id, quiver_query::plan::PlanNode::once())],
            )
            .unwrap();
            assert!(cluster.shared.workers[1].plans.contains_key(&plan_id));
        }
        assert!(!cluster.shared.workers[1].plans.contains_key(&plan_id));
    }

    #[test]
    fn cross_shard_reads_resolve_through_the_data_manager() {
        let cluster = LocalCluster::new(1, EngineConfig::new());
        let worker_store = cluster.store(WorkerId::new(1)).unwrap();
        let gid = worker_store.create_vertex(
            vec![Label::new("L")],
            std::collections::BTreeMap::new(),
        );
        worker_store.advance_command();

        let tx = cluster.tx_on(WorkerId::MASTER);
        let address = GlobalAddress::new(gid, WorkerId::new(1));
        let vertex = quiver_graph::VertexAccessor::new(address, tx.handle().clone());
        assert!(vertex.has_label(&Label::new("L")).unwrap());
    }
}
