//! Pending install/update/uninstall operations
//!
//! At most one operation per package identity is pending or running at any
//! time. The duplicate check and the insertion happen under one lock, so two
//! callers racing to queue the same package cannot both succeed.

use crate::core::identity::PackageHash;
use crate::core::options::InstallOptions;
use crate::core::types::{OperationType, Package, PackageTag};
use crate::managers::PackageManager;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// One requested operation on one package
#[derive(Clone)]
pub struct PackageOperation {
    pub package: Arc<Package>,
    pub manager: Arc<PackageManager>,
    pub operation: OperationType,
    pub options: InstallOptions,
}

impl PackageOperation {
    pub fn new(
        manager: Arc<PackageManager>,
        package: Arc<Package>,
        operation: OperationType,
        options: InstallOptions,
    ) -> Self {
        Self {
            package,
            manager,
            operation,
            options,
        }
    }

    pub fn hash(&self) -> PackageHash {
        self.package.hash()
    }
}

impl fmt::Debug for PackageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageOperation")
            .field("manager", &self.manager.name())
            .field("package", &self.package.id)
            .field("operation", &self.operation)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    /// An operation on the same package is already pending or running
    Duplicate,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PackageOperation>,
    running: HashSet<PackageHash>,
}

impl QueueState {
    fn contains(&self, hash: PackageHash) -> bool {
        self.running.contains(&hash) || self.pending.iter().any(|op| op.hash() == hash)
    }
}

#[derive(Default)]
pub struct OperationQueue {
    state: Mutex<QueueState>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, operation: PackageOperation) -> EnqueueOutcome {
        let mut state = self.lock();
        if state.contains(operation.hash()) {
            log::debug!(
                "Operation on {} is already queued, ignoring the duplicate",
                operation.package
            );
            return EnqueueOutcome::Duplicate;
        }
        operation.package.set_tag(PackageTag::OnQueue);
        state.pending.push_back(operation);
        EnqueueOutcome::Enqueued
    }

    /// Take the next pending operation; it counts as running until `complete`
    pub fn dequeue(&self) -> Option<PackageOperation> {
        let mut state = self.lock();
        let operation = state.pending.pop_front()?;
        state.running.insert(operation.hash());
        Some(operation)
    }

    pub fn complete(&self, hash: PackageHash) {
        self.lock().running.remove(&hash);
    }

    pub fn contains(&self, hash: PackageHash) -> bool {
        self.lock().contains(hash)
    }

    /// Number of operations waiting to run
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> Vec<PackageOperation> {
        self.lock().pending.iter().cloned().collect()
    }
}

/// Queue an update for every upgradable package of `manager`. Returns how
/// many operations were actually added.
pub async fn queue_all_updates(
    manager: &Arc<PackageManager>,
    queue: &OperationQueue,
    options: &InstallOptions,
) -> usize {
    let mut added = 0;
    for package in manager.get_available_updates().await {
        let operation = PackageOperation::new(
            Arc::clone(manager),
            package,
            OperationType::Update,
            options.clone(),
        );
        if queue.enqueue(operation) == EnqueueOutcome::Enqueued {
            added += 1;
        }
    }
    log::info!("Queued {} updates for manager {}", added, manager.name());
    added
}
