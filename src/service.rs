use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::executor::BatchExecutor;
use crate::languages::preparer_for;
use crate::sandbox::{BwrapConfig, BwrapSandbox};
use crate::types::{ExecutionRequest, ExecutionResult, ResourceLimits};
use crate::{Error, Result};

/// Entry point for callers running many batches: bounds how many run at
/// once and gives every run a fresh, exclusively-owned workspace under one
/// root directory. Per-run state never outlives the run.
#[derive(Clone)]
pub struct ExecutionService {
    semaphore: Arc<Semaphore>,
    limits: ResourceLimits,
    workspace_root: PathBuf,
}

impl ExecutionService {
    pub fn new(
        max_concurrent_runs: usize,
        limits: ResourceLimits,
        workspace_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        limits.validate()?;
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_runs)),
            limits,
            workspace_root: workspace_root.into(),
        })
    }

    /// Runs one request to completion: prepare once, execute every input in
    /// order, return one result per input.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<Vec<ExecutionResult>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to acquire execution permit: {}", e)))?;

        debug!(
            "Starting batch execution for language: {:?} ({} inputs)",
            request.language,
            request.inputs.len()
        );

        let preparer = preparer_for(request.language);
        let config = BwrapConfig::for_run(&self.workspace_root, preparer.executables());
        let sandbox = BwrapSandbox::new(config);
        let executor = BatchExecutor::new(preparer, Box::new(sandbox));

        let result = executor
            .run(&request.code, &request.inputs, &self.limits)
            .await;

        match &result {
            Ok(results) => info!("Batch execution completed: {} results", results.len()),
            Err(e) => error!("Batch execution failed: {}", e),
        }

        result
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}
