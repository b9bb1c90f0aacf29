//! Assembly scheduler.
//!
//! Traversal within an assembly is sequential; parallelism exists only at
//! the assembly boundary. Each assembly runs on its own blocking worker with
//! its own listener, so every assembly keeps an ordered event stream.

use crate::config::RunOptions;
use crate::domain::{AssemblyInfo, MspecError, Result};
use crate::engine::{AssemblyReport, Engine};
use crate::listener::RunListener;
use crate::metadata::AssemblyMetadata;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::info;

/// Runs several assemblies, bounded by `max_parallel_assemblies`.
#[derive(Debug, Clone)]
pub struct AssemblyScheduler {
    engine: Arc<Engine>,
    max_parallel: usize,
}

impl AssemblyScheduler {
    pub fn new(options: RunOptions) -> Self {
        let max_parallel = options.max_parallel_assemblies.max(1);
        Self {
            engine: Arc::new(Engine::new(options)),
            max_parallel,
        }
    }

    /// Run assemblies one after another on the calling thread.
    pub fn run_sequential(
        &self,
        assemblies: &[AssemblyMetadata],
        listener: &dyn RunListener,
    ) -> Vec<AssemblyReport> {
        assemblies
            .iter()
            .map(|metadata| self.engine.run(metadata, listener))
            .collect()
    }

    /// Run assemblies concurrently on blocking workers.
    ///
    /// `make_listener` is called once per assembly, before it starts. Reports
    /// come back in input order.
    pub async fn run_parallel<F>(
        &self,
        assemblies: Vec<AssemblyMetadata>,
        make_listener: F,
    ) -> Result<Vec<AssemblyReport>>
    where
        F: Fn(&AssemblyInfo) -> Arc<dyn RunListener> + Send + Sync,
    {
        info!(
            assemblies = assemblies.len(),
            max_parallel = self.max_parallel,
            "Running assemblies in parallel"
        );
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks: Vec<JoinHandle<AssemblyReport>> = Vec::with_capacity(assemblies.len());

        for metadata in assemblies {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| MspecError::Scheduler(e.to_string()))?;
            let engine = Arc::clone(&self.engine);
            let listener = make_listener(&AssemblyInfo::new(&metadata.name));

            tasks.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                engine.run(&metadata, listener.as_ref())
            }));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            let report = task
                .await
                .map_err(|e| MspecError::Scheduler(format!("assembly worker failed: {e}")))?;
            reports.push(report);
        }
        Ok(reports)
    }
}
