//! Job state container
//!
//! The crawl engine publishes job snapshots here and polls the active-job
//! registry for cancellation. Readers (the CLI, tests) poll snapshots and
//! request stops through the same handle.

use crate::state::{Job, JobId};
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Storage and cancellation registry for crawl jobs
///
/// Implementations must be safe to call from many jobs at once.
pub trait JobStateContainer: Send + Sync {
    /// Registers a new job and marks it active if it is still running
    fn add_job(&self, job: Job);

    /// Replaces the stored snapshot of a job
    ///
    /// Updates to a job whose stored snapshot is already terminal are ignored.
    fn update_job(&self, job: &Job);

    /// Returns the latest snapshot of a job
    fn get_job(&self, id: &JobId) -> Option<Job>;

    /// Returns every known job, oldest first
    fn jobs(&self) -> Vec<Job>;

    /// Returns true while the job is in the active registry
    fn is_active(&self, id: &JobId) -> bool;

    /// Removes the job from the active registry
    ///
    /// Returns true if the job was active.
    fn stop(&self, id: &JobId) -> bool;
}

/// In-process [`JobStateContainer`] backed by locked maps
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    active: RwLock<HashSet<JobId>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of all jobs still in the active registry
    pub fn active_ids(&self) -> Vec<JobId> {
        read(&self.active).iter().copied().collect()
    }
}

// Every write is a single insert or remove, so a poisoned lock still guards
// consistent data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl JobStateContainer for InMemoryJobStore {
    fn add_job(&self, job: Job) {
        let id = job.id;
        if !job.is_terminal() {
            write(&self.active).insert(id);
        }
        write(&self.jobs).insert(id, job);
        tracing::debug!("Registered job {}", id);
    }

    fn update_job(&self, job: &Job) {
        {
            let mut jobs = write(&self.jobs);
            if let Some(existing) = jobs.get(&job.id) {
                if existing.is_terminal() {
                    tracing::trace!(
                        "Ignoring update for job {} already {}",
                        job.id,
                        existing.status
                    );
                    return;
                }
            }
            jobs.insert(job.id, job.clone());
        }

        if job.is_terminal() {
            write(&self.active).remove(&job.id);
        }
    }

    fn get_job(&self, id: &JobId) -> Option<Job> {
        read(&self.jobs).get(id).cloned()
    }

    fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = read(&self.jobs).values().cloned().collect();
        jobs.sort_by_key(|job| job.start_time);
        jobs
    }

    fn is_active(&self, id: &JobId) -> bool {
        read(&self.active).contains(id)
    }

    fn stop(&self, id: &JobId) -> bool {
        let removed = write(&self.active).remove(id);
        if removed {
            tracing::info!("Stop requested for job {}", id);
        }
        removed
    }
}
