// Job Repository Port (Interface)

use crate::domain::{JobId, SyncJob};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for sync jobs.
///
/// Implementations resolve source and destination and hand back plaintext
/// configs. A config that fails to decrypt is an error, never ciphertext.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Load a job with its connectors. Missing or deleted jobs are `NotFound`.
    async fn get_by_id(&self, id: JobId) -> Result<SyncJob>;

    /// Persist state, active flag and timestamps
    async fn update(&self, job: &SyncJob) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory repository keyed by job id
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<HashMap<JobId, SyncJob>>,
        update_count: Mutex<usize>,
        fail_updates: AtomicBool,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_job(job: SyncJob) -> Self {
            let repo = Self::new();
            repo.put(job);
            repo
        }

        pub fn put(&self, job: SyncJob) {
            self.jobs.lock().unwrap().insert(job.id, job);
        }

        pub fn get(&self, id: JobId) -> Option<SyncJob> {
            self.jobs.lock().unwrap().get(&id).cloned()
        }

        pub fn update_count(&self) -> usize {
            *self.update_count.lock().unwrap()
        }

        /// Make every following `update` fail with a database error
        pub fn set_fail_updates(&self, fail: bool) {
            self.fail_updates.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn get_by_id(&self, id: JobId) -> Result<SyncJob> {
            self.jobs
                .lock()
                .unwrap()
                .get(&id)
                .filter(|job| !job.is_deleted())
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("job {}", id)))
        }

        async fn update(&self, job: &SyncJob) -> Result<()> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(AppError::Database("database is locked".to_string()));
            }
            let mut jobs = self.jobs.lock().unwrap();
            if !jobs.contains_key(&job.id) {
                return Err(AppError::NotFound(format!("job {}", job.id)));
            }
            jobs.insert(job.id, job.clone());
            *self.update_count.lock().unwrap() += 1;
            Ok(())
        }
    }
}
