use crate::analysis::ScalpAnalyzer;
use crate::config::Config;
use crate::models::{AnalysisJob, AnalysisOutcome, AnalysisResponse, ProcessingStatus};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
enum QueueItem {
    Analyze(AnalysisJob),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct ProcessingRecord {
    pub status: ProcessingStatus,
    pub submitted_at: Instant,
    pub started_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    pub result: Option<AnalysisResponse>,
    pub error: Option<String>,
}

impl Default for ProcessingRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingRecord {
    pub fn new() -> Self {
        Self {
            status: ProcessingStatus::Accepted,
            submitted_at: Instant::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn start_processing(&mut self) {
        self.status = ProcessingStatus::InProgress;
        self.started_at = Some(Instant::now());
    }

    pub fn complete_with_result(&mut self, result: AnalysisResponse) {
        self.status = ProcessingStatus::Completed;
        self.completed_at = Some(Instant::now());
        self.result = Some(result);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = ProcessingStatus::Failed;
        self.completed_at = Some(Instant::now());
        self.error = Some(reason.into());
    }

    /// Only finished records expire; pending ones stay until the worker is done.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.completed_at.is_some_and(|done| done.elapsed() > ttl)
    }
}

type StatusMap = Arc<RwLock<HashMap<String, ProcessingRecord>>>;

/// Drops finished records older than `ttl` and returns how many went.
fn expire_finished(records: &mut HashMap<String, ProcessingRecord>, ttl: Duration) -> usize {
    let initial_count = records.len();
    records.retain(|id, record| {
        let expired = record.is_expired(ttl);
        if expired {
            debug!("Removing expired record: {}", id);
        }
        !expired
    });
    initial_count - records.len()
}

/// Bounded queue feeding a dispatcher that runs a limited number of analyses at once.
#[derive(Clone)]
pub struct AnalysisQueue {
    sender: mpsc::Sender<QueueItem>,
    status_map: StatusMap,
    concurrency: Arc<Semaphore>,
}

impl AnalysisQueue {
    pub fn new(config: &Config, analyzer: ScalpAnalyzer) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_size);
        let status_map: StatusMap = Arc::new(RwLock::new(HashMap::new()));
        let concurrency = Arc::new(Semaphore::new(config.max_concurrent_jobs));

        let worker = Worker {
            analyzer,
            status_map: status_map.clone(),
            concurrency: concurrency.clone(),
            processing_timeout: config.processing_timeout(),
            throttle_interval: config.throttle_interval(),
        };
        tokio::spawn(worker.run(receiver));

        let cleanup_status_map = status_map.clone();
        let cleanup_timeout = config.processing_timeout();
        tokio::spawn(async move {
            Self::cleanup_task(cleanup_status_map, cleanup_timeout).await;
        });

        AnalysisQueue {
            sender,
            status_map,
            concurrency,
        }
    }

    pub async fn submit(&self, job: AnalysisJob) -> Result<(), QueueError> {
        if self.sender.is_closed() {
            return Err(QueueError::QueueClosed);
        }

        let permit = self.sender.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => QueueError::QueueClosed,
        })?;

        self.status_map
            .write()
            .await
            .insert(job.processing_id.clone(), ProcessingRecord::new());

        permit.send(QueueItem::Analyze(job));
        Ok(())
    }

    pub async fn get_status(&self, processing_id: &str) -> ProcessingStatus {
        let status_map = self.status_map.read().await;

        status_map
            .get(processing_id)
            .map(|record| record.status.clone())
            .unwrap_or(ProcessingStatus::NotFound)
    }

    pub async fn get_result(&self, processing_id: &str) -> Option<AnalysisResponse> {
        let status_map = self.status_map.read().await;

        status_map
            .get(processing_id)
            .and_then(|record| record.result.clone())
    }

    pub async fn get_error(&self, processing_id: &str) -> Option<String> {
        let status_map = self.status_map.read().await;

        status_map
            .get(processing_id)
            .and_then(|record| record.error.clone())
    }

    pub async fn shutdown(&self) {
        if let Err(e) = self.sender.send(QueueItem::Shutdown).await {
            warn!("Failed to send shutdown signal: {}", e);
        }
    }

    async fn cleanup_task(status_map: StatusMap, ttl: Duration) {
        info!("Cleanup task started");

        let mut cleanup_interval = tokio::time::interval(Duration::from_secs(300));

        loop {
            cleanup_interval.tick().await;

            let removed_count = expire_finished(&mut *status_map.write().await, ttl);
            if removed_count > 0 {
                info!("Cleaned up {} expired records", removed_count);
            }
        }
    }

    pub async fn get_queue_stats(&self) -> QueueStats {
        let status_map = self.status_map.read().await;

        let mut stats = QueueStats::default();

        for record in status_map.values() {
            match record.status {
                ProcessingStatus::Accepted => stats.accepted += 1,
                ProcessingStatus::InProgress => stats.in_progress += 1,
                ProcessingStatus::Completed => stats.completed += 1,
                ProcessingStatus::Failed => stats.failed += 1,
                ProcessingStatus::NotFound => {}
            }
        }

        stats.total = status_map.len();
        stats.available_permits = self.concurrency.available_permits();
        stats.queue_capacity = self.sender.capacity();

        stats
    }
}

#[derive(Clone)]
struct Worker {
    analyzer: ScalpAnalyzer,
    status_map: StatusMap,
    concurrency: Arc<Semaphore>,
    processing_timeout: Duration,
    throttle_interval: Duration,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<QueueItem>) {
        info!("Analysis queue dispatcher started");

        while let Some(item) = receiver.recv().await {
            match item {
                QueueItem::Analyze(job) => {
                    let permit = match self.concurrency.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            error!("Concurrency semaphore closed: {}", e);
                            self.finish(&job.processing_id, Err("worker unavailable".to_string()))
                                .await;
                            continue;
                        }
                    };

                    let worker = self.clone();
                    tokio::spawn(async move {
                        worker.process(job).await;
                        drop(permit);
                    });

                    sleep(self.throttle_interval).await;
                }
                QueueItem::Shutdown => {
                    info!("Received shutdown signal, stopping dispatcher");
                    break;
                }
            }
        }

        info!("Analysis queue dispatcher stopped");
    }

    async fn process(&self, job: AnalysisJob) {
        let processing_id = job.processing_id.clone();

        debug!("Starting processing for request: {}", processing_id);

        if let Some(record) = self.status_map.write().await.get_mut(&processing_id) {
            record.start_processing();
        }

        let result = match timeout(self.processing_timeout, self.analyzer.analyze(job)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                error!("Processing failed for request {}: {}", processing_id, e);
                Err(e.to_string())
            }
            Err(_) => {
                warn!("Processing timed out for request: {}", processing_id);
                Err("processing timed out".to_string())
            }
        };

        self.finish(&processing_id, result).await;
    }

    async fn finish(&self, processing_id: &str, result: Result<AnalysisOutcome, String>) {
        let mut status_map = self.status_map.write().await;
        let Some(record) = status_map.get_mut(processing_id) else {
            warn!("No record left for request: {}", processing_id);
            return;
        };

        match result {
            Ok(outcome) => {
                record.complete_with_result(AnalysisResponse {
                    processing_id: processing_id.to_string(),
                    results: outcome,
                });
                info!("Completed processing for request: {}", processing_id);
            }
            Err(reason) => record.fail(reason),
        }
    }
}

#[derive(Debug, Default, serde::Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub accepted: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub available_permits: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is full")]
    QueueFull,
    #[error("Queue is closed")]
    QueueClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ScreeningResult;
    use crate::models::{ImageSource, Resolution};

    fn test_config(base: &std::path::Path) -> Config {
        let mut config = Config::from_vars(vec![
            ("GROQ_API_KEY".to_string(), "gsk_test".to_string()),
            (
                "GROQ_API_URL".to_string(),
                "http://127.0.0.1:9/openai/v1/chat/completions".to_string(),
            ),
            ("IMAGE_BASE_DIR".to_string(), base.display().to_string()),
            ("MAX_RETRIES".to_string(), "1".to_string()),
        ])
        .unwrap();
        config.throttle_requests_per_minute = 6000;
        config.max_concurrent_jobs = 1;
        config
    }

    #[test]
    fn test_processing_record_lifecycle() {
        let mut record = ProcessingRecord::new();

        assert_eq!(record.status, ProcessingStatus::Accepted);
        assert!(record.started_at.is_none());

        record.start_processing();
        assert_eq!(record.status, ProcessingStatus::InProgress);
        assert!(record.started_at.is_some());

        record.complete_with_result(AnalysisResponse {
            processing_id: "test".to_string(),
            results: AnalysisOutcome {
                resolution: Resolution::Rejected,
                screening: ScreeningResult::skipped(),
                report: None,
            },
        });
        assert_eq!(record.status, ProcessingStatus::Completed);
        assert!(record.completed_at.is_some());
        assert!(record.result.is_some());
    }

    #[test]
    fn test_processing_record_failure() {
        let mut record = ProcessingRecord::new();
        record.fail("Image error: Image is empty");

        assert_eq!(record.status, ProcessingStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("Image error: Image is empty"));
    }

    #[tokio::test]
    async fn test_processing_record_expiration() {
        let mut record = ProcessingRecord::new();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!record.is_expired(Duration::from_millis(1)));

        record.fail("processing timed out");
        assert!(!record.is_expired(Duration::from_secs(3600)));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(record.is_expired(Duration::from_millis(1)));
    }

    #[test]
    fn test_expiry_keeps_pending_records() {
        let long_ago = Instant::now()
            .checked_sub(Duration::from_secs(10))
            .unwrap();

        let mut accepted = ProcessingRecord::new();
        accepted.submitted_at = long_ago;

        let mut in_progress = ProcessingRecord::new();
        in_progress.submitted_at = long_ago;
        in_progress.start_processing();
        in_progress.started_at = Some(long_ago);

        let mut failed = ProcessingRecord::new();
        failed.submitted_at = long_ago;
        failed.fail("Image error: Image is empty");
        failed.completed_at = Some(long_ago);

        let mut fresh = ProcessingRecord::new();
        fresh.fail("Image error: Image is empty");

        let mut records = HashMap::from([
            ("accepted".to_string(), accepted),
            ("in_progress".to_string(), in_progress),
            ("failed".to_string(), failed),
            ("fresh".to_string(), fresh),
        ]);

        assert_eq!(expire_finished(&mut records, Duration::from_secs(5)), 1);
        assert!(records.contains_key("accepted"));
        assert!(records.contains_key("in_progress"));
        assert!(records.contains_key("fresh"));
        assert!(!records.contains_key("failed"));
    }

    #[tokio::test]
    async fn test_missing_image_job_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let analyzer = ScalpAnalyzer::new(&config).unwrap();
        let queue = AnalysisQueue::new(&config, analyzer);

        let job = AnalysisJob::new(ImageSource::Path("missing.jpg".into()), None, false);
        let id = job.processing_id.clone();
        queue.submit(job).await.unwrap();

        let mut status = queue.get_status(&id).await;
        for _ in 0..100 {
            if status == ProcessingStatus::Failed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            status = queue.get_status(&id).await;
        }

        assert_eq!(status, ProcessingStatus::Failed);
        assert!(queue.get_error(&id).await.unwrap().contains("missing.jpg"));
        assert!(queue.get_result(&id).await.is_none());
        assert_eq!(queue.get_queue_stats().await.failed, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let queue = AnalysisQueue::new(&config, ScalpAnalyzer::new(&config).unwrap());

        assert_eq!(queue.get_status("nope").await, ProcessingStatus::NotFound);
    }

    #[tokio::test]
    async fn test_stats_report_free_worker_slots() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.max_concurrent_jobs = 3;
        let queue = AnalysisQueue::new(&config, ScalpAnalyzer::new(&config).unwrap());

        let stats = queue.get_queue_stats().await;
        assert_eq!(stats.available_permits, 3);
        assert_eq!(stats.queue_capacity, config.queue_size);
    }
}
