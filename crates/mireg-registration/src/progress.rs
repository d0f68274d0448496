//! Progress tracking, callbacks and cancellation for registration runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Progress information for one optimizer iteration.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Resolution level, 0 is the coarsest.
    pub level: usize,
    /// Iteration within the level.
    pub iteration: usize,
    /// Iterations configured for the level.
    pub total_iterations: usize,
    /// Metric value over the iteration's samples.
    pub metric_value: f64,
    /// Metric value over all fixed voxels, when requested.
    pub exact_metric_value: Option<f64>,
    /// Gain used by the step.
    pub learning_rate: f64,
    /// Whether the update was skipped after a recoverable error.
    pub skipped: bool,
    /// Time elapsed since the run started.
    pub elapsed: Duration,
    /// Estimated remaining time for the level.
    pub estimated_remaining: Option<Duration>,
}

impl ProgressInfo {
    pub fn new(level: usize, iteration: usize, total_iterations: usize, metric_value: f64, learning_rate: f64) -> Self {
        Self {
            level,
            iteration,
            total_iterations,
            metric_value,
            exact_metric_value: None,
            learning_rate,
            skipped: false,
            elapsed: Duration::ZERO,
            estimated_remaining: None,
        }
    }

    /// Progress through the level in percent.
    pub fn progress_percent(&self) -> f64 {
        if self.total_iterations == 0 {
            return 100.0;
        }
        (self.iteration + 1) as f64 / self.total_iterations as f64 * 100.0
    }

    /// Extrapolate the remaining time of the level from `level_elapsed`.
    pub fn calculate_remaining(&mut self, level_elapsed: Duration) {
        let done = self.iteration + 1;
        let per_iteration = level_elapsed.as_secs_f64() / done as f64;
        let remaining = self.total_iterations.saturating_sub(done);
        self.estimated_remaining = Some(Duration::from_secs_f64(per_iteration * remaining as f64));
    }
}

/// Summary of a finished level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelInfo {
    pub level: usize,
    pub iterations_run: usize,
    pub skipped_iterations: usize,
    pub final_metric_value: f64,
}

/// Observer of a registration run.
pub trait ProgressCallback: Send + Sync {
    /// Called after every iteration, including skipped ones.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when the run starts.
    fn on_start(&self, _levels: usize) {}

    /// Called when a level starts optimizing.
    fn on_level_start(&self, _level: usize, _number_of_parameters: usize) {}

    /// Called when a level finishes.
    fn on_level_complete(&self, _info: &LevelInfo) {}

    /// Called when the run completes successfully.
    fn on_complete(&self, _elapsed: Duration) {}

    /// Called when the run fails.
    fn on_error(&self, _error: &str) {}
}

/// Reports iterations and levels through `tracing`.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Iterations between two log lines.
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 50 }
    }
}

impl ConsoleProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self { log_interval: log_interval.max(1) }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        let last = info.iteration + 1 == info.total_iterations;
        if info.iteration % self.log_interval == 0 || last {
            let remaining = info
                .estimated_remaining
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());
            tracing::info!(
                "Level {} iter {}/{} ({:.1}%) | Metric: {:.6} | Gain: {:.2e} | ETA: {}",
                info.level,
                info.iteration + 1,
                info.total_iterations,
                info.progress_percent(),
                info.metric_value,
                info.learning_rate,
                remaining
            );
            if let Some(exact) = info.exact_metric_value {
                tracing::info!("  exact metric: {:.6}", exact);
            }
        }
    }

    fn on_start(&self, levels: usize) {
        tracing::info!("Registration started with {} levels", levels);
    }

    fn on_level_complete(&self, info: &LevelInfo) {
        tracing::info!(
            "Level {} finished after {} iterations ({} skipped) with metric {:.6}",
            info.level,
            info.iterations_run,
            info.skipped_iterations,
            info.final_metric_value
        );
    }

    fn on_complete(&self, elapsed: Duration) {
        tracing::info!("Registration completed in {:.2}s", elapsed.as_secs_f64());
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Registration failed: {}", error);
    }
}

/// Keeps every iteration and level report for later inspection.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
    levels: Arc<Mutex<Vec<LevelInfo>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded iterations in call order.
    pub fn get_history(&self) -> Vec<ProgressInfo> {
        lock(&self.history).clone()
    }

    /// Recorded level summaries in call order.
    pub fn get_levels(&self) -> Vec<LevelInfo> {
        lock(&self.levels).clone()
    }

    pub fn clear(&self) {
        lock(&self.history).clear();
        lock(&self.levels).clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        lock(&self.history).push(info.clone());
    }

    fn on_level_complete(&self, info: &LevelInfo) {
        lock(&self.levels).push(info.clone());
    }
}

/// Shared flag asking a running registration to stop.
///
/// Checked between iterations and between levels.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fans reports out to every registered callback.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Option<Instant>,
    level_start: Option<Instant>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    pub fn start(&mut self, levels: usize) {
        self.start_time = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_start(levels);
        }
    }

    pub fn start_level(&mut self, level: usize, number_of_parameters: usize) {
        self.level_start = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_level_start(level, number_of_parameters);
        }
    }

    /// Fill in timing and notify every callback.
    pub fn update(&self, mut info: ProgressInfo) {
        info.elapsed = self.elapsed();
        if let Some(level_start) = self.level_start {
            info.calculate_remaining(level_start.elapsed());
        }
        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    pub fn complete_level(&self, info: &LevelInfo) {
        for callback in &self.callbacks {
            callback.on_level_complete(info);
        }
    }

    pub fn complete(&self) {
        let elapsed = self.elapsed();
        for callback in &self.callbacks {
            callback.on_complete(elapsed);
        }
    }

    pub fn error(&self, error: &str) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }

    fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_info() {
        let info = ProgressInfo::new(0, 9, 10, -0.5, 0.01);
        assert_eq!(info.progress_percent(), 100.0);
        assert!(!info.skipped);
    }

    #[test]
    fn test_progress_info_remaining() {
        let mut info = ProgressInfo::new(1, 4, 10, -0.5, 0.01);
        info.calculate_remaining(Duration::from_secs(5));
        assert_eq!(info.estimated_remaining, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_history_callback_through_tracker() {
        let history = Arc::new(HistoryCallback::new());
        let mut tracker = ProgressTracker::new();
        tracker.add_callback(history.clone());
        tracker.add_callback(Arc::new(ConsoleProgressCallback::default()));

        tracker.start(1);
        tracker.start_level(0, 3);
        tracker.update(ProgressInfo::new(0, 0, 2, -0.1, 1.0));
        tracker.update(ProgressInfo::new(0, 1, 2, -0.2, 0.9));
        tracker.complete_level(&LevelInfo {
            level: 0,
            iterations_run: 2,
            skipped_iterations: 0,
            final_metric_value: -0.2,
        });
        tracker.complete();

        let recorded = history.get_history();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].iteration, 1);
        assert!(recorded[1].estimated_remaining.is_some());
        assert_eq!(history.get_levels().len(), 1);

        history.clear();
        assert!(history.get_history().is_empty());
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
