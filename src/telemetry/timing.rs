use std::time::{Duration, Instant};
use tracing::info;

/// Wall-clock durations per pipeline stage (login, universe, history, ...).
///
/// Stages may run more than once per process, so each keeps every sample
/// and reports mean ± standard deviation.
pub struct StageTimer {
    samples: dashmap::DashMap<String, Vec<Duration>>,
}

impl Default for StageTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTimer {
    pub fn new() -> Self {
        Self {
            samples: dashmap::DashMap::new(),
        }
    }

    pub fn record(&self, stage: &str, duration: Duration) {
        self.samples.entry(stage.to_string()).or_default().push(duration);
    }

    /// Start a timer that records on drop.
    pub fn start(&self, stage: &str) -> Timer<'_> {
        Timer {
            stage: stage.to_string(),
            start: Instant::now(),
            timer: self,
        }
    }

    /// (mean, population std dev, samples) in seconds.
    pub fn summary(&self, stage: &str) -> Option<(f64, f64, usize)> {
        stats(self.samples.get(stage)?.value())
    }

    /// Log every stage summary, slowest first.
    pub fn log_summary(&self) {
        let mut rows: Vec<(String, f64, f64, usize)> = self
            .samples
            .iter()
            .filter_map(|e| {
                let (mean, std, n) = stats(e.value())?;
                Some((e.key().clone(), mean, std, n))
            })
            .collect();
        rows.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (stage, mean, std, n) in rows {
            info!("Timing [{stage}]: {mean:.2} ± {std:.2} s over {n} run(s)");
        }
    }
}

fn stats(samples: &[Duration]) -> Option<(f64, f64, usize)> {
    if samples.is_empty() {
        return None;
    }
    let secs: Vec<f64> = samples.iter().map(Duration::as_secs_f64).collect();
    let n = secs.len() as f64;
    let mean = secs.iter().sum::<f64>() / n;
    let var = secs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt(), secs.len()))
}

pub struct Timer<'a> {
    stage: String,
    start: Instant,
    timer: &'a StageTimer,
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        self.timer.record(&self.stage, self.start.elapsed());
    }
}
