//! Stage progress display for pipeline runs

use crate::io::configuration::PROGRESS_BAR_WIDTH;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::LazyLock;
use std::time::Duration;

static STAGE_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template(&format!(
            "[{{elapsed_precise}}] Stages: [{{bar:{PROGRESS_BAR_WIDTH}.cyan/blue}}] {{pos}}/{{len}} {{msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
});

static TASK_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template(&format!(
            "{{prefix:>12}} [{{bar:{PROGRESS_BAR_WIDTH}.green/white}}] {{pos}}/{{len}} {{msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ")
});

/// Coordinates an overall stage bar and one bar for the current task
///
/// The task bar is reused for every per-item loop (site extraction, model
/// fitting) and cleared between stages.
pub struct ProgressManager {
    multi_progress: MultiProgress,
    stage_bar: Option<ProgressBar>,
    task_bar: Option<ProgressBar>,
    completed: Vec<(String, Duration)>,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressManager {
    /// Create a progress manager with no bars yet
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            stage_bar: None,
            task_bar: None,
            completed: Vec::new(),
        }
    }

    /// Create the stage bar for `stage_count` stages
    pub fn initialize(&mut self, stage_count: usize) {
        let bar = ProgressBar::new(stage_count as u64);
        bar.set_style(STAGE_STYLE.clone());
        self.stage_bar = Some(self.multi_progress.add(bar));
    }

    /// Show the name of the stage now running
    pub fn start_stage(&self, name: &str) {
        if let Some(ref bar) = self.stage_bar {
            bar.set_message(name.to_string());
        }
    }

    /// Advance the stage bar and record how long the stage took
    pub fn complete_stage(&mut self, name: &str, elapsed: Duration) {
        if let Some(ref bar) = self.stage_bar {
            bar.inc(1);
        }
        if let Some(task) = self.task_bar.take() {
            task.finish_and_clear();
            self.multi_progress.remove(&task);
        }
        self.completed.push((name.to_string(), elapsed));
    }

    /// Start a per-item task bar, replacing any previous one
    pub fn start_task(&mut self, label: &str, total: usize) {
        if let Some(previous) = self.task_bar.take() {
            previous.finish_and_clear();
            self.multi_progress.remove(&previous);
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(TASK_STYLE.clone());
        bar.set_prefix(label.to_string());
        self.task_bar = Some(self.multi_progress.add(bar));
    }

    /// Advance the task bar by one item
    pub fn advance_task(&self, item: &str) {
        if let Some(ref bar) = self.task_bar {
            bar.set_message(item.to_string());
            bar.inc(1);
        }
    }

    /// Current position of the task bar, if one is active
    pub fn task_position(&self) -> Option<u64> {
        self.task_bar.as_ref().map(ProgressBar::position)
    }

    /// Stages completed so far with their durations
    pub fn completed_stages(&self) -> &[(String, Duration)] {
        &self.completed
    }

    /// Clean up all progress displays
    pub fn finish(&self) {
        if let Some(ref bar) = self.task_bar {
            bar.finish_and_clear();
        }
        if let Some(ref bar) = self.stage_bar {
            bar.finish_with_message("done");
        }
        let _ = self.multi_progress.clear();
    }
}
