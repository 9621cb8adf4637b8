//! Step-by-step progress output
//!
//! Every pipeline step gets a timestamped start line and a result line with
//! its duration. Everything goes to stderr; stdout carries the context JSON.

use chrono::Local;
use colored::Colorize;
use mgrboot_core::{BootstrapError, BootstrapStep, StepObserver};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum StepResult {
    Success { duration: Duration },
    Failed { error: String, duration: Duration },
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Success { duration, .. } | Self::Failed { duration, .. } => *duration,
        }
    }
}

pub struct StepLogger {
    start_time: Instant,
    step_results: Vec<(BootstrapStep, StepResult)>,
    current_step: Option<(BootstrapStep, Instant)>,
}

impl StepLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            step_results: Vec::new(),
            current_step: None,
        }
    }

    /// Indented follow-up line under the current step
    pub fn log_detail(&self, message: &str) {
        eprintln!("[{}]   → {}", timestamp().dimmed(), message.cyan());
    }

    pub fn print_summary(&self, title: &str) {
        let total_duration = self.start_time.elapsed();
        let error_count = self
            .step_results
            .iter()
            .filter(|(_, result)| !result.is_success())
            .count();
        let slowest_step = self
            .step_results
            .iter()
            .map(|(step, result)| (step, result.duration()))
            .max_by_key(|(_, d)| *d);

        eprintln!();
        eprintln!("{}", "═".repeat(44));
        eprintln!("Summary: {}", title.cyan().bold());
        eprintln!("{}", "─".repeat(44));
        eprintln!("Total time:    {}", format_duration(total_duration).green());
        if let Some((step, duration)) = slowest_step {
            eprintln!(
                "Slowest step:  {} ({})",
                step.name(),
                format_duration(duration)
            );
        }
        if error_count > 0 {
            eprintln!("Errors:        {}", error_count.to_string().red().bold());
            for (step, error) in self.failures() {
                eprintln!("  {} {}: {}", "✗".red(), step.name(), error);
            }
        } else {
            eprintln!("Errors:        {}", "0".green());
        }
        eprintln!("{}", "═".repeat(44));
    }

    /// Failed steps with their error text, in execution order
    pub fn failures(&self) -> Vec<(BootstrapStep, &str)> {
        self.step_results
            .iter()
            .filter_map(|(step, result)| match result {
                StepResult::Failed { error, .. } => Some((*step, error.as_str())),
                StepResult::Success { .. } => None,
            })
            .collect()
    }

    fn finish(&mut self, step: BootstrapStep) -> Duration {
        match self.current_step.take() {
            Some((current, start)) if current == step => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

impl Default for StepLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl StepObserver for StepLogger {
    fn step_started(&mut self, step: BootstrapStep) {
        eprintln!("[{}] {} {}", timestamp().dimmed(), "▶".cyan(), step.name());
        self.current_step = Some((step, Instant::now()));
    }

    fn step_succeeded(&mut self, step: BootstrapStep, detail: &str) {
        let duration = self.finish(step);
        eprintln!(
            "[{}] {} {} ({})",
            timestamp().dimmed(),
            "✓".green().bold(),
            detail,
            format_duration(duration).dimmed()
        );
        self.step_results
            .push((step, StepResult::Success { duration }));
    }

    fn step_failed(&mut self, step: BootstrapStep, error: &BootstrapError) {
        let duration = self.finish(step);
        let error = error.to_string();
        eprintln!(
            "[{}] {} {}: {}",
            timestamp().dimmed(),
            "✗".red().bold(),
            step.name(),
            error.red()
        );
        self.step_results
            .push((step, StepResult::Failed { error, duration }));
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else if total_secs >= 1 {
        format!("{}.{}s", total_secs, millis / 100)
    } else {
        format!("{}ms", millis)
    }
}
