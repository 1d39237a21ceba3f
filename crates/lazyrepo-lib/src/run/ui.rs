use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use console::Style;
use lazyrepo_task_id::TaskKey;

/// Hands out a stable rotation of prefix colors, one per task.
#[derive(Debug, Default)]
pub struct ColorSelector {
    next: AtomicUsize,
}

impl ColorSelector {
    pub fn next_style(&self) -> Style {
        let palette = [
            Style::new().cyan(),
            Style::new().magenta(),
            Style::new().green(),
            Style::new().yellow(),
            Style::new().blue(),
        ];
        let index = self.next.fetch_add(1, Ordering::Relaxed) % palette.len();
        palette[index].clone()
    }
}

/// Prefixes a task's output lines with its colored key.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    prefix: Option<Arc<str>>,
}

impl TaskLogger {
    pub fn new(key: &TaskKey, style: Style) -> Self {
        Self {
            prefix: Some(style.apply_to(key.as_str()).to_string().into()),
        }
    }

    /// A logger that swallows everything, for tests.
    pub fn discard() -> Self {
        Self { prefix: None }
    }

    /// One line of child process output.
    pub fn line(&self, line: &str) {
        if let Some(prefix) = &self.prefix {
            println!("{prefix}: {line}");
        }
    }

    /// A scheduler-level status note about the task.
    pub fn status(&self, message: &str) {
        if let Some(prefix) = &self.prefix {
            println!("{prefix}: {}", Style::new().dim().apply_to(message));
        }
    }
}
