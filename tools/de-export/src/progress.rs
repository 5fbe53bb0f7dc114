//! Export progress reporting
//!
//! A single producer drives the progress; an optional observer (the host progress
//! bar) is notified on the thread that created the reporter. Every update is also
//! logged as `"<percent>%: <text>"`.

use std::thread::ThreadId;

/// Receives `(fraction, text)` whenever the visible progress changes.
pub type ProgressObserver = Box<dyn FnMut(f32, &str) + Send>;

pub struct Progress {
    maximum: usize,
    current: usize,
    visible: bool,
    owner: ThreadId,
    observer: Option<ProgressObserver>,
    last_message: String,
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("maximum", &self.maximum)
            .field("current", &self.current)
            .field("visible", &self.visible)
            .finish()
    }
}

impl Progress {
    pub fn new(maximum: usize) -> Self {
        Self {
            maximum,
            current: 0,
            visible: false,
            owner: std::thread::current().id(),
            observer: None,
            last_message: String::new(),
        }
    }

    pub fn with_observer(mut self, observer: impl FnMut(f32, &str) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn percent(&self) -> usize {
        if self.maximum == 0 {
            100
        } else {
            self.current * 100 / self.maximum
        }
    }

    pub fn show(&mut self) {
        self.visible = true;
        self.log("started");
        self.notify("");
    }

    /// Set the progress to `value`, clamped to `[0, maximum]`.
    pub fn update(&mut self, value: usize, text: &str) {
        self.current = value.min(self.maximum);
        self.log(text);
        self.notify(text);
    }

    pub fn advance(&mut self, text: &str) {
        self.update(self.current + 1, text);
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.log("finished");
    }

    fn log(&mut self, text: &str) {
        self.last_message = format!("{}%: {}", self.percent(), text);
        tracing::info!("{}", self.last_message);
    }

    fn notify(&mut self, text: &str) {
        if !self.visible || std::thread::current().id() != self.owner {
            return;
        }
        let fraction = if self.maximum == 0 {
            1.0
        } else {
            self.current as f32 / self.maximum as f32
        };
        if let Some(observer) = self.observer.as_mut() {
            observer(fraction, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (Progress, Arc<Mutex<Vec<(f32, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = Progress::new(4).with_observer(move |fraction, text| {
            sink.lock().unwrap().push((fraction, text.to_string()));
        });
        (progress, seen)
    }

    #[test]
    fn test_advance_and_clamp() {
        let (mut progress, seen) = recording();
        progress.show();
        progress.advance("bones");
        progress.advance("mesh");
        assert_eq!(progress.percent(), 50);
        progress.update(99, "done");
        assert_eq!(progress.current(), 4);
        assert_eq!(progress.percent(), 100);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[1], (0.25, "bones".to_string()));
        assert_eq!(seen[3], (1.0, "done".to_string()));
    }

    #[test]
    fn test_every_call_is_logged() {
        let mut progress = Progress::new(2);
        progress.show();
        assert_eq!(progress.last_message, "0%: started");
        progress.advance("walk");
        assert_eq!(progress.last_message, "50%: walk");
        progress.update(2, "idle");
        assert_eq!(progress.last_message, "100%: idle");
        progress.hide();
        assert_eq!(progress.last_message, "100%: finished");
    }

    #[test]
    fn test_hidden_progress_does_not_notify() {
        let (mut progress, seen) = recording();
        progress.advance("quiet");
        progress.show();
        progress.hide();
        progress.advance("still quiet");
        assert_eq!(progress.current(), 2);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_other_thread_does_not_notify() {
        let (mut progress, seen) = recording();
        progress.show();
        let progress = std::thread::spawn(move || {
            progress.advance("worker");
            progress
        })
        .join()
        .unwrap();
        assert_eq!(progress.current(), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
