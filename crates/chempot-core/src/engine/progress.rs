/// Events emitted while loading phases and solving, for a front end to render.
#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    Message(String),
    /// Something the user should decide about, such as calculations that
    /// were found incomplete.
    Warning(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    pub fn message(&self, text: impl Into<String>) {
        self.report(Progress::Message(text.into()));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.report(Progress::Warning(text.into()));
    }

    /// Reports a fixed-length task, running `step` once per item.
    pub fn task<T, R>(&self, items: &[T], mut step: impl FnMut(&T) -> R) -> Vec<R> {
        self.report(Progress::TaskStart {
            total_steps: items.len() as u64,
        });
        let results = items
            .iter()
            .map(|item| {
                let result = step(item);
                self.report(Progress::TaskIncrement);
                result
            })
            .collect();
        self.report(Progress::TaskFinish);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn reporter_without_callback_is_silent() {
        ProgressReporter::new().report(Progress::Message("ignored".to_string()));
    }

    #[test]
    fn reporter_forwards_events_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(format!("{:?}", event));
        }));

        reporter.report(Progress::PhaseStart { name: "Solving" });
        reporter.report(Progress::TaskStart { total_steps: 2 });
        reporter.report(Progress::TaskIncrement);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].contains("Solving"));
    }

    #[test]
    fn task_reports_one_increment_per_item() {
        let count = Arc::new(Mutex::new(0usize));
        let sink = count.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            if matches!(event, Progress::TaskIncrement) {
                *sink.lock().unwrap() += 1;
            }
        }));

        let doubled = reporter.task(&[1, 2, 3], |x| x * 2);
        assert_eq!(doubled, vec![2, 4, 6]);
        assert_eq!(*count.lock().unwrap(), 3);
    }
}
