use super::{ActivityProbe, ProbeResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock probe for exercising the aggregator and poll loop without services
///
/// Returns scripted results in order, then repeats the last one.
pub struct MockProbe {
    name: String,
    script: Mutex<VecDeque<ProbeResult>>,
    last: Mutex<ProbeResult>,
    calls: Arc<AtomicUsize>,
}

impl MockProbe {
    /// Create a mock that returns `results` in order
    pub fn scripted<S: Into<String>>(name: S, results: Vec<ProbeResult>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(results.into()),
            last: Mutex::new(ProbeResult::Inactive),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that always returns `result`
    pub fn always<S: Into<String>>(name: S, result: ProbeResult) -> Self {
        Self::scripted(name, vec![result])
    }

    /// Handle to the number of `check` calls, usable after the probe is boxed
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ActivityProbe for MockProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut last = self.last.lock();
        if let Some(next) = self.script.lock().pop_front() {
            *last = next;
        }
        last.clone()
    }
}
