//! Shared helpers for scheduler integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use tincture_scheduler::{current_context, RepeatingTask, Task, ThreadContext};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{timeout, Duration};

/// Which task ran, and on which context.
pub type Sighting = (String, Option<ThreadContext>);

/// Builds tasks that report where they ran.
#[derive(Clone)]
pub struct Recorder(UnboundedSender<Sighting>);

pub fn recorder() -> (Recorder, UnboundedReceiver<Sighting>) {
    let (tx, rx) = unbounded_channel();
    (Recorder(tx), rx)
}

impl Recorder {
    pub fn task(&self, label: &str) -> Task {
        let tx = self.0.clone();
        let label = label.to_string();
        Box::new(move || {
            let _ = tx.send((label, current_context()));
        })
    }

    pub fn repeating(&self, label: &str) -> RepeatingTask {
        let tx = self.0.clone();
        let label = label.to_string();
        Arc::new(move || {
            let _ = tx.send((label.clone(), current_context()));
        })
    }
}

/// Waits for the next sighting, failing the test after two seconds.
pub async fn next_sighting(rx: &mut UnboundedReceiver<Sighting>) -> Sighting {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a task to run")
        .expect("recorder closed")
}

/// Asserts nothing runs for `window`.
pub async fn assert_quiet(rx: &mut UnboundedReceiver<Sighting>, window: Duration) {
    if let Ok(Some(sighting)) = timeout(window, rx.recv()).await {
        panic!("unexpected task ran: {:?}", sighting);
    }
}
