//! Progress notification fan-out

use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::trace;

use crate::core::types::ProgressEvent;

/// Receives session progress without polling
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Forward events into a channel, e.g. for a UI task
impl ProgressObserver for mpsc::UnboundedSender<ProgressEvent> {
    fn on_progress(&self, event: &ProgressEvent) {
        // A closed receiver just means nobody is listening anymore.
        let _ = self.send(event.clone());
    }
}

/// Registered progress observers
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn ProgressObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, observer: Arc<dyn ProgressObserver>) {
        self.observers.write().await.push(observer);
    }

    pub async fn notify(&self, event: ProgressEvent) {
        trace!(?event, "Progress");
        for observer in self.observers.read().await.iter() {
            observer.on_progress(&event);
        }
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }
}
