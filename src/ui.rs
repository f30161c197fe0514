//! The UI-owned execution context.
//!
//! Snapshots decoded on the transport side are handed over a bounded queue to
//! `UiContext::run`, which is the only place observers are ever invoked.
//! Observers therefore never run concurrently with each other.

use crate::model::FieldSnapshot;
use log::{debug, trace, warn};
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender};

pub trait Observer: Send {
    fn on_changed(&mut self, snapshot: &Arc<FieldSnapshot>);
}

impl<F> Observer for F
where
    F: FnMut(&Arc<FieldSnapshot>) + Send,
{
    fn on_changed(&mut self, snapshot: &Arc<FieldSnapshot>) {
        self(snapshot)
    }
}

/// Handle returned by `subscribe`; pass it back to detach the observer.
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription {
    pub(crate) id: u64,
}

pub(crate) enum UiEvent {
    Attach {
        id: u64,
        observer: Box<dyn Observer>,
        current: Arc<FieldSnapshot>,
    },
    Detach(u64),
    Publish(Arc<FieldSnapshot>),
}

/// Sending side of the UI queue, held by whoever produces snapshots.
#[derive(Clone)]
pub struct UiHandle {
    tx: Sender<UiEvent>,
}

impl UiHandle {
    /// Returns false if the UI context is gone.
    pub(crate) async fn post(&self, ev: UiEvent) -> bool {
        self.tx.send(ev).await.is_ok()
    }
}

pub struct UiContext {
    rx: Receiver<UiEvent>,
    observers: Vec<(u64, Box<dyn Observer>)>,
}

impl UiContext {
    pub fn new(capacity: usize) -> (UiContext, UiHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            UiContext { rx, observers: Vec::new() },
            UiHandle { tx },
        )
    }

    /// Drain the queue until every `UiHandle` is dropped.
    pub async fn run(mut self) {
        while let Some(ev) = self.rx.recv().await {
            self.dispatch(ev);
        }
        debug!("ui: queue closed; {} observer(s) released", self.observers.len());
    }

    fn dispatch(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::Attach { id, mut observer, current } => {
                trace!("ui: attach observer #{}", id);
                observer.on_changed(&current);
                self.observers.push((id, observer));
            }
            UiEvent::Detach(id) => {
                let before = self.observers.len();
                self.observers.retain(|(oid, _)| *oid != id);
                if self.observers.len() == before {
                    warn!("ui: detach of unknown observer #{}", id);
                }
            }
            UiEvent::Publish(snap) => {
                trace!("ui: publish match {} to {} observer(s)", snap.match_number, self.observers.len());
                for (_, o) in self.observers.iter_mut() {
                    o.on_changed(&snap);
                }
            }
        }
    }
}
