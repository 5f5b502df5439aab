use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    VisibilityChanged(Visibility),
    Unload,
}

impl LifecycleEvent {
    pub fn triggers_flush(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::VisibilityChanged(Visibility::Hidden) | LifecycleEvent::Unload
        )
    }
}

/// Page lifecycle signals raised by the host. A scheduler subscribes once,
/// on its first `initialize`.
#[derive(Clone)]
pub struct PageLifecycle {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl Default for PageLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl PageLifecycle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn visibility_changed(&self, visibility: Visibility) {
        self.emit(LifecycleEvent::VisibilityChanged(visibility));
    }

    pub fn unload(&self) {
        self.emit(LifecycleEvent::Unload);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    // Nobody listening is fine: the page may not have initialized telemetry.
    fn emit(&self, event: LifecycleEvent) {
        let _ = self.tx.send(event);
    }
}
