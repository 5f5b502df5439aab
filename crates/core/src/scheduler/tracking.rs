use serde_json::{Value, json};

use crate::{
    events::{EventKind, Metadata},
    scheduler::Scheduler,
};

/// Shortcuts for the events the storefront pages emit on render.
impl Scheduler {
    pub fn track_page_view(&self, path: &str) {
        self.track(EventKind::PageView, object(json!({ "path": path })));
    }

    pub fn track_room_view(&self, room_id: &str, room_name: &str) {
        self.track(
            EventKind::RoomView,
            object(json!({ "room_id": room_id, "room_name": room_name })),
        );
    }
}

fn object(value: Value) -> Option<Metadata> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
