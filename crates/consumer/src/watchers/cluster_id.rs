//! Cluster id taken from the extracted archive.
//!
//! The watcher needs both a receipt event (to know which record the next
//! extraction belongs to) and an extraction event (to read the id file), so
//! it implements [`ConsumerWatcher`] and [`EngineWatcher`].

use std::path::Path;
use std::sync::Mutex;

use consumer_types::Record;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ConsumerWatcher, EngineWatcher};

/// Location of the cluster id inside an extracted archive.
const ID_FILE: [&str; 2] = ["config", "id"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Coordinates {
    topic: String,
    partition: i32,
    offset: i64,
}

#[derive(Debug, Default)]
struct State {
    pending: Option<Coordinates>,
    resolved: Option<(Coordinates, Option<String>)>,
}

#[derive(Debug, Default)]
pub struct ClusterIdWatcher {
    state: Mutex<State>,
}

impl ClusterIdWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the cluster id resolved for `record`, if an extraction happened
    /// for it.
    ///
    /// `Some(None)` means the archive was extracted but carried no valid id.
    pub fn take_cluster_name(&self, record: &Record) -> Option<Option<String>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.resolved.take() {
            Some((coords, name)) if coords == Coordinates::of(record) => Some(name),
            Some(other) => {
                debug!(
                    topic = %other.0.topic,
                    offset = other.0.offset,
                    "Discarding cluster id resolved for another record"
                );
                None
            }
            None => None,
        }
    }

    fn read_cluster_id(root: &Path) -> Option<String> {
        let path = ID_FILE.iter().fold(root.to_path_buf(), |p, part| p.join(part));
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "The archive doesn't contain a valid Cluster Id file ({}: {e}). Skipping its extraction",
                    path.display()
                );
                return None;
            }
        };

        let candidate = content.trim();
        match Uuid::parse_str(candidate) {
            Ok(_) => Some(candidate.to_string()),
            Err(_) => {
                warn!("The cluster id is not an UUID. Skipping its extraction");
                None
            }
        }
    }
}

impl Coordinates {
    fn of<V>(record: &Record<V>) -> Self {
        Self {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
        }
    }
}

impl ConsumerWatcher for ClusterIdWatcher {
    fn on_recv(&self, record: &Record) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pending = Some(Coordinates::of(record));
        state.resolved = None;
    }
}

impl EngineWatcher for ClusterIdWatcher {
    fn on_extract(&self, root: &Path) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(coords) = state.pending.take() else {
            warn!("Unexpected data flow: watched extraction event without a previous receiving event");
            return;
        };

        let cluster_id = Self::read_cluster_id(root);
        debug!(cluster_id = ?cluster_id, offset = coords.offset, "Resolved cluster id");
        state.resolved = Some((coords, cluster_id));
    }
}
