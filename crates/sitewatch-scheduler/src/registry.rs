use std::collections::BTreeMap;

use sitewatch_core::{MonitorTarget, TargetKey};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Unregistered,
    Running,
    Stopped,
}

struct Entry {
    target: MonitorTarget,
    handle: Option<JoinHandle<()>>,
}

/// Targets known to the running scheduler, indexed by `(url, selector)`.
///
/// Guarded by one mutex so registration and persistence are linearizable.
#[derive(Default)]
pub(crate) struct Registry {
    entries: BTreeMap<TargetKey, Entry>,
    /// In-memory state differs from what was last written to the store.
    pub(crate) dirty: bool,
    pub(crate) reconciler: Option<JoinHandle<()>>,
}

impl Registry {
    pub(crate) fn contains(&self, key: &TargetKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert without a task. Callers check `contains` first.
    pub(crate) fn insert(&mut self, target: MonitorTarget) {
        self.entries.insert(
            target.key(),
            Entry {
                target,
                handle: None,
            },
        );
    }

    pub(crate) fn attach(&mut self, key: &TargetKey, handle: JoinHandle<()>) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.handle = Some(handle);
        }
    }

    pub(crate) fn target(&self, key: &TargetKey) -> Option<&MonitorTarget> {
        self.entries.get(key).map(|entry| &entry.target)
    }

    /// Replace the stored target with the version produced by its task.
    pub(crate) fn update(&mut self, target: MonitorTarget) {
        if let Some(entry) = self.entries.get_mut(&target.key()) {
            entry.target = target;
            self.dirty = true;
        }
    }

    pub(crate) fn state(&self, key: &TargetKey) -> TargetState {
        match self.entries.get(key) {
            None => TargetState::Unregistered,
            Some(Entry {
                handle: Some(handle),
                ..
            }) if !handle.is_finished() => TargetState::Running,
            Some(_) => TargetState::Stopped,
        }
    }

    /// Detach every task handle, leaving all entries `Stopped`.
    pub(crate) fn take_handles(&mut self) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<_> = self
            .entries
            .values_mut()
            .filter_map(|entry| entry.handle.take())
            .collect();
        handles.extend(self.reconciler.take());
        handles
    }

    pub(crate) fn targets(&self) -> Vec<MonitorTarget> {
        self.entries
            .values()
            .map(|entry| entry.target.clone())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
