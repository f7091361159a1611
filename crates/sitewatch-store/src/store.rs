use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use sitewatch_core::{MonitorTarget, StoreError, TargetKey};
use tracing::debug;

/// Parameters of the `add` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTarget {
    pub url: String,
    pub selector: String,
    pub frequency_minutes: u32,
    pub use_rendered_fetch: bool,
    pub capture_evidence: bool,
}

impl NewTarget {
    pub fn new(url: impl Into<String>, selector: impl Into<String>, frequency_minutes: u32) -> Self {
        Self {
            url: url.into(),
            selector: selector.into(),
            frequency_minutes,
            use_rendered_fetch: false,
            capture_evidence: false,
        }
    }

    fn validate(&self) -> Result<(), StoreError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(StoreError::InvalidTarget("url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(StoreError::InvalidTarget(format!(
                "url must start with http:// or https://: {url}"
            )));
        }
        if self.selector.trim().is_empty() {
            return Err(StoreError::InvalidTarget("selector must not be empty".into()));
        }
        if self.frequency_minutes == 0 {
            return Err(StoreError::InvalidTarget(
                "frequency_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn into_target(self) -> MonitorTarget {
        let mut target = MonitorTarget::new(self.url.trim(), self.selector, self.frequency_minutes);
        target.use_rendered_fetch = self.use_rendered_fetch;
        target.capture_evidence = self.capture_evidence;
        target
    }
}

#[derive(Debug, Clone)]
pub struct TargetStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl TargetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "targets.json".into());
        lock_name.push(".lock");
        Self {
            lock_path: path.with_file_name(lock_name),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every target. A store that does not exist yet is empty.
    pub fn load(&self) -> Result<Vec<MonitorTarget>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the whole store with `targets`.
    pub fn save(&self, targets: &[MonitorTarget]) -> Result<(), StoreError> {
        self.with_write_lock(|| self.write_unlocked(targets))
    }

    /// Append a new target unless its `(url, selector)` pair is already present.
    ///
    /// Load, duplicate check, append and save all happen under the writer
    /// lock, so two concurrent `add` calls cannot both succeed for one pair.
    pub fn add(&self, new_target: NewTarget) -> Result<MonitorTarget, StoreError> {
        new_target.validate()?;
        self.with_write_lock(|| {
            let mut targets = self.load()?;
            let key = TargetKey::new(new_target.url.trim(), new_target.selector.clone());
            if targets.iter().any(|existing| existing.matches(&key)) {
                return Err(StoreError::DuplicateTarget {
                    url: key.url,
                    selector: key.selector,
                });
            }

            let target = new_target.into_target();
            targets.push(target.clone());
            self.write_unlocked(&targets)?;
            debug!(target = %key, "Target added");
            Ok(target)
        })
    }

    /// Persist `targets` without losing entries that only exist on disk.
    ///
    /// Entries on disk whose key matches one of `targets` are replaced by the
    /// in-memory version; entries unknown to the caller (for example added by
    /// a concurrent `sitewatch add`) are kept in place. Targets the caller
    /// knows about but that are missing on disk are appended.
    pub fn merge_save(&self, targets: &[MonitorTarget]) -> Result<(), StoreError> {
        self.with_write_lock(|| {
            let on_disk = self.load()?;
            let mut pending: HashMap<TargetKey, &MonitorTarget> =
                targets.iter().map(|target| (target.key(), target)).collect();

            let mut merged = Vec::with_capacity(on_disk.len().max(targets.len()));
            for existing in on_disk {
                match pending.remove(&existing.key()) {
                    Some(updated) => merged.push(updated.clone()),
                    None => merged.push(existing),
                }
            }
            // Preserve the caller's order for anything not yet on disk.
            for target in targets {
                if pending.remove(&target.key()).is_some() {
                    merged.push(target.clone());
                }
            }

            self.write_unlocked(&merged)
        })
    }

    pub fn find(&self, key: &TargetKey) -> Result<Option<MonitorTarget>, StoreError> {
        Ok(self
            .load()?
            .into_iter()
            .find(|target| target.matches(key)))
    }

    fn with_write_lock<T>(
        &self,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.ensure_parent_dir()?;
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|err| StoreError::io(&self.lock_path, err))?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock.write().map_err(|err| StoreError::Lock {
            path: self.lock_path.clone(),
            message: err.to_string(),
        })?;

        f()
    }

    /// Write data atomically using temp-file + rename. Caller holds the lock.
    fn write_unlocked(&self, targets: &[MonitorTarget]) -> Result<(), StoreError> {
        self.ensure_parent_dir()?;
        let parent = self.parent_dir();
        let json = serde_json::to_vec_pretty(targets).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|err| StoreError::io(&parent, err))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|err| StoreError::io(tmp.path(), err))?;
        tmp.persist(&self.path)
            .map_err(|err| StoreError::io(&self.path, err.error))?;
        Ok(())
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn ensure_parent_dir(&self) -> Result<(), StoreError> {
        let parent = self.parent_dir();
        fs::create_dir_all(&parent).map_err(|err| StoreError::io(&parent, err))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
