// SPDX-License-Identifier: GPL-3.0-only

//! Keeps probes and mutations of the same device apart

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

/// What a job needs exclusive access to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockScope {
    /// Every device, as a probe reads them all
    All,
    Device(String),
}

#[derive(Debug, Default)]
struct LockState {
    all: bool,
    devices: BTreeSet<String>,
}

impl LockState {
    fn try_take(&mut self, scope: &LockScope) -> bool {
        if self.all {
            return false;
        }
        match scope {
            LockScope::All if self.devices.is_empty() => {
                self.all = true;
                true
            }
            LockScope::All => false,
            LockScope::Device(path) => self.devices.insert(path.clone()),
        }
    }

    fn give_back(&mut self, scope: &LockScope) {
        match scope {
            LockScope::All => self.all = false,
            LockScope::Device(path) => {
                self.devices.remove(path);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceLocks {
    state: Arc<Mutex<LockState>>,
    released: Arc<Notify>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take `scope` without waiting
    pub fn try_acquire(&self, scope: LockScope) -> Option<DeviceGuard> {
        self.state().try_take(&scope).then(|| DeviceGuard {
            locks: self.clone(),
            scope,
        })
    }

    /// Wait until `scope` is free and take it
    pub async fn acquire(&self, scope: LockScope) -> DeviceGuard {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if let Some(guard) = self.try_acquire(scope.clone()) {
                return guard;
            }
            tracing::debug!("waiting for {scope:?}");
            released.await;
        }
    }
}

/// Held scope, given back on drop
#[derive(Debug)]
pub struct DeviceGuard {
    locks: DeviceLocks,
    scope: LockScope,
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.locks.state().give_back(&self.scope);
        self.locks.released.notify_waiters();
    }
}
