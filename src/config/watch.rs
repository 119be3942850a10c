// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Live AI settings with change notification
//!
//! The host pushes `CONFIGURATION_UPDATE` messages at any time. `ConfigSource`
//! keeps the latest block and calls every subscriber synchronously when the
//! value actually changes. Dropping a `Subscription` unregisters it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use super::settings::AiSettings;

type Listener = Arc<dyn Fn(&AiSettings) + Send + Sync>;

struct Inner {
    current: RwLock<AiSettings>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// Shared handle to the live AI settings
#[derive(Clone)]
pub struct ConfigSource {
    inner: Arc<Inner>,
}

impl ConfigSource {
    pub fn new(initial: AiSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(initial),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Snapshot of the current settings
    pub fn current(&self) -> AiSettings {
        self.inner
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the settings. Listeners run only when the value changed;
    /// returns whether it did.
    pub fn update(&self, settings: AiSettings) -> bool {
        {
            let mut current = self
                .inner
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *current == settings {
                return false;
            }
            *current = settings.clone();
        }

        // Listeners are cloned out so a callback may subscribe or drop a
        // subscription without deadlocking.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        tracing::debug!(listeners = listeners.len(), "AI settings changed");
        for listener in listeners {
            listener(&settings);
        }
        true
    }

    /// Register a change listener. It stays registered until the returned
    /// handle is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AiSettings) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(listener)));
        Subscription {
            id,
            source: Arc::downgrade(&self.inner),
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self::new(AiSettings::default())
    }
}

/// Registration handle returned by [`ConfigSource::subscribe`]
pub struct Subscription {
    id: u64,
    source: Weak<Inner>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.source.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .retain(|(id, _)| *id != self.id);
        }
    }
}
