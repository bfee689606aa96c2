// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Attachment guard: remembers which applications each probe has wrapped.
//!
//! The marker lives in a side-table keyed by probe name and application
//! identity instead of on the application itself. The application is the
//! object advice mutates, so two framework modules sharing one application,
//! or two probe instances with the same name, still wrap it once. Entries
//! hold a `Weak` back-reference, so an application that has been dropped
//! (and whose address may be reused) is never reported as attached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use once_cell::sync::Lazy;

use crate::framework::Application;

/// Process-wide guard shared by every probe.
pub static GLOBAL_ATTACHMENTS: Lazy<AttachmentGuard> = Lazy::new(AttachmentGuard::new);

type Key = (String, usize);

/// Identity of an application instance: the address of its shared allocation.
fn identity(application: &Arc<Application>) -> usize {
    Arc::as_ptr(application) as usize
}

/// `unattached -> attached` state per (probe name, application).
///
/// There is no transition back: once marked, a live application stays
/// attached for that probe name.
#[derive(Default)]
pub struct AttachmentGuard {
    attached: Mutex<HashMap<Key, Weak<Application>>>,
}

impl AttachmentGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `probe` has marked `application`.
    pub fn is_attached(&self, probe: &str, application: &Arc<Application>) -> bool {
        self.attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(probe.to_string(), identity(application)))
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Mark `application` as attached by `probe`.
    ///
    /// Returns `true` if this call performed the transition, `false` if it
    /// was already attached. Check and set happen under one lock, so among
    /// concurrent callers exactly one sees `true`.
    pub fn mark(&self, probe: &str, application: &Arc<Application>) -> bool {
        let mut attached = self.attached.lock().unwrap_or_else(PoisonError::into_inner);
        attached.retain(|_, weak| weak.strong_count() > 0);

        let key = (probe.to_string(), identity(application));
        if attached.contains_key(&key) {
            return false;
        }
        attached.insert(key, Arc::downgrade(application));
        true
    }

    /// Number of live (probe, application) pairs currently marked.
    pub fn len(&self) -> usize {
        self.attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for AttachmentGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentGuard")
            .field("attached", &self.len())
            .finish()
    }
}
