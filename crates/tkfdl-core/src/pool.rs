//! Bounded pool of reusable browser-engine instances.
//!
//! Instances are handed out reset (no history, no cache, no pending load)
//! and detached from any parent view. Returned instances are reset the same
//! way and kept for reuse while fewer than `capacity` are idle; beyond that
//! they are destroyed. The free list is LIFO and sits behind one mutex.
//!
//! The pool is an ordinary value: whoever builds it owns it and passes it
//! to the screens that need it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::DownloadError;

pub const DEFAULT_CAPACITY: usize = 3;

/// Operations the pool needs from a browser engine instance.
pub trait BrowserEngine {
    /// Remove the instance from whatever view hierarchy holds it.
    fn detach_from_parent(&mut self);
    fn stop_loading(&mut self);
    fn clear_history(&mut self);
    fn clear_cache(&mut self);
    /// Navigate to an empty page so no previous document stays visible.
    fn load_blank(&mut self);
    /// Apply the standard settings (scripts, storage, zoom, user agent).
    fn configure(&mut self);
    fn destroy(self)
    where
        Self: Sized;
}

pub struct BrowserPool<E, F> {
    capacity: usize,
    factory: F,
    idle: Mutex<Vec<E>>,
}

impl<E, F> BrowserPool<E, F>
where
    E: BrowserEngine,
    F: Fn() -> E,
{
    pub fn new(capacity: usize, factory: F) -> Self {
        BrowserPool {
            capacity,
            factory,
            idle: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle instances waiting for reuse.
    pub fn idle_len(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Take an instance: the most recently released one, or a new one.
    pub fn acquire(&self) -> E {
        let reused = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
        let mut engine = match reused {
            Some(engine) => {
                debug!("reusing pooled browser instance");
                engine
            }
            None => {
                debug!("creating browser instance");
                (self.factory)()
            }
        };
        engine.detach_from_parent();
        reset(&mut engine);
        engine.configure();
        engine
    }

    /// Give an instance back. Destroyed if the pool is already full.
    pub fn release(&self, mut engine: E) {
        engine.detach_from_parent();
        reset(&mut engine);
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < self.capacity {
            idle.push(engine);
            debug!(idle = idle.len(), "browser instance returned to pool");
        } else {
            drop(idle);
            debug!("pool full, destroying browser instance");
            engine.destroy();
        }
    }

    /// Destroy every idle instance.
    pub fn clear(&self) {
        let drained: Vec<E> = self
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for engine in drained {
            engine.destroy();
        }
    }

    /// Run `op` against the instance in `slot`, acquiring one if the slot is
    /// empty. If the instance turns out to be gone, it is dropped, a fresh one
    /// is acquired and `op` runs once more.
    pub fn with_engine<T>(
        &self,
        slot: &mut Option<E>,
        mut op: impl FnMut(&mut E) -> Result<T, DownloadError>,
    ) -> Result<T, DownloadError> {
        let engine = slot.get_or_insert_with(|| self.acquire());
        match op(engine) {
            Err(e) if e.is_transient() => {
                warn!(error = %e, "browser instance unavailable, re-acquiring");
                if let Some(stale) = slot.take() {
                    stale.destroy();
                }
                let engine = slot.insert(self.acquire());
                op(engine)
            }
            other => other,
        }
    }
}

fn reset<E: BrowserEngine>(engine: &mut E) {
    engine.stop_loading();
    engine.clear_history();
    engine.clear_cache();
    engine.load_blank();
}

/// Page address used by [`BrowserEngine::load_blank`] implementations.
pub const BLANK_PAGE: &str = "about:blank";

/// In-memory engine that tracks the state a real one would hold. Used by
/// the CLI demo and the tests.
#[derive(Debug)]
pub struct HeadlessEngine {
    id: usize,
    parent: Option<String>,
    history: Vec<String>,
    cached: usize,
    loading: bool,
    configured: bool,
    destroyed: Arc<AtomicUsize>,
}

impl HeadlessEngine {
    /// `destroyed` is incremented when the instance is destroyed.
    pub fn new(id: usize, destroyed: Arc<AtomicUsize>) -> Self {
        HeadlessEngine {
            id,
            parent: None,
            history: Vec::new(),
            cached: 0,
            loading: false,
            configured: false,
            destroyed,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn attach_to(&mut self, parent: &str) {
        self.parent = Some(parent.to_string());
    }

    /// Start loading `url`; it becomes a history entry and fills the cache.
    pub fn navigate(&mut self, url: &str) {
        self.history.push(url.to_string());
        self.cached += 1;
        self.loading = true;
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Pages navigated to since the last reset, `about:blank` excluded.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn cached_pages(&self) -> usize {
        self.cached
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }
}

impl BrowserEngine for HeadlessEngine {
    fn detach_from_parent(&mut self) {
        self.parent = None;
    }

    fn stop_loading(&mut self) {
        self.loading = false;
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }

    fn clear_cache(&mut self) {
        self.cached = 0;
    }

    fn load_blank(&mut self) {
        debug!(engine = self.id, "loading {}", BLANK_PAGE);
        self.loading = false;
    }

    fn configure(&mut self) {
        self.configured = true;
    }

    fn destroy(self) {
        debug!(engine = self.id, "browser instance destroyed");
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }
}
