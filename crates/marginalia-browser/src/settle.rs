//! Deferred work: selection reads after pointer release, and drawing queued
//! decorations once layout has settled.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use marginalia_core::{AnnotationSession, Decorator, DocumentAdapter};

/// Run `f` once after `delay_ms`.
pub fn defer(delay_ms: u32, f: impl FnOnce() + 'static) {
    Timeout::new(delay_ms, f).forget();
}

/// A debounced timer: scheduling again replaces the previous callback.
pub struct SettleTimer {
    delay_ms: u32,
    pending: Option<Timeout>,
}

impl SettleTimer {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn schedule(&mut self, f: impl FnOnce() + 'static) {
        // Dropping a gloo Timeout cancels it.
        self.pending = Some(Timeout::new(self.delay_ms, f));
    }

    pub fn cancel(&mut self) {
        if let Some(timeout) = self.pending.take() {
            timeout.cancel();
        }
    }
}

/// Draw the session's queued decorations after the settle delay, then call
/// `after` with the number drawn.
///
/// Holds only a weak reference, so a session dropped in the meantime is a
/// no-op.
pub fn schedule_flush<A, D>(
    timer: &mut SettleTimer,
    session: &Rc<RefCell<AnnotationSession<A, D>>>,
    after: impl FnOnce(usize) + 'static,
) where
    A: DocumentAdapter + 'static,
    D: Decorator<A::Node> + 'static,
{
    let weak = Rc::downgrade(session);
    timer.schedule(move || {
        let Some(session) = weak.upgrade() else {
            return;
        };
        let drawn = match session.try_borrow_mut() {
            Ok(mut session) => session.flush_pending(),
            Err(_) => {
                tracing::warn!("session busy, decorations left queued");
                return;
            }
        };
        tracing::trace!(target: "marginalia::settle", drawn, "flushed queued decorations");
        after(drawn);
    });
}
