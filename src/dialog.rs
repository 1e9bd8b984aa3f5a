use crate::{
    poller::Poller,
    schedule::{Scheduler, TaskHandle},
};
use log::{debug, warn};
use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

/// A group of cards the server renders into the page, such as the supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pile {
    pub id: String,
    pub title: String,
}

impl Pile {
    /// `None` for an element without an id, which could not be found again.
    pub fn new(id: String, title: Option<String>) -> Option<Self> {
        if id.is_empty() {
            return None;
        }
        let title = title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        Some(Self { id, title })
    }

    pub fn supply() -> Self {
        Self {
            id: String::from("supplycards"),
            title: String::from("Supply"),
        }
    }
}

struct LockInner {
    locked: Cell<bool>,
    generation: Cell<u64>,
    watchdog: RefCell<Option<TaskHandle>>,
}

impl LockInner {
    fn release(&self, generation: u64) {
        if self.generation.get() != generation || !self.locked.get() {
            return;
        }
        self.locked.set(false);
        let watchdog = self.watchdog.borrow_mut().take();
        drop(watchdog);
    }
}

/// Drops toggle requests that arrive while an animation is still running.
pub struct ToggleLock {
    inner: Rc<LockInner>,
    scheduler: Rc<dyn Scheduler>,
    settle_ms: u32,
}

/// Releases the [`ToggleLock`] it came from once the animation has finished.
#[must_use]
pub struct AnimationDone {
    lock: Weak<LockInner>,
    generation: u64,
}

impl AnimationDone {
    pub fn finish(self) {
        if let Some(lock) = self.lock.upgrade() {
            lock.release(self.generation);
        }
    }
}

impl ToggleLock {
    pub const DEFAULT_SETTLE_MS: u32 = 600;

    pub fn new(scheduler: Rc<dyn Scheduler>, settle_ms: u32) -> Self {
        Self {
            inner: Rc::new(LockInner {
                locked: Cell::new(false),
                generation: Cell::new(0),
                watchdog: RefCell::new(None),
            }),
            scheduler,
            settle_ms,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.get()
    }

    /// Takes the lock, or returns `None` while an animation is in flight.
    ///
    /// The lock is released by [`AnimationDone::finish`] or, should the
    /// animation never report back, `settle_ms` later.
    pub fn acquire(&self) -> Option<AnimationDone> {
        if self.inner.locked.get() {
            return None;
        }
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        self.inner.locked.set(true);
        let lock = Rc::downgrade(&self.inner);
        let watchdog = self.scheduler.once(
            self.settle_ms,
            Box::new(move || {
                if let Some(lock) = lock.upgrade() {
                    if lock.locked.get() && lock.generation.get() == generation {
                        warn!("pile animation never finished, releasing toggle lock");
                    }
                    lock.release(generation);
                }
            }),
        );
        *self.inner.watchdog.borrow_mut() = Some(watchdog);
        Some(AnimationDone {
            lock: Rc::downgrade(&self.inner),
            generation,
        })
    }
}

/// One slide animation the client has to play.
pub struct SlideStep {
    pub pile: String,
    pub expand: bool,
    pub done: AnimationDone,
}

/// Shows piles either in a modal dialog or a slide-out panel, keeping page
/// refresh off while any of them is open.
pub struct PileDialog {
    poller: Poller,
    showing: Option<String>,
    slide_lock: ToggleLock,
    slid_open: Option<String>,
}

impl PileDialog {
    pub fn new(poller: Poller, slide_lock: ToggleLock) -> Self {
        Self {
            poller,
            showing: None,
            slide_lock,
            slid_open: None,
        }
    }

    pub fn showing(&self) -> Option<&str> {
        self.showing.as_deref()
    }

    pub fn slid_open(&self) -> Option<&str> {
        self.slid_open.as_deref()
    }

    pub fn slide_locked(&self) -> bool {
        self.slide_lock.is_locked()
    }

    /// Returns false if `pile` is already on display.
    pub fn open(&mut self, pile: &str) -> bool {
        if self.showing.as_deref() == Some(pile) {
            return false;
        }
        debug!("showing pile {pile}");
        self.poller.suspend();
        self.showing = Some(pile.to_owned());
        true
    }

    /// Always turns page refresh back on and polls right away.
    pub fn close(&mut self) -> Option<String> {
        let closed = self.showing.take();
        debug!("closing pile dialog {closed:?}");
        self.poller.resume();
        closed
    }

    pub fn toggle_slide(&mut self, pile: &str) -> Option<SlideStep> {
        let Some(done) = self.slide_lock.acquire() else {
            debug!("ignoring toggle of {pile}, animation in flight");
            return None;
        };
        Some(match self.slid_open.take() {
            Some(open) => {
                self.poller.resume();
                SlideStep {
                    pile: open,
                    expand: false,
                    done,
                }
            }
            None => {
                self.poller.suspend();
                self.slid_open = Some(pile.to_owned());
                SlideStep {
                    pile: pile.to_owned(),
                    expand: true,
                    done,
                }
            }
        })
    }
}
