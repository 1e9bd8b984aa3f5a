use crate::{
    config::PollConfig,
    page::Page,
    schedule::{Scheduler, TaskHandle},
    seqno::Seqno,
};
use log::{debug, info, warn};
use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

pub mod protocol;
use protocol::*;

/// What a poll reply means for the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Unchanged,
    Reload,
    /// Refresh is disabled, so the reply was dropped.
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    seqno: Seqno,
    refresh_enabled: bool,
}

impl PollState {
    pub fn new(seqno: Seqno) -> Self {
        Self {
            seqno,
            refresh_enabled: true,
        }
    }

    pub fn seqno(&self) -> Seqno {
        self.seqno
    }

    pub fn refresh_enabled(&self) -> bool {
        self.refresh_enabled
    }

    pub fn set_refresh_enabled(&mut self, enabled: bool) {
        self.refresh_enabled = enabled;
    }

    pub fn observe(&mut self, reply: Reply) -> Observation {
        if !self.refresh_enabled {
            return Observation::Suppressed;
        }
        let changed = match reply {
            Reply::Unchanged => false,
            Reply::Changed => true,
            // the held seqno moves on, so a repeat of the same value is quiet
            Reply::Seqno(seqno) => std::mem::replace(&mut self.seqno, seqno) != seqno,
        };
        if changed {
            Observation::Reload
        } else {
            Observation::Unchanged
        }
    }
}

struct PollerInner {
    endpoint: Endpoint,
    interval_ms: u32,
    scheduler: Rc<dyn Scheduler>,
    fetch: Rc<dyn Fetch>,
    page: Rc<dyn Page>,
    state: RefCell<PollState>,
    next_tick: RefCell<Option<TaskHandle>>,
    requests: Cell<u64>,
    /// Number of the request still waiting for its reply, if any.
    outstanding: Cell<Option<u64>>,
}

/// Reloads the page whenever the server reports a newer game state.
///
/// Cloning yields another handle to the same poller.
#[derive(Clone)]
pub struct Poller {
    inner: Rc<PollerInner>,
}

impl Poller {
    pub fn new(
        endpoint: Endpoint,
        config: PollConfig,
        initial_seqno: Seqno,
        scheduler: Rc<dyn Scheduler>,
        fetch: Rc<dyn Fetch>,
        page: Rc<dyn Page>,
    ) -> Self {
        Self {
            inner: Rc::new(PollerInner {
                endpoint,
                interval_ms: config.interval_ms(),
                scheduler,
                fetch,
                page,
                state: RefCell::new(PollState::new(initial_seqno)),
                next_tick: RefCell::new(None),
                requests: Cell::new(0),
                outstanding: Cell::new(None),
            }),
        }
    }

    pub fn state(&self) -> PollState {
        *self.inner.state.borrow()
    }

    /// Number of poll requests issued so far.
    pub fn requests(&self) -> u64 {
        self.inner.requests.get()
    }

    pub fn is_outstanding(&self) -> bool {
        self.inner.outstanding.get().is_some()
    }

    pub fn is_scheduled(&self) -> bool {
        self.inner.next_tick.borrow().is_some()
    }

    pub fn start(&self) {
        info!(
            "polling {} every {} ms",
            self.inner.endpoint.url(self.state().seqno()),
            self.inner.interval_ms
        );
        self.schedule();
    }

    pub fn suspend(&self) {
        self.inner.state.borrow_mut().set_refresh_enabled(false);
        self.inner.next_tick.borrow_mut().take();
        info!("page refresh suspended");
    }

    /// Re-enables refresh and polls at once, unless a request from before the
    /// suspension is still open; its reply then counts as the fresh poll.
    pub fn resume(&self) {
        self.inner.state.borrow_mut().set_refresh_enabled(true);
        info!("page refresh resumed");
        self.poll_now();
    }

    pub fn poll_now(&self) {
        self.inner.next_tick.borrow_mut().take();
        self.tick();
    }

    fn schedule(&self) {
        let weak: Weak<PollerInner> = Rc::downgrade(&self.inner);
        let handle = self.inner.scheduler.once(
            self.inner.interval_ms,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Poller { inner }.tick();
                }
            }),
        );
        let previous = self.inner.next_tick.borrow_mut().replace(handle);
        drop(previous);
    }

    fn tick(&self) {
        let fired = self.inner.next_tick.borrow_mut().take();
        drop(fired);
        let state = self.state();
        if !state.refresh_enabled() {
            debug!("refresh disabled, not polling");
            return;
        }
        if let Some(number) = self.inner.outstanding.get() {
            debug!("poll #{number} still open, waiting for its reply");
            return;
        }
        let number = self.inner.requests.get() + 1;
        self.inner.requests.set(number);
        self.inner.outstanding.set(Some(number));
        let url = self.inner.endpoint.url(state.seqno());
        debug!("poll #{number} {url}");
        let poller = self.clone();
        self.inner
            .fetch
            .get(url, Box::new(move |result| {
                poller.on_reply(number, result);
            }));
    }

    fn on_reply(&self, number: u64, result: Result<String, FetchError>) -> Observation {
        let latest = self.inner.outstanding.get() == Some(number);
        if latest {
            self.inner.outstanding.set(None);
        }
        let reply = result.and_then(|body| self.inner.endpoint.protocol().decode(&body));
        let observation = match reply {
            Ok(reply) => self.inner.state.borrow_mut().observe(reply),
            Err(err) => {
                warn!("poll failed, treating as unchanged: {err}");
                if self.state().refresh_enabled() {
                    Observation::Unchanged
                } else {
                    Observation::Suppressed
                }
            }
        };
        match observation {
            Observation::Suppressed => {
                debug!("reply arrived while refresh is disabled, dropping it");
            }
            Observation::Reload => {
                info!("game advanced to seqno {}, reloading", self.state().seqno());
                self.inner.page.reload();
            }
            Observation::Unchanged => {}
        }
        // only the newest request may continue the chain
        if observation != Observation::Suppressed {
            if latest {
                self.schedule();
            } else {
                debug!("reply to superseded poll #{number}, not rescheduling");
            }
        }
        observation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFetch, ManualScheduler, RecordingPage};
    use url::Url;

    struct Harness {
        scheduler: Rc<ManualScheduler>,
        fetch: Rc<FakeFetch>,
        page: Rc<RecordingPage>,
        poller: Poller,
    }

    fn harness(protocol: Protocol, seqno: u64) -> Harness {
        let scheduler = Rc::new(ManualScheduler::new());
        let fetch = Rc::new(FakeFetch::new());
        let page = Rc::new(RecordingPage::new("Domination", ""));
        let endpoint = Endpoint::new(
            &Url::parse("http://localhost:5000/game/friday").unwrap(),
            "",
            "friday",
            protocol,
        )
        .unwrap();
        let poller = Poller::new(
            endpoint,
            PollConfig::new(100, protocol).unwrap(),
            Seqno::new(seqno),
            scheduler.clone(),
            fetch.clone(),
            page.clone(),
        );
        Harness {
            scheduler,
            fetch,
            page,
            poller,
        }
    }

    #[test]
    fn observe_equal_seqno_is_unchanged() {
        for seqno in [0, 1, 17, u64::MAX] {
            let mut state = PollState::new(Seqno::new(seqno));
            assert_eq!(
                state.observe(Reply::Seqno(Seqno::new(seqno))),
                Observation::Unchanged
            );
            assert_eq!(state.seqno(), Seqno::new(seqno));
        }
    }

    #[test]
    fn observe_new_seqno_reloads_once() {
        let mut state = PollState::new(Seqno::new(3));
        assert_eq!(state.observe(Reply::Seqno(Seqno::new(4))), Observation::Reload);
        assert_eq!(state.seqno(), Seqno::new(4));
        assert_eq!(
            state.observe(Reply::Seqno(Seqno::new(4))),
            Observation::Unchanged
        );
        assert_eq!(state.observe(Reply::Seqno(Seqno::new(5))), Observation::Reload);
        assert_eq!(state.seqno(), Seqno::new(5));
        assert_eq!(state.observe(Reply::Changed), Observation::Reload);
    }

    #[test]
    fn observe_is_suppressed_while_refresh_disabled() {
        let mut state = PollState::new(Seqno::new(3));
        state.set_refresh_enabled(false);
        for reply in [Reply::Changed, Reply::Seqno(Seqno::new(9)), Reply::Unchanged] {
            assert_eq!(state.observe(reply), Observation::Suppressed);
        }
        assert_eq!(state.seqno(), Seqno::new(3));
    }

    #[test]
    fn polls_after_interval_with_held_seqno() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        h.scheduler.advance(99);
        assert_eq!(h.fetch.sent(), 0);
        h.scheduler.advance(1);
        assert_eq!(h.fetch.sent(), 1);
        assert_eq!(
            h.fetch.url(0).as_str(),
            "http://localhost:5000/game/get_seqno/friday?seqno=5"
        );
    }

    #[test]
    fn same_seqno_reschedules_without_reload() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        h.scheduler.advance(100);
        h.fetch.respond_last(Ok(r#"{"result": 5}"#));
        assert_eq!(h.page.reloads.get(), 0);
        assert!(h.poller.is_scheduled());
        h.scheduler.advance(100);
        assert_eq!(h.fetch.sent(), 2);
    }

    #[test]
    fn new_seqno_reloads_exactly_once() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        h.scheduler.advance(100);
        h.fetch.respond_last(Ok(r#"{"result": 6}"#));
        assert_eq!(h.page.reloads.get(), 1);
        assert_eq!(h.poller.state().seqno(), Seqno::new(6));

        h.scheduler.advance(100);
        assert_eq!(
            h.fetch.url(1).as_str(),
            "http://localhost:5000/game/get_seqno/friday?seqno=6"
        );
        h.fetch.respond_last(Ok(r#"{"result": 6}"#));
        assert_eq!(h.page.reloads.get(), 1);
    }

    #[test]
    fn every_later_change_reloads_again() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        for (seqno, reloads) in [(6, 1), (7, 2), (7, 2), (9, 3)] {
            h.scheduler.advance(100);
            h.fetch
                .respond_last(Ok(format!(r#"{{"result": {seqno}}}"#).as_str()));
            assert_eq!(h.page.reloads.get(), reloads, "after seqno {seqno}");
        }
        assert_eq!(h.poller.requests(), 4);
    }

    #[test]
    fn check_protocol_reloads_on_any_payload() {
        let h = harness(Protocol::CheckAndReload, 2);
        h.poller.start();
        h.scheduler.advance(100);
        h.fetch.respond_last(Ok("null"));
        assert_eq!(h.page.reloads.get(), 0);
        h.scheduler.advance(100);
        h.fetch.respond_last(Ok("{}"));
        assert_eq!(h.page.reloads.get(), 1);
        assert!(h
            .fetch
            .url(1)
            .as_str()
            .ends_with("/game/check_seqno/friday?seqno=2"));
    }

    #[test]
    fn failed_poll_counts_as_unchanged() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        h.scheduler.advance(100);
        h.fetch
            .respond_last(Err(FetchError::Network(String::from("offline"))));
        h.scheduler.advance(100);
        h.fetch.respond_last(Err(FetchError::Status(502)));
        h.scheduler.advance(100);
        h.fetch.respond_last(Ok("<html>"));
        assert_eq!(h.page.reloads.get(), 0);
        assert_eq!(h.poller.state().seqno(), Seqno::new(5));
        h.scheduler.advance(100);
        assert_eq!(h.fetch.sent(), 4);
    }

    #[test]
    fn suspended_poller_ignores_replies_and_stops_ticking() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        h.scheduler.advance(100);
        h.poller.suspend();
        h.fetch.respond_last(Ok(r#"{"result": 8}"#));
        assert_eq!(h.page.reloads.get(), 0);
        assert_eq!(h.poller.state().seqno(), Seqno::new(5));
        assert!(!h.poller.is_scheduled());
        h.scheduler.advance(10_000);
        assert_eq!(h.fetch.sent(), 1);
    }

    #[test]
    fn resume_polls_immediately_and_catches_missed_change() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        h.poller.suspend();
        h.scheduler.advance(1000);
        assert_eq!(h.fetch.sent(), 0);
        h.poller.resume();
        assert!(h.poller.state().refresh_enabled());
        assert_eq!(h.fetch.sent(), 1);
        h.fetch.respond_last(Ok(r#"{"result": 7}"#));
        assert_eq!(h.page.reloads.get(), 1);
    }

    #[test]
    fn resume_waits_for_request_still_open() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        h.scheduler.advance(100);
        h.poller.suspend();
        h.poller.resume();
        assert_eq!(h.fetch.sent(), 1);
        assert!(h.poller.is_outstanding());
        assert!(!h.poller.is_scheduled());

        h.fetch.respond(0, Ok(r#"{"result": 6}"#));
        assert_eq!(h.page.reloads.get(), 1);
        assert!(!h.poller.is_outstanding());
        assert_eq!(h.scheduler.pending(), 1);

        h.scheduler.advance(100);
        assert_eq!(h.poller.requests(), 2);
    }

    #[test]
    fn repeated_dialog_cycles_keep_one_request_open() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        h.scheduler.advance(100);
        for cycle in 0..3 {
            h.poller.suspend();
            h.poller.resume();
            assert_eq!(h.fetch.in_flight(), 1, "cycle {cycle}");
            h.fetch.respond_last(Ok(r#"{"result": 5}"#));
            h.scheduler.advance(100);
            assert!(h.fetch.in_flight() <= 1, "cycle {cycle}");
            assert!(h.scheduler.pending() <= 1, "cycle {cycle}");
        }
        assert_eq!(h.poller.requests(), 4);
        assert_eq!(h.fetch.in_flight(), 1);
        assert_eq!(h.page.reloads.get(), 0);
    }

    #[test]
    fn reply_suppressed_during_dialog_frees_the_next_poll() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        h.scheduler.advance(100);
        h.poller.suspend();
        h.fetch.respond(0, Ok(r#"{"result": 8}"#));
        assert!(!h.poller.is_outstanding());

        h.poller.resume();
        assert_eq!(h.fetch.sent(), 2);
        assert_eq!(
            h.fetch.url(1).as_str(),
            "http://localhost:5000/game/get_seqno/friday?seqno=5"
        );
        h.fetch.respond(1, Ok(r#"{"result": 8}"#));
        assert_eq!(h.page.reloads.get(), 1);
        assert_eq!(h.scheduler.pending(), 1);
    }

    #[test]
    fn dropping_last_handle_stops_polling() {
        let h = harness(Protocol::CompareAndReload, 5);
        h.poller.start();
        drop(h.poller);
        h.scheduler.advance(1000);
        assert_eq!(h.fetch.sent(), 0);
    }
}
