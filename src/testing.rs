use crate::{
    page::Page,
    poller::protocol::{Fetch, FetchCallback, FetchError},
    schedule::{Scheduler, TaskHandle},
};
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};
use url::Url;

enum Job {
    Once(Box<dyn FnOnce()>),
    Every(Box<dyn FnMut()>),
}

struct Task {
    due: u64,
    period: Option<u64>,
    job: Option<Job>,
}

#[derive(Default)]
struct Clock {
    now: u64,
    next_id: u64,
    tasks: BTreeMap<u64, Task>,
}

/// Virtual-time scheduler; tasks only run inside [`ManualScheduler::advance`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: Rc<RefCell<Clock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.clock.borrow().now
    }

    pub fn pending(&self) -> usize {
        self.clock.borrow().tasks.len()
    }

    fn insert(&self, delay: u64, period: Option<u64>, job: Job) -> TaskHandle {
        let mut clock = self.clock.borrow_mut();
        let id = clock.next_id;
        clock.next_id += 1;
        let due = clock.now + delay;
        clock.tasks.insert(
            id,
            Task {
                due,
                period,
                job: Some(job),
            },
        );
        let clock = Rc::downgrade(&self.clock);
        TaskHandle::new(move || {
            if let Some(clock) = clock.upgrade() {
                clock.borrow_mut().tasks.remove(&id);
            }
        })
    }

    pub fn advance(&self, ms: u64) {
        let target = self.now() + ms;
        loop {
            let next = {
                let clock = self.clock.borrow();
                clock
                    .tasks
                    .iter()
                    .filter(|(_, task)| task.due <= target && task.job.is_some())
                    .min_by_key(|&(&id, task)| (task.due, id))
                    .map(|(&id, task)| (id, task.due))
            };
            let Some((id, due)) = next else {
                break;
            };
            let job = {
                let mut clock = self.clock.borrow_mut();
                clock.now = due;
                let task = clock.tasks.get_mut(&id).expect("task vanished");
                let job = task.job.take();
                if task.period.is_none() {
                    clock.tasks.remove(&id);
                }
                job
            };
            match job {
                Some(Job::Once(run)) => run(),
                Some(Job::Every(mut run)) => {
                    run();
                    let mut clock = self.clock.borrow_mut();
                    if let Some(task) = clock.tasks.get_mut(&id) {
                        task.due += task.period.expect("repeating task without period");
                        task.job = Some(Job::Every(run));
                    }
                }
                None => {}
            }
        }
        self.clock.borrow_mut().now = target;
    }
}

impl Scheduler for ManualScheduler {
    fn once(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskHandle {
        self.insert(delay_ms.into(), None, Job::Once(task))
    }

    fn every(&self, period_ms: u32, task: Box<dyn FnMut()>) -> TaskHandle {
        assert!(period_ms > 0, "zero period would never let the clock advance");
        self.insert(period_ms.into(), Some(period_ms.into()), Job::Every(task))
    }
}

pub struct RecordingPage {
    pub reloads: Cell<usize>,
    pub title: RefCell<String>,
    pub background: RefCell<String>,
    pub title_writes: Cell<usize>,
}

impl RecordingPage {
    pub fn new(title: &str, background: &str) -> Self {
        Self {
            reloads: Cell::new(0),
            title: RefCell::new(title.to_owned()),
            background: RefCell::new(background.to_owned()),
            title_writes: Cell::new(0),
        }
    }
}

impl Page for RecordingPage {
    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }

    fn title(&self) -> String {
        self.title.borrow().clone()
    }

    fn set_title(&self, title: &str) {
        self.title_writes.set(self.title_writes.get() + 1);
        *self.title.borrow_mut() = title.to_owned();
    }

    fn background(&self) -> String {
        self.background.borrow().clone()
    }

    fn set_background(&self, color: &str) {
        *self.background.borrow_mut() = color.to_owned();
    }
}

/// Holds requests until the test answers them, in whatever order it likes.
#[derive(Default)]
pub struct FakeFetch {
    requests: RefCell<Vec<(Url, Option<FetchCallback>)>>,
}

impl FakeFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn in_flight(&self) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|(_, done)| done.is_some())
            .count()
    }

    pub fn url(&self, index: usize) -> Url {
        self.requests.borrow()[index].0.clone()
    }

    pub fn respond(&self, index: usize, reply: Result<&str, FetchError>) {
        let done = self.requests.borrow_mut()[index]
            .1
            .take()
            .expect("request already answered");
        done(reply.map(str::to_owned));
    }

    /// Answers the most recent request.
    pub fn respond_last(&self, reply: Result<&str, FetchError>) {
        let last = self.sent().checked_sub(1).expect("no request sent");
        self.respond(last, reply);
    }
}

impl Fetch for FakeFetch {
    fn get(&self, url: Url, done: FetchCallback) {
        self.requests.borrow_mut().push((url, Some(done)));
    }
}
