use crate::{
    config::ConfigError,
    page::Page,
    schedule::{Scheduler, TaskHandle},
};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

/// Shortest alternation period a stored reminder config may ask for.
pub const MIN_EFFECT_PERIOD_MS: u32 = 100;

#[derive(Deserialize)]
#[serde(default)]
struct ReminderConfigValidator {
    flash_color: String,
    flash_period_ms: u32,
    title_text: String,
    title_period_ms: u32,
}

impl Default for ReminderConfigValidator {
    fn default() -> Self {
        Self {
            flash_color: String::from("#ffffdd"),
            flash_period_ms: 2000,
            title_text: String::from("Your turn!"),
            title_period_ms: 1000,
        }
    }
}

impl TryFrom<ReminderConfigValidator> for ReminderConfig {
    type Error = ConfigError;
    fn try_from(shadow: ReminderConfigValidator) -> Result<Self, Self::Error> {
        let ReminderConfigValidator {
            flash_color,
            flash_period_ms,
            title_text,
            title_period_ms,
        } = shadow;
        for (effect, period_ms) in [("flash", flash_period_ms), ("title", title_period_ms)] {
            if period_ms < MIN_EFFECT_PERIOD_MS {
                return Err(ConfigError::EffectPeriodTooShort { effect, period_ms });
            }
        }
        Ok(ReminderConfig {
            flash_color,
            flash_period_ms,
            title_text,
            title_period_ms,
        })
    }
}

/// Look of the turn reminder, persisted in local storage. Missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReminderConfigValidator")]
pub struct ReminderConfig {
    flash_color: String,
    flash_period_ms: u32,
    title_text: String,
    title_period_ms: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        let ReminderConfigValidator {
            flash_color,
            flash_period_ms,
            title_text,
            title_period_ms,
        } = ReminderConfigValidator::default();
        Self {
            flash_color,
            flash_period_ms,
            title_text,
            title_period_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderPhase {
    Idle,
    Reminding,
    Acknowledged,
}

struct OriginalLook {
    title: String,
    background: String,
}

/// Flashes the page until the player shows signs of life.
#[derive(Clone)]
pub struct TurnReminder {
    config: Rc<ReminderConfig>,
    scheduler: Rc<dyn Scheduler>,
    page: Rc<dyn Page>,
    phase: Rc<Cell<ReminderPhase>>,
    original: Rc<RefCell<Option<OriginalLook>>>,
    effects: Rc<RefCell<Vec<TaskHandle>>>,
}

impl TurnReminder {
    pub fn new(config: ReminderConfig, scheduler: Rc<dyn Scheduler>, page: Rc<dyn Page>) -> Self {
        Self {
            config: Rc::new(config),
            scheduler,
            page,
            phase: Rc::new(Cell::new(ReminderPhase::Idle)),
            original: Rc::new(RefCell::new(None)),
            effects: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn phase(&self) -> ReminderPhase {
        self.phase.get()
    }

    /// Returns false if a reminder is already running.
    pub fn start(&self) -> bool {
        if self.phase.get() == ReminderPhase::Reminding {
            return false;
        }
        let title = self.page.title();
        let background = self.page.background();

        let flash = self.alternate(
            self.config.flash_period_ms,
            self.config.flash_color.clone(),
            background.clone(),
            |page, color| page.set_background(color),
        );
        let blink = self.alternate(
            self.config.title_period_ms,
            self.config.title_text.clone(),
            title.clone(),
            |page, text| page.set_title(text),
        );
        *self.effects.borrow_mut() = vec![flash, blink];
        *self.original.borrow_mut() = Some(OriginalLook { title, background });
        self.phase.set(ReminderPhase::Reminding);
        info!("turn reminder started");
        true
    }

    /// Stops the reminder on the first pointer movement. Later calls do nothing.
    pub fn acknowledge(&self) -> bool {
        if self.phase.get() != ReminderPhase::Reminding {
            return false;
        }
        let effects = std::mem::take(&mut *self.effects.borrow_mut());
        drop(effects);
        if let Some(OriginalLook { title, background }) = self.original.borrow_mut().take() {
            self.page.set_title(&title);
            self.page.set_background(&background);
        }
        self.phase.set(ReminderPhase::Acknowledged);
        info!("turn reminder acknowledged");
        true
    }

    fn alternate(
        &self,
        period_ms: u32,
        highlight: String,
        original: String,
        apply: fn(&dyn Page, &str),
    ) -> TaskHandle {
        let page = self.page.clone();
        let mut lit = false;
        self.scheduler.every(
            period_ms,
            Box::new(move || {
                lit = !lit;
                apply(&*page, if lit { &highlight } else { &original });
            }),
        )
    }
}
