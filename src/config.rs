use crate::{
    poller::protocol::{Endpoint, EndpointError, Protocol},
    reminder::ReminderConfig,
    seqno::Seqno,
};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;
use url::Url;

pub const POLL_INTERVAL_RANGE_MS: RangeInclusive<u32> = 100..=500;

#[derive(Deserialize)]
struct PollConfigValidator {
    interval_ms: u32,
    protocol: Protocol,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("page global `{0}` is missing")]
    MissingGlobal(&'static str),
    #[error("`initial_seqno` must be a non-negative integer, got {0}")]
    InvalidSeqno(String),
    #[error("game name is empty")]
    EmptyGameName,
    #[error("poll interval of {0} ms is outside 100..=500 ms")]
    IntervalOutOfRange(u32),
    #[error("{effect} reminder period of {period_ms} ms is shorter than 100 ms")]
    EffectPeriodTooShort { effect: &'static str, period_ms: u32 },
    #[error("page location `{0}` is not a valid URL")]
    BadLocation(String),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

impl TryFrom<PollConfigValidator> for PollConfig {
    type Error = ConfigError;
    fn try_from(shadow: PollConfigValidator) -> Result<Self, Self::Error> {
        let PollConfigValidator {
            interval_ms,
            protocol,
        } = shadow;
        if !POLL_INTERVAL_RANGE_MS.contains(&interval_ms) {
            return Err(ConfigError::IntervalOutOfRange(interval_ms));
        }
        Ok(PollConfig {
            interval_ms,
            protocol,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PollConfigValidator")]
pub struct PollConfig {
    interval_ms: u32,
    protocol: Protocol,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            protocol: Protocol::default(),
        }
    }
}

impl PollConfig {
    pub fn new(interval_ms: u32, protocol: Protocol) -> Result<Self, ConfigError> {
        PollConfig::try_from(PollConfigValidator {
            interval_ms,
            protocol,
        })
    }

    pub const fn interval_ms(self) -> u32 {
        self.interval_ms
    }

    pub const fn protocol(self) -> Protocol {
        self.protocol
    }
}

/// Raw values the server template leaves on `window`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageGlobals {
    pub initial_seqno: Option<f64>,
    pub game_name: Option<String>,
    pub script_root: Option<String>,
    pub your_turn: Option<bool>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub initial_seqno: Seqno,
    pub your_turn: bool,
    pub poll: PollConfig,
    pub reminder: ReminderConfig,
}

impl ClientConfig {
    pub fn from_globals(
        globals: PageGlobals,
        poll: PollConfig,
        reminder: ReminderConfig,
    ) -> Result<Self, ConfigError> {
        let raw_seqno = globals
            .initial_seqno
            .ok_or(ConfigError::MissingGlobal("initial_seqno"))?;
        // JS numbers are integral up to 2^53, well within u64
        if !(raw_seqno >= 0.0 && raw_seqno.fract() == 0.0 && raw_seqno <= u64::MAX as f64) {
            return Err(ConfigError::InvalidSeqno(raw_seqno.to_string()));
        }
        let game_name = globals
            .game_name
            .ok_or(ConfigError::MissingGlobal("game_name"))?;
        if game_name.is_empty() {
            return Err(ConfigError::EmptyGameName);
        }
        let location = globals
            .location
            .ok_or(ConfigError::MissingGlobal("location"))?;
        let page_url =
            Url::parse(&location).map_err(|_| ConfigError::BadLocation(location.clone()))?;
        let endpoint = Endpoint::new(
            &page_url,
            globals.script_root.as_deref().unwrap_or_default(),
            &game_name,
            poll.protocol(),
        )?;
        Ok(Self {
            endpoint,
            initial_seqno: Seqno::new(raw_seqno as u64),
            your_turn: globals.your_turn.unwrap_or_default(),
            poll,
            reminder,
        })
    }
}
