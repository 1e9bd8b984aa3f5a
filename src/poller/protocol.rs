use crate::seqno::Seqno;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use url::Url;

/// How the server tells the client that the game has moved on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Protocol {
    /// `check_seqno` answers `null` when nothing changed and any other value otherwise.
    CheckAndReload,
    /// `get_seqno` answers with the current sequence number.
    #[default]
    CompareAndReload,
}

/// Decoded answer of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Unchanged,
    Changed,
    Seqno(Seqno),
}

#[derive(Deserialize)]
struct SeqnoReply {
    result: Seqno,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("server answered with HTTP {0}")]
    Status(u16),
    #[error("malformed reply: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Protocol {
    pub const fn route(self) -> &'static str {
        match self {
            Protocol::CheckAndReload => "check_seqno",
            Protocol::CompareAndReload => "get_seqno",
        }
    }

    pub fn decode(self, body: &str) -> Result<Reply, FetchError> {
        match self {
            Protocol::CheckAndReload => {
                let payload: serde_json::Value = serde_json::from_str(body)?;
                Ok(if payload.is_null() {
                    Reply::Unchanged
                } else {
                    Reply::Changed
                })
            }
            Protocol::CompareAndReload => {
                let SeqnoReply { result } = serde_json::from_str(body)?;
                Ok(Reply::Seqno(result))
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("`{0}` cannot serve as a base for the poll endpoint")]
    CannotBeABase(String),
}

/// Poll URL of one game: `{root}/game/{route}/{game_name}?seqno={n}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    protocol: Protocol,
}

impl Endpoint {
    pub fn new(
        page_url: &Url,
        script_root: &str,
        game_name: &str,
        protocol: Protocol,
    ) -> Result<Self, EndpointError> {
        let mut base = page_url.clone();
        base.set_query(None);
        base.set_fragment(None);
        base.set_path(&format!(
            "{}/game/{}",
            script_root.trim_end_matches('/'),
            protocol.route()
        ));
        base.path_segments_mut()
            .map_err(|()| EndpointError::CannotBeABase(page_url.to_string()))?
            .push(game_name);
        Ok(Self { base, protocol })
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn url(&self, seqno: Seqno) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("seqno", &seqno.to_string());
        url
    }
}

pub type FetchCallback = Box<dyn FnOnce(Result<String, FetchError>)>;

/// Asynchronous HTTP GET; `done` runs later on the same thread with the body.
pub trait Fetch {
    fn get(&self, url: Url, done: FetchCallback);
}
