//! Client for the PlayerDB Xbox lookup API.

use std::{fmt, time::Duration};

use anyhow::Context as _;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::trace;

use crate::floodgate::{ConvertError, FloodgateId};

/// Public endpoint resolving Xbox gamertags.
pub const DEFAULT_ENDPOINT: &str = "https://playerdb.co/api/player/xbox/";

/// Bound on a single lookup, from connecting until the body has been read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A gamertag as typed by a user, trimmed of surrounding whitespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gamertag(String);

impl Gamertag {
    /// Returns `None` if nothing is left after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Gamertag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup API answered with status {0}")]
    Status(StatusCode),
    #[error("gamertag not found")]
    NotFound,
    #[error("lookup timed out")]
    Timeout(#[source] reqwest::Error),
    #[error("lookup request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("malformed lookup payload: {0}")]
    Payload(#[source] serde_json::Error),
    #[error("invalid player id: {0}")]
    InvalidId(#[from] ConvertError),
}

impl LookupError {
    /// Short name of the failure, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::Status(_) => "status",
            LookupError::NotFound => "not_found",
            LookupError::Timeout(_) => "timeout",
            LookupError::Request(_) => "request",
            LookupError::Payload(_) => "payload",
            LookupError::InvalidId(_) => "invalid_id",
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LookupError::Timeout(err)
        } else {
            LookupError::Request(err)
        }
    }
}

/// Shape of the API answer. `data` is only looked into once `success` says there is something to
/// read: failure answers carry an empty or partial `data` object.
#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    success: serde_json::Value,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct LookupData {
    player: PlayerRecord,
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[derive(Deserialize)]
struct PlayerRecord {
    id: RawId,
}

/// The API sends XUIDs as strings, but accept plain numbers too.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

/// A resolved Xbox player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub gamertag: Gamertag,
    pub floodgate_id: FloodgateId,
}

impl LookupResponse {
    fn into_player(self, gamertag: &Gamertag) -> Result<Player, LookupError> {
        if !is_truthy(&self.success) {
            return Err(LookupError::NotFound);
        }

        // A successful answer without a player is as good as a malformed one.
        let data: LookupData = serde_json::from_value(self.data).map_err(LookupError::Payload)?;

        let floodgate_id = match data.player.id {
            RawId::Text(id) => FloodgateId::parse_xuid(&id)?,
            RawId::Number(id) => FloodgateId::from_xuid(id),
        };

        Ok(Player {
            gamertag: gamertag.clone(),
            floodgate_id,
        })
    }
}

/// Long-lived lookup client; the underlying connection pool is shared across invocations.
pub struct PlayerDb {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl PlayerDb {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_client(endpoint, timeout, reqwest::Client::builder())
    }

    pub(crate) fn with_client(
        endpoint: &str,
        timeout: Duration,
        builder: reqwest::ClientBuilder,
    ) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid lookup endpoint {endpoint}"))?;
        anyhow::ensure!(
            !endpoint.cannot_be_a_base(),
            "lookup endpoint {endpoint} can't take a path"
        );

        let client = builder
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("building the http client")?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// URL for a given gamertag; the gamertag always ends up as a single, percent-encoded path
    /// segment.
    pub fn url_for(&self, gamertag: &Gamertag) -> Url {
        let mut url = self.endpoint.clone();
        // Always `Ok`: the constructor rejects endpoints that can't be a base.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(gamertag.as_str());
        }
        url
    }

    pub async fn lookup(&self, gamertag: &Gamertag) -> Result<Player, LookupError> {
        let url = self.url_for(gamertag);
        trace!("looking up {gamertag} @ {url}");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LookupError::Status(status));
        }

        // Read the body as bytes first, so that a broken payload is reported as such and not as
        // a transport error.
        let body = response.bytes().await?;
        let parsed: LookupResponse = serde_json::from_slice(&body).map_err(LookupError::Payload)?;

        parsed.into_player(gamertag)
    }
}
