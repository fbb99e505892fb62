//! HTTP implementation of the meeting broker.
//!
//! Thin reqwest wrapper over the broker's JSON endpoints:
//!
//! - `POST /spaces/{space}/discussions/{discussion}/meeting` - join credentials
//! - `POST /spaces/{space}/discussions/{discussion}/meeting/exit` - exit notification
//! - `GET  /spaces/{space}/discussions/{discussion}/participants` - durable roster

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, instrument, warn};

use super::join_info::JoinInfo;
use super::{MeetingBroker, Participant};
use crate::config::Config;
use crate::errors::RoomError;

/// Connect timeout for broker requests in seconds.
const BROKER_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Request body for join and exit calls.
#[derive(Debug, Clone, Serialize)]
struct DiscussionRef<'a> {
    space_pk: &'a str,
    discussion_pk: &'a str,
}

/// HTTP client for the meeting broker.
#[derive(Clone)]
pub struct HttpMeetingBroker {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpMeetingBroker {
    /// Create a new broker client from configuration.
    pub fn new(config: &Config) -> Result<Self, RoomError> {
        let client = Client::builder()
            .timeout(config.broker_timeout)
            .connect_timeout(Duration::from_secs(BROKER_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "room.broker", error = %e, "Failed to build HTTP client");
                RoomError::Internal(format!("http client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.broker_base_url.clone(),
            api_token: config.broker_api_token.clone(),
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value, RoomError> {
        let status = response.status();
        if !status.is_success() {
            warn!(target: "room.broker", status = %status, "Broker returned non-success status");
            return Err(RoomError::Broker(format!("broker returned {status}")));
        }
        response.json().await.map_err(|e| {
            error!(target: "room.broker", error = %e, "Failed to parse broker response");
            RoomError::Broker(format!("invalid broker response: {e}"))
        })
    }
}

#[async_trait]
impl MeetingBroker for HttpMeetingBroker {
    #[instrument(skip(self), fields(space_pk = %space_pk, discussion_pk = %discussion_pk))]
    async fn join_meeting(
        &self,
        space_pk: &str,
        discussion_pk: &str,
    ) -> Result<JoinInfo, RoomError> {
        let url = format!(
            "{}/spaces/{space_pk}/discussions/{discussion_pk}/meeting",
            self.base_url
        );

        let response = self
            .request(self.client.post(&url))
            .json(&DiscussionRef {
                space_pk,
                discussion_pk,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(target: "room.broker", error = %e, "Join request failed");
                RoomError::Broker(format!("join request failed: {e}"))
            })?;

        let raw = self.read_json(response).await?;
        Ok(JoinInfo::from_raw(&raw)?)
    }

    #[instrument(skip(self), fields(space_pk = %space_pk, discussion_pk = %discussion_pk))]
    async fn notify_exit(&self, space_pk: &str, discussion_pk: &str) -> Result<(), RoomError> {
        let url = format!(
            "{}/spaces/{space_pk}/discussions/{discussion_pk}/meeting/exit",
            self.base_url
        );

        let response = self
            .request(self.client.post(&url))
            .json(&DiscussionRef {
                space_pk,
                discussion_pk,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(target: "room.broker", error = %e, "Exit notification failed");
                RoomError::Broker(format!("exit request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "room.broker", status = %status, "Exit notification rejected");
            return Err(RoomError::Broker(format!("broker returned {status}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(space_pk = %space_pk, discussion_pk = %discussion_pk))]
    async fn fetch_participants(
        &self,
        space_pk: &str,
        discussion_pk: &str,
    ) -> Result<Vec<Participant>, RoomError> {
        let url = format!(
            "{}/spaces/{space_pk}/discussions/{discussion_pk}/participants",
            self.base_url
        );

        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| {
                warn!(target: "room.broker", error = %e, "Participants request failed");
                RoomError::Broker(format!("participants request failed: {e}"))
            })?;

        let raw = self.read_json(response).await?;

        // The roster endpoint answers either a bare array or an object with
        // a `participants` list, in the same casing conventions as the join
        // response.
        let list = if raw.is_array() {
            raw
        } else {
            raw.get("participants")
                .or_else(|| raw.get("Participants"))
                .or_else(|| raw.get("data"))
                .cloned()
                .unwrap_or(Value::Array(vec![]))
        };

        serde_json::from_value(list).map_err(|e| {
            warn!(target: "room.broker", error = %e, "Failed to parse participant roster");
            RoomError::Broker(format!("invalid roster response: {e}"))
        })
    }
}
