//! Socket handler for the `disaster` namespace.
//!
//! Handles location updates from citizens and responder assignment.
//! Storage is an external collaborator behind [`DisasterRepository`];
//! [`InMemoryDisasterRepository`] backs standalone runs and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::router::{EventContext, EventHandler};
use crate::domain::Message;
use crate::error::HandlerError;

/// Routing namespace served by [`DisasterSocketHandler`].
pub const NAMESPACE: &str = "disaster";
/// Bus channel on which newly created reports are published.
pub const CREATE_REPORT: &str = "disaster:create_report";
/// A citizen shares their current position.
pub const SAVE_LOCATION: &str = "disaster:save_location";
/// A responder takes charge of a reporter.
pub const SET_RESPONDER: &str = "disaster:set_responder";

/// Geographic position of a reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Optional human-readable address.
    #[serde(default)]
    pub address: Option<String>,
}

/// Payload of [`SAVE_LOCATION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLocationRequest {
    /// Reporter's position.
    pub location: Location,
    /// Reporter's user id.
    pub user_id: String,
}

/// Payload of [`SET_RESPONDER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetResponderRequest {
    /// User id of the citizen who reported.
    pub reporter_id: String,
    /// User id of the responder taking charge.
    pub responder_id: String,
}

/// Reply to [`SET_RESPONDER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetResponderResponse {
    /// User id of the citizen who reported.
    pub reporter_id: String,
    /// User id of the assigned responder.
    pub responder_id: String,
    /// When the assignment was recorded.
    pub responded_at: DateTime<Utc>,
}

/// Storage operations the `disaster` handler depends on.
#[async_trait]
pub trait DisasterRepository: Send + Sync + std::fmt::Debug {
    /// Stores the latest location of a reporter.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] if the location cannot be stored.
    async fn save_location(&self, request: &SaveLocationRequest) -> Result<(), HandlerError>;

    /// Assigns a responder to a reporter.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] if the assignment is refused or fails.
    async fn set_responder(
        &self,
        request: &SetResponderRequest,
    ) -> Result<SetResponderResponse, HandlerError>;
}

/// Process-local [`DisasterRepository`].
///
/// A responder can only be assigned to a reporter whose location is known.
#[derive(Debug, Default)]
pub struct InMemoryDisasterRepository {
    locations: RwLock<HashMap<String, Location>>,
    responders: RwLock<HashMap<String, String>>,
}

impl InMemoryDisasterRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last saved location of `user_id`.
    pub async fn location(&self, user_id: &str) -> Option<Location> {
        self.locations.read().await.get(user_id).cloned()
    }

    /// Returns the responder assigned to `reporter_id`.
    pub async fn responder(&self, reporter_id: &str) -> Option<String> {
        self.responders.read().await.get(reporter_id).cloned()
    }
}

#[async_trait]
impl DisasterRepository for InMemoryDisasterRepository {
    async fn save_location(&self, request: &SaveLocationRequest) -> Result<(), HandlerError> {
        if request.user_id.is_empty() {
            return Err(HandlerError::Rejected("userId is required".to_string()));
        }
        self.locations
            .write()
            .await
            .insert(request.user_id.clone(), request.location.clone());
        Ok(())
    }

    async fn set_responder(
        &self,
        request: &SetResponderRequest,
    ) -> Result<SetResponderResponse, HandlerError> {
        if !self.locations.read().await.contains_key(&request.reporter_id) {
            return Err(HandlerError::Rejected(format!(
                "reporter {} has no known location",
                request.reporter_id
            )));
        }
        self.responders
            .write()
            .await
            .insert(request.reporter_id.clone(), request.responder_id.clone());
        Ok(SetResponderResponse {
            reporter_id: request.reporter_id.clone(),
            responder_id: request.responder_id.clone(),
            responded_at: Utc::now(),
        })
    }
}

/// [`EventHandler`] for the `disaster` namespace.
#[derive(Debug, Clone)]
pub struct DisasterSocketHandler {
    repository: Arc<dyn DisasterRepository>,
}

impl DisasterSocketHandler {
    /// Creates a handler over `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn DisasterRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl EventHandler for DisasterSocketHandler {
    async fn handle(
        &self,
        ctx: &EventContext,
        message: Message,
    ) -> Result<Option<Message>, HandlerError> {
        match message.event.as_str() {
            SAVE_LOCATION => {
                let request: SaveLocationRequest = message.decode()?;
                self.repository.save_location(&request).await?;
                tracing::debug!(connection_id = %ctx.connection_id, user_id = %request.user_id, "location saved");
                Ok(Some(message.reply(&request)?))
            }
            SET_RESPONDER => {
                let request: SetResponderRequest = message.decode()?;
                let response = self.repository.set_responder(&request).await?;
                tracing::debug!(connection_id = %ctx.connection_id, reporter_id = %response.reporter_id, "responder set");
                Ok(Some(message.reply(&response)?))
            }
            other => Err(HandlerError::UnknownEvent(other.to_string())),
        }
    }
}
