//! Wire envelope exchanged with clients.
//!
//! Every frame, in either direction, is a JSON object
//! `{"event": "<namespace>:<action>", "data": <any JSON>}`. The `data`
//! field is kept as raw JSON text ([`Payload`]) until a handler decodes it,
//! so relayed payloads reach clients byte-for-byte.
//!
//! Request/response correlation is done only by echoing `event`: a reply
//! built with [`Message::reply`] always carries the request's event name.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// Separator between the namespace segment and the action segment.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Raw JSON payload of a [`Message`].
///
/// The text is shared, so cloning a payload for every connection during a
/// broadcast does not copy it. Construction through [`Payload::from_raw`]
/// does not validate; an invalid payload fails when it is serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload(Arc<str>);

impl Payload {
    /// Wraps raw JSON text without validating it.
    #[must_use]
    pub fn from_raw(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    /// Serializes `value` into a payload.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if `value` cannot be serialized.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(value).map(|json| Self(json.into()))
    }

    /// Decodes the payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the payload is not valid JSON or
    /// does not match the shape of `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.0)
    }

    /// Returns the raw JSON text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::from_raw("null")
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&&*self.0).finish()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw: &RawValue =
            serde_json::from_str(&self.0).map_err(<S::Error as serde::ser::Error>::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Ok(Self(raw.get().into()))
    }
}

/// The event envelope carried by every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Namespaced event name, e.g. `"disaster:save_location"`.
    pub event: String,
    /// Event payload, kept as raw JSON.
    #[serde(default)]
    pub data: Payload,
}

impl Message {
    /// Creates a message from an event name and payload.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Payload) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Returns the namespace segment used as the routing key.
    ///
    /// The whole event name is the namespace when it has no separator.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.event
            .split_once(NAMESPACE_SEPARATOR)
            .map_or(self.event.as_str(), |(namespace, _)| namespace)
    }

    /// Returns the action segment after the first separator, if any.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.event
            .split_once(NAMESPACE_SEPARATOR)
            .map(|(_, action)| action)
    }

    /// Builds a reply on the same event with `data` as the new payload.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if `data` cannot be serialized.
    pub fn reply<T: Serialize + ?Sized>(&self, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: self.event.clone(),
            data: Payload::encode(data)?,
        })
    }

    /// Decodes the payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the payload does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        self.data.decode()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn namespace_is_first_segment() {
        let msg = Message::new("disaster:save_location", Payload::default());
        assert_eq!(msg.namespace(), "disaster");
        assert_eq!(msg.action(), Some("save_location"));
    }

    #[test]
    fn namespace_splits_on_first_separator_only() {
        let msg = Message::new("disaster:report:created", Payload::default());
        assert_eq!(msg.namespace(), "disaster");
        assert_eq!(msg.action(), Some("report:created"));
    }

    #[test]
    fn event_without_separator_is_its_own_namespace() {
        let msg = Message::new("ping", Payload::default());
        assert_eq!(msg.namespace(), "ping");
        assert_eq!(msg.action(), None);
    }

    #[test]
    fn reply_echoes_event() {
        let request = Message::new("disaster:set_responder", Payload::from_raw(r#"{"a":1}"#));
        let Ok(reply) = request.reply(&serde_json::json!({ "ok": true })) else {
            panic!("reply should serialize");
        };
        assert_eq!(reply.event, request.event);
        assert_eq!(reply.data.as_str(), r#"{"ok":true}"#);
    }

    #[test]
    fn raw_payload_is_written_verbatim() {
        let raw = r#"{ "userId" : "u-1",  "photoUrls": [] }"#;
        let msg = Message::new("disaster:create_report", Payload::from_raw(raw));
        let Ok(json) = serde_json::to_string(&msg) else {
            panic!("valid raw payload should serialize");
        };
        assert_eq!(json, format!(r#"{{"event":"disaster:create_report","data":{raw}}}"#));
    }

    #[test]
    fn invalid_raw_payload_fails_on_serialize() {
        let msg = Message::new("disaster:create_report", Payload::from_raw("{not json"));
        assert!(serde_json::to_string(&msg).is_err());
    }

    #[test]
    fn inbound_frame_keeps_data_raw() {
        let text = r#"{"event":"disaster:save_location","data":{"userId":"u-1","n":1.50}}"#;
        let Ok(msg) = serde_json::from_str::<Message>(text) else {
            panic!("frame should decode");
        };
        assert_eq!(msg.data.as_str(), r#"{"userId":"u-1","n":1.50}"#);
    }

    #[test]
    fn missing_data_defaults_to_null() {
        let Ok(msg) = serde_json::from_str::<Message>(r#"{"event":"disaster:ping"}"#) else {
            panic!("frame should decode");
        };
        assert_eq!(msg.data.as_str(), "null");
    }

    #[test]
    fn missing_event_is_rejected() {
        assert!(serde_json::from_str::<Message>(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn decode_typed_payload() {
        #[derive(Deserialize)]
        struct Req {
            id: u32,
        }
        let msg = Message::new("x:y", Payload::from_raw(r#"{"id":7}"#));
        let Ok(req) = msg.decode::<Req>() else {
            panic!("payload should decode");
        };
        assert_eq!(req.id, 7);
    }
}
