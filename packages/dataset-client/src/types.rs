use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, Result};

/// Discriminator for requests sent to the `/api` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Command,
    Query,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Command => "command",
            RequestKind::Query => "query",
        }
    }
}

/// Body of a command or query request: `{"command"|"query": name, "params": params}`.
#[derive(Debug)]
pub struct ApiRequest<'a, P: ?Sized> {
    pub kind: RequestKind,
    pub name: &'a str,
    pub params: &'a P,
}

impl<P: Serialize + ?Sized> Serialize for ApiRequest<'_, P> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.kind.as_str(), self.name)?;
        map.serialize_entry("params", self.params)?;
        map.end()
    }
}

/// Structured fault carried in the `error` key of a response envelope.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, thiserror::Error)]
#[error("polyteia api error: code -> {code}, message -> {message}, details -> {details:?}")]
pub struct RemoteFault {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: Vec<Map<String, Value>>,
}

/// Servers emit nil slices and strings as `null`; read those as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<RemoteFault>,
}

/// Response envelope: a success payload XOR a structured fault.
///
/// A body with neither key (or a null `data`) is a successful empty response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawEnvelope")]
pub enum Envelope {
    Data(Value),
    Fault(RemoteFault),
    Empty,
}

impl From<RawEnvelope> for Envelope {
    fn from(raw: RawEnvelope) -> Self {
        match (raw.error, raw.data) {
            (Some(fault), _) => Envelope::Fault(fault),
            (None, Some(data)) => Envelope::Data(data),
            (None, None) => Envelope::Empty,
        }
    }
}

impl Envelope {
    /// Decode the payload into `T`, surfacing a fault as `ApiError::Remote`.
    pub fn decode<T: DeserializeOwned + Default>(self) -> Result<T> {
        match self {
            Envelope::Fault(fault) => Err(ApiError::Remote(fault)),
            Envelope::Data(data) => Ok(serde_json::from_value(data)?),
            Envelope::Empty => Ok(T::default()),
        }
    }
}

/// Params for the `generate_dataset_upload_token` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetUploadTokenRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatasetUploadTokenResponse {
    pub token: String,
}
