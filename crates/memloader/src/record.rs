//! Device-install records, their store keys, and their wire encoding.

use std::fmt;

use bytes::{Bytes, BytesMut};
use prost::Message;
use snafu::ResultExt;

use crate::error::{DecodeSnafu, EncodeSnafu, EncodingError};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub device_type: String,
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub app_ids: Vec<u32>,
}

impl Record {
    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(&self.device_type, &self.device_id)
    }
}

/// Store key `<device_type>:<device_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(device_type: &str, device_id: &str) -> Self {
        Self(format!("{device_type}:{device_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CompositeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Protobuf value stored under a record's key.
///
/// Device type and id live in the key, so only coordinates and apps are
/// serialized.
#[derive(Clone, PartialEq, Message)]
pub struct UserApps {
    #[prost(uint32, repeated, packed = "true", tag = "1")]
    pub apps: Vec<u32>,
    #[prost(double, optional, tag = "2")]
    pub lat: Option<f64>,
    #[prost(double, optional, tag = "3")]
    pub lon: Option<f64>,
}

impl From<&Record> for UserApps {
    fn from(record: &Record) -> Self {
        Self {
            apps: record.app_ids.clone(),
            lat: Some(record.latitude),
            lon: Some(record.longitude),
        }
    }
}

/// Serializes records into store values.
pub trait RecordEncoder: Send + Sync {
    fn encode(&self, key: &CompositeKey, record: &Record) -> Result<Bytes, EncodingError>;

    /// Human-readable rendering of an encoded value, used for dry-run output.
    fn describe(&self, key: &CompositeKey, value: &[u8]) -> Result<String, EncodingError>;
}

/// `UserApps` protobuf encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufEncoder;

impl ProtobufEncoder {
    pub fn decode(&self, key: &CompositeKey, value: &[u8]) -> Result<UserApps, EncodingError> {
        UserApps::decode(value).context(DecodeSnafu { key: key.as_str() })
    }
}

impl RecordEncoder for ProtobufEncoder {
    fn encode(&self, key: &CompositeKey, record: &Record) -> Result<Bytes, EncodingError> {
        let message = UserApps::from(record);
        let mut buf = BytesMut::with_capacity(message.encoded_len());
        message
            .encode(&mut buf)
            .context(EncodeSnafu { key: key.as_str() })?;
        Ok(buf.freeze())
    }

    fn describe(&self, key: &CompositeKey, value: &[u8]) -> Result<String, EncodingError> {
        let message = self.decode(key, value)?;
        Ok(format!("{message:?}"))
    }
}
