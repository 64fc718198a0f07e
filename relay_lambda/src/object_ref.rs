use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use percent_encoding::percent_decode_str;

use crate::error::RelayError;

/// Source bucket and key of one created object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

/// Object keys arrive URL-encoded in S3 notifications, with `+` standing in for a space.
fn decode_key(raw: &str) -> Result<String, RelayError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|_| RelayError::InvalidKey {
            key: raw.to_string(),
            reason: "key does not decode to UTF-8",
        })
}

fn object_ref(index: usize, record: &S3EventRecord) -> Result<ObjectRef, RelayError> {
    let bucket = record
        .s3
        .bucket
        .name
        .as_ref()
        .filter(|name| !name.is_empty())
        .cloned()
        .ok_or(RelayError::MalformedRecord {
            index,
            missing: "bucket name",
        })?;
    let raw_key = record
        .s3
        .object
        .key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or(RelayError::MalformedRecord {
            index,
            missing: "object key",
        })?;
    let key = decode_key(raw_key)?;
    Ok(ObjectRef { bucket, key })
}

/// Extracts the notification batch in record order. A single unusable record
/// rejects the whole batch before anything is downloaded.
pub fn object_refs(event: &S3Event) -> Result<Vec<ObjectRef>, RelayError> {
    event
        .records
        .iter()
        .enumerate()
        .map(|(index, record)| object_ref(index, record))
        .collect()
}
