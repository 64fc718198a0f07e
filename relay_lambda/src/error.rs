use std::path::PathBuf;

use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStreamError;

/// Failure of a single relay invocation. Every variant carries enough context
/// to tell which record, file, bucket or key was involved.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("record {index} in S3 event has no {missing}")]
    MalformedRecord { index: usize, missing: &'static str },

    #[error("object key {key:?} cannot be staged: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("unable to create staging file {}: {source}", path.display())]
    CreateStaging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to download {bucket}/{key}: {detail}")]
    Download {
        bucket: String,
        key: String,
        detail: String,
    },

    #[error("unable to open staged file {}: {source}", path.display())]
    OpenStaged {
        path: PathBuf,
        #[source]
        source: ByteStreamError,
    },

    #[error("unable to upload {key:?} to {bucket:?}: {detail}")]
    Upload {
        bucket: String,
        key: String,
        detail: String,
    },
}

impl RelayError {
    pub(crate) fn get_object(bucket: &str, key: &str, err: SdkError<GetObjectError>) -> Self {
        RelayError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            detail: DisplayErrorContext(err).to_string(),
        }
    }

    /// A failure while streaming the object body into the staging file.
    pub(crate) fn body(bucket: &str, key: &str, err: impl std::fmt::Display) -> Self {
        RelayError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            detail: err.to_string(),
        }
    }

    pub(crate) fn put_object(bucket: &str, key: &str, err: SdkError<PutObjectError>) -> Self {
        RelayError::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            detail: DisplayErrorContext(err).to_string(),
        }
    }

    /// Short name of the failure kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MalformedRecord { .. } => "malformed_record",
            RelayError::InvalidKey { .. } => "invalid_key",
            RelayError::CreateStaging { .. } => "create_staging",
            RelayError::Download { .. } => "download",
            RelayError::OpenStaged { .. } => "open_staged",
            RelayError::Upload { .. } => "upload",
        }
    }
}
