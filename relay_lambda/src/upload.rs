use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::tracing;
use serde::Serialize;

use crate::error::RelayError;
use crate::staging::StagedFile;

/// One object that reached the destination bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayedObject {
    pub source_bucket: String,
    pub source_key: String,
    pub destination_bucket: String,
    pub destination_key: String,
    pub bytes: u64,
}

async fn upload_file(
    s3_client: &S3Client,
    staged: &StagedFile,
    bucket: &str,
) -> Result<RelayedObject, RelayError> {
    let key = staged.destination_key();
    // The body streams from disk; the handle lives only as long as this request.
    let body = ByteStream::from_path(&staged.path)
        .await
        .map_err(|source| RelayError::OpenStaged {
            path: staged.path.clone(),
            source,
        })?;
    let bytes = body.size_hint().0;

    s3_client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(body)
        .send()
        .await
        .map_err(|e| RelayError::put_object(bucket, &key, e))?;
    tracing::info!(bucket, key = %key, bytes, "Uploaded");

    Ok(RelayedObject {
        source_bucket: staged.source.bucket.clone(),
        source_key: staged.source.key.clone(),
        destination_bucket: bucket.to_string(),
        destination_key: key,
        bytes,
    })
}

/// Relay stage: uploads every staged file, in order, to `bucket`. Stops at the
/// first failure; uploads before it have already landed.
pub async fn relay(
    s3_client: &S3Client,
    staged: &[StagedFile],
    bucket: &str,
) -> Result<Vec<RelayedObject>, RelayError> {
    tracing::info!(files = staged.len(), bucket, "Uploads");
    let mut relayed = Vec::with_capacity(staged.len());
    for file in staged {
        relayed.push(upload_file(s3_client, file, bucket).await?);
    }
    Ok(relayed)
}
