use aws_sdk_s3::Client as S3Client;
use lambda_runtime::tracing;
use tokio::io::AsyncWriteExt;

use crate::error::RelayError;
use crate::object_ref::ObjectRef;
use crate::staging::{StagedFile, StagingArea};

/// Downloads one object into its staging file. The file handle is dropped
/// before returning so open handles never accumulate across a batch.
async fn store_object(
    s3_client: &S3Client,
    staging: &StagingArea,
    object: &ObjectRef,
) -> Result<StagedFile, RelayError> {
    let path = staging.path_for(&object.key)?;
    tracing::info!(path = %path.display(), "Creating file locally");
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| RelayError::CreateStaging {
                path: path.clone(),
                source,
            })?;
    }
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|source| RelayError::CreateStaging {
            path: path.clone(),
            source,
        })?;

    tracing::info!(bucket = %object.bucket, key = %object.key, "Downloading");
    let output = s3_client
        .get_object()
        .bucket(&object.bucket)
        .key(&object.key)
        .send()
        .await
        .map_err(|e| RelayError::get_object(&object.bucket, &object.key, e))?;
    let mut body = output.body.into_async_read();
    let bytes = tokio::io::copy(&mut body, &mut file)
        .await
        .map_err(|e| RelayError::body(&object.bucket, &object.key, e))?;
    file.flush()
        .await
        .map_err(|e| RelayError::body(&object.bucket, &object.key, e))?;
    tracing::debug!(path = %path.display(), bytes, "Object staged");

    Ok(StagedFile {
        source: object.clone(),
        path,
    })
}

/// Retrieval stage: stages every object of the batch, in batch order. Stops at
/// the first failure; files staged before it are left for the caller to clean up.
pub async fn store_locally(
    s3_client: &S3Client,
    staging: &StagingArea,
    objects: &[ObjectRef],
) -> Result<Vec<StagedFile>, RelayError> {
    tracing::info!(records = objects.len(), "About to loop over records");
    let mut staged = Vec::with_capacity(objects.len());
    for object in objects {
        staged.push(store_object(s3_client, staging, object).await?);
    }
    match staged.first() {
        Some(first) => tracing::info!(
            count = staged.len(),
            first = %first.path.display(),
            "Staged files"
        ),
        None => tracing::info!("No files staged"),
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::error::NoSuchKey;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};

    fn object(bucket: &str, key: &str) -> ObjectRef {
        ObjectRef {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_stages_objects_in_batch_order() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let first = mock!(aws_sdk_s3::Client::get_object)
            .match_requests(|req| req.bucket() == Some("in") && req.key() == Some("report.csv"))
            .then_output(|| {
                GetObjectOutput::builder()
                    .body(ByteStream::from_static(b"id,total\n1,20\n"))
                    .build()
            });
        let second = mock!(aws_sdk_s3::Client::get_object)
            .match_requests(|req| req.bucket() == Some("in") && req.key() == Some("a/b.txt"))
            .then_output(|| {
                GetObjectOutput::builder()
                    .body(ByteStream::from_static(b"nested"))
                    .build()
            });
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&first, &second]);

        let objects = vec![object("in", "report.csv"), object("in", "a/b.txt")];
        let staged = store_locally(&s3, &staging, &objects).await.unwrap();

        let paths: Vec<_> = staged.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![dir.path().join("report.csv"), dir.path().join("a/b.txt")]
        );
        assert_eq!(staged[1].source, objects[1]);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"id,total\n1,20\n");
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"nested");
        assert_eq!(first.num_calls(), 1);
        assert_eq!(second.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let unused = mock!(aws_sdk_s3::Client::get_object)
            .then_output(|| GetObjectOutput::builder().build());
        let s3 = mock_client!(aws_sdk_s3, [&unused]);

        let staged = store_locally(&s3, &staging, &[]).await.unwrap();
        assert!(staged.is_empty());
        assert_eq!(unused.num_calls(), 0);
    }

    #[tokio::test]
    async fn test_stops_at_first_failed_download() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let ok = mock!(aws_sdk_s3::Client::get_object)
            .match_requests(|req| req.key() == Some("one.csv"))
            .then_output(|| GetObjectOutput::builder().body(ByteStream::from_static(b"1")).build());
        let missing = mock!(aws_sdk_s3::Client::get_object)
            .match_requests(|req| req.key() == Some("two.csv"))
            .then_error(|| GetObjectError::NoSuchKey(NoSuchKey::builder().build()));
        let never = mock!(aws_sdk_s3::Client::get_object)
            .match_requests(|req| req.key() == Some("three.csv"))
            .then_output(|| GetObjectOutput::builder().body(ByteStream::from_static(b"3")).build());
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&ok, &missing, &never]);

        let objects = vec![
            object("in", "one.csv"),
            object("in", "two.csv"),
            object("in", "three.csv"),
        ];
        let err = store_locally(&s3, &staging, &objects).await.unwrap_err();

        match err {
            RelayError::Download { bucket, key, .. } => {
                assert_eq!(bucket, "in");
                assert_eq!(key, "two.csv");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(dir.path().join("one.csv").exists());
        assert!(!dir.path().join("three.csv").exists());
        assert_eq!(never.num_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_key_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("staging"));
        let unused = mock!(aws_sdk_s3::Client::get_object)
            .then_output(|| GetObjectOutput::builder().build());
        let s3 = mock_client!(aws_sdk_s3, [&unused]);

        let err = store_locally(&s3, &staging, &[object("in", "../escape.csv")])
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidKey { .. }));
        assert_eq!(unused.num_calls(), 0);
        assert!(!dir.path().join("escape.csv").exists());
    }

    #[tokio::test]
    async fn test_unwritable_staging_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let staging = StagingArea::new(&blocker);
        let unused = mock!(aws_sdk_s3::Client::get_object)
            .then_output(|| GetObjectOutput::builder().build());
        let s3 = mock_client!(aws_sdk_s3, [&unused]);

        let err = store_locally(&s3, &staging, &[object("in", "report.csv")])
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::CreateStaging { .. }));
        assert_eq!(unused.num_calls(), 0);
    }
}
