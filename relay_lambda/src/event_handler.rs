use aws_lambda_events::event::s3::S3Event;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{tracing, Error, LambdaEvent};
use serde::Serialize;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::object_ref::{object_refs, ObjectRef};
use crate::retrieve::store_locally;
use crate::staging::StagingArea;
use crate::upload::{relay, RelayedObject};

/// Where an invocation is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Retrieving,
    Relaying,
    Done,
    Failed,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct RelayReport {
    pub relayed: Vec<RelayedObject>,
}

/// Everything an invocation needs, built once at cold start.
pub(crate) struct Relay {
    s3_client: S3Client,
    staging: StagingArea,
    destination_bucket: String,
}

impl Relay {
    pub(crate) fn new(s3_client: S3Client, config: &RelayConfig) -> Self {
        Relay {
            s3_client,
            staging: StagingArea::new(&config.staging_dir),
            destination_bucket: config.destination_bucket.clone(),
        }
    }

    /// Retrieves the whole batch, then relays it. A failure in either stage
    /// ends the invocation with the phase it happened in.
    async fn relay_batch(&self, objects: &[ObjectRef]) -> Result<RelayReport, (Phase, RelayError)> {
        let mut phase = Phase::Retrieving;
        tracing::info!(phase = ?phase, records = objects.len(), "Retrieving objects");
        let staged = store_locally(&self.s3_client, &self.staging, objects)
            .await
            .map_err(|e| (phase, e))?;
        tracing::info!(phase = ?phase, files = staged.len(), "Retrieval complete");

        phase = Phase::Relaying;
        let relayed = relay(&self.s3_client, &staged, &self.destination_bucket)
            .await
            .map_err(|e| (phase, e))?;
        tracing::info!(phase = ?phase, objects = relayed.len(), "Relay complete");

        Ok(RelayReport { relayed })
    }
}

pub(crate) async fn function_handler(
    event: LambdaEvent<S3Event>,
    relay: &Relay,
) -> Result<RelayReport, Error> {
    let payload = event.payload;
    if payload.records.is_empty() {
        tracing::warn!("No records found in S3 event");
        return Ok(RelayReport::default());
    }
    let objects = object_refs(&payload).map_err(|e| {
        tracing::error!(phase = ?Phase::Failed, kind = e.kind(), error = %e, "Rejected S3 event");
        e
    })?;

    let result = relay.relay_batch(&objects).await;
    let removed = relay.staging.discard(&objects).await;
    tracing::debug!(removed, "Staging cleaned up");

    match result {
        Ok(report) => {
            tracing::info!(
                phase = ?Phase::Done,
                objects = report.relayed.len(),
                "Invocation complete"
            );
            Ok(report)
        }
        Err((phase, e)) => {
            tracing::error!(
                phase = ?Phase::Failed,
                failed_in = ?phase,
                kind = e.kind(),
                error = %e,
                "Relay failed"
            );
            Err(e.into())
        }
    }
}
