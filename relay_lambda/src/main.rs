use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{run, service_fn, tracing, Error};
mod config;
mod error;
mod event_handler;
mod object_ref;
mod retrieve;
mod staging;
mod upload;
use config::RelayConfig;
use event_handler::{function_handler, Relay};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::subscriber::fmt().json().init();
    let config = RelayConfig::from_env()?;
    tracing::info!(
        destination_bucket = %config.destination_bucket,
        staging_dir = %config.staging_dir.display(),
        "Relay configured"
    );
    let shared_config = aws_config::load_defaults(BehaviorVersion::v2025_01_17()).await;
    let relay = Relay::new(S3Client::new(&shared_config), &config);
    run(service_fn(|event| function_handler(event, &relay))).await
}
