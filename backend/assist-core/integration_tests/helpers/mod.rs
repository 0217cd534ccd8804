//! Shared fixtures for the session integration tests:
//! - a channel-backed transport the test drives by hand
//! - a scripted Home Assistant server on a real socket
//! - waiting on watch channels with a timeout

pub mod fake_home_assistant;
pub mod fake_transport;

use common::RedactedToken;
use models::{ConnectionInfo, ConnectionInfoBuilder};

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

pub const TEST_ACCESS_TOKEN: &str = "test-token-12345";
pub const TEST_PIPELINE_ID: &str = "01hpipeline";
pub const WAIT: Duration = Duration::from_secs(5);

pub fn connection_info(base_url: &str) -> ConnectionInfo {
    connection_info_with_token(base_url, TEST_ACCESS_TOKEN)
}

pub fn connection_info_with_token(base_url: &str, token: &str) -> ConnectionInfo {
    ConnectionInfoBuilder::default()
        .with_base_url(base_url)
        .with_access_token(RedactedToken::new(token))
        .with_pipeline_id(TEST_PIPELINE_ID)
        .build()
        .expect("Failed to build connection info")
}

/// Wait until the watched value satisfies `predicate` and return it.
pub async fn wait_for<T, F>(receiver: &mut watch::Receiver<T>, predicate: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    let value = timeout(WAIT, receiver.wait_for(predicate))
        .await
        .expect("Timed out waiting for watched value")
        .expect("Watch sender dropped");
    (*value).clone()
}
