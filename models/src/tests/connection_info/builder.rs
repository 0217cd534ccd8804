use crate::{ConnectionInfoBuilder, ModelError};

use common::RedactedToken;

fn complete_builder() -> ConnectionInfoBuilder {
    ConnectionInfoBuilder::default()
        .with_base_url("http://homeassistant.local:8123")
        .with_access_token(RedactedToken::new("token"))
        .with_pipeline_id("01hq6z3k")
}

#[test]
fn given_all_fields_when_building_then_returns_connection_info() {
    // GIVEN: A fully populated builder
    let builder = complete_builder();

    // WHEN: Building
    let info = builder.build().expect("complete builder should build");

    // THEN: Values are carried over
    assert_eq!(info.base_url, "http://homeassistant.local:8123");
    assert_eq!(info.access_token.expose(), "token");
    assert_eq!(info.pipeline_id, "01hq6z3k");
}

/// **VALUE**: Verifies the trailing slash a user pastes from the browser is tolerated.
///
/// **BUG THIS CATCHES**: Would catch `https://ha.example/` turning into a
/// `https://ha.example//api/websocket` endpoint, which Home Assistant answers with 404.
#[test]
fn given_trailing_slash_when_building_then_slash_is_stripped() {
    let info = complete_builder()
        .with_base_url("https://ha.example.com/ ")
        .build()
        .expect("should build");

    assert_eq!(info.base_url, "https://ha.example.com");
}

/// **VALUE**: Verifies that non-HTTP base URLs are rejected.
///
/// **WHY THIS MATTERS**: The WebSocket endpoint is derived by swapping `http` for `ws`.
/// Accepting `ftp://` or a bare hostname would only fail later, inside the transport,
/// with a much less helpful message.
#[test]
fn given_non_http_url_when_building_then_returns_validation_error() {
    // GIVEN: Builder with a bare hostname
    let builder = complete_builder().with_base_url("homeassistant.local:8123");

    // WHEN: Building
    let result = builder.build();

    // THEN: Validation error mentions the URL
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert!(message.starts_with("Invalid base URL format"), "{message}");
        }
        Ok(_) => panic!("bare hostname must be rejected"),
    }
}

#[test]
fn given_missing_token_when_building_then_returns_validation_error() {
    let builder = ConnectionInfoBuilder::default()
        .with_base_url("http://localhost:8123")
        .with_pipeline_id("pipeline");

    let result = builder.build();

    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Access token is required");
        }
        Ok(_) => panic!("missing token must be rejected"),
    }
}

#[test]
fn given_blank_token_when_building_then_returns_validation_error() {
    let result = complete_builder()
        .with_access_token(RedactedToken::new("  "))
        .build();

    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Access token cannot be empty");
        }
        Ok(_) => panic!("blank token must be rejected"),
    }
}

#[test]
fn given_blank_pipeline_when_building_then_returns_validation_error() {
    let result = complete_builder().with_pipeline_id("").build();

    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Assist pipeline id cannot be empty");
        }
        Ok(_) => panic!("blank pipeline must be rejected"),
    }
}
