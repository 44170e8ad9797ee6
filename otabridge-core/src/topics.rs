//! Topic filters and wildcard matching
//!
//! Classifies broker topics against the fixed filters of the update protocol.

use crate::error::{BridgeError, Result};
use heapless::String;

/// Common prefix of every update-protocol topic
///
/// The thing name is replaced by `+` so a single filter matches the topics
/// the agent registered under its own name.
pub const TOPIC_PREFIX: &str = "$aws/things/+/";

/// Job notification topics
pub const JOB_NOTIFY_TOPIC_FILTER: &str = "$aws/things/+/jobs/notify-next";

/// Responses to the agent's own `$next/get` job requests
pub const JOB_ACCEPTED_RESPONSE_TOPIC_FILTER: &str = "$aws/things/+/jobs/$next/get/accepted";

/// File blocks of the image being streamed
pub const DATA_STREAM_TOPIC_FILTER: &str = "$aws/things/+/streams/#";

/// Catch-all for reserved job topics the agent has not subscribed to
pub const DEFAULT_TOPIC_FILTER: &str = "$aws/things/+/jobs/#";

/// Check a received topic name against a topic filter
///
/// Zero-allocation walk over the `/`-separated levels of both strings.
///
/// # Wildcard Semantics
///
/// - `+` (single-level): matches exactly one level, possibly empty. Only a
///   wildcard when it fills a whole filter level.
/// - `#` (multi-level): matches the parent level and any number of children.
///   Only a wildcard when it fills the last filter level.
///
/// Wildcard characters anywhere else in the filter are compared literally.
/// Wildcard characters in the topic name are ordinary characters.
///
/// # Errors
///
/// Returns `BridgeError::InvalidArgument` if either string is empty.
pub fn topic_matches(name: &str, filter: &str) -> Result<bool> {
    if name.is_empty() {
        return Err(BridgeError::InvalidArgument {
            reason: "topic name is empty",
        });
    }
    if filter.is_empty() {
        return Err(BridgeError::InvalidArgument {
            reason: "topic filter is empty",
        });
    }

    let mut name_levels = name.split('/');
    let mut filter_levels = filter.split('/').peekable();

    loop {
        match (filter_levels.next(), name_levels.next()) {
            // Also covers the parent level, e.g. "sport" against "sport/#"
            (Some("#"), _) if filter_levels.peek().is_none() => return Ok(true),
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(level)) if expected == level => {}
            (None, None) => return Ok(true),
            _ => return Ok(false),
        }
    }
}

/// Build a concrete `$aws/things/<thing>/<suffix>` topic
///
/// # Errors
///
/// Returns `BridgeError::InvalidArgument` if the thing name is empty or holds
/// a separator or wildcard, `BridgeError::PayloadTooLarge` if the topic does
/// not fit into `L` bytes.
pub fn thing_topic<const L: usize>(thing_name: &str, suffix: &str) -> Result<String<L>> {
    if thing_name.is_empty() {
        return Err(BridgeError::InvalidArgument {
            reason: "thing name is empty",
        });
    }
    if thing_name.contains(['/', '+', '#']) {
        return Err(BridgeError::InvalidArgument {
            reason: "thing name contains a separator or wildcard",
        });
    }

    let parts = ["$aws/things/", thing_name, "/", suffix];
    let actual_size = parts.iter().map(|p| p.len()).sum();
    let mut topic = String::new();
    for part in parts {
        topic.push_str(part).map_err(|_| BridgeError::PayloadTooLarge {
            max_size: L,
            actual_size,
        })?;
    }
    Ok(topic)
}

/// Base topic device telemetry is published under: `<client_id>/`
pub fn device_publish_topic<const L: usize>(client_id: &str) -> Result<String<L>> {
    device_topic(client_id, "/")
}

/// Filter covering every command sent to the device: `<client_id>/#`
pub fn device_subscribe_filter<const L: usize>(client_id: &str) -> Result<String<L>> {
    device_topic(client_id, "/#")
}

fn device_topic<const L: usize>(client_id: &str, suffix: &str) -> Result<String<L>> {
    if client_id.is_empty() {
        return Err(BridgeError::InvalidArgument {
            reason: "client identifier is empty",
        });
    }
    let actual_size = client_id.len() + suffix.len();
    let mut topic = String::new();
    topic
        .push_str(client_id)
        .and_then(|_| topic.push_str(suffix))
        .map_err(|_| BridgeError::PayloadTooLarge {
            max_size: L,
            actual_size,
        })?;
    Ok(topic)
}
