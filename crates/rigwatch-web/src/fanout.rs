//! Concurrent command fan-out

use rigwatch_core::FanOutResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::transport::Transport;

/// Issue every distinct command concurrently and merge the responses
///
/// All commands run to completion; a failed command maps to `None` without
/// affecting the others.
pub async fn fan_out<S: AsRef<str>>(transport: Arc<dyn Transport>, commands: &[S]) -> FanOutResult {
    let mut responses: HashMap<String, Option<serde_json::Value>> = HashMap::new();
    for command in commands {
        responses.entry(command.as_ref().to_string()).or_insert(None);
    }

    let mut tasks = JoinSet::new();
    for command in responses.keys().cloned() {
        let transport = Arc::clone(&transport);
        tasks.spawn(async move {
            let response = transport.send(&command, None).await;
            (command, response)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((command, response)) => {
                responses.insert(command, response);
            }
            Err(e) => {
                warn!(error = %e, "Fan-out command task failed");
            }
        }
    }

    debug!(
        commands = responses.len(),
        ok = responses.values().filter(|r| r.is_some()).count(),
        "Fan-out complete"
    );

    FanOutResult {
        responses,
        batched: true,
    }
}
