//! `conductor serve` — JSON-RPC 2.0 over stdio.
//!
//! One request (or batch) per line on stdin, one response per line on stdout.
//! Steps handed to workers are pushed as notifications:
//!
//! ```text
//! Client → tasks.execute        → {"ok": true, "task": {...}}
//! Server → steps.dispatch       → {taskId, stepId, agentId, input, requirements}
//! Client → steps.submitResult   → {"accepted": true, ...}
//! ```

use std::sync::Arc;

use conductor_core::dispatch::ChannelDispatcher;
use conductor_core::rpc::{JsonRpcNotification, RpcRouter};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::Mutex;

use super::init_state;

pub async fn run() -> Result<(), String> {
    let (dispatcher, mut dispatches) = ChannelDispatcher::new();
    let router = RpcRouter::new(init_state(Arc::new(dispatcher)));
    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));

    let notify_out = stdout.clone();
    tokio::spawn(async move {
        while let Some(dispatch) = dispatches.recv().await {
            let params = match serde_json::to_value(&dispatch) {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!("[Serve] Failed to encode dispatch: {}", e);
                    continue;
                }
            };
            let note = JsonRpcNotification::new("steps.dispatch", params);
            match serde_json::to_string(&note) {
                Ok(line) => write_line(&notify_out, &line).await,
                Err(e) => tracing::error!("[Serve] Failed to encode notification: {}", e),
            }
        }
    });

    tracing::info!(
        "[Serve] Conductor JSON-RPC server on stdio ({} methods)",
        router.method_list().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => return Err(format!("Failed to read stdin: {}", e)),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = router.handle_request(line).await;
        write_line(&stdout, &response).await;
    }

    tracing::info!("[Serve] stdin closed, shutting down");
    Ok(())
}

async fn write_line(stdout: &Mutex<Stdout>, line: &str) {
    let mut out = stdout.lock().await;
    if let Err(e) = write_all_line(&mut out, line).await {
        tracing::error!("[Serve] Failed to write to stdout: {}", e);
    }
}

async fn write_all_line(out: &mut Stdout, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}
