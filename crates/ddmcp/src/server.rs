//! Line-delimited JSON-RPC over stdio, the transport MCP clients speak.
//! Requests arrive one per line on stdin; every response is a single line on
//! stdout. Malformed input is logged and skipped so one bad line never takes
//! the server down.

use ddmcp_client::aggregate::SpanAggregator;
use ddmcp_client::search::SpanSource;
use ddmcp_core::query::{AggregateParams, TracesParams};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::tools::{ToolResult, aggregate_traces, get_traces};

const PROTOCOL_VERSION: &str = "2024-11-05";

pub async fn run<C>(client: &C, max_pages_per_trace: Option<usize>) -> anyhow::Result<()>
where
    C: SpanSource + SpanAggregator + Sync,
{
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    tracing::info!("MCP server listening on stdio");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unparseable request line");
                continue;
            }
        };

        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();

        // Notifications carry no id and expect no response.
        if method.starts_with("notifications/") {
            continue;
        }
        tracing::debug!(%method, "handling request");

        let response = match method {
            "initialize" => ok_response(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": "ddmcp",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "tools/list" => ok_response(
                id,
                json!({
                    "tools": [get_traces::definition(), aggregate_traces::definition()],
                }),
            ),
            "tools/call" => {
                match dispatch_tool_call(client, max_pages_per_trace, request.get("params")).await {
                    Ok(result) => ok_response(id, tool_payload(&result)),
                    Err(message) => error_response(id, -32602, &message),
                }
            }
            other => error_response(id, -32601, &format!("method not found: {other}")),
        };

        let mut bytes = serde_json::to_vec(&response)?;
        bytes.push(b'\n');
        stdout.write_all(&bytes).await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

/// Bad tool arguments come back as an error-flagged tool result rather than
/// a protocol error, so the calling model sees what to fix.
async fn dispatch_tool_call<C>(
    client: &C,
    max_pages_per_trace: Option<usize>,
    params: Option<&Value>,
) -> Result<ToolResult, String>
where
    C: SpanSource + SpanAggregator + Sync,
{
    let name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| "tools/call is missing a tool name".to_string())?;
    let arguments = params
        .and_then(|p| p.get("arguments"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    match name {
        "get_traces" => match serde_json::from_value::<TracesParams>(arguments) {
            Ok(args) => Ok(get_traces::handle(client, max_pages_per_trace, args).await),
            Err(err) => Ok(ToolResult::error(format!(
                "Invalid arguments for get_traces: {err}"
            ))),
        },
        "aggregate_traces" => match serde_json::from_value::<AggregateParams>(arguments) {
            Ok(args) => Ok(aggregate_traces::handle(client, args).await),
            Err(err) => Ok(ToolResult::error(format!(
                "Invalid arguments for aggregate_traces: {err}"
            ))),
        },
        other => Err(format!("unknown tool: {other}")),
    }
}

fn tool_payload(result: &ToolResult) -> Value {
    json!({
        "content": [{ "type": "text", "text": result.text }],
        "isError": result.is_error,
    })
}

fn ok_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}
