//! JSON line command interface.
//!
//! One JSON object per input line, one JSON response per output line:
//!
//! ```text
//! {"command": "open", "params": {"device": "ttyExogenous0"}}
//! {"command": "write", "params": {"handle": 1, "data": "PING"}}
//! {"command": "read", "params": {"handle": 2, "timeout_ms": 500}}
//! ```
//!
//! A harness process can drive one side of a pair through this interface
//! while the application under test holds the other side in-process.

use crate::service::{BridgeService, OpenRequest, ServiceError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};

const COMMANDS: &[&str] = &[
    "open", "write", "read", "close", "status", "list", "help", "exit",
];

#[derive(Debug, Deserialize)]
struct HandleParams {
    handle: u64,
}

#[derive(Debug, Deserialize)]
struct WriteParams {
    handle: u64,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ReadParams {
    handle: u64,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

/// Outcome of one command line.
enum Reply {
    Respond(Value),
    Exit,
}

/// Process commands from `input` until EOF or `exit`, writing responses to
/// `output`. Handles still open at the end are closed.
pub fn run_stdio_interface<R, W>(service: &BridgeService, input: R, mut output: W) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Ok(request) => match process_command(service, &request) {
                Reply::Respond(value) => value,
                Reply::Exit => {
                    writeln!(output, "{}", json!({"status": "ok", "message": "bye"}))?;
                    output.flush()?;
                    break;
                }
            },
            Err(e) => error_response("DeserializationError", &e.to_string()),
        };

        writeln!(output, "{}", response)?;
        output.flush()?;
    }

    let closed = service.close_all();
    if closed > 0 {
        debug!(closed, "Closed handles left open by stdio client");
    }
    Ok(())
}

fn process_command(service: &BridgeService, request: &Value) -> Reply {
    let command = request["command"].as_str().unwrap_or("").to_lowercase();
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    debug!(%command, "stdio command");

    let result = match command.as_str() {
        "open" => parse::<OpenRequest>(params).and_then(|req| to_value(service.open(req))),
        "write" => parse::<WriteParams>(params)
            .and_then(|p| to_value(service.write(p.handle, &p.data))),
        "read" => parse::<ReadParams>(params)
            .and_then(|p| to_value(service.read(p.handle, p.timeout_ms))),
        "close" => parse::<HandleParams>(params).and_then(|p| to_value(service.close(p.handle))),
        "status" => to_value(Ok(service.status())),
        "list" => to_value(Ok(service.list())),
        "help" => Ok(json!({
            "commands": COMMANDS,
            "devices": service.list().devices,
        })),
        "exit" => return Reply::Exit,
        other => Err(ServiceError::InvalidRequest(format!(
            "Unknown command: '{}'",
            other
        ))),
    };

    Reply::Respond(match result {
        Ok(Value::Object(mut body)) => {
            body.insert("status".into(), json!("ok"));
            Value::Object(body)
        }
        Ok(other) => json!({"status": "ok", "result": other}),
        Err(e) => {
            if !matches!(&e, ServiceError::Bridge(b) if b.is_retryable()) {
                warn!(%command, error = %e, "stdio command failed");
            }
            error_response(e.kind(), &e.to_string())
        }
    })
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, ServiceError> {
    serde_json::from_value(params).map_err(|e| ServiceError::InvalidRequest(e.to_string()))
}

fn to_value<T: serde::Serialize>(result: Result<T, ServiceError>) -> Result<Value, ServiceError> {
    let value = result?;
    serde_json::to_value(value).map_err(|e| ServiceError::InvalidRequest(e.to_string()))
}

fn error_response(kind: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "error": { "type": kind, "message": message }
    })
}
