//! Request/response exchange over a framed channel.

use std::io::{BufRead, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::DRIVER_TARGET;
use crate::error::ProcessError;
use crate::framing::FramedChannel;
use crate::jsonrpc::{RpcMessage, RpcNotification, RpcRequest, RpcResponse};

/// Messages read while waiting for one response before giving up.
const MAX_INTERLEAVED_MESSAGES: usize = 64;

/// Sends a request and decodes the matching response's result.
pub(crate) fn call<R, W, P, T>(
    channel: &mut FramedChannel<R, W>,
    id: i64,
    method: &str,
    params: &P,
) -> Result<T, ProcessError>
where
    R: BufRead,
    W: Write,
    P: Serialize,
    T: DeserializeOwned,
{
    post(channel, id, method, params)?;

    let response = await_response(channel, id)?;
    if let Some(error) = response.error {
        return Err(ProcessError::Remote {
            code: error.code,
            message: error.message,
        });
    }
    let result = response.result.ok_or_else(|| ProcessError::EmptyResult {
        method: method.to_owned(),
    })?;
    serde_json::from_value(result).map_err(ProcessError::from)
}

/// Sends a request without waiting for its response.
pub(crate) fn post<R, W, P>(
    channel: &mut FramedChannel<R, W>,
    id: i64,
    method: &str,
    params: &P,
) -> Result<(), ProcessError>
where
    R: BufRead,
    W: Write,
    P: Serialize,
{
    let payload = serde_json::to_vec(&RpcRequest::new(id, method, params))?;
    debug!(target: DRIVER_TARGET, method, id, "sending request");
    channel.send(&payload)?;
    Ok(())
}

/// Sends a notification.
pub(crate) fn notify<R, W>(channel: &mut FramedChannel<R, W>, method: &str) -> Result<(), ProcessError>
where
    R: BufRead,
    W: Write,
{
    let payload = serde_json::to_vec(&RpcNotification::new(method))?;
    debug!(target: DRIVER_TARGET, method, "sending notification");
    channel.send(&payload)?;
    Ok(())
}

fn await_response<R, W>(channel: &mut FramedChannel<R, W>, id: i64) -> Result<RpcResponse, ProcessError>
where
    R: BufRead,
    W: Write,
{
    for _ in 0..MAX_INTERLEAVED_MESSAGES {
        match RpcMessage::from_bytes(&channel.receive()?)? {
            RpcMessage::Response(response) if response.id == Some(id) => return Ok(response),
            RpcMessage::Response(response) => {
                warn!(
                    target: DRIVER_TARGET,
                    expected = id,
                    received = ?response.id,
                    "skipping response with non-matching id"
                );
            }
            RpcMessage::Request { id: request, method } => {
                warn!(
                    target: DRIVER_TARGET,
                    %method,
                    id = %request,
                    "ignoring driver-initiated request"
                );
            }
            RpcMessage::Notification { method } => {
                debug!(target: DRIVER_TARGET, %method, "skipping driver notification");
            }
        }
    }
    Err(ProcessError::UnansweredRequest {
        request_id: id,
        messages: MAX_INTERLEAVED_MESSAGES,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;
    use serde_json::{Value, json};

    use super::*;

    fn frame(message: &Value) -> Vec<u8> {
        let body = serde_json::to_vec(message).expect("serialise");
        let mut framed = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        framed.extend(body);
        framed
    }

    fn channel_with(messages: &[Value]) -> FramedChannel<Cursor<Vec<u8>>, Vec<u8>> {
        let input = messages.iter().flat_map(frame).collect::<Vec<_>>();
        FramedChannel::new(Cursor::new(input), Vec::new())
    }

    #[rstest]
    fn returns_result_of_matching_response() {
        let mut channel = channel_with(&[
            json!({"jsonrpc": "2.0", "method": "log", "params": {"line": "warming up"}}),
            json!({"jsonrpc": "2.0", "id": 1, "result": "stale"}),
            json!({"jsonrpc": "2.0", "id": 2, "result": {"status": "ok"}}),
        ]);

        let result: Value = call(&mut channel, 2, "parse", &json!({})).expect("call");

        assert_eq!(result, json!({"status": "ok"}));
        let written = String::from_utf8(channel.into_writer()).expect("utf8");
        assert!(written.contains(r#""method":"parse""#));
        assert!(written.contains(r#""id":2"#));
    }

    #[rstest]
    fn remote_errors_are_recoverable() {
        let mut channel = channel_with(&[json!({
            "jsonrpc": "2.0",
            "id": 5,
            "error": {"code": -32000, "message": "unsupported encoding"}
        })]);

        let error = call::<_, _, _, Value>(&mut channel, 5, "parse", &json!({}))
            .expect_err("remote error");

        assert!(matches!(error, ProcessError::Remote { code: -32000, .. }));
        assert!(!error.is_fatal());
    }

    #[rstest]
    fn closed_channel_is_fatal() {
        let mut channel = channel_with(&[]);

        let error = call::<_, _, _, Value>(&mut channel, 1, "nativeParse", &json!({}))
            .expect_err("closed channel");

        assert!(error.is_fatal());
    }

    #[rstest]
    fn gives_up_after_too_many_unrelated_messages() {
        let noise: Vec<_> = (0..MAX_INTERLEAVED_MESSAGES)
            .map(|_| json!({"jsonrpc": "2.0", "method": "log"}))
            .collect();
        let mut channel = channel_with(&noise);

        let error = call::<_, _, _, Value>(&mut channel, 9, "parse", &json!({}))
            .expect_err("unanswered");

        assert!(matches!(error, ProcessError::UnansweredRequest { request_id: 9, .. }));
    }
}
