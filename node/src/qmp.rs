// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Minimal QMP client.
//!
//! Just enough of the protocol to ask a running guest for a graceful
//! power-down: read the greeting, negotiate capabilities, send the
//! command, check each response for an error object.  One line of JSON
//! per message in both directions.

use crate::{NodeError, NodeResult};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Ask the guest behind `socket` to power down cooperatively.
///
/// Success means the request was accepted, not that the guest is gone;
/// the caller polls the process for actual exit.
pub fn request_powerdown(socket: &Path) -> NodeResult<()> {
    let stream = UnixStream::connect(socket)
        .map_err(|e| NodeError::ControlChannel(format!("connect {}: {e}", socket.display())))?;
    stream
        .set_read_timeout(Some(IO_TIMEOUT))
        .and_then(|()| stream.set_write_timeout(Some(IO_TIMEOUT)))
        .map_err(|e| NodeError::ControlChannel(format!("socket timeouts: {e}")))?;

    let mut reader = BufReader::new(
        stream
            .try_clone()
            .map_err(|e| NodeError::ControlChannel(format!("clone stream: {e}")))?,
    );
    let mut writer = stream;

    // The server speaks first.
    let greeting = read_message(&mut reader)?;
    debug!("QMP greeting: {greeting}");

    execute(&mut writer, &mut reader, "qmp_capabilities")?;
    execute(&mut writer, &mut reader, "system_powerdown")?;
    Ok(())
}

fn execute(
    writer: &mut UnixStream,
    reader: &mut BufReader<UnixStream>,
    command: &str,
) -> NodeResult<()> {
    let request = json!({ "execute": command });
    writer
        .write_all(format!("{request}\n").as_bytes())
        .map_err(|e| NodeError::ControlChannel(format!("send {command}: {e}")))?;
    // Skip asynchronous event messages until the command response arrives.
    loop {
        let message = read_message(reader)?;
        if message.get("event").is_some() {
            debug!("QMP event while waiting for {command}: {message}");
            continue;
        }
        if let Some(error) = message.get("error") {
            return Err(NodeError::ControlChannel(format!(
                "{command} rejected: {error}"
            )));
        }
        return Ok(());
    }
}

fn read_message(reader: &mut BufReader<UnixStream>) -> NodeResult<Value> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| NodeError::ControlChannel(format!("read: {e}")))?;
    if read == 0 {
        return Err(NodeError::ControlChannel(
            "peer closed the monitor socket".to_string(),
        ));
    }
    serde_json::from_str(&line)
        .map_err(|e| NodeError::ControlChannel(format!("malformed message: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::os::unix::net::UnixListener;

    #[test]
    fn negotiates_and_powers_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".qmp");
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            writeln!(writer, r#"{{"QMP": {{"version": {{}}, "capabilities": []}}}}"#).unwrap();
            let mut requests = Vec::new();
            for _ in 0..2 {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                requests.push(line);
                writeln!(writer, r#"{{"return": {{}}}}"#).unwrap();
            }
            requests
        });

        request_powerdown(&path).unwrap();
        let requests = server.join().unwrap();
        assert!(requests[0].contains("qmp_capabilities"));
        assert!(requests[1].contains("system_powerdown"));
    }

    #[test]
    fn error_response_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".qmp");
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            writeln!(writer, r#"{{"QMP": {{}}}}"#).unwrap();
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            writeln!(
                writer,
                r#"{{"error": {{"class": "CommandNotFound", "desc": "nope"}}}}"#
            )
            .unwrap();
        });

        let err = request_powerdown(&path).unwrap_err();
        assert!(err.to_string().contains("qmp_capabilities rejected"));
        server.join().unwrap();
    }

    #[test]
    fn missing_socket_is_a_control_channel_error() {
        let err = request_powerdown(Path::new("/nonexistent/.qmp")).unwrap_err();
        assert!(matches!(err, NodeError::ControlChannel(_)));
    }
}
