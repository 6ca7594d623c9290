//! Socket plumbing: the paired command/reply and feedback TCP connections.
//!
//! Both sockets speak the same framing: ASCII text terminated by a single
//! NUL byte, no trailing newline. The command/reply socket is used in
//! blocking request/response fashion; the feedback socket is read in a
//! non-blocking, polled fashion since the engine pushes to it unprompted.

use std::env;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

const DEFAULT_PORT: u16 = 5555;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_secs(5);

fn host_and_port() -> (String, u16) {
    let port = env::var("MOD_DEVICE_HOST_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    ("localhost".to_string(), port)
}

/// Whether the client should run in dummy/offline mode instead of opening a
/// real TCP connection, per `MOD_DEV_HOST`.
pub fn is_dummy_mode() -> bool {
    env::var_os("MOD_DEV_HOST").is_some()
}

/// A connection to the engine: either a live pair of TCP sockets, or a
/// dummy stand-in used in offline/test builds.
pub(crate) enum Connection {
    Live { command: TcpStream, feedback: TcpStream },
    Dummy,
}

impl Connection {
    pub(crate) fn connect() -> EngineResult<Self> {
        if is_dummy_mode() {
            return Ok(Connection::Dummy);
        }

        let (host, port) = host_and_port();
        let command = connect_stream(&host, port)?;
        let feedback = connect_stream(&host, port + 1)?;
        feedback
            .set_nonblocking(true)
            .map_err(|e| EngineError::transport(format!("feedback socket nonblocking: {e}")))?;

        Ok(Connection::Live { command, feedback })
    }

    /// Send one NUL-terminated request and block for the NUL-terminated
    /// reply, returning the reply with its terminator stripped.
    pub(crate) fn write_and_wait(&mut self, message: &str) -> EngineResult<String> {
        if matches!(self, Connection::Dummy) {
            return Ok(format!("resp 0 {}", dummy_reply_payload(message)));
        }
        self.send(message)?;
        self.recv()
    }

    /// Write a request without waiting for its reply, for use while batching.
    pub(crate) fn send(&mut self, message: &str) -> EngineResult<()> {
        match self {
            Connection::Dummy => Ok(()),
            Connection::Live { command, .. } => write_framed(command, message),
        }
    }

    /// Block for the next reply on the command socket.
    pub(crate) fn recv(&mut self) -> EngineResult<String> {
        match self {
            Connection::Dummy => Ok("resp 0 ".to_string()),
            Connection::Live { command, .. } => read_framed(command),
        }
    }

    /// Non-blocking attempt to read the next queued feedback message, if any
    /// is currently available without blocking.
    pub(crate) fn try_read_feedback(&mut self) -> EngineResult<Option<String>> {
        match self {
            Connection::Dummy => Ok(None),
            Connection::Live { feedback, .. } => try_read_framed_nonblocking(feedback),
        }
    }

    pub(crate) fn reconnect(&mut self) -> EngineResult<()> {
        if matches!(self, Connection::Dummy) {
            return Ok(());
        }
        *self = Connection::connect()?;
        Ok(())
    }
}

fn connect_stream(host: &str, port: u16) -> EngineResult<TcpStream> {
    use std::net::ToSocketAddrs;

    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| EngineError::transport(format!("resolving {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| EngineError::transport(format!("no address for {host}:{port}")))?;

    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .map_err(|e| EngineError::transport(format!("connecting to {host}:{port}: {e}")))?;
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|e| EngineError::transport(format!("setting read timeout: {e}")))?;
    stream
        .set_nodelay(true)
        .map_err(|e| EngineError::transport(format!("setting nodelay: {e}")))?;
    Ok(stream)
}

fn write_framed(stream: &mut TcpStream, message: &str) -> EngineResult<()> {
    let mut buf = Vec::with_capacity(message.len() + 1);
    buf.extend_from_slice(message.as_bytes());
    buf.push(0);
    stream
        .write_all(&buf)
        .map_err(|e| EngineError::transport(format!("writing command: {e}")))
}

fn read_framed(stream: &mut TcpStream) -> EngineResult<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                return Err(EngineError::transport("connection closed while reading reply"));
            }
            Ok(_) => {
                if byte[0] == 0 {
                    break;
                }
                buf.push(byte[0]);
            }
            Err(e) => return Err(EngineError::transport(format!("reading reply: {e}"))),
        }
    }
    String::from_utf8(buf).map_err(|e| EngineError::protocol(format!("reply not utf-8: {e}")))
}

/// Two-phase non-blocking read: first check whether any bytes are available
/// at all (returning `Ok(None)` on `WouldBlock`), then switch to a short
/// blocking read to pull the rest of the current message once its start has
/// appeared, since a message boundary is not guaranteed to coincide with a
/// single non-blocking read.
fn try_read_framed_nonblocking(stream: &mut TcpStream) -> EngineResult<Option<String>> {
    let mut first = [0u8; 1];
    match stream.read(&mut first) {
        Ok(0) => Err(EngineError::transport("feedback connection closed")),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(EngineError::transport(format!("reading feedback: {e}"))),
        Ok(_) => {
            if first[0] == 0 {
                return Ok(Some(String::new()));
            }
            let mut buf = vec![first[0]];
            stream
                .set_nonblocking(false)
                .map_err(|e| EngineError::transport(format!("feedback socket blocking: {e}")))?;
            let result = (|| {
                let mut byte = [0u8; 1];
                loop {
                    match stream.read(&mut byte) {
                        Ok(0) => {
                            return Err(EngineError::transport("feedback connection closed mid-message"))
                        }
                        Ok(_) => {
                            if byte[0] == 0 {
                                break;
                            }
                            buf.push(byte[0]);
                        }
                        Err(e) => return Err(EngineError::transport(format!("reading feedback: {e}"))),
                    }
                }
                Ok(())
            })();
            stream
                .set_nonblocking(true)
                .map_err(|e| EngineError::transport(format!("feedback socket nonblocking: {e}")))?;
            result?;
            String::from_utf8(buf)
                .map(Some)
                .map_err(|e| EngineError::protocol(format!("feedback not utf-8: {e}")))
        }
    }
}

/// Dummy-mode canned replies: enough to keep callers that always expect a
/// `resp 0 ...` shaped reply working without a real engine, per the `param_get`
/// and `patch_get` request shapes that need a nonempty payload.
fn dummy_reply_payload(message: &str) -> &'static str {
    if message.starts_with("param_get") {
        "0"
    } else if message.starts_with("patch_get") {
        "f 0"
    } else {
        ""
    }
}
