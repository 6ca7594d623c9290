//! The engine protocol client: ties command framing, transport and feedback
//! decoding together behind a synchronous request/response API.

use crate::command::{self, FlushedParam, ProcessingMode, ResetTag};
use crate::error::{error_code_to_string, EngineError, EngineResult};
use crate::feedback::{self, FeedbackEvent};
use crate::scopes::{FadeGuardScope, NonBlockingScope};
use crate::transport::Connection;
use crate::validate::{valid_instance, valid_jack_port, valid_symbol, valid_uri};

/// Maximum live plugin instance numbers the engine accepts, per the engine's
/// own instance table sizing.
pub const MAX_MOD_HOST_PLUGIN_INSTANCES: i16 = 9990;

/// Maximum concurrent tool (non-audio utility plugin) instances.
pub const MAX_MOD_HOST_TOOL_INSTANCES: i16 = 10;

const MIN_BPB: f64 = 1.0;
const MAX_BPB: f64 = 16.0;
const MIN_BPM: f64 = 20.0;
const MAX_BPM: f64 = 280.0;

/// A live (or dummy) connection to the audio engine.
///
/// Request methods block until the corresponding reply arrives, except while
/// a [`NonBlockingScope`] or [`FadeGuardScope`] is held, during which replies
/// are queued and drained when the guard is dropped.
pub struct EngineClient {
    connection: Connection,
    batching: bool,
    pending_reply_count: usize,
}

impl EngineClient {
    /// Connect to the engine (or enter dummy mode, per `MOD_DEV_HOST`).
    pub fn connect() -> EngineResult<Self> {
        Ok(Self {
            connection: Connection::connect()?,
            batching: false,
            pending_reply_count: 0,
        })
    }

    /// Drop and re-establish the underlying connection.
    pub fn reconnect(&mut self) -> EngineResult<()> {
        self.connection.reconnect()
    }

    /// Begin a batched, non-blocking command scope.
    pub fn batch(&mut self) -> NonBlockingScope<'_> {
        NonBlockingScope::new(self)
    }

    /// Begin a batched scope that also fades processing out/in around it.
    pub fn fade_guarded_batch(&mut self) -> EngineResult<FadeGuardScope<'_>> {
        FadeGuardScope::new(self)
    }

    pub(crate) fn begin_batch(&mut self) {
        debug_assert!(!self.batching, "non-blocking scopes must not nest");
        self.batching = true;
    }

    pub(crate) fn end_batch(&mut self) -> EngineResult<()> {
        self.batching = false;
        let mut first_err = None;
        while self.pending_reply_count > 0 {
            self.pending_reply_count -= 1;
            match self.connection.recv() {
                Ok(raw) => {
                    if let Err(e) = parse_reply(&raw) {
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                }
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Send one request. While batching, the command is written immediately
    /// but its reply is queued for later draining; otherwise this blocks for
    /// the reply and returns its payload.
    fn request(&mut self, message: &str) -> EngineResult<String> {
        tracing::debug!(message, "-> engine");
        if self.batching {
            self.connection.send(message)?;
            self.pending_reply_count += 1;
            return Ok(String::new());
        }
        let reply = self.connection.write_and_wait(message)?;
        parse_reply(&reply)
    }

    /// Instantiate a plugin by URI at `instance`.
    pub fn add(&mut self, uri: &str, instance: i16) -> EngineResult<()> {
        debug_assert!(valid_uri(uri), "add: malformed uri {uri}");
        debug_assert!(valid_instance(instance, false), "add: instance out of range {instance}");
        self.request(&command::add(uri, instance)).map(|_| ())
    }

    /// Preload (instantiate but do not connect) a plugin by URI.
    pub fn preload(&mut self, uri: &str, instance: i16) -> EngineResult<()> {
        debug_assert!(valid_uri(uri), "preload: malformed uri {uri}");
        debug_assert!(valid_instance(instance, false), "preload: instance out of range {instance}");
        self.request(&command::preload(uri, instance)).map(|_| ())
    }

    /// Destroy a plugin instance. `-1` removes every instance.
    pub fn remove(&mut self, instance: i16) -> EngineResult<()> {
        debug_assert!(valid_instance(instance, true), "remove: instance out of range {instance}");
        self.request(&command::remove(instance)).map(|_| ())
    }

    /// Enable or disable DSP activation for an instance.
    pub fn activate(&mut self, instance: i16, value: bool) -> EngineResult<()> {
        debug_assert!(valid_instance(instance, false), "activate: instance out of range {instance}");
        self.request(&command::activate(instance, value)).map(|_| ())
    }

    /// Bypass or un-bypass an instance.
    pub fn bypass(&mut self, instance: i16, value: bool) -> EngineResult<()> {
        debug_assert!(valid_instance(instance, false), "bypass: instance out of range {instance}");
        self.request(&command::bypass(instance, value)).map(|_| ())
    }

    /// Connect one jack port to another.
    pub fn connect(&mut self, origin: &str, destination: &str) -> EngineResult<()> {
        debug_assert!(valid_jack_port(origin), "connect: malformed port {origin}");
        debug_assert!(valid_jack_port(destination), "connect: malformed port {destination}");
        self.request(&command::connect(origin, destination)).map(|_| ())
    }

    /// Disconnect one jack port from another.
    pub fn disconnect(&mut self, origin: &str, destination: &str) -> EngineResult<()> {
        debug_assert!(valid_jack_port(origin), "disconnect: malformed port {origin}");
        debug_assert!(valid_jack_port(destination), "disconnect: malformed port {destination}");
        self.request(&command::disconnect(origin, destination)).map(|_| ())
    }

    /// Disconnect every connection touching `port`.
    pub fn disconnect_all(&mut self, port: &str) -> EngineResult<()> {
        debug_assert!(valid_jack_port(port), "disconnect_all: malformed port {port}");
        self.request(&command::disconnect_all(port)).map(|_| ())
    }

    /// Set a single control-port parameter's value.
    pub fn param_set(&mut self, instance: i16, symbol: &str, value: f32) -> EngineResult<()> {
        debug_assert!(valid_instance(instance, false), "param_set: instance out of range {instance}");
        debug_assert!(valid_symbol(symbol), "param_set: malformed symbol {symbol}");
        self.request(&command::param_set(instance, symbol, value)).map(|_| ())
    }

    /// Read a control-port parameter's current value.
    pub fn param_get(&mut self, instance: i16, symbol: &str) -> EngineResult<f32> {
        debug_assert!(valid_instance(instance, false), "param_get: instance out of range {instance}");
        debug_assert!(valid_symbol(symbol), "param_get: malformed symbol {symbol}");
        let payload = self.request(&command::param_get(instance, symbol))?;
        payload
            .trim()
            .parse()
            .map_err(|_| EngineError::protocol(format!("param_get non-numeric reply: {payload}")))
    }

    /// Atomically apply several parameter values in one command.
    pub fn params_flush(
        &mut self,
        instance: i16,
        reset: ResetTag,
        params: &[FlushedParam<'_>],
    ) -> EngineResult<()> {
        debug_assert!(valid_instance(instance, false), "params_flush: instance out of range {instance}");
        debug_assert!(
            params.iter().all(|p| valid_symbol(p.symbol)),
            "params_flush: malformed symbol among {params:?}"
        );
        self.request(&command::params_flush(instance, reset, params))
            .map(|_| ())
    }

    /// Set a patch property value (a JSON-encoded scalar or vector literal).
    pub fn patch_set(&mut self, instance: i16, uri: &str, value: &str) -> EngineResult<()> {
        debug_assert!(valid_instance(instance, false), "patch_set: instance out of range {instance}");
        debug_assert!(valid_uri(uri), "patch_set: malformed uri {uri}");
        self.request(&command::patch_set(instance, uri, value)).map(|_| ())
    }

    /// Read a patch property's current value, as the raw `"<type> <data>"` payload.
    pub fn patch_get(&mut self, instance: i16, uri: &str) -> EngineResult<String> {
        debug_assert!(valid_instance(instance, false), "patch_get: instance out of range {instance}");
        debug_assert!(valid_uri(uri), "patch_get: malformed uri {uri}");
        self.request(&command::patch_get(instance, uri))
    }

    /// Enable or disable audio-level monitor feedback for `port`.
    pub fn monitor_audio_levels(&mut self, port: &str, enable: bool) -> EngineResult<()> {
        debug_assert!(valid_jack_port(port), "monitor_audio_levels: malformed port {port}");
        self.request(&command::monitor_audio_levels(port, enable)).map(|_| ())
    }

    /// Enable or disable output-port monitor feedback for one instance symbol.
    pub fn monitor_output(&mut self, instance: i16, symbol: &str, enable: bool) -> EngineResult<()> {
        debug_assert!(valid_instance(instance, false), "monitor_output: instance out of range {instance}");
        debug_assert!(valid_symbol(symbol), "monitor_output: malformed symbol {symbol}");
        self.request(&command::monitor_output(instance, symbol, enable))
            .map(|_| ())
    }

    /// Toggle the engine's processing feature state.
    pub fn feature_enable_processing(&mut self, mode: ProcessingMode) -> EngineResult<()> {
        self.request(&command::feature_enable_processing(mode)).map(|_| ())
    }

    /// Tell the engine feedback data is ready to be pulled.
    pub fn output_data_ready(&mut self) -> EngineResult<()> {
        self.request(&command::output_data_ready()).map(|_| ())
    }

    /// Set transport rolling state and tempo in one command.
    ///
    /// `bpb` must be in `1..16` and `bpm` in `20..280`, matching the engine's
    /// own accepted ranges; out-of-range values trip a debug assertion (see
    /// crate-level validation notes) but are otherwise forwarded as-is in
    /// release builds.
    pub fn transport(&mut self, rolling: bool, bpb: f64, bpm: f64) -> EngineResult<()> {
        debug_assert!((MIN_BPB..MAX_BPB).contains(&bpb), "bpb out of range: {bpb}");
        debug_assert!((MIN_BPM..MAX_BPM).contains(&bpm), "bpm out of range: {bpm}");
        self.request(&command::transport(rolling, bpb, bpm)).map(|_| ())
    }

    /// Set tempo alone.
    pub fn set_bpm(&mut self, bpm: f64) -> EngineResult<()> {
        debug_assert!((MIN_BPM..MAX_BPM).contains(&bpm), "bpm out of range: {bpm}");
        self.request(&command::set_bpm(bpm)).map(|_| ())
    }

    /// Set beats-per-bar alone.
    pub fn set_bpb(&mut self, bpb: f64) -> EngineResult<()> {
        debug_assert!((MIN_BPB..MAX_BPB).contains(&bpb), "bpb out of range: {bpb}");
        self.request(&command::set_bpb(bpb)).map(|_| ())
    }

    /// Poll for one pending feedback event, if any is available without
    /// blocking. Call this regularly from the host's idle/UI thread.
    pub fn poll_feedback(&mut self) -> EngineResult<Option<FeedbackEvent>> {
        match self.connection.try_read_feedback()? {
            None => Ok(None),
            Some(raw) => match feedback::parse_feedback(&raw) {
                Some(event) => Ok(Some(event)),
                None => {
                    tracing::warn!(message = %raw, "unrecognized feedback message, dropping");
                    Ok(None)
                }
            },
        }
    }
}

/// Parse a `"resp <code> [payload]"` reply line into its payload, or a
/// reported error.
fn parse_reply(reply: &str) -> EngineResult<String> {
    let rest = reply
        .strip_prefix("resp ")
        .ok_or_else(|| EngineError::protocol(format!("reply missing 'resp ' prefix: {reply}")))?;

    let (code_str, payload) = match rest.split_once(' ') {
        Some((c, p)) => (c, p),
        None => (rest, ""),
    };

    let code: i32 = code_str
        .parse()
        .map_err(|_| EngineError::protocol(format!("non-numeric reply code: {code_str}")))?;

    if code < 0 {
        return Err(EngineError::Reported(error_code_to_string(code)));
    }

    Ok(payload.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_reply_with_payload() {
        assert_eq!(parse_reply("resp 0 3.5").unwrap(), "3.5");
    }

    #[test]
    fn parses_success_reply_without_payload() {
        assert_eq!(parse_reply("resp 0").unwrap(), "");
    }

    #[test]
    fn negative_code_becomes_reported_error() {
        let err = parse_reply("resp -1").unwrap_err();
        assert_eq!(err, EngineError::Reported("invalid instance"));
    }

    #[test]
    fn missing_prefix_is_protocol_error() {
        assert!(parse_reply("nope 0").is_err());
    }

    #[test]
    fn dummy_mode_client_connects_and_responds() {
        std::env::set_var("MOD_DEV_HOST", "1");
        let mut client = EngineClient::connect().unwrap();
        client.add("urn:test:plugin", 0).unwrap();
        let value = client.param_get(0, "gain").unwrap();
        assert_eq!(value, 0.0);
        std::env::remove_var("MOD_DEV_HOST");
    }
}
