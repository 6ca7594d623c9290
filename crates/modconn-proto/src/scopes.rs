//! RAII batching guards for pipelined command dispatch.
//!
//! The original client exposed `NonBlockingScope`/`NonBlockingScopeWithAudioFades`
//! as constructor/destructor pairs with a runtime "must not nest" assertion.
//! Here the same batching is expressed as a pair of guard types that borrow
//! the client exclusively for their lifetime: the borrow checker makes
//! nesting a compile error instead of a debug-only assertion.

use crate::client::EngineClient;
use crate::command::ProcessingMode;
use crate::error::EngineResult;

/// Batches commands without waiting for each reply individually.
///
/// While this guard is alive, [`EngineClient::poll_feedback`] and other
/// blocking calls must not be issued elsewhere, which the `&mut` borrow this
/// guard holds already guarantees. On drop, queued replies are drained.
#[must_use = "dropping this immediately defeats the purpose of batching"]
pub struct NonBlockingScope<'a> {
    client: &'a mut EngineClient,
}

impl<'a> NonBlockingScope<'a> {
    pub(crate) fn new(client: &'a mut EngineClient) -> Self {
        client.begin_batch();
        Self { client }
    }

    /// Borrow the underlying client to issue batched commands.
    pub fn client(&mut self) -> &mut EngineClient {
        self.client
    }
}

impl Drop for NonBlockingScope<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.client.end_batch() {
            tracing::warn!(error = %err, "error draining batched replies");
        }
    }
}

/// Like [`NonBlockingScope`], but additionally fades audio processing out on
/// construction and back in on drop, so the batched changes take effect
/// without an audible click.
#[must_use = "dropping this immediately defeats the purpose of batching"]
pub struct FadeGuardScope<'a> {
    client: &'a mut EngineClient,
}

impl<'a> FadeGuardScope<'a> {
    pub(crate) fn new(client: &'a mut EngineClient) -> EngineResult<Self> {
        client.feature_enable_processing(ProcessingMode::OffWithFadeOut)?;
        client.begin_batch();
        Ok(Self { client })
    }

    /// Borrow the underlying client to issue batched commands.
    pub fn client(&mut self) -> &mut EngineClient {
        self.client
    }
}

impl Drop for FadeGuardScope<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.client.end_batch() {
            tracing::warn!(error = %err, "error draining batched replies");
        }
        if let Err(err) = self.client.feature_enable_processing(ProcessingMode::OnWithFadeIn) {
            tracing::warn!(error = %err, "error re-enabling processing after fade-guarded batch");
        }
    }
}
