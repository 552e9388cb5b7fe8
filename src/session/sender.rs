use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::evidence::{payload_digest, BinaryCodec, EvidenceBundle, EvidenceCodec};
use crate::frame::frame;
use crate::transport::unix;

use super::retry::{with_retry, RetryError};
use super::SenderConfig;

/// Progress of a send. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SenderState {
    /// Trying to connect; may repeat up to `max_retries + 1` times.
    Connecting,
    /// Connected; writing the frame. Never retried.
    Writing,
    Done,
    Failed,
}

impl SenderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn advance(&mut self, next: Self, path: &Path) {
        debug_assert!(next > *self, "sender state moved backwards: {self:?} -> {next:?}");
        tracing::debug!(path = %path.display(), from = ?*self, to = ?next, "sender state");
        *self = next;
    }
}

/// Delivers one evidence bundle to a receiver listening on the configured socket.
#[derive(Debug, Clone)]
pub struct Sender<C = BinaryCodec> {
    config: SenderConfig,
    codec: C,
}

impl Sender<BinaryCodec> {
    pub fn new(config: SenderConfig) -> Self {
        Self::with_codec(config, BinaryCodec)
    }
}

impl<C: EvidenceCodec> Sender<C> {
    pub fn with_codec(config: SenderConfig, codec: C) -> Self {
        Self { config, codec }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Encode `bundle`, connect (with retries), and write it as a single frame.
    ///
    /// Only connection establishment is retried. Once connected, any write
    /// failure is returned as [`Error::Io`]. No acknowledgement is read:
    /// success means the transport accepted every framed byte.
    pub async fn send(&self, ctx: &Context, bundle: &EvidenceBundle) -> Result<()> {
        self.config.validate()?;
        let payload = self.codec.encode(bundle).map_err(Error::Encode)?;

        let path = self.config.socket.as_path();
        let mut state = SenderState::Connecting;
        match self.deliver(ctx, &payload, &mut state).await {
            Ok(()) => {
                state.advance(SenderState::Done, path);
                tracing::info!(
                    path = %path.display(),
                    pieces = bundle.len(),
                    bytes = payload.len(),
                    digest = %payload_digest(&payload),
                    "evidence sent"
                );
                Ok(())
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), state = ?state, error = %e, "send failed");
                state.advance(SenderState::Failed, path);
                Err(e)
            }
        }
    }

    async fn deliver(&self, ctx: &Context, payload: &[u8], state: &mut SenderState) -> Result<()> {
        let path = self.config.socket.as_path();
        let policy = self.config.retry_policy();

        let mut stream = with_retry(ctx, &policy, || unix::connect(path))
            .await
            .map_err(|e| match e {
                RetryError::Cancelled(cause) => Error::from(cause),
                RetryError::Exhausted { attempts, last } => Error::ConnectFailed {
                    path: path.to_path_buf(),
                    attempts,
                    source: last,
                },
            })?;
        state.advance(SenderState::Writing, path);

        let framed = frame(payload)?;
        let write = async {
            stream.write_all(&framed).await?;
            stream.flush().await?;
            stream.shutdown().await
        };
        ctx.run(write).await??;
        Ok(())
    }
}

/// Send `bundle` with the default [`BinaryCodec`].
pub async fn send(ctx: &Context, config: &SenderConfig, bundle: &EvidenceBundle) -> Result<()> {
    Sender::new(config.clone()).send(ctx, bundle).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered_forward() {
        assert!(SenderState::Connecting < SenderState::Writing);
        assert!(SenderState::Writing < SenderState::Done);
        assert!(SenderState::Done.is_terminal());
        assert!(SenderState::Failed.is_terminal());
        assert!(!SenderState::Writing.is_terminal());
    }

    #[tokio::test]
    async fn invalid_config_fails_before_connecting() {
        let mut config = SenderConfig::default();
        config.socket = "".into();
        let err = send(&Context::new(), &config, &EvidenceBundle::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
