use std::future::Future;
use std::path::Path;

use tokio::time::Instant;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::evidence::{payload_digest, BinaryCodec, EvidenceBundle, EvidenceCodec};
use crate::frame::read_frame;
use crate::transport::unix::{self, SocketListener};

use super::ReceiverConfig;

/// Progress of a receive. Transitions only move forward; there is no accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReceiverState {
    Listening,
    Accepted,
    ReadingFrame,
    Decoding,
    Done,
    Failed,
}

impl ReceiverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn advance(&mut self, next: Self, path: &Path) {
        debug_assert!(next > *self, "receiver state moved backwards: {self:?} -> {next:?}");
        tracing::debug!(path = %path.display(), from = ?*self, to = ?next, "receiver state");
        *self = next;
    }
}

/// Accepts exactly one sender on the configured socket and reads one bundle.
#[derive(Debug, Clone)]
pub struct Receiver<C = BinaryCodec> {
    config: ReceiverConfig,
    codec: C,
}

impl Receiver<BinaryCodec> {
    pub fn new(config: ReceiverConfig) -> Self {
        Self::with_codec(config, BinaryCodec)
    }
}

impl<C: EvidenceCodec> Receiver<C> {
    pub fn with_codec(config: ReceiverConfig, codec: C) -> Self {
        Self { config, codec }
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Bind the socket, accept one connection, and decode the single frame it carries.
    ///
    /// The socket file is removed on every exit once bound. `config.timeout`
    /// bounds accept and read together and expires as [`Error::Timeout`];
    /// the context ending first yields [`Error::Cancelled`] or
    /// [`Error::DeadlineExceeded`].
    pub async fn receive(&self, ctx: &Context) -> Result<EvidenceBundle> {
        self.config.validate()?;
        if let Some(cause) = ctx.err() {
            return Err(cause.into());
        }

        let path = self.config.socket.as_path();
        let bind_failed = |source| Error::BindFailed {
            path: path.to_path_buf(),
            source,
        };
        // A live receiver on this path holds the lock; fail without touching it.
        let lock = ctx.run(unix::lock(path)).await?.map_err(bind_failed)?;
        if self.config.reclaim_stale_socket {
            ctx.run(unix::reclaim_stale(path, &lock))
                .await?
                .map_err(bind_failed)?;
        }
        let listener = unix::listen(path, lock).map_err(bind_failed)?;
        let deadline = Instant::now() + self.config.timeout;

        let mut state = ReceiverState::Listening;
        match self.exchange(ctx, listener, deadline, &mut state).await {
            Ok(bundle) => {
                state.advance(ReceiverState::Done, path);
                Ok(bundle)
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), state = ?state, error = %e, "receive failed");
                state.advance(ReceiverState::Failed, path);
                Err(e)
            }
        }
    }

    async fn exchange(
        &self,
        ctx: &Context,
        listener: SocketListener,
        deadline: Instant,
        state: &mut ReceiverState,
    ) -> Result<EvidenceBundle> {
        let path = self.config.socket.as_path();

        let mut stream = self.within(ctx, deadline, listener.accept()).await??;
        // One exchange per bind: stop listening and remove the socket now.
        drop(listener);
        state.advance(ReceiverState::Accepted, path);

        state.advance(ReceiverState::ReadingFrame, path);
        let payload = self.within(ctx, deadline, read_frame(&mut stream)).await??;

        state.advance(ReceiverState::Decoding, path);
        let bytes = payload.len();
        let digest = payload_digest(&payload);
        let bundle = self.codec.decode(payload).map_err(Error::Decode)?;

        tracing::info!(
            path = %path.display(),
            pieces = bundle.len(),
            bytes,
            digest = %digest,
            "evidence received"
        );
        Ok(bundle)
    }

    /// Run `fut` until it completes, `deadline` passes, or `ctx` ends.
    async fn within<F: Future>(&self, ctx: &Context, deadline: Instant, fut: F) -> Result<F::Output> {
        match ctx.run(tokio::time::timeout_at(deadline, fut)).await? {
            Ok(out) => Ok(out),
            Err(_elapsed) => Err(Error::Timeout(self.config.timeout)),
        }
    }
}

/// Receive one bundle with the default [`BinaryCodec`].
pub async fn receive(ctx: &Context, config: &ReceiverConfig) -> Result<EvidenceBundle> {
    Receiver::new(config.clone()).receive(ctx).await
}
