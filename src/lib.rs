pub mod context;
pub mod error;
pub mod evidence;
pub mod frame;
pub mod session;
pub mod transport;

// Re-export key types at crate root for convenience.
pub use context::{Cancellation, Context};
pub use error::{CodecError, Error, FrameError, Result};
pub use evidence::{BinaryCodec, EvidenceBundle, EvidenceCodec, EvidenceType, SignedEvidencePiece};
pub use frame::{frame, read_frame, MAX_PAYLOAD_SIZE};
pub use session::receiver::{receive, Receiver, ReceiverState};
pub use session::retry::RetryPolicy;
pub use session::sender::{send, Sender, SenderState};
pub use session::{ReceiverConfig, SenderConfig, DEFAULT_SOCKET_PATH};
