//! Boundary to the external reasoning service.
//!
//! The coordination core never talks to a completion API directly. It sees a
//! text-in/text-out [`Oracle`] and decodes whatever comes back with
//! [`decode_reply`]: a structured object when one can be extracted, the raw
//! text otherwise. Invocation errors are soft everywhere in this crate:
//! callers log them and fall back to deterministic behavior.

mod decode;
mod scripted;

pub use decode::{decode_array, decode_reply, OracleReply};
pub use scripted::ScriptedOracle;

/// Synchronous text completion boundary.
///
/// Implementations wrap whatever reasoning service the embedding
/// application uses; the crate ships only [`ScriptedOracle`].
pub trait Oracle: Send + Sync {
    /// One prompt in, one reply out.
    fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}
