use thiserror::Error;

/// Every failure the HS110 protocol client can report.
#[derive(Debug, Error)]
pub enum Hs110Error {
    /// Cipher misuse: empty plaintext, short or badly framed ciphertext.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown measurement field `{0}`")]
    UnknownField(String),

    /// Connect, send or receive failed (timeouts included).
    #[error("could not exchange data with {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The reply did not decrypt into a realtime readout.
    #[error("could not decode reply: {0}")]
    Decode(String),

    #[error("connection retry limit {limit} reached")]
    RetryBudgetExhausted { limit: u32 },
}

impl Hs110Error {
    /// True only for the error that should stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Hs110Error::RetryBudgetExhausted { .. })
    }
}
