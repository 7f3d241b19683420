use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while normalizing. Each kind is fatal
/// at the call that raised it; no local recovery is attempted.
#[derive(Debug, Error)]
pub enum Error {
    /// The surface text or an edge payload could not be parsed.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// A CFG surgery left the graph in a state the structural
    /// invariants forbid. Late detection would corrupt the output, so
    /// these checks stay on in release builds.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// A full normalization round failed to reduce the back-edge count.
    #[error("no progress: back-edge count stuck at {0}")]
    Progress(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
