use std::fmt::Display;
use serde::{Deserialize, Serialize};

/// Payload carried by every structural (non-statement) edge of a CFG.
pub const EPS: &str = "ε";

/// Prefix of the mode-flag variables issued during normalization. User
/// programs are expected to stay out of this namespace.
pub const FLAG_PREFIX: &str = "__nflag_";

/// A program variable `x` is just a reference to a string.
#[derive(PartialEq, Clone, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarName(String);

impl VarName {
    pub fn new(s: &str) -> VarName {
        VarName(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for variables introduced by the normalizer itself.
    pub fn is_flag(&self) -> bool {
        self.0.starts_with(FLAG_PREFIX)
    }
}

impl Display for VarName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let VarName(s) = self;
        write!(f, "{}", s)
    }
}
