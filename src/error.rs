//! Rich diagnostic error types for the broca bridge.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the broca bridge.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum BrocaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Quantizer(#[from] QuantizerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Symbol(#[from] SymbolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Quantizer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QuantizerError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(broca::quantizer::dim_mismatch),
        help(
            "Every embedding fed to the quantizer must have the dimension it \
             was configured with. Check that the encoder and the quantizer \
             agree on the embedding dimension, and that a stale snapshot from \
             a different encoder is not being loaded."
        )
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("quantizer is empty: no prototype nodes to classify against")]
    #[diagnostic(
        code(broca::quantizer::empty),
        help("Insert at least one vector before calling classify().")
    )]
    Empty,
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SnapshotError {
    #[error("I/O error on snapshot {path}: {source}")]
    #[diagnostic(
        code(broca::snapshot::io),
        help(
            "A filesystem operation on the knowledge snapshot failed. Check \
             that the path exists, has correct permissions, and that the disk \
             is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot encode/decode error: {message}")]
    #[diagnostic(
        code(broca::snapshot::codec),
        help(
            "The snapshot could not be serialized or deserialized. This \
             usually means the file was written by an incompatible version. \
             Delete the snapshot to start from a fresh vocabulary."
        )
    )]
    Codec { message: String },

    #[error("snapshot dimension {snapshot} does not match configured dimension {configured}")]
    #[diagnostic(
        code(broca::snapshot::dim_mismatch),
        help(
            "The snapshot was recorded with a different embedding dimension. \
             Symbol meanings are only stable within one vector space; either \
             restore the matching encoder configuration or delete the snapshot."
        )
    )]
    DimensionMismatch { snapshot: usize, configured: usize },
}

// ---------------------------------------------------------------------------
// Symbol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SymbolError {
    #[error("unknown symbol: {term}")]
    #[diagnostic(
        code(broca::symbol::unknown),
        help(
            "No live node is mapped to this term. The symbol may have been \
             retired after pruning, or the term was never minted by this \
             mapper. Callers should fall back to a default action."
        )
    )]
    UnknownSymbol { term: String },
}

// ---------------------------------------------------------------------------
// Action map errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ActionError {
    #[error("invalid action map: {reason}")]
    #[diagnostic(
        code(broca::action::invalid_map),
        help(
            "The declared action list must map operator names to indices \
             bijectively and cover every index from 0 to n-1 exactly once. \
             Fix the declaration; this error aborts startup."
        )
    )]
    InvalidActionMap { reason: String },

    #[error("unknown action operator: {name}")]
    #[diagnostic(
        code(broca::action::unknown_op),
        help(
            "The reasoner decided on an operator that is not in the declared \
             action space. Callers should fall back to an explore action."
        )
    )]
    UnknownAction { name: String },

    #[error("unknown action index: {index}")]
    #[diagnostic(
        code(broca::action::unknown_index),
        help("The index is outside the declared action space of this map.")
    )]
    UnknownIndex { index: usize },
}

// ---------------------------------------------------------------------------
// Bridge errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BridgeError {
    #[error("failed to spawn reasoner process `{command}`: {source}")]
    #[diagnostic(
        code(broca::bridge::spawn),
        help(
            "The reasoner executable could not be started. Check the \
             `--nar`/`--jar` path, and for the OpenNARS backend check that \
             `java` is on PATH."
        )
    )]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reasoner handshake timed out after {timeout_ms} ms")]
    #[diagnostic(
        code(broca::bridge::handshake),
        help(
            "The reasoner process started but produced no output within the \
             startup timeout. It may be the wrong binary, or it may be \
             printing to stderr only — inspect the process manually."
        )
    )]
    Handshake { timeout_ms: u64 },

    #[error("bridge is {state} — operation `{op}` requires Ready")]
    #[diagnostic(
        code(broca::bridge::bad_state),
        help("A faulted bridge must be restarted with restart() before use.")
    )]
    BadState { op: &'static str, state: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Fatal(#[from] FatalBridgeError),
}

/// Unrecoverable bridge failures. The current episode must terminate; the
/// driver either restarts the reasoner for the next episode or exits non-zero.
#[derive(Debug, Error, Diagnostic)]
pub enum FatalBridgeError {
    #[error("reasoner process exited unexpectedly")]
    #[diagnostic(
        code(broca::bridge::process_exited),
        help(
            "The reasoner died mid-episode. Its last output is in the trace \
             log. Restart the bridge, or abort the run."
        )
    )]
    ProcessExited,

    #[error("write to reasoner stdin failed: {source}")]
    #[diagnostic(
        code(broca::bridge::write_failed),
        help(
            "The wire protocol has no way to detect a torn message, so a \
             failed write cannot be retried. The bridge is faulted; restart it."
        )
    )]
    WriteFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("reasoner output channel closed")]
    #[diagnostic(
        code(broca::bridge::channel_closed),
        help("The reader thread terminated, usually because the process died.")
    )]
    ChannelClosed,
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(broca::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(broca::config::parse),
        help("Check the TOML syntax in the config file. {message}")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(broca::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(broca::config::invalid),
        help("Check the field constraints documented on BrocaConfig. {message}")
    )]
    Invalid { message: String },
}

/// Convenience alias for functions returning broca results.
pub type BrocaResult<T> = std::result::Result<T, BrocaError>;
