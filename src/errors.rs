//! Error types for graph construction, partitioning, and consensus calling.

use thiserror::Error;

/// Error type for all fallible operations in this crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DedupError {
    /// A configured dimension was not supplied for a read
    #[error("Dimension '{dimension}' is missing for read '{read_id}'")]
    MissingDimension {
        /// The dimension name
        dimension: String,
        /// The read that lacks a value
        read_id: String
    },

    /// A configured target sequence field was not supplied for a read
    #[error("Sequence field '{column}' is missing for read '{read_id}'")]
    MissingColumn {
        /// The sequence field name
        column: String,
        /// The read that lacks the field
        read_id: String
    },

    /// A configured quality field was not supplied for a read
    #[error("Quality field '{column}' is missing for read '{read_id}'")]
    MissingQuality {
        /// The quality field name
        column: String,
        /// The read that lacks the field
        read_id: String
    },

    /// A read was registered twice for one dimension with different values
    #[error("Read '{read_id}' already has value '{existing}' for dimension '{dimension}', rejected '{rejected}'")]
    ConflictingValue {
        /// The dimension name
        dimension: String,
        /// The read with the conflicting observation
        read_id: String,
        /// The value that was registered first
        existing: String,
        /// The value that was rejected
        rejected: String
    },

    /// A dimension was re-registered with a different maximum edit distance
    #[error("Dimension '{dimension}' uses max distance {existing}, rejected {rejected}")]
    ConflictingDistance {
        /// The dimension name
        dimension: String,
        /// The distance that was registered first
        existing: usize,
        /// The distance that was rejected
        rejected: usize
    },

    /// A read was added twice to the same run
    #[error("Read '{read_id}' was already added")]
    DuplicateRead {
        /// The duplicated read
        read_id: String
    },

    /// A sequence and its quality string differ in length
    #[error("Sequence length {sequence_len} does not match quality length {quality_len} for read '{read_id}'")]
    QualityLengthMismatch {
        /// The read, or its position in the family when no identifier is known
        read_id: String,
        /// Length of the sequence
        sequence_len: usize,
        /// Length of the quality string
        quality_len: usize
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String
    },

    /// The rayon thread pool could not be created
    #[error("Failed to create thread pool: {0}")]
    ThreadPool(String),

    /// Observations were added after graph construction started
    #[error("Cannot add observations to dimension '{dimension}' after the graph is built")]
    NetworkFrozen {
        /// The dimension the observation targeted
        dimension: String
    },

    /// An operation needs the graph, but `build_graph()` was not called
    #[error("The similarity graph has not been built")]
    GraphNotBuilt
}
