//! Common error types for alignment import/export runs

use thiserror::Error;

/// Common result type for alignment operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the import and export clients.
///
/// Every variant except the warnings logged by the MET parser is fatal to
/// the run: nothing is retried, and no collection is persisted until every
/// section has been updated in memory.
#[derive(Error, Debug)]
pub enum Error {
    /// Parameter string rejected by the model named on the line
    #[error(
        "failed to parse transform data from line {line} of {path}, invalid data string is '{data}': {reason}"
    )]
    MalformedTransform {
        line: usize,
        path: String,
        data: String,
        reason: String,
    },

    /// Parameter string rejected by the declared model (no file context)
    #[error("failed to parse {class_name} data string '{data}': {reason}")]
    TransformParse {
        class_name: String,
        data: String,
        reason: String,
    },

    /// Transform class id not recognized by this client
    #[error("unknown transform class '{class_name}'")]
    UnknownTransformClass { class_name: String },

    /// Same tile id referenced twice within one run's input
    #[error(
        "tile id {tile_id} is listed more than once in {input}, \
         first reference at line {first_line}, second reference at line {second_line}"
    )]
    DuplicateTile {
        tile_id: String,
        input: String,
        first_line: usize,
        second_line: usize,
    },

    /// No sections/batches produced from the input
    #[error("no tile information found in {input}")]
    EmptyInput { input: String },

    /// Canonical collection empty, or empty after filtering to input ids
    #[error("{context} does not have any tiles")]
    EmptyCollection { context: String },

    /// Replace-policy target tile absent from the fetched collection
    #[error("tile spec with id '{tile_id}' not found in {context}, possible issue with z value")]
    MissingTile { tile_id: String, context: String },

    /// Flattened transform chain does not end in [Translation, Affine]
    #[error("tile {tile_id} {role} transform class is {class_name}")]
    UnexpectedTransformShape {
        tile_id: String,
        role: &'static str,
        class_name: String,
    },

    /// Concatenation requested for a variant pair with no closed form
    #[error("cannot concatenate {right} onto {left}")]
    UnsupportedConcatenation {
        left: &'static str,
        right: &'static str,
    },

    /// Malformed `sourceZ=targetZ` mapping string
    #[error("invalid z map string '{value}'")]
    InvalidZMap { value: String },

    /// Section id from the input has no z value in the basis stack
    #[error("section '{section_id}' not found in basis stack section data")]
    UnknownSection { section_id: String },

    /// Tile id does not carry a parseable trailing section id
    #[error("cannot parse section id from tile id '{tile_id}'")]
    InvalidTileId { tile_id: String },

    /// Tile spec failed validation
    #[error("tile {tile_id} failed validation: {reason}")]
    Validation { tile_id: String, reason: String },

    /// Web service returned a non-success status
    #[error("request to {url} failed with status {status}: {body}")]
    Client {
        status: u16,
        url: String,
        body: String,
    },

    /// HTTP transport error (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
