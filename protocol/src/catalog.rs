use std::collections::BTreeMap;

use runlab_payload_codec::DecodeError;
use thiserror::Error;

use crate::ExerciseData;

/// Exercise data of one page, keyed by exercise id.
pub type ExerciseCatalog = BTreeMap<String, ExerciseData>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to decompress exercise catalog: {0}")]
    Decode(#[from] DecodeError),

    #[error("exercise catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decompress and parse a page's exercise catalog.
pub fn decode_exercise_catalog(compressed: &str) -> Result<ExerciseCatalog, CatalogError> {
    let json = runlab_payload_codec::decode(compressed)?;
    parse_exercise_catalog(&json)
}

/// Parse an already decompressed catalog.
pub fn parse_exercise_catalog(json: &str) -> Result<ExerciseCatalog, CatalogError> {
    let catalog: ExerciseCatalog = serde_json::from_str(json)?;
    tracing::debug!(exercises = catalog.len(), "exercise catalog loaded");
    Ok(catalog)
}
