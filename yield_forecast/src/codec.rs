//! Binary encoding of fitted models
//!
//! Artifacts are a bincode-encoded envelope carrying a format version and the
//! algorithm tag next to the model, so a payload written by an incompatible
//! build is rejected instead of misread.

use crate::error::{ForecastError, Result};
use crate::models::{Algorithm, FittedModel};
use bincode::Options;
use serde::{Deserialize, Serialize};

/// Version written into every artifact
pub const FORMAT_VERSION: u16 = 1;

/// Upper bound on a decoded artifact
const MAX_ARTIFACT_BYTES: u64 = 64 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ARTIFACT_BYTES)
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u16,
    algorithm: Algorithm,
    model: &'a FittedModel,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u16,
    algorithm: Algorithm,
    model: FittedModel,
}

/// Serialize a fitted model to bytes
pub fn encode(model: &FittedModel) -> Result<Vec<u8>> {
    let envelope = EnvelopeRef {
        format_version: FORMAT_VERSION,
        algorithm: model.algorithm(),
        model,
    };
    Ok(options().serialize(&envelope)?)
}

/// Deserialize bytes produced by [`encode`]
pub fn decode(bytes: &[u8]) -> Result<FittedModel> {
    let envelope: Envelope = options().deserialize(bytes)?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(ForecastError::Codec(format!(
            "Unsupported artifact format version {} (expected {})",
            envelope.format_version, FORMAT_VERSION
        )));
    }
    if envelope.algorithm != envelope.model.algorithm() {
        return Err(ForecastError::Codec(format!(
            "Artifact is tagged {} but holds a {} model",
            envelope.algorithm,
            envelope.model.algorithm()
        )));
    }

    Ok(envelope.model)
}
