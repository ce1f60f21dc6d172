use rand::Rng;

use crate::error::{GeneratorError, Result};

/// Manuscript id of the kitchen-sink article, longer than every real one.
pub const KITCHEN_SINK_ID: u64 = 1_234_567_890;

/// Room left for a 6-digit (or shorter) manuscript id.
const OFFSET: u64 = 1_000_000;
const KITCHEN_SINK_OFFSET: u64 = 10_000_000_000;
/// Keeps generated ids within 2^63 - 1.
const MAXIMUM_PREFIX: u64 = 9_223_372_036_854;
const KITCHEN_SINK_MAXIMUM_PREFIX: u64 = 92_233_720;

/// Given a manuscript id, generate an id with a random numeric prefix so
/// that repeated runs never collide.
pub fn generate_article_id(msid: &str) -> Result<String> {
    let msid = parse_msid(msid)?;
    let maximum = if msid == KITCHEN_SINK_ID {
        KITCHEN_SINK_MAXIMUM_PREFIX
    } else {
        MAXIMUM_PREFIX
    };
    let prefix = rand::rng().random_range(1..=maximum);
    Ok(article_id_with_prefix(msid, prefix))
}

/// Deterministic half of [`generate_article_id`].
pub fn article_id_with_prefix(msid: u64, prefix: u64) -> String {
    let offset = if msid == KITCHEN_SINK_ID {
        KITCHEN_SINK_OFFSET
    } else {
        OFFSET
    };
    (prefix * offset + msid).to_string()
}

pub fn generate_article_title() -> String {
    format!(
        "My spectrum article {}",
        rand::rng().random_range(1..1_000_000_000_000u64)
    )
}

fn parse_msid(msid: &str) -> Result<u64> {
    msid.trim()
        .parse()
        .map_err(|_| GeneratorError::InvalidId(msid.to_string()))
}
