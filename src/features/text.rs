//! Extractors over plain-text vectors.
//!
//! Components are separated by commas or whitespace. These back the CLI,
//! which reads training and query vectors from text files.

use crate::features::{FeatureError, FeatureKind, GlobalFeatureExtractor, LocalFeatureExtractor};
use crate::vector::first_non_finite;

/// Parses one vector from a line of text.
pub fn parse_vector(line: &str) -> Result<Vec<f64>, FeatureError> {
    let vector = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(position, token)| {
            token
                .parse::<f64>()
                .map_err(|_| FeatureError::InvalidComponent {
                    position,
                    token: token.to_string(),
                })
        })
        .collect::<Result<Vec<f64>, _>>()?;
    if vector.is_empty() {
        return Err(FeatureError::Empty);
    }
    if let Some(position) = first_non_finite(&vector) {
        return Err(FeatureError::NonFinite(position));
    }
    Ok(vector)
}

/// Reads the whole content as a single vector.
#[derive(Debug, Default)]
pub struct TextVectorExtractor;

impl TextVectorExtractor {
    pub const KIND: FeatureKind = FeatureKind::new("text");
}

impl GlobalFeatureExtractor for TextVectorExtractor {
    fn kind(&self) -> FeatureKind {
        Self::KIND
    }

    fn extract(&self, content: &[u8]) -> Result<Vec<f64>, FeatureError> {
        parse_vector(&String::from_utf8_lossy(content))
    }
}

/// Reads one local feature per non-empty line. Lines starting with `#` are
/// comments.
#[derive(Debug, Default)]
pub struct TextLinesExtractor;

impl TextLinesExtractor {
    pub const KIND: FeatureKind = FeatureKind::new("text-lines");
}

impl LocalFeatureExtractor for TextLinesExtractor {
    fn kind(&self) -> FeatureKind {
        Self::KIND
    }

    fn extract(&self, content: &[u8]) -> Result<Vec<Vec<f64>>, FeatureError> {
        String::from_utf8_lossy(content)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(parse_vector)
            .collect()
    }
}
