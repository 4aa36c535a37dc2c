//! Reversible hex encoding for star narratives.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("story is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("story is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub fn encode_story(story: &str) -> String {
    hex::encode(story.as_bytes())
}

pub fn decode_story(encoded: &str) -> Result<String, StoryError> {
    Ok(String::from_utf8(hex::decode(encoded)?)?)
}
