use serde::Deserialize;

/// Body of a new post or comment.
#[derive(Debug, Default, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: Option<String>,
}
