//! Text recognition backend interface.

use super::{Rect, Screenshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of one recognition pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub blocks: Vec<OcrTextBlock>,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrTextBlock {
    pub text: String,
    pub lines: Vec<OcrTextLine>,
    pub bounding_box: Rect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrTextLine {
    pub text: String,
    pub elements: Vec<OcrTextElement>,
    pub bounding_box: Rect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrTextElement {
    pub text: String,
    pub bounding_box: Rect,
    pub confidence: f32,
}

impl OcrResult {
    pub fn success(blocks: Vec<OcrTextBlock>) -> Self {
        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            text,
            blocks,
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            blocks: Vec::new(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// Bounds of the first block containing `query`, case-insensitively
    pub fn locate(&self, query: &str) -> Option<Rect> {
        let needle = query.to_lowercase();
        self.blocks
            .iter()
            .find(|block| block.text.to_lowercase().contains(&needle))
            .map(|block| block.bounding_box)
    }
}

impl OcrTextBlock {
    pub fn new(text: impl Into<String>, bounding_box: Rect) -> Self {
        Self {
            text: text.into(),
            lines: Vec::new(),
            bounding_box,
        }
    }
}

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognise text in `image`, optionally restricted to `region`
    async fn recognize_text(&self, image: &Screenshot, region: Option<Rect>) -> OcrResult;
}
