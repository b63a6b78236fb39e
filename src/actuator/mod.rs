//! # Actuator Capability Interfaces
//!
//! Narrow interfaces the task engine drives the interactive surface through.
//! Platform backends (an accessibility tree, a screen reader, a test double)
//! implement these traits and are handed to tasks via
//! [`TaskContext`](crate::task::TaskContext); nothing in the engine looks them
//! up through global state.
//!
//! - **[`UiActuator`]**: node lookup, click, gesture dispatch, text entry
//! - **[`TextRecognizer`]**: OCR over a captured [`Screenshot`]
//!
//! Process execution lives in [`crate::executor`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text recognition (OCR) backend types.
pub mod ocr;

pub use ocr::{OcrResult, OcrTextBlock, OcrTextElement, OcrTextLine, TextRecognizer};

/// A point on the surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, `right`/`bottom` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Snapshot of a node in the UI tree as reported by the backend.
///
/// `handle` is opaque to the engine; backends use it to find the live node
/// again when an action is performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    pub handle: String,
    pub view_id: Option<String>,
    pub text: Option<String>,
    pub content_description: Option<String>,
    pub bounds: Option<Rect>,
    pub editable: bool,
}

impl UiNode {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            view_id: None,
            text: None,
            content_description: None,
            bounds: None,
            editable: false,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_view_id(mut self, view_id: impl Into<String>) -> Self {
        self.view_id = Some(view_id.into());
        self
    }

    pub fn with_content_description(mut self, description: impl Into<String>) -> Self {
        self.content_description = Some(description.into());
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }
}

/// Single-stroke gesture path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GesturePath {
    pub points: Vec<Point>,
}

impl GesturePath {
    /// Straight line from `start` to `end`
    pub fn line(start: Point, end: Point) -> Self {
        Self {
            points: vec![start, end],
        }
    }

    /// Stationary press at a single point
    pub fn tap(at: Point) -> Self {
        Self { points: vec![at] }
    }

    pub fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<Point> {
        self.points.last().copied()
    }
}

/// Raw screen capture handed to a [`TextRecognizer`]
#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA pixels
    pub pixels: Vec<u8>,
}

impl Screenshot {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// UI tree backend.
///
/// Lookups return the first matching node. Action methods report success as
/// `bool` the way accessibility backends do; the calling task decides whether
/// a `false` is retried or turned into an error.
#[async_trait]
pub trait UiActuator: Send + Sync {
    async fn find_node_by_text(&self, text: &str) -> Option<UiNode>;

    async fn find_node_by_id(&self, view_id: &str) -> Option<UiNode>;

    async fn find_node_by_content_description(&self, description: &str) -> Option<UiNode>;

    async fn perform_click(&self, node: &UiNode) -> bool;

    async fn dispatch_gesture(&self, path: &GesturePath, duration: Duration) -> bool;

    async fn set_text(&self, node: &UiNode, text: &str) -> bool;

    async fn is_editable(&self, node: &UiNode) -> bool {
        node.editable
    }

    /// Capture the current screen for OCR. Backends without capture support
    /// keep the default.
    async fn capture_screen(&self) -> Option<Screenshot> {
        None
    }

    fn backend_name(&self) -> &'static str;
}
