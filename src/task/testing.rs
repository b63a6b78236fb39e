//! Test doubles for the actuator traits.

use crate::actuator::{
    GesturePath, OcrResult, OcrTextBlock, Rect, Screenshot, TextRecognizer, UiActuator, UiNode,
};
use crate::executor::{CommandExecutor, ExecutionCommand, ExecutionResult, ExecutorError};
use crate::task::context::{Actuators, TaskContext};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory UI tree that records every action
#[derive(Default)]
pub struct MockUi {
    pub nodes: Vec<UiNode>,
    pub click_succeeds: bool,
    pub gesture_succeeds: bool,
    pub set_text_succeeds: bool,
    pub screen: Option<Screenshot>,
    pub lookups: AtomicUsize,
    pub clicks: Mutex<Vec<String>>,
    pub gestures: Mutex<Vec<(GesturePath, Duration)>>,
    pub texts: Mutex<Vec<(String, String)>>,
}

impl MockUi {
    pub fn new(nodes: Vec<UiNode>) -> Self {
        Self {
            nodes,
            click_succeeds: true,
            gesture_succeeds: true,
            set_text_succeeds: true,
            ..Default::default()
        }
    }

    pub fn with_screen(mut self, screen: Screenshot) -> Self {
        self.screen = Some(screen);
        self
    }

    pub fn click_count(&self) -> usize {
        self.clicks.lock().unwrap().len()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn find(&self, predicate: impl Fn(&UiNode) -> bool) -> Option<UiNode> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.nodes.iter().find(|n| predicate(n)).cloned()
    }
}

#[async_trait]
impl UiActuator for MockUi {
    async fn find_node_by_text(&self, text: &str) -> Option<UiNode> {
        self.find(|n| n.text.as_deref() == Some(text))
    }

    async fn find_node_by_id(&self, view_id: &str) -> Option<UiNode> {
        self.find(|n| n.view_id.as_deref() == Some(view_id))
    }

    async fn find_node_by_content_description(&self, description: &str) -> Option<UiNode> {
        self.find(|n| n.content_description.as_deref() == Some(description))
    }

    async fn perform_click(&self, node: &UiNode) -> bool {
        self.clicks.lock().unwrap().push(node.handle.clone());
        self.click_succeeds
    }

    async fn dispatch_gesture(&self, path: &GesturePath, duration: Duration) -> bool {
        self.gestures.lock().unwrap().push((path.clone(), duration));
        self.gesture_succeeds
    }

    async fn set_text(&self, node: &UiNode, text: &str) -> bool {
        self.texts
            .lock()
            .unwrap()
            .push((node.handle.clone(), text.to_string()));
        self.set_text_succeeds
    }

    async fn capture_screen(&self) -> Option<Screenshot> {
        self.screen.clone()
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

/// Backend whose node lookups panic, standing in for a broken actuator
pub struct PanickingUi;

#[async_trait]
impl UiActuator for PanickingUi {
    async fn find_node_by_text(&self, text: &str) -> Option<UiNode> {
        panic!("lookup of '{}' crashed", text)
    }

    async fn find_node_by_id(&self, view_id: &str) -> Option<UiNode> {
        panic!("lookup of '{}' crashed", view_id)
    }

    async fn find_node_by_content_description(&self, description: &str) -> Option<UiNode> {
        panic!("lookup of '{}' crashed", description)
    }

    async fn perform_click(&self, _node: &UiNode) -> bool {
        false
    }

    async fn dispatch_gesture(&self, _path: &GesturePath, _duration: Duration) -> bool {
        false
    }

    async fn set_text(&self, _node: &UiNode, _text: &str) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "panicking"
    }
}

/// Recognizer that reports a fixed set of blocks
pub struct MockOcr {
    pub blocks: Vec<(String, Rect)>,
}

#[async_trait]
impl TextRecognizer for MockOcr {
    async fn recognize_text(&self, _image: &Screenshot, _region: Option<Rect>) -> OcrResult {
        OcrResult::success(
            self.blocks
                .iter()
                .map(|(text, rect)| OcrTextBlock::new(text.clone(), *rect))
                .collect(),
        )
    }
}

/// Process actuator that logs `start:<script>`/`end:<script>` and sleeps
/// for `delay` in between.
#[derive(Default)]
pub struct RecordingExecutor {
    pub delay: Duration,
    pub exit_code: i32,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl RecordingExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, cmd: ExecutionCommand) -> Result<ExecutionResult, ExecutorError> {
        let script = cmd
            .stdin
            .as_deref()
            .and_then(|s| s.lines().next())
            .unwrap_or_default()
            .to_string();
        self.log.lock().unwrap().push(format!("start:{}", script));
        if let Some(timeout) = cmd.timeout {
            if self.delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(ExecutorError::Timeout(timeout));
            }
        }
        tokio::time::sleep(self.delay).await;
        self.log.lock().unwrap().push(format!("end:{}", script));
        Ok(ExecutionResult {
            stdout: String::new(),
            stderr: if self.exit_code == 0 {
                String::new()
            } else {
                "boom\n".to_string()
            },
            exit_code: self.exit_code,
            duration: self.delay,
        })
    }

    fn executor_type(&self) -> &'static str {
        "recording"
    }
}

pub fn ui_context(ui: Arc<MockUi>) -> TaskContext {
    TaskContext::new(Actuators::host_only().with_ui(ui))
}

pub fn process_context(process: Arc<RecordingExecutor>) -> TaskContext {
    TaskContext::new(Actuators::host_only().with_process(process))
}
