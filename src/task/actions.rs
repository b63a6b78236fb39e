//! Leaf tasks that drive the actuators.
//!
//! Each variant is a plain data struct with an `execute` method. Delays go
//! through [`TaskContext::sleep`] so a cancelled task stops at its next
//! suspension point.

use crate::actuator::{GesturePath, Point, UiActuator, UiNode};
use crate::executor::ExecutorError;
use crate::task::context::TaskContext;
use crate::task::types::{TaskError, TaskId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Pause between unsuccessful click attempts
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Duration of the synthetic tap used for OCR clicks
pub const OCR_TAP_DURATION: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct ClickTask {
    pub target_id: Option<String>,
    pub text: Option<String>,
    pub content_description: Option<String>,
    pub wait_after: Duration,
    pub timeout: Duration,
    pub use_ocr: bool,
}

/// Which attribute a click or input resolves its node by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget<'a> {
    Id(&'a str),
    Text(&'a str),
    ContentDescription(&'a str),
}

impl ClickTarget<'_> {
    fn value(&self) -> &str {
        match self {
            ClickTarget::Id(v) | ClickTarget::Text(v) | ClickTarget::ContentDescription(v) => v,
        }
    }

    async fn resolve(&self, ui: &Arc<dyn UiActuator>) -> Option<UiNode> {
        match self {
            ClickTarget::Id(id) => ui.find_node_by_id(id).await,
            ClickTarget::Text(text) => ui.find_node_by_text(text).await,
            ClickTarget::ContentDescription(desc) => ui.find_node_by_content_description(desc).await,
        }
    }
}

impl std::fmt::Display for ClickTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClickTarget::Id(v) => write!(f, "id '{}'", v),
            ClickTarget::Text(v) => write!(f, "text '{}'", v),
            ClickTarget::ContentDescription(v) => write!(f, "description '{}'", v),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ClickTask {
    fn empty() -> Self {
        Self {
            target_id: None,
            text: None,
            content_description: None,
            wait_after: Duration::from_millis(500),
            timeout: Duration::from_millis(10_000),
            use_ocr: false,
        }
    }

    pub fn by_id(target_id: impl Into<String>) -> Self {
        Self {
            target_id: Some(target_id.into()),
            ..Self::empty()
        }
    }

    pub fn by_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::empty()
        }
    }

    pub fn by_content_description(description: impl Into<String>) -> Self {
        Self {
            content_description: Some(description.into()),
            ..Self::empty()
        }
    }

    pub fn with_wait_after(mut self, wait_after: Duration) -> Self {
        self.wait_after = wait_after;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ocr(mut self, use_ocr: bool) -> Self {
        self.use_ocr = use_ocr;
        self
    }

    /// First non-empty of target id, text, content description
    pub fn target(&self) -> Option<ClickTarget<'_>> {
        non_empty(&self.target_id)
            .map(ClickTarget::Id)
            .or_else(|| non_empty(&self.text).map(ClickTarget::Text))
            .or_else(|| non_empty(&self.content_description).map(ClickTarget::ContentDescription))
    }

    pub async fn execute(&self, id: &TaskId, ctx: &TaskContext) -> Result<(), TaskError> {
        let target = self
            .target()
            .ok_or_else(|| TaskError::TargetNotFound("click has no target".to_string()))?;

        let start = Instant::now();
        let mut attempts = 0u32;
        loop {
            if start.elapsed() >= self.timeout {
                warn!(
                    "Click {} on {} gave up after {} attempts",
                    id, target, attempts
                );
                return Err(TaskError::Timeout {
                    operation: format!("click on {}", target),
                    timeout: self.timeout,
                });
            }

            attempts += 1;
            let clicked = if self.use_ocr {
                self.attempt_ocr(target.value(), ctx).await
            } else {
                self.attempt_node(target, ctx).await
            };
            if clicked {
                debug!("Click {} on {} succeeded (attempt {})", id, target, attempts);
                break;
            }

            ctx.sleep(RETRY_BACKOFF).await?;
        }

        ctx.sleep(self.wait_after).await
    }

    async fn attempt_node(&self, target: ClickTarget<'_>, ctx: &TaskContext) -> bool {
        let Some(ui) = ctx.ui() else {
            debug!("No UI actuator available for click on {}", target);
            return false;
        };
        match target.resolve(ui).await {
            Some(node) => ui.perform_click(&node).await,
            None => false,
        }
    }

    async fn attempt_ocr(&self, query: &str, ctx: &TaskContext) -> bool {
        let (Some(ui), Some(ocr)) = (ctx.ui(), ctx.ocr()) else {
            debug!("OCR click on '{}' needs both UI and OCR actuators", query);
            return false;
        };
        let Some(screen) = ui.capture_screen().await else {
            return false;
        };
        let result = ocr.recognize_text(&screen, None).await;
        if !result.success {
            debug!("OCR failed: {}", result.error.unwrap_or_default());
            return false;
        }
        match result.locate(query) {
            Some(bounds) => {
                ui.dispatch_gesture(&GesturePath::tap(bounds.center()), OCR_TAP_DURATION)
                    .await
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputTask {
    pub target_id: Option<String>,
    pub text: Option<String>,
    pub input: String,
    pub append: bool,
    pub wait_after: Duration,
}

impl InputTask {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            target_id: None,
            text: None,
            input: input.into(),
            append: false,
            wait_after: Duration::from_millis(500),
        }
    }

    pub fn with_target_id(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_target_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn appending(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn with_wait_after(mut self, wait_after: Duration) -> Self {
        self.wait_after = wait_after;
        self
    }

    pub fn target(&self) -> Option<ClickTarget<'_>> {
        non_empty(&self.target_id)
            .map(ClickTarget::Id)
            .or_else(|| non_empty(&self.text).map(ClickTarget::Text))
    }

    pub async fn execute(&self, id: &TaskId, ctx: &TaskContext) -> Result<(), TaskError> {
        let ui = ctx
            .ui()
            .ok_or_else(|| TaskError::ActuatorUnavailable("UI".to_string()))?;
        let target = self
            .target()
            .ok_or_else(|| TaskError::TargetNotFound("input has no target".to_string()))?;

        let node = target
            .resolve(ui)
            .await
            .ok_or_else(|| TaskError::TargetNotFound(target.to_string()))?;

        if !ui.is_editable(&node).await {
            return Err(TaskError::TargetNotEditable(target.to_string()));
        }

        let value = if self.append {
            format!("{}{}", node.text.as_deref().unwrap_or_default(), self.input)
        } else {
            self.input.clone()
        };

        if !ui.set_text(&node, &value).await {
            return Err(TaskError::ActionFailed(format!(
                "could not set text on {}",
                target
            )));
        }
        debug!("Input {} wrote {} chars to {}", id, value.len(), target);

        ctx.sleep(self.wait_after).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwipeTask {
    pub start: Point,
    pub end: Point,
    pub duration: Duration,
    pub wait_after: Duration,
}

impl SwipeTask {
    pub fn new(start: Point, end: Point, duration: Duration) -> Self {
        Self {
            start,
            end,
            duration,
            wait_after: Duration::from_millis(500),
        }
    }

    pub fn with_wait_after(mut self, wait_after: Duration) -> Self {
        self.wait_after = wait_after;
        self
    }

    pub async fn execute(&self, id: &TaskId, ctx: &TaskContext) -> Result<(), TaskError> {
        let ui = ctx
            .ui()
            .ok_or_else(|| TaskError::ActuatorUnavailable("UI".to_string()))?;

        let path = GesturePath::line(self.start, self.end);
        if !ui.dispatch_gesture(&path, self.duration).await {
            return Err(TaskError::ActionFailed(format!(
                "swipe from ({}, {}) to ({}, {}) was rejected",
                self.start.x, self.start.y, self.end.x, self.end.y
            )));
        }
        debug!("Swipe {} dispatched", id);

        // The gesture runs asynchronously on the device
        ctx.sleep(self.duration).await?;
        ctx.sleep(self.wait_after).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitTask {
    pub duration: Duration,
}

impl WaitTask {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn millis(milliseconds: u64) -> Self {
        Self::new(Duration::from_millis(milliseconds))
    }

    pub async fn execute(&self, _id: &TaskId, ctx: &TaskContext) -> Result<(), TaskError> {
        ctx.sleep(self.duration).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShellTask {
    pub command: String,
    pub use_root: bool,
    pub timeout: Duration,
}

impl ShellTask {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            use_root: false,
            timeout: Duration::from_millis(10_000),
        }
    }

    pub fn as_root(mut self, use_root: bool) -> Self {
        self.use_root = use_root;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn execute(&self, id: &TaskId, ctx: &TaskContext) -> Result<(), TaskError> {
        ctx.checkpoint()?;
        let process = ctx.process().clone();
        let run = process.run_shell(&self.command, self.use_root, Some(self.timeout));

        // Dropping the run future on cancellation drops the child, which kills it
        let result = tokio::select! {
            _ = ctx.cancellation_token().cancelled() => return Err(TaskError::Cancelled),
            result = run => result,
        };

        match result {
            Ok(output) if output.success() => {
                debug!("Shell {} finished in {:?}", id, output.duration);
                Ok(())
            }
            Ok(output) => Err(TaskError::ProcessFailure {
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            }),
            Err(ExecutorError::Timeout(timeout)) => Err(TaskError::Timeout {
                operation: format!("shell command '{}'", self.command),
                timeout,
            }),
            Err(e) => Err(TaskError::Process(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{Rect, Screenshot};
    use crate::task::context::Actuators;
    use crate::task::testing::{MockOcr, MockUi, RecordingExecutor, process_context, ui_context};
    use test_tag::tag;

    fn task_id() -> TaskId {
        TaskId::new("t1")
    }

    #[test]
    fn test_click_target_precedence() {
        let click = ClickTask {
            target_id: Some(String::new()),
            text: Some("OK".to_string()),
            content_description: Some("confirm".to_string()),
            ..ClickTask::by_id("x")
        };
        assert_eq!(click.target(), Some(ClickTarget::Text("OK")));

        let click = ClickTask::by_content_description("back");
        assert_eq!(click.target(), Some(ClickTarget::ContentDescription("back")));

        let click = ClickTask {
            target_id: None,
            ..ClickTask::by_id("x")
        };
        assert_eq!(click.target(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_succeeds_first_attempt() {
        let ui = Arc::new(MockUi::new(vec![UiNode::new("n1").with_view_id("ok")]));
        let ctx = ui_context(ui.clone());

        let click = ClickTask::by_id("ok").with_wait_after(Duration::from_millis(200));
        let start = Instant::now();
        click.execute(&task_id(), &ctx).await.unwrap();

        assert_eq!(ui.click_count(), 1);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_times_out_after_four_attempts() {
        let ui = Arc::new(MockUi::new(vec![]));
        let ctx = ui_context(ui.clone());

        let click = ClickTask::by_text("Missing").with_timeout(Duration::from_millis(2000));
        let start = Instant::now();
        let result = click.execute(&task_id(), &ctx).await;

        assert!(matches!(result, Err(TaskError::Timeout { .. })));
        assert_eq!(ui.lookup_count(), 4);
        assert_eq!(ui.click_count(), 0);
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_without_ui_retries_until_timeout() {
        let ctx = TaskContext::default();
        let click = ClickTask::by_id("ok").with_timeout(Duration::from_millis(1000));
        let result = click.execute(&task_id(), &ctx).await;
        assert!(matches!(result, Err(TaskError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_via_ocr_taps_block_center() {
        let ui = Arc::new(
            MockUi::new(vec![]).with_screen(Screenshot::new(100, 100, vec![0; 4 * 100 * 100])),
        );
        let ocr = Arc::new(MockOcr {
            blocks: vec![("Sign in".to_string(), Rect::new(10, 10, 50, 30))],
        });
        let ctx = TaskContext::new(Actuators::host_only().with_ui(ui.clone()).with_ocr(ocr));

        let click = ClickTask::by_text("sign in").with_ocr(true);
        click.execute(&task_id(), &ctx).await.unwrap();

        let gestures = ui.gestures.lock().unwrap();
        assert_eq!(gestures.len(), 1);
        assert_eq!(gestures[0].0.start(), Some(Point::new(30, 20)));
        assert_eq!(gestures[0].1, OCR_TAP_DURATION);
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_appends_to_current_text() {
        let ui = Arc::new(MockUi::new(vec![
            UiNode::new("field")
                .with_view_id("search")
                .with_text("hello")
                .editable(),
        ]));
        let ctx = ui_context(ui.clone());

        let input = InputTask::new(" world")
            .with_target_id("search")
            .appending(true);
        input.execute(&task_id(), &ctx).await.unwrap();

        let texts = ui.texts.lock().unwrap();
        assert_eq!(texts[0], ("field".to_string(), "hello world".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_error_cases() {
        let ctx = TaskContext::default();
        let input = InputTask::new("x").with_target_id("search");
        assert!(matches!(
            input.execute(&task_id(), &ctx).await,
            Err(TaskError::ActuatorUnavailable(_))
        ));

        let ui = Arc::new(MockUi::new(vec![UiNode::new("label").with_text("Name")]));
        let ctx = ui_context(ui);
        assert!(matches!(
            input.execute(&task_id(), &ctx).await,
            Err(TaskError::TargetNotFound(_))
        ));

        let by_text = InputTask::new("x").with_target_text("Name");
        assert!(matches!(
            by_text.execute(&task_id(), &ctx).await,
            Err(TaskError::TargetNotEditable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_set_text_rejected() {
        let mut mock = MockUi::new(vec![UiNode::new("f").with_view_id("f").editable()]);
        mock.set_text_succeeds = false;
        let ctx = ui_context(Arc::new(mock));

        let input = InputTask::new("x").with_target_id("f");
        assert!(matches!(
            input.execute(&task_id(), &ctx).await,
            Err(TaskError::ActionFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_swipe_waits_for_gesture_and_wait_after() {
        let ui = Arc::new(MockUi::new(vec![]));
        let ctx = ui_context(ui.clone());

        let swipe = SwipeTask::new(
            Point::new(500, 1500),
            Point::new(500, 500),
            Duration::from_millis(300),
        )
        .with_wait_after(Duration::from_millis(200));
        let start = Instant::now();
        swipe.execute(&task_id(), &ctx).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(500));
        let gestures = ui.gestures.lock().unwrap();
        assert_eq!(gestures[0].0.end(), Some(Point::new(500, 500)));
        assert_eq!(gestures[0].1, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_swipe_rejected() {
        let mut mock = MockUi::new(vec![]);
        mock.gesture_succeeds = false;
        let ctx = ui_context(Arc::new(mock));

        let swipe = SwipeTask::new(Point::new(0, 0), Point::new(1, 1), Duration::from_millis(10));
        assert!(matches!(
            swipe.execute(&task_id(), &ctx).await,
            Err(TaskError::ActionFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_for_duration() {
        let ctx = TaskContext::default();
        let start = Instant::now();
        WaitTask::millis(750).execute(&task_id(), &ctx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shell_reports_exit_code_and_stderr() {
        let process = Arc::new(RecordingExecutor {
            exit_code: 2,
            ..Default::default()
        });
        let ctx = process_context(process.clone());

        let result = ShellTask::new("false").execute(&task_id(), &ctx).await;
        match result {
            Err(TaskError::ProcessFailure { exit_code, stderr }) => {
                assert_eq!(exit_code, 2);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(process.entries(), vec!["start:false", "end:false"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shell_timeout() {
        let process = Arc::new(RecordingExecutor::new(Duration::from_secs(60)));
        let ctx = process_context(process);

        let shell = ShellTask::new("sleep 60").with_timeout(Duration::from_millis(100));
        assert!(matches!(
            shell.execute(&task_id(), &ctx).await,
            Err(TaskError::Timeout { .. })
        ));
    }

    #[tokio::test]
    #[tag(shell)]
    async fn test_shell_runs_on_host() {
        let ctx = TaskContext::default();
        ShellTask::new("true").execute(&task_id(), &ctx).await.unwrap();

        let result = ShellTask::new("echo nope >&2; exit 4")
            .execute(&task_id(), &ctx)
            .await;
        assert!(matches!(
            result,
            Err(TaskError::ProcessFailure { exit_code: 4, .. })
        ));
    }
}
