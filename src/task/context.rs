//! Execution context handed to every running task.
//!
//! Carries the actuator handles, the condition evaluator and the task's
//! cancellation token. Cloning is cheap; composite tasks pass the same
//! context down to their children.

use crate::actuator::{TextRecognizer, UiActuator};
use crate::executor::{CommandExecutor, HostExecutor};
use crate::task::condition::{ConditionEvaluator, ConditionSite, LiteralEvaluator};
use crate::task::types::TaskError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Actuator handles reachable by running tasks
#[derive(Clone)]
pub struct Actuators {
    pub ui: Option<Arc<dyn UiActuator>>,
    pub ocr: Option<Arc<dyn TextRecognizer>>,
    pub process: Arc<dyn CommandExecutor>,
}

impl Actuators {
    /// No UI or OCR backend, host process execution
    pub fn host_only() -> Self {
        Self {
            ui: None,
            ocr: None,
            process: Arc::new(HostExecutor::new()),
        }
    }

    pub fn with_ui(mut self, ui: Arc<dyn UiActuator>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn TextRecognizer>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_process(mut self, process: Arc<dyn CommandExecutor>) -> Self {
        self.process = process;
        self
    }
}

impl Default for Actuators {
    fn default() -> Self {
        Self::host_only()
    }
}

#[derive(Clone)]
pub struct TaskContext {
    actuators: Actuators,
    evaluator: Arc<dyn ConditionEvaluator>,
    cancel: CancellationToken,
}

impl TaskContext {
    pub fn new(actuators: Actuators) -> Self {
        Self {
            actuators,
            evaluator: Arc::new(LiteralEvaluator),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Same actuators and evaluator, bound to a different cancellation token
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            actuators: self.actuators.clone(),
            evaluator: self.evaluator.clone(),
            cancel,
        }
    }

    pub fn ui(&self) -> Option<&Arc<dyn UiActuator>> {
        self.actuators.ui.as_ref()
    }

    pub fn ocr(&self) -> Option<&Arc<dyn TextRecognizer>> {
        self.actuators.ocr.as_ref()
    }

    pub fn process(&self) -> &Arc<dyn CommandExecutor> {
        &self.actuators.process
    }

    pub fn evaluate(&self, condition: &str, site: ConditionSite) -> bool {
        self.evaluator.evaluate(condition, site)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellable delay; every suspension inside a task goes through here
    pub async fn sleep(&self, duration: Duration) -> Result<(), TaskError> {
        if duration.is_zero() {
            return self.checkpoint();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(TaskError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Fail fast if cancellation has been requested
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.cancel.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new(Actuators::default())
    }
}
