//! Runs `demos/login.yaml` against an in-memory screen
//!
//! Shows how a UI backend plugs into the executor and how lifecycle events
//! can be observed while a script runs.

use async_trait::async_trait;
use autoflow::actuator::{GesturePath, Rect, UiActuator, UiNode};
use autoflow::{Actuators, AutoflowConfig, ScriptManager};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A fake login screen that logs every interaction
struct DemoScreen {
    nodes: Vec<UiNode>,
    fields: Mutex<Vec<(String, String)>>,
}

impl DemoScreen {
    fn new() -> Self {
        Self {
            nodes: vec![
                UiNode::new("btn-login")
                    .with_text("Login")
                    .with_bounds(Rect::new(100, 1800, 980, 1950)),
                UiNode::new("field-user").with_view_id("username").editable(),
                UiNode::new("field-pass").with_view_id("password").editable(),
                UiNode::new("btn-submit").with_content_description("Submit"),
            ],
            fields: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl UiActuator for DemoScreen {
    async fn find_node_by_text(&self, text: &str) -> Option<UiNode> {
        self.nodes
            .iter()
            .find(|n| n.text.as_deref() == Some(text))
            .cloned()
    }

    async fn find_node_by_id(&self, view_id: &str) -> Option<UiNode> {
        self.nodes
            .iter()
            .find(|n| n.view_id.as_deref() == Some(view_id))
            .cloned()
    }

    async fn find_node_by_content_description(&self, description: &str) -> Option<UiNode> {
        self.nodes
            .iter()
            .find(|n| n.content_description.as_deref() == Some(description))
            .cloned()
    }

    async fn perform_click(&self, node: &UiNode) -> bool {
        println!("  👆 click {}", node.handle);
        true
    }

    async fn dispatch_gesture(&self, path: &GesturePath, duration: Duration) -> bool {
        println!(
            "  👉 gesture {:?} -> {:?} over {:?}",
            path.start(),
            path.end(),
            duration
        );
        true
    }

    async fn set_text(&self, node: &UiNode, text: &str) -> bool {
        println!("  ⌨️  {} = {}", node.handle, text);
        self.fields
            .lock()
            .unwrap()
            .push((node.handle.clone(), text.to_string()));
        true
    }

    fn backend_name(&self) -> &'static str {
        "demo"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("autoflow=debug")
        .init();

    println!("🎬 Scripted UI Demo");
    println!("===================");

    let screen = Arc::new(DemoScreen::new());
    let manager = ScriptManager::new(
        AutoflowConfig::default(),
        Actuators::host_only().with_ui(screen.clone()),
    );

    let mut events = manager.executor().subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("  📣 {} -> {:?}", event.task_id, event.state);
        }
    });

    let script = manager
        .parse_script(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/login.yaml"))
        .await?;
    println!("\n📋 Task tree:");
    for task in script.to_tasks() {
        print!("{}", task.outline());
    }

    println!("\n🚀 Running:");
    let report = manager.execute_script(&script).await?;
    println!(
        "\n✅ {}: {}/{} task(s) completed in {:?}",
        report.script_name, report.completed, report.submitted, report.duration
    );
    println!("📝 Fields written: {:?}", screen.fields.lock().unwrap());

    manager.shutdown().await;
    watcher.abort();
    Ok(())
}
