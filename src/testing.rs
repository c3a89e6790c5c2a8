//! In-memory stand-ins for the screen, the accessibility tree, synthetic
//! input and the model server.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::errors::{PilotError, PilotResult};
use crate::executor::input::InputSimulator;
use crate::llm::provider::LlmProvider;
use crate::llm::types::LlmResponse;
use crate::perception::screenshot::{encode_png, ScreenshotResult};
use crate::perception::traits::ScreenSource;
use crate::perception::tree::{PatternError, TreeProvider, UiTree};
use crate::perception::types::{ControlType, NodeProperties, Rect};

// ── Accessibility tree ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatternSupport {
    #[default]
    Supported,
    Missing,
    Failing,
}

#[derive(Debug)]
struct FakeNode {
    children: Vec<usize>,
    name: String,
    control_type: ControlType,
    automation_id: String,
    offscreen: bool,
    unreadable: bool,
    patterns: PatternSupport,
}

#[derive(Debug, Default)]
struct FakeState {
    nodes: Vec<FakeNode>,
    root: Option<usize>,
    invoked: Vec<String>,
    values: Vec<(String, String)>,
}

/// Mutable tree shared between clones, so a test can change the "screen"
/// while a provider holds a copy.
#[derive(Debug, Clone, Default)]
pub struct FakeTree {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTree {
    /// A foreground window with no children yet.
    pub fn window(title: &str) -> Self {
        let tree = Self::default();
        {
            let mut s = tree.state.lock().unwrap();
            s.nodes.push(FakeNode {
                children: Vec::new(),
                name: title.to_string(),
                control_type: ControlType::Window,
                automation_id: String::new(),
                offscreen: false,
                unreadable: false,
                patterns: PatternSupport::Supported,
            });
            s.root = Some(0);
        }
        tree
    }

    pub fn without_foreground() -> Self {
        Self::default()
    }

    pub fn root_id(&self) -> usize {
        self.state.lock().unwrap().root.expect("tree has no foreground window")
    }

    pub fn add(
        &self,
        parent: usize,
        name: &str,
        control_type: ControlType,
        automation_id: &str,
        offscreen: bool,
    ) -> usize {
        let mut s = self.state.lock().unwrap();
        let id = s.nodes.len();
        s.nodes.push(FakeNode {
            children: Vec::new(),
            name: name.to_string(),
            control_type,
            automation_id: automation_id.to_string(),
            offscreen,
            unreadable: false,
            patterns: PatternSupport::Supported,
        });
        s.nodes[parent].children.push(id);
        id
    }

    pub fn mark_unreadable(&self, id: usize) {
        self.state.lock().unwrap().nodes[id].unreadable = true;
    }

    pub fn rename(&self, id: usize, name: &str) {
        self.state.lock().unwrap().nodes[id].name = name.to_string();
    }

    pub fn set_patterns(&self, id: usize, support: PatternSupport) {
        self.state.lock().unwrap().nodes[id].patterns = support;
    }

    pub fn name_of(&self, id: usize) -> String {
        self.state.lock().unwrap().nodes[id].name.clone()
    }

    /// Names of controls whose invoke capability was called, in order.
    pub fn invoked(&self) -> Vec<String> {
        self.state.lock().unwrap().invoked.clone()
    }

    /// `(control name, value)` pairs written through set_value, in order.
    pub fn values(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().values.clone()
    }

    fn pattern_call(&self, node: usize) -> Result<String, PatternError> {
        let s = self.state.lock().unwrap();
        let n = &s.nodes[node];
        match n.patterns {
            PatternSupport::Supported => Ok(n.name.clone()),
            PatternSupport::Missing => Err(PatternError::Unavailable),
            PatternSupport::Failing => Err(PatternError::Failed("element is no longer available".into())),
        }
    }
}

impl UiTree for FakeTree {
    type Node = usize;

    fn foreground_root(&self) -> Option<usize> {
        self.state.lock().unwrap().root
    }

    fn children(&self, node: &usize) -> Vec<usize> {
        self.state.lock().unwrap().nodes[*node].children.clone()
    }

    fn properties(&self, node: &usize) -> Option<NodeProperties> {
        let s = self.state.lock().unwrap();
        let n = &s.nodes[*node];
        if n.unreadable {
            return None;
        }
        let offset = (*node as f64) * 10.0;
        Some(NodeProperties {
            name: n.name.clone(),
            control_type: Some(n.control_type),
            automation_id: n.automation_id.clone(),
            bounding_rectangle: Rect {
                x: offset,
                y: offset,
                width: 80.0,
                height: 24.0,
            },
            is_offscreen: n.offscreen,
        })
    }

    fn invoke(&self, node: &usize) -> Result<(), PatternError> {
        let name = self.pattern_call(*node)?;
        self.state.lock().unwrap().invoked.push(name);
        Ok(())
    }

    fn set_value(&self, node: &usize, value: &str) -> Result<(), PatternError> {
        let name = self.pattern_call(*node)?;
        self.state.lock().unwrap().values.push((name, value.to_string()));
        Ok(())
    }
}

/// Hands out the shared [`FakeTree`], or fails to open at all.
pub struct FakeTreeProvider {
    tree: Option<FakeTree>,
}

impl FakeTreeProvider {
    pub fn new(tree: FakeTree) -> Self {
        Self { tree: Some(tree) }
    }

    pub fn failing() -> Self {
        Self { tree: None }
    }
}

impl TreeProvider for FakeTreeProvider {
    type Tree = FakeTree;

    fn open(&self) -> PilotResult<FakeTree> {
        self.tree
            .clone()
            .ok_or_else(|| PilotError::Perception("automation client unavailable".into()))
    }
}

// ── Screen ──────────────────────────────────────────────────────────────────

/// Always returns the same tiny frame.
#[derive(Debug, Default)]
pub struct StaticScreen;

#[async_trait]
impl ScreenSource for StaticScreen {
    async fn capture(&self) -> PilotResult<ScreenshotResult> {
        encode_png(&RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])))
    }
}

#[derive(Debug, Default)]
pub struct BrokenScreen;

#[async_trait]
impl ScreenSource for BrokenScreen {
    async fn capture(&self) -> PilotResult<ScreenshotResult> {
        Err(PilotError::Perception("display disconnected".into()))
    }
}

// ── Input ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingInput {
    clicks: Mutex<Vec<(i32, i32)>>,
    typed: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingInput {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn clicks(&self) -> Vec<(i32, i32)> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.typed.lock().unwrap().clone()
    }
}

#[async_trait]
impl InputSimulator for RecordingInput {
    async fn type_text(&self, text: &str) -> PilotResult<()> {
        if self.fail {
            return Err(PilotError::Executor("input desktop is locked".into()));
        }
        self.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn click_at(&self, x: i32, y: i32) -> PilotResult<()> {
        if self.fail {
            return Err(PilotError::Executor("input desktop is locked".into()));
        }
        self.clicks.lock().unwrap().push((x, y));
        Ok(())
    }
}

// ── Model ───────────────────────────────────────────────────────────────────

enum Reply {
    Text(String),
    Fail(String),
    Hang,
    /// Waits for the gate, then answers.
    Gated(Arc<Notify>, String),
}

/// Plays back a fixed sequence of replies and records every prompt it saw.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Reply>>,
    repeat: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self::from_script(replies.iter().map(|r| Reply::Text(r.to_string())).collect(), None)
    }

    /// Answers `reply` forever.
    pub fn repeating(reply: &str) -> Self {
        Self::from_script(VecDeque::new(), Some(reply.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::from_script(VecDeque::from([Reply::Fail(message.to_string())]), None)
    }

    /// Never answers.
    pub fn hanging() -> Self {
        Self::from_script(VecDeque::from([Reply::Hang]), None)
    }

    /// Answers `reply` only once `gate` is notified.
    pub fn gated(gate: Arc<Notify>, reply: &str) -> Self {
        Self::from_script(VecDeque::from([Reply::Gated(gate, reply.to_string())]), None)
    }

    fn from_script(script: VecDeque<Reply>, repeat: Option<String>) -> Self {
        Self {
            script: Mutex::new(script),
            repeat,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, prompt: &str, _image_base64: &str) -> PilotResult<LlmResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.script.lock().unwrap().pop_front();
        let text = match next {
            Some(Reply::Text(text)) => text,
            Some(Reply::Fail(message)) => return Err(PilotError::LlmProvider(message)),
            Some(Reply::Hang) => std::future::pending::<String>().await,
            Some(Reply::Gated(gate, text)) => {
                gate.notified().await;
                text
            }
            None => match &self.repeat {
                Some(text) => text.clone(),
                None => return Err(PilotError::LlmProvider("script exhausted".into())),
            },
        };
        Ok(LlmResponse { content: text })
    }
}

// ── HTTP ────────────────────────────────────────────────────────────────────

/// Serves exactly one HTTP response on a loopback port. Returns the URL to
/// post to and a handle yielding the raw request (head and body).
pub async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }
        let reason = if status < 400 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        String::from_utf8_lossy(&buf).into_owned()
    });
    (format!("http://{addr}/api/chat"), handle)
}

fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(head_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..head_end]
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    buf.len() >= head_end + 4 + content_length
}
