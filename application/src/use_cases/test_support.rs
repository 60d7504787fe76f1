//! Fakes shared by the use case tests.

use crate::context::ExecutionContext;
use crate::ports::llm_gateway::{GatewayError, LlmGateway, LlmSession, StreamHandle};
use crate::ports::tool::{ProgressSink, Tool, ToolRegistryPort};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warden_domain::{
    Conversation, ModelChunk, ModelInfo, ParamType, RiskLevel, ToolArguments, ToolDefinition,
    ToolOutcome, ToolParameter, ToolSpec,
};

/// What a [`FakeTool`] does when executed.
#[derive(Clone)]
pub enum Behavior {
    /// Echo the `text` argument.
    Echo,
    /// Send `n` progress updates, then succeed.
    Progress(usize),
    /// Return this many bytes of output.
    Big(usize),
    Fail(String),
    Panic,
    /// Sleep for the duration unless cancelled first.
    Sleep(Duration),
    /// Ask for approval, then succeed.
    NeedsApproval,
}

pub struct FakeTool {
    definition: ToolDefinition,
    behavior: Behavior,
}

impl FakeTool {
    pub fn new(name: &str, behavior: Behavior) -> Arc<dyn Tool> {
        let risk = match behavior {
            Behavior::NeedsApproval => RiskLevel::High,
            _ => RiskLevel::Low,
        };
        let definition = ToolDefinition::new(name, format!("fake {name}"), risk)
            .with_parameter(ToolParameter::new("text", "Text to echo", false))
            .with_parameter(
                ToolParameter::new("count", "A number", false).with_type(ParamType::Integer),
            );
        Arc::new(Self {
            definition,
            behavior,
        })
    }
}

#[async_trait]
impl Tool for FakeTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: &ExecutionContext,
        progress: &ProgressSink,
    ) -> ToolOutcome {
        match &self.behavior {
            Behavior::Echo => ToolOutcome::ok(args.get_string("text").unwrap_or_default()),
            Behavior::Progress(n) => {
                for i in 0..*n {
                    progress.update(format!("step {}", i + 1)).await;
                }
                ToolOutcome::ok("progressed")
            }
            Behavior::Big(bytes) => ToolOutcome::ok("x".repeat(*bytes)),
            Behavior::Fail(reason) => ToolOutcome::failed(reason.clone()),
            Behavior::Panic => panic!("tool exploded"),
            Behavior::Sleep(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(*duration) => ToolOutcome::ok("slept"),
                    _ = ctx.cancel.cancelled() => ToolOutcome::failed("cancelled"),
                }
            }
            Behavior::NeedsApproval => match ctx.require_approval("fake mutation").await {
                Ok(()) => ToolOutcome::ok("mutated"),
                Err(rejection) => ToolOutcome::failed(rejection),
            },
        }
    }
}

pub struct FakeRegistry {
    spec: ToolSpec,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl FakeRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Arc<Self> {
        let mut spec = ToolSpec::new();
        let mut map = HashMap::new();
        for tool in tools {
            spec = spec.register(tool.definition().clone());
            map.insert(tool.definition().name.clone(), tool);
        }
        if map.contains_key("echo") {
            spec = spec.register_alias("say", "echo");
        }
        Arc::new(Self { spec, tools: map })
    }

    pub fn standard() -> Arc<Self> {
        Self::new(vec![
            FakeTool::new("echo", Behavior::Echo),
            FakeTool::new("progress", Behavior::Progress(2)),
            FakeTool::new("big", Behavior::Big(400_000)),
            FakeTool::new("fail", Behavior::Fail("it broke".into())),
            FakeTool::new("panic", Behavior::Panic),
            FakeTool::new("sleep", Behavior::Sleep(Duration::from_secs(30))),
            FakeTool::new("mutate", Behavior::NeedsApproval),
        ])
    }
}

impl ToolRegistryPort for FakeRegistry {
    fn tool_spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn tool(&self, canonical_name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(canonical_name).cloned()
    }
}

/// Gateway replaying one chunk list per step, plus canned repair replies.
pub struct ScriptGateway {
    steps: Mutex<VecDeque<Vec<ModelChunk>>>,
    repairs: Mutex<VecDeque<String>>,
    /// Delay before each streamed chunk
    chunk_delay: Duration,
    pub seen: Mutex<Vec<Conversation>>,
    pub repair_prompts: Arc<Mutex<Vec<String>>>,
    info: ModelInfo,
}

impl ScriptGateway {
    pub fn new(steps: Vec<Vec<ModelChunk>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            repairs: Mutex::new(VecDeque::new()),
            chunk_delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
            repair_prompts: Arc::new(Mutex::new(Vec::new())),
            info: ModelInfo::default(),
        }
    }

    pub fn with_repairs(self, replies: Vec<&str>) -> Self {
        *self.repairs.lock().unwrap() = replies.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn repair_count(&self) -> usize {
        self.repair_prompts.lock().unwrap().len()
    }
}

struct ReplySession {
    reply: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LlmSession for ReplySession {
    async fn send(&self, content: &str) -> Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(content.to_string());
        self.reply
            .clone()
            .ok_or_else(|| GatewayError::Other("no repair reply scripted".into()))
    }
}

#[async_trait]
impl LlmGateway for ScriptGateway {
    fn model_info(&self) -> ModelInfo {
        self.info.clone()
    }

    async fn stream(
        &self,
        conversation: &Conversation,
        _tools: &[ToolDefinition],
    ) -> Result<StreamHandle, GatewayError> {
        self.seen.lock().unwrap().push(conversation.clone());
        let step = self.seen.lock().unwrap().len();
        let chunks = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(GatewayError::ScriptExhausted(step))?;

        if self.chunk_delay.is_zero() {
            return Ok(StreamHandle::from_chunks(chunks));
        }
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let delay = self.chunk_delay;
        tokio::spawn(async move {
            for chunk in chunks {
                tokio::time::sleep(delay).await;
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });
        Ok(StreamHandle::new(rx))
    }

    async fn create_session(&self, _system_prompt: &str) -> Result<Box<dyn LlmSession>, GatewayError> {
        Ok(Box::new(ReplySession {
            reply: self.repairs.lock().unwrap().pop_front(),
            prompts: self.repair_prompts.clone(),
        }))
    }
}
