//! The conversation loop (orchestrator).
//!
//! Drives one session through the state machine:
//!
//! ```text
//! AwaitingUserInput ──▶ ModelRequested ──▶ ParsingOutput ──┬─▶ Terminal
//!            ▲                                             │
//!            └────────────── Dispatching ◀─────────────────┘
//!                      (or Aborted: turn bound, deadline,
//!                       cancellation, fatal provider error)
//! ```
//!
//! Each iteration builds the system prompt from the registry's current tool
//! catalog, requests a completion, parses the output for tool calls, and
//! dispatches them strictly in parser emission order — sequentially, never
//! concurrently, so the transcript order is deterministic. A model response
//! with zero tool calls is terminal; exceeding the configured model-call
//! bound aborts the session instead of looping forever.
//!
//! Tool failures do not abort the loop: the failure outcome is appended as a
//! tool turn so the model can retry, apologize, or pick another tool.

use crate::config::LoopConfig;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
use crate::ports::llm_gateway::{GatewayError, LlmGateway};
use crate::ports::tool_executor::ToolExecutorPort;
use harbor_domain::{SystemPromptTemplate, ToolCall, ToolCallParser, Transcript, Turn};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that terminate a session with a surfaced error.
///
/// Everything else (tool failures, malformed calls) is absorbed into the
/// transcript as data.
#[derive(Error, Debug)]
pub enum RunConversationError {
    #[error("Turn limit exceeded: {max_turns} model calls without a terminal response")]
    TurnLimitExceeded { max_turns: usize },

    #[error("Session deadline exceeded")]
    DeadlineExceeded,

    #[error("Session cancelled")]
    Cancelled,

    #[error("Provider error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Input for a conversation session.
#[derive(Debug, Clone)]
pub struct RunConversationInput {
    pub prompt: String,
}

impl RunConversationInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Output of a terminated session.
#[derive(Debug, Clone)]
pub struct RunConversationOutput {
    /// The terminal assistant text.
    pub final_text: String,
    /// The full transcript, in append order.
    pub transcript: Transcript,
    /// How many model calls the session used.
    pub model_calls: usize,
    /// How many tool dispatches the session performed.
    pub tool_dispatches: usize,
}

/// Use case driving one conversation session.
///
/// Holds references (not ownership) to the gateway and tool executor — both
/// may be shared across concurrent sessions. The transcript is confined to
/// one `execute` call.
pub struct RunConversationUseCase<G: LlmGateway, T: ToolExecutorPort> {
    gateway: Arc<G>,
    tools: Arc<T>,
    config: LoopConfig,
    logger: Arc<dyn ConversationLogger>,
    cancel: CancellationToken,
}

impl<G: LlmGateway, T: ToolExecutorPort> RunConversationUseCase<G, T> {
    pub fn new(gateway: Arc<G>, tools: Arc<T>, config: LoopConfig) -> Self {
        Self {
            gateway,
            tools,
            config,
            logger: Arc::new(NoConversationLogger),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the loop to a terminal response or an abort condition.
    pub async fn execute(
        &self,
        input: RunConversationInput,
    ) -> Result<RunConversationOutput, RunConversationError> {
        let parser = ToolCallParser::with_marker(self.config.marker.clone());
        let deadline = self.config.session_deadline().map(|d| Instant::now() + d);

        let mut transcript = Transcript::new();
        transcript.push(Turn::user(&input.prompt));

        self.logger.log(ConversationEvent::new(
            "session_started",
            serde_json::json!({
                "prompt": &input.prompt,
                "max_turns": self.config.max_turns,
            }),
        ));

        let mut model_calls = 0usize;
        let mut tool_dispatches = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return Err(RunConversationError::Cancelled);
            }
            if model_calls >= self.config.max_turns {
                warn!(
                    max_turns = self.config.max_turns,
                    "Aborting session: turn limit exceeded"
                );
                self.logger.log(ConversationEvent::new(
                    "session_aborted",
                    serde_json::json!({"reason": "turn_limit", "model_calls": model_calls}),
                ));
                return Err(RunConversationError::TurnLimitExceeded {
                    max_turns: self.config.max_turns,
                });
            }

            // ModelRequested: the catalog is re-read each iteration so tools
            // registered mid-session become visible to the model.
            let system_prompt =
                SystemPromptTemplate::render(&self.tools.catalog(), parser.marker());
            let text = self
                .complete_bounded(&system_prompt, transcript.turns(), deadline)
                .await?;
            model_calls += 1;

            debug!(model_calls, bytes = text.len(), "Model response received");
            self.logger.log(ConversationEvent::new(
                "model_response",
                serde_json::json!({"call": model_calls, "text": &text}),
            ));

            // ParsingOutput
            let (calls, diagnostics) = self.parse_calls(&parser, &text);
            for diag in &diagnostics {
                warn!(fragment = %diag.fragment, reason = %diag.reason, "Skipped malformed tool call");
                self.logger.log(ConversationEvent::new(
                    "malformed_tool_call",
                    serde_json::json!({"fragment": &diag.fragment, "reason": &diag.reason}),
                ));
            }

            transcript.push(Turn::assistant(&text));

            // Terminal: no tool calls requested
            if calls.is_empty() {
                info!(model_calls, tool_dispatches, "Session reached terminal response");
                self.logger.log(ConversationEvent::new(
                    "session_terminal",
                    serde_json::json!({"model_calls": model_calls, "tool_dispatches": tool_dispatches}),
                ));
                return Ok(RunConversationOutput {
                    final_text: text,
                    transcript,
                    model_calls,
                    tool_dispatches,
                });
            }

            // Dispatching: sequential, in parser emission order
            for call in calls {
                if self.cancel.is_cancelled() {
                    return Err(RunConversationError::Cancelled);
                }
                if let Some(deadline) = deadline
                    && Instant::now() >= deadline
                {
                    return Err(RunConversationError::DeadlineExceeded);
                }

                debug!(tool = %call.tool_name, "Dispatching tool call");
                let result = self.tools.dispatch(&call).await;
                tool_dispatches += 1;

                self.logger.log(ConversationEvent::new(
                    "tool_result",
                    serde_json::json!({
                        "tool": &result.tool_name,
                        "success": result.success,
                        "error": result.error.as_ref().map(|e| e.code.clone()),
                    }),
                ));

                transcript.push(Turn::tool(&result));
            }
        }
    }

    /// Parse tool calls, honoring single-call-per-turn mode.
    fn parse_calls(
        &self,
        parser: &ToolCallParser,
        text: &str,
    ) -> (Vec<ToolCall>, Vec<harbor_domain::ParseDiagnostic>) {
        if self.config.single_call_per_turn {
            let mut iter = parser.parse(text);
            let calls: Vec<ToolCall> = iter.next().into_iter().collect();
            let diagnostics = iter.diagnostics().to_vec();
            (calls, diagnostics)
        } else {
            parser.parse(text).collect_with_diagnostics()
        }
    }

    /// Call the gateway bounded by the remaining session deadline and the
    /// cancellation token. No registry or transcript lock is held here.
    async fn complete_bounded(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        deadline: Option<Instant>,
    ) -> Result<String, RunConversationError> {
        let request = self.gateway.complete(Some(system_prompt), turns);

        match deadline {
            Some(deadline) => {
                let remaining = deadline
                    .checked_duration_since(Instant::now())
                    .ok_or(RunConversationError::DeadlineExceeded)?;
                tokio::select! {
                    _ = self.cancel.cancelled() => Err(RunConversationError::Cancelled),
                    result = tokio::time::timeout(remaining, request) => match result {
                        Err(_) => Err(RunConversationError::DeadlineExceeded),
                        Ok(inner) => inner.map_err(RunConversationError::from),
                    },
                }
            }
            None => {
                tokio::select! {
                    _ = self.cancel.cancelled() => Err(RunConversationError::Cancelled),
                    result = request => result.map_err(RunConversationError::from),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use harbor_domain::{Role, ToolDefinition, ToolError, ToolResult, ToolSpec};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock gateway that returns scripted responses in order.
    ///
    /// When the scripted responses run out, the last one repeats — handy for
    /// the "always requests a tool" termination test.
    struct MockGateway {
        responses: Mutex<VecDeque<Result<String, GatewayError>>>,
        repeat_last: Option<String>,
        calls: Mutex<usize>,
    }

    impl MockGateway {
        fn scripted(responses: Vec<Result<String, GatewayError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                repeat_last: None,
                calls: Mutex::new(0),
            }
        }

        fn always(response: impl Into<String>) -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                repeat_last: Some(response.into()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmGateway for MockGateway {
        async fn complete(
            &self,
            _system_prompt: Option<&str>,
            _turns: &[Turn],
        ) -> Result<String, GatewayError> {
            *self.calls.lock().unwrap() += 1;
            if let Some(next) = self.responses.lock().unwrap().pop_front() {
                return next;
            }
            match &self.repeat_last {
                Some(text) => Ok(text.clone()),
                None => Err(GatewayError::BadRequest("no scripted response left".into())),
            }
        }
    }

    /// Mock executor that records dispatch order and fails unknown tools.
    struct MockExecutor {
        spec: ToolSpec,
        dispatched: Mutex<Vec<String>>,
    }

    impl MockExecutor {
        fn with_tools(names: &[&str]) -> Self {
            let mut spec = ToolSpec::new();
            for name in names {
                spec = spec.register(ToolDefinition::new(*name, "test tool"));
            }
            Self {
                spec,
                dispatched: Mutex::new(Vec::new()),
            }
        }

        fn dispatched(&self) -> Vec<String> {
            self.dispatched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolExecutorPort for MockExecutor {
        fn catalog(&self) -> ToolSpec {
            self.spec.clone()
        }

        async fn dispatch(&self, call: &ToolCall) -> ToolResult {
            self.dispatched.lock().unwrap().push(call.tool_name.clone());
            if self.spec.get(&call.tool_name).is_some() {
                ToolResult::success(&call.tool_name, serde_json::json!("ok"))
            } else {
                ToolResult::failure(&call.tool_name, ToolError::not_found(&call.tool_name))
            }
        }

        fn dispatch_blocking(&self, call: &ToolCall) -> ToolResult {
            self.dispatched.lock().unwrap().push(call.tool_name.clone());
            ToolResult::success(&call.tool_name, serde_json::json!("ok"))
        }
    }

    fn tool_block(name: &str) -> String {
        format!("```tool\n{{\"tool\": \"{}\", \"args\": {{}}}}\n```", name)
    }

    fn use_case(
        gateway: MockGateway,
        executor: MockExecutor,
        config: LoopConfig,
    ) -> (
        RunConversationUseCase<MockGateway, MockExecutor>,
        Arc<MockGateway>,
        Arc<MockExecutor>,
    ) {
        let gateway = Arc::new(gateway);
        let executor = Arc::new(executor);
        (
            RunConversationUseCase::new(Arc::clone(&gateway), Arc::clone(&executor), config),
            gateway,
            executor,
        )
    }

    #[tokio::test]
    async fn test_terminal_after_one_model_call() {
        let (uc, gateway, executor) = use_case(
            MockGateway::scripted(vec![Ok("The answer is 42.".into())]),
            MockExecutor::with_tools(&[]),
            LoopConfig::default(),
        );

        let output = uc
            .execute(RunConversationInput::new("what is the answer?"))
            .await
            .unwrap();

        assert_eq!(output.final_text, "The answer is 42.");
        assert_eq!(output.model_calls, 1);
        assert_eq!(output.tool_dispatches, 0);
        assert_eq!(gateway.call_count(), 1);
        assert!(executor.dispatched().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_order_is_deterministic() {
        let first = format!("Running both.\n{}\n{}", tool_block("alpha"), tool_block("beta"));
        let (uc, _, executor) = use_case(
            MockGateway::scripted(vec![Ok(first), Ok("Done.".into())]),
            MockExecutor::with_tools(&["alpha", "beta"]),
            LoopConfig::default(),
        );

        let output = uc.execute(RunConversationInput::new("run")).await.unwrap();

        assert_eq!(executor.dispatched(), vec!["alpha", "beta"]);
        assert_eq!(output.model_calls, 2);
        assert_eq!(output.tool_dispatches, 2);

        // Transcript: user, assistant, tool(alpha), tool(beta), assistant
        let roles: Vec<Role> = output.transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Assistant]
        );
        assert!(output.transcript.turns()[2].content.contains("alpha"));
        assert!(output.transcript.turns()[3].content.contains("beta"));
    }

    #[tokio::test]
    async fn test_turn_limit_aborts_instead_of_looping() {
        let config = LoopConfig {
            max_turns: 3,
            ..Default::default()
        };
        let (uc, gateway, _) = use_case(
            MockGateway::always(tool_block("alpha")),
            MockExecutor::with_tools(&["alpha"]),
            config,
        );

        let err = uc.execute(RunConversationInput::new("loop")).await.unwrap_err();
        assert!(matches!(
            err,
            RunConversationError::TurnLimitExceeded { max_turns: 3 }
        ));
        assert_eq!(gateway.call_count(), 3);
    }

    #[tokio::test]
    async fn test_tool_failure_does_not_abort_the_loop() {
        let first = tool_block("missing");
        let (uc, _, executor) = use_case(
            MockGateway::scripted(vec![Ok(first), Ok("Sorry, that tool failed.".into())]),
            MockExecutor::with_tools(&["alpha"]),
            LoopConfig::default(),
        );

        let output = uc.execute(RunConversationInput::new("go")).await.unwrap();

        assert_eq!(executor.dispatched(), vec!["missing"]);
        assert_eq!(output.final_text, "Sorry, that tool failed.");

        // The failure outcome was serialized into a tool turn
        let tool_turn = &output.transcript.turns()[2];
        assert_eq!(tool_turn.role, Role::Tool);
        assert!(tool_turn.content.contains("NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_fatal_gateway_error_aborts() {
        let (uc, _, _) = use_case(
            MockGateway::scripted(vec![Err(GatewayError::AuthFailed("bad key".into()))]),
            MockExecutor::with_tools(&[]),
            LoopConfig::default(),
        );

        let err = uc.execute(RunConversationInput::new("hi")).await.unwrap_err();
        assert!(matches!(err, RunConversationError::Gateway(GatewayError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_single_call_per_turn_mode() {
        let first = format!("{}\n{}", tool_block("alpha"), tool_block("beta"));
        let config = LoopConfig {
            single_call_per_turn: true,
            ..Default::default()
        };
        let (uc, _, executor) = use_case(
            MockGateway::scripted(vec![Ok(first), Ok("Done.".into())]),
            MockExecutor::with_tools(&["alpha", "beta"]),
            config,
        );

        uc.execute(RunConversationInput::new("run")).await.unwrap();
        assert_eq!(executor.dispatched(), vec!["alpha"]);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_session() {
        let token = CancellationToken::new();
        token.cancel();

        let gateway = Arc::new(MockGateway::always("never reached"));
        let executor = Arc::new(MockExecutor::with_tools(&[]));
        let uc = RunConversationUseCase::new(gateway, executor, LoopConfig::default())
            .with_cancellation(token);

        let err = uc.execute(RunConversationInput::new("hi")).await.unwrap_err();
        assert!(matches!(err, RunConversationError::Cancelled));
    }

    #[tokio::test]
    async fn test_malformed_call_is_skipped_and_session_continues() {
        let first = "```tool\n{\"tool\": 42}\n```".to_string();
        let (uc, _, executor) = use_case(
            MockGateway::scripted(vec![Ok(first.clone())]),
            MockExecutor::with_tools(&[]),
            LoopConfig::default(),
        );

        // The malformed payload parses to zero calls, so the response is terminal
        let output = uc.execute(RunConversationInput::new("go")).await.unwrap();
        assert_eq!(output.final_text, first);
        assert!(executor.dispatched().is_empty());
    }
}
