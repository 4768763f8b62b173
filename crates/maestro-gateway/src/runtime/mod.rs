//! The agentic runtime: classify → plan → execute → synthesize.
//!
//! Entry points: [`AgentRuntime::handle`] for unary requests and
//! [`AgentRuntime::stream`] which mirrors progress as a channel of
//! [`StatusEvent`]s for SSE. When no LLM is available (or it fails at
//! plan time) the runtime takes the rule-based branch against the same
//! downstream services.

pub mod classifier;
pub mod executor;
pub mod planner;
pub mod rulebased;

pub use classifier::{IntentAnalysis, IntentClassifier};
pub use executor::{
    ArgFiller, ExecutionResult, HttpToolTransport, Replanner, ToolExecutor, ToolTransport,
};
pub use planner::TaskPlanner;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use maestro_domain::error::Result;
use maestro_domain::intent::Intent;
use maestro_domain::plan::{topo_sort, Observation, Plan, Task};
use maestro_domain::tool::{default_registry, registry_prompt};
use maestro_providers::{ChatMessage, ChatRequest, ProviderRegistry};
use maestro_sessions::{ContextStore, NewTurn};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

const APOLOGY: &str =
    "죄송합니다. 요청을 처리하는 중 문제가 발생했어요. 잠시 후 다시 시도해 주세요.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public result / event types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of one unary chat request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub message: String,
    pub conversation_id: String,
    pub meta: Value,
}

/// One streamed progress event (the SSE payload).
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub todo: Vec<String>,
    pub completed: usize,
    pub status: String,
    #[serde(rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
}

impl StatusEvent {
    fn progress(todo: Vec<String>, completed: usize, status: &str) -> Self {
        Self {
            todo,
            completed,
            status: status.to_string(),
            final_text: None,
            done: false,
        }
    }

    fn finished(todo: Vec<String>, final_text: String) -> Self {
        let completed = todo.len();
        Self {
            todo,
            completed,
            status: "done".into(),
            final_text: Some(final_text),
            done: true,
        }
    }
}

/// Per-task status line shown while that tool runs.
fn status_for_tool(tool: &str) -> &'static str {
    match tool {
        "weather.get" => "날씨 정보를 조회하고 있습니다",
        "calendar.get" => "일정을 조회하고 있습니다",
        "calendar.create" => "일정을 생성하고 있습니다",
        "file.search" => "파일을 검색하고 있습니다",
        "notification.send" => "알림을 발송하고 있습니다",
        "rag.query" => "관련 문서를 검색하고 있습니다",
        _ => "요청을 처리하고 있습니다",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AgentRuntime {
    store: Arc<ContextStore>,
    llm: Arc<ProviderRegistry>,
    transport: Arc<dyn ToolTransport>,
    classifier: IntentClassifier,
    planner: TaskPlanner,
    executor: ToolExecutor,
}

struct AgenticOutcome {
    answer: String,
    todo: Vec<String>,
    execution: ExecutionResult,
}

impl AgentRuntime {
    pub fn new(
        store: Arc<ContextStore>,
        llm: Arc<ProviderRegistry>,
        transport: Arc<dyn ToolTransport>,
    ) -> Self {
        let specs = default_registry();
        let tools_prompt = registry_prompt(&specs);
        Self {
            classifier: IntentClassifier::new(llm.clone()),
            planner: TaskPlanner::new(llm.clone(), tools_prompt),
            executor: ToolExecutor::new(specs, transport.clone(), store.clone()),
            store,
            llm,
            transport,
        }
    }

    // ── Unary ─────────────────────────────────────────────────────

    pub async fn handle(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        history: Option<Vec<ChatMessage>>,
    ) -> ChatOutcome {
        let started = Instant::now();
        let session_id = self.store.get_or_create(conversation_id, None);
        let analysis = self.classifier.analyze(message).await;
        let recent = self.store.recent_turns(&session_id, 5);

        let mut meta = serde_json::json!({
            "intent": analysis.intent.label(),
            "analysis": analysis,
            "session_id": session_id,
            "recent_turns": recent,
        });

        let mut llm_fallback = false;
        let (answer, tools_used, success) = if self.llm.is_enabled() {
            match self
                .run_agentic(&session_id, message, &analysis, history, None)
                .await
            {
                Ok(outcome) => {
                    meta["plan"] = serde_json::json!({
                        "tasks": outcome.execution.final_tasks,
                        "todo": outcome.todo,
                    });
                    meta["agent"] = serde_json::json!({
                        "observations": outcome.execution.observations,
                        "used_tools": outcome.execution.used_tools,
                        "replans": outcome.execution.replans,
                    });
                    let success =
                        !outcome.execution.observations.iter().any(|o| o.is_error());
                    (outcome.answer, outcome.execution.used_tools, success)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "agentic path failed, taking rule-based branch");
                    llm_fallback = true;
                    self.run_rulebased(&analysis, message, &mut meta).await
                }
            }
        } else {
            llm_fallback = true;
            self.run_rulebased(&analysis, message, &mut meta).await
        };
        if llm_fallback {
            meta["llm_fallback"] = Value::Bool(true);
        }

        self.store.append_turn(
            &session_id,
            NewTurn {
                user_input: message.to_string(),
                assistant_response: answer.clone(),
                intent: analysis.intent.label().to_string(),
                confidence: analysis.confidence,
                tools_used: tools_used.clone(),
                success,
                duration_ms: started.elapsed().as_millis() as u64,
                metadata: Map::new(),
            },
        );

        ChatOutcome {
            message: answer,
            conversation_id: session_id,
            meta,
        }
    }

    async fn run_rulebased(
        &self,
        analysis: &IntentAnalysis,
        message: &str,
        meta: &mut Value,
    ) -> (String, Vec<String>, bool) {
        let outcome = rulebased::run(analysis, message, self.transport.as_ref()).await;
        meta["plan"] = serde_json::json!({
            "tasks": [],
            "todo": rulebased::todo_for(analysis.intent),
        });
        meta["agent"] = serde_json::json!({
            "observations": outcome.observations,
            "used_tools": outcome.tools_used,
        });
        (outcome.answer, outcome.tools_used, outcome.success)
    }

    // ── Agentic core ──────────────────────────────────────────────

    /// Plan and execute with the LLM. `Err` means the provider failed
    /// before a plan existed; the caller takes the rule-based branch.
    async fn run_agentic(
        &self,
        session_id: &str,
        message: &str,
        analysis: &IntentAnalysis,
        history: Option<Vec<ChatMessage>>,
        progress: Option<executor::ProgressFn<'_>>,
    ) -> Result<AgenticOutcome> {
        let recent = self.store.recent_turns(session_id, 5);
        let mut plan = self
            .planner
            .plan(message, analysis.intent, &analysis.apis, &recent)
            .await?;
        if plan.tasks.is_empty() {
            plan = Plan::noop();
        }

        let tasks = topo_sort(&plan.tasks);
        let todo: Vec<String> = tasks.iter().map(|t| t.text.clone()).collect();

        let filler = LlmArgFiller {
            llm: self.llm.clone(),
            user_input: message.to_string(),
        };
        let replanner = PlannerReplanner {
            planner: &self.planner,
            user_input: message,
            intent: analysis.intent,
            apis: &analysis.apis,
        };

        let execution = self
            .executor
            .execute_plan(session_id, tasks, &filler, Some(&replanner), progress)
            .await;

        let answer = self
            .synthesize(message, analysis.intent, &execution, history)
            .await;

        Ok(AgenticOutcome {
            answer,
            todo,
            execution,
        })
    }

    /// Ask the LLM for the final user-facing answer. Empty or failed
    /// responses substitute the safe apology — a tool error must never
    /// surface as an empty body.
    async fn synthesize(
        &self,
        message: &str,
        intent: Intent,
        execution: &ExecutionResult,
        history: Option<Vec<ChatMessage>>,
    ) -> String {
        let prompt = format!(
            "당신은 어시스턴트입니다. 아래 실행 결과를 바탕으로 사용자 요청에 \
             대한 최종 답변을 한국어로 간결하게 작성하세요.\n\
             - 수치/이름 등 사실은 관찰(observations)에 있는 값만 사용하세요.\n\
             - 실패한 도구가 있으면 무엇이 안 됐는지 짧게 설명하세요.\n\n\
             의도(intent): {intent}\n\
             실행된 태스크: {tasks}\n\
             관찰(observations): {obs}\n\n\
             사용자 요청: {message}\n\
             답변:",
            intent = intent.label(),
            tasks = serde_json::to_string(&execution.final_tasks).unwrap_or_default(),
            obs = serde_json::to_string(&execution.observations).unwrap_or_default(),
        );

        let mut messages: Vec<ChatMessage> = history.unwrap_or_default();
        messages.push(ChatMessage {
            role: "user".into(),
            content: prompt,
        });

        match self
            .llm
            .chat(ChatRequest {
                messages,
                ..ChatRequest::default()
            })
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => APOLOGY.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed, substituting apology");
                APOLOGY.to_string()
            }
        }
    }

    // ── Streaming ─────────────────────────────────────────────────

    /// Run the pipeline while mirroring progress into a channel. The
    /// caller turns each event into one SSE frame.
    pub fn stream(
        self: &Arc<Self>,
        message: String,
        conversation_id: Option<String>,
    ) -> mpsc::Receiver<StatusEvent> {
        let (tx, rx) = mpsc::channel::<StatusEvent>(64);
        let runtime = self.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let session_id = runtime
                .store
                .get_or_create(conversation_id.as_deref(), None);

            let _ = tx
                .send(StatusEvent::progress(Vec::new(), 0, "analyzing intent"))
                .await;
            let analysis = runtime.classifier.analyze(&message).await;

            let _ = tx
                .send(StatusEvent::progress(Vec::new(), 0, "planning"))
                .await;

            let (todo, answer, tools_used, success) = if runtime.llm.is_enabled() {
                runtime
                    .stream_agentic(&session_id, &message, &analysis, &tx)
                    .await
            } else {
                runtime
                    .stream_rulebased(&analysis, &message, &tx)
                    .await
            };

            runtime.store.append_turn(
                &session_id,
                NewTurn {
                    user_input: message.clone(),
                    assistant_response: answer.clone(),
                    intent: analysis.intent.label().to_string(),
                    confidence: analysis.confidence,
                    tools_used,
                    success,
                    duration_ms: started.elapsed().as_millis() as u64,
                    metadata: Map::new(),
                },
            );

            let _ = tx.send(StatusEvent::finished(todo, answer)).await;
        });

        rx
    }

    async fn stream_agentic(
        &self,
        session_id: &str,
        message: &str,
        analysis: &IntentAnalysis,
        tx: &mpsc::Sender<StatusEvent>,
    ) -> (Vec<String>, String, Vec<String>, bool) {
        // Plan first so the to-do list is known before execution.
        let recent = self.store.recent_turns(session_id, 5);
        let plan = match self
            .planner
            .plan(message, analysis.intent, &analysis.apis, &recent)
            .await
        {
            Ok(plan) if !plan.tasks.is_empty() => plan,
            Ok(_) => Plan::noop(),
            Err(e) => {
                tracing::warn!(error = %e, "planner failed mid-stream, rule-based branch");
                return self.stream_rulebased(analysis, message, tx).await;
            }
        };

        let tasks = topo_sort(&plan.tasks);
        let todo: Vec<String> = tasks.iter().map(|t| t.text.clone()).collect();
        let _ = tx
            .send(StatusEvent::progress(todo.clone(), 0, "plan ready"))
            .await;

        let completed = AtomicUsize::new(0);
        let todo_len = todo.len();
        let progress_todo = todo.clone();
        let progress_tx = tx.clone();
        let progress = move |task: &Task| {
            let n = (completed.fetch_add(1, Ordering::SeqCst) + 1).min(todo_len);
            let _ = progress_tx.try_send(StatusEvent::progress(
                progress_todo.clone(),
                n,
                status_for_tool(&task.tool),
            ));
        };

        let filler = LlmArgFiller {
            llm: self.llm.clone(),
            user_input: message.to_string(),
        };
        let replanner = PlannerReplanner {
            planner: &self.planner,
            user_input: message,
            intent: analysis.intent,
            apis: &analysis.apis,
        };

        let execution = self
            .executor
            .execute_plan(session_id, tasks, &filler, Some(&replanner), Some(&progress))
            .await;

        let answer = self
            .synthesize(message, analysis.intent, &execution, None)
            .await;
        let success = !execution.observations.iter().any(|o| o.is_error());
        (todo, answer, execution.used_tools, success)
    }

    async fn stream_rulebased(
        &self,
        analysis: &IntentAnalysis,
        message: &str,
        tx: &mpsc::Sender<StatusEvent>,
    ) -> (Vec<String>, String, Vec<String>, bool) {
        let todo = rulebased::todo_for(analysis.intent);
        let _ = tx
            .send(StatusEvent::progress(todo.clone(), 0, "plan ready"))
            .await;

        let outcome = rulebased::run(analysis, message, self.transport.as_ref()).await;

        // Rule-based steps finish as one unit; walk the checklist so
        // the UI still sees incremental progress.
        for i in 0..todo.len() {
            let _ = tx
                .send(StatusEvent::progress(
                    todo.clone(),
                    i + 1,
                    "요청을 처리하고 있습니다",
                ))
                .await;
        }

        (todo, outcome.answer, outcome.tools_used, outcome.success)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delegates bound to the LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fills empty task args: ask the LLM for a JSON object matching the
/// schema; fall back to deterministic extraction from the user input.
struct LlmArgFiller {
    llm: Arc<ProviderRegistry>,
    user_input: String,
}

#[async_trait]
impl ArgFiller for LlmArgFiller {
    async fn fill(
        &self,
        tool: &str,
        schema: &[(String, String)],
        observations: &[Observation],
    ) -> Map<String, Value> {
        let schema_text: Vec<String> =
            schema.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        let prompt = format!(
            "도구 호출 인자를 JSON 객체로만 출력하세요.\n\
             도구: {tool}\n\
             인자 스키마: {{{}}}\n\
             지금까지의 관찰: {}\n\
             사용자 요청: {}\n\
             JSON:",
            schema_text.join(", "),
            serde_json::to_string(observations).unwrap_or_default(),
            self.user_input,
        );

        if let Ok(raw) = self.llm.chat_prompt(&prompt).await {
            let plan_args = planner::parse_args(&raw);
            if !plan_args.is_empty() {
                return plan_args;
            }
        }
        heuristic_args(tool, &self.user_input)
    }
}

/// Deterministic argument extraction used when the LLM cannot help.
fn heuristic_args(tool: &str, user_input: &str) -> Map<String, Value> {
    let value = match tool {
        "weather.get" => serde_json::json!({ "city": rulebased::extract_city(user_input) }),
        "calendar.get" => serde_json::json!({
            "when": if user_input.contains("내일") { "tomorrow" } else { "today" }
        }),
        "calendar.create" => serde_json::json!({
            "title": rulebased::extract_title(user_input),
            "start_time": rulebased::extract_time(user_input),
        }),
        "file.search" => serde_json::json!({ "q": user_input }),
        "notification.send" => serde_json::json!({
            "title": "알림",
            "message": user_input,
            "recipient": "team",
            "channel": rulebased::extract_channel(user_input),
        }),
        "rag.query" => serde_json::json!({ "query": user_input, "top_k": 5 }),
        _ => serde_json::json!({}),
    };
    value.as_object().cloned().unwrap_or_default()
}

/// Replan delegate bound to the planner; `None` keeps the current plan.
struct PlannerReplanner<'a> {
    planner: &'a TaskPlanner,
    user_input: &'a str,
    intent: Intent,
    apis: &'a [String],
}

#[async_trait]
impl Replanner for PlannerReplanner<'_> {
    async fn replan(&self, current: &[Task], observations: &[Observation]) -> Option<Vec<Task>> {
        match self
            .planner
            .replan(self.user_input, self.intent, self.apis, current, observations)
            .await
        {
            Ok(plan) if !plan.tasks.is_empty() => Some(plan.tasks),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "replan LLM call failed");
                None
            }
        }
    }
}
