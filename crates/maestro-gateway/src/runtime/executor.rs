//! Tool execution.
//!
//! The executor walks a dependency-ordered task list: fills missing
//! arguments, consults the session cache, dispatches the downstream
//! call, and records one observation per task. A failed call may
//! trigger a bounded replan that restarts iteration over the revised
//! list; already-cached results make the restart cheap.

use std::sync::Arc;

use async_trait::async_trait;
use maestro_domain::config::ServicesConfig;
use maestro_domain::error::{Error, Result};
use maestro_domain::plan::{topo_sort, Observation, Task};
use maestro_domain::tool::ToolSpec;
use maestro_retrieval::RetrievalEngine;
use maestro_sessions::ContextStore;
use serde_json::{Map, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delegates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fills the arguments of a task the planner left empty, given the
/// observations accumulated so far.
#[async_trait]
pub trait ArgFiller: Send + Sync {
    async fn fill(
        &self,
        tool: &str,
        schema: &[(String, String)],
        observations: &[Observation],
    ) -> Map<String, Value>;
}

/// Produces a revised task list after a tool failure. `None` or an
/// empty list keeps the current plan.
#[async_trait]
pub trait Replanner: Send + Sync {
    async fn replan(&self, current: &[Task], observations: &[Observation]) -> Option<Vec<Task>>;
}

/// Per-task progress hook for the streaming runtime. Called before
/// each task executes.
pub type ProgressFn<'a> = &'a (dyn Fn(&Task) + Send + Sync);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Seam between plan execution and the downstream services: one call
/// per registered tool. Tests substitute an in-memory impl.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn call(&self, tool: &str, args: &Map<String, Value>) -> Result<Value>;
}

/// HTTP transport against the mock services, plus the in-process
/// retrieval engine for `rag.query`. Every call carries the hard
/// per-request deadline.
pub struct HttpToolTransport {
    client: reqwest::Client,
    services: ServicesConfig,
    engine: Arc<RetrievalEngine>,
}

impl HttpToolTransport {
    pub fn new(services: ServicesConfig, engine: Arc<RetrievalEngine>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(services.timeout_sec))
            .build()
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self {
            client,
            services,
            engine,
        })
    }

    async fn get_json(&self, service: &str, url: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| downstream_err(service, e))?;
        check_status(service, resp).await
    }

    async fn post_json(&self, service: &str, url: &str, body: Value) -> Result<Value> {
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| downstream_err(service, e))?;
        check_status(service, resp).await
    }
}

fn downstream_err(service: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{service}: {e}"))
    } else {
        Error::Downstream {
            service: service.to_string(),
            message: e.to_string(),
        }
    }
}

async fn check_status(service: &str, resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Downstream {
            service: service.to_string(),
            message: format!("HTTP {status}"),
        });
    }
    resp.json().await.map_err(|e| Error::Downstream {
        service: service.to_string(),
        message: format!("invalid JSON body: {e}"),
    })
}

fn str_arg<'a>(args: &'a Map<String, Value>, key: &str, default: &'a str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

#[async_trait]
impl ToolTransport for HttpToolTransport {
    async fn call(&self, tool: &str, args: &Map<String, Value>) -> Result<Value> {
        match tool {
            "weather.get" => {
                let city = str_arg(args, "city", "서울");
                self.get_json(
                    "weather",
                    &format!("{}/weather/{city}", self.services.weather_url),
                )
                .await
            }
            "calendar.get" => {
                let when = str_arg(args, "when", "today").to_lowercase();
                let endpoint = if when == "tomorrow" || when == "내일" {
                    "/calendar/tomorrow"
                } else {
                    "/calendar/today"
                };
                self.get_json(
                    "calendar",
                    &format!("{}{endpoint}", self.services.calendar_url),
                )
                .await
            }
            "calendar.create" => {
                let body = serde_json::json!({
                    "title": str_arg(args, "title", "새 일정"),
                    "start_time": str_arg(args, "start_time", "09:00"),
                });
                self.post_json(
                    "calendar",
                    &format!("{}/calendar/events", self.services.calendar_url),
                    body,
                )
                .await
            }
            "file.search" => {
                let q = str_arg(args, "q", "");
                let url = reqwest::Url::parse_with_params(
                    &format!("{}/files/search", self.services.file_url),
                    &[("q", q.as_str())],
                )
                .map_err(|e| Error::Other(e.to_string()))?;
                self.get_json("file", url.as_str()).await
            }
            "notification.send" => {
                let body = serde_json::json!({
                    "title": str_arg(args, "title", "알림"),
                    "message": str_arg(args, "message", ""),
                    "recipient": str_arg(args, "recipient", "team"),
                    "channel": str_arg(args, "channel", "slack"),
                });
                self.post_json(
                    "notification",
                    &format!("{}/notifications/send", self.services.notification_url),
                    body,
                )
                .await
            }
            "rag.query" => {
                let query = str_arg(args, "query", "");
                let top_k = args
                    .get("top_k")
                    .and_then(Value::as_u64)
                    .unwrap_or(5)
                    .max(1) as usize;
                let hits = self.engine.search(&query, top_k, None).await?;
                let formatted: Vec<Value> =
                    hits.iter().map(|h| h.to_public_json(1200)).collect();
                Ok(serde_json::json!({
                    "query": query,
                    "hits": formatted,
                    "meta": { "collection": self.engine.store().collection() },
                }))
            }
            other => Err(Error::Validation(format!("unknown tool: {other}"))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of running one plan to completion.
pub struct ExecutionResult {
    pub observations: Vec<Observation>,
    /// Sorted, de-duplicated tool names that were dispatched.
    pub used_tools: Vec<String>,
    /// The task list that was actually executed (after any replans).
    pub final_tasks: Vec<Task>,
    pub replans: usize,
}

pub struct ToolExecutor {
    specs: Vec<ToolSpec>,
    transport: Arc<dyn ToolTransport>,
    store: Arc<ContextStore>,
    max_replans: usize,
}

impl ToolExecutor {
    pub fn new(
        specs: Vec<ToolSpec>,
        transport: Arc<dyn ToolTransport>,
        store: Arc<ContextStore>,
    ) -> Self {
        Self {
            specs,
            transport,
            store,
            max_replans: 2,
        }
    }

    pub fn spec(&self, tool: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == tool)
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Execute a plan. Tasks are dependency-ordered first; tasks whose
    /// tool is `"none"` or unregistered record a note. Cache reads
    /// happen strictly after argument filling so keys reflect the
    /// actual arguments.
    pub async fn execute_plan(
        &self,
        session_id: &str,
        tasks: Vec<Task>,
        fill_args: &dyn ArgFiller,
        replanner: Option<&dyn Replanner>,
        progress: Option<ProgressFn<'_>>,
    ) -> ExecutionResult {
        let mut current = topo_sort(&tasks);
        let mut observations: Vec<Observation> = Vec::new();
        let mut used_tools: Vec<String> = Vec::new();
        let mut replans = 0usize;

        let mut i = 0;
        while i < current.len() {
            let task = current[i].clone();
            if let Some(f) = progress {
                f(&task);
            }

            // Unknown tools degrade to notes rather than failing the
            // plan.
            let spec = match self.spec(&task.tool) {
                Some(spec) if !task.is_note() => spec,
                _ => {
                    observations.push(Observation::note(&task.id, &task.text));
                    i += 1;
                    continue;
                }
            };

            let mut args = task.args.clone();
            if args.is_empty() {
                args = fill_args
                    .fill(&task.tool, &spec.args_schema, &observations)
                    .await;
            }

            let cache_key = ContextStore::cache_key(&task.tool, &args);
            if let Some(value) = self.store.get_cached(session_id, &cache_key, spec.ttl_seconds) {
                observations.push(Observation {
                    task_id: task.id.clone(),
                    tool: Some(task.tool.clone()),
                    args,
                    cached: true,
                    result: Some(value),
                    ..Observation::default()
                });
            } else {
                match self.transport.call(&task.tool, &args).await {
                    Ok(result) => {
                        self.store.set_cached(session_id, &cache_key, result.clone());
                        observations.push(Observation {
                            task_id: task.id.clone(),
                            tool: Some(task.tool.clone()),
                            args,
                            cached: false,
                            result: Some(result),
                            ..Observation::default()
                        });
                    }
                    Err(e) => {
                        tracing::warn!(
                            tool = %task.tool,
                            task_id = %task.id,
                            error = %e,
                            "tool call failed"
                        );
                        observations.push(Observation {
                            task_id: task.id.clone(),
                            tool: Some(task.tool.clone()),
                            args,
                            cached: false,
                            error: Some(e.to_string()),
                            ..Observation::default()
                        });

                        if replans < self.max_replans {
                            if let Some(replanner) = replanner {
                                if let Some(new_tasks) =
                                    replanner.replan(&current, &observations).await
                                {
                                    if !new_tasks.is_empty() {
                                        tracing::info!(
                                            replans = replans + 1,
                                            tasks = new_tasks.len(),
                                            "replanning after tool failure"
                                        );
                                        current = topo_sort(&new_tasks);
                                        replans += 1;
                                        i = 0;
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
            }

            push_unique(&mut used_tools, &task.tool);
            i += 1;
        }

        used_tools.sort_unstable();
        ExecutionResult {
            observations,
            used_tools,
            final_tasks: current,
            replans,
        }
    }
}

fn push_unique(tools: &mut Vec<String>, tool: &str) {
    if !tools.iter().any(|t| t == tool) {
        tools.push(tool.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_domain::tool::default_registry;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Scripted transport: responds per tool, counts calls, optionally
    /// fails the first N calls of a tool.
    struct ScriptedTransport {
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
        fail_first: Mutex<std::collections::HashMap<String, usize>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_first: Mutex::new(std::collections::HashMap::new()),
            }
        }

        fn fail_first(self, tool: &str, times: usize) -> Self {
            self.fail_first.lock().insert(tool.to_string(), times);
            self
        }

        fn call_count(&self, tool: &str) -> usize {
            self.calls.lock().iter().filter(|(t, _)| t == tool).count()
        }
    }

    #[async_trait]
    impl ToolTransport for ScriptedTransport {
        async fn call(&self, tool: &str, args: &Map<String, Value>) -> Result<Value> {
            self.calls.lock().push((tool.to_string(), args.clone()));
            {
                let mut failures = self.fail_first.lock();
                if let Some(remaining) = failures.get_mut(tool) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(Error::Downstream {
                            service: tool.to_string(),
                            message: "HTTP 500".into(),
                        });
                    }
                }
            }
            Ok(json!({ "tool": tool, "ok": true }))
        }
    }

    struct NoFill;
    #[async_trait]
    impl ArgFiller for NoFill {
        async fn fill(
            &self,
            _tool: &str,
            _schema: &[(String, String)],
            _observations: &[Observation],
        ) -> Map<String, Value> {
            Map::new()
        }
    }

    struct SwapToNote;
    #[async_trait]
    impl Replanner for SwapToNote {
        async fn replan(
            &self,
            _current: &[Task],
            _observations: &[Observation],
        ) -> Option<Vec<Task>> {
            Some(vec![Task::note("r1", "답변으로 대체")])
        }
    }

    fn tool_task(id: &str, tool: &str, args: Value) -> Task {
        Task {
            id: id.into(),
            text: format!("run {tool}"),
            tool: tool.into(),
            args: args.as_object().cloned().unwrap_or_default(),
            ..Task::default()
        }
    }

    fn executor(transport: Arc<dyn ToolTransport>) -> (ToolExecutor, Arc<ContextStore>) {
        let store = Arc::new(ContextStore::new(20, 24));
        (
            ToolExecutor::new(default_registry(), transport, store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn executes_in_dependency_order() {
        let transport = Arc::new(ScriptedTransport::new());
        let (exec, _) = executor(transport.clone());

        let tasks = vec![
            tool_task("t2", "notification.send", json!({"message": "hi"})),
            tool_task("t1", "weather.get", json!({"city": "서울"})),
        ];
        // t2 depends on t1.
        let tasks = vec![
            Task {
                depends_on: vec!["t1".into()],
                ..tasks[0].clone()
            },
            tasks[1].clone(),
        ];

        let result = exec
            .execute_plan("s1", tasks, &NoFill, None, None)
            .await;
        assert_eq!(result.observations.len(), 2);
        assert_eq!(result.observations[0].tool.as_deref(), Some("weather.get"));
        assert_eq!(
            result.observations[1].tool.as_deref(),
            Some("notification.send")
        );
        assert_eq!(result.used_tools, vec!["notification.send", "weather.get"]);
    }

    #[tokio::test]
    async fn second_identical_call_is_served_from_cache() {
        let transport = Arc::new(ScriptedTransport::new());
        let (exec, _) = executor(transport.clone());

        let tasks = || vec![tool_task("t1", "weather.get", json!({"city": "서울"}))];
        let first = exec
            .execute_plan("s1", tasks(), &NoFill, None, None)
            .await;
        assert!(!first.observations[0].cached);

        let second = exec
            .execute_plan("s1", tasks(), &NoFill, None, None)
            .await;
        assert!(second.observations[0].cached);
        assert_eq!(transport.call_count("weather.get"), 1);
    }

    #[tokio::test]
    async fn cache_is_scoped_per_session_and_args() {
        let transport = Arc::new(ScriptedTransport::new());
        let (exec, _) = executor(transport.clone());

        let seoul = vec![tool_task("t1", "weather.get", json!({"city": "서울"}))];
        let busan = vec![tool_task("t1", "weather.get", json!({"city": "부산"}))];

        exec.execute_plan("s1", seoul.clone(), &NoFill, None, None).await;
        exec.execute_plan("s1", busan, &NoFill, None, None).await;
        exec.execute_plan("s2", seoul, &NoFill, None, None).await;
        assert_eq!(transport.call_count("weather.get"), 3);
    }

    #[tokio::test]
    async fn failure_triggers_bounded_replan() {
        let transport = Arc::new(ScriptedTransport::new().fail_first("weather.get", 1));
        let (exec, _) = executor(transport.clone());

        let tasks = vec![tool_task("t1", "weather.get", json!({"city": "서울"}))];
        let result = exec
            .execute_plan("s1", tasks, &NoFill, Some(&SwapToNote), None)
            .await;

        assert_eq!(result.replans, 1);
        // Error observation survives, then the substituted note runs.
        assert!(result.observations[0].is_error());
        assert_eq!(result.observations[1].note.as_deref(), Some("답변으로 대체"));
        assert_eq!(result.final_tasks.len(), 1);
        assert_eq!(result.final_tasks[0].id, "r1");
    }

    #[tokio::test]
    async fn replan_is_capped_at_max() {
        struct SamePlan;
        #[async_trait]
        impl Replanner for SamePlan {
            async fn replan(
                &self,
                current: &[Task],
                _observations: &[Observation],
            ) -> Option<Vec<Task>> {
                Some(current.to_vec())
            }
        }

        let transport = Arc::new(ScriptedTransport::new().fail_first("weather.get", 99));
        let (exec, _) = executor(transport.clone());
        let tasks = vec![tool_task("t1", "weather.get", json!({"city": "서울"}))];
        let result = exec
            .execute_plan("s1", tasks, &NoFill, Some(&SamePlan), None)
            .await;

        // Initial attempt + two replanned attempts.
        assert_eq!(result.replans, 2);
        assert_eq!(transport.call_count("weather.get"), 3);
        assert!(result.observations.iter().all(|o| o.is_error() || o.note.is_some()));
    }

    #[tokio::test]
    async fn unknown_tool_degrades_to_note() {
        let transport = Arc::new(ScriptedTransport::new());
        let (exec, _) = executor(transport.clone());

        let tasks = vec![tool_task("t1", "quantum.solve", json!({}))];
        let result = exec.execute_plan("s1", tasks, &NoFill, None, None).await;
        assert_eq!(result.observations.len(), 1);
        assert!(result.observations[0].note.is_some());
        assert!(result.used_tools.is_empty());
        assert_eq!(transport.call_count("quantum.solve"), 0);
    }

    #[tokio::test]
    async fn empty_args_are_filled_before_cache_lookup() {
        struct FillSeoul;
        #[async_trait]
        impl ArgFiller for FillSeoul {
            async fn fill(
                &self,
                _tool: &str,
                _schema: &[(String, String)],
                _observations: &[Observation],
            ) -> Map<String, Value> {
                json!({"city": "서울"}).as_object().cloned().unwrap()
            }
        }

        let transport = Arc::new(ScriptedTransport::new());
        let (exec, store) = executor(transport.clone());

        let tasks = vec![tool_task("t1", "weather.get", json!({}))];
        let result = exec
            .execute_plan("s1", tasks, &FillSeoul, None, None)
            .await;
        assert_eq!(result.observations[0].args["city"], "서울");

        // The cache key was computed from the filled args.
        let key = ContextStore::cache_key(
            "weather.get",
            json!({"city": "서울"}).as_object().unwrap(),
        );
        assert!(store.get_cached("s1", &key, None).is_some());
    }
}
