//! Plan model: the task DAG produced by the planner and consumed by the
//! executor, plus the observations the executor appends while running it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task / Plan
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sentinel tool name for tasks that need no downstream call.
pub const TOOL_NONE: &str = "none";

/// One step of a plan. `tool` may be the sentinel `"none"`; `args` left
/// empty means the executor fills them from observations at run time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "d_tool_none")]
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produces: Option<String>,
}

fn d_tool_none() -> String {
    TOOL_NONE.into()
}

impl Task {
    /// A task that runs without calling any tool.
    pub fn note(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            tool: TOOL_NONE.into(),
            ..Self::default()
        }
    }

    pub fn is_note(&self) -> bool {
        self.tool.is_empty() || self.tool == TOOL_NONE
    }
}

/// A planner response: ordered tasks plus an optional final step id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Plan {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_step: Option<String>,
}

impl Plan {
    /// The substitute plan used when the planner returns nothing usable.
    pub fn noop() -> Self {
        Self {
            tasks: vec![Task::note("t1", "process request")],
            final_step: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Topological sort
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dependency-order the tasks.
///
/// Depth-first over `depends_on`, emitting each task after its
/// dependencies. Insertion order is preserved among independent tasks.
/// Cycles never loop or panic: a back edge to a task currently on the
/// visit stack is skipped. References to unknown task ids are ignored.
pub fn topo_sort(tasks: &[Task]) -> Vec<Task> {
    let index: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    let mut visited = vec![false; tasks.len()];
    let mut on_stack = vec![false; tasks.len()];
    let mut order = Vec::with_capacity(tasks.len());

    fn visit(
        i: usize,
        tasks: &[Task],
        index: &HashMap<&str, usize>,
        visited: &mut [bool],
        on_stack: &mut [bool],
        order: &mut Vec<usize>,
    ) {
        if visited[i] || on_stack[i] {
            return;
        }
        on_stack[i] = true;
        for dep in &tasks[i].depends_on {
            if let Some(&j) = index.get(dep.as_str()) {
                visit(j, tasks, index, visited, on_stack, order);
            }
        }
        on_stack[i] = false;
        visited[i] = true;
        order.push(i);
    }

    for i in 0..tasks.len() {
        visit(i, tasks, &index, &mut visited, &mut on_stack, &mut order);
    }

    order.into_iter().map(|i| tasks[i].clone()).collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The outcome of executing one task, appended in execution order.
///
/// Note tasks carry `note` only; tool tasks carry `tool`/`args`/`cached`
/// plus exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Observation {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub args: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Observation {
    pub fn note(task_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            note: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task {
            id: id.into(),
            text: format!("task {id}"),
            tool: TOOL_NONE.into(),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            ..Task::default()
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn sort_preserves_order_of_independents() {
        let tasks = vec![task("a", &[]), task("b", &[]), task("c", &[])];
        assert_eq!(ids(&topo_sort(&tasks)), vec!["a", "b", "c"]);
    }

    #[test]
    fn dependencies_come_first() {
        let tasks = vec![task("t2", &["t1"]), task("t1", &[]), task("t3", &["t2"])];
        assert_eq!(ids(&topo_sort(&tasks)), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn cycle_does_not_loop() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"]), task("c", &[])];
        let sorted = topo_sort(&tasks);
        assert_eq!(sorted.len(), 3);
        // Both cycle members still appear exactly once.
        let mut seen = ids(&sorted);
        seen.sort_unstable();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn unknown_dependency_is_ignored() {
        let tasks = vec![task("a", &["ghost"]), task("b", &["a"])];
        assert_eq!(ids(&topo_sort(&tasks)), vec!["a", "b"]);
    }

    #[test]
    fn self_dependency_is_skipped() {
        let tasks = vec![task("a", &["a"]), task("b", &[])];
        assert_eq!(ids(&topo_sort(&tasks)), vec!["a", "b"]);
    }

    #[test]
    fn task_json_defaults_are_lenient() {
        let t: Task = serde_json::from_str(r#"{"id":"t1","text":"hi"}"#).unwrap();
        assert!(t.is_note());
        assert!(t.args.is_empty());
        assert!(t.depends_on.is_empty());
    }
}
