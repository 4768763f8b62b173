//! LLM task planning.
//!
//! The planner decomposes a request into a task DAG and, after failed
//! tool calls, revises it with the observations so far. LLM output is
//! extracted leniently (whole-string JSON, else the first `{` to the
//! last `}`) and validated through the `Plan` schema before use.

use std::sync::Arc;

use maestro_domain::error::Result;
use maestro_domain::intent::Intent;
use maestro_domain::plan::{Observation, Plan, Task};
use maestro_providers::ProviderRegistry;
use maestro_sessions::RecentTurn;
use serde_json::Value;

pub struct TaskPlanner {
    llm: Arc<ProviderRegistry>,
    tools_prompt: String,
}

impl TaskPlanner {
    pub fn new(llm: Arc<ProviderRegistry>, tools_prompt: String) -> Self {
        Self { llm, tools_prompt }
    }

    /// Plan the initial task DAG. A malformed response yields an empty
    /// plan (the runtime substitutes the single-task no-op); a provider
    /// failure is an `Err` so the runtime can take the rule-based
    /// branch instead.
    pub async fn plan(
        &self,
        user_input: &str,
        intent: Intent,
        apis: &[String],
        recent_turns: &[RecentTurn],
    ) -> Result<Plan> {
        let prompt = format!(
            "당신은 태스크 플래너 에이전트입니다.\n\
             목표: 사용자 요청을 실행 가능한 서브태스크로 분해하고, 각 태스크의 \
             실행 순서/의존성을 포함한 계획을 JSON으로 작성하세요.\n\
             반드시 JSON만 출력.\n\n\
             사용 가능한 도구:\n{tools}\n\n\
             의도(intent): {intent}\n\
             API 후보: {apis:?}\n\n\
             최근 대화(참고): {recent}\n\n\
             반환 형식(키 고정):\n\
             {{ \"tasks\":[{{\"id\":\"t1\",\"text\":\"...\",\"tool\":\"weather.get|...|none\",\
             \"args\":{{...}},\"depends_on\":[\"t0\"],\"produces\":\"짧게\"}}], \"final_step\":\"tN\" }}\n\n\
             규칙:\n\
             - tool이 필요 없으면 \"none\"\n\
             - args는 가능한 채워서 주고, 불확실하면 비워두고 실행기(Executor)가 채우게 하세요.\n\
             - depends_on은 task id 리스트\n\n\
             사용자 요청: {user_input}\n",
            tools = self.tools_prompt,
            intent = intent.label(),
            recent = safe_str(&serde_json::to_value(recent_turns).unwrap_or(Value::Null), 800),
        );
        self.ask(&prompt).await
    }

    /// Revise the plan mid-execution using the observations so far.
    pub async fn replan(
        &self,
        user_input: &str,
        intent: Intent,
        apis: &[String],
        current_tasks: &[Task],
        observations: &[Observation],
    ) -> Result<Plan> {
        let prompt = format!(
            "당신은 태스크 플래너 에이전트입니다. 실행 중 관찰 결과를 반영해 \
             계획을 업데이트하세요.\n\
             반드시 JSON만 출력.\n\n\
             사용 가능한 도구:\n{tools}\n\n\
             의도(intent): {intent}\n\
             API 후보: {apis:?}\n\n\
             현재 계획(tasks): {tasks}\n\n\
             관찰(observations): {obs}\n\n\
             반환 형식(키 고정):\n\
             {{ \"tasks\":[{{\"id\":\"t1\",\"text\":\"...\",\"tool\":\"...|none\",\"args\":{{...}},\
             \"depends_on\":[\"...\"],\"produces\":\"...\"}}], \"final_step\":\"tN\" }}\n\n\
             사용자 요청: {user_input}\n",
            tools = self.tools_prompt,
            intent = intent.label(),
            tasks = safe_str(&serde_json::to_value(current_tasks).unwrap_or(Value::Null), 1400),
            obs = safe_str(&serde_json::to_value(observations).unwrap_or(Value::Null), 1400),
        );
        self.ask(&prompt).await
    }

    async fn ask(&self, prompt: &str) -> Result<Plan> {
        let raw = self.llm.chat_prompt(prompt).await?;
        Ok(parse_plan(&raw))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lenient JSON extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse whatever the model produced into a `Plan`. Tolerates prose
/// around the JSON object; anything unusable becomes the empty plan.
pub fn parse_plan(raw: &str) -> Plan {
    extract_json_object(raw)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Parse an LLM answer into a tool-argument map, with the same
/// tolerance as [`parse_plan`]. Unusable output is the empty map.
pub fn parse_args(raw: &str) -> serde_json::Map<String, Value> {
    extract_json_object(raw)
        .and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
}

/// Whole-string JSON first, else the substring from the first `{` to
/// the last `}`. Only objects count.
fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

/// Compact JSON clipped to `limit` characters for prompt embedding.
fn safe_str(value: &Value, limit: usize) -> String {
    let s = serde_json::to_string(value).unwrap_or_else(|_| value.to_string());
    if s.chars().count() <= limit {
        return s;
    }
    let clipped: String = s.chars().take(limit).collect();
    format!("{clipped}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_string_json_parses() {
        let plan = parse_plan(
            r#"{"tasks":[{"id":"t1","text":"날씨 조회","tool":"weather.get","args":{"city":"서울"}}],"final_step":"t1"}"#,
        );
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].tool, "weather.get");
        assert_eq!(plan.final_step.as_deref(), Some("t1"));
    }

    #[test]
    fn json_wrapped_in_prose_is_extracted() {
        let raw = "물론입니다! 계획은 다음과 같습니다:\n\
                   {\"tasks\":[{\"id\":\"t1\",\"text\":\"검색\",\"tool\":\"file.search\"}]}\n\
                   이 계획대로 진행하겠습니다.";
        let plan = parse_plan(raw);
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].tool, "file.search");
    }

    #[test]
    fn garbage_becomes_the_empty_plan() {
        assert!(parse_plan("").tasks.is_empty());
        assert!(parse_plan("no json here").tasks.is_empty());
        assert!(parse_plan("[1, 2, 3]").tasks.is_empty());
        assert!(parse_plan("{ broken").tasks.is_empty());
    }

    #[test]
    fn missing_fields_default_leniently() {
        let plan = parse_plan(r#"{"tasks":[{"id":"t1"}]}"#);
        assert_eq!(plan.tasks.len(), 1);
        assert!(plan.tasks[0].is_note());
        assert!(plan.tasks[0].depends_on.is_empty());
    }

    #[test]
    fn args_extraction_tolerates_prose() {
        let args = parse_args("여기 있습니다: {\"city\": \"서울\"} 입니다.");
        assert_eq!(args["city"], "서울");
        assert!(parse_args("모르겠어요").is_empty());
    }

    #[test]
    fn safe_str_clips_long_values() {
        let value = serde_json::json!({ "text": "가".repeat(100) });
        let s = safe_str(&value, 20);
        assert!(s.chars().count() <= 21);
        assert!(s.ends_with('…'));
    }
}
