//! Tool registry: the static set of downstream capabilities the planner
//! may schedule and the executor can dispatch.

use serde::{Deserialize, Serialize};

/// Declared spec of one tool: dotted name, human description, argument
/// schema (field -> type hint) and an optional cache TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Ordered field -> type-hint pairs shown to the planner and the
    /// argument filler.
    pub args_schema: Vec<(String, String)>,
    /// Cache freshness window, seconds. `None` = no expiry within the
    /// session lifetime.
    pub ttl_seconds: Option<u64>,
}

impl ToolSpec {
    fn new(
        name: &str,
        description: &str,
        args: &[(&str, &str)],
        ttl_seconds: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args_schema: args
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ttl_seconds,
        }
    }

    fn schema_display(&self) -> String {
        let fields: Vec<String> = self
            .args_schema
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        format!("{{{}}}", fields.join(", "))
    }
}

/// The built-in tool set. Static by design: adding a tool means adding a
/// spec here and a dispatch arm in the executor.
pub fn default_registry() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "weather.get",
            "특정 도시의 현재 날씨를 조회한다.",
            &[("city", "string (e.g., 서울)")],
            Some(300),
        ),
        ToolSpec::new(
            "calendar.get",
            "오늘/내일 일정을 조회한다.",
            &[("when", "string (today|tomorrow)")],
            Some(60),
        ),
        ToolSpec::new(
            "calendar.create",
            "일정을 생성한다.",
            &[("title", "string"), ("start_time", "string (HH:MM)")],
            None,
        ),
        ToolSpec::new(
            "file.search",
            "파일/문서를 키워드로 검색한다.",
            &[("q", "string")],
            Some(120),
        ),
        ToolSpec::new(
            "notification.send",
            "팀/수신자에게 알림을 보낸다(모의).",
            &[
                ("title", "string"),
                ("message", "string"),
                ("recipient", "string"),
                ("channel", "string (slack|email|sms)"),
            ],
            None,
        ),
        ToolSpec::new(
            "rag.query",
            "문서 저장소에 질의하여 관련 문서를 찾는다.",
            &[("query", "string"), ("top_k", "int")],
            Some(120),
        ),
    ]
}

/// Render the registry as the one-line-per-tool summary shown to the
/// planner prompt.
pub fn registry_prompt(specs: &[ToolSpec]) -> String {
    specs
        .iter()
        .map(|t| format!("- {}: {} | args={}", t.name, t.description, t.schema_display()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_six_tools_with_expected_ttls() {
        let specs = default_registry();
        assert_eq!(specs.len(), 6);
        let ttl = |name: &str| {
            specs
                .iter()
                .find(|t| t.name == name)
                .map(|t| t.ttl_seconds)
                .unwrap()
        };
        assert_eq!(ttl("weather.get"), Some(300));
        assert_eq!(ttl("calendar.get"), Some(60));
        assert_eq!(ttl("calendar.create"), None);
        assert_eq!(ttl("file.search"), Some(120));
        assert_eq!(ttl("notification.send"), None);
        assert_eq!(ttl("rag.query"), Some(120));
    }

    #[test]
    fn prompt_lists_every_tool() {
        let specs = default_registry();
        let prompt = registry_prompt(&specs);
        for spec in &specs {
            assert!(prompt.contains(&spec.name));
        }
        assert!(prompt.contains("city: string"));
    }
}
