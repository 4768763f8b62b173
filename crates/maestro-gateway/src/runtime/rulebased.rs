//! Rule-based fallback branch.
//!
//! When no LLM is configured (or every call fails) the runtime routes
//! the request by intent against the same downstream services and
//! composes a plain-text answer, plus a static to-do list so the
//! streaming UI behaves identically.

use maestro_domain::intent::Intent;
use maestro_domain::plan::Observation;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::executor::ToolTransport;
use crate::runtime::classifier::IntentAnalysis;

const HELP_TEXT: &str = "에이전틱 챗 오케스트레이터입니다.\n\n\
    - weather: 날씨 조회\n\
    - calendar: 일정 조회/생성\n\
    - file: 파일 검색\n\
    - notification: 알림 발송(mock)\n";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Text extraction helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const CITIES: &[&str] = &["서울", "부산", "인천", "대구", "광주", "대전", "울산", "세종"];

pub fn extract_city(text: &str) -> &'static str {
    CITIES
        .iter()
        .find(|c| text.contains(*c))
        .copied()
        .unwrap_or("서울")
}

/// Pull a start time out of free text: `"3시"` -> `"15:00"` (bare 1-7
/// reads as afternoon), `"14시"` -> `"14:00"`, `"9:30"` -> `"09:30"`,
/// default `"09:00"`.
pub fn extract_time(text: &str) -> String {
    static HOUR_RE: OnceLock<regex::Regex> = OnceLock::new();
    static HHMM_RE: OnceLock<regex::Regex> = OnceLock::new();
    let hour_re = HOUR_RE.get_or_init(|| regex::Regex::new(r"(\d{1,2})\s*시").unwrap());
    let hhmm_re = HHMM_RE.get_or_init(|| regex::Regex::new(r"\b(\d{1,2}):(\d{2})\b").unwrap());

    if let Some(caps) = hour_re.captures(text) {
        if let Ok(mut hour) = caps[1].parse::<u32>() {
            // Bare afternoon-sized hours ("3시") read as PM in office
            // context.
            if (1..=7).contains(&hour) {
                hour += 12;
            }
            return format!("{hour:02}:00");
        }
    }
    if let Some(caps) = hhmm_re.captures(text) {
        if let (Ok(h), Ok(m)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
            return format!("{h:02}:{m:02}");
        }
    }
    "09:00".into()
}

pub fn extract_channel(text: &str) -> &'static str {
    let s = text.to_lowercase();
    if s.contains("슬랙") || s.contains("slack") {
        "slack"
    } else if s.contains("이메일") || s.contains("email") || s.contains("메일") {
        "email"
    } else if s.contains("문자") || s.contains("sms") {
        "sms"
    } else {
        "slack"
    }
}

/// Strip scheduling keywords from the message to get an event title.
pub fn extract_title(text: &str) -> String {
    let mut title = text.to_string();
    for k in ["일정", "회의", "미팅", "잡아줘", "추가해줘", "생성해줘", "만들어줘", "에"] {
        title = title.replace(k, " ");
    }
    // Drop the time expression itself.
    static TIME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let time_re = TIME_RE
        .get_or_init(|| regex::Regex::new(r"(\d{1,2}\s*시|\b\d{1,2}:\d{2}\b)").unwrap());
    title = time_re.replace_all(&title, " ").to_string();

    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        "회의".into()
    } else {
        title
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rule-based execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RuleBasedOutcome {
    pub answer: String,
    pub tools_used: Vec<String>,
    pub observations: Vec<Observation>,
    pub success: bool,
}

/// The static per-intent checklist mirrored to the streaming UI.
pub fn todo_for(intent: Intent) -> Vec<String> {
    let mut todo = vec!["사용자 요청의 의도를 확인한다".to_string()];
    let steps: &[&str] = match intent {
        Intent::WeatherQuery => &[
            "도시/기간 등 파라미터를 추출한다",
            "weather-service를 호출해 데이터를 가져온다",
            "결과를 요약해 답변한다",
        ],
        Intent::CalendarQuery => &[
            "날짜(오늘/내일/특정일)를 해석한다",
            "calendar-service를 호출해 일정을 가져온다",
            "일정/빈시간을 요약한다",
        ],
        Intent::CalendarCreate => &[
            "제목/시간/날짜를 추출한다",
            "calendar-service에 이벤트 생성을 요청한다",
            "생성 결과를 확인해 사용자에게 안내한다",
        ],
        Intent::FileSearch => &[
            "검색 키워드를 정제한다",
            "file-service를 호출해 검색한다",
            "상위 결과를 리스트업한다",
        ],
        Intent::NotificationSend => &[
            "채널(email/slack/sms)과 수신자를 결정한다",
            "notification-service로 발송한다",
            "발송 결과를 확인한다",
        ],
        Intent::Help => &["가능한 기능/예시를 정리해서 안내한다"],
        Intent::Chat => &[
            "문서 저장소를 질의해 관련 문서를 찾는다",
            "근거(출처)와 함께 간단히 답한다",
        ],
    };
    todo.extend(steps.iter().map(|s| s.to_string()));
    todo
}

fn args_of(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn observation(task_id: &str, tool: &str, args: &Map<String, Value>, outcome: &Result<Value, maestro_domain::Error>) -> Observation {
    match outcome {
        Ok(result) => Observation {
            task_id: task_id.into(),
            tool: Some(tool.into()),
            args: args.clone(),
            result: Some(result.clone()),
            ..Observation::default()
        },
        Err(e) => Observation {
            task_id: task_id.into(),
            tool: Some(tool.into()),
            args: args.clone(),
            error: Some(e.to_string()),
            ..Observation::default()
        },
    }
}

/// Route one request by intent, calling tools through the shared
/// transport, and compose the final plain-text answer.
pub async fn run(
    analysis: &IntentAnalysis,
    user_input: &str,
    transport: &dyn ToolTransport,
) -> RuleBasedOutcome {
    let mut tools_used = Vec::new();
    let mut observations = Vec::new();
    let mut success = true;

    let mut answer = match analysis.intent {
        Intent::Help => HELP_TEXT.to_string(),

        Intent::WeatherQuery => {
            let city = extract_city(user_input);
            let args = args_of(serde_json::json!({ "city": city }));
            let outcome = transport.call("weather.get", &args).await;
            observations.push(observation("t1", "weather.get", &args, &outcome));
            tools_used.push("weather.get".to_string());
            match outcome {
                Ok(data) => format!(
                    "{} 현재 날씨는 {}, {}°C 입니다.",
                    data.get("city").and_then(Value::as_str).unwrap_or(city),
                    data.get("condition").and_then(Value::as_str).unwrap_or("-"),
                    data.get("temperature").and_then(Value::as_i64).unwrap_or(0),
                ),
                Err(e) => {
                    success = false;
                    format!("날씨 정보를 가져오지 못했어요. ({e})")
                }
            }
        }

        Intent::CalendarQuery => {
            let when = if user_input.contains("내일") { "tomorrow" } else { "today" };
            let args = args_of(serde_json::json!({ "when": when }));
            let outcome = transport.call("calendar.get", &args).await;
            observations.push(observation("t1", "calendar.get", &args, &outcome));
            tools_used.push("calendar.get".to_string());
            match outcome {
                Ok(data) => {
                    let date = data.get("date").and_then(Value::as_str).unwrap_or("");
                    let total = data.get("total_events").and_then(Value::as_u64).unwrap_or(0);
                    if total == 0 {
                        format!("{date} 일정이 없습니다.")
                    } else {
                        let lines: Vec<String> = data
                            .get("events")
                            .and_then(Value::as_array)
                            .map(|events| {
                                events
                                    .iter()
                                    .take(10)
                                    .map(|e| {
                                        format!(
                                            "- {} {}",
                                            e.get("start_time").and_then(Value::as_str).unwrap_or(""),
                                            e.get("title").and_then(Value::as_str).unwrap_or(""),
                                        )
                                    })
                                    .collect()
                            })
                            .unwrap_or_default();
                        format!("{date} 일정 {total}개:\n{}", lines.join("\n"))
                    }
                }
                Err(e) => {
                    success = false;
                    format!("일정을 가져오지 못했어요. ({e})")
                }
            }
        }

        Intent::CalendarCreate => {
            let args = args_of(serde_json::json!({
                "title": extract_title(user_input),
                "start_time": extract_time(user_input),
            }));
            let outcome = transport.call("calendar.create", &args).await;
            observations.push(observation("t1", "calendar.create", &args, &outcome));
            tools_used.push("calendar.create".to_string());
            match outcome {
                Ok(data) => format!(
                    "일정을 생성했어요: {} - {} (id={})",
                    data.get("start_time").and_then(Value::as_str).unwrap_or(""),
                    data.get("title").and_then(Value::as_str).unwrap_or(""),
                    data.get("id").and_then(Value::as_str).unwrap_or(""),
                ),
                Err(e) => {
                    success = false;
                    format!("일정을 생성하지 못했어요. ({e})")
                }
            }
        }

        Intent::FileSearch => {
            let args = args_of(serde_json::json!({ "q": user_input }));
            let outcome = transport.call("file.search", &args).await;
            observations.push(observation("t1", "file.search", &args, &outcome));
            tools_used.push("file.search".to_string());
            match outcome {
                Ok(data) => {
                    let files = data
                        .get("files")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    if files.is_empty() {
                        format!("'{user_input}' 검색 결과가 없습니다.")
                    } else {
                        let lines: Vec<String> = files
                            .iter()
                            .take(8)
                            .map(|f| {
                                format!(
                                    "- {} ({})",
                                    f.get("name").and_then(Value::as_str).unwrap_or(""),
                                    f.get("path").and_then(Value::as_str).unwrap_or(""),
                                )
                            })
                            .collect();
                        format!(
                            "검색 결과 {}개:\n{}",
                            data.get("total_matches").and_then(Value::as_u64).unwrap_or(0),
                            lines.join("\n")
                        )
                    }
                }
                Err(e) => {
                    success = false;
                    format!("파일을 검색하지 못했어요. ({e})")
                }
            }
        }

        Intent::NotificationSend => {
            let args = args_of(serde_json::json!({
                "title": "알림",
                "message": user_input,
                "recipient": "team",
                "channel": extract_channel(user_input),
            }));
            let outcome = transport.call("notification.send", &args).await;
            observations.push(observation("t1", "notification.send", &args, &outcome));
            tools_used.push("notification.send".to_string());
            match outcome {
                Ok(data) => format!(
                    "[mock] {} 알림 발송 완료 (id={})",
                    extract_channel(user_input),
                    data.get("id").and_then(Value::as_str).unwrap_or(""),
                ),
                Err(e) => {
                    success = false;
                    format!("알림을 발송하지 못했어요. ({e})")
                }
            }
        }

        Intent::Chat => {
            let args = args_of(serde_json::json!({ "query": user_input, "top_k": 5 }));
            let outcome = transport.call("rag.query", &args).await;
            observations.push(observation("t1", "rag.query", &args, &outcome));
            tools_used.push("rag.query".to_string());
            match outcome {
                Ok(data) => {
                    let hits = data
                        .get("hits")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    match hits.first() {
                        Some(top) => format!(
                            "관련 문서 기반 답변(Top1):\n- {}\n(출처: {})",
                            top.get("text").and_then(Value::as_str).unwrap_or(""),
                            top.get("source").and_then(Value::as_str).unwrap_or(""),
                        ),
                        None => "관련 문서를 찾지 못했어요.".to_string(),
                    }
                }
                // Retrieval being down must not break plain chat.
                Err(_) => user_input.to_string(),
            }
        }
    };

    // Composite request: forward the primary answer as a notification.
    if analysis.wants_notification() && analysis.intent.is_tool_intent() {
        let channel = extract_channel(user_input);
        let args = args_of(serde_json::json!({
            "title": "알림",
            "message": answer.clone(),
            "recipient": "team",
            "channel": channel,
        }));
        let outcome = transport.call("notification.send", &args).await;
        observations.push(observation("t2", "notification.send", &args, &outcome));
        tools_used.push("notification.send".to_string());
        match outcome {
            Ok(data) => {
                answer.push_str(&format!(
                    "\n[mock] {channel} 알림 발송 완료 (id={})",
                    data.get("id").and_then(Value::as_str).unwrap_or(""),
                ));
            }
            Err(e) => {
                success = false;
                answer.push_str(&format!("\n알림 발송에는 실패했어요. ({e})"));
            }
        }
    }

    RuleBasedOutcome {
        answer,
        tools_used,
        observations,
        success,
    }
}
