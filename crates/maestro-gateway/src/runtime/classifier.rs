//! Intent classification.
//!
//! Primary path: a few-shot prompt asking the LLM for just the intent
//! label, parsed leniently. Fallback path: the keyword lexicon, used
//! when no provider is configured or the call fails. Both paths then
//! run composite detection, which turns "오늘 날씨를 팀한테 알려줘" into
//! weather + notification.

use std::sync::Arc;

use maestro_domain::intent::{
    contains_any, Intent, CALENDAR_CREATE_KEYWORDS, CALENDAR_KEYWORDS, FILE_KEYWORDS,
    HELP_KEYWORDS, NOTIFY_CHANNELS, NOTIFY_KEYWORDS, NOTIFY_RECIPIENTS, NOTIFY_VERBS,
    WEATHER_KEYWORDS,
};
use maestro_providers::ProviderRegistry;
use serde::Serialize;
use serde_json::{Map, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Analysis result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct IntentAnalysis {
    pub intent: Intent,
    pub apis: Vec<String>,
    pub confidence: f64,
    pub parameters: Map<String, Value>,
    pub reasoning: String,
}

impl IntentAnalysis {
    fn new(intent: Intent, confidence: f64, reasoning: &str, user_input: &str) -> Self {
        let mut parameters = Map::new();
        parameters.insert("user_input".into(), Value::String(user_input.to_string()));
        Self {
            intent,
            apis: intent.apis().iter().map(|s| s.to_string()).collect(),
            confidence,
            parameters,
            reasoning: reasoning.to_string(),
        }
    }

    pub fn wants_notification(&self) -> bool {
        self.parameters
            .get("notify")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct IntentClassifier {
    llm: Arc<ProviderRegistry>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<ProviderRegistry>) -> Self {
        Self { llm }
    }

    pub async fn analyze(&self, user_input: &str) -> IntentAnalysis {
        let mut analysis = if self.llm.is_enabled() {
            match self.llm.chat_prompt(&few_shot_prompt(user_input)).await {
                Ok(raw) => IntentAnalysis::new(
                    Intent::parse_lenient(&raw),
                    0.85,
                    "llm few-shot",
                    user_input,
                ),
                Err(e) => {
                    tracing::warn!(error = %e, "intent LLM call failed, using keyword fallback");
                    classify_keywords(user_input)
                }
            }
        } else {
            classify_keywords(user_input)
        };

        apply_composite_detection(&mut analysis, user_input);
        analysis
    }
}

fn few_shot_prompt(user_input: &str) -> String {
    format!(
        "다음 사용자 요청의 의도를 하나의 라벨로만 답하세요.\n\
         가능한 라벨: weather_query, calendar_query, calendar_create, \
         file_search, notification_send, help, chat\n\n\
         예시:\n\
         - \"서울 날씨 어때?\" -> weather_query\n\
         - \"내일 일정 알려줘\" -> calendar_query\n\
         - \"3시에 회의 잡아줘\" -> calendar_create\n\
         - \"회의록 문서 찾아줘\" -> file_search\n\
         - \"팀에 슬랙으로 공지 보내줘\" -> notification_send\n\
         - \"뭐 할 수 있어?\" -> help\n\
         - \"RAG가 뭐야?\" -> chat\n\n\
         요청: {user_input}\n\
         라벨:"
    )
}

/// Keyword-lexicon classification for when the LLM is unavailable.
pub fn classify_keywords(user_input: &str) -> IntentAnalysis {
    let s = user_input.to_lowercase();

    if contains_any(&s, WEATHER_KEYWORDS) {
        IntentAnalysis::new(Intent::WeatherQuery, 0.7, "키워드 기반", user_input)
    } else if contains_any(&s, CALENDAR_KEYWORDS) {
        let intent = if contains_any(&s, CALENDAR_CREATE_KEYWORDS) {
            Intent::CalendarCreate
        } else {
            Intent::CalendarQuery
        };
        IntentAnalysis::new(intent, 0.7, "키워드 기반", user_input)
    } else if contains_any(&s, FILE_KEYWORDS) {
        IntentAnalysis::new(Intent::FileSearch, 0.7, "키워드 기반", user_input)
    } else if contains_any(&s, NOTIFY_KEYWORDS) {
        IntentAnalysis::new(Intent::NotificationSend, 0.7, "키워드 기반", user_input)
    } else if contains_any(&s, HELP_KEYWORDS) {
        IntentAnalysis::new(Intent::Help, 0.9, "키워드 기반", user_input)
    } else {
        IntentAnalysis::new(Intent::Chat, 0.6, "키워드 기반", user_input)
    }
}

/// A recipient+verb combination or any channel mention marks a
/// composite "…and notify" request on top of a tool intent.
fn wants_notification(s: &str) -> bool {
    let has_recipient = contains_any(s, NOTIFY_RECIPIENTS);
    let has_verb = contains_any(s, NOTIFY_VERBS);
    let has_channel = contains_any(s, NOTIFY_CHANNELS);
    (has_recipient && has_verb) || has_channel
}

fn apply_composite_detection(analysis: &mut IntentAnalysis, user_input: &str) {
    if !analysis.intent.is_tool_intent() {
        return;
    }
    let s = user_input.to_lowercase();
    if wants_notification(&s) && !analysis.apis.iter().any(|a| a == "notification") {
        analysis.apis.push("notification".into());
        analysis.parameters.insert("notify".into(), Value::Bool(true));
        analysis
            .parameters
            .insert("notify_recipient".into(), Value::String("team".into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_paths_cover_every_intent() {
        assert_eq!(classify_keywords("서울 날씨 어때?").intent, Intent::WeatherQuery);
        assert_eq!(classify_keywords("오늘 일정 알려줘").intent, Intent::CalendarQuery);
        assert_eq!(classify_keywords("3시에 회의 잡아줘").intent, Intent::CalendarCreate);
        assert_eq!(classify_keywords("회의록 문서 찾아줘").intent, Intent::FileSearch);
        assert_eq!(classify_keywords("슬랙으로 공지해줘").intent, Intent::NotificationSend);
        assert_eq!(classify_keywords("뭐 할 수 있어?").intent, Intent::Help);
        assert_eq!(classify_keywords("양자역학이 뭐야").intent, Intent::Chat);
    }

    #[test]
    fn fallback_confidence_stays_in_band() {
        for text in ["서울 날씨", "일정", "파일", "도움말", "아무말"] {
            let c = classify_keywords(text).confidence;
            assert!((0.6..=0.9).contains(&c), "confidence {c} out of band");
        }
    }

    #[test]
    fn composite_weather_plus_notify() {
        let mut analysis = classify_keywords("오늘 날씨를 팀한테 알려줘");
        apply_composite_detection(&mut analysis, "오늘 날씨를 팀한테 알려줘");
        assert_eq!(analysis.intent, Intent::WeatherQuery);
        assert_eq!(analysis.apis, vec!["weather", "notification"]);
        assert!(analysis.wants_notification());
    }

    #[test]
    fn channel_mention_alone_triggers_composite() {
        let mut analysis = classify_keywords("내일 일정 슬랙");
        apply_composite_detection(&mut analysis, "내일 일정 슬랙");
        assert!(analysis.apis.contains(&"notification".to_string()));
    }

    #[test]
    fn notification_intent_itself_is_not_composite() {
        let mut analysis = classify_keywords("팀에 알림 보내줘");
        apply_composite_detection(&mut analysis, "팀에 알림 보내줘");
        assert_eq!(analysis.intent, Intent::NotificationSend);
        assert_eq!(analysis.apis, vec!["notification"]);
        assert!(!analysis.wants_notification());
    }

    #[test]
    fn composite_detection_is_monotone_under_added_tokens() {
        let base = "오늘 날씨를 팀한테 알려줘";
        let mut detected = classify_keywords(base);
        apply_composite_detection(&mut detected, base);
        assert!(detected.wants_notification());

        // Appending arbitrary extra tokens never un-detects.
        for extra in ["그리고 고마워", "이메일로도", "지금 바로 부탁해"] {
            let longer = format!("{base} {extra}");
            let mut again = classify_keywords(&longer);
            apply_composite_detection(&mut again, &longer);
            assert!(again.wants_notification(), "lost detection for: {longer}");
        }
    }
}
