//! Intent taxonomy and the keyword lexicon shared by the classifier's
//! fallback path and the rule-based runtime branch.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Intent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    WeatherQuery,
    CalendarQuery,
    CalendarCreate,
    FileSearch,
    NotificationSend,
    Help,
    #[default]
    Chat,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::WeatherQuery,
        Intent::CalendarQuery,
        Intent::CalendarCreate,
        Intent::FileSearch,
        Intent::NotificationSend,
        Intent::Help,
        Intent::Chat,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Intent::WeatherQuery => "weather_query",
            Intent::CalendarQuery => "calendar_query",
            Intent::CalendarCreate => "calendar_create",
            Intent::FileSearch => "file_search",
            Intent::NotificationSend => "notification_send",
            Intent::Help => "help",
            Intent::Chat => "chat",
        }
    }

    /// The downstream API families this intent maps to. Deterministic:
    /// the classifier only ever appends `"notification"` for composite
    /// requests on top of this base set.
    pub fn apis(&self) -> &'static [&'static str] {
        match self {
            Intent::WeatherQuery => &["weather"],
            Intent::CalendarQuery | Intent::CalendarCreate => &["calendar"],
            Intent::FileSearch => &["file"],
            Intent::NotificationSend => &["notification"],
            Intent::Help => &[],
            Intent::Chat => &["rag"],
        }
    }

    /// Parse a classifier answer: exact label match first, then
    /// substring heuristics, then `chat`.
    pub fn parse_lenient(raw: &str) -> Intent {
        let s = raw.trim().to_lowercase();
        for intent in Intent::ALL {
            if s == intent.label() {
                return intent;
            }
        }
        for intent in Intent::ALL {
            if s.contains(intent.label()) {
                return intent;
            }
        }
        // Looser hints for free-form answers.
        if s.contains("weather") || s.contains("날씨") {
            Intent::WeatherQuery
        } else if s.contains("calendar") && (s.contains("create") || s.contains("생성")) {
            Intent::CalendarCreate
        } else if s.contains("calendar") || s.contains("일정") {
            Intent::CalendarQuery
        } else if s.contains("file") || s.contains("파일") {
            Intent::FileSearch
        } else if s.contains("notif") || s.contains("알림") {
            Intent::NotificationSend
        } else if s.contains("help") {
            Intent::Help
        } else {
            Intent::Chat
        }
    }

    /// Whether this intent triggers a tool (used for composite
    /// notification detection — `notification_send` itself is excluded).
    pub fn is_tool_intent(&self) -> bool {
        matches!(
            self,
            Intent::WeatherQuery
                | Intent::CalendarQuery
                | Intent::CalendarCreate
                | Intent::FileSearch
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Keyword lexicon (user-locale)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const WEATHER_KEYWORDS: &[&str] = &["날씨", "기온", "비", "눈", "우산"];
pub const CALENDAR_KEYWORDS: &[&str] = &["일정", "회의", "미팅", "스케줄"];
pub const CALENDAR_CREATE_KEYWORDS: &[&str] = &["잡아", "생성", "추가", "만들"];
pub const FILE_KEYWORDS: &[&str] = &["파일", "문서", "자료", "명세", "회의록"];
pub const NOTIFY_KEYWORDS: &[&str] = &[
    "알림", "공지", "보내", "전송", "슬랙", "이메일", "sms", "문자",
];
pub const HELP_KEYWORDS: &[&str] = &["도움말", "뭐 할 수", "할 수 있어"];

/// Composite-request detection sets: a recipient+verb combination or a
/// channel mention turns a tool query into "…and notify the team".
pub const NOTIFY_RECIPIENTS: &[&str] = &["팀", "팀원", "동료", "사람들", "전체", "전원", "모두"];
pub const NOTIFY_VERBS: &[&str] = &["알려", "공유", "전달", "공지", "알림", "보내", "전송"];
pub const NOTIFY_CHANNELS: &[&str] = &["슬랙", "slack", "이메일", "email", "sms", "문자", "메일"];

pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_serde() {
        for intent in Intent::ALL {
            let json = serde_json::to_string(&intent).unwrap();
            assert_eq!(json, format!("\"{}\"", intent.label()));
            let back: Intent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, intent);
        }
    }

    #[test]
    fn lenient_parse_exact_and_substring() {
        assert_eq!(Intent::parse_lenient("weather_query"), Intent::WeatherQuery);
        assert_eq!(
            Intent::parse_lenient("the intent is calendar_create."),
            Intent::CalendarCreate
        );
        assert_eq!(Intent::parse_lenient("알림을 보내세요"), Intent::NotificationSend);
        assert_eq!(Intent::parse_lenient("no idea"), Intent::Chat);
    }

    #[test]
    fn chat_maps_to_rag() {
        assert_eq!(Intent::Chat.apis(), &["rag"]);
        assert!(Intent::Help.apis().is_empty());
    }
}
