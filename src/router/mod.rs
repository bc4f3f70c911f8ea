//! Intent router
//!
//! Ordered keyword rules decide most requests; the rest get one gateway call
//! that picks a label from a fixed vocabulary. Classification never fails:
//! a gateway error or an unrecognizable reply degrades to casual chat.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::agent::prompts::{classification_prompt, CLASSIFIER_SYSTEM_PROMPT};
use crate::config::{DegradationPolicy, FlowConfig};
use crate::core::Message;
use crate::gateway::LlmGateway;

const PLANNING_WORDS: &[&str] = &[
    "规划", "计划", "行程", "安排", "天游", "日游", "攻略", "plan", "planning", "itinerary",
    "itineraries",
];

const SEARCH_VERBS: &[&str] = &[
    "查", "搜", "找", "订", "预订", "多少钱", "推荐", "search", "find", "book", "check",
    "recommend", "look up", "how much",
];

const DOMAIN_NOUNS: &[&str] = &[
    "机票", "航班", "酒店", "住宿", "民宿", "路线", "交通", "地铁", "高铁", "火车", "天气",
    "景点", "门票", "flight", "hotel", "route", "train", "weather", "ticket", "fare",
    "attraction",
];

const GREETINGS: &[&str] = &[
    "你好", "您好", "嗨", "哈喽", "早上好", "晚上好", "谢谢", "再见", "hi", "hello", "hey",
    "thanks", "thank", "bye", "goodbye", "morning",
];

/// What the user wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ComplexPlanning,
    SingleQuery,
    CasualChat,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ComplexPlanning => "complex_planning",
            Intent::SingleQuery => "single_query",
            Intent::CasualChat => "casual_chat",
        }
    }

    /// Find a label in a model reply
    pub fn parse_label(reply: &str) -> Option<Intent> {
        let normalized = reply.trim().to_lowercase().replace(['-', ' '], "_");
        [Intent::ComplexPlanning, Intent::SingleQuery, Intent::CasualChat]
            .into_iter()
            .find(|intent| normalized.contains(intent.as_str()))
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage decided the intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationSource {
    Rule,
    Model,
    Fallback(String),
}

impl std::fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassificationSource::Rule => f.write_str("rule"),
            ClassificationSource::Model => f.write_str("model"),
            ClassificationSource::Fallback(reason) => write!(f, "fallback: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub source: ClassificationSource,
}

impl Classification {
    fn rule(intent: Intent) -> Self {
        Classification {
            intent,
            source: ClassificationSource::Rule,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ClassificationSource::Fallback(_))
    }
}

/// Classifies requests into one of three intents
#[derive(Debug, Clone)]
pub struct IntentRouter {
    gateway: Arc<LlmGateway>,
    short_input_chars: usize,
    degradation: DegradationPolicy,
}

impl IntentRouter {
    pub fn new(gateway: Arc<LlmGateway>, config: &FlowConfig) -> Self {
        IntentRouter {
            gateway,
            short_input_chars: config.short_input_chars,
            degradation: config.degradation,
        }
    }

    /// Apply the keyword rules in order; `None` when no rule fires
    pub fn classify_by_rules(&self, text: &str) -> Option<Intent> {
        let text = text.trim();
        let lowered = text.to_lowercase();

        if mentions(&lowered, PLANNING_WORDS) {
            return Some(Intent::ComplexPlanning);
        }
        if mentions(&lowered, SEARCH_VERBS) && mentions(&lowered, DOMAIN_NOUNS) {
            return Some(Intent::SingleQuery);
        }
        if mentions(&lowered, GREETINGS) || text.chars().count() <= self.short_input_chars {
            return Some(Intent::CasualChat);
        }
        None
    }

    /// Classify a request, asking the model only when no rule fires
    pub async fn classify(&self, text: &str) -> Classification {
        if let Some(intent) = self.classify_by_rules(text) {
            debug!(intent = %intent, "Intent decided by rule");
            return Classification::rule(intent);
        }

        let prompt = match classification_prompt(text) {
            Ok(prompt) => prompt,
            Err(e) => return self.fallback(format!("prompt rendering failed: {}", e)),
        };
        let messages = [Message::system(CLASSIFIER_SYSTEM_PROMPT), Message::user(prompt)];

        match self.gateway.chat(&messages).await {
            Ok(reply) => match Intent::parse_label(&reply) {
                Some(intent) => {
                    info!(intent = %intent, "Intent decided by model");
                    Classification {
                        intent,
                        source: ClassificationSource::Model,
                    }
                }
                None => self.fallback(format!("unrecognized label: {}", reply.trim())),
            },
            Err(e) => self.fallback(format!("classifier call failed: {}", e)),
        }
    }

    fn fallback(&self, reason: String) -> Classification {
        match self.degradation {
            DegradationPolicy::Silent => {
                debug!(reason = %reason, "Intent defaulted to casual chat")
            }
            DegradationPolicy::Surface => {
                warn!(reason = %reason, "Intent defaulted to casual chat")
            }
        }
        Classification {
            intent: Intent::CasualChat,
            source: ClassificationSource::Fallback(reason),
        }
    }
}

/// ASCII keywords match whole words (or whole phrases); others match substrings
fn mentions(lowered: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| {
        if !keyword.is_ascii() {
            return lowered.contains(keyword);
        }
        lowered.match_indices(keyword).any(|(start, _)| {
            let end = start + keyword.len();
            let before = lowered[..start].chars().next_back();
            let after = lowered[end..].chars().next();
            let is_word = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
            !is_word(before) && !is_word(after)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::testing::{gateway_over, text_reply, ScriptedTransport};

    fn router_over(transport: Arc<ScriptedTransport>) -> IntentRouter {
        IntentRouter::new(gateway_over(transport), &FlowConfig::default())
    }

    #[test]
    fn test_rules() {
        let router = router_over(Arc::new(ScriptedTransport::default()));

        let cases = [
            ("帮我规划北京三天游，预算5000", Some(Intent::ComplexPlanning)),
            ("Plan a 3-day trip to Kyoto", Some(Intent::ComplexPlanning)),
            ("查一下上海到北京的机票", Some(Intent::SingleQuery)),
            ("find me a hotel near the Louvre", Some(Intent::SingleQuery)),
            ("你好呀，最近怎么样", Some(Intent::CasualChat)),
            ("Hey there, how are you doing?", Some(Intent::CasualChat)),
            ("ok", Some(Intent::CasualChat)),
            ("What is the capital of Australia?", None),
        ];
        for (text, expected) in cases {
            assert_eq!(router.classify_by_rules(text), expected, "{}", text);
        }
    }

    #[test]
    fn test_english_keywords_match_whole_words() {
        assert!(mentions("plan a trip", PLANNING_WORDS));
        assert!(!mentions("which airplane is the biggest", PLANNING_WORDS));
        assert!(!mentions("that's a shining example", GREETINGS));
        assert!(mentions("how much is it", SEARCH_VERBS));
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(Intent::parse_label("single_query"), Some(Intent::SingleQuery));
        assert_eq!(Intent::parse_label("Label: Complex-Planning"), Some(Intent::ComplexPlanning));
        assert_eq!(Intent::parse_label(" casual chat\n"), Some(Intent::CasualChat));
        assert_eq!(Intent::parse_label("no idea"), None);
    }

    #[tokio::test]
    async fn test_rule_hit_skips_gateway() {
        let transport = Arc::new(ScriptedTransport::default());
        let router = router_over(transport.clone());

        let classification = router.classify("帮我规划北京三天游，预算5000").await;

        assert_eq!(classification, Classification::rule(Intent::ComplexPlanning));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_decides_when_no_rule_fires() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(text_reply("single_query"))]));
        let router = router_over(transport.clone());

        let classification = router.classify("What is the capital of Australia?").await;

        assert_eq!(classification.intent, Intent::SingleQuery);
        assert_eq!(classification.source, ClassificationSource::Model);
        let request = &transport.requests()[0];
        assert_eq!(request.messages[0].content.as_deref(), Some(CLASSIFIER_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_unrecognized_reply_degrades_to_casual_chat() {
        let reply = text_reply("I think it's a question");
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(reply)]));
        let router = router_over(transport);

        let classification = router.classify("What is the capital of Australia?").await;

        assert_eq!(classification.intent, Intent::CasualChat);
        assert!(classification.is_fallback());
    }

    #[tokio::test]
    async fn test_gateway_failure_degrades_to_casual_chat() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(GatewayError::Http {
            status: 401,
            body: "unauthorized".into(),
        })]));
        let router = router_over(transport);

        let classification = router.classify("What is the capital of Australia?").await;

        assert_eq!(classification.intent, Intent::CasualChat);
        match classification.source {
            ClassificationSource::Fallback(reason) => assert!(reason.contains("401")),
            other => panic!("expected fallback, got {:?}", other),
        }
    }
}
