//! Typed AI requests and responses
//!
//! Every use case has its own payload shape. Requests are validated before
//! routing so malformed input never reaches a provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content difficulty level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// Shape of generated learning content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    #[default]
    Lesson,
    Summary,
    Explanation,
    Example,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentGenerationRequest {
    pub topic: String,
    #[serde(default)]
    pub format: ContentFormat,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_words: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuizGenerationRequest {
    pub topic: String,
    #[serde(default = "default_question_count")]
    pub question_count: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_material: Option<String>,
}

const fn default_question_count() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MathematicsRequest {
    pub problem: String,
    #[serde(default = "default_true")]
    pub show_steps: bool,
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KnowledgeCompressionRequest {
    pub content: String,
    /// Target output length as a fraction of the input
    #[serde(default = "default_target_ratio")]
    pub target_ratio: f64,
    #[serde(default)]
    pub preserve_terms: Vec<String>,
}

const fn default_target_ratio() -> f64 {
    0.3
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentModerationRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CognitiveLoadAssessmentRequest {
    pub learner_id: String,
    pub task_description: String,
    /// Time taken per step of the task
    #[serde(default)]
    pub response_times_ms: Vec<u64>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub hint_requests: u32,
}

/// A learner as seen by peer matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LearnerProfile {
    pub id: String,
    /// Skill name to proficiency in `[0, 1]`
    #[serde(default)]
    pub skills: BTreeMap<String, f64>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerMatchingRequest {
    pub learner: LearnerProfile,
    pub candidates: Vec<LearnerProfile>,
    #[serde(default = "default_group_size")]
    pub group_size: u32,
}

const fn default_group_size() -> u32 {
    2
}

/// One graded attempt at a skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttemptRecord {
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasteryAssessmentRequest {
    pub learner_id: String,
    pub skill: String,
    pub attempts: Vec<AttemptRecord>,
}

/// A request for one AI use case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "use_case", rename_all = "snake_case")]
pub enum AiRequest {
    ContentGeneration(ContentGenerationRequest),
    QuizGeneration(QuizGenerationRequest),
    Mathematics(MathematicsRequest),
    KnowledgeCompression(KnowledgeCompressionRequest),
    ContentModeration(ContentModerationRequest),
    CognitiveLoadAssessment(CognitiveLoadAssessmentRequest),
    PeerMatching(PeerMatchingRequest),
    MasteryAssessment(MasteryAssessmentRequest),
}

/// Payload shape violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Longest accepted free-text field
const MAX_TEXT_CHARS: usize = 100_000;

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if value.chars().count() > MAX_TEXT_CHARS {
        return Err(ValidationError::new(
            field,
            format!("must be at most {MAX_TEXT_CHARS} characters"),
        ));
    }
    Ok(())
}

fn require_range<T: PartialOrd + std::fmt::Display>(
    field: &'static str,
    value: T,
    min: T,
    max: T,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::new(field, format!("must be between {min} and {max}")));
    }
    Ok(())
}

/// System and user prompt sent to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl AiRequest {
    /// Use case identifier matching model capability tags
    pub const fn use_case(&self) -> &'static str {
        match self {
            Self::ContentGeneration(_) => "content_generation",
            Self::QuizGeneration(_) => "quiz_generation",
            Self::Mathematics(_) => "mathematics",
            Self::KnowledgeCompression(_) => "knowledge_compression",
            Self::ContentModeration(_) => "content_moderation",
            Self::CognitiveLoadAssessment(_) => "cognitive_load_assessment",
            Self::PeerMatching(_) => "peer_matching",
            Self::MasteryAssessment(_) => "mastery_assessment",
        }
    }

    /// Check the payload shape
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::ContentGeneration(r) => {
                require_text("topic", &r.topic)?;
                if let Some(words) = r.max_words {
                    require_range("max_words", words, 50, 10_000)?;
                }
            }
            Self::QuizGeneration(r) => {
                require_text("topic", &r.topic)?;
                require_range("question_count", r.question_count, 1, 50)?;
            }
            Self::Mathematics(r) => require_text("problem", &r.problem)?,
            Self::KnowledgeCompression(r) => {
                require_text("content", &r.content)?;
                if r.target_ratio.is_nan() || r.target_ratio <= 0.0 || r.target_ratio >= 1.0 {
                    return Err(ValidationError::new("target_ratio", "must be between 0 and 1 (exclusive)"));
                }
            }
            Self::ContentModeration(r) => require_text("content", &r.content)?,
            Self::CognitiveLoadAssessment(r) => {
                require_text("learner_id", &r.learner_id)?;
                require_text("task_description", &r.task_description)?;
            }
            Self::PeerMatching(r) => {
                require_text("learner.id", &r.learner.id)?;
                if r.candidates.is_empty() {
                    return Err(ValidationError::new("candidates", "must not be empty"));
                }
                if r.candidates.iter().any(|c| c.id == r.learner.id) {
                    return Err(ValidationError::new("candidates", "must not include the learner"));
                }
                let max_group = u32::try_from(r.candidates.len()).unwrap_or(u32::MAX).saturating_add(1);
                require_range("group_size", r.group_size, 2, max_group)?;
                let skills = std::iter::once(&r.learner)
                    .chain(&r.candidates)
                    .flat_map(|p| p.skills.values());
                for &level in skills {
                    require_range("skills", level, 0.0, 1.0)?;
                }
            }
            Self::MasteryAssessment(r) => {
                require_text("learner_id", &r.learner_id)?;
                require_text("skill", &r.skill)?;
                if r.attempts.is_empty() {
                    return Err(ValidationError::new("attempts", "must not be empty"));
                }
            }
        }
        Ok(())
    }

    /// Sampling temperature suited to the use case
    pub const fn temperature(&self) -> f64 {
        match self {
            Self::ContentGeneration(_) => 0.7,
            Self::QuizGeneration(_) => 0.5,
            Self::KnowledgeCompression(_) | Self::PeerMatching(_) => 0.2,
            Self::CognitiveLoadAssessment(_) | Self::MasteryAssessment(_) => 0.1,
            Self::Mathematics(_) | Self::ContentModeration(_) => 0.0,
        }
    }

    /// Output token budget
    pub const fn max_tokens(&self) -> u32 {
        match self {
            Self::ContentGeneration(_) | Self::QuizGeneration(_) => 4096,
            Self::KnowledgeCompression(_) | Self::Mathematics(_) => 2048,
            Self::ContentModeration(_)
            | Self::CognitiveLoadAssessment(_)
            | Self::PeerMatching(_)
            | Self::MasteryAssessment(_) => 1024,
        }
    }

    /// Whether the model must answer with a JSON object
    pub const fn expects_json(&self) -> bool {
        !matches!(self, Self::ContentGeneration(_))
    }

    /// Whether identical requests may share a cached response
    pub fn is_cacheable(&self) -> bool {
        self.temperature() <= 0.2
    }

    /// Render the prompt sent to the model
    pub fn prompt(&self) -> Prompt {
        let (role, instructions) = match self {
            Self::ContentGeneration(_) => (
                "You are an expert instructional designer.",
                "Write learning content for the request below. Match the requested format, difficulty and \
                 audience. Respond with the content only.",
            ),
            Self::QuizGeneration(_) => (
                "You are an assessment author.",
                "Create a quiz for the request below. Respond with a JSON object \
                 {\"questions\": [{\"question\", \"options\", \"answer\", \"explanation\"}]}.",
            ),
            Self::Mathematics(_) => (
                "You are a careful mathematics tutor.",
                "Solve the problem below. Respond with a JSON object {\"answer\", \"steps\": [..]}; leave \
                 steps empty when show_steps is false.",
            ),
            Self::KnowledgeCompression(_) => (
                "You condense study material without losing meaning.",
                "Compress the content below to roughly target_ratio of its length, keeping every term in \
                 preserve_terms. Respond with a JSON object {\"compressed\", \"key_points\": [..]}.",
            ),
            Self::ContentModeration(_) => (
                "You are a content safety reviewer for a learning platform used by students.",
                "Classify the content below. Respond with a JSON object {\"safe\": bool, \"categories\": [..], \
                 \"severity\": \"none\"|\"low\"|\"medium\"|\"high\", \"reason\"}.",
            ),
            Self::CognitiveLoadAssessment(_) => (
                "You assess learner cognitive load from interaction signals.",
                "Estimate the learner's cognitive load for the task below. Respond with a JSON object \
                 {\"load\": number between 0 and 1, \"level\": \"low\"|\"optimal\"|\"high\", \"recommendations\": [..]}.",
            ),
            Self::PeerMatching(_) => (
                "You form study groups with complementary skills.",
                "Pick the best peers for the learner below from the candidates. Respond with a JSON object \
                 {\"matches\": [{\"id\", \"score\", \"reason\"}]} holding group_size - 1 entries.",
            ),
            Self::MasteryAssessment(_) => (
                "You evaluate skill mastery from graded attempts.",
                "Assess the learner's mastery of the skill below. Respond with a JSON object \
                 {\"mastery\": number between 0 and 1, \"level\", \"next_steps\": [..]}.",
            ),
        };

        let payload = serde_json::to_string_pretty(self).unwrap_or_default();

        Prompt {
            system: role.to_owned(),
            user: format!("{instructions}\n\nRequest:\n{payload}"),
        }
    }
}

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Raw provider answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

/// Answer returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiResponse {
    /// Model that produced the answer
    pub model_id: String,
    pub use_case: String,
    /// Raw text returned by the model
    pub content: String,
    /// Parsed JSON body for structured use cases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> AiRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn deserializes_tagged_payloads() {
        let request = parse(json!({
            "use_case": "quiz_generation",
            "topic": "photosynthesis",
            "question_count": 3,
        }));

        assert_eq!(request.use_case(), "quiz_generation");
        let AiRequest::QuizGeneration(quiz) = &request else {
            panic!("wrong variant: {request:?}");
        };
        assert_eq!(quiz.question_count, 3);
        assert_eq!(quiz.difficulty, Difficulty::Intermediate);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_use_case_and_fields() {
        assert!(serde_json::from_value::<AiRequest>(json!({"use_case": "astrology", "topic": "x"})).is_err());
        assert!(
            serde_json::from_value::<AiRequest>(json!({"use_case": "mathematics", "problem": "1+1", "extra": 1}))
                .is_err()
        );
    }

    #[test]
    fn validation_catches_bad_shapes() {
        let empty_topic = parse(json!({"use_case": "content_generation", "topic": "  "}));
        assert_eq!(empty_topic.validate().unwrap_err().field, "topic");

        let too_many = parse(json!({"use_case": "quiz_generation", "topic": "t", "question_count": 0}));
        assert_eq!(too_many.validate().unwrap_err().field, "question_count");

        let ratio = parse(json!({"use_case": "knowledge_compression", "content": "text", "target_ratio": 1.5}));
        assert_eq!(ratio.validate().unwrap_err().field, "target_ratio");

        let no_attempts = parse(json!({
            "use_case": "mastery_assessment",
            "learner_id": "l1",
            "skill": "fractions",
            "attempts": [],
        }));
        assert_eq!(no_attempts.validate().unwrap_err().field, "attempts");
    }

    #[test]
    fn peer_matching_validation() {
        let request = parse(json!({
            "use_case": "peer_matching",
            "learner": {"id": "a", "skills": {"algebra": 0.4}},
            "candidates": [{"id": "b", "skills": {"algebra": 0.9}}, {"id": "c"}],
            "group_size": 3,
        }));
        assert!(request.validate().is_ok());

        let self_match = parse(json!({
            "use_case": "peer_matching",
            "learner": {"id": "a"},
            "candidates": [{"id": "a"}],
        }));
        assert_eq!(self_match.validate().unwrap_err().message, "must not include the learner");

        let oversized = parse(json!({
            "use_case": "peer_matching",
            "learner": {"id": "a"},
            "candidates": [{"id": "b"}],
            "group_size": 4,
        }));
        assert_eq!(oversized.validate().unwrap_err().field, "group_size");

        let bad_skill = parse(json!({
            "use_case": "peer_matching",
            "learner": {"id": "a", "skills": {"algebra": 3.0}},
            "candidates": [{"id": "b"}],
        }));
        assert_eq!(bad_skill.validate().unwrap_err().field, "skills");
    }

    #[test]
    fn deterministic_use_cases_are_cacheable() {
        let moderation = parse(json!({"use_case": "content_moderation", "content": "hello"}));
        let content = parse(json!({"use_case": "content_generation", "topic": "volcanoes"}));

        assert!(moderation.is_cacheable());
        assert!(moderation.expects_json());
        assert!(!content.is_cacheable());
        assert!(!content.expects_json());
    }

    #[test]
    fn prompt_embeds_payload() {
        let request = parse(json!({"use_case": "mathematics", "problem": "integrate x^2"}));
        let prompt = request.prompt();

        assert!(prompt.system.contains("mathematics"));
        assert!(prompt.user.contains("integrate x^2"));
        assert!(prompt.user.contains("\"use_case\": \"mathematics\""));
    }
}
