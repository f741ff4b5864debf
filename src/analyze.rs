//! Analysis generator.
//!
//! Turns a batch of content items into one [`AnalysisResult`]:
//!
//! 1. Every item is rendered as a labeled block and the blocks are joined
//!    into one text blob ([`combine_content`]).
//! 2. Four [`AnalysisKind`]s are requested concurrently from the completion
//!    gateway, each with the blob cut to `prompt_max_chars` characters.
//! 3. Structured kinds parse the reply as a JSON array. A reply that does
//!    not parse falls back to that kind's fixed list; a gateway failure has
//!    already been replaced with fallback text by
//!    [`complete_or_fallback`]. Nothing in this step can fail.
//! 4. The assembled result is written under `analysis:<id>`.

use chrono::{Local, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::extract::truncate_chars;
use crate::gateway::{complete_or_fallback, CompletionGateway};
use crate::models::{new_id, AnalysisResult, AnalysisSource, Insight, LearningStep, QaPair};
use crate::store::{analysis_key, put_json, KvStore};

/// Placeholder score; nothing measures confidence yet.
pub const PLACEHOLDER_CONFIDENCE: u8 = 85;

pub const RESULT_KIND: &str = "comprehensive";

pub const EMPTY_CONTENT_MESSAGE: &str = "No content provided for analysis";

/// The four sections of an analysis, each one gateway request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Summary,
    LearningPlan,
    Insights,
    Questions,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Summary,
        AnalysisKind::LearningPlan,
        AnalysisKind::Insights,
        AnalysisKind::Questions,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisKind::Summary => "summary",
            AnalysisKind::LearningPlan => "learning_plan",
            AnalysisKind::Insights => "insights",
            AnalysisKind::Questions => "questions",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AnalysisKind::Summary => "You are an expert content analyst. Create concise, informative summaries that capture the key points and main themes of the provided content. Focus on the most important information that a developer would need to know.",
            AnalysisKind::LearningPlan => "You are an expert learning designer. Create structured learning plans that help developers master the concepts in the provided content. Break down complex topics into manageable steps with estimated time commitments.",
            AnalysisKind::Insights => "You are an expert knowledge extractor. Identify the most valuable insights, patterns, and key takeaways from technical content. Focus on actionable insights that developers can apply immediately.",
            AnalysisKind::Questions => "You are an expert educator. Generate thoughtful questions and comprehensive answers that help reinforce understanding of the content. Focus on questions that test both conceptual understanding and practical application.",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            AnalysisKind::Summary => "Please provide a comprehensive summary of the following content:",
            AnalysisKind::LearningPlan => "Based on this content, create a structured learning plan with 4-6 steps. For each step, provide a title, description, and estimated duration. Format as JSON array with objects containing 'title', 'description', and 'duration' fields:",
            AnalysisKind::Insights => "Extract 4-6 key insights from this content. Format as JSON array with objects containing 'title' and 'description' fields:",
            AnalysisKind::Questions => "Generate 5-7 questions and answers based on this content. Format as JSON array with objects containing 'question' and 'answer' fields:",
        }
    }

    /// User prompt for this kind; `content` is cut to `max_chars` characters.
    pub fn user_prompt(&self, content: &str, max_chars: usize) -> String {
        format!(
            "{}\n\n{}",
            self.instruction(),
            truncate_chars(content, max_chars)
        )
    }
}

/// Outcome of reading a gateway reply as a JSON array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Structured<T> {
    Parsed(Vec<T>),
    /// The reply was not a JSON array of the expected objects.
    Fallback,
}

impl<T> Structured<T> {
    pub fn or_fallback(self, fallback: impl FnOnce() -> Vec<T>) -> Vec<T> {
        match self {
            Structured::Parsed(items) => items,
            Structured::Fallback => fallback(),
        }
    }
}

/// Attempts to read `reply` as a JSON array of `T`. Never fails.
///
/// Every element must deserialize as `T`; one off-type field rejects the
/// whole array.
pub fn parse_structured<T: DeserializeOwned>(reply: &str) -> Structured<T> {
    match serde_json::from_str::<Vec<T>>(reply) {
        Ok(items) => Structured::Parsed(items),
        Err(_) => Structured::Fallback,
    }
}

/// Renders every item as a labeled block and concatenates the blocks.
pub fn combine_content(items: &[AnalysisSource]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "Content Type: {}\nTitle: {}\n\nContent:\n{}\n\n---\n\n",
                item.kind.as_deref().unwrap_or_default(),
                item.label(),
                item.content.as_deref().unwrap_or_default()
            )
        })
        .collect()
}

async fn request_text(
    gateway: &dyn CompletionGateway,
    kind: AnalysisKind,
    content: &str,
    max_chars: usize,
) -> String {
    let prompt = kind.user_prompt(content, max_chars);
    complete_or_fallback(gateway, kind.system_prompt(), &prompt).await
}

async fn request_structured<T: DeserializeOwned>(
    gateway: &dyn CompletionGateway,
    kind: AnalysisKind,
    content: &str,
    max_chars: usize,
    fallback: fn() -> Vec<T>,
) -> Vec<T> {
    let reply = request_text(gateway, kind, content, max_chars).await;
    parse_structured(&reply).or_fallback(|| {
        debug!(kind = kind.name(), "reply was not a JSON array, using fallback");
        fallback()
    })
}

/// Runs the four analysis requests concurrently and assembles the result.
///
/// The requests are independent: a fallback in one leaves the others
/// untouched, and the function always returns a complete result.
pub async fn run_analysis(
    gateway: &dyn CompletionGateway,
    items: &[AnalysisSource],
    prompt_max_chars: usize,
) -> AnalysisResult {
    let combined = combine_content(items);
    let text = combined.as_str();

    let (summary, learning_plan, insights, questions) = tokio::join!(
        request_text(gateway, AnalysisKind::Summary, text, prompt_max_chars),
        request_structured(
            gateway,
            AnalysisKind::LearningPlan,
            text,
            prompt_max_chars,
            fallback_learning_plan,
        ),
        request_structured(
            gateway,
            AnalysisKind::Insights,
            text,
            prompt_max_chars,
            fallback_insights,
        ),
        request_structured(
            gateway,
            AnalysisKind::Questions,
            text,
            prompt_max_chars,
            fallback_questions,
        ),
    );

    let created_at = Utc::now();
    AnalysisResult {
        id: new_id(),
        title: format!(
            "Analysis Results - {}",
            created_at.with_timezone(&Local).format("%-m/%-d/%Y")
        ),
        created_at,
        source_name: items
            .iter()
            .map(|i| i.label())
            .collect::<Vec<_>>()
            .join(", "),
        confidence: PLACEHOLDER_CONFIDENCE,
        summary,
        learning_plan,
        insights,
        questions,
        kind: RESULT_KIND.to_string(),
    }
}

/// Validates the batch, runs the analysis and persists the result.
pub async fn analyze_and_store(
    store: &dyn KvStore,
    gateway: &dyn CompletionGateway,
    config: &Config,
    items: Option<Vec<AnalysisSource>>,
) -> AppResult<AnalysisResult> {
    let items = match items {
        Some(items) if !items.is_empty() => items,
        _ => return Err(AppError::invalid(EMPTY_CONTENT_MESSAGE)),
    };

    let result = run_analysis(gateway, &items, config.extraction.prompt_max_chars).await;

    put_json(
        store,
        &analysis_key(&result.id),
        &result,
        config.retention.analysis_ttl(),
    )
    .await?;

    info!(id = %result.id, sources = items.len(), "analysis stored");
    Ok(result)
}

// ============ Fallback content ============

fn step(title: &str, description: &str, duration: &str) -> LearningStep {
    LearningStep {
        title: title.to_string(),
        description: description.to_string(),
        duration: duration.to_string(),
    }
}

fn insight(title: &str, description: &str) -> Insight {
    Insight {
        title: title.to_string(),
        description: description.to_string(),
    }
}

fn qa(question: &str, answer: &str) -> QaPair {
    QaPair {
        question: question.to_string(),
        answer: answer.to_string(),
    }
}

pub fn fallback_learning_plan() -> Vec<LearningStep> {
    vec![
        step(
            "Foundation Review",
            "Review the basic concepts and terminology covered in the content",
            "30 minutes",
        ),
        step(
            "Deep Dive Study",
            "Study the main topics in detail with additional research",
            "2 hours",
        ),
        step(
            "Practical Application",
            "Apply the concepts through hands-on exercises or projects",
            "3 hours",
        ),
        step(
            "Knowledge Validation",
            "Test your understanding through quizzes or peer discussions",
            "45 minutes",
        ),
    ]
}

pub fn fallback_insights() -> Vec<Insight> {
    vec![
        insight(
            "Key Concept Identified",
            "The content covers important foundational concepts that are essential for understanding the topic",
        ),
        insight(
            "Practical Applications",
            "Several real-world applications and use cases are presented that demonstrate practical value",
        ),
        insight(
            "Best Practices",
            "The material includes recommended approaches and best practices from industry experts",
        ),
    ]
}

pub fn fallback_questions() -> Vec<QaPair> {
    vec![
        qa(
            "What are the main concepts covered in this content?",
            "The content covers several key concepts that are fundamental to understanding the topic area.",
        ),
        qa(
            "How can these concepts be applied in practice?",
            "These concepts can be applied through hands-on projects and real-world implementations.",
        ),
        qa(
            "What are the key takeaways for developers?",
            "Developers should focus on understanding the core principles and how they apply to their specific use cases.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, NOT_CONFIGURED_TEXT, UNAVAILABLE_TEXT};
    use crate::store::InMemoryKvStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers by matching the system prompt against each kind.
    struct ScriptedGateway {
        summary: Result<String, u16>,
        learning_plan: Result<String, u16>,
        insights: Result<String, u16>,
        questions: Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        fn all(reply: &str) -> Self {
            Self {
                summary: Ok(reply.to_string()),
                learning_plan: Ok(reply.to_string()),
                insights: Ok(reply.to_string()),
                questions: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionGateway for ScriptedGateway {
        async fn complete(&self, system: &str, prompt: &str) -> Result<String, GatewayError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let scripted = if system == AnalysisKind::Summary.system_prompt() {
                &self.summary
            } else if system == AnalysisKind::LearningPlan.system_prompt() {
                &self.learning_plan
            } else if system == AnalysisKind::Insights.system_prompt() {
                &self.insights
            } else {
                &self.questions
            };
            scripted.clone().map_err(GatewayError::Status)
        }
    }

    struct UnconfiguredGateway;

    #[async_trait]
    impl CompletionGateway for UnconfiguredGateway {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, GatewayError> {
            Err(GatewayError::NotConfigured)
        }
    }

    fn source(kind: &str, name: &str, content: &str) -> AnalysisSource {
        AnalysisSource {
            kind: Some(kind.to_string()),
            name: Some(name.to_string()),
            title: None,
            content: Some(content.to_string()),
        }
    }

    #[test]
    fn combined_blocks_are_labeled_and_delimited() {
        let combined = combine_content(&[
            source("file", "a.md", "alpha"),
            source("url", "Page", "beta"),
        ]);
        assert_eq!(
            combined,
            "Content Type: file\nTitle: a.md\n\nContent:\nalpha\n\n---\n\n\
             Content Type: url\nTitle: Page\n\nContent:\nbeta\n\n---\n\n"
        );
    }

    #[test]
    fn structured_parse_accepts_arrays_only() {
        let parsed: Structured<Insight> =
            parse_structured(r#"[{"title": "T", "description": "D"}]"#);
        assert_eq!(parsed, Structured::Parsed(vec![insight("T", "D")]));

        let object: Structured<Insight> = parse_structured(r#"{"title": "T"}"#);
        assert_eq!(object, Structured::Fallback);

        let prose: Structured<Insight> = parse_structured("Here are some insights: ...");
        assert_eq!(prose, Structured::Fallback);
    }

    #[test]
    fn off_type_fields_fall_back() {
        let numeric_duration: Structured<LearningStep> =
            parse_structured(r#"[{"title": "Read", "description": "D", "duration": 30}]"#);
        assert_eq!(numeric_duration, Structured::Fallback);

        // Missing fields default to empty strings
        let partial: Structured<LearningStep> = parse_structured(r#"[{"title": "Read"}]"#);
        assert_eq!(partial, Structured::Parsed(vec![step("Read", "", "")]));
    }

    #[test]
    fn kinds_have_distinct_system_prompts() {
        let prompts: std::collections::HashSet<&str> =
            AnalysisKind::ALL.iter().map(|k| k.system_prompt()).collect();
        assert_eq!(prompts.len(), AnalysisKind::ALL.len());
    }

    #[test]
    fn user_prompt_truncates_content() {
        let content = "x".repeat(10_000);
        let prompt = AnalysisKind::Summary.user_prompt(&content, 4000);
        assert!(prompt.starts_with("Please provide a comprehensive summary"));
        assert_eq!(prompt.matches('x').count(), 4000);
    }

    #[tokio::test]
    async fn unconfigured_gateway_yields_full_fallback_result() {
        let items = vec![source("text", "Text Input", "hello")];
        let result = run_analysis(&UnconfiguredGateway, &items, 4000).await;

        assert_eq!(result.summary, NOT_CONFIGURED_TEXT);
        assert_eq!(result.learning_plan, fallback_learning_plan());
        let titles: Vec<&str> = result.learning_plan.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Foundation Review",
                "Deep Dive Study",
                "Practical Application",
                "Knowledge Validation"
            ]
        );
        assert_eq!(result.insights.len(), 3);
        assert_eq!(result.insights[2].title, "Best Practices");
        assert_eq!(result.questions.len(), 3);
        assert_eq!(
            result.questions[0].question,
            "What are the main concepts covered in this content?"
        );
        assert_eq!(result.confidence, 85);
        assert_eq!(result.kind, "comprehensive");
        assert!(result.title.starts_with("Analysis Results - "));
    }

    #[tokio::test]
    async fn sections_fall_back_independently() {
        let gateway = ScriptedGateway {
            summary: Err(503),
            learning_plan: Ok(
                r#"[{"title": "Read", "description": "Read it", "duration": "1 hour"}]"#.into(),
            ),
            insights: Ok("not json".into()),
            questions: Ok(r#"[{"question": "Why?", "answer": "Because."}]"#.into()),
            prompts: Mutex::new(Vec::new()),
        };
        let items = vec![source("file", "a.md", "alpha"), source("url", "b", "beta")];
        let result = run_analysis(&gateway, &items, 4000).await;

        assert_eq!(result.summary, UNAVAILABLE_TEXT);
        assert_eq!(result.learning_plan, vec![step("Read", "Read it", "1 hour")]);
        assert_eq!(result.insights, fallback_insights());
        assert_eq!(result.questions, vec![qa("Why?", "Because.")]);
        assert_eq!(result.source_name, "a.md, b");
        assert_eq!(gateway.prompts.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn every_prompt_is_capped() {
        let gateway = ScriptedGateway::all("summary text");
        let items = vec![source("text", "big", &"y".repeat(9000))];
        run_analysis(&gateway, &items, 4000).await;

        for prompt in gateway.prompts.lock().unwrap().iter() {
            assert!(prompt.matches('y').count() <= 4000);
        }
    }

    #[tokio::test]
    async fn empty_or_missing_content_is_rejected() {
        let store = InMemoryKvStore::new();
        let config = Config::minimal();

        for items in [None, Some(Vec::new())] {
            let err = analyze_and_store(&store, &UnconfiguredGateway, &config, items)
                .await
                .unwrap_err();
            assert!(err.is_client_error());
            assert_eq!(err.to_string(), EMPTY_CONTENT_MESSAGE);
        }
    }

    #[tokio::test]
    async fn result_is_persisted_under_analysis_key() {
        let store = InMemoryKvStore::new();
        let config = Config::minimal();
        let items = Some(vec![source("text", "Text Input", "hello")]);

        let result = analyze_and_store(&store, &UnconfiguredGateway, &config, items)
            .await
            .unwrap();

        let raw = store.get(&analysis_key(&result.id)).await.unwrap().unwrap();
        let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored["id"], result.id.as_str());
        assert_eq!(stored["sourceName"], "Text Input");
        assert_eq!(stored["learningPlan"].as_array().unwrap().len(), 4);
        assert_eq!(stored["type"], "comprehensive");
    }
}
