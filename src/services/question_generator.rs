//! AI-backed content for the daily and weekly emails, always falling back to canned content.

use futures::future::BoxFuture;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::dao::models::Difficulty;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Multiple-choice question produced by a generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u8,
    pub difficulty: Difficulty,
    pub topic: String,
    pub explanation: String,
}

/// Headline shown in the weekly digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub summary: String,
    pub url: String,
}

/// Link attached to the concept of the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnMoreLink {
    pub text: String,
    pub url: String,
}

/// "Concept of the week" section of the weekly digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MathConcept {
    pub title: String,
    pub description: String,
    pub learn_more_links: Vec<LearnMoreLink>,
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("content provider unreachable")]
    Transport(#[from] reqwest::Error),
    #[error("content provider returned no content")]
    EmptyContent,
    #[error("generated content is not valid JSON")]
    Malformed(#[from] serde_json::Error),
    #[error("generated content is invalid: {0}")]
    Invalid(&'static str),
}

/// Source of generated email content. Implementations never fail: they substitute canned content.
pub trait ContentGenerator: Send + Sync {
    fn generate_question(
        &self,
        difficulty: Difficulty,
        topics: &[&str],
    ) -> BoxFuture<'static, GeneratedQuestion>;
    fn top_news(&self) -> BoxFuture<'static, Vec<NewsItem>>;
    fn math_concept(&self) -> BoxFuture<'static, MathConcept>;
}

/// Question served whenever generation fails.
pub fn fallback_question(difficulty: Difficulty, topic: &str) -> GeneratedQuestion {
    GeneratedQuestion {
        question: "What is 5 + 3?".into(),
        options: vec!["6".into(), "7".into(), "8".into(), "9".into()],
        correct_answer: 2,
        difficulty,
        topic: topic.to_owned(),
        explanation: "The answer of 5 + 3 is 8.".into(),
    }
}

pub fn fallback_news() -> Vec<NewsItem> {
    vec![
        NewsItem {
            title: "Google DeepMind & OpenAI AI Models Win Gold at IMO".into(),
            summary: "For the first time, AI systems achieved gold-medal-level performance at the International Mathematical Olympiad by solving five of six problems in natural language under competition conditions.".into(),
            url: "https://www.reuters.com/world/asia-pacific/google-openais-ai-models-win-milestone-gold-global-math-competition-2025-07-21/".into(),
        },
        NewsItem {
            title: "Human Students Outscore AI at IMO Despite AI Gold-Level Results".into(),
            summary: "Even though top AI models reached gold medal scores at IMO, 26 human contestants still scored higher.".into(),
            url: "https://www.wsj.com/tech/ai/imo-gold-math-olympiad-google-deepmind-openai-2450095e".into(),
        },
        NewsItem {
            title: "OpenAI: No Fundamental Barrier to AI Matching Expert Mathematicians".into(),
            summary: "Recent breakthroughs suggest AI may eventually rival expert mathematicians in reasoning, with human oversight and creativity remaining essential.".into(),
            url: "https://timesofindia.indiatimes.com/education/news/could-ai-replace-expert-mathematicians-here-is-what-openais-noam-brown-says/articleshow/123043018.cms".into(),
        },
    ]
}

pub fn fallback_math_concept() -> MathConcept {
    MathConcept {
        title: "Modular Arithmetic (≡ Modulo)".into(),
        description: "Modular arithmetic is a system of arithmetic for integers, where numbers wrap around after reaching a certain value called the modulus. It's written as a ≡ b (mod m), meaning that a and b leave the same remainder when divided by m. It is the backbone of cryptography and clock arithmetic: 15 o'clock is 3 PM because 15 ≡ 3 (mod 12).".into(),
        learn_more_links: vec![
            LearnMoreLink {
                text: "Introduction to Modular Arithmetic".into(),
                url: "https://artofproblemsolving.com/wiki/index.php/Modular_arithmetic/Introduction".into(),
            },
            LearnMoreLink {
                text: "Modular Arithmetic in Cryptography".into(),
                url: "https://en.wikipedia.org/wiki/Modular_arithmetic".into(),
            },
            LearnMoreLink {
                text: "How Clocks Use Modular Arithmetic".into(),
                url: "https://openstax.org/books/contemporary-mathematics/pages/3-7-clock-arithmetic".into(),
            },
        ],
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default)]
    question: String,
    #[serde(default)]
    options: Vec<String>,
    correct_answer: Option<i64>,
    #[serde(default)]
    explanation: String,
}

/// Validate a generated question payload.
pub fn parse_generated_question(
    content: &str,
    difficulty: Difficulty,
    topic: &str,
) -> Result<GeneratedQuestion, GeneratorError> {
    let raw: RawQuestion = serde_json::from_str(content)?;
    if raw.question.trim().is_empty() {
        return Err(GeneratorError::Invalid("question text is empty"));
    }
    if raw.options.len() != 4 {
        return Err(GeneratorError::Invalid("expected exactly four options"));
    }
    let correct_answer = match raw.correct_answer {
        Some(index @ 0..=3) => index as u8,
        _ => return Err(GeneratorError::Invalid("correct answer out of range")),
    };

    Ok(GeneratedQuestion {
        question: raw.question,
        options: raw.options,
        correct_answer,
        difficulty,
        topic: topic.to_owned(),
        explanation: raw.explanation,
    })
}

pub fn parse_news(content: &str) -> Result<Vec<NewsItem>, GeneratorError> {
    let news: Vec<NewsItem> = serde_json::from_str(content)?;
    if news.len() != 3 {
        return Err(GeneratorError::Invalid("expected three news items"));
    }
    Ok(news)
}

pub fn parse_math_concept(content: &str) -> Result<MathConcept, GeneratorError> {
    let concept: MathConcept = serde_json::from_str(content)?;
    if concept.title.trim().is_empty() || concept.learn_more_links.len() < 2 {
        return Err(GeneratorError::Invalid("concept needs a title and links"));
    }
    Ok(concept)
}

fn pick_topic(topics: &[&str]) -> String {
    topics
        .choose(&mut rand::rng())
        .map(|topic| (*topic).to_owned())
        .unwrap_or_else(|| "arithmetic".into())
}

/// Generator returning canned content, used when no AI key is configured.
#[derive(Clone, Default)]
pub struct CannedGenerator;

impl ContentGenerator for CannedGenerator {
    fn generate_question(
        &self,
        difficulty: Difficulty,
        topics: &[&str],
    ) -> BoxFuture<'static, GeneratedQuestion> {
        let topic = pick_topic(topics);
        Box::pin(async move { fallback_question(difficulty, &topic) })
    }

    fn top_news(&self) -> BoxFuture<'static, Vec<NewsItem>> {
        Box::pin(async { fallback_news() })
    }

    fn math_concept(&self) -> BoxFuture<'static, MathConcept> {
        Box::pin(async { fallback_math_concept() })
    }
}

/// Generator backed by the OpenAI chat completions API.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.into()),
        }
    }

    async fn complete(
        &self,
        system: Option<&str>,
        prompt: String,
        temperature: f32,
    ) -> Result<String, GeneratorError> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let completion: ChatCompletion = self
            .client
            .post(OPENAI_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": temperature,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GeneratorError::EmptyContent)
    }
}

impl ContentGenerator for OpenAiGenerator {
    fn generate_question(
        &self,
        difficulty: Difficulty,
        topics: &[&str],
    ) -> BoxFuture<'static, GeneratedQuestion> {
        let generator = self.clone();
        let topic = pick_topic(topics);
        Box::pin(async move {
            let prompt = format!(
                "Generate a {level} level math question about {topic} suitable for kids aged 8-15.\n\
                 Format your response as JSON with this exact structure:\n\
                 {{\"question\": \"...\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \"correctAnswer\": 0, \"explanation\": \"...\"}}\n\
                 The correctAnswer is the index (0-3) of the correct option. Include exactly 4 options.",
                level = difficulty.as_str(),
            );
            let result = match generator.complete(None, prompt, 0.7).await {
                Ok(content) => parse_generated_question(&content, difficulty, &topic),
                Err(err) => Err(err),
            };
            result.unwrap_or_else(|err| {
                warn!(error = %err, %topic, "question generation failed; using fallback");
                fallback_question(difficulty, &topic)
            })
        })
    }

    fn top_news(&self) -> BoxFuture<'static, Vec<NewsItem>> {
        let generator = self.clone();
        Box::pin(async move {
            let prompt = "Top 3 recent news articles in the field of maths. Return a JSON array of \
                          objects with title, summary (4-5 sentences) and url."
                .to_owned();
            let result = match generator
                .complete(
                    Some("You are a news curator for a math-savvy audience. Return only valid JSON."),
                    prompt,
                    0.8,
                )
                .await
            {
                Ok(content) => parse_news(&content),
                Err(err) => Err(err),
            };
            result.unwrap_or_else(|err| {
                warn!(error = %err, "news generation failed; using fallback");
                fallback_news()
            })
        })
    }

    fn math_concept(&self) -> BoxFuture<'static, MathConcept> {
        let generator = self.clone();
        Box::pin(async move {
            let prompt = "Generate an interesting mathematical concept for a \"Math Concept of the \
                          Week\" newsletter section. Return JSON with title, description (3-4 \
                          sentences) and learnMoreLinks: 3 objects with text and url."
                .to_owned();
            let result = match generator
                .complete(
                    Some("You are a mathematics educator. Return only valid JSON."),
                    prompt,
                    0.7,
                )
                .await
            {
                Ok(content) => parse_math_concept(&content),
                Err(err) => Err(err),
            };
            result.unwrap_or_else(|err| {
                warn!(error = %err, "concept generation failed; using fallback");
                fallback_math_concept()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_question_is_accepted() {
        let content = r#"{"question":"What is 2 + 2?","options":["3","4","5","6"],"correctAnswer":1,"explanation":"2 + 2 = 4"}"#;
        let question = parse_generated_question(content, Difficulty::Easy, "addition").unwrap();
        assert_eq!(question.correct_answer, 1);
        assert_eq!(question.topic, "addition");
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let cases = [
            "not json",
            r#"{"question":"Q","options":["1","2","3"],"correctAnswer":0}"#,
            r#"{"question":"Q","options":["1","2","3","4"],"correctAnswer":4}"#,
            r#"{"question":"Q","options":["1","2","3","4"],"correctAnswer":-1}"#,
            r#"{"question":"","options":["1","2","3","4"],"correctAnswer":0}"#,
            r#"{"question":"Q","options":["1","2","3","4"]}"#,
        ];
        for content in cases {
            assert!(
                parse_generated_question(content, Difficulty::Medium, "algebra").is_err(),
                "{content}"
            );
        }
    }

    #[test]
    fn fallback_question_is_valid() {
        let question = fallback_question(Difficulty::Hard, "geometry");
        assert_eq!(question.options.len(), 4);
        assert!(question.correct_answer < 4);
        assert_eq!(question.options[question.correct_answer as usize], "8");
    }

    #[tokio::test]
    async fn canned_generator_uses_one_of_the_requested_topics() {
        let question = CannedGenerator
            .generate_question(Difficulty::Medium, &["algebra", "geometry"])
            .await;
        assert!(["algebra", "geometry"].contains(&question.topic.as_str()));
        assert_eq!(CannedGenerator.top_news().await.len(), 3);
        assert_eq!(CannedGenerator.math_concept().await.learn_more_links.len(), 3);
    }

    #[test]
    fn concept_needs_links() {
        let content = r#"{"title":"Primes","description":"...","learnMoreLinks":[]}"#;
        assert!(parse_math_concept(content).is_err());
    }
}
