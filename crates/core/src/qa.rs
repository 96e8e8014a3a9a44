use crate::config::OpenAiConfig;
use crate::embeddings::{auth_headers, Embedder};
use crate::index::VectorIndexClient;
use crate::models::ScoredRecord;
use crate::session::{ChatTurn, Session};
use crate::traits::VectorStore;
use crate::BotError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const MAX_QUESTION_CHARS: usize = 500;

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Produces an answer from the question and every retrieved document at
    /// once. `context` may be empty.
    async fn answer(&self, question: &str, context: &[ScoredRecord]) -> Result<String, BotError>;
}

/// Renders the single prompt that carries all retrieved context.
pub fn render_stuff_prompt(question: &str, context: &[ScoredRecord]) -> String {
    let documents = context
        .iter()
        .map(|record| record.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut prompt = String::new();
    prompt.push_str(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n",
    );
    prompt.push_str(&documents);
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question);
    prompt.push_str("\nHelpful Answer:");
    prompt
}

pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OpenAiGenerator {
    pub fn new(config: &OpenAiConfig) -> Result<Self, BotError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(auth_headers(&config.api_key)?)
            .build()
            .map_err(|error| BotError::Generation(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint("chat/completions"),
            model: config.chat_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    async fn answer(&self, question: &str, context: &[ScoredRecord]) -> Result<String, BotError> {
        let prompt = render_stuff_prompt(question, context);
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|error| BotError::Generation(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(BotError::Generation(format!("{status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| BotError::Generation(error.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| BotError::Generation("response had no choices".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaState {
    Idle,
    Retrieving,
    Generating,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QaAnswer {
    pub answer: String,
    pub sources: Vec<ScoredRecord>,
}

/// Retrieval then generation for one question at a time.
pub struct QaOrchestrator<'a, S, E, G> {
    index: &'a VectorIndexClient<S, E>,
    generator: &'a G,
    collection: String,
    top_k: usize,
    state: QaState,
    transitions: Vec<QaState>,
}

impl<'a, S, E, G> QaOrchestrator<'a, S, E, G>
where
    S: VectorStore,
    E: Embedder,
    G: AnswerGenerator,
{
    pub fn new(
        index: &'a VectorIndexClient<S, E>,
        generator: &'a G,
        collection: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            generator,
            collection: collection.into(),
            top_k,
            state: QaState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> QaState {
        self.state
    }

    /// States visited by the most recent [`Self::ask`], starting at `Idle`.
    pub fn last_transitions(&self) -> &[QaState] {
        &self.transitions
    }

    pub async fn ask(
        &mut self,
        session: &mut Session,
        question: &str,
    ) -> Result<QaAnswer, BotError> {
        self.transitions.clear();
        self.transitions.push(QaState::Idle);

        let question = match validate_question(question) {
            Ok(question) => question,
            Err(error) => return Err(self.fail(error)),
        };

        self.enter(QaState::Retrieving);
        let searched = self
            .index
            .similarity_search(&self.collection, &question, self.top_k)
            .await;
        let sources = match searched {
            Ok(sources) => sources,
            Err(error) => return Err(self.fail(error)),
        };
        if sources.is_empty() {
            info!(collection = %self.collection, "no matching documents, answering without context");
        }

        self.enter(QaState::Generating);
        let generated = self.generator.answer(&question, &sources).await;
        let answer = match generated {
            Ok(answer) => answer,
            Err(error) => return Err(self.fail(error)),
        };

        session.record_turn(ChatTurn::new(question, answer.clone()));
        self.enter(QaState::Idle);

        Ok(QaAnswer { answer, sources })
    }

    fn enter(&mut self, next: QaState) {
        debug!(from = ?self.state, to = ?next, "qa state");
        self.state = next;
        self.transitions.push(next);
    }

    fn fail(&mut self, error: BotError) -> BotError {
        warn!(error = %error, "question failed");
        self.enter(QaState::Failed);
        self.enter(QaState::Idle);
        error
    }
}

pub fn validate_question(question: &str) -> Result<String, BotError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(BotError::Validation("question is empty".to_string()));
    }
    let length = trimmed.chars().count();
    if length > MAX_QUESTION_CHARS {
        return Err(BotError::Validation(format!(
            "question is {length} characters, limit is {MAX_QUESTION_CHARS}"
        )));
    }
    Ok(trimmed.to_string())
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedGenerator;
    use super::*;
    use crate::embeddings::{CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
    use crate::models::{IndexedRecord, NewRecord};
    use crate::stores::MemoryStore;
    use crate::RetryPolicy;

    struct UnreachableStore;

    #[async_trait]
    impl VectorStore for UnreachableStore {
        async fn list_collections(&self) -> Result<Vec<String>, BotError> {
            Err(BotError::remote("qdrant", "connection refused"))
        }

        async fn collection_exists(&self, _name: &str) -> Result<bool, BotError> {
            Err(BotError::remote("qdrant", "connection refused"))
        }

        async fn create_collection(&self, _name: &str, _dimension: usize) -> Result<(), BotError> {
            Err(BotError::remote("qdrant", "connection refused"))
        }

        async fn delete_collection(&self, _name: &str) -> Result<(), BotError> {
            Err(BotError::remote("qdrant", "connection refused"))
        }

        async fn upsert(&self, _collection: &str, _records: &[NewRecord]) -> Result<(), BotError> {
            Err(BotError::remote("qdrant", "connection refused"))
        }

        async fn search(
            &self,
            _collection: &str,
            _vector: &[f32],
            _limit: usize,
        ) -> Result<Vec<ScoredRecord>, BotError> {
            Err(BotError::remote("qdrant", "connection refused"))
        }

        async fn fetch(
            &self,
            _collection: &str,
            _ids: &[String],
        ) -> Result<Vec<IndexedRecord>, BotError> {
            Err(BotError::remote("qdrant", "connection refused"))
        }

        async fn delete(&self, _collection: &str, _ids: &[String]) -> Result<(), BotError> {
            Err(BotError::remote("qdrant", "connection refused"))
        }
    }

    async fn memory_index() -> VectorIndexClient<MemoryStore, CharacterNgramEmbedder> {
        let index = VectorIndexClient::new(
            MemoryStore::new(),
            CharacterNgramEmbedder::default(),
            RetryPolicy::single_attempt(),
        );
        index
            .create_collection("pdfbot", DEFAULT_EMBEDDING_DIMENSIONS as i64)
            .await
            .expect("collection");
        index
    }

    #[tokio::test]
    async fn empty_collection_answers_from_empty_context() {
        let index = memory_index().await;
        let generator = ScriptedGenerator::default();
        let mut session = Session::new();
        let mut qa = QaOrchestrator::new(&index, &generator, "pdfbot", 4);

        let answer = qa
            .ask(&mut session, "What is the warranty period?")
            .await
            .expect("no matches is not an error");

        assert!(answer.sources.is_empty());
        assert_eq!(generator.contexts(), vec![Vec::<String>::new()]);
        assert_eq!(session.chat_log().len(), 1);
        assert_eq!(
            qa.last_transitions(),
            &[
                QaState::Idle,
                QaState::Retrieving,
                QaState::Generating,
                QaState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn search_failure_is_surfaced_without_a_turn() {
        let index = VectorIndexClient::new(
            UnreachableStore,
            CharacterNgramEmbedder::default(),
            RetryPolicy::single_attempt(),
        );
        let generator = ScriptedGenerator::default();
        let mut session = Session::new();
        let mut qa = QaOrchestrator::new(&index, &generator, "pdfbot", 4);

        let result = qa.ask(&mut session, "What is the warranty period?").await;

        assert!(matches!(result, Err(BotError::RemoteService { .. })));
        assert!(generator.contexts().is_empty());
        assert!(session.chat_log().is_empty());
        assert_eq!(qa.state(), QaState::Idle);
        assert_eq!(
            qa.last_transitions(),
            &[
                QaState::Idle,
                QaState::Retrieving,
                QaState::Failed,
                QaState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn generation_failure_appends_nothing() {
        let index = memory_index().await;
        let generator = ScriptedGenerator {
            fail: true,
            ..ScriptedGenerator::default()
        };
        let mut session = Session::new();
        let mut qa = QaOrchestrator::new(&index, &generator, "pdfbot", 4);

        let result = qa.ask(&mut session, "Anything?").await;
        assert!(matches!(result, Err(BotError::Generation(_))));
        assert!(session.chat_log().is_empty());
        assert_eq!(qa.state(), QaState::Idle);
    }

    #[tokio::test]
    async fn retrieved_texts_reach_the_generator_and_the_log() {
        let index = memory_index().await;
        index
            .upsert_texts(
                "pdfbot",
                &[
                    "The warranty period is two years from delivery.".to_string(),
                    "Lubricate the bearings every 500 operating hours.".to_string(),
                ],
            )
            .await
            .expect("upsert");
        let generator = ScriptedGenerator::default();
        let mut session = Session::new();
        let mut qa = QaOrchestrator::new(&index, &generator, "pdfbot", 1);

        let answer = qa
            .ask(&mut session, "  How long is the warranty period?  ")
            .await
            .expect("answer");

        assert_eq!(answer.sources.len(), 1);
        assert!(answer.sources[0].text.contains("warranty"));
        let turn = &session.chat_log().turns()[0];
        assert_eq!(turn.question(), "How long is the warranty period?");
        assert_eq!(turn.answer(), answer.answer);
    }

    #[tokio::test]
    async fn overlong_and_blank_questions_are_rejected() {
        let index = memory_index().await;
        let generator = ScriptedGenerator::default();
        let mut session = Session::new();
        let mut qa = QaOrchestrator::new(&index, &generator, "pdfbot", 4);

        let long = "x".repeat(MAX_QUESTION_CHARS + 1);
        assert!(matches!(
            qa.ask(&mut session, &long).await,
            Err(BotError::Validation(_))
        ));
        assert!(matches!(
            qa.ask(&mut session, "   ").await,
            Err(BotError::Validation(_))
        ));
        assert!(validate_question(&"y".repeat(MAX_QUESTION_CHARS)).is_ok());
        assert!(session.chat_log().is_empty());
    }

    #[tokio::test]
    async fn zero_top_k_fails_instead_of_searching_for_one() {
        let index = memory_index().await;
        index
            .upsert_texts("pdfbot", &["The warranty lasts two years.".to_string()])
            .await
            .expect("upsert");
        let generator = ScriptedGenerator::default();
        let mut session = Session::new();
        let mut qa = QaOrchestrator::new(&index, &generator, "pdfbot", 0);

        let result = qa.ask(&mut session, "How long is the warranty?").await;

        assert!(matches!(result, Err(BotError::Validation(_))));
        assert!(generator.contexts().is_empty());
        assert!(session.chat_log().is_empty());
        assert_eq!(
            qa.last_transitions(),
            &[
                QaState::Idle,
                QaState::Retrieving,
                QaState::Failed,
                QaState::Idle
            ]
        );
    }

    #[test]
    fn stuff_prompt_carries_every_document() {
        let context = vec![
            ScoredRecord {
                id: "1".to_string(),
                score: 0.9,
                text: "first passage".to_string(),
            },
            ScoredRecord {
                id: "2".to_string(),
                score: 0.8,
                text: "second passage".to_string(),
            },
        ];
        let prompt = render_stuff_prompt("What?", &context);

        assert!(prompt.contains("first passage\n\nsecond passage"));
        assert!(prompt.ends_with("Question: What?\nHelpful Answer:"));
    }
}
