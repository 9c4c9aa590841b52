//! Quiz Catalog Clients
//!
//! `HttpQuizCatalog` talks to the external quiz service;
//! `StaticQuizCatalog` serves a fixed set of quizzes from memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::domain::catalog::QuizCatalog;
use crate::domain::value_object::question::Question;
use crate::error::{BattleError, BattleResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct QuizPayload {
    questions: Vec<Question>,
}

/// HTTP quiz catalog: `GET {base_url}/quizzes/{quiz_id}`
#[derive(Clone)]
pub struct HttpQuizCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuizCatalog {
    pub fn new(base_url: impl Into<String>) -> BattleResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BattleError::Catalog(format!("client setup: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl QuizCatalog for HttpQuizCatalog {
    async fn fetch_quiz(&self, quiz_id: &str) -> BattleResult<Vec<Question>> {
        if !is_safe_quiz_id(quiz_id) {
            return Err(BattleError::QuizNotFound(quiz_id.to_string()));
        }

        let url = format!("{}/quizzes/{}", self.base_url, quiz_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BattleError::Catalog(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(BattleError::QuizNotFound(quiz_id.to_string())),
            status if !status.is_success() => {
                return Err(BattleError::Catalog(format!("unexpected status {status}")));
            }
            _ => {}
        }

        let payload: QuizPayload = response
            .json()
            .await
            .map_err(|e| BattleError::Catalog(format!("invalid quiz payload: {e}")))?;

        tracing::debug!(quiz_id, questions = payload.questions.len(), "Quiz fetched");
        Ok(payload.questions)
    }
}

/// Quiz ids are interpolated into a URL path
fn is_safe_quiz_id(quiz_id: &str) -> bool {
    !quiz_id.is_empty()
        && quiz_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Fixed in-memory catalog
#[derive(Clone, Default)]
pub struct StaticQuizCatalog {
    quizzes: Arc<HashMap<String, Vec<Question>>>,
}

impl StaticQuizCatalog {
    pub fn new(quizzes: HashMap<String, Vec<Question>>) -> Self {
        Self {
            quizzes: Arc::new(quizzes),
        }
    }
}

impl QuizCatalog for StaticQuizCatalog {
    async fn fetch_quiz(&self, quiz_id: &str) -> BattleResult<Vec<Question>> {
        self.quizzes
            .get(quiz_id)
            .cloned()
            .ok_or_else(|| BattleError::QuizNotFound(quiz_id.to_string()))
    }
}

/// Either catalog, chosen at startup
#[derive(Clone)]
pub enum AnyQuizCatalog {
    Http(HttpQuizCatalog),
    Static(StaticQuizCatalog),
}

impl QuizCatalog for AnyQuizCatalog {
    async fn fetch_quiz(&self, quiz_id: &str) -> BattleResult<Vec<Question>> {
        match self {
            Self::Http(catalog) => catalog.fetch_quiz(quiz_id).await,
            Self::Static(catalog) => catalog.fetch_quiz(quiz_id).await,
        }
    }
}
