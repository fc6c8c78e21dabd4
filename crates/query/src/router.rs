use extract::LanguageModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::prompt::build_routing_prompt;

/// Retrieval strategy for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Vector,
    Graph,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Vector => "vector",
            Route::Graph => "graph",
        }
    }

    /// Accepts exactly "vector" or "graph", ignoring case and surrounding whitespace
    pub fn parse(raw: &str) -> Option<Route> {
        match raw.trim().to_lowercase().as_str() {
            "vector" => Some(Route::Vector),
            "graph" => Some(Route::Graph),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies questions with one model call. Anything other than a clean
/// label, including a failed call, routes to `Route::Vector`.
pub struct QueryRouter {
    llm: Arc<dyn LanguageModel>,
}

impl QueryRouter {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn route(&self, question: &str) -> Route {
        let reply = match self.llm.generate(&build_routing_prompt(question)).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Routing call failed, defaulting to vector");
                return Route::Vector;
            }
        };

        Route::parse(&reply).unwrap_or_else(|| {
            tracing::debug!(reply = %reply.trim(), "Unrecognised route, defaulting to vector");
            Route::Vector
        })
    }
}
