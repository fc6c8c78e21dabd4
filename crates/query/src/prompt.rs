pub fn build_routing_prompt(question: &str) -> String {
    format!(
        r#"You are a query routing specialist. Decide whether a user's question about a legal document is best answered by a semantic vector search or by a knowledge graph search.

- "vector" search is best for broad, open-ended questions about topics, concepts, or summaries (e.g. "What does the document say about confidentiality?", "Summarize the termination clause.").
- "graph" search is best for specific, multi-hop questions about relationships between entities (e.g. "Who is responsible for what under the amended agreement?", "What is the payment amount associated with the Q3 deliverable?").

Respond with ONLY the word vector or graph.

User Query: "{}""#,
        question
    )
}

pub fn build_answer_prompt(question: &str, context_chunks: &[String]) -> String {
    format!(
        r#"You are a helpful legal assistant. Answer the question using ONLY the context below.
If the answer is not in the context, say "The answer is not found in the provided document excerpts."

CONTEXT:
---
{}
---

QUESTION: {}

ANSWER:"#,
        context_chunks.join("\n---\n"),
        question
    )
}
