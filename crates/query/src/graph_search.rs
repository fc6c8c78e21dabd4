use extract::KnowledgeGraph;

pub const NO_ENTITIES_ANSWER: &str =
    "I couldn't find any specific entities in the knowledge graph related to your question.";

// Interrogatives and function words that would match half the entity names
const IGNORED_TERMS: &[&str] = &[
    "the", "and", "for", "what", "who", "whom", "whose", "which", "when", "where", "why", "how",
    "does", "did", "are", "was", "were", "has", "have", "with", "from", "that", "this", "into",
    "about", "under", "there", "any", "can", "will", "not",
];

const MIN_TERM_CHARS: usize = 3;

/// Entity names in `graph` that a question refers to, in graph node order.
///
/// A node matches when the question is a case-insensitive substring of its
/// name, when its name appears in the question as whole words, or when it
/// contains a significant question term. Edges are not followed.
pub fn related_entities<'g>(graph: &'g KnowledgeGraph, question: &str) -> Vec<&'g str> {
    let question = question.trim().to_lowercase();
    if question.is_empty() {
        return Vec::new();
    }

    let question_words = words(&question);
    let terms: Vec<&str> = question_words
        .iter()
        .copied()
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS && !IGNORED_TERMS.contains(t))
        .collect();

    graph
        .nodes()
        .filter(|name| {
            let name = name.to_lowercase();
            !name.is_empty()
                && (name.contains(&question)
                    || contains_words(&question_words, &words(&name))
                    || terms.iter().any(|t| name.contains(t)))
        })
        .collect()
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains_words(haystack: &[&str], needle: &[&str]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

pub fn graph_answer(entities: &[&str]) -> String {
    if entities.is_empty() {
        return NO_ENTITIES_ANSWER.to_string();
    }

    format!(
        "Based on the knowledge graph, your question relates to: {}. \
         You may want to ask a more specific question about their relationships.",
        entities.join(", ")
    )
}
