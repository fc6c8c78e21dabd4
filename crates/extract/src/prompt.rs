pub fn build_analysis_prompt(document_text: &str) -> String {
    format!(
        r#"Analyze the following legal document text.

Provide a response as a single, valid JSON object with three keys: "simplified_text", "risks", and "document_health_score".
1. "simplified_text": An "Explain Like I'm 15" summary of the key findings, written as a conversational summary from an AI assistant. Markdown formatting is allowed.
2. "risks": A list of potential risks. Each item is an object with "risk_level" (High, Medium, or Low) and a "description" of the risk.
3. "document_health_score": An integer from 0 to 100 representing the document's overall health.

Output ONLY the JSON object, no explanations.

Legal Text: ---
{}
---"#,
        document_text
    )
}

pub fn build_extraction_prompt(document_text: &str) -> String {
    format!(
        r#"You are a legal knowledge graph extractor. Analyze the following legal text and extract key entities and their relationships.

Entities can be a Party, Clause, Date, Amount, Obligation, or Right.
Relationships describe how entities are connected, for example: HAS_OBLIGATION, PAYS_AMOUNT, TERMINATES_ON_DATE, REFERENCES_CLAUSE.

Return a single, valid JSON object with two keys: "entities" and "relationships".
- "entities" is a list of strings, each the name of an entity (e.g. "Company ABC Inc.", "Termination Clause", "$50,000").
- "relationships" is a list of lists, each inner list holding three strings: [source_entity, relationship_type, target_entity].

EXAMPLE:
{{
  "entities": ["Company ABC Inc.", "Client XYZ Corp.", "Payment Obligation", "$50,000"],
  "relationships": [
    ["Client XYZ Corp.", "HAS_OBLIGATION", "Payment Obligation"],
    ["Payment Obligation", "IS_AMOUNT", "$50,000"]
  ]
}}

Output ONLY the JSON object, no markdown, no explanations.

Legal Text: ---
{}
---"#,
        document_text
    )
}
