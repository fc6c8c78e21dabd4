use extract::{DocumentAnalysis, RiskLevel};
use std::fmt::Write;

pub const REPORT_FILENAME: &str = "Analysis_Report.md";
pub const REPORT_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

fn risk_marker(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "🔴",
        RiskLevel::Medium => "🟠",
        RiskLevel::Low => "🟢",
    }
}

/// Render an analysis as a Markdown report
pub fn render_markdown(analysis: &DocumentAnalysis) -> String {
    let mut out = String::new();

    out.push_str("# AI Legal Document Analysis Report\n\n");
    let _ = writeln!(out, "**Document health score:** {}/100\n", analysis.health_score);

    out.push_str("## Simplified Summary\n\n");
    // The model marks up its summary with bold runs; the report applies its own formatting
    let summary = analysis.simplified_text.replace("**", "");
    for paragraph in summary.lines().map(str::trim).filter(|p| !p.is_empty()) {
        out.push_str(paragraph);
        out.push_str("\n\n");
    }

    out.push_str("## Identified Risks\n\n");
    if analysis.risks.is_empty() {
        out.push_str("No risks were identified.\n");
    }
    for risk in &analysis.risks {
        let _ = writeln!(
            out,
            "- {} **{} Risk:** {}",
            risk_marker(risk.level),
            risk.level,
            risk.description.trim()
        );
    }

    out
}
