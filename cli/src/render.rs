//! Plain-text rendering of analysis records for stdout.

use std::fmt::Write;

use alon_types::{
    AnalysisRecord, CrossCheckOutcome, FactCheckMessage, GraphMessage, HallucinationMessage,
    LarkMessage, LarkStepName, RecordState, StepStatus,
};

/// Render one finished lark step, or `None` while it is still pending.
pub fn lark_step(message: &LarkMessage, name: LarkStepName) -> Option<String> {
    let step = message.step(name);
    let mut out = String::new();
    match step.status {
        StepStatus::Pending => return None,
        StepStatus::Error => {
            let cause = step.error.as_deref().unwrap_or("unknown error");
            let _ = writeln!(out, "[{}] failed: {cause}", name.title());
            return Some(out);
        }
        StepStatus::Complete => {
            let _ = writeln!(out, "[{}]", name.title());
        }
    }

    match name {
        LarkStepName::Extract => {
            for expr in message.results.logic_expressions.iter().flatten() {
                let _ = writeln!(out, "  {}  =>  {}", expr.sentence, expr.expression);
            }
        }
        LarkStepName::Crosscheck => match &message.results.crosscheck {
            Some(CrossCheckOutcome::Insufficient { expressions }) => {
                let _ = writeln!(out, "  skipped: {expressions} expression(s) to compare");
            }
            Some(CrossCheckOutcome::Compared { checks }) => {
                for check in checks {
                    let mark = if check.is_contradictory { "✗" } else { "✓" };
                    let _ = writeln!(
                        out,
                        "  {mark} {} <> {}: {}",
                        check.pair.0, check.pair.1, check.reason
                    );
                }
            }
            None => {}
        },
        LarkStepName::Synthesize => {
            if let Some(verdict) = &message.results.final_verdict {
                let _ = writeln!(out, "  {}", verdict.summary);
            }
        }
    }
    Some(out)
}

/// Final rendering of a terminal record.
pub fn record(record: &AnalysisRecord) -> String {
    match record {
        AnalysisRecord::Hallucination(message) => hallucination(message),
        AnalysisRecord::Logical(message) => logical_footer(message),
        AnalysisRecord::Graph(message) => graph(message),
        AnalysisRecord::FactCheck(message) => fact_check(message),
    }
}

fn hallucination(message: &HallucinationMessage) -> String {
    let report = match &message.state {
        RecordState::Complete(report) => report,
        RecordState::Error(cause) => return format!("Error: {cause}\n"),
        RecordState::Pending => return String::new(),
    };
    let result = &report.result;
    let mut out = String::new();
    let _ = writeln!(out, "Tokens: {}", result.tokens.join(" | "));
    let _ = writeln!(out, "Combinations analyzed: {}", result.total_combinations);
    let _ = writeln!(
        out,
        "Hallucination rate: {:.1}% ({} flagged)",
        result.hallucination_rate(),
        result.hallucinated_combinations.len()
    );
    for flagged in &result.hallucinated_combinations {
        let _ = writeln!(out, "  - {}: {}", flagged.combo.join(" "), flagged.reason);
    }
    let _ = writeln!(out, "Tokens used: {}", report.usage.total_token_count);
    out
}

fn logical_footer(message: &LarkMessage) -> String {
    match &message.error {
        Some(cause) => format!("Error: {cause}\n"),
        None => format!("Tokens used: {}\n", message.usage.total_token_count),
    }
}

fn graph(message: &GraphMessage) -> String {
    let report = match &message.state {
        RecordState::Complete(report) => report,
        RecordState::Error(cause) => return format!("Error: {cause}\n"),
        RecordState::Pending => return String::new(),
    };
    let graph = &report.graph;
    let mut out = String::new();
    if graph.is_empty() {
        out.push_str("No entities found.\n");
    } else {
        let _ = writeln!(out, "Entities: {}", graph.nodes.len());
        for edge in &graph.edges {
            let _ = writeln!(
                out,
                "  {} --{}--> {}",
                graph.node_label(&edge.from),
                edge.label,
                graph.node_label(&edge.to)
            );
        }
    }
    if !graph.summary.is_empty() {
        let _ = writeln!(out, "Summary: {}", graph.summary);
    }
    if let Some(usage) = report.usage {
        let _ = writeln!(out, "Tokens used: {}", usage.total_token_count);
    }
    out
}

fn fact_check(message: &FactCheckMessage) -> String {
    if let Some(cause) = &message.error {
        return format!("Error: {cause}\n");
    }
    let mut out = String::new();
    out.push_str(message.text.trim_end());
    out.push('\n');
    if !message.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (index, source) in message.sources.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {} <{}>", index + 1, source.title, source.uri);
        }
    }
    if let Some(usage) = message.usage {
        let _ = writeln!(out, "Tokens used: {}", usage.total_token_count);
    }
    out
}
