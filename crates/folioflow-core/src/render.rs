//! Result renderer
//!
//! Turns a backend [`AnalysisResult`] into a display-ready [`ViewModel`]:
//! a bounded health score, risk and diversification labels, the category
//! breakdown table and truncatable insight text. Everything here is pure.

use std::borrow::Cow;
use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{AnalysisResult, PremiumAnalysis, TransactionRecord};

/// Score every wallet starts from before heuristic nudges
pub const BASE_HEALTH_SCORE: i32 = 75;

/// Character budget for collapsed free-text fields
pub const DEFAULT_TRUNCATE_CHARS: usize = 150;

const FREQUENT_BONUS: i32 = 10;
const LOW_RISK_BONUS: i32 = 15;
const HIGH_RISK_PENALTY: i32 = 15;

const LOVELACE_PER_ADA: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            RiskLevel::Low
        } else if score >= 60 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Diversification {
    Low,
    Medium,
    High,
}

impl Diversification {
    pub fn from_category_count(count: usize) -> Self {
        if count > 3 {
            Diversification::High
        } else if count > 1 {
            Diversification::Medium
        } else {
            Diversification::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Diversification::Low => "Low",
            Diversification::Medium => "Medium",
            Diversification::High => "High",
        }
    }
}

// =============================================================================
// Truncation
// =============================================================================

/// Free text that displays collapsed but always keeps the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Truncatable {
    full: String,
    max_chars: usize,
}

impl Truncatable {
    pub fn new(text: impl Into<String>, max_chars: usize) -> Self {
        Self {
            full: text.into(),
            max_chars,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.full.chars().count() > self.max_chars
    }

    /// The original text, byte for byte.
    pub fn expanded(&self) -> &str {
        &self.full
    }

    pub fn collapsed(&self) -> Cow<'_, str> {
        truncate_text(&self.full, self.max_chars)
    }

    pub fn display(&self, expanded: bool) -> Cow<'_, str> {
        if expanded {
            Cow::Borrowed(&self.full)
        } else {
            self.collapsed()
        }
    }
}

/// Cut `text` to `max_chars` characters and append an ellipsis.
///
/// Counts chars, not bytes, so multi-byte text never splits mid-character.
pub fn truncate_text(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
    }
}

// =============================================================================
// View Model
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverviewCard {
    pub wallet_label: String,
    pub transactions_analyzed: u64,
    pub ai_service: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightField {
    pub label: &'static str,
    pub text: Truncatable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownRow {
    pub category: String,
    pub count: String,
    pub description: Truncatable,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeSection {
    pub title: String,
    pub body: String,
}

/// Statistics computed locally from the fetched history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub transaction_count: usize,
    pub total_fees_ada: Decimal,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl HistoryStats {
    pub fn from_records(records: &[TransactionRecord]) -> Self {
        let total_lovelace: Decimal = records
            .iter()
            .filter_map(|r| Decimal::from_str(&r.fees).ok())
            .sum();

        let times = records
            .iter()
            .filter_map(|r| DateTime::<Utc>::from_timestamp(r.block_time, 0));

        let mut earliest: Option<DateTime<Utc>> = None;
        let mut latest: Option<DateTime<Utc>> = None;
        for t in times {
            earliest = Some(earliest.map_or(t, |lo| lo.min(t)));
            latest = Some(latest.map_or(t, |hi| hi.max(t)));
        }

        Self {
            transaction_count: records.len(),
            total_fees_ada: (total_lovelace / Decimal::from(LOVELACE_PER_ADA)).normalize(),
            earliest,
            latest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub health_score: u8,
    pub risk_level: RiskLevel,
    pub diversification: Diversification,
    pub overview: OverviewCard,
    /// Backend summary statistics as label/value pairs
    pub summary: Vec<(String, String)>,
    pub insights: Vec<InsightField>,
    pub breakdown: Vec<BreakdownRow>,
    pub narrative: Option<Truncatable>,
    pub narrative_sections: Vec<NarrativeSection>,
    pub history: Option<HistoryStats>,
    pub generated_at: String,
}

impl ViewModel {
    pub fn with_history(mut self, stats: HistoryStats) -> Self {
        self.history = Some(stats);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub truncate_chars: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            truncate_chars: DEFAULT_TRUNCATE_CHARS,
        }
    }
}

pub fn render(result: &AnalysisResult) -> ViewModel {
    render_with(result, &RenderOptions::default())
}

pub fn render_with(result: &AnalysisResult, options: &RenderOptions) -> ViewModel {
    let score = health_score(result);
    let budget = options.truncate_chars;

    let summary_fields = [
        ("Total Transactions", &result.portfolio_summary.total_transactions),
        ("Total Fees Paid", &result.portfolio_summary.total_fees_paid),
        ("Transaction Frequency", &result.portfolio_summary.transaction_frequency),
        ("Account Type", &result.portfolio_summary.account_type_assessment),
    ];
    let summary = summary_fields
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| (label.to_string(), v.clone())))
        .collect();

    let insight_fields = [
        ("Spending Patterns", &result.insights.spending_patterns),
        ("Risk Assessment", &result.insights.risk_assessment),
        ("Recommendations", &result.insights.recommendations),
        ("Tax Considerations", &result.insights.tax_considerations),
    ];
    let insights = insight_fields
        .iter()
        .filter_map(|(label, value)| {
            value.as_ref().map(|text| InsightField {
                label: *label,
                text: Truncatable::new(text.clone(), budget),
            })
        })
        .collect();

    let breakdown = result
        .transaction_analysis
        .iter()
        .map(|row| BreakdownRow {
            category: row.category.clone().unwrap_or_else(|| "Unknown".to_string()),
            count: row.count.clone().unwrap_or_else(|| "0".to_string()),
            description: Truncatable::new(
                row.description.clone().unwrap_or_else(|| "No description".to_string()),
                budget,
            ),
            total: row.total_value.clone().unwrap_or_else(|| "N/A".to_string()),
        })
        .collect();

    let narrative_sections = result
        .analysis
        .as_deref()
        .map(parse_sections)
        .unwrap_or_default();

    ViewModel {
        health_score: score,
        risk_level: RiskLevel::from_score(score),
        diversification: Diversification::from_category_count(distinct_categories(result)),
        overview: overview(result),
        summary,
        insights,
        breakdown,
        narrative: result.analysis.as_ref().map(|a| Truncatable::new(a.clone(), budget)),
        narrative_sections,
        history: None,
        generated_at: result
            .timestamp
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
    }
}

/// Base score nudged by frequency and risk wording, clamped to [0, 100].
pub fn health_score(result: &AnalysisResult) -> u8 {
    let mut score = BASE_HEALTH_SCORE;

    if let Some(frequency) = &result.portfolio_summary.transaction_frequency {
        if mentions_word(frequency, "frequent") {
            score += FREQUENT_BONUS;
        }
    }

    if let Some(risk) = &result.insights.risk_assessment {
        if mentions_word(risk, "low") {
            score += LOW_RISK_BONUS;
        } else if mentions_word(risk, "high") {
            score -= HIGH_RISK_PENALTY;
        }
    }

    score.clamp(0, 100) as u8
}

/// True if any word of `text` starts with `stem`, ignoring case.
///
/// "infrequent" does not match "frequent"; "highly" matches "high". This is
/// stricter than a case-sensitive substring test, which would count
/// "infrequent" and miss "Low risk".
fn mentions_word(text: &str, stem: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| word.to_lowercase().starts_with(stem))
}

fn distinct_categories(result: &AnalysisResult) -> usize {
    result
        .transaction_analysis
        .iter()
        .filter_map(|row| row.category.as_deref())
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

fn overview(result: &AnalysisResult) -> OverviewCard {
    let wallet_label = match result.wallet_address.as_deref() {
        None | Some("Unknown") => "Connected Wallet".to_string(),
        Some(addr) => truncate_text(addr, 20).into_owned(),
    };

    let status = match result.status.as_deref() {
        Some("ai_analysis_complete") => "Complete".to_string(),
        Some(other) => other.to_string(),
        None => "completed".to_string(),
    };

    OverviewCard {
        wallet_label,
        transactions_analyzed: result.transactions_analyzed.unwrap_or(0),
        ai_service: result
            .ai_service
            .clone()
            .unwrap_or_else(|| "AI Service".to_string()),
        status,
    }
}

/// Split markdown into sections at `#` headings. Text before the first
/// heading and headings without content are skipped.
pub fn parse_sections(markdown: &str) -> Vec<NarrativeSection> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in markdown.lines() {
        if line.starts_with('#') {
            if let Some((title, body)) = current.take() {
                push_section(&mut sections, title, body);
            }
            let title = line.trim_start_matches('#').trim().to_string();
            current = Some((title, Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((title, body)) = current {
        push_section(&mut sections, title, body);
    }

    sections
}

fn push_section(sections: &mut Vec<NarrativeSection>, title: String, body: Vec<&str>) {
    if body.is_empty() {
        return;
    }
    sections.push(NarrativeSection {
        title,
        body: body.join("\n"),
    });
}

// =============================================================================
// Premium View
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PremiumView {
    pub status: String,
    pub result_hash: Option<String>,
    pub agent: Option<String>,
    pub body: String,
}

pub fn render_premium(result: &PremiumAnalysis) -> PremiumView {
    PremiumView {
        status: result.status.clone(),
        result_hash: result.result_hash.clone(),
        agent: result
            .agent
            .as_ref()
            .map(|a| format!("{} v{}", a.name, a.version)),
        body: serde_json::to_string_pretty(&result.analysis).unwrap_or_default(),
    }
}
