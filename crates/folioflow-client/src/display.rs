//! Terminal rendering of view models
//!
//! Formatting only; every number shown here was computed by the renderer.

use std::fmt::Write;

use folioflow_core::{truncate_text, PremiumView, ProviderDescriptor, ViewModel, WalletSession};

use crate::controller::CurrentView;

const RULE: &str = "================================================";

pub fn providers(list: &[ProviderDescriptor]) -> String {
    if list.is_empty() {
        return "No wallet providers available. Declare one under [[wallets]] in config/local.toml."
            .to_string();
    }

    let mut out = String::from("Available wallets:\n");
    for p in list {
        let caps = p.capabilities;
        let _ = writeln!(
            out,
            "  {:<12} {:<12} used:{} unused:{} change:{}",
            p.key,
            p.name,
            yes_no(caps.used_addresses),
            yes_no(caps.unused_addresses),
            yes_no(caps.change_address)
        );
    }
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn session(session: &WalletSession) -> String {
    let mut out = format!(
        "Connected to {} ({})",
        session.display_name,
        truncate_text(&session.address, 20)
    );
    if let Some(reason) = &session.degradation {
        let _ = write!(
            out,
            "\n  Note: wallet address could not be used ({:?}); analyzing a placeholder address",
            reason
        );
    }
    out
}

pub fn view(current: &CurrentView, expanded: bool) -> String {
    match current {
        CurrentView::Basic(view) => report(view, expanded),
        CurrentView::Premium(view) => premium(view),
    }
}

pub fn report(view: &ViewModel, expanded: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  Portfolio Analysis");
    let _ = writeln!(out, "{}", RULE);

    let o = &view.overview;
    let _ = writeln!(out, "  Wallet:        {}", o.wallet_label);
    let _ = writeln!(out, "  Analyzed:      {} transactions", o.transactions_analyzed);
    let _ = writeln!(out, "  AI service:    {}", o.ai_service);
    let _ = writeln!(out, "  Status:        {}", o.status);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  Health score:  {}/100   Risk: {}   Diversification: {}",
        view.health_score,
        view.risk_level.as_str(),
        view.diversification.as_str()
    );

    if let Some(stats) = &view.history {
        let _ = writeln!(
            out,
            "  Fetched:       {} transactions, {} ADA in fees",
            stats.transaction_count, stats.total_fees_ada
        );
        if let (Some(first), Some(last)) = (stats.earliest, stats.latest) {
            let _ = writeln!(
                out,
                "  Period:        {} to {}",
                first.format("%Y-%m-%d"),
                last.format("%Y-%m-%d")
            );
        }
    }

    if !view.summary.is_empty() {
        let _ = writeln!(out, "\n  Summary");
        for (label, value) in &view.summary {
            let _ = writeln!(out, "    {:<22} {}", label, value);
        }
    }

    if !view.insights.is_empty() {
        let _ = writeln!(out, "\n  Insights");
        for field in &view.insights {
            let _ = writeln!(out, "    {}: {}", field.label, field.text.display(expanded));
        }
    }

    if !view.breakdown.is_empty() {
        let _ = writeln!(out, "\n  Transaction breakdown");
        let _ = writeln!(out, "    {:<20} {:>6}  {:<14} Description", "Category", "Count", "Total");
        for row in &view.breakdown {
            let _ = writeln!(
                out,
                "    {:<20} {:>6}  {:<14} {}",
                row.category,
                row.count,
                row.total,
                row.description.display(expanded)
            );
        }
    }

    if expanded && !view.narrative_sections.is_empty() {
        for section in &view.narrative_sections {
            let _ = writeln!(out, "\n  {}", section.title);
            for line in section.body.lines() {
                let _ = writeln!(out, "    {}", line);
            }
        }
    } else if let Some(narrative) = &view.narrative {
        let _ = writeln!(out, "\n  Analysis");
        let _ = writeln!(out, "    {}", narrative.display(expanded));
    }

    if has_truncation(view) {
        let hint = if expanded { "collapse" } else { "expand" };
        let _ = writeln!(out, "\n  (type 'expand' to {} long text)", hint);
    }

    let _ = write!(out, "  Generated: {}", view.generated_at);
    out
}

fn has_truncation(view: &ViewModel) -> bool {
    view.insights.iter().any(|f| f.text.is_truncated())
        || view.breakdown.iter().any(|r| r.description.is_truncated())
        || view.narrative.as_ref().is_some_and(|n| n.is_truncated())
}

pub fn premium(view: &PremiumView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  Premium Analysis ({})", view.status);
    let _ = writeln!(out, "{}", RULE);
    if let Some(agent) = &view.agent {
        let _ = writeln!(out, "  Agent:        {}", agent);
    }
    if let Some(hash) = &view.result_hash {
        let _ = writeln!(out, "  Result hash:  {}", hash);
    }
    let _ = write!(out, "{}", view.body);
    out
}
