//! Terminal rendering of refresh reports

use liquidity_flow::RefreshReport;
use std::fmt::Write;

/// `$1.23T`, `-$450.00M`, `$812`; `N/A` when missing
pub fn pretty_usd(value: Option<f64>) -> String {
    let Some(x) = value.filter(|v| v.is_finite()) else {
        return "N/A".to_string();
    };

    let sign = if x < 0.0 { "-" } else { "" };
    let s = x.abs();
    if s >= 1e12 {
        format!("{sign}${:.2}T", s / 1e12)
    } else if s >= 1e9 {
        format!("{sign}${:.2}B", s / 1e9)
    } else if s >= 1e6 {
        format!("{sign}${:.2}M", s / 1e6)
    } else if s >= 1e3 {
        format!("{sign}${:.2}K", s / 1e3)
    } else {
        format!("{sign}${:.0}", s)
    }
}

pub fn pretty_pct(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{:.2}%", v),
        None => "N/A".to_string(),
    }
}

/// Multi-line human summary of one refresh
pub fn render_report(report: &RefreshReport) -> String {
    let s = &report.snapshot;
    let d = &report.deltas;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Crypto liquidity, {} window ({})",
        report.window_label,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "  Total market   {}", pretty_usd(s.total_cap));
    let _ = writeln!(out, "  BTC            {}", pretty_usd(s.btc_cap));
    let _ = writeln!(out, "  ETH            {}", pretty_usd(s.eth_cap));
    let _ = writeln!(
        out,
        "  Stablecoins    {} ({}/{} reporting)",
        pretty_usd(s.stable_cap),
        s.stable_coverage.available,
        s.stable_coverage.requested
    );
    let _ = writeln!(out, "  Alts (ex-BTC)  {}", pretty_usd(s.alt_cap));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  Dominance  BTC {}  ETH {}  Stable {}  Alts {}",
        pretty_pct(s.dominance.btc),
        pretty_pct(s.dominance.eth),
        pretty_pct(s.dominance.stable),
        pretty_pct(s.dominance.alt)
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "  ΔTotal   {}", pretty_usd(d.d_total));
    let _ = writeln!(out, "  ΔBTC     {}", pretty_usd(d.d_btc));
    let _ = writeln!(out, "  ΔETH     {}", pretty_usd(d.d_eth));
    let _ = writeln!(out, "  ΔStable  {}", pretty_usd(d.d_stable));
    let _ = writeln!(
        out,
        "  ΔAlts    {}{}",
        pretty_usd(d.d_alt),
        if d.alt_estimated && d.d_alt.is_some() { " (est.)" } else { "" }
    );

    if !report.tickers.is_empty() {
        let _ = writeln!(out);
        for t in &report.tickers {
            let _ = writeln!(
                out,
                "  {:<10} 24h {:>8}  quote vol {}",
                t.symbol,
                pretty_pct(t.price_change_percent),
                pretty_usd(t.quote_volume)
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  Verdict: {} [{}]", report.verdict.label, report.verdict.color());
    let _ = writeln!(out, "  {}", report.verdict.note);
    let _ = write!(out, "  Noise tolerance: {}", pretty_usd(Some(report.tolerance)));

    out
}
