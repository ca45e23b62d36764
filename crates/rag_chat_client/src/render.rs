//! Plain-text rendering of the health badge and transcript turns.

use crate::exchange::Turn;
use crate::health::{HealthReport, HealthStatus};

/// Badge label: `…` until the first probe settles, then `Healthy` or `Down`.
pub fn status_label(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Unknown => "…",
        HealthStatus::Healthy => "Healthy",
        HealthStatus::Unhealthy => "Down",
    }
}

/// e.g. `Healthy · 12 ms RTT`, `Down · no response`.
pub fn render_badge(report: &HealthReport) -> String {
    let rtt = match report.rtt_ms {
        Some(ms) => format!("{} ms RTT", ms),
        None => "no response".to_string(),
    };
    format!("{} · {}", status_label(report.status), rtt)
}

/// Role header, text, then optional sources and latency lines.
pub fn render_turn(turn: &Turn) -> String {
    match turn {
        Turn::User { text } => format!("USER\n{}", text),
        Turn::Assistant {
            text,
            citations,
            latency_ms,
        } => {
            let mut out = format!("ASSISTANT\n{}", text);
            if !citations.is_empty() {
                out.push_str(&format!("\n📚 Sources: {}", citations.join(", ")));
            }
            if let Some(ms) = latency_ms {
                out.push_str(&format!("\n⏱ {} ms", ms));
            }
            out
        }
    }
}
