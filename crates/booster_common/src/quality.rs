//! Quality classification for signal, latency and overall connection health.
//!
//! Single source for the display thresholds and the weighted connection
//! score; rendering code imports from here instead of re-deriving labels.

use crate::metrics::LatencyStats;
use owo_colors::OwoColorize;

// ============================================================================
// Signal strength labels
// ============================================================================

/// Excellent signal threshold (percent).
pub const SIGNAL_EXCELLENT: f64 = 75.0;

/// Good signal threshold (percent).
pub const SIGNAL_GOOD: f64 = 50.0;

/// Fair signal threshold (percent); below this is Poor.
pub const SIGNAL_FAIR: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SignalQuality {
    pub fn from_pct(pct: f64) -> Self {
        if pct >= SIGNAL_EXCELLENT {
            SignalQuality::Excellent
        } else if pct >= SIGNAL_GOOD {
            SignalQuality::Good
        } else if pct >= SIGNAL_FAIR {
            SignalQuality::Fair
        } else {
            SignalQuality::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalQuality::Excellent => "Excellent",
            SignalQuality::Good => "Good",
            SignalQuality::Fair => "Fair",
            SignalQuality::Poor => "Poor",
        }
    }

    /// RGB tuple for terminal rendering.
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            SignalQuality::Excellent => (50, 205, 50),
            SignalQuality::Good => (154, 205, 50),
            SignalQuality::Fair => (255, 215, 0),
            SignalQuality::Poor => (255, 69, 0),
        }
    }
}

// ============================================================================
// Latency labels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl LatencyQuality {
    pub fn from_avg_ms(avg_ms: f64) -> Self {
        if avg_ms < 20.0 {
            LatencyQuality::Excellent
        } else if avg_ms < 50.0 {
            LatencyQuality::Good
        } else if avg_ms < 100.0 {
            LatencyQuality::Fair
        } else {
            LatencyQuality::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LatencyQuality::Excellent => "Excellent",
            LatencyQuality::Good => "Good",
            LatencyQuality::Fair => "Fair",
            LatencyQuality::Poor => "Poor",
        }
    }

    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            LatencyQuality::Excellent => (50, 205, 50),
            LatencyQuality::Good => (154, 205, 50),
            LatencyQuality::Fair => (255, 215, 0),
            LatencyQuality::Poor => (255, 69, 0),
        }
    }
}

// ============================================================================
// Connection score
// ============================================================================

/// Overall rating derived from the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Rating::Excellent
        } else if score >= 70.0 {
            Rating::Good
        } else if score >= 50.0 {
            Rating::Fair
        } else if score >= 30.0 {
            Rating::Poor
        } else {
            Rating::VeryPoor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::Good => "Good",
            Rating::Fair => "Fair",
            Rating::Poor => "Poor",
            Rating::VeryPoor => "Very Poor",
        }
    }

    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Rating::Excellent => (50, 205, 50),
            Rating::Good => (154, 205, 50),
            Rating::Fair => (255, 215, 0),
            Rating::Poor => (255, 140, 0),
            Rating::VeryPoor => (255, 69, 0),
        }
    }
}

/// Weighted connection health score out of 100.
///
/// Latency contributes up to 40 points, jitter up to 30, packet loss up
/// to 30. A missing latency sample scores 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionQuality {
    pub score: f64,
    pub rating: Rating,
}

impl ConnectionQuality {
    pub fn from_stats(stats: &LatencyStats) -> Self {
        let latency_score = (40.0 - stats.avg_ms / 5.0).max(0.0);
        let jitter_score = (30.0 - stats.jitter_ms() * 0.6).max(0.0);
        let loss_score = (30.0 - stats.loss_pct * 3.0).max(0.0);
        let score = (latency_score + jitter_score + loss_score).clamp(0.0, 100.0);
        ConnectionQuality {
            score,
            rating: Rating::from_score(score),
        }
    }

    /// Known issues worth surfacing in the diagnostics report.
    pub fn issues(stats: &LatencyStats) -> Vec<String> {
        let mut issues = Vec::new();
        if stats.avg_ms > 100.0 {
            issues.push(format!("high latency ({:.0} ms average)", stats.avg_ms));
        }
        if stats.jitter_ms() > 20.0 {
            issues.push(format!("high jitter ({:.1} ms)", stats.jitter_ms()));
        }
        if stats.loss_pct > 1.0 {
            issues.push(format!("packet loss ({:.1}%)", stats.loss_pct));
        }
        issues
    }
}

/// Format a score with its rating, colored for the terminal.
pub fn format_score_with_rating(quality: &ConnectionQuality) -> String {
    let (r, g, b) = quality.rating.color();
    format!(
        "{:.0}/100 ({})",
        quality.score,
        quality.rating.label().truecolor(r, g, b).bold()
    )
}

/// Format a signal percentage with its label, colored for the terminal.
pub fn format_signal(pct: f64) -> String {
    let quality = SignalQuality::from_pct(pct);
    let (r, g, b) = quality.color();
    format!("{:.0}% ({})", pct, quality.label().truecolor(r, g, b))
}
