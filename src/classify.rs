//! Heuristic query intent classification.
//!
//! [`classify`] is a pure function: first-match-wins over an ordered list of
//! keyword rules. Rule order matters — performance terms are checked before
//! troubleshooting terms so "sync is slow" is not treated as a sync failure,
//! and known-issue terms are checked before sharing terms so problematic
//! shared-folder reports land on the right intent.
//!
//! Each intent carries one static [`IntentProfile`] holding its source
//! preference, doc-type affinities, and ensure-term vocabulary, so the
//! ranker and synthesizer read one auditable table instead of scattered
//! conditionals.

use serde::Serialize;

/// Closed set of query intents, derived purely from the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    ProductSetup,
    Troubleshooting,
    Billing,
    AdvancedFeatures,
    Performance,
    FeatureUsage,
    Developer,
    Security,
    Sharing,
    KnownIssue,
    Comparison,
    Cancellation,
    TechnicalIssue,
    Other,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::ProductSetup => "product_setup",
            QueryType::Troubleshooting => "troubleshooting",
            QueryType::Billing => "billing",
            QueryType::AdvancedFeatures => "advanced_features",
            QueryType::Performance => "performance",
            QueryType::FeatureUsage => "feature_usage",
            QueryType::Developer => "developer",
            QueryType::Security => "security",
            QueryType::Sharing => "sharing",
            QueryType::KnownIssue => "known_issue",
            QueryType::Comparison => "comparison",
            QueryType::Cancellation => "cancellation",
            QueryType::TechnicalIssue => "technical_issue",
            QueryType::Other => "other",
        }
    }

    /// The static heuristic profile for this intent.
    pub const fn profile(self) -> &'static IntentProfile {
        use SourcePreference::*;
        match self {
            QueryType::ProductSetup => &IntentProfile {
                prefers: Docs,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["cloudsync.com/signup", "email address", "confirmation email"],
            },
            QueryType::Troubleshooting => &IntentProfile {
                prefers: Tickets,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["internet connection", "system tray", "restart application"],
            },
            QueryType::Billing => &IntentProfile {
                prefers: Neither,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["billing history", "account settings", "refund policy"],
            },
            QueryType::AdvancedFeatures => &IntentProfile {
                prefers: Neither,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["version history", "right-click", "30 days", "Pro accounts"],
            },
            QueryType::Performance => &IntentProfile {
                prefers: Tickets,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["bandwidth throttling", "settings", "network", "version"],
            },
            QueryType::FeatureUsage => &IntentProfile {
                prefers: Docs,
                doc_type_affinity: &["advanced", "user_guide", "mobile"],
                affinity_boost: 1.05,
                ensure_terms: &["right-click", "share", "email addresses", "permission levels"],
            },
            QueryType::Developer => &IntentProfile {
                prefers: Docs,
                doc_type_affinity: &["developer"],
                affinity_boost: 1.10,
                ensure_terms: &["REST API", "OAuth", "rate limits", "SDK"],
            },
            QueryType::Security => &IntentProfile {
                prefers: Docs,
                doc_type_affinity: &["security"],
                affinity_boost: 1.10,
                ensure_terms: &["AES-256", "encryption", "zero-knowledge", "two-factor"],
            },
            QueryType::Sharing => &IntentProfile {
                prefers: Tickets,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["right-click", "share", "email addresses", "permission levels"],
            },
            QueryType::KnownIssue => &IntentProfile {
                prefers: Tickets,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["known issue", "development team", "UI bug"],
            },
            QueryType::Comparison => &IntentProfile {
                prefers: Docs,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["5GB", "unlimited storage", "$9.99", "version history"],
            },
            QueryType::Cancellation => &IntentProfile {
                prefers: Docs,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["end of billing period", "downgrade", "5GB limit", "read-only"],
            },
            QueryType::TechnicalIssue => &IntentProfile {
                prefers: Tickets,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &["large photos", "memory", "app version", "update"],
            },
            QueryType::Other => &IntentProfile {
                prefers: Neither,
                doc_type_affinity: &[],
                affinity_boost: 1.0,
                ensure_terms: &[],
            },
        }
    }
}

/// Whether an intent leans toward official docs or support tickets when
/// scoring candidates. Matching chunks get an extra ×1.08.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePreference {
    Docs,
    Tickets,
    Neither,
}

/// Per-intent scoring knobs and answer vocabulary.
pub struct IntentProfile {
    pub prefers: SourcePreference,
    /// Doc-type substrings this intent favors. `affinity_boost` is applied
    /// at most once, however many of them the chunk's doc-type contains.
    pub doc_type_affinity: &'static [&'static str],
    pub affinity_boost: f64,
    /// Concept terms expected in a good answer for this intent.
    pub ensure_terms: &'static [&'static str],
}

fn any(s: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| s.contains(n))
}

/// Tag a query with one intent. Deterministic, stateless, first-match-wins.
pub fn classify(query: &str) -> QueryType {
    let s = query.to_lowercase();
    if any(&s, &["sign up", "create account", "signup", "register"]) {
        return QueryType::ProductSetup;
    }
    // Performance before troubleshooting when both appear
    if any(&s, &["slow", "performance", "lag", "bandwidth", "throttling"]) {
        return QueryType::Performance;
    }
    if any(
        &s,
        &["not syncing", "aren't syncing", "troubleshoot", "fix", "isn't syncing"],
    ) {
        return QueryType::Troubleshooting;
    }
    if any(
        &s,
        &["billing", "charged", "subscription", "refund", "downgrade", "cancel"],
    ) {
        if s.contains("cancel") {
            return QueryType::Cancellation;
        }
        return QueryType::Billing;
    }
    if any(&s, &["advanced", "version history", "selective sync", "sharing"]) {
        return QueryType::AdvancedFeatures;
    }
    if any(
        &s,
        &["how do i", "how can i", "where do i", "feature", "previous versions", "version"],
    ) {
        return QueryType::FeatureUsage;
    }
    if any(&s, &["api", "sdk", "developer", "oauth", "webhook"]) {
        return QueryType::Developer;
    }
    if any(
        &s,
        &["secure", "security", "encryption", "two-factor", "2fa", "privacy"],
    ) {
        return QueryType::Security;
    }
    // Known issue before sharing to capture problematic shared-folder reports
    if any(
        &s,
        &["known issue", "bug", "can't see", "not visible", "investigating"],
    ) {
        return QueryType::KnownIssue;
    }
    if any(&s, &["crash", "crashing", "mobile app", "app crashes"]) {
        return QueryType::TechnicalIssue;
    }
    if any(&s, &["share ", "shared folder", "permission"]) {
        return QueryType::Sharing;
    }
    if any(&s, &["difference", "compare", "free vs", "free and pro"]) {
        return QueryType::Comparison;
    }
    QueryType::Other
}
