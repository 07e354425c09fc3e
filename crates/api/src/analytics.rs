use serde::{Deserialize, Serialize};

/// Aggregate counters for the current user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsOverview {
    /// Number of user messages sent.
    pub total_queries: u64,
    /// Number of uploaded documents.
    pub total_documents: u64,
    /// Mean generation latency, in seconds.
    pub avg_response_time: f64,
    /// Tokens consumed by generation.
    pub total_tokens_used: u64,
    /// Accumulated cost, in dollars.
    pub total_cost: f64,
}

/// Usage of a single day.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageStats {
    /// The day, as `YYYY-MM-DD`.
    pub date: String,
    /// Number of queries that day.
    pub queries: u64,
    /// Tokens consumed that day.
    pub tokens: u64,
}
