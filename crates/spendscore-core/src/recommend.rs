//! Recommendation Adapter
//!
//! Turns a report into exactly three prioritized suggestions. When a backend
//! is available the findings are rendered into the recommendation prompt and
//! the reply is validated; every failure (no backend, timeout, backend error,
//! malformed reply) routes to the deterministic templates below.

use std::collections::HashMap;
use std::time::Duration;

use crate::ai::parsing::{parse_suggestions, SUGGESTION_COUNT};
use crate::ai::{AIBackend, RecommendationRequest};
use crate::error::{Error, Result};
use crate::models::{
    Evidence, MetricKind, MetricResult, Priority, Recommendation, RecommendationSource,
    SpendScoreReport,
};
use crate::prompts::{Prompt, PromptId, PromptLibrary};

/// Below this confidence the prompt asks for general advice
const LOW_CONFIDENCE: f64 = 0.7;

/// Used when a report has fewer scored metrics than suggestions
const GENERAL_ADVICE: &[&str] = &[
    "Keep every expense categorized so future scores reflect your real spending.",
    "Review recurring charges each month and cancel anything no longer used.",
    "Set a monthly budget per category and compare it with actual spend.",
];

pub struct RecommendationAdapter {
    prompt: Prompt,
    timeout: Duration,
}

impl RecommendationAdapter {
    /// Adapter using the installed prompt (data-dir override or embedded)
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::from_library(&mut PromptLibrary::new(), timeout)
    }

    pub fn from_library(library: &mut PromptLibrary, timeout: Duration) -> Result<Self> {
        let prompt = library.get(PromptId::SpendRecommendations)?.clone();
        Ok(Self { prompt, timeout })
    }

    /// Exactly three recommendations; never fails
    pub async fn recommend(
        &self,
        report: &SpendScoreReport,
        backend: Option<&dyn AIBackend>,
    ) -> Vec<Recommendation> {
        let Some(backend) = backend else {
            tracing::debug!("No AI backend configured, using fallback recommendations");
            return fallback_recommendations(report);
        };

        match self.generate(report, backend).await {
            Ok(recommendations) => {
                tracing::info!(model = backend.model(), "Generated recommendations");
                recommendations
            }
            Err(e) => {
                tracing::warn!(
                    model = backend.model(),
                    error = %e,
                    "Recommendation generation failed, using fallback"
                );
                fallback_recommendations(report)
            }
        }
    }

    async fn generate(
        &self,
        report: &SpendScoreReport,
        backend: &dyn AIBackend,
    ) -> Result<Vec<Recommendation>> {
        let request = RecommendationRequest::from_report(report, SUGGESTION_COUNT);
        let vars = prompt_vars(&request);
        let system = self.prompt.render_system(&vars);
        let user = self.prompt.render_user(&vars);

        let response = tokio::time::timeout(self.timeout, backend.generate(&system, &user))
            .await
            .map_err(|_| Error::Ai(format!("timed out after {:?}", self.timeout)))??;

        let suggestions = parse_suggestions(&response)?;
        Ok(suggestions
            .into_iter()
            .map(|(priority, text)| Recommendation {
                priority,
                text,
                source: RecommendationSource::Generated,
            })
            .collect())
    }
}

fn prompt_vars(request: &RecommendationRequest) -> HashMap<&'static str, String> {
    let summary = &request.summary;
    let mut vars = HashMap::new();
    vars.insert("score", request.overall_score.to_string());
    vars.insert("tier_label", request.tier_label.clone());
    vars.insert("transaction_count", summary.transaction_count.to_string());
    vars.insert("first_date", summary.first_date.to_string());
    vars.insert("last_date", summary.last_date.to_string());
    vars.insert("category_count", summary.category_count.to_string());
    vars.insert("vendor_count", summary.vendor_count.to_string());
    vars.insert("total_amount", format!("{:.2}", summary.total_amount));
    vars.insert("findings", request.findings_text());

    let trend = match &summary.spend_trend {
        Some(trend) => format!(
            "monthly spend is {} ({:+.2} per month), next month forecast {:.2}",
            trend.direction, trend.monthly_change, trend.next_month_forecast
        ),
        None => String::new(),
    };
    vars.insert("trend_note", trend);

    let note = if summary.confidence < LOW_CONFIDENCE {
        format!(
            "limited data (confidence {:.2}), keep suggestions general",
            summary.confidence
        )
    } else {
        String::new()
    };
    vars.insert("confidence_note", note);
    vars
}

/// Rule-based suggestions for the three lowest-scoring metrics
///
/// Priorities are High, Medium, Low in ascending score order; ties keep
/// breakdown order.
pub fn fallback_recommendations(report: &SpendScoreReport) -> Vec<Recommendation> {
    let texts = report
        .lowest_metrics(SUGGESTION_COUNT)
        .into_iter()
        .map(template_for)
        .chain(GENERAL_ADVICE.iter().map(|s| s.to_string()));

    Priority::by_rank()
        .iter()
        .zip(texts)
        .map(|(priority, text)| Recommendation {
            priority: *priority,
            text,
            source: RecommendationSource::Fallback,
        })
        .collect()
}

fn template_for(metric: &MetricResult) -> String {
    if metric.degraded {
        return format!(
            "{} could not be assessed from this data. Add complete dates, amounts and categories so it can be scored.",
            metric.name
        );
    }

    let stat = |label: &str| metric.stat(label).unwrap_or(0.0);

    match metric.kind {
        MetricKind::Frequency => format!(
            "Spending is uneven across periods (variation {:.0}% over {} periods). Schedule recurring payments and batch one-off purchases to smooth cash flow.",
            stat("coefficient_of_variation") * 100.0,
            stat("bucket_count")
        ),
        MetricKind::CategoryDiversity => format!(
            "Spend is concentrated in {} {}. Categorize expenses more precisely and check whether one area is crowding out the rest.",
            stat("category_count"),
            if stat("category_count") == 1.0 { "category" } else { "categories" }
        ),
        MetricKind::BudgetAdherence => {
            let worst = metric
                .evidence
                .iter()
                .filter_map(|e| match e {
                    Evidence::Stat { label, value } => label
                        .strip_prefix("deviation_pct:")
                        .map(|name| (name, *value)),
                    _ => None,
                })
                .max_by(|a, b| a.1.total_cmp(&b.1));
            match worst {
                Some((name, deviation)) => format!(
                    "Category shares are {:.0}% off their benchmarks on average, led by {} ({:.0}%). Set a budget for {} first.",
                    stat("mean_deviation_pct"),
                    name,
                    deviation,
                    name
                ),
                None => "Set per-category budgets and compare them with actual spend each month.".to_string(),
            }
        }
        MetricKind::Redundancy => format!(
            "{} possible duplicate charges and {} overlapping vendor groups make up {:.0}% of spend. Cancel duplicate subscriptions and consolidate vendors.",
            stat("duplicate_pairs"),
            stat("vendor_clusters"),
            stat("flagged_share") * 100.0
        ),
        MetricKind::SpikeDetection => {
            let largest = metric
                .flagged()
                .max_by(|a, b| a.amount.abs().total_cmp(&b.amount.abs()))
                .map(|f| format!(", the largest being {} on {} ({:.2})", f.vendor, f.date, f.amount))
                .unwrap_or_default();
            format!(
                "{} unusually large transactions make up {:.0}% of spend{}. Review them and require approval for one-off purchases above a set limit.",
                stat("spike_count"),
                stat("spike_share") * 100.0,
                largest
            )
        }
        MetricKind::WasteRatio => format!(
            "Discretionary categories take {:.0}% of spend. Trim non-essential purchases such as dining and entertainment.",
            stat("discretionary_share") * 100.0
        ),
    }
}
