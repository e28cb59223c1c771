//! Weekly recommendation run
//!
//! Picks the newest weekly snapshot that has no recommendation yet, pulls
//! strategy notes relevant to its weakest figures from the knowledge base and
//! asks the configured model for one follow-up recommendation.

use super::knowledge_base::KnowledgeBase;
use super::prompt::{
    build_prompt, format_kpi_text, retrieval_query, slowest_hours, PromptInput, CONTEXT_SEPARATOR,
    FIXED_QUERIES,
};
use crate::analytics::model::AnalyticsReport;
use crate::analytics::store;
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::AppResult;
use crate::llm::provider::{CompletionRequest, LlmProvider, Message};
use crate::observability::metrics::metrics;
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};

const NO_PREVIOUS_RECOMMENDATION: &str = "N/A (First week of data)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommendationOutcome {
    /// Every weekly snapshot already has a recommendation
    NothingPending,
    Stored { report_id: i64 },
    /// The model failed or answered with nothing; the snapshot is untouched
    Failed { report_id: i64, reason: String },
}

/// Run each query against the knowledge base and join the distinct hits
pub fn retrieve_context(kb: &KnowledgeBase, report: &AnalyticsReport, k: usize) -> (String, usize) {
    let base_query = retrieval_query(report, &slowest_hours(report));
    let mut seen = HashSet::new();
    let mut chunks = Vec::new();
    for query in std::iter::once(base_query.as_str()).chain(FIXED_QUERIES) {
        for chunk in kb.similarity_search(query, k) {
            if seen.insert(chunk) {
                chunks.push(chunk);
            }
        }
    }
    (chunks.join(CONTEXT_SEPARATOR), chunks.len())
}

/// Build the full prompt for `target`, given the week before it
pub fn prompt_for(
    kb: &KnowledgeBase,
    target: &AnalyticsReport,
    previous: Option<&AnalyticsReport>,
    k: usize,
) -> String {
    let kpi_text = format_kpi_text(target);
    let previous_recommendation = match previous {
        Some(report) => report.recommendation.as_deref().unwrap_or("N/A"),
        None => NO_PREVIOUS_RECOMMENDATION,
    };
    let previous_status = previous
        .map(|report| report.recommendation_status_display)
        .unwrap_or("N/A");

    let (context, retrieved) = retrieve_context(kb, target, k);
    info!(retrieved, "Retrieved unique knowledge base chunks");

    build_prompt(&PromptInput {
        kpi_text: &kpi_text,
        previous_recommendation,
        previous_status,
        context: &context,
        week_start: target.start_date,
    })
}

/// Generate and store the recommendation for the newest weekly snapshot
/// that lacks one. A missing knowledge base is an error; a failed model call
/// is reported through the outcome.
pub async fn generate_weekly_recommendation(
    db: &Database,
    provider: &dyn LlmProvider,
    config: &AppConfig,
) -> AppResult<RecommendationOutcome> {
    let kb = KnowledgeBase::load(&config.recommendation).await?;

    let (target, previous) = db.read(|conn| {
        let Some(target) = store::latest_weekly_without_recommendation(conn)? else {
            return Ok((None, None));
        };
        let previous = store::previous_weekly(conn, target.start_date)?;
        Ok((Some(target), previous))
    })?;

    let Some(target) = target else {
        warn!("No new weekly reports found needing a recommendation");
        return Ok(RecommendationOutcome::NothingPending);
    };

    info!(
        report_id = target.id,
        start = %target.start_date,
        end = %target.end_date,
        "Generating weekly recommendation"
    );

    let prompt = prompt_for(&kb, &target, previous.as_ref(), config.recommendation.top_k);
    let request = CompletionRequest {
        messages: vec![Message::user(prompt)],
        model: config.llm.model.clone(),
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
        metadata: HashMap::from([("report_id".to_string(), target.id.to_string())]),
    };

    let reason = match provider.complete(request).await {
        Ok(response) => {
            let text = response.content.unwrap_or_default().trim().to_string();
            if !text.is_empty() {
                db.write(|tx| store::store_recommendation(tx, target.id, &text))?;
                metrics().recommendation_generated();
                info!(
                    report_id = target.id,
                    provider = provider.name(),
                    chars = text.len(),
                    "Recommendation saved"
                );
                return Ok(RecommendationOutcome::Stored {
                    report_id: target.id,
                });
            }
            "model returned an empty recommendation".to_string()
        }
        Err(e) => e.to_string(),
    };

    error!(report_id = target.id, %reason, "Failed to generate recommendation");
    metrics().recommendation_failed();
    Ok(RecommendationOutcome::Failed {
        report_id: target.id,
        reason,
    })
}
