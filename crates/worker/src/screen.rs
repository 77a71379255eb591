use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use twscreen_core::domain::record::Category;
use twscreen_core::llm::prompt::{screening_request, ScreenParams, ScreeningCriteria};
use twscreen_core::llm::GenerationClient;
use twscreen_core::screening::{run_category, run_screening, ScreeningPlan, ScreeningResults};
use twscreen_core::stream::ScanMode;

/// What the worker prints or saves: the result set plus run metadata. A report file is also
/// the input of `more` and `allocate`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningReport {
    pub generated_at: DateTime<Utc>,
    /// Error text per category that did not complete.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, String>,
    #[serde(flatten)]
    pub results: ScreeningResults,
}

pub struct FollowUp {
    pub category: Category,
    pub count: usize,
    pub loosen: bool,
}

pub async fn screen(
    client: Arc<dyn GenerationClient>,
    criteria: &ScreeningCriteria,
    count: usize,
    scan_mode: ScanMode,
    require_all: bool,
) -> anyhow::Result<ScreeningReport> {
    let plan = ScreeningPlan::new(criteria, count, scan_mode);
    let mut results = ScreeningResults::default();

    let outcome = run_screening(client, plan, &mut results).await;

    let mut failures = BTreeMap::new();
    for (category, err) in outcome.failures() {
        tracing::error!(%category, error = %format!("{err:#}"), "category screening failed");
        failures.insert(category.to_string(), format!("{err:#}"));
    }
    for category in Category::ALL {
        tracing::info!(
            %category,
            stocks = results.stocks(category).len(),
            summary = results.message(category).is_some(),
            "category finished"
        );
    }

    if require_all || failures.len() == Category::ALL.len() {
        outcome.into_result()?;
    }

    Ok(ScreeningReport {
        generated_at: Utc::now(),
        failures,
        results,
    })
}

/// Extends a saved report with one more batch for a single category.
pub async fn more(
    client: Arc<dyn GenerationClient>,
    criteria: &ScreeningCriteria,
    report_path: &Path,
    params: FollowUp,
    scan_mode: ScanMode,
) -> anyhow::Result<()> {
    let mut report: ScreeningReport = crate::read_json(report_path)?;
    let category = params.category;

    let exclude = report.results.excluded_tickers(category);
    let request = screening_request(&ScreenParams {
        category,
        criteria,
        exclude_tickers: &exclude,
        count: params.count,
        loosen: params.loosen,
    });

    let before = report.results.stocks(category).len();
    // A stale "too few results" note would contradict the new batch.
    report.results.set_message(category, None);

    // Records delivered before a failure stay in the report.
    let result = run_category(client, category, request, scan_mode, &mut report.results)
        .await
        .with_context(|| format!("follow-up screening for {category} failed"));

    tracing::info!(
        %category,
        added = report.results.stocks(category).len() - before,
        loosen = params.loosen,
        ok = result.is_ok(),
        "follow-up finished"
    );

    match &result {
        Ok(()) => {
            report.failures.remove(category.as_str());
        }
        Err(err) => {
            report
                .failures
                .insert(category.as_str().to_string(), format!("{err:#}"));
        }
    }
    report.generated_at = Utc::now();
    crate::write_json(report_path, &report)?;
    result
}
