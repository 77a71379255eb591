use std::path::Path;
use twscreen_core::advice::{analyze_stock, plan_allocation};
use twscreen_core::domain::analysis::{AllocationPlan, AllocationRequest, SingleStockAnalysis};
use twscreen_core::llm::error::LlmDiagnosticsError;
use twscreen_core::llm::GenerationClient;

use crate::screen::ScreeningReport;

pub async fn single_stock(
    client: &dyn GenerationClient,
    ticker: &str,
) -> anyhow::Result<SingleStockAnalysis> {
    analyze_stock(client, ticker).await.inspect_err(log_diagnostics)
}

pub async fn allocate(
    client: &dyn GenerationClient,
    report_path: &Path,
    amount: f64,
    ratio: u8,
) -> anyhow::Result<AllocationPlan> {
    let request = AllocationRequest::new(amount, ratio)?;
    let report: ScreeningReport = crate::read_json(report_path)?;
    let candidates = report.results.allocation_candidates();

    plan_allocation(client, &request, &candidates)
        .await
        .inspect_err(log_diagnostics)
}

fn log_diagnostics(err: &anyhow::Error) {
    if let Some(diag) = err.downcast_ref::<LlmDiagnosticsError>() {
        tracing::error!(
            stage = diag.stage.as_str(),
            detail = %diag.detail,
            raw_output = diag.raw_output.as_deref().unwrap_or(""),
            "generation diagnostics"
        );
    }
}
