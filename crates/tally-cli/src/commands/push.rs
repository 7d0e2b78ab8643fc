use std::path::Path;

use serde::Serialize;
use tally_core::sync::{EntityPushReport, PushOutcome, PushSummary};
use tally_core::EntityType;

use crate::commands::common::{build_orchestrator, load_sync_config};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct PushReportItem {
    pub entity: String,
    pub pushed: bool,
    pub detail: String,
}

pub async fn run_push(
    entities: &[EntityType],
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = load_sync_config()?;
    let orchestrator = build_orchestrator(db_path, &config).await?;

    let entities = if entities.is_empty() {
        orchestrator.profiles().entities().collect::<Vec<_>>()
    } else {
        entities.to_vec()
    };
    let reports = orchestrator.prepare_for_update(&entities).await;

    let items = reports.iter().map(report_to_item).collect::<Vec<_>>();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            let marker = if item.pushed { "ok  " } else { "FAIL" };
            println!("{marker}  {:<22}  {}", item.entity, item.detail);
        }
    }

    let failed = reports
        .iter()
        .filter(|report| report.result.is_err())
        .count();
    if failed > 0 {
        return Err(CliError::PushFailed(failed));
    }
    Ok(())
}

pub fn report_to_item(report: &EntityPushReport) -> PushReportItem {
    let detail = match &report.result {
        Ok(summary) => describe_summary(summary),
        Err(error) => format!("error: {error}"),
    };
    PushReportItem {
        entity: report.entity.to_string(),
        pushed: report.is_pushed(),
        detail,
    }
}

pub fn describe_summary(summary: &PushSummary) -> String {
    match &summary.resumed {
        Some(resumed) => format!(
            "resumed {}; {}",
            describe_outcome(resumed),
            describe_outcome(&summary.fresh)
        ),
        None => describe_outcome(&summary.fresh),
    }
}

pub fn describe_outcome(outcome: &PushOutcome) -> String {
    match outcome {
        PushOutcome::NothingToPush => "nothing to push".to_string(),
        PushOutcome::AlreadyAccepted {
            request_id,
            operations,
        } => format!("request {request_id} already accepted ({operations} ops)"),
        PushOutcome::Pushed {
            request_id,
            pages,
            operations,
        } => format!("request {request_id} pushed {operations} ops in {pages} page(s)"),
        PushOutcome::HeldBack {
            request_id,
            operations,
            held,
            ..
        } => format!("request {request_id} pushed {operations} ops, holding back {held}"),
    }
}
