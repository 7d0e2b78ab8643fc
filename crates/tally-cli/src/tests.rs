use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tally_core::media::MediaUploader;
use tally_core::sync::{EntityPushReport, PushOutcome, PushSummary};
use tally_core::{EntityType, MutationAction, RecordId};

use crate::cli::{parse_entity, Cli, Commands, CompletionShell};
use crate::commands::common::{
    format_relative_time, format_request_lines, format_sync_timestamp, parse_mutation_data,
    read_payload, resolve_db_path, MediaBackend,
};
use crate::commands::completions::run_completions;
use crate::commands::push::{describe_outcome, describe_summary, report_to_item};
use crate::commands::record::record_mutation;
use crate::commands::run::resolve_interval;
use crate::commands::status::collect_status;
use crate::error::CliError;

#[test]
fn parse_entity_accepts_wire_names() {
    assert_eq!(parse_entity("stock-history").unwrap(), EntityType::StockHistory);
    assert_eq!(parse_entity("ORDERS").unwrap(), EntityType::Orders);

    let error = parse_entity("invoices").unwrap_err();
    assert!(error.contains("invoices"));
    assert!(error.contains("ads-report"));
}

#[test]
fn cli_parses_push_with_repeated_entities() {
    let cli = Cli::parse_from([
        "tally", "push", "--entity", "orders", "-e", "products", "--json",
    ]);
    match cli.command {
        Commands::Push { entities, json } => {
            assert_eq!(entities, vec![EntityType::Orders, EntityType::Products]);
            assert!(json);
        }
        _ => panic!("expected push command"),
    }
}

#[test]
fn cli_db_path_is_global() {
    let cli = Cli::parse_from(["tally", "status", "--db-path", "/tmp/pos.db"]);
    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/pos.db")));
}

#[test]
fn resolve_db_path_prefers_explicit_path() {
    let explicit = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn parse_mutation_data_validates_shape() {
    assert!(parse_mutation_data(MutationAction::Insert, r#"{"total": 12}"#).is_ok());
    assert!(matches!(
        parse_mutation_data(MutationAction::Insert, "  "),
        Err(CliError::InvalidData(_))
    ));
    assert!(matches!(
        parse_mutation_data(MutationAction::Insert, "[1, 2]"),
        Err(CliError::InvalidData(_))
    ));
    assert!(matches!(
        parse_mutation_data(MutationAction::Insert, "{not json"),
        Err(CliError::InvalidData(_))
    ));

    assert!(parse_mutation_data(
        MutationAction::Update,
        r#"{"filter": {"_id": "p1"}, "update": {"$set": {"price": 40}}}"#
    )
    .is_ok());
    let error = parse_mutation_data(MutationAction::Update, r#"{"filter": {"_id": "p1"}}"#)
        .unwrap_err();
    assert!(error.to_string().contains("update"));
}

#[test]
fn read_payload_passes_through_literal_json() {
    assert_eq!(read_payload(r#"{"a":1}"#).unwrap(), r#"{"a":1}"#);
}

#[test]
fn resolve_interval_prefers_flag_over_config() {
    assert_eq!(
        resolve_interval(Some(5), Some(Duration::from_secs(60))).unwrap(),
        Duration::from_secs(5)
    );
    assert_eq!(
        resolve_interval(None, Some(Duration::from_secs(60))).unwrap(),
        Duration::from_secs(60)
    );
    assert!(matches!(
        resolve_interval(None, None),
        Err(CliError::Config(_))
    ));
    assert!(matches!(
        resolve_interval(Some(0), None),
        Err(CliError::Config(_))
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_request_lines_include_key_fields() {
    let mut request = tally_core::SyncRequest::new(EntityType::CashDrawerTxns);
    request.last_sync = 0;
    let rendered = format_request_lines(&[request.clone()], 3 * 60_000);

    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].starts_with(&request.id.to_string()));
    assert!(rendered[0].contains("cash-drawer-txns"));
    assert!(rendered[0].contains("pending"));
    assert!(rendered[0].contains("3m ago"));
}

#[test]
fn describe_outcomes_for_humans() {
    let request_id: RecordId = "65f1c0ffee00112233445566".parse().unwrap();
    assert_eq!(
        describe_outcome(&PushOutcome::NothingToPush),
        "nothing to push"
    );
    assert_eq!(
        describe_outcome(&PushOutcome::HeldBack {
            request_id,
            pages: 0,
            operations: 0,
            held: 40,
        }),
        "request 65f1c0ffee00112233445566 pushed 0 ops, holding back 40"
    );

    let summary = PushSummary {
        entity: EntityType::Orders,
        resumed: Some(PushOutcome::AlreadyAccepted {
            request_id,
            operations: 3,
        }),
        fresh: PushOutcome::NothingToPush,
    };
    assert_eq!(
        describe_summary(&summary),
        "resumed request 65f1c0ffee00112233445566 already accepted (3 ops); nothing to push"
    );
}

#[test]
fn report_items_flag_failures() {
    let failed = EntityPushReport {
        entity: EntityType::Products,
        result: Err(tally_core::Error::Api("HTTP 503".to_string())),
    };
    let item = report_to_item(&failed);
    assert_eq!(item.entity, "products");
    assert!(!item.pushed);
    assert!(item.detail.contains("HTTP 503"));
}

#[test]
fn completions_are_generated_to_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("tally.bash");

    run_completions(CompletionShell::Bash, Some(&path)).unwrap();

    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.contains("tally"));
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_media_backend_refuses_uploads() {
    let result = MediaBackend::Disabled
        .upload("file:///tmp/a.png", "products")
        .await;
    assert!(matches!(result, Err(tally_core::Error::Storage(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn record_then_status_reports_pending_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("tally.db");

    record_mutation(
        EntityType::Orders,
        MutationAction::Insert,
        r#"{"total": 120, "items": 3}"#,
        &db_path,
    )
    .await
    .unwrap();
    record_mutation(
        EntityType::Orders,
        MutationAction::Update,
        r#"{"filter": {"_id": "o1"}, "update": {"$set": {"paid": true}}}"#,
        &db_path,
    )
    .await
    .unwrap();

    let status = collect_status(&db_path).await.unwrap();
    assert_eq!(status.len(), EntityType::ALL.len());

    let orders = status
        .iter()
        .find(|item| item.entity == "orders")
        .unwrap();
    assert_eq!(orders.pending, 2);
    assert_eq!(orders.outstanding_request, None);

    let customers = status
        .iter()
        .find(|item| item.entity == "customer")
        .unwrap();
    assert_eq!(customers.pending, 0);
}
