use std::path::Path;

use tally_core::{EntityType, MutationAction, MutationLogEntry};

use crate::commands::common::{open_store, parse_mutation_data, read_payload};
use crate::error::CliError;

pub async fn run_record(
    entity: EntityType,
    action: MutationAction,
    data: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let payload = read_payload(data)?;
    let entry = record_mutation(entity, action, &payload, db_path).await?;
    println!("Recorded {} {} ({})", entry.action, entry.table_name, entry.id);
    Ok(())
}

pub async fn record_mutation(
    entity: EntityType,
    action: MutationAction,
    payload: &str,
    db_path: &Path,
) -> Result<MutationLogEntry, CliError> {
    let data = parse_mutation_data(action, payload)?;
    let store = open_store(db_path).await?;
    Ok(store.record_mutation(entity, action, data).await?)
}
