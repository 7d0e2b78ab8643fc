use std::path::Path;

use chrono::Utc;
use tally_core::EntityType;

use crate::commands::common::{format_request_lines, open_store, request_to_item, RequestListItem};
use crate::error::CliError;

pub async fn run_requests(
    entity: Option<EntityType>,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let requests = store.list_requests(entity, limit).await?;

    if as_json {
        let json_items = requests
            .iter()
            .map(request_to_item)
            .collect::<Vec<RequestListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if requests.is_empty() {
        println!("No sync requests recorded.");
        return Ok(());
    }

    for line in format_request_lines(&requests, Utc::now().timestamp_millis()) {
        println!("{line}");
    }
    Ok(())
}
