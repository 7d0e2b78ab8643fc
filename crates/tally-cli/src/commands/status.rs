use std::path::Path;

use serde::Serialize;
use tally_core::EntityType;

use crate::commands::common::open_store;
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct EntityStatusItem {
    pub entity: String,
    pub pending: usize,
    pub outstanding_request: Option<String>,
    pub outstanding_status: Option<String>,
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let items = collect_status(db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for item in &items {
        let outstanding = match (&item.outstanding_request, &item.outstanding_status) {
            (Some(id), Some(status)) => format!("  outstanding {id} ({status})"),
            _ => String::new(),
        };
        println!("{:<22}  {:>5} pending{outstanding}", item.entity, item.pending);
    }
    Ok(())
}

pub async fn collect_status(db_path: &Path) -> Result<Vec<EntityStatusItem>, CliError> {
    let store = open_store(db_path).await?;
    let mut items = Vec::with_capacity(EntityType::ALL.len());

    for entity in EntityType::ALL {
        let pending = store.pending_count(entity).await?;
        let outstanding = store.find_latest_outstanding(entity).await?;
        items.push(EntityStatusItem {
            entity: entity.to_string(),
            pending,
            outstanding_request: outstanding.as_ref().map(|request| request.id.to_string()),
            outstanding_status: outstanding.map(|request| request.status.to_string()),
        });
    }

    Ok(items)
}
