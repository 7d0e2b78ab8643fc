use tally_core::storage::{R2Config, R2Storage};

use crate::error::CliError;

pub async fn run_media_check() -> Result<(), CliError> {
    let Some(config) = R2Config::from_env()? else {
        return Err(CliError::MediaNotConfigured);
    };

    let storage = R2Storage::new(config);
    storage.bucket_is_reachable().await?;
    println!("R2 bucket '{}' is reachable", storage.config().bucket);
    match &storage.config().public_base_url {
        Some(url) => println!("Public media URL base: {url}"),
        None => println!("Warning: R2_PUBLIC_BASE_URL is not set; uploads will not produce URLs"),
    }
    Ok(())
}
