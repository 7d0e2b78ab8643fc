pub mod common;
pub mod completions;
pub mod media;
pub mod push;
pub mod record;
pub mod requests;
pub mod run;
pub mod status;
