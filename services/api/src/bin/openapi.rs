//! services/api/src/bin/openapi.rs
//!
//! Dumps the OpenAPI document for the mail triage API, so clients can be
//! generated without starting the server.
//!
//! Usage: `openapi [PATH]`, writing to `openapi.json` when no path is given.

use api_lib::web::ApiDoc;
use std::path::{Path, PathBuf};
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn write_document(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(path, json)?;
    println!("Wrote the OpenAPI document to {}", path.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    write_document(&path)
}
