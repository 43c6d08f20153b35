//! Command implementations for Symscope
//!
//! Each command is implemented in its own module.

pub mod config;
pub mod refs;
pub mod rename;
pub mod status;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::cli::ParsedLocation;
use crate::models::solution::DocumentId;
use crate::services::references::{DefaultReferenceService, ReferenceService};

/// Token cancelled on Ctrl-C
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupted, cancelling");
            child.cancel();
        }
    });
    token
}

/// Document and byte offset addressed by a `file:line[:column]` argument
pub(crate) async fn locate(
    service: &DefaultReferenceService,
    location: &str,
) -> Result<(DocumentId, usize)> {
    let loc = ParsedLocation::parse_absolute(location)?;
    let document = service.document_id_for_path(&loc.file).await?;
    let solution = service.store().current().await;
    let text = solution
        .document(&document)
        .map(|d| d.shared_text())
        .ok_or_else(|| anyhow::anyhow!("Document not found: {}", document))?;
    let offset = loc.offset_in(&text)?;
    Ok((document, offset))
}
