//! Rename command - rewrite a symbol in every project that can see it

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;

use super::{cancel_on_ctrl_c, locate};
use crate::app::App;
use crate::cli::response::FileChangeOutput;
use crate::infra::manifest;
use crate::infra::tokenizer::is_valid_identifier;
use crate::services::references::ReferenceService;

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// File path with position (file:line:column)
    pub location: String,

    /// New name for the symbol
    pub new_name: String,

    /// Preview changes without applying
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct RenameResponse {
    old_name: Option<String>,
    new_name: String,
    dry_run: bool,
    affected_files: usize,
    changes: Vec<FileChangeOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl RenameResponse {
    fn unchanged(old_name: Option<String>, new_name: String, message: &str) -> Self {
        Self {
            old_name,
            new_name,
            dry_run: true,
            affected_files: 0,
            changes: vec![],
            message: Some(message.to_string()),
        }
    }
}

pub async fn execute(args: RenameArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    if !is_valid_identifier(&args.new_name) {
        bail!("'{}' is not a valid identifier", args.new_name);
    }

    let (loaded, service) = app.reference_service().await?;
    let (document, offset) = locate(&service, &args.location).await?;

    let Some(candidate) = service.candidate_at(&document, offset).await? else {
        ctx.print_success_flat(RenameResponse::unchanged(
            None,
            args.new_name,
            "No symbol at this position",
        ));
        return Ok(());
    };

    let new_name = args.new_name.clone();
    let Some(plan) = service
        .change_all_symbol_references(&document, candidate.span, Box::new(move |_| new_name))
        .await?
    else {
        ctx.print_success_flat(RenameResponse::unchanged(
            Some(candidate.name().to_string()),
            args.new_name,
            "Symbol cannot be renamed from this position",
        ));
        return Ok(());
    };

    if plan.original_text() == plan.new_text() {
        ctx.print_success_flat(RenameResponse::unchanged(
            Some(plan.original_text().to_string()),
            args.new_name,
            "Symbol is already named the same. No changes needed.",
        ));
        return Ok(());
    }

    let cancel = cancel_on_ctrl_c();
    let current = service.store().current().await;

    // A linked file is one file on disk; count its edits once
    let mut edits: BTreeMap<PathBuf, usize> = BTreeMap::new();
    for (id, uses) in plan.locations(&current, &cancel).await? {
        edits.entry(id.path).or_insert(uses.len());
    }

    if !args.dry_run {
        let updated = service.commit(&plan, &cancel).await?;
        let written = manifest::write_changed_documents(&loaded.solution, &updated).await?;
        edits.retain(|path, _| written.contains(path));
    }

    let changes: Vec<FileChangeOutput> = edits
        .iter()
        .map(|(path, count)| FileChangeOutput::new(path, *count, ctx))
        .collect();

    ctx.print_success_flat(RenameResponse {
        old_name: Some(plan.original_text().to_string()),
        new_name: args.new_name,
        dry_run: args.dry_run,
        affected_files: changes.len(),
        changes,
        message: None,
    });
    Ok(())
}
