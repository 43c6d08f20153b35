//! Status command implementation
//!
//! Show the solution layout and effective settings.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::app::App;
use crate::config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// List the documents of each project
    #[arg(long)]
    pub detailed: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    manifest: String,
    loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    projects: Vec<ProjectInfo>,
    settings: SettingsInfo,
}

#[derive(Serialize)]
struct ProjectInfo {
    name: String,
    document_count: usize,
    references: Vec<String>,
    dependents: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    defines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    documents: Option<Vec<String>>,
}

#[derive(Serialize)]
struct SettingsInfo {
    lookup: String,
    rename_strategy: String,
    max_concurrent_projects: usize,
}

pub async fn execute(args: StatusArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let settings = SettingsInfo {
        lookup: format!("{:?}", config::lookup_kind()).to_lowercase(),
        rename_strategy: format!("{:?}", config::apply_strategy()).to_lowercase(),
        max_concurrent_projects: config::max_concurrent_projects(),
    };

    let (loaded, error, projects) = match app.load_solution().await {
        Ok(loaded) => {
            let solution = &loaded.solution;
            let projects = solution
                .projects()
                .map(|project| ProjectInfo {
                    name: project.id().to_string(),
                    document_count: project.documents().len(),
                    references: project
                        .config()
                        .references
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    dependents: solution
                        .dependent_projects(project.id())
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    defines: project.config().defines.clone(),
                    documents: args.detailed.then(|| {
                        project
                            .documents()
                            .iter()
                            .map(|d| ctx.relative_path(d.path()))
                            .collect()
                    }),
                })
                .collect();
            (true, None, projects)
        }
        Err(e) => (false, Some(e.to_string()), vec![]),
    };

    ctx.print_success_flat(StatusResponse {
        manifest: ctx.relative_path(app.manifest_path()),
        loaded,
        error,
        projects,
        settings,
    });
    Ok(())
}
