//! CLI command implementations.
//!
//! Each `run_*` function opens what it needs from the [`Config`], does its
//! work, prints to stdout, and closes its pools.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use vectcode_core::models::ProjectFilter;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::MetadataError;
use crate::extract::GoExtractor;
use crate::indexer::{IndexRequest, Indexer};
use crate::metadata::MetadataStore;
use crate::search::{print_results, search_code, SearchScope};
use crate::sqlite_store::SqliteVectorStore;

async fn open_metadata(config: &Config) -> Result<MetadataStore> {
    MetadataStore::open(&config.db.path)
        .await
        .with_context(|| format!("Failed to open metadata db {}", config.db.path.display()))
}

async fn open_vectors(config: &Config) -> Result<SqliteVectorStore> {
    SqliteVectorStore::open(&config.vector_store.path, config.vector_store.batch_size)
        .await
        .with_context(|| {
            format!(
                "Failed to open vector store {}",
                config.vector_store.path.display()
            )
        })
}

fn indexer(
    config: &Config,
    metadata: Arc<MetadataStore>,
    vectors: Arc<SqliteVectorStore>,
) -> Result<Indexer> {
    let embedder = create_embedder(&config.embedding)?;
    let extractor = GoExtractor::with_excludes(config.index.exclude_set()?);
    Ok(Indexer::new(
        Arc::new(extractor),
        Arc::from(embedder),
        vectors,
        metadata,
    ))
}

pub async fn run_init(config: &Config) -> Result<()> {
    let metadata = open_metadata(config).await?;
    let vectors = open_vectors(config).await?;
    metadata.close().await;
    vectors.close().await;
    println!("Metadata database: {}", config.db.path.display());
    println!("Vector store:      {}", config.vector_store.path.display());
    println!("Databases initialized successfully.");
    Ok(())
}

pub async fn run_index(config: &Config, request: &IndexRequest) -> Result<()> {
    let metadata = Arc::new(open_metadata(config).await?);
    let vectors = Arc::new(open_vectors(config).await?);
    let indexer = indexer(config, metadata.clone(), vectors.clone())?;

    let result = indexer.index_project(request).await;
    metadata.close().await;
    vectors.close().await;

    let report =
        result.with_context(|| format!("Failed to index project {}", request.name))?;
    println!(
        "Indexed {}: {} chunks from {} files{}",
        report.project,
        report.chunk_count,
        report.file_count,
        if report.cleaned { " (clean)" } else { "" }
    );
    if let Some(group) = report.group {
        println!("Group: {}", group);
    }
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    limit: usize,
    scope: &SearchScope,
) -> Result<()> {
    let metadata = open_metadata(config).await?;
    let vectors = open_vectors(config).await?;
    let embedder = create_embedder(&config.embedding)?;

    let results = search_code(
        embedder.as_ref(),
        &vectors,
        &metadata,
        query,
        limit,
        scope,
    )
    .await;
    metadata.close().await;
    vectors.close().await;

    print_results(&results?);
    Ok(())
}

pub async fn run_list(config: &Config, group: Option<String>, detailed: bool) -> Result<()> {
    let metadata = open_metadata(config).await?;
    let filter = ProjectFilter {
        group_name: group,
        ..Default::default()
    };
    let projects = metadata.list_projects(&filter).await?;
    metadata.close().await;

    if projects.is_empty() {
        println!("No projects indexed.");
        return Ok(());
    }

    for project in &projects {
        let group = project.group_name.as_deref().unwrap_or("-");
        println!(
            "{:<24} {:>6} chunks  group: {}",
            project.name, project.chunk_count, group
        );
        if detailed {
            println!("    path:         {}", project.path);
            println!("    language:     {}", project.language);
            if !project.description.is_empty() {
                println!("    description:  {}", project.description);
            }
            println!("    last indexed: {}", format_time(project.last_indexed_at));
        }
    }
    Ok(())
}

pub async fn run_info(config: &Config, name: &str) -> Result<()> {
    let metadata = open_metadata(config).await?;
    let result = async {
        let project = metadata.get_project(name).await?;
        metadata
            .refresh_file_mtimes(project.id, Path::new(&project.path))
            .await?;
        let files = metadata.list_files(project.id).await?;
        let stale = metadata.stale_files(project.id).await?;
        Ok::<_, MetadataError>((project, files.len(), stale.len()))
    }
    .await;
    metadata.close().await;
    let (project, file_count, stale_count) = result?;

    println!("Project:       {}", project.name);
    println!("Path:          {}", project.path);
    println!("Language:      {}", project.language);
    println!(
        "Group:         {}",
        project.group_name.as_deref().unwrap_or("-")
    );
    if !project.description.is_empty() {
        println!("Description:   {}", project.description);
    }
    println!("Chunks:        {}", project.chunk_count);
    println!("Files:         {}", file_count);
    println!("Stale files:   {}", stale_count);
    println!("Last indexed:  {}", format_time(project.last_indexed_at));
    println!("Last modified: {}", format_time(project.last_modified_at));
    Ok(())
}

pub async fn run_stale(config: &Config, name: &str) -> Result<()> {
    let metadata = open_metadata(config).await?;
    let result = async {
        let project = metadata.get_project(name).await?;
        metadata
            .refresh_file_mtimes(project.id, Path::new(&project.path))
            .await?;
        let stale = metadata.stale_files(project.id).await?;
        Ok::<_, MetadataError>(stale)
    }
    .await;
    metadata.close().await;
    let stale = result?;

    if stale.is_empty() {
        println!("No stale files in {}.", name);
        return Ok(());
    }
    for file in &stale {
        println!(
            "{}  modified {}  indexed {}",
            file.file_path,
            format_time(file.last_modified_at),
            format_time(file.last_indexed_at)
        );
    }
    println!("{} stale files.", stale.len());
    Ok(())
}

pub async fn run_delete(config: &Config, name: &str) -> Result<()> {
    let metadata = Arc::new(open_metadata(config).await?);
    let vectors = Arc::new(open_vectors(config).await?);
    let indexer = indexer(config, metadata.clone(), vectors.clone())?;

    let result = indexer.delete_project(name).await;
    metadata.close().await;
    vectors.close().await;
    result.with_context(|| format!("Failed to delete project {}", name))?;

    println!("Deleted project {}.", name);
    Ok(())
}

pub async fn run_group_create(config: &Config, name: &str, description: &str) -> Result<()> {
    let metadata = open_metadata(config).await?;
    let result = metadata.create_group(name, description).await;
    metadata.close().await;
    let group = result?;
    println!("Created group {} (id {}).", group.name, group.id);
    Ok(())
}

pub async fn run_group_list(config: &Config) -> Result<()> {
    let metadata = open_metadata(config).await?;
    let groups = metadata.list_groups_with_counts().await;
    metadata.close().await;
    let groups = groups?;

    if groups.is_empty() {
        println!("No groups.");
        return Ok(());
    }
    for (group, count) in &groups {
        if group.description.is_empty() {
            println!("{:<24} {:>4} projects", group.name, count);
        } else {
            println!(
                "{:<24} {:>4} projects  {}",
                group.name, count, group.description
            );
        }
    }
    Ok(())
}

pub async fn run_group_delete(config: &Config, name: &str) -> Result<()> {
    let metadata = open_metadata(config).await?;
    let result = metadata.delete_group(name).await;
    metadata.close().await;
    result?;
    println!("Deleted group {}. Its projects are now unassigned.", name);
    Ok(())
}

fn format_time(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

/// Resolve the project name for `index`: explicit, or the directory name.
pub fn project_name(path: &Path, name: Option<String>) -> Result<String> {
    if let Some(name) = name {
        return Ok(name);
    }
    let canonical = std::fs::canonicalize(path)
        .with_context(|| format!("Project path does not exist: {}", path.display()))?;
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a project name from {}", path.display()))
}
