//! Scoped semantic search over indexed code.

use anyhow::{bail, Context, Result};

use vectcode_core::embedding::Embedder;
use vectcode_core::store::{SearchFilters, SearchResult, VectorStore};

use crate::metadata::MetadataStore;

/// Which projects a search covers.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchScope {
    Project(String),
    /// Every project currently assigned to the group.
    Group(String),
    All,
}

/// Embed `query` and return the closest chunks within `scope`.
pub async fn search_code(
    embedder: &dyn Embedder,
    vector_store: &dyn VectorStore,
    metadata: &MetadataStore,
    query: &str,
    limit: usize,
    scope: &SearchScope,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let filters = match scope {
        SearchScope::Project(name) => SearchFilters::project(name.clone()),
        SearchScope::Group(group) => {
            let projects = metadata
                .projects_in_group(group)
                .await
                .with_context(|| format!("Failed to resolve group {}", group))?;
            if projects.is_empty() {
                bail!("No projects found in group: {}", group);
            }
            SearchFilters::projects(projects.into_iter().map(|p| p.name).collect())
        }
        SearchScope::All => SearchFilters::default(),
    };

    let vector = embedder
        .embed(query)
        .await
        .context("Failed to embed query")?;

    vector_store.search(&vector, limit, &filters).await
}

/// Print results the way the CLI shows them.
pub fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        let title = match chunk.receiver {
            Some(ref receiver) => format!("({}) {}", receiver, chunk.name),
            None => chunk.name.clone(),
        };
        println!(
            "{}. [{:.3}] {} {} ({})",
            i + 1,
            result.score,
            chunk.kind,
            title,
            chunk.project
        );
        println!("    {}", chunk.location());
        if !chunk.http_endpoints.is_empty() {
            println!("    endpoints: {}", chunk.http_endpoints.join(", "));
        }
        if let Some(line) = chunk.doc.as_deref().and_then(|d| d.lines().next()) {
            println!("    {}", line);
        }
        println!();
    }
}
