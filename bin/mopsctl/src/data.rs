//! ---
//! mops_section: "05-external-interfaces"
//! mops_subsection: "binary"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Control CLI for administrators inspecting MOPS."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use mops_common::AppConfig;
use mops_query::{LeadStats, MemoryStore, PageResult, QueryEngine, QuerySpec};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Builder;

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Collection name, e.g. `profiles`.
    collection: String,
    /// JSON file shaped `{ "collection": [records...] }`.
    #[arg(long, value_name = "FILE")]
    data: PathBuf,
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Defaults to the configured page size.
    #[arg(long = "page-size")]
    page_size: Option<u32>,
    #[arg(long)]
    search: Option<String>,
    /// Exact-match filter `field=value`; values parse as JSON when possible.
    #[arg(long = "filter", value_name = "FIELD=VALUE", value_parser = parse_filter)]
    filters: Vec<(String, Value)>,
    /// Restrict to one site for site-scoped collections.
    #[arg(long)]
    site: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatsCommand {
    #[arg(long, value_name = "FILE")]
    data: PathBuf,
}

#[derive(Serialize)]
struct PageView<'a> {
    #[serde(flatten)]
    page: &'a PageResult,
    total_pages: u64,
    has_next: bool,
}

fn parse_filter(raw: &str) -> Result<(String, Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err("filter field cannot be empty".to_owned());
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((field.to_owned(), value))
}

fn engine(data: &Path, config: &AppConfig) -> Result<QueryEngine> {
    let store = MemoryStore::load(data)
        .with_context(|| format!("failed to load data file {}", data.display()))?;
    Ok(QueryEngine::from_config(Arc::new(store), config))
}

fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

pub fn list(cmd: ListCommand, config: &AppConfig) -> Result<()> {
    let engine = engine(&cmd.data, config)?;
    let page_size = cmd
        .page_size
        .unwrap_or(config.pagination.default_page_size);
    let mut spec = QuerySpec::new(cmd.page, page_size);
    if let Some(term) = cmd.search {
        spec = spec.with_search(term);
    }
    for (field, value) in cmd.filters {
        spec = spec.with_filter(field, value);
    }
    let page = block_on(engine.paginate_for_site(&cmd.collection, &spec, cmd.site.as_deref()))??;
    let view = PageView {
        total_pages: page.total_pages(),
        has_next: page.has_next(),
        page: &page,
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

pub fn stats(cmd: StatsCommand, config: &AppConfig) -> Result<()> {
    let engine = engine(&cmd.data, config)?;
    let leads = block_on(engine.fetch_all("leads", &BTreeMap::new()))??;
    println!("{}", serde_json::to_string_pretty(&LeadStats::from_records(&leads))?);
    Ok(())
}
