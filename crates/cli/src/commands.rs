//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};
use tagcache_client::{CheckOutcome, Refresher};
use tagcache_core::cache::SnapshotStatus;
use tagcache_core::tags::{fallback_property, normalize_subtag, simplify_tags, tags_for_pages};
use tagcache_core::{AppConfig, Collection, Page, Preferences, SnapshotStore};

use crate::cli::{ConfigArgs, ExportArgs, RefreshArgs, SearchArgs, SimplifyArgs, TagsArgs};
use crate::host::{self, MainQueue};

/// Everything a command needs: configuration, the refresher and its main
/// queue, and the remembered selections.
pub struct Session {
    config: AppConfig,
    refresher: Refresher,
    queue: MainQueue,
    preferences: Preferences,
    json: bool,
}

#[derive(Serialize)]
struct SearchHit<'a> {
    id: &'a str,
    title: &'a str,
    display: String,
}

#[derive(Serialize)]
struct StatusRow<'a> {
    collection: &'a str,
    #[serde(flatten)]
    status: SnapshotStatus,
}

impl Session {
    pub async fn open(config: AppConfig, json: bool) -> Result<Self> {
        let (host, queue) = host::channel();
        let refresher = Refresher::from_app(&config, Arc::new(host))
            .await
            .context("failed to initialise cache")?;
        let preferences = Preferences::load(&config.cache_dir).await;

        Ok(Self { config, refresher, queue, preferences, json })
    }

    /// Explicit key, else the remembered collection, else the first one.
    fn resolve(&self, key: Option<&str>) -> Result<Collection> {
        let registry = self.refresher.registry();
        if let Some(key) = key {
            return Ok(registry.get(key)?.clone());
        }

        let remembered = self
            .preferences
            .last_collection
            .as_deref()
            .and_then(|name| registry.get(name).ok());

        remembered
            .or_else(|| registry.first())
            .cloned()
            .context("no collections configured")
    }

    async fn remember(&mut self, collection: &Collection, property: Option<&str>) {
        self.preferences.remember(&collection.name, property);
        if let Err(e) = self.preferences.save(&self.config.cache_dir).await {
            tracing::warn!(error = %e, "could not save preferences");
        }
    }

    /// Lazy refresh, then run whatever the refresh queued for the main thread.
    async fn ensure_fresh(&mut self, collection: &Collection) {
        let name = collection.name.clone();
        let handle = self
            .refresher
            .refresh(
                &collection.id,
                false,
                Box::new(move || tracing::debug!(collection = %name, "ready")),
            )
            .await;
        handle.wait().await;
        self.queue.drain();
    }

    async fn matching_pages(&mut self, collection: &Collection, query: &[String]) -> Vec<Page> {
        self.ensure_fresh(collection).await;
        let pages = self.refresher.search(&collection.id, &query.join(" ")).await;
        self.queue.drain();
        pages
    }

    pub async fn search(&mut self, args: &SearchArgs) -> Result<()> {
        let collection = self.resolve(args.collection.as_deref())?;
        let pages = self.matching_pages(&collection, &args.query).await;
        self.remember(&collection, None).await;

        let hits: Vec<SearchHit<'_>> = pages
            .iter()
            .take(args.limit)
            .map(|page| SearchHit { id: &page.id, title: page.title(), display: page.display_text(&collection.name) })
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&hits)?);
            return Ok(());
        }

        if hits.is_empty() {
            println!("No matching pages in {}", collection.name);
            return Ok(());
        }
        for hit in &hits {
            println!("{}  {}", hit.id, hit.display);
        }
        if pages.len() > hits.len() {
            println!("... {} more", pages.len() - hits.len());
        }
        Ok(())
    }

    pub async fn refresh(&mut self, args: &RefreshArgs) -> Result<()> {
        let collection = self.resolve(args.collection.as_deref())?;
        if args.force && !self.refresher.can_sync() {
            self.config.require_notion_token()?;
        }

        let name = collection.name.clone();
        let handle = self
            .refresher
            .refresh(
                &collection.id,
                args.force,
                Box::new(move || tracing::info!(collection = %name, "refresh finished")),
            )
            .await;
        handle.wait().await;
        self.queue.drain();
        self.remember(&collection, None).await;

        let status = self.refresher.store().status(&collection.id).await;
        self.print_status(&[(collection.name.as_str(), status)])
    }

    pub async fn update(&mut self) -> Result<()> {
        let result = self
            .refresher
            .update_all(|step, total, message| eprintln!("[{step}/{total}] {message}"))
            .await;
        self.queue.drain();
        result.context("cache update failed")
    }

    pub async fn check(&mut self) -> Result<()> {
        let checks = self.refresher.check_all().await;
        self.queue.drain();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&checks)?);
            return Ok(());
        }

        for check in &checks {
            println!("{:<14} {}", check.name, describe_check(check.outcome));
        }
        Ok(())
    }

    pub async fn export(&mut self, args: &ExportArgs) -> Result<()> {
        if !self.refresher.can_sync() {
            self.config.require_notion_token()?;
        }

        let out = SnapshotStore::open(&args.out, self.config.expiry_window())
            .await
            .with_context(|| format!("cannot open {}", args.out.display()))?;
        let exported = self.refresher.export_to(&out).await.context("export failed")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&exported)?);
            return Ok(());
        }

        for row in &exported {
            println!("{:<14} {:>6} pages  {}", row.name, row.pages, out.path_for(&row.collection_id).display());
        }
        Ok(())
    }

    pub async fn status(&self) -> Result<()> {
        let mut rows = Vec::new();
        for collection in self.refresher.registry().iter() {
            let status = self.refresher.store().status(&collection.id).await;
            rows.push((collection.name.as_str(), status));
        }
        self.print_status(&rows)
    }

    fn print_status(&self, rows: &[(&str, SnapshotStatus)]) -> Result<()> {
        if self.json {
            let rows: Vec<StatusRow<'_>> = rows
                .iter()
                .map(|(collection, status)| StatusRow { collection, status: status.clone() })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        for (name, status) in rows {
            let age = match status.age_secs {
                Some(secs) => format_age(secs),
                None if status.present => "unreadable".to_string(),
                None => "missing".to_string(),
            };
            let state = if status.expired { "stale" } else { "fresh" };
            println!("{name:<14} {:>6} pages  {age:>10}  {state}", status.pages);
        }
        Ok(())
    }

    pub async fn tags(&mut self, args: TagsArgs) -> Result<()> {
        let collection = self.resolve(args.collection.as_deref())?;
        let requested = args.property.or_else(|| self.preferences.last_property.clone()).unwrap_or_default();
        let property = if requested.is_empty() || collection.properties.contains(&requested) {
            requested
        } else {
            normalize_subtag(&requested, &collection.properties).unwrap_or_default()
        };

        let pages = self.matching_pages(&collection, &args.query).await;
        let tag_set = tags_for_pages(&pages, &collection.name, &property, &self.config.tag_root);
        self.remember(&collection, Some(&property)).await;

        let fell_back: Vec<&str> = tag_set
            .resolutions
            .iter()
            .filter(|(_, resolution)| resolution.is_fallback())
            .map(|(id, _)| id.as_str())
            .collect();

        if self.json {
            let out = json!({ "property": property, "tags": tag_set.tags, "fell_back": fell_back });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        println!("{}", tag_set.tags.join(" "));
        if !fell_back.is_empty() {
            eprintln!(
                "{} page(s) had no '{property}' value and used '{}' instead",
                fell_back.len(),
                fallback_property(&collection.name)
            );
        }
        Ok(())
    }

    pub fn simplify(&self, args: &SimplifyArgs) -> Result<()> {
        let collection = self.resolve(args.collection.as_deref())?;
        let simplified = simplify_tags(&args.tags, &collection.name, &self.config.tag_root);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&simplified)?);
            return Ok(());
        }

        for row in &simplified {
            let section = row
                .subtag
                .as_deref()
                .and_then(|s| normalize_subtag(s, &collection.properties))
                .unwrap_or_else(|| "Main Tag".to_string());
            println!("{}  [{section}]", row.display_name);
        }
        Ok(())
    }
}

pub fn config(config: &AppConfig, args: &ConfigArgs) -> Result<()> {
    let value = if args.schema { AppConfig::json_schema() } else { redacted(config)? };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn redacted(config: &AppConfig) -> Result<Value> {
    let mut value = serde_json::to_value(config)?;
    if config.notion_token.is_some() {
        value["notion_token"] = Value::String("********".into());
    }
    Ok(value)
}

fn describe_check(outcome: CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Fresh => "up to date".to_string(),
        CheckOutcome::Mirrored { pages } => format!("downloaded {pages} pages from the mirror"),
        CheckOutcome::Synced { pages } => format!("mirror failed; synced {pages} pages from Notion"),
        CheckOutcome::Busy => "refresh already running".to_string(),
        CheckOutcome::Offline => "stale, offline".to_string(),
    }
}

fn format_age(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    match secs {
        0..60 => format!("{secs}s"),
        60..3_600 => format!("{}m", secs / 60),
        3_600..86_400 => format!("{}h", secs / 3_600),
        _ => format!("{}d", secs / 86_400),
    }
}
