use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tally_core::{SemanticField, TransformRule};
use tally_import::import::{import_statement, load_profile};
use tally_import::{detect_columns, Delimiter, RecordStore, SourceProfile, DEFAULT_CREDIT_CATEGORIES};
use tally_storage::{KeyValueStore, ProfileRepository};

async fn require<S: KeyValueStore>(repo: &ProfileRepository<S>, name: &str) -> Result<SourceProfile> {
    repo.get(name)
        .await?
        .with_context(|| format!("No profile named '{name}'"))
}

pub async fn profile_add<S: KeyValueStore>(repo: &ProfileRepository<S>, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let profile = load_profile(&content)
        .with_context(|| format!("Invalid profile in {}", file.display()))?;
    let name = profile.name.clone();
    repo.upsert(profile).await?;
    println!("Saved profile '{name}'");
    Ok(())
}

pub async fn profile_list<S: KeyValueStore>(repo: &ProfileRepository<S>) -> Result<()> {
    let profiles = repo.load().await?;
    if profiles.is_empty() {
        println!("No profiles saved.");
        return Ok(());
    }
    for p in profiles {
        println!(
            "{:<20} {:<6} {} columns, {} rules",
            p.name,
            p.delimiter.to_string(),
            p.mapping.len(),
            p.rule_count()
        );
    }
    Ok(())
}

pub async fn profile_show<S: KeyValueStore>(repo: &ProfileRepository<S>, name: &str) -> Result<()> {
    let profile = require(repo, name).await?;
    println!("{} ({}, dates {})", profile.name, profile.delimiter, profile.date_format);

    let mut columns: Vec<(usize, SemanticField)> =
        profile.mapping.iter().map(|(field, index)| (index, field)).collect();
    columns.sort();
    for (index, field) in columns {
        println!("  [{index}] {field}");
    }

    for rule in profile.transforms.iter() {
        println!("  {rule}");
    }
    if let Err(e) = profile.validate() {
        println!("  warning: {e}");
    }
    Ok(())
}

pub async fn profile_remove<S: KeyValueStore>(repo: &ProfileRepository<S>, name: &str) -> Result<()> {
    if !repo.remove(name).await? {
        bail!("No profile named '{name}'");
    }
    println!("Removed profile '{name}'");
    Ok(())
}

pub async fn rule_add<S: KeyValueStore>(
    repo: &ProfileRepository<S>,
    name: &str,
    rule: TransformRule,
) -> Result<()> {
    let mut profile = require(repo, name).await?;
    let shown = rule.to_string();
    profile.add_transform(rule)?;
    repo.upsert(profile).await?;
    println!("Added rule: {shown}");
    Ok(())
}

pub async fn rule_remove<S: KeyValueStore>(
    repo: &ProfileRepository<S>,
    name: &str,
    rule: &TransformRule,
) -> Result<()> {
    let mut profile = require(repo, name).await?;
    if !profile.remove_transform(rule) {
        bail!("Profile '{name}' has no rule: {rule}");
    }
    repo.upsert(profile).await?;
    println!("Removed rule: {rule}");
    Ok(())
}

pub async fn import<S: KeyValueStore>(
    repo: &ProfileRepository<S>,
    name: &str,
    files: &[PathBuf],
) -> Result<()> {
    let profile = require(repo, name).await?;
    profile.validate()?;

    let mut store = RecordStore::new();
    for path in files {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let summary = import_statement(BufReader::new(file), &profile, &mut store)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        for (row, reason) in &summary.rejected {
            tracing::warn!("{}: skipped row {}: {reason}", path.display(), row + 1);
        }
    }

    for record in &store {
        println!("{record}");
    }

    println!();
    for (category, total) in store.totals_by_category(DEFAULT_CREDIT_CATEGORIES) {
        println!("{category:<24} {:>12}", total.to_string());
    }
    Ok(())
}

pub fn columns(file: &Path, tab: bool) -> Result<()> {
    let delimiter = if tab { Delimiter::Tab } else { Delimiter::Comma };
    let reader = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let headers = detect_columns(BufReader::new(reader), delimiter)?;
    if headers.is_empty() {
        bail!("{} is empty", file.display());
    }
    for (index, name) in headers.iter().enumerate() {
        println!("{index:>3}  {name}");
    }
    Ok(())
}
