use anyhow::{Context, Result};
use colored::Colorize;
use vitis_cache::orchestrator::stats::Health;
use vitis_cache::{CacheOrchestrator, ClearScope};

use crate::cli::{ClearArgs, OutputFormat};
use crate::output::{print_json, print_success, print_table, print_warning, yes_no};

pub async fn stats(orchestrator: &CacheOrchestrator, format: OutputFormat) -> Result<()> {
    let stats = orchestrator.statistics().await;

    if matches!(format, OutputFormat::Json) {
        return print_json(&serde_json::to_value(&stats)?);
    }

    let availability = if stats.store_available {
        "available".green()
    } else {
        "unavailable".red()
    };
    println!("{}: {} ({})", "Backend".cyan(), stats.backend, availability);

    let layers = &stats.layers;
    let file = &layers.file_fallback;
    let mut rows: Vec<Vec<String>> = [("short_term", &layers.short_term), ("fallback", &layers.fallback)]
        .into_iter()
        .map(|(name, layer)| {
            vec![
                name.to_string(),
                yes_no(layer.active),
                layer.entries.map_or_else(|| "-".into(), |n| n.to_string()),
                format!("{}s", layer.ttl_seconds),
                layer.description.to_string(),
            ]
        })
        .collect();
    rows.push(vec![
        "file_fallback".to_string(),
        yes_no(file.active),
        format!("{}/{} memoized", file.memo.size, file.memo.capacity),
        "indefinite".to_string(),
        file.description.to_string(),
    ]);
    print_table(&["Layer", "Active", "Entries", "TTL", "Description"], rows);

    let health = match stats.overall.health {
        Health::Excellent | Health::Good => stats.overall.health.as_str().green(),
        Health::Fair => stats.overall.health.as_str().yellow(),
        Health::Poor => stats.overall.health.as_str().red(),
    };
    println!(
        "{}: {} ({}/{} layers active)",
        "Health".cyan(),
        health,
        stats.overall.active_layers,
        stats.overall.total_layers
    );
    println!(
        "{}: {} ({})",
        "Fallback files".cyan(),
        file.directory.display(),
        file.mapping_status.as_str()
    );
    if !file.missing_files.is_empty() {
        print_warning(&format!("Missing files: {}", file.missing_files.join(", ")));
    }
    Ok(())
}

pub async fn clear(orchestrator: &CacheOrchestrator, args: &ClearArgs) -> Result<()> {
    let scope: ClearScope = args.scope.parse().map_err(anyhow::Error::msg)?;
    let cleared = orchestrator
        .clear_cache(args.endpoint.as_deref(), scope)
        .await
        .context("failed to clear cache")?;

    let target = args.endpoint.as_deref().unwrap_or("all endpoints");
    print_success(&format!("Cleared {cleared} entries for {target}"));
    Ok(())
}
