use std::collections::BTreeSet;

use anyhow::{Result, bail};
use colored::Colorize;
use serde_json::json;
use vitis_cache::file_cache::MemoStats;
use vitis_cache::{CacheOrchestrator, MappingStatus};

use crate::cli::{MemoArgs, OutputFormat};
use crate::output::{print_json, print_success, print_table, print_warning, yes_no};

pub fn validate(orchestrator: &CacheOrchestrator, format: OutputFormat) -> Result<()> {
    let report = orchestrator.validate_file_mappings();

    if matches!(format, OutputFormat::Json) {
        print_json(&serde_json::to_value(&report)?)?;
    } else {
        let rows = report.endpoints.iter().map(|(endpoint, detail)| {
            vec![
                endpoint.to_string(),
                yes_no(detail.valid),
                detail.default_file.to_string(),
                format!("{}/{}", detail.valid_sub_options, detail.sub_options_count),
                detail.errors.join("; "),
            ]
        });
        print_table(&["Endpoint", "Valid", "Default file", "Sub-options", "Errors"], rows);

        let status = match report.overall_status {
            MappingStatus::Valid => "valid".green(),
            MappingStatus::Partial => "partial".yellow(),
            MappingStatus::Invalid => "invalid".red(),
        };
        println!(
            "{}: {} ({}/{} files in {})",
            "Status".cyan(),
            status,
            report.existing_files,
            report.total_files,
            report.directory.display()
        );
    }

    match report.overall_status {
        MappingStatus::Valid => Ok(()),
        MappingStatus::Partial => {
            print_warning(&format!("Missing files: {}", report.missing_files.join(", ")));
            Ok(())
        }
        MappingStatus::Invalid => bail!(
            "no fallback files found in {}",
            report.directory.display()
        ),
    }
}

pub fn endpoints(orchestrator: &CacheOrchestrator, format: OutputFormat) -> Result<()> {
    let endpoints = orchestrator.files().available_endpoints();

    if matches!(format, OutputFormat::Json) {
        return print_json(&serde_json::to_value(&endpoints)?);
    }

    let mut rows = Vec::new();
    for info in &endpoints {
        let exists = |file: &str| info.files_status.get(file).is_some_and(|s| s.exists);
        rows.push(vec![
            info.endpoint.to_string(),
            "(default)".to_string(),
            info.default_file.to_string(),
            yes_no(exists(info.default_file)),
        ]);
        for (sub_option, file) in &info.sub_options {
            rows.push(vec![
                String::new(),
                sub_option.to_string(),
                file.to_string(),
                yes_no(exists(file)),
            ]);
        }
    }
    print_table(&["Endpoint", "Sub-option", "File", "Present"], rows);
    Ok(())
}

pub fn memo(orchestrator: &CacheOrchestrator, args: &MemoArgs, format: OutputFormat) -> Result<()> {
    let files = orchestrator.files();
    let present: BTreeSet<&str> = files
        .available_endpoints()
        .iter()
        .flat_map(|info| info.files_status.iter())
        .filter(|(_, status)| status.exists)
        .map(|(file, _)| *file)
        .collect();

    let mut parsed = Vec::new();
    for file in present {
        let outcome = files.parse_file(&files.directory().join(file));
        if let Err(e) = &outcome {
            tracing::warn!(file, error = %e, "Fallback file could not be parsed");
        }
        parsed.push((file, outcome));
    }

    let optimized = if args.optimize { files.optimize(args.force) } else { None };
    let stats = files.memo_stats();
    let cleared = if args.clear { Some(orchestrator.clear_file_memo()) } else { None };

    if matches!(format, OutputFormat::Json) {
        let parsed: Vec<_> = parsed
            .iter()
            .map(|(file, outcome)| match outcome {
                Ok(table) => json!({ "file": file, "rows": table.body.len() }),
                Err(e) => json!({ "file": file, "error": e.to_string() }),
            })
            .collect();
        return print_json(&json!({
            "files": parsed,
            "memo": stats,
            "optimized": optimized,
            "cleared": cleared,
        }));
    }

    let rows = parsed.iter().map(|(file, outcome)| match outcome {
        Ok(table) => vec![file.to_string(), table.body.len().to_string(), "parsed".green().to_string()],
        Err(e) => vec![file.to_string(), "-".to_string(), e.to_string().red().to_string()],
    });
    print_table(&["File", "Rows", "Status"], rows);
    print_memo_stats(&stats);

    if let Some(report) = optimized {
        print_success(&format!(
            "Optimized memo: {} expired, {} evicted ({} -> {} entries)",
            report.expired_cleaned, report.lru_evicted, report.initial_size, report.final_size
        ));
    } else if args.optimize {
        print_warning("File memo is disabled; nothing to optimize");
    }
    if let Some(cleared) = cleared {
        print_success(&format!("Cleared {cleared} memo entries"));
    }
    Ok(())
}

fn print_memo_stats(stats: &MemoStats) {
    if !stats.enabled {
        println!("{}: disabled", "Memo".cyan());
        return;
    }
    println!(
        "{}: {}/{} entries, {} hits, {} misses, {:.2}% hit rate ({})",
        "Memo".cyan(),
        stats.size,
        stats.capacity,
        stats.hits,
        stats.misses,
        stats.hit_rate_percent,
        stats.cache_efficiency
    );
}
