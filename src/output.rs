//! Report output.
//!
//! Generates both JSON and human-readable text reports.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};

use crate::reconcile::types::{CollectionStatus, ConflictKind, UtilizationReport};

/// Generate JSON report
pub fn write_json_report(report: &UtilizationReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Load a report written by [`write_json_report`]
pub fn read_json_report(path: &Path) -> Result<UtilizationReport> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse report {}", path.display()))
}

/// Generate human-readable text report
pub fn write_text_report(report: &UtilizationReport, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_text_report(report))
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

pub fn render_text_report(report: &UtilizationReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    // Header
    lines.push("=".repeat(80));
    lines.push("                       IP ADDRESS UTILIZATION REPORT".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    lines.push(format!("Clouds: {}", report.total_clouds));
    lines.push(format!(
        "Addresses: {} total, {} used, {} free ({:.2}% used)",
        report.total, report.used, report.free, report.usage_pct
    ));
    lines.push(format!(
        "Allocations: {} unique addresses, {} in conflict",
        report.duplicate_summary.total_unique_ips, report.duplicate_summary.conflicting_ips
    ));
    lines.push(String::new());

    for cloud in &report.clouds {
        lines.push("-".repeat(80));
        let status = match cloud.status {
            CollectionStatus::Fresh => "",
            CollectionStatus::Stale => "  [STALE DATA]",
            CollectionStatus::Missing => "  [NO DATA]",
        };
        lines.push(format!(
            "{}: {} pools, {}/{} used ({:.2}%){}",
            cloud.cloud, cloud.total_pools, cloud.used, cloud.total, cloud.usage_pct, status
        ));
        lines.push("-".repeat(80));

        for pool in &cloud.pools {
            let mut line = format!(
                "  {:<40} {:<18} {:>6} / {:<6} {:>7.2}%",
                pool.name,
                pool.network.to_string(),
                pool.used,
                pool.total,
                pool.usage_pct
            );
            if pool.has_overlaps {
                line.push_str(&format!("  shared with {}", pool.overlapping_clouds.join(", ")));
            }
            lines.push(line);
        }
        lines.push(String::new());
    }

    if !report.groups.is_empty() {
        lines.push("=".repeat(80));
        lines.push("                           SHARED ADDRESS SPACE".to_string());
        lines.push("=".repeat(80));
        lines.push(String::new());
        for group in &report.groups {
            lines.push(format!(
                "{} (counted via {}): {}/{} used ({:.2}%)",
                group.key, group.canonical, group.used, group.total, group.usage_pct
            ));
            for member in &group.members {
                lines.push(format!("  - {}", member));
            }
        }
        lines.push(String::new());
    }

    if !report.conflicts.is_empty() {
        lines.push("=".repeat(80));
        lines.push("                               CONFLICTS".to_string());
        lines.push("=".repeat(80));
        lines.push(String::new());
        for (ip, conflicts) in &report.conflicts {
            for conflict in conflicts {
                let kind = match conflict.kind {
                    ConflictKind::DuplicateInCloud => "duplicate in cloud",
                    ConflictKind::CrossCloudConflict => "cross-cloud",
                };
                lines.push(format!(
                    "{:<16} {:<20} clouds: {}  organizations: {}",
                    ip.to_string(),
                    kind,
                    conflict.clouds.join(", "),
                    conflict.organizations.iter().cloned().collect::<Vec<_>>().join(", ")
                ));
            }
        }
        lines.push(String::new());
    }

    if !report.warnings.is_empty() {
        lines.push("Warnings:".to_string());
        for warning in &report.warnings {
            lines.push(format!("  ! {}", warning.message));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collection;
    use crate::config::Config;
    use crate::reconcile::{AddressAllocation, Reconciler};
    use tempfile::TempDir;

    fn sample_report() -> UtilizationReport {
        let yaml = r#"
clouds:
  X:
    pools:
      - name: "public"
        network: "192.168.1.0/24"
        type: ipSpace
  Y:
    pools:
      - name: "public"
        network: "192.168.1.0/24"
        type: externalNetwork
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let reconciler = Reconciler::from_config(&config);
        let collection = Collection::from_allocations(
            reconciler.registry(),
            vec![
                AddressAllocation::new("192.168.1.7".parse().unwrap(), "X", "public", "A"),
                AddressAllocation::new("192.168.1.7".parse().unwrap(), "Y", "public", "B"),
            ],
        );
        reconciler.report(&collection)
    }

    #[test]
    fn test_json_report_round_trip() {
        let report = sample_report();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        write_json_report(&report, &path).unwrap();
        let loaded = read_json_report(&path).unwrap();
        assert_eq!(loaded, report);
        assert_eq!(loaded.allocations.len(), 2);
    }

    #[test]
    fn test_text_report_sections() {
        let text = render_text_report(&sample_report());
        assert!(text.contains("IP ADDRESS UTILIZATION REPORT"));
        assert!(text.contains("shared with Y"));
        assert!(text.contains("SHARED ADDRESS SPACE"));
        assert!(text.contains("cross-cloud"));
        assert!(!text.contains("Warnings:"));
    }
}
