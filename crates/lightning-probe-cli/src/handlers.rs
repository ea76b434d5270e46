//! Subcommand handlers

use lightning_probe::feature::parse_file;
use lightning_probe::logging::{self, LogOptions};
use lightning_probe::{
    BrowserKind, BrowserLauncher, Config, FailureMode, Feature, Report, ScenarioRunner,
    StepRegistry, TagExpr,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::commands::{ConfigArgs, ListArgs, RunArgs, SelectionArgs};
use crate::config::{run_config, CliConfig};
use crate::error::{CliError, CliResult};
use crate::output::ConsoleReporter;

/// Feature files named by `paths`; directories are searched recursively
pub fn discover_features(paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_file() {
            found.push(path.clone());
        } else if path.is_dir() {
            let pattern = path.join("**").join("*.feature");
            let pattern = pattern.to_string_lossy();
            let entries = glob::glob(&pattern)
                .map_err(|e| CliError::invalid_argument(format!("{}: {e}", path.display())))?;
            let mut files: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
            files.sort();
            found.extend(files);
        } else {
            tracing::warn!(path = %path.display(), "feature path does not exist");
        }
    }
    if found.is_empty() {
        let searched = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CliError::NoFeatures { searched });
    }
    Ok(found)
}

/// Parse every discovered feature file
pub fn load_features(paths: &[PathBuf]) -> CliResult<Vec<Feature>> {
    discover_features(paths)?
        .iter()
        .map(|path| parse_file(path).map_err(CliError::from))
        .collect()
}

/// Parse `--tags`
pub fn parse_tags(tags: Option<&str>) -> CliResult<Option<TagExpr>> {
    tags.map(|t| TagExpr::parse(t).map_err(CliError::from))
        .transpose()
}

/// One scenario a run would execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub feature: String,
    pub scenario: String,
    pub tags: Vec<String>,
    pub steps: usize,
    /// Steps no registered definition matches
    pub undefined_steps: Vec<String>,
}

/// Selected scenarios with the steps that would fail as undefined
#[must_use]
pub fn plan(
    features: &[Feature],
    filter: Option<&TagExpr>,
    registry: &StepRegistry,
) -> Vec<PlanEntry> {
    features
        .iter()
        .flat_map(|feature| {
            feature.selected(filter).into_iter().map(move |scenario| {
                let steps: Vec<_> = feature.background.iter().chain(&scenario.steps).collect();
                PlanEntry {
                    feature: feature.name.clone(),
                    scenario: scenario.name.clone(),
                    tags: feature.tags_of(scenario),
                    steps: steps.len(),
                    undefined_steps: steps
                        .iter()
                        .filter(|step| registry.find(&step.text).is_err())
                        .map(|step| step.to_string())
                        .collect(),
                }
            })
        })
        .collect()
}

fn selection(args: &SelectionArgs) -> CliResult<(Vec<Feature>, Option<TagExpr>)> {
    let features = load_features(&args.features)?;
    let filter = parse_tags(args.tags.as_deref())?;
    Ok((features, filter))
}

/// `lprobe run`: true when no scenario failed
pub async fn run_scenarios(
    cli: CliConfig,
    args: &RunArgs,
    base: Config,
    launcher: Arc<dyn BrowserLauncher>,
) -> CliResult<bool> {
    let config = run_config(base, args, cli.verbosity)?;
    let (features, filter) = selection(&args.selection)?;
    let use_color = cli.color.should_color();

    let options = LogOptions::from_config(&config)
        .with_json(args.json_logs)
        .with_ansi(use_color);
    if !logging::init(&options)? {
        tracing::debug!("tracing subscriber already installed");
    }

    let reporter = ConsoleReporter::new(use_color, cli.verbosity.is_quiet());
    let selected: usize = features.iter().map(|f| f.selected(filter.as_ref()).len()).sum();
    reporter.info(&format!(
        "Running {selected} scenario(s) from {} feature file(s) against {}",
        features.len(),
        config.base_url
    ));

    let mode = if args.fail_fast {
        FailureMode::FailFast
    } else {
        FailureMode::CollectAll
    };
    let report_path = config.paths.report_file();
    let reports_dir = config.paths.reports_dir.clone();
    let mut runner = ScenarioRunner::new(config, StepRegistry::with_defaults()?, launcher)
        .with_filter(filter)
        .with_failure_mode(mode);
    let report = runner.run(&features).await?;

    let archived = archive_report(&report, &reports_dir)?;
    tracing::debug!(path = %archived.display(), "report archived");

    reporter.report(&report);
    reporter.info(&format!("Report: {}", report_path.display()));
    Ok(report.all_passed())
}

/// `lprobe list`
pub fn list_scenarios(cli: CliConfig, args: &ListArgs) -> CliResult<()> {
    let (features, filter) = selection(&args.selection)?;
    let registry = StepRegistry::with_defaults()?;
    let entries = plan(&features, filter.as_ref(), &registry);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in &entries {
        let tags = if entry.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", entry.tags.join(" "))
        };
        println!("{}: {}{} ({} steps)", entry.feature, entry.scenario, tags, entry.steps);
        for step in &entry.undefined_steps {
            println!("    undefined: {step}");
        }
    }
    if !cli.verbosity.is_quiet() {
        println!("{} scenario(s)", entries.len());
    }
    Ok(())
}

/// `lprobe config`
pub fn show_config(config: &Config, args: &ConfigArgs) -> CliResult<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }
    let rows: [(&str, String); 10] = [
        ("base_url", config.base_url.clone()),
        ("username", config.username.clone()),
        ("browser", browser_name(config.browser).to_string()),
        ("headless", config.headless.to_string()),
        ("timeout_ms", config.timeout.as_millis().to_string()),
        ("navigation_timeout_ms", config.navigation_timeout.as_millis().to_string()),
        ("test_timeout_ms", config.test_timeout.as_millis().to_string()),
        ("viewport", format!("{}x{}", config.viewport_width, config.viewport_height)),
        ("log_level", config.log_level.clone()),
        ("report", display(&config.paths.report_file())),
    ];
    for (key, value) in rows {
        println!("{key:<22} {value}");
    }
    Ok(())
}

const fn browser_name(browser: BrowserKind) -> &'static str {
    match browser {
        BrowserKind::Chromium => "chromium",
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Reports from earlier runs are overwritten; keep a copy under `runs/`
pub fn archive_report(report: &Report, reports_dir: &Path) -> CliResult<PathBuf> {
    let dir = reports_dir.join("runs");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.json", report.run_id));
    std::fs::write(&path, report.to_json()?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightning_probe::feature::parse;

    const LOGIN: &str = "\
@login
Feature: Login

  Scenario: valid login
    Given I am on the Salesforce login page \"https://login.salesforce.com\"
    When I click the \"Log In\" button
    Then I should be see the Home tab in salesforce home page

  @wip
  Scenario: not yet written
    Given I teleport to the record
";

    mod discovery_tests {
        use super::*;

        #[test]
        fn test_directories_are_searched_recursively() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("mailbox")).unwrap();
            std::fs::write(dir.path().join("login.feature"), LOGIN).unwrap();
            std::fs::write(dir.path().join("mailbox").join("sync.feature"), LOGIN).unwrap();
            std::fs::write(dir.path().join("notes.txt"), "not a feature").unwrap();

            let found = discover_features(&[dir.path().to_path_buf()]).unwrap();
            assert_eq!(found.len(), 2);
            assert!(found.iter().all(|p| p.extension().unwrap() == "feature"));
        }

        #[test]
        fn test_nothing_found() {
            let dir = tempfile::tempdir().unwrap();
            let err = discover_features(&[dir.path().join("missing")]).unwrap_err();
            assert!(matches!(err, CliError::NoFeatures { .. }));
        }

        #[test]
        fn test_bad_tag_expression() {
            assert!(parse_tags(Some("@a and")).is_err());
            assert!(parse_tags(None).unwrap().is_none());
        }
    }

    mod plan_tests {
        use super::*;

        #[test]
        fn test_plan_flags_undefined_steps() {
            let feature = parse(LOGIN).unwrap();
            let registry = StepRegistry::with_defaults().unwrap();
            let entries = plan(&[feature], None, &registry);

            assert_eq!(entries.len(), 2);
            assert!(entries[0].undefined_steps.is_empty());
            assert_eq!(entries[0].tags, ["@login"]);
            assert_eq!(entries[1].undefined_steps, ["Given I teleport to the record"]);
        }

        #[test]
        fn test_plan_applies_filter() {
            let feature = parse(LOGIN).unwrap();
            let registry = StepRegistry::with_defaults().unwrap();
            let filter = TagExpr::parse("not @wip").unwrap();
            let entries = plan(&[feature], Some(&filter), &registry);
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].scenario, "valid login");
        }
    }

    #[test]
    fn test_archive_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report::new();
        let path = archive_report(&report, dir.path()).unwrap();
        assert!(path.ends_with(format!("runs/{}.json", report.run_id)));
        assert!(path.is_file());
    }
}
