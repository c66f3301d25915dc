//! [`AlertLoader`]: recursive directory scan into validated definitions.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::schema::AlertDefinition;

use super::error::{LoadError, LoadResult, LoadStatus, Result};

/// Everything one scan produced.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Successfully loaded definitions, in scan order.
    pub definitions: Vec<AlertDefinition>,
    /// One entry per file encountered.
    pub results: Vec<LoadResult>,
}

impl LoadReport {
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
            .count()
    }
}

/// Filesystem-backed alert definition loader.
pub struct AlertLoader {
    alerts_dir: PathBuf,
}

impl AlertLoader {
    pub fn new(alerts_dir: PathBuf) -> Self {
        Self { alerts_dir }
    }

    pub fn alerts_dir(&self) -> &Path {
        &self.alerts_dir
    }

    /// Recursively scan the alerts directory and load all YAML files.
    ///
    /// Dotfiles and non-YAML files are skipped. A missing directory yields an
    /// empty report. Files are visited in path order so duplicate ids resolve
    /// deterministically: the first file wins, later ones fail.
    pub fn load_all(&self) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        if !self.alerts_dir.exists() {
            warn!(path = %self.alerts_dir.display(), "alerts directory does not exist");
            return Ok(report);
        }

        let mut seen = HashSet::new();
        self.scan_dir_recursive(&self.alerts_dir, &mut seen, &mut report)?;
        info!(
            path = %self.alerts_dir.display(),
            loaded = report.definitions.len(),
            failed = report.failed(),
            "alert definitions loaded"
        );
        Ok(report)
    }

    fn scan_dir_recursive(
        &self,
        dir: &Path,
        seen: &mut HashSet<String>,
        report: &mut LoadReport,
    ) -> Result<()> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            paths.push(entry?.path());
        }
        paths.sort();

        for path in paths {
            let is_dotfile = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if is_dotfile {
                if path.is_file() {
                    report.results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, seen, report)?;
                continue;
            }

            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yml" || e == "yaml");
            if !is_yaml {
                report.results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            let loaded = self.load_file(&path).and_then(|def| {
                if seen.insert(def.id.clone()) {
                    Ok(def)
                } else {
                    Err(LoadError::Validation(format!("duplicate alert id '{}'", def.id)))
                }
            });

            match loaded {
                Ok(def) => {
                    info!(alert_id = %def.id, kind = def.kind.label(), path = %path.display(), "loaded alert");
                    report.results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded {
                            alert_id: def.id.clone(),
                        },
                    });
                    report.definitions.push(def);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load alert file");
                    report.results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse and validate a single YAML file.
    pub fn load_file(&self, path: &Path) -> Result<AlertDefinition> {
        let contents = fs::read_to_string(path)?;
        let def: AlertDefinition = serde_yaml::from_str(&contents)?;

        let checked = def.check();
        for warning in &checked.warnings {
            warn!(alert_id = %def.id, path = %warning.path, "{}", warning.message);
        }
        if !checked.is_valid() {
            return Err(LoadError::Validation(format!(
                "alert '{}': {}",
                def.id,
                checked.error_summary()
            )));
        }
        Ok(def)
    }
}
