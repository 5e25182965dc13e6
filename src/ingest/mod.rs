//! # Ingest Driver
//!
//! Orchestrates parse → transform → serialize per file, one logical
//! task per project, dispatched over a fixed-size worker pool. Each
//! worker owns one backend connection for its lifetime. The caches
//! dedup work across runs; the hard limit stops the whole pipeline
//! early.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::unbounded;

use crate::backend::{BackendError, ConnectionPool, IngestCache};
use crate::config::Config;
use crate::dataset::SamplingData;
use crate::schema::Schema;
use crate::serialize::{ensure_project, insert_file};
use crate::tree::transform;

pub mod stats;

pub use stats::{Insertion, Statistics};

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub hard_limit: Option<usize>,
    pub max_files_per_project: Option<usize>,
    pub fast_mode: bool,
    pub workers: Option<usize>,
}

impl IngestOptions {
    /// Options from configuration, before CLI overrides.
    pub fn from_config(config: &Config) -> IngestOptions {
        IngestOptions {
            hard_limit: config.ingest.hard_limit,
            max_files_per_project: config.ingest.max_files_per_project,
            fast_mode: config.ingest.fast_mode,
            workers: None,
        }
    }
}

/// Ingest a dataset. Returns the summed statistics of every project.
pub fn ingest(
    schema: &Schema,
    pool: &ConnectionPool,
    config: &Config,
    dataset: Vec<SamplingData>,
    options: &IngestOptions,
) -> Result<Statistics, BackendError> {
    let cache = {
        let mut connection = pool.acquire()?;
        IngestCache::sync(&mut *connection, schema)?
    };

    let workers = options.workers.unwrap_or_else(|| config.worker_count()).max(1);
    let inserted_total = AtomicUsize::new(0);

    let (sender, receiver) = unbounded();
    for project in dataset {
        let _ = sender.send(project);
    }
    drop(sender);

    let mut results: Vec<Result<Statistics, BackendError>> = Vec::new();
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..workers {
            let receiver = receiver.clone();
            let cache = &cache;
            let inserted_total = &inserted_total;
            handles.push(scope.spawn(move || -> Result<Statistics, BackendError> {
                let mut connection = pool.acquire()?;
                let mut statistics = Statistics::default();
                while let Ok(project) = receiver.recv() {
                    if limit_reached(options, inserted_total) {
                        break;
                    }
                    statistics += ingest_project(
                        &mut *connection,
                        schema,
                        cache,
                        config,
                        options,
                        inserted_total,
                        &project,
                    );
                }
                Ok(statistics)
            }));
        }
        for handle in handles {
            results.push(handle.join().unwrap_or_else(|_| {
                Err(BackendError::Protocol("ingest worker panicked".to_owned()))
            }));
        }
    });

    let mut total = Statistics::default();
    for result in results {
        total += result?;
    }
    Ok(total)
}

fn limit_reached(options: &IngestOptions, inserted_total: &AtomicUsize) -> bool {
    options
        .hard_limit
        .map(|limit| inserted_total.load(Ordering::Relaxed) >= limit)
        .unwrap_or(false)
}

fn ingest_project(
    connection: &mut dyn crate::backend::Connection,
    schema: &Schema,
    cache: &IngestCache,
    config: &Config,
    options: &IngestOptions,
    inserted_total: &AtomicUsize,
    project: &SamplingData,
) -> Statistics {
    let mut statistics = Statistics::default();

    let project_id = match ensure_project(connection, schema, project) {
        Ok(id) => id,
        Err(error) => {
            tracing::error!(project = %project.name, %error, "could not record the project");
            return statistics;
        }
    };
    cache.add_project(&project.name);

    let project_dir = config.data.path.join(&project.name);
    let mut project_inserted = 0usize;
    for file in python_files(&project_dir) {
        if limit_reached(options, inserted_total) {
            break;
        }
        if let Some(limit) = options.max_files_per_project {
            if project_inserted >= limit {
                break;
            }
        }

        let outcome = ingest_one_file(
            connection,
            schema,
            cache,
            config,
            options,
            &project_id,
            &file,
        );
        if outcome == Insertion::Inserted {
            project_inserted += 1;
            inserted_total.fetch_add(1, Ordering::Relaxed);
        }
        statistics.record(outcome);
    }

    tracing::info!(project = %project.name, %statistics, "project finished");
    statistics
}

fn ingest_one_file(
    connection: &mut dyn crate::backend::Connection,
    schema: &Schema,
    cache: &IngestCache,
    config: &Config,
    options: &IngestOptions,
    project_id: &str,
    file: &Path,
) -> Insertion {
    let filename = match file.strip_prefix(&config.data.path) {
        Ok(relative) => relative.to_string_lossy().into_owned(),
        Err(_) => file.to_string_lossy().into_owned(),
    };

    if cache.has_file(&filename) {
        return Insertion::Cached;
    }

    let source = match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(error) => {
            tracing::warn!(%filename, %error, "could not read the source");
            return Insertion::Failed;
        }
    };
    if options.fast_mode && source.len() > config.ingest.fast_mode_threshold {
        return Insertion::Skipped;
    }

    let mut tree = match crate::python::parse_module(&source, &filename) {
        Ok(tree) => tree,
        Err(error) => {
            tracing::warn!(%filename, %error, "source does not parse");
            return Insertion::Failed;
        }
    };
    transform::annotate(&mut tree, schema);

    match insert_file(connection, schema, &tree, &filename, project_id) {
        Ok(_) => {
            cache.add_file(&filename);
            tracing::info!(%filename, "inserted");
            Insertion::Inserted
        }
        Err(error) if error.is_constraint_violation() => {
            // someone else landed it first; the cache was stale
            cache.add_file(&filename);
            Insertion::Cached
        }
        Err(error) => {
            tracing::error!(%filename, %error, "insertion failed");
            Insertion::Failed
        }
    }
}

/// Source files under a project directory, deepest-last, sorted for
/// deterministic ordering.
fn python_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_python_files(dir, &mut files);
    files.sort();
    files
}

fn collect_python_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_python_files(&path, files);
        } else if path.extension().is_some_and(|extension| extension == "py") {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_files_are_found_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        std::fs::write(dir.path().join("pkg/a.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("pkg/sub/b.py"), "y = 2\n").unwrap();
        std::fs::write(dir.path().join("pkg/README.md"), "nope").unwrap();

        let files = python_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|file| file.extension().unwrap() == "py"));
    }
}
