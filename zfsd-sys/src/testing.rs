// SPDX-License-Identifier: GPL-3.0-only

//! In-memory stand-in for the `zfs` tool
//!
//! [`FakeZfs`] implements [`CommandRunner`] by interpreting the argument lists
//! the repository and lifecycle engine build, against a map of datasets. Every
//! call is recorded so tests can assert on exactly which commands were run.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::command::{CommandInvocation, CommandOutput, CommandRunner, ExecutionError, Row};

type Properties = BTreeMap<String, String>;

/// A command received by [`FakeZfs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
}

impl RecordedCall {
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

#[derive(Default)]
struct FakeState {
    datasets: BTreeMap<String, Properties>,
    calls: Vec<RecordedCall>,
    failures: HashMap<String, String>,
    txg: u64,
}

impl FakeState {
    fn insert(&mut self, name: &str, mut properties: Properties) {
        self.txg += 1;
        properties.insert("createtxg".to_string(), self.txg.to_string());
        self.datasets.insert(name.to_string(), properties);
    }
}

#[derive(Default)]
pub struct FakeZfs {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct Query {
    recursive: bool,
    fields: Vec<String>,
    types: String,
    positionals: Vec<String>,
}

fn parse_query(args: &[String]) -> Query {
    let mut query = Query::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-o" => {
                query.fields = iter
                    .next()
                    .map(|list| list.split(',').map(ToString::to_string).collect())
                    .unwrap_or_default();
            }
            "-t" => query.types = iter.next().cloned().unwrap_or_default(),
            flag if flag.starts_with('-') && flag.len() > 1 => {
                if flag.contains('r') {
                    query.recursive = true;
                }
            }
            _ => query.positionals.push(arg.clone()),
        }
    }
    query
}

fn is_descendant(name: &str, ancestor: &str) -> bool {
    name.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with(['/', '@', '#']))
}

fn filesystem_properties(name: &str) -> Properties {
    [
        ("type", "filesystem".to_string()),
        ("used", "1024".to_string()),
        ("available", "1048576".to_string()),
        ("written", "1024".to_string()),
        ("volsize", "-".to_string()),
        ("quota", "0".to_string()),
        ("referenced", "1024".to_string()),
        ("usedbydataset", "1024".to_string()),
        ("logicalused", "2048".to_string()),
        ("mountpoint", format!("/{name}")),
        ("compression", "off".to_string()),
        ("origin", "-".to_string()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

impl FakeZfs {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_dataset(&self, name: &str, properties: Properties) {
        self.state().insert(name, properties);
    }

    pub fn add_filesystem(&self, name: &str) {
        self.add_dataset(name, filesystem_properties(name));
    }

    pub fn add_volume(&self, name: &str, size: u64) {
        let mut properties = filesystem_properties(name);
        properties.insert("type".into(), "volume".into());
        properties.insert("volsize".into(), size.to_string());
        properties.insert("mountpoint".into(), "-".into());
        properties.insert("quota".into(), "-".into());
        self.add_dataset(name, properties);
    }

    pub fn add_snapshot(&self, name: &str) {
        let mut state = self.state();
        let properties = snapshot_properties(&state, name);
        state.insert(name, properties);
    }

    /// Add a bookmark; `zfs -t all` reports these alongside datasets
    pub fn add_bookmark(&self, name: &str) {
        let mut properties = filesystem_properties(name);
        for property in ["used", "available", "written", "quota", "usedbydataset", "logicalused"] {
            properties.insert(property.into(), "-".into());
        }
        properties.insert("type".into(), "bookmark".into());
        properties.insert("mountpoint".into(), "-".into());
        self.add_dataset(name, properties);
    }

    /// Overwrite a property without recording a call
    pub fn set_property(&self, name: &str, property: &str, value: &str) {
        if let Some(properties) = self.state().datasets.get_mut(name) {
            properties.insert(property.to_string(), value.to_string());
        }
    }

    pub fn properties(&self, name: &str) -> Option<Properties> {
        self.state().datasets.get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state().datasets.contains_key(name)
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.state().datasets.keys().cloned().collect()
    }

    /// Make every later call of `subcommand` fail with `stderr`
    pub fn fail_on(&self, subcommand: &str, stderr: &str) {
        self.state()
            .failures
            .insert(subcommand.to_string(), stderr.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn calls_to(&self, subcommand: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.subcommand() == Some(subcommand))
            .collect()
    }
}

fn snapshot_properties(state: &FakeState, name: &str) -> Properties {
    let parent = name.split('@').next().unwrap_or(name);
    let compression = state
        .datasets
        .get(parent)
        .and_then(|properties| properties.get("compression").cloned())
        .unwrap_or_else(|| "off".to_string());

    let mut properties = filesystem_properties(name);
    for (key, value) in [
        ("type", "snapshot".to_string()),
        ("used", "0".to_string()),
        ("available", "-".to_string()),
        ("quota", "-".to_string()),
        ("mountpoint", "-".to_string()),
        ("compression", compression),
    ] {
        properties.insert(key.to_string(), value);
    }
    properties
}

struct Failure(String);

type Outcome = Result<Vec<Row>, Failure>;

fn not_found(name: &str) -> Failure {
    Failure(format!("cannot open '{name}': dataset does not exist\n"))
}

impl FakeState {
    fn select(&self, query: &Query) -> Result<Vec<String>, Failure> {
        let mut names: Vec<String> = if query.positionals.is_empty() {
            self.datasets.keys().cloned().collect()
        } else {
            let mut selected = Vec::new();
            for target in &query.positionals {
                if !self.datasets.contains_key(target) {
                    return Err(not_found(target));
                }
                if query.recursive {
                    selected.extend(
                        self.datasets
                            .keys()
                            .filter(|name| *name == target || is_descendant(name, target))
                            .cloned(),
                    );
                } else {
                    selected.push(target.clone());
                }
            }
            selected
        };

        if !query.types.is_empty() && query.types != "all" {
            let wanted: Vec<&str> = query.types.split(',').collect();
            names.retain(|name| {
                self.datasets[name]
                    .get("type")
                    .is_some_and(|kind| wanted.contains(&kind.as_str()))
            });
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn value(&self, name: &str, property: &str) -> String {
        self.datasets[name]
            .get(property)
            .cloned()
            .unwrap_or_else(|| "-".to_string())
    }

    fn get(&self, args: &[String]) -> Outcome {
        let mut query = parse_query(args);
        if query.positionals.is_empty() {
            return Err(Failure("missing property argument\n".to_string()));
        }
        let property_list = query.positionals.remove(0);
        let fields = if query.fields.is_empty() {
            ["name", "property", "value", "source"]
                .map(String::from)
                .to_vec()
        } else {
            query.fields.clone()
        };

        let mut rows = Vec::new();
        for name in self.select(&query)? {
            let properties: Vec<String> = if property_list == "all" {
                self.datasets[&name].keys().cloned().collect()
            } else {
                property_list.split(',').map(ToString::to_string).collect()
            };
            for property in properties {
                let value = self.value(&name, &property);
                rows.push(
                    fields
                        .iter()
                        .map(|field| match field.as_str() {
                            "name" => name.clone(),
                            "property" => property.clone(),
                            "value" => value.clone(),
                            _ => "-".to_string(),
                        })
                        .collect(),
                );
            }
        }
        Ok(rows)
    }

    fn list(&self, args: &[String]) -> Outcome {
        let query = parse_query(args);
        let columns = if query.fields.is_empty() {
            vec!["name".to_string()]
        } else {
            query.fields.clone()
        };

        Ok(self
            .select(&query)?
            .into_iter()
            .map(|name| {
                columns
                    .iter()
                    .map(|column| match column.as_str() {
                        "name" => name.clone(),
                        property => self.value(&name, property),
                    })
                    .collect()
            })
            .collect())
    }

    fn set(&mut self, args: &[String]) -> Outcome {
        let Some((name, assignments)) = args.split_last() else {
            return Err(Failure("missing dataset argument\n".to_string()));
        };
        if !self.datasets.contains_key(name) {
            return Err(not_found(name));
        }
        for assignment in assignments {
            let Some((key, value)) = assignment.split_once('=') else {
                return Err(Failure(format!("invalid property assignment '{assignment}'\n")));
            };
            if let Some(properties) = self.datasets.get_mut(name) {
                properties.insert(key.to_string(), value.to_string());
            }
        }
        Ok(Vec::new())
    }

    fn snapshot(&mut self, args: &[String]) -> Outcome {
        let query = parse_query(args);
        for snapshot in &query.positionals {
            let Some((parent, label)) = snapshot.split_once('@') else {
                return Err(Failure(format!("invalid snapshot name '{snapshot}'\n")));
            };
            if !self.datasets.contains_key(parent) {
                return Err(not_found(parent));
            }
            if self.datasets.contains_key(snapshot) {
                return Err(Failure(format!(
                    "cannot create snapshot '{snapshot}': dataset already exists\n"
                )));
            }

            let mut parents = vec![parent.to_string()];
            if query.recursive {
                parents.extend(
                    self.datasets
                        .keys()
                        .filter(|name| is_descendant(name, parent) && !name.contains('@'))
                        .cloned(),
                );
            }
            for parent in parents {
                let name = format!("{parent}@{label}");
                let properties = snapshot_properties(self, &name);
                self.insert(&name, properties);
            }
        }
        Ok(Vec::new())
    }

    fn clone_snapshot(&mut self, args: &[String]) -> Outcome {
        let mut overrides = Properties::new();
        let mut positionals = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "-o" {
                if let Some((key, value)) = iter.next().and_then(|pair| pair.split_once('=')) {
                    overrides.insert(key.to_string(), value.to_string());
                }
            } else {
                positionals.push(arg.clone());
            }
        }

        let [source, target] = positionals.as_slice() else {
            return Err(Failure("usage: clone [-o property=value]... <snapshot> <target>\n".to_string()));
        };
        if !self.datasets.contains_key(source) {
            return Err(not_found(source));
        }
        if self.datasets[source].get("type").map(String::as_str) != Some("snapshot") {
            return Err(Failure(format!(
                "cannot clone '{source}': operation only applies to snapshots\n"
            )));
        }
        if self.datasets.contains_key(target) {
            return Err(Failure(format!(
                "cannot create '{target}': dataset already exists\n"
            )));
        }

        let mut properties = filesystem_properties(target);
        properties.insert("origin".to_string(), source.clone());
        properties.extend(overrides);
        self.insert(target, properties);
        Ok(Vec::new())
    }

    fn destroy(&mut self, args: &[String]) -> Outcome {
        let query = parse_query(args);
        let Some(name) = query.positionals.first() else {
            return Err(Failure("missing dataset argument\n".to_string()));
        };
        if !self.datasets.contains_key(name) {
            return Err(not_found(name));
        }

        let children: Vec<String> = self
            .datasets
            .keys()
            .filter(|candidate| is_descendant(candidate, name))
            .cloned()
            .collect();
        if !children.is_empty() && !query.recursive {
            return Err(Failure(format!(
                "cannot destroy '{name}': filesystem has children\nuse '-r' to destroy the following datasets:\n{}\n",
                children.join("\n")
            )));
        }

        for child in children {
            self.datasets.remove(&child);
        }
        self.datasets.remove(name);
        Ok(Vec::new())
    }

    fn rollback(&mut self, args: &[String]) -> Outcome {
        let query = parse_query(args);
        let Some(snapshot) = query.positionals.first() else {
            return Err(Failure("missing snapshot argument\n".to_string()));
        };
        if !self.datasets.contains_key(snapshot) {
            return Err(not_found(snapshot));
        }
        let Some((parent, _)) = snapshot.split_once('@') else {
            return Err(Failure(format!("'{snapshot}' is not a snapshot\n")));
        };

        let txg = |name: &str| -> u64 {
            self.datasets[name]
                .get("createtxg")
                .and_then(|value| value.parse().ok())
                .unwrap_or(0)
        };
        let target_txg = txg(snapshot.as_str());
        let prefix = format!("{parent}@");
        let newer: Vec<String> = self
            .datasets
            .keys()
            .filter(|name| name.starts_with(&prefix) && txg(name.as_str()) > target_txg)
            .cloned()
            .collect();

        if !newer.is_empty() && !query.recursive {
            return Err(Failure(format!(
                "cannot rollback to '{snapshot}': more recent snapshots or bookmarks exist\nuse '-r' to force deletion of the following snapshots and bookmarks:\n{}\n",
                newer.join("\n")
            )));
        }
        for name in newer {
            self.datasets.remove(&name);
        }
        Ok(Vec::new())
    }
}

impl CommandRunner for FakeZfs {
    fn run(&self, invocation: CommandInvocation) -> Result<CommandOutput, ExecutionError> {
        let streamed = invocation.has_stdout_sink();
        let call = RecordedCall {
            program: invocation.program,
            args: invocation.args,
        };

        let mut state = self.state();
        state.calls.push(call.clone());

        let subcommand = call.subcommand().unwrap_or_default().to_string();
        let rest = call.args.get(1..).unwrap_or_default();

        let injected = state.failures.get(&subcommand).cloned();
        let outcome = match injected {
            Some(stderr) => Err(Failure(stderr)),
            None => match subcommand.as_str() {
                "get" => state.get(rest),
                "list" => state.list(rest),
                "set" => state.set(rest),
                "snapshot" => state.snapshot(rest),
                "clone" => state.clone_snapshot(rest),
                "destroy" => state.destroy(rest),
                "rollback" => state.rollback(rest),
                other => Err(Failure(format!("unrecognized command '{other}'\n"))),
            },
        };

        match outcome {
            Ok(_) if streamed => Ok(CommandOutput::Streamed),
            Ok(rows) => Ok(CommandOutput::Captured(rows)),
            Err(Failure(stderr)) => Err(ExecutionError::Failed {
                command: call.program,
                arguments: call.args,
                status: Some(1),
                stderr,
            }),
        }
    }
}
