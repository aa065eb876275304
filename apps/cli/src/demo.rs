//! Demonstration scenarios
//!
//! Every scenario drives the library through real files in the configured
//! work directory and reports what happened. Files a scenario creates are
//! removed when it ends unless `keep_files` is set.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scopekit_resource::resources::{
    Connection, ConnectionConfig, Database, FileConfig, FileResource, LockConfig, LockResource,
    LockTable, Timer, TimerConfig, Transaction, TransactionConfig,
};
use scopekit_resource::{Entry, Error, Journal, Policy, ResourceStack, scoped};

use crate::cli::DemoName;
use crate::settings::Settings;

/// What one scenario did.
#[derive(Debug)]
pub struct Report {
    /// Scenario title
    pub title: &'static str,
    /// Human-readable findings, in order
    pub lines: Vec<String>,
    /// Lifecycle journal of the scenario
    pub journal: Vec<Entry>,
    /// Files removed during cleanup
    pub removed: Vec<PathBuf>,
}

type Scenario = fn(&mut Workspace) -> Result<Vec<String>>;

impl DemoName {
    fn scenarios(self) -> Vec<(&'static str, Scenario)> {
        let all: [(DemoName, &'static str, Scenario); 7] = [
            (Self::TempFile, "temporary file", temp_file),
            (Self::ReaderWriter, "reader / writer", reader_writer),
            (Self::MultiFile, "multiple files", multi_file),
            (Self::Heterogeneous, "heterogeneous resources", heterogeneous),
            (Self::Transaction, "transaction", transaction),
            (Self::Connection, "connections and log", connection),
            (Self::Failure, "failure inside a stack", failure),
        ];
        all.into_iter()
            .filter(|(name, ..)| self == Self::All || *name == self)
            .map(|(_, title, scenario)| (title, scenario))
            .collect()
    }
}

/// Run `name` (or every scenario for [`DemoName::All`]).
pub fn run(name: DemoName, settings: &Settings) -> Result<Vec<Report>> {
    fs::create_dir_all(&settings.workdir)
        .with_context(|| format!("cannot create {}", settings.workdir.display()))?;

    let mut reports = Vec::new();
    for (title, scenario) in name.scenarios() {
        tracing::info!(scenario = title, "running");
        let mut ws = Workspace::new(&settings.workdir);
        let outcome = scenario(&mut ws);
        let removed = if settings.keep_files {
            Vec::new()
        } else {
            ws.cleanup()?
        };
        let lines = outcome.with_context(|| format!("scenario '{title}' failed"))?;
        reports.push(Report {
            title,
            lines,
            journal: ws.journal.entries(),
            removed,
        });
    }
    Ok(reports)
}

/// Per-scenario state: where files go, which were created, and the journal.
struct Workspace {
    dir: PathBuf,
    created: Vec<PathBuf>,
    journal: Journal,
}

impl Workspace {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            created: Vec::new(),
            journal: Journal::new(),
        }
    }

    /// A path inside the work directory, remembered for cleanup.
    fn path(&mut self, file: &str) -> PathBuf {
        let path = self.dir.join(file);
        self.created.push(path.clone());
        path
    }

    fn cleanup(&mut self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for path in self.created.drain(..) {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("cannot remove {}", path.display()))?;
                removed.push(path);
            }
        }
        Ok(removed)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

fn temp_file(ws: &mut Workspace) -> Result<Vec<String>> {
    let path = ws.path("test_temp.txt");
    let outcome = scoped(
        "test_temp.txt",
        &FileConfig::temporary(&path),
        Policy::Propagate,
        &ws.journal,
        |file: &mut FileResource| {
            file.write_line("Ligne 1: Contenu temporaire")?;
            file.write_line("Ligne 2: Autre contenu")?;
            file.read_to_string()
        },
    )?;

    let content = outcome.completed().unwrap_or_default();
    Ok(vec![
        format!("read back {} line(s) before release", content.lines().count()),
        if path.exists() {
            "temporary file still present".to_string()
        } else {
            "temporary file removed at release".to_string()
        },
    ])
}

fn reader_writer(ws: &mut Workspace) -> Result<Vec<String>> {
    let path = ws.path("data.txt");
    scoped(
        "writer",
        &FileConfig::output(&path),
        Policy::Propagate,
        &ws.journal,
        |file: &mut FileResource| file.write_line("Donnees initiales"),
    )?;
    let data = scoped(
        "reader",
        &FileConfig::input(&path),
        Policy::Propagate,
        &ws.journal,
        |file: &mut FileResource| file.read_to_string(),
    )?
    .completed()
    .unwrap_or_default();

    Ok(vec![format!("data read: {}", data.trim())])
}

fn multi_file(ws: &mut Workspace) -> Result<Vec<String>> {
    let paths: Vec<PathBuf> = ["doc_a.txt", "doc_b.txt", "doc_c.txt"]
        .into_iter()
        .map(|name| ws.path(name))
        .collect();

    let written = ResourceStack::run(&ws.journal, |stack| {
        let mut slots = Vec::new();
        for path in &paths {
            slots.push(stack.acquire::<FileResource>(
                file_name(path),
                &FileConfig::output(path),
                Policy::Propagate,
            )?);
        }
        for (i, slot) in slots.iter().enumerate() {
            stack
                .get_mut(*slot)?
                .write_line(&format!("Contenu de test - fichier {}", i + 1))?;
        }
        Ok(slots.len())
    })?
    .completed()
    .unwrap_or_default();

    let mut lines = vec![format!("{written} files written")];
    for path in &paths {
        let content = fs::read_to_string(path)?;
        lines.push(format!("{}: {}", file_name(path), content.trim()));
    }
    Ok(lines)
}

fn heterogeneous(ws: &mut Workspace) -> Result<Vec<String>> {
    let log1 = ws.path("log1.txt");
    let log2 = ws.path("log2.txt");
    let locks = LockTable::new();

    let held = ResourceStack::run(&ws.journal, |stack| {
        let policy = Policy::Propagate;
        stack.acquire::<Timer>("context", &TimerConfig::default(), policy)?;
        let f1 = stack.acquire::<FileResource>("log1.txt", &FileConfig::output(&log1), policy)?;
        let f2 = stack.acquire::<FileResource>("log2.txt", &FileConfig::output(&log2), policy)?;
        for db in ["users_db", "products_db"] {
            stack.acquire::<Connection>(db, &ConnectionConfig::new(db), policy)?;
        }
        stack.acquire::<LockResource>("resource_lock", &LockConfig::new(&locks), policy)?;

        stack.get_mut(f1)?.write_line("Log: Debut operation")?;
        stack.get_mut(f2)?.write_line("Backup: Donnees importantes")?;
        Ok(stack.names().join(", "))
    })?
    .completed()
    .unwrap_or_default();

    Ok(vec![
        format!("acquired: {held}"),
        format!("released: {}", ws.journal.released().join(", ")),
        format!("locks still held: {}", locks.held().len()),
    ])
}

fn transaction(ws: &mut Workspace) -> Result<Vec<String>> {
    let db = Database::new();
    scoped(
        "ma_base",
        &TransactionConfig::new(&db),
        Policy::Transactional { propagate: true },
        &ws.journal,
        |tx: &mut Transaction| {
            tx.execute("INSERT INTO users VALUES ('john')")?;
            tx.execute("UPDATE stats SET count = count + 1")
        },
    )?;

    let mut lines = vec![format!("{} statement(s) committed", db.len())];
    lines.extend(db.committed().into_iter().map(|s| format!("  {s}")));
    Ok(lines)
}

fn connection(ws: &mut Workspace) -> Result<Vec<String>> {
    let mut lines = Vec::new();

    let queries = scoped(
        "Service A",
        &ConnectionConfig::new("Service A"),
        Policy::Propagate,
        &ws.journal,
        |conn: &mut Connection| {
            conn.query("SELECT status FROM service")?;
            Ok(conn.query_count())
        },
    )?
    .completed()
    .unwrap_or_default();
    lines.push(format!("Service A: {queries} query issued"));

    let log = ws.path("log.txt");
    ResourceStack::run(&ws.journal, |stack| {
        let file =
            stack.acquire::<FileResource>("log.txt", &FileConfig::log(&log), Policy::Propagate)?;
        let conn = stack.acquire::<Connection>(
            "Serveur X",
            &ConnectionConfig::new("Serveur X"),
            Policy::Propagate,
        )?;
        let service = stack.get(conn)?.database().to_string();
        stack
            .get_mut(file)?
            .write_line(&format!("[{}] Tache effectuee sur {service}", timestamp()))
    })?;
    lines.push("Serveur X: normal operations finished".to_string());

    let failed = ResourceStack::run(&ws.journal, |stack| {
        let file =
            stack.acquire::<FileResource>("log.txt", &FileConfig::log(&log), Policy::Propagate)?;
        let conn = stack.acquire::<Connection>(
            "Base Y",
            &ConnectionConfig::new("Base Y"),
            Policy::Propagate,
        )?;
        let service = stack.get(conn)?.database().to_string();
        stack
            .get_mut(file)?
            .write_line(&format!("[{}] Debut du traitement sur {service}", timestamp()))?;
        Err::<(), _>(Error::operation(service, "Erreur de traitement"))
    });
    match failed {
        Err(err) => lines.push(format!("caught outside the stack: {err}")),
        Ok(_) => lines.push("failure was not propagated".to_string()),
    }

    lines.push("log.txt:".to_string());
    lines.extend(fs::read_to_string(&log)?.lines().map(|l| format!("  {l}")));
    Ok(lines)
}

fn failure(ws: &mut Workspace) -> Result<Vec<String>> {
    let first = ws.path("first.txt");
    let second = ws.path("second.txt");
    let db = Database::new();

    let outcome = ResourceStack::run(&ws.journal, |stack| {
        let a = stack.acquire::<FileResource>(
            "first.txt",
            &FileConfig::output(&first),
            Policy::Suppress,
        )?;
        let b = stack.acquire::<FileResource>(
            "second.txt",
            &FileConfig::output(&second),
            Policy::Suppress,
        )?;
        let tx = stack.acquire::<Transaction>(
            "tx",
            &TransactionConfig::new(&db),
            Policy::Transactional { propagate: true },
        )?;

        stack.get_mut(a)?.write_line("written before the failure")?;
        stack.get_mut(b)?.write_line("written before the failure")?;
        stack.get_mut(tx)?.execute("DELETE FROM accounts")?;
        Err::<(), _>(Error::operation("body", "Division par zero"))
    })?;

    let mut lines = Vec::new();
    if let Some(err) = outcome.suppressed() {
        lines.push(format!("suppressed: {err}"));
    }
    for path in [&first, &second] {
        lines.push(format!(
            "{}: {}",
            file_name(path),
            fs::read_to_string(path)?.trim()
        ));
    }
    lines.push(format!("committed statements: {}", db.len()));
    lines.push(format!("released: {}", ws.journal.released().join(", ")));
    Ok(lines)
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
