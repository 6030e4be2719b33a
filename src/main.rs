use anyhow::Result;
use std::io::{self, Stdout};
use std::path::Path;
use std::time::Instant;
use tracing::info;
use x4_save_to_sqlite::{
    catalog::load_catalogs,
    cli::{Cli, Commands, ProgressMode},
    config::{init_logging, AppDirs, LoadOptions},
    content::{ContentXmlOrder, FsProvider},
    progress::{JsonLinesSink, NullSink, ProgressSink},
    save::import_save,
    stats::Stats,
    ui::{Phase, UiApp},
    writer::{sqlite::list_objects, Store},
};

/// Where progress events go for the chosen mode
enum Reporter {
    Tui(UiApp),
    Json(JsonLinesSink<Stdout>),
    Quiet(NullSink),
}

impl Reporter {
    fn new(mode: ProgressMode) -> Result<Self> {
        Ok(match mode {
            ProgressMode::Tui => Reporter::Tui(UiApp::new()?),
            ProgressMode::Json => Reporter::Json(JsonLinesSink::new(io::stdout())),
            ProgressMode::Quiet => Reporter::Quiet(NullSink),
        })
    }

    fn sink(&mut self) -> &mut dyn ProgressSink {
        match self {
            Reporter::Tui(ui) => ui,
            Reporter::Json(sink) => sink,
            Reporter::Quiet(sink) => sink,
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if let Reporter::Tui(ui) = self {
            ui.set_phase(phase);
        }
        info!("{}", phase);
    }

    fn finish(self, summary: &str) -> Result<()> {
        match self {
            Reporter::Tui(ui) => ui.finish(summary),
            Reporter::Json(_) => {
                info!("{}", summary);
                Ok(())
            }
            Reporter::Quiet(_) => {
                println!("{}", summary);
                Ok(())
            }
        }
    }
}

/// Open the store, run `work` with progress, then show the summary and
/// the refreshed counts
fn run_with_progress<F>(mode: ProgressMode, db_path: &Path, work: F) -> Result<()>
where
    F: FnOnce(&mut Store, &mut Reporter) -> Result<String>,
{
    let mut reporter = Reporter::new(mode)?;
    reporter.set_phase(Phase::Preparing);
    let mut store = Store::open(db_path)?;

    let start = Instant::now();
    let summary = work(&mut store, &mut reporter)?;

    let mut stats = Stats::default();
    stats.refresh(store.conn()?);
    store.close();

    reporter.finish(&format!(
        "{} in {:.1}s\n{}",
        summary,
        start.elapsed().as_secs_f64(),
        stats
    ))
}

fn load(store: &mut Store, reporter: &mut Reporter, game_dir: &Path, options: &LoadOptions) -> Result<String> {
    reporter.set_phase(Phase::LoadingCatalogs);
    let report = load_catalogs(
        store,
        Some(game_dir),
        &FsProvider,
        &ContentXmlOrder,
        options,
        reporter.sink(),
    )?;
    Ok(format!("Loaded catalogs of {} package(s)", report.packages.len()))
}

fn import(store: &mut Store, reporter: &mut Reporter, save: &Path, options: &LoadOptions) -> Result<String> {
    reporter.set_phase(Phase::ImportingSave);
    let report = import_save(store, Some(save), options, reporter.sink())?;
    if report.unresolved.total() > 0 {
        Ok(format!(
            "Imported save ({} unresolved entries dropped)",
            report.unresolved.total()
        ))
    } else {
        Ok("Imported save".to_string())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let dirs = AppDirs::new(None)?;

    // the terminal belongs to the progress screen while it runs
    let draws_screen = cli.progress == ProgressMode::Tui
        && matches!(
            cli.command,
            Commands::LoadCatalogs { .. } | Commands::ImportSave { .. } | Commands::Sync { .. }
        );
    let log_path = dirs.log_path();
    init_logging(cli.log_level.as_deref(), draws_screen.then_some(log_path.as_path()))?;

    let db_path = cli.db.clone().unwrap_or_else(|| dirs.default_db_path());

    match cli.command {
        Commands::Init => {
            let store = Store::open(&db_path)?;
            println!("{:?}: schema {}", store.path(), store.schema_status());
        }

        Commands::LoadCatalogs {
            game_dir,
            all_languages,
        } => {
            let options = LoadOptions {
                load_only_game_language: !all_languages,
                ..LoadOptions::default()
            };
            run_with_progress(cli.progress, &db_path, |store, reporter| {
                load(store, reporter, &game_dir, &options)
            })?;
        }

        Commands::ImportSave {
            save,
            removed_objects,
        } => {
            let options = LoadOptions {
                load_removed_objects: removed_objects,
                ..LoadOptions::default()
            };
            run_with_progress(cli.progress, &db_path, |store, reporter| {
                import(store, reporter, &save, &options)
            })?;
        }

        Commands::Sync {
            game_dir,
            save,
            all_languages,
            removed_objects,
        } => {
            let options = LoadOptions {
                load_only_game_language: !all_languages,
                load_removed_objects: removed_objects,
                ..LoadOptions::default()
            };
            run_with_progress(cli.progress, &db_path, |store, reporter| {
                let loaded = load(store, reporter, &game_dir, &options)?;
                let imported = import(store, reporter, &save, &options)?;
                Ok(format!("{}; {}", loaded, imported))
            })?;
        }

        Commands::Stats { json } => {
            let mut store = Store::open(&db_path)?;
            let stats = Stats::collect(store.conn()?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Database {:?}:\n{}", db_path, stats);
            }
        }

        Commands::ListTables => {
            let mut store = Store::open(&db_path)?;
            println!("Tables and views in {:?}:\n", db_path);
            for object in list_objects(store.conn()?)? {
                match object.rows {
                    Some(rows) => println!("  {:<32} {:<6} {}", object.name, object.kind, rows),
                    None => println!("  {:<32} {}", object.name, object.kind),
                }
            }
        }
    }

    Ok(())
}
