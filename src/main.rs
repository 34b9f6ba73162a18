use std::path::Path;

use clap::Parser;
use entitylink::{
    ConfigDb,
    DataDir,
    EntityIndex,
    EntityLinker,
    Settings,
    batch,
    corpus::{CorpusSearcher, CorpusSpec},
    error::{self, Error},
    ingestion,
    label_tokenizer::LabelTokenizer,
    language::LanguageConfiguration,
    lookup::CandidateLookup,
    output,
    searcher::EntitySearcher,
    walker,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ProfileAction, SettingsArgs};

/// Indexing memory budget of the tantivy writer.
const WRITER_BUDGET: usize = 15_000_000;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ENTITYLINK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;

    match cli.command {
        Command::Index(args) => {
            cmd_index(&data_dir, &args.path, args.replace)?;
        }
        Command::Link(args) => {
            cmd_link(&config_db, &data_dir, &args)?;
        }
        Command::Lookup(args) => {
            cmd_lookup(&config_db, &data_dir, &args)?;
        }
        Command::Corpus(args) => {
            cmd_corpus(&config_db, &data_dir, &args)?;
        }
        Command::Profile { action } => match action {
            ProfileAction::Set { name, file } => {
                let settings = Settings::from_file(&file)?;
                config_db.set_profile(&name, &settings)?;
                println!("Stored profile '{name}'");
            }
            ProfileAction::Show { name } => {
                let settings = config_db.resolve_settings(name.as_deref())?;
                println!("{}", settings.to_json()?);
            }
            ProfileAction::List { json } => {
                profile_list(&config_db, json)?;
            }
            ProfileAction::Remove { name } => {
                if !config_db.remove_profile(&name)? {
                    return Err(Error::NotFound {
                        kind: "profile",
                        name,
                    });
                }
                println!("Removed profile '{name}'");
            }
            ProfileAction::Default { name } => {
                config_db.set_default_profile(&name)?;
                println!("Default profile is now '{name}'");
            }
        },
        Command::Status(args) => {
            cmd_status(&config_db, &data_dir, args.json)?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

/// Settings from a file, a named profile or the default profile.
fn load_settings(
    config_db: &ConfigDb,
    args: &SettingsArgs,
) -> error::Result<Settings> {
    match &args.config {
        Some(path) => Settings::from_file(path),
        None => config_db.resolve_settings(args.profile.as_deref()),
    }
}

fn cmd_index(data_dir: &DataDir, path: &Path, replace: bool) -> error::Result<()> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "path does not exist: {}",
            path.display()
        )));
    }

    let index = EntityIndex::open(&data_dir.index_dir()?)?;
    let mut writer = index.writer(WRITER_BUDGET)?;
    if replace {
        index.clear(&mut writer)?;
        eprintln!("Cleared entity index");
    }

    let files = walker::discover_files(path, walker::ENTITY_EXTENSIONS)?;
    eprintln!("Found {} entity files", files.len());

    let stats = ingestion::ingest_files(&index, &mut writer, &files)?;
    eprintln!(
        "Indexed {} entities from {} files ({} skipped)",
        stats.entities, stats.files, stats.skipped
    );
    Ok(())
}

fn cmd_link(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    args: &cli::LinkArgs,
) -> error::Result<()> {
    let settings = load_settings(config_db, &args.settings)?;
    let mut files = Vec::new();
    for path in &args.paths {
        files.extend(walker::discover_files(path, walker::DOCUMENT_EXTENSIONS)?);
    }
    let documents = ingestion::load_documents(&files);
    if documents.is_empty() {
        eprintln!("No documents to link.");
        return Ok(());
    }

    let index = EntityIndex::open(&data_dir.index_dir()?)?;
    let tokenizer = index.label_tokenizer();

    if args.corpus {
        let specs = CorpusSpec::from_languages(
            &settings.language_configuration()?,
            &settings.corpus.default_field,
        );
        let threads = settings.corpus.threads;
        let searcher = CorpusSearcher::build(index, &specs, threads)?;
        link_and_print(&searcher, settings, tokenizer, &documents, args.json)
    } else {
        link_and_print(&index, settings, tokenizer, &documents, args.json)
    }
}

fn link_and_print(
    searcher: &dyn EntitySearcher,
    settings: Settings,
    tokenizer: impl LabelTokenizer + 'static,
    documents: &[entitylink::AnalyzedText],
    json: bool,
) -> error::Result<()> {
    let linker = EntityLinker::new(searcher, settings)?.with_tokenizer(tokenizer);

    let mut linked = Vec::with_capacity(documents.len());
    let mut failed = 0;
    for result in batch::link_documents(&linker, documents) {
        match result {
            Ok(r) => linked.push(r),
            Err(e) => {
                eprintln!("Error: {e}");
                failed += 1;
            }
        }
    }

    if json {
        println!("{}", output::render_json(&linked)?);
    } else {
        for result in &linked {
            print!("{}", output::render_human(result));
        }
    }

    if failed > 0 {
        eprintln!("{failed} of {} documents failed", documents.len());
    }
    Ok(())
}

fn cmd_lookup(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    args: &cli::LookupArgs,
) -> error::Result<()> {
    let settings = load_settings(config_db, &args.settings)?;
    let languages = settings.language_configuration()?;
    let index = EntityIndex::open(&data_dir.index_dir()?)?;
    let tokenizer = index.label_tokenizer();

    let mut lookup = CandidateLookup::new(&index, &tokenizer, &languages, args.count)
        .with_default_language(settings.linker.default_language.as_deref());
    let candidates = lookup.lookup(&args.label, args.language.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
    } else if candidates.is_empty() {
        println!("No entities match '{}'", args.label);
    } else {
        print!("{}", output::render_candidates(&candidates));
    }
    Ok(())
}

fn cmd_corpus(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    args: &cli::CorpusArgs,
) -> error::Result<()> {
    let settings = load_settings(config_db, &args.settings)?;
    let languages = match &args.languages {
        Some(items) => LanguageConfiguration::parse(items)?,
        None => settings.language_configuration()?,
    };
    let threads = args.threads.unwrap_or(settings.corpus.threads);
    let specs = CorpusSpec::from_languages(&languages, &settings.corpus.default_field);
    let index = EntityIndex::open(&data_dir.index_dir()?)?;
    let searcher = CorpusSearcher::build(index, &specs, threads)?;

    let rows: Vec<serde_json::Value> = specs
        .iter()
        .map(|spec| {
            let (labels, terms) = searcher
                .corpus(spec)
                .map_or((0, 0), |c| (c.len(), c.terms()));
            serde_json::json!({
                "language": spec.language,
                "field": spec.field,
                "labels": labels,
                "terms": terms,
            })
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for (spec, row) in specs.iter().zip(&rows) {
            println!("{spec}: {} labels, {} terms", row["labels"], row["terms"]);
        }
    }
    Ok(())
}

fn profile_list(config_db: &ConfigDb, json: bool) -> error::Result<()> {
    let profiles = config_db.list_profiles()?;
    let default = config_db.default_profile()?;

    if json {
        let value = serde_json::json!({
            "default": default,
            "profiles": profiles,
        });
        println!("{value}");
    } else if profiles.is_empty() {
        println!("No profiles. Built-in defaults are used.");
    } else {
        for name in &profiles {
            let marker = if default.as_deref() == Some(name) { "*" } else { " " };
            println!("{marker} {name}");
        }
    }
    Ok(())
}

fn cmd_status(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    json: bool,
) -> error::Result<()> {
    let index = EntityIndex::open(&data_dir.index_dir()?)?;
    let stats = index.stats()?;
    let profiles = config_db.list_profiles()?;
    let default = config_db.default_profile()?;

    if json {
        let value = serde_json::json!({
            "data_dir": data_dir.root(),
            "entities": stats.entities,
            "labels": stats.labels,
            "profiles": profiles.len(),
            "default_profile": default,
        });
        println!("{value}");
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Entities: {}", stats.entities);
        println!("Labels: {}", stats.labels);
        println!("Profiles: {}", profiles.len());
        if let Some(name) = default {
            println!("Default profile: {name}");
        }
    }
    Ok(())
}
