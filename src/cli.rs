use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "entitylink",
    about = "Link mentions in analysed text to entities of a knowledge base"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load entity dumps (JSON lines or JSON arrays) into the entity index
    Index(IndexArgs),
    /// Link analysed documents against the entity index
    Link(LinkArgs),
    /// Look up candidate entities for a label
    Lookup(LookupArgs),
    /// Build the label corpora of a profile and show their sizes
    Corpus(CorpusArgs),
    /// Manage linking profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Show index and profile statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

/// Where linking settings come from.
#[derive(Debug, Clone, Parser)]
pub struct SettingsArgs {
    /// Use a stored profile instead of the default one
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Read settings from a JSON file
    #[arg(long, conflicts_with = "profile")]
    pub config: Option<PathBuf>,
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// A dump file or a directory of dumps
    pub path: PathBuf,

    /// Remove all entities before loading
    #[arg(long)]
    pub replace: bool,
}

// -- Link --

#[derive(Debug, Parser)]
pub struct LinkArgs {
    /// Analysed documents or directories of documents
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Serve lookups from in-memory label corpora
    #[arg(long)]
    pub corpus: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Lookup --

#[derive(Debug, Parser)]
pub struct LookupArgs {
    /// The label to look up
    pub label: String,

    /// Language of the label
    #[arg(short, long)]
    pub language: Option<String>,

    /// Maximum number of candidates
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Corpus --

#[derive(Debug, Parser)]
pub struct CorpusArgs {
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Language configuration overriding the profile's (e.g. "en,de,*")
    #[arg(long)]
    pub languages: Option<String>,

    /// Worker threads overriding the profile's
    #[arg(long)]
    pub threads: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Profile --

#[derive(Debug, Subcommand)]
pub enum ProfileAction {
    /// Store settings from a JSON file under a name
    Set {
        name: String,
        /// Settings JSON file
        file: PathBuf,
    },
    /// Print a profile as JSON
    Show {
        /// Profile name (default profile if omitted)
        name: Option<String>,
    },
    /// List stored profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a profile
    Remove { name: String },
    /// Make a profile the default
    Default { name: String },
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "entitylink",
            &mut std::io::stdout(),
        );
    }
}
