use std::path::PathBuf;

use ankimd::{
    anki::api::{
        HttpClient,
        DEFAULT_URL,
    },
    note::{
        FileErrorLog,
        NoteSet,
    },
    AnkimdError,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ankimd", version)]
#[command(about = "Sync markdown flashcards with Anki over AnkiConnect", long_about = None)]
struct Cli {
    /// Markdown file containing the cards
    file: PathBuf,

    /// AnkiConnect endpoint
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// File unrepairable notes are appended to
    #[arg(long, default_value = "error_log.txt")]
    error_log: PathBuf,

    /// Do not upload referenced media files
    #[arg(long)]
    skip_media: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AnkimdError> {
    let client = HttpClient::new(&cli.url);
    let version = client.check_connection()?;
    info!("connected to AnkiConnect v{}", version);

    let mut noteset = NoteSet::from_file(&cli.file)?;
    let mut error_log = FileErrorLog::new(&cli.error_log);

    noteset.check_deck(&client)?;
    noteset.check_notes(&client, &mut error_log)?;

    if !cli.skip_media {
        noteset.upload_media(&client)?;
    }

    noteset.upload_new_notes(&client)?;
    noteset.update_existing_notes(&client)?;
    noteset.save()?;

    info!("done");
    Ok(())
}
