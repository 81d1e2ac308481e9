use clap::Parser;
use log::info;

use notekeep::{App, Cli, Config, NoteStorage, Result};

fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Config::default_paths(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config = Config::with_data_dir(data_dir.clone());
    }
    if cli.watch {
        config.watch_files = true;
    }

    info!("Opening note storage at {}", config.data_dir.display());
    let mut storage = NoteStorage::new(config)?;
    storage.initialize().await?;

    let app = App::new(storage, cli.verbose);
    app.run(cli.command).await
}
