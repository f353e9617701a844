use std::path::PathBuf;

use punnote::app::App;
use punnote::config::Config;
use punnote::error::Result;

const USAGE: &str = "\
Usage: punnote [COMMAND]

  (no command)          Print a summary of bits, setlists and shows
  --export [PATH]       Write a CSV backup (default: backup_path from config)
  --import [PATH]       Replace all data with a CSV backup
  --reset               Delete all data
  --help                Show this message";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = Config::load()?;
    let path_arg = || {
        args.get(2)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&config.backup_path))
    };

    match args.get(1).map(String::as_str) {
        Some("--help") | Some("-h") => {
            println!("{}", USAGE);
            return Ok(());
        }
        Some("--export") => {
            let app = App::new(&config).await?;
            let path = path_arg();
            app.export_backup(&path).await?;
            println!("Exported backup to {:?}", path);
        }
        Some("--import") => {
            let app = App::new(&config).await?;
            let path = path_arg();
            app.import_backup(&path).await?;
            println!("Restored data from {:?}", path);
        }
        Some("--reset") => {
            let app = App::new(&config).await?;
            app.reset().await?;
            println!("Deleted all bits, setlists and shows");
        }
        Some(other) => {
            eprintln!("Unknown argument: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
        None => {
            let app = App::new(&config).await?;
            print!("{}", app.summary().await?);
        }
    }

    Ok(())
}
