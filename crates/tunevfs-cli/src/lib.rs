//! tunevfs command line: browse catalogs through the polling client.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tunevfs_kernel::vfs::MemoryRoot;
use tunevfs_kernel::{RowCallback, VfsConfig, VfsKernel};
use tunevfs_types::{FileRow, ObjectRow, Progress, ResultRow};

#[derive(Debug, Parser)]
#[command(name = "tunevfs", version, about = "Browse remote music catalogs as one tree")]
pub struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/tunevfs/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog manifest to mount as archive:/ (overrides the config)
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Print rows as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "vfs:/")]
        uri: String,
    },
    /// Show a single object
    Resolve { uri: String },
    /// Show the path from the catalog root down to an object
    Parents { uri: String },
    /// Search files below a directory
    Search { uri: String, query: String },
    /// Show a file with its download locations
    File { uri: String },
}

/// Load the configuration named on the command line, or the default one.
pub fn load_config(cli: &Cli) -> Result<VfsConfig> {
    let mut config = match &cli.config {
        Some(path) => VfsConfig::load_from(path)?,
        None => VfsConfig::load()?,
    };
    if let Some(manifest) = &cli.manifest {
        config.catalog.manifest = Some(manifest.clone());
    }
    Ok(config)
}

/// A few entries so `mem:/` has something to show.
pub fn populate_demo(root: &MemoryRoot) {
    root.add_dir("playlists", "Saved playlists");
    root.add_file("playlists/favourites/01 Overture.mp3", "Opening theme", "2:14");
    root.add_file("playlists/favourites/02 Battle.mp3", "Boss battle", "3:05");
    root.add_file("playlists/favourites/10 Ending.mp3", "Staff roll", "5:41");
    root.add_file("scratch/notes.txt", "", "1 KiB");
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let kernel = VfsKernel::new(config).context("Failed to start tunevfs")?;
    populate_demo(kernel.scratch());

    let client = kernel.client().clone();
    let cancel = client.cancel_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut out = Printer::new(cli.json);
    match &cli.command {
        Command::Ls { uri } => client.list(uri, &mut out).await?,
        Command::Parents { uri } => client.parents(uri, &mut out).await?,
        Command::Search { uri, query } => client.search(uri, query, &mut out).await?,
        Command::Resolve { uri } => {
            let row = client.resolve(uri).await?;
            out.on_row(row);
        }
        Command::File { uri } => {
            let file = client.file(uri).await?;
            out.on_row(ResultRow::File(file));
        }
    }
    kernel.shutdown();
    Ok(())
}

/// Writes rows to stdout as text or JSON lines; progress goes to stderr.
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl RowCallback for Printer {
    fn on_row(&mut self, row: ResultRow) {
        let line = if self.json {
            serde_json::to_string(&row).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        } else {
            format_row(&row)
        };
        let mut stdout = std::io::stdout().lock();
        if writeln!(stdout, "{line}").is_err() {
            tracing::debug!("stdout closed");
        }
    }

    fn on_progress(&mut self, progress: Progress) {
        if !self.json {
            eprintln!("… {progress}");
        }
    }
}

/// One line of human-readable output.
pub fn format_row(row: &ResultRow) -> String {
    match row {
        ResultRow::Directory(ObjectRow {
            uri,
            name,
            description,
            has_feed,
            ..
        }) => {
            let feed = if *has_feed { " [feed]" } else { "" };
            with_description(format!("{name}/{feed}  {uri}"), description)
        }
        ResultRow::File(FileRow {
            uri,
            name,
            description,
            size,
            download_uris,
            ..
        }) => {
            let mut line = with_description(format!("{name}  {size}  {uri}"), description);
            for location in download_uris {
                line.push_str("\n    ");
                line.push_str(location);
            }
            line
        }
        ResultRow::Delimiter => "--".to_string(),
        ResultRow::Progress(progress) => format!("… {progress}"),
        ResultRow::Error { message } => format!("error: {message}"),
    }
}

fn with_description(line: String, description: &str) -> String {
    if description.is_empty() {
        line
    } else {
        format!("{line}  ({description})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["tunevfs", "ls"], "vfs:/")]
    #[case(&["tunevfs", "ls", "archive:/series"], "archive:/series")]
    #[case(&["tunevfs", "--json", "ls", "mem:/"], "mem:/")]
    fn ls_defaults_to_router_root(#[case] args: &[&str], #[case] expected: &str) {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Ls { uri } => assert_eq!(uri, expected),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn search_takes_uri_and_query() {
        let cli = Cli::try_parse_from(["tunevfs", "search", "archive:/", "zelda", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Search { ref uri, ref query } if uri == "archive:/" && query == "zelda"
        ));
    }

    #[test]
    fn format_file_lists_download_locations() {
        let row = ResultRow::File(FileRow {
            uri: "archive:/albums/oot/01.mp3".into(),
            name: "Title Theme".into(),
            description: String::new(),
            size: "1:52".into(),
            cache_path: Some("oot/01.mp3".into()),
            download_uris: vec!["https://example.com/oot/01.mp3".into()],
        });
        assert_eq!(
            format_row(&row),
            "Title Theme  1:52  archive:/albums/oot/01.mp3\n    https://example.com/oot/01.mp3"
        );
    }

    #[test]
    fn format_directory_marks_feeds() {
        let row = ResultRow::Directory(ObjectRow {
            uri: "archive:/random".into(),
            name: "Random".into(),
            description: "Random tracks".into(),
            icon: None,
            has_feed: true,
        });
        assert_eq!(format_row(&row), "Random/ [feed]  archive:/random  (Random tracks)");
    }

    #[test]
    fn config_file_and_manifest_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client]\npoll_interval_ms = 50\n").unwrap();
        let cli = Cli::try_parse_from([
            "tunevfs",
            "--config",
            path.to_str().unwrap(),
            "--manifest",
            "/srv/manifest.json",
            "ls",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.client.poll_interval_ms, 50);
        assert_eq!(
            config.catalog.manifest,
            Some(PathBuf::from("/srv/manifest.json"))
        );
    }
}
