//! `cutout` -- interactive console for the image-editing service.
//!
//! Uploads images, adjusts edit options with a live (debounced) preview,
//! and exports finished archives. Reads one command per line from stdin;
//! type `help` for the list.
//!
//! # Environment variables
//!
//! | Variable                      | Default                 | Description                         |
//! |-------------------------------|-------------------------|-------------------------------------|
//! | `CUTOUT_SERVICE_URL`          | `http://127.0.0.1:7860` | Processing Service base URL         |
//! | `CUTOUT_PREVIEW_DEBOUNCE_MS`  | `150`                   | Quiet period before a preview       |
//! | `CUTOUT_PREVIEW_TIMEOUT_SECS` | `10`                    | Upper bound on one preview request  |
//! | `CUTOUT_POLL_INTERVAL_MS`     | `600`                   | Export status poll interval         |
//! | `CUTOUT_MAX_POLL_FAILURES`    | `5`                     | Failed polls before giving up       |
//! | `CUTOUT_DOWNLOAD_DIR`         | `.`                     | Where export archives are saved     |

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use cutout_cli::command::{self, Command, HELP};
use cutout_core::asset::AssetId;
use cutout_service::{ProcessingApi, UploadFile};
use cutout_session::notifier::Level;
use cutout_session::session::ExportOutcome;
use cutout_session::{Session, SessionConfig, SessionError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cutout_cli=info,cutout_session=info,cutout_service=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = SessionConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        service_url = %config.service_url,
        download_dir = %config.download_dir.display(),
        "Starting cutout",
    );

    let api = ProcessingApi::new(config.service_url.clone());
    let mut session = Session::start(config, Arc::new(api));

    let mut notifications = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(note) = notifications.recv().await {
            match note.level() {
                Level::Error => eprintln!("! {note}"),
                Level::Info => println!("* {note}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        // User-facing session errors already reached the printer task.
        if let Err(e) = run(&mut session, command).await {
            let notified = e
                .downcast_ref::<SessionError>()
                .is_some_and(SessionError::is_user_facing);
            if !notified {
                eprintln!("{e:#}");
            }
        }
    }

    session.shutdown().await;
    printer.abort();
    Ok(())
}

async fn run(session: &mut Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Upload(paths) => {
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                files.push(read_upload(path).await?);
            }
            for asset in session.upload(files).await? {
                println!("  {}  {}", asset.id, asset.local_display_ref);
            }
        }
        Command::Background(path) => {
            let file = read_upload(&path).await?;
            let asset = session.set_background_image(file).await?;
            println!("  background {}", asset.id);
        }
        Command::Select(target) => {
            let id = resolve_asset(session, &target);
            let asset = session.select(&id)?;
            println!("  current {}  {}", asset.id, asset.local_display_ref);
        }
        Command::Set(edits) => {
            if !session.edit(edits) {
                println!("  (no change)");
            }
        }
        Command::Options => {
            let options = session.options();
            println!("{options:#?}");
        }
        Command::Assets => {
            let current = session.current_asset().map(|a| a.id.clone());
            for (index, asset) in session.assets().assets().iter().enumerate() {
                let marker = if Some(&asset.id) == current.as_ref() { '>' } else { ' ' };
                println!("{marker} {index:>2}  {}  {}", asset.id, asset.local_display_ref);
            }
        }
        Command::Preview(path) => save_preview(session, path).await?,
        Command::Mask(path) => save_mask(session, path).await?,
        Command::Compare(ratio) => {
            let compare = session.compare_mut();
            compare.set_ratio(ratio);
            let insets = compare.insets();
            println!(
                "  divider {:.2}  before inset right {:.1}%  after inset left {:.1}%",
                compare.ratio(),
                insets.before_right,
                insets.after_left,
            );
        }
        Command::Export { all } => {
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });

            let result = if all {
                session.export_all(&cancel).await
            } else {
                session.export_current(&cancel).await
            };
            ctrl_c.abort();

            if let ExportOutcome::Abandoned { job_id } = result? {
                println!("  stopped tracking {job_id}");
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

// ---- private helpers ----

fn prompt() {
    print!("cutout> ");
    let _ = std::io::stdout().flush();
}

async fn read_upload(path: &Path) -> anyhow::Result<UploadFile> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadFile::new(file_name, content))
}

/// Accept either an asset id or its position in the asset list.
fn resolve_asset(session: &Session, target: &str) -> AssetId {
    target
        .parse::<usize>()
        .ok()
        .and_then(|index| session.assets().assets().get(index))
        .map(|asset| asset.id.clone())
        .unwrap_or_else(|| AssetId::new(target))
}

async fn save_preview(session: &Session, path: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(rendered) = session.latest_preview() else {
        println!("  no preview yet");
        return Ok(());
    };
    let image = rendered.image.decode()?;
    let path = path.unwrap_or_else(|| {
        session
            .config()
            .download_dir
            .join(format!("preview-{}.{}", rendered.key.asset_id, image.extension()))
    });
    tokio::fs::write(&path, &image.bytes)
        .await
        .with_context(|| format!("Cannot write {}", path.display()))?;
    println!("  saved {}", path.display());
    Ok(())
}

async fn save_mask(session: &Session, path: Option<PathBuf>) -> anyhow::Result<()> {
    let Some((asset_id, mask)) = session.upload_mask() else {
        println!("  no mask from the last upload");
        return Ok(());
    };
    let image = mask.decode()?;
    let path = path.unwrap_or_else(|| {
        session
            .config()
            .download_dir
            .join(format!("mask-{asset_id}.{}", image.extension()))
    });
    tokio::fs::write(&path, &image.bytes)
        .await
        .with_context(|| format!("Cannot write {}", path.display()))?;
    println!("  saved {}", path.display());
    Ok(())
}
