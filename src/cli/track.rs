use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::models::Track;
use crate::core::services::TrackService;
use crate::error::TrackError;
use crate::services::ServiceFactory;
use crate::signal_handler::cancel_on_shutdown;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Args)]
pub struct SaveArgs {
    /// Artist name
    #[arg(short, long)]
    artist: String,

    /// Song title
    #[arg(short, long)]
    title: String,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args)]
pub struct GetArgs {
    /// Artist name
    #[arg(short, long)]
    artist: String,

    /// Song title; all tracks of the artist are listed when omitted
    #[arg(short, long)]
    title: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Uuid of the stored track
    #[arg(value_name = "UUID")]
    uuid: String,
}

pub async fn save(args: SaveArgs, factory: &ServiceFactory) -> Result<()> {
    let SaveArgs { artist, title, format } = args;
    let service = factory.create_track_service().await?;

    let track = run_cancellable(&service, shutdown_timeout(factory), |service, cancel| async move {
        service.save(&artist, &title, &cancel).await
    })
    .await?;

    print_output(&track, format, print_track)
}

pub async fn get(args: GetArgs, factory: &ServiceFactory) -> Result<()> {
    let GetArgs { artist, title, format } = args;
    let service = factory.create_track_service().await?;
    let timeout = shutdown_timeout(factory);

    match title {
        Some(title) => {
            let track = run_cancellable(&service, timeout, |service, cancel| async move {
                service.track(&artist, &title, &cancel).await
            })
            .await?;
            print_output(&track, format, print_track)
        }
        None => {
            let tracks = run_cancellable(&service, timeout, |service, cancel| async move {
                service.artist_tracks(&artist, &cancel).await
            })
            .await?;
            print_output(&tracks, format, |tracks| {
                for track in tracks {
                    println!(
                        "{}  {} - {} ({} lines)",
                        uuid_text(track),
                        track.artist,
                        track.title,
                        track.line_count()
                    );
                }
            })
        }
    }
}

pub async fn delete(args: DeleteArgs, factory: &ServiceFactory) -> Result<()> {
    let DeleteArgs { uuid } = args;
    let service = factory.create_track_service().await?;

    let target = uuid.clone();
    run_cancellable(&service, shutdown_timeout(factory), |service, cancel| async move {
        service.delete(&target, &cancel).await
    })
    .await?;

    println!("Deleted {}", uuid);
    Ok(())
}

fn shutdown_timeout(factory: &ServiceFactory) -> Duration {
    factory.config().shutdown_timeout()
}

/// Run one operation that Ctrl-C cancels, then wait for the background
/// cache writes it scheduled.
async fn run_cancellable<T, F, Fut>(
    service: &Arc<TrackService>,
    drain_timeout: Duration,
    op: F,
) -> std::result::Result<T, TrackError>
where
    F: FnOnce(Arc<TrackService>, CancellationToken) -> Fut,
    Fut: Future<Output = std::result::Result<T, TrackError>>,
{
    let cancel = CancellationToken::new();
    let listener = cancel_on_shutdown(cancel.clone());

    let result = op(Arc::clone(service), cancel.clone()).await;

    // Stops the signal listener
    cancel.cancel();
    let _ = listener.await;

    if !service.drain(drain_timeout).await {
        warn!("Some cache writes did not finish before exit");
    }

    result
}

fn print_output<T: Serialize>(value: &T, format: OutputFormat, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

fn uuid_text(track: &Track) -> String {
    track.uuid.map(|uuid| uuid.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_track(track: &Track) {
    println!("{} - {}", track.artist, track.title);
    println!("uuid: {}", uuid_text(track));
    println!();

    for (original, translated) in track.lyrics.iter().zip(&track.translation) {
        if original.is_empty() {
            println!();
            continue;
        }
        println!("{}", original);
        println!("  {}", translated);
    }
}
