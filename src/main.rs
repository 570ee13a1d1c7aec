use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tap_dictate::{Config, MicrophoneBackend, ScriptedRecognizer, SessionController};
use tokio::io::AsyncBufReadExt;
use tracing::info;

/// Tap-to-dictate demo: press Enter to toggle a recognition session and
/// watch the transcript update.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/tap-dictate")]
    config: String,

    /// Phrase the stand-in recognizer transcribes incrementally
    #[arg(long, default_value = "the quick brown fox jumps over the lazy dog")]
    phrase: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v0.1.0", cfg.service.name);

    let capture = Box::new(MicrophoneBackend::new());
    let recognizer = Arc::new(ScriptedRecognizer::from_phrase(&args.phrase, 10));
    let controller = SessionController::spawn(cfg.session(), capture, recognizer);

    // The presentation layer only reflects published state and issues toggle
    let mut transcript = controller.transcript();
    tokio::spawn(async move {
        while transcript.changed().await.is_ok() {
            let text = transcript.borrow().clone();
            if let Some(text) = text {
                println!("> {}", text);
            }
        }
    });

    println!("Press Enter to toggle recognition, q + Enter to quit.");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "q" {
            break;
        }

        controller.toggle();

        // The stats round-trip confirms the toggle has been handled
        let stats = controller.stats().await;
        if stats.is_processing {
            println!("Recording... speak now.");
        } else {
            println!("Stopped.");
        }
    }

    controller.shutdown().await;

    Ok(())
}
