//! `causerie chat` — interactive conversation.

use std::io::Write;
use std::sync::Arc;

use causerie_config::AppConfig;
use causerie_core::cancel::CancelToken;
use causerie_core::event::TurnEvent;
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;

use super::build_runtime;

pub async fn run(config: AppConfig, ephemeral: bool) -> Result<(), Box<dyn std::error::Error>> {
    let model_name = config.model.model.clone();
    let mut runtime = build_runtime(config, ephemeral).await;

    println!();
    println!("  Causerie — conversation interactive");
    println!("  Modèle : {model_name}");
    if !runtime.session.history().is_empty() {
        println!(
            "  Historique restauré : {} messages",
            runtime.session.history().len()
        );
    }
    println!("  Commandes : /reset efface la conversation, /quit quitte.");
    println!();

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {
                prompt()?;
                continue;
            }
            "/quit" | "/exit" => break,
            "/reset" => {
                runtime.session.reset().await;
                runtime.memory.clear().await;
                println!("  Conversation effacée.");
                prompt()?;
                continue;
            }
            _ => {}
        }

        let printer = spawn_printer(runtime.bus.subscribe());
        let outcome = runtime
            .engine
            .run_turn(&mut runtime.session, input, &CancelToken::new())
            .await;
        let _ = printer.await;

        if !outcome.sources.is_empty() {
            println!();
            println!("  Sources :");
            for source in &outcome.sources {
                println!("  - {} ({})", source.title, source.url);
            }
        }
        println!();
        prompt()?;
    }

    println!("  À bientôt.");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("vous > ");
    std::io::stdout().flush()
}

/// Print one turn's worth of events, then stop at the terminal event.
fn spawn_printer(
    mut rx: broadcast::Receiver<Arc<TurnEvent>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.as_ref() {
                TurnEvent::SearchStarted { query, .. } => {
                    eprintln!("  (recherche web : {query})");
                }
                TurnEvent::SearchCompleted { degraded: true, .. } => {
                    eprintln!("  (recherche indisponible, réponse sans sources)");
                }
                TurnEvent::AnswerFragment { content, .. } => {
                    print!("{content}");
                    let _ = std::io::stdout().flush();
                }
                TurnEvent::TurnCompleted { .. } => {
                    println!();
                    break;
                }
                TurnEvent::TurnFailed { message, .. } => {
                    println!("{message}");
                    break;
                }
                _ => {}
            }
        }
    })
}
