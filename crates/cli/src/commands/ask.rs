//! `causerie ask` — one question, one answer, no session carried over.

use std::io::Write;

use causerie_config::AppConfig;
use causerie_core::cancel::CancelToken;
use causerie_core::event::TurnEvent;

use super::build_runtime;

pub async fn run(
    config: AppConfig,
    question: &str,
    no_stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut runtime = build_runtime(config, true).await;

    let printer = (!no_stream).then(|| {
        let mut rx = runtime.bus.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                match event.as_ref() {
                    TurnEvent::AnswerFragment { content, .. } => {
                        print!("{content}");
                        let _ = std::io::stdout().flush();
                    }
                    TurnEvent::TurnCompleted { .. } | TurnEvent::TurnFailed { .. } => {
                        println!();
                        break;
                    }
                    _ => {}
                }
            }
        })
    });

    let outcome = runtime
        .engine
        .run_turn(&mut runtime.session, question, &CancelToken::new())
        .await;

    match printer {
        Some(handle) => {
            let _ = handle.await;
            if outcome.failed {
                println!("{}", outcome.answer);
            }
        }
        None => println!("{}", outcome.answer),
    }

    if !outcome.sources.is_empty() {
        println!();
        println!("Sources :");
        for source in &outcome.sources {
            println!("- {} ({})", source.title, source.url);
        }
    }

    Ok(())
}
