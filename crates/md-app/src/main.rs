use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use md_app::{cli, dispatch};

fn main() -> Result<()> {
    // 1. Parser CLI
    // Erreur d'usage → code 1 (clap sortirait en 2).
    let cli = cli::Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(cli::exit_code(&e));
    });

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config, appliquer les overrides CLI
    let config = dispatch::resolve_config(&cli)?;

    // 4. Ctrl-C : arrêt propre à la frame suivante, sortie nettoyée
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        log::warn!("Interruption demandée, arrêt après la frame en cours...");
        flag.store(true, Ordering::Relaxed);
    })
    .context("Installation du handler Ctrl-C")?;

    // 5. Traitement
    let stats = dispatch::run(&cli, config, cancel)?;

    println!(
        "Terminé : {} frame(s) → {} ({:.2}s)",
        stats.frames,
        cli.output.display(),
        stats.elapsed.as_secs_f64()
    );
    Ok(())
}
