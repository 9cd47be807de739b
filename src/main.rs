use anyhow::Context;
use clap::{Parser, Subcommand};
use image::ImageReader;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cardscan::{
    CardScanner, Catalog, DirectoryCardSource, FingerprintEngine, Identification, MatchResult,
    Quadrilateral, ScanError, ScannerConfig,
};

#[derive(Parser)]
#[command(name = "cardscan")]
#[command(about = "Identify trading cards in camera frames by perceptual fingerprint")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Scanner settings file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fingerprint a directory of reference card images into a catalog file
    BuildCatalog {
        /// Directory with one image per card (file stem = card id)
        #[arg(value_name = "DIR")]
        images: PathBuf,

        /// Output catalog (JSON)
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Find and identify cards in a frame
    Identify {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Catalog file produced by build-catalog
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Number of ranked matches per card
        #[arg(long)]
        top: Option<usize>,

        /// Reject matches farther than this many bits
        #[arg(long, value_name = "BITS")]
        max_distance: Option<u32>,

        /// Save debug outputs to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,

        /// Save each rectified card image to directory
        #[arg(long, value_name = "DIR")]
        save_cards: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the fingerprint of whole images (no detection)
    Fingerprint {
        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,
    },
}

#[derive(Serialize)]
struct CardReport<'a> {
    candidate: usize,
    corners: &'a Quadrilateral,
    fingerprint: String,
    accepted: bool,
    best: &'a MatchResult,
    ranked: &'a [MatchResult],
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => ScannerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScannerConfig::default(),
    };

    match args.command {
        Command::BuildCatalog { images, output } => build_catalog(&config, &images, &output),
        Command::Identify {
            image_path,
            catalog,
            top,
            max_distance,
            debug_out,
            save_cards,
            json,
        } => {
            let mut config = config;
            if let Some(top) = top {
                config.matching.top_k = top;
            }
            if save_cards.is_some() {
                config.keep_card_images = true;
            }
            identify(
                config,
                &image_path,
                &catalog,
                max_distance,
                debug_out,
                save_cards.as_deref(),
                json,
            )
        }
        Command::Fingerprint { images } => {
            let engine = FingerprintEngine::new(config.fingerprint.grid_size)?;
            for path in images {
                let img = load_image(&path)?;
                println!("{}  {}", engine.compute(&img), path.display());
            }
            Ok(())
        }
    }
}

fn load_image(path: &Path) -> anyhow::Result<image::DynamicImage> {
    ImageReader::open(path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image {}: {}", path.display(), e))
}

fn build_catalog(config: &ScannerConfig, images: &Path, output: &Path) -> anyhow::Result<()> {
    let engine = FingerprintEngine::new(config.fingerprint.grid_size)?;
    let source = DirectoryCardSource::new(images);
    let catalog = Catalog::build(&source, &engine, config.parallel)?;
    if catalog.is_empty() {
        warn!("No reference images found in {}", images.display());
    }
    catalog.save(output)?;
    info!("Wrote {} cards to {}", catalog.len(), output.display());
    Ok(())
}

fn identify(
    config: ScannerConfig,
    image_path: &Path,
    catalog_path: &Path,
    max_distance: Option<u32>,
    debug_out: Option<PathBuf>,
    save_cards: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let catalog = Catalog::load(catalog_path)?;
    let frame = load_image(image_path)?;
    info!("Image loaded: {}x{}", frame.width(), frame.height());

    let mut scanner = CardScanner::with_catalog(config, catalog)?;
    if let Some(dir) = debug_out {
        scanner = scanner.with_debug(dir);
    }

    let identifications = match scanner.identify(&frame) {
        Ok(found) => found,
        Err(ScanError::NoCandidatesFound) => {
            info!("No cards detected.");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(dir) = save_cards {
        save_card_images(dir, &identifications)?;
    }

    let accepted = |m: &MatchResult| max_distance.is_none_or(|max| m.is_within(max));

    if json {
        let reports: Vec<CardReport> = identifications
            .iter()
            .map(|id| CardReport {
                candidate: id.candidate,
                corners: &id.corners,
                fingerprint: id.fingerprint.to_hex(),
                accepted: accepted(&id.best),
                best: &id.best,
                ranked: &id.ranked,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!("\n=== Card Identification Results ===");
    println!("Total cards detected: {}", identifications.len());
    for id in &identifications {
        let verdict = if accepted(&id.best) { "" } else { " (low confidence)" };
        println!(
            "  Card {}: {} at distance {}{}  [fingerprint {}]",
            id.candidate + 1,
            id.best.card_id,
            id.best.distance,
            verdict,
            id.fingerprint
        );
        for alt in id.ranked.iter().skip(1) {
            println!("      alt: {} ({})", alt.card_id, alt.distance);
        }
    }

    Ok(())
}

fn save_card_images(dir: &Path, identifications: &[Identification]) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    for id in identifications {
        if let Some(img) = &id.card_image {
            let path = dir.join(format!("card_{:02}.png", id.candidate + 1));
            img.save(&path)
                .map_err(|e| anyhow::anyhow!("Failed to save card image: {}", e))?;
        }
    }
    Ok(())
}
