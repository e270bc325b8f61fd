use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{LevelFilter, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};

use playlist_curator::adaptive::{AdaptiveQueueController, SkipPatternDetector};
use playlist_curator::config::load_config;
use playlist_curator::models::{CandidateTrack, PlaybackEvent};
use playlist_curator::playlist::{
    CandidateSource, CuratorConfig, DiscoveryStatistics, GenerationSources, PlaylistGenerator,
};
use playlist_curator::sources::{ReplayQueue, SnapshotLibrary};

#[derive(Parser)]
#[command(name = "playlist-curator")]
#[command(about = "Curates discovery playlists from listening history")]
#[command(version)]
struct Args {
    /// Path to the curator configuration JSON file
    #[arg(short = 'c', long = "config", default_value = "curator.json")]
    config_file: String,

    /// Debug mode - verbose logging and per-track score breakdowns
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Quiet mode - reduce output verbosity
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a playlist from the library snapshot
    Generate {
        /// Number of tracks to select
        #[arg(short = 'n', long = "target")]
        target: Option<usize>,

        /// Seed for the exploratory draw
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Summarize the discovery candidate pool
    Stats,
    /// Replay a JSON-lines playback event file through the skip detector
    Adapt {
        #[arg(short = 'e', long = "events")]
        events: PathBuf,
    },
}

fn init_logging(args: &Args) {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if args.debug {
        builder.filter_level(LevelFilter::Debug);
    } else if args.quiet {
        builder.filter_level(LevelFilter::Warn);
    }
    builder.init();
}

fn load_curator_config(path: &str) -> Result<CuratorConfig> {
    if !Path::new(path).exists() {
        warn!("Configuration file '{path}' not found, using defaults");
        return Ok(CuratorConfig::default());
    }
    let config = CuratorConfig::load_from_file(path)
        .with_context(|| format!("Failed to load configuration from {path}"))?;
    info!("Loaded configuration from {path}");
    Ok(config)
}

fn load_library() -> Result<SnapshotLibrary> {
    let env = load_config()?;
    let mut library = SnapshotLibrary::load(&env.library_path)?;
    if let Some(history) = &env.history_path {
        library = library.with_history_file(history)?;
    }
    Ok(library)
}

fn sources(library: &SnapshotLibrary) -> GenerationSources<'_> {
    GenerationSources {
        history: library,
        tracks: library,
        library,
        signals: library,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = load_curator_config(&args.config_file)?;
    let library = load_library()?;

    match &args.command {
        Command::Generate { target, seed } => run_generate(&args, config, &library, *target, *seed),
        Command::Stats => run_stats(config, &library),
        Command::Adapt { events } => run_adapt(config, &library, events),
    }
}

fn run_generate(
    args: &Args,
    config: CuratorConfig,
    library: &SnapshotLibrary,
    target: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let target = target.unwrap_or(config.discovery.target_count);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let generator = PlaylistGenerator::new(config);
    let playlist = generator.generate_playlist(sources(library), target, Utc::now(), &mut rng)?;

    println!("\n=== GENERATED PLAYLIST ===");
    println!(
        "Tracks: {}/{} | Exploration rate: {:.2}",
        playlist.entries.len(),
        target,
        playlist.exploration_rate
    );
    println!(
        "Sources: {} discovery | {} fallback | {} exploration",
        playlist.count_from(CandidateSource::Discovery),
        playlist.count_from(CandidateSource::Fallback),
        playlist.count_from(CandidateSource::Exploration)
    );

    for (i, entry) in playlist.entries.iter().enumerate() {
        let track = &entry.track;
        let genre_display = track
            .genre
            .as_ref()
            .map(|g| format!(" | {g}"))
            .unwrap_or_default();
        println!(
            "  {}. \"{}\" by {} [{:?}]{}",
            i + 1,
            track.title,
            track.artist,
            entry.source,
            genre_display
        );
        if args.debug {
            println!(
                "       Score: {:.3} (recency {:.3}, quality {:.3}) | Plays: {}{} | ID: {}",
                entry.breakdown.final_score,
                entry.breakdown.recency_weight,
                entry.breakdown.fallback_score,
                track.play_count,
                last_played_display(track),
                track.id
            );
        }
    }

    if playlist.entries.is_empty() {
        println!("\nNo tracks could be selected.");
    }
    Ok(())
}

fn last_played_display(track: &CandidateTrack) -> String {
    match track.days_since_played(Utc::now()) {
        Some(days) if days < 1.0 => " (today)".to_string(),
        Some(days) if days < 30.0 => format!(" ({}d ago)", days.round() as u32),
        Some(days) => format!(" ({}mo ago)", (days / 30.0).round() as u32),
        None => " (never)".to_string(),
    }
}

fn run_stats(config: CuratorConfig, library: &SnapshotLibrary) -> Result<()> {
    let generator = PlaylistGenerator::new(config);
    let discovery = generator.discovery();
    let now = Utc::now();
    let candidates = discovery.build(library, library, now)?;
    let stats: DiscoveryStatistics = discovery.statistics(&candidates, now);

    println!("\n=== DISCOVERY POOL ===");
    println!("Candidates: {}", stats.total);
    println!(
        "Never played: {} | Forgotten (>{:.0}d): {}",
        stats.never_played,
        discovery.config().forgotten_after_days,
        stats.forgotten
    );
    println!("Rated: {} | Unrated: {}", stats.rated, stats.unrated);
    match stats.mean_days_since_played {
        Some(mean) => println!("Mean days since played: {mean:.1}"),
        None => println!("Mean days since played: n/a"),
    }
    Ok(())
}

fn run_adapt(config: CuratorConfig, library: &SnapshotLibrary, events_path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(events_path)
        .with_context(|| format!("Failed to read events from {}", events_path.display()))?;

    let detector = SkipPatternDetector::new(config.adaptive.clone(), &config.genres);
    for playlist_id in &library.snapshot().managed_playlists {
        detector.register_playlist(playlist_id);
    }

    let queue = ReplayQueue::new(library);
    let controller = AdaptiveQueueController::new(detector, library, &queue);

    let mut replayed = 0;
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: PlaybackEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping malformed event on line {}: {e}", line_no + 1);
                continue;
            }
        };
        replayed += 1;

        for command in controller.handle(&event) {
            println!(
                "{} {:?} session={} tracks=[{}]",
                event.timestamp.format("%H:%M:%S"),
                command.action,
                command.session_id,
                command.track_ids.join(", ")
            );
        }
    }

    println!("\n=== ADAPTATION SUMMARY ===");
    println!(
        "Replayed {replayed} events, applied {} queue commands",
        queue.applied().len()
    );
    let mut sessions: Vec<&String> = library.snapshot().queues.keys().collect();
    sessions.sort();
    for session in sessions {
        println!("{session}: {}", queue.queue(session).join(", "));
    }
    Ok(())
}
