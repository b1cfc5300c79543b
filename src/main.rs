mod config;
mod library;
mod logging;
mod ports;
mod services;
mod spotify_rs;
#[cfg(test)]
mod test_utils;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, OptionExt},
};

use crate::{
    config::Config,
    library::cache::DiskCache,
    logging::init_tracing,
    services::{
        export::{PlaylistExporter, write_report},
        library::LibraryService,
        spotify::client::SpotifyApiClient,
        tempo_filter::{DEFAULT_BPM_MAX, DEFAULT_BPM_MIN, TempoFilter, TempoRange},
    },
    spotify_rs::auth::{exchange_code_for_token, initiate_oauth, parse_redirect},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "BPM Playlist Generator", long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "BPM_PLAYLIST_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Minimum BPM
    #[arg(long, default_value_t = DEFAULT_BPM_MIN, global = true)]
    bpm_min: f64,

    /// Maximum BPM
    #[arg(long, default_value_t = DEFAULT_BPM_MAX, global = true)]
    bpm_max: f64,

    /// Log filter, e.g. `info` or `bpm_playlist_generator=debug`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Spotify access token to use instead of refreshing the stored one
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", global = true, hide_env_values = true)]
    access_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Library(LibraryCommands),
    /// Authorize with Spotify and store the refresh token in the config file
    Login,
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Commands that work on the cached library.
#[derive(Subcommand, Debug)]
enum LibraryCommands {
    /// Create a private playlist from the tracks within the BPM range
    CreatePlaylist {
        /// Name of the playlist to create
        #[arg(long)]
        name: String,
    },
    /// Print the tracks within the BPM range
    Print,
    /// Update the saved data in the disk cache
    UpdateCache {
        /// Force update audio features for all tracks
        #[arg(long)]
        force_update_audio_features: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };

    let load_config = || {
        tracing::debug!("Loading configuration");
        if args.config.is_some() {
            Config::from_file(&config_path)
        } else {
            Config::load()
        }
        .wrap_err("Failed to load bpm-playlist-generator config")
    };

    match &args.command {
        Commands::Config(command) => run_config_command(command, &config_path),
        Commands::Login => login(load_config()?, &config_path).await,
        Commands::Library(command) => {
            let config = load_config()?;
            let filter = tempo_filter(&args, &config)?;
            let mut library = open_library(&config, args.access_token.clone()).await?;
            run_library_command(command, &mut library, &filter).await
        }
    }
}

fn tempo_filter(args: &Args, config: &Config) -> Result<TempoFilter> {
    let range = TempoRange::new(args.bpm_min, args.bpm_max)?;
    tracing::debug!(
        "Selecting tracks between {} and {} BPM",
        range.min(),
        range.max()
    );
    Ok(TempoFilter::new(range)
        .with_min_duration_ms(config.filter.min_duration_ms)
        .with_half_tempo(config.filter.half_tempo))
}

async fn open_library(
    config: &Config,
    access_token: Option<String>,
) -> Result<LibraryService<SpotifyApiClient>> {
    let credentials = config.spotify_credentials();
    let client = SpotifyApiClient::connect(
        credentials.as_ref(),
        config.spotify.refresh_token.as_deref(),
        access_token,
    )
    .await?;

    let cache = DiskCache::new(config.cache_directory_path());
    tracing::debug!("Using cache directory {}", cache.root().display());
    Ok(LibraryService::new(client, cache))
}

async fn run_library_command(
    command: &LibraryCommands,
    library: &mut LibraryService<SpotifyApiClient>,
    filter: &TempoFilter,
) -> Result<()> {
    match command {
        LibraryCommands::CreatePlaylist { name } => {
            library.load_caches().await?;
            let user_id = library.current_user_id().await?;
            let tracks = filter.apply(library.session().tracks());
            let summary = PlaylistExporter::new(library.client())
                .export(&user_id, name, &tracks)
                .await?;
            tracing::info!(
                "Created playlist {} ({}) with {} tracks in {} batches",
                name,
                summary.playlist_id,
                summary.submitted,
                summary.batches
            );
        }
        LibraryCommands::Print => {
            library.load_caches().await?;
            let tracks = filter.apply(library.session().tracks());
            let mut stdout = std::io::stdout().lock();
            write_report(&mut stdout, &tracks).wrap_err("Failed to write report")?;
            stdout.flush()?;
        }
        LibraryCommands::UpdateCache {
            force_update_audio_features,
        } => {
            library.load_disk_cache()?;
            library.update_cache(*force_update_audio_features).await?;
            tracing::info!("Cache updated");
        }
    }

    Ok(())
}

fn run_config_command(command: &ConfigCommands, config_path: &Path) -> Result<()> {
    match command {
        ConfigCommands::CreateDefault => {
            if config_path.exists() {
                println!("Config file already exists at {}", config_path.display());
            } else {
                Config::default().save(config_path)?;
                println!("Created default config at {}", config_path.display());
            }
        }
        ConfigCommands::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}

async fn login(mut config: Config, config_path: &Path) -> Result<()> {
    let credentials = config.spotify_credentials().ok_or_eyre(
        "Spotify client_id and client_secret must be set in the config file \
         or via SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET",
    )?;

    let (auth_url, session) = initiate_oauth(credentials.client_id(), credentials.redirect_uri());
    tracing::debug!("Started authorization with state {}", session.state);

    println!("Open this URL in your browser and authorize access:\n");
    println!("{}\n", auth_url);
    println!("Then paste the URL you were redirected to:");

    let mut redirected_to = String::new();
    std::io::stdin()
        .read_line(&mut redirected_to)
        .wrap_err("Failed to read redirect URL")?;

    let code = parse_redirect(&redirected_to, &session)?;
    let token = exchange_code_for_token(
        credentials.client_id(),
        credentials.client_secret(),
        &code,
        credentials.redirect_uri(),
        &session.code_verifier,
    )
    .await
    .wrap_err("Failed to exchange authorization code")?;

    let refresh_token = token
        .refresh_token
        .ok_or_eyre("Spotify did not return a refresh token")?;

    config.spotify.refresh_token = Some(refresh_token);
    config.save(config_path)?;
    println!("Saved refresh token to {}", config_path.display());

    Ok(())
}
