use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tubegrab::config::Config;
use tubegrab::media::{BackendKind, MediaCatalog, MediaKind, MediaResolver};
use tubegrab::utils::format_size;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the variants available for a URL
    Resolve {
        url: String,
        #[arg(short, long, value_enum, default_value_t = BackendArg::Auto)]
        backend: BackendArg,
        /// Region hint for y2mate (en, id, es)
        #[arg(short, long)]
        locale: Option<String>,
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the direct download link for one variant
    Fetch {
        url: String,
        #[arg(short, long, value_enum, default_value_t = KindArg::Video)]
        kind: KindArg,
        /// Quality label as listed by `resolve`, e.g. 720p or 128kbps
        #[arg(short, long)]
        quality: String,
        #[arg(short, long, value_enum, default_value_t = BackendArg::Auto)]
        backend: BackendArg,
        #[arg(short, long)]
        locale: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Auto,
    Y2mate,
    Yt5s,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Video,
    Audio,
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Video => MediaKind::Video,
            KindArg::Audio => MediaKind::Audio,
        }
    }
}

fn get_config_path(args: &Args) -> Option<String> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var("TUBEGRAB_CONFIG") {
        return Some(path);
    }

    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        let config_path = format!("{}/tubegrab/config.toml", xdg_config_home);
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let config_path = format!("{}/.config/tubegrab/config.toml", home.display());
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    None
}

async fn resolve(
    resolver: &MediaResolver,
    url: &str,
    backend: BackendArg,
    locale: Option<&str>,
) -> tubegrab::Result<(BackendKind, MediaCatalog)> {
    match backend {
        BackendArg::Auto if locale.is_none() => resolver.resolve_any(url).await,
        BackendArg::Auto | BackendArg::Y2mate => resolver
            .resolve_y2mate(url, locale)
            .await
            .map(|catalog| (BackendKind::Y2mate, catalog)),
        BackendArg::Yt5s => resolver
            .resolve(url, BackendKind::Yt5s)
            .await
            .map(|catalog| (BackendKind::Yt5s, catalog)),
    }
}

fn print_catalog(backend: BackendKind, catalog: &MediaCatalog) {
    println!("{} [{}] via {}", catalog.title, catalog.id, backend);
    if let Some(duration) = catalog.duration {
        println!("duration: {}:{:02}", duration / 60, duration % 60);
    }
    println!("thumbnail: {}", catalog.thumbnail);

    for (label, variants) in [("video", &catalog.video), ("audio", &catalog.audio)] {
        println!("{label}:");
        for variant in variants.values() {
            println!(
                "  {:<10} {:>10}  ({})",
                variant.quality,
                format_size(variant.size_bytes),
                variant.size_label
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match get_config_path(&args) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::default(),
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if config.get_logging_format() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let resolver = MediaResolver::new(&config).context("Failed to initialize media resolver")?;

    match args.command {
        Command::Resolve {
            url,
            backend,
            locale,
            json,
        } => {
            let (kind, catalog) = resolve(&resolver, &url, backend, locale.as_deref())
                .await
                .with_context(|| format!("Failed to resolve {}", url))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                print_catalog(kind, &catalog);
            }
        }
        Command::Fetch {
            url,
            kind,
            quality,
            backend,
            locale,
        } => {
            let fetch = async {
                let (_, catalog) = resolve(&resolver, &url, backend, locale.as_deref())
                    .await
                    .with_context(|| format!("Failed to resolve {}", url))?;
                let variant = catalog
                    .variant(kind.into(), &quality)
                    .with_context(|| format!("No {:?} variant with quality {}", kind, quality))?;
                info!("Fetching {} {}", catalog.id, variant.quality);
                variant
                    .fetch(&resolver)
                    .await
                    .context("Failed to obtain download link")
            };

            let link = tokio::time::timeout(config.operation_timeout(), fetch)
                .await
                .context("Timed out waiting for the download link")??;

            if link.is_empty() {
                anyhow::bail!("Backend returned an empty download link");
            }
            println!("{}", link);
        }
    }

    Ok(())
}
