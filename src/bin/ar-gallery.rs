use std::{path::PathBuf, rc::Rc};

use anyhow::Context as _;
use ar_gallery::{
    AssetSource, CachePolicy, CapabilityVector, DirSource, FetchError, FetchedBody, HttpSource,
    PlatformFamily, PreloadOpts, ReplayEngine, SessionController, SessionOpts, SupportOverrides,
    audit_preload, compose, evaluate, extract_identifier, fetch_manifest, preload,
    routing::identifier::sanitize_identifier, session::engine::StartBehavior,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "ar-gallery", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a device capability vector and print the verdict.
    Check(CheckArgs),
    /// Resolve an artwork manifest and print it normalized.
    Manifest(ManifestArgs),
    /// Resolve, preload and compose an artwork; print the result.
    Preload(PreloadArgs),
    /// Run a whole session against a scripted tracking engine.
    Session(SessionArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Platform {
    Ios,
    Android,
    Other,
}

#[derive(Args, Debug)]
struct DeviceArgs {
    /// Platform family of the simulated device.
    #[arg(long, value_enum, default_value_t = Platform::Android)]
    platform: Platform,

    /// Platform version (`major.minor`).
    #[arg(long)]
    platform_version: Option<f64>,

    /// Simulate a device without a 3D graphics context.
    #[arg(long)]
    no_graphics: bool,

    /// Simulate a device without a camera API.
    #[arg(long)]
    no_camera: bool,

    /// Simulate a device that cannot play animated PNGs.
    #[arg(long)]
    no_animated_png: bool,

    /// Force the unsupported verdict.
    #[arg(long)]
    force_unsupported: bool,
}

impl DeviceArgs {
    fn vector(&self) -> CapabilityVector {
        CapabilityVector {
            platform_family: match self.platform {
                Platform::Ios => PlatformFamily::Ios,
                Platform::Android => PlatformFamily::Android,
                Platform::Other => PlatformFamily::Other,
            },
            platform_version: self.platform_version,
            has_graphics_context: !self.no_graphics,
            has_camera_api: !self.no_camera,
            animated_png_support: !self.no_animated_png,
        }
    }

    fn overrides(&self) -> SupportOverrides {
        SupportOverrides {
            force_unsupported: self.force_unsupported,
        }
    }
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Artwork identifier, or a location such as `https://host/ar/<id>/`.
    artwork: String,

    /// Gallery origin to fetch from over HTTP(S).
    #[arg(long, conflicts_with = "root")]
    origin: Option<Url>,

    /// Local gallery directory (`<root>/ar/<id>/manifest.json`).
    #[arg(long)]
    root: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    #[command(flatten)]
    device: DeviceArgs,
}

#[derive(Parser, Debug)]
struct ManifestArgs {
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Parser, Debug)]
struct PreloadArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Session options JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prefer animated PNG sources.
    #[arg(long, default_value_t = false)]
    animated: bool,
}

#[derive(Parser, Debug)]
struct SessionArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    device: DeviceArgs,

    /// Session options JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tracking timeline, e.g. `ready@0,found@500,lost@1200`.
    #[arg(long, default_value = "ready@0,found@300")]
    script: String,

    /// Reject the engine start with `<name>:<message>`, e.g. `NotAllowedError:Permission denied`.
    #[arg(long, conflicts_with = "stall")]
    reject: Option<String>,

    /// Never settle the engine start.
    #[arg(long)]
    stall: bool,
}

/// Source chosen on the command line.
enum Gallery {
    Http(HttpSource),
    Dir(DirSource),
}

impl AssetSource for Gallery {
    async fn fetch(&self, url: &Url, cache: CachePolicy) -> Result<FetchedBody, FetchError> {
        match self {
            Self::Http(s) => s.fetch(url, cache).await,
            Self::Dir(s) => s.fetch(url, cache).await,
        }
    }
}

impl SourceArgs {
    fn open(&self) -> anyhow::Result<(Gallery, Url)> {
        match (&self.origin, &self.root) {
            (Some(origin), _) => Ok((Gallery::Http(HttpSource::new()), origin.clone())),
            (None, Some(root)) => {
                let dir = DirSource::local(root)?;
                let base = dir.origin().clone();
                Ok((Gallery::Dir(dir), base))
            }
            (None, None) => anyhow::bail!("pass --origin <url> or --root <dir>"),
        }
    }

    fn identifier(&self) -> anyhow::Result<String> {
        let id = match Url::parse(&self.artwork) {
            Ok(location) => extract_identifier(&location),
            Err(_) => Some(sanitize_identifier(self.artwork.trim())).filter(|id| !id.is_empty()),
        };
        id.with_context(|| format!("no artwork identifier in '{}'", self.artwork))
    }
}

fn load_opts(path: Option<&PathBuf>) -> anyhow::Result<SessionOpts> {
    Ok(match path {
        Some(p) => SessionOpts::from_json_file(p)?,
        None => SessionOpts::default(),
    })
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Check(args) => cmd_check(args),
        Command::Manifest(args) => cmd_manifest(args).await,
        Command::Preload(args) => cmd_preload(args).await,
        Command::Session(args) => cmd_session(args).await,
    }
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let evaluation = evaluate(&args.device.vector(), &args.device.overrides());
    print_json(&evaluation)
}

async fn cmd_manifest(args: ManifestArgs) -> anyhow::Result<()> {
    let (source, base) = args.source.open()?;
    let id = args.source.identifier()?;
    let manifest = fetch_manifest(&source, &base, &id).await?;
    print_json(&manifest.to_document())
}

async fn cmd_preload(args: PreloadArgs) -> anyhow::Result<()> {
    let opts = load_opts(args.config.as_ref())?;
    let (source, base) = args.source.open()?;
    let id = args.source.identifier()?;
    let manifest = fetch_manifest(&source, &base, &id).await?;

    let preload_opts = PreloadOpts::from_session(&opts, args.animated);
    let result = preload(&source, &manifest, &preload_opts, |e| {
        eprintln!("[{:>3}%] {:?} {}", e.percent(), e.status, e.label);
    })
    .await?;
    let audit = audit_preload(&result, &opts);
    let entries = compose(&result.overlay_resources, opts.depth_step);

    let report = serde_json::json!({
        "title": manifest.title,
        "target": result.target_url,
        "loaded": result.overlay_resources.iter().map(|r| serde_json::json!({
            "id": r.overlay.id,
            "encoding": r.encoding,
            "url": r.url,
            "bytes": r.byte_length,
            "dimensions": r.dimensions,
            "decoded": r.decoded.is_some(),
        })).collect::<Vec<_>>(),
        "failed": result.failed_overlays.iter().map(|f| serde_json::json!({
            "id": f.overlay.id,
            "error": f.error.to_string(),
        })).collect::<Vec<_>>(),
        "stats": result.stats,
        "audit": audit,
        "displayOrder": entries.iter().map(|e| &e.plane).collect::<Vec<_>>(),
    });
    print_json(&report)
}

async fn cmd_session(args: SessionArgs) -> anyhow::Result<()> {
    let opts = load_opts(args.config.as_ref())?;
    let (source, base) = args.source.open()?;
    let id = args.source.identifier()?;

    let behavior = match (&args.reject, args.stall) {
        (Some(raw), _) => {
            let (name, message) = raw.split_once(':').unwrap_or((raw.as_str(), ""));
            StartBehavior::Reject {
                name: name.to_string(),
                message: message.to_string(),
            }
        }
        (None, true) => StartBehavior::Stall,
        (None, false) => StartBehavior::Succeed,
    };
    let engine: ReplayEngine = args.script.parse()?;
    let engine = engine.with_behavior(behavior);

    let (mut controller, mut signals) = SessionController::new(
        Rc::new(source),
        Rc::new(engine),
        base,
        args.device.vector(),
        opts,
    );
    let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
    drop(inputs_tx);

    controller.boot(args.device.overrides(), Some(id));
    controller.run(inputs_rx).await;

    while let Ok(signal) = signals.try_recv() {
        println!("{}", serde_json::to_string(&signal)?);
    }
    print_json(&controller.snapshot())
}
