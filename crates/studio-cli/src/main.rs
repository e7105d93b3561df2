// ============================================================================
// heygen-studio - command-line operator panel for HeyGen avatar videos
// ============================================================================
// Usage:
//   heygen-studio unlock <KEY> --remember       Remember the API key
//   heygen-studio --api-key <KEY> <COMMAND>     Use a key for one command only
//   heygen-studio lock                          Forget the API key
//   heygen-studio whoami                        Show vault and cache state
//   heygen-studio voices [--json]               List voices, custom first
//   heygen-studio upload <FILE> [--mime TYPE]   Upload a photo
//   heygen-studio discover [--group ID] ...     Discover library assets
//   heygen-studio generate --asset --voice --script TEXT|@FILE
//   heygen-studio status <VIDEO_ID> [--wait]    Poll a render
// ============================================================================

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use studio_core::{
    Credential, DiscoveryStatus, EngineVariant, GenerationRequest, JobState, StudioConfig, StudioContext,
    VoiceKind, DEFAULT_MOTION_PROMPT, DEFAULT_SPEED,
};
use tracing::info;

/// HeyGen avatar-video studio
#[derive(Parser)]
#[command(name = "heygen-studio", version, about = "Generate HeyGen avatar videos from the terminal")]
struct Cli {
    /// Path to the database file (default: ~/.heygen-studio/studio.redb)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// API key for this command only; the remembered key is left untouched
    /// (default: HEYGEN_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Print the activity log after the command
    #[arg(long, global = true)]
    show_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remember the HeyGen API key for later commands
    Unlock {
        key: String,

        /// Keep the key in the local database across runs
        #[arg(long)]
        remember: bool,
    },

    /// Clear the API key from memory and storage
    Lock,

    /// Show whether a key is present (never prints it)
    Whoami,

    /// List available voices
    Voices {
        #[arg(long)]
        json: bool,
    },

    /// Upload a photo to the asset library
    Upload {
        file: PathBuf,

        /// Declared MIME type; overridden when the bytes say otherwise
        #[arg(long)]
        mime: Option<String>,
    },

    /// Discover usable photos and avatars
    Discover {
        /// Target avatar group (default: HEYGEN_STUDIO_TARGET_GROUP)
        #[arg(long)]
        group: Option<String>,

        /// Asset id to surface first
        #[arg(long)]
        target: Option<String>,

        /// Enumerate every avatar group (slow)
        #[arg(long)]
        all_groups: bool,

        /// Ignore the cached result
        #[arg(long)]
        refresh: bool,

        #[arg(long)]
        json: bool,
    },

    /// Submit a video generation job
    Generate {
        /// Photo / talking photo id or image key
        #[arg(long)]
        asset: String,

        #[arg(long)]
        voice: String,

        /// Script text, or @path to read it from a file
        #[arg(long)]
        script: String,

        #[arg(long, default_value_t = DEFAULT_SPEED)]
        speed: f64,

        /// simplified (Avatar IV) or structured (Avatar III)
        #[arg(long, default_value = "simplified")]
        engine: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        motion_prompt: Option<String>,
    },

    /// Check the status of a render
    Status {
        video_id: String,

        /// Poll until the render completes or fails
        #[arg(long)]
        wait: bool,

        /// Seconds between polls
        #[arg(long, default_value = "10")]
        interval: u64,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "600")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("studio_core=info".parse()?)
                .add_directive("heygen_studio=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = StudioConfig::from_env()?;
    if let Some(path) = cli.db_path {
        config.db_path = Some(path);
    }
    if let Some(key) = cli.api_key {
        config.session_api_key = Some(Credential::new(key));
    }

    let ctx = StudioContext::init(config)?;
    let result = run(&ctx, cli.command).await;

    if cli.show_log {
        print_activity_log(&ctx);
    }
    ctx.shutdown();
    result
}

async fn run(ctx: &StudioContext, command: Commands) -> Result<()> {
    match command {
        Commands::Unlock { key, remember } => cmd_unlock(ctx, &key, remember),
        Commands::Lock => cmd_lock(ctx).await,
        Commands::Whoami => cmd_whoami(ctx),
        Commands::Voices { json } => cmd_voices(ctx, json).await,
        Commands::Upload { file, mime } => cmd_upload(ctx, &file, mime.as_deref()).await,
        Commands::Discover {
            group,
            target,
            all_groups,
            refresh,
            json,
        } => cmd_discover(ctx, group.as_deref(), target, all_groups, refresh, json).await,
        Commands::Generate {
            asset,
            voice,
            script,
            speed,
            engine,
            title,
            motion_prompt,
        } => {
            let engine: EngineVariant = engine.parse().map_err(|e: String| anyhow!(e))?;
            let script = read_script(&script)?;
            let mut request = GenerationRequest::new(asset, script, voice).with_speed(speed);
            if let Some(title) = title {
                request = request.with_title(title);
            }
            request.motion_prompt = motion_prompt.unwrap_or_else(|| DEFAULT_MOTION_PROMPT.to_string());
            cmd_generate(ctx, &request, engine).await
        }
        Commands::Status {
            video_id,
            wait,
            interval,
            timeout,
        } => cmd_status(ctx, &video_id, wait, interval, timeout).await,
    }
}

fn cmd_unlock(ctx: &StudioContext, key: &str, remember: bool) -> Result<()> {
    // A key that is not remembered would not outlive this process
    if !remember {
        anyhow::bail!(
            "Nothing stored. Use `unlock <KEY> --remember` to keep the key, \
             or pass --api-key <KEY> (or HEYGEN_API_KEY) with each command."
        );
    }
    ctx.vault.set(key, true)?;
    println!("Studio unlocked. Key remembered in {}", ctx.db.path().display());
    Ok(())
}

async fn cmd_lock(ctx: &StudioContext) -> Result<()> {
    ctx.vault.clear()?;
    let dropped = ctx.library.invalidate_all().await;
    info!("Dropped {} cached libraries on lock", dropped);
    println!("Studio locked. Stored key removed.");
    Ok(())
}

fn cmd_whoami(ctx: &StudioContext) -> Result<()> {
    let stats = ctx.db.stats()?;

    println!("=== HeyGen Studio ===");
    println!("Database:  {}", ctx.db.path().display());
    println!("API:       {}", ctx.config.api_base_url);
    println!(
        "API key:   {}",
        match (ctx.vault.is_unlocked(), ctx.vault.is_persisted()) {
            (true, true) => "present (remembered)",
            (true, false) => "present (this run only)",
            (false, _) => "none",
        }
    );
    println!("Cached libraries: {}", stats.cached_libraries);
    Ok(())
}

async fn cmd_voices(ctx: &StudioContext, json: bool) -> Result<()> {
    let voices = ctx.client.list_voices().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&voices)?);
        return Ok(());
    }

    println!("{:<34}  {:<8}  {:<14}  {}", "VOICE ID", "TYPE", "LANGUAGE", "NAME");
    println!("{}", "-".repeat(80));
    for voice in &voices {
        let kind = match voice.kind {
            VoiceKind::Custom => "custom",
            VoiceKind::System => "system",
        };
        println!(
            "{:<34}  {:<8}  {:<14}  {}",
            voice.voice_id,
            kind,
            truncate(&voice.language, 14),
            voice.name
        );
    }
    println!("\n{} voice(s)", voices.len());
    Ok(())
}

async fn cmd_upload(ctx: &StudioContext, file: &Path, mime: Option<&str>) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let result = ctx.client.upload_asset(bytes, mime).await?;

    println!("Asset id:  {}", result.asset_id);
    if let Some(key) = &result.image_key {
        println!("Image key: {}", key);
    }
    Ok(())
}

async fn cmd_discover(
    ctx: &StudioContext,
    group: Option<&str>,
    target: Option<String>,
    all_groups: bool,
    refresh: bool,
    json: bool,
) -> Result<()> {
    let mut options = ctx.discovery_options();
    options.target_asset_id = target;
    options.enumerate_groups = all_groups;
    options.force_refresh = refresh;

    let outcome = ctx.library.discover(ctx.target_group(group), &options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match &outcome.status {
        DiscoveryStatus::Complete => {}
        DiscoveryStatus::Partial { failed_sources } => {
            println!("Partial result; failed sources: {}", failed_sources.join(", "));
        }
        DiscoveryStatus::TargetGroupUnavailable { message } => {
            println!("{}", message);
            return Ok(());
        }
    }

    if outcome.assets.is_empty() {
        println!("No assets found.");
        return Ok(());
    }

    println!("{:<3} {:<34}  {:<14}  {:<6}  {}", "", "ASSET ID", "SOURCE", "STOCK", "NAME");
    println!("{}", "-".repeat(90));
    for asset in &outcome.assets {
        println!(
            "{:<3} {:<34}  {:<14}  {:<6}  {}",
            if asset.is_priority_target { "*" } else { "" },
            asset.asset_id,
            asset.source.as_str(),
            if asset.is_stock { "yes" } else { "no" },
            truncate(&asset.display_name, 40)
        );
    }
    println!(
        "\n{} asset(s){}",
        outcome.assets.len(),
        if outcome.from_cache { " (cached)" } else { "" }
    );
    Ok(())
}

async fn cmd_generate(ctx: &StudioContext, request: &GenerationRequest, engine: EngineVariant) -> Result<()> {
    let job = ctx.client.generate_video(request, engine).await?;

    println!("Render started.");
    println!("Video id: {}", job.video_id);
    println!("Title:    {}", job.title);
    println!("Engine:   {} (speed {})", job.engine_variant.as_str(), job.speed);
    println!("\nCheck progress with: heygen-studio status {} --wait", job.video_id);
    Ok(())
}

async fn cmd_status(ctx: &StudioContext, video_id: &str, wait: bool, interval: u64, timeout: u64) -> Result<()> {
    let status = if wait {
        ctx.client
            .wait_for_completion(
                video_id,
                Duration::from_secs(interval.max(1)),
                Duration::from_secs(timeout),
            )
            .await?
    } else {
        ctx.client.poll_status(video_id).await?
    };

    println!("Video:  {}", status.video_id);
    println!("Status: {:?}", status.status);
    if let Some(duration) = status.duration {
        println!("Length: {:.1}s", duration);
    }
    if let Some(url) = &status.video_url {
        println!("URL:    {}", url);
    }
    if let Some(thumb) = &status.thumbnail_url {
        println!("Thumb:  {}", thumb);
    }
    if let Some(error) = &status.error {
        println!("Error:  {}", error);
    }

    if status.status == JobState::Failed {
        anyhow::bail!("Render {} failed", video_id);
    }
    Ok(())
}

/// `@path` reads the script from a file
fn read_script(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map(|s| s.trim().to_string())
            .with_context(|| format!("Failed to read script file {}", path)),
        None => Ok(arg.to_string()),
    }
}

fn print_activity_log(ctx: &StudioContext) {
    let entries = ctx.log.snapshot();
    println!("\n=== Activity Log ({} entries) ===", entries.len());
    for entry in &entries {
        println!("{}", entry.summary());
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}
