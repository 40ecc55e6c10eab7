use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use narrate::{
    BackgroundMedia, CaptionRenderer, CaptionStyle, ColorDef, FfmpegCodec, GoogleTtsProvider,
    NarrationConfig, NarrationPipeline, Voice,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PROGRESS_STEPS: u64 = 1000;

#[derive(Parser, Debug)]
#[command(name = "narrate", version, about = "Turn prose into a narrated video")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Narrate a text file into an MP4 (requires `ffmpeg` and `ffprobe` on PATH).
    Render(RenderArgs),
    /// Render a single caption frame as a PNG, without speech synthesis.
    Frame(FrameArgs),
    /// List the supported voices.
    Voices,
}

/// Overrides applied on top of the JSON config.
#[derive(Args, Debug)]
struct StyleArgs {
    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Caption font size in pixels (10..=100).
    #[arg(long)]
    font_size: Option<u32>,

    /// Caption font file.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Background fill color (`#RRGGBB`, `#RRGGBBAA` or a color name).
    #[arg(long)]
    bg_color: Option<ColorDef>,

    /// Caption text color.
    #[arg(long)]
    text_color: Option<ColorDef>,

    /// Background image shown behind every caption.
    #[arg(long, conflicts_with = "bg_video")]
    bg_image: Option<PathBuf>,

    /// Background video, looped under the narration.
    #[arg(long)]
    bg_video: Option<PathBuf>,

    /// Stretch background media to the canvas instead of letterboxing it.
    #[arg(long, default_value_t = false)]
    stretch: bool,
}

impl StyleArgs {
    fn load_config(&self) -> anyhow::Result<NarrationConfig> {
        let mut cfg = match &self.config {
            Some(path) => NarrationConfig::from_path(path)?,
            None => NarrationConfig::default(),
        };
        if let Some(v) = self.font_size {
            cfg.font_size = v;
        }
        if let Some(v) = &self.font {
            cfg.font_path = Some(v.clone());
        }
        if let Some(v) = self.bg_color {
            cfg.background_color = v;
        }
        if let Some(v) = self.text_color {
            cfg.text_color = v;
        }
        if let Some(v) = &self.bg_image {
            cfg.background = BackgroundMedia::Image(v.clone());
        }
        if let Some(v) = &self.bg_video {
            cfg.background = BackgroundMedia::Video(v.clone());
        }
        if self.stretch {
            cfg.stretch_background = true;
        }
        Ok(cfg)
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Text file to narrate.
    #[arg(long)]
    text: PathBuf,

    #[command(flatten)]
    style: StyleArgs,

    /// Voice name (see `narrate voices`).
    #[arg(long)]
    voice: Option<Voice>,

    /// Output file name without extension.
    #[arg(long)]
    out_name: Option<String>,

    /// Output directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Concurrent speech synthesis requests.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Caption text.
    #[arg(long)]
    text: String,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    style: StyleArgs,

    /// Render the closing bumper card instead of a caption.
    #[arg(long, default_value_t = false)]
    bumper: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Voices => cmd_voices(),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = args.style.load_config()?;
    if let Some(v) = args.voice {
        cfg.voice = v;
    }
    if let Some(v) = args.out_name {
        cfg.output_name = v;
    }
    if let Some(v) = args.out_dir {
        cfg.output_dir = v;
    }
    if let Some(v) = args.concurrency {
        cfg.concurrency = v;
    }
    cfg.validate()?;

    let text = std::fs::read_to_string(&args.text)
        .with_context(|| format!("read text '{}'", args.text.display()))?;
    let provider = GoogleTtsProvider::from_settings(&cfg.speech)?;
    let pipeline = NarrationPipeline::new(cfg, Arc::new(provider), Arc::new(FfmpegCodec));

    let bar = ProgressBar::new(PROGRESS_STEPS);
    bar.set_style(
        ProgressStyle::with_template("{spinner} rendering [{bar:40}] {percent:>3}% {elapsed}")
            .context("progress bar template")?
            .progress_chars("=> "),
    );
    let mut on_progress = |fraction: f64| {
        bar.set_position((fraction * PROGRESS_STEPS as f64).round() as u64);
    };

    let res = pipeline.run(&text, &mut on_progress);
    match res {
        Ok(report) => {
            bar.finish_and_clear();
            eprintln!(
                "narrated {} segments, {:.1}s",
                report.segments, report.duration_secs
            );
            println!("{}", report.output.display());
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e.into())
        }
    }
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = args.style.load_config()?;
    cfg.validate()?;

    let mut renderer = CaptionRenderer::from_font_path(cfg.canvas, cfg.font_path.as_deref());
    let frame = if args.bumper {
        renderer.render_bumper(&cfg.bumper)?
    } else {
        let style = CaptionStyle::from_config(&cfg);
        let background = match &cfg.background {
            BackgroundMedia::Image(path) => {
                match narrate::caption::load_background_image(
                    path,
                    cfg.canvas,
                    style.fill_color,
                    narrate::BackgroundFit::from_stretch(cfg.stretch_background),
                ) {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        tracing::warn!("{e}; using solid fill");
                        None
                    }
                }
            }
            BackgroundMedia::Video(_) => {
                tracing::warn!("frame preview does not decode background video; using solid fill");
                None
            }
            BackgroundMedia::None => None,
        };
        renderer.render_caption(&args.text, &style, background.as_ref())?
    };

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    // Caption and bumper frames sit on an opaque base, so premultiplied equals straight alpha.
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_voices() -> anyhow::Result<()> {
    for voice in Voice::all() {
        println!("{:<20} {}", voice.name(), voice.gender().as_str());
    }
    Ok(())
}
