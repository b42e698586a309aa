use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use nestcomp::cli::Args;
use nestcomp::config::{self, ComposeSettings};
use nestcomp::core::{ImmediateLifecycle, QueuedAudioCache, StillFrameSource, TimelineCompositor};
use nestcomp::entities::effects::{CrossDissolve, Effect, Transform};
use nestcomp::entities::{Clip, Footage, Loader, Media, Sequence, SharedSequence, Transition};
use nestcomp::render::gpu::scoped;
use nestcomp::render::{GraphicsContext, SoftwareContext};

fn init_logging(args: &Args) -> Result<()> {
    // Determine log level based on verbosity flags
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        // File logging with specified verbosity level
        let log_path = log_path_opt.clone().unwrap_or_else(|| PathBuf::from("nestcomp.log"));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging with specified verbosity level (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Build the timeline: one still clip per input, optionally wrapped in a
/// nested sequence, plus an optional audio clip.
fn build_timeline(args: &Args, settings: &ComposeSettings, frames: &mut StillFrameSource) -> Result<SharedSequence> {
    let (width, height) = args.dimensions();
    let range = args.frames();
    let length = range.end.max(1);

    let clip_rate = args.nested_fps.unwrap_or(args.fps);
    let mut clips_seq = Sequence::new("clips", width, height, clip_rate);
    let clip_length = nestcomp::core::retime(length, args.fps, clip_rate).max(1);

    for (i, path) in args.inputs.iter().enumerate() {
        let frame = Loader::load(path)?;
        let (w, h) = frame.resolution();
        let name = file_name(path);
        frames.insert(name.clone(), vec![frame]);

        let footage = Footage::video(&name, w as u32, h as u32, clip_rate, clip_length).with_path(path.clone());
        let mut clip = Clip::new(&name, footage.into(), -(i as i32) - 1, 0, clip_length)
            .with_autoscale(settings.default_autoscale)
            .with_effect(Effect::new(Transform));
        if let Some(fade) = args.fade.filter(|&f| f > 0) {
            clip = clip.with_opening(Transition::opening(CrossDissolve, fade));
        }
        debug!("Clip '{}' {}x{} on track {}", name, w, h, clip.track);
        clips_seq.add_clip(clip);
    }

    let mut root = if args.nested_fps.is_some() {
        let mut root = Sequence::new("root", width, height, args.fps);
        root.add_clip(Clip::new("nest", Media::Sequence(clips_seq.shared()), -1, 0, length));
        root
    } else {
        clips_seq.frame_rate = args.fps;
        clips_seq.name = "root".to_string();
        clips_seq
    };

    if let Some(path) = &args.audio {
        let name = file_name(path);
        let footage = Footage::audio(&name, length).with_path(path.clone());
        root.add_clip(Clip::new(&name, footage.into(), 0, 0, length));
    }

    info!(
        "Timeline {}x{} @ {} fps, {} clips{}",
        width,
        height,
        args.fps,
        args.inputs.len(),
        if args.nested_fps.is_some() { " (nested)" } else { "" }
    );
    Ok(root.shared())
}

fn main() -> Result<()> {
    // Parse command-line arguments first (needed for log setup)
    let args = Args::parse();
    init_logging(&args)?;
    debug!("Command-line args: {:?}", args);

    let settings_path = config::settings_path(args.settings.clone());
    let mut settings = ComposeSettings::load_or_default(&settings_path)?;
    settings.rendering = true;
    if args.no_shaders {
        settings.shaders_enabled = false;
    }

    let mut frames = StillFrameSource::new();
    let timeline = build_timeline(&args, &settings, &mut frames)?;

    let (audio, requests) = QueuedAudioCache::channel(args.audio.is_some());
    let speed = settings.playback_speed;
    let mut compositor = TimelineCompositor::new(settings, ImmediateLifecycle::new(), frames, audio);

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory: {}", args.output.display()))?;

    let (width, height) = args.dimensions();
    let mut gpu = SoftwareContext::new();
    let destination = gpu.create_target(width, height)?;

    let range = args.frames();
    if range.is_empty() {
        bail!("Nothing to render in {:?}", range);
    }

    for playhead in range {
        scoped(&mut gpu, |gpu| {
            gpu.bind_target(destination);
            gpu.set_viewport(width, height);
            gpu.clear([0.0; 4]);
        });
        let outcome = compositor.compose_video_frame(&mut gpu, &timeline, playhead, destination);
        if outcome.needs_redraw {
            warn!("Frame {} composed with missing input", playhead);
        }

        let image = gpu.read_target(destination)?;
        let path = args.output.join(format!("frame_{:05}.png", playhead));
        Loader::save(&image, &path)?;
        info!("Wrote {}", path.display());

        if args.audio.is_some() {
            let audio = compositor.compose_audio_frame(&timeline, playhead, true, speed);
            let issued = requests.try_iter().count();
            debug!("Frame {}: {} audio clips, {} cache requests", playhead, audio.audio_active, issued);
        }
    }

    compositor.close_all(&timeline);
    compositor.flush_released(&mut gpu);
    gpu.delete_target(destination);
    Ok(())
}
