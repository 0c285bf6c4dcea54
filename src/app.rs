use crate::cli::{Cli, Commands, QueueArgs};
use anyhow::{Context, Result, anyhow, bail};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use transq::config::Config;
use transq::engine::{
    self, CancelToken, CapabilityProbe, DurationResolver, FileLog, LogSink, MemoryLog, Queue,
    QueueOrchestrator, RunEvent, RunSettings, Tee, TargetCodec, Vendor, VideoEncoder,
};
use transq::engine::core::preset::EncoderPriority;
use transq::engine::core::{BuildOptions, RunWarnings, build_ffmpeg_cmd};
use transq::engine::hardware::EncoderCapabilities;
use transq::engine::probe::{probe_input_info, tool_version};

pub fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(ffmpeg) = cli.ffmpeg {
        config.ffmpeg.ffmpeg_path = ffmpeg;
    }

    match cli.command {
        Commands::CheckFfmpeg => handle_check_ffmpeg(&config),
        Commands::Caps => handle_caps(&config),
        Commands::Probe { file } => handle_probe(&config, &file),
        Commands::Presets => handle_presets(&config),
        Commands::DryRun { queue } => handle_dry_run(&config, &queue),
        Commands::Run {
            queue,
            uncheck_after_render,
            diagnostics,
            log_file,
        } => handle_run(&config, &queue, uncheck_after_render, diagnostics, log_file),
        Commands::InitConfig => handle_init_config(),
    }
}

fn handle_check_ffmpeg(config: &Config) -> Result<()> {
    let ffmpeg = &config.ffmpeg.ffmpeg_path;
    let version = tool_version(ffmpeg)
        .with_context(|| format!("{} not usable. Is ffmpeg installed and in PATH?", ffmpeg.display()))?;
    println!("ffmpeg found: {}", version);

    let ffprobe = config.ffmpeg.ffprobe();
    let version = tool_version(&ffprobe)
        .with_context(|| format!("{} not usable", ffprobe.display()))?;
    println!("ffprobe found: {}", version);

    match engine::runner::find_in_path(&config.ffmpeg.mediainfo().to_string_lossy()) {
        Some(path) => println!("mediainfo found: {}", path.display()),
        None => println!("mediainfo not found (duration detection falls back to ffprobe)"),
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn print_caps(caps: &EncoderCapabilities) {
    println!("{:<8} {:>6} {:>6}", "", "H264", "H265");
    for vendor in Vendor::AUTO_ORDER {
        println!(
            "{:<8} {:>6} {:>6}",
            vendor.label(),
            yes_no(caps.supports(vendor, TargetCodec::H264)),
            yes_no(caps.supports(vendor, TargetCodec::H265)),
        );
    }
    println!("{:<8} {:>6} {:>6}", "CPU", "yes", "yes");
    println!("libdav1d decoder: {}", yes_no(caps.dav1d_decoder));
}

fn handle_caps(config: &Config) -> Result<()> {
    let log = MemoryLog::new();
    let caps = CapabilityProbe::new().probe(&config.ffmpeg.ffmpeg_path, &log);
    println!("Capabilities of {}:", config.ffmpeg.ffmpeg_path.display());
    print_caps(&caps);

    let priority = config.run.encoder_priority.unwrap_or_default();
    for codec in [TargetCodec::H264, TargetCodec::H265] {
        let encoder: VideoEncoder = engine::select_encoder(codec, priority, &caps, &log);
        println!("{} ({}): {}", codec, priority.label(), encoder);
    }
    Ok(())
}

fn handle_probe(config: &Config, file: &Path) -> Result<()> {
    let log: Arc<dyn LogSink> = Arc::new(MemoryLog::new());
    let resolver = DurationResolver::standard(config.ffmpeg.mediainfo(), config.ffmpeg.ffprobe());
    let task = resolver.resolve(file, &CancelToken::new(), log);

    let info = probe_input_info(&config.ffmpeg.ffprobe(), file)
        .with_context(|| format!("Failed to probe {}", file.display()))?;
    let detected = task.wait();

    println!("File:        {}", file.display());
    println!(
        "Video:       {} {}x{} @ {:.3} fps",
        info.video_codec.as_deref().unwrap_or("?"),
        info.width,
        info.height,
        info.fps
    );
    match info.video_bitrate_kbps {
        Some(kbps) => println!("Video rate:  {} kbps", kbps),
        None => println!("Video rate:  unknown"),
    }
    match info.overall_bitrate_kbps {
        Some(kbps) => println!("Overall:     {} kbps", kbps),
        None => println!("Overall:     unknown"),
    }
    match detected.seconds {
        Some(secs) => println!("Duration:    {:.3} s ({})", secs, detected.source),
        None => println!("Duration:    unknown"),
    }
    Ok(())
}

fn handle_presets(config: &Config) -> Result<()> {
    for preset in config.all_presets() {
        println!(
            "{:<24} {:<5} {:<18} {}{}",
            preset.name,
            preset.target_codec.to_string(),
            preset.bitrate_label(),
            preset.encoder_priority.label(),
            if preset.built_in { "" } else { "  (user)" }
        );
    }
    Ok(())
}

/// Settings for this invocation: config values overridden by flags
fn run_settings(config: &Config, args: &QueueArgs) -> Result<RunSettings> {
    let mut settings = config.run_settings();
    if let Some(dir) = &args.output {
        settings.output_folder = Some(dir.clone());
    }
    if let Some(name) = &args.encoder {
        let priority = EncoderPriority::parse(name)
            .ok_or_else(|| anyhow!("unknown encoder priority '{}'", name))?;
        settings.encoder_priority = Some(priority);
    }
    if let Some(speed) = args.speed {
        settings.speed_quality = speed;
    }
    if args.any_codec {
        settings.only_av1_sources = false;
    }
    Ok(settings)
}

/// Scan inputs, queue them and detect their metadata
fn build_queue(
    config: &Config,
    args: &QueueArgs,
    cancel: &CancelToken,
    log: Arc<dyn LogSink>,
) -> Result<Queue> {
    let preset = match config.preset(args.preset.as_deref()) {
        Some(preset) => preset,
        None => bail!(
            "unknown preset '{}'; run `transq presets` to list them",
            args.preset.as_deref().unwrap_or_default()
        ),
    };

    let files = engine::collect_inputs(&args.paths)?;
    if files.is_empty() {
        bail!("no video files found");
    }

    let mut queue = Queue::new();
    let ids = queue.add_many(files, &preset);

    let resolver = DurationResolver::standard(config.ffmpeg.mediainfo(), config.ffmpeg.ffprobe());
    queue.analyze_sources(&resolver, &config.ffmpeg.ffprobe(), cancel, log);

    if let Some(trim) = &args.trim {
        let (start, end) = match trim.as_slice() {
            [start, end] => (start, end),
            _ => bail!("--trim takes START and END"),
        };
        for id in ids {
            queue.set_trim(id, true, start, end);
        }
    }
    Ok(queue)
}

fn handle_dry_run(config: &Config, args: &QueueArgs) -> Result<()> {
    let memory = Arc::new(MemoryLog::new());
    let log: Arc<dyn LogSink> = memory.clone();
    let settings = run_settings(config, args)?;
    let mut queue = build_queue(config, args, &CancelToken::new(), log.clone())?;

    let orchestrator = QueueOrchestrator::new(settings.clone(), log.clone());
    let rejected = orchestrator.validate(&mut queue);
    for error in &rejected {
        eprintln!("skip: {}", error);
    }

    let caps = CapabilityProbe::new().probe(&settings.ffmpeg_path, log.as_ref());
    let options: BuildOptions = settings.build_options();
    let mut warnings = RunWarnings::new();
    for item in queue.items().iter().filter(|i| i.render && i.last_error.is_none()) {
        let output = settings.output_path_for(item);
        let built = build_ffmpeg_cmd(
            &settings.ffmpeg_path,
            item,
            &output,
            &caps,
            options,
            &mut warnings,
            log.as_ref(),
        );
        println!("{}", built.display);
    }
    Ok(())
}

fn handle_run(
    config: &Config,
    args: &QueueArgs,
    uncheck_after_render: bool,
    diagnostics: Option<PathBuf>,
    log_file: Option<PathBuf>,
) -> Result<()> {
    let memory = Arc::new(MemoryLog::new());
    let mut tee = Tee::new().with(memory.clone());
    if let Some(path) = log_file {
        tee = tee.with(Arc::new(FileLog::new(path)));
    }
    let log: Arc<dyn LogSink> = Arc::new(tee);

    let mut settings = run_settings(config, args)?;
    settings.uncheck_after_render |= uncheck_after_render;

    let cancel = CancelToken::new();
    engine::cancel::cancel_on_ctrlc(&cancel).context("Failed to install Ctrl-C handler")?;

    let mut queue = build_queue(config, args, &cancel, log.clone())?;
    if cancel.is_cancelled() {
        bail!("canceled while analyzing sources");
    }

    let (tx, rx) = mpsc::channel();
    let orchestrator = QueueOrchestrator::new(settings.clone(), log.clone()).with_events(tx);

    let names: Vec<(uuid::Uuid, String)> = queue
        .items()
        .iter()
        .map(|i| (i.id, i.file_name()))
        .collect();
    let printer = thread::spawn(move || {
        let name_of = |id| {
            names
                .iter()
                .find(|(i, _)| *i == id)
                .map(|(_, n)| n.clone())
                .unwrap_or_default()
        };
        for event in rx {
            match event {
                RunEvent::ItemStarted { id } => println!("==> {}", name_of(id)),
                RunEvent::ItemFinished { id, status } => println!("    {}: {}", name_of(id), status),
                RunEvent::SurfaceLog { id } => eprintln!("    see log for {}", name_of(id)),
                RunEvent::Deselected { .. } => {}
                RunEvent::RunFinished(summary) => println!(
                    "{} item(s): {} done, {} failed, {} canceled, {} skipped",
                    summary.total, summary.done, summary.failed, summary.canceled, summary.skipped
                ),
            }
        }
    });

    let summary = orchestrator.run(&mut queue, &cancel);
    drop(orchestrator);
    let _ = printer.join();

    if let Some(dir) = diagnostics {
        let (report, json) = engine::write_diagnostics(
            &dir,
            &settings.ffmpeg_path,
            &config.all_presets(),
            &memory.entries(),
            queue.items(),
        )?;
        println!("Diagnostics: {} and {}", report.display(), json.display());
    }

    if !summary.all_succeeded() {
        process::exit(2);
    }
    Ok(())
}

fn handle_init_config() -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() {
        let cfg = Config::load()?;
        println!("Config loaded successfully from {}", path.display());
        println!("{:#?}", cfg);
    } else {
        Config::default().save()?;
        println!("Default config saved to {}", path.display());
    }
    Ok(())
}
