use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use shader_filter::audio::device::InputDevice;
use shader_filter::effect::{EffectCompiler, EffectProgram};
use shader_filter::filter::{RELOAD_BUTTON, SHADER_FILE_SETTING};
use shader_filter::gpu::WgpuGraphics;
use shader_filter::headless::HeadlessHost;
use shader_filter::{EngineConfig, FilterStatus, JsonSettings, SettingsStore, ShaderFilter};

const MIC_SOURCE: &str = "default input";

struct Options {
    effect: Option<PathBuf>,
    settings: Option<PathBuf>,
    frames: u64,
    fps: f32,
    width: u32,
    height: u32,
    gpu: bool,
    mic: bool,
    properties: bool,
    realtime: bool,
    list_devices: bool,
    save_config: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            effect: None,
            settings: None,
            frames: 60,
            fps: 60.0,
            width: 1280,
            height: 720,
            gpu: false,
            mic: false,
            properties: false,
            realtime: false,
            list_devices: false,
            save_config: false,
        }
    }
}

const USAGE: &str = "usage: shader-filter [EFFECT] [--frames N] [--fps N] [--size WxH] \
[--settings FILE] [--gpu] [--mic] [--properties] [--realtime] [--list-devices] [--save-config]";

fn parse_args() -> Result<Options> {
    let mut opts = Options::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().with_context(|| format!("{name} needs a value"));
        match arg.as_str() {
            "--frames" => opts.frames = value("--frames")?.parse()?,
            "--fps" => opts.fps = value("--fps")?.parse()?,
            "--size" => {
                let size = value("--size")?;
                let (w, h) = size
                    .split_once('x')
                    .with_context(|| format!("bad size '{size}', expected WxH"))?;
                opts.width = w.parse()?;
                opts.height = h.parse()?;
            }
            "--settings" => opts.settings = Some(PathBuf::from(value("--settings")?)),
            "--gpu" => opts.gpu = true,
            "--mic" => opts.mic = true,
            "--properties" => opts.properties = true,
            "--realtime" => opts.realtime = true,
            "--list-devices" => opts.list_devices = true,
            "--save-config" => opts.save_config = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown option '{other}'\n{USAGE}"),
            other => opts.effect = Some(PathBuf::from(other)),
        }
    }
    Ok(opts)
}

fn frame_duration(fps: f32) -> Result<Duration> {
    if !(fps > 0.0 && fps.is_finite()) {
        bail!("--fps must be a positive number");
    }
    Duration::try_from_secs_f32(1.0 / fps).context("--fps out of range")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let opts = parse_args()?;
    let frame = frame_duration(opts.fps)?;
    if opts.list_devices {
        for name in InputDevice::list_devices() {
            println!("{name}");
        }
        return Ok(());
    }

    let mut config = EngineConfig::load();
    if opts.save_config {
        config.save();
        if let Some(path) = EngineConfig::default_path() {
            log::info!("Wrote config to {}", path.display());
        }
    }

    let mut settings = match &opts.settings {
        Some(path) => JsonSettings::load(path)
            .with_context(|| format!("reading settings {}", path.display()))?,
        None => JsonSettings::new(),
    };
    if let Some(effect) = &opts.effect {
        settings.set_string(SHADER_FILE_SETTING, &effect.to_string_lossy());
    }

    let mut host = if opts.gpu {
        HeadlessHost::with_graphics(opts.width, opts.height, Box::new(WgpuGraphics::new()?))
    } else {
        HeadlessHost::new(opts.width, opts.height)
    };

    // Kept alive for the whole run; dropping it stops capture.
    let _mic = if opts.mic {
        host.add_audio_source(MIC_SOURCE);
        match InputDevice::open(host.audio_router().input(MIC_SOURCE)) {
            Ok(device) => {
                config.sample_rate = device.sample_rate;
                Some(device)
            }
            Err(e) => {
                log::warn!("Audio input unavailable: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let mut filter = ShaderFilter::create(&settings, &mut host, Box::new(EffectCompiler), config);
    match filter.status() {
        FilterStatus::Loaded => log::info!("Loaded {} parameter(s)", filter.params().len()),
        FilterStatus::ReloadFailed(e) => log::error!("Effect failed to load: {e}"),
        FilterStatus::Uninitialized => log::warn!("No effect file given; passing input through"),
        FilterStatus::NeedsReload => {}
    }

    if opts.properties {
        println!("{}", serde_json::to_string_pretty(&filter.properties(&host))?);
    }

    let mut last = Instant::now();
    for _ in 0..opts.frames {
        if settings.get_bool(RELOAD_BUTTON).unwrap_or(false) {
            settings.set_bool(RELOAD_BUTTON, false);
            filter.request_reload();
        }
        if filter.needs_update() {
            filter.update(&settings, &mut host);
        }

        let seconds = if opts.realtime {
            let now = Instant::now();
            let elapsed = now - last;
            if elapsed < frame {
                std::thread::sleep(frame - elapsed);
            }
            let now = Instant::now();
            let dt = (now - last).as_secs_f32();
            last = now;
            dt
        } else {
            frame.as_secs_f32()
        };

        filter.tick(seconds, &host);
        host.set_source_size(filter.width(), filter.height());
        filter.render(&mut host);
    }

    log::info!(
        "Rendered {} frame(s), passed through {}, output {}x{}",
        host.draws().len(),
        host.skipped(),
        filter.width(),
        filter.height()
    );
    if let Some(program) = filter
        .program()
        .and_then(|p| p.as_any().downcast_ref::<EffectProgram>())
    {
        for param in filter.params() {
            let handle = param.handle();
            let ty = handle.param_type();
            if ty.is_float() {
                log::info!("{} = {:?}", handle.name(), program.floats(handle.name()).unwrap_or_default());
            } else if ty.is_int() {
                log::info!("{} = {:?}", handle.name(), program.ints(handle.name()).unwrap_or_default());
            } else if let Some(texture) = program.texture(handle.name()) {
                log::info!("{} = texture {}x{}", handle.name(), texture.width(), texture.height());
            }
        }
    }

    filter.destroy(&mut host);
    Ok(())
}
