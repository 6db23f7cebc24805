// stackview entry point
//
// Startup: logger -> config file -> CLI overrides -> archive client and
// slice pipeline -> one subcommand.
//
//   decode    one instance through fetch/fit/decode, emitted as a
//             transport frame (binary or legacy text)
//   prefetch  run the worker pool over a series, report every slot
//   render    prefetch, navigate, write one frame as PPM
//   replay    prefetch, feed a pointer script to the viewer, write the frame
//   config    print the effective configuration

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use stackview::apps::{Redraw, StackViewer};
use stackview::config::Config;
use stackview::drivers::ArchiveClient;
use stackview::formats::downscale::Downscaler;
use stackview::formats::slice::SlicePipeline;
use stackview::formats::transport::{self, TransportFormat};
use stackview::input::{Adjustment, parse_script};
use stackview::kernel::{Prefetcher, SliceCache, SliceHandle};
use stackview::{Error, Result};

#[derive(Parser, Debug)]
#[command(name = "stackview", version, about = "16-bit greyscale stack viewer")]
struct Args {
    /// Configuration file (.toml or .json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Archive base URL
    #[arg(long, global = true)]
    archive: Option<String>,
    /// Prefetch worker count
    #[arg(long, global = true)]
    workers: Option<usize>,
    /// Never call the external rescaler
    #[arg(long, global = true)]
    no_downscale: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Decode {
        instance: String,
        #[arg(long, value_enum, default_value_t = TransportFormat::Binary)]
        format: TransportFormat,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Prefetch {
        series: String,
    },
    Render {
        series: String,
        #[arg(long, default_value_t = 1)]
        slice: u32,
        #[arg(long, allow_hyphen_values = true)]
        center: Option<i32>,
        #[arg(long)]
        width: Option<i32>,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        pan_x: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        pan_y: i32,
        #[arg(long)]
        out: PathBuf,
    },
    Replay {
        series: String,
        /// Pointer script: `down primary X Y`, `move X Y`, `up primary`, `wheel D`
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    Config,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = &args.archive {
        config.archive.url = url.clone();
    }
    if let Some(workers) = args.workers {
        config.prefetch.workers = workers;
    }
    if args.no_downscale {
        config.downscale.enabled = false;
    }
    Ok(config)
}

struct Session {
    config: Config,
    client: Arc<ArchiveClient>,
    pipeline: Arc<SlicePipeline>,
}

impl Session {
    fn new(config: Config) -> Result<Self> {
        let client = Arc::new(ArchiveClient::new(&config.archive)?);
        let downscaler = Downscaler::from_config(&config.downscale);
        if downscaler.is_none() {
            info!("downscale: disabled");
        }
        let pipeline = Arc::new(SlicePipeline::new(client.clone(), downscaler));
        Ok(Self {
            config,
            client,
            pipeline,
        })
    }

    // list the series and prefetch all of it before returning
    fn prefetch(&self, series: &str) -> Result<(Vec<SliceHandle>, Arc<SliceCache>)> {
        let handles = self.client.series_slices(series)?;
        if handles.is_empty() {
            return Err(Error::Fetch {
                url: format!("series {series}"),
                reason: "no slices with an index".into(),
            });
        }
        let cache = Arc::new(SliceCache::new(handles.len()));
        let report = Prefetcher::start(
            &handles,
            self.config.prefetch.workers,
            self.pipeline.clone(),
            cache.clone(),
        )?
        .join();
        info!(
            "prefetch: {} loaded, {} failed",
            report.loaded.len(),
            report.failed.len()
        );
        Ok((handles, cache))
    }

    fn viewer(&self, series: &str) -> Result<StackViewer> {
        let (handles, cache) = self.prefetch(series)?;
        let mut viewer =
            StackViewer::new(&handles, cache, self.pipeline.clone(), &self.config.display);
        if self.config.display.overlay {
            let title = self.client.title(&handles[0].instance);
            if !title.is_empty() {
                viewer = viewer.with_title(title);
            }
        }
        viewer.open()?;
        Ok(viewer)
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    if let Command::Config = args.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    let session = Session::new(config)?;

    match args.command {
        Command::Decode {
            instance,
            format,
            out,
        } => {
            let png = session.client.fetch_png(&instance)?;
            let pixels = session.pipeline.decode_png(png)?;
            info!("decode: {} at {}", instance, pixels.geometry());
            let frame = match format {
                TransportFormat::Binary => transport::encode_binary(&pixels),
                TransportFormat::Text => transport::encode_text(&pixels).into_bytes(),
            };
            match out {
                Some(path) => fs::write(&path, &frame)?,
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&frame)?;
                    stdout.flush()?;
                }
            }
        }
        Command::Prefetch { series } => {
            let (handles, cache) = session.prefetch(&series)?;
            let mut stdout = io::stdout().lock();
            for handle in &handles {
                match (cache.get(handle.slot), cache.failure(handle.slot)) {
                    (Some(pixels), _) => writeln!(stdout, "{}: {}", handle, pixels.geometry())?,
                    (None, Some(reason)) => writeln!(stdout, "{}: failed: {}", handle, reason)?,
                    (None, None) => writeln!(stdout, "{}: missing", handle)?,
                }
            }
            writeln!(stdout, "{}", cache.progress())?;
        }
        Command::Render {
            series,
            slice,
            center,
            width,
            pan_x,
            pan_y,
            out,
        } => {
            let mut viewer = session.viewer(&series)?;
            let state = viewer.state();
            let adj = Adjustment {
                slice: slice as i32 - state.current_slice as i32,
                center: center.map_or(0, |c| c - state.window_center),
                width: width.map_or(0, |w| w - state.window_width),
                pan_x,
                pan_y,
                zoom: 0.0,
            };
            if viewer.adjust(adj) == Redraw::None && adj != Adjustment::default() {
                warn!(
                    "render: slice {} outside 1..={}, showing slice {}",
                    slice,
                    viewer.last_slice(),
                    viewer.state().current_slice
                );
            }
            write_frame(&viewer, &out)?;
        }
        Command::Replay {
            series,
            events,
            out,
        } => {
            let script = parse_script(&fs::read_to_string(&events)?)?;
            let mut viewer = session.viewer(&series)?;
            let mut rendered = 0usize;
            for event in script.iter().copied() {
                if viewer.handle_pointer(event).is_fresh() {
                    rendered += 1;
                }
            }
            info!(
                "replay: {} event(s), {} frame(s), final state {:?}",
                script.len(),
                rendered,
                viewer.state()
            );
            write_frame(&viewer, &out)?;
        }
        Command::Config => {}
    }
    Ok(())
}

fn write_frame(viewer: &StackViewer, path: &Path) -> Result<()> {
    let out = BufWriter::new(File::create(path)?);
    viewer.write_frame(out)?;
    info!("frame written to {}", path.display());
    Ok(())
}
