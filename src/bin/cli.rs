//! trackmix CLI: headless playback and WAV export of the demo song.
//!
//! Usage:
//!   tm-cli
//!   tm-cli --wav output.wav --format s24 --rate 48000

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::error;
use tm_engine::{DitherMode, InterpolationKind};
use tm_master::{demo, Controller, MixerSettings, SampleFormat};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    U8,
    S16,
    S24,
    S32,
    F32,
}

impl From<Format> for SampleFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::U8 => SampleFormat::U8,
            Format::S16 => SampleFormat::S16,
            Format::S24 => SampleFormat::S24,
            Format::S32 => SampleFormat::S32,
            Format::F32 => SampleFormat::F32,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Interpolation {
    Nearest,
    Linear,
    Spline,
    Sinc,
    Fir,
}

impl From<Interpolation> for InterpolationKind {
    fn from(i: Interpolation) -> Self {
        match i {
            Interpolation::Nearest => InterpolationKind::Nearest,
            Interpolation::Linear => InterpolationKind::Linear,
            Interpolation::Spline => InterpolationKind::CubicSpline,
            Interpolation::Sinc => InterpolationKind::Sinc,
            Interpolation::Fir => InterpolationKind::Fir,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Dither {
    None,
    Rectangular,
    Modplug,
}

impl From<Dither> for DitherMode {
    fn from(d: Dither) -> Self {
        match d {
            Dither::None => DitherMode::None,
            Dither::Rectangular => DitherMode::Rectangular,
            Dither::Modplug => DitherMode::ModPlug,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tm-cli", about = "Play or render the trackmix demo song")]
struct Args {
    /// Render to this WAV file instead of playing
    #[arg(long)]
    wav: Option<PathBuf>,
    #[arg(long, default_value_t = 44100)]
    rate: u32,
    #[arg(long, value_enum, default_value_t = Format::S16)]
    format: Format,
    #[arg(long)]
    mono: bool,
    #[arg(long, value_enum, default_value_t = Interpolation::Sinc)]
    interpolation: Interpolation,
    #[arg(long, value_enum, default_value_t = Dither::None)]
    dither: Dither,
    /// Times to play the song again after it ends, -1 for forever
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    repeat: i32,
    /// Stop rendering after this many seconds
    #[arg(long, default_value_t = 300)]
    max_seconds: u32,
    #[arg(long)]
    agc: bool,
}

impl Args {
    fn settings(&self) -> MixerSettings {
        MixerSettings::default()
            .with_sample_rate(self.rate)
            .with_channels(if self.mono { 1 } else { 2 })
            .with_sample_format(self.format.into())
            .with_interpolation(self.interpolation.into())
            .with_dither(self.dither.into())
            .with_repeat_count(self.repeat)
            .with_agc(self.agc)
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let song = demo::demo_song();
    println!("Title:    {}", song.title);
    println!("Channels: {}", song.channels.len());
    println!("Patterns: {}", song.patterns.len());
    println!("Orders:   {}", song.order.len());
    println!("Tempo:    {} BPM, Speed: {}", song.initial_tempo, song.initial_speed);
    println!();

    let mut ctrl = Controller::new(song, args.settings());
    let result = match &args.wav {
        Some(path) => render_to_wav(&ctrl, path, &args),
        None => play_audio(&mut ctrl),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn play_audio(ctrl: &mut Controller) -> Result<(), tm_master::MasterError> {
    let info = ctrl.play()?;
    println!(
        "Playing on {} ({} Hz, {} channels)...",
        info.name, info.sample_rate, info.channels
    );
    println!();

    while ctrl.is_playing() {
        ctrl.poll_events(|event| eprintln!("\ndevice: {:?}", event));
        if let Some(player) = ctrl.player().try_lock() {
            let pos = player.play_state();
            print!("\rOrd: {:02X} | Pat: {:02X} | Row: {:02X}", pos.order, pos.pattern, pos.row);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    ctrl.stop()?;
    println!("\rDone.                          ");
    Ok(())
}

fn render_to_wav(ctrl: &Controller, path: &Path, args: &Args) -> Result<(), tm_master::MasterError> {
    println!("Rendering to {} at {} Hz...", path.display(), args.rate);
    let file = BufWriter::new(File::create(path)?);
    let frames = ctrl.render_to_writer(file, None, args.max_seconds)?;
    println!("Rendered {} frames", frames);
    println!("Done.");
    Ok(())
}
