// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use failure::{format_err, Error};
use log::{info, warn};
use num::Complex;
use std::fmt::Display;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

use tilebrot::config::{MAX_ITERATIONS, MIN_ITERATIONS};
use tilebrot::view::{preset, PRESETS};
use tilebrot::{Coordinator, Fractal, PassSummary, Quality, RenderConfig, ViewState};

fn parse_pair<T: FromStr>(s: &str, separator: char) -> Option<(T, T)> {
    let mut parts = s.splitn(2, separator);
    let left = parts.next()?.trim().parse().ok()?;
    let right = parts.next()?.trim().parse().ok()?;
    Some((left, right))
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    parse_pair(s, ',').map(|(re, im)| Complex::new(re, im))
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    parse_pair(s, 'x').filter(|&(w, h)| w > 0 && h > 0)
}

fn validate_size(s: &str) -> Result<(), String> {
    parse_size(s)
        .map(|_| ())
        .ok_or_else(|| "Size must be WIDTHxHEIGHT with both sides above zero".to_string())
}

fn validate_complex(s: &str, what: &str) -> Result<(), String> {
    parse_complex(s)
        .map(|_| ())
        .ok_or_else(|| format!("Could not parse {} as RE,IM", what))
}

fn validate_range<T>(s: &str, range: RangeInclusive<T>, what: &str) -> Result<(), String>
where
    T: FromStr + PartialOrd + Display,
{
    match T::from_str(s) {
        Ok(n) if range.contains(&n) => Ok(()),
        Ok(_) => Err(format!(
            "{} must be between {} and {}",
            what,
            range.start(),
            range.end()
        )),
        Err(_) => Err(format!("Could not parse {}", what.to_lowercase())),
    }
}

fn validate_zoom(s: &str) -> Result<(), String> {
    match f64::from_str(s) {
        Ok(z) if z.is_finite() && z > 0.0 => Ok(()),
        _ => Err("Zoom must be a positive number".to_string()),
    }
}

const OUTPUT: &str = "output";
const DIRECTORY: &str = "directory";
const SIZE: &str = "size";
const CENTER: &str = "center";
const ZOOM: &str = "zoom";
const ITERATIONS: &str = "iterations";
const RESOLUTION: &str = "resolution";
const TILE_SIZE: &str = "tile-size";
const THREADS: &str = "threads";
const PRESET: &str = "preset";
const JULIA: &str = "julia";
const QUALITY: &str = "quality";

fn common_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    let max_threads = num_cpus::get();
    vec![
        Arg::with_name(SIZE)
            .long(SIZE)
            .short("s")
            .takes_value(true)
            .default_value("800x600")
            .validator(|s| validate_size(&s))
            .help("Size of the canvas"),
        Arg::with_name(ITERATIONS)
            .long(ITERATIONS)
            .short("i")
            .takes_value(true)
            .default_value("100")
            .validator(|s| {
                validate_range(&s, MIN_ITERATIONS..=MAX_ITERATIONS, "Iteration count")
            })
            .help("Iteration limit per point"),
        Arg::with_name(RESOLUTION)
            .long(RESOLUTION)
            .short("r")
            .takes_value(true)
            .default_value("1")
            .validator(|s| validate_range(&s, 1..=64u32, "Resolution"))
            .help("Edge length of the pixel blocks that share one sample"),
        Arg::with_name(QUALITY)
            .long(QUALITY)
            .short("q")
            .takes_value(true)
            .possible_values(&["low", "normal", "high"])
            .help("Quality preset; overrides --resolution"),
        Arg::with_name(TILE_SIZE)
            .long(TILE_SIZE)
            .takes_value(true)
            .default_value("64")
            .validator(|s| validate_range(&s, 1..=4096u32, "Tile size"))
            .help("Edge length of a tile"),
        Arg::with_name(THREADS)
            .long(THREADS)
            .short("t")
            .takes_value(true)
            .default_value("1")
            .validator(move |s| validate_range(&s, 1..=max_threads, "Thread count"))
            .help("Number of worker threads"),
    ]
}

fn args<'a>() -> ArgMatches<'a> {
    App::new("tilebrot")
        .version("0.1.0")
        .about("Progressive tiled Mandelbrot and Julia renderer")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("render")
                .about("Render one view to a PNG")
                .arg(
                    Arg::with_name(OUTPUT)
                        .required(true)
                        .long(OUTPUT)
                        .short("o")
                        .takes_value(true)
                        .help("Output file"),
                )
                .arg(
                    Arg::with_name(CENTER)
                        .long(CENTER)
                        .short("c")
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .default_value("-0.5,0")
                        .validator(|s| validate_complex(&s, "center"))
                        .help("Complex point at the middle of the canvas"),
                )
                .arg(
                    Arg::with_name(ZOOM)
                        .long(ZOOM)
                        .short("z")
                        .takes_value(true)
                        .default_value("1")
                        .validator(|s| validate_zoom(&s))
                        .help("Magnification; 1 shows four units across"),
                )
                .arg(
                    Arg::with_name(PRESET)
                        .long(PRESET)
                        .short("p")
                        .takes_value(true)
                        .help("Named location, overriding --center, --zoom and --julia"),
                )
                .arg(
                    Arg::with_name(JULIA)
                        .long(JULIA)
                        .short("j")
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .validator(|s| validate_complex(&s, "Julia constant"))
                        .help("Draw the Julia set of this constant instead"),
                )
                .args(&common_args()),
        )
        .subcommand(
            SubCommand::with_name("tour")
                .about("Render every preset into a directory")
                .arg(
                    Arg::with_name(DIRECTORY)
                        .required(true)
                        .long(DIRECTORY)
                        .short("d")
                        .takes_value(true)
                        .help("Output directory"),
                )
                .args(&common_args()),
        )
        .subcommand(SubCommand::with_name("presets").about("List the preset locations"))
        .get_matches()
}

fn value<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, Error> {
    matches
        .value_of(name)
        .ok_or_else(|| format_err!("missing value for --{}", name))
}

fn number<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T, Error> {
    let s = value(matches, name)?;
    T::from_str(s).map_err(|_| format_err!("could not parse --{} value '{}'", name, s))
}

fn settings(matches: &ArgMatches) -> Result<(RenderConfig, ViewState, (u32, u32)), Error> {
    let size =
        parse_size(value(matches, SIZE)?).ok_or_else(|| format_err!("could not parse image size"))?;
    let config = RenderConfig {
        tile_size: number(matches, TILE_SIZE)?,
        ..RenderConfig::with_workers(number(matches, THREADS)?)
    };
    config.validate()?;

    let mut view = ViewState {
        iterations: number(matches, ITERATIONS)?,
        resolution: number(matches, RESOLUTION)?,
        ..ViewState::default()
    };
    if let Some(q) = matches.value_of(QUALITY) {
        let quality = Quality::from_str(q).map_err(|e| format_err!("{}", e))?;
        view.apply_quality(quality, &config);
    }
    Ok((config, view, size))
}

fn report(summary: &PassSummary, path: &Path) {
    if summary.is_complete() {
        info!("wrote {} ({} tiles in {:?})", path.display(), summary.total, summary.elapsed);
    } else {
        warn!(
            "wrote {} with {} of {} tiles missing",
            path.display(),
            summary.failed,
            summary.total
        );
    }
}

fn render(matches: &ArgMatches) -> Result<(), Error> {
    let (config, mut view, (width, height)) = settings(matches)?;
    if let Some(key) = matches.value_of(PRESET) {
        let location = preset(key).ok_or_else(|| format_err!("unknown preset: {}", key))?;
        view.apply_preset(location);
    } else {
        if let Some(k) = matches.value_of(JULIA) {
            let k = parse_complex(k).ok_or_else(|| format_err!("could not parse Julia constant"))?;
            view.fractal = Fractal::Julia(k);
            view.center = Complex::new(0.0, 0.0);
        }
        if matches.occurrences_of(CENTER) > 0 || view.fractal == Fractal::Mandelbrot {
            view.center = parse_complex(value(matches, CENTER)?)
                .ok_or_else(|| format_err!("could not parse center"))?;
        }
        view.zoom = number(matches, ZOOM)?;
    }

    let mut coordinator = Coordinator::new(config, view, width, height)?;
    info!(
        "rendering {}x{} with {} worker thread(s)",
        width,
        height,
        coordinator.worker_threads()
    );
    coordinator.render_now()?;
    let summary = coordinator.wait_idle()?;
    let path = Path::new(value(matches, OUTPUT)?);
    coordinator.canvas().save_png(path)?;
    report(&summary, path);
    println!(
        "{}: {}x{}, {}/{} tiles",
        path.display(),
        width,
        height,
        summary.delivered,
        summary.total
    );
    Ok(())
}

fn tour(matches: &ArgMatches) -> Result<(), Error> {
    let (config, view, (width, height)) = settings(matches)?;
    let directory = Path::new(value(matches, DIRECTORY)?);
    fs::create_dir_all(directory)?;

    let mut coordinator = Coordinator::new(config, view, width, height)?;
    for location in PRESETS.iter() {
        coordinator.navigate_to(location.key)?;
        coordinator.render_now()?;
        let summary = coordinator.wait_idle()?;
        let path = directory.join(format!("{}.png", location.key));
        coordinator.canvas().save_png(&path)?;
        report(&summary, &path);
        println!("{}: {}", path.display(), location.name);
    }
    Ok(())
}

fn presets() {
    for location in PRESETS.iter() {
        println!(
            "{:<10} {:<18} {}, {} x{}",
            location.key, location.name, location.re, location.im, location.zoom
        );
    }
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    match matches.subcommand() {
        ("render", Some(m)) => render(m),
        ("tour", Some(m)) => tour(m),
        ("presets", Some(_)) => {
            presets();
            Ok(())
        }
        (other, _) => Err(format_err!("unknown command: {}", other)),
    }
}

fn main() {
    env_logger::init();
    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        for cause in e.iter_causes() {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
