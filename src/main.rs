//! Command line front end: decode JPEG files and write BMP renderings
//! next to them.

use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::{value_parser, Arg, ArgAction, Command};
use log::{error, info, warn, LevelFilter};
use scoped_threadpool::Pool;

use jpeg_lanes::{bmp, Decoder};

struct Options {
    lanes: usize,
    flip: bool,
    scale_percent: Option<u32>,
    scale_width: Option<usize>,
}

#[rustfmt::skip]
fn create_cmd_args() -> Command {
    Command::new("jpeg-lanes")
        .about("Decode baseline JPEG files and render them as BMP")
        .arg(Arg::new("parallel")
            .short('d')
            .action(ArgAction::SetTrue)
            .help("Use the parallel decoding backend"))
        .arg(Arg::new("workers")
            .short('n')
            .value_parser(value_parser!(usize))
            .help("Decoding lanes per image, defaults to the CPU count"))
        .arg(Arg::new("groups")
            .short('k')
            .value_parser(value_parser!(usize))
            .help("Number of worker groups decoding files concurrently"))
        .arg(Arg::new("scale")
            .short('s')
            .value_parser(value_parser!(u32))
            .help("Scale percentage, the image is halved while the percentage is at most 50"))
        .arg(Arg::new("max_files")
            .short('m')
            .value_parser(value_parser!(usize))
            .help("Stop processing after this many files"))
        .arg(Arg::new("scale_width")
            .short('w')
            .value_parser(value_parser!(usize))
            .help("Halve the image until its width fits the given target"))
        .arg(Arg::new("flip")
            .short('f')
            .action(ArgAction::SetTrue)
            .help("Flip the output horizontally"))
        .arg(Arg::new("multiple")
            .short('M')
            .action(ArgAction::SetTrue)
            .help("Assign several files to each worker group up front"))
        .arg(Arg::new("files")
            .action(ArgAction::Append)
            .value_parser(value_parser!(String))
            .help("Input files, or - to read file names from standard input"))
}

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    let matches = create_cmd_args().get_matches();

    let mut files: Vec<String> = Vec::new();
    let args: Vec<String> = matches
        .get_many::<String>("files")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    for arg in args {
        if arg == "-" {
            // file names arrive one per line on standard input
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let name = line.trim();
                if !name.is_empty() && is_regular_file(name) {
                    files.push(name.to_string());
                }
            }
        } else if is_regular_file(&arg) {
            files.push(arg);
        } else {
            warn!("Skipping {arg}: not a readable file");
        }
    }

    if files.is_empty() {
        error!("No input files");
        return ExitCode::FAILURE;
    }

    if let Some(max) = matches.get_one::<usize>("max_files") {
        if files.len() > *max {
            info!("Limiting input to {max} files");
            files.truncate(*max);
        }
    }

    let lanes = if matches.get_flag("parallel") {
        matches
            .get_one::<usize>("workers")
            .copied()
            .unwrap_or_else(num_cpus::get)
    } else {
        1
    };
    let options = Options {
        lanes,
        flip: matches.get_flag("flip"),
        scale_percent: matches.get_one::<u32>("scale").copied(),
        scale_width: matches.get_one::<usize>("scale_width").copied(),
    };

    let groups = matches.get_one::<usize>("groups").copied().unwrap_or(1);
    let decoded = AtomicUsize::new(0);

    if groups <= 1 {
        for file in &files {
            if process_file(file, &options) {
                decoded.fetch_add(1, Ordering::Relaxed);
            }
        }
    } else {
        let mut pool = Pool::new(groups as u32);
        pool.scoped(|scope| {
            if matches.get_flag("multiple") {
                // hand each group a contiguous batch of files
                let batch = (files.len() + groups - 1) / groups;
                for chunk in files.chunks(batch) {
                    let options = &options;
                    let decoded = &decoded;
                    scope.execute(move || {
                        for file in chunk {
                            if process_file(file, options) {
                                decoded.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    });
                }
            } else {
                for file in &files {
                    let options = &options;
                    let decoded = &decoded;
                    scope.execute(move || {
                        if process_file(file, options) {
                            decoded.fetch_add(1, Ordering::Relaxed);
                        }
                    });
                }
            }
        });
    }

    info!(
        "Decoded {} of {} file(s)",
        decoded.load(Ordering::Relaxed),
        files.len()
    );
    if decoded.load(Ordering::Relaxed) == 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn is_regular_file(path: &str) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Decode one file and write its BMP rendering; per file failures are
/// logged and never abort the batch.
fn process_file(path: &str, options: &Options) -> bool {
    let Ok(data) = std::fs::read(path) else {
        warn!("Skipping unreadable file {path}");
        return false;
    };

    let mut decoder = Decoder::new();
    decoder.set_num_lanes(options.lanes);

    let mut image = match decoder.decode_buffer(&data) {
        Ok(image) => image,
        Err(e) => {
            error!("{path}: {e}");
            return false;
        }
    };

    if options.flip {
        image.flip_horizontal();
    }
    if let Some(percent) = options.scale_percent {
        let mut percent = percent.max(1);
        while percent <= 50 {
            let before = image.width();
            image.half_scale();
            if image.width() == before {
                break;
            }
            percent *= 2;
        }
    }
    if let Some(target) = options.scale_width {
        // halve while the width is still above the target
        while image.width() > target.max(1) {
            let before = image.width();
            image.half_scale();
            if image.width() == before {
                break;
            }
        }
    }

    let output = Path::new(path).with_extension("bmp");
    match bmp::write(&output, &image) {
        Ok(()) => {
            info!(
                "{path}: {}x{} -> {}",
                image.width(),
                image.height(),
                output.display()
            );
            true
        }
        Err(e) => {
            error!("Could not write {}: {e}", output.display());
            false
        }
    }
}
