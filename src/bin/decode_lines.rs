//! Decode protocol lines against a catalogue and print a dump of each packet.
//!
//! Usage:
//!   decode_lines [OPTIONS] CATALOGUE.pkt [LINES.txt ...]
//!   decode_lines CATALOGUE.pkt < lines.txt
//!
//! Options:
//!   --max-depth=N       Nesting limit for embedded packets (default 4)
//!   --no-keep-alive     Do not treat a leading number as a keep-alive id
//!   --strict            Exit with status 1 if any line is unresolved or invalid
//!   --quiet, -q         Only print the summary
//!
//! Set RUST_LOG=packetline=debug to see why lines fall back to unresolved.

use anyhow::Context;
use packetline::{dump_packet, Catalogue, Decoder, DecoderConfig, Packet};
use std::io::{self, BufRead};
use std::path::PathBuf;

#[derive(Default)]
struct Summary {
    lines: usize,
    decoded: usize,
    invalid: usize,
    unresolved: usize,
}

impl Summary {
    fn record(&mut self, packet: &Packet) {
        self.lines += 1;
        match packet {
            Packet::Decoded(p) => {
                self.decoded += 1;
                if !p.is_valid() {
                    self.invalid += 1;
                }
            }
            Packet::Unresolved(_) => self.unresolved += 1,
        }
    }
}

fn take_flag(args: &mut Vec<String>, names: &[&str]) -> bool {
    match args.iter().position(|a| names.contains(&a.as_str())) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let no_keep_alive = take_flag(&mut args, &["--no-keep-alive"]);
    let strict = take_flag(&mut args, &["--strict"]);
    let quiet = take_flag(&mut args, &["--quiet", "-q"]);
    let mut config = DecoderConfig::default().detect_keep_alive(!no_keep_alive);
    if let Some(pos) = args.iter().position(|a| a.starts_with("--max-depth=")) {
        let arg = args.remove(pos);
        let depth = arg
            .trim_start_matches("--max-depth=")
            .parse()
            .with_context(|| format!("invalid {}", arg))?;
        config = config.max_depth(depth);
    }

    let mut args = args.into_iter();
    let catalogue_path = args
        .next()
        .map(PathBuf::from)
        .context("usage: decode_lines [OPTIONS] CATALOGUE.pkt [LINES.txt ...]")?;
    let catalogue = Catalogue::from_file(&catalogue_path)
        .with_context(|| format!("loading {}", catalogue_path.display()))?;
    let decoder = Decoder::with_config(&catalogue, config);

    let mut summary = Summary::default();
    let mut handle = |line: &str| {
        if line.trim().is_empty() {
            return;
        }
        let packet = decoder.decode(line);
        summary.record(&packet);
        if !quiet {
            println!("{}", dump_packet(&packet));
        }
    };

    let inputs: Vec<PathBuf> = args.map(PathBuf::from).collect();
    if inputs.is_empty() {
        for line in io::stdin().lock().lines() {
            handle(&line?);
        }
    } else {
        for path in &inputs {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            for line in text.lines() {
                handle(line);
            }
        }
    }

    eprintln!(
        "{} line(s): {} decoded ({} invalid), {} unresolved",
        summary.lines, summary.decoded, summary.invalid, summary.unresolved
    );
    if strict && (summary.invalid > 0 || summary.unresolved > 0) {
        std::process::exit(1);
    }
    Ok(())
}
