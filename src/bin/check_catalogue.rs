//! Check catalogue files: DSL syntax plus every build-time rule.
//!
//! Usage:
//!   check_catalogue [--list] FILE.pkt ...
//!   check_catalogue < file.pkt
//!
//! Options:
//!   --list, -l   Print the registered headers of each valid catalogue

use packetline::{Catalogue, CatalogueError};
use std::io::{self, Read};

fn report(path: &str, result: Result<Catalogue, CatalogueError>, list: bool) -> bool {
    match result {
        Ok(catalogue) => {
            println!("{}: ok, {} packet(s)", path, catalogue.len());
            if list {
                let mut headers: Vec<&str> = catalogue.headers().collect();
                headers.sort_unstable();
                for h in headers {
                    println!("  {}", h);
                }
            }
            true
        }
        Err(e) => {
            println!("{}: error: {}", path, e);
            false
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let list = if let Some(pos) = args.iter().position(|a| a == "--list" || a == "-l") {
        args.remove(pos);
        true
    } else {
        false
    };

    let mut failures = 0usize;
    if args.is_empty() {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src)?;
        if !report("<stdin>", Catalogue::from_dsl(&src), list) {
            failures += 1;
        }
    } else {
        for path in &args {
            if !report(path, Catalogue::from_file(path), list) {
                failures += 1;
            }
        }
    }

    if failures > 0 {
        eprintln!("check: {} catalogue(s) failed", failures);
        std::process::exit(1);
    }
    Ok(())
}
