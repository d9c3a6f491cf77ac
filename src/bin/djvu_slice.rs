//! Inspect and slice bundled DjVu documents.
//!
//! Usage:
//!   djvu_slice info <file> [--json]
//!   djvu_slice slice <input> <output> [--from N] [--to N] [--strict]
//!
//! `--from` is inclusive, `--to` exclusive, both 0-based. Set `RUST_LOG=debug`
//! for chunk-level tracing.

use djvu_oxide::{Document, ParserOptions};
use std::path::PathBuf;
use std::process;

enum Command {
    Info {
        input: PathBuf,
        json: bool,
    },
    Slice {
        input: PathBuf,
        output: PathBuf,
        from: Option<usize>,
        to: Option<usize>,
        strict: bool,
    },
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  djvu_slice info <file> [--json]");
    eprintln!("  djvu_slice slice <input> <output> [--from N] [--to N] [--strict]");
    process::exit(1);
}

fn parse_number(flag: &str, value: Option<&String>) -> usize {
    match value.map(|v| v.parse::<usize>()) {
        Some(Ok(n)) => n,
        _ => {
            eprintln!("Error: {} expects a page number", flag);
            process::exit(1);
        },
    }
}

fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else { usage() };

    let mut positional = Vec::new();
    let mut json = false;
    let mut strict = false;
    let mut from = None;
    let mut to = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => json = true,
            "--strict" => strict = true,
            "--from" => {
                i += 1;
                from = Some(parse_number("--from", args.get(i)));
            },
            "--to" => {
                i += 1;
                to = Some(parse_number("--to", args.get(i)));
            },
            other if other.starts_with("--") => {
                eprintln!("Error: unknown option {}", other);
                usage();
            },
            other => positional.push(PathBuf::from(other)),
        }
        i += 1;
    }

    match (command.as_str(), positional.len()) {
        ("info", 1) => Command::Info {
            input: positional.remove(0),
            json,
        },
        ("slice", 2) => Command::Slice {
            output: positional.remove(1),
            input: positional.remove(0),
            from,
            to,
            strict,
        },
        _ => usage(),
    }
}

fn run(command: Command) -> djvu_oxide::Result<()> {
    match command {
        Command::Info { input, json } => {
            let doc = Document::from_file(&input)?;
            let summary = doc.summary();
            if json {
                let text = serde_json::to_string_pretty(&summary)
                    .map_err(|e| djvu_oxide::Error::Writer(e.to_string()))?;
                println!("{}", text);
                return Ok(());
            }
            println!("{}: {}, {} bytes", input.display(), summary.form, summary.size);
            println!("  Pages:      {}", summary.page_count);
            println!("  Resources:  {}", summary.resource_ids.join(", "));
            println!("  Navigation: {}", if summary.has_navigation { "yes" } else { "no" });
            println!("  Top-level forms: {}", doc.count_top_level_forms()?);
            for entry in &summary.entries {
                println!(
                    "  [{:>4}] {:<10} {:>10} +{:<8} {}",
                    entry.index,
                    entry.kind,
                    entry.offset,
                    entry.size,
                    entry.id.as_deref().unwrap_or("-")
                );
            }
            for skipped in &summary.skipped {
                println!("  skipped entry {}: {} at {}", skipped.index, skipped.kind, skipped.range);
            }
            Ok(())
        },
        Command::Slice {
            input,
            output,
            from,
            to,
            strict,
        } => {
            let options = if strict {
                ParserOptions::strict()
            } else {
                ParserOptions::lenient()
            };
            let doc = Document::from_file_with_options(&input, options)?;
            let from = from.unwrap_or(0);
            let to = to.unwrap_or(doc.page_count());
            let report = djvu_oxide::slice_with_report(&doc, from..to)?;
            std::fs::write(&output, &report.bytes)?;

            println!(
                "Wrote {} ({} bytes): pages {}..{}, {} entries kept, {} shared resources",
                output.display(),
                report.bytes.len(),
                from,
                to,
                report.retained.len(),
                report.dependencies.len()
            );
            for diagnostic in &report.diagnostics {
                println!("  dropped: {}", diagnostic);
            }
            Ok(())
        },
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run(parse_args()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
