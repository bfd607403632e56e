//! Command line interface for fb2kfx.
//!
//! Runs the conversion pipeline and prints a summary of the resulting
//! fragment graph; useful for inspecting what a book will produce before
//! handing the graph to a container writer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use fb2kfx::kfx::symbols::symbol_name;
use fb2kfx::{ConvertOptions, convert, default_stylesheet, parse_fb2};

#[derive(Parser)]
#[command(name = "fb2kfx", version, about = "Convert FB2 books to KFX fragments")]
struct Args {
    /// Input FB2 file.
    input: PathBuf,

    /// CSS stylesheet to apply.
    #[arg(short, long)]
    css: Option<PathBuf>,

    /// Runes per approximate page (0 disables the page list).
    #[arg(long, default_value_t = 2300)]
    page_size: usize,

    /// Print every fragment id instead of a summary.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(args: &Args) -> fb2kfx::Result<()> {
    let bytes = std::fs::read(&args.input)?;
    let book = parse_fb2(&bytes)?;

    let css = match &args.css {
        Some(path) => std::fs::read_to_string(path)?,
        None => String::new(),
    };
    let sheet = default_stylesheet(&css);

    // Without a container writer there is no image pipeline here; feed
    // binary ids through as resource names so references line up.
    let resources: HashMap<_, _> = book
        .binaries
        .iter()
        .map(|binary| {
            (
                binary.id.clone(),
                fb2kfx::ImageResource {
                    resource_name: binary.id.clone(),
                    width: 600,
                    height: 800,
                },
            )
        })
        .collect();

    let options = ConvertOptions {
        page_size: args.page_size,
        ..Default::default()
    };
    let conversion = convert(&book, &sheet, &resources, &options)?;

    for warning in &conversion.warnings {
        eprintln!("warning: {warning}");
    }

    if args.verbose {
        for fragment in &conversion.fragments {
            let ftype = symbol_name(fragment.ftype)
                .map(str::to_string)
                .unwrap_or_else(|| format!("${}", fragment.ftype));
            println!("{ftype}\t{}", fragment.fid);
        }
    } else {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for fragment in &conversion.fragments {
            *counts
                .entry(symbol_name(fragment.ftype).unwrap_or("unknown"))
                .or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort();
        for (ftype, count) in counts {
            println!("{count:6}  {ftype}");
        }
    }
    println!(
        "{} fragments, {} styles, {} warnings",
        conversion.fragments.len(),
        conversion.styles.len(),
        conversion.warnings.len()
    );
    Ok(())
}
