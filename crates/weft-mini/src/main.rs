use anyhow::Result;
use clap::{Parser, Subcommand};
use weft_core::{Fraction, Hap, TimeSpan};
use weft_mini::{compile, evaluate, format, parse};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Notation parser and pattern inspector for weft", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a notation pattern parses
    Validate {
        /// Pattern to validate
        pattern: String,
    },
    /// Reformat a notation pattern canonically
    Fmt {
        /// Pattern to format
        pattern: String,
    },
    /// Print the syntax tree of a pattern
    Ast {
        /// Pattern to parse
        pattern: String,

        /// Output format (json or debug)
        #[arg(short, long, default_value = "debug")]
        output: String,
    },
    /// Evaluate a pattern and print its events
    Eval {
        /// Pattern to evaluate
        pattern: String,

        /// Start cycle
        #[arg(short, long, default_value = "0")]
        from: f64,

        /// Duration in cycles
        #[arg(short, long, default_value = "1")]
        duration: f64,

        /// Output format (json or debug)
        #[arg(long, default_value = "debug")]
        output: String,

        /// Random seed
        #[arg(short, long, default_value = "0")]
        seed: u64,
    },
    /// Evaluate a script expression and print its voice events
    Run {
        /// Script source, e.g. 'sound("bd sd").fast(2)'
        source: String,

        /// Start cycle
        #[arg(short, long, default_value = "0")]
        from: f64,

        /// Duration in cycles
        #[arg(short, long, default_value = "1")]
        duration: f64,

        /// Output format (json or debug)
        #[arg(long, default_value = "debug")]
        output: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { pattern } => match parse(&pattern) {
            Ok(_) => {
                println!("pattern is valid");
                Ok(())
            }
            Err(e) => {
                eprintln!("parse error: {e}");
                std::process::exit(1);
            }
        },
        Commands::Fmt { pattern } => match parse(&pattern) {
            Ok(ast) => {
                println!("{}", format(&ast));
                Ok(())
            }
            Err(e) => {
                eprintln!("parse error: {e}");
                std::process::exit(1);
            }
        },
        Commands::Ast { pattern, output } => match parse(&pattern) {
            Ok(ast) => {
                if output == "json" {
                    println!("{}", serde_json::to_string_pretty(&ast)?);
                } else {
                    println!("{ast:#?}");
                }
                Ok(())
            }
            Err(e) => {
                eprintln!("parse error: {e}");
                std::process::exit(1);
            }
        },
        Commands::Eval {
            pattern,
            from,
            duration,
            output,
            seed,
        } => {
            let ast = match parse(&pattern) {
                Ok(ast) => ast,
                Err(e) => {
                    eprintln!("parse error: {e}");
                    std::process::exit(1);
                }
            };
            let pat = match evaluate(&ast) {
                Ok(pat) => pat.seed(seed),
                Err(e) => {
                    eprintln!("evaluation error: {e}");
                    std::process::exit(1);
                }
            };
            let haps = query_sorted(&pat, from, duration);
            print_haps(&haps, &output)
        }
        Commands::Run {
            source,
            from,
            duration,
            output,
        } => {
            let Some(pat) = compile(&source) else {
                eprintln!("script failed to compile");
                std::process::exit(1);
            };
            let haps = query_sorted(&pat, from, duration);
            print_haps(&haps, &output)
        }
    }
}

fn query_sorted<T: Clone + Send + Sync + 'static>(
    pat: &weft_core::Pattern<T>,
    from: f64,
    duration: f64,
) -> Vec<Hap<T>> {
    let begin = Fraction::approximate(from);
    let end = begin + Fraction::approximate(duration);
    let mut haps = pat.query_span(TimeSpan::new(begin, end));
    haps.sort_by(|a, b| a.part.begin.cmp(&b.part.begin));
    haps
}

fn print_haps<T: serde::Serialize + std::fmt::Debug>(haps: &[Hap<T>], output: &str) -> Result<()> {
    if output == "json" {
        println!("{}", serde_json::to_string_pretty(haps)?);
        return Ok(());
    }
    for hap in haps {
        let whole = hap
            .whole
            .map(|w| w.to_string())
            .unwrap_or_else(|| "(continuous)".into());
        let onset = if hap.has_onset() { "*" } else { " " };
        println!("{onset} part {} | whole {} | {:?}", hap.part, whole, hap.value);
    }
    Ok(())
}
