use clap::Parser;
use docqa_context::text::{DEFAULT_BOUNDARIES, TextChunker, clean_text};
use std::fs;
use std::io::{self, Read};

/// A CLI tool to chunk document text into JSON output using docqa-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum length for each text chunk, in characters.
    #[arg(short = 's', long, default_value_t = 500)]
    chunk_size: usize,

    /// Number of characters repeated between consecutive chunks.
    #[arg(short = 'o', long, default_value_t = 50)]
    overlap: usize,

    /// Comma-separated list of regex patterns for split boundaries.
    /// Defaults to paragraph break, line break, space.
    #[arg(short, long, value_delimiter = ',')]
    boundaries: Option<Vec<String>>,

    /// Normalize whitespace before chunking.
    #[arg(long)]
    clean: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    if args.clean {
        content = clean_text(&content);
    }

    let boundary_patterns_owned: Vec<String> = if let Some(b) = args.boundaries {
        b
    } else {
        DEFAULT_BOUNDARIES.iter().map(|&s| s.to_string()).collect()
    };

    let boundary_patterns_refs: Vec<&str> = boundary_patterns_owned
        .iter()
        .map(|s| s.as_str())
        .collect();

    let chunker = TextChunker::with_boundaries(args.chunk_size, args.overlap, &boundary_patterns_refs)?;
    let chunks = chunker.chunk(&content);

    let json_output = serde_json::to_string_pretty(&chunks)?;
    println!("{}", json_output);

    Ok(())
}
