//! tern-dump - print a human-readable rendition of a tern index
//!
//! Walks the index term by term, streaming every `(impact, docid-run)`
//! segment through the decode loop and printing each posting as
//! `<docid,impact>`, then lists the primary keys in docid order.
//!
//! # Examples
//!
//! ```bash
//! tern-dump --index ./my_index
//! tern-dump --index ./my_index --ATIRE
//! ```

use std::io::{BufWriter, Stdout, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use tern_core::{Decoder, DeserialisedIndex, Processor};

#[derive(Parser)]
#[command(name = "tern-dump")]
#[command(version, about = "Dump a human-readable version of a tern index to standard out")]
#[command(disable_help_flag = true)]
struct Cli {
    /// Path to the index directory
    #[arg(short, long, default_value = ".")]
    index: PathBuf,

    /// Make the output look like 'atire_dictionary -p -q -e "~"'
    #[arg(short = 'A', long = "ATIRE")]
    atire: bool,

    /// Print this help
    #[arg(short = '?', long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,
}

/// Streams decoded postings to stdout; padding docids (zero) are skipped.
struct Printer<'a> {
    impact: u64,
    out: &'a mut BufWriter<Stdout>,
}

impl Processor for Printer<'_> {
    fn set_score(&mut self, impact: u64) {
        self.impact = impact;
    }

    fn push_back(&mut self, document_ids: &[u32; 8]) {
        for &document_id in document_ids {
            if document_id != 0 {
                let _ = write!(self.out, "<{},{}>", document_id, self.impact);
            }
        }
    }

    fn add_rsv(&mut self, document_id: u64, impact: u64) {
        let _ = write!(self.out, "<{},{}>", document_id, impact);
    }
}

fn walk_index(index: &DeserialisedIndex, out: &mut BufWriter<Stdout>) -> Result<()> {
    let (codec, d_gap) = index.codex();
    let mut decoder = Decoder::new(index.document_count() as usize);

    for term in index.terms() {
        out.write_all(term.term)?;
        out.write_all(b" ")?;
        let mut printer = Printer {
            impact: 0,
            out: &mut *out,
        };
        for header in index.segment_headers(&term)? {
            decoder.decode_and_process(
                d_gap,
                header.impact,
                &mut printer,
                codec,
                header.segment_frequency as usize,
                index.payload(&header),
            );
        }
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let index = DeserialisedIndex::open(&cli.index)
        .with_context(|| format!("failed to open index at {}", cli.index.display()))?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout);

    if !cli.atire {
        out.write_all(b"\nPOSTINGS LISTS\n-------------\n")?;
    }
    walk_index(&index, &mut out)?;

    if !cli.atire {
        out.write_all(b"\nPRIMARY KEY LIST\n----------------\n")?;
        for primary_key in index.primary_keys() {
            out.write_all(primary_key)?;
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Help and usage errors both exit 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return ExitCode::from(1);
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::from(1)
        }
    }
}
