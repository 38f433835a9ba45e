use std::env;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use snel_postings::engine::core::memory::MemoryPool;
use snel_postings::engine::core::posting::{
    DocListFormat, InMemDocListDecoder, InMemPositionListDecoder, PositionListFormat, PostingDump,
    PostingOptions, PostingWriter,
};
use snel_postings::engine::errors::PostingError;
use snel_postings::logging;
use snel_postings::shared::config::CONFIG;

#[derive(Serialize, Default)]
struct Report {
    options: u8,
    bytes: usize,
    skip_bytes: usize,
    doc_bytes: usize,
    position_bytes: Option<usize>,
    df: u32,
    total_tf: u32,
    doc_blocks: usize,
    first_doc: Option<u32>,
    last_doc: Option<u32>,
}

fn usage_and_exit() -> ! {
    eprintln!("Usage:");
    eprintln!("  postings_tool build <path/to/out.postings> <doc_count> [options]");
    eprintln!("  postings_tool inspect <path/to/term.postings> <options>");
    eprintln!("options is the PostingOptions bit set, default 17 (tf list + positions)");
    std::process::exit(1);
}

fn parse_options(arg: Option<&String>) -> Result<PostingOptions> {
    let bits: u8 = match arg {
        Some(raw) => raw.parse().with_context(|| format!("bad options {raw}"))?,
        None => (PostingOptions::TERM_FREQUENCY | PostingOptions::POSITION_LIST).bits(),
    };
    PostingOptions::from_bits(bits).ok_or_else(|| anyhow!("unknown option bits in {bits}"))
}

/// Writes `doc_count` synthetic documents: every third id, `1 + i % 4`
/// occurrences each.
fn build(path: &PathBuf, doc_count: u32, options: PostingOptions) -> Result<Report> {
    let pool = MemoryPool::new("build", CONFIG.memory.pool_limit_bytes);
    let mut writer = PostingWriter::new(options, &CONFIG.posting, &CONFIG.memory, &pool)?;
    for i in 0..doc_count {
        for j in 0..1 + i % 4 {
            writer.add_position(i % 11 + j * 2, j as u8, (j % 3) as u8)?;
        }
        writer.end_document(i * 3, (i % 1000) as u16)?;
    }
    writer.end_segment()?;

    let file = fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writer.dump(&mut out)?;
    out.flush()?;
    drop(out);
    info!(
        path = %path.display(),
        bytes = writer.dump_length(),
        peak_pool = pool.peak(),
        "Wrote posting dump"
    );
    inspect(path, options)
}

fn inspect(path: &PathBuf, options: PostingOptions) -> Result<Report> {
    let data = Bytes::from(fs::read(path).with_context(|| format!("read {}", path.display()))?);
    let pool = MemoryPool::new("inspect", CONFIG.memory.pool_limit_bytes);

    let doc_format = Arc::new(DocListFormat::new(options)?);
    let position_format = PositionListFormat::from_options(options)?.map(Arc::new);

    let dump = PostingDump::parse(&data, &doc_format, position_format.is_some())
        .inspect_err(PostingError::log_error)?;
    let mut report = Report {
        options: options.bits(),
        bytes: dump.len,
        skip_bytes: dump.doc.skip.len(),
        doc_bytes: dump.doc.doc.len(),
        position_bytes: dump.positions.as_ref().map(|p| p.positions.len()),
        ..Report::default()
    };

    let mut docs = InMemDocListDecoder::open_dump(&dump.doc, doc_format, &pool)?;
    let mut ids = Vec::new();
    let mut tfs = Vec::new();
    while let Some(block) = docs
        .decode_doc_buffer(0, &mut ids)
        .inspect_err(PostingError::log_error)?
    {
        report.doc_blocks += 1;
        report.df += block.len as u32;
        report.first_doc = report.first_doc.or(Some(block.first));
        report.last_doc = Some(block.last);
        if docs.decode_current_tf_buffer(&mut tfs) {
            report.total_tf += tfs.iter().sum::<u32>();
        }
    }

    if let (Some(format), Some(positions)) = (position_format, dump.positions.as_ref()) {
        let mut decoder = InMemPositionListDecoder::open_dump(positions, format, &pool)?;
        let (mut values, mut payloads) = (Vec::new(), Vec::new());
        let mut count = 0usize;
        loop {
            let n = decoder.decode_record(&mut values, &mut payloads)?;
            if n == 0 {
                break;
            }
            count += n;
        }
        if report.total_tf == 0 {
            report.total_tf = count as u32;
        }
    }
    Ok(report)
}

fn main() -> Result<()> {
    logging::init()?;
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage_and_exit();
    }
    let path = PathBuf::from(&args[2]);

    let report = match args[1].as_str() {
        "build" => {
            let doc_count: u32 = args
                .get(3)
                .unwrap_or_else(|| usage_and_exit())
                .parse()
                .context("doc_count")?;
            build(&path, doc_count, parse_options(args.get(4))?)?
        }
        "inspect" => inspect(&path, parse_options(args.get(3))?)?,
        _ => usage_and_exit(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
