use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use zwrap_codecs::{create, open, open_auto, CompressionLevel, Format};
use zwrap_core::{Reader, VirtualOffset};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "zwrap",
    about = "Stream bytes through gzip, BGZF and zstd; inspect members and seek by virtual offset",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file
    Compress {
        /// Source file to compress ("-" reads stdin)
        input: PathBuf,
        /// Destination file
        output: PathBuf,
        /// Output format: gzip | bgzf | zstd (default: guessed from the output extension, else gzip)
        #[arg(short, long)]
        format: Option<Format>,
        /// Compression level: fast | default | best | <n>
        #[arg(short, long, default_value_t = CompressionLevel::Default)]
        level: CompressionLevel,
    },
    /// Decompress a file back to raw bytes
    Decompress {
        /// Source compressed file
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
        /// Input format (default: detected from the file contents)
        #[arg(short, long)]
        format: Option<Format>,
    },
    /// Print the format, sizes and member layout of a compressed file
    Inspect {
        /// Compressed file to inspect
        file: PathBuf,
        /// Print one line per member with its start offset
        #[arg(long)]
        members: bool,
    },
    /// Read bytes starting at a virtual offset of a BGZF file
    ///
    /// Only the member holding the offset (and those after it, as far as
    /// `--length` reaches) is decompressed.
    ReadAt {
        /// BGZF file
        file: PathBuf,
        /// Virtual offset, either the raw 64-bit value or `block:offset`
        #[arg(short, long, value_parser = parse_virtual_offset)]
        offset: VirtualOffset,
        /// Number of decompressed bytes to read
        #[arg(short = 'n', long, default_value_t = 256)]
        length: u64,
        /// Write raw bytes to a file instead of printing a hex dump
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn parse_virtual_offset(s: &str) -> Result<VirtualOffset, String> {
    match s.split_once(':') {
        Some((block, offset)) => {
            let block = block.trim().parse::<u64>().map_err(|e| format!("bad block position '{block}': {e}"))?;
            let offset = offset.trim().parse::<u16>().map_err(|e| format!("bad intra-block offset '{offset}': {e}"))?;
            VirtualOffset::new(block, offset).map_err(|e| e.to_string())
        }
        None => s.trim().parse::<u64>().map(VirtualOffset::from).map_err(|e| format!("bad virtual offset '{s}': {e}")),
    }
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn hex_dump(start: VirtualOffset, data: &[u8]) {
    println!("--- {} bytes at virtual offset {} ({}) ---", data.len(), start, u64::from(start));
    for (i, chunk) in data.chunks(16).enumerate() {
        print!("  {:04x}  ", i * 16);
        for b in chunk {
            print!("{:02x} ", b);
        }
        // padding
        for _ in chunk.len()..16 {
            print!("   ");
        }
        print!("  |");
        for b in chunk {
            if b.is_ascii_graphic() || *b == b' ' {
                print!("{}", *b as char);
            } else {
                print!(".");
            }
        }
        println!("|");
    }
}

fn open_input(path: &Path, format: Option<Format>) -> anyhow::Result<(Format, Reader<File>)> {
    match format {
        Some(format) => {
            let reader = open(path, format).with_context(|| format!("opening {:?} as {}", path, format))?;
            Ok((format, reader))
        }
        None => open_auto(path).with_context(|| format!("opening {:?}", path)),
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(input: PathBuf, output: PathBuf, format: Option<Format>, level: CompressionLevel) -> anyhow::Result<()> {
    let format = format.or_else(|| Format::from_path(&output)).unwrap_or(Format::Gzip);
    let mut writer =
        create(&output, format, level).with_context(|| format!("creating output file {:?}", output))?;

    let t0 = Instant::now();
    let bytes_read = if input.to_str() == Some("-") {
        io::copy(&mut io::stdin().lock(), &mut writer)?
    } else {
        let file = File::open(&input).with_context(|| format!("opening input file {:?}", input))?;
        io::copy(&mut BufReader::new(file), &mut writer)?
    };
    writer.close().with_context(|| format!("finishing {:?}", output))?;
    let elapsed = t0.elapsed();

    let compressed_size = std::fs::metadata(&output)?.len();
    let ratio = bytes_read as f64 / compressed_size.max(1) as f64;

    eprintln!("  format      : {} (level {})", format, level);
    eprintln!("  members     : {}", writer.members_written());
    eprintln!("  raw size    : {}", human_bytes(bytes_read));
    eprintln!("  compressed  : {}", human_bytes(compressed_size));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!("  throughput  : {}/s", human_bytes((bytes_read as f64 / elapsed.as_secs_f64()) as u64));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf, format: Option<Format>) -> anyhow::Result<()> {
    let (format, mut reader) = open_input(&input, format)?;
    info!("decompressing {:?} as {}", input, format);

    let is_stdout = output.to_str() == Some("-");
    let mut dst: Box<dyn Write> = if is_stdout {
        Box::new(io::stdout().lock())
    } else {
        Box::new(File::create(&output).with_context(|| format!("creating output file {:?}", output))?)
    };

    let t0 = Instant::now();
    let members =
        scan_members(&mut reader, |chunk| dst.write_all(chunk)).with_context(|| format!("decompressing {:?}", input))?;
    dst.flush()?;
    let elapsed = t0.elapsed();
    let total_raw: u64 = members.iter().map(|m| m.raw_len).sum();

    eprintln!("  format      : {}", format);
    eprintln!("  members     : {} with data", members.len());
    eprintln!("  raw size    : {}", human_bytes(total_raw));
    eprintln!("  throughput  : {}/s", human_bytes((total_raw as f64 / elapsed.as_secs_f64()) as u64));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

/// One member as seen by a sequential scan.
struct MemberInfo {
    start: u64,
    raw_len: u64,
}

/// Pass every decompressed byte to `sink`, recording the members that
/// held data. Empty members, such as the BGZF EOF marker, are not listed.
fn scan_members<R: Read>(
    reader: &mut Reader<R>,
    mut sink: impl FnMut(&[u8]) -> io::Result<()>,
) -> anyhow::Result<Vec<MemberInfo>> {
    let mut members: Vec<MemberInfo> = Vec::new();
    loop {
        let chunk = reader.fill_buf()?;
        let n = chunk.len();
        if n == 0 {
            return Ok(members);
        }
        sink(chunk)?;
        // A decompressed window never spans two members.
        let start = reader.block_position();
        match members.last_mut() {
            Some(last) if last.start == start => last.raw_len += n as u64,
            _ => members.push(MemberInfo { start, raw_len: n as u64 }),
        }
        reader.consume(n);
    }
}

fn run_inspect(file: PathBuf, show_members: bool) -> anyhow::Result<()> {
    let (format, mut reader) = open_input(&file, None)?;
    let file_size = std::fs::metadata(&file)?.len();
    let members = scan_members(&mut reader, |_| Ok(())).with_context(|| format!("scanning {:?}", file))?;
    let raw_size: u64 = members.iter().map(|m| m.raw_len).sum();

    println!("=== {:?} ===", file);
    println!();
    println!("  format         : {}", format);
    println!("  seekable       : {}", if format.supports_seek() { "yes (virtual offsets)" } else { "no" });
    println!("  members        : {} with data", members.len());
    println!("  raw size       : {}", human_bytes(raw_size));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!("  ratio          : {:.2}x", raw_size as f64 / file_size.max(1) as f64);

    if show_members {
        println!();
        println!("  {:>8}  {:>14}  {:>20}  {:>12}", "member", "file offset", "virtual offset", "raw");
        println!("  {}", "-".repeat(60));
        for (i, m) in members.iter().enumerate() {
            let voff = match VirtualOffset::new(m.start, 0) {
                Ok(v) if format.supports_seek() => u64::from(v).to_string(),
                _ => "-".to_string(),
            };
            println!("  {:>8}  {:>14}  {:>20}  {:>12}", i, m.start, voff, human_bytes(m.raw_len));
        }
    }

    Ok(())
}

fn run_read_at(file: PathBuf, offset: VirtualOffset, length: u64, output: Option<PathBuf>) -> anyhow::Result<()> {
    let (format, mut reader) = open_input(&file, None)?;
    if !format.supports_seek() {
        anyhow::bail!("{:?} is {}, which has no virtual offsets; recompress it as bgzf", file, format);
    }

    eprintln!("seeking to virtual offset {} (member at byte {})...", offset, offset.block_position());
    let t0 = Instant::now();
    reader.seek_virtual(offset).with_context(|| format!("seeking to {}", offset))?;
    let mut raw = Vec::new();
    (&mut reader).take(length).read_to_end(&mut raw).with_context(|| format!("reading at {}", offset))?;
    let elapsed = t0.elapsed();

    eprintln!("  decoded {} in {:.3}ms", human_bytes(raw.len() as u64), elapsed.as_secs_f64() * 1000.0);

    match output {
        Some(path) => {
            std::fs::write(&path, &raw)?;
            eprintln!("  written to {:?}", path);
        }
        None => hex_dump(offset, &raw),
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compress { input, output, format, level } => run_compress(input, output, format, level),
        Commands::Decompress { input, output, format } => run_decompress(input, output, format),
        Commands::Inspect { file, members } => run_inspect(file, members),
        Commands::ReadAt { file, offset, length, output } => run_read_at(file, offset, length, output),
    }
}
