use anyhow::{Context, Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, ValueEnum};
use ripline::{
    line_buffer::{LineBufferBuilder, LineBufferReader},
    lines::LineIter,
};
use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Mutex;
use termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use qqwrysed::input::FileOrStdin;
use qqwrysed::template::{DEFAULT_TEMPLATE, FIELDS};
use qqwrysed::{
    Cloak, CloakConfig, Database, Extractor, ReplaceWriter, ScrubConfig, Scrubber, Template,
};

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "QQWRYSED_LOG";

/// Check if the error chain contains a broken pipe error.
#[inline(always)]
fn is_broken_pipe(err: &Error) -> bool {
    for cause in err.chain() {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                return true;
            }
        }
    }
    false
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the QQWry database file
    /// [default: ~/.config/qqwrysed/qqwry.dat]
    #[clap(
        short,
        long,
        value_name = "FILE",
        value_hint = clap::ValueHint::FilePath,
        env = "QQWRYSED_DB"
    )]
    database: Option<Utf8PathBuf>,

    /// Memory-map the database instead of reading it into memory
    #[clap(long)]
    mmap: bool,

    /// Specify the format of the address decoration. Use the --list-templates option
    /// to see which fields are available. Field names are enclosed in {}, for example
    /// "<{ip}|{country}|{area}>"
    #[clap(short, long)]
    template: Option<String>,

    /// Pass text through without rewriting addresses
    #[clap(long)]
    no_scrub: bool,

    /// Hide this highlighted user id in the output
    #[clap(long, value_name = "ID", requires = "cloak_as")]
    cloak_id: Option<String>,

    /// Name shown in place of the cloaked id
    #[clap(long, value_name = "NAME", requires = "cloak_id")]
    cloak_as: Option<String>,

    /// Show only the decorated addresses, one per line
    #[clap(short, long)]
    only_matching: bool,

    /// Output matches as JSON with tag information for each line
    #[clap(long, conflicts_with = "only_matching")]
    tag: bool,

    /// Look up the given addresses and print their locations
    #[clap(short, long, value_name = "ADDR", num_args = 1.., conflicts_with_all = ["only_matching", "tag"])]
    lookup: Vec<String>,

    /// Print the database header and record count
    #[clap(long)]
    info: bool,

    /// Display a list of available template substitution parameters to
    /// use in --template format string
    #[clap(short = 'L', long)]
    list_templates: bool,

    /// Use markers to highlight the decorations
    #[clap(short = 'C', long, value_enum, default_value_t = ArgsColorChoice::Auto)]
    color: ArgsColorChoice,

    /// Append debug logs to FILE instead of stderr
    #[clap(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    debug_log: Option<Utf8PathBuf>,

    /// Input file(s) to process. Leave empty or use "-" to read from stdin
    #[clap(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    input: Vec<Utf8PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum ArgsColorChoice {
    Always,
    Never,
    Auto,
}

/// How each input line is written out.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Mode {
    Replace,
    OnlyMatching,
    Tag,
}

fn main() -> ExitCode {
    let err = match run_main() {
        Ok(code) => return code,
        Err(err) => err,
    };

    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }

    if std::env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1")
        && std::env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1")
    {
        let _ = writeln!(&mut std::io::stderr(), "{:?}", err);
    } else {
        let _ = writeln!(&mut std::io::stderr(), "{:#}", err);
    }

    ExitCode::FAILURE
}

fn run_main() -> Result<ExitCode> {
    let mut args = Args::parse();
    init_logging(args.debug_log.as_deref())?;

    if args.list_templates {
        println!("Available template fields (default: \"{DEFAULT_TEMPLATE}\"):");
        for (name, description, example) in FIELDS {
            println!("{{{name}}}\t{description}\t(example: {example})");
        }
        return Ok(ExitCode::SUCCESS);
    }

    if args.input.is_empty() {
        args.input.push(Utf8PathBuf::from("-"));
    }

    // auto colors only when stdout is a terminal
    let colormode = match args.color {
        ArgsColorChoice::Auto => {
            if std::io::stdout().is_terminal() {
                ColorChoice::Always
            } else {
                ColorChoice::Never
            }
        }
        ArgsColorChoice::Always => ColorChoice::Always,
        ArgsColorChoice::Never => ColorChoice::Never,
    };

    let path = args.database.clone().or_else(default_database_path);
    if args.mmap {
        let db = load(path.as_deref(), |p| Database::open_mmap(p));
        run(&args, db, colormode)?;
    } else {
        let db = load(path.as_deref(), |p| Database::open_readfile(p));
        run(&args, db, colormode)?;
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logging(debug_log: Option<&Utf8Path>) -> Result<()> {
    let default_level = if debug_log.is_some() { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match debug_log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open debug log {path}"))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn default_database_path() -> Option<Utf8PathBuf> {
    let home = dirs::home_dir()?;
    let path = home.join(".config").join("qqwrysed").join("qqwry.dat");
    Utf8PathBuf::from_path_buf(path).ok()
}

fn load<S, F>(path: Option<&Utf8Path>, open: F) -> Result<Database<S>>
where
    S: AsRef<[u8]>,
    F: FnOnce(&Utf8Path) -> qqwrysed::Result<Database<S>>,
{
    let path = path.context("no database path; pass --database or set QQWRYSED_DB")?;
    Ok(open(path)?)
}

fn run<S: AsRef<[u8]>>(args: &Args, db: Result<Database<S>>, colormode: ColorChoice) -> Result<()> {
    let mut out = io::BufWriter::with_capacity(65536, StandardStream::stdout(colormode));

    // explicit queries need the database
    if args.info || !args.lookup.is_empty() {
        let db = db?;
        if args.info {
            let (start, end) = db.index_range();
            writeln!(out, "size\t{}", db.as_bytes().len())?;
            writeln!(out, "index\t{start}..{end}")?;
            writeln!(out, "records\t{}", db.record_count())?;
        }
        if !args.lookup.is_empty() {
            let mut template = match &args.template {
                Some(t) => Template::compile(t)?,
                None => Template::default(),
            };
            if colormode == ColorChoice::Always {
                template = template.colored();
            }
            for addr in &args.lookup {
                let loc = db.lookup(addr);
                out.write_all(addr.as_bytes())?;
                out.write_all(b"\t")?;
                template.write(&mut out, addr.as_bytes(), &loc)?;
                out.write_all(b"\n")?;
            }
        }
        out.flush()?;
        return Ok(());
    }

    let db = match db {
        Ok(db) => Some(db),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "database unavailable, scrubbing disabled");
            None
        }
    };
    let scrubber = match &db {
        Some(db) => {
            let config = ScrubConfig {
                enabled: !args.no_scrub,
                template: args.template.clone(),
                color: colormode,
            };
            Some(Scrubber::new(db, config)?)
        }
        None => None,
    };
    let cloak = match (&args.cloak_id, &args.cloak_as) {
        (Some(id), Some(replacement)) => Some(Cloak::new(&CloakConfig {
            id: id.clone(),
            replacement: replacement.clone(),
        })?),
        _ => None,
    };

    let mode = if args.only_matching {
        Mode::OnlyMatching
    } else if args.tag {
        Mode::Tag
    } else {
        Mode::Replace
    };
    let extractor = Extractor::shared();
    let mut wtr = ReplaceWriter::new(out, scrubber, cloak);
    let mut line_buffer = LineBufferBuilder::new().capacity(65536).build();

    for path in &args.input {
        let file = FileOrStdin::from_path(path.clone());
        tracing::debug!(input = %file, "reading");
        let reader = file.reader()?;
        let mut lb_reader = LineBufferReader::new(reader, &mut line_buffer);

        while lb_reader.fill()? {
            let lines = LineIter::new(b'\n', lb_reader.buffer());

            for line in lines {
                match mode {
                    Mode::Replace => wtr.write_all(line)?,
                    Mode::OnlyMatching => {
                        for token in extractor.tokens(line) {
                            let decoration = wtr.decoration(token);
                            let out = wtr.get_mut();
                            out.write_all(decoration.as_deref().map_or(token, Vec::as_slice))?;
                            out.write_all(b"\n")?;
                        }
                    }
                    Mode::Tag => {
                        let mut tagged = wtr.tag(line);
                        let out = wtr.get_mut();
                        tagged.write_json(out)?;
                        out.write_all(b"\n")?;
                    }
                }
            }
            lb_reader.consume_all();
        }
        wtr.flush()?;
    }

    Ok(())
}
