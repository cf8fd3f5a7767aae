use std::{env, fs, path::Path};

use anyhow::{Context, Result, bail};
use log::{LevelFilter, Metadata, Record};

use spark::bytecode::disasm::print_chunk;
use spark::frontend::token_dumper::TokenDumper;
use spark::frontend::{parse_source, tokenize};
use spark::hardware::PALETTE;
use spark::{Console, Hardware, VmConfig, compile, demos};

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Level from `SPARK_LOG` (error|warn|info|debug|trace), warn by default.
fn init_logging() {
    let level = env::var("SPARK_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

struct Options {
    tokens: bool,
    no_color: bool,
    pretty: bool,
    ast: bool,
    bytecode: bool,
    ticks: u64,
    check_syscalls: bool,
    demo: Option<String>,
    file: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tokens: false,
            no_color: false,
            pretty: false,
            ast: false,
            bytecode: false,
            ticks: 1,
            check_syscalls: true,
            demo: None,
            file: None,
        }
    }
}

/// `None` when help was requested.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Options>> {
    let mut opts = Options::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--tokens" => opts.tokens = true,
            "--no-color" => opts.no_color = true,
            "--pretty" => opts.pretty = true,
            "--ast" => opts.ast = true,
            "--bc" | "--bytecode" => opts.bytecode = true,
            "--no-check" => opts.check_syscalls = false,
            "--ticks" => {
                let n = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing tick count after {arg}"))?;
                opts.ticks = n
                    .parse()
                    .with_context(|| format!("Bad tick count '{n}'"))?;
            }
            "--demo" => {
                let name = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing demo name after {arg}"))?;
                opts.demo = Some(name);
            }
            flag if flag.starts_with('-') => bail!("Unknown flag '{flag}'"),
            _ => {
                if opts.file.is_some() {
                    bail!("Only one input file is supported");
                }
                opts.file = Some(arg);
            }
        }
    }

    Ok(Some(opts))
}

fn main() -> Result<()> {
    init_logging();

    let Some(opts) = parse_args(env::args().skip(1))? else {
        print_usage();
        return Ok(());
    };

    let source = match (&opts.file, &opts.demo) {
        (Some(filename), _) => {
            ensure_extension(filename)?;
            fs::read_to_string(filename).with_context(|| format!("Reading {filename}"))?
        }
        (None, Some(name)) => demo_source(name)?.to_string(),
        (None, None) => {
            println!("demo mode: BIOS color bars");
            demos::BIOS.to_string()
        }
    };

    if opts.tokens {
        let mut dumper = TokenDumper::new();
        if opts.no_color {
            dumper = dumper.no_color();
        }
        if opts.pretty {
            dumper = dumper.pretty();
        }
        dumper.dump(&tokenize(&source));
        return Ok(());
    }

    if opts.ast {
        let program = parse_source(&source)?;
        println!("{:#?}", program);
        return Ok(());
    }

    if opts.bytecode {
        let program = parse_source(&source)?;
        print_chunk(&compile(&program)?);
        return Ok(());
    }

    run(&source, &opts)
}

fn ensure_extension(filename: &str) -> Result<()> {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("spk") {
        bail!("expected a .spk file, got {}", filename);
    }
    Ok(())
}

fn demo_source(name: &str) -> Result<&'static str> {
    match name {
        "bios" => Ok(demos::BIOS),
        "player" => Ok(demos::PLAYER),
        _ => bail!("Unknown demo '{name}' (expected bios or player)"),
    }
}

fn run(source: &str, opts: &Options) -> Result<()> {
    let config = VmConfig {
        check_syscalls: opts.check_syscalls,
        ..VmConfig::default()
    };
    let mut console = Console::with_config(Hardware::new(), config);
    console.load_source(source)?;

    if let Some(fault) = console.fault() {
        bail!("cartridge fault during boot: {}", fault);
    }

    for _ in 0..opts.ticks {
        if let Some(fault) = console.tick() {
            let fault = fault.clone();
            print_summary(&console);
            bail!("cartridge fault: {}", fault);
        }
    }

    print_summary(&console);
    Ok(())
}

fn print_summary(console: &Console<Hardware>) {
    let hw = console.host();

    println!("frames: {}", console.frame());
    println!("cycles: {}", console.vm().cycles());

    let histogram = hw.color_histogram();
    let used = histogram.iter().filter(|&&n| n > 0).count();
    println!("framebuffer: {} colors in use", used);
    for (color, count) in histogram.iter().enumerate() {
        if *count > 0 {
            let (r, g, b) = PALETTE[color];
            println!(
                "  color {:>2} #{:02x}{:02x}{:02x}: {} px",
                color, r, g, b, count
            );
        }
    }

    if !hw.draws().is_empty() {
        println!("draw list: {} commands", hw.draws().len());
    }
    if !hw.sounds().is_empty() {
        println!("sounds: {:?}", hw.sounds());
    }

    for line in hw.console().lines() {
        println!("[{}] {}", line.level.name(), line.message);
    }
}

fn print_usage() {
    println!("SPARK - Fantasy console scripting toolchain");
    println!();
    println!("Usage:");
    println!("  spark                        Run the BIOS demo cartridge");
    println!("  spark --demo <bios|player>   Run a built-in cartridge");
    println!("  spark <file.spk>             Run a cartridge for one frame");
    println!("  spark --ticks N <file.spk>   Run N frames");
    println!("  spark --no-check <file.spk>  Disable syscall argument checks");
    println!("  spark --tokens <file.spk>    Show tokens only (--no-color, --pretty)");
    println!("  spark --ast <file.spk>       Show the parsed AST");
    println!("  spark --bc <file.spk>        Show bytecode disassembly");
    println!("  spark --help, -h             Show this help");
}
