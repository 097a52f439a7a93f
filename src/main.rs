use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::debug;

use image_compressor::background::BackgroundCompressor;
use image_compressor::config::{Settings, DEFAULT_QUALITY};
use image_compressor::model::{Area, LabelKind, PreviewKind};
use image_compressor::orchestrator::Completion;
use image_compressor::params::{self, Plan};
use image_compressor::port::{Notice, PresentationPort};
use image_compressor::{load_source, Command, ImageCompressor, Orchestrator, OrchestratorError};

/// Simple image compressor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input image file
    input: Option<PathBuf>,

    /// Compression quality (0-100)
    #[arg(long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,

    /// Directory the compressed_<name> file is written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Read commands from stdin (open <path>, quality <n>, download, status, quit)
    #[arg(long)]
    interactive: bool,

    /// Print the compressor options for INPUT as JSON and exit
    #[arg(long)]
    print_options: bool,
}

/// Prints labels and notices, writes downloads into `out_dir`.
struct TerminalPort {
    out_dir: PathBuf,
    saved: Option<PathBuf>,
    save_error: Option<io::Error>,
}

impl PresentationPort for TerminalPort {
    fn render_preview(&mut self, kind: PreviewKind, bytes: &[u8], media_type: &str) {
        debug!("{:?} preview: {} bytes of {}", kind, bytes.len(), media_type);
    }

    fn clear_preview(&mut self, kind: PreviewKind) {
        debug!("{:?} preview cleared", kind);
    }

    fn set_label(&mut self, kind: LabelKind, text: &str) {
        if text.is_empty() {
            return;
        }
        match kind {
            LabelKind::OriginalSize => println!("Original size:   {}", text),
            LabelKind::CompressedSize => println!("Compressed size: {}", text),
            LabelKind::Quality => println!("Quality:         {}", text),
        }
    }

    fn set_visible(&mut self, area: Area, visible: bool) {
        debug!("{:?} visible: {}", area, visible);
    }

    fn notify(&mut self, notice: Notice) {
        eprintln!("{}", notice);
    }

    fn save(&mut self, file_name: &str, bytes: &[u8]) {
        let path = self.out_dir.join(file_name);
        match std::fs::write(&path, bytes) {
            Ok(()) => {
                println!("Saved {:?}", path);
                self.saved = Some(path);
            }
            Err(e) => self.save_error = Some(e),
        }
    }
}

impl TerminalPort {
    fn take_save_result(&mut self) -> Result<Option<PathBuf>> {
        if let Some(e) = self.save_error.take() {
            return Err(e).context("Failed to write compressed file");
        }
        Ok(self.saved.take())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.print_options {
        let input = args
            .input
            .as_deref()
            .ok_or_else(|| anyhow!("--print-options needs an input file"))?;
        return print_options(input, args.quality);
    }

    let mut port = TerminalPort {
        out_dir: args.out_dir.clone(),
        saved: None,
        save_error: None,
    };
    let mut orchestrator = Orchestrator::new(Settings {
        initial_quality: args.quality,
        ..Settings::default()
    });
    let mut background = BackgroundCompressor::new(ImageCompressor::default());
    orchestrator.init(&mut port);

    if args.interactive {
        if let Some(input) = &args.input {
            let source = load_source(input)?;
            run(&mut orchestrator, &mut background, &mut port, Command::SelectFile(source))
                .unwrap_or_else(|e| eprintln!("{}", e));
        }
        return interactive(&mut orchestrator, &mut background, &mut port);
    }

    let input = args
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("no input file given (or use --interactive)"))?;
    let source = load_source(input)?;
    run(&mut orchestrator, &mut background, &mut port, Command::SelectFile(source))?;
    for outcome in background.wait_all(&mut orchestrator, &mut port) {
        outcome?;
    }

    orchestrator.download(&mut port);
    port.take_save_result()?;
    Ok(())
}

fn print_options(input: &Path, quality: u8) -> Result<()> {
    let source = load_source(input)?;
    match params::plan(&source, quality, &Settings::default()) {
        Plan::Skip => println!("null"),
        Plan::Compress(options) => println!("{}", serde_json::to_string_pretty(&options)?),
    }
    Ok(())
}

/// Hands a command to the orchestrator and any job it starts to the pool.
fn run(
    orchestrator: &mut Orchestrator,
    background: &mut BackgroundCompressor<ImageCompressor>,
    port: &mut TerminalPort,
    command: Command,
) -> Result<(), OrchestratorError> {
    if let Some(job) = orchestrator.handle(command, port)? {
        background.submit(job);
    }
    Ok(())
}

fn interactive(
    orchestrator: &mut Orchestrator,
    background: &mut BackgroundCompressor<ImageCompressor>,
    port: &mut TerminalPort,
) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        report(background.drain(orchestrator, port));
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let (verb, rest) = line
            .trim()
            .split_once(' ')
            .map(|(v, r)| (v, r.trim()))
            .unwrap_or((line.trim(), ""));

        let command = match verb {
            "" => continue,
            "quit" | "exit" => break,
            "open" => match load_source(Path::new(rest)) {
                Ok(source) => Command::SelectFile(source),
                Err(e) => {
                    eprintln!("{:#}", e);
                    continue;
                }
            },
            "quality" => match rest.parse::<u8>() {
                Ok(q) if q <= 100 => Command::SetQuality(q),
                _ => {
                    eprintln!("quality takes a number from 0 to 100");
                    continue;
                }
            },
            "download" => {
                // settle anything still running so the newest result is saved
                report(background.wait_all(orchestrator, port));
                Command::Download
            }
            "status" => {
                let ui = orchestrator.ui_state();
                println!(
                    "quality {}%, original {}, compressed {}, {} job(s) running",
                    orchestrator.quality(),
                    ui.original_size.as_deref().unwrap_or("-"),
                    ui.compressed_size.as_deref().unwrap_or("-"),
                    background.in_flight()
                );
                continue;
            }
            other => {
                eprintln!("unknown command: {}", other);
                continue;
            }
        };

        if let Err(e) = run(orchestrator, background, port, command) {
            eprintln!("{}", e);
        }
        if let Err(e) = port.take_save_result() {
            eprintln!("{:#}", e);
        }
    }

    report(background.wait_all(orchestrator, port));
    Ok(())
}

fn report(outcomes: Vec<Result<Completion, OrchestratorError>>) {
    for outcome in outcomes {
        match outcome {
            Ok(Completion::Applied) => {}
            Ok(Completion::Stale) => debug!("discarded an outdated result"),
            // already surfaced through the port
            Err(e) => debug!("{}", e),
        }
    }
}
