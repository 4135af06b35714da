//! Purpose: `slicekit` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Errors are emitted as a JSON envelope on stderr.
//! Invariants: Process exit code is derived from the error kind's status code.
#![allow(clippy::result_large_err)]

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::aot::Shell;
use serde_json::json;

mod serve;

use slicekit::api::{
    to_status_code, ConfigMap, ConfigValue, DirStore, Error, ErrorKind, PresetCategory,
    PresetRequest, PresetStore, Selection, resolve_presets,
};

#[derive(Parser)]
#[command(
    name = "slicekit",
    version,
    about = "Preset resolution and configuration composition for slicing workflows",
    after_help = r#"EXAMPLES
  $ slicekit presets list
  $ slicekit presets show printer "Bambu Lab A1"
  $ slicekit compose --printer "Bambu Lab A1" --filament "PLA Basic" --set layer_height=0.28
  $ slicekit serve --bind 127.0.0.1:7171"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        help = "Preset directory (default: $SLICEKIT_PRESET_DIR or ~/.slicekit/presets)",
        value_hint = ValueHint::DirPath,
        global = true
    )]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Inspect the preset directory")]
    Presets {
        #[command(subcommand)]
        command: PresetsCommand,
    },
    #[command(about = "Resolve presets and print the composed configuration")]
    Compose {
        #[arg(long, help = "Printer preset name (exact or substring)")]
        printer: Option<String>,
        #[arg(long, help = "Filament preset name (exact or substring)")]
        filament: Option<String>,
        #[arg(long, help = "Process preset name (exact or substring)")]
        process: Option<String>,
        #[arg(
            long = "set",
            value_name = "KEY=VALUE",
            help = "Override a configuration option after composition (repeatable)"
        )]
        set: Vec<String>,
    },
    #[command(about = "Run the HTTP preset service")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:7171", help = "Address to bind")]
        bind: SocketAddr,
    },
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PresetsCommand {
    #[command(about = "List preset names, optionally for one category")]
    List {
        #[arg(long, value_enum, help = "Limit the listing to one category")]
        category: Option<CategoryArg>,
    },
    #[command(about = "Print a preset's effective configuration")]
    Show {
        #[arg(value_enum, help = "Preset category")]
        category: CategoryArg,
        #[arg(help = "Preset name (exact)")]
        name: String,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CategoryArg {
    Printer,
    Filament,
    Process,
}

impl From<CategoryArg> for PresetCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Printer => PresetCategory::Printer,
            CategoryArg::Filament => PresetCategory::Filament,
            CategoryArg::Process => PresetCategory::Process,
        }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_status_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    let dirs = match cli.dir {
        Some(dir) => vec![dir],
        None => DirStore::default_search_dirs(),
    };

    match cli.command {
        Command::Presets { command } => match command {
            PresetsCommand::List { category } => {
                let store = open_store(dirs)?;
                let categories: Vec<PresetCategory> = match category {
                    Some(category) => vec![category.into()],
                    None => PresetCategory::ALL.to_vec(),
                };
                let mut document = serde_json::Map::new();
                for category in categories {
                    document.insert(
                        category.as_str().to_string(),
                        json!(store.names(category)?),
                    );
                }
                let document = serde_json::Value::Object(document);
                print_json(&document)
            }
            PresetsCommand::Show { category, name } => {
                let store = open_store(dirs)?;
                let config = store.preset_config(category.into(), &name)?;
                print_json(&config.to_json_value())
            }
        },
        Command::Compose {
            printer,
            filament,
            process,
            set,
        } => {
            let mut store = open_store(dirs)?;
            let request = PresetRequest {
                printer,
                filament,
                process,
            };
            let mut selection = Selection::default();
            let mut config = ConfigMap::new();
            resolve_presets(&mut store, &request, &mut selection, &mut config)?;
            for entry in &set {
                let (key, value) = parse_override(entry)?;
                config.set(key, ConfigValue::single(value));
            }
            print_json(&json!({
                "presets": {
                    "printer": selection.printer,
                    "filament": selection.filament,
                    "process": selection.process,
                },
                "config": config.to_json_value(),
            }))
        }
        Command::Serve { bind } => {
            let config = serve::ServeConfig {
                bind,
                preset_dirs: dirs,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "slicekit", &mut io::stdout());
            Ok(())
        }
    }
}

fn open_store(dirs: Vec<PathBuf>) -> Result<DirStore, Error> {
    let mut store = DirStore::with_roots(dirs);
    store.initialize()?;
    Ok(store)
}

fn parse_override(entry: &str) -> Result<(String, String), Error> {
    let Some((key, value)) = entry.split_once('=') else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("--set takes KEY=VALUE, got {entry:?}")));
    };
    if key.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("--set key is empty"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn print_json(document: &serde_json::Value) -> Result<(), Error> {
    let text = serde_json::to_string_pretty(document).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to render document")
            .with_source(err)
    })?;
    println!("{text}");
    Ok(())
}

fn emit_error(err: &Error) {
    let value = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.message().unwrap_or("error"),
            "preset": err.preset(),
            "path": err.path().map(|path| path.to_string_lossy().to_string()),
        }
    });
    let text = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{text}");
}
