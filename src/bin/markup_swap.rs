//! Convert one bid drawing into a deployment drawing.
//!
//! Usage:
//!   markup_swap <input.pdf> <output.pdf> [--mapping FILE] [--layers FILE]
//!                                        [--icons DIR] [--overrides FILE]
//!
//! Defaults come from `MARKUP_SWAP_*` environment variables. The conversion
//! summary is printed as JSON on success.

use markup_swap::config::ConverterConfig;
use markup_swap::pipeline::Converter;
use std::path::PathBuf;
use std::process::ExitCode;

struct Args {
    input: PathBuf,
    output: PathBuf,
    config: ConverterConfig,
}

fn usage() -> String {
    "usage: markup_swap <input.pdf> <output.pdf> [--mapping FILE] [--layers FILE] [--icons DIR] [--overrides FILE]"
        .to_string()
}

impl Args {
    fn parse() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut config = ConverterConfig::from_env();
        let mut positional = Vec::new();

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--mapping" | "--layers" | "--icons" | "--overrides" => {
                    i += 1;
                    let value = args.get(i).ok_or_else(|| format!("{} needs a value", flag))?;
                    config = match flag {
                        "--mapping" => config.with_mapping_file(value),
                        "--layers" => config.with_layer_reference(value),
                        "--icons" => config.with_gear_icons_dir(value),
                        _ => config.with_icon_overrides(value),
                    };
                },
                "--help" | "-h" => return Err(usage()),
                other if other.starts_with("--") => return Err(format!("unknown option {}\n{}", other, usage())),
                other => positional.push(PathBuf::from(other)),
            }
            i += 1;
        }

        match <[PathBuf; 2]>::try_from(positional) {
            Ok([input, output]) => Ok(Self { input, output, config }),
            Err(_) => Err(usage()),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::parse() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        },
    };

    let result = Converter::new(args.config).and_then(|c| c.convert_file(&args.input, &args.output));
    match result {
        Ok(summary) => {
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{}", json),
                Err(e) => log::warn!("Could not serialize summary: {}", e),
            }
            ExitCode::SUCCESS
        },
        Err(e) => {
            log::error!("Conversion of {} failed: {}", args.input.display(), e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        },
    }
}
