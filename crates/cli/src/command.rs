//! Parsing of console input lines.

use std::path::PathBuf;

use cutout_core::error::CoreError;
use cutout_core::options::OptionsEdit;

pub const HELP: &str = "\
Commands:
  upload <path>...        upload one or more images
  background <path>       upload a background picture and use it
  select <id|index>       make an uploaded image current
  set <key=value>...      change edit options
  options                 show the current options
  assets                  list uploaded images
  preview [path]          save the latest preview image
  mask [path]             save the mask from the latest upload
  compare <ratio>         move the before/after divider (0.05 - 0.95)
  export [all]            export the current image, or every image
  help                    show this text
  quit                    end the session";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Upload(Vec<PathBuf>),
    Background(PathBuf),
    Select(String),
    Set(Vec<OptionsEdit>),
    Options,
    Assets,
    Preview(Option<PathBuf>),
    Mask(Option<PathBuf>),
    Compare(f32),
    Export { all: bool },
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command '{0}'. Type 'help' for a list of commands")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Option(#[from] CoreError),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match name.to_ascii_lowercase().as_str() {
        "upload" | "u" => {
            if args.is_empty() {
                return Err(CommandError::Usage("upload <path>..."));
            }
            Command::Upload(args.iter().map(PathBuf::from).collect())
        }
        "background" | "bg" => match args.as_slice() {
            [path] => Command::Background(PathBuf::from(path)),
            _ => return Err(CommandError::Usage("background <path>")),
        },
        "select" => match args.as_slice() {
            [target] => Command::Select(target.to_string()),
            _ => return Err(CommandError::Usage("select <id|index>")),
        },
        "set" => {
            if args.is_empty() {
                return Err(CommandError::Usage("set <key=value>..."));
            }
            let edits = args
                .iter()
                .map(|arg| {
                    let (key, value) = arg
                        .split_once('=')
                        .ok_or(CommandError::Usage("set <key=value>..."))?;
                    Ok(OptionsEdit::parse(key, value)?)
                })
                .collect::<Result<Vec<_>, CommandError>>()?;
            Command::Set(edits)
        }
        "options" | "opts" => Command::Options,
        "assets" | "ls" => Command::Assets,
        "preview" => match args.as_slice() {
            [] => Command::Preview(None),
            [path] => Command::Preview(Some(PathBuf::from(path))),
            _ => return Err(CommandError::Usage("preview [path]")),
        },
        "mask" => match args.as_slice() {
            [] => Command::Mask(None),
            [path] => Command::Mask(Some(PathBuf::from(path))),
            _ => return Err(CommandError::Usage("mask [path]")),
        },
        "compare" => match args.as_slice() {
            [ratio] => Command::Compare(
                ratio
                    .parse()
                    .map_err(|_| CommandError::Usage("compare <ratio>"))?,
            ),
            _ => return Err(CommandError::Usage("compare <ratio>")),
        },
        "export" => match args.as_slice() {
            [] => Command::Export { all: false },
            ["all"] => Command::Export { all: true },
            _ => return Err(CommandError::Usage("export [all]")),
        },
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}
