//! Sample vs full run selection.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::args::RunArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Sample(usize),
    Full,
}

impl RunMode {
    /// Mode given on the command line, if any.
    pub fn from_args(args: &RunArgs) -> Result<Option<Self>> {
        match (args.sample, args.full) {
            (Some(0), _) => bail!("sample size must be at least 1"),
            (Some(count), _) => Ok(Some(RunMode::Sample(count))),
            (None, true) => Ok(Some(RunMode::Full)),
            (None, false) => Ok(None),
        }
    }

    pub fn output_file_name(self) -> &'static str {
        match self {
            RunMode::Sample(_) => "name_transliterations_sample.csv",
            RunMode::Full => "name_transliterations_full.csv",
        }
    }

    pub fn sample(self) -> Option<usize> {
        match self {
            RunMode::Sample(count) => Some(count),
            RunMode::Full => None,
        }
    }

    pub fn default_output(self, output_dir: PathBuf) -> PathBuf {
        output_dir.join(self.output_file_name())
    }
}

/// Ask the operator which mode to run.
pub fn prompt_mode<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<RunMode> {
    write!(output, "Run on sample (s) or full dataset (f)? ")?;
    output.flush()?;
    let choice = read_line(input)?;

    match choice.to_ascii_lowercase().as_str() {
        "s" => {
            write!(output, "Enter sample size: ")?;
            output.flush()?;
            let raw = read_line(input)?;
            match raw.parse::<usize>() {
                Ok(count) if count > 0 => Ok(RunMode::Sample(count)),
                _ => bail!("invalid sample size '{raw}'"),
            }
        }
        "f" => Ok(RunMode::Full),
        other => bail!("invalid choice '{other}', expected 's' or 'f'"),
    }
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("no input received");
    }
    Ok(line.trim().to_string())
}
