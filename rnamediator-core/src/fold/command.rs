//! Folding through the ViennaRNA command line programs.
//!
//! Every call runs in its own temporary directory: the sequence goes to stdin,
//! constraints are passed as a `--commands` file and the result files written
//! by the program are parsed back.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::config::FoldingParameters;
use crate::constraint::{self, CommandFile};
use crate::fold::FoldingBackend;
use crate::fold::result::{BasePair, WholeFold};
use crate::profile::ProfileArray;
use crate::sequence::Sequence;
use crate::types::{Constraint, MediatorError, Result};

const COMMAND_FILE: &str = "constraints.txt";
const PLFOLD_OUTPUT: &str = "sequence_0001_lunp";
const DOT_PLOT: &str = "sequence_0001_dp.ps";

/// Backend calling `RNAplfold` and `RNAfold`.
#[derive(Debug, Clone)]
pub struct CommandLineBackend {
    rnaplfold: PathBuf,
    rnafold: PathBuf,
}

impl Default for CommandLineBackend {
    fn default() -> Self {
        Self::new("RNAplfold", "RNAfold")
    }
}

fn failure(message: impl Into<String>) -> MediatorError {
    MediatorError::EngineInvocationFailure(message.into())
}

/// Writes `sequence` to the standard input of `program`.
fn feed<W: Write>(mut input: W, sequence: &Sequence, program: &Path) -> Result<()> {
    writeln!(input, "{sequence}")
        .and_then(|()| input.flush())
        .map_err(|e| failure(format!("cannot pass sequence to {}: {e}", program.display())))
}

impl CommandLineBackend {
    pub fn new(rnaplfold: impl Into<PathBuf>, rnafold: impl Into<PathBuf>) -> Self {
        Self {
            rnaplfold: rnaplfold.into(),
            rnafold: rnafold.into(),
        }
    }

    /// Whether both programs can be started.
    pub fn is_available(&self) -> bool {
        [&self.rnaplfold, &self.rnafold].iter().all(|program| {
            Command::new(program)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok_and(|s| s.success())
        })
    }

    /// Writes the command file for `constraint` into `dir` and returns the
    /// arguments pointing to it.
    fn constraint_args(
        dir: &Path,
        sequence: &Sequence,
        constraint: Option<&Constraint>,
    ) -> Result<Vec<String>> {
        let Some(c) = constraint else {
            return Ok(Vec::new());
        };
        let mut commands = CommandFile::new();
        constraint::apply(&mut commands, c, sequence.len())?;
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        fs::write(dir.join(COMMAND_FILE), commands.render())?;
        Ok(vec!["--commands".to_string(), COMMAND_FILE.to_string()])
    }

    fn run(program: &Path, args: &[String], dir: &Path, sequence: &Sequence) -> Result<String> {
        debug!(program = %program.display(), ?args, "Starting folding program");
        let mut child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failure(format!("cannot start {}: {e}", program.display())))?;

        if let Some(stdin) = child.stdin.take() {
            feed(stdin, sequence, program)?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| failure(format!("lost {}: {e}", program.display())))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(failure(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            warn!(program = %program.display(), "{}", stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Ensemble free energy from `RNAfold -p` output, the value in square brackets.
///
/// # Errors
///
/// Returns [`MediatorError::EngineInvocationFailure`] if no such line exists.
pub fn parse_ensemble_energy(stdout: &str) -> Result<f64> {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| line.ends_with(']'))
        .find_map(|line| {
            let open = line.rfind('[')?;
            line[open + 1..line.len() - 1].trim().parse().ok()
        })
        .ok_or_else(|| failure("no ensemble energy in RNAfold output"))
}

/// Pair probabilities from the `ubox` entries of a dot plot.
///
/// The plot stores `sqrt(p)`; the returned probabilities are squared back.
pub fn parse_dot_plot(text: &str) -> Vec<BasePair> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [i, j, sqrt_p, "ubox"] => Some(BasePair {
                    i: i.parse().ok()?,
                    j: j.parse().ok()?,
                    probability: sqrt_p.parse::<f64>().ok()?.powi(2),
                }),
                _ => None,
            }
        })
        .collect()
}

impl FoldingBackend for CommandLineBackend {
    fn name(&self) -> &'static str {
        "RNAplfold/RNAfold"
    }

    fn windowed_fold(
        &self,
        sequence: &Sequence,
        params: &FoldingParameters,
        constraint: Option<&Constraint>,
    ) -> Result<ProfileArray> {
        let dir = tempfile::tempdir()?;
        let mut args = vec![
            "-W".to_string(),
            params.window.to_string(),
            "-L".to_string(),
            params.span.to_string(),
            "-u".to_string(),
            params.region.to_string(),
            "-T".to_string(),
            params.temperature.to_string(),
            "--auto-id".to_string(),
        ];
        args.extend(Self::constraint_args(dir.path(), sequence, constraint)?);
        Self::run(&self.rnaplfold, &args, dir.path(), sequence)?;

        ProfileArray::read_text_file(&dir.path().join(PLFOLD_OUTPUT)).map_err(|e| match e {
            MediatorError::IoError(io) => failure(format!("RNAplfold left no profile: {io}")),
            other => failure(other.to_string()),
        })
    }

    fn whole_fold(
        &self,
        sequence: &Sequence,
        span: usize,
        temperature: f64,
        constraint: Option<&Constraint>,
    ) -> Result<WholeFold> {
        let dir = tempfile::tempdir()?;
        let mut args = vec![
            "-p".to_string(),
            "--noPS".to_string(),
            "--maxBPspan".to_string(),
            span.to_string(),
            "-T".to_string(),
            temperature.to_string(),
            "--auto-id".to_string(),
        ];
        args.extend(Self::constraint_args(dir.path(), sequence, constraint)?);
        let stdout = Self::run(&self.rnafold, &args, dir.path(), sequence)?;

        let gibbs = parse_ensemble_energy(&stdout)?;
        let plot = fs::read_to_string(dir.path().join(DOT_PLOT))
            .map_err(|e| failure(format!("RNAfold left no dot plot: {e}")))?;
        Ok(WholeFold {
            gibbs,
            pairs: parse_dot_plot(&plot),
        })
    }
}
