//! Driving the external RS-274 interpreter.
//!
//! The interpreter is a separate executable that reduces a G-code program
//! to canonical lines on stdout. The handshake is line-oriented: the tool
//! table path, then a `1` to start interpreting. Output is read with a
//! one-second ready-to-read timeout, retried a bounded number of times;
//! on any failure the load is aborted and the caller's previous state is
//! left untouched. Files already in canonical form (`.canon`) bypass the
//! subprocess.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use crate::canon::{parse_canon_lines, CanonicalLine};
use crate::status::MachineStatus;
use crate::{MotionError, Result};

/// Timeout for one ready-to-read wait on interpreter output.
const READY_TIMEOUT: Duration = Duration::from_secs(1);
/// How many consecutive timeouts are tolerated before giving up.
const MAX_WAITS: u32 = 100;

/// Handle to the external interpreter executable.
#[derive(Debug, Clone)]
pub struct Interpreter {
    binary: PathBuf,
    tool_table: PathBuf,
}

impl Interpreter {
    /// Create a driver for the given interpreter binary and tool table.
    pub fn new(binary: PathBuf, tool_table: PathBuf) -> Self {
        Self { binary, tool_table }
    }

    /// Interpret a program file into canonical lines.
    ///
    /// `.canon` files are parsed directly; anything else is piped through
    /// the interpreter subprocess.
    pub fn interpret_file(
        &self,
        program: &Path,
        initial: MachineStatus,
    ) -> Result<Vec<CanonicalLine>> {
        let is_canon = program
            .extension()
            .map(|e| e.eq_ignore_ascii_case("canon"))
            .unwrap_or(false);
        let lines = if is_canon {
            std::fs::read_to_string(program)?
                .lines()
                .map(str::to_string)
                .collect()
        } else {
            log::info!("interpreting {}", program.display());
            self.run_subprocess(program)?
        };
        parse_canon_lines(lines, initial)
    }

    /// Run the interpreter over `program` and collect its stdout lines.
    fn run_subprocess(&self, program: &Path) -> Result<Vec<String>> {
        let mut child = Command::new(&self.binary)
            .arg(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MotionError::Interpreter(format!("cannot start {}: {e}", self.binary.display()))
            })?;

        // handshake; best-effort, an interpreter that needs no input may
        // have closed stdin already
        if let Some(mut stdin) = child.stdin.take() {
            let _ = writeln!(stdin, "{}", self.tool_table.display());
            let _ = writeln!(stdin, "1");
        }

        let stdout = child.stdout.take().expect("stdout was piped");
        let (tx, rx) = mpsc::channel::<String>();
        let reader = std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut lines = Vec::new();
        let mut waits = 0u32;
        loop {
            match rx.recv_timeout(READY_TIMEOUT) {
                Ok(line) => {
                    waits = 0;
                    lines.push(line);
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    waits += 1;
                    if waits >= MAX_WAITS {
                        let _ = child.kill();
                        let _ = reader.join();
                        return Err(MotionError::InterpreterTimeout);
                    }
                    log::debug!("waiting for interpreter ({waits})");
                }
            }
        }
        let _ = reader.join();

        let status = child.wait()?;
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_string(&mut stderr);
            }
            return Err(MotionError::Interpreter(format!(
                "interpreter exited with {status}: {}",
                stderr.trim()
            )));
        }
        log::debug!("interpreter produced {} lines", lines.len());
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("swarf-interp-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_canon_file_bypasses_subprocess() {
        let path = temp_file(
            "direct.canon",
            "1 N1 STRAIGHT_FEED(1, 0, 0, 0, 0, 0)\n2 N2 PROGRAM_END()\n",
        );
        let interp = Interpreter::new(PathBuf::from("/nonexistent"), PathBuf::from("/nonexistent"));
        let lines = interp
            .interpret_file(&path, MachineStatus::default())
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].is_motion());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        let path = temp_file("prog.ngc", "G0 X1\n");
        let interp = Interpreter::new(
            PathBuf::from("/nonexistent/rs274"),
            PathBuf::from("/nonexistent/tooltable"),
        );
        let err = interp.interpret_file(&path, MachineStatus::default());
        assert!(matches!(err, Err(MotionError::Interpreter(_))));
        std::fs::remove_file(path).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_cat_as_interpreter() {
        // `cat <file>` echoes the canonical stream, standing in for the
        // real interpreter
        let program = temp_file(
            "echo.ngc",
            "1 N1 STRAIGHT_FEED(2, 0, 0, 0, 0, 0)\n2 N2 PROGRAM_END()\n",
        );
        let interp = Interpreter::new(PathBuf::from("cat"), PathBuf::from("/dev/null"));
        let lines = interp
            .interpret_file(&program, MachineStatus::default())
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].program_end);
        std::fs::remove_file(program).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_interpreter_aborts() {
        let program = temp_file("bad.ngc", "whatever\n");
        let interp = Interpreter::new(PathBuf::from("false"), PathBuf::from("/dev/null"));
        let err = interp.interpret_file(&program, MachineStatus::default());
        assert!(err.is_err());
        std::fs::remove_file(program).ok();
    }
}
