use std::fmt;

use log::{debug, trace};

use crate::deception::commands;
use crate::deception::facts::FactGenerator;
use crate::deception::filesystem::{FsError, VirtualFs};
use crate::deception::parser::{self, ParseError, Stage};

/// Nested command lines a single input may open through `sudo`.
const MAX_NESTING: usize = 8;
const SUDO_SPELLINGS: [&str; 3] = ["sudo", "'sudo'", "\"sudo\""];

/// Text produced by a command line plus its shell-level success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
        }
    }

    pub fn fail(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
        }
    }

    pub fn empty() -> Self {
        Self::ok(String::new())
    }
}

/// Failure inside the interpreter itself, as opposed to a command reporting an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Parse(ParseError),
    Filesystem(FsError),
    NestingTooDeep,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(e) => write!(f, "{}", e),
            CommandError::Filesystem(e) => write!(f, "{}", e),
            CommandError::NestingTooDeep => write!(f, "too many nested commands"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<ParseError> for CommandError {
    fn from(err: ParseError) -> Self {
        CommandError::Parse(err)
    }
}

impl From<FsError> for CommandError {
    fn from(err: FsError) -> Self {
        CommandError::Filesystem(err)
    }
}

/// Everything a built-in may look at or mutate.
pub struct CommandContext<'a> {
    pub fs: &'a mut VirtualFs,
    pub facts: &'a mut dyn FactGenerator,
    pub shell_name: &'a str,
    /// Output of the previous pipeline stage, if any.
    pub stdin: Option<&'a str>,
}

pub struct CommandInterpreter {
    shell_name: String,
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new("bash")
    }
}

impl CommandInterpreter {
    pub fn new(shell_name: &str) -> Self {
        Self {
            shell_name: shell_name.to_string(),
        }
    }

    /// Runs one input line against the session's filesystem.
    ///
    /// Never fails: parse errors and filesystem refusals become a generic
    /// shell error line with `success == false`.
    pub fn execute(
        &self,
        line: &str,
        fs: &mut VirtualFs,
        facts: &mut dyn FactGenerator,
    ) -> CommandOutput {
        let line = line.trim();
        if line.is_empty() {
            return CommandOutput::empty();
        }

        let result = match self.run_line(line, fs, facts, None, 0) {
            Ok(result) => result,
            Err(e) => {
                debug!("Interpreter rejected {:?}: {}", line, e);
                CommandOutput::fail(format!(
                    "{}: error executing command: {}",
                    self.shell_name, e
                ))
            }
        };

        CommandOutput {
            output: result.output.trim_end_matches('\n').to_string(),
            success: result.success,
        }
    }

    fn run_line(
        &self,
        line: &str,
        fs: &mut VirtualFs,
        facts: &mut dyn FactGenerator,
        stdin: Option<&str>,
        depth: usize,
    ) -> Result<CommandOutput, CommandError> {
        if depth > MAX_NESTING {
            return Err(CommandError::NestingTooDeep);
        }
        let parsed = parser::parse(line)?;

        let mut last = CommandOutput::empty();
        let mut piped: Option<String> = stdin.map(str::to_string);
        for stage in &parsed.stages {
            last = self.run_stage(stage, fs, facts, piped.as_deref(), depth)?;
            piped = Some(last.output.clone());
        }

        let Some(target) = parsed.redirect else {
            return Ok(last);
        };

        // A failing command still reports to the terminal and leaves an empty file.
        let mut content = if last.success {
            last.output.trim_end_matches('\n').to_string()
        } else {
            String::new()
        };
        if !content.is_empty() {
            content.push('\n');
        }
        if let Err(e) = fs.write(&target, content) {
            return Ok(CommandOutput::fail(format!("{}: {}", self.shell_name, e)));
        }
        trace!("Redirected output to {}", target);
        if last.success {
            Ok(CommandOutput::empty())
        } else {
            Ok(last)
        }
    }

    fn run_stage(
        &self,
        stage: &Stage,
        fs: &mut VirtualFs,
        facts: &mut dyn FactGenerator,
        stdin: Option<&str>,
        depth: usize,
    ) -> Result<CommandOutput, CommandError> {
        let invocation = &stage.invocation;
        if invocation.name == "sudo" {
            let rest = strip_sudo(&stage.raw);
            if rest.is_empty() {
                return Ok(CommandOutput::ok("usage: sudo -h | -K | -k | -V"));
            }
            return self.run_line(rest, fs, facts, stdin, depth + 1);
        }

        match commands::lookup(&invocation.name) {
            Some(builtin) => {
                let mut ctx = CommandContext {
                    fs,
                    facts,
                    shell_name: &self.shell_name,
                    stdin,
                };
                builtin(&mut ctx, invocation)
            }
            None => Ok(CommandOutput::fail(format!(
                "{}: {}: command not found",
                self.shell_name, invocation.name
            ))),
        }
    }
}

/// Drops every leading `sudo` word, so `sudo sudo ls` is just `ls`.
fn strip_sudo(raw: &str) -> &str {
    let mut rest = raw.trim_start();
    loop {
        let stripped = SUDO_SPELLINGS.iter().find_map(|word| {
            rest.strip_prefix(word)
                .filter(|after| after.is_empty() || after.starts_with(char::is_whitespace))
        });
        match stripped {
            Some(after) => rest = after.trim_start(),
            None => return rest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deception::facts::SampledFacts;
    use chrono::{TimeZone, Utc};

    fn setup() -> (CommandInterpreter, VirtualFs, SampledFacts) {
        let clock = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        (
            CommandInterpreter::default(),
            VirtualFs::default(),
            SampledFacts::seeded(42, clock),
        )
    }

    #[test]
    fn test_ls_fresh_home() {
        let (interp, mut fs, mut facts) = setup();
        let out = interp.execute("ls", &mut fs, &mut facts);
        assert!(out.success);
        assert_eq!(out.output, "README.txt  passwords.txt");
        assert!(!out.output.contains('\n'));
    }

    #[test]
    fn test_cat_missing_file() {
        let (interp, mut fs, mut facts) = setup();
        let out = interp.execute("cat nofile.txt", &mut fs, &mut facts);
        assert!(!out.success);
        assert!(out.output.contains("No such file or directory"));
    }

    #[test]
    fn test_echo_redirect_then_cat() {
        let (interp, mut fs, mut facts) = setup();
        let out = interp.execute("echo hi > out.txt", &mut fs, &mut facts);
        assert_eq!(out, CommandOutput::ok(""));
        assert_eq!(fs.read("out.txt").unwrap(), "hi\n");
        let out = interp.execute("cat out.txt", &mut fs, &mut facts);
        assert_eq!(out, CommandOutput::ok("hi"));
    }

    #[test]
    fn test_double_redirect_overwrites() {
        let (interp, mut fs, mut facts) = setup();
        interp.execute("echo one > log", &mut fs, &mut facts);
        interp.execute("echo two >> log", &mut fs, &mut facts);
        assert_eq!(fs.read("log").unwrap(), "two\n");
    }

    #[test]
    fn test_failed_command_redirect_keeps_error() {
        let (interp, mut fs, mut facts) = setup();
        let out = interp.execute("cat nope > err.txt", &mut fs, &mut facts);
        assert!(!out.success);
        assert_eq!(fs.read("err.txt").unwrap(), "");
    }

    #[test]
    fn test_unknown_command() {
        let (interp, mut fs, mut facts) = setup();
        let out = interp.execute("frobnicate --now", &mut fs, &mut facts);
        assert_eq!(out, CommandOutput::fail("bash: frobnicate: command not found"));
    }

    #[test]
    fn test_internal_errors_are_contained() {
        let (interp, mut fs, mut facts) = setup();
        let out = interp.execute("echo 'open", &mut fs, &mut facts);
        assert!(!out.success);
        assert_eq!(
            out.output,
            "bash: error executing command: No closing quotation"
        );
        let out = interp.execute("echo hi >", &mut fs, &mut facts);
        assert!(out.output.starts_with("bash: error executing command:"));
    }

    #[test]
    fn test_only_cat_reads_pipe() {
        let (interp, mut fs, mut facts) = setup();
        let out = interp.execute("echo piped | cat", &mut fs, &mut facts);
        assert_eq!(out, CommandOutput::ok("piped"));
        let out = interp.execute("cat /etc/passwd | grep user", &mut fs, &mut facts);
        assert!(!out.success);
        assert!(out.output.starts_with("usage: grep"));
        let out = interp.execute("ls | wc", &mut fs, &mut facts);
        assert_eq!(out.output, "bash: wc: command not found");
    }

    #[test]
    fn test_sudo_runs_rest() {
        let (interp, mut fs, mut facts) = setup();
        assert_eq!(interp.execute("sudo whoami", &mut fs, &mut facts).output, "root");
        let out = interp.execute("sudo", &mut fs, &mut facts);
        assert!(out.success);
        assert!(out.output.starts_with("usage: sudo"));
        interp.execute("sudo mkdir /opt/x", &mut fs, &mut facts);
        assert!(fs.is_directory("/opt/x"));
    }

    #[test]
    fn test_sudo_keeps_pipe_input() {
        let (interp, mut fs, mut facts) = setup();
        let out = interp.execute("echo x | sudo cat", &mut fs, &mut facts);
        assert_eq!(out, CommandOutput::ok("x"));
        let out = interp.execute("echo y | sudo sudo cat > y.txt", &mut fs, &mut facts);
        assert!(out.success);
        assert_eq!(fs.read("y.txt").unwrap(), "y\n");
    }

    #[test]
    fn test_long_sudo_chain_on_small_stack() {
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let (interp, mut fs, mut facts) = setup();
                let line = format!("{}whoami", "sudo ".repeat(12_000));
                interp.execute(&line, &mut fs, &mut facts)
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), CommandOutput::ok("root"));
    }

    #[test]
    fn test_sudo_nesting_is_bounded() {
        let (interp, mut fs, mut facts) = setup();
        let line = format!("sudo {}whoami", "'sudo' \"sudo\" ".repeat(10));
        assert_eq!(interp.execute(&line, &mut fs, &mut facts).output, "root");

        // split quoting still names sudo but never shortens the line
        let out = interp.execute("s'udo' whoami", &mut fs, &mut facts);
        assert_eq!(
            out,
            CommandOutput::fail("bash: error executing command: too many nested commands")
        );
    }

    #[test]
    fn test_blank_line() {
        let (interp, mut fs, mut facts) = setup();
        assert_eq!(interp.execute("   ", &mut fs, &mut facts), CommandOutput::empty());
    }
}
