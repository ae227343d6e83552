use regex::RegexBuilder;

use crate::deception::filesystem::FsError;
use crate::deception::interpreter::{CommandContext, CommandError, CommandOutput};
use crate::deception::parser::Invocation;

const DEFAULT_LINE_COUNT: usize = 10;

fn join_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

fn outcome(lines: Vec<String>, errors: Vec<String>) -> CommandOutput {
    let success = errors.is_empty();
    let mut all = lines;
    all.extend(errors);
    CommandOutput {
        output: all.join("\n"),
        success,
    }
}

pub fn ls(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let operand = inv.operands.first().map(String::as_str);
    let target = ctx.fs.resolve(operand.unwrap_or(""));

    if !ctx.fs.is_directory(&target) {
        return Ok(match (operand, ctx.fs.size_of(&target)) {
            (Some(name), Some(size)) if inv.has_flag('l') => {
                let stamp = ctx.facts.listing_timestamp();
                let user = ctx.fs.user();
                CommandOutput::ok(format!(
                    "-rw-r--r-- 1 {} {} {:>5} {} {}",
                    user, user, size, stamp, name
                ))
            }
            (Some(name), Some(_)) => CommandOutput::ok(name),
            _ => CommandOutput::fail(format!(
                "ls: cannot access '{}': No such file or directory",
                operand.unwrap_or(&target)
            )),
        });
    }

    let entries = ctx.fs.list(Some(&target), inv.has_flag('a'));
    if !inv.has_flag('l') {
        return Ok(CommandOutput::ok(entries.join("  ")));
    }

    let mut lines = Vec::with_capacity(entries.len());
    let mut total_blocks = 0;
    for name in &entries {
        let full = join_path(&target, name);
        let is_dir = ctx.fs.is_directory(&full);
        let (perms, links) = if is_dir {
            ("drwxr-xr-x", ctx.facts.directory_links())
        } else {
            ("-rw-r--r--", 1)
        };
        let size = ctx.fs.size_of(&full).unwrap_or(0);
        total_blocks += size / 512 + 1;
        let user = ctx.fs.user();
        lines.push(format!(
            "{} {} {} {} {:>5} {} {}",
            perms,
            links,
            user,
            user,
            size,
            ctx.facts.listing_timestamp(),
            name
        ));
    }
    lines.insert(0, format!("total {}", total_blocks));
    Ok(CommandOutput::ok(lines.join("\n")))
}

pub fn cat(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.operands.is_empty() {
        return Ok(match ctx.stdin {
            Some(input) => CommandOutput::ok(input),
            None => CommandOutput::fail("cat: missing file operand"),
        });
    }

    let mut pieces = Vec::new();
    let mut errors = Vec::new();
    for name in &inv.operands {
        match ctx.fs.read(name) {
            Ok(content) => pieces.push(content.trim_end_matches('\n').to_string()),
            Err(e) => errors.push(format!("cat: {}", e)),
        }
    }
    Ok(outcome(pieces, errors))
}

/// Splits `head`/`tail` arguments into a line count and the file operand.
fn line_selection<'i>(
    command: &str,
    inv: &'i Invocation,
) -> Result<(usize, Option<&'i str>), CommandOutput> {
    let invalid = |value: &str| {
        CommandOutput::fail(format!(
            "{}: invalid number of lines: '{}'",
            command, value
        ))
    };

    let mut count = DEFAULT_LINE_COUNT;
    let mut file = None;
    let mut args = inv.args.iter();
    while let Some(arg) = args.next() {
        if arg == "-n" {
            let value = args.next().map(String::as_str).unwrap_or("");
            count = value.parse().map_err(|_| invalid(value))?;
        } else if let Some(value) = arg.strip_prefix("-n") {
            count = value.parse().map_err(|_| invalid(value))?;
        } else if let Some(value) = arg.strip_prefix('-').filter(|v| !v.is_empty()) {
            if value.chars().all(|c| c.is_ascii_digit()) {
                count = value.parse().map_err(|_| invalid(value))?;
            }
        } else if file.is_none() {
            file = Some(arg.as_str());
        }
    }
    Ok((count, file))
}

fn read_lines(
    ctx: &CommandContext<'_>,
    command: &str,
    inv: &Invocation,
) -> Result<(usize, Vec<String>), CommandOutput> {
    let (count, file) = line_selection(command, inv)?;
    let Some(file) = file else {
        return Err(CommandOutput::fail(format!(
            "{}: error reading 'standard input'",
            command
        )));
    };
    let content = ctx.fs.read(file).map_err(|e| {
        let reason = match e {
            FsError::NotFound(path) => {
                format!("cannot open '{}' for reading: No such file or directory", path)
            }
            other => format!("error reading '{}'", other),
        };
        CommandOutput::fail(format!("{}: {}", command, reason))
    })?;
    Ok((count, content.lines().map(str::to_string).collect()))
}

pub fn head(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    Ok(match read_lines(ctx, "head", inv) {
        Ok((count, lines)) => CommandOutput::ok(
            lines.into_iter().take(count).collect::<Vec<_>>().join("\n"),
        ),
        Err(failure) => failure,
    })
}

pub fn tail(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    Ok(match read_lines(ctx, "tail", inv) {
        Ok((count, lines)) => {
            let skip = lines.len().saturating_sub(count);
            CommandOutput::ok(lines[skip..].join("\n"))
        }
        Err(failure) => failure,
    })
}

pub fn grep(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.operands.len() < 2 {
        return Ok(CommandOutput::fail(
            "usage: grep [OPTION]... PATTERN [FILE]...",
        ));
    }
    let pattern = &inv.operands[0];
    let files = &inv.operands[1..];

    let source = if inv.has_flag('E') {
        pattern.clone()
    } else {
        regex::escape(pattern)
    };
    let matcher = match RegexBuilder::new(&source)
        .case_insensitive(inv.has_flag('i'))
        .build()
    {
        Ok(re) => re,
        Err(_) => {
            return Ok(CommandOutput::fail(
                "grep: Invalid regular expression",
            ))
        }
    };
    let invert = inv.has_flag('v');

    let mut matches = Vec::new();
    let mut errors = Vec::new();
    for file in files {
        let content = match ctx.fs.read(file) {
            Ok(content) => content,
            Err(e) => {
                errors.push(format!("grep: {}", e));
                continue;
            }
        };
        for line in content.lines() {
            if matcher.is_match(line) != invert {
                if files.len() > 1 {
                    matches.push(format!("{}:{}", file, line));
                } else {
                    matches.push(line.to_string());
                }
            }
        }
    }

    let found = !matches.is_empty();
    let mut result = outcome(matches, errors);
    result.success = result.success && found;
    Ok(result)
}

pub fn cd(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let home = ctx.fs.home().to_string();
    let target = inv.operands.first().map(String::as_str).unwrap_or(&home);
    if ctx.fs.change_directory(target) {
        return Ok(CommandOutput::empty());
    }
    let reason = if ctx.fs.exists(target) {
        "Not a directory"
    } else {
        "No such file or directory"
    };
    Ok(CommandOutput::fail(format!(
        "{}: cd: {}: {}",
        ctx.shell_name, target, reason
    )))
}

pub fn pwd(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    Ok(CommandOutput::ok(ctx.fs.current_directory()))
}

pub fn mkdir(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.operands.is_empty() {
        return Ok(CommandOutput::fail("mkdir: missing operand"));
    }
    let errors = inv
        .operands
        .iter()
        .filter(|dir| !ctx.fs.mkdir(dir))
        .map(|dir| format!("mkdir: cannot create directory '{}': File exists", dir))
        .collect();
    Ok(outcome(Vec::new(), errors))
}

pub fn rmdir(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.operands.is_empty() {
        return Ok(CommandOutput::fail("rmdir: missing operand"));
    }
    let mut errors = Vec::new();
    for dir in &inv.operands {
        let reason = if !ctx.fs.exists(dir) {
            Some("No such file or directory")
        } else if !ctx.fs.is_directory(dir) {
            Some("Not a directory")
        } else if !ctx.fs.remove(dir, false) {
            Some("Directory not empty")
        } else {
            None
        };
        if let Some(reason) = reason {
            errors.push(format!("rmdir: failed to remove '{}': {}", dir, reason));
        }
    }
    Ok(outcome(Vec::new(), errors))
}

pub fn rm(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let recursive = inv.has_flag('r') || inv.has_flag('R') || inv.has_long_flag("recursive");
    let force = inv.has_flag('f') || inv.has_long_flag("force");
    if inv.operands.is_empty() {
        return Ok(if force {
            CommandOutput::empty()
        } else {
            CommandOutput::fail("rm: missing operand")
        });
    }

    let mut errors = Vec::new();
    for target in &inv.operands {
        if ctx.fs.resolve(target) == "/" {
            errors.push(
                "rm: it is dangerous to operate recursively on '/'\nrm: use --no-preserve-root to override this failsafe"
                    .to_string(),
            );
            continue;
        }
        let reason = if ctx.fs.is_directory(target) && !recursive {
            Some("Is a directory")
        } else if ctx.fs.is_system_file(target) {
            Some("Permission denied")
        } else if !ctx.fs.exists(target) {
            (!force).then_some("No such file or directory")
        } else if !ctx.fs.remove(target, recursive) {
            Some("Permission denied")
        } else {
            None
        };
        if let Some(reason) = reason {
            errors.push(format!("rm: cannot remove '{}': {}", target, reason));
        }
    }
    Ok(outcome(Vec::new(), errors))
}

fn transfer(
    ctx: &mut CommandContext<'_>,
    inv: &Invocation,
    command: &str,
) -> Result<CommandOutput, CommandError> {
    let (src, dst) = match inv.operands.as_slice() {
        [] => return Ok(CommandOutput::fail(format!("{}: missing file operand", command))),
        [src] => {
            return Ok(CommandOutput::fail(format!(
                "{}: missing destination file operand after '{}'",
                command, src
            )))
        }
        [src, dst, ..] => (src, dst),
    };

    if ctx.fs.is_directory(src) {
        return Ok(CommandOutput::fail(if command == "cp" {
            format!("cp: -r not specified; omitting directory '{}'", src)
        } else {
            format!("mv: cannot move '{}': Device or resource busy", src)
        }));
    }

    let done = if command == "cp" {
        ctx.fs.copy(src, dst)
    } else {
        ctx.fs.move_path(src, dst)
    };
    Ok(if done {
        CommandOutput::empty()
    } else {
        CommandOutput::fail(format!(
            "{}: cannot stat '{}': No such file or directory",
            command, src
        ))
    })
}

pub fn cp(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    transfer(ctx, inv, "cp")
}

pub fn mv(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    transfer(ctx, inv, "mv")
}

pub fn touch(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.operands.is_empty() {
        return Ok(CommandOutput::fail("touch: missing file operand"));
    }
    let mut errors = Vec::new();
    for file in &inv.operands {
        if ctx.fs.exists(file) {
            continue;
        }
        if let Err(e) = ctx.fs.write(file, "") {
            errors.push(format!("touch: cannot touch {}", e));
        }
    }
    Ok(outcome(Vec::new(), errors))
}

/// `chmod` and `chown`: validates targets, changes nothing.
pub fn change_attributes(
    ctx: &mut CommandContext<'_>,
    inv: &Invocation,
) -> Result<CommandOutput, CommandError> {
    let command = inv.name.as_str();
    let Some((_, targets)) = inv.operands.split_first().filter(|(_, t)| !t.is_empty()) else {
        return Ok(CommandOutput::fail(format!("{}: missing operand", command)));
    };
    let errors = targets
        .iter()
        .filter(|t| !ctx.fs.exists(t))
        .map(|t| format!("{}: cannot access '{}': No such file or directory", command, t))
        .collect();
    Ok(outcome(Vec::new(), errors))
}

#[cfg(test)]
mod tests {
    use crate::deception::facts::SampledFacts;
    use crate::deception::filesystem::VirtualFs;
    use crate::deception::interpreter::{CommandInterpreter, CommandOutput};
    use chrono::{TimeZone, Utc};

    struct Shell {
        interp: CommandInterpreter,
        fs: VirtualFs,
        facts: SampledFacts,
    }

    impl Shell {
        fn new() -> Self {
            let clock = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
            Self {
                interp: CommandInterpreter::default(),
                fs: VirtualFs::default(),
                facts: SampledFacts::seeded(9, clock),
            }
        }

        fn run(&mut self, line: &str) -> CommandOutput {
            self.interp.execute(line, &mut self.fs, &mut self.facts)
        }
    }

    #[test]
    fn test_ls_variants() {
        let mut sh = Shell::new();
        assert_eq!(
            sh.run("ls -a").output,
            ".bash_history  README.txt  passwords.txt"
        );
        assert_eq!(sh.run("ls /var/www").output, "config.php  index.html");
        let long = sh.run("ls -l /etc/ssh").output;
        assert!(long.starts_with("total 1\n-rw-r--r-- 1 root root"));
        assert!(long.ends_with("sshd_config"));
        let missing = sh.run("ls /nowhere");
        assert_eq!(
            missing,
            CommandOutput::fail("ls: cannot access '/nowhere': No such file or directory")
        );
        assert_eq!(sh.run("ls README.txt").output, "README.txt");
    }

    #[test]
    fn test_cat_multiple_with_error() {
        let mut sh = Shell::new();
        let out = sh.run("cat /etc/hostname nothere");
        assert!(!out.success);
        assert_eq!(
            out.output,
            "ubuntu-server\ncat: nothere: No such file or directory"
        );
        assert_eq!(sh.run("cat").output, "cat: missing file operand");
        assert_eq!(sh.run("cat /tmp").output, "cat: /tmp: Is a directory");
    }

    #[test]
    fn test_head_and_tail_counts() {
        let mut sh = Shell::new();
        assert_eq!(sh.run("head -n 1 .bash_history").output, "ls");
        assert_eq!(sh.run("head -2 .bash_history").output, "ls\ncat README.txt");
        assert_eq!(sh.run("tail -n1 .bash_history").output, "whoami");
        assert_eq!(
            sh.run("tail -n x .bash_history").output,
            "tail: invalid number of lines: 'x'"
        );
        assert!(!sh.run("head").success);
    }

    #[test]
    fn test_grep_flags() {
        let mut sh = Shell::new();
        assert_eq!(sh.run("grep ROOT passwords.txt").output, "");
        assert_eq!(sh.run("grep -i ROOT passwords.txt").output, "root:toor");
        assert_eq!(
            sh.run("grep -v root passwords.txt").output,
            "admin:password123\nuser:123456"
        );
        assert_eq!(sh.run("grep -E '^(root|user):' passwords.txt").output, "root:toor\nuser:123456");
        assert_eq!(sh.run("grep 'a.m' passwords.txt").output, "");
        assert!(!sh.run("grep -E '(' passwords.txt").success);
    }

    #[test]
    fn test_cd_and_pwd() {
        let mut sh = Shell::new();
        assert!(sh.run("cd /var/www").success);
        assert_eq!(sh.run("pwd").output, "/var/www");
        assert_eq!(
            sh.run("cd index.html").output,
            "bash: cd: index.html: Not a directory"
        );
        assert_eq!(
            sh.run("cd /nope").output,
            "bash: cd: /nope: No such file or directory"
        );
        sh.run("cd");
        assert_eq!(sh.run("pwd").output, "/home/user");
    }

    #[test]
    fn test_rm_messages() {
        let mut sh = Shell::new();
        sh.run("mkdir -p stuff/inner");
        assert_eq!(
            sh.run("rm stuff").output,
            "rm: cannot remove 'stuff': Is a directory"
        );
        assert!(sh.run("rm -rf stuff").success);
        assert!(!sh.fs.exists("stuff"));
        assert_eq!(
            sh.run("rm /etc/passwd").output,
            "rm: cannot remove '/etc/passwd': Permission denied"
        );
        assert!(sh.run("rm -f ghost").success);
        assert!(!sh.run("rm ghost").success);
        assert!(sh.run("rm -rf /").output.starts_with("rm: it is dangerous"));
    }

    #[test]
    fn test_rmdir_requires_empty() {
        let mut sh = Shell::new();
        sh.run("mkdir a/b");
        assert_eq!(
            sh.run("rmdir a").output,
            "rmdir: failed to remove 'a': Directory not empty"
        );
        assert!(sh.run("rmdir a/b").success);
        assert!(sh.run("rmdir a").success);
    }

    #[test]
    fn test_cp_mv_touch() {
        let mut sh = Shell::new();
        assert!(sh.run("cp /etc/shadow /tmp/").success);
        assert!(sh.fs.exists("/tmp/shadow"));
        assert_eq!(
            sh.run("cp nothing here").output,
            "cp: cannot stat 'nothing': No such file or directory"
        );
        assert_eq!(
            sh.run("mv README.txt").output,
            "mv: missing destination file operand after 'README.txt'"
        );
        assert!(sh.run("mv README.txt /tmp/r.txt").success);
        assert!(!sh.fs.exists("README.txt"));

        sh.run("echo keep > k.txt");
        sh.run("touch k.txt fresh.txt");
        assert_eq!(sh.fs.read("k.txt").unwrap(), "keep\n");
        assert_eq!(sh.fs.read("fresh.txt").unwrap(), "");
    }

    #[test]
    fn test_chmod_checks_targets() {
        let mut sh = Shell::new();
        assert!(sh.run("chmod +x README.txt").success);
        assert!(sh.run("chown -R www-data /var/www").success);
        assert_eq!(sh.run("chmod 777").output, "chmod: missing operand");
        assert_eq!(
            sh.run("chmod 777 ghost").output,
            "chmod: cannot access 'ghost': No such file or directory"
        );
    }
}
