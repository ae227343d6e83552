use crate::deception::commands::is_installed;
use crate::deception::interpreter::{CommandContext, CommandError, CommandOutput};
use crate::deception::parser::Invocation;

pub const KERNEL_RELEASE: &str = "4.15.0-20-generic";
const KERNEL_VERSION: &str = "#21-Ubuntu SMP Tue Apr 24 08:16:15 UTC 2018";
const MACHINE: &str = "x86_64";
const PS_HEADER: &str =
    "USER       PID %CPU %MEM    VSZ   RSS TTY      STAT START   TIME COMMAND";

pub fn whoami(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    Ok(CommandOutput::ok(ctx.fs.user()))
}

pub fn id(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let user = ctx.fs.user();
    let uid = if user == "root" { 0 } else { 1000 };
    Ok(CommandOutput::ok(format!(
        "uid={uid}({user}) gid={uid}({user}) groups={uid}({user})"
    )))
}

pub fn echo(_ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let words: Vec<&str> = inv
        .args
        .iter()
        .map(String::as_str)
        .skip_while(|a| matches!(*a, "-n" | "-e" | "-E"))
        .collect();
    Ok(CommandOutput::ok(words.join(" ")))
}

pub fn ps(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let mut rows = vec![PS_HEADER];
    rows.extend(ctx.facts.process_table());
    Ok(CommandOutput::ok(rows.join("\n")))
}

pub fn uname(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.has_flag('a') || inv.has_long_flag("all") {
        return Ok(CommandOutput::ok(format!(
            "Linux {} {} {} {m} {m} {m} GNU/Linux",
            ctx.fs.hostname(),
            KERNEL_RELEASE,
            KERNEL_VERSION,
            m = MACHINE
        )));
    }

    let mut parts = Vec::new();
    let selected = ['n', 'r', 'v', 'm'].iter().any(|f| inv.has_flag(*f));
    if inv.has_flag('s') || !selected {
        parts.push("Linux");
    }
    if inv.has_flag('n') {
        parts.push(ctx.fs.hostname());
    }
    if inv.has_flag('r') {
        parts.push(KERNEL_RELEASE);
    }
    if inv.has_flag('v') {
        parts.push(KERNEL_VERSION);
    }
    if inv.has_flag('m') {
        parts.push(MACHINE);
    }
    Ok(CommandOutput::ok(parts.join(" ")))
}

pub fn hostname(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.has_flag('f') || inv.has_long_flag("fqdn") {
        Ok(CommandOutput::ok(format!("{}.local", ctx.fs.hostname())))
    } else {
        Ok(CommandOutput::ok(ctx.fs.hostname()))
    }
}

pub fn uptime(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let now = ctx.facts.now();
    let up = ctx.facts.uptime();
    let users = if up.users == 1 { "user" } else { "users" };
    Ok(CommandOutput::ok(format!(
        " {} up {} days, {:02}:{:02},  {} {},  load average: {:.2}, {:.2}, {:.2}",
        now.format("%H:%M:%S"),
        up.days,
        up.hours,
        up.minutes,
        up.users,
        users,
        up.load[0],
        up.load[1],
        up.load[2]
    )))
}

pub fn free(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let m = ctx.facts.memory();
    let lines = [
        format!(
            "{:<7}{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}",
            "", "total", "used", "free", "shared", "buff/cache", "available"
        ),
        format!(
            "{:<7}{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}",
            "Mem:", m.total, m.used, m.free, m.shared, m.buff_cache, m.available
        ),
        format!(
            "{:<7}{:>12}{:>12}{:>12}",
            "Swap:", m.swap_total, m.swap_used, m.swap_free
        ),
    ];
    Ok(CommandOutput::ok(lines.join("\n")))
}

pub fn df(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let mut lines = vec!["Filesystem     1K-blocks    Used Available Use% Mounted on".to_string()];
    for disk in ctx.facts.disks() {
        lines.push(format!(
            "{:<14}{:>11}{:>8}{:>10}{:>4}% {}",
            disk.filesystem,
            disk.blocks,
            disk.used,
            disk.available,
            disk.use_percent(),
            disk.mounted_on
        ));
    }
    Ok(CommandOutput::ok(lines.join("\n")))
}

pub fn date(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let now = ctx.facts.now();
    Ok(CommandOutput::ok(
        now.format("%a %b %e %H:%M:%S UTC %Y").to_string(),
    ))
}

/// Seeded `.bash_history` followed by the lines typed in this session.
pub fn history(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let seeded = ctx.fs.read("~/.bash_history").unwrap_or_default();
    let lines: Vec<String> = seeded
        .lines()
        .map(str::to_string)
        .chain(ctx.fs.history().iter().cloned())
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, l)| format!(" {:>4}  {}", i + 1, l))
        .collect();
    Ok(CommandOutput::ok(lines.join("\n")))
}

pub fn which(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let mut found = Vec::new();
    let mut all_found = true;
    for name in &inv.operands {
        if is_installed(name) {
            found.push(format!("{}/{}", ctx.facts.binary_directory(), name));
        } else {
            all_found = false;
        }
    }
    Ok(CommandOutput {
        output: found.join("\n"),
        success: all_found,
    })
}

pub fn apt(_ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let Some(sub) = inv.operands.first() else {
        return Ok(CommandOutput::ok(
            "apt 1.6.12 (amd64)\nUsage: apt [options] command",
        ));
    };
    Ok(match sub.as_str() {
        "update" => CommandOutput::ok(
            "Hit:1 http://archive.ubuntu.com/ubuntu bionic InRelease\n\
             Get:2 http://security.ubuntu.com/ubuntu bionic-security InRelease [88.7 kB]\n\
             Fetched 88.7 kB in 1s (112 kB/s)\n\
             Reading package lists... Done",
        ),
        "upgrade" => CommandOutput::ok(
            "Reading package lists... Done\n\
             Building dependency tree\n\
             Calculating upgrade... Done\n\
             0 upgraded, 0 newly installed, 0 to remove and 0 not upgraded.",
        ),
        "install" if inv.operands.len() >= 2 => {
            let packages = inv.operands[1..].join(" ");
            CommandOutput::ok(format!(
                "Reading package lists... Done\n\
                 Building dependency tree\n\
                 The following NEW packages will be installed:\n  {}\n\
                 0 upgraded, {} newly installed, 0 to remove and 0 not upgraded.",
                packages,
                inv.operands.len() - 1
            ))
        }
        "install" | "remove" | "purge" => CommandOutput::ok(
            "Reading package lists... Done\n0 upgraded, 0 newly installed, 0 to remove and 0 not upgraded.",
        ),
        other => CommandOutput::fail(format!("E: Invalid operation {}", other)),
    })
}

/// `service NAME ACTION` and `systemctl ACTION NAME`.
pub fn service(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let (unit, action) = match (inv.name.as_str(), inv.operands.as_slice()) {
        ("service", [unit, action, ..]) => (unit, action),
        ("systemctl", [action, unit, ..]) => (unit, action),
        _ => return Ok(CommandOutput::empty()),
    };
    let unit = unit.trim_end_matches(".service");

    Ok(match action.as_str() {
        "status" => {
            let since = ctx.facts.now().format("%a %Y-%m-%d %H:%M:%S UTC");
            CommandOutput::ok(format!(
                "\u{25CF} {unit}.service - {unit} Service\n   \
                 Loaded: loaded (/lib/systemd/system/{unit}.service; enabled; vendor preset: enabled)\n   \
                 Active: active (running) since {since}; 2 days ago\n \
                 Main PID: {pid} ({unit})",
                unit = unit,
                since = since,
                pid = ctx.facts.service_pid()
            ))
        }
        _ => CommandOutput::empty(),
    })
}
