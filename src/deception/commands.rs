//! Registry of built-in command simulators.
//!
//! Each built-in only ever touches the session's [`VirtualFs`](super::filesystem::VirtualFs)
//! and the fact generator; nothing here reaches the host system.

pub mod files;
pub mod network;
pub mod system;

use crate::deception::interpreter::{CommandContext, CommandError, CommandOutput};
use crate::deception::parser::Invocation;

pub type Builtin = fn(&mut CommandContext<'_>, &Invocation) -> Result<CommandOutput, CommandError>;

pub fn lookup(name: &str) -> Option<Builtin> {
    let builtin: Builtin = match name {
        "ls" => files::ls,
        "cat" => files::cat,
        "head" => files::head,
        "tail" => files::tail,
        "grep" => files::grep,
        "cd" => files::cd,
        "pwd" => files::pwd,
        "mkdir" => files::mkdir,
        "rmdir" => files::rmdir,
        "rm" => files::rm,
        "cp" => files::cp,
        "mv" => files::mv,
        "touch" => files::touch,
        "chmod" | "chown" => files::change_attributes,
        "whoami" => system::whoami,
        "id" => system::id,
        "echo" => system::echo,
        "ps" => system::ps,
        "uname" => system::uname,
        "hostname" => system::hostname,
        "uptime" => system::uptime,
        "free" => system::free,
        "df" => system::df,
        "date" => system::date,
        "history" => system::history,
        "which" => system::which,
        "apt" | "apt-get" => system::apt,
        "service" | "systemctl" => system::service,
        "wget" => network::wget,
        "curl" => network::curl,
        "ifconfig" | "ip" => network::ifconfig,
        "netstat" => network::netstat,
        "ssh" => network::ssh,
        "scp" => network::scp,
        "nmap" => network::nmap,
        "git" => network::git,
        _ => return None,
    };
    Some(builtin)
}

/// Whether `which` should pretend the binary is installed.
pub fn is_installed(name: &str) -> bool {
    name == "sudo" || lookup(name).is_some()
}
