//! Plausible, varying system facts for the emulated host.
//!
//! Commands such as `ps`, `free` or `uptime` never report real values; they
//! format whatever a [`FactGenerator`] hands them. Production sessions use
//! [`SampledFacts::new`]; tests use [`SampledFacts::seeded`] for a fixed clock,
//! reproducible numbers and no response delay.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const BINARY_DIRECTORIES: [&str; 5] = ["/usr/bin", "/bin", "/usr/sbin", "/sbin", "/usr/local/bin"];

const PROCESSES: [&str; 7] = [
    "root         1  0.0  0.1  18560  1024 ?        Ss   10:00   0:00 /sbin/init",
    "root       234  0.0  0.3  35200  2400 ?        Ss   10:01   0:00 /usr/sbin/sshd -D",
    "www-data   512  0.0  0.5 120000  4000 ?        S    10:02   0:01 /usr/sbin/apache2 -k start",
    "user      1024  0.0  0.2  50000  2000 pts/0    Ss   10:03   0:00 -bash",
    "syslog    1025  0.0  0.1  30000  1500 ?        Ssl  10:04   0:00 /usr/sbin/rsyslogd -n",
    "mysql     1026  0.0  1.2 500000 12000 ?        Ssl  10:05   0:02 /usr/sbin/mysqld",
    "root      1027  0.0  0.2  45000  2200 ?        Ss   10:06   0:00 /usr/sbin/cron -f",
];

pub const MEMORY_TOTAL_KB: u64 = 1_017_692;
pub const SWAP_TOTAL_KB: u64 = 1_048_572;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uptime {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub users: u32,
    pub load: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub shared: u64,
    pub buff_cache: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskUsage {
    pub filesystem: &'static str,
    pub blocks: u64,
    pub used: u64,
    pub available: u64,
    pub mounted_on: &'static str,
}

impl DiskUsage {
    pub fn use_percent(&self) -> u64 {
        if self.blocks == 0 {
            0
        } else {
            (self.used * 100).div_ceil(self.blocks)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
}

/// Source of every value that would differ between two runs of a command.
pub trait FactGenerator: Send {
    fn now(&mut self) -> DateTime<Utc>;
    /// `ps aux` rows in pid order, without the header.
    fn process_table(&mut self) -> Vec<&'static str>;
    fn uptime(&mut self) -> Uptime;
    fn memory(&mut self) -> MemoryStats;
    fn disks(&mut self) -> Vec<DiskUsage>;
    fn interface_counters(&mut self) -> InterfaceCounters;
    /// Ephemeral port of a fake established peer connection.
    fn peer_port(&mut self) -> u16;
    fn binary_directory(&mut self) -> &'static str;
    fn download_size(&mut self) -> usize;
    /// Random suffix used to name downloads without a usable basename.
    fn download_suffix(&mut self) -> u32;
    /// `ls -l` modification stamp like `Mar  4 09:21`.
    fn listing_timestamp(&mut self) -> String;
    fn directory_links(&mut self) -> u32;
    fn service_pid(&mut self) -> u32;
    /// Pause applied before a command's output is written back.
    fn response_delay(&mut self) -> Duration;
}

pub struct SampledFacts {
    rng: StdRng,
    clock: Option<DateTime<Utc>>,
}

impl Default for SampledFacts {
    fn default() -> Self {
        Self::new()
    }
}

impl SampledFacts {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            clock: None,
        }
    }

    /// Reproducible facts with a frozen clock and no response delay.
    pub fn seeded(seed: u64, clock: DateTime<Utc>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            clock: Some(clock),
        }
    }
}

impl FactGenerator for SampledFacts {
    fn now(&mut self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn process_table(&mut self) -> Vec<&'static str> {
        let mut picked = rand::seq::index::sample(&mut self.rng, PROCESSES.len(), 5).into_vec();
        picked.sort_unstable();
        picked.into_iter().map(|i| PROCESSES[i]).collect()
    }

    fn uptime(&mut self) -> Uptime {
        Uptime {
            days: self.rng.gen_range(1..=30),
            hours: self.rng.gen_range(1..=23),
            minutes: self.rng.gen_range(10..=59),
            users: self.rng.gen_range(1..=3),
            load: [
                self.rng.gen_range(0.1..1.5),
                self.rng.gen_range(0.1..1.5),
                self.rng.gen_range(0.1..1.5),
            ],
        }
    }

    fn memory(&mut self) -> MemoryStats {
        let used = self.rng.gen_range(200_000..=500_000);
        let shared = self.rng.gen_range(10_000..=50_000);
        let buff_cache = self.rng.gen_range(100_000..=300_000);
        let free = MEMORY_TOTAL_KB - used - buff_cache;
        let swap_used = self.rng.gen_range(0..=100_000);
        MemoryStats {
            total: MEMORY_TOTAL_KB,
            used,
            free,
            shared,
            buff_cache,
            available: free + buff_cache - shared,
            swap_total: SWAP_TOTAL_KB,
            swap_used,
            swap_free: SWAP_TOTAL_KB - swap_used,
        }
    }

    fn disks(&mut self) -> Vec<DiskUsage> {
        let root_used = self.rng.gen_range(2_000_000..=5_000_000);
        let shm_blocks = self.rng.gen_range(500_000..=600_000);
        let shm_used = self.rng.gen_range(1_000..=50_000);
        let lock_used = self.rng.gen_range(0..=100);
        vec![
            DiskUsage {
                filesystem: "/dev/sda1",
                blocks: 10_188_088,
                used: root_used,
                available: 10_188_088 - root_used,
                mounted_on: "/",
            },
            DiskUsage {
                filesystem: "tmpfs",
                blocks: shm_blocks,
                used: shm_used,
                available: shm_blocks - shm_used,
                mounted_on: "/dev/shm",
            },
            DiskUsage {
                filesystem: "tmpfs",
                blocks: 5_120,
                used: lock_used,
                available: 5_120 - lock_used,
                mounted_on: "/run/lock",
            },
        ]
    }

    fn interface_counters(&mut self) -> InterfaceCounters {
        InterfaceCounters {
            rx_packets: self.rng.gen_range(10_000..=50_000),
            rx_bytes: self.rng.gen_range(10_000_000..=50_000_000),
            tx_packets: self.rng.gen_range(5_000..=20_000),
            tx_bytes: self.rng.gen_range(5_000_000..=20_000_000),
        }
    }

    fn peer_port(&mut self) -> u16 {
        self.rng.gen_range(32_768..=60_999)
    }

    fn binary_directory(&mut self) -> &'static str {
        BINARY_DIRECTORIES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or("/usr/bin")
    }

    fn download_size(&mut self) -> usize {
        self.rng.gen_range(100..=1024)
    }

    fn download_suffix(&mut self) -> u32 {
        self.rng.gen_range(1000..=9999)
    }

    fn listing_timestamp(&mut self) -> String {
        let month = MONTHS.choose(&mut self.rng).copied().unwrap_or("Jan");
        format!(
            "{} {:>2} {:02}:{:02}",
            month,
            self.rng.gen_range(1..=28),
            self.rng.gen_range(0..=23),
            self.rng.gen_range(0..=59)
        )
    }

    fn directory_links(&mut self) -> u32 {
        self.rng.gen_range(2..=5)
    }

    fn service_pid(&mut self) -> u32 {
        self.rng.gen_range(500..=30_000)
    }

    fn response_delay(&mut self) -> Duration {
        if self.clock.is_some() {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.gen_range(20..=150))
    }
}
