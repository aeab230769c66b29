//! Config - コマンドライン引数と環境変数
//!
//! すべてのフラグは同名の環境変数（`TSB_*`）でも指定できます。
//! 既定値はホスト名に依存するため、解析後に `Config::resolve` で確定させます。
//!
//! # 設計原則
//! - 起動時に検証する（Fail-fast）
//! - 解析（clap）と確定（resolve）を分け、テストでは引数を直接渡す

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};

/// Storage engine behind the local node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    Fjall,
    Memory,
}

#[derive(Debug, Parser)]
#[command(name = "taskstore", version, about = "Partitioned task store node")]
pub struct Args {
    /// Data directory; the host name is appended
    #[arg(long, env = "TSB_PDB")]
    pub pdb: Option<PathBuf>,

    /// Key-value engine
    #[arg(long, env = "TSB_KDB", value_enum, default_value_t = Engine::Fjall)]
    pub kdb: Engine,

    /// Listen port
    #[arg(long, env = "TSB_CPORT", default_value_t = 8080)]
    pub cport: u16,

    /// Address peers use to reach this node
    #[arg(long, env = "TSB_CADDR")]
    pub caddr: Option<String>,

    /// Every node of the cluster, comma separated
    #[arg(long, env = "TSB_CSRVS", value_delimiter = ',')]
    pub csrvs: Vec<String>,

    #[arg(long, default_value = "http")]
    pub protocol: String,

    /// Commit mutations through the in-process ordered log and keep a snapshot in `rpath`
    #[arg(long, env = "TSB_LOCAL_LOG", default_value_t = false)]
    pub local_log: bool,

    /// Snapshot directory; the host name is appended
    #[arg(long, env = "TSB_RPATH")]
    pub rpath: Option<PathBuf>,

    /// How long a mutation may wait for its log entry to apply
    #[arg(long, env = "TSB_COMMIT_TIMEOUT", default_value_t = 10)]
    pub commit_timeout_secs: u64,
}

/// Fully resolved node configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub engine: Engine,
    pub port: u16,
    pub cur_url: String,
    pub nodes: Vec<String>,
    pub local_log: bool,
    pub snapshot_dir: PathBuf,
    pub commit_timeout: Duration,
}

impl Config {
    pub fn resolve(args: Args, hostname: &str) -> Result<Self> {
        if args.cport == 0 {
            bail!("cport must not be 0");
        }
        if args.commit_timeout_secs == 0 {
            bail!("commit timeout must be at least one second");
        }

        let base = match args.pdb {
            Some(dir) => dir,
            None => std::env::current_dir()?.join("data"),
        };
        let snapshots = match args.rpath {
            Some(dir) => dir,
            None => std::env::current_dir()?.join("raft"),
        };
        let cur_url = args
            .caddr
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("{}://{}:{}", args.protocol, hostname, args.cport));

        let mut nodes: Vec<String> = args
            .csrvs
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if nodes.is_empty() {
            nodes.push(cur_url.clone());
        }
        if !nodes.contains(&cur_url) {
            bail!("current address {cur_url} is not in the server list {nodes:?}");
        }

        Ok(Self {
            data_dir: base.join(hostname),
            engine: args.kdb,
            port: args.cport,
            cur_url,
            nodes,
            local_log: args.local_log,
            snapshot_dir: snapshots.join(hostname),
            commit_timeout: Duration::from_secs(args.commit_timeout_secs),
        })
    }
}

/// Host name as reported by the OS; `localhost` when it is empty.
pub fn hostname() -> String {
    let name = gethostname::gethostname();
    let name = name.to_string_lossy();
    let name = name.trim();
    if name.is_empty() {
        "localhost".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("taskstore").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_derive_from_hostname() {
        let cfg = Config::resolve(parse(&["--pdb", "/var/tsb"]), "node1").unwrap();
        assert_eq!(cfg.cur_url, "http://node1:8080");
        assert_eq!(cfg.nodes, vec!["http://node1:8080".to_string()]);
        assert_eq!(cfg.data_dir, PathBuf::from("/var/tsb/node1"));
        assert_eq!(cfg.engine, Engine::Fjall);
        assert!(!cfg.local_log);
        assert_eq!(cfg.commit_timeout, Duration::from_secs(10));
        assert!(cfg.snapshot_dir.ends_with("raft/node1"));
    }

    #[test]
    fn local_log_keeps_snapshots_under_rpath() {
        let args = parse(&["--pdb", "/tmp", "--local-log", "--rpath", "/var/snap", "--commit-timeout-secs", "3"]);
        let cfg = Config::resolve(args, "node1").unwrap();
        assert!(cfg.local_log);
        assert_eq!(cfg.snapshot_dir, PathBuf::from("/var/snap/node1"));
        assert_eq!(cfg.commit_timeout, Duration::from_secs(3));
    }

    #[test]
    fn server_list_is_comma_separated() {
        let args = parse(&[
            "--pdb",
            "/tmp",
            "--caddr",
            "http://b:9000",
            "--csrvs",
            "http://a:9000, http://b:9000",
            "--kdb",
            "memory",
        ]);
        let cfg = Config::resolve(args, "ignored").unwrap();
        assert_eq!(cfg.nodes, vec!["http://a:9000", "http://b:9000"]);
        assert_eq!(cfg.engine, Engine::Memory);
    }

    #[test]
    fn stranger_address_fails_fast() {
        let args = parse(&["--pdb", "/tmp", "--caddr", "http://c:1", "--csrvs", "http://a:1"]);
        let err = Config::resolve(args, "h").unwrap_err();
        assert!(err.to_string().contains("not in the server list"));
    }

    #[test]
    fn zero_port_is_rejected() {
        let err = Config::resolve(parse(&["--pdb", "/tmp", "--cport", "0"]), "h").unwrap_err();
        assert_eq!(err.to_string(), "cport must not be 0");
    }

    #[test]
    fn hostname_is_never_empty() {
        let name = hostname();
        assert!(!name.is_empty());
        assert_eq!(name, name.trim());
    }
}
