//! NUMA topology queries.
//!
//! This module provides the node oracle consulted by the placement logic:
//! which NUMA nodes exist, their distances, and their memory capacity.
//! On Linux the answers come from sysfs; other platforms degrade to a
//! single always-available node.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// Environment variable naming the high-bandwidth nodes as a cpulist
/// (e.g. `1` or `2-3,6`). When unset, memory-only nodes are used.
pub const HBW_NODES_ENV: &str = "MEMBIND_HBW_NODES";

/// Local distance the kernel reports for a node to itself.
const LOCAL_DISTANCE: u32 = 10;

/// Queryable oracle for NUMA node availability, distance, and capacity.
///
/// The placement logic consults this on demand rather than caching the
/// answers, so implementations should reflect runtime node state.
pub trait NodeOracle: Send + Sync {
    /// Number of NUMA nodes known to the system.
    fn num_nodes(&self) -> usize;

    /// Whether `node` exists and is currently online.
    fn is_node_available(&self, node: usize) -> bool;

    /// Distance between two nodes; lower is closer, 10 is local.
    fn node_distance(&self, a: usize, b: usize) -> u32;

    /// Total and free bytes of memory on `node`.
    fn node_memory(&self, node: usize) -> (u64, u64);

    /// NUMA node owning logical CPU `cpu`.
    fn node_of_cpu(&self, cpu: usize) -> usize;

    /// Nodes exposing memory but no CPUs, the shape high-bandwidth
    /// memory takes when the platform reports it as its own node.
    fn memory_only_nodes(&self) -> Vec<usize>;
}

/// Check if NUMA is supported on the current system.
#[inline]
pub fn is_supported() -> bool {
    #[cfg(target_os = "linux")]
    {
        std::path::Path::new("/sys/devices/system/node/node0").exists()
    }

    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Number of logical CPUs configured on this system.
pub fn cpu_count() -> usize {
    #[cfg(unix)]
    {
        let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
        if n > 0 {
            return n as usize;
        }
    }
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Logical CPU the calling thread is currently running on.
#[inline]
pub fn current_cpu() -> usize {
    #[cfg(target_os = "linux")]
    {
        let cpu = unsafe { libc::sched_getcpu() };
        if cpu >= 0 {
            return cpu as usize;
        }
        0
    }

    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}

/// Topology read from `/sys/devices/system/node`.
///
/// The node list and CPU ownership are detected at construction; online
/// state and memory counters are read live on each query.
#[derive(Debug)]
pub struct SysfsTopology {
    nodes: Vec<NodeInfo>,
}

#[derive(Debug)]
struct NodeInfo {
    id: usize,
    cpus: Vec<usize>,
}

static SYSTEM: Lazy<Arc<SysfsTopology>> = Lazy::new(|| Arc::new(SysfsTopology::detect()));

/// Shared handle to the detected system topology.
pub fn system() -> Arc<SysfsTopology> {
    Arc::clone(&SYSTEM)
}

impl SysfsTopology {
    /// Detect the topology of the running system.
    pub fn detect() -> SysfsTopology {
        #[cfg(target_os = "linux")]
        {
            let mut nodes = Vec::new();
            let mut id = 0;
            loop {
                let dir = format!("/sys/devices/system/node/node{}", id);
                if !std::path::Path::new(&dir).exists() {
                    break;
                }
                let cpus = std::fs::read_to_string(format!("{}/cpulist", dir))
                    .map(|s| parse_cpu_list(&s))
                    .unwrap_or_default();
                nodes.push(NodeInfo { id, cpus });
                id += 1;
            }
            if !nodes.is_empty() {
                return SysfsTopology { nodes };
            }
        }

        // Single-node fallback: every CPU on node 0.
        SysfsTopology {
            nodes: vec![NodeInfo {
                id: 0,
                cpus: (0..cpu_count()).collect(),
            }],
        }
    }
}

impl NodeOracle for SysfsTopology {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn is_node_available(&self, node: usize) -> bool {
        if node >= self.nodes.len() {
            return false;
        }

        #[cfg(target_os = "linux")]
        {
            // Offline nodes disappear from the online list.
            if let Ok(online) = std::fs::read_to_string("/sys/devices/system/node/online") {
                return parse_cpu_list(&online).contains(&node);
            }
        }

        true
    }

    fn node_distance(&self, a: usize, b: usize) -> u32 {
        #[cfg(target_os = "linux")]
        {
            let path = format!("/sys/devices/system/node/node{}/distance", a);
            if let Ok(content) = std::fs::read_to_string(&path) {
                if let Some(d) = content.split_whitespace().nth(b) {
                    if let Ok(d) = d.parse::<u32>() {
                        return d;
                    }
                }
            }
        }

        if a == b {
            LOCAL_DISTANCE
        } else {
            2 * LOCAL_DISTANCE
        }
    }

    fn node_memory(&self, node: usize) -> (u64, u64) {
        #[cfg(target_os = "linux")]
        {
            let path = format!("/sys/devices/system/node/node{}/meminfo", node);
            if let Ok(content) = std::fs::read_to_string(&path) {
                let total = meminfo_field(&content, "MemTotal:");
                let free = meminfo_field(&content, "MemFree:");
                return (total, free);
            }
            (0, 0)
        }

        #[cfg(not(target_os = "linux"))]
        {
            if node == 0 {
                system_memory()
            } else {
                (0, 0)
            }
        }
    }

    fn node_of_cpu(&self, cpu: usize) -> usize {
        for node in &self.nodes {
            if node.cpus.contains(&cpu) {
                return node.id;
            }
        }
        0
    }

    fn memory_only_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.cpus.is_empty())
            .map(|n| n.id)
            .collect()
    }
}

/// Total and free bytes of memory across the whole machine.
pub fn system_memory() -> (u64, u64) {
    #[cfg(target_os = "linux")]
    {
        let mut info: libc::sysinfo = unsafe { std::mem::zeroed() };
        if unsafe { libc::sysinfo(&mut info) } == 0 {
            let unit = info.mem_unit.max(1) as u64;
            return (info.totalram as u64 * unit, info.freeram as u64 * unit);
        }
        (0, 0)
    }

    #[cfg(not(target_os = "linux"))]
    {
        (0, 0)
    }
}

/// High-bandwidth node ids from the environment, `None` when unset.
///
/// The parse runs once per process; a malformed value is sticky and
/// surfaces as an environment error from the kinds that need it.
pub fn hbw_nodes_from_env() -> Result<Option<Vec<usize>>> {
    static PARSED: Lazy<Result<Option<Vec<usize>>>> = Lazy::new(|| {
        match std::env::var(HBW_NODES_ENV) {
            Ok(raw) => {
                let nodes = parse_cpu_list(&raw);
                if nodes.is_empty() {
                    return Err(Error::Environ);
                }
                Ok(Some(nodes))
            }
            Err(_) => Ok(None),
        }
    });
    PARSED.clone()
}

/// Parse a kernel cpulist such as `0-7,16-23` into explicit ids.
pub fn parse_cpu_list(s: &str) -> Vec<usize> {
    let mut ids = Vec::new();
    for part in s.trim().split(',') {
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(s), Ok(e)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>()) {
                ids.extend(s..=e);
            }
        } else if let Ok(id) = part.trim().parse::<usize>() {
            ids.push(id);
        }
    }
    ids
}

fn meminfo_field(content: &str, field: &str) -> u64 {
    for line in content.lines() {
        if line.contains(field) {
            // Node meminfo lines read `Node 0 MemTotal:  131072 kB`.
            if let Some(kb) = line.split_whitespace().nth(3) {
                if let Ok(kb) = kb.parse::<u64>() {
                    return kb * 1024;
                }
            }
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cpu_list_handles_singles_and_ranges() {
        assert_eq!(parse_cpu_list("0"), vec![0]);
        assert_eq!(parse_cpu_list("0-3"), vec![0, 1, 2, 3]);
        assert_eq!(parse_cpu_list("0-2,5,8-9"), vec![0, 1, 2, 5, 8, 9]);
        assert_eq!(parse_cpu_list("0-7,16-19\n"), {
            let mut v: Vec<usize> = (0..8).collect();
            v.extend(16..20);
            v
        });
    }

    #[test]
    fn parse_cpu_list_ignores_garbage() {
        assert!(parse_cpu_list("").is_empty());
        assert!(parse_cpu_list("abc").is_empty());
        assert_eq!(parse_cpu_list("1,x,3"), vec![1, 3]);
    }

    #[test]
    fn meminfo_field_reads_node_format() {
        let content = "Node 0 MemTotal:       131072 kB\nNode 0 MemFree:        65536 kB\n";
        assert_eq!(meminfo_field(content, "MemTotal:"), 131072 * 1024);
        assert_eq!(meminfo_field(content, "MemFree:"), 65536 * 1024);
        assert_eq!(meminfo_field(content, "MemUsed:"), 0);
    }

    #[test]
    fn detect_reports_at_least_one_node() {
        let topo = SysfsTopology::detect();
        assert!(topo.num_nodes() >= 1);
        assert!(topo.is_node_available(0));
        assert!(!topo.is_node_available(topo.num_nodes()));
    }

    #[test]
    fn node_zero_is_local_to_itself() {
        let topo = SysfsTopology::detect();
        assert_eq!(topo.node_distance(0, 0), 10);
    }

    #[test]
    fn cpu_zero_maps_to_some_node() {
        let topo = SysfsTopology::detect();
        assert!(topo.node_of_cpu(0) < topo.num_nodes());
    }

    #[test]
    fn cpu_count_is_positive() {
        assert!(cpu_count() >= 1);
        assert!(current_cpu() < cpu_count());
    }

    #[test]
    fn cpu_owning_nodes_are_not_memory_only() {
        let topo = SysfsTopology::detect();
        let cpu_node = topo.node_of_cpu(0);
        assert!(!topo.memory_only_nodes().contains(&cpu_node));
    }
}
