//! Liveness sampling for supervised processes.
//!
//! CPU usage comes from `/proc/<pid>/stat` tick deltas on Linux; other
//! platforms report no samples and the CPU stall heuristic stays silent.
//! Output size sampling and encoder instance discovery live here too.

use std::path::Path;
use std::time::Instant;

/// Periodic CPU usage sampler for one process.
///
/// The first call establishes a baseline and yields nothing; later calls
/// yield the average CPU percentage since the previous call.
pub struct CpuSampler {
    pid: u32,
    last_ticks: Option<u64>,
    last_at: Option<Instant>,
}

impl CpuSampler {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            last_ticks: None,
            last_at: None,
        }
    }

    #[cfg(target_os = "linux")]
    pub fn sample(&mut self) -> Option<f64> {
        let ticks = read_process_ticks(self.pid)?;
        let now = Instant::now();

        let percent = match (self.last_ticks, self.last_at) {
            (Some(prev_ticks), Some(prev_at)) => {
                let wall = now.duration_since(prev_at).as_secs_f64();
                if wall <= 0.0 {
                    None
                } else {
                    let used = ticks.saturating_sub(prev_ticks) as f64 / clock_ticks_per_sec();
                    Some(100.0 * used / wall)
                }
            }
            _ => None,
        };

        self.last_ticks = Some(ticks);
        self.last_at = Some(now);
        percent
    }

    #[cfg(not(target_os = "linux"))]
    pub fn sample(&mut self) -> Option<f64> {
        None
    }
}

/// utime + stime from `/proc/<pid>/stat`.
///
/// The comm field may contain spaces, so fields are taken after the
/// closing paren.
#[cfg(target_os = "linux")]
fn read_process_ticks(pid: u32) -> Option<u64> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let after_comm = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = after_comm.split_whitespace().collect();

    // Fields after comm: state is 0, utime is 11, stime is 12.
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_sec() -> f64 {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as f64
    } else {
        100.0
    }
}

/// Find other running instances of a tool by process name.
///
/// Diagnostic only. `/proc/<pid>/comm` truncates names to 15 bytes, which
/// is enough for the encoders this crate drives.
#[cfg(target_os = "linux")]
pub fn find_tool_instances(tool: &str) -> Vec<u32> {
    let mut pids = Vec::new();
    let entries = match std::fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(_) => return pids,
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let pid: u32 = match name.to_string_lossy().parse() {
            Ok(pid) => pid,
            Err(_) => continue,
        };
        if let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) {
            if comm.trim() == tool {
                pids.push(pid);
            }
        }
    }

    pids
}

#[cfg(not(target_os = "linux"))]
pub fn find_tool_instances(_tool: &str) -> Vec<u32> {
    Vec::new()
}

/// Current size of the output file, if it exists.
pub fn output_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn output_size_reads_file_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0u8; 1234]).unwrap();

        assert_eq!(output_size(&path), Some(1234));
    }

    #[test]
    fn output_size_missing_file_is_none() {
        assert_eq!(output_size(Path::new("/nonexistent/out.mp4")), None);
    }

    #[test]
    fn unknown_tool_has_no_instances() {
        assert!(find_tool_instances("no_such_tool_x").is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn sampler_needs_a_baseline_first() {
        let mut sampler = CpuSampler::new(std::process::id());

        assert!(sampler.sample().is_none());
        std::thread::sleep(std::time::Duration::from_millis(50));
        let second = sampler.sample();
        assert!(second.is_some());
        assert!(second.unwrap() >= 0.0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn dead_pid_yields_no_sample() {
        // PID 0 has no /proc entry.
        let mut sampler = CpuSampler::new(0);
        assert!(sampler.sample().is_none());
    }
}
