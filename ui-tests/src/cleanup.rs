//! Cleanup script for orphaned test processes
//!
//! Cancelled test runs can leave `geckodriver` and the Firefox instances it
//! drives behind. This finds and kills them.
//!
//! Usage:
//!   cargo run --bin cleanup
//!   cargo run --bin cleanup -- --artifacts   # also remove failure artifacts

use std::path::PathBuf;
use std::process::Command;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧹 Searching for orphaned test processes...");

    let mut killed_count = 0;

    println!("🦎 Looking for geckodriver processes...");
    killed_count +=
        kill_processes_by_pattern("geckodriver --port", "geckodriver")?;

    println!("🦊 Looking for marionette Firefox processes...");
    killed_count += kill_processes_by_pattern("firefox.*--marionette", "firefox")?;

    if killed_count == 0 {
        println!("✨ No orphaned test processes found!");
    } else {
        println!("🎉 Cleaned up {} orphaned test processes", killed_count);
    }

    if std::env::args().skip(1).any(|arg| arg == "--artifacts") {
        remove_artifacts()?;
    }

    Ok(())
}

fn remove_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::var("ARTIFACTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("artifacts"));
    if !dir.exists() {
        println!("✨ No artifacts at {}", dir.display());
        return Ok(());
    }
    std::fs::remove_dir_all(&dir)?;
    println!("🗑️ Removed {}", dir.display());
    Ok(())
}

fn kill_processes_by_pattern(
    pattern: &str,
    process_name: &str,
) -> Result<u32, Box<dyn std::error::Error>> {
    let mut killed_count = 0;

    let output = Command::new("pgrep").arg("-f").arg(pattern).output()?;

    let own_pid = std::process::id();
    let pids = String::from_utf8_lossy(&output.stdout);
    for pid in pids.lines() {
        let Ok(pid_num) = pid.parse::<u32>() else {
            continue;
        };
        if pid_num == own_pid {
            continue;
        }
        println!("🔥 Killing {} process: {}", process_name, pid_num);
        match Command::new("kill").arg("-9").arg(pid).status() {
            Ok(status) if status.success() => {
                killed_count += 1;
                println!("✅ Killed {} process: {}", process_name, pid_num);
            }
            Ok(status) => {
                println!(
                    "❌ Failed to kill {} process {}: kill exited with {}",
                    process_name, pid_num, status
                );
            }
            Err(e) => {
                println!(
                    "❌ Failed to kill {} process {}: {}",
                    process_name, pid_num, e
                );
            }
        }
    }

    Ok(killed_count)
}
