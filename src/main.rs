use anyhow::{bail, Context, Result};
use kpm_memtool::config::{load_config, validate_config, Config};
use kpm_memtool::sys::{self, ErrorCode};
use kpm_memtool::{Address, MemoryTool, PrimitiveType};
use std::fs::OpenOptions;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: kpm-memtool <command>

commands:
  status                              probe the KPM driver
  regions <package> [range]           list scannable regions
  scan <package> <type> <value>       exact scan in the configured range
  freeze <package> <type> <addr> <value>
                                      keep writing value until Ctrl-C
                                      or the package exits
  kill <package>                      send SIGKILL to the package

types: DWORD FLOAT DOUBLE WORD BYTE QWORD
ranges: ALL B_BAD C_ALLOC C_BSS C_DATA C_HEAP JAVA_HEAP A_ANON CODE_SYSTEM STACK ASHMEM";

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log filter")?;

    if config.logging.file.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.logging.file)
            .with_context(|| format!("cannot open log file {}", config.logging.file))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}

/// Connects a session, refusing to go on without a driver
fn connect(config: &Config, package: &str) -> Result<MemoryTool> {
    let mut tool = MemoryTool::with_kpm(config);
    tool.require_driver()
        .context("KPM driver not answering; is the module loaded?")?;
    tool.connect(package)?;
    Ok(tool)
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .with_context(|| format!("missing <{}>\n\n{}", name, USAGE))
}

fn status(config: &Config) -> Result<()> {
    let tool = MemoryTool::with_kpm(config);
    let status = tool.driver_status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    if status.last_error != 0 {
        println!("last error: {}", ErrorCode::from(status.last_error).kpm_meaning());
    }
    if !sys::is_root() {
        warn!("Not running as root; the driver usually rejects unprivileged callers");
    }
    Ok(())
}

fn regions(config: &Config, args: &[String]) -> Result<()> {
    let mut tool = connect(config, arg(args, 1, "package")?)?;
    if let Some(range) = args.get(2) {
        tool.set_search_range(range.parse()?);
    }

    for region in tool.regions() {
        println!(
            "{}-{} {} {:<11} {}",
            region.start,
            region.end,
            region.permissions,
            region.category(),
            region.name
        );
    }
    Ok(())
}

fn scan(config: &Config, args: &[String]) -> Result<()> {
    let mut tool = connect(config, arg(args, 1, "package")?)?;
    let value_type: PrimitiveType = arg(args, 2, "type")?.parse()?;
    let count = tool.search(arg(args, 3, "value")?, value_type)?;

    println!("Found {} results in {}", count, tool.search_range());
    print!("{}", tool.render_results());
    Ok(())
}

async fn freeze(config: &Config, args: &[String]) -> Result<()> {
    let mut tool = connect(config, arg(args, 1, "package")?)?;
    let value_type: PrimitiveType = arg(args, 2, "type")?.parse()?;
    let address: Address = arg(args, 3, "addr")?.parse()?;
    tool.add_freeze(address, arg(args, 4, "value")?, value_type, 0)?;

    tool.start_freeze()?;
    print!("{}", tool.render_freeze_entries());
    info!("Freezing; press Ctrl+C to stop");

    let end = hold_freeze(&tool, tokio::signal::ctrl_c(), FREEZE_POLL).await?;
    tool.stop_freeze();
    match end {
        FreezeEnd::Interrupted => info!("Freeze stopped"),
        FreezeEnd::TargetExited => warn!("Freeze target exited, nothing left to freeze"),
    }
    Ok(())
}

const FREEZE_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, PartialEq, Eq)]
enum FreezeEnd {
    Interrupted,
    TargetExited,
}

/// Waits for `shutdown` while the freeze loop is still running
async fn hold_freeze<F>(tool: &MemoryTool, shutdown: F, poll: Duration) -> Result<FreezeEnd>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(poll);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("failed to listen for Ctrl+C")?;
                return Ok(FreezeEnd::Interrupted);
            }
            _ = ticker.tick() => {
                if !tool.is_freezing() {
                    return Ok(FreezeEnd::TargetExited);
                }
            }
        }
    }
}

fn kill(config: &Config, args: &[String]) -> Result<()> {
    let tool = MemoryTool::with_kpm(config);
    let pid = tool.kill_process(arg(args, 1, "package")?)?;
    println!("Killed pid {}", pid);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    validate_config(&config)?;
    init_logging(&config)?;

    info!(
        "kpm-memtool v{} ({}, {}-bit)",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH,
        usize::BITS
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("status") => status(&config),
        Some("regions") => regions(&config, &args),
        Some("scan") => scan(&config, &args),
        Some("freeze") => freeze(&config, &args).await,
        Some("kill") => kill(&config, &args),
        Some(other) => bail!("unknown command '{}'\n\n{}", other, USAGE),
        None => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpm_memtool::channel::SimulatedMemory;
    use kpm_memtool::RegionCategory;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn freezing_tool() -> (TempDir, MemoryTool) {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("3072");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("cmdline"), "com.example.game\0").unwrap();

        let mut config = Config::default();
        config.process.proc_root = root.path().to_path_buf();
        config.freeze.delay_us = 1_000;

        let memory = Arc::new(SimulatedMemory::new());
        memory.map(Address::new(0x4000), vec![0u8; 16]);
        let mut tool = MemoryTool::new(memory, &config);
        tool.connect("com.example.game").unwrap();
        tool.add_freeze(Address::new(0x4000), "9", PrimitiveType::Dword, 0)
            .unwrap();
        assert!(tool.start_freeze().unwrap());
        (root, tool)
    }

    #[test]
    fn test_arg_reports_missing_parameter() {
        let args = vec!["scan".to_string(), "com.example.game".to_string()];
        assert_eq!(arg(&args, 1, "package").unwrap(), "com.example.game");
        let err = arg(&args, 2, "type").unwrap_err();
        assert!(err.to_string().contains("missing <type>"));
    }

    #[tokio::test]
    async fn test_hold_freeze_returns_on_interrupt() {
        let (_root, mut tool) = freezing_tool();
        let end = hold_freeze(&tool, async { Ok(()) }, Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(end, FreezeEnd::Interrupted);
        tool.stop_freeze();
    }

    #[tokio::test]
    async fn test_hold_freeze_returns_when_target_exits() {
        let (root, tool) = freezing_tool();
        fs::remove_dir_all(root.path().join("3072")).unwrap();

        let pending = std::future::pending::<std::io::Result<()>>();
        let end = tokio::time::timeout(
            Duration::from_secs(5),
            hold_freeze(&tool, pending, Duration::from_millis(5)),
        )
        .await
        .expect("freeze wait should end with the target")
        .unwrap();
        assert_eq!(end, FreezeEnd::TargetExited);
    }

    #[test]
    fn test_usage_lists_every_range() {
        for category in RegionCategory::ALL {
            assert!(USAGE.contains(category.label()));
        }
    }
}
