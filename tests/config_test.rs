//! Configuration files driving a session

use kpm_memtool::config::{validate_config, ConfigError, ConfigLoader};
use kpm_memtool::{MemoryTool, RegionCategory, SimulatedMemory};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn file_settings_reach_the_session() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kpm-memtool.toml");
    fs::write(
        &path,
        format!(
            r#"
[scanner]
safe_mode = true
search_range = "STACK"

[process]
proc_root = "{}"

[display]
result_limit = 5
"#,
            dir.path().display()
        ),
    )
    .unwrap();

    let config = ConfigLoader::new(&path).load().unwrap();
    validate_config(&config).unwrap();

    let tool = MemoryTool::new(Arc::new(SimulatedMemory::new()), &config);
    assert_eq!(tool.search_range(), RegionCategory::Stack);
    assert!(tool.safe_mode());
    assert_eq!(tool.result_limit(), 5);
    assert_eq!(tool.resolver().proc_root(), dir.path());
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        "[channel]\nmax_retries = 0",
        "[channel]\nprobe_pid = 0",
        "[scanner]\nchunk_size = 1000",
        "[display]\nresult_limit = 0",
        "[logging]\nlevel = \"loud\"",
    ];

    let dir = TempDir::new().unwrap();
    for (i, contents) in cases.iter().enumerate() {
        let path = dir.path().join(format!("case{i}.toml"));
        fs::write(&path, contents).unwrap();
        let config = ConfigLoader::new(&path).load().unwrap();
        assert!(
            matches!(validate_config(&config), Err(ConfigError::Invalid(_))),
            "{contents:?} should be rejected"
        );
    }
}

#[test]
fn unknown_search_range_fails_to_parse() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[scanner]\nsearch_range = \"EVERYTHING\"").unwrap();
    assert!(matches!(
        ConfigLoader::new(&path).load(),
        Err(ConfigError::TomlParse(_))
    ));
}
