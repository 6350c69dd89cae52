use assert_cmd::cargo::cargo_bin_cmd;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use std::fs::{create_dir, write};
use std::process::Output;
use tempfile::tempdir;

fn run(config_path: &Utf8Path) -> anyhow::Result<Output> {
    let mut cmd = cargo_bin_cmd!("userdata_permissions");
    cmd.arg(config_path);
    Ok(cmd.output()?)
}

// Exit codes are truncated to their lowest byte outside of Windows.
fn expected_exit_code(code: i32) -> Option<i32> {
    if cfg!(windows) {
        Some(code)
    } else {
        Some(code & 0xff)
    }
}

fn write_config(
    config_path: &Utf8Path,
    path_user_data: &Utf8Path,
    domain: &str,
) -> anyhow::Result<()> {
    write(
        config_path,
        serde_json::to_string(&json!({
            "pathUserData": path_user_data,
            "domain": domain,
            "fullAccessUsers": ["BUILTIN\\Administrators"],
            "defaultGroup": "BUILTIN\\Users",
            "ownersGroup": "CREATOR OWNER",
            "exceptions": ["Public"],
        }))?,
    )?;
    Ok(())
}

#[test]
fn test_missing_configuration() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let temp_dir_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())?;

    let output = run(&temp_dir_path.join("UserDataPermissions.json"))?;

    assert_eq!(output.status.code(), expected_exit_code(-30));
    assert!(String::from_utf8(output.stderr)?.contains("does not exist"));
    Ok(())
}

#[test]
fn test_unparsable_configuration() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let temp_dir_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())?;
    let config_path = temp_dir_path.join("UserDataPermissions.json");
    write(&config_path, r#"{"pathUserData": 5}"#)?;

    let output = run(&config_path)?;

    assert_eq!(output.status.code(), expected_exit_code(-30));
    Ok(())
}

#[test]
fn test_missing_root() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let temp_dir_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())?;
    let config_path = temp_dir_path.join("UserDataPermissions.json");
    write_config(&config_path, &temp_dir_path.join("UserData"), "CORP")?;

    let output = run(&config_path)?;

    assert_eq!(output.status.code(), expected_exit_code(-10));
    assert!(String::from_utf8(output.stderr)?.contains("User data directory"));
    Ok(())
}

#[test]
fn test_empty_domain() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let temp_dir_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())?;
    let user_data = temp_dir_path.join("UserData");
    create_dir(&user_data)?;
    let config_path = temp_dir_path.join("UserDataPermissions.json");
    write_config(&config_path, &user_data, "")?;

    let output = run(&config_path)?;

    assert_eq!(output.status.code(), expected_exit_code(-40));
    assert!(String::from_utf8(output.stderr)?.contains("domain"));
    Ok(())
}
