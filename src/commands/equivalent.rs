//! Semantic comparison of two JSON documents

use anyhow::{Context as AnyhowContext, Result};
use equivalency::{Comparator, Side, parse_document};
use std::fs;
use std::io::{self, Read};

use crate::cli::EquivalentArgs;
use crate::engine::differ::text_diff;
use crate::ui;

/// Returns whether the documents are equivalent
pub fn run(args: &EquivalentArgs) -> Result<bool> {
    let desired = read_document(&args.desired)?;
    let remote = read_document(&args.remote)?;
    let comparator = Comparator::new(args.unordered.iter().map(String::as_str));

    if comparator.equivalent(&desired, &remote)? {
        ui::success("Documents are equivalent");
        return Ok(true);
    }

    ui::warn("Documents differ");
    for line in differences(&comparator, &desired, &remote)? {
        println!("{line}");
    }
    Ok(false)
}

/// Line diff of both documents after normalization
fn differences(comparator: &Comparator, desired: &str, remote: &str) -> Result<Vec<String>> {
    let desired = parse_document(desired, Side::Desired)?;
    let remote = parse_document(remote, Side::Remote)?;
    let desired = serde_json::to_string_pretty(&comparator.normalize(&desired))?;
    let remote = serde_json::to_string_pretty(&comparator.normalize(&remote))?;
    Ok(text_diff(&(desired + "\n"), &(remote + "\n")))
}

fn read_document(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Could not read document from stdin")?;
        return Ok(buf);
    }
    let path = crate::config::expand_path(source);
    fs::read_to_string(&path).with_context(|| format!("Could not read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(dir: &TempDir, desired: &str, remote: &str) -> EquivalentArgs {
        let desired_path = dir.path().join("desired.json");
        let remote_path = dir.path().join("remote.json");
        fs::write(&desired_path, desired).unwrap();
        fs::write(&remote_path, remote).unwrap();
        EquivalentArgs {
            desired: desired_path.to_string_lossy().into_owned(),
            remote: remote_path.to_string_lossy().into_owned(),
            unordered: vec!["environment".to_string()],
        }
    }

    #[test]
    fn test_reordered_environment_is_equivalent() {
        let dir = TempDir::new().unwrap();
        let args = args(
            &dir,
            r#"{"name":"web","environment":[{"name":"A","value":"1"},{"name":"B","value":"2"}]}"#,
            r#"{"environment":[{"value":"2","name":"B"},{"name":"A","value":"1"}],"name":"web"}"#,
        );
        assert!(run(&args).unwrap());
    }

    #[test]
    fn test_different_values_are_reported() {
        let dir = TempDir::new().unwrap();
        let args = args(&dir, r#"{"cpu":256}"#, r#"{"cpu":512}"#);
        assert!(!run(&args).unwrap());

        colored::control::set_override(false);
        let comparator = Comparator::new(["environment"]);
        let lines = differences(&comparator, r#"{"cpu":256}"#, r#"{"cpu":512}"#).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("256"));
        assert!(lines[1].contains("512"));
    }

    #[test]
    fn test_blank_document_diffs_against_content() {
        let dir = TempDir::new().unwrap();
        let args = args(&dir, "", r#"{"image":"busybox"}"#);
        assert!(!run(&args).unwrap());

        colored::control::set_override(false);
        let comparator = Comparator::new(["environment"]);
        let lines = differences(&comparator, "  \n", r#"{"image":"busybox"}"#).unwrap();
        assert!(lines.iter().any(|line| line.contains("busybox")));
    }

    #[test]
    fn test_malformed_document_names_its_side() {
        let dir = TempDir::new().unwrap();
        let args = args(&dir, "{}", "{not json");
        let err = run(&args).unwrap_err();
        assert!(err.to_string().contains("remote"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut args = args(&dir, "{}", "{}");
        args.remote = dir.path().join("absent.json").to_string_lossy().into_owned();
        assert!(run(&args).is_err());
    }
}
