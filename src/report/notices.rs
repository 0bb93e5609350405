use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::ResolvedLicense;

const LICENSE_RULE: &str =
    "--------------------------------------------------------------------------------";
const GROUP_RULE: &str =
    "================================================================================";

/// Render the notices document.
///
/// Dependencies sharing an identical license text are listed together above a
/// single copy of that text. Groups keep the order in which their first
/// dependency appears; dependencies without a license are left out.
pub fn render(licenses: &[ResolvedLicense]) -> String {
    let mut groups: Vec<(&str, Vec<&ResolvedLicense>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for entry in licenses {
        let Some(text) = entry.license.as_deref() else {
            continue;
        };
        match index.get(text) {
            Some(&i) => groups[i].1.push(entry),
            None => {
                index.insert(text, groups.len());
                groups.push((text, vec![entry]));
            }
        }
    }

    let mut out = String::new();
    for (text, entries) in groups {
        for entry in entries {
            out.push_str(&heading(entry));
            out.push_str("\r\n");
        }
        out.push_str(LICENSE_RULE);
        out.push_str("\r\n");
        out.push_str(text);
        out.push_str("\r\n\r\n");
        out.push_str(GROUP_RULE);
        out.push_str("\r\n\r\n");
    }
    out
}

fn heading(entry: &ResolvedLicense) -> String {
    let mut line = entry.name.clone();
    if let Some(version) = &entry.version {
        line.push(' ');
        line.push_str(version);
    }
    if let Some(url) = &entry.project_url {
        line.push_str(" (");
        line.push_str(url);
        line.push(')');
    }
    line
}

/// Write the notices document to `path`.
pub fn write(licenses: &[ResolvedLicense], path: &Path) -> Result<()> {
    std::fs::write(path, render(licenses))
        .with_context(|| format!("writing notices to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, version: Option<&str>, license: Option<&str>) -> ResolvedLicense {
        ResolvedLicense {
            name: name.to_string(),
            version: version.map(str::to_string),
            project_url: None,
            license: license.map(str::to_string),
        }
    }

    #[test]
    fn test_identical_texts_grouped() {
        let rows = [
            row("Serilog", Some("2.12.0"), Some("Apache License")),
            row("Newtonsoft.Json", Some("13.0.1"), Some("MIT License")),
            row("Serilog.Sinks.File", Some("5.0.0"), Some("Apache License")),
            row("Mystery", None, None),
        ];
        let out = render(&rows);

        assert_eq!(out.matches("Apache License").count(), 1);
        assert_eq!(out.matches(GROUP_RULE).count(), 2);
        assert!(!out.contains("Mystery"));

        let serilog = out.find("Serilog 2.12.0").unwrap();
        let sinks = out.find("Serilog.Sinks.File 5.0.0").unwrap();
        let newtonsoft = out.find("Newtonsoft.Json 13.0.1").unwrap();
        assert!(serilog < sinks && sinks < newtonsoft);
    }

    #[test]
    fn test_heading_includes_project_url() {
        let mut entry = row("Serilog", Some("2.12.0"), Some("x"));
        entry.project_url = Some("https://serilog.net/".to_string());
        assert_eq!(heading(&entry), "Serilog 2.12.0 (https://serilog.net/)");
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("NOTICES.txt");
        write(&[row("Zlib", None, Some("zlib License"))], &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Zlib\r\n"));
    }

    #[test]
    fn test_nothing_resolved_is_empty() {
        assert_eq!(render(&[row("Mystery", None, None)]), "");
    }
}
