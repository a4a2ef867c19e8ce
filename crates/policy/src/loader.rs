use std::collections::HashSet;
use std::path::Path;

use crate::document::PolicyDocument;

/// Parse every `*.json`/`*.toml` file directly under `dir`. A parse failure
/// doesn't abort the scan — the bad file's name is collected into
/// `unhealthy` and the caller decides whether to keep a previously-loaded
/// version around.
pub fn scan_policies(dir: &Path) -> (Vec<PolicyDocument>, HashSet<String>) {
    let mut good = Vec::new();
    let mut unhealthy = HashSet::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "policy directory unreadable");
            return (good, unhealthy);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let parsed = match ext {
            "json" => std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| serde_json::from_str::<PolicyDocument>(&s).ok()),
            "toml" => std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| toml::from_str::<PolicyDocument>(&s).ok()),
            _ => continue,
        };

        match parsed {
            Some(doc) => good.push(doc),
            None => {
                tracing::warn!(policy = %stem, path = %path.display(), "failed to compile policy, keeping previous version if any");
                unhealthy.insert(stem);
            }
        }
    }

    (good, unhealthy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn valid_and_invalid_files_both_handled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("good.json"),
            r#"{"name": "good", "rules": []}"#,
        )
        .unwrap();
        let mut bad = std::fs::File::create(dir.path().join("bad.json")).unwrap();
        bad.write_all(b"{ not json").unwrap();

        let (good, unhealthy) = scan_policies(dir.path());
        assert_eq!(good.len(), 1);
        assert_eq!(good[0].name, "good");
        assert!(unhealthy.contains("bad"));
    }

    #[test]
    fn missing_directory_returns_empty_without_panicking() {
        let (good, unhealthy) = scan_policies(Path::new("/nonexistent/path/xyz"));
        assert!(good.is_empty());
        assert!(unhealthy.is_empty());
    }
}
