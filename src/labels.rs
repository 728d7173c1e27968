use std::path::Path;

use tracing::{info, warn};

const PLACEHOLDER_LABELS: [&str; 4] = ["class_0", "class_1", "class_2", "class_3"];

/// Ordered class labels; position `i` names model output `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
    pub fn new(labels: Vec<String>) -> Self {
        ClassNames(labels)
    }

    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_LABELS.iter().map(|s| s.to_string()).collect())
    }

    /// Reads a JSON array of strings from `path`. Falls back to the
    /// placeholder labels when the file is absent or unusable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "class list not found, using placeholder labels");
            return Self::placeholder();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).map_err(|e| e.to_string()));

        match parsed {
            Ok(labels) => {
                info!(path = %path.display(), count = labels.len(), "loaded class list");
                Self::new(labels)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unusable class list, using placeholder labels");
                Self::placeholder()
            }
        }
    }

    /// Label for output position `idx`, or `class_<idx>` past the end.
    pub fn label_for(&self, idx: usize) -> String {
        self.0
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", idx))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_gives_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let names = ClassNames::load(&dir.path().join("class_names.json"));
        assert_eq!(names, ClassNames::placeholder());
        assert_eq!(names.label_for(3), "class_3");
    }

    #[test]
    fn reads_json_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["cardboard", "glass", "metal"]"#).unwrap();

        let names = ClassNames::load(file.path());
        assert_eq!(
            names,
            ClassNames::new(vec!["cardboard".into(), "glass".into(), "metal".into()])
        );
        assert_eq!(names.label_for(1), "glass");
        assert_eq!(names.label_for(3), "class_3");
    }

    #[test]
    fn malformed_json_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not a list").unwrap();

        assert_eq!(ClassNames::load(file.path()), ClassNames::placeholder());
    }

    #[test]
    fn out_of_range_index_is_synthesized() {
        let names = ClassNames::new(vec!["paper".into()]);
        assert_eq!(names.label_for(0), "paper");
        assert_eq!(names.label_for(7), "class_7");
    }
}
