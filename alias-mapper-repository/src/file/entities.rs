//! JSON-lines entity feed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::errors::StoreError;
use crate::interfaces::EntitySource;
use alias_mapper_shared::Entity;

/// Reads entities from a file with one JSON object per line:
///
/// ```text
/// {"id": "42", "name": "Acme College", "aliases": ["Acme", "ACME Coll."]}
/// ```
pub struct JsonLinesEntitySource {
    path: PathBuf,
}

impl JsonLinesEntitySource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

fn parse_entities(contents: &str) -> Result<Vec<Entity>, StoreError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<Entity>(line)
                .map_err(|e| StoreError::parse(format!("line {}: {}", n + 1, e)))
        })
        .collect()
}

#[async_trait]
impl EntitySource for JsonLinesEntitySource {
    async fn load_entities(&self) -> Result<Vec<Entity>, StoreError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let entities = parse_entities(&contents)?;
        info!(
            path = %self.path.display(),
            entities = entities.len(),
            "Loaded entities from file"
        );
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entities() {
        let contents = r#"
{"id": "1", "name": "Acme College", "aliases": ["Acme"]}

{"id": "2", "aliases": ["Globex Institute"]}
"#;
        let entities = parse_entities(contents).unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].name.as_deref(), Some("Acme College"));
        assert_eq!(entities[1].aliases, vec!["Globex Institute"]);
    }

    #[test]
    fn test_parse_entities_reports_line_number() {
        let err = parse_entities("{\"id\": \"1\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_load_entities_missing_file() {
        let source = JsonLinesEntitySource::new("/nonexistent/entities.jsonl");
        assert!(matches!(
            source.load_entities().await,
            Err(StoreError::IoError(_))
        ));
    }
}
