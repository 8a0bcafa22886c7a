//! Template Registry - Store and reuse schema templates
//!
//! A template pairs a validation schema with a transformation schema for one
//! survey template version, optionally specialized per taxon. Templates are
//! stored as JSON files, one per template.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineResult, RegistryError, RegistryResult};
use crate::schema::{TransformationSchemaParser, ValidationSchemaParser};

/// Directory where templates are stored (relative to current dir)
pub const DEFAULT_REGISTRY_DIR: &str = ".biohub/templates";

/// Environment variable overriding [`DEFAULT_REGISTRY_DIR`]
pub const REGISTRY_DIR_ENV: &str = "BIOHUB_TEMPLATE_DIR";

/// Template file as authored, before it is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateBundle {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub taxon: Option<String>,
    #[serde(default)]
    pub validation_schema: Option<Value>,
    #[serde(default)]
    pub transform_schema: Option<Value>,
}

/// A stored template with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTemplate {
    /// Derived from name, version and taxon
    pub id: String,
    pub name: String,
    pub version: String,
    /// Taxon this variant is specialized for; `None` for the generic variant
    pub taxon: Option<String>,
    pub validation_schema: Option<Value>,
    pub transform_schema: Option<Value>,
    /// Creation timestamp
    pub created_at: String,
    /// Last time this template was used
    pub last_used: Option<String>,
    /// Number of times used
    pub use_count: u32,
}

impl StoredTemplate {
    pub fn validation_parser(&self) -> PipelineResult<ValidationSchemaParser> {
        let schema = self.validation_schema.clone().ok_or_else(|| {
            RegistryError::InvalidTemplate(format!("{} has no validation schema", self.id))
        })?;
        Ok(ValidationSchemaParser::from_value(schema)?)
    }

    pub fn transformation_parser(&self) -> PipelineResult<TransformationSchemaParser> {
        let schema = self.transform_schema.clone().ok_or_else(|| {
            RegistryError::InvalidTemplate(format!("{} has no transformation schema", self.id))
        })?;
        Ok(TransformationSchemaParser::from_value(schema)?)
    }
}

/// Registry for managing schema templates
pub struct TemplateRegistry {
    /// Directory where templates are stored
    registry_dir: PathBuf,
    /// Loaded templates (id -> template)
    templates: HashMap<String, StoredTemplate>,
}

impl TemplateRegistry {
    /// Open the registry at `$BIOHUB_TEMPLATE_DIR`, or the default directory
    pub fn new() -> Self {
        let dir = std::env::var(REGISTRY_DIR_ENV).unwrap_or_else(|_| DEFAULT_REGISTRY_DIR.into());
        Self::with_dir(dir)
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: PathBuf::from(dir.as_ref()),
            templates: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load all templates from the registry directory. Unreadable files are
    /// ignored.
    fn load_all(&mut self) {
        let Ok(entries) = fs::read_dir(&self.registry_dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(template) = serde_json::from_str::<StoredTemplate>(&content) {
                        self.templates.insert(template.id.clone(), template);
                    }
                }
            }
        }
    }

    /// All stored templates, sorted by id
    pub fn list(&self) -> Vec<&StoredTemplate> {
        let mut templates: Vec<_> = self.templates.values().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }

    pub fn get(&self, id: &str) -> Option<&StoredTemplate> {
        self.templates.get(id)
    }

    /// Template for `name` + `version`. A taxon-specific variant wins over the
    /// generic one; an unknown taxon falls back to the generic variant.
    pub fn find(&self, name: &str, version: &str, taxon: Option<&str>) -> Option<&StoredTemplate> {
        let candidates = || {
            self.templates
                .values()
                .filter(move |t| t.name == name && t.version == version)
        };

        taxon
            .and_then(|taxon| candidates().find(|t| t.taxon.as_deref() == Some(taxon)))
            .or_else(|| candidates().find(|t| t.taxon.is_none()))
    }

    /// Store a template, replacing any template with the same id. Schemas
    /// are checked before anything is written.
    pub fn save(&mut self, bundle: TemplateBundle) -> RegistryResult<String> {
        if bundle.name.trim().is_empty() || bundle.version.trim().is_empty() {
            return Err(RegistryError::InvalidTemplate("name and version are required".into()));
        }
        if let Some(schema) = &bundle.validation_schema {
            ValidationSchemaParser::from_value(schema.clone())
                .map_err(|e| RegistryError::InvalidTemplate(e.to_string()))?;
        }
        if let Some(schema) = &bundle.transform_schema {
            TransformationSchemaParser::from_value(schema.clone())
                .map_err(|e| RegistryError::InvalidTemplate(e.to_string()))?;
        }

        fs::create_dir_all(&self.registry_dir)?;

        let id = generate_id(&bundle.name, &bundle.version, bundle.taxon.as_deref());
        let stored = StoredTemplate {
            id: id.clone(),
            name: bundle.name,
            version: bundle.version,
            taxon: bundle.taxon,
            validation_schema: bundle.validation_schema,
            transform_schema: bundle.transform_schema,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            use_count: 0,
        };

        self.write(&stored)?;
        self.templates.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a template bundle from a JSON file
    pub fn import(&mut self, path: &Path) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let bundle: TemplateBundle = serde_json::from_str(&content)?;
        self.save(bundle)
    }

    /// Update usage statistics after a template was applied
    pub fn record_use(&mut self, id: &str) -> RegistryResult<()> {
        let template = self
            .templates
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        template.last_used = Some(chrono::Utc::now().to_rfc3339());
        template.use_count += 1;

        let snapshot = template.clone();
        self.write(&snapshot)
    }

    /// Delete a template from the registry
    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.templates.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, template: &StoredTemplate) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(template)?;
        fs::write(self.path_for(&template.id), content)?;
        Ok(())
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Slug of name, version and taxon
fn generate_id(name: &str, version: &str, taxon: Option<&str>) -> String {
    let raw = match taxon {
        Some(taxon) => format!("{name} v{version} {taxon}"),
        None => format!("{name} v{version}"),
    };
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn bundle(taxon: Option<&str>) -> TemplateBundle {
        TemplateBundle {
            name: "Moose SRB".into(),
            version: "1.0".into(),
            taxon: taxon.map(String::from),
            validation_schema: Some(json!({ "files": [{ "name": "Effort" }] })),
            transform_schema: Some(json!({ "flatten": [], "transformations": [{ "transformations": [] }], "parse": [] })),
        }
    }

    #[test]
    fn test_generate_id() {
        assert_eq!(generate_id("Moose SRB", "1.0", None), "moose-srb-v1.0");
        assert_eq!(generate_id("Moose SRB", "1.0", Some("Alces alces")), "moose-srb-v1.0-alces-alces");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let id = {
            let mut registry = TemplateRegistry::with_dir(dir.path());
            registry.save(bundle(None)).unwrap()
        };

        let registry = TemplateRegistry::with_dir(dir.path());
        let stored = registry.get(&id).unwrap();
        assert_eq!(stored.name, "Moose SRB");
        assert!(stored.transformation_parser().is_ok());
        assert!(stored.validation_parser().is_ok());
    }

    #[test]
    fn test_find_prefers_taxon_variant() {
        let dir = tempdir().unwrap();
        let mut registry = TemplateRegistry::with_dir(dir.path());
        let generic = registry.save(bundle(None)).unwrap();
        let moose = registry.save(bundle(Some("Alces alces"))).unwrap();

        assert_eq!(registry.find("Moose SRB", "1.0", Some("Alces alces")).unwrap().id, moose);
        assert_eq!(registry.find("Moose SRB", "1.0", Some("Rangifer")).unwrap().id, generic);
        assert_eq!(registry.find("Moose SRB", "1.0", None).unwrap().id, generic);
        assert!(registry.find("Moose SRB", "2.0", None).is_none());
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let dir = tempdir().unwrap();
        let mut registry = TemplateRegistry::with_dir(dir.path());
        let mut bad = bundle(None);
        bad.transform_schema = Some(json!({ "flatten": "Effort" }));

        assert!(matches!(registry.save(bad), Err(RegistryError::InvalidTemplate(_))));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_import_record_use_and_delete() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("moose.json");
        fs::write(&file, serde_json::to_string(&bundle(None)).unwrap()).unwrap();

        let mut registry = TemplateRegistry::with_dir(dir.path().join("store"));
        let id = registry.import(&file).unwrap();

        registry.record_use(&id).unwrap();
        assert_eq!(registry.get(&id).unwrap().use_count, 1);
        assert!(registry.get(&id).unwrap().last_used.is_some());

        registry.delete(&id).unwrap();
        assert!(registry.get(&id).is_none());
        assert!(matches!(registry.delete(&id), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_missing_schema() {
        let mut b = bundle(None);
        b.validation_schema = None;
        let dir = tempdir().unwrap();
        let mut registry = TemplateRegistry::with_dir(dir.path());
        let id = registry.save(b).unwrap();
        assert!(registry.get(&id).unwrap().validation_parser().is_err());
    }
}
