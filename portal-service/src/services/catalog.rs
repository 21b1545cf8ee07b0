//! Application catalog assembled from startup-injected configuration.

use crate::config::AppsConfig;
use crate::models::AppDescriptor;
use service_core::error::AppError;
use validator::Validate;

/// Sentinel group name marking an app as visible to everyone.
pub const PUBLIC_GROUP: &str = "All Users";

/// Known directory endpoints and the deployment path label each one implies.
/// An explicit `path_label` configuration value overrides this table.
const ENDPOINT_PATH_LABELS: &[(&str, &str)] = &[
    ("gisapps.example.com", "gisapps"),
    ("portal.example.com", "portal"),
];

/// Fixed set of applications every deployment carries. Configured extras are
/// merged on top and may override an entry by name.
fn built_in_descriptors() -> Vec<AppDescriptor> {
    vec![
        AppDescriptor::new("mobile", &[PUBLIC_GROUP]),
        AppDescriptor::new("print", &["GIS", "Planning"]),
    ]
}

/// The resolved application catalog for one request.
///
/// Building the catalog is pure: the same configuration always produces the
/// same descriptors in the same order.
#[derive(Debug, Clone)]
pub struct AppCatalog {
    descriptors: Vec<AppDescriptor>,
}

impl AppCatalog {
    /// Resolves the path label, merges built-in descriptors with configured
    /// extras, and validates every descriptor.
    pub fn from_config(config: &AppsConfig) -> Result<Self, AppError> {
        let label = config
            .path_label
            .clone()
            .or_else(|| path_label_for_endpoint(&config.endpoint));

        let mut descriptors = built_in_descriptors();
        for extra in &config.extra {
            match descriptors.iter_mut().find(|d| d.name == extra.name) {
                Some(existing) => *existing = extra.clone(),
                None => descriptors.push(extra.clone()),
            }
        }

        for descriptor in &mut descriptors {
            if descriptor.path.is_none() {
                if let Some(label) = &label {
                    descriptor.path = Some(format!("/srv/www/{}/{}", label, descriptor.name));
                }
            }
            descriptor.validate()?;
        }

        Ok(Self { descriptors })
    }

    /// Test constructor bypassing configuration merge.
    pub fn new(descriptors: Vec<AppDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[AppDescriptor] {
        &self.descriptors
    }

    /// Deduplicated union of all descriptor group lists, first occurrence
    /// order preserved.
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for descriptor in &self.descriptors {
            for group in &descriptor.groups {
                if !names.contains(group) {
                    names.push(group.clone());
                }
            }
        }
        names
    }
}

fn path_label_for_endpoint(endpoint: &str) -> Option<String> {
    ENDPOINT_PATH_LABELS
        .iter()
        .find(|(known, _)| *known == endpoint)
        .map(|(_, label)| label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apps_config(extra: Vec<AppDescriptor>) -> AppsConfig {
        AppsConfig {
            endpoint: "gisapps.example.com".to_string(),
            path_label: None,
            extra,
        }
    }

    #[test]
    fn built_ins_are_present_by_default() {
        let catalog = AppCatalog::from_config(&apps_config(Vec::new())).unwrap();
        let names: Vec<&str> = catalog.descriptors().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["mobile", "print"]);
    }

    #[test]
    fn extras_are_appended_and_same_name_overrides() {
        let extra = vec![
            AppDescriptor::new("viewer", &["GIS"]),
            AppDescriptor::new("print", &["Finance"]),
        ];
        let catalog = AppCatalog::from_config(&apps_config(extra)).unwrap();

        let print = catalog
            .descriptors()
            .iter()
            .find(|d| d.name == "print")
            .unwrap();
        assert_eq!(print.groups, vec!["Finance"]);
        assert!(catalog.descriptors().iter().any(|d| d.name == "viewer"));
    }

    #[test]
    fn known_endpoint_resolves_the_path_label() {
        let catalog = AppCatalog::from_config(&apps_config(Vec::new())).unwrap();
        let mobile = &catalog.descriptors()[0];
        assert_eq!(mobile.path.as_deref(), Some("/srv/www/gisapps/mobile"));
    }

    #[test]
    fn explicit_path_label_overrides_the_table() {
        let config = AppsConfig {
            endpoint: "gisapps.example.com".to_string(),
            path_label: Some("custom".to_string()),
            extra: Vec::new(),
        };
        let catalog = AppCatalog::from_config(&config).unwrap();
        assert_eq!(
            catalog.descriptors()[0].path.as_deref(),
            Some("/srv/www/custom/mobile")
        );
    }

    #[test]
    fn unknown_endpoint_leaves_paths_unset() {
        let config = AppsConfig {
            endpoint: "elsewhere.example.net".to_string(),
            path_label: None,
            extra: Vec::new(),
        };
        let catalog = AppCatalog::from_config(&config).unwrap();
        assert!(catalog.descriptors()[0].path.is_none());
    }

    #[test]
    fn explicit_descriptor_paths_are_kept() {
        let extra = vec![AppDescriptor::new("viewer", &["GIS"]).with_path("/opt/viewer")];
        let catalog = AppCatalog::from_config(&apps_config(extra)).unwrap();
        let viewer = catalog
            .descriptors()
            .iter()
            .find(|d| d.name == "viewer")
            .unwrap();
        assert_eq!(viewer.path.as_deref(), Some("/opt/viewer"));
    }

    #[test]
    fn group_names_dedup_in_first_occurrence_order() {
        let catalog = AppCatalog::new(vec![
            AppDescriptor::new("a", &["GIS", "Planning"]),
            AppDescriptor::new("b", &["Planning", "Finance"]),
        ]);
        assert_eq!(catalog.group_names(), vec!["GIS", "Planning", "Finance"]);
    }

    #[test]
    fn same_config_builds_identical_catalogs() {
        let config = apps_config(vec![AppDescriptor::new("viewer", &["GIS"])]);
        let first = AppCatalog::from_config(&config).unwrap();
        let second = AppCatalog::from_config(&config).unwrap();
        assert_eq!(first.descriptors(), second.descriptors());
    }

    #[test]
    fn descriptor_without_groups_fails_validation() {
        let extra = vec![AppDescriptor {
            name: "empty".to_string(),
            path: None,
            groups: Vec::new(),
        }];
        assert!(AppCatalog::from_config(&apps_config(extra)).is_err());
    }
}
