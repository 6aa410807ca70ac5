//! Static mapping from entity types to their local file and remote table.

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Where one entity type is stored on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityBinding {
    /// The entity type name.
    pub type_name: &'static str,
    /// Columns in storage order.
    pub columns: &'static [&'static str],
    /// Path of the local flat file.
    pub local_path: PathBuf,
    /// Name of the remote table.
    pub remote_table: String,
}

impl EntityBinding {
    /// Creates a binding for `T`.
    pub fn new<T: Entity>(local_path: impl Into<PathBuf>, remote_table: impl Into<String>) -> Self {
        Self {
            type_name: T::TYPE_NAME,
            columns: T::COLUMNS,
            local_path: local_path.into(),
            remote_table: remote_table.into(),
        }
    }

    /// Creates the conventional binding for `T` under `data_dir`.
    ///
    /// The file is `<type>s.csv` and the table is `<type>`, both lowercase.
    pub fn conventional<T: Entity>(data_dir: &Path) -> Self {
        let name = T::TYPE_NAME.to_lowercase();
        Self::new::<T>(data_dir.join(format!("{name}s.csv")), name)
    }
}

/// Registered entity types, in registration order.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    bindings: Vec<EntityBinding>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type.
    ///
    /// # Errors
    ///
    /// Fails if the type is already registered, or if its file or table is
    /// already bound to another type.
    pub fn register(&mut self, binding: EntityBinding) -> CoreResult<()> {
        for existing in &self.bindings {
            if existing.type_name == binding.type_name {
                return Err(CoreError::DuplicateEntity {
                    type_name: binding.type_name.to_string(),
                });
            }
            if existing.local_path == binding.local_path {
                return Err(CoreError::ResourceInUse {
                    resource: binding.local_path.display().to_string(),
                    owner: existing.type_name.to_string(),
                });
            }
            if existing.remote_table.eq_ignore_ascii_case(&binding.remote_table) {
                return Err(CoreError::ResourceInUse {
                    resource: binding.remote_table.clone(),
                    owner: existing.type_name.to_string(),
                });
            }
        }
        self.bindings.push(binding);
        Ok(())
    }

    /// Registers `T` with its conventional binding under `data_dir`.
    pub fn register_conventional<T: Entity>(&mut self, data_dir: &Path) -> CoreResult<()> {
        self.register(EntityBinding::conventional::<T>(data_dir))
    }

    /// Returns the binding for `T`.
    pub fn binding<T: Entity>(&self) -> CoreResult<&EntityBinding> {
        self.binding_by_name(T::TYPE_NAME)
    }

    /// Returns the binding for the named type.
    pub fn binding_by_name(&self, type_name: &str) -> CoreResult<&EntityBinding> {
        self.bindings
            .iter()
            .find(|b| b.type_name == type_name)
            .ok_or_else(|| CoreError::UnknownEntity {
                type_name: type_name.to_string(),
            })
    }

    /// Iterates over bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityBinding> {
        self.bindings.iter()
    }

    /// Returns every registered local file path.
    pub fn local_paths(&self) -> Vec<PathBuf> {
        self.bindings.iter().map(|b| b.local_path.clone()).collect()
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Project, Task};

    #[test]
    fn conventional_names() {
        let binding = EntityBinding::conventional::<Task>(Path::new("data"));
        assert_eq!(binding.local_path, Path::new("data").join("tasks.csv"));
        assert_eq!(binding.remote_table, "task");
        assert_eq!(binding.columns, Task::COLUMNS);
    }

    #[test]
    fn lookup_in_registration_order() {
        let dir = Path::new("data");
        let mut registry = EntityRegistry::new();
        registry.register_conventional::<Task>(dir).unwrap();
        registry.register_conventional::<Project>(dir).unwrap();

        let names: Vec<_> = registry.iter().map(|b| b.type_name).collect();
        assert_eq!(names, vec!["Task", "Project"]);
        assert_eq!(registry.binding::<Project>().unwrap().remote_table, "project");
        assert!(matches!(
            registry.binding_by_name("Student"),
            Err(CoreError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn rejects_duplicates() {
        let dir = Path::new("data");
        let mut registry = EntityRegistry::new();
        registry.register_conventional::<Task>(dir).unwrap();

        assert!(matches!(
            registry.register_conventional::<Task>(dir),
            Err(CoreError::DuplicateEntity { .. })
        ));
        assert!(matches!(
            registry.register(EntityBinding::new::<Project>(dir.join("tasks.csv"), "project")),
            Err(CoreError::ResourceInUse { .. })
        ));
        assert!(matches!(
            registry.register(EntityBinding::new::<Project>(dir.join("projects.csv"), "TASK")),
            Err(CoreError::ResourceInUse { .. })
        ));
        assert_eq!(registry.len(), 1);
    }
}
