//! Model registry and convention-based type resolution

use crate::model::{ModelDescriptor, TopicModel};
use dashmap::DashMap;
use std::sync::Arc;

/// Descriptor name a content type resolves to by convention.
pub fn convention_model_name(content_type: &str) -> String {
    format!("{content_type}ViewModel")
}

/// Registry of model descriptors, keyed by name.
///
/// Resolution by content type follows the `{ContentType}ViewModel`
/// convention; the outcome is cached per content type, including misses.
/// Registration is expected to happen at startup, before lookups begin.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: DashMap<String, Arc<ModelDescriptor>>,
    conventions: DashMap<String, Option<String>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed view model under its descriptor's name.
    pub fn register<M: TopicModel>(&self) {
        self.register_descriptor(M::descriptor());
    }

    /// Register a descriptor directly, replacing any previous one of the
    /// same name.
    pub fn register_descriptor(&self, descriptor: ModelDescriptor) {
        self.models
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.models.get(name).map(|guard| guard.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Resolve a content type to its conventional descriptor.
    pub fn resolve_content_type(&self, content_type: &str) -> Option<Arc<ModelDescriptor>> {
        let resolved = self
            .conventions
            .entry(content_type.to_string())
            .or_insert_with(|| {
                let candidate = convention_model_name(content_type);
                self.models.contains_key(&candidate).then_some(candidate)
            })
            .clone();
        resolved.and_then(|name| self.get(&name))
    }

    /// Whether `model` is `target` or transitively extends it.
    pub fn is_assignable(&self, model: &str, target: &str) -> bool {
        if model == target {
            return true;
        }
        let mut current = self.get(model);
        while let Some(descriptor) = current {
            match descriptor.extends.as_deref() {
                Some(parent) if parent == target => return true,
                Some(parent) => current = self.get(parent),
                None => return false,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertySpec;

    fn registry_with(names: &[(&str, Option<&str>)]) -> ModelRegistry {
        let registry = ModelRegistry::new();
        for (name, extends) in names {
            let mut descriptor =
                ModelDescriptor::new(*name).with_property(PropertySpec::string("Key"));
            if let Some(parent) = extends {
                descriptor = descriptor.extends(*parent);
            }
            registry.register_descriptor(descriptor);
        }
        registry
    }

    #[test]
    fn convention_resolution_appends_view_model() {
        let registry = registry_with(&[("PageViewModel", None)]);
        assert!(registry.resolve_content_type("Page").is_some());
        assert!(registry.resolve_content_type("Video").is_none());
    }

    #[test]
    fn convention_misses_are_cached() {
        let registry = registry_with(&[]);
        assert!(registry.resolve_content_type("Page").is_none());
        // A later registration does not refresh the cached miss.
        registry.register_descriptor(ModelDescriptor::new("PageViewModel"));
        assert!(registry.resolve_content_type("Page").is_none());
    }

    #[test]
    fn assignability_walks_the_extends_chain() {
        let registry = registry_with(&[
            ("TopicViewModel", None),
            ("PageViewModel", Some("TopicViewModel")),
            ("LandingPageViewModel", Some("PageViewModel")),
            ("VideoViewModel", Some("TopicViewModel")),
        ]);
        assert!(registry.is_assignable("PageViewModel", "PageViewModel"));
        assert!(registry.is_assignable("PageViewModel", "TopicViewModel"));
        assert!(registry.is_assignable("LandingPageViewModel", "TopicViewModel"));
        assert!(!registry.is_assignable("TopicViewModel", "PageViewModel"));
        assert!(!registry.is_assignable("VideoViewModel", "PageViewModel"));
        assert!(!registry.is_assignable("Unregistered", "TopicViewModel"));
    }
}
