//! Handlebars templates for generated entity sources

use handlebars::Handlebars;
use serde::Serialize;

use abi_schema_core::{Error, Result};

/// Entity struct for one table
pub const ENTITY_TEMPLATE: &str = "entity";

/// Module index listing every entity
pub const ENTITIES_MOD_TEMPLATE: &str = "entities_mod";

/// Template manager for entity source generation
pub struct TemplateManager {
    handlebars: Handlebars<'static>,
}

impl TemplateManager {
    /// Create a new template manager and register all templates
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        // Output is Rust source, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self::register_templates(&mut handlebars)?;

        Ok(Self { handlebars })
    }

    fn register_templates(handlebars: &mut Handlebars) -> Result<()> {
        handlebars
            .register_template_string(ENTITY_TEMPLATE, include_str!("entity.hbs"))
            .map_err(|e| Error::config(format!("Failed to register {} template: {}", ENTITY_TEMPLATE, e)))?;

        handlebars
            .register_template_string(ENTITIES_MOD_TEMPLATE, include_str!("entities_mod.hbs"))
            .map_err(|e| {
                Error::config(format!("Failed to register {} template: {}", ENTITIES_MOD_TEMPLATE, e))
            })?;

        Ok(())
    }

    /// Render a template with the given data
    pub fn render<T: Serialize>(&self, template_name: &str, data: &T) -> Result<String> {
        self.handlebars
            .render(template_name, data)
            .map_err(|e| Error::config(format!("Failed to render template {}: {}", template_name, e)))
    }

    /// Names of the registered templates
    pub fn available_templates(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlebars.get_templates().keys().cloned().collect();
        names.sort();
        names
    }
}
