//! Renders the proxy configuration from the resolved service records.
//!
//! Pure: identical input renders byte-identical output. Undefined template
//! variables fail the render instead of silently emitting a broken config.

use std::path::Path;

use minijinja::Environment;

use crate::directory::model::ServiceRecord;

const DEFAULT_TEMPLATE: &str = include_str!("../templates/nginx.conf.jinja");

pub struct Renderer {
    template: String,
}

impl Renderer {
    /// Load the template from a path, or fall back to the built-in nginx
    /// template.
    pub fn from_path(path: Option<&Path>) -> std::io::Result<Self> {
        let template = match path {
            Some(path) => std::fs::read_to_string(path)?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(Self { template })
    }

    pub fn render(&self, services: &[ServiceRecord]) -> Result<String, minijinja::Error> {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        let template = env.template_from_str(&self.template)?;
        template.render(minijinja::context! { services })
    }
}
