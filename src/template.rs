//! Template rendering seam.
//!
//! quill does not ship a template engine. A handler that returns a map with a
//! `__template__` key gets it rendered by whatever [`Templates`]
//! implementation the [`App`](crate::App) was given.

use serde_json::{Map, Value};

/// Key naming the template in a handler's returned map.
pub const TEMPLATE_KEY: &str = "__template__";

pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

pub trait Templates: Send + Sync + 'static {
    /// Renders template `name` with `context` (the handler's map, template
    /// key included) into HTML.
    fn render(&self, name: &str, context: &Map<String, Value>) -> Result<String, RenderError>;
}

/// Default for apps without templates: every render fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTemplates;

impl Templates for NoTemplates {
    fn render(&self, name: &str, _context: &Map<String, Value>) -> Result<String, RenderError> {
        Err(format!("no template engine configured to render `{name}`").into())
    }
}
