//! Path template engine
//!
//! Templates are parsed once, before any download starts, and then rendered
//! once per item. Rendering is pure and total: unknown placeholders render
//! empty, and every substituted value is sanitized so it cannot introduce a
//! path separator or a `..` component. Only literal `/` in the template
//! produces directory boundaries.
//!
//! ```
//! use qobuz_dl::template::Template;
//!
//! let t = Template::parse("%{?is_multidisc,Disc {media_number}/|}{tracknumber}. {tracktitle}.{ext}").unwrap();
//! assert!(t.unknown_placeholders().is_empty());
//! ```

mod fields;
mod parser;

pub use fields::{BoolField, Condition, Field};
pub use parser::Node;

use crate::error::TemplateError;
use crate::types::ItemDescriptor;
use crate::utils::sanitize_component;
use std::path::{Path, PathBuf};

/// A parsed output path template
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse a template, failing on malformed conditional or placeholder syntax
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let nodes = parser::parse(source)?;
        let template = Self {
            source: source.to_string(),
            nodes,
        };
        for name in template.unknown_placeholders() {
            tracing::warn!(placeholder = %name, "Unknown template placeholder will render empty");
        }
        Ok(template)
    }

    /// The original template string
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder names that are not known fields
    pub fn unknown_placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_unknown(&self.nodes, &mut names);
        names
    }

    /// Render the relative path for an item, components joined with `/`
    ///
    /// Empty components (e.g. from an empty placeholder between two slashes)
    /// are collapsed and surrounding whitespace on each component is trimmed.
    pub fn render(&self, item: &ItemDescriptor) -> String {
        let mut raw = String::new();
        render_nodes(&self.nodes, item, &mut raw);
        raw.split('/')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Render the output path for an item under `root`
    pub fn render_path(&self, root: &Path, item: &ItemDescriptor) -> PathBuf {
        let rendered = self.render(item);
        let mut path = root.to_path_buf();
        for component in rendered.split('/') {
            path.push(component);
        }
        path
    }
}

impl std::str::FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::parse(s)
    }
}

fn render_nodes(nodes: &[Node], item: &ItemDescriptor, out: &mut String) {
    for node in nodes {
        match node {
            Node::Literal(text) => out.push_str(text),
            Node::Field(field) => out.push_str(&sanitize_component(&field.value(item))),
            Node::Unknown(_) => {}
            Node::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let branch = if condition.eval(item) { then } else { otherwise };
                render_nodes(branch, item, out);
            }
        }
    }
}

fn collect_unknown(nodes: &[Node], names: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Unknown(name) if !names.contains(name) => names.push(name.clone()),
            Node::Conditional {
                then, otherwise, ..
            } => {
                collect_unknown(then, names);
                collect_unknown(otherwise, names);
            }
            _ => {}
        }
    }
}
