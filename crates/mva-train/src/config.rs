//! Variant configuration sections.
//!
//! Processor configuration arrives as an XML element inside the
//! orchestrator's configuration document; each variant parses its own
//! section. Structural problems are fatal configuration errors and are
//! never retried.

use mva_core::{Error, Result};

/// Parsed `<method>` section of an artifact-embedding processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodConfig {
    /// Toolkit method type identifier (e.g. `"BDT"`).
    pub method_type: String,
    /// Method instance name; keys the weights file on disk.
    pub name: String,
    /// Free-text description forwarded verbatim to the toolkit.
    pub description: String,
}

/// Parse the `<method type=".." name="..">description</method>` child of a
/// processor configuration element.
///
/// # Errors
///
/// [`Error::Config`] when the method element is missing, its attributes are
/// absent, or superfluous elements trail it.
pub fn parse_method(elem: roxmltree::Node<'_, '_>) -> Result<MethodConfig> {
    let mut children = elem.children().filter(roxmltree::Node::is_element);

    let node = children
        .next()
        .ok_or_else(|| Error::Config("expected method element in config section".into()))?;
    if node.tag_name().name() != "method" {
        return Err(Error::Config(format!(
            "expected method element in config section, found '{}'",
            node.tag_name().name()
        )));
    }
    if children.next().is_some() {
        return Err(Error::Config("superfluous elements in config section".into()));
    }

    let method_type = node
        .attribute("type")
        .ok_or_else(|| Error::Config("method element lacks a type attribute".into()))?;
    let name = node
        .attribute("name")
        .ok_or_else(|| Error::Config("method element lacks a name attribute".into()))?;
    let description = node.text().unwrap_or("").trim().to_string();

    Ok(MethodConfig {
        method_type: method_type.to_string(),
        name: name.to_string(),
        description,
    })
}
