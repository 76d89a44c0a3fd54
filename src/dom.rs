//! Thin helpers over kuchiki nodes: element construction, attributes, tree
//! surgery and inline `style` declarations.

use html5ever::{LocalName, Namespace, QualName};
use kuchiki::{Attribute, ExpandedName, NodeRef};
use std::rc::Rc;
use thiserror::Error;

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Error)]
pub enum DomError {
    #[error("anchor element has no parent")]
    Orphan,
}

pub fn create_element(tag: &str) -> NodeRef {
    let name = QualName::new(None, Namespace::from(HTML_NS), LocalName::from(tag));
    NodeRef::new_element(name, std::iter::empty::<(ExpandedName, Attribute)>())
}

pub fn text(content: &str) -> NodeRef {
    NodeRef::new_text(content)
}

pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element().map(|el| el.name.local.to_string())
}

/// Non-element nodes carry no attributes; writes to them are ignored.
pub fn set_attribute(node: &NodeRef, name: &str, value: &str) {
    if let Some(el) = node.as_element() {
        el.attributes.borrow_mut().insert(name, value.to_string());
    }
}

pub fn attribute(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|el| el.attributes.borrow().get(name).map(str::to_string))
}

pub fn has_attribute(node: &NodeRef, name: &str) -> bool {
    node.as_element()
        .is_some_and(|el| el.attributes.borrow().contains(name))
}

pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    Rc::ptr_eq(&a.0, &b.0)
}

pub fn clear_children(node: &NodeRef) {
    let existing: Vec<_> = node.children().collect();
    for child in existing {
        child.detach();
    }
}

pub fn insert_after(node: &NodeRef, anchor: &NodeRef) -> Result<(), DomError> {
    if anchor.parent().is_none() {
        return Err(DomError::Orphan);
    }
    anchor.insert_after(node.clone());
    Ok(())
}

pub fn select_first(root: &NodeRef, selector: &str) -> Option<NodeRef> {
    root.select_first(selector)
        .ok()
        .map(|found| found.as_node().clone())
}

pub fn set_style(node: &NodeRef, property: &str, value: &str) {
    let mut decls = declarations(node);
    match decls.iter_mut().find(|(name, _)| name == property) {
        Some(entry) => entry.1 = value.to_string(),
        None => decls.push((property.to_string(), value.to_string())),
    }
    let serialized = decls
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; ");
    set_attribute(node, "style", &serialized);
}

pub fn style(node: &NodeRef, property: &str) -> Option<String> {
    declarations(node)
        .into_iter()
        .find(|(name, _)| name == property)
        .map(|(_, value)| value)
}

fn declarations(node: &NodeRef) -> Vec<(String, String)> {
    let Some(raw) = attribute(node, "style") else {
        return Vec::new();
    };
    raw.split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
