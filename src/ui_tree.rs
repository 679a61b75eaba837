use serde::{Deserialize, Serialize};

/// Owned snapshot of one element in the foreground window's element tree.
///
/// Clone, equality and drop walk the tree with an explicit stack, so trees of any
/// depth are safe to copy, compare and free. JSON input is capped at serde_json's
/// nesting limit.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UiNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Accessible label of the element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_description: Option<String>,
    /// Fully-qualified resource identifier, e.g. `com.example:id/header`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UiNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Identifier must equal a node's view id.
    ViewId,
    /// Identifier must occur, case-insensitively, in a node's text, label or view id.
    Keyword,
}

impl UiNode {
    pub fn with_view_id(view_id: impl Into<String>) -> Self {
        let mut node = Self::default();
        node.view_id = Some(view_id.into());
        node
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        let mut node = Self::default();
        node.text = Some(text.into());
        node
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        let mut node = Self::default();
        node.content_description = Some(label.into());
        node
    }

    pub fn child(mut self, node: UiNode) -> Self {
        self.children.push(node);
        self
    }

    /// Depth-first iterator over this node and all descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// All nodes in the subtree whose view id is exactly `view_id`.
    pub fn find_by_view_id(&self, view_id: &str) -> Vec<&UiNode> {
        if view_id.is_empty() {
            return Vec::new();
        }
        self.descendants()
            .filter(|node| node.view_id.as_deref() == Some(view_id))
            .collect()
    }

    /// Copy of this node's own fields, without children.
    fn shallow_copy(&self) -> Self {
        let mut node = Self::default();
        node.text.clone_from(&self.text);
        node.content_description.clone_from(&self.content_description);
        node.view_id.clone_from(&self.view_id);
        node.children = Vec::with_capacity(self.children.len());
        node
    }

    fn same_fields(&self, other: &Self) -> bool {
        self.text == other.text
            && self.content_description == other.content_description
            && self.view_id == other.view_id
            && self.children.len() == other.children.len()
    }

    fn contains_keyword_lower(&self, keyword_lower: &str) -> bool {
        [&self.text, &self.content_description, &self.view_id]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(keyword_lower))
    }
}

impl Clone for UiNode {
    fn clone(&self) -> Self {
        // Reverse pre-order finishes every child before its parent; finished
        // subtrees wait on `built` until the parent collects them.
        let order: Vec<&UiNode> = self.descendants().collect();
        let mut built: Vec<UiNode> = Vec::with_capacity(order.len());
        for source in order.into_iter().rev() {
            let mut copy = source.shallow_copy();
            let split = built.len().saturating_sub(source.children.len());
            copy.children = built.split_off(split);
            copy.children.reverse();
            built.push(copy);
        }
        built.pop().unwrap_or_default()
    }
}

impl PartialEq for UiNode {
    fn eq(&self, other: &Self) -> bool {
        // Pre-order plus child counts pins down the shape.
        let mut left = self.descendants();
        let mut right = other.descendants();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a.same_fields(b) => {}
                _ => return false,
            }
        }
    }
}

impl Eq for UiNode {}

impl Drop for UiNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a UiNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a UiNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reversed so siblings come out in document order.
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

pub fn matches<S: AsRef<str>>(root: &UiNode, identifiers: &[S], mode: MatchMode) -> bool {
    match mode {
        MatchMode::ViewId => contains_view_id(root, identifiers),
        MatchMode::Keyword => contains_keyword(root, identifiers),
    }
}

pub fn contains_view_id<S: AsRef<str>>(root: &UiNode, identifiers: &[S]) -> bool {
    let wanted: Vec<&str> = identifiers
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| !id.is_empty())
        .collect();
    if wanted.is_empty() {
        return false;
    }

    root.descendants().any(|node| {
        node.view_id
            .as_deref()
            .is_some_and(|view_id| wanted.contains(&view_id))
    })
}

pub fn contains_keyword<S: AsRef<str>>(root: &UiNode, keywords: &[S]) -> bool {
    let wanted: Vec<String> = keywords
        .iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if wanted.is_empty() {
        return false;
    }

    root.descendants()
        .any(|node| wanted.iter().any(|k| node.contains_keyword_lower(k)))
}
