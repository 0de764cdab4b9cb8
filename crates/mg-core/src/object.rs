//! The static object tree.
//!
//! Objects are wired once, own children and storages, and are never
//! reparented or destroyed before shutdown. A back-reference to the parent
//! is stored by name, never by shared ownership, so the kernel remains the
//! sole owner of the tree.

/// A node in the static object tree, identified by a dotted path.
#[derive(Debug, Clone)]
pub struct Object {
    name: String,
    path: String,
    children: Vec<String>,
}

impl Object {
    /// Creates a root object (no parent).
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { path: name.clone(), name, children: Vec::new() }
    }

    /// Creates a child of `parent`, recording the dotted path but not a
    /// strong reference back to it.
    #[must_use]
    pub fn child_of(parent: &Object, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = format!("{}.{}", parent.path, name);
        Self { path, name, children: Vec::new() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Records that a child with this name now exists under this object.
    /// Called by the child during wiring; this object does not own the
    /// child directly (ownership is whatever field holds it, typically a
    /// struct field on the parent component).
    pub fn register_child(&mut self, name: impl Into<String>) {
        self.children.push(name.into());
    }

    #[must_use]
    pub fn children(&self) -> &[String] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::Object;

    #[test]
    fn dotted_path_accumulates_through_generations() {
        let root = Object::root("cpu0");
        let dcache = Object::child_of(&root, "dcache");
        assert_eq!(dcache.path(), "cpu0.dcache");
        let line = Object::child_of(&dcache, "line0");
        assert_eq!(line.path(), "cpu0.dcache.line0");
    }
}
