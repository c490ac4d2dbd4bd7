use crate::value::Value;
use crate::widget::{WidgetHandle, WidgetTree};

/// Fields changed locally since the last flush, in first-touch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    fields: Vec<(String, WidgetHandle)>,
}

impl DirtySet {
    pub fn insert(&mut self, path: &str, handle: WidgetHandle) -> bool {
        if self.fields.iter().any(|(known, _)| known == path) {
            return false;
        }
        self.fields.push((path.to_string(), handle));
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.fields.iter().any(|(known, _)| known == path)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, WidgetHandle)> {
        self.fields
            .iter()
            .map(|(path, handle)| (path.as_str(), *handle))
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

/// A displayed screen: the widget tree built from its cached definition,
/// pending local edits, and the last data pushed by the server.
pub struct Window<T> {
    name: String,
    tree: T,
    dirty: DirtySet,
    model: Option<Value>,
}

impl<T: WidgetTree> Window<T> {
    pub fn new(name: impl Into<String>, tree: T) -> Self {
        Self {
            name: name.into(),
            tree,
            dirty: DirtySet::default(),
            model: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    pub(crate) fn dirty_mut(&mut self) -> &mut DirtySet {
        &mut self.dirty
    }

    pub fn model(&self) -> Option<&Value> {
        self.model.as_ref()
    }

    pub(crate) fn set_model(&mut self, model: Value) {
        self.model = Some(model);
    }

    pub fn model_json(&self) -> serde_json::Value {
        self.model
            .as_ref()
            .map_or(serde_json::Value::Null, Value::to_json)
    }

    pub(crate) fn into_tree(self) -> T {
        self.tree
    }
}
