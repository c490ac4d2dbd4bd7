use std::collections::HashMap;
use std::fs;
use std::path::Path;

use formwire_client_runtime::{ScreenBuilder, WidgetHandle, WidgetKind, WidgetTree, WidgetValue};
use serde_json::{Value, json};
use tracing::{debug, info};

/// Widget tree without a display. Widgets exist once declared from the
/// command line; their last applied state is kept per facet.
#[derive(Debug, Default)]
pub struct CaptureTree {
    widgets: Vec<CapturedWidget>,
    by_name: HashMap<String, WidgetHandle>,
    focused: Option<WidgetHandle>,
}

#[derive(Debug)]
struct CapturedWidget {
    long_name: String,
    kind: WidgetKind,
    label: Option<String>,
    state: Option<WidgetValue>,
}

impl CaptureTree {
    pub fn declare(&mut self, long_name: &str, kind: WidgetKind) -> WidgetHandle {
        if let Some(handle) = self.by_name.get(long_name) {
            self.widgets[handle.0].kind = kind;
            return *handle;
        }
        let handle = WidgetHandle(self.widgets.len());
        self.widgets.push(CapturedWidget {
            long_name: long_name.to_string(),
            kind,
            label: None,
            state: None,
        });
        self.by_name.insert(long_name.to_string(), handle);
        handle
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused
            .and_then(|handle| self.widgets.get(handle.0))
            .map(|widget| widget.long_name.as_str())
    }

    pub fn snapshot(&self) -> Value {
        let widgets = self
            .widgets
            .iter()
            .map(|widget| {
                let entry = json!({
                    "kind": widget.kind.name(),
                    "label": widget.label,
                    "state": widget.state.as_ref().map(state_json),
                });
                (widget.long_name.clone(), entry)
            })
            .collect();
        Value::Object(widgets)
    }
}

fn state_json(value: &WidgetValue) -> Value {
    match value {
        WidgetValue::Text(text) | WidgetValue::Number(text) => json!(text),
        WidgetValue::Active(active) => json!(active),
        WidgetValue::Integer(number) => json!(number),
        WidgetValue::Items(items) => json!(items),
        WidgetValue::Selection(flags) => json!(flags),
        WidgetValue::Date { year, month, day } => json!(format!("{year:04}-{month:02}-{day:02}")),
    }
}

/// Kinds whose `Text` facet is a caption rather than user input.
fn text_is_label(kind: WidgetKind) -> bool {
    matches!(
        kind,
        WidgetKind::Window
            | WidgetKind::Button
            | WidgetKind::ToggleButton
            | WidgetKind::CheckButton
            | WidgetKind::RadioButton
    )
}

impl WidgetTree for CaptureTree {
    fn resolve(&self, path: &str) -> Option<WidgetHandle> {
        self.by_name.get(path).copied()
    }

    fn kind(&self, handle: WidgetHandle) -> Option<WidgetKind> {
        self.widgets.get(handle.0).map(|widget| widget.kind)
    }

    fn long_name_of(&self, handle: WidgetHandle) -> Option<String> {
        self.widgets.get(handle.0).map(|widget| widget.long_name.clone())
    }

    fn focus(&mut self, handle: WidgetHandle) {
        self.focused = Some(handle);
    }

    fn apply(&mut self, handle: WidgetHandle, value: WidgetValue) {
        let Some(widget) = self.widgets.get_mut(handle.0) else {
            return;
        };
        match value {
            WidgetValue::Text(text) if text_is_label(widget.kind) => widget.label = Some(text),
            // list contents are display-only; the selection is what gets sent back
            WidgetValue::Items(_) if matches!(widget.kind, WidgetKind::List | WidgetKind::CList) => {}
            other => widget.state = Some(other),
        }
    }

    fn current(&self, handle: WidgetHandle) -> Option<WidgetValue> {
        self.widgets.get(handle.0)?.state.clone()
    }
}

#[derive(Debug, Default)]
pub struct HeadlessBuilder;

impl ScreenBuilder for HeadlessBuilder {
    type Tree = CaptureTree;

    fn build(&mut self, definition: &Path, window: &str) -> Result<CaptureTree, String> {
        let metadata = fs::metadata(definition)
            .map_err(|err| format!("screen definition {}: {err}", definition.display()))?;
        debug!(window, bytes = metadata.len(), "building capture tree");
        let mut tree = CaptureTree::default();
        tree.declare(window, WidgetKind::Window);
        Ok(tree)
    }

    fn show(&mut self, window: &str, _tree: &mut CaptureTree) {
        info!(window, "window shown");
    }

    fn hide(&mut self, window: &str, _tree: &mut CaptureTree) {
        info!(window, "window hidden");
    }

    fn settle(&mut self) {
        debug!("windows settled");
    }
}
