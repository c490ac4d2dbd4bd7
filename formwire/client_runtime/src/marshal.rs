use std::collections::HashMap;

use crate::value::Value;
use crate::widget::{WidgetHandle, WidgetKind, WidgetTree, WidgetValue};

/// Applies one decoded value to a widget. `field` is the record field the
/// value arrived under, or `None` when the widget received a bare value.
pub type DecodeFn = fn(&mut dyn WidgetTree, WidgetHandle, Option<&str>, &Value);

/// Extracts the value to send back for a dirty widget, relative to the
/// widget's own path.
pub type EncodeFn = fn(&dyn WidgetTree, WidgetHandle) -> Option<Value>;

#[derive(Clone, Copy)]
pub struct Marshaller {
    pub fields: &'static [&'static str],
    pub decode: DecodeFn,
    pub encode: Option<EncodeFn>,
}

impl Marshaller {
    pub fn accepts(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }
}

#[derive(Clone, Default)]
pub struct MarshallerRegistry {
    table: HashMap<WidgetKind, Marshaller>,
}

impl MarshallerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(WidgetKind::Window, &["title"], decode_window, None);
        registry.register(WidgetKind::Entry, &["value"], decode_text, Some(encode_text));
        registry.register(
            WidgetKind::NumberEntry,
            &["value"],
            decode_number,
            Some(encode_number),
        );
        registry.register(WidgetKind::Text, &["value"], decode_text, Some(encode_long_text));
        registry.register(WidgetKind::Label, &["value"], decode_text, None);
        registry.register(WidgetKind::Combo, &["count", "item"], decode_items, None);
        registry.register(
            WidgetKind::CList,
            &["count", "row", "column", "item", "select"],
            decode_items,
            Some(encode_selection),
        );
        registry.register(
            WidgetKind::List,
            &["count", "row", "item", "select"],
            decode_items,
            Some(encode_selection),
        );
        registry.register(WidgetKind::Button, &["label"], decode_button, None);
        for toggle in [
            WidgetKind::ToggleButton,
            WidgetKind::CheckButton,
            WidgetKind::RadioButton,
        ] {
            registry.register(
                toggle,
                &["label", "isactive"],
                decode_toggle,
                Some(encode_toggle),
            );
        }
        registry.register(
            WidgetKind::Calendar,
            &["year", "month", "day"],
            decode_calendar,
            Some(encode_calendar),
        );
        registry.register(
            WidgetKind::Notebook,
            &["pageno"],
            decode_notebook,
            Some(encode_notebook),
        );
        registry.register(
            WidgetKind::ProgressBar,
            &["value"],
            decode_progress,
            Some(encode_progress),
        );
        registry
    }

    pub fn register(
        &mut self,
        kind: WidgetKind,
        fields: &'static [&'static str],
        decode: DecodeFn,
        encode: Option<EncodeFn>,
    ) {
        self.table.insert(
            kind,
            Marshaller {
                fields,
                decode,
                encode,
            },
        );
    }

    pub fn get(&self, kind: WidgetKind) -> Option<&Marshaller> {
        self.table.get(&kind)
    }

    /// Value to send for a dirty widget; `None` for read-only or
    /// unregistered kinds.
    pub fn encode(&self, tree: &dyn WidgetTree, handle: WidgetHandle) -> Option<Value> {
        let kind = tree.kind(handle)?;
        let encode = self.get(kind)?.encode?;
        encode(tree, handle)
    }
}

fn text_of(value: &Value) -> Option<String> {
    value.is_scalar().then(|| value.to_wire_text())
}

fn decode_window(tree: &mut dyn WidgetTree, handle: WidgetHandle, field: Option<&str>, value: &Value) {
    if field == Some("title") {
        if let Some(title) = text_of(value) {
            tree.apply(handle, WidgetValue::Text(title));
        }
    }
}

fn decode_text(tree: &mut dyn WidgetTree, handle: WidgetHandle, field: Option<&str>, value: &Value) {
    if matches!(field, None | Some("value")) {
        if let Some(text) = text_of(value) {
            tree.apply(handle, WidgetValue::Text(text));
        }
    }
}

fn decode_number(tree: &mut dyn WidgetTree, handle: WidgetHandle, field: Option<&str>, value: &Value) {
    if matches!(field, None | Some("value")) {
        if let Some(text) = text_of(value) {
            tree.apply(handle, WidgetValue::Number(text.trim().to_string()));
        }
    }
}

fn decode_button(tree: &mut dyn WidgetTree, handle: WidgetHandle, field: Option<&str>, value: &Value) {
    if matches!(field, None | Some("label")) {
        if let Some(label) = text_of(value) {
            tree.apply(handle, WidgetValue::Text(label));
        }
    }
}

fn decode_toggle(tree: &mut dyn WidgetTree, handle: WidgetHandle, field: Option<&str>, value: &Value) {
    match field {
        Some("label") => {
            if let Some(label) = text_of(value) {
                tree.apply(handle, WidgetValue::Text(label));
            }
        }
        None | Some("isactive") => {
            if let Some(active) = value.as_bool() {
                tree.apply(handle, WidgetValue::Active(active));
            }
        }
        Some(_) => {}
    }
}

fn decode_items(tree: &mut dyn WidgetTree, handle: WidgetHandle, field: Option<&str>, value: &Value) {
    match field {
        None | Some("item") => {
            if let Some(rows) = value.as_array() {
                tree.apply(handle, WidgetValue::Items(rows.iter().map(row_text).collect()));
            }
        }
        Some("select") => {
            if let Some(flags) = value.as_array() {
                let selection = flags
                    .iter()
                    .map(|flag| flag.as_bool().unwrap_or(false))
                    .collect();
                tree.apply(handle, WidgetValue::Selection(selection));
            }
        }
        Some(_) => {}
    }
}

fn row_text(row: &Value) -> String {
    match row {
        Value::Record(columns) => columns
            .iter()
            .map(|(_, column)| row_text(column))
            .collect::<Vec<_>>()
            .join("\t"),
        Value::Array(columns) => columns.iter().map(row_text).collect::<Vec<_>>().join("\t"),
        scalar => scalar.to_wire_text(),
    }
}

fn decode_calendar(
    tree: &mut dyn WidgetTree,
    handle: WidgetHandle,
    field: Option<&str>,
    value: &Value,
) {
    let Some(part) = value.as_int() else {
        return;
    };
    let (mut year, mut month, mut day) = match tree.current(handle) {
        Some(WidgetValue::Date { year, month, day }) => (year, month, day),
        _ => (0, 0, 0),
    };
    match field {
        Some("year") => year = part,
        Some("month") => month = part,
        Some("day") => day = part,
        _ => return,
    }
    tree.apply(handle, WidgetValue::Date { year, month, day });
}

fn decode_notebook(
    tree: &mut dyn WidgetTree,
    handle: WidgetHandle,
    field: Option<&str>,
    value: &Value,
) {
    if matches!(field, None | Some("pageno")) {
        if let Some(page) = value.as_int() {
            tree.apply(handle, WidgetValue::Integer(page));
        }
    }
}

fn decode_progress(
    tree: &mut dyn WidgetTree,
    handle: WidgetHandle,
    field: Option<&str>,
    value: &Value,
) {
    if matches!(field, None | Some("value")) {
        if let Some(progress) = value.as_int() {
            tree.apply(handle, WidgetValue::Integer(progress));
        }
    }
}

fn record(name: &str, value: Value) -> Value {
    Value::Record(vec![(name.to_string(), value)])
}

fn encode_text(tree: &dyn WidgetTree, handle: WidgetHandle) -> Option<Value> {
    match tree.current(handle)? {
        WidgetValue::Text(text) | WidgetValue::Number(text) => {
            Some(record("value", Value::VarChar(text)))
        }
        _ => None,
    }
}

fn encode_long_text(tree: &dyn WidgetTree, handle: WidgetHandle) -> Option<Value> {
    match tree.current(handle)? {
        WidgetValue::Text(text) => Some(record("value", Value::Text(text))),
        _ => None,
    }
}

fn encode_number(tree: &dyn WidgetTree, handle: WidgetHandle) -> Option<Value> {
    match tree.current(handle)? {
        WidgetValue::Number(text) | WidgetValue::Text(text) => {
            Some(record("value", Value::Number(text)))
        }
        WidgetValue::Integer(number) => Some(record("value", Value::Number(number.to_string()))),
        _ => None,
    }
}

fn encode_selection(tree: &dyn WidgetTree, handle: WidgetHandle) -> Option<Value> {
    match tree.current(handle)? {
        WidgetValue::Selection(flags) => Some(record(
            "select",
            Value::Array(flags.into_iter().map(Value::Bool).collect()),
        )),
        _ => None,
    }
}

fn encode_toggle(tree: &dyn WidgetTree, handle: WidgetHandle) -> Option<Value> {
    match tree.current(handle)? {
        WidgetValue::Active(active) => Some(record("isactive", Value::Bool(active))),
        _ => None,
    }
}

fn encode_calendar(tree: &dyn WidgetTree, handle: WidgetHandle) -> Option<Value> {
    match tree.current(handle)? {
        WidgetValue::Date { year, month, day } => Some(Value::Record(vec![
            ("year".to_string(), Value::Int(year)),
            ("month".to_string(), Value::Int(month)),
            ("day".to_string(), Value::Int(day)),
        ])),
        _ => None,
    }
}

fn encode_notebook(tree: &dyn WidgetTree, handle: WidgetHandle) -> Option<Value> {
    match tree.current(handle)? {
        WidgetValue::Integer(page) => Some(record("pageno", Value::Int(page))),
        _ => None,
    }
}

fn encode_progress(tree: &dyn WidgetTree, handle: WidgetHandle) -> Option<Value> {
    match tree.current(handle)? {
        WidgetValue::Integer(progress) => Some(record("value", Value::Int(progress))),
        _ => None,
    }
}
