use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WidgetKind {
    Window,
    Entry,
    NumberEntry,
    Text,
    Label,
    Combo,
    CList,
    Button,
    ToggleButton,
    CheckButton,
    RadioButton,
    List,
    Calendar,
    Notebook,
    ProgressBar,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 15] = [
        WidgetKind::Window,
        WidgetKind::Entry,
        WidgetKind::NumberEntry,
        WidgetKind::Text,
        WidgetKind::Label,
        WidgetKind::Combo,
        WidgetKind::CList,
        WidgetKind::Button,
        WidgetKind::ToggleButton,
        WidgetKind::CheckButton,
        WidgetKind::RadioButton,
        WidgetKind::List,
        WidgetKind::Calendar,
        WidgetKind::Notebook,
        WidgetKind::ProgressBar,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Window => "window",
            Self::Entry => "entry",
            Self::NumberEntry => "number_entry",
            Self::Text => "text",
            Self::Label => "label",
            Self::Combo => "combo",
            Self::CList => "clist",
            Self::Button => "button",
            Self::ToggleButton => "toggle_button",
            Self::CheckButton => "check_button",
            Self::RadioButton => "radio_button",
            Self::List => "list",
            Self::Calendar => "calendar",
            Self::Notebook => "notebook",
            Self::ProgressBar => "progress_bar",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetHandle(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetValue {
    Text(String),
    Number(String),
    Active(bool),
    Integer(i32),
    Items(Vec<String>),
    Selection(Vec<bool>),
    Date { year: i32, month: i32, day: i32 },
}

/// Addressable widget tree of one window, supplied by the GUI layer.
pub trait WidgetTree {
    fn resolve(&self, path: &str) -> Option<WidgetHandle>;

    fn kind(&self, handle: WidgetHandle) -> Option<WidgetKind>;

    fn long_name_of(&self, handle: WidgetHandle) -> Option<String>;

    fn focus(&mut self, handle: WidgetHandle);

    fn apply(&mut self, handle: WidgetHandle, value: WidgetValue);

    /// Current user-editable state of a widget, if it has any.
    fn current(&self, handle: WidgetHandle) -> Option<WidgetValue>;
}

/// Constructs widget trees from cached screen definitions.
///
/// `show`, `hide`, `reset_timer` and `settle` are notifications; the
/// defaults do nothing.
pub trait ScreenBuilder {
    type Tree: WidgetTree;

    fn build(&mut self, definition: &Path, window: &str) -> Result<Self::Tree, String>;

    fn show(&mut self, _window: &str, _tree: &mut Self::Tree) {}

    fn hide(&mut self, _window: &str, _tree: &mut Self::Tree) {}

    fn reset_timer(&mut self, _window: &str, _tree: &mut Self::Tree) {}

    /// Called with events suppressed after a round trip that changed windows.
    fn settle(&mut self) {}
}
