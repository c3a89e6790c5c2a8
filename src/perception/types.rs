use serde::{Deserialize, Serialize};

/// UI Automation control types, keyed by their `UIA_*ControlTypeId` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlType {
    Button,
    Calendar,
    CheckBox,
    ComboBox,
    Edit,
    Hyperlink,
    Image,
    ListItem,
    List,
    Menu,
    MenuBar,
    MenuItem,
    ProgressBar,
    RadioButton,
    ScrollBar,
    Slider,
    Spinner,
    StatusBar,
    Tab,
    TabItem,
    Text,
    ToolBar,
    ToolTip,
    Tree,
    TreeItem,
    Custom,
    Group,
    Thumb,
    DataGrid,
    DataItem,
    Document,
    SplitButton,
    Window,
    Pane,
    Header,
    HeaderItem,
    Table,
    TitleBar,
    Separator,
}

const UIA_TABLE: [(i32, ControlType, &str); 39] = [
    (50000, ControlType::Button, "Button"),
    (50001, ControlType::Calendar, "Calendar"),
    (50002, ControlType::CheckBox, "CheckBox"),
    (50003, ControlType::ComboBox, "ComboBox"),
    (50004, ControlType::Edit, "Edit"),
    (50005, ControlType::Hyperlink, "Hyperlink"),
    (50006, ControlType::Image, "Image"),
    (50007, ControlType::ListItem, "ListItem"),
    (50008, ControlType::List, "List"),
    (50009, ControlType::Menu, "Menu"),
    (50010, ControlType::MenuBar, "MenuBar"),
    (50011, ControlType::MenuItem, "MenuItem"),
    (50012, ControlType::ProgressBar, "ProgressBar"),
    (50013, ControlType::RadioButton, "RadioButton"),
    (50014, ControlType::ScrollBar, "ScrollBar"),
    (50015, ControlType::Slider, "Slider"),
    (50016, ControlType::Spinner, "Spinner"),
    (50017, ControlType::StatusBar, "StatusBar"),
    (50018, ControlType::Tab, "Tab"),
    (50019, ControlType::TabItem, "TabItem"),
    (50020, ControlType::Text, "Text"),
    (50021, ControlType::ToolBar, "ToolBar"),
    (50022, ControlType::ToolTip, "ToolTip"),
    (50023, ControlType::Tree, "Tree"),
    (50024, ControlType::TreeItem, "TreeItem"),
    (50025, ControlType::Custom, "Custom"),
    (50026, ControlType::Group, "Group"),
    (50027, ControlType::Thumb, "Thumb"),
    (50028, ControlType::DataGrid, "DataGrid"),
    (50029, ControlType::DataItem, "DataItem"),
    (50030, ControlType::Document, "Document"),
    (50031, ControlType::SplitButton, "SplitButton"),
    (50032, ControlType::Window, "Window"),
    (50033, ControlType::Pane, "Pane"),
    (50034, ControlType::Header, "Header"),
    (50035, ControlType::HeaderItem, "HeaderItem"),
    (50036, ControlType::Table, "Table"),
    (50037, ControlType::TitleBar, "TitleBar"),
    (50038, ControlType::Separator, "Separator"),
];

impl ControlType {
    pub fn from_uia_id(id: i32) -> Option<Self> {
        UIA_TABLE.iter().find(|(i, _, _)| *i == id).map(|(_, ct, _)| *ct)
    }

    /// Exact programmatic name lookup ("Button", "Edit", ...). Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        UIA_TABLE.iter().find(|(_, _, n)| *n == name).map(|(_, ct, _)| *ct)
    }

    pub fn name(&self) -> &'static str {
        UIA_TABLE
            .iter()
            .find(|(_, ct, _)| ct == self)
            .map(|(_, _, n)| *n)
            .unwrap_or("Custom")
    }

    /// The closed set of control types that make it into a snapshot.
    pub fn is_interesting(&self) -> bool {
        matches!(
            self,
            ControlType::Button
                | ControlType::Edit
                | ControlType::CheckBox
                | ControlType::RadioButton
                | ControlType::ComboBox
                | ControlType::Hyperlink
                | ControlType::ListItem
                | ControlType::TabItem
        )
    }
}

impl std::fmt::Display for ControlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Screen-space rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left as f64,
            y: top as f64,
            width: (right - left).max(0) as f64,
            height: (bottom - top).max(0) as f64,
        }
    }
}

/// One interactable control captured by a snapshot. Rebuilt on every walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UIElement {
    pub name: String,
    pub control_type: ControlType,
    pub automation_id: String,
    pub bounding_rectangle: Rect,
}

/// Raw per-node properties as read from the live accessibility tree.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProperties {
    pub name: String,
    /// `None` when the platform reports a type id outside the known table.
    pub control_type: Option<ControlType>,
    pub automation_id: String,
    pub bounding_rectangle: Rect,
    pub is_offscreen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotMeta {
    pub width: u32,
    pub height: u32,
}

/// Everything the loop observed before one model call.
#[derive(Debug, Clone)]
pub struct Observation {
    pub image_base64: String,
    pub meta: ScreenshotMeta,
    /// Empty in coordinate mode.
    pub elements: Vec<UIElement>,
}
