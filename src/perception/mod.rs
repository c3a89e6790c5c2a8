pub mod pipeline;
pub mod screenshot;
pub mod traits;
pub mod tree;
pub mod types;
pub mod ui_automation;
