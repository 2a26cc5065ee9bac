pub mod core;
pub mod dataset;
pub mod dropdowns;
pub mod editor;
pub mod overlay;
pub mod sections;
pub mod sidebar;
pub mod slots;
pub mod versions;
pub mod views;
