pub mod matcher;
pub mod model;

pub use matcher::{match_windows, Matcher};
pub use model::{
    DesktopMembership, WindowAction, WindowFilter, WindowRecord, WindowSnapshot, NO_ACTIVE_WINDOW,
};
