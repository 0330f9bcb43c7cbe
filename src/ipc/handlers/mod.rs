pub mod core;
pub mod marks;
pub mod profile;
pub mod schemes;
pub mod semesters;
pub mod templates;
pub mod whatif;
