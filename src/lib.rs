pub mod prelude;
pub mod select;

pub use select::{AsyncSelect, SelectConfig, SelectOption, SelectStatus};
