mod engine;
mod error;
mod matcher;
mod option;
mod source;


pub use engine::{
    AsyncSelect, RequestTicket, SelectConfig, SelectId, SelectSnapshot, SelectStatus,
};
pub use error::{SelectError, SelectErrorKind, SourceError};
pub use matcher::{filter_options, matches};
pub use option::{OptionGroup, SelectOption, flatten_groups, make_option};
pub use source::{DefaultValueLoader, InMemoryOptionSource, OptionCreator, OptionLoader};
