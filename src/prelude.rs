pub use crate::select::{
    AsyncSelect, DefaultValueLoader, InMemoryOptionSource, OptionCreator, OptionGroup,
    OptionLoader, RequestTicket, SelectConfig, SelectError, SelectErrorKind, SelectOption,
    SelectSnapshot, SelectStatus, SourceError, filter_options, flatten_groups, make_option,
    matches,
};
