use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture, Ready};

use super::error::SourceError;
use super::matcher;
use super::option::SelectOption;

/// Looks up the options matching a query.
pub trait OptionLoader: 'static {
    type Error: Display;
    type Fut: Future<Output = Result<Vec<SelectOption>, Self::Error>> + 'static;

    fn load_options(&self, query: String) -> Self::Fut;
}

impl<F, Fut, E> OptionLoader for F
where
    F: Fn(String) -> Fut + 'static,
    Fut: Future<Output = Result<Vec<SelectOption>, E>> + 'static,
    E: Display,
{
    type Error = E;
    type Fut = Fut;

    fn load_options(&self, query: String) -> Self::Fut {
        (self)(query)
    }
}

/// Resolves the option for the value the widget was mounted with.
pub trait DefaultValueLoader: 'static {
    type Error: Display;
    type Fut: Future<Output = Result<SelectOption, Self::Error>> + 'static;

    fn load_default_value(&self) -> Self::Fut;
}

impl<F, Fut, E> DefaultValueLoader for F
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<SelectOption, E>> + 'static,
    E: Display,
{
    type Error = E;
    type Fut = Fut;

    fn load_default_value(&self) -> Self::Fut {
        (self)()
    }
}

/// Persists a new option typed by the user.
pub trait OptionCreator: 'static {
    type Error: Display;
    type Fut: Future<Output = Result<(), Self::Error>> + 'static;

    fn create_option(&self, label: String) -> Self::Fut;
}

impl<F, Fut, E> OptionCreator for F
where
    F: Fn(String) -> Fut + 'static,
    Fut: Future<Output = Result<(), E>> + 'static,
    E: Display,
{
    type Error = E;
    type Fut = Fut;

    fn create_option(&self, label: String) -> Self::Fut {
        (self)(label)
    }
}

pub(super) type LoadOptionsFn =
    Rc<dyn Fn(String) -> LocalBoxFuture<'static, Result<Vec<SelectOption>, String>>>;
pub(super) type LoadDefaultFn =
    Rc<dyn Fn() -> LocalBoxFuture<'static, Result<SelectOption, String>>>;
pub(super) type CreateOptionFn =
    Rc<dyn Fn(String) -> LocalBoxFuture<'static, Result<(), String>>>;

pub(super) fn erase_loader<L: OptionLoader>(loader: L) -> LoadOptionsFn {
    Rc::new(move |query: String| {
        let fut = loader.load_options(query);
        async move { fut.await.map_err(|error| error.to_string()) }.boxed_local()
    })
}

pub(super) fn erase_default_loader<L: DefaultValueLoader>(loader: L) -> LoadDefaultFn {
    Rc::new(move || {
        let fut = loader.load_default_value();
        async move { fut.await.map_err(|error| error.to_string()) }.boxed_local()
    })
}

pub(super) fn erase_creator<C: OptionCreator>(creator: C) -> CreateOptionFn {
    Rc::new(move |label: String| {
        let fut = creator.create_option(label);
        async move { fut.await.map_err(|error| error.to_string()) }.boxed_local()
    })
}

/// Shared in-memory option catalogue.
///
/// Searches with [`matches`](super::matches), creates options through the option
/// factory and resolves default values by value key. Clones share the same
/// catalogue, so an option created through one handle is visible to the others.
#[derive(Clone, Debug, Default)]
pub struct InMemoryOptionSource {
    options: Rc<RefCell<Vec<SelectOption>>>,
}

impl InMemoryOptionSource {
    pub fn new(options: Vec<SelectOption>) -> Self {
        Self {
            options: Rc::new(RefCell::new(options)),
        }
    }

    pub fn options(&self) -> Vec<SelectOption> {
        self.options.borrow().clone()
    }

    pub fn find(&self, value: &str) -> Option<SelectOption> {
        self.options
            .borrow()
            .iter()
            .find(|option| option.value() == value)
            .cloned()
    }

    pub fn search(&self, query: &str) -> Vec<SelectOption> {
        matcher::filter_options(&self.options.borrow(), query)
    }

    pub fn default_value_loader(
        &self,
        value: impl Into<String>,
    ) -> impl DefaultValueLoader<Error = SourceError> {
        let source = self.clone();
        let value = value.into();
        move || {
            future::ready(
                source
                    .find(&value)
                    .ok_or_else(|| SourceError::UnknownValue(value.clone())),
            )
        }
    }
}

impl OptionLoader for InMemoryOptionSource {
    type Error = Infallible;
    type Fut = Ready<Result<Vec<SelectOption>, Infallible>>;

    fn load_options(&self, query: String) -> Self::Fut {
        future::ready(Ok(self.search(&query)))
    }
}

impl OptionCreator for InMemoryOptionSource {
    type Error = Infallible;
    type Fut = Ready<Result<(), Infallible>>;

    fn create_option(&self, label: String) -> Self::Fut {
        self.options
            .borrow_mut()
            .push(SelectOption::from_label(label));
        future::ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn authors() -> InMemoryOptionSource {
        InMemoryOptionSource::new(vec![
            SelectOption::new("Jane Austen", "3"),
            SelectOption::new("Mark Twain", "5"),
        ])
    }

    #[test]
    fn loader_filters_with_matcher() {
        let source = authors();
        let found = block_on(source.load_options("TWA".into())).unwrap();
        assert_eq!(found, vec![SelectOption::new("Mark Twain", "5")]);
    }

    #[test]
    fn created_option_is_searchable_through_clones() {
        let source = authors();
        let other = source.clone();
        block_on(source.create_option("Ursula Le Guin".into())).unwrap();
        assert_eq!(
            other.search("guin"),
            vec![SelectOption::new("Ursula Le Guin", "ursula le guin")]
        );
    }

    #[test]
    fn default_loader_resolves_by_value() {
        let source = authors();
        let found = block_on(source.default_value_loader("3").load_default_value());
        assert_eq!(found, Ok(SelectOption::new("Jane Austen", "3")));

        let missing = block_on(source.default_value_loader("42").load_default_value());
        assert_eq!(missing, Err(SourceError::UnknownValue("42".into())));
    }

    #[test]
    fn erased_loader_stringifies_errors() {
        let loader = erase_loader(|_query: String| async {
            Err::<Vec<SelectOption>, _>(SourceError::UnknownValue("7".into()))
        });
        assert_eq!(
            block_on(loader("x".into())),
            Err("no option with value \"7\"".to_string())
        );
    }
}
