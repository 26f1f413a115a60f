use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::{AbortHandle, Abortable};
use futures::task::{LocalSpawn, LocalSpawnExt};
use futures_timer::Delay;

use super::error::{SelectError, SelectErrorKind};
use super::matcher::normalize;
use super::option::SelectOption;
use super::source::{
    CreateOptionFn, DefaultValueLoader, LoadDefaultFn, LoadOptionsFn, OptionCreator,
    OptionLoader, erase_creator, erase_default_loader, erase_loader,
};

static SELECT_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SelectId(pub u64);

impl SelectId {
    pub fn next() -> Self {
        Self(SELECT_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

impl Display for SelectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "select-{}", self.0)
    }
}

/// Identity of one request within a lane. Tickets grow monotonically.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RequestTicket(pub u64);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SelectStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SelectConfig {
    /// Quiet period between the last keystroke and the option lookup.
    pub debounce: Duration,
    /// Reuse applied results when the same normalized query is typed again.
    pub cache_options: bool,
    /// Most queries kept in the result cache; the oldest entry goes first.
    pub cache_capacity: usize,
    /// Load the options for the empty query on mount.
    pub preload_options: bool,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            cache_options: false,
            cache_capacity: 64,
            preload_options: false,
        }
    }
}

impl SelectConfig {
    pub fn debounce(mut self, value: Duration) -> Self {
        self.debounce = value;
        self
    }

    pub fn cache_options(mut self, value: bool) -> Self {
        self.cache_options = value;
        self
    }

    pub fn cache_capacity(mut self, value: usize) -> Self {
        self.cache_capacity = value;
        self
    }

    pub fn preload_options(mut self, value: bool) -> Self {
        self.preload_options = value;
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectSnapshot {
    pub query: String,
    pub options: Vec<SelectOption>,
    pub selected: Option<SelectOption>,
    pub status: SelectStatus,
    pub pending_default: bool,
    pub creating: bool,
    pub error: Option<SelectError>,
}

#[derive(Clone, Copy, Debug, Default)]
struct LaneState {
    issued: RequestTicket,
    settled: RequestTicket,
}

impl LaneState {
    fn issue(&mut self) -> RequestTicket {
        self.issued = RequestTicket(self.issued.0 + 1);
        self.issued
    }

    fn is_latest(&self, ticket: RequestTicket) -> bool {
        self.issued == ticket
    }

    fn is_busy(&self) -> bool {
        self.settled != self.issued
    }

    fn settle(&mut self, ticket: RequestTicket) {
        self.settled = ticket;
    }

    /// Invalidates whatever is in flight without starting a new request.
    fn supersede(&mut self) {
        let ticket = self.issue();
        self.settle(ticket);
    }
}

#[derive(Default)]
struct SelectState {
    query: String,
    options: Vec<SelectOption>,
    selected: Option<SelectOption>,
    status: SelectStatus,
    pending_default: bool,
    default_resolved: bool,
    creating: bool,
    error: Option<SelectError>,
    search: LaneState,
    default: LaneState,
    create: LaneState,
    pending_dispatch: Option<AbortHandle>,
    cache: BTreeMap<String, Vec<SelectOption>>,
    cache_order: VecDeque<String>,
    disposed: bool,
}

impl SelectState {
    fn set_status(&mut self, status: SelectStatus) {
        self.status = status;
        if status != SelectStatus::Error {
            self.error = None;
        }
    }

    fn fail(&mut self, error: SelectError) {
        self.status = SelectStatus::Error;
        self.error = Some(error);
    }

    fn take_selection(&mut self, option: Option<SelectOption>) {
        self.selected = option;
        if self.pending_default {
            self.default.supersede();
            self.pending_default = false;
            self.default_resolved = true;
            self.finish_loading_if_idle();
        }
    }

    fn failed_with(&self, kind: SelectErrorKind) -> bool {
        self.error.as_ref().is_some_and(|error| error.kind() == kind)
    }

    /// Leaves an `Error` status that a later success on the same lane made
    /// obsolete.
    fn recover_from(&mut self, kind: SelectErrorKind) {
        if self.failed_with(kind) {
            let status = if self.search.is_busy() {
                SelectStatus::Loading
            } else {
                SelectStatus::Loaded
            };
            self.set_status(status);
        }
    }

    fn finish_loading_if_idle(&mut self) {
        if self.status == SelectStatus::Loading && !self.search.is_busy() {
            self.set_status(SelectStatus::Loaded);
        }
    }

    /// Stores `options` under `key`, evicting the oldest entries past
    /// `capacity`.
    fn cache_insert(&mut self, key: String, options: Vec<SelectOption>, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.cache.insert(key.clone(), options).is_none() {
            self.cache_order.push_back(key);
        }
        while self.cache_order.len() > capacity {
            if let Some(oldest) = self.cache_order.pop_front() {
                self.cache.remove(&oldest);
            }
        }
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
        self.cache_order.clear();
    }

    fn snapshot(&self) -> SelectSnapshot {
        SelectSnapshot {
            query: self.query.clone(),
            options: self.options.clone(),
            selected: self.selected.clone(),
            status: self.status,
            pending_default: self.pending_default,
            creating: self.creating,
            error: self.error.clone(),
        }
    }
}

type ChangeHandler = Rc<dyn Fn(Option<&SelectOption>)>;
type RefreshHandler = Rc<dyn Fn()>;

struct Hooks {
    load_options: LoadOptionsFn,
    load_default: Option<LoadDefaultFn>,
    create_option: Option<CreateOptionFn>,
    on_change: Option<ChangeHandler>,
    on_refresh: Option<RefreshHandler>,
}

struct Inner {
    id: SelectId,
    config: SelectConfig,
    spawner: Rc<dyn LocalSpawn>,
    state: RefCell<SelectState>,
    hooks: RefCell<Hooks>,
}

/// Searchable select engine backed by asynchronous collaborators.
///
/// Requests run on three independent lanes (search, default value, create).
/// Each lane hands out increasing [`RequestTicket`]s and only the latest
/// ticket of a lane may touch the state; anything older is dropped when it
/// settles. Collaborator futures are never aborted, their results are simply
/// discarded.
///
/// All work is spawned on the supplied [`LocalSpawn`] executor and the state
/// is only mutated between awaits, so the engine is meant to live on a single
/// event loop. Dropping the engine discards every in-flight result.
pub struct AsyncSelect {
    inner: Rc<Inner>,
}

impl AsyncSelect {
    pub fn new<S, L>(spawner: S, loader: L, config: SelectConfig) -> Self
    where
        S: LocalSpawn + 'static,
        L: OptionLoader,
    {
        Self {
            inner: Rc::new(Inner {
                id: SelectId::next(),
                config,
                spawner: Rc::new(spawner),
                state: RefCell::new(SelectState::default()),
                hooks: RefCell::new(Hooks {
                    load_options: erase_loader(loader),
                    load_default: None,
                    create_option: None,
                    on_change: None,
                    on_refresh: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> SelectId {
        self.inner.id
    }

    pub fn config(&self) -> SelectConfig {
        self.inner.config
    }

    pub fn register_default_value_loader<L>(&self, loader: L)
    where
        L: DefaultValueLoader,
    {
        self.inner.hooks.borrow_mut().load_default = Some(erase_default_loader(loader));
    }

    pub fn register_option_creator<C>(&self, creator: C)
    where
        C: OptionCreator,
    {
        self.inner.hooks.borrow_mut().create_option = Some(erase_creator(creator));
    }

    /// Called with the new selection after `select`, `clear_selection` and a
    /// successful `create_option`. Default value resolution does not call it.
    pub fn register_change_handler(&self, handler: impl Fn(Option<&SelectOption>) + 'static) {
        self.inner.hooks.borrow_mut().on_change = Some(Rc::new(handler));
    }

    /// Called after every asynchronous settlement that changed the state.
    pub fn register_refresh_handler(&self, handler: impl Fn() + 'static) {
        self.inner.hooks.borrow_mut().on_refresh = Some(Rc::new(handler));
    }

    pub fn mount(&self) {
        if self.inner.config.preload_options {
            self.issue_query(String::new(), Duration::ZERO);
        }
        let _ = self.initialize_default();
    }

    pub fn set_query(&self, text: impl Into<String>) -> RequestTicket {
        self.issue_query(text.into(), self.inner.config.debounce)
    }

    fn issue_query(&self, query: String, delay: Duration) -> RequestTicket {
        let (ticket, registration) = {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                tracing::trace!(select = %self.inner.id, "ignoring query on disposed select");
                return state.search.issued;
            }
            state.query = query.clone();
            let ticket = state.search.issue();
            if let Some(pending) = state.pending_dispatch.take() {
                pending.abort();
            }

            let cached = if self.inner.config.cache_options {
                state.cache.get(&normalize(&query)).cloned()
            } else {
                None
            };
            if let Some(cached) = cached {
                state.options = cached;
                state.search.settle(ticket);
                state.set_status(SelectStatus::Loaded);
                tracing::debug!(
                    select = %self.inner.id,
                    ticket = ticket.0,
                    "served options from cache"
                );
                return ticket;
            }

            state.set_status(SelectStatus::Loading);
            let registration = if delay.is_zero() {
                None
            } else {
                let (handle, registration) = AbortHandle::new_pair();
                state.pending_dispatch = Some(handle);
                Some(registration)
            };
            (ticket, registration)
        };

        let timer =
            registration.map(|registration| Abortable::new(Delay::new(delay), registration));
        let load = self.inner.hooks.borrow().load_options.clone();
        let weak = Rc::downgrade(&self.inner);
        let dispatched_query = query.clone();
        let task = async move {
            if let Some(timer) = timer {
                if timer.await.is_err() {
                    return;
                }
            }
            if !Inner::begin_dispatch(&weak, ticket) {
                return;
            }

            let result = load(dispatched_query.clone()).await;
            if let Some(inner) = weak.upgrade() {
                let result = result.map_err(|message| SelectError::LoadFailure {
                    query: dispatched_query,
                    message,
                });
                let _ = inner.settle_search(ticket, result);
            }
        };

        if let Err(error) = self.inner.spawner.spawn_local(task) {
            tracing::warn!(select = %self.inner.id, %error, "failed to schedule option load");
            let _ = self.inner.settle_search(
                ticket,
                Err(SelectError::LoadFailure {
                    query,
                    message: error.to_string(),
                }),
            );
        }
        ticket
    }

    /// Applies a search-lane result if `ticket` is still the latest one.
    ///
    /// Returns whether the result was applied.
    pub fn on_load_settled(
        &self,
        ticket: RequestTicket,
        result: Result<Vec<SelectOption>, SelectError>,
    ) -> bool {
        self.inner.settle_search(ticket, result)
    }

    /// Starts resolving the mount-time value through the registered default
    /// value loader.
    ///
    /// Returns `false` without issuing anything when no loader is registered,
    /// a resolution is already pending, or the default was already resolved.
    /// After a failed resolution it may be called again.
    pub fn initialize_default(&self) -> bool {
        let Some(load) = self.inner.hooks.borrow().load_default.clone() else {
            return false;
        };
        let ticket = {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed || state.pending_default || state.default_resolved {
                return false;
            }
            let ticket = state.default.issue();
            state.pending_default = true;
            if state.status == SelectStatus::Idle
                || state.failed_with(SelectErrorKind::DefaultLoad)
            {
                state.set_status(SelectStatus::Loading);
            }
            ticket
        };

        tracing::debug!(select = %self.inner.id, ticket = ticket.0, "resolving default value");
        let weak = Rc::downgrade(&self.inner);
        let task = async move {
            let result = load().await;
            if let Some(inner) = weak.upgrade() {
                let result =
                    result.map_err(|message| SelectError::DefaultLoadFailure { message });
                let _ = inner.settle_default(ticket, result);
            }
        };

        if let Err(error) = self.inner.spawner.spawn_local(task) {
            tracing::warn!(select = %self.inner.id, %error, "failed to schedule default value load");
            let _ = self.inner.settle_default(
                ticket,
                Err(SelectError::DefaultLoadFailure {
                    message: error.to_string(),
                }),
            );
        }
        true
    }

    pub fn select(&self, option: SelectOption) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.take_selection(Some(option.clone()));
        }
        self.inner.notify_change(Some(&option));
    }

    pub fn clear_selection(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.take_selection(None);
        }
        self.inner.notify_change(None);
    }

    /// Creates `label` through the registered option creator, then appends
    /// and selects the option built from it.
    pub fn create_option(&self, label: impl Into<String>) -> RequestTicket {
        let label = label.into();
        let creator = self.inner.hooks.borrow().create_option.clone();
        let ticket = {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                return state.create.issued;
            }
            state.creating = true;
            state.create.issue()
        };

        let Some(creator) = creator else {
            let _ = self.inner.settle_create(
                ticket,
                label,
                Err("no option creator registered".to_string()),
            );
            return ticket;
        };

        tracing::debug!(select = %self.inner.id, ticket = ticket.0, %label, "creating option");
        let weak = Rc::downgrade(&self.inner);
        let created_label = label.clone();
        let task = async move {
            let result = creator(created_label.clone()).await;
            if let Some(inner) = weak.upgrade() {
                let _ = inner.settle_create(ticket, created_label, result);
            }
        };

        if let Err(error) = self.inner.spawner.spawn_local(task) {
            tracing::warn!(select = %self.inner.id, %error, "failed to schedule option creation");
            let _ = self
                .inner
                .settle_create(ticket, label, Err(error.to_string()));
        }
        ticket
    }

    /// Whether `label` would make a meaningful new option: not blank and not
    /// already present among the loaded options.
    pub fn can_create(&self, label: &str) -> bool {
        let label = normalize(label);
        if label.is_empty() {
            return false;
        }
        self.inner.state.borrow().options.iter().all(|option| {
            normalize(option.label()) != label && normalize(option.value()) != label
        })
    }

    /// Tears the engine down: pending dispatches are aborted, in-flight
    /// results will be discarded and later operations are ignored.
    pub fn dispose(&self) {
        let mut state = self.inner.state.borrow_mut();
        if state.disposed {
            return;
        }
        state.disposed = true;
        if let Some(pending) = state.pending_dispatch.take() {
            pending.abort();
        }
        state.search.supersede();
        state.default.supersede();
        state.create.supersede();
        state.pending_default = false;
        state.creating = false;
        tracing::trace!(select = %self.inner.id, "disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    pub fn snapshot(&self) -> SelectSnapshot {
        self.inner.state.borrow().snapshot()
    }

    pub fn status(&self) -> SelectStatus {
        self.inner.state.borrow().status
    }

    pub fn query(&self) -> String {
        self.inner.state.borrow().query.clone()
    }

    pub fn options(&self) -> Vec<SelectOption> {
        self.inner.state.borrow().options.clone()
    }

    pub fn selected(&self) -> Option<SelectOption> {
        self.inner.state.borrow().selected.clone()
    }

    pub fn error(&self) -> Option<SelectError> {
        self.inner.state.borrow().error.clone()
    }

    pub fn is_pending_default(&self) -> bool {
        self.inner.state.borrow().pending_default
    }

    pub fn is_creating(&self) -> bool {
        self.inner.state.borrow().creating
    }
}

impl Drop for AsyncSelect {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Inner {
    /// Second look at a debounced dispatch once its timer fired.
    fn begin_dispatch(weak: &Weak<Inner>, ticket: RequestTicket) -> bool {
        let Some(inner) = weak.upgrade() else {
            return false;
        };
        let mut state = inner.state.borrow_mut();
        if state.disposed || !state.search.is_latest(ticket) {
            tracing::trace!(select = %inner.id, ticket = ticket.0, "skipping superseded dispatch");
            return false;
        }
        state.pending_dispatch = None;
        tracing::debug!(
            select = %inner.id,
            ticket = ticket.0,
            query = %state.query,
            "dispatching option load"
        );
        true
    }

    fn settle_search(
        &self,
        ticket: RequestTicket,
        result: Result<Vec<SelectOption>, SelectError>,
    ) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if state.disposed || !state.search.is_latest(ticket) {
                tracing::trace!(select = %self.id, ticket = ticket.0, "dropping stale option load");
                return false;
            }
            state.search.settle(ticket);
            match result {
                Ok(options) => {
                    if self.config.cache_options {
                        let key = normalize(&state.query);
                        state.cache_insert(key, options.clone(), self.config.cache_capacity);
                    }
                    state.options = options;
                    state.set_status(SelectStatus::Loaded);
                }
                Err(error) => {
                    tracing::warn!(select = %self.id, ticket = ticket.0, %error, "option load failed");
                    state.fail(error);
                }
            }
        }
        self.notify_refresh();
        true
    }

    fn settle_default(
        &self,
        ticket: RequestTicket,
        result: Result<SelectOption, SelectError>,
    ) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if state.disposed || !state.default.is_latest(ticket) {
                tracing::trace!(select = %self.id, ticket = ticket.0, "dropping stale default value");
                return false;
            }
            state.default.settle(ticket);
            state.pending_default = false;
            match result {
                Ok(option) => {
                    state.selected = Some(option);
                    state.default_resolved = true;
                    state.recover_from(SelectErrorKind::DefaultLoad);
                    state.finish_loading_if_idle();
                }
                Err(error) => {
                    tracing::warn!(select = %self.id, %error, "default value load failed");
                    state.fail(error);
                }
            }
        }
        self.notify_refresh();
        true
    }

    fn settle_create(
        &self,
        ticket: RequestTicket,
        label: String,
        result: Result<(), String>,
    ) -> bool {
        let created = {
            let mut state = self.state.borrow_mut();
            if state.disposed || !state.create.is_latest(ticket) {
                tracing::trace!(select = %self.id, ticket = ticket.0, "dropping stale option creation");
                return false;
            }
            state.create.settle(ticket);
            state.creating = false;
            match result {
                Ok(()) => {
                    let option = SelectOption::from_label(label);
                    if !state
                        .options
                        .iter()
                        .any(|existing| existing.value() == option.value())
                    {
                        state.options.push(option.clone());
                    }
                    state.clear_cache();
                    state.take_selection(Some(option.clone()));
                    state.recover_from(SelectErrorKind::Create);
                    Some(option)
                }
                Err(message) => {
                    let error = SelectError::CreateFailure { label, message };
                    tracing::warn!(select = %self.id, %error, "option creation failed");
                    state.fail(error);
                    None
                }
            }
        };
        self.notify_refresh();
        if let Some(option) = created {
            self.notify_change(Some(&option));
        }
        true
    }

    fn notify_change(&self, selected: Option<&SelectOption>) {
        let handler = self.hooks.borrow().on_change.clone();
        if let Some(handler) = handler {
            handler(selected);
        }
    }

    fn notify_refresh(&self) {
        let handler = self.hooks.borrow().on_refresh.clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}
