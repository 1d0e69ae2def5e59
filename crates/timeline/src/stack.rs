use std::cell::RefCell;
use std::rc::Rc;

use catalog::{CommonStrata, Model, ModelError};
use foundation::ids::ModelId;
use runtime::{Observable, ReactionHandle, action, autorun, reaction, untracked};

use crate::clock::{Clock, reconcile};
use crate::time_varying::{PlaceholderRegistry, TimeVarying};

type Item = Rc<dyn TimeVarying>;

/// Time-varying items in z-order; the last one drives the shared clock.
///
/// Every stack mutation rebinds the clock in the same action. After
/// [`TimelineStack::activate`], the clock also follows changes to the top
/// item's own definition, and play/pause toggles on the clock are written
/// back into the items.
pub struct TimelineStack {
    items: Observable<Vec<Item>>,
    clock: Observable<Clock>,
    registry: Rc<dyn PlaceholderRegistry>,
    placeholder: Observable<Option<Item>>,
    reactions: RefCell<Vec<ReactionHandle>>,
}

impl TimelineStack {
    pub fn new(registry: Rc<dyn PlaceholderRegistry>) -> Self {
        Self {
            items: Observable::new("timeline.items", Vec::new()),
            clock: Observable::new("timeline.clock", Clock::stopped()),
            registry,
            placeholder: Observable::new("timeline.placeholder", None),
            reactions: RefCell::new(Vec::new()),
        }
    }

    /// Puts `item` on top, moving it if it is already stacked.
    pub fn add_to_top(&self, item: Item) {
        let id = item.id();
        action(|| {
            self.items.update(|items| {
                items.retain(|i| i.id() != id);
                items.push(item);
            });
            self.reconcile_clock();
        });
        tracing::debug!(item = %id, "timeline top changed");
    }

    pub fn add_layer_to_top(&self, layer: &Model) {
        self.add_to_top(Rc::new(layer.clone()));
    }

    /// Returns `false` if `id` was not stacked.
    pub fn remove(&self, id: &ModelId) -> bool {
        action(|| {
            let removed = self.items.with_untracked(|items| items.iter().any(|i| &i.id() == id));
            if removed {
                self.items.update(|items| items.retain(|i| &i.id() != id));
                self.reconcile_clock();
            }
            removed
        })
    }

    pub fn remove_layer(&self, layer: &Model) -> bool {
        self.remove(layer.unique_id())
    }

    pub fn top(&self) -> Option<Item> {
        self.items.with(|items| items.last().cloned())
    }

    pub fn top_layer(&self) -> Option<ModelId> {
        self.top().map(|item| item.id())
    }

    pub fn contains(&self, id: &ModelId) -> bool {
        self.items.with(|items| items.iter().any(|i| &i.id() == id))
    }

    /// Moves an already stacked item to the top. Returns `false` if it is not
    /// stacked.
    pub fn promote_to_top(&self, id: &ModelId) -> bool {
        let item = self
            .items
            .with_untracked(|items| items.iter().find(|i| &i.id() == id).cloned());
        match item {
            Some(item) => {
                self.add_to_top(item);
                true
            }
            None => false,
        }
    }

    /// Stacked ids, bottom first.
    pub fn item_ids(&self) -> Vec<ModelId> {
        self.items.with(|items| items.iter().map(|i| i.id()).collect())
    }

    pub fn len(&self) -> usize {
        self.items.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clock(&self) -> Clock {
        self.clock.get()
    }

    /// Play or pause. With an active stack the new state is written back into
    /// the stacked items. A clock with no item bound stays stopped.
    pub fn set_should_animate(&self, should_animate: bool) {
        self.clock.update(|clock| {
            if should_animate && clock.bound_item.is_none() {
                tracing::debug!("ignoring play with nothing on the timeline");
            }
            clock.should_animate = should_animate && clock.bound_item.is_some();
        });
    }

    /// Advances the clock by `dt` real seconds and syncs every item to it.
    pub fn tick(&self, dt: f64) -> Result<(), ModelError> {
        action(|| {
            let next = self.clock.with_untracked(|clock| clock.tick(dt));
            if self.clock.set(next) {
                sync_to_clock(&self.items, &self.clock, CommonStrata::USER)
            } else {
                Ok(())
            }
        })
    }

    /// Writes the clock's current time and paused state into `stratum` of
    /// every stacked item.
    pub fn sync_to_clock(&self, stratum: &str) -> Result<(), ModelError> {
        sync_to_clock(&self.items, &self.clock, stratum)
    }

    /// Starts following the top item's clock definition and writing
    /// play/pause changes back into the items. Idempotent.
    pub fn activate(&self) {
        if !self.reactions.borrow().is_empty() {
            return;
        }
        let follow_top = {
            let (items, clock) = (self.items.clone(), self.clock.clone());
            autorun("timeline.follow-top", move || {
                let top = items.with(|items| items.last().cloned());
                let definition = top.as_ref().and_then(|item| item.clock_definition());
                let id = top.as_ref().map(|item| item.id());
                let next = untracked(|| {
                    let top = id.as_ref().zip(definition.as_ref());
                    clock.with(|previous| reconcile(top, previous))
                });
                clock.set(next);
            })
        };
        let play_state = {
            let (items, clock) = (self.items.clone(), self.clock.clone());
            let watched = self.clock.clone();
            reaction(
                "timeline.play-state",
                move || watched.with(|c| c.should_animate),
                move |_| {
                    if let Err(err) = sync_to_clock(&items, &clock, CommonStrata::USER) {
                        tracing::warn!("could not sync timeline items to the clock: {err}");
                    }
                },
            )
        };
        self.reactions.borrow_mut().extend([follow_top, play_state]);
    }

    pub fn deactivate(&self) {
        self.reactions.borrow_mut().clear();
    }

    /// Keeps the timeline visible with nothing time-varying on the map by
    /// registering a placeholder item. The placeholder never drives the
    /// clock.
    pub fn set_always_show_timeline(&self, enabled: bool) -> Result<(), ModelError> {
        let current = self.placeholder.with_untracked(|p| p.as_ref().map(|p| p.id()));
        match (enabled, current) {
            (true, None) => {
                let placeholder = self.registry.register_placeholder()?;
                tracing::debug!(placeholder = %placeholder.id(), "timeline pinned open");
                self.placeholder.replace(Some(placeholder));
            }
            (false, Some(id)) => {
                self.registry.unregister_placeholder(&id);
                self.placeholder.replace(None);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn always_show_timeline(&self) -> bool {
        self.placeholder.with(Option::is_some)
    }

    /// The item the timeline describes: the top item, else the placeholder.
    pub fn timeline_source(&self) -> Option<ModelId> {
        self.top_layer()
            .or_else(|| self.placeholder.with(|p| p.as_ref().map(|p| p.id())))
    }

    fn reconcile_clock(&self) {
        let top = self.items.with_untracked(|items| items.last().cloned());
        let next = untracked(|| {
            let id = top.as_ref().map(|item| item.id());
            let definition = top.as_ref().and_then(|item| item.clock_definition());
            let top = id.as_ref().zip(definition.as_ref());
            self.clock.with(|previous| reconcile(top, previous))
        });
        self.clock.set(next);
    }
}

fn sync_to_clock(
    items: &Observable<Vec<Item>>,
    clock: &Observable<Clock>,
    stratum: &str,
) -> Result<(), ModelError> {
    let clock = clock.get_untracked();
    let items = items.get_untracked();
    action(|| {
        items
            .iter()
            .try_for_each(|item| item.sync_clock_state(stratum, clock.current, !clock.should_animate))
    })
}

impl Drop for TimelineStack {
    fn drop(&mut self) {
        if let Some(placeholder) = self.placeholder.with_untracked(|p| p.as_ref().map(|p| p.id())) {
            self.registry.unregister_placeholder(&placeholder);
        }
    }
}
