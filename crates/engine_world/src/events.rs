//! Typed event bus with authority filtering.
//!
//! Each event type has its own channel. A subscription is owned either by the
//! process itself or by one entity:
//!
//! - Process-owned handlers always run.
//! - Entity-owned handlers run only if their authorize predicate accepts the
//!   event. The default predicate, [`owner_only`], accepts when the entity's
//!   `updater` is the local process, so only the owning peer ever runs an
//!   entity's own logic.
//!
//! Entity subscriptions are tracked by owner id, so killing an entity drops
//! all of its handlers in one call.
//!
//! Handlers cannot touch the registry or bus directly while a dispatch is in
//! progress. Structural changes go through [`Commands`] and are applied by
//! the world once the dispatch finishes.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use engine_entity::{Entity, EntityHandle, EntityId};
use tracing::warn;

use crate::registry::Registry;
use crate::types::Replicated;

/// Marker for types that can be dispatched on the bus.
pub trait Event: 'static {}

/// One simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Simulation tick counter, starting at 1.
    pub tick: u64,
    /// Seconds since the previous tick.
    pub dt: f32,
}

/// One network step, fired just before changes are detected and flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkTick {
    /// Network tick counter, starting at 1.
    pub tick: u64,
}

/// An entity entered the registry, locally created or received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntity {
    /// The new entity.
    pub id: EntityId,
    /// Its registered type tag.
    pub type_tag: &'static str,
}

/// An entity left the registry. Dispatched after removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKilled {
    /// The removed entity.
    pub id: EntityId,
}

impl Event for Tick {}
impl Event for NetworkTick {}
impl Event for NewEntity {}
impl Event for EntityKilled {}

/// Decides whether an entity-owned handler may run for an event.
pub type Authorize<E> = fn(&E, &dyn Entity, &str) -> bool;

/// The default [`Authorize`] predicate: the entity is owned locally.
#[must_use]
pub fn owner_only<E>(_event: &E, entity: &dyn Entity, local_id: &str) -> bool {
    entity.updater() == local_id
}

/// Deferred structural changes requested by handlers.
#[derive(Default)]
pub struct Commands {
    pub(crate) spawns: Vec<Spawn>,
    pub(crate) kills: Vec<EntityId>,
}

pub(crate) struct Spawn {
    pub(crate) handle: EntityHandle,
    pub(crate) id: EntityId,
    pub(crate) type_tag: &'static str,
    pub(crate) subscribe: fn(&str, &mut EventBus),
}

impl Commands {
    /// Queue a new entity for insertion. Returns its id.
    pub fn spawn<T: Replicated>(&mut self, entity: T) -> EntityId {
        let id = entity.id().to_string();
        self.spawns.push(Spawn {
            handle: std::rc::Rc::new(std::cell::RefCell::new(entity)),
            id: id.clone(),
            type_tag: T::TYPE_TAG,
            subscribe: T::subscribe,
        });
        id
    }

    /// Queue an entity for killing.
    pub fn kill(&mut self, id: impl Into<EntityId>) {
        self.kills.push(id.into());
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty() && self.kills.is_empty()
    }
}

impl std::fmt::Debug for Commands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commands")
            .field("spawns", &self.spawns.len())
            .field("kills", &self.kills)
            .finish()
    }
}

/// What a handler can see and do while an event is being dispatched.
pub struct EventContext<'a> {
    /// The local registry, read-only. Borrowing the entity whose handler is
    /// running through it will panic.
    pub registry: &'a Registry,
    /// This process's id.
    pub local_id: &'a str,
    /// Deferred spawns and kills.
    pub commands: &'a mut Commands,
}

type ProcessHandler<E> = Box<dyn FnMut(&E, &mut EventContext<'_>)>;
type EntityHandler<E> = Box<dyn FnMut(&E, &mut dyn Entity, &mut EventContext<'_>)>;

enum Subscription<E> {
    Process(ProcessHandler<E>),
    Entity {
        owner: EntityId,
        authorize: Authorize<E>,
        handler: EntityHandler<E>,
    },
}

struct Channel<E> {
    subscriptions: Vec<Subscription<E>>,
}

trait AnyChannel {
    fn remove_owner(&mut self, owner: &str) -> usize;
    fn len(&self) -> usize;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: Event> AnyChannel for Channel<E> {
    fn remove_owner(&mut self, owner: &str) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| match sub {
            Subscription::Process(_) => true,
            Subscription::Entity { owner: o, .. } => o != owner,
        });
        before - self.subscriptions.len()
    }

    fn len(&self) -> usize {
        self.subscriptions.len()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The in-process event bus.
#[derive(Default)]
pub struct EventBus {
    channels: HashMap<TypeId, Box<dyn AnyChannel>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channels.len())
            .field("subscriptions", &self.len())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn channel<E: Event>(&mut self) -> Option<&mut Channel<E>> {
        self.channels
            .get_mut(&TypeId::of::<E>())
            .and_then(|channel| channel.as_any_mut().downcast_mut::<Channel<E>>())
    }

    fn push<E: Event>(&mut self, subscription: Subscription<E>) {
        self.channels
            .entry(TypeId::of::<E>())
            .or_insert_with(|| {
                Box::new(Channel::<E> {
                    subscriptions: Vec::new(),
                })
            });
        if let Some(channel) = self.channel::<E>() {
            channel.subscriptions.push(subscription);
        }
    }

    /// Subscribe a process-owned handler. It runs on every dispatch.
    pub fn subscribe<E, F>(&mut self, handler: F)
    where
        E: Event,
        F: FnMut(&E, &mut EventContext<'_>) + 'static,
    {
        self.push(Subscription::Process(Box::new(handler)));
    }

    /// Subscribe a handler owned by entity `owner`, gated by [`owner_only`].
    pub fn subscribe_entity<E, F>(&mut self, owner: impl Into<EntityId>, handler: F)
    where
        E: Event,
        F: FnMut(&E, &mut dyn Entity, &mut EventContext<'_>) + 'static,
    {
        self.subscribe_entity_with(owner, owner_only::<E>, handler);
    }

    /// Subscribe a handler owned by entity `owner` with a custom predicate.
    pub fn subscribe_entity_with<E, F>(
        &mut self,
        owner: impl Into<EntityId>,
        authorize: Authorize<E>,
        handler: F,
    ) where
        E: Event,
        F: FnMut(&E, &mut dyn Entity, &mut EventContext<'_>) + 'static,
    {
        self.push(Subscription::Entity {
            owner: owner.into(),
            authorize,
            handler: Box::new(handler),
        });
    }

    /// Subscribe a handler that receives its owner as the concrete type `T`.
    ///
    /// If the owner is not a `T` when the event fires the handler is skipped.
    pub fn subscribe_as<E, T, F>(&mut self, owner: impl Into<EntityId>, mut handler: F)
    where
        E: Event,
        T: Entity,
        F: FnMut(&E, &mut T, &mut EventContext<'_>) + 'static,
    {
        self.subscribe_entity(
            owner,
            move |event: &E, entity: &mut dyn Entity, ctx: &mut EventContext<'_>| {
                if let Some(entity) = entity.downcast_mut::<T>() {
                    handler(event, entity, ctx);
                }
            },
        );
    }

    /// Remove every subscription owned by `owner`, across all channels.
    ///
    /// Returns the number of subscriptions removed.
    pub fn unsubscribe_entity(&mut self, owner: &str) -> usize {
        self.channels
            .values_mut()
            .map(|channel| channel.remove_owner(owner))
            .sum()
    }

    /// Total subscriptions across all channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.values().map(|channel| channel.len()).sum()
    }

    /// Returns `true` if there are no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every authorized handler for `event`, in subscription order.
    ///
    /// Entity-owned handlers whose owner is no longer registered, or is
    /// already borrowed, are skipped. Returns the number of handlers run.
    pub fn dispatch<E: Event>(
        &mut self,
        event: &E,
        registry: &Registry,
        local_id: &str,
        commands: &mut Commands,
    ) -> usize {
        let Some(channel) = self.channel::<E>() else {
            return 0;
        };
        let mut ctx = EventContext {
            registry,
            local_id,
            commands,
        };
        let mut ran = 0;
        for subscription in &mut channel.subscriptions {
            match subscription {
                Subscription::Process(handler) => {
                    handler(event, &mut ctx);
                    ran += 1;
                }
                Subscription::Entity {
                    owner,
                    authorize,
                    handler,
                } => {
                    let Some(handle) = registry.handle(owner) else {
                        continue;
                    };
                    let Ok(mut entity) = handle.try_borrow_mut() else {
                        warn!(entity_id = %owner, "entity already borrowed, skipping handler");
                        continue;
                    };
                    if !authorize(event, &*entity, local_id) {
                        continue;
                    }
                    handler(event, &mut *entity, &mut ctx);
                    ran += 1;
                }
            }
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use engine_entity::AttrMap;

    use super::*;
    use crate::registry::Slot;
    use crate::testing::{Player, handle, player};

    fn noop_tick(_: &Tick, _: &mut dyn Entity, _: &mut EventContext<'_>) {}

    fn noop_network_tick(_: &NetworkTick, _: &mut dyn Entity, _: &mut EventContext<'_>) {}

    fn registry_with(id: &str, updater: &str) -> Registry {
        let mut registry = Registry::new();
        registry.insert(
            id.into(),
            Slot {
                handle: handle(player(id, updater)),
                type_tag: "player",
                checkpoint: AttrMap::new(),
            },
        );
        registry
    }

    #[test]
    fn test_process_handlers_always_run() {
        let mut bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        bus.subscribe(move |tick: &Tick, _ctx: &mut EventContext<'_>| {
            seen.set(seen.get() + tick.tick);
        });

        let registry = Registry::new();
        let mut commands = Commands::default();
        let ran = bus.dispatch(&Tick { tick: 3, dt: 0.1 }, &registry, "c1", &mut commands);
        assert_eq!(ran, 1);
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn test_entity_handler_gated_by_owner() {
        for (local, expected) in [("c1", 1), ("c2", 0)] {
            let registry = registry_with("p1", "c1");
            let mut bus = EventBus::new();
            bus.subscribe_as("p1", |_: &Tick, player: &mut Player, _ctx: &mut EventContext<'_>| {
                player.x += 1;
            });
            let mut commands = Commands::default();
            bus.dispatch(&Tick { tick: 1, dt: 0.1 }, &registry, local, &mut commands);
            let handle = registry.get("p1").unwrap();
            let x = handle.borrow().downcast_ref::<Player>().unwrap().x;
            assert_eq!(x, expected, "local process {local}");
        }
    }

    #[test]
    fn test_custom_predicate() {
        fn everyone(_: &Tick, _: &dyn Entity, _: &str) -> bool {
            true
        }
        let registry = registry_with("p1", "c1");
        let mut bus = EventBus::new();
        bus.subscribe_entity_with("p1", everyone, noop_tick);
        let mut commands = Commands::default();
        let ran = bus.dispatch(&Tick { tick: 1, dt: 0.1 }, &registry, "server", &mut commands);
        assert_eq!(ran, 1);
    }

    #[test]
    fn test_unsubscribe_removes_all_channels() {
        let mut bus = EventBus::new();
        bus.subscribe_entity("p1", noop_tick);
        bus.subscribe_entity("p1", noop_network_tick);
        bus.subscribe_entity("p2", noop_tick);
        bus.subscribe(|_: &Tick, _: &mut EventContext<'_>| {});
        assert_eq!(bus.len(), 4);

        assert_eq!(bus.unsubscribe_entity("p1"), 2);
        assert_eq!(bus.len(), 2);
        assert_eq!(bus.unsubscribe_entity("p1"), 0);
    }

    #[test]
    fn test_missing_owner_is_skipped() {
        let mut bus = EventBus::new();
        bus.subscribe_entity("ghost", |_: &Tick, _: &mut dyn Entity, _: &mut EventContext<'_>| {
            panic!("must not run");
        });
        let mut commands = Commands::default();
        let ran = bus.dispatch(&Tick { tick: 1, dt: 0.1 }, &Registry::new(), "c1", &mut commands);
        assert_eq!(ran, 0);
    }

    #[test]
    fn test_handlers_queue_commands() {
        let mut bus = EventBus::new();
        bus.subscribe(|_: &Tick, ctx: &mut EventContext<'_>| ctx.commands.kill("p1"));
        let mut commands = Commands::default();
        bus.dispatch(&Tick { tick: 1, dt: 0.1 }, &Registry::new(), "c1", &mut commands);
        assert_eq!(commands.kills, ["p1"]);
    }
}
