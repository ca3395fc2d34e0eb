//! Tracking of drawable entities.
//!
//! The engine does not draw anything. A drawing layer learns about entities
//! from [`NewEntity`] and [`EntityKilled`] and keeps its own list, which is
//! what [`DrawList`] does.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use engine_entity::{Entity, EntityId};
use engine_world::{EntityKilled, EventContext, NewEntity, World};

/// Ids of the visible drawable entities in one world.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    ids: Rc<RefCell<BTreeSet<EntityId>>>,
}

impl DrawList {
    /// Start tracking `world`: record the drawables already registered, then
    /// follow lifecycle events.
    pub fn attach(world: &mut World) -> Self {
        let list = Self::default();
        for (id, slot) in world.registry().iter() {
            if is_visible(&*slot.handle.borrow()) {
                list.ids.borrow_mut().insert(id.clone());
            }
        }

        let on_new = list.clone();
        world
            .bus_mut()
            .subscribe(move |event: &NewEntity, ctx: &mut EventContext<'_>| {
                let visible = ctx
                    .registry
                    .handle(&event.id)
                    .and_then(|handle| handle.try_borrow().ok().map(|entity| is_visible(&*entity)))
                    .unwrap_or(false);
                if visible {
                    on_new.ids.borrow_mut().insert(event.id.clone());
                }
            });

        let on_killed = list.clone();
        world
            .bus_mut()
            .subscribe(move |event: &EntityKilled, _: &mut EventContext<'_>| {
                on_killed.ids.borrow_mut().remove(&event.id);
            });

        list
    }

    /// Number of tracked drawables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.borrow().len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.borrow().is_empty()
    }

    /// Returns `true` if `id` is tracked.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.borrow().contains(id)
    }
}

fn is_visible(entity: &dyn Entity) -> bool {
    entity.drawable().is_some_and(|sprite| sprite.visible)
}

#[cfg(test)]
mod tests {
    use engine_math::Vec2;

    use super::*;
    use crate::{Player, Weapon, types};

    #[test]
    fn test_tracks_spawns_and_kills() {
        let mut world = World::new("c1", types().unwrap());
        let existing = world.spawn(Player::new("c2", Vec2::ZERO, Vec2::ZERO));

        let list = DrawList::attach(&mut world);
        assert!(list.contains(&existing));

        let player = world.spawn(Player::new("c1", Vec2::ZERO, Vec2::ZERO));
        let weapon = world.spawn(Weapon::new("c1", &player));
        assert_eq!(list.len(), 3);

        world.kill(&weapon);
        assert!(!list.contains(&weapon));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_hidden_sprites_skipped() {
        let mut world = World::new("c1", types().unwrap());
        let list = DrawList::attach(&mut world);

        let mut player = Player::new("c1", Vec2::ZERO, Vec2::ZERO);
        player.sprite.visible = false;
        world.spawn(player);
        assert!(list.is_empty());
    }
}
