//! The weapon entity.

use std::any::Any;

use engine_entity::{
    AttrMap, Entity, EntityError, EntityId, EntityKind, EntityRef, Networked, Sprite, field,
    new_entity_id, update_field,
};
use engine_math::Vec2;
use engine_world::{EventBus, EventContext, Replicated, Tick};
use serde_json::{Value, json};

/// Carried by a player. Tracks its owner's position and is killed once the
/// owner is gone.
#[derive(Debug)]
pub struct Weapon {
    /// Id and owning process.
    pub net: Networked,
    /// How the weapon is drawn.
    pub sprite: Sprite,
    /// The player carrying this weapon.
    pub owner: EntityRef,
    /// Copied from the owner every tick.
    pub position: Vec2,
    /// Rounds left.
    pub ammo: u32,
}

impl Weapon {
    /// A new weapon owned by `updater`, carried by the player `owner`.
    #[must_use]
    pub fn new(updater: &str, owner: &str) -> Self {
        Self {
            net: Networked::new(new_entity_id(), updater),
            sprite: Sprite::new("assets/weapon.png").with_scale(16, 16),
            owner: EntityRef::new(owner),
            position: Vec2::ZERO,
            ammo: 30,
        }
    }

    fn follow_owner(&mut self, ctx: &mut EventContext<'_>) {
        if !ctx.registry.contains(self.owner.id()) {
            ctx.commands.kill(self.id());
            return;
        }
        self.owner.resolve_with(|id| ctx.registry.get(id));
        if let Some(handle) = self.owner.get()
            && let Ok(owner) = handle.try_borrow()
            && let Some(body) = owner.physical()
        {
            self.position = body.position;
        }
    }
}

impl Entity for Weapon {
    fn networked(&self) -> &Networked {
        &self.net
    }

    fn networked_mut(&mut self) -> &mut Networked {
        &mut self.net
    }

    fn serialize(&self) -> AttrMap {
        let mut map = self.net.to_map();
        self.sprite.write_into(&mut map);
        map.insert("owner".into(), Value::String(self.owner.id().to_string()));
        map.insert("position".into(), json!([self.position.x, self.position.y]));
        map.insert("ammo".into(), self.ammo.into());
        map
    }

    fn update(&mut self, data: &AttrMap) -> Result<(), EntityError> {
        self.net.apply(data)?;
        self.sprite.apply(data)?;
        update_field(data, "owner", &mut self.owner)?;
        update_field(data, "position", &mut self.position)?;
        update_field(data, "ammo", &mut self.ammo)?;
        Ok(())
    }

    fn references_mut(&mut self) -> Vec<&mut EntityRef> {
        vec![&mut self.owner]
    }

    fn drawable(&self) -> Option<&Sprite> {
        Some(&self.sprite)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl EntityKind for Weapon {
    const TYPE_TAG: &'static str = "weapon";

    fn deserialize(id: EntityId, data: &AttrMap) -> Result<Self, EntityError> {
        Ok(Self {
            net: Networked::from_map(id, data)?,
            sprite: Sprite::from_map(data)?,
            owner: field(data, "owner")?,
            position: field(data, "position")?,
            ammo: field(data, "ammo")?,
        })
    }
}

impl Replicated for Weapon {
    fn subscribe(id: &str, bus: &mut EventBus) {
        bus.subscribe_as(id, |_: &Tick, weapon: &mut Weapon, ctx: &mut EventContext<'_>| {
            weapon.follow_owner(ctx);
        });
    }
}

#[cfg(test)]
mod tests {
    use engine_world::World;

    use super::*;
    use crate::{Player, types};

    fn position_of(world: &World, id: &str) -> Vec2 {
        let handle = world.get(id).unwrap();
        let entity = handle.borrow();
        entity.downcast_ref::<Weapon>().unwrap().position
    }

    #[test]
    fn test_follows_owner() {
        let mut world = World::new("c1", types().unwrap());
        let player = world.spawn(Player::new("c1", Vec2::new(40.0, 50.0), Vec2::ZERO));
        let weapon = world.spawn(Weapon::new("c1", &player));

        world.dispatch(&Tick { tick: 1, dt: 0.1 });
        assert_eq!(position_of(&world, &weapon), Vec2::new(40.0, 50.0));
    }

    #[test]
    fn test_dies_with_owner() {
        let mut world = World::new("c1", types().unwrap());
        let player = world.spawn(Player::new("c1", Vec2::ZERO, Vec2::ZERO));
        let weapon = world.spawn(Weapon::new("c1", &player));
        world.detect_changes();
        world.drain_outgoing();

        world.kill(&player);
        world.dispatch(&Tick { tick: 1, dt: 0.1 });
        assert!(world.get(&weapon).is_none());

        let deletes: Vec<_> = world.drain_outgoing().into_iter().map(|op| op.entity_id).collect();
        assert_eq!(deletes, [player, weapon]);
    }

    #[test]
    fn test_round_trip_keeps_owner_unresolved() {
        let weapon = Weapon::new("c1", "p1");
        let copy = Weapon::deserialize("w1".into(), &weapon.serialize()).unwrap();
        assert_eq!(copy.owner, EntityRef::new("p1"));
        assert_eq!(copy.ammo, 30);
        assert!(copy.owner.get().is_none());
    }
}
