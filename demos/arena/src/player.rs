//! The player entity.

use std::any::Any;

use engine_entity::{
    AttrMap, Body2D, Entity, EntityError, EntityId, EntityKind, EntityRef, Networked, Sprite,
    field, new_entity_id, update_field,
};
use engine_math::Vec2;
use engine_world::{EventBus, EventContext, Replicated, Tick};
use serde_json::Value;

use crate::ARENA_SIZE;

/// A drawable body that moves in a straight line and bounces off the arena
/// walls.
#[derive(Debug)]
pub struct Player {
    /// Id and owning process.
    pub net: Networked,
    /// How the player is drawn.
    pub sprite: Sprite,
    /// Position, velocity and heading.
    pub body: Body2D,
    /// The weapon this player carries, if any.
    pub weapon: Option<EntityRef>,
}

impl Player {
    /// A new player owned by `updater`.
    #[must_use]
    pub fn new(updater: &str, position: Vec2, velocity: Vec2) -> Self {
        Self {
            net: Networked::new(new_entity_id(), updater),
            sprite: Sprite::new("assets/player.png").with_scale(32, 32),
            body: Body2D::at(position).with_velocity(velocity),
            weapon: None,
        }
    }

    /// Advance the body by `dt` seconds, reflecting off the walls.
    pub fn step(&mut self, dt: f32) {
        self.body.integrate(dt);
        let body = &mut self.body;
        if body.position.x < 0.0 || body.position.x > ARENA_SIZE.x {
            body.velocity.x = -body.velocity.x;
        }
        if body.position.y < 0.0 || body.position.y > ARENA_SIZE.y {
            body.velocity.y = -body.velocity.y;
        }
        body.position = body.position.clamp(Vec2::ZERO, ARENA_SIZE);
        if body.velocity != Vec2::ZERO {
            body.angle = body.velocity.y.atan2(body.velocity.x);
        }
    }
}

impl Entity for Player {
    fn networked(&self) -> &Networked {
        &self.net
    }

    fn networked_mut(&mut self) -> &mut Networked {
        &mut self.net
    }

    fn serialize(&self) -> AttrMap {
        let mut map = self.net.to_map();
        self.sprite.write_into(&mut map);
        map.insert("body".into(), Value::Object(self.body.to_map()));
        map.insert(
            "weapon".into(),
            self.weapon
                .as_ref()
                .map_or(Value::Null, |weapon| Value::String(weapon.id().to_string())),
        );
        map
    }

    fn update(&mut self, data: &AttrMap) -> Result<(), EntityError> {
        self.net.apply(data)?;
        self.sprite.apply(data)?;
        if let Some(value) = data.get("body") {
            let Value::Object(partial) = value else {
                return Err(body_error("expected an object"));
            };
            self.body.apply(partial).map_err(body_error)?;
        }
        update_field(data, "weapon", &mut self.weapon)?;
        Ok(())
    }

    fn references_mut(&mut self) -> Vec<&mut EntityRef> {
        self.weapon.iter_mut().collect()
    }

    fn drawable(&self) -> Option<&Sprite> {
        Some(&self.sprite)
    }

    fn physical(&self) -> Option<&Body2D> {
        Some(&self.body)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl EntityKind for Player {
    const TYPE_TAG: &'static str = "player";

    fn deserialize(id: EntityId, data: &AttrMap) -> Result<Self, EntityError> {
        let body = match data.get("body") {
            Some(Value::Object(map)) => Body2D::from_map(map).map_err(body_error)?,
            Some(_) => return Err(body_error("expected an object")),
            None => {
                return Err(EntityError::MissingField {
                    field: "body".into(),
                });
            }
        };
        Ok(Self {
            net: Networked::from_map(id, data)?,
            sprite: Sprite::from_map(data)?,
            body,
            weapon: field(data, "weapon")?,
        })
    }
}

impl Replicated for Player {
    fn subscribe(id: &str, bus: &mut EventBus) {
        bus.subscribe_as(id, |tick: &Tick, player: &mut Player, _: &mut EventContext<'_>| {
            player.step(tick.dt);
        });
    }
}

fn body_error(reason: impl ToString) -> EntityError {
    EntityError::InvalidField {
        field: "body".into(),
        reason: reason.to_string(),
    }
}
