//! Small entity types shared by this crate's tests.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use engine_entity::{
    AttrMap, Entity, EntityError, EntityHandle, EntityId, EntityKind, EntityRef, Networked, field,
    update_field,
};
use serde_json::Value;

use crate::events::{EventBus, EventContext, Tick};
use crate::types::{EntityTypeMap, Replicated};

pub fn attrs(value: Value) -> AttrMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn handle<T: Entity>(entity: T) -> EntityHandle {
    Rc::new(RefCell::new(entity))
}

pub fn types() -> EntityTypeMap {
    EntityTypeMap::new()
        .with::<Player>()
        .and_then(EntityTypeMap::with::<Weapon>)
        .unwrap()
}

/// Walks one unit along x on every tick it is authorized for.
#[derive(Debug)]
pub struct Player {
    pub net: Networked,
    pub x: i64,
    pub y: i64,
    pub weapon: Option<EntityRef>,
}

pub fn player(id: &str, updater: &str) -> Player {
    Player {
        net: Networked::new(id, updater),
        x: 0,
        y: 0,
        weapon: None,
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
        map.insert("x".into(), self.x.into());
        map.insert("y".into(), self.y.into());
        map.insert(
            "weapon".into(),
            self.weapon
                .as_ref()
                .map_or(Value::Null, |w| Value::String(w.id().to_string())),
        );
        map
    }
    fn update(&mut self, data: &AttrMap) -> Result<(), EntityError> {
        self.net.apply(data)?;
        update_field(data, "x", &mut self.x)?;
        update_field(data, "y", &mut self.y)?;
        update_field(data, "weapon", &mut self.weapon)?;
        Ok(())
    }
    fn references_mut(&mut self) -> Vec<&mut EntityRef> {
        self.weapon.iter_mut().collect()
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
        Ok(Self {
            net: Networked::from_map(id, data)?,
            x: field(data, "x")?,
            y: field(data, "y")?,
            weapon: field(data, "weapon")?,
        })
    }
}

impl Replicated for Player {
    fn subscribe(id: &str, bus: &mut EventBus) {
        bus.subscribe_as(id, |_: &Tick, player: &mut Player, _: &mut EventContext<'_>| {
            player.x += 1;
        });
    }
}

/// Holds a link to its owner.
#[derive(Debug)]
pub struct Weapon {
    pub net: Networked,
    pub owner: EntityRef,
    pub ammo: u32,
}

pub fn weapon(id: &str, updater: &str, owner: &str) -> Weapon {
    Weapon {
        net: Networked::new(id, updater),
        owner: EntityRef::new(owner),
        ammo: 2,
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
        map.insert("owner".into(), Value::String(self.owner.id().to_string()));
        map.insert("ammo".into(), self.ammo.into());
        map
    }
    fn update(&mut self, data: &AttrMap) -> Result<(), EntityError> {
        self.net.apply(data)?;
        update_field(data, "owner", &mut self.owner)?;
        update_field(data, "ammo", &mut self.ammo)?;
        Ok(())
    }
    fn references_mut(&mut self) -> Vec<&mut EntityRef> {
        vec![&mut self.owner]
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
            owner: field(data, "owner")?,
            ammo: field(data, "ammo")?,
        })
    }
}

impl Replicated for Weapon {}
