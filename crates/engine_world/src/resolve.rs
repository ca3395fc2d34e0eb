//! Reference resolution sweep.

use tracing::trace;

use crate::registry::Registry;

/// Link every unresolved reference whose target is now registered.
///
/// References whose target is missing are left as they are for a later
/// sweep. Running the sweep again without new entities changes nothing.
/// Returns the number of references linked.
pub fn resolve_references(registry: &Registry) -> usize {
    let mut linked = 0;
    for (id, slot) in registry.iter() {
        let Ok(mut entity) = slot.handle.try_borrow_mut() else {
            continue;
        };
        for reference in entity.references_mut() {
            if reference.resolve_with(|target| registry.get(target)) {
                trace!(entity_id = %id, target = reference.id(), "reference resolved");
                linked += 1;
            }
        }
    }
    linked
}
