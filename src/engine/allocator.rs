//! Storage allocator: plans where an incoming stack lands in a slot array.
//!
//! Passes run in order and stop as soon as the whole count is placed:
//! the explicit slot (if any), then partial stacks of the same item,
//! then empty slots.

use tracing::debug;

use crate::model::{SlotId, Stack};

/// Units reserved in one destination slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub slot: SlotId,
    pub count: u32,
}

/// Outcome of planning a placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Reservations summing exactly to the stack's count.
    Placed(Vec<Reservation>),
    /// The explicit slot holds something the stack cannot merge with.
    Occupied(SlotId),
}

/// Not enough room for the whole stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoSpace;

/// Plan the placement of `stack` into `slots`.
///
/// With `swap` the explicit slot's occupant is ignored, as it is about to
/// leave in the opposite direction.
pub fn allocate(
    slots: &[Option<Stack>],
    stack: &Stack,
    max_stack: u32,
    explicit: Option<SlotId>,
    swap: bool,
) -> Result<Placement, NoSpace> {
    let mut remaining = stack.count;
    let mut reservations = Vec::new();

    if let Some(slot) = explicit {
        let occupant = if swap {
            None
        } else {
            slots.get(slot as usize).and_then(Option::as_ref)
        };
        match reserve(occupant, stack, max_stack, remaining) {
            Some(count) => {
                reservations.push(Reservation { slot, count });
                remaining -= count;
            }
            None => return Ok(Placement::Occupied(slot)),
        }
    }

    if remaining > 0 && max_stack > 1 {
        remaining = scan(
            slots,
            stack,
            max_stack,
            explicit,
            true,
            remaining,
            &mut reservations,
        );
    }
    if remaining > 0 {
        remaining = scan(
            slots,
            stack,
            max_stack,
            explicit,
            false,
            remaining,
            &mut reservations,
        );
    }

    if remaining > 0 {
        debug!(
            item = stack.item,
            count = stack.count,
            remaining,
            "no space for stack"
        );
        return Err(NoSpace);
    }

    debug!(
        item = stack.item,
        count = stack.count,
        ?reservations,
        "placement planned"
    );
    Ok(Placement::Placed(reservations))
}

/// Units of `stack` that fit on top of `occupant`, or `None` if they cannot share the slot.
fn reserve(occupant: Option<&Stack>, stack: &Stack, max_stack: u32, remaining: u32) -> Option<u32> {
    let free = match occupant {
        Some(existing) if existing.item != stack.item || existing.count >= max_stack => {
            return None;
        }
        Some(existing) => max_stack - existing.count,
        None => max_stack,
    };
    Some(free.min(remaining))
}

/// One pass over all slots but `skip`: partial stacks when `merge`, empty slots otherwise.
fn scan(
    slots: &[Option<Stack>],
    stack: &Stack,
    max_stack: u32,
    skip: Option<SlotId>,
    merge: bool,
    mut remaining: u32,
    reservations: &mut Vec<Reservation>,
) -> u32 {
    for (index, occupant) in slots.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        let slot = index as SlotId;
        if Some(slot) == skip || occupant.is_some() != merge {
            continue;
        }
        if let Some(count) = reserve(occupant.as_ref(), stack, max_stack, remaining) {
            reservations.push(Reservation { slot, count });
            remaining -= count;
        }
    }
    remaining
}
