//! Arena heap with a stop-the-world mark-and-sweep collector.
//!
//! Every pair, closure, continuation, control frame and rescue entry lives in a
//! slot of one `Vec`. Handles are slot indices; reclaimed slots go onto a free
//! list and are reused before the arena grows. Growth happens in batches of
//! `alloc_batch` slots, each batch negotiated with the host [`Allocator`].

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::value::{Closure, Frame, ObjId, Rescue, Snapshot, Value};

/// Default number of allocations between automatic collections.
pub const DEFAULT_GC_EVENTS: usize = 65536;

/// Default number of slots requested from the host at once.
pub const DEFAULT_ALLOC_BATCH: usize = 1024;

/// Free slots a safe point wants on hand before the next evaluation step.
const SAFE_POINT_RESERVE: usize = 256;

/// Host-side memory primitive.
///
/// The heap never touches a memory API directly: before it grows or shrinks its
/// slot reservation it asks the host. `new_slots == 0` always means "release
/// everything". Returning `false` from a grow request means exhaustion.
pub trait Allocator {
    fn resize(&mut self, old_slots: usize, new_slots: usize) -> bool;

    /// Largest reservation the host will ever grant, if it knows one.
    fn limit(&self) -> Option<usize> {
        None
    }
}

/// Default allocator: the global Rust allocator, optionally capped.
#[derive(Debug, Default)]
pub struct SystemAllocator {
    limit: Option<usize>,
}

impl SystemAllocator {
    pub fn new() -> Self {
        SystemAllocator { limit: None }
    }

    /// Refuse to reserve more than `slots` slots in total.
    pub fn with_limit(slots: usize) -> Self {
        SystemAllocator { limit: Some(slots) }
    }
}

impl Allocator for SystemAllocator {
    fn resize(&mut self, _old_slots: usize, new_slots: usize) -> bool {
        self.limit.map_or(true, |limit| new_slots <= limit)
    }

    fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Anything holding references into the heap that the collector must follow.
pub trait Trace {
    /// Push every heap handle held by `self` into `out`.
    fn trace(&self, out: &mut Vec<ObjId>);
}

impl Trace for Value {
    fn trace(&self, out: &mut Vec<ObjId>) {
        if let Some(id) = self.obj_id() {
            out.push(id);
        }
    }
}

impl Trace for Option<ObjId> {
    fn trace(&self, out: &mut Vec<ObjId>) {
        if let Some(id) = *self {
            out.push(id);
        }
    }
}

impl Trace for Snapshot {
    fn trace(&self, out: &mut Vec<ObjId>) {
        self.conts.trace(out);
        self.values.trace(out);
        self.rescues.trace(out);
        self.env.trace(out);
    }
}

impl Trace for Frame {
    fn trace(&self, out: &mut Vec<ObjId>) {
        match *self {
            Frame::Eval { expr, env } => {
                expr.trace(out);
                env.trace(out);
            }
            Frame::Call { args, env } => {
                args.trace(out);
                env.trace(out);
            }
            Frame::Apply { op, env, .. } => {
                op.trace(out);
                env.trace(out);
            }
            Frame::Seq { body, env } | Frame::Guard { body, env } => {
                body.trace(out);
                env.trace(out);
            }
            Frame::Branch { then, otherwise, env } => {
                then.trace(out);
                otherwise.trace(out);
                env.trace(out);
            }
            Frame::Define { env, .. } | Frame::Assign { env, .. } | Frame::Expand { env } => {
                env.trace(out);
            }
            Frame::Unguard => {}
        }
    }
}

/// A heap-allocated object.
#[derive(Clone, Copy, Debug)]
pub enum HeapObject {
    /// An unused slot (on the free list).
    Free,
    Pair { car: Value, cdr: Value },
    Closure(Closure),
    Continuation(Snapshot),
    /// A link in the continuation stack.
    Frame { frame: Frame, next: Option<ObjId> },
    /// A link in the rescue stack.
    Rescue { rescue: Rescue, next: Option<ObjId> },
}

impl Trace for HeapObject {
    fn trace(&self, out: &mut Vec<ObjId>) {
        match self {
            HeapObject::Free => {}
            HeapObject::Pair { car, cdr } => {
                car.trace(out);
                cdr.trace(out);
            }
            HeapObject::Closure(clo) => {
                clo.params.trace(out);
                clo.body.trace(out);
                clo.env.trace(out);
            }
            HeapObject::Continuation(snap) => snap.trace(out),
            HeapObject::Frame { frame, next } => {
                frame.trace(out);
                next.trace(out);
            }
            HeapObject::Rescue { rescue, next } => {
                rescue.handler.trace(out);
                rescue.resume.trace(out);
                next.trace(out);
            }
        }
    }
}

struct Slot {
    obj: HeapObject,
    mark: bool,
}

/// Counters describing the heap, accurate after a collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Slots currently holding an object.
    pub live: usize,
    /// Slots on the free list.
    pub free: usize,
    /// Slots reserved from the host.
    pub reserved: usize,
    /// Completed collection cycles.
    pub collections: usize,
}

/// The object heap. All pairs and other composite objects are allocated here.
/// ObjId is an index into `slots`.
pub struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<ObjId>,
    allocator: Box<dyn Allocator>,
    /// Slots the host has agreed to back.
    reserved: usize,
    alloc_batch: usize,
    /// Number of allocations since last GC (for triggering).
    events: usize,
    /// GC threshold: trigger GC when `events` reaches this.
    gc_events: usize,
    collections: usize,
}

impl Heap {
    pub fn new(allocator: Box<dyn Allocator>, gc_events: usize, alloc_batch: usize) -> Self {
        Heap {
            slots: Vec::new(),
            free_list: Vec::new(),
            allocator,
            reserved: 0,
            alloc_batch: alloc_batch.max(1),
            events: 0,
            gc_events: gc_events.max(1),
            collections: 0,
        }
    }

    /// Allocate a slot for `obj`. Fails only when the host refuses to grow the arena.
    pub fn alloc(&mut self, obj: HeapObject) -> Result<ObjId> {
        self.events += 1;

        if let Some(id) = self.free_list.pop() {
            let slot = &mut self.slots[id.0 as usize];
            slot.obj = obj;
            slot.mark = false;
            return Ok(id);
        }

        if self.slots.len() >= self.reserved {
            self.grow()?;
        }

        let id = ObjId(self.slots.len() as u32);
        self.slots.push(Slot { obj, mark: false });
        Ok(id)
    }

    /// Ask the host for one more batch, never past its known limit.
    fn grow(&mut self) -> Result<()> {
        let mut wanted = self.reserved + self.alloc_batch;
        if let Some(limit) = self.allocator.limit() {
            wanted = wanted.min(limit);
        }
        if wanted <= self.reserved || !self.allocator.resize(self.reserved, wanted) {
            return Err(Error::OutOfMemory {
                requested: self.reserved + self.alloc_batch,
            });
        }
        trace!(from = self.reserved, to = wanted, "heap grown");
        self.slots.reserve(wanted - self.slots.len());
        self.reserved = wanted;
        Ok(())
    }

    /// Slots available without asking the host.
    fn headroom(&self) -> usize {
        self.free_list.len() + (self.reserved - self.slots.len())
    }

    pub fn cons(&mut self, car: Value, cdr: Value) -> Result<Value> {
        Ok(Value::Pair(self.alloc(HeapObject::Pair { car, cdr })?))
    }

    #[inline]
    pub fn get(&self, id: ObjId) -> &HeapObject {
        &self.slots[id.0 as usize].obj
    }

    /// Get the car of a pair.
    #[inline]
    pub fn car(&self, id: ObjId) -> Value {
        match self.get(id) {
            HeapObject::Pair { car, .. } => *car,
            other => panic!("car of non-pair slot {:?}: {:?}", id, other),
        }
    }

    /// Get the cdr of a pair.
    #[inline]
    pub fn cdr(&self, id: ObjId) -> Value {
        match self.get(id) {
            HeapObject::Pair { cdr, .. } => *cdr,
            other => panic!("cdr of non-pair slot {:?}: {:?}", id, other),
        }
    }

    /// Set the car of a pair.
    #[inline]
    pub fn set_car(&mut self, id: ObjId, val: Value) {
        if let HeapObject::Pair { car, .. } = &mut self.slots[id.0 as usize].obj {
            *car = val;
        }
    }

    /// Set the cdr of a pair.
    #[inline]
    pub fn set_cdr(&mut self, id: ObjId, val: Value) {
        if let HeapObject::Pair { cdr, .. } = &mut self.slots[id.0 as usize].obj {
            *cdr = val;
        }
    }

    /// Get car of a Value if it's a pair.
    pub fn car_val(&self, val: Value) -> Result<Value> {
        match val {
            Value::Pair(id) => Ok(self.car(id)),
            _ => Err(Error::Type(format!("car of non-pair {:?}", val))),
        }
    }

    /// Get cdr of a Value if it's a pair.
    pub fn cdr_val(&self, val: Value) -> Result<Value> {
        match val {
            Value::Pair(id) => Ok(self.cdr(id)),
            _ => Err(Error::Type(format!("cdr of non-pair {:?}", val))),
        }
    }

    pub fn closure(&self, id: ObjId) -> Option<Closure> {
        match self.get(id) {
            HeapObject::Closure(clo) => Some(*clo),
            _ => None,
        }
    }

    pub fn continuation(&self, id: ObjId) -> Option<Snapshot> {
        match self.get(id) {
            HeapObject::Continuation(snap) => Some(*snap),
            _ => None,
        }
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[Value]) -> Result<Value> {
        let mut result = Value::Nil;
        for &val in values.iter().rev() {
            result = self.cons(val, result)?;
        }
        Ok(result)
    }

    /// Build a list from `values` whose final cdr is `tail`.
    pub fn list_with_tail(&mut self, values: &[Value], tail: Value) -> Result<Value> {
        let mut result = tail;
        for &val in values.iter().rev() {
            result = self.cons(val, result)?;
        }
        Ok(result)
    }

    /// Returns true if this value is a proper list.
    pub fn is_proper_list(&self, val: Value) -> bool {
        let mut current = val;
        loop {
            match current {
                Value::Nil => return true,
                Value::Pair(id) => current = self.cdr(id),
                _ => return false,
            }
        }
    }

    /// Collect a proper list into a Vec. Returns None if not a proper list.
    pub fn list_to_vec(&self, val: Value) -> Option<Vec<Value>> {
        let mut result = Vec::new();
        let mut current = val;
        loop {
            match current {
                Value::Nil => return Some(result),
                Value::Pair(id) => {
                    result.push(self.car(id));
                    current = self.cdr(id);
                }
                _ => return None,
            }
        }
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live: self.slots.len() - self.free_list.len(),
            free: self.free_list.len(),
            reserved: self.reserved,
            collections: self.collections,
        }
    }

    /// Safe-point check. True once `gc_events` allocations have happened, or
    /// when headroom is low, the host refuses another batch, and enough has
    /// been allocated since the last cycle for a collection to be worthwhile.
    pub fn should_collect(&mut self) -> bool {
        if self.events >= self.gc_events {
            return true;
        }
        let reserve = self.alloc_batch.min(SAFE_POINT_RESERVE);
        if self.headroom() >= reserve || self.grow().is_ok() {
            return false;
        }
        self.events >= reserve / 4
    }

    /// Check whether a handle currently refers to an allocated object.
    pub fn is_live(&self, id: ObjId) -> bool {
        self.slots
            .get(id.0 as usize)
            .map_or(false, |slot| !matches!(slot.obj, HeapObject::Free))
    }

    // === GC methods ===

    /// Run a full mark-and-sweep cycle from `roots`. Returns the number of slots reclaimed.
    pub fn collect(&mut self, roots: &[ObjId]) -> usize {
        let mut worklist: Vec<ObjId> = Vec::with_capacity(roots.len());
        for &id in roots {
            self.mark(id, &mut worklist);
        }
        self.process_worklist(&mut worklist);
        let freed = self.sweep();
        self.events = 0;
        self.collections += 1;
        debug!(
            freed,
            live = self.slots.len() - self.free_list.len(),
            reserved = self.reserved,
            "collection finished"
        );
        freed
    }

    fn mark(&mut self, id: ObjId, worklist: &mut Vec<ObjId>) {
        let slot = &mut self.slots[id.0 as usize];
        if !slot.mark {
            slot.mark = true;
            worklist.push(id);
        }
    }

    /// Process the mark worklist: for each marked object, mark everything it references.
    fn process_worklist(&mut self, worklist: &mut Vec<ObjId>) {
        let mut children = Vec::new();
        while let Some(id) = worklist.pop() {
            children.clear();
            self.slots[id.0 as usize].obj.trace(&mut children);
            for &child in &children {
                self.mark(child, worklist);
            }
        }
    }

    /// Sweep: reclaim unmarked slots, clear marks, hand trailing batches back to the host.
    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for slot in &mut self.slots {
            if slot.mark {
                slot.mark = false;
            } else if !matches!(slot.obj, HeapObject::Free) {
                slot.obj = HeapObject::Free;
                freed += 1;
            }
        }

        while matches!(self.slots.last(), Some(slot) if matches!(slot.obj, HeapObject::Free)) {
            self.slots.pop();
        }
        let keep = self.slots.len().div_ceil(self.alloc_batch) * self.alloc_batch;
        if keep < self.reserved && self.allocator.resize(self.reserved, keep) {
            trace!(from = self.reserved, to = keep, "heap shrunk");
            self.reserved = keep;
        }

        self.free_list.clear();
        for (i, slot) in self.slots.iter().enumerate().rev() {
            if matches!(slot.obj, HeapObject::Free) {
                self.free_list.push(ObjId(i as u32));
            }
        }
        freed
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        if self.reserved > 0 {
            self.allocator.resize(self.reserved, 0);
        }
    }
}
