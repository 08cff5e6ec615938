use std::fmt;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::value::Value;

/// The four independent address spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Space {
    Heap,
    Vmem,
    Page,
    Swap,
}

impl Space {
    pub fn name(self) -> &'static str {
        match self {
            Space::Heap => "heap",
            Space::Vmem => "vmem",
            Space::Page => "page",
            Space::Swap => "swap",
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque reference to one allocation within a single space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub space: Space,
    pub id: u64,
    pub size: usize,
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} handle #{}, size {}>", self.space, self.id, self.size)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MemoryFault {
    #[error("use after free: {space} allocation #{id} no longer exists")]
    UseAfterFree { space: Space, id: u64 },
    #[error("index {index} out of bounds for allocation of size {size}")]
    OutOfBounds { index: i64, size: usize },
    #[error("expected a {expected} handle, found a {actual} handle")]
    WrongSpace { expected: Space, actual: Space },
    #[error("page allocation #{id} is swapped out")]
    SwappedOut { id: u64 },
    #[error("page allocation #{id} is not in swap")]
    NotSwapped { id: u64 },
    #[error("stack is empty")]
    StackUnderflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub heap: usize,
    pub vmem: usize,
    pub pages: usize,
    pub swap: usize,
    pub stack: usize,
}

/// Allocation ids are monotonic across all spaces; a freed id is never
/// reused.
#[derive(Debug)]
pub struct MemorySubsystem {
    heap: IndexMap<u64, Vec<Value>>,
    vmem: IndexMap<u64, Vec<Value>>,
    pages: IndexMap<u64, Vec<Value>>,
    swap: IndexMap<u64, Vec<Value>>,
    stack: Vec<Value>,
    next_id: u64,
}

impl MemorySubsystem {
    pub fn new() -> Self {
        Self {
            heap: IndexMap::new(),
            vmem: IndexMap::new(),
            pages: IndexMap::new(),
            swap: IndexMap::new(),
            stack: Vec::new(),
            next_id: 1,
        }
    }

    fn table(&self, space: Space) -> &IndexMap<u64, Vec<Value>> {
        match space {
            Space::Heap => &self.heap,
            Space::Vmem => &self.vmem,
            Space::Page => &self.pages,
            Space::Swap => &self.swap,
        }
    }

    fn table_mut(&mut self, space: Space) -> &mut IndexMap<u64, Vec<Value>> {
        match space {
            Space::Heap => &mut self.heap,
            Space::Vmem => &mut self.vmem,
            Space::Page => &mut self.pages,
            Space::Swap => &mut self.swap,
        }
    }

    pub fn allocate(&mut self, space: Space, size: usize) -> Handle {
        let id = self.next_id;
        self.next_id += 1;
        self.table_mut(space).insert(id, vec![Value::number(0.0); size]);
        Handle { space, id, size }
    }

    pub fn free(&mut self, handle: &Handle) -> Result<(), MemoryFault> {
        if self.table_mut(handle.space).shift_remove(&handle.id).is_some() {
            return Ok(());
        }
        // A swapped-out page is still freeable through its handle.
        if handle.space == Space::Page && self.swap.shift_remove(&handle.id).is_some() {
            return Ok(());
        }
        Err(MemoryFault::UseAfterFree {
            space: handle.space,
            id: handle.id,
        })
    }

    fn slots(&self, handle: &Handle) -> Result<&Vec<Value>, MemoryFault> {
        if let Some(slots) = self.table(handle.space).get(&handle.id) {
            return Ok(slots);
        }
        if handle.space == Space::Page && self.swap.contains_key(&handle.id) {
            return Err(MemoryFault::SwappedOut { id: handle.id });
        }
        Err(MemoryFault::UseAfterFree {
            space: handle.space,
            id: handle.id,
        })
    }

    pub fn read(&self, handle: &Handle, index: i64) -> Result<Value, MemoryFault> {
        let slots = self.slots(handle)?;
        let size = slots.len();
        if index < 0 || index as usize >= size {
            return Err(MemoryFault::OutOfBounds { index, size });
        }
        Ok(slots[index as usize].clone())
    }

    pub fn write(&mut self, handle: &Handle, index: i64, value: Value) -> Result<(), MemoryFault> {
        let size = self.slots(handle)?.len();
        if index < 0 || index as usize >= size {
            return Err(MemoryFault::OutOfBounds { index, size });
        }
        if let Some(slots) = self.table_mut(handle.space).get_mut(&handle.id) {
            slots[index as usize] = value;
        }
        Ok(())
    }

    pub fn swap_out(&mut self, handle: &Handle) -> Result<(), MemoryFault> {
        if handle.space != Space::Page {
            return Err(MemoryFault::WrongSpace {
                expected: Space::Page,
                actual: handle.space,
            });
        }
        match self.pages.shift_remove(&handle.id) {
            Some(slots) => {
                self.swap.insert(handle.id, slots);
                Ok(())
            }
            None if self.swap.contains_key(&handle.id) => {
                Err(MemoryFault::SwappedOut { id: handle.id })
            }
            None => Err(MemoryFault::UseAfterFree {
                space: handle.space,
                id: handle.id,
            }),
        }
    }

    pub fn swap_in(&mut self, handle: &Handle) -> Result<(), MemoryFault> {
        if handle.space != Space::Page {
            return Err(MemoryFault::WrongSpace {
                expected: Space::Page,
                actual: handle.space,
            });
        }
        match self.swap.shift_remove(&handle.id) {
            Some(slots) => {
                self.pages.insert(handle.id, slots);
                Ok(())
            }
            None if self.pages.contains_key(&handle.id) => {
                Err(MemoryFault::NotSwapped { id: handle.id })
            }
            None => Err(MemoryFault::UseAfterFree {
                space: handle.space,
                id: handle.id,
            }),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, MemoryFault> {
        self.stack.pop().ok_or(MemoryFault::StackUnderflow)
    }

    /// Swapped-out pages are judged live by their page handle.
    pub fn sweep(&mut self, live: &IndexSet<(Space, u64)>) -> usize {
        let mut collected = 0;
        for space in [Space::Heap, Space::Vmem, Space::Page] {
            let table = self.table_mut(space);
            let before = table.len();
            table.retain(|id, _| live.contains(&(space, *id)));
            collected += before - table.len();
        }
        let before = self.swap.len();
        self.swap
            .retain(|id, _| live.contains(&(Space::Page, *id)) || live.contains(&(Space::Swap, *id)));
        collected += before - self.swap.len();
        collected
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            heap: self.heap.len(),
            vmem: self.vmem.len(),
            pages: self.pages.len(),
            swap: self.swap.len(),
            stack: self.stack.len(),
        }
    }
}

impl Default for MemorySubsystem {
    fn default() -> Self {
        Self::new()
    }
}
