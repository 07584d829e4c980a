//! Typed bump arena for AST nodes.
//!
//! Nodes are appended into fixed-capacity blocks and addressed through
//! [`Id`] handles. A block is never resized once created, so nothing moves
//! after allocation, and nothing is freed until the whole arena is dropped.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Index;

/// Number of nodes held by one block.
pub const BLOCK_CAPACITY: usize = 1024;

/// Handle to a node stored in an [`Arena<T>`].
pub struct Id<T> {
  index: u32,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
  /// `None` once `index` no longer fits in a handle.
  fn new(index: usize) -> Option<Self> {
    let index = u32::try_from(index).ok()?;
    Some(Self {
      index,
      _marker: PhantomData,
    })
  }

  pub fn index(self) -> usize {
    self.index as usize
  }
}

// Manual impls: deriving would put bounds on `T`.
impl<T> Clone for Id<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
  fn eq(&self, other: &Self) -> bool {
    self.index == other.index
  }
}

impl<T> Eq for Id<T> {}

impl<T> fmt::Debug for Id<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Id({})", self.index)
  }
}

/// Returned when an arena with a block limit has no room left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
  pub blocks: usize,
}

#[derive(Debug)]
pub struct Arena<T> {
  blocks: Vec<Vec<T>>,
  len: usize,
  block_limit: Option<usize>,
}

impl<T> Default for Arena<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Arena<T> {
  /// An arena that grows by whole blocks without limit.
  pub fn new() -> Self {
    Self {
      blocks: Vec::new(),
      len: 0,
      block_limit: None,
    }
  }

  /// An arena that refuses to allocate past `limit` blocks.
  pub fn with_block_limit(limit: usize) -> Self {
    Self {
      block_limit: Some(limit),
      ..Self::new()
    }
  }

  pub fn alloc(&mut self, value: T) -> Result<Id<T>, Exhausted> {
    let Some(id) = Id::new(self.len) else {
      return Err(Exhausted {
        blocks: self.blocks.len(),
      });
    };

    let needs_block = self
      .blocks
      .last()
      .is_none_or(|block| block.len() == BLOCK_CAPACITY);

    if needs_block {
      if let Some(limit) = self.block_limit
        && self.blocks.len() >= limit
      {
        return Err(Exhausted {
          blocks: self.blocks.len(),
        });
      }
      self.blocks.push(Vec::with_capacity(BLOCK_CAPACITY));
    }

    let Some(block) = self.blocks.last_mut() else {
      unreachable!("a block was pushed above");
    };
    block.push(value);
    self.len += 1;
    Ok(id)
  }

  pub fn get(&self, id: Id<T>) -> Option<&T> {
    let index = id.index();
    self
      .blocks
      .get(index / BLOCK_CAPACITY)
      .and_then(|block| block.get(index % BLOCK_CAPACITY))
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn block_count(&self) -> usize {
    self.blocks.len()
  }
}

impl<T> Index<Id<T>> for Arena<T> {
  type Output = T;

  fn index(&self, id: Id<T>) -> &T {
    match self.get(id) {
      Some(value) => value,
      None => panic!("{id:?} does not belong to this arena"),
    }
  }
}
