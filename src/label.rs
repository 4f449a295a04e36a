use std::fmt;

/// Jump target name, rendered as `L<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

impl Label {
  pub fn index(self) -> usize {
    self.0
  }
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "L{}", self.0)
  }
}

/// Hands out labels numbered from zero in request order. One allocator lives
/// for a whole compilation and is never rewound.
#[derive(Debug, Default)]
pub struct LabelAllocator {
  next: usize,
}

impl LabelAllocator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fresh(&mut self) -> Label {
    let label = Label(self.next);
    self.next += 1;
    label
  }

  /// Number of labels handed out so far.
  pub fn issued(&self) -> usize {
    self.next
  }
}
