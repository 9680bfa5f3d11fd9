pub struct Doubling {
    next: usize,
}

impl Iterator for Doubling {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.next;
        self.next <<= 1;
        Some(next)
    }
}

// Returns the strides of the doubling scan rounds for a block of `block_dim`
// threads: 1, 2, 4, ..., `block_dim`.
pub fn scan_strides(block_dim: usize) -> impl Iterator<Item = usize> {
    Doubling { next: 1 }.take_while(move |&s| s <= block_dim)
}
