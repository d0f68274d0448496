/// Iterator over every discrete index of a grid, index axis 0 fastest.
///
/// The visiting order matches linear storage order, so the n-th item is
/// the index whose linear offset is n.
#[derive(Debug, Clone)]
pub struct IndexIterator<const D: usize> {
    size: [usize; D],
    current: [usize; D],
    remaining: usize,
}

impl<const D: usize> Iterator for IndexIterator<D> {
    type Item = [usize; D];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.current;
        self.remaining -= 1;
        for k in 0..D {
            self.current[k] += 1;
            if self.current[k] < self.size[k] {
                break;
            }
            self.current[k] = 0;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<const D: usize> ExactSizeIterator for IndexIterator<D> {}

/// Generate every index of a grid with the given size.
///
/// # Arguments
/// * `size` - Grid size in index order
pub fn index_grid<const D: usize>(size: [usize; D]) -> IndexIterator<D> {
    IndexIterator {
        size,
        current: [0; D],
        remaining: size.iter().product(),
    }
}
