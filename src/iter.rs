use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::slice;

/// Iterator over every point in a tree, one leaf bucket after another.
///
/// Created by [`VPTree::iter`](crate::VPTree::iter). Order follows the
/// tree's layout and carries no meaning.
pub struct Iter<'a, T: 'a> {
    buckets: VecDeque<slice::Iter<'a, T>>,
}

impl<'a, T: 'a> Iter<'a, T> {
    pub(crate) fn new(buckets: Vec<slice::Iter<'a, T>>) -> Self {
        Iter { buckets: buckets.into() }
    }
}

impl<'a, T: 'a> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            let front = self.buckets.front_mut()?;
            if let Some(point) = front.next() {
                return Some(point);
            }
            self.buckets.pop_front();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buckets.iter().map(|b| b.len()).sum();
        (remaining, Some(remaining))
    }
}

impl<'a, T: 'a> ExactSizeIterator for Iter<'a, T> {}

impl<'a, T: 'a> FusedIterator for Iter<'a, T> {}

impl<'a, T: 'a> Clone for Iter<'a, T> {
    fn clone(&self) -> Self {
        Iter { buckets: self.buckets.clone() }
    }
}
