//! Doubly linked ownership container backing the data pipe
//!
//! [`SpliceList`] is a sequence of owned items supporting O(1) insertion and
//! removal at both ends, O(k) sub-range extraction, and O(1) splicing of one
//! list onto another. Extraction and splicing transfer node ownership; nodes
//! are never copied and an item belongs to exactly one list at a time.
//!
//! Forward links own their successor: every node is reachable from `head`
//! and is freed by walking the forward chain. Backward links exist purely
//! for reverse traversal and never extend a node's lifetime.
//!
//! The list is **not** internally synchronized. Concurrent correctness is
//! the responsibility of whatever is built on top of it (see
//! [`ThreadPipe`](crate::ThreadPipe), which only touches its list on the
//! shared serialization queue).

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// A single list node: one item plus its neighbor links.
struct Node<T> {
    item: T,
    /// Owning forward link (the node logically owns its successor).
    next: Option<NonNull<Node<T>>>,
    /// Non-owning backward link, for reverse traversal only.
    prev: Option<NonNull<Node<T>>>,
}

/// A doubly linked list of owned items with head/tail access, sub-range
/// extraction, and splicing.
///
/// # Example
///
/// ```
/// use threadpipe::SpliceList;
///
/// let mut list = SpliceList::new();
/// for v in ["a", "b", "c", "d", "e"] {
///     list.push_tail(v);
/// }
///
/// let suffix = list.extract_suffix(2).unwrap();
/// assert_eq!(suffix.iter().copied().collect::<Vec<_>>(), ["d", "e"]);
/// assert_eq!(list.iter().copied().collect::<Vec<_>>(), ["a", "b", "c"]);
/// ```
pub struct SpliceList<T> {
    head: Option<NonNull<Node<T>>>,
    /// Alias into the chain owned through `head`; null iff the list is empty.
    tail: Option<NonNull<Node<T>>>,
    len: usize,
    marker: PhantomData<Box<Node<T>>>,
}

unsafe impl<T: Send> Send for SpliceList<T> {}
unsafe impl<T: Sync> Sync for SpliceList<T> {}

impl<T> Default for SpliceList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SpliceList<T> {
    /// Creates an empty list.
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            marker: PhantomData,
        }
    }

    /// Number of items in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list holds no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends an item at the tail. O(1).
    pub fn push_tail(&mut self, item: T) {
        let node = NonNull::from(Box::leak(Box::new(Node {
            item,
            next: None,
            prev: self.tail,
        })));
        match self.tail {
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(node) },
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
    }

    /// Prepends an item at the head. O(1).
    pub fn push_head(&mut self, item: T) {
        let node = NonNull::from(Box::leak(Box::new(Node {
            item,
            next: self.head,
            prev: None,
        })));
        match self.head {
            Some(head) => unsafe { (*head.as_ptr()).prev = Some(node) },
            None => self.tail = Some(node),
        }
        self.head = Some(node);
        self.len += 1;
    }

    /// Removes and returns the head item, or `None` if the list is empty. O(1).
    pub fn pop_head(&mut self) -> Option<T> {
        self.head.map(|node| {
            let node = unsafe { Box::from_raw(node.as_ptr()) };
            self.head = node.next;
            match self.head {
                Some(head) => unsafe { (*head.as_ptr()).prev = None },
                None => self.tail = None,
            }
            self.len -= 1;
            node.item
        })
    }

    /// Removes and returns the tail item, or `None` if the list is empty. O(1).
    pub fn pop_tail(&mut self) -> Option<T> {
        self.tail.map(|node| {
            let node = unsafe { Box::from_raw(node.as_ptr()) };
            self.tail = node.prev;
            match self.tail {
                Some(tail) => unsafe { (*tail.as_ptr()).next = None },
                None => self.head = None,
            }
            self.len -= 1;
            node.item
        })
    }

    /// Returns a reference to the head item without removing it.
    pub fn head(&self) -> Option<&T> {
        self.head.map(|node| unsafe { &(*node.as_ptr()).item })
    }

    /// Returns a reference to the tail item without removing it.
    pub fn tail(&self) -> Option<&T> {
        self.tail.map(|node| unsafe { &(*node.as_ptr()).item })
    }

    /// Releases every node and resets the list to the empty state. O(n).
    pub fn clear(&mut self) {
        while self.pop_head().is_some() {}
    }

    /// Detaches the first `n` items into a new list, leaving the remaining
    /// `len - n` items in `self`. O(n).
    ///
    /// Requires `0 < n < len`; returns `None` without mutating the list
    /// otherwise. Extracting the whole list is rejected — callers wanting
    /// everything should take the list itself (e.g. `std::mem::take`).
    pub fn extract_prefix(&mut self, n: usize) -> Option<Self> {
        if n == 0 || n >= self.len {
            return None;
        }
        unsafe {
            // Boundary: last node of the extracted prefix.
            let mut boundary = self.head.expect("non-empty list with no head");
            for _ in 1..n {
                boundary = boundary
                    .as_ref()
                    .next
                    .expect("list shorter than its recorded length");
            }
            let rest = boundary
                .as_ref()
                .next
                .expect("list shorter than its recorded length");
            (*boundary.as_ptr()).next = None;
            (*rest.as_ptr()).prev = None;

            let extracted = Self {
                head: self.head,
                tail: Some(boundary),
                len: n,
                marker: PhantomData,
            };
            self.head = Some(rest);
            self.len -= n;
            Some(extracted)
        }
    }

    /// Detaches the last `n` items into a new list, leaving the remaining
    /// `len - n` items in `self`. O(n).
    ///
    /// Requires `0 < n < len`; returns `None` without mutating the list
    /// otherwise.
    pub fn extract_suffix(&mut self, n: usize) -> Option<Self> {
        if n == 0 || n >= self.len {
            return None;
        }
        unsafe {
            // Boundary: last node retained by `self`.
            let mut boundary = self.tail.expect("non-empty list with no tail");
            for _ in 0..n {
                boundary = boundary
                    .as_ref()
                    .prev
                    .expect("list shorter than its recorded length");
            }
            let chain = boundary
                .as_ref()
                .next
                .expect("boundary node with no successor");
            (*boundary.as_ptr()).next = None;
            (*chain.as_ptr()).prev = None;

            let extracted = Self {
                head: Some(chain),
                tail: self.tail,
                len: n,
                marker: PhantomData,
            };
            self.tail = Some(boundary);
            self.len -= n;
            Some(extracted)
        }
    }

    /// Moves every item of `source` onto the tail of `destination`, leaving
    /// `source` empty. O(1) — only boundary links are rewritten.
    pub fn join(source: &mut Self, destination: &mut Self) {
        if source.len == 0 {
            return;
        }
        let src_head = source.head.take().expect("non-empty list with no head");
        let src_tail = source.tail.take();
        match destination.tail {
            Some(tail) => unsafe {
                (*tail.as_ptr()).next = Some(src_head);
                (*src_head.as_ptr()).prev = Some(tail);
            },
            None => destination.head = Some(src_head),
        }
        destination.tail = src_tail;
        destination.len += source.len;
        source.len = 0;
    }

    /// Borrowing iterator over the items in head-to-tail order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head,
            remaining: self.len,
            marker: PhantomData,
        }
    }
}

impl<T> Drop for SpliceList<T> {
    fn drop(&mut self) {
        // Iterative teardown: dropping the forward Box chain recursively
        // would overflow the stack on long lists.
        self.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for SpliceList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Extend<T> for SpliceList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push_tail(item);
        }
    }
}

impl<T> FromIterator<T> for SpliceList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

/// Borrowing iterator returned by [`SpliceList::iter`].
pub struct Iter<'a, T> {
    next: Option<NonNull<Node<T>>>,
    remaining: usize,
    marker: PhantomData<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        self.next.map(|node| unsafe {
            let node = &*node.as_ptr();
            self.remaining -= 1;
            self.next = node.next;
            &node.item
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// Draining iterator returned by [`SpliceList::into_iter`].
pub struct IntoIter<T>(SpliceList<T>);

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.pop_head()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.0.len, Some(self.0.len))
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> IntoIterator for SpliceList<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter(self)
    }
}

impl<'a, T> IntoIterator for &'a SpliceList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
