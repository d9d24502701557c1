//! Intrusive doubly-linked lists over [`Arena`](super::arena::Arena) slots.
//!
//! Upstream represents ready queues and wait queues as raw-pointer intrusive
//! lists threaded through the control blocks themselves. The pointers are
//! re-expressed here as `Option<Id>` link fields (per the data model's
//! invariant that a task's `prev`/`next` belong to exactly one list at a
//! time) and all traversal goes through the owning [`Arena`], so there is no
//! way to dereference a dangling link.
use super::arena::{Arena, Id};
use super::init::Init;

/// The link fields embedded in a list node. A node is a member of at most
/// one list at a time, mirroring the data model's invariant that a task's
/// link fields belong exclusively to whichever list currently owns it.
#[derive(Clone, Copy, Debug)]
pub struct Links {
    pub prev: Option<Id>,
    pub next: Option<Id>,
}

impl Init for Links {
    const INIT: Self = Self {
        prev: None,
        next: None,
    };
}

/// Implemented by every control block type that can be threaded onto a
/// [`DList`].
pub trait Linked {
    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;
}

/// A doubly-linked list of `Id`s, headed outside of the arena (e.g. in a
/// ready-queue bucket or a semaphore's wait-queue field).
#[derive(Clone, Copy, Debug)]
pub struct DList {
    head: Option<Id>,
    tail: Option<Id>,
}

impl Init for DList {
    const INIT: Self = Self {
        head: None,
        tail: None,
    };
}

impl DList {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    pub fn front(&self) -> Option<Id> {
        self.head
    }

    /// Insert `id` at the back of the list.
    ///
    /// `id` must not already be linked into any list.
    pub fn push_back<T: Linked, const N: usize>(&mut self, arena: &mut Arena<T, N>, id: Id) {
        match self.tail {
            None => {
                self.head = Some(id);
                self.tail = Some(id);
            }
            Some(tail_id) => {
                arena.get_mut(tail_id).unwrap().links_mut().next = Some(id);
                let node = arena.get_mut(id).unwrap();
                node.links_mut().prev = Some(tail_id);
                self.tail = Some(id);
            }
        }
    }

    /// Insert `id` immediately before `before`. If `before` is `None`,
    /// equivalent to [`push_back`](Self::push_back).
    pub fn insert_before<T: Linked, const N: usize>(
        &mut self,
        arena: &mut Arena<T, N>,
        before: Option<Id>,
        id: Id,
    ) {
        let Some(before) = before else {
            self.push_back(arena, id);
            return;
        };
        let prev = arena.get(before).unwrap().links().prev;
        arena.get_mut(before).unwrap().links_mut().prev = Some(id);
        {
            let node = arena.get_mut(id).unwrap();
            node.links_mut().prev = prev;
            node.links_mut().next = Some(before);
        }
        match prev {
            Some(p) => arena.get_mut(p).unwrap().links_mut().next = Some(id),
            None => self.head = Some(id),
        }
    }

    /// Remove and return the head of the list.
    pub fn pop_front<T: Linked, const N: usize>(&mut self, arena: &mut Arena<T, N>) -> Option<Id> {
        let id = self.head?;
        self.remove(arena, id);
        Some(id)
    }

    /// Unlink `id` from the list. `id` must currently be a member.
    pub fn remove<T: Linked, const N: usize>(&mut self, arena: &mut Arena<T, N>, id: Id) {
        let (prev, next) = {
            let links = arena.get(id).unwrap().links();
            (links.prev, links.next)
        };
        match prev {
            Some(p) => arena.get_mut(p).unwrap().links_mut().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => arena.get_mut(n).unwrap().links_mut().prev = prev,
            None => self.tail = prev,
        }
        let links = arena.get_mut(id).unwrap().links_mut();
        links.prev = None;
        links.next = None;
    }

    /// Insert `id` so the list remains sorted in non-decreasing `key`,
    /// inserting after any existing entries with an equal key (stable /
    /// FIFO-within-key ordering, as required for priority-ordered wait
    /// queues and the sorted timer list).
    pub fn insert_sorted_by_key<T: Linked, const N: usize, K: PartialOrd>(
        &mut self,
        arena: &mut Arena<T, N>,
        id: Id,
        new_key: K,
        key_of: impl Fn(&T) -> K,
    ) {
        let mut cursor = self.head;
        while let Some(cur) = cursor {
            let cur_key = key_of(arena.get(cur).unwrap());
            if new_key < cur_key {
                break;
            }
            cursor = arena.get(cur).unwrap().links().next;
        }
        self.insert_before(arena, cursor, id);
    }

    /// Iterate the ids in the list, front to back. Requires `&Arena` to walk
    /// the links, so it's a separate step from mutation.
    pub fn iter<'a, T: Linked, const N: usize>(
        &self,
        arena: &'a Arena<T, N>,
    ) -> impl Iterator<Item = Id> + 'a {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let id = cursor?;
            cursor = arena.get(id).unwrap().links().next;
            Some(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    struct Node {
        links: Links,
        key: i32,
    }
    impl Init for Node {
        const INIT: Self = Self {
            links: Links::INIT,
            key: 0,
        };
    }
    impl Linked for Node {
        fn links(&self) -> &Links {
            &self.links
        }
        fn links_mut(&mut self) -> &mut Links {
            &mut self.links
        }
    }

    #[test]
    fn fifo_order() {
        let mut arena = Arena::<Node, 8>::INIT;
        let mut list = DList::INIT;
        let ids: Vec<_> = (0..3)
            .map(|k| {
                let id = arena
                    .insert(Node {
                        links: Links::INIT,
                        key: k,
                    })
                    .unwrap();
                list.push_back(&mut arena, id);
                id
            })
            .collect();
        assert_eq!(list.iter(&arena).collect::<Vec<_>>(), ids);
        assert_eq!(list.pop_front(&mut arena), Some(ids[0]));
        assert_eq!(list.pop_front(&mut arena), Some(ids[1]));
        assert_eq!(list.pop_front(&mut arena), Some(ids[2]));
        assert!(list.is_empty());
    }

    #[test]
    fn sorted_insert_stable_on_ties() {
        let mut arena = Arena::<Node, 8>::INIT;
        let mut list = DList::INIT;
        let mut push = |arena: &mut Arena<Node, 8>, list: &mut DList, key: i32| {
            let id = arena.insert(Node { links: Links::INIT, key }).unwrap();
            list.insert_sorted_by_key(arena, id, key, |n| n.key);
            id
        };
        let a = push(&mut arena, &mut list, 5);
        let b = push(&mut arena, &mut list, 2);
        let c = push(&mut arena, &mut list, 5); // ties with `a`, must land after it
        let d = push(&mut arena, &mut list, 3);

        let order: Vec<_> = list.iter(&arena).collect();
        assert_eq!(order, vec![b, d, a, c]);
    }

    #[test]
    fn remove_middle() {
        let mut arena = Arena::<Node, 8>::INIT;
        let mut list = DList::INIT;
        let a = arena.insert(Node { links: Links::INIT, key: 1 }).unwrap();
        let b = arena.insert(Node { links: Links::INIT, key: 2 }).unwrap();
        let c = arena.insert(Node { links: Links::INIT, key: 3 }).unwrap();
        list.push_back(&mut arena, a);
        list.push_back(&mut arena, b);
        list.push_back(&mut arena, c);
        list.remove(&mut arena, b);
        assert_eq!(list.iter(&arena).collect::<Vec<_>>(), vec![a, c]);
    }
}
