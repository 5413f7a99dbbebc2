//! Per-host bookkeeping kept beside the document rather than inside it.
//!
//! Each mounted host element owns exactly one [`HostMeta`] entry in a thread-local
//! side-table keyed by element identity. The table is partitioned by element type so
//! that several platforms can coexist in one process. An entry lives from mount to
//! unmount and is never reachable other than through its host element.

use core::{
    any::{Any, TypeId},
    hash::Hash,
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use uuid::Uuid;

/// Bookkeeping attached to a mounted host element.
pub(crate) struct HostMeta<E> {
    /// The factory that mounted the host.
    pub(crate) owner: Uuid,
    /// The instance living on the host.
    pub(crate) instance: Uuid,
    /// Node the component runtime renders into.
    pub(crate) target: E,
    /// The tree most recently handed to the runtime.
    pub(crate) tree: Option<Rc<dyn Any>>,
    /// Unmounts the instance through its owning factory.
    pub(crate) unmount: Rc<dyn Fn()>,
}

type Table<E> = HashMap<E, HostMeta<E>>;

thread_local! {
    static TABLES: RefCell<HashMap<TypeId, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

fn with_table<E, T>(f: impl FnOnce(&mut Table<E>) -> T) -> T
where
    E: Eq + Hash + 'static,
{
    TABLES.with(|tables| {
        let mut tables = tables.borrow_mut();
        let table = tables
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Table::<E>::new()));
        // The entry for `TypeId::of::<E>()` is only ever created with `Table<E>`.
        let table = table
            .downcast_mut::<Table<E>>()
            .unwrap_or_else(|| unreachable!("host table registered under a foreign type"));
        f(table)
    })
}

// Displaced entries are dropped only after the table borrow ends, since dropping a
// tree may run arbitrary code.

pub(crate) fn insert<E: Eq + Hash + Clone + 'static>(host: &E, meta: HostMeta<E>) {
    let displaced = with_table(|table: &mut Table<E>| table.insert(host.clone(), meta));
    drop(displaced);
}

/// Removes the entry of `host` if it belongs to `instance`.
pub(crate) fn remove_owned<E: Eq + Hash + 'static>(host: &E, instance: Uuid) -> bool {
    let removed = with_table(|table: &mut Table<E>| {
        if table.get(host).is_some_and(|meta| meta.instance == instance) {
            table.remove(host)
        } else {
            None
        }
    });
    removed.is_some()
}

/// Returns the unmount closure of whatever currently lives on `host`.
pub(crate) fn unmount_handle<E: Eq + Hash + 'static>(host: &E) -> Option<Rc<dyn Fn()>> {
    with_table(|table: &mut Table<E>| table.get(host).map(|meta| Rc::clone(&meta.unmount)))
}

pub(crate) fn set_tree<E: Eq + Hash + 'static>(host: &E, instance: Uuid, tree: Rc<dyn Any>) {
    let displaced = with_table(|table: &mut Table<E>| {
        table
            .get_mut(host)
            .filter(|meta| meta.instance == instance)
            .and_then(|meta| meta.tree.replace(tree))
    });
    drop(displaced);
}

pub(crate) fn tree<E: Eq + Hash + 'static>(host: &E) -> Option<Rc<dyn Any>> {
    with_table(|table: &mut Table<E>| table.get(host).and_then(|meta| meta.tree.clone()))
}

/// Returns the node widgets on `host` render into: the host itself or its shadow root.
pub fn render_target<E: Eq + Hash + Clone + 'static>(host: &E) -> Option<E> {
    with_table(|table: &mut Table<E>| table.get(host).map(|meta| meta.target.clone()))
}

pub(crate) fn owner<E: Eq + Hash + 'static>(host: &E) -> Option<(Uuid, Uuid)> {
    with_table(|table: &mut Table<E>| table.get(host).map(|meta| (meta.owner, meta.instance)))
}

/// Returns `true` if a widget is currently mounted on `host`.
pub fn is_mounted<E: Eq + Hash + 'static>(host: &E) -> bool {
    with_table(|table: &mut Table<E>| table.contains_key(host))
}

/// Returns the tree most recently rendered into `host`, if it has the expected type.
pub fn rendered_tree<E: Eq + Hash + 'static, T: 'static>(host: &E) -> Option<Rc<T>> {
    tree(host).and_then(|tree| tree.downcast::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Node(u32);

    fn meta(instance: Uuid) -> HostMeta<Node> {
        HostMeta {
            owner: Uuid::new_v4(),
            instance,
            target: Node(99),
            tree: None,
            unmount: Rc::new(|| {}),
        }
    }

    #[test]
    fn removal_requires_matching_instance() {
        let host = Node(1);
        let instance = Uuid::new_v4();
        insert(&host, meta(instance));

        assert!(is_mounted(&host));
        assert!(!remove_owned(&host, Uuid::new_v4()));
        assert!(is_mounted(&host));
        assert!(remove_owned(&host, instance));
        assert!(!is_mounted(&host));
    }

    #[test]
    fn tables_are_partitioned_by_element_type() {
        let instance = Uuid::new_v4();
        insert(&Node(7), meta(instance));
        assert!(is_mounted(&Node(7)));
        assert!(!is_mounted(&7_u32));
        remove_owned(&Node(7), instance);
    }

    #[test]
    fn tree_is_typed_on_read() {
        let host = Node(3);
        let instance = Uuid::new_v4();
        insert(&host, meta(instance));
        set_tree(&host, instance, Rc::new(String::from("tree")));

        assert_eq!(rendered_tree::<_, String>(&host).as_deref(), Some(&String::from("tree")));
        assert!(rendered_tree::<_, u8>(&host).is_none());
        assert_eq!(render_target(&host), Some(Node(99)));
        remove_owned(&host, instance);
    }
}
