use atomcas_core::{Atom, CasBackend, CasConnector, MemoryConnector, ObjectLink, StoreError};
use std::sync::Arc;

fn open_memory(key: &str) -> (MemoryConnector, CasBackend) {
    let connector = MemoryConnector::new();
    let backend = CasBackend::open_with_connector(&connector, &format!("cas:///{key}")).unwrap();
    (connector, backend)
}

fn workspace_links(connector: &MemoryConnector, backend: &CasBackend) -> Vec<ObjectLink> {
    let probe = connector.connect().unwrap();
    probe
        .list_links(&backend.get_workspace_cid().unwrap())
        .unwrap()
}

fn list_over_ab() -> Arc<Atom> {
    Atom::link(
        "ListLink",
        vec![Atom::node("ConceptNode", "a"), Atom::node("ConceptNode", "b")],
    )
}

/// The `incoming` array of the stored extended object for `text_key`.
fn incoming_of(connector: &MemoryConnector, backend: &CasBackend, text_key: &str) -> Vec<String> {
    let probe = connector.connect().unwrap();
    let wcid = backend.get_workspace_cid().unwrap();
    let object = probe.dag_get(&format!("{wcid}/{text_key}")).unwrap();
    object["incoming"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn storing_a_link_indexes_both_children() {
    let (connector, backend) = open_memory("kb");
    backend.store_atom(&list_over_ab(), true).unwrap();

    let links = workspace_links(&connector, &backend);
    assert_eq!(links.len(), 3, "list plus both children are in the workspace");

    let list_guid = links
        .iter()
        .find(|link| link.name.starts_with("(ListLink"))
        .map(|link| link.cid.clone())
        .unwrap();

    for child_key in ["(ConceptNode \"a\")", "(ConceptNode \"b\")"] {
        let incoming = incoming_of(&connector, &backend, child_key);
        assert_eq!(incoming, vec![list_guid.clone()], "child {child_key}");
    }
}

#[test]
fn incoming_entries_are_never_duplicated() {
    let (connector, backend) = open_memory("kb");
    backend.store_atom(&list_over_ab(), true).unwrap();
    backend.store_atom(&list_over_ab(), true).unwrap();

    let incoming = incoming_of(&connector, &backend, "(ConceptNode \"a\")");
    assert_eq!(incoming.len(), 1, "a GUID occurs at most once in an incoming set");
}

#[test]
fn fetching_the_link_by_id_reconstructs_it() {
    let (connector, backend) = open_memory("kb");
    let list = list_over_ab();
    backend.store_atom(&list, true).unwrap();

    let links = workspace_links(&connector, &backend);
    let list_cid = links
        .iter()
        .find(|link| link.name.starts_with("(ListLink"))
        .map(|link| link.cid.clone())
        .unwrap();

    let fetched = backend.fetch_atom_by_id(&list_cid).unwrap();
    assert_eq!(*fetched, *list);
    assert_eq!(fetched.arity(), 2);
}

#[test]
fn get_incoming_set_returns_the_holding_links() {
    let (_connector, backend) = open_memory("kb");
    let list = list_over_ab();
    backend.store_atom(&list, true).unwrap();

    let a = Atom::node("ConceptNode", "a");
    let incoming = backend.get_incoming_set(&a).unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(*incoming[0], *list);

    let by_type = backend.get_incoming_by_type(&a, "ListLink").unwrap();
    assert_eq!(by_type.len(), 1);
    let by_other_type = backend.get_incoming_by_type(&a, "SetLink").unwrap();
    assert!(by_other_type.is_empty());
}

#[test]
fn incoming_set_of_an_unstored_atom_is_empty() {
    let (_connector, backend) = open_memory("kb");
    let incoming = backend
        .get_incoming_set(&Atom::node("ConceptNode", "ghost"))
        .unwrap();
    assert!(incoming.is_empty());
}

#[test]
fn non_recursive_remove_refuses_while_held() {
    let (connector, backend) = open_memory("kb");
    backend.store_atom(&list_over_ab(), true).unwrap();

    let a = Atom::node("ConceptNode", "a");
    backend.remove_atom(&a, false).unwrap();

    // Still present: the list holds it.
    let names: Vec<String> = workspace_links(&connector, &backend)
        .into_iter()
        .map(|link| link.name)
        .collect();
    assert!(names.contains(&"(ConceptNode \"a\")".to_string()));
    assert_eq!(names.len(), 3);
}

#[test]
fn recursive_remove_takes_the_incoming_closure() {
    let (connector, backend) = open_memory("kb");
    backend.store_atom(&list_over_ab(), true).unwrap();

    let a = Atom::node("ConceptNode", "a");
    backend.remove_atom(&a, true).unwrap();

    let names: Vec<String> = workspace_links(&connector, &backend)
        .into_iter()
        .map(|link| link.name)
        .collect();
    assert_eq!(names, vec!["(ConceptNode \"b\")".to_string()]);

    // "b" survives, and its incoming set no longer references the list.
    assert!(incoming_of(&connector, &backend, "(ConceptNode \"b\")").is_empty());

    let fetched = backend.fetch_atom(&a).unwrap();
    assert!(fetched.value_entries().is_empty(), "removed atom has no state");
}

#[test]
fn recursive_remove_reaches_nested_holders() {
    let (connector, backend) = open_memory("kb");
    let inner = list_over_ab();
    let outer = Atom::link(
        "EvaluationLink",
        vec![Atom::node("PredicateNode", "p"), inner.clone()],
    );
    backend.store_atom(&outer, true).unwrap();

    backend
        .remove_atom(&Atom::node("ConceptNode", "a"), true)
        .unwrap();

    let names: Vec<String> = workspace_links(&connector, &backend)
        .into_iter()
        .map(|link| link.name)
        .collect();
    assert!(
        !names.iter().any(|name| name.contains("ListLink")),
        "inner list must be gone"
    );
    assert!(
        !names.iter().any(|name| name.contains("EvaluationLink")),
        "outer holder must be gone"
    );
    assert!(names.contains(&"(ConceptNode \"b\")".to_string()));
    assert!(names.contains(&"(PredicateNode \"p\")".to_string()));
    assert!(incoming_of(&connector, &backend, "(PredicateNode \"p\")").is_empty());
}

#[test]
fn removing_an_unstored_atom_is_silent() {
    let (_connector, backend) = open_memory("kb");
    backend
        .remove_atom(&Atom::node("ConceptNode", "ghost"), true)
        .unwrap();
    let stats = backend.stats_snapshot().unwrap();
    assert_eq!(stats.num_atom_removes, 1);
    assert_eq!(stats.num_atom_deletes, 0, "nothing was actually deleted");
}

#[test]
fn delete_counter_moves_once_per_top_level_remove() {
    let (_connector, backend) = open_memory("kb");
    backend.store_atom(&list_over_ab(), true).unwrap();

    backend
        .remove_atom(&Atom::node("ConceptNode", "a"), true)
        .unwrap();

    let stats = backend.stats_snapshot().unwrap();
    assert_eq!(stats.num_atom_removes, 1);
    assert_eq!(
        stats.num_atom_deletes, 1,
        "recursion must not double-count deletes"
    );
}

#[test]
fn remove_then_restore_works() {
    let (connector, backend) = open_memory("kb");
    backend.store_atom(&list_over_ab(), true).unwrap();
    backend
        .remove_atom(&Atom::node("ConceptNode", "a"), true)
        .unwrap();

    backend.store_atom(&list_over_ab(), true).unwrap();
    let links = workspace_links(&connector, &backend);
    assert_eq!(links.len(), 3);

    let incoming = incoming_of(&connector, &backend, "(ConceptNode \"a\")");
    assert_eq!(incoming.len(), 1);
}

#[test]
fn remove_errors_are_typed() {
    let (_connector, backend) = open_memory("kb");
    backend.store_atom(&Atom::node("ConceptNode", "x"), true).unwrap();
    // Internal consistency probe: removing an atom twice is silent the
    // second time because the workspace lookup reports it unstored.
    let x = Atom::node("ConceptNode", "x");
    backend.remove_atom(&x, false).unwrap();
    backend.remove_atom(&x, false).unwrap();
    let stats = backend.stats_snapshot().unwrap();
    assert_eq!(stats.num_atom_deletes, 1);
    assert!(matches!(
        backend.load_type(&atomcas_core::AtomTable::new(), "ConceptNode"),
        Err(StoreError::NotImplemented(_))
    ));
}
