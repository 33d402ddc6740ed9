use atomcas_core::{Atom, CasBackend, CasConnector, MemoryConnector, Value};

fn open_memory(key: &str) -> (MemoryConnector, CasBackend) {
    let connector = MemoryConnector::new();
    let backend = CasBackend::open_with_connector(&connector, &format!("cas:///{key}")).unwrap();
    (connector, backend)
}

#[test]
fn storing_a_node_advances_the_workspace_cid() {
    let (_connector, backend) = open_memory("kb");
    let before = backend.get_workspace_cid().unwrap();

    let node = Atom::node("ConceptNode", "x");
    backend.store_atom(&node, true).unwrap();

    let after = backend.get_workspace_cid().unwrap();
    assert_ne!(before, after);

    let fetched = backend.fetch_atom(&Atom::node("ConceptNode", "x")).unwrap();
    assert_eq!(*fetched, *node);
    assert!(fetched.value_entries().is_empty());
}

#[test]
fn fetch_of_an_unstored_atom_returns_it_empty() {
    let (_connector, backend) = open_memory("kb");
    let ghost = Atom::node("ConceptNode", "never-stored");
    let fetched = backend.fetch_atom(&ghost).unwrap();
    assert_eq!(*fetched, *ghost);
    assert!(fetched.value_entries().is_empty());
}

#[test]
fn storing_twice_publishes_the_minimal_object_once() {
    let (_connector, backend) = open_memory("kb");
    backend.store_atom(&Atom::node("ConceptNode", "x"), true).unwrap();
    backend.store_atom(&Atom::node("ConceptNode", "x"), true).unwrap();

    let stats = backend.stats_snapshot().unwrap();
    assert_eq!(stats.store_count, 1, "second store must reuse the GUID");
}

#[test]
fn structurally_equal_atoms_share_a_guid_across_backends() {
    let connector = MemoryConnector::new();
    let one = CasBackend::open_with_connector(&connector, "cas:///ws-one").unwrap();
    let two = CasBackend::open_with_connector(&connector, "cas:///ws-two").unwrap();

    one.store_atom(&Atom::node("ConceptNode", "shared"), true).unwrap();
    two.store_atom(&Atom::node("ConceptNode", "shared"), true).unwrap();

    let probe = connector.connect().unwrap();
    let links_one = probe.list_links(&one.get_workspace_cid().unwrap()).unwrap();
    let links_two = probe.list_links(&two.get_workspace_cid().unwrap()).unwrap();
    assert_eq!(links_one.len(), 1);
    assert_eq!(links_two.len(), 1);
    // No values were stored, so each workspace entry still carries the GUID.
    assert_eq!(links_one[0].cid, links_two[0].cid);
}

#[test]
fn values_round_trip_and_default_truth_is_suppressed() {
    let (_connector, backend) = open_memory("kb");

    let node = Atom::node("ConceptNode", "x");
    let key = Atom::node("PredicateNode", "k");
    let truth_key = Atom::node("PredicateNode", "*-TruthValueKey-*");
    node.set_value(key.clone(), Value::Float(vec![1.0, 2.5, 3.75]));
    node.set_value(truth_key.clone(), Value::default_truth());
    backend.store_atom(&node, true).unwrap();

    let fetched = backend.fetch_atom(&Atom::node("ConceptNode", "x")).unwrap();
    assert_eq!(
        fetched.value(&key),
        Some(Value::Float(vec![1.0, 2.5, 3.75]))
    );
    assert_eq!(fetched.value(&truth_key), None, "default truth must not persist");
}

#[test]
fn non_default_truth_is_persisted() {
    let (_connector, backend) = open_memory("kb");

    let node = Atom::node("ConceptNode", "x");
    let truth_key = Atom::node("PredicateNode", "*-TruthValueKey-*");
    node.set_value(
        truth_key.clone(),
        Value::Truth {
            strength: 0.9,
            confidence: 0.4,
        },
    );
    backend.store_atom(&node, true).unwrap();

    let fetched = backend.fetch_atom(&Atom::node("ConceptNode", "x")).unwrap();
    assert_eq!(
        fetched.value(&truth_key),
        Some(Value::Truth {
            strength: 0.9,
            confidence: 0.4,
        })
    );
}

#[test]
fn value_update_merges_over_existing_entries() {
    let (_connector, backend) = open_memory("kb");

    let node = Atom::node("ConceptNode", "x");
    let key_a = Atom::node("PredicateNode", "a");
    let key_b = Atom::node("PredicateNode", "b");
    node.set_value(key_a.clone(), Value::Str(vec!["first".to_string()]));
    backend.store_atom(&node, true).unwrap();

    // A second revision adds a key; the first one must survive the merge.
    let revised = Atom::node("ConceptNode", "x");
    revised.set_value(key_b.clone(), Value::Float(vec![7.0]));
    backend.store_atom(&revised, true).unwrap();

    let fetched = backend.fetch_atom(&Atom::node("ConceptNode", "x")).unwrap();
    assert_eq!(
        fetched.value(&key_a),
        Some(Value::Str(vec!["first".to_string()]))
    );
    assert_eq!(fetched.value(&key_b), Some(Value::Float(vec![7.0])));
}

#[test]
fn node_names_with_path_separators_round_trip() {
    let (_connector, backend) = open_memory("kb");

    let node = Atom::node("ConceptNode", "dir/entry 100%");
    let key = Atom::node("PredicateNode", "k");
    node.set_value(key.clone(), Value::Float(vec![1.0]));
    backend.store_atom(&node, true).unwrap();

    // The workspace path is `WCID/<key>`; the slash in the name must not be
    // read as an extra path hop.
    let fetched = backend
        .fetch_atom(&Atom::node("ConceptNode", "dir/entry 100%"))
        .unwrap();
    assert_eq!(fetched.value(&key), Some(Value::Float(vec![1.0])));
}

#[test]
fn nested_link_values_round_trip() {
    let (_connector, backend) = open_memory("kb");

    let node = Atom::node("ConceptNode", "x");
    let key = Atom::node("PredicateNode", "k");
    let nested = Value::List(vec![
        Value::Float(vec![0.1, 2.0 / 3.0]),
        Value::Str(vec!["inner \"quoted\"".to_string()]),
        Value::Truth {
            strength: 0.5,
            confidence: 0.25,
        },
    ]);
    node.set_value(key.clone(), nested.clone());
    backend.store_atom(&node, true).unwrap();

    let fetched = backend.fetch_atom(&Atom::node("ConceptNode", "x")).unwrap();
    assert_eq!(fetched.value(&key), Some(nested));
}
