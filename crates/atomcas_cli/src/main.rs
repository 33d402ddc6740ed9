//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise `atomcas_core` end to end against the bundled in-memory CAS:
//!   open a workspace, store a node and a link, read them back, print stats.
//! - Keep output deterministic for quick local sanity checks.

use atomcas_core::{Atom, AtomTable, CasBackend, MemoryConnector, Value};

fn main() {
    println!("atomcas_core version={}", atomcas_core::core_version());

    let connector = MemoryConnector::new();
    let backend = match CasBackend::open_with_connector(&connector, "cas:///smoke") {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("open failed: {err}");
            std::process::exit(1);
        }
    };

    let node = Atom::node("ConceptNode", "smoke-test");
    node.set_value(
        Atom::node("PredicateNode", "weight"),
        Value::Float(vec![1.0, 2.5]),
    );
    let list = Atom::link(
        "ListLink",
        vec![node.clone(), Atom::node("ConceptNode", "partner")],
    );

    if let Err(err) = backend
        .store_atom(&node, false)
        .and_then(|_| backend.store_atom(&list, false))
        .and_then(|_| backend.barrier())
    {
        eprintln!("store failed: {err}");
        std::process::exit(1);
    }

    match backend.get_workspace_cid() {
        Ok(wcid) => println!("workspace cid={wcid}"),
        Err(err) => eprintln!("workspace cid unavailable: {err}"),
    }

    let table = AtomTable::new();
    match backend.load_workspace("", &table) {
        Ok(count) => println!("workspace atoms={count}"),
        Err(err) => eprintln!("load failed: {err}"),
    }

    match backend.stats_report() {
        Ok(report) => print!("{report}"),
        Err(err) => eprintln!("stats unavailable: {err}"),
    }
    backend.close();
}
