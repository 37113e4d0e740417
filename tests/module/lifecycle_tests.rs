//! Module lifecycle tests
//!
//! Bulk initialize/process through a reader and the at-most-once guarantees.

use std::sync::Arc;
use std::thread;

use modhost::module::{Hook, LifecycleState, ModuleReader, MODULE_CORE};
use modhost::ModuleError;

use super::test_utils::*;

#[test]
fn test_end_to_end_scan_load_process() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("app::A");
    fixture.loader.register::<Tracked>("app::B");

    let root = fixture.root("core");
    write_module(&root, "A", Some("app"), "A");
    write_module(&root, "B", Some("app"), "B");

    let reader = fixture.reader(&root);
    reader
        .scan()
        .load_all_modules()
        .unwrap()
        .process_all_modules()
        .unwrap();

    assert_eq!(reader.modules().identifiers(), vec!["a", "b"]);
    for (_, module) in reader.modules().iter() {
        assert!(module.has_initialized());
        assert!(module.has_processed());
        assert_eq!(module.state(), LifecycleState::Processed);
    }
    assert_eq!(fixture.events().events(), vec!["b.on_init", "b.on_process"]);
}

#[test]
fn test_repeated_bulk_calls_fire_hooks_once() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Tracked>("Once");

    let root = fixture.root("core");
    write_module(&root, "Once", None, "Once");

    let reader = fixture.reader(&root);
    for _ in 0..3 {
        reader.scan().load_all_modules().unwrap();
        reader.process_all_modules().unwrap();
    }
    reader.get_module("once").unwrap().initialize().unwrap().process().unwrap();

    let events = fixture.events();
    assert_eq!(events.count("once.on_init"), 1);
    assert_eq!(events.count("once.on_process"), 1);
}

#[test]
fn test_process_without_load_initializes_first() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Tracked>("Eager");

    let root = fixture.root("core");
    write_module(&root, "Eager", None, "Eager");

    let reader = fixture.reader(&root);
    reader.process_all_modules().unwrap();

    let module = reader.get_module("eager").unwrap();
    assert!(module.has_initialized());
    assert!(module.has_processed());
    assert_eq!(fixture.events().events(), vec!["eager.on_init", "eager.on_process"]);
}

#[test]
fn test_unsatisfiable_hook_is_skipped() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Needy>("Needy");

    let root = fixture.root("core");
    write_module(&root, "Needy", None, "Needy");

    let reader = fixture.reader(&root);
    reader.load_all_modules().unwrap();

    let module = reader.get_module("needy").unwrap();
    assert!(module.declares(Hook::OnInit));
    assert!(module.has_initialized());
    assert_eq!(module.with_module(|m: &Needy| m.fired), Some(false));
}

#[test]
fn test_concurrent_lifecycle_calls_fire_hooks_once() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Tracked>("Hot");

    let root = fixture.root("core");
    write_module(&root, "Hot", None, "Hot");

    let registry = fixture.registry();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let reader = ModuleReader::new(&root, Arc::clone(&registry)).unwrap();
            thread::spawn(move || {
                reader.load_all_modules().unwrap();
                reader.process_all_modules().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let events = fixture.events();
    assert_eq!(events.count("hot.on_init"), 1);
    assert_eq!(events.count("hot.on_process"), 1);
}

#[test]
fn test_module_metadata_defaults() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("Meta");

    let root = fixture.root("core");
    write_module(&root, "Meta", None, "Meta");

    let module = fixture.reader(&root).get_module("meta").unwrap();
    let metadata = module.metadata();
    assert_eq!(metadata.name, "Quiet");
    assert_eq!(module.qualified_type(), "Meta");
    assert_eq!(module.identifier().as_str(), "meta");
}

#[test]
fn test_hook_can_inspect_its_own_instance() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Introspective>("Mirror");

    let root = fixture.root("core");
    write_module(&root, "Mirror", None, "Mirror");

    let reader = fixture.reader(&root);
    fixture.container.set(MODULE_CORE, reader.clone());

    // Runs on a worker so a lock cycle fails the test instead of hanging it
    let (tx, rx) = std::sync::mpsc::channel();
    let worker = reader.clone();
    thread::spawn(move || {
        let outcome = worker.load_all_modules().map(|_| ());
        let _ = tx.send(outcome);
    });
    rx.recv_timeout(std::time::Duration::from_secs(5))
        .expect("load_all_modules did not return")
        .unwrap();

    assert_eq!(
        fixture.events().events(),
        vec![
            "metadata:Introspective",
            "state:Uninitialized",
            "declares:true",
            "summary:Uninitialized",
            "borrow:false",
            "reenter:true",
        ]
    );
    let module = reader.get_module("mirror").unwrap();
    assert!(module.has_initialized());
    assert!(module.with_module(|_: &Introspective| ()).is_some());
}

#[test]
fn test_panicking_hook_becomes_hook_failure() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Panicky>("Fragile");

    let root = fixture.root("core");
    write_module(&root, "Fragile", None, "Fragile");

    let reader = fixture.reader(&root);
    let err = reader.load_all_modules().unwrap_err();
    match err {
        ModuleError::HookFailed { identifier, hook, message } => {
            assert_eq!(identifier, "fragile");
            assert_eq!(hook, "on_init");
            assert!(message.contains("on_init blew up"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    let module = reader.get_module("fragile").unwrap();
    assert!(!module.has_initialized());
    assert_eq!(module.state(), LifecycleState::Uninitialized);

    // The hook is retried on the next call and the instance is still usable
    assert!(module.initialize().is_err());
    assert_eq!(module.with_module(|m: &Panicky| m.attempts), Some(2));
}
