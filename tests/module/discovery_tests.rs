//! Module discovery tests
//!
//! Scanning, caching and the reasons a candidate is ignored.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use modhost::config::ScanConfig;
use modhost::module::{
    CandidateLoader, IgnoreReason, LoadError, ModuleReader, ModuleRegistry, StaticLoader,
    TypeDescriptor,
};

use super::test_utils::*;

#[test]
fn test_scan_registers_valid_modules() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("app::core::Billing");
    fixture.loader.register::<Quiet>("Shipping");

    let root = fixture.root("core");
    write_module(&root, "Billing", Some("app::core"), "Billing");
    write_module(&root, "Shipping", None, "Shipping");

    let reader = fixture.reader(&root);
    let data = reader.modules_data();

    assert_eq!(reader.modules().identifiers(), vec!["billing", "shipping"]);
    assert!(data.ignored().is_empty());
    assert_eq!(data.identifier_index().get("billing").unwrap(), "Billing");

    let billing = data.module("billing").unwrap();
    assert_eq!(billing.qualified_type, "app::core::Billing");
    assert_eq!(billing.source_name, "Billing");
    assert!(!billing.instance.has_initialized());
    assert!(billing.source_path.ends_with("Billing/Billing.mod"));
}

#[test]
fn test_lookup_is_case_insensitive() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("shop::Checkout");

    let root = fixture.root("core");
    write_module(&root, "Checkout", Some("shop"), "Checkout");
    let reader = fixture.reader(&root);

    assert!(reader.has_module("Checkout"));
    assert!(reader.has_module("checkout"));
    assert!(reader.has_module("CHECKOUT"));
    let a = reader.get_module("Checkout").unwrap();
    let b = reader.get_module("checkout").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(ModuleReader::normalize_module_identifier("ChEcKoUt"), "checkout");
}

#[test]
fn test_missing_module_is_an_error() {
    let fixture = ModuleTestFixture::new().unwrap();
    let root = fixture.root("core");
    let reader = fixture.reader(&root);

    let err = reader.get_module("Nope").unwrap_err();
    assert!(matches!(err, modhost::ModuleError::ModuleNotFound(name) if name == "Nope"));
    assert!(reader.modules().is_empty());
}

#[test]
fn test_reader_rejects_non_directory() {
    let fixture = ModuleTestFixture::new().unwrap();
    let file = fixture.temp_dir.path().join("plain.txt");
    std::fs::write(&file, "not a directory").unwrap();

    let err = ModuleReader::new(&file, fixture.registry()).unwrap_err();
    assert!(matches!(err, modhost::ModuleError::InvalidPath(_)));

    let missing = fixture.temp_dir.path().join("missing");
    assert!(ModuleReader::new(&missing, fixture.registry()).is_err());
}

#[test]
fn test_scan_is_cached_after_first_call() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("First");
    fixture.loader.register::<Quiet>("Second");

    let root = fixture.root("core");
    write_module(&root, "First", None, "First");
    let reader = fixture.reader(&root);
    let before = reader.modules_data();

    // Changes on disk are not picked up by later scans
    write_module(&root, "Second", None, "Second");
    std::fs::remove_dir_all(root.join("First")).unwrap();

    let after = reader.scan().modules_data();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(reader.has_module("first"));
    assert!(!reader.has_module("second"));
}

#[test]
fn test_readers_share_registry_cache() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("Shared");

    let root = fixture.root("core");
    write_module(&root, "Shared", None, "Shared");

    let registry = fixture.registry();
    let one = ModuleReader::new(&root, Arc::clone(&registry)).unwrap();
    let two = ModuleReader::new(&root, Arc::clone(&registry)).unwrap();

    assert!(registry.cached(&root).is_none());
    let a = one.get_module("shared").unwrap();
    let b = two.get_module("SHARED").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(registry.cached(&root).is_some());

    let all = two.all_cached_modules_data();
    assert_eq!(all.len(), 1);
    assert!(all.contains_key(one.module_path()));
}

#[test]
fn test_concurrent_scans_build_one_instance() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("Busy");

    let root = fixture.root("core");
    write_module(&root, "Busy", None, "Busy");
    let registry = fixture.registry();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let root = root.clone();
            thread::spawn(move || registry.scan(&root))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
    assert_eq!(results[0].modules().len(), 1);
    assert_eq!(fixture.loader.loaded_types(), vec!["Busy"]);
}

#[test]
fn test_identifier_collision_keeps_one() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("Foo");
    fixture.loader.register::<Quiet>("foo");

    let root = fixture.root("core");
    write_module(&root, "Foo", None, "Foo");
    write_module(&root, "foo", None, "foo");

    let names: Vec<_> = std::fs::read_dir(&root).unwrap().collect();
    if names.len() < 2 {
        // Case-insensitive filesystem: both writes hit one directory
        return;
    }

    let data = fixture.reader(&root).modules_data();
    assert_eq!(data.modules().len(), 1);
    assert_eq!(data.ignored().len(), 1);

    let (loser, identifier) = data.ignored().iter().next().unwrap();
    assert_eq!(identifier, "foo");
    assert_eq!(data.reasons().get(loser), Some(&IgnoreReason::Collision));
    assert_ne!(data.identifier_index().get("foo").unwrap(), loser);
}

#[test]
fn test_size_bounds() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("Large");

    let root = fixture.root("core");
    write_source(&root, "Tiny", "#!modhost");
    let mut big = String::from("#!modhost\nmodule Large {}\n");
    big.push_str(&"/* padding */\n".repeat(8000));
    write_source(&root, "Large", &big);
    write_source(&root, "Empty", "");

    let data = fixture.reader(&root).modules_data();
    assert!(data.modules().is_empty());
    assert_eq!(data.reasons().get("Tiny"), Some(&IgnoreReason::SizeOutOfBounds(9)));
    assert_eq!(data.reasons().get("Empty"), Some(&IgnoreReason::SizeOutOfBounds(0)));
    assert!(matches!(
        data.reasons().get("Large"),
        Some(IgnoreReason::SizeOutOfBounds(size)) if *size > 100 * 1024
    ));
    // Rejected before loading
    assert!(fixture.loader.loaded_types().is_empty());
}

#[test]
fn test_source_shape_rejections() {
    let fixture = ModuleTestFixture::new().unwrap();
    let root = fixture.root("core");

    write_source(&root, "NoMarker", "<?php\nmodule NoMarker {}\n");
    write_source(&root, "NoDecl", "#!modhost\nnamespace app;\nfn helper() {}\n");
    write_source(&root, "Commented", "#!modhost\n// module Commented\n/* module X */\n");

    let data = fixture.reader(&root).modules_data();
    assert_eq!(data.reasons().get("NoMarker"), Some(&IgnoreReason::MissingMarker));
    assert_eq!(data.reasons().get("NoDecl"), Some(&IgnoreReason::NoDeclaration));
    assert_eq!(data.reasons().get("Commented"), Some(&IgnoreReason::NoDeclaration));
    assert_eq!(data.ignored().get("NoMarker").unwrap(), "nomarker");
}

#[test]
fn test_non_candidates_are_skipped_silently() {
    let fixture = ModuleTestFixture::new().unwrap();
    let root = fixture.root("core");

    std::fs::write(root.join("README.md"), "not a module").unwrap();
    std::fs::create_dir_all(root.join("Empty")).unwrap();
    std::fs::create_dir_all(root.join("Wrong")).unwrap();
    std::fs::write(root.join("Wrong").join("Other.mod"), "#!modhost\nmodule Other {}\n").unwrap();

    let data = fixture.reader(&root).modules_data();
    assert!(data.modules().is_empty());
    assert!(data.ignored().is_empty());
}

#[test]
fn test_type_contract_rejections() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture
        .loader
        .register_plain("app::Helper")
        .register_instantiable::<Quiet>("app::Direct");

    let root = fixture.root("core");
    write_module(&root, "Helper", Some("app"), "Helper");
    write_module(&root, "Direct", Some("app"), "Direct");
    write_module(&root, "Unknown", Some("app"), "Unknown");

    let data = fixture.reader(&root).modules_data();
    assert!(data.modules().is_empty());
    assert_eq!(data.reasons().get("Helper"), Some(&IgnoreReason::NotAModule));
    assert_eq!(data.reasons().get("Direct"), Some(&IgnoreReason::DirectlyInstantiable));
    assert!(matches!(data.reasons().get("Unknown"), Some(IgnoreReason::LoadFailed(_))));
}

#[test]
fn test_same_type_in_second_root_is_a_source_mismatch() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("app::Dup");

    let core = fixture.root("core");
    let api = fixture.root("api");
    write_module(&core, "Dup", Some("app"), "Dup");
    write_module(&api, "Dup", Some("app"), "Dup");

    let registry = fixture.registry();
    let core_reader = ModuleReader::new(&core, Arc::clone(&registry)).unwrap();
    let api_reader = ModuleReader::new(&api, registry).unwrap();

    assert!(core_reader.has_module("dup"));
    assert!(!api_reader.has_module("dup"));
    assert_eq!(
        api_reader.modules_data().reasons().get("Dup"),
        Some(&IgnoreReason::SourceMismatch)
    );
}

/// Loader that panics on one type and defers to a catalog otherwise
struct PanickyLoader {
    inner: StaticLoader,
    poisoned: &'static str,
}

impl CandidateLoader for PanickyLoader {
    fn find_loaded(&self, qualified_name: &str) -> Option<TypeDescriptor> {
        self.inner.find_loaded(qualified_name)
    }

    fn load_candidate(&self, path: &Path, qualified_name: &str) -> Result<TypeDescriptor, LoadError> {
        if qualified_name == self.poisoned {
            panic!("cannot load {}", qualified_name);
        }
        self.inner.load_candidate(path, qualified_name)
    }
}

#[test]
fn test_loader_panic_is_contained() {
    let fixture = ModuleTestFixture::new().unwrap();
    let inner = StaticLoader::new();
    inner.register::<Quiet>("Healthy");
    let loader = Arc::new(PanickyLoader {
        inner,
        poisoned: "Broken",
    });

    let root = fixture.root("core");
    write_module(&root, "Broken", None, "Broken");
    write_module(&root, "Healthy", None, "Healthy");

    let registry = Arc::new(ModuleRegistry::new(loader, &fixture.container, ScanConfig::default()));
    let data = registry.scan(&root);

    assert!(data.module("healthy").is_some());
    match data.reasons().get("Broken") {
        Some(IgnoreReason::LoadFailed(message)) => assert!(message.contains("cannot load Broken")),
        other => panic!("unexpected reason {:?}", other),
    }
}

#[test]
fn test_factory_panic_is_contained() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Exploding>("Boom");
    fixture.loader.register::<Quiet>("Calm");

    let root = fixture.root("core");
    write_module(&root, "Boom", None, "Boom");
    write_module(&root, "Calm", None, "Calm");

    let data = fixture.reader(&root).modules_data();
    assert!(data.module("calm").is_some());
    assert!(matches!(data.reasons().get("Boom"), Some(IgnoreReason::LoadFailed(_))));
}

#[test]
fn test_summary_serializes() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.loader.register::<Quiet>("Listed");

    let root = fixture.root("core");
    write_module(&root, "Listed", None, "Listed");
    write_source(&root, "Bad", "#!modhost nothing here");

    let summary = fixture.reader(&root).modules_data().summary();
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["modules"]["listed"]["qualified_type"], "Listed");
    assert_eq!(json["modules"]["listed"]["state"], "Uninitialized");
    assert_eq!(json["ignored"]["Bad"]["reason"]["reason"], "no_declaration");
}

mod normalization {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn lookup_ignores_ascii_case(upper in proptest::collection::vec(any::<bool>(), 7)) {
            let name: String = "Catalog"
                .chars()
                .zip(upper)
                .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
                .collect();
            prop_assert_eq!(ModuleReader::normalize_module_identifier(&name), "catalog");
        }
    }
}
