//! Integration tests for the host registry: concurrency, callback
//! re-entrancy, and the file-backed alias overlay.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use hostwatch_alias::{AliasStore, FileAliasStore, MemoryAliasStore};
use hostwatch_core::{Endpoint, Interface, MacAddr};
use hostwatch_registry::HostRegistry;

fn interface() -> Interface {
    Interface::new(
        "192.168.1.10/24".parse().unwrap(),
        "00:00:00:00:00:01".parse().unwrap(),
    )
}

fn gateway() -> Endpoint {
    Endpoint::new(
        "192.168.1.1".parse().unwrap(),
        "00:00:00:00:00:fe".parse().unwrap(),
    )
}

fn host(i: u8) -> (String, String) {
    (format!("192.168.1.{}", 100 + i), format!("02:00:00:00:00:{i:02x}"))
}

#[test]
fn test_concurrent_observers_fire_one_new_event_per_mac() {
    let new_count = Arc::new(AtomicUsize::new(0));
    let counter = new_count.clone();
    let registry = Arc::new(HostRegistry::new(
        interface(),
        gateway(),
        Arc::new(MemoryAliasStore::new()),
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        |_| {},
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for round in 0..50 {
                    for i in 0..20u8 {
                        let (ip, mac) = host(i);
                        registry.observe(&ip, &mac);
                        if round % 10 == 0 {
                            let _ = registry.list();
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), 20);
    assert_eq!(new_count.load(Ordering::SeqCst), 20);
    for i in 0..20u8 {
        let (_, mac) = host(i);
        assert_eq!(registry.liveness(&mac), Some(10));
    }
}

#[test]
fn test_concurrent_decay_fires_one_lost_event_per_mac() {
    let lost_count = Arc::new(AtomicUsize::new(0));
    let counter = lost_count.clone();
    let registry = Arc::new(HostRegistry::new(
        interface(),
        gateway(),
        Arc::new(MemoryAliasStore::new()),
        |_| {},
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    ));

    for i in 0..10u8 {
        let (ip, mac) = host(i);
        registry.observe(&ip, &mac);
    }

    // 4 threads x 5 misses = 20 decrements per MAC, twice the ceiling.
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    for i in 0..10u8 {
                        registry.mark_missed(&host(i).1);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(registry.is_empty());
    assert_eq!(lost_count.load(Ordering::SeqCst), 10);
}

#[test]
fn test_callbacks_may_reenter_the_registry() {
    let slot: Arc<OnceLock<Arc<HostRegistry>>> = Arc::new(OnceLock::new());
    let seen_inside = Arc::new(Mutex::new(Vec::new()));

    let (new_slot, lost_slot, seen) = (slot.clone(), slot.clone(), seen_inside.clone());
    let registry = Arc::new(HostRegistry::new(
        interface(),
        gateway(),
        Arc::new(MemoryAliasStore::new()),
        move |e| {
            let registry = new_slot.get().expect("registry installed");
            // Read-only and mutating calls from inside the callback.
            seen.lock().unwrap().push(registry.get(&e.mac.to_string()).is_some());
            registry.set_alias(&e.mac.to_string(), "auto");
            if e.mac.to_string() == "02:00:00:00:00:01" {
                registry.observe("192.168.1.150", "02:00:00:00:00:99");
            }
        },
        move |e| {
            let registry = lost_slot.get().expect("registry installed");
            assert!(registry.get(&e.mac.to_string()).is_none());
        },
    ));
    assert!(slot.set(registry.clone()).is_ok());

    let (ip, mac) = host(1);
    registry.observe(&ip, &mac);

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get(&mac).unwrap().alias, "auto");
    assert_eq!(registry.get("02:00:00:00:00:99").unwrap().alias, "auto");
    assert_eq!(*seen_inside.lock().unwrap(), vec![true, true]);

    for _ in 0..10 {
        registry.mark_missed(&mac);
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_alias_survives_restart_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aliases.json");
    let (ip, mac) = host(3);

    {
        let registry = HostRegistry::new(
            interface(),
            gateway(),
            Arc::new(FileAliasStore::new(&path)),
            |_| {},
            |_| {},
        );
        registry.observe(&ip, &mac);
        assert!(registry.set_alias(&mac, "printer"));
        assert!(!registry.set_alias("02:00:00:00:00:77", "ghost"));
    }

    let store = FileAliasStore::new(&path);
    let on_disk = store.load().unwrap();
    assert_eq!(on_disk.len(), 1);

    let registry = HostRegistry::new(
        interface(),
        gateway(),
        Arc::new(FileAliasStore::new(&path)),
        |_| {},
        |_| {},
    );
    registry.observe(&ip, &mac);
    assert_eq!(registry.get(&mac).unwrap().alias, "printer");
}

#[test]
fn test_corrupt_alias_file_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aliases.json");
    std::fs::write(&path, "definitely not json").unwrap();

    let registry = HostRegistry::new(
        interface(),
        gateway(),
        Arc::new(FileAliasStore::new(&path)),
        |_| {},
        |_| {},
    );

    let (ip, mac) = host(4);
    registry.observe(&ip, &mac);
    assert!(registry.get(&mac).unwrap().alias.is_empty());

    let parsed: MacAddr = mac.parse().unwrap();
    assert_eq!(registry.get(&mac).unwrap().mac, parsed);
}

#[test]
fn test_failed_alias_load_leaves_file_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aliases.json");
    let original =
        r#"{"00:11:22:33:44:55": "printer", "typo": "x", "00:11:22:33:44:66": "tv"}"#;
    std::fs::write(&path, original).unwrap();

    let registry = HostRegistry::new(
        interface(),
        gateway(),
        Arc::new(FileAliasStore::new(&path)),
        |_| {},
        |_| {},
    );

    let (ip, mac) = host(7);
    registry.observe(&ip, &mac);
    assert!(registry.set_alias(&mac, "nas"));
    assert_eq!(registry.get(&mac).unwrap().alias, "nas");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn test_set_alias_succeeds_when_persisting_fails() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be read or written as the alias file.
    let store = Arc::new(FileAliasStore::new(dir.path()));

    let registry = HostRegistry::new(interface(), gateway(), store.clone(), |_| {}, |_| {});
    let (ip, mac) = host(8);
    registry.observe(&ip, &mac);

    assert!(registry.set_alias(&mac, "printer"));
    assert_eq!(registry.get(&mac).unwrap().alias, "printer");
    assert!(store.get(&mac.parse().unwrap()).is_none());
    assert!(dir.path().is_dir());
}

#[test]
fn test_panicking_callback_keeps_later_events_queued() {
    let slot: Arc<OnceLock<Arc<HostRegistry>>> = Arc::new(OnceLock::new());
    let delivered = Arc::new(Mutex::new(Vec::new()));

    let (first, second, third, fourth) = (host(1), host(2), host(3), host(4));
    let (new_slot, seen) = (slot.clone(), delivered.clone());
    let (second_ip, second_mac) = second.clone();
    let (third_ip, third_mac) = third.clone();
    let registry = Arc::new(HostRegistry::new(
        interface(),
        gateway(),
        Arc::new(MemoryAliasStore::new()),
        move |e| {
            let mac = e.mac.to_string();
            if mac == second_mac {
                panic!("callback failure");
            }
            seen.lock().unwrap().push(mac.clone());
            if mac == "02:00:00:00:00:01" {
                let registry = new_slot.get().expect("registry installed");
                registry.observe(&second_ip, &second_mac);
                registry.observe(&third_ip, &third_mac);
            }
        },
        |_| {},
    ));
    assert!(slot.set(registry.clone()).is_ok());

    let result = panic::catch_unwind(AssertUnwindSafe(|| registry.observe(&first.0, &first.1)));
    assert!(result.is_err());
    assert_eq!(*delivered.lock().unwrap(), vec![first.1.clone()]);

    // The next mutation picks up the event still queued behind the failed one.
    registry.observe(&fourth.0, &fourth.1);
    assert_eq!(
        *delivered.lock().unwrap(),
        vec![first.1, third.1, fourth.1]
    );
    assert_eq!(registry.len(), 4);
}
