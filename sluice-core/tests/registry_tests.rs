//! Integration tests for the release registry and guard cells

use sluice_core::registry::{GuardPool, ReleaseRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_register_then_resolve_runs_once() {
    let registry = ReleaseRegistry::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let id = registry.register(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    if let Some(action) = registry.resolve_and_remove(id) {
        action(std::ptr::null_mut());
    }
    if let Some(action) = registry.resolve_and_remove(id) {
        action(std::ptr::null_mut());
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(registry.stats().registered, 1);
    assert_eq!(registry.stats().resolved, 1);
}

#[test]
fn test_resolve_on_another_thread() {
    let registry = Arc::new(ReleaseRegistry::new());
    let guards = Arc::new(GuardPool::with_preallocated(4));
    let (tx, rx) = flume::unbounded();

    let sender_thread = thread::current().id();
    let id = registry.register(Box::new(move |_| {
        tx.send(thread::current().id()).unwrap();
    }));
    let guard = guards.acquire(id);
    let hint = guard.as_hint() as usize;

    let worker = {
        let registry = Arc::clone(&registry);
        let guards = Arc::clone(&guards);
        thread::spawn(move || {
            let guard = unsafe {
                sluice_core::registry::Guard::from_hint(hint as *mut std::ffi::c_void)
            }
            .unwrap();
            let action = registry.resolve_and_remove(guard.id()).unwrap();
            action(std::ptr::null_mut());
            guards.release(guard);
        })
    };
    worker.join().unwrap();

    let release_thread = rx.recv().unwrap();
    assert_ne!(release_thread, sender_thread);
    assert!(registry.is_empty());
    assert_eq!(guards.available(), 4);
}

#[test]
fn test_concurrent_register_resolve() {
    let registry = Arc::new(ReleaseRegistry::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = flume::unbounded::<u64>();

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let runs = Arc::clone(&runs);
            let tx = tx.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    let runs = Arc::clone(&runs);
                    let id = registry.register(Box::new(move |_| {
                        runs.fetch_add(1, Ordering::SeqCst);
                    }));
                    tx.send(id).unwrap();
                }
            })
        })
        .collect();
    drop(tx);

    let consumer = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for id in rx.iter() {
                if let Some(action) = registry.resolve_and_remove(id) {
                    action(std::ptr::null_mut());
                }
            }
        })
    };

    for producer in producers {
        producer.join().unwrap();
    }
    consumer.join().unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1000);
    assert!(registry.is_empty());
}
